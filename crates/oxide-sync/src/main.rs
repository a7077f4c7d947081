//! oxide-sync CLI
//!
//! Command-line tool for synchronizing a schema model with a database.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_sync::prelude::*;

/// Schema synchronization between a model and a database.
#[derive(Parser)]
#[command(name = "oxide-sync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (SQLite path or connection string).
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:db.sqlite3")]
    database: String,

    /// Dialect used to render DDL.
    #[arg(long, value_enum, default_value_t = DialectKind::Sqlite)]
    dialect: DialectKind,

    /// JSON filter file selecting the tables and columns to compare.
    #[arg(short, long)]
    filter: Option<PathBuf>,

    /// Do not create joins missing from the database.
    #[arg(long)]
    skip_joins: bool,

    /// Do not plan primary key changes.
    #[arg(long)]
    skip_pk: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum DialectKind {
    Sqlite,
    Postgres,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the changes that make the database match the model.
    Plan {
        /// Model file.
        #[arg(short, long)]
        model: PathBuf,

        /// Print the plan as JSON instead of SQL.
        #[arg(long)]
        json: bool,
    },

    /// Apply the changes that make the database match the model.
    Apply {
        /// Model file.
        #[arg(short, long)]
        model: PathBuf,

        /// Show SQL without executing (dry run).
        #[arg(long)]
        dry_run: bool,
    },

    /// Update the model file from the database.
    Pull {
        /// Model file.
        #[arg(short, long)]
        model: PathBuf,

        /// Write the updated model here instead of overwriting it.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write the joins of a model as XML.
    ExportJoins {
        /// Model file.
        #[arg(short, long)]
        model: PathBuf,

        /// Output file (stdout if not specified).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Load joins from an XML file into a model.
    ImportJoins {
        /// Model file.
        #[arg(short, long)]
        model: PathBuf,

        /// XML file holding the joins.
        #[arg(short, long)]
        input: PathBuf,
    },
}

fn dialect_for(kind: DialectKind) -> Box<dyn MergeDialect> {
    match kind {
        DialectKind::Sqlite => Box::new(SqliteDialect::new()),
        DialectKind::Postgres => Box::new(PostgresDialect::new()),
    }
}

fn merger_for(cli: &Cli) -> anyhow::Result<SchemaMerger> {
    let mut options = MergerOptions::new()
        .skip_join_tokens(cli.skip_joins)
        .skip_pk_tokens(cli.skip_pk);
    if let Some(path) = &cli.filter {
        let filter = FilterConfig::load(path)?.build()?;
        options = options.with_filter(Arc::new(filter));
    }
    Ok(SchemaMerger::with_options(options))
}

fn load_model(path: &Path) -> anyhow::Result<SchemaModel> {
    SchemaModel::load(path).with_context(|| format!("Failed to load model {}", path.display()))
}

async fn connect(url: &str) -> anyhow::Result<SqlitePool> {
    Ok(SqlitePoolOptions::new().max_connections(5).connect(url).await?)
}

async fn plan_against_database(
    cli: &Cli,
    merger: &SchemaMerger,
    pool: &SqlitePool,
    original: &SchemaModel,
) -> anyhow::Result<MergePlan> {
    let imported = introspect_sqlite(pool, merger.options().filter.as_deref()).await?;
    let plan = merger.plan(original, &imported)?;
    for key in &plan.ambiguous {
        warn!(key = %key, "Ambiguous entry, matched by position");
    }
    if cli.verbose {
        for token in &plan.tokens {
            info!("{}", token.description());
        }
    }
    Ok(plan)
}

fn report_failures(validation: &ValidationResult) {
    for failure in validation.failures() {
        println!(" [!] {}: {}", failure.token.description(), failure.message);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let merger = merger_for(&cli)?;

    match &cli.command {
        Commands::Plan { model, json } => {
            let original = load_model(model)?;
            let pool = connect(&cli.database).await?;
            let plan = plan_against_database(&cli, &merger, &pool, &original).await?;

            if *json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else if plan.is_empty() {
                info!("Database is in sync with the model.");
            } else {
                let dialect = dialect_for(cli.dialect);
                let mut scratch = original.clone();
                let report =
                    TokenExecutor::new(dialect.as_ref()).execute(plan.tokens, &mut scratch);
                for sql in report.sql() {
                    println!("{};", sql);
                }
                report_failures(&report.validation);
            }
        }

        Commands::Apply { model, dry_run } => {
            if !matches!(cli.dialect, DialectKind::Sqlite) {
                bail!(
                    "apply only runs against SQLite databases; \
                     use `plan` to render other dialects"
                );
            }
            let original = load_model(model)?;
            let pool = connect(&cli.database).await?;
            let plan = plan_against_database(&cli, &merger, &pool, &original).await?;
            if plan.is_empty() {
                info!("Database is in sync with the model.");
                return Ok(());
            }

            if *dry_run {
                info!("Dry run mode - SQL will be printed but not executed.");
            }
            let dialect = SqliteDialect::new();
            let mut scratch = original.clone();
            let report = TokenExecutor::new(&dialect).execute(plan.tokens, &mut scratch);
            let applied = SqliteApplier::new(pool).dry_run(*dry_run).apply(&report).await;

            let mut validation = report.validation;
            validation.extend(applied.validation);
            report_failures(&validation);
            info!(
                executed = applied.executed,
                failures = validation.len(),
                "Apply finished"
            );
            if !validation.is_empty() {
                bail!("{} token(s) failed", validation.len());
            }
        }

        Commands::Pull { model, output } => {
            let mut original = load_model(model)?;
            let pool = connect(&cli.database).await?;
            let plan = plan_against_database(&cli, &merger, &pool, &original)
                .await?
                .reversed();

            let dialect = dialect_for(cli.dialect);
            let report = TokenExecutor::new(dialect.as_ref()).execute(plan.tokens, &mut original);
            report_failures(&report.validation);

            let target = output.as_deref().unwrap_or(model);
            original.save(target)?;
            info!(
                changes = report.model_changes,
                path = %target.display(),
                "Model updated"
            );
        }

        Commands::ExportJoins { model, output } => {
            let model = load_model(model)?;
            let xml = write_joins(&model.joins)?;
            match output {
                Some(path) => {
                    std::fs::write(path, xml)?;
                    info!(joins = model.joins.len(), path = %path.display(), "Joins exported");
                }
                None => println!("{}", xml),
            }
        }

        Commands::ImportJoins { model, input } => {
            let mut target = load_model(model)?;
            let xml = std::fs::read_to_string(input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let joins = read_joins(&xml)?;
            let loaded = load_joins_into(&mut target, joins);
            target.save(model)?;
            info!(loaded, path = %model.display(), "Joins imported");
        }
    }

    Ok(())
}
