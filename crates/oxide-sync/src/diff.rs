//! Dictionary diffing.
//!
//! Compares two dictionaries of the same entity kind by derived key and
//! classifies every entry as only-original, only-imported, or present in
//! both. Matching never relies on object identity.

use std::collections::BTreeMap;

use tracing::warn;

use crate::dictionary::Dictionary;

/// Classification of two dictionaries' entries.
#[derive(Debug, Clone, PartialEq)]
pub struct DictionaryDiff<E> {
    /// Entries whose key appears only in the original dictionary.
    pub only_original: Vec<E>,
    /// Entries whose key appears only in the imported dictionary.
    pub only_imported: Vec<E>,
    /// `(original, imported)` pairs sharing a key.
    pub both: Vec<(E, E)>,
    /// Keys held by more than one entry on either side.
    pub ambiguous: Vec<String>,
}

impl<E> Default for DictionaryDiff<E> {
    fn default() -> Self {
        Self {
            only_original: Vec::new(),
            only_imported: Vec::new(),
            both: Vec::new(),
            ambiguous: Vec::new(),
        }
    }
}

impl<E> DictionaryDiff<E> {
    /// Returns true when nothing differs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.only_original.is_empty() && self.only_imported.is_empty()
    }

    /// A short summary line.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} only in original, {} only in imported, {} in both",
            self.only_original.len(),
            self.only_imported.len(),
            self.both.len()
        )
    }
}

fn index<D: Dictionary>(dictionary: &D) -> BTreeMap<String, Vec<D::Entry>> {
    let mut map: BTreeMap<String, Vec<D::Entry>> = BTreeMap::new();
    for entry in dictionary.all_entries() {
        map.entry(dictionary.name(&entry)).or_default().push(entry);
    }
    map
}

/// Diffs two dictionaries of the same kind.
///
/// Output is ordered by key. A key held by several entries is reported in
/// [`DictionaryDiff::ambiguous`]; its entries are paired in order and any
/// surplus is classified as one-sided.
pub fn diff<D: Dictionary>(original: &D, imported: &D) -> DictionaryDiff<D::Entry> {
    let mut original = index(original);
    let mut imported = index(imported);
    let mut result = DictionaryDiff::default();

    for (key, originals) in &mut original {
        let imports = imported.remove(key).unwrap_or_default();
        if originals.len() > 1 || imports.len() > 1 {
            warn!(
                key = %key,
                original = originals.len(),
                imported = imports.len(),
                "Ambiguous dictionary key"
            );
            result.ambiguous.push(key.clone());
        }

        let mut imports = imports.into_iter();
        for entry in originals.drain(..) {
            match imports.next() {
                Some(other) => result.both.push((entry, other)),
                None => result.only_original.push(entry),
            }
        }
        result.only_imported.extend(imports);
    }

    for (key, imports) in imported {
        if imports.len() > 1 {
            warn!(key = %key, imported = imports.len(), "Ambiguous dictionary key");
            result.ambiguous.push(key);
        }
        result.only_imported.extend(imports);
    }
    result.ambiguous.sort();

    result
}
