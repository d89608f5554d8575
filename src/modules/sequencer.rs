//! Orders exports so that shorter paths are mounted before longer ones.
//!
//! A deeper export bound into the pseudo tree before its parent would be
//! hidden (or fail) once the parent is bound over it. Ordering by path
//! length is enough to avoid that without comparing prefixes.

use super::export::{ExportEntry, ExportRegistry};
use std::path::Path;

/// One export scheduled for mounting, with its place in the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MountRecord<'a> {
    /// The export to bind
    pub export: &'a ExportEntry,
    /// Zero-based place in mount order
    pub position: usize,
}

/// Exports in mount order. Rebuilt for every construction pass.
#[derive(Debug, Default)]
pub struct MountSequence<'a> {
    exports: Vec<&'a ExportEntry>,
}

fn path_len(path: &Path) -> usize {
    path.as_os_str().len()
}

impl<'a> MountSequence<'a> {
    /// An empty sequence.
    pub fn new() -> Self {
        Self {
            exports: Vec::new(),
        }
    }

    /// Sequences every export in the registry, class by class.
    pub fn from_registry(registry: &'a ExportRegistry) -> Self {
        let mut sequence = Self::new();
        for export in registry.iter() {
            sequence.insert(export);
        }
        sequence
    }

    /// Inserts `export` in front of the first entry with a strictly longer
    /// path, or at the end if there is none. Equal lengths keep insertion
    /// order.
    pub fn insert(&mut self, export: &'a ExportEntry) {
        let len = path_len(&export.path);
        match self
            .exports
            .iter()
            .position(|queued| path_len(&queued.path) > len)
        {
            Some(index) => self.exports.insert(index, export),
            None => self.exports.push(export),
        }
    }

    /// Number of exports queued.
    pub fn len(&self) -> usize {
        self.exports.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.exports.is_empty()
    }

    /// The records in mount order.
    pub fn records(&self) -> impl Iterator<Item = MountRecord<'a>> + '_ {
        self.exports
            .iter()
            .enumerate()
            .map(|(position, &export)| MountRecord { export, position })
    }
}

impl<'a> IntoIterator for MountSequence<'a> {
    type Item = MountRecord<'a>;
    type IntoIter = std::vec::IntoIter<MountRecord<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.records().collect::<Vec<_>>().into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::export::ClientClass;
    use std::path::PathBuf;

    fn paths(sequence: &MountSequence<'_>) -> Vec<PathBuf> {
        sequence.records().map(|r| r.export.path.clone()).collect()
    }

    #[test]
    fn test_shallow_before_deep() {
        let exports = [
            ExportEntry::new("*", "/a"),
            ExportEntry::new("*", "/a/b/c"),
            ExportEntry::new("*", "/x"),
        ];
        let mut sequence = MountSequence::new();
        for export in &exports {
            sequence.insert(export);
        }

        assert_eq!(
            paths(&sequence),
            vec![
                PathBuf::from("/a"),
                PathBuf::from("/x"),
                PathBuf::from("/a/b/c")
            ]
        );
    }

    #[test]
    fn test_equal_lengths_keep_order() {
        let exports = [
            ExportEntry::new("*", "/srv/bb"),
            ExportEntry::new("*", "/srv/aa"),
            ExportEntry::new("*", "/srv"),
            ExportEntry::new("*", "/srv/cc"),
        ];
        let mut sequence = MountSequence::new();
        for export in &exports {
            sequence.insert(export);
        }

        assert_eq!(
            paths(&sequence),
            vec![
                PathBuf::from("/srv"),
                PathBuf::from("/srv/bb"),
                PathBuf::from("/srv/aa"),
                PathBuf::from("/srv/cc"),
            ]
        );
    }

    #[test]
    fn test_positions_follow_order() {
        let registry = ExportRegistry::from_entries([
            ExportEntry::new("*", "/export/home"),
            ExportEntry::new("client", "/export").with_class(ClientClass::Fqdn),
        ]);
        let sequence = MountSequence::from_registry(&registry);

        let records: Vec<_> = sequence.into_iter().collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].position, 0);
        assert_eq!(records[0].export.path, PathBuf::from("/export"));
        assert_eq!(records[1].position, 1);
        assert_eq!(records[1].export.path, PathBuf::from("/export/home"));
    }

    #[test]
    fn test_empty_registry() {
        let registry = ExportRegistry::new();
        let sequence = MountSequence::from_registry(&registry);
        assert!(sequence.is_empty());
        assert_eq!(sequence.records().count(), 0);
    }
}
