//! Column flattening - rectangularize a batch of structures
//!
//! The key set is not known up front, so flattening is two passes: the first
//! accumulates the union of keys in first-occurrence order, the second
//! reindexes every structure onto that schema.

use crate::types::{value_to_cell, Fragment, Structure};
use std::collections::HashMap;

/// Ordered, deduplicated keys observed across a batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSchema {
    keys: Vec<String>,
    positions: HashMap<String, usize>,
    // How many structures contained each key, by position
    occurrences: Vec<usize>,
}

impl ColumnSchema {
    /// Scan every structure once, keeping first-occurrence order
    pub fn from_structures(structures: &[Structure]) -> Self {
        let mut schema = ColumnSchema::default();
        for structure in structures {
            schema.observe(structure);
        }
        schema
    }

    fn observe(&mut self, structure: &Structure) {
        for key in structure.keys() {
            match self.positions.get(key) {
                Some(&pos) => self.occurrences[pos] += 1,
                None => {
                    self.positions.insert(key.clone(), self.keys.len());
                    self.keys.push(key.clone());
                    self.occurrences.push(1);
                }
            }
        }
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn position(&self, key: &str) -> Option<usize> {
        self.positions.get(key).copied()
    }

    /// Number of structures in the batch that carried `key`
    pub fn occurrences(&self, key: &str) -> usize {
        self.position(key).map(|p| self.occurrences[p]).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Output of [`ColumnFlattener::flatten`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flattened {
    pub schema: ColumnSchema,

    /// One fragment per input structure, each exactly `schema.len()` wide
    pub fragments: Vec<Fragment>,
}

/// Projects structures onto their batch-wide column schema
#[derive(Debug, Default, Clone, Copy)]
pub struct ColumnFlattener;

impl ColumnFlattener {
    pub fn new() -> Self {
        ColumnFlattener
    }

    pub fn flatten(&self, structures: &[Structure]) -> Flattened {
        let schema = ColumnSchema::from_structures(structures);

        let fragments = structures
            .iter()
            .map(|structure| Self::reindex(&schema, structure))
            .collect();

        Flattened { schema, fragments }
    }

    fn reindex(schema: &ColumnSchema, structure: &Structure) -> Fragment {
        let mut fragment: Fragment = vec![None; schema.len()];
        for (key, value) in structure {
            if let Some(pos) = schema.position(key) {
                fragment[pos] = value_to_cell(value);
            }
        }
        fragment
    }
}
