use std::fmt;
use std::path::Path;

use crate::core::tree::{NodeId, ReferenceTree};
use crate::parsing::refpkg::write_new;
use crate::parsing::tsv::{data_rows, parse_number};
use crate::parsing::ParseError;

/// RED value of every node of one tree, indexed by [`NodeId`]
#[derive(Debug, Clone, PartialEq)]
pub struct RedTable {
    values: Vec<f64>,
}

impl RedTable {
    pub(crate) fn from_values(values: Vec<f64>) -> Self {
        Self { values }
    }

    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<f64> {
        self.values.get(id.0).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, f64)> + '_ {
        self.values.iter().enumerate().map(|(i, &v)| (NodeId(i), v))
    }

    /// Render as `node<TAB>red<TAB>name`, one line per node
    #[must_use]
    pub fn to_tsv(&self, tree: &ReferenceTree) -> String {
        RedTsv { table: self, tree }.to_string()
    }

    /// Write the table to a file that must not exist yet
    ///
    /// # Errors
    ///
    /// Returns `ParseError::Io` if the file exists or cannot be written.
    pub fn write_new(&self, path: &Path, tree: &ReferenceTree) -> Result<(), ParseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        write_new(path, self.to_tsv(tree).as_bytes())?;
        Ok(())
    }

    /// Read a table written by [`RedTable::to_tsv`] for a tree of `node_count` nodes
    ///
    /// # Errors
    ///
    /// Returns `ParseError::InvalidFormat` for malformed lines, out-of-range
    /// node ids, or nodes without a value.
    pub fn from_tsv(text: &str, node_count: usize) -> Result<Self, ParseError> {
        let mut values: Vec<Option<f64>> = vec![None; node_count];
        for (line_num, fields) in data_rows(text, &["node"], 2)? {
            let id: usize = parse_number(fields[0], "node id", line_num)?;
            let red: f64 = parse_number(fields[1], "RED value", line_num)?;
            let slot = values.get_mut(id).ok_or_else(|| {
                ParseError::InvalidFormat(format!(
                    "Node {id} on line {line_num} is outside a tree of {node_count} nodes"
                ))
            })?;
            *slot = Some(red);
        }
        let values = values
            .into_iter()
            .enumerate()
            .map(|(i, v)| {
                v.ok_or_else(|| ParseError::InvalidFormat(format!("No RED value for node {i}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { values })
    }
}

struct RedTsv<'a> {
    table: &'a RedTable,
    tree: &'a ReferenceTree,
}

impl fmt::Display for RedTsv<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "node\tred\tname")?;
        for (id, red) in self.table.iter() {
            let name = if id.0 < self.tree.len() { self.tree.name(id).unwrap_or("") } else { "" };
            writeln!(f, "{id}\t{red}\t{name}")?;
        }
        Ok(())
    }
}
