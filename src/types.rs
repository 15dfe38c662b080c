use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::errors::BenchError;

/// One scheduling mode of the program under test.
///
/// `id` is the positional argument passed before the thread count. A mode
/// without an id is the single-mode case: only the thread count is passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModeSpec {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    /// Restricts this mode to a subset of thread counts (e.g. a serial baseline).
    #[serde(default)]
    pub threads: Option<Vec<u32>>,
}

impl ModeSpec {
    pub fn single(name: impl Into<String>) -> Self {
        ModeSpec {
            id: None,
            name: name.into(),
            threads: None,
        }
    }

    pub fn with_id(id: impl Into<String>, name: impl Into<String>) -> Self {
        ModeSpec {
            id: Some(id.into()),
            name: name.into(),
            threads: None,
        }
    }
}

/// Parses `ID=NAME`, or a bare `NAME` that doubles as its own id.
impl FromStr for ModeSpec {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BenchError::InvalidMode {
            spec: s.to_string(),
        };
        match s.split_once('=') {
            Some((id, name)) => {
                let (id, name) = (id.trim(), name.trim());
                if id.is_empty() || name.is_empty() {
                    return Err(invalid());
                }
                Ok(ModeSpec::with_id(id, name))
            }
            None => {
                let name = s.trim();
                if name.is_empty() {
                    return Err(invalid());
                }
                Ok(ModeSpec::with_id(name, name))
            }
        }
    }
}

/// A (mode, thread count) combination under benchmark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellId {
    pub mode: String,
    pub threads: u32,
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} with {} threads", self.mode, self.threads)
    }
}

/// Averaged timing per mode name, then per thread count, in milliseconds.
///
/// A cell with no surviving samples is absent, never zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultMatrix {
    modes: BTreeMap<String, BTreeMap<u32, u64>>,
}

impl ResultMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure `mode` shows up in the output even if none of its cells do.
    pub fn ensure_mode(&mut self, mode: &str) {
        self.modes.entry(mode.to_string()).or_default();
    }

    /// Store a cell value. Returns `false` and leaves the matrix untouched if
    /// the cell was already written.
    pub fn record(&mut self, mode: &str, threads: u32, millis: u64) -> bool {
        match self.modes.entry(mode.to_string()).or_default().entry(threads) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(millis);
                true
            }
        }
    }

    pub fn get(&self, mode: &str, threads: u32) -> Option<u64> {
        self.modes.get(mode)?.get(&threads).copied()
    }

    pub fn mode(&self, mode: &str) -> Option<&BTreeMap<u32, u64>> {
        self.modes.get(mode)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeMap<u32, u64>)> {
        self.modes.iter()
    }

    /// Every thread count that has a value in at least one mode, ascending.
    pub fn thread_counts(&self) -> Vec<u32> {
        let mut counts: Vec<u32> = self
            .modes
            .values()
            .flat_map(|cells| cells.keys().copied())
            .collect();
        counts.sort_unstable();
        counts.dedup();
        counts
    }

    pub fn cell_count(&self) -> usize {
        self.modes.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.cell_count() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Table,
    Markdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_spec_with_id() {
        let mode: ModeSpec = "3=static_10".parse().unwrap();
        assert_eq!(mode, ModeSpec::with_id("3", "static_10"));
    }

    #[test]
    fn mode_spec_bare_name_is_its_own_id() {
        let mode: ModeSpec = "pc_dynamic".parse().unwrap();
        assert_eq!(mode.id.as_deref(), Some("pc_dynamic"));
        assert_eq!(mode.name, "pc_dynamic");
    }

    #[test]
    fn mode_spec_rejects_empty_parts() {
        assert!("=name".parse::<ModeSpec>().is_err());
        assert!("1=".parse::<ModeSpec>().is_err());
        assert!("  ".parse::<ModeSpec>().is_err());
    }

    #[test]
    fn cell_id_display() {
        let cell = CellId {
            mode: "dynamic_default".to_string(),
            threads: 8,
        };
        assert_eq!(cell.to_string(), "dynamic_default with 8 threads");
    }

    #[test]
    fn record_is_write_once() {
        let mut matrix = ResultMatrix::new();
        assert!(matrix.record("static", 4, 120));
        assert!(!matrix.record("static", 4, 999));
        assert_eq!(matrix.get("static", 4), Some(120));
    }

    #[test]
    fn ensure_mode_adds_empty_mode() {
        let mut matrix = ResultMatrix::new();
        matrix.ensure_mode("dynamic");
        assert!(matrix.mode("dynamic").unwrap().is_empty());
        assert!(matrix.is_empty());
        assert_eq!(matrix.get("dynamic", 1), None);
    }

    #[test]
    fn thread_counts_are_sorted_and_deduplicated() {
        let mut matrix = ResultMatrix::new();
        matrix.record("a", 16, 1);
        matrix.record("a", 2, 1);
        matrix.record("b", 2, 1);
        matrix.record("b", 8, 1);
        assert_eq!(matrix.thread_counts(), vec![2, 8, 16]);
        assert_eq!(matrix.cell_count(), 4);
    }
}
