//! Core data types produced by the results file parser.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Sub-key used when an output reports a single unnamed value.
pub const UNNAMED_SUB_KEY: &str = "";

/// Marker that matches every sub-key of an output name.
pub const WILDCARD_SUB_KEY: &str = "*";

/// Identifies one simulation run: the run label and the repeat index.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunKey {
    pub label: String,
    pub repeat: i64,
}

impl RunKey {
    pub fn new(label: impl Into<String>, repeat: i64) -> Self {
        Self {
            label: label.into(),
            repeat,
        }
    }
}

impl std::fmt::Display for RunKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (repeat {})", self.label, self.repeat)
    }
}

/// Sub-key -> value for a single simple output name
pub type OutputValues = BTreeMap<String, f64>;

/// Simple output name -> values
pub type ModuleOutputs = BTreeMap<String, OutputValues>;

/// Fully qualified module path -> outputs
pub type RunResults = BTreeMap<String, ModuleOutputs>;

/// All scalar results of one file, keyed by run.
pub type ResultTree = BTreeMap<RunKey, RunResults>;

/// Identifies one histogram block inside a module.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HistogramKey {
    pub name: String,
    pub min: i64,
    pub max: i64,
}

impl HistogramKey {
    pub fn new(name: impl Into<String>, min: i64, max: i64) -> Self {
        Self {
            name: name.into(),
            min,
            max,
        }
    }
}

/// Module path -> histogram key -> ordered bucket counts
pub type RunHistograms = BTreeMap<String, BTreeMap<HistogramKey, Vec<i64>>>;

/// All histograms of one file, keyed by run.
pub type HistogramTree = BTreeMap<RunKey, RunHistograms>;

/// Everything parsed from a single results file.
#[derive(Debug, Clone, Default)]
pub struct ParsedFile {
    pub path: PathBuf,
    /// Value of the `what:` line, if present
    pub configuration: Option<String>,
    /// Value of the `when:` line, if present
    pub timestamp: Option<String>,
    pub results: ResultTree,
    pub histograms: HistogramTree,
}

impl ParsedFile {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            ..Default::default()
        }
    }

    /// Total number of scalar values retained across all runs
    pub fn value_count(&self) -> usize {
        self.results
            .values()
            .flat_map(|modules| modules.values())
            .flat_map(|outputs| outputs.values())
            .map(|values| values.len())
            .sum()
    }
}

/// Sub-key half of a measure filter entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SubKeyPattern {
    Exact(String),
    Any,
}

impl SubKeyPattern {
    /// `"*"` becomes the wildcard, anything else an exact match
    pub fn parse(s: &str) -> Self {
        if s == WILDCARD_SUB_KEY {
            SubKeyPattern::Any
        } else {
            SubKeyPattern::Exact(s.to_string())
        }
    }

    pub fn matches(&self, sub_key: &str) -> bool {
        match self {
            SubKeyPattern::Exact(expected) => expected == sub_key,
            SubKeyPattern::Any => true,
        }
    }
}

/// Caller-supplied selection of which values the parser retains.
///
/// Values that do not match are still parsed (so malformed input is still
/// detected) but are not stored. Indexed outputs match on the output name
/// alone since their sub-keys are assigned dynamically per index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeasureFilter {
    /// `None` retains everything
    entries: Option<BTreeMap<String, BTreeSet<SubKeyPattern>>>,
}

impl MeasureFilter {
    /// Filter that keeps every value
    pub fn all() -> Self {
        Self { entries: None }
    }

    /// Filter built from (output name, sub-key pattern) pairs
    pub fn from_pairs<I, S, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, K)>,
        S: Into<String>,
        K: AsRef<str>,
    {
        let mut entries: BTreeMap<String, BTreeSet<SubKeyPattern>> = BTreeMap::new();
        for (output, sub_key) in pairs {
            entries
                .entry(output.into())
                .or_default()
                .insert(SubKeyPattern::parse(sub_key.as_ref()));
        }
        Self {
            entries: Some(entries),
        }
    }

    pub fn is_all(&self) -> bool {
        self.entries.is_none()
    }

    /// Decide whether a parsed value should be stored.
    pub fn retains(&self, output_name: &str, sub_key: &str, indexed: bool) -> bool {
        let Some(entries) = &self.entries else {
            return true;
        };
        match entries.get(output_name) {
            Some(_) if indexed => true,
            Some(patterns) => patterns.iter().any(|p| p.matches(sub_key)),
            None => false,
        }
    }
}
