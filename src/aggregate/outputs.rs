//! Inventory of the output names present in a results folder.
//!
//! Used to find out which `(simple output name, sub-key)` pairs a set of
//! simulations produced before choosing the measures to load.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::path::Path;

use serde::Serialize;

use super::module_path::short_name;
use crate::parser::{HistogramKey, MeasureFilter, ParseError, ParsedFile, ResultFiles};

/// One distinct output name and sub-key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputEntry {
    #[serde(rename = "simpleOutputName")]
    pub simple_output_name: String,
    #[serde(rename = "indexedOutputName")]
    pub sub_key: String,
    /// Short names of the modules reporting it
    pub modules: BTreeSet<String>,
}

/// One distinct histogram name and range
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistogramEntry {
    pub name: String,
    pub min: i64,
    pub max: i64,
    pub modules: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryReport {
    pub files: usize,
    pub outputs: Vec<OutputEntry>,
    pub histograms: Vec<HistogramEntry>,
}

/// Accumulates distinct output names over any number of parsed files
#[derive(Debug, Clone, Default)]
pub struct OutputInventory {
    files: usize,
    outputs: BTreeMap<(String, String), BTreeSet<String>>,
    histograms: BTreeMap<HistogramKey, BTreeSet<String>>,
}

impl OutputInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, parsed: &ParsedFile) {
        self.files += 1;

        for modules in parsed.results.values() {
            for (module, outputs) in modules {
                for (name, values) in outputs {
                    for sub_key in values.keys() {
                        self.outputs
                            .entry((name.clone(), sub_key.clone()))
                            .or_default()
                            .insert(short_name(module).to_string());
                    }
                }
            }
        }

        for modules in parsed.histograms.values() {
            for (module, histograms) in modules {
                for key in histograms.keys() {
                    self.histograms
                        .entry(key.clone())
                        .or_default()
                        .insert(short_name(module).to_string());
                }
            }
        }
    }

    pub fn files(&self) -> usize {
        self.files
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty() && self.histograms.is_empty()
    }

    /// Distinct pairs sorted by output name, then sub-key
    pub fn outputs(&self) -> Vec<OutputEntry> {
        self.outputs
            .iter()
            .map(|((name, sub_key), modules)| OutputEntry {
                simple_output_name: name.clone(),
                sub_key: sub_key.clone(),
                modules: modules.clone(),
            })
            .collect()
    }

    pub fn histograms(&self) -> Vec<HistogramEntry> {
        self.histograms
            .iter()
            .map(|(key, modules)| HistogramEntry {
                name: key.name.clone(),
                min: key.min,
                max: key.max,
                modules: modules.clone(),
            })
            .collect()
    }

    pub fn report(&self) -> InventoryReport {
        InventoryReport {
            files: self.files,
            outputs: self.outputs(),
            histograms: self.histograms(),
        }
    }

    /// Plain text listing, one `name|sub-key` per line
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== Outputs ({} files) ===", self.files);
        for ((name, sub_key), modules) in &self.outputs {
            let modules: Vec<&str> = modules.iter().map(String::as_str).collect();
            let _ = writeln!(out, "{}|{}  [{}]", name, sub_key, modules.join(", "));
        }

        if !self.histograms.is_empty() {
            let _ = writeln!(out, "\n=== Histograms ===");
            for (key, modules) in &self.histograms {
                let modules: Vec<&str> = modules.iter().map(String::as_str).collect();
                let _ = writeln!(
                    out,
                    "{} [{}, {}]  [{}]",
                    key.name,
                    key.min,
                    key.max,
                    modules.join(", ")
                );
            }
        }
        out
    }
}

/// Parse every results file under `infolder`, retaining all values, and
/// collect the distinct output names.
pub fn collect_outputs(infolder: &Path, filename: &str) -> Result<OutputInventory, ParseError> {
    let filter = MeasureFilter::all();
    let mut inventory = OutputInventory::new();
    for parsed in ResultFiles::open(infolder, filename, &filter)? {
        inventory.add_file(&parsed?);
    }
    log::info!(
        "Found {} distinct outputs and {} histograms in {} files",
        inventory.outputs.len(),
        inventory.histograms.len(),
        inventory.files
    );
    Ok(inventory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_str;

    const SAMPLE: &str = "Castalia| repeat:0 label:\"CtpRicer,cellSize=2\"\n\
        Castalia|\tmodule:SN.node[0].Communication.MAC\n\
        Castalia|\t\tsimple output name:Packets dropped\n\
        Castalia|\t\t\t3\n\
        Castalia|\tmodule:SN.node[1].ResourceManager\n\
        Castalia|\t\tsimple output name:Energy breakdown\n\
        Castalia|\t\t\t5 Harvested\n\
        Castalia|\t\t\t7 Initial\n\
        Castalia|\t\thistogram name:Latency\n\
        Castalia|\t\thistogram_min:0 histogram_max:200\n\
        Castalia|\t\thistogram_values 1 2 3\n";

    fn inventory() -> OutputInventory {
        let parsed = parse_str("results.txt", SAMPLE, &MeasureFilter::all()).unwrap();
        let mut inventory = OutputInventory::new();
        inventory.add_file(&parsed);
        inventory
    }

    #[test]
    fn test_distinct_outputs_sorted() {
        let outputs = inventory().outputs();
        let pairs: Vec<(&str, &str)> = outputs
            .iter()
            .map(|e| (e.simple_output_name.as_str(), e.sub_key.as_str()))
            .collect();

        assert_eq!(
            pairs,
            vec![
                ("Energy breakdown", "Harvested"),
                ("Energy breakdown", "Initial"),
                ("Packets dropped", ""),
            ]
        );
        assert!(outputs[2].modules.contains("MAC"));
    }

    #[test]
    fn test_histograms_listed() {
        let histograms = inventory().histograms();
        assert_eq!(histograms.len(), 1);
        assert_eq!(histograms[0].name, "Latency");
        assert_eq!(histograms[0].max, 200);
        assert!(histograms[0].modules.contains("ResourceManager"));
    }

    #[test]
    fn test_same_output_across_files_counted_once() {
        let mut inventory = inventory();
        let parsed = parse_str("other.txt", SAMPLE, &MeasureFilter::all()).unwrap();
        inventory.add_file(&parsed);

        assert_eq!(inventory.files(), 2);
        assert_eq!(inventory.outputs().len(), 3);
    }

    #[test]
    fn test_render_text() {
        let text = inventory().render_text();
        assert!(text.contains("Energy breakdown|Harvested  [ResourceManager]"));
        assert!(text.contains("Latency [0, 200]"));
    }

    #[test]
    fn test_report_serializes() {
        let json = serde_json::to_value(inventory().report()).unwrap();
        assert_eq!(json["files"], 1);
        assert_eq!(json["outputs"][0]["simpleOutputName"], "Energy breakdown");
    }
}
