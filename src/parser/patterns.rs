//! Line patterns of the Castalia results file format.
//!
//! Every line starts with [`SENTINEL`]. After it, the number of leading tabs
//! tells what kind of line it is:
//!
//! ```text
//! Castalia| what:Lerwick1Min
//! Castalia| when:2017-12-31 14:59
//! Castalia| repeat:0 label:"CtpRicer,General,cellSize=2"
//! Castalia|	module:SN.node[3].Communication.MAC
//! Castalia|		simple output name:Energy breakdown
//! Castalia|			1.08e+07 Initial
//! Castalia|		 index:1 simple output name:Application Received From
//! Castalia|			9
//! Castalia|		histogram name:LinkEstimator LQ
//! Castalia|		histogram_min:1 histogram_max:10
//! Castalia|		histogram_values 2430 4 0 0 1 0 0 0 0 0 0
//! ```

use std::sync::LazyLock;

use regex::Regex;

/// Literal prefix (including the pipe) of every results line
pub const SENTINEL: &str = "Castalia|";

/// Compiled regex patterns, in the order they are tried
pub struct LinePatterns {
    /// Match: " what:<configuration>"
    pub what: Regex,
    /// Match: " when:<timestamp>"
    pub when: Regex,
    /// Match: " repeat:<n> label:<label...>"
    pub run: Regex,
    /// Match: "\tmodule:<path>"
    pub module: Regex,
    /// Match: "\t\tsimple output name:<name>"
    pub output_name: Regex,
    /// Match: "\t\t index:<i> simple output name:<name>"
    pub indexed_output: Regex,
    /// Match: "\t\t\t<value>[ <label>]"
    pub value: Regex,
    /// Match: "\t\thistogram name:<name>"
    pub histogram_name: Regex,
    /// Match: "\t\thistogram_min:<min> histogram_max:<max>"
    pub histogram_bounds: Regex,
    /// Match: "\t\thistogram_values <v1> <v2> ..."
    pub histogram_values: Regex,
}

impl LinePatterns {
    pub fn new() -> Self {
        Self {
            what: Regex::new(r"^ *what:(.*)$").expect("Invalid what regex"),
            when: Regex::new(r"^ *when:(.*)$").expect("Invalid when regex"),
            run: Regex::new(r"^ *repeat:(\S+)\s+label:(.*)$").expect("Invalid run regex"),
            module: Regex::new(r"^\tmodule:(\S+)").expect("Invalid module regex"),
            output_name: Regex::new(r"^\t\tsimple output name:(.*)$")
                .expect("Invalid output_name regex"),
            indexed_output: Regex::new(r"^\t\t index:(\S+)\s+simple output name:(.*)$")
                .expect("Invalid indexed_output regex"),
            value: Regex::new(r"^\t\t\t(.*)$").expect("Invalid value regex"),
            histogram_name: Regex::new(r"^\t\thistogram name:(.*)$")
                .expect("Invalid histogram_name regex"),
            histogram_bounds: Regex::new(r"^\t\thistogram_min:(\S+)\s+histogram_max:(\S+)")
                .expect("Invalid histogram_bounds regex"),
            histogram_values: Regex::new(r"^\t\thistogram_values(.*)$")
                .expect("Invalid histogram_values regex"),
        }
    }
}

impl Default for LinePatterns {
    fn default() -> Self {
        Self::new()
    }
}

/// Global patterns instance
pub static PATTERNS: LazyLock<LinePatterns> = LazyLock::new(LinePatterns::new);

/// One classified line, borrowing its fields from the source text.
///
/// Numeric fields are left as raw tokens; the parser converts them so it can
/// report the file and line number on failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogLine<'a> {
    What(&'a str),
    When(&'a str),
    Run { repeat: &'a str, label: &'a str },
    Module(&'a str),
    OutputName(&'a str),
    IndexedOutput { index: &'a str, name: &'a str },
    /// Raw value token and the optional free-text label after the first space
    Value { value: &'a str, label: Option<&'a str> },
    HistogramName(&'a str),
    HistogramBounds { min: &'a str, max: &'a str },
    HistogramValues(Vec<&'a str>),
}

/// Strip the sentinel, keeping all whitespace after it.
pub fn strip_sentinel(line: &str) -> Option<&str> {
    line.strip_prefix(SENTINEL)
}

/// Classify a sentinel-stripped line. `None` means no pattern matched.
pub fn classify(content: &str) -> Option<LogLine<'_>> {
    let p = &*PATTERNS;

    if let Some(caps) = p.what.captures(content) {
        return Some(LogLine::What(caps.get(1)?.as_str().trim()));
    }
    if let Some(caps) = p.when.captures(content) {
        return Some(LogLine::When(caps.get(1)?.as_str().trim()));
    }
    if let Some(caps) = p.run.captures(content) {
        return Some(LogLine::Run {
            repeat: caps.get(1)?.as_str(),
            label: caps.get(2)?.as_str().trim(),
        });
    }
    if let Some(caps) = p.module.captures(content) {
        return Some(LogLine::Module(caps.get(1)?.as_str()));
    }
    if let Some(caps) = p.output_name.captures(content) {
        return Some(LogLine::OutputName(caps.get(1)?.as_str().trim()));
    }
    if let Some(caps) = p.indexed_output.captures(content) {
        return Some(LogLine::IndexedOutput {
            index: caps.get(1)?.as_str(),
            name: caps.get(2)?.as_str().trim(),
        });
    }
    if let Some(caps) = p.value.captures(content) {
        // "139.5" or "42 Node switched off": split on the first space only
        let body = caps.get(1)?.as_str().trim();
        let (value, label) = match body.split_once(' ') {
            Some((value, label)) => (value, Some(label)),
            None => (body, None),
        };
        return Some(LogLine::Value { value, label });
    }
    if let Some(caps) = p.histogram_name.captures(content) {
        return Some(LogLine::HistogramName(caps.get(1)?.as_str().trim()));
    }
    if let Some(caps) = p.histogram_bounds.captures(content) {
        return Some(LogLine::HistogramBounds {
            min: caps.get(1)?.as_str(),
            max: caps.get(2)?.as_str(),
        });
    }
    if let Some(caps) = p.histogram_values.captures(content) {
        return Some(LogLine::HistogramValues(
            caps.get(1)?.as_str().split_whitespace().collect(),
        ));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_sentinel_keeps_tabs() {
        assert_eq!(strip_sentinel("Castalia|\t\t\t42"), Some("\t\t\t42"));
        assert_eq!(strip_sentinel("Omnet|\t\t\t42"), None);
    }

    #[test]
    fn test_classify_header_lines() {
        assert_eq!(classify(" what:[Lerwick1Min]"), Some(LogLine::What("[Lerwick1Min]")));
        assert_eq!(classify(" when:2017-12-31 14:59"), Some(LogLine::When("2017-12-31 14:59")));
        assert_eq!(
            classify("\tmodule:SN.node[0].ResourceManager"),
            Some(LogLine::Module("SN.node[0].ResourceManager"))
        );
    }

    #[test]
    fn test_classify_run_label_keeps_punctuation() {
        let line = " repeat:\"2\" label:\"CtpRicer,traceFile=/data/PANGEA/Lerwick/x.csv,note=a:b\"";
        assert_eq!(
            classify(line),
            Some(LogLine::Run {
                repeat: "\"2\"",
                label: "\"CtpRicer,traceFile=/data/PANGEA/Lerwick/x.csv,note=a:b\"",
            })
        );
    }

    #[test]
    fn test_classify_value_lines() {
        assert_eq!(
            classify("\t\t\t4.78319e+06"),
            Some(LogLine::Value { value: "4.78319e+06", label: None })
        );
        assert_eq!(
            classify("\t\t\t42 Node switched off"),
            Some(LogLine::Value { value: "42", label: Some("Node switched off") })
        );
    }

    #[test]
    fn test_classify_indexed_output() {
        assert_eq!(
            classify("\t\t index:1 simple output name:Application Received From"),
            Some(LogLine::IndexedOutput { index: "1", name: "Application Received From" })
        );
    }

    #[test]
    fn test_classify_histogram_lines() {
        assert_eq!(
            classify("\t\thistogram name:LinkEstimator LQ"),
            Some(LogLine::HistogramName("LinkEstimator LQ"))
        );
        assert_eq!(
            classify("\t\thistogram_min:1 histogram_max:10"),
            Some(LogLine::HistogramBounds { min: "1", max: "10" })
        );
        assert_eq!(
            classify("\t\thistogram_values 2430 4 0"),
            Some(LogLine::HistogramValues(vec!["2430", "4", "0"]))
        );
    }

    #[test]
    fn test_classify_unknown() {
        assert_eq!(classify("garbage"), None);
        assert_eq!(classify("\t\tsomething else:1"), None);
    }
}
