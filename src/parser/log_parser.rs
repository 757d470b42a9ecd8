//! Line-oriented state machine for Castalia results files.
//!
//! All state that carries from one line to the next lives in [`ParseContext`],
//! so a context can be driven with arbitrary synthetic lines in tests.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use super::error::ParseError;
use super::patterns::{classify, strip_sentinel, LogLine, SENTINEL};
use super::types::*;

/// Histogram header read so far, waiting for its values line
#[derive(Debug, Clone, Default)]
struct PendingHistogram {
    name: Option<String>,
    bounds: Option<(i64, i64)>,
}

/// Per-file parser state
#[derive(Debug)]
pub struct ParseContext<'f> {
    path: PathBuf,
    filter: &'f MeasureFilter,
    parsed: ParsedFile,
    run: Option<RunKey>,
    module: Option<String>,
    output_name: Option<String>,
    /// Set by an index header: the next value line keeps this sub-key
    pending_index: Option<String>,
    histogram: PendingHistogram,
    line_number: usize,
}

impl<'f> ParseContext<'f> {
    pub fn new(path: impl Into<PathBuf>, filter: &'f MeasureFilter) -> Self {
        let path = path.into();
        Self {
            parsed: ParsedFile::new(path.clone()),
            path,
            filter,
            run: None,
            module: None,
            output_name: None,
            pending_index: None,
            histogram: PendingHistogram::default(),
            line_number: 0,
        }
    }

    /// Feed one raw line (sentinel included, newline excluded).
    pub fn process_line(&mut self, raw: &str) -> Result<(), ParseError> {
        self.line_number += 1;
        let raw = raw.strip_suffix('\r').unwrap_or(raw);

        let content = strip_sentinel(raw).ok_or_else(|| ParseError::MissingSentinel {
            path: self.path.clone(),
            line_number: self.line_number,
            sentinel: SENTINEL,
            line: raw.to_string(),
        })?;

        let Some(line) = classify(content) else {
            return Err(ParseError::UnrecognisedLine {
                path: self.path.clone(),
                line_number: self.line_number,
                line: raw.to_string(),
            });
        };

        match line {
            LogLine::What(configuration) => {
                self.parsed.configuration = Some(configuration.to_string());
            }
            LogLine::When(timestamp) => {
                self.parsed.timestamp = Some(timestamp.to_string());
            }
            LogLine::Run { repeat, label } => {
                let repeat = strip_quotes(repeat);
                let repeat: i64 = repeat
                    .parse()
                    .map_err(|_| self.invalid_number("repeat", &repeat, raw))?;
                self.run = Some(RunKey::new(strip_quotes(label), repeat));
                self.reset_block_state();
            }
            LogLine::Module(module) => {
                self.module = Some(module.to_string());
                self.reset_block_state();
            }
            LogLine::OutputName(name) => {
                self.output_name = Some(name.to_string());
                self.pending_index = None;
            }
            LogLine::IndexedOutput { index, name } => {
                if index.parse::<i64>().is_err() {
                    return Err(self.invalid_number("output index", index, raw));
                }
                self.output_name = Some(name.to_string());
                self.pending_index = Some(index.to_string());
            }
            LogLine::Value { value, label } => {
                self.handle_value(value, label, raw)?;
            }
            LogLine::HistogramName(name) => {
                self.histogram = PendingHistogram {
                    name: Some(name.to_string()),
                    bounds: None,
                };
            }
            LogLine::HistogramBounds { min, max } => {
                if self.histogram.name.is_none() {
                    return Err(self.missing_context("histogram_min/histogram_max", "histogram name", raw));
                }
                let min: i64 = min
                    .parse()
                    .map_err(|_| self.invalid_number("histogram_min", min, raw))?;
                let max: i64 = max
                    .parse()
                    .map_err(|_| self.invalid_number("histogram_max", max, raw))?;
                self.histogram.bounds = Some((min, max));
            }
            LogLine::HistogramValues(tokens) => {
                self.handle_histogram_values(&tokens, raw)?;
            }
        }

        Ok(())
    }

    fn handle_value(&mut self, token: &str, label: Option<&str>, raw: &str) -> Result<(), ParseError> {
        // f64 parsing handles exponent format such as 4.78319e+06
        let value: f64 = token
            .parse()
            .map_err(|_| self.invalid_number("value", token, raw))?;

        let run = self.require_run("value line", raw)?;
        let module = self.require_module("value line", raw)?;
        let output_name = self
            .output_name
            .clone()
            .ok_or_else(|| self.missing_context("value line", "simple output name", raw))?;

        // An index header fixes the sub-key for exactly one value line
        let indexed = self.pending_index.is_some();
        let sub_key = match self.pending_index.take() {
            Some(index) => index,
            None => label.unwrap_or(UNNAMED_SUB_KEY).to_string(),
        };

        if self.filter.retains(&output_name, &sub_key, indexed) {
            self.parsed
                .results
                .entry(run)
                .or_default()
                .entry(module)
                .or_default()
                .entry(output_name)
                .or_default()
                .insert(sub_key, value);
        }

        Ok(())
    }

    fn handle_histogram_values(&mut self, tokens: &[&str], raw: &str) -> Result<(), ParseError> {
        let run = self.require_run("histogram_values", raw)?;
        let module = self.require_module("histogram_values", raw)?;

        // The header is consumed by this line; a second values line needs a new one
        let pending = std::mem::take(&mut self.histogram);
        let name = pending
            .name
            .ok_or_else(|| self.missing_context("histogram_values", "histogram name", raw))?;
        let (min, max) = pending
            .bounds
            .ok_or_else(|| self.missing_context("histogram_values", "histogram_min/histogram_max", raw))?;

        let mut counts = Vec::with_capacity(tokens.len());
        for token in tokens {
            let count: i64 = token
                .parse()
                .map_err(|_| self.invalid_number("histogram value", token, raw))?;
            counts.push(count);
        }

        // Duplicate keys within a module keep the last block read
        self.parsed
            .histograms
            .entry(run)
            .or_default()
            .entry(module)
            .or_default()
            .insert(HistogramKey::new(name, min, max), counts);

        Ok(())
    }

    /// A new run or module ends any half-read index or histogram header
    fn reset_block_state(&mut self) {
        self.output_name = None;
        self.pending_index = None;
        self.histogram = PendingHistogram::default();
    }

    fn require_run(&self, what: &'static str, raw: &str) -> Result<RunKey, ParseError> {
        self.run
            .clone()
            .ok_or_else(|| self.missing_context(what, "repeat/label", raw))
    }

    fn require_module(&self, what: &'static str, raw: &str) -> Result<String, ParseError> {
        self.module
            .clone()
            .ok_or_else(|| self.missing_context(what, "module", raw))
    }

    fn invalid_number(&self, what: &'static str, token: &str, raw: &str) -> ParseError {
        ParseError::InvalidNumber {
            path: self.path.clone(),
            line_number: self.line_number,
            what,
            token: token.to_string(),
            line: raw.to_string(),
        }
    }

    fn missing_context(&self, what: &'static str, missing: &'static str, raw: &str) -> ParseError {
        ParseError::MissingContext {
            path: self.path.clone(),
            line_number: self.line_number,
            what,
            missing,
            line: raw.to_string(),
        }
    }

    /// Finish the file and hand back everything parsed
    pub fn finish(self) -> ParsedFile {
        self.parsed
    }
}

fn strip_quotes(s: &str) -> String {
    s.replace('"', "")
}

/// Parse results text that was already read into memory.
pub fn parse_str(path: impl Into<PathBuf>, text: &str, filter: &MeasureFilter) -> Result<ParsedFile, ParseError> {
    let mut ctx = ParseContext::new(path, filter);
    for line in text.lines() {
        ctx.process_line(line)?;
    }
    Ok(ctx.finish())
}

/// Parse a single results file
pub fn parse_results_file(path: &Path, filter: &MeasureFilter) -> Result<ParsedFile, ParseError> {
    let io_error = |source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(io_error)?;
    let reader = BufReader::with_capacity(64 * 1024, file);

    let mut ctx = ParseContext::new(path, filter);
    for line_result in reader.lines() {
        let line = line_result.map_err(io_error)?;
        ctx.process_line(&line)?;
    }

    let parsed = ctx.finish();
    log::debug!(
        "Parsed {}: {} runs, {} values",
        path.display(),
        parsed.results.len(),
        parsed.value_count()
    );
    Ok(parsed)
}
