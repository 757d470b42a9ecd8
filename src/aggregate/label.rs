//! Run label tokenization.
//!
//! Labels look like
//! `CtpRicer,General,varyLocation,traceFile=/data/PANGEA/Lerwick/Lerwick-Combined-1-Minute.csv,cellSize=2,capSize=40`:
//! free-form tags mixed with `name=value` sweep parameters.

use std::collections::BTreeMap;

/// Parameter holding the solar radiation trace path; consumed by location parsing
pub const TRACE_FILE_PARAM: &str = "traceFile";

/// Parameter holding the solar start offset in (negative) seconds
pub const SOLAR_START_PARAM: &str = "solarStart";

/// Parameter appended to compound Poisson load descriptors
pub const BATCH_P_PARAM: &str = "batchP";

/// A label split on commas
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label<'a> {
    raw: &'a str,
    tokens: Vec<&'a str>,
}

impl<'a> Label<'a> {
    pub fn parse(raw: &'a str) -> Self {
        Self {
            raw,
            tokens: raw.split(',').collect(),
        }
    }

    pub fn raw(&self) -> &'a str {
        self.raw
    }

    pub fn tokens(&self) -> &[&'a str] {
        &self.tokens
    }

    /// Tokens containing any of the fragments, in label order
    pub fn tokens_containing(&self, fragments: &[&str]) -> Vec<&'a str> {
        self.tokens
            .iter()
            .copied()
            .filter(|t| fragments.iter().any(|f| t.contains(f)))
            .collect()
    }

    /// Every `name=value` token as (name, value), split at the first `=`
    pub fn assignments(&self) -> impl Iterator<Item = (&'a str, &'a str)> + '_ {
        self.tokens.iter().copied().filter_map(|t| t.split_once('='))
    }

    /// Value of the trace file token, if any
    pub fn trace_file(&self) -> Option<&'a str> {
        self.assignments()
            .find(|(name, _)| *name == TRACE_FILE_PARAM)
            .map(|(_, value)| value)
    }

    /// Swept parameters, excluding the trace file, sorted by name.
    ///
    /// Values are kept verbatim; a repeated name keeps its last value.
    pub fn sweep_parameters(&self) -> BTreeMap<String, String> {
        self.assignments()
            .filter(|(name, _)| *name != TRACE_FILE_PARAM)
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect()
    }

    /// Parameter names, including the trace file, as found in the label
    pub fn parameter_names(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.assignments().map(|(name, _)| name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LABEL: &str = "CtpRicer,General,varyLocation,traceFile=/data/PANGEA/Lerwick/Lerwick-Combined-1-Minute.csv,cellSize=2,capSize=40,solarStart=-2707200";

    #[test]
    fn test_tokens_and_assignments() {
        let label = Label::parse(LABEL);
        assert_eq!(label.tokens().len(), 7);
        assert_eq!(label.tokens_containing(&["Ctp", "Mmbcr"]), vec!["CtpRicer"]);
        assert_eq!(
            label.trace_file(),
            Some("/data/PANGEA/Lerwick/Lerwick-Combined-1-Minute.csv")
        );
    }

    #[test]
    fn test_sweep_parameters_exclude_trace_file() {
        let params = Label::parse(LABEL).sweep_parameters();
        let names: Vec<&str> = params.keys().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["capSize", "cellSize", "solarStart"]);
        assert_eq!(params["solarStart"], "-2707200");
    }

    #[test]
    fn test_value_may_contain_equals() {
        let params = Label::parse("StaticBox,expr=a=b").sweep_parameters();
        assert_eq!(params["expr"], "a=b");
    }
}
