//! Dimension inference rules.
//!
//! Each dimension that is read from label tags is described by one
//! [`TokenRule`]: which substrings identify its token, what to record when
//! no token or several tokens match, and whether that is fatal. Adding a
//! dimension means adding a rule to [`RULES`].

use std::collections::HashSet;

use super::error::AggregateError;
use super::label::Label;

/// Value recorded when a dimension cannot be determined
pub const UNKNOWN: &str = "Unknown";

/// Load distribution assumed when a label names none
pub const DEFAULT_LOAD_DISTRIBUTION: &str = "Uniform";

/// Load distribution that carries its batch probability in the descriptor
pub const COMPOUND_POISSON: &str = "CompPoisson";

/// Three-letter codes of the radiation measurement stations
pub const LOCATION_CODES: &[&str] = &[
    "BER", "BOU", "CAB", "CAM", "CLH", "COC", "GVN", "LER", "MAN", "NYA", "PAY", "PSU", "REG",
    "SBO", "SMS", "SXF", "TAM", "TAT", "TOR", "XIA",
];

/// Koppen climate classification per station code
pub const CLIMATE_BY_LOCATION: &[(&str, &str)] = &[
    ("BER", "Cfa"),
    ("BOU", "BSk"),
    ("CAB", "Cfb"),
    ("CAM", "Cfb"),
    ("CLH", "Cfb"),
    ("COC", "Af"),
    ("GVN", "EF"),
    ("LER", "Cfb"),
    ("MAN", "Af"),
    ("NYA", "ET"),
    ("PAY", "Cfb"),
    ("PSU", "BSk"),
    ("REG", "Dfb"),
    ("SBO", "BSh"),
    ("SMS", "Cfa"),
    ("SXF", "Dfa"),
    ("TAM", "BWh"),
    ("TAT", "Cfa"),
    ("TOR", "Dfb"),
    ("XIA", "Dwa"),
];

/// Routing protocol families; the matching tag is the protocol name
pub const PROTOCOL_FRAGMENTS: &[&str] = &["Ctp", "Mmbcr", "Static"];

/// Marker of the load distribution tag, e.g. `loadPoisson`
pub const LOAD_FRAGMENT: &str = "load";

/// Look up the climate classification of a location code
pub fn climate_for(location: &str) -> Option<&'static str> {
    CLIMATE_BY_LOCATION
        .iter()
        .find(|(code, _)| *code == location)
        .map(|(_, climate)| *climate)
}

/// Label-derived dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Location,
    Protocol,
    LoadDistribution,
}

impl Dimension {
    pub fn name(&self) -> &'static str {
        match self {
            Dimension::Location => "location",
            Dimension::Protocol => "protocol",
            Dimension::LoadDistribution => "load distribution",
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// What to do when a rule does not match exactly one token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ambiguity {
    /// Abort the aggregation run
    Fatal,
    /// Record the fallback value and warn
    Warn,
    /// Record the fallback value, warning only the first time in a run
    WarnOnce,
}

/// One dimension rule
#[derive(Debug, Clone, Copy)]
pub struct TokenRule {
    pub dimension: Dimension,
    /// A token matches if it contains any of these
    pub fragments: &'static [&'static str],
    pub fallback: &'static str,
    pub on_missing: Ambiguity,
    pub on_multiple: Ambiguity,
}

/// Station code tag; ambiguity is tolerated
pub const LOCATION_RULE: TokenRule = TokenRule {
    dimension: Dimension::Location,
    fragments: LOCATION_CODES,
    fallback: UNKNOWN,
    on_missing: Ambiguity::Warn,
    on_multiple: Ambiguity::Warn,
};

/// Protocol family tag, e.g. `CtpRicer`
pub const PROTOCOL_RULE: TokenRule = TokenRule {
    dimension: Dimension::Protocol,
    fragments: PROTOCOL_FRAGMENTS,
    fallback: UNKNOWN,
    on_missing: Ambiguity::Fatal,
    on_multiple: Ambiguity::Fatal,
};

/// Load distribution tag, e.g. `loadPoisson`
pub const LOAD_RULE: TokenRule = TokenRule {
    dimension: Dimension::LoadDistribution,
    fragments: &[LOAD_FRAGMENT],
    fallback: DEFAULT_LOAD_DISTRIBUTION,
    on_missing: Ambiguity::WarnOnce,
    on_multiple: Ambiguity::Fatal,
};

/// Rules in evaluation order
pub const RULES: &[TokenRule] = &[LOCATION_RULE, PROTOCOL_RULE, LOAD_RULE];

/// Find the rule for a dimension
pub fn rule_for(dimension: Dimension) -> &'static TokenRule {
    match dimension {
        Dimension::Location => &LOCATION_RULE,
        Dimension::Protocol => &PROTOCOL_RULE,
        Dimension::LoadDistribution => &LOAD_RULE,
    }
}

/// Result of evaluating a rule against a label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleMatch<'a> {
    /// Exactly one token matched
    Token(&'a str),
    /// The fallback value applies
    Fallback(&'static str),
}

/// Remembers which once-per-run warnings were already emitted
#[derive(Debug, Default)]
pub struct Warnings {
    emitted: HashSet<Dimension>,
}

impl Warnings {
    pub fn new() -> Self {
        Self::default()
    }

    fn emit(&mut self, policy: Ambiguity, dimension: Dimension, message: &str) {
        match policy {
            Ambiguity::Warn => log::warn!("{}", message),
            Ambiguity::WarnOnce => {
                if self.emitted.insert(dimension) {
                    log::warn!("{} (further warnings suppressed)", message);
                }
            }
            Ambiguity::Fatal => {}
        }
    }

    pub fn has_warned(&self, dimension: Dimension) -> bool {
        self.emitted.contains(&dimension)
    }
}

impl TokenRule {
    /// Evaluate the rule against a label
    pub fn evaluate<'a>(
        &self,
        label: &Label<'a>,
        warnings: &mut Warnings,
    ) -> Result<RuleMatch<'a>, AggregateError> {
        let found = label.tokens_containing(self.fragments);

        let policy = match found.len() {
            1 => return Ok(RuleMatch::Token(found[0])),
            0 => self.on_missing,
            _ => self.on_multiple,
        };

        if policy == Ambiguity::Fatal {
            return Err(AggregateError::AmbiguousDimension {
                dimension: self.dimension.name(),
                found: found.iter().map(|t| t.to_string()).collect(),
                label: label.raw().to_string(),
            });
        }

        let message = if found.is_empty() {
            format!(
                "No {} found in label {}, assuming {}",
                self.dimension,
                label.raw(),
                self.fallback
            )
        } else {
            format!(
                "Couldn't parse {} from {:?} in label {}, assuming {}",
                self.dimension,
                found,
                label.raw(),
                self.fallback
            )
        };
        warnings.emit(policy, self.dimension, &message);

        Ok(RuleMatch::Fallback(self.fallback))
    }
}
