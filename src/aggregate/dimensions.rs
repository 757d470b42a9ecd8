//! Deriving the dimension columns of a run from its label.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, TimeDelta};

use super::error::AggregateError;
use super::label::{Label, BATCH_P_PARAM, SOLAR_START_PARAM};
use super::rules::*;

/// Dimension values shared by every row of one run
#[derive(Debug, Clone, PartialEq)]
pub struct RunDimensions {
    pub location: String,
    pub climate: String,
    pub protocol: String,
    pub load_distribution: String,
    /// Unix timestamp of the solar start, or 0
    pub datetime: i64,
    /// 1-12, or 0 when there is no solar start
    pub month_number: u32,
    pub month_name: String,
    /// Swept parameters (trace file excluded), sorted by name
    pub parameters: BTreeMap<String, String>,
}

/// Resolves run labels into dimension values.
///
/// Holds the once-per-run warning state, so use one resolver per
/// aggregation run.
#[derive(Debug)]
pub struct DimensionResolver {
    base_year: i32,
    trace_data_dir: String,
    warnings: Warnings,
}

impl DimensionResolver {
    /// `trace_data_dir` is the directory name whose next path segment in a
    /// trace file path names the location, e.g. `PANGEA`
    pub fn new(base_year: i32, trace_data_dir: impl Into<String>) -> Self {
        Self {
            base_year,
            trace_data_dir: trace_data_dir.into(),
            warnings: Warnings::new(),
        }
    }

    pub fn base_year(&self) -> i32 {
        self.base_year
    }

    pub fn warnings(&self) -> &Warnings {
        &self.warnings
    }

    /// Resolve every dimension of a label
    pub fn resolve(&mut self, raw_label: &str) -> Result<RunDimensions, AggregateError> {
        let label = Label::parse(raw_label);

        let mut location = UNKNOWN.to_string();
        let mut protocol = UNKNOWN.to_string();
        let mut load_distribution = DEFAULT_LOAD_DISTRIBUTION.to_string();

        for rule in RULES {
            match rule.dimension {
                Dimension::Location => {
                    location = match self.location_from_trace_file(&label) {
                        Some(location) => location,
                        None => match rule.evaluate(&label, &mut self.warnings)? {
                            RuleMatch::Token(token) => token.to_string(),
                            RuleMatch::Fallback(value) => value.to_string(),
                        },
                    };
                }
                Dimension::Protocol => {
                    protocol = match rule.evaluate(&label, &mut self.warnings)? {
                        RuleMatch::Token(token) => token.to_string(),
                        RuleMatch::Fallback(value) => value.to_string(),
                    };
                }
                Dimension::LoadDistribution => {
                    load_distribution = match rule.evaluate(&label, &mut self.warnings)? {
                        RuleMatch::Token(token) => load_descriptor(token, &label)?,
                        RuleMatch::Fallback(value) => value.to_string(),
                    };
                }
            }
        }

        let climate = match climate_for(&location) {
            Some(climate) => climate.to_string(),
            None => {
                log::warn!("Couldn't find climate for location {}", location);
                UNKNOWN.to_string()
            }
        };

        let parameters = label.sweep_parameters();
        let (datetime, month_number, month_name) = match parameters.get(SOLAR_START_PARAM) {
            Some(value) => self.solar_start(value, raw_label)?,
            None => (0, 0, UNKNOWN.to_string()),
        };

        Ok(RunDimensions {
            location,
            climate,
            protocol,
            load_distribution,
            datetime,
            month_number,
            month_name,
            parameters,
        })
    }

    /// `traceFile=/data/PANGEA/Lerwick/Lerwick-Combined-1-Minute.csv` -> `Lerwick`
    fn location_from_trace_file(&self, label: &Label<'_>) -> Option<String> {
        let path = label.trace_file()?;
        let marker = format!("/{}/", self.trace_data_dir);
        let (_, rest) = path.split_once(marker.as_str())?;
        let location = rest.split('/').next()?;
        if location.is_empty() {
            None
        } else {
            Some(location.to_string())
        }
    }

    /// Solar start is a negative offset in seconds from 1 January of the base year
    fn solar_start(&self, value: &str, raw_label: &str) -> Result<(i64, u32, String), AggregateError> {
        let solar_start: i64 = value.trim().parse().map_err(|_| AggregateError::InvalidParameter {
            parameter: SOLAR_START_PARAM,
            value: value.to_string(),
            label: raw_label.to_string(),
        })?;
        let offset = solar_start.checked_neg().unwrap_or(i64::MAX);

        let invalid = || AggregateError::InvalidTimestamp {
            offset,
            year: self.base_year,
            label: raw_label.to_string(),
        };

        let start = NaiveDate::from_ymd_opt(self.base_year, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .ok_or_else(invalid)?
            .and_utc();
        let at = TimeDelta::try_seconds(offset)
            .and_then(|delta| start.checked_add_signed(delta))
            .ok_or_else(invalid)?;

        Ok((at.timestamp(), at.month(), at.format("%b").to_string()))
    }
}

/// `loadPoisson` -> `Poisson`; `loadCompPoisson` + `batchP=0.3` -> `CompPoisson 0.3`
fn load_descriptor(token: &str, label: &Label<'_>) -> Result<String, AggregateError> {
    let distribution = token.replace(LOAD_FRAGMENT, "");
    if distribution != COMPOUND_POISSON {
        return Ok(distribution);
    }

    let marker = format!("{}=", BATCH_P_PARAM);
    let found = label.tokens_containing(&[marker.as_str()]);
    match found.as_slice() {
        [batch] => {
            let value = batch.split_once('=').map(|(_, v)| v).unwrap_or_default();
            Ok(format!("{} {}", distribution, value))
        }
        _ => Err(AggregateError::MissingCompanionParameter {
            distribution,
            parameter: BATCH_P_PARAM,
            found: found.iter().map(|t| t.to_string()).collect(),
            label: label.raw().to_string(),
        }),
    }
}
