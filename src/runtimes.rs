//! Run-time summary over simulator `castalia.log` files.
//!
//! The simulator logs one line per finished run:
//!
//! ```text
//! 2018-04-24 12:18:13: Run ID 452 label "CtpRicer,General,..." rep "0" complete in 0:01:11
//! ```
//!
//! Runs are grouped by selected label tokens and the total, shortest, mean
//! and longest durations reported per group.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{NaiveTime, Timelike};
use rayon::prelude::*;
use serde::Serialize;

use crate::parser::{find_results_files, ParseError};

/// File name written by the simulator for each run batch
pub const RUN_LOG_FILE: &str = "castalia.log";

/// Label token positions grouped on by default: protocol and two sweep values
pub const DEFAULT_GROUP_POSITIONS: &[usize] = &[0, 7, 8];

const COMPLETE_MARKER: &str = "complete in";

#[derive(Debug, thiserror::Error)]
pub enum RuntimeLogError {
    #[error(transparent)]
    Discovery(#[from] ParseError),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line_number}: no label in completion line: {line}")]
    MissingLabel {
        path: PathBuf,
        line_number: usize,
        line: String,
    },

    #[error("{path}:{line_number}: malformed run time {token:?}, expected H:MM:SS")]
    InvalidDuration {
        path: PathBuf,
        line_number: usize,
        token: String,
    },

    #[error("Label {label} has no token at position {position}")]
    MissingLabelToken { label: String, position: usize },
}

/// One completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTime {
    pub label: String,
    pub duration: Duration,
}

/// Durations of one group of runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuntimeSummary {
    pub key: Vec<String>,
    pub runs: usize,
    #[serde(serialize_with = "serialize_hms")]
    pub total: Duration,
    #[serde(serialize_with = "serialize_hms")]
    pub min: Duration,
    #[serde(serialize_with = "serialize_hms")]
    pub mean: Duration,
    #[serde(serialize_with = "serialize_hms")]
    pub max: Duration,
}

fn serialize_hms<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format_hms(*d))
}

/// Parse `H:MM:SS` as logged by the simulator. Hours must be below 24.
pub fn parse_hms(token: &str) -> Option<Duration> {
    let time = NaiveTime::parse_from_str(token.trim(), "%H:%M:%S").ok()?;
    Some(Duration::from_secs(u64::from(time.num_seconds_from_midnight())))
}

/// Format as `H:MM:SS`, truncating sub-second parts
pub fn format_hms(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

/// Extract the run from one log line, if it is a completion line
pub fn parse_line(path: &Path, line_number: usize, line: &str) -> Result<Option<RunTime>, RuntimeLogError> {
    if !line.contains(COMPLETE_MARKER) {
        return Ok(None);
    }

    let unquoted = line.replace('"', "");
    let tokens: Vec<&str> = unquoted.split_whitespace().collect();

    let label = tokens
        .iter()
        .position(|t| *t == "label")
        .and_then(|i| tokens.get(i + 1))
        .ok_or_else(|| RuntimeLogError::MissingLabel {
            path: path.to_path_buf(),
            line_number,
            line: line.trim_end().to_string(),
        })?;

    let last = tokens.last().copied().unwrap_or_default();
    let duration = parse_hms(last).ok_or_else(|| RuntimeLogError::InvalidDuration {
        path: path.to_path_buf(),
        line_number,
        token: last.to_string(),
    })?;

    Ok(Some(RunTime {
        label: label.to_string(),
        duration,
    }))
}

/// Parse every completion line of one log file
pub fn parse_run_log(path: &Path) -> Result<Vec<RunTime>, RuntimeLogError> {
    let io_err = |source| RuntimeLogError::Io {
        path: path.to_path_buf(),
        source,
    };
    let reader = BufReader::new(File::open(path).map_err(io_err)?);

    let mut runs = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(io_err)?;
        if let Some(run) = parse_line(path, idx + 1, &line)? {
            runs.push(run);
        }
    }
    Ok(runs)
}

/// Group runs by the label tokens at `positions` and summarise each group
pub fn summarise(runs: &[RunTime], positions: &[usize]) -> Result<Vec<RuntimeSummary>, RuntimeLogError> {
    let mut groups: BTreeMap<Vec<String>, Vec<Duration>> = BTreeMap::new();

    for run in runs {
        let tokens: Vec<&str> = run.label.split(',').collect();
        let key = positions
            .iter()
            .map(|&position| {
                tokens
                    .get(position)
                    .map(|t| t.to_string())
                    .ok_or_else(|| RuntimeLogError::MissingLabelToken {
                        label: run.label.clone(),
                        position,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        groups.entry(key).or_default().push(run.duration);
    }

    Ok(groups
        .into_iter()
        .filter_map(|(key, durations)| {
            let total: Duration = durations.iter().sum();
            let min = *durations.iter().min()?;
            let max = *durations.iter().max()?;
            let mean = total / durations.len() as u32;
            Some(RuntimeSummary {
                key,
                runs: durations.len(),
                total,
                min,
                mean,
                max,
            })
        })
        .collect())
}

/// Find every `castalia.log` under `root`, parse them in parallel and summarise
pub fn analyse_run_times(root: &Path, positions: &[usize]) -> Result<Vec<RuntimeSummary>, RuntimeLogError> {
    let paths = find_results_files(root, RUN_LOG_FILE)?;
    log::info!("Parsing {} run logs in parallel...", paths.len());

    let per_file: Vec<Vec<RunTime>> = paths
        .par_iter()
        .map(|path| {
            let runs = parse_run_log(path)?;
            log::debug!("Parsed {}: {} completed runs", path.display(), runs.len());
            Ok(runs)
        })
        .collect::<Result<Vec<_>, RuntimeLogError>>()?;

    let runs: Vec<RunTime> = per_file.into_iter().flatten().collect();
    log::info!("Found {} completed runs", runs.len());

    summarise(&runs, positions)
}

/// Plain text table of the summaries
pub fn render_table(summaries: &[RuntimeSummary]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<40} {:>5} {:>10} {:>9} {:>9} {:>9}", "labels", "runs", "sum", "min", "avg", "max");
    for s in summaries {
        let _ = writeln!(
            out,
            "{:<40} {:>5} {:>10} {:>9} {:>9} {:>9}",
            s.key.join(","),
            s.runs,
            format_hms(s.total),
            format_hms(s.min),
            format_hms(s.mean),
            format_hms(s.max)
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const LABEL: &str = "CtpRicer,General,varyLocation,varyCellSize,varyCapSize,varyMonth,traceFile=/vagrant/data/PANGEA/Lerwick/Lerwick-Combined-1-Minute.csv,cellSize=2,capSize=40,solarStart=-2707200";

    fn completion(label: &str, rep: u32, duration: &str) -> String {
        format!(
            "2018-04-24 12:18:13: Run ID 452 label \"{}\" rep \"{}\" complete in {}\n",
            label, rep, duration
        )
    }

    #[test]
    fn test_parse_hms() {
        assert_eq!(parse_hms("0:01:11"), Some(Duration::from_secs(71)));
        assert_eq!(parse_hms("23:59:59"), Some(Duration::from_secs(86_399)));
        assert_eq!(parse_hms("26:00:00"), None);
        assert_eq!(parse_hms("0:61:00"), None);
        assert_eq!(parse_hms("1:2"), None);
        assert_eq!(format_hms(Duration::from_secs(3671)), "1:01:11");
    }

    #[test]
    fn test_parse_line() {
        let path = Path::new("castalia.log");
        let run = parse_line(path, 1, &completion(LABEL, 0, "0:01:11"))
            .unwrap()
            .unwrap();
        assert_eq!(run.label, LABEL);
        assert_eq!(run.duration, Duration::from_secs(71));

        assert!(parse_line(path, 2, "2018-04-24 12:18:13: Run ID 452 started").unwrap().is_none());
    }

    #[test]
    fn test_malformed_duration_is_fatal() {
        let err = parse_line(Path::new("castalia.log"), 7, &completion(LABEL, 0, "soon")).unwrap_err();
        assert!(matches!(err, RuntimeLogError::InvalidDuration { line_number: 7, .. }));
    }

    #[test]
    fn test_summarise_groups() {
        let other = LABEL.replace("cellSize=2", "cellSize=4");
        let runs = vec![
            RunTime { label: LABEL.to_string(), duration: Duration::from_secs(60) },
            RunTime { label: LABEL.to_string(), duration: Duration::from_secs(120) },
            RunTime { label: other, duration: Duration::from_secs(30) },
        ];

        let summaries = summarise(&runs, DEFAULT_GROUP_POSITIONS).unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].key, vec!["CtpRicer", "cellSize=2", "capSize=40"]);
        assert_eq!(summaries[0].runs, 2);
        assert_eq!(summaries[0].total, Duration::from_secs(180));
        assert_eq!(summaries[0].min, Duration::from_secs(60));
        assert_eq!(summaries[0].mean, Duration::from_secs(90));
        assert_eq!(summaries[0].max, Duration::from_secs(120));
        assert_eq!(summaries[1].key[1], "cellSize=4");
    }

    #[test]
    fn test_summarise_short_label() {
        let runs = vec![RunTime { label: "CtpRicer".to_string(), duration: Duration::from_secs(1) }];
        assert!(matches!(
            summarise(&runs, &[0, 7]),
            Err(RuntimeLogError::MissingLabelToken { position: 7, .. })
        ));
    }

    #[test]
    fn test_analyse_run_times_over_tree() {
        let dir = TempDir::new().unwrap();
        for (sub, duration) in [("a", "0:01:00"), ("b", "0:03:00")] {
            let folder = dir.path().join(sub);
            fs::create_dir_all(&folder).unwrap();
            fs::write(folder.join(RUN_LOG_FILE), completion(LABEL, 0, duration)).unwrap();
        }

        let summaries = analyse_run_times(dir.path(), DEFAULT_GROUP_POSITIONS).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].runs, 2);
        assert_eq!(format_hms(summaries[0].mean), "0:02:00");
        assert!(render_table(&summaries).contains("CtpRicer,cellSize=2,capSize=40"));
    }

    #[test]
    fn test_no_logs_is_fatal() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            analyse_run_times(dir.path(), DEFAULT_GROUP_POSITIONS),
            Err(RuntimeLogError::Discovery(ParseError::NoFilesFound { .. }))
        ));
    }
}
