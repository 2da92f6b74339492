//! # Observation File Reader
//!
//! One individual per line, whitespace-separated `value [class]`:
//!
//! ```text
//! # comment
//! 3
//! ?           (missing)
//! [1:2]       (interval)
//! {0,2}       (finite list)
//! [-inf:2]    (left-unbounded)
//! [1:+inf]    (right-unbounded)
//! ```
//!
//! Unsupported missingness kinds are parsed here and rejected by the model,
//! so that all offending individuals are reported together.

use std::io::BufRead;
use std::path::Path;

use tracing::info_span;

use crate::data::assignment::{ClassAssignment, ClassIdx};
use crate::data::observation::Observation;
use crate::error::{BosError, Result};

/// Observations with optional class labels, in file order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObservationSet {
    pub observations: Vec<Observation>,
    pub labels: Option<Vec<ClassIdx>>,
}

impl ObservationSet {
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Smallest class count compatible with the labels
    pub fn label_classes(&self) -> Option<usize> {
        self.labels
            .as_ref()
            .map(|l| l.iter().copied().max().map_or(1, |m| m + 1))
    }

    /// Class assignment from the labels, or everyone in class 0
    pub fn assignment(&self, n_classes: usize) -> Result<ClassAssignment> {
        match &self.labels {
            Some(labels) => ClassAssignment::new(labels.clone(), n_classes),
            None => ClassAssignment::new(vec![0; self.len()], n_classes),
        }
    }
}

pub fn read_observations(path: &Path) -> Result<ObservationSet> {
    info_span!("read_observations", path = ?path).in_scope(|| {
        let reader = super::open_text(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => BosError::FileNotFound {
                path: path.to_path_buf(),
            },
            _ => BosError::Io(e),
        })?;
        parse_observations(reader)
    })
}

pub fn parse_observations<R: BufRead>(reader: R) -> Result<ObservationSet> {
    let mut observations = Vec::new();
    let mut labels: Option<Vec<ClassIdx>> = None;

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line_num = idx + 1;
        let content = line.split('#').next().unwrap_or("").trim();
        if content.is_empty() {
            continue;
        }

        let fields: Vec<&str> = content.split_whitespace().collect();
        if fields.len() > 2 {
            return Err(BosError::parse(
                line_num,
                format!("Expected at most 2 fields, got {}", fields.len()),
            ));
        }
        let obs = parse_value(fields[0]).map_err(|msg| BosError::parse(line_num, msg))?;

        let label = match fields.get(1) {
            Some(tok) => Some(
                tok.parse::<ClassIdx>()
                    .map_err(|_| BosError::parse(line_num, format!("Invalid class label '{}'", tok)))?,
            ),
            None => None,
        };
        let first = observations.is_empty();
        match (label, labels.as_mut()) {
            (Some(k), Some(ls)) => ls.push(k),
            (Some(k), None) if first => labels = Some(vec![k]),
            (None, None) => {}
            _ => {
                return Err(BosError::parse(
                    line_num,
                    "Class labels must be given on every line or on none",
                ))
            }
        }
        observations.push(obs);
    }

    tracing::debug!(
        n_individuals = observations.len(),
        labelled = labels.is_some(),
        "observations parsed"
    );
    Ok(ObservationSet { observations, labels })
}

fn parse_int(tok: &str) -> std::result::Result<i64, String> {
    tok.trim()
        .parse::<i64>()
        .map_err(|_| format!("Invalid integer '{}'", tok.trim()))
}

/// Parse one value token
pub fn parse_value(tok: &str) -> std::result::Result<Observation, String> {
    if tok == "?" {
        return Ok(Observation::Missing);
    }

    if let Some(inner) = tok.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
        let (lo, hi) = inner
            .split_once(':')
            .ok_or_else(|| format!("Interval '{}' needs the form [a:b]", tok))?;
        let lo_inf = lo.trim() == "-inf";
        let hi_inf = matches!(hi.trim(), "+inf" | "inf");
        return Ok(match (lo_inf, hi_inf) {
            (true, true) => Observation::Missing,
            (true, false) => Observation::LeftUnbounded(parse_int(hi)?),
            (false, true) => Observation::RightUnbounded(parse_int(lo)?),
            (false, false) => Observation::Interval(parse_int(lo)?, parse_int(hi)?),
        });
    }

    if let Some(inner) = tok.strip_prefix('{').and_then(|t| t.strip_suffix('}')) {
        let values = inner
            .split(',')
            .filter(|v| !v.trim().is_empty())
            .map(parse_int)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        if values.is_empty() {
            return Err(format!("Empty value list '{}'", tok));
        }
        return Ok(Observation::FiniteValues(values));
    }

    parse_int(tok).map(Observation::Present)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_value_forms() {
        assert_eq!(parse_value("3"), Ok(Observation::Present(3)));
        assert_eq!(parse_value("?"), Ok(Observation::Missing));
        assert_eq!(parse_value("[1:2]"), Ok(Observation::Interval(1, 2)));
        assert_eq!(parse_value("{0,2}"), Ok(Observation::FiniteValues(vec![0, 2])));
        assert_eq!(parse_value("[-inf:2]"), Ok(Observation::LeftUnbounded(2)));
        assert_eq!(parse_value("[1:+inf]"), Ok(Observation::RightUnbounded(1)));
        assert_eq!(parse_value("[-inf:+inf]"), Ok(Observation::Missing));
        assert!(parse_value("x").is_err());
        assert!(parse_value("[1;2]").is_err());
        assert!(parse_value("{}").is_err());
    }

    #[test]
    fn test_display_parses_back() {
        for obs in [
            Observation::Present(4),
            Observation::Missing,
            Observation::Interval(0, 3),
            Observation::LeftUnbounded(1),
        ] {
            assert_eq!(parse_value(&obs.to_string()), Ok(obs));
        }
    }

    #[test]
    fn test_unlabelled_file() {
        let text = "# header\n2\n\n?  # missing\n[0:1]\n";
        let set = parse_observations(Cursor::new(text)).unwrap();
        assert_eq!(set.len(), 3);
        assert!(set.labels.is_none());
        assert_eq!(set.label_classes(), None);
        assert_eq!(set.assignment(1).unwrap().labels(), &[0, 0, 0]);
    }

    #[test]
    fn test_labelled_file() {
        let text = "2 0\n? 1\n[0:1] 1\n";
        let set = parse_observations(Cursor::new(text)).unwrap();
        assert_eq!(set.labels, Some(vec![0, 1, 1]));
        assert_eq!(set.label_classes(), Some(2));
        assert!(set.assignment(1).is_err());
    }

    #[test]
    fn test_mixed_labels_rejected() {
        let err = parse_observations(Cursor::new("2 0\n3\n")).unwrap_err();
        assert!(matches!(err, BosError::Parse { line: 2, .. }));
        let err = parse_observations(Cursor::new("2\n3 1\n")).unwrap_err();
        assert!(matches!(err, BosError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_bad_tokens_report_line() {
        let err = parse_observations(Cursor::new("1\n\nabc\n")).unwrap_err();
        assert!(matches!(err, BosError::Parse { line: 3, .. }));
        let err = parse_observations(Cursor::new("1 0 extra\n")).unwrap_err();
        assert!(matches!(err, BosError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = read_observations(Path::new("/nonexistent/bosmix.txt")).unwrap_err();
        assert!(matches!(err, BosError::FileNotFound { .. }));
    }
}
