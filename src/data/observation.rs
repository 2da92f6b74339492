//! # Observations
//!
//! Raw per-individual observations as delivered by a data handler, and the
//! validated form used by the ordinal model.
//!
//! Raw values are signed because validation has to be able to report a
//! negative modality rather than silently wrapping it.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::segment::{Modality, Segment};

/// Kind of missingness carried by an observation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MissingKind {
    Present,
    Missing,
    FiniteValues,
    Interval,
    LeftUnbounded,
    RightUnbounded,
}

impl MissingKind {
    /// Missingness types the ordinal model can represent as an end condition
    pub fn accepted_by_ordinal(self) -> bool {
        matches!(
            self,
            MissingKind::Present | MissingKind::Missing | MissingKind::Interval
        )
    }
}

impl fmt::Display for MissingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MissingKind::Present => "present",
            MissingKind::Missing => "missing",
            MissingKind::FiniteValues => "finite-value-list",
            MissingKind::Interval => "interval",
            MissingKind::LeftUnbounded => "left-unbounded interval",
            MissingKind::RightUnbounded => "right-unbounded interval",
        };
        f.write_str(s)
    }
}

/// One raw observation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Observation {
    Present(i64),
    Missing,
    FiniteValues(Vec<i64>),
    Interval(i64, i64),
    LeftUnbounded(i64),
    RightUnbounded(i64),
}

impl Observation {
    pub fn kind(&self) -> MissingKind {
        match self {
            Observation::Present(_) => MissingKind::Present,
            Observation::Missing => MissingKind::Missing,
            Observation::FiniteValues(_) => MissingKind::FiniteValues,
            Observation::Interval(_, _) => MissingKind::Interval,
            Observation::LeftUnbounded(_) => MissingKind::LeftUnbounded,
            Observation::RightUnbounded(_) => MissingKind::RightUnbounded,
        }
    }

    /// Finite values that contribute to the data range
    fn bounds(&self) -> impl Iterator<Item = i64> + '_ {
        let slice: Vec<i64> = match self {
            Observation::Present(v) => vec![*v],
            Observation::Missing => Vec::new(),
            Observation::FiniteValues(vs) => vs.clone(),
            Observation::Interval(lo, hi) => vec![*lo, *hi],
            Observation::LeftUnbounded(hi) => vec![*hi],
            Observation::RightUnbounded(lo) => vec![*lo],
        };
        slice.into_iter()
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Observation::Present(v) => write!(f, "{}", v),
            Observation::Missing => f.write_str("?"),
            Observation::FiniteValues(vs) => {
                let parts: Vec<String> = vs.iter().map(|v| v.to_string()).collect();
                write!(f, "{{{}}}", parts.join(","))
            }
            Observation::Interval(lo, hi) => write!(f, "[{}:{}]", lo, hi),
            Observation::LeftUnbounded(hi) => write!(f, "[-inf:{}]", hi),
            Observation::RightUnbounded(lo) => write!(f, "[{}:+inf]", lo),
        }
    }
}

/// Range spanned by all finite values and bounds of a data set
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DataRange {
    pub min: i64,
    pub max: i64,
}

impl DataRange {
    /// `None` when no observation carries a finite value
    pub fn compute(observations: &[Observation]) -> Option<Self> {
        let mut range: Option<DataRange> = None;
        for v in observations.iter().flat_map(|o| o.bounds()) {
            range = Some(match range {
                None => DataRange { min: v, max: v },
                Some(r) => DataRange {
                    min: r.min.min(v),
                    max: r.max.max(v),
                },
            });
        }
        range
    }
}

/// Validated observation in zero-based modality space
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrdinalDatum {
    Present(Modality),
    Missing,
    Interval(Segment),
}

impl OrdinalDatum {
    /// Constraint the terminal step of a path has to satisfy
    pub fn end_condition(self, n_modalities: usize) -> Segment {
        match self {
            OrdinalDatum::Present(v) => Segment::point(v),
            OrdinalDatum::Missing => Segment::full(n_modalities),
            OrdinalDatum::Interval(seg) => seg,
        }
    }

    pub fn is_present(self) -> bool {
        matches!(self, OrdinalDatum::Present(_))
    }

    pub fn is_missing(self) -> bool {
        matches!(self, OrdinalDatum::Missing)
    }

    pub fn kind(self) -> MissingKind {
        match self {
            OrdinalDatum::Present(_) => MissingKind::Present,
            OrdinalDatum::Missing => MissingKind::Missing,
            OrdinalDatum::Interval(_) => MissingKind::Interval,
        }
    }
}
