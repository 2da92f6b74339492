//! # Centralized Error Handling
//!
//! Unified error types for the entire crate using `thiserror`.
//!
//! Two families live here:
//! - [`BosError`]: hard failures (I/O, malformed files, bad configuration).
//! - [`Warning`] / [`Warnings`]: data-validity and degeneracy findings. The
//!   estimator never aborts on these; setup and checks hand them back as the
//!   `Err` side of a `Result` and the caller decides what to do.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::data::observation::MissingKind;

/// Main error type for bosmix operations
#[derive(Error, Debug)]
pub enum BosError {
    /// I/O errors (file missing, permission denied, read/write failures)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid data errors (inconsistent lengths, out-of-range labels)
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Algorithm errors (table not computed, empty candidate sets)
    #[error("Algorithm error: {message}")]
    Algorithm { message: String },

    /// Configuration errors (invalid CLI arguments)
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// File not found errors
    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// Parse errors
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Data validation failed; the individual findings are attached
    #[error("{0}")]
    Validation(#[from] Warnings),
}

/// Type alias for Results using BosError
pub type Result<T> = std::result::Result<T, BosError>;

impl BosError {
    /// Create an invalid data error
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Create an algorithm error
    pub fn algorithm(message: impl Into<String>) -> Self {
        Self::Algorithm {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}

/// A non-fatal finding about the data or the current latent state.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Warning {
    #[error(
        "Variable {variable} is described by an Ordinal model which requires a minimum value of 0 \
         in either provided values or bounds. The minimum value currently provided is: {min}"
    )]
    NegativeModality { variable: String, min: i64 },

    #[error(
        "Variable {variable} requires a minimum of 3 modalities, found {n_modalities}. \
         With fewer modalities a Categorical model must be used."
    )]
    TooFewModalities { variable: String, n_modalities: usize },

    #[error(
        "Variable {variable} would need {n_modalities} modalities, the Ordinal model supports \
         at most {max}. Check the data encoding or use a numerical model."
    )]
    TooManyModalities {
        variable: String,
        n_modalities: usize,
        max: usize,
    },

    #[error(
        "Variable {variable} with Ordinal model does not accept {kind} missing values \
         (individual {individual})"
    )]
    UnsupportedMissing {
        variable: String,
        individual: usize,
        kind: MissingKind,
    },

    #[error("Variable {variable}: individual {individual} has an empty interval [{lo}:{hi}]")]
    InvalidInterval {
        variable: String,
        individual: usize,
        lo: i64,
        hi: i64,
    },

    #[error(
        "Variable {variable} requires a maximum value of {max_allowed} for the data during \
         prediction. The maximum value in the data provided for prediction is: {max_found}"
    )]
    ModalityOutOfRange {
        variable: String,
        max_allowed: i64,
        max_found: i64,
    },

    #[error("Variable {variable}: invalid parameter for class {class}: {message}")]
    InvalidParameter {
        variable: String,
        class: usize,
        message: String,
    },

    #[error(
        "Error in variable {variable} with Ordinal model. The accuracy latent variable is \
         uniformly {pattern} in class {class}. If the number of modalities is quite low, try \
         using a categorical model instead."
    )]
    DegenerateAccuracy {
        variable: String,
        class: usize,
        pattern: &'static str,
    },
}

/// Ordered list of warnings, displayed one per line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Warnings(Vec<Warning>);

impl Warnings {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, warning: Warning) {
        self.0.push(warning);
    }

    pub fn extend(&mut self, other: Warnings) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Warning> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Warning] {
        &self.0
    }

    /// `Ok(value)` when nothing was recorded, otherwise the warnings
    pub fn into_result<T>(self, value: T) -> std::result::Result<T, Warnings> {
        if self.0.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for Warnings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, w) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", w)?;
        }
        Ok(())
    }
}

impl std::error::Error for Warnings {}

impl From<Warning> for Warnings {
    fn from(warning: Warning) -> Self {
        Self(vec![warning])
    }
}

impl IntoIterator for Warnings {
    type Item = Warning;
    type IntoIter = std::vec::IntoIter<Warning>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
