//! # Parameter File Reader
//!
//! Reads the table written by [`ResultWriter::write_params`](super::ResultWriter::write_params):
//!
//! ```text
//! # nModality: 4
//! label	median	low	high
//! k: 0, mu	2	2	3
//! k: 0, pi	0.71	0.65	0.78
//! ```
//!
//! Only the first numeric column is used.

use std::io::BufRead;
use std::path::Path;

use crate::error::{BosError, Result};
use crate::model::param_stats::ParamExport;
use crate::model::parameters::{parse_param_string, ClassParams, RunMode, N_MODALITY_KEY};

/// Imported parameters for a prediction run
#[derive(Clone, Debug, PartialEq)]
pub struct ParamFile {
    pub n_modalities: usize,
    pub params: Vec<ClassParams>,
}

impl ParamFile {
    pub fn n_classes(&self) -> usize {
        self.params.len()
    }

    pub fn into_run_mode(self) -> RunMode {
        RunMode::Prediction {
            n_modalities: self.n_modalities,
            params: self.params,
        }
    }
}

pub fn read_param_file(path: &Path) -> Result<ParamFile> {
    let reader = super::open_text(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => BosError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => BosError::Io(e),
    })?;
    parse_param_file(reader)
}

pub fn parse_param_file<R: BufRead>(reader: R) -> Result<ParamFile> {
    let mut n_modalities = None;
    let mut rows: Vec<(String, f64)> = Vec::new();
    let mut row_lines = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line_num = idx + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(comment) = trimmed.strip_prefix('#') {
            if n_modalities.is_none() && comment.contains(N_MODALITY_KEY) {
                n_modalities = parse_param_string(comment)
                    .map_err(|e| BosError::parse(line_num, e.to_string()))?;
            }
            continue;
        }

        let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
        if fields[0] == "label" {
            continue;
        }
        if fields.len() < 2 {
            return Err(BosError::parse(
                line_num,
                format!("Expected a label and a value, got {} field(s)", fields.len()),
            ));
        }
        let value: f64 = fields[1]
            .parse()
            .map_err(|_| BosError::parse(line_num, format!("Invalid value '{}'", fields[1])))?;
        rows.push((fields[0].to_string(), value));
        row_lines.push(line_num);
    }

    let n_modalities = n_modalities
        .ok_or_else(|| BosError::parse(1, "Missing '# nModality: <n>' line"))?;
    if rows.is_empty() || rows.len() % 2 != 0 {
        return Err(BosError::invalid_data(format!(
            "Expected a mode and a precision row per class, got {} rows",
            rows.len()
        )));
    }

    let expected = ParamExport::labels_for(rows.len() / 2);
    let mut params = Vec::with_capacity(rows.len() / 2);
    for (k, pair) in rows.chunks_exact(2).enumerate() {
        for (j, (label, _)) in pair.iter().enumerate() {
            if *label != expected[2 * k + j] {
                return Err(BosError::parse(
                    row_lines[2 * k + j],
                    format!("Expected label '{}', found '{}'", expected[2 * k + j], label),
                ));
            }
        }
        let mode = pair[0].1;
        if mode < 0.0 || mode.fract() != 0.0 {
            return Err(BosError::parse(
                row_lines[2 * k],
                format!("Mode must be a non-negative integer, got {}", mode),
            ));
        }
        params.push(ClassParams::new(mode as usize, pair[1].1));
    }

    Ok(ParamFile {
        n_modalities,
        params,
    })
}
