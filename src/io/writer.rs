//! # Result Writers
//!
//! Tab-separated outputs of a run: the parameter table (readable back by
//! [`read_param_file`](super::read_param_file)), imputed values with their
//! empirical posteriors, and the observed-probability table.

use std::io::Write;
use std::path::Path;

use tracing::info_span;

use crate::data::observation::OrdinalDatum;
use crate::data::segment::Modality;
use crate::error::Result;
use crate::model::observed::ObservedProbabilityTable;
use crate::model::param_stats::ParamExport;

use super::TextSink;

/// Tab-separated text writer
pub struct ResultWriter {
    writer: TextSink,
    finished: bool,
}

impl ResultWriter {
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self {
            writer: super::create_text(path)?,
            finished: false,
        })
    }

    /// Parameter table: `# nModality: <n>`, a header, one row per parameter
    pub fn write_params(&mut self, export: &ParamExport) -> Result<()> {
        info_span!("write_params").in_scope(|| {
            writeln!(self.writer, "# {}", export.param_string)?;
            let n_cols = export.stats.first().map_or(0, |r| r.len());
            if n_cols == 3 {
                writeln!(
                    self.writer,
                    "# confidence: {}",
                    export.confidence
                )?;
                writeln!(self.writer, "label\tmedian\tlow\thigh")?;
            } else {
                writeln!(self.writer, "label\tvalue")?;
            }
            for (label, row) in export.labels.iter().zip(&export.stats) {
                write!(self.writer, "{}", label)?;
                for v in row {
                    write!(self.writer, "\t{}", v)?;
                }
                writeln!(self.writer)?;
            }
            Ok(())
        })
    }

    /// One row per individual: value, observation status, and for
    /// non-observed individuals the posterior over modalities
    pub fn write_imputed(
        &mut self,
        data: &[OrdinalDatum],
        imputed: &[Modality],
        tallies: &[Vec<u32>],
    ) -> Result<()> {
        info_span!("write_imputed", n = data.len()).in_scope(|| {
            writeln!(self.writer, "individual\tvalue\tstatus\tposterior")?;
            let mut line_buf = String::new();
            for (i, ((datum, value), tally)) in data.iter().zip(imputed).zip(tallies).enumerate() {
                line_buf.clear();
                let total: u32 = tally.iter().sum();
                if total == 0 {
                    line_buf.push('.');
                } else {
                    for (v, &c) in tally.iter().enumerate() {
                        if v > 0 {
                            line_buf.push(',');
                        }
                        line_buf.push_str(&format!("{:.4}", c as f64 / total as f64));
                    }
                }
                writeln!(self.writer, "{}\t{}\t{}\t{}", i, value, datum.kind(), line_buf)?;
            }
            Ok(())
        })
    }

    /// Class x modality table
    pub fn write_observed(&mut self, table: &ObservedProbabilityTable) -> Result<()> {
        write!(self.writer, "class")?;
        for v in 0..table.n_modalities() {
            write!(self.writer, "\t{}", v)?;
        }
        writeln!(self.writer)?;
        for k in 0..table.n_classes() {
            write!(self.writer, "{}", k)?;
            for p in table.row(k) {
                write!(self.writer, "\t{:.6}", p)?;
            }
            writeln!(self.writer)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Flush and close the stream (gzip trailer included), reporting
    /// failures that a drop would swallow
    pub fn finish(mut self) -> Result<()> {
        // a finished gzip encoder must not be flushed again
        self.finished = true;
        self.writer.try_finish()?;
        Ok(())
    }
}

impl Drop for ResultWriter {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.flush();
        }
    }
}
