//! # I/O Module
//!
//! Plain-text boundaries of the binary. Converts between files on disk and
//! the in-memory `Observation` / `ClassParams` / result types. The model
//! itself owns no format.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

pub mod observations;
pub mod params;
pub mod writer;

pub use observations::{read_observations, ObservationSet};
pub use params::{read_param_file, ParamFile};
pub use writer::ResultWriter;

fn is_gzipped(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "gz" || e == "bgz")
        .unwrap_or(false)
}

/// Open a text file, decompressing `.gz` transparently
pub fn open_text(path: &Path) -> std::io::Result<Box<dyn BufRead + Send>> {
    let file = File::open(path)?;
    let reader: Box<dyn BufRead + Send> = if is_gzipped(path) {
        Box::new(BufReader::new(MultiGzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(reader)
}

/// Output file, plain or gzip-compressed
pub enum TextSink {
    Plain(BufWriter<File>),
    Gzip(BufWriter<GzEncoder<File>>),
}

impl TextSink {
    /// Flush buffered text and, for gzip, write the stream trailer.
    ///
    /// Nothing may be written afterwards.
    pub fn try_finish(&mut self) -> std::io::Result<()> {
        match self {
            TextSink::Plain(w) => w.flush(),
            TextSink::Gzip(w) => {
                w.flush()?;
                w.get_mut().try_finish()
            }
        }
    }
}

impl Write for TextSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            TextSink::Plain(w) => w.write(buf),
            TextSink::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            TextSink::Plain(w) => w.flush(),
            TextSink::Gzip(w) => w.flush(),
        }
    }
}

/// Create a text file, compressing when the name ends in `.gz`
pub fn create_text(path: &Path) -> std::io::Result<TextSink> {
    let file = File::create(path)?;
    let sink = if is_gzipped(path) {
        TextSink::Gzip(BufWriter::new(GzEncoder::new(file, Compression::default())))
    } else {
        TextSink::Plain(BufWriter::new(file))
    };
    Ok(sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_gz_sink_finishes_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tsv.gz");
        let mut sink = create_text(&path).unwrap();
        assert!(matches!(sink, TextSink::Gzip(_)));
        writeln!(sink, "a\tb").unwrap();
        sink.try_finish().unwrap();

        // complete stream readable before the sink is dropped
        let mut text = String::new();
        MultiGzDecoder::new(File::open(&path).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "a\tb\n");
        drop(sink);
    }

    #[test]
    fn test_plain_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tsv");
        let mut sink = create_text(&path).unwrap();
        assert!(matches!(sink, TextSink::Plain(_)));
        write!(sink, "x").unwrap();
        sink.try_finish().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "x");
    }
}
