//! JSONL stream files
//!
//! The first non-blank line is the [`DatasetHeader`]; every following line is
//! one instance, `{"x": [features..], "y": [labels.., null for missing]}`.
//! Blank lines are skipped.

use crate::models::{DatasetHeader, Instance, ShapeError, Stream};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("stream has no header line")]
    MissingHeader,

    #[error(transparent)]
    Shape(#[from] ShapeError),
}

/// Read a stream from any buffered reader
pub fn read_jsonl(reader: impl BufRead) -> Result<Stream, DatasetError> {
    let mut header: Option<DatasetHeader> = None;
    let mut instances = Vec::new();

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let line_no = i + 1;
        if header.is_none() {
            let parsed: DatasetHeader = serde_json::from_str(trimmed)
                .map_err(|source| DatasetError::Parse { line: line_no, source })?;
            header = Some(parsed);
        } else {
            let inst: Instance = serde_json::from_str(trimmed)
                .map_err(|source| DatasetError::Parse { line: line_no, source })?;
            instances.push(inst);
        }
    }

    let header = header.ok_or(DatasetError::MissingHeader)?;
    Ok(Stream::new(header, instances)?)
}

/// Load a stream from a JSONL file.
///
/// A header without a name takes the file stem.
pub fn load_jsonl(path: &Path) -> Result<Stream, DatasetError> {
    let file = File::open(path)?;
    let stream = read_jsonl(BufReader::new(file))?;
    if stream.header().name.is_empty() {
        let mut header = stream.header().clone();
        header.name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (_, instances) = stream.into_parts();
        return Ok(Stream::new(header, instances)?);
    }
    tracing::debug!(
        "Loaded {} instances ({} features, {} labels) from {}",
        stream.len(),
        stream.header().num_features,
        stream.num_labels(),
        path.display()
    );
    Ok(stream)
}

/// Write a stream as JSONL
pub fn write_jsonl(stream: &Stream, writer: impl Write) -> Result<(), DatasetError> {
    let mut w = BufWriter::new(writer);
    serde_json::to_writer(&mut w, stream.header()).map_err(io::Error::from)?;
    writeln!(w)?;
    for inst in stream.instances() {
        serde_json::to_writer(&mut w, inst).map_err(io::Error::from)?;
        writeln!(w)?;
    }
    w.flush()?;
    Ok(())
}

/// Write a stream to a file
pub fn save_jsonl(stream: &Stream, path: &Path) -> Result<(), DatasetError> {
    write_jsonl(stream, File::create(path)?)
}
