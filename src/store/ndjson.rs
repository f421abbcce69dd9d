use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::SystemTime;

use log::debug;

use crate::core::error::StoreError;
use crate::store::record::Record;

/// Append-only NDJSON log I/O.
///
/// The save file is treated as an append-only record log: writers either
/// append new lines or rewrite the whole file byte-for-byte plus new lines,
/// never editing prior lines in place. Durability is exactly "append line" /
/// "rename file on write".

/// Read every record from the file. Blank lines and lines that fail to parse
/// are skipped; a corrupt line never aborts a load.
pub fn read_records(path: &Path) -> Result<Vec<Record>, StoreError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<Record>(trimmed) {
            Ok(record) => records.push(record),
            Err(err) => debug!("Skipping unparsable NDJSON line: {}", err),
        }
    }

    Ok(records)
}

/// Append records as compact single-line JSON, one per line.
pub fn append_records(path: &Path, records: &[Record]) -> Result<(), StoreError> {
    let needs_newline = missing_trailing_newline(path)?;

    let file = OpenOptions::new().append(true).create(true).open(path)?;
    let mut writer = BufWriter::new(file);
    if needs_newline {
        writer.write_all(b"\n")?;
    }
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;

    Ok(())
}

/// Copy the existing file verbatim into a temp file in the same directory,
/// append the new records, then atomically rename over the original.
pub fn rewrite_with_appended(path: &Path, records: &[Record]) -> Result<(), StoreError> {
    let tmp_path = path.with_extension("tmp");
    {
        let source = File::open(path)?;
        let needs_newline = missing_trailing_newline(path)?;
        let mut reader = BufReader::new(source);
        let mut writer = BufWriter::new(File::create(&tmp_path)?);

        std::io::copy(&mut reader, &mut writer)?;
        if needs_newline {
            writer.write_all(b"\n")?;
        }
        for record in records {
            serde_json::to_writer(&mut writer, record)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
    }
    fs::rename(&tmp_path, path)?;

    Ok(())
}

/// File modification time, or `None` when the file is missing or unreadable.
pub fn file_mtime(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).ok()?.modified().ok()
}

/// Whether the file is non-empty and its last byte is not a newline.
/// Appending directly to such a file would glue the new record onto the
/// final line.
fn missing_trailing_newline(path: &Path) -> Result<bool, StoreError> {
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err.into()),
    };
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}
