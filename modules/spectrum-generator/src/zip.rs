//! Minimal deflate zip writer for generated packages.
//!
//! Zip32 only: entries are small text and image fixtures.

use std::io::{Read, Write};
use std::path::Path;

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::{Compression, Crc};

use crate::error::{GeneratorError, Result};

const LOCAL_HEADER: u32 = 0x0403_4b50;
const CENTRAL_HEADER: u32 = 0x0201_4b50;
const END_OF_CENTRAL_DIRECTORY: u32 = 0x0605_4b50;
const STORED: u16 = 0;
const DEFLATE: u16 = 8;
const VERSION: u16 = 20;
/// 1980-01-01 00:00 in MS-DOS format.
const DOS_DATE: u16 = 0x0021;
const DOS_TIME: u16 = 0;

/// One file inside a zip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipEntry {
    pub name: String,
    pub contents: Vec<u8>,
}

impl ZipEntry {
    pub fn new(name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
        }
    }
}

/// Build the bytes of a zip holding `entries`, in order.
pub fn zip_bytes(entries: &[ZipEntry]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut central = Vec::new();

    for entry in entries {
        let mut crc = Crc::new();
        crc.update(&entry.contents);

        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        let deflated = |e: std::io::Error| GeneratorError::Template(format!("deflate of {} failed: {e}", entry.name));
        encoder.write_all(&entry.contents).map_err(deflated)?;
        let data = encoder.finish().map_err(deflated)?;

        let name = entry.name.as_bytes();
        let offset = out.len() as u32;
        let header = EntryHeader {
            crc: crc.sum(),
            compressed: data.len() as u32,
            uncompressed: entry.contents.len() as u32,
            name_len: name.len() as u16,
        };

        out.extend_from_slice(&LOCAL_HEADER.to_le_bytes());
        out.extend_from_slice(&VERSION.to_le_bytes());
        header.write(&mut out);
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(name);
        out.extend_from_slice(&data);

        central.extend_from_slice(&CENTRAL_HEADER.to_le_bytes());
        central.extend_from_slice(&VERSION.to_le_bytes());
        central.extend_from_slice(&VERSION.to_le_bytes());
        header.write(&mut central);
        // extra, comment, disk, internal attrs
        for _ in 0..4 {
            central.extend_from_slice(&0u16.to_le_bytes());
        }
        central.extend_from_slice(&0u32.to_le_bytes());
        central.extend_from_slice(&offset.to_le_bytes());
        central.extend_from_slice(name);
    }

    let central_start = out.len() as u32;
    let central_size = central.len() as u32;
    out.extend_from_slice(&central);

    out.extend_from_slice(&END_OF_CENTRAL_DIRECTORY.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    out.extend_from_slice(&central_size.to_le_bytes());
    out.extend_from_slice(&central_start.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    Ok(out)
}

/// Write a zip of `entries` to `path`, replacing any existing file.
pub fn write_zip(path: &Path, entries: &[ZipEntry]) -> Result<()> {
    let bytes = zip_bytes(entries)?;
    std::fs::write(path, bytes).map_err(GeneratorError::io(path))
}

/// Names recorded in the central directory, in order.
pub fn entry_names(zip: &[u8]) -> Vec<String> {
    central_directory(zip)
        .map(|records| records.into_iter().map(|record| record.name).collect())
        .unwrap_or_default()
}

/// Every entry of a zip, inflated. Handles stored and deflated entries.
pub fn read_zip(zip: &[u8]) -> Result<Vec<ZipEntry>> {
    let records = central_directory(zip)
        .ok_or_else(|| GeneratorError::Template("no zip central directory found".to_string()))?;
    let mut entries = Vec::with_capacity(records.len());
    for record in records {
        let corrupt = || GeneratorError::Template(format!("zip entry {} is truncated", record.name));
        let name_len = read_u16(zip, record.offset + 26).ok_or_else(corrupt)?;
        let extra_len = read_u16(zip, record.offset + 28).ok_or_else(corrupt)?;
        let start = record.offset + 30 + name_len + extra_len;
        let data = zip.get(start..start + record.compressed).ok_or_else(corrupt)?;
        let contents = match record.method {
            STORED => data.to_vec(),
            DEFLATE => {
                let mut contents = Vec::with_capacity(record.uncompressed);
                DeflateDecoder::new(data)
                    .read_to_end(&mut contents)
                    .map_err(|e| GeneratorError::Template(format!("inflate of {} failed: {e}", record.name)))?;
                contents
            }
            method => {
                return Err(GeneratorError::Template(format!(
                    "zip entry {} uses unsupported method {method}",
                    record.name
                )))
            }
        };
        entries.push(ZipEntry {
            name: record.name,
            contents,
        });
    }
    Ok(entries)
}

struct CentralRecord {
    name: String,
    method: u16,
    compressed: usize,
    uncompressed: usize,
    offset: usize,
}

fn central_directory(zip: &[u8]) -> Option<Vec<CentralRecord>> {
    let eocd = zip
        .windows(4)
        .rposition(|w| w == END_OF_CENTRAL_DIRECTORY.to_le_bytes())?;
    let count = read_u16(zip, eocd + 10)?;
    let mut at = read_u32(zip, eocd + 16)?;

    let mut records = Vec::with_capacity(count);
    for _ in 0..count {
        if read_u32(zip, at)? != CENTRAL_HEADER as usize {
            return None;
        }
        let name_len = read_u16(zip, at + 28)?;
        let extra_len = read_u16(zip, at + 30)?;
        let comment_len = read_u16(zip, at + 32)?;
        let name = zip.get(at + 46..at + 46 + name_len)?;
        records.push(CentralRecord {
            name: String::from_utf8_lossy(name).into_owned(),
            method: read_u16(zip, at + 10)? as u16,
            compressed: read_u32(zip, at + 20)?,
            uncompressed: read_u32(zip, at + 24)?,
            offset: read_u32(zip, at + 42)?,
        });
        at += 46 + name_len + extra_len + comment_len;
    }
    Some(records)
}

fn read_u16(bytes: &[u8], at: usize) -> Option<usize> {
    bytes
        .get(at..at + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]) as usize)
}

fn read_u32(bytes: &[u8], at: usize) -> Option<usize> {
    bytes
        .get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as usize)
}

struct EntryHeader {
    crc: u32,
    compressed: u32,
    uncompressed: u32,
    name_len: u16,
}

impl EntryHeader {
    /// Fields shared by local and central headers, from flags to name length.
    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&DEFLATE.to_le_bytes());
        out.extend_from_slice(&DOS_TIME.to_le_bytes());
        out.extend_from_slice(&DOS_DATE.to_le_bytes());
        out.extend_from_slice(&self.crc.to_le_bytes());
        out.extend_from_slice(&self.compressed.to_le_bytes());
        out.extend_from_slice(&self.uncompressed.to_le_bytes());
        out.extend_from_slice(&self.name_len.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn central_directory_lists_entries_in_order() {
        let bytes = zip_bytes(&[
            ZipEntry::new("elife-06847.xml", "<article/>"),
            ZipEntry::new("elife-06847-fig1.tif", vec![0u8; 64]),
        ])
        .unwrap();
        assert_eq!(entry_names(&bytes), vec!["elife-06847.xml", "elife-06847-fig1.tif"]);
    }

    #[test]
    fn first_entry_inflates_back() {
        let bytes = zip_bytes(&[ZipEntry::new("a.xml", "<article>hello</article>")]).unwrap();
        let compressed_len = u32::from_le_bytes([bytes[18], bytes[19], bytes[20], bytes[21]]) as usize;
        let data_start = 30 + "a.xml".len();
        let mut inflated = String::new();
        DeflateDecoder::new(&bytes[data_start..data_start + compressed_len])
            .read_to_string(&mut inflated)
            .unwrap();
        assert_eq!(inflated, "<article>hello</article>");
    }

    #[test]
    fn reads_back_what_it_writes() {
        let entries = vec![
            ZipEntry::new("word/document.xml", "<w:t>99999</w:t>"),
            ZipEntry::new("alligator.jpg", vec![7u8; 300]),
        ];
        assert_eq!(read_zip(&zip_bytes(&entries).unwrap()).unwrap(), entries);
    }

    #[test]
    fn garbage_is_not_a_zip() {
        assert!(entry_names(b"not a zip").is_empty());
        assert!(matches!(read_zip(b"not a zip"), Err(GeneratorError::Template(_))));
    }
}
