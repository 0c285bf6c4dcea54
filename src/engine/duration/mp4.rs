//! Duration from the MP4/MOV movie header (`moov/mvhd`).

use super::{DurationProvider, ScanDepth};
use crate::engine::core::types::DurationSource;
use crate::engine::probe::ProbeError;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// Top-level atoms starting past this offset are ignored by a normal scan
pub const NORMAL_SCAN_LIMIT: u64 = 8 * 1024 * 1024;

/// `mvhd` is small; anything larger is a corrupt header
const MAX_MVHD_SIZE: u64 = 4096;

#[derive(Debug, Clone, Copy)]
struct Atom {
    kind: [u8; 4],
    /// Offset of the payload
    data_offset: u64,
    data_size: u64,
}

fn is_printable_type(kind: &[u8; 4]) -> bool {
    kind.iter().all(|b| (0x20..0x7f).contains(b))
}

/// Walk sibling atoms in `[start, end)`, stopping before any atom that starts at or past `limit`
fn read_atoms<R: Read + Seek>(reader: &mut R, start: u64, end: u64, limit: u64) -> std::io::Result<Vec<Atom>> {
    let mut atoms = Vec::new();
    let mut pos = start;

    while pos < end && pos < limit {
        reader.seek(SeekFrom::Start(pos))?;

        let mut header = [0u8; 8];
        if reader.read_exact(&mut header).is_err() {
            break;
        }

        let size = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as u64;
        let kind = [header[4], header[5], header[6], header[7]];
        if !is_printable_type(&kind) {
            break;
        }

        let (atom_size, header_size) = match size {
            1 => {
                let mut ext = [0u8; 8];
                reader.read_exact(&mut ext)?;
                (u64::from_be_bytes(ext), 16u64)
            }
            0 => (end - pos, 8u64),
            _ => (size, 8u64),
        };

        if atom_size < header_size {
            break;
        }

        atoms.push(Atom {
            kind,
            data_offset: pos + header_size,
            data_size: atom_size - header_size,
        });

        pos = match pos.checked_add(atom_size) {
            Some(next) => next,
            None => break,
        };
    }

    Ok(atoms)
}

/// Parse an `mvhd` payload into seconds
fn parse_mvhd(data: &[u8]) -> Option<f64> {
    let version = *data.first()?;
    let (timescale, duration) = if version == 0 {
        if data.len() < 20 {
            return None;
        }
        (
            u32::from_be_bytes([data[12], data[13], data[14], data[15]]),
            u32::from_be_bytes([data[16], data[17], data[18], data[19]]) as u64,
        )
    } else {
        if data.len() < 32 {
            return None;
        }
        (
            u32::from_be_bytes([data[20], data[21], data[22], data[23]]),
            u64::from_be_bytes([
                data[24], data[25], data[26], data[27], data[28], data[29], data[30], data[31],
            ]),
        )
    };

    // all-ones duration means "unknown" in fragmented files
    if timescale == 0 || duration == 0 || duration == u64::MAX || duration == u32::MAX as u64 {
        return None;
    }
    Some(duration as f64 / timescale as f64)
}

/// Read the movie duration from a seekable MP4/MOV stream
pub fn read_mvhd_duration<R: Read + Seek>(reader: &mut R, depth: ScanDepth) -> std::io::Result<Option<f64>> {
    let file_size = reader.seek(SeekFrom::End(0))?;
    let limit = match depth {
        ScanDepth::Normal => NORMAL_SCAN_LIMIT,
        ScanDepth::Extended => u64::MAX,
    };

    let top = read_atoms(reader, 0, file_size, limit)?;
    let Some(moov) = top.iter().find(|a| &a.kind == b"moov") else {
        return Ok(None);
    };

    let moov_end = moov.data_offset.saturating_add(moov.data_size).min(file_size);
    let children = read_atoms(reader, moov.data_offset, moov_end, u64::MAX)?;
    let Some(mvhd) = children.iter().find(|a| &a.kind == b"mvhd") else {
        return Ok(None);
    };
    if mvhd.data_size > MAX_MVHD_SIZE {
        return Ok(None);
    }

    reader.seek(SeekFrom::Start(mvhd.data_offset))?;
    let mut data = vec![0u8; mvhd.data_size as usize];
    reader.read_exact(&mut data)?;
    Ok(parse_mvhd(&data))
}

/// Native container-header lookup, the cheapest provider
#[derive(Debug, Clone, Copy, Default)]
pub struct Mp4HeaderDuration;

impl DurationProvider for Mp4HeaderDuration {
    fn source(&self) -> DurationSource {
        DurationSource::MetadataStore
    }

    fn try_duration(&self, path: &Path, depth: ScanDepth) -> Result<Option<f64>, ProbeError> {
        let mut reader = BufReader::new(File::open(path)?);
        Ok(read_mvhd_duration(&mut reader, depth)?)
    }
}
