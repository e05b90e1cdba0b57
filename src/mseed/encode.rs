//! miniSEED record encoding
//!
//! Writes traces as 4096-byte big-endian records with FLOAT64 samples,
//! blockette 1000 (encoding/record length) and blockette 1001 (microsecond
//! timing). Processed velocities are floating point, so no integer
//! compression is attempted.

use super::{BTime, factors_from_sample_rate};
use crate::constants::mseed::{
    ENCODING_FLOAT64, FIXED_HEADER_LEN, WRITE_DATA_OFFSET, WRITE_RECORD_LEN, WRITE_RECORD_LEN_EXP,
};
use crate::error::{Result, SeismoError};
use crate::models::{Trace, WaveformCollection};
use std::path::Path;
use tracing::{debug, warn};

const SAMPLES_PER_RECORD: usize = (WRITE_RECORD_LEN - WRITE_DATA_OFFSET) / 8;

fn padded_code(value: &str, width: usize, field: &str) -> Result<Vec<u8>> {
    if value.len() > width || !value.is_ascii() {
        return Err(SeismoError::mseed(format!(
            "{} code '{}' does not fit in {} ASCII characters",
            field, value, width
        )));
    }
    let mut bytes = value.as_bytes().to_vec();
    bytes.resize(width, b' ');
    Ok(bytes)
}

fn encode_trace(trace: &Trace, sequence: &mut u32, out: &mut Vec<u8>) -> Result<usize> {
    let station = padded_code(&trace.id.station, 5, "station")?;
    let location = padded_code(&trace.id.location, 2, "location")?;
    let channel = padded_code(&trace.id.channel, 3, "channel")?;
    let network = padded_code(&trace.id.network, 2, "network")?;
    let (factor, multiplier) = factors_from_sample_rate(trace.sampling_rate)?;

    let mut records = 0;
    for (chunk_index, chunk) in trace.data.chunks(SAMPLES_PER_RECORD).enumerate() {
        let start = trace.time_of(chunk_index * SAMPLES_PER_RECORD);
        let (btime, micros) = BTime::from_datetime(start);

        let mut record = vec![0u8; WRITE_RECORD_LEN];
        record[0..6].copy_from_slice(format!("{:06}", *sequence).as_bytes());
        record[6] = b'D';
        record[7] = b' ';
        record[8..13].copy_from_slice(&station);
        record[13..15].copy_from_slice(&location);
        record[15..18].copy_from_slice(&channel);
        record[18..20].copy_from_slice(&network);
        record[20..22].copy_from_slice(&btime.year.to_be_bytes());
        record[22..24].copy_from_slice(&btime.day_of_year.to_be_bytes());
        record[24] = btime.hour;
        record[25] = btime.minute;
        record[26] = btime.second;
        record[28..30].copy_from_slice(&btime.fract.to_be_bytes());
        record[30..32].copy_from_slice(&(chunk.len() as u16).to_be_bytes());
        record[32..34].copy_from_slice(&factor.to_be_bytes());
        record[34..36].copy_from_slice(&multiplier.to_be_bytes());
        record[39] = 2;
        record[44..46].copy_from_slice(&(WRITE_DATA_OFFSET as u16).to_be_bytes());
        record[46..48].copy_from_slice(&(FIXED_HEADER_LEN as u16).to_be_bytes());

        // Blockette 1000
        record[48..50].copy_from_slice(&1000u16.to_be_bytes());
        record[50..52].copy_from_slice(&56u16.to_be_bytes());
        record[52] = ENCODING_FLOAT64;
        record[53] = 1;
        record[54] = WRITE_RECORD_LEN_EXP;

        // Blockette 1001
        record[56..58].copy_from_slice(&1001u16.to_be_bytes());
        record[58..60].copy_from_slice(&0u16.to_be_bytes());
        record[61] = micros as u8;

        for (i, value) in chunk.iter().enumerate() {
            let at = WRITE_DATA_OFFSET + i * 8;
            record[at..at + 8].copy_from_slice(&value.to_be_bytes());
        }

        out.extend_from_slice(&record);
        *sequence = if *sequence >= 999_999 { 1 } else { *sequence + 1 };
        records += 1;
    }
    Ok(records)
}

/// Encode every trace of the collection into one byte stream.
///
/// A trace that cannot be represented (codes too long, unencodable sampling
/// rate) is logged and left out. Fails only when no trace could be encoded.
pub fn encode_collection(collection: &WaveformCollection) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut sequence = 1u32;
    let mut records = 0;
    let mut encoded = 0;
    let mut last_error = None;
    for trace in collection.iter().filter(|t| !t.is_empty()) {
        let mut buffer = Vec::new();
        match encode_trace(trace, &mut sequence, &mut buffer) {
            Ok(count) => {
                out.extend_from_slice(&buffer);
                records += count;
                encoded += 1;
            }
            Err(e) => {
                warn!("Leaving {} out of miniSEED output: {}", trace.id, e);
                last_error = Some(e);
            }
        }
    }
    if encoded == 0 {
        if let Some(e) = last_error {
            return Err(e);
        }
    }
    debug!(
        "Encoded {} of {} traces into {} miniSEED records",
        encoded,
        collection.len(),
        records
    );
    Ok(out)
}

/// Write the collection to a miniSEED file
pub fn write_mseed(collection: &WaveformCollection, path: &Path) -> Result<()> {
    let bytes = encode_collection(collection)?;
    std::fs::write(path, bytes).map_err(|e| SeismoError::Output {
        path: path.to_path_buf(),
        reason: format!("Failed to write miniSEED: {}", e),
    })
}
