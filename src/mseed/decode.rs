//! miniSEED record decoding
//!
//! Supports the encodings FDSN data centres actually serve: INT16, INT32,
//! FLOAT32, FLOAT64, Steim-1 and Steim-2. Contiguous records of the same
//! channel are joined into a single trace.

use super::{BTime, sample_rate_from_factors};
use crate::constants::mseed::{
    ENCODING_ASCII, ENCODING_FLOAT32, ENCODING_FLOAT64, ENCODING_INT16, ENCODING_INT32,
    ENCODING_STEIM1, ENCODING_STEIM2, FIXED_HEADER_LEN, STEIM_FRAME_LEN,
};
use crate::error::{Result, SeismoError};
use crate::models::{Trace, TraceId, WaveformCollection};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

/// Parsed fixed header plus the blockettes we care about
#[derive(Debug, Clone)]
struct RecordHeader {
    id: TraceId,
    start: DateTime<Utc>,
    num_samples: usize,
    sampling_rate: f64,
    data_offset: usize,
    encoding: u8,
    data_big_endian: bool,
    record_len: usize,
}

/// One decoded record
#[derive(Debug)]
struct Record {
    header: RecordHeader,
    samples: Vec<f64>,
}

/// Byte reader honouring the header byte order
struct Fields<'a> {
    bytes: &'a [u8],
    big_endian: bool,
}

impl Fields<'_> {
    fn u16(&self, offset: usize) -> u16 {
        let raw = [self.bytes[offset], self.bytes[offset + 1]];
        if self.big_endian {
            u16::from_be_bytes(raw)
        } else {
            u16::from_le_bytes(raw)
        }
    }

    fn i16(&self, offset: usize) -> i16 {
        self.u16(offset) as i16
    }

    fn i32(&self, offset: usize) -> i32 {
        let raw = [
            self.bytes[offset],
            self.bytes[offset + 1],
            self.bytes[offset + 2],
            self.bytes[offset + 3],
        ];
        if self.big_endian {
            i32::from_be_bytes(raw)
        } else {
            i32::from_le_bytes(raw)
        }
    }
}

fn ascii_field(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

fn plausible_btime(bytes: &[u8], big_endian: bool) -> bool {
    let fields = Fields { bytes, big_endian };
    let year = fields.u16(20);
    let day = fields.u16(22);
    (1900..=2100).contains(&year) && (1..=366).contains(&day)
}

/// Parse the record header starting at the beginning of `bytes`
fn parse_header(bytes: &[u8]) -> Result<RecordHeader> {
    if bytes.len() < FIXED_HEADER_LEN {
        return Err(SeismoError::mseed(format!(
            "truncated record header ({} bytes)",
            bytes.len()
        )));
    }
    if !bytes[0..6].iter().all(|b| b.is_ascii_digit() || *b == b' ' || *b == 0) {
        return Err(SeismoError::mseed("record does not start with a sequence number"));
    }
    if !matches!(bytes[6], b'D' | b'R' | b'Q' | b'M') {
        return Err(SeismoError::mseed(format!(
            "unknown data quality indicator '{}'",
            bytes[6] as char
        )));
    }

    let big_endian = if plausible_btime(bytes, true) {
        true
    } else if plausible_btime(bytes, false) {
        false
    } else {
        return Err(SeismoError::mseed("cannot determine record byte order"));
    };
    let fields = Fields { bytes, big_endian };

    let id = TraceId::new(
        ascii_field(&bytes[18..20]),
        ascii_field(&bytes[8..13]),
        ascii_field(&bytes[13..15]),
        ascii_field(&bytes[15..18]),
    );
    let btime = BTime {
        year: fields.u16(20),
        day_of_year: fields.u16(22),
        hour: bytes[24],
        minute: bytes[25],
        second: bytes[26],
        fract: fields.u16(28),
    };
    let mut start = btime.to_datetime()?;

    let num_samples = fields.u16(30) as usize;
    let sampling_rate = sample_rate_from_factors(fields.i16(32), fields.i16(34));
    let activity_flags = bytes[36];
    let num_blockettes = bytes[39] as usize;
    let time_correction = fields.i32(40);
    let data_offset = fields.u16(44) as usize;
    let first_blockette = fields.u16(46) as usize;

    // Bit 1 set means the correction is already included in the start time.
    if activity_flags & 0x02 == 0 && time_correction != 0 {
        start += Duration::microseconds(time_correction as i64 * 100);
    }

    let mut encoding = None;
    let mut data_big_endian = big_endian;
    let mut record_len = None;

    let mut offset = first_blockette;
    let mut visited = 0;
    while offset != 0 && offset + 4 <= bytes.len() && visited < num_blockettes.max(1) + 8 {
        let blockette_type = fields.u16(offset);
        let next = fields.u16(offset + 2) as usize;
        match blockette_type {
            1000 if offset + 7 <= bytes.len() => {
                encoding = Some(bytes[offset + 4]);
                data_big_endian = bytes[offset + 5] == 1;
                let exponent = bytes[offset + 6] as u32;
                if !(7..=20).contains(&exponent) {
                    return Err(SeismoError::mseed(format!(
                        "unsupported record length exponent {}",
                        exponent
                    )));
                }
                record_len = Some(1usize << exponent);
            }
            1001 if offset + 6 <= bytes.len() => {
                let micros = bytes[offset + 5] as i8;
                start += Duration::microseconds(micros as i64);
            }
            _ => {}
        }
        visited += 1;
        if next <= offset {
            break;
        }
        offset = next;
    }

    let record_len = record_len
        .ok_or_else(|| SeismoError::mseed(format!("{}: record without blockette 1000", id)))?;
    let encoding = encoding.unwrap_or(ENCODING_STEIM1);

    if num_samples > 0 && (data_offset < FIXED_HEADER_LEN || data_offset >= record_len) {
        return Err(SeismoError::mseed(format!(
            "{}: data offset {} outside record of {} bytes",
            id, data_offset, record_len
        )));
    }

    Ok(RecordHeader {
        id,
        start,
        num_samples,
        sampling_rate,
        data_offset,
        encoding,
        data_big_endian,
        record_len,
    })
}

fn chunk_array<const N: usize>(chunk: &[u8]) -> [u8; N] {
    let mut raw = [0u8; N];
    raw.copy_from_slice(chunk);
    raw
}

/// Decode fixed-width samples
fn decode_fixed<const N: usize>(
    payload: &[u8],
    num_samples: usize,
    convert: impl Fn([u8; N]) -> f64,
) -> Result<Vec<f64>> {
    if payload.len() < num_samples * N {
        return Err(SeismoError::mseed(format!(
            "payload of {} bytes too short for {} samples",
            payload.len(),
            num_samples
        )));
    }
    Ok(payload
        .chunks_exact(N)
        .take(num_samples)
        .map(|chunk| convert(chunk_array::<N>(chunk)))
        .collect())
}

fn sign_extend(value: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((value << shift) as i32) >> shift
}

/// Split the low `count * width` bits of `word` into sign-extended fields
fn unpack_fields(word: u32, count: u32, width: u32, out: &mut Vec<i32>) {
    let mask = (1u32 << width) - 1;
    for i in 0..count {
        let shift = (count - 1 - i) * width;
        out.push(sign_extend((word >> shift) & mask, width));
    }
}

/// Decode Steim-1 (`version == 1`) or Steim-2 (`version == 2`) compressed data
pub(crate) fn decode_steim(
    payload: &[u8],
    num_samples: usize,
    big_endian: bool,
    version: u8,
) -> Result<Vec<i32>> {
    if num_samples == 0 {
        return Ok(Vec::new());
    }
    let read_word = |chunk: &[u8]| -> u32 {
        let raw = chunk_array::<4>(chunk);
        if big_endian {
            u32::from_be_bytes(raw)
        } else {
            u32::from_le_bytes(raw)
        }
    };

    let mut diffs: Vec<i32> = Vec::with_capacity(num_samples);
    let mut first = None;
    let mut last = 0i32;

    for (frame_index, frame) in payload.chunks_exact(STEIM_FRAME_LEN).enumerate() {
        let words: Vec<u32> = frame.chunks_exact(4).map(read_word).collect();
        let control = words[0];

        for (w, &word) in words.iter().enumerate().skip(1) {
            if frame_index == 0 && w == 1 {
                first = Some(word as i32);
                continue;
            }
            if frame_index == 0 && w == 2 {
                last = word as i32;
                continue;
            }

            let nibble = (control >> (30 - 2 * w as u32)) & 0x3;
            match (version, nibble) {
                (_, 0) => {}
                (_, 1) => unpack_fields(word, 4, 8, &mut diffs),
                (1, 2) => unpack_fields(word, 2, 16, &mut diffs),
                (1, 3) => diffs.push(word as i32),
                (2, 2) => match word >> 30 {
                    1 => unpack_fields(word, 1, 30, &mut diffs),
                    2 => unpack_fields(word, 2, 15, &mut diffs),
                    3 => unpack_fields(word, 3, 10, &mut diffs),
                    _ => return Err(SeismoError::mseed("invalid Steim-2 sub-code 00 for nibble 2")),
                },
                (2, 3) => match word >> 30 {
                    0 => unpack_fields(word, 5, 6, &mut diffs),
                    1 => unpack_fields(word, 6, 5, &mut diffs),
                    2 => unpack_fields(word, 7, 4, &mut diffs),
                    _ => return Err(SeismoError::mseed("invalid Steim-2 sub-code 11 for nibble 3")),
                },
                _ => {
                    return Err(SeismoError::mseed(format!(
                        "unsupported Steim version {}",
                        version
                    )));
                }
            }
        }
    }

    let first = first.ok_or_else(|| SeismoError::mseed("Steim payload without frames"))?;
    if diffs.len() < num_samples {
        return Err(SeismoError::mseed(format!(
            "Steim payload holds {} differences, header declares {} samples",
            diffs.len(),
            num_samples
        )));
    }

    // The first difference refers to the previous record and is ignored.
    let mut samples = Vec::with_capacity(num_samples);
    samples.push(first);
    for diff in diffs.iter().take(num_samples).skip(1) {
        let previous = samples[samples.len() - 1];
        samples.push(previous.wrapping_add(*diff));
    }

    if samples[samples.len() - 1] != last {
        warn!(
            "Steim reverse integration constant mismatch: expected {}, got {}",
            last,
            samples[samples.len() - 1]
        );
    }
    Ok(samples)
}

fn decode_payload(header: &RecordHeader, payload: &[u8]) -> Result<Vec<f64>> {
    let be = header.data_big_endian;
    let n = header.num_samples;
    match header.encoding {
        ENCODING_INT16 => decode_fixed::<2>(payload, n, |raw| {
            if be {
                i16::from_be_bytes(raw) as f64
            } else {
                i16::from_le_bytes(raw) as f64
            }
        }),
        ENCODING_INT32 => decode_fixed::<4>(payload, n, |raw| {
            if be {
                i32::from_be_bytes(raw) as f64
            } else {
                i32::from_le_bytes(raw) as f64
            }
        }),
        ENCODING_FLOAT32 => decode_fixed::<4>(payload, n, |raw| {
            if be {
                f32::from_be_bytes(raw) as f64
            } else {
                f32::from_le_bytes(raw) as f64
            }
        }),
        ENCODING_FLOAT64 => decode_fixed::<8>(payload, n, |raw| {
            if be {
                f64::from_be_bytes(raw)
            } else {
                f64::from_le_bytes(raw)
            }
        }),
        ENCODING_STEIM1 => Ok(decode_steim(payload, n, be, 1)?
            .into_iter()
            .map(f64::from)
            .collect()),
        ENCODING_STEIM2 => Ok(decode_steim(payload, n, be, 2)?
            .into_iter()
            .map(f64::from)
            .collect()),
        other => Err(SeismoError::mseed(format!(
            "{}: unsupported data encoding {}",
            header.id, other
        ))),
    }
}

/// Whether `next` continues `trace` without a gap or overlap
fn continues(trace: &Trace, next: &RecordHeader) -> bool {
    if trace.id != next.id {
        return false;
    }
    let rate_tolerance = 1e-6 * trace.sampling_rate.max(1.0);
    if (trace.sampling_rate - next.sampling_rate).abs() > rate_tolerance {
        return false;
    }
    let expected = trace.time_of(trace.len());
    let half_sample_ns = (0.5e9 / trace.sampling_rate) as i64;
    let drift = (next.start - expected).num_nanoseconds().unwrap_or(i64::MAX);
    drift.abs() <= half_sample_ns
}

/// Decode a byte stream of miniSEED records into traces.
///
/// ASCII log records and records without samples are skipped. Records are
/// joined to the previous trace when they continue it seamlessly.
pub fn decode_records(bytes: &[u8]) -> Result<WaveformCollection> {
    let mut records = Vec::new();
    let mut offset = 0;

    while offset < bytes.len() {
        // Trailing padding after the last record
        if bytes[offset..].iter().all(|b| *b == 0 || *b == b' ') {
            break;
        }
        let header = parse_header(&bytes[offset..])?;
        let record_end = offset + header.record_len;
        if record_end > bytes.len() {
            return Err(SeismoError::mseed(format!(
                "{}: record of {} bytes truncated at {} bytes",
                header.id,
                header.record_len,
                bytes.len() - offset
            )));
        }

        if header.num_samples == 0 || header.encoding == ENCODING_ASCII {
            debug!("Skipping non-data record for {}", header.id);
        } else if header.sampling_rate <= 0.0 {
            debug!("Skipping record with zero sampling rate for {}", header.id);
        } else {
            let payload = &bytes[offset + header.data_offset..record_end];
            let samples = decode_payload(&header, payload)?;
            records.push(Record { header, samples });
        }
        offset = record_end;
    }

    let mut traces: Vec<Trace> = Vec::new();
    for record in records {
        match traces.last_mut() {
            Some(trace) if continues(trace, &record.header) => {
                trace.data.extend(record.samples);
            }
            _ => traces.push(Trace::new(
                record.header.id,
                record.header.start,
                record.header.sampling_rate,
                record.samples,
            )),
        }
    }

    debug!("Decoded {} traces from {} bytes", traces.len(), bytes.len());
    Ok(WaveformCollection::new(traces))
}
