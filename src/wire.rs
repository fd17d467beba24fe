//! Wire codec for the point-cloud datagram protocol
//!
//! # Datagram Format (little-endian, packed)
//!
//! ```text
//! ┌────────────────────┬─────────────────────────────┐
//! │ Header (27 bytes)  │ Point3D × point_count       │
//! │                    │ (13 bytes each)             │
//! └────────────────────┴─────────────────────────────┘
//! ```
//!
//! ## Header layout
//!
//! | Offset | Size | Field        | Contract                          |
//! |--------|------|--------------|-----------------------------------|
//! | 0      | 4    | magic        | 0x4C495652 ("LIVR")               |
//! | 4      | 1    | version      | 1                                 |
//! | 5      | 8    | device_ts_ns | device time, nanoseconds          |
//! | 13     | 4    | seq          | wraps at 2^32                     |
//! | 17     | 2    | point_count  | 1..=105                           |
//! | 19     | 2    | flags        | reserved, written as 0            |
//! | 21     | 2    | sensor_id    | 0 = primary                       |
//! | 23     | 4    | crc32        | 0 = not computed                  |
//!
//! ## Point layout
//!
//! `x, y, z` as f32 metres followed by a u8 intensity — 13 bytes, no padding.
//!
//! The layouts are unaligned by design: one datagram must fit a 1400-byte
//! UDP payload, which caps `point_count` at 105. All field access goes
//! through explicit little-endian helpers; there is no struct transmute
//! anywhere, so strict-alignment targets are safe.
//!
//! A header `crc32` of zero means the producer opted out of checksumming;
//! the decoder accepts such datagrams without verification.

use crate::checksum;
use thiserror::Error;

/// Protocol magic: "LIVR" read as a little-endian u32
pub const PROTOCOL_MAGIC: u32 = 0x4C49_5652;

/// Protocol version
pub const PROTOCOL_VERSION: u8 = 1;

/// Header size in bytes
pub const HEADER_SIZE: usize = 27;

/// Encoded point size in bytes
pub const POINT_SIZE: usize = 13;

/// Safe UDP payload bound (1500-byte MTU minus IP/UDP headers)
pub const MAX_UDP_PAYLOAD: usize = 1400;

/// Maximum points per datagram: (1400 - 27) / 13 = 105
pub const MAX_POINTS_PER_PACKET: usize = (MAX_UDP_PAYLOAD - HEADER_SIZE) / POINT_SIZE;

/// Byte count of the header prefix covered by the checksum (excludes crc32)
const CRC_COVERED_PREFIX: usize = HEADER_SIZE - 4;

/// A single transmitted point: metres plus reflectivity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point3D {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub intensity: u8,
}

impl Point3D {
    /// Encode into exactly [`POINT_SIZE`] bytes
    #[inline]
    pub fn encode_into(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&self.x.to_le_bytes());
        buf[4..8].copy_from_slice(&self.y.to_le_bytes());
        buf[8..12].copy_from_slice(&self.z.to_le_bytes());
        buf[12] = self.intensity;
    }

    /// Decode from exactly [`POINT_SIZE`] bytes
    #[inline]
    pub fn decode(buf: &[u8]) -> Self {
        Self {
            x: f32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            y: f32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
            z: f32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
            intensity: buf[12],
        }
    }

    /// Coordinates as an `[x, y, z]` triple
    #[inline]
    pub fn xyz(&self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

/// Datagram header fields (magic and version are implicit constants)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub device_ts_ns: u64,
    pub seq: u32,
    pub point_count: u16,
    pub flags: u16,
    pub sensor_id: u16,
    pub crc32: u32,
}

impl PacketHeader {
    /// Encode into exactly [`HEADER_SIZE`] bytes, little-endian
    pub fn encode_into(&self, buf: &mut [u8; HEADER_SIZE]) {
        buf[0..4].copy_from_slice(&PROTOCOL_MAGIC.to_le_bytes());
        buf[4] = PROTOCOL_VERSION;
        buf[5..13].copy_from_slice(&self.device_ts_ns.to_le_bytes());
        buf[13..17].copy_from_slice(&self.seq.to_le_bytes());
        buf[17..19].copy_from_slice(&self.point_count.to_le_bytes());
        buf[19..21].copy_from_slice(&self.flags.to_le_bytes());
        buf[21..23].copy_from_slice(&self.sensor_id.to_le_bytes());
        buf[23..27].copy_from_slice(&self.crc32.to_le_bytes());
    }
}

/// Decode failures, ordered as checked (cheapest structural checks first)
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("datagram too short: {0} bytes < {HEADER_SIZE}-byte header")]
    TooShort(usize),

    #[error("bad magic: {0:#010X}")]
    BadMagic(u32),

    #[error("unsupported version: {0}")]
    BadVersion(u8),

    #[error("invalid point count: {0} (valid: 1..={MAX_POINTS_PER_PACKET})")]
    InvalidCount(u16),

    #[error("length mismatch: got {got} bytes, expected {expected}")]
    LengthMismatch { got: usize, expected: usize },

    #[error("checksum mismatch: computed {computed:#010X}, header {header:#010X}")]
    BadChecksum { computed: u32, header: u32 },
}

/// A validated datagram borrowing the receive buffer
///
/// Header fields are decoded eagerly; the point payload stays a borrowed
/// slice and is decoded on demand, so validation itself copies nothing.
/// The record must be consumed before the receive buffer is reused.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedRecord<'a> {
    pub device_ts_ns: u64,
    pub seq: u32,
    pub point_count: u16,
    pub flags: u16,
    pub sensor_id: u16,
    pub crc32: u32,
    payload: &'a [u8],
}

impl<'a> ParsedRecord<'a> {
    /// Decode the point at index `i`
    ///
    /// # Panics
    ///
    /// Panics if `i >= point_count`.
    #[inline]
    pub fn point(&self, i: usize) -> Point3D {
        Point3D::decode(&self.payload[i * POINT_SIZE..(i + 1) * POINT_SIZE])
    }

    /// Iterate over all points with intensity (the full view)
    pub fn points(&self) -> impl ExactSizeIterator<Item = Point3D> + 'a {
        self.payload.chunks_exact(POINT_SIZE).map(Point3D::decode)
    }

    /// Iterate over `[x, y, z]` triples only (the view SLAM consumes)
    pub fn xyz(&self) -> impl ExactSizeIterator<Item = [f32; 3]> + 'a {
        self.payload
            .chunks_exact(POINT_SIZE)
            .map(|chunk| Point3D::decode(chunk).xyz())
    }

    /// Raw payload bytes (13 bytes per point)
    #[inline]
    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }
}

/// Encode a complete datagram into `out` (cleared and reused)
///
/// When `crc_enabled`, the CRC-32 over bytes [0..23) ∥ payload is patched
/// into bytes [23..27) after encoding; otherwise the field stays zero to
/// signal "not computed".
pub fn encode_packet(
    header: &PacketHeader,
    points: &[Point3D],
    crc_enabled: bool,
    out: &mut Vec<u8>,
) {
    debug_assert!(!points.is_empty() && points.len() <= MAX_POINTS_PER_PACKET);

    out.clear();
    out.resize(HEADER_SIZE + points.len() * POINT_SIZE, 0);

    let mut head = [0u8; HEADER_SIZE];
    PacketHeader {
        crc32: 0,
        point_count: points.len() as u16,
        ..*header
    }
    .encode_into(&mut head);
    out[..HEADER_SIZE].copy_from_slice(&head);

    for (i, point) in points.iter().enumerate() {
        let at = HEADER_SIZE + i * POINT_SIZE;
        point.encode_into(&mut out[at..at + POINT_SIZE]);
    }

    if crc_enabled {
        let crc = checksum::crc32_parts(&out[..CRC_COVERED_PREFIX], &out[HEADER_SIZE..]);
        out[CRC_COVERED_PREFIX..HEADER_SIZE].copy_from_slice(&crc.to_le_bytes());
    }
}

/// Validate and parse one datagram
///
/// The check order is part of the protocol contract: structural checks run
/// cheapest-first, the checksum last. A header `crc32` of zero is accepted
/// without verification regardless of `validate_crc`.
pub fn decode(buf: &[u8], validate_crc: bool) -> Result<ParsedRecord<'_>, DecodeError> {
    if buf.len() < HEADER_SIZE {
        return Err(DecodeError::TooShort(buf.len()));
    }

    let magic = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
    if magic != PROTOCOL_MAGIC {
        return Err(DecodeError::BadMagic(magic));
    }

    let version = buf[4];
    if version != PROTOCOL_VERSION {
        return Err(DecodeError::BadVersion(version));
    }

    let point_count = u16::from_le_bytes([buf[17], buf[18]]);
    if point_count == 0 || point_count as usize > MAX_POINTS_PER_PACKET {
        return Err(DecodeError::InvalidCount(point_count));
    }

    let expected = HEADER_SIZE + point_count as usize * POINT_SIZE;
    if buf.len() != expected {
        return Err(DecodeError::LengthMismatch {
            got: buf.len(),
            expected,
        });
    }

    let crc32 = u32::from_le_bytes([buf[23], buf[24], buf[25], buf[26]]);
    if validate_crc && crc32 != 0 {
        let computed = checksum::crc32_parts(&buf[..CRC_COVERED_PREFIX], &buf[HEADER_SIZE..]);
        if computed != crc32 {
            return Err(DecodeError::BadChecksum {
                computed,
                header: crc32,
            });
        }
    }

    Ok(ParsedRecord {
        device_ts_ns: u64::from_le_bytes([
            buf[5], buf[6], buf[7], buf[8], buf[9], buf[10], buf[11], buf[12],
        ]),
        seq: u32::from_le_bytes([buf[13], buf[14], buf[15], buf[16]]),
        point_count,
        flags: u16::from_le_bytes([buf[19], buf[20]]),
        sensor_id: u16::from_le_bytes([buf[21], buf[22]]),
        crc32,
        payload: &buf[HEADER_SIZE..],
    })
}
