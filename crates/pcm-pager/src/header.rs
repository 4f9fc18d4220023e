//! Fixed-layout WAVE header reader.
//!
//! The header is consumed as thirteen little-endian fields in a fixed order (44 bytes total),
//! one explicit sequential read per field. Nothing is validated: chunk IDs and sizes are
//! taken as-is and a malformed file simply yields wrong playback parameters.

use std::io::{ErrorKind, Read};

/// One field of the fixed header layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    /// Byte offset from the start of the file.
    pub offset: usize,
    /// Width in bytes (all numeric fields are little-endian).
    pub width: usize,
    pub name: &'static str,
}

const fn field(offset: usize, width: usize, name: &'static str) -> FieldSpec {
    FieldSpec { offset, width, name }
}

pub const RIFF_ID: FieldSpec = field(0, 4, "riff_id");
pub const RIFF_SIZE: FieldSpec = field(4, 4, "riff_size");
pub const FORM_TYPE: FieldSpec = field(8, 4, "form_type");
pub const FMT_ID: FieldSpec = field(12, 4, "fmt_id");
pub const FMT_SIZE: FieldSpec = field(16, 4, "fmt_size");
pub const FORMAT_TAG: FieldSpec = field(20, 2, "format_tag");
pub const CHANNELS: FieldSpec = field(22, 2, "channels");
pub const SAMPLE_RATE: FieldSpec = field(24, 4, "sample_rate");
pub const BYTE_RATE: FieldSpec = field(28, 4, "byte_rate");
pub const BLOCK_ALIGN: FieldSpec = field(32, 2, "block_align");
pub const BITS_PER_SAMPLE: FieldSpec = field(34, 2, "bits_per_sample");
pub const DATA_ID: FieldSpec = field(36, 4, "data_id");
pub const DATA_SIZE: FieldSpec = field(40, 4, "data_size");

/// Header fields in file order.
pub const HEADER_LAYOUT: [FieldSpec; 13] = [
    RIFF_ID,
    RIFF_SIZE,
    FORM_TYPE,
    FMT_ID,
    FMT_SIZE,
    FORMAT_TAG,
    CHANNELS,
    SAMPLE_RATE,
    BYTE_RATE,
    BLOCK_ALIGN,
    BITS_PER_SAMPLE,
    DATA_ID,
    DATA_SIZE,
];

/// Total header length in bytes; PCM data starts right after it.
pub const HEADER_LEN: usize = 44;

/// Raw header values exactly as stored in the file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WaveHeader {
    pub riff_id: [u8; 4],
    pub riff_size: u32,
    pub form_type: [u8; 4],
    pub fmt_id: [u8; 4],
    pub fmt_size: u32,
    pub format_tag: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub data_id: [u8; 4],
    pub data_size: u32,
}

/// Playback parameters derived from a header, set once per track.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackParams {
    /// Samples per second.
    pub sample_rate: u32,
    /// Bits per sample (whole bytes: 8, 16, 24, 32).
    pub bit_depth: u16,
    /// Number of samples in the data chunk.
    pub total_samples: u32,
    pub channels: u16,
    pub format_tag: u16,
    pub byte_rate: u32,
    pub block_align: u16,
    /// Data chunk length in bytes.
    pub data_size: u32,
}

impl TrackParams {
    pub fn bytes_per_sample(&self) -> usize {
        usize::from(self.bit_depth / 8)
    }

    /// Track length in milliseconds, or `None` for a zero sample rate.
    pub fn duration_ms(&self) -> Option<u64> {
        if self.sample_rate == 0 {
            return None;
        }
        Some(u64::from(self.total_samples).saturating_mul(1000) / u64::from(self.sample_rate))
    }
}

/// Read the 44-byte header from `reader`, one field at a time.
///
/// A field cut short by end of file (or by a read error) is zero-filled and parsing carries
/// on; the reader is left positioned at the first data byte of a well-formed file.
pub fn read_header<R: Read>(reader: &mut R) -> WaveHeader {
    let mut raw = [0u8; HEADER_LEN];
    for spec in HEADER_LAYOUT.iter() {
        let dst = &mut raw[spec.offset..spec.offset + spec.width];
        let got = read_up_to(reader, dst);
        if got < spec.width {
            tracing::debug!(
                field = spec.name,
                expected = spec.width,
                got = got,
                "short header field"
            );
        }
    }
    WaveHeader::from_bytes(&raw)
}

/// Fill `dst` from `reader`, stopping early at EOF or on error. Returns bytes read.
///
/// Read errors are not surfaced; storage either hands over what it has or nothing.
pub(crate) fn read_up_to<R: Read>(reader: &mut R, dst: &mut [u8]) -> usize {
    let mut filled = 0;
    while filled < dst.len() {
        match reader.read(&mut dst[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::debug!(filled = filled, "read error treated as end of data: {e}");
                break;
            }
        }
    }
    filled
}

fn bytes_of<'a>(raw: &'a [u8; HEADER_LEN], spec: &FieldSpec) -> &'a [u8] {
    &raw[spec.offset..spec.offset + spec.width]
}

fn four_cc(raw: &[u8; HEADER_LEN], spec: &FieldSpec) -> [u8; 4] {
    let b = bytes_of(raw, spec);
    [b[0], b[1], b[2], b[3]]
}

fn le_u32(raw: &[u8; HEADER_LEN], spec: &FieldSpec) -> u32 {
    u32::from_le_bytes(four_cc(raw, spec))
}

fn le_u16(raw: &[u8; HEADER_LEN], spec: &FieldSpec) -> u16 {
    let b = bytes_of(raw, spec);
    u16::from_le_bytes([b[0], b[1]])
}

impl WaveHeader {
    /// Decode a raw header image using [`HEADER_LAYOUT`].
    pub fn from_bytes(raw: &[u8; HEADER_LEN]) -> Self {
        Self {
            riff_id: four_cc(raw, &RIFF_ID),
            riff_size: le_u32(raw, &RIFF_SIZE),
            form_type: four_cc(raw, &FORM_TYPE),
            fmt_id: four_cc(raw, &FMT_ID),
            fmt_size: le_u32(raw, &FMT_SIZE),
            format_tag: le_u16(raw, &FORMAT_TAG),
            channels: le_u16(raw, &CHANNELS),
            sample_rate: le_u32(raw, &SAMPLE_RATE),
            byte_rate: le_u32(raw, &BYTE_RATE),
            block_align: le_u16(raw, &BLOCK_ALIGN),
            bits_per_sample: le_u16(raw, &BITS_PER_SAMPLE),
            data_id: four_cc(raw, &DATA_ID),
            data_size: le_u32(raw, &DATA_SIZE),
        }
    }

    /// Encode back into the on-disk layout.
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut raw = [0u8; HEADER_LEN];
        let mut put = |spec: &FieldSpec, bytes: &[u8]| {
            raw[spec.offset..spec.offset + spec.width].copy_from_slice(bytes);
        };
        put(&RIFF_ID, &self.riff_id);
        put(&RIFF_SIZE, &self.riff_size.to_le_bytes());
        put(&FORM_TYPE, &self.form_type);
        put(&FMT_ID, &self.fmt_id);
        put(&FMT_SIZE, &self.fmt_size.to_le_bytes());
        put(&FORMAT_TAG, &self.format_tag.to_le_bytes());
        put(&CHANNELS, &self.channels.to_le_bytes());
        put(&SAMPLE_RATE, &self.sample_rate.to_le_bytes());
        put(&BYTE_RATE, &self.byte_rate.to_le_bytes());
        put(&BLOCK_ALIGN, &self.block_align.to_le_bytes());
        put(&BITS_PER_SAMPLE, &self.bits_per_sample.to_le_bytes());
        put(&DATA_ID, &self.data_id);
        put(&DATA_SIZE, &self.data_size.to_le_bytes());
        raw
    }

    /// Canonical mono PCM header for `data_size` bytes of samples.
    pub fn mono_pcm(sample_rate: u32, bits_per_sample: u16, data_size: u32) -> Self {
        let block_align = (bits_per_sample / 8).max(1);
        Self {
            riff_id: *b"RIFF",
            riff_size: data_size.saturating_add(HEADER_LEN as u32 - 8),
            form_type: *b"WAVE",
            fmt_id: *b"fmt ",
            fmt_size: 16,
            format_tag: 1,
            channels: 1,
            sample_rate,
            byte_rate: sample_rate.saturating_mul(u32::from(block_align)),
            block_align,
            bits_per_sample,
            data_id: *b"data",
            data_size,
        }
    }

    /// Whether the four-character codes are the ones a canonical PCM file carries.
    ///
    /// Informational only; parsing never rejects a header.
    pub fn ids_look_valid(&self) -> bool {
        &self.riff_id == b"RIFF"
            && &self.form_type == b"WAVE"
            && &self.fmt_id == b"fmt "
            && &self.data_id == b"data"
    }

    /// Derive playback parameters.
    ///
    /// `total_samples = data_size / (bits_per_sample / 8)`, truncating. A bit depth below 8
    /// has no whole-byte sample size and yields zero samples.
    pub fn params(&self) -> TrackParams {
        let bytes_per_sample = u32::from(self.bits_per_sample / 8);
        let total_samples = match self.data_size.checked_div(bytes_per_sample) {
            Some(n) => n,
            None => {
                tracing::warn!(
                    bits_per_sample = self.bits_per_sample,
                    "bit depth has no whole-byte sample size"
                );
                0
            }
        };
        TrackParams {
            sample_rate: self.sample_rate,
            bit_depth: self.bits_per_sample,
            total_samples,
            channels: self.channels,
            format_tag: self.format_tag,
            byte_rate: self.byte_rate,
            block_align: self.block_align,
            data_size: self.data_size,
        }
    }
}
