//! Whole-byte PCM sample decoding.

/// Sample encodings a mono PCM data chunk can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleFormat {
    /// 8-bit unsigned, silence at 128.
    U8,
    /// 16-bit signed little-endian.
    S16,
    /// 24-bit signed little-endian.
    S24,
    /// 32-bit signed little-endian.
    S32,
}

impl SampleFormat {
    /// Map a bits-per-sample header value to a format. `None` for anything not whole-byte.
    pub fn from_bit_depth(bits: u16) -> Option<Self> {
        match bits {
            8 => Some(Self::U8),
            16 => Some(Self::S16),
            24 => Some(Self::S24),
            32 => Some(Self::S32),
            _ => None,
        }
    }

    /// Bytes per sample.
    pub fn width(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::S16 => 2,
            Self::S24 => 3,
            Self::S32 => 4,
        }
    }

    /// Decode one sample (`bytes.len() >= width()`) to `f32` in `[-1.0, 1.0)`.
    pub fn to_f32(self, bytes: &[u8]) -> f32 {
        match self {
            Self::U8 => (f32::from(bytes[0]) - 128.0) / 128.0,
            Self::S16 => f32::from(i16::from_le_bytes([bytes[0], bytes[1]])) / 32_768.0,
            Self::S24 => {
                // Place the 24 bits in the top of an i32 so the sign extends.
                let v = i32::from_le_bytes([0, bytes[0], bytes[1], bytes[2]]) >> 8;
                v as f32 / 8_388_608.0
            }
            Self::S32 => {
                let v = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                (f64::from(v) / 2_147_483_648.0) as f32
            }
        }
    }

    /// Raw bytes that decode to silence, for padding output during underruns.
    pub fn silence(self) -> [u8; 4] {
        match self {
            Self::U8 => [128, 0, 0, 0],
            _ => [0; 4],
        }
    }
}
