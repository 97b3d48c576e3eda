//! GGUF tensor encodings and their block geometry

use serde::Serialize;
use std::fmt;

/// On-disk numeric encoding of a tensor (ggml_type enum values from ggml.h)
///
/// Tags this build does not know, including the retired Q4_2/Q4_3 (4, 5),
/// parse as [`GgufTensorType::Unknown`]. Their byte size cannot be derived
/// from the shape; the header parser measures it from the tensor offsets.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum GgufTensorType {
    F32,
    F16,
    Q4_0,
    Q4_1,
    Q5_0,
    Q5_1,
    Q8_0,
    Q8_1,
    Q2_K,
    Q3_K,
    Q4_K,
    Q5_K,
    Q6_K,
    Q8_K,
    IQ2_XXS,
    IQ2_XS,
    IQ3_XXS,
    IQ1_S,
    IQ4_NL,
    IQ3_S,
    IQ2_S,
    IQ4_XS,
    I8,
    I16,
    I32,
    I64,
    F64,
    IQ1_M,
    BF16,
    Q4_0_4_4,
    Q4_0_4_8,
    Q4_0_8_8,
    TQ1_0,
    TQ2_0,
    MXFP4,
    Unknown(u32),
}

/// How the sampler decodes a given encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleDecode {
    F32,
    F16,
    BF16,
    Q8_0,
    Q4_0,
    /// Raw byte approximation, see [`crate::quant::byte_fallback_value`]
    ByteFallback,
}

impl GgufTensorType {
    /// Encoding for a tag; unrecognised tags map to `Unknown`
    pub fn from_u32(value: u32) -> Self {
        use GgufTensorType::*;
        match value {
            0 => F32,
            1 => F16,
            2 => Q4_0,
            3 => Q4_1,
            6 => Q5_0,
            7 => Q5_1,
            8 => Q8_0,
            9 => Q8_1,
            10 => Q2_K,
            11 => Q3_K,
            12 => Q4_K,
            13 => Q5_K,
            14 => Q6_K,
            15 => Q8_K,
            16 => IQ2_XXS,
            17 => IQ2_XS,
            18 => IQ3_XXS,
            19 => IQ1_S,
            20 => IQ4_NL,
            21 => IQ3_S,
            22 => IQ2_S,
            23 => IQ4_XS,
            24 => I8,
            25 => I16,
            26 => I32,
            27 => I64,
            28 => F64,
            29 => IQ1_M,
            30 => BF16,
            31 => Q4_0_4_4,
            32 => Q4_0_4_8,
            33 => Q4_0_8_8,
            34 => TQ1_0,
            35 => TQ2_0,
            39 => MXFP4,
            other => Unknown(other),
        }
    }

    /// The ggml tag as stored in the file
    pub fn tag(&self) -> u32 {
        use GgufTensorType::*;
        match *self {
            F32 => 0,
            F16 => 1,
            Q4_0 => 2,
            Q4_1 => 3,
            Q5_0 => 6,
            Q5_1 => 7,
            Q8_0 => 8,
            Q8_1 => 9,
            Q2_K => 10,
            Q3_K => 11,
            Q4_K => 12,
            Q5_K => 13,
            Q6_K => 14,
            Q8_K => 15,
            IQ2_XXS => 16,
            IQ2_XS => 17,
            IQ3_XXS => 18,
            IQ1_S => 19,
            IQ4_NL => 20,
            IQ3_S => 21,
            IQ2_S => 22,
            IQ4_XS => 23,
            I8 => 24,
            I16 => 25,
            I32 => 26,
            I64 => 27,
            F64 => 28,
            IQ1_M => 29,
            BF16 => 30,
            Q4_0_4_4 => 31,
            Q4_0_4_8 => 32,
            Q4_0_8_8 => 33,
            TQ1_0 => 34,
            TQ2_0 => 35,
            MXFP4 => 39,
            Unknown(tag) => tag,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, GgufTensorType::Unknown(_))
    }

    pub fn name(&self) -> &'static str {
        use GgufTensorType::*;
        match self {
            F32 => "F32",
            F16 => "F16",
            Q4_0 => "Q4_0",
            Q4_1 => "Q4_1",
            Q5_0 => "Q5_0",
            Q5_1 => "Q5_1",
            Q8_0 => "Q8_0",
            Q8_1 => "Q8_1",
            Q2_K => "Q2_K",
            Q3_K => "Q3_K",
            Q4_K => "Q4_K",
            Q5_K => "Q5_K",
            Q6_K => "Q6_K",
            Q8_K => "Q8_K",
            IQ2_XXS => "IQ2_XXS",
            IQ2_XS => "IQ2_XS",
            IQ3_XXS => "IQ3_XXS",
            IQ1_S => "IQ1_S",
            IQ4_NL => "IQ4_NL",
            IQ3_S => "IQ3_S",
            IQ2_S => "IQ2_S",
            IQ4_XS => "IQ4_XS",
            I8 => "I8",
            I16 => "I16",
            I32 => "I32",
            I64 => "I64",
            F64 => "F64",
            IQ1_M => "IQ1_M",
            BF16 => "BF16",
            Q4_0_4_4 => "Q4_0_4_4",
            Q4_0_4_8 => "Q4_0_4_8",
            Q4_0_8_8 => "Q4_0_8_8",
            TQ1_0 => "TQ1_0",
            TQ2_0 => "TQ2_0",
            MXFP4 => "MXFP4",
            Unknown(_) => "UNKNOWN",
        }
    }

    /// (elements per block, bytes per block), `None` for unknown tags
    ///
    /// Plain encodings report a block of one element whose byte size is the
    /// element size.
    pub fn block_geometry(&self) -> Option<(u64, u64)> {
        use GgufTensorType::*;
        let geometry = match self {
            F32 => (1, 4),
            F16 => (1, 2),
            BF16 => (1, 2),
            F64 => (1, 8),
            I8 => (1, 1),
            I16 => (1, 2),
            I32 => (1, 4),
            I64 => (1, 8),
            Q4_0 => (32, 18),
            Q4_1 => (32, 20),
            Q5_0 => (32, 22),
            Q5_1 => (32, 24),
            Q8_0 => (32, 34),
            Q8_1 => (32, 36),
            IQ4_NL => (32, 18),
            Q4_0_4_4 | Q4_0_4_8 | Q4_0_8_8 => (32, 18),
            MXFP4 => (32, 17),
            Q2_K => (256, 84),
            Q3_K => (256, 110),
            Q4_K => (256, 144),
            Q5_K => (256, 176),
            Q6_K => (256, 210),
            Q8_K => (256, 292),
            IQ2_XXS => (256, 66),
            IQ2_XS => (256, 74),
            IQ3_XXS => (256, 98),
            IQ1_S => (256, 50),
            IQ3_S => (256, 110),
            IQ2_S => (256, 82),
            IQ4_XS => (256, 136),
            IQ1_M => (256, 56),
            TQ1_0 => (256, 54),
            TQ2_0 => (256, 66),
            Unknown(_) => return None,
        };
        Some(geometry)
    }

    /// Bytes needed to store `elements` values, rounding up to whole blocks
    pub fn data_size(&self, elements: u64) -> Option<u64> {
        let (block_size, bytes_per_block) = self.block_geometry()?;
        Some(elements.div_ceil(block_size).saturating_mul(bytes_per_block))
    }

    /// Check if this is a block-quantized type
    pub fn is_quantized(&self) -> bool {
        matches!(self.block_geometry(), Some((block_size, _)) if block_size > 1)
    }

    /// Decoder the sampler uses for this encoding
    pub fn sample_decode(&self) -> SampleDecode {
        match self {
            GgufTensorType::F32 => SampleDecode::F32,
            GgufTensorType::F16 => SampleDecode::F16,
            GgufTensorType::BF16 => SampleDecode::BF16,
            GgufTensorType::Q8_0 => SampleDecode::Q8_0,
            GgufTensorType::Q4_0 => SampleDecode::Q4_0,
            _ => SampleDecode::ByteFallback,
        }
    }
}

impl fmt::Display for GgufTensorType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GgufTensorType::Unknown(tag) => write!(f, "UNKNOWN({})", tag),
            known => f.write_str(known.name()),
        }
    }
}
