#![forbid(unsafe_code)]

pub const MAX_CHANNELS: usize = 4;

pub const DTYPE_REASON_CODES: [&str; 3] = [
    "dtype_unknown_depth",
    "dtype_channel_count_invalid",
    "dtype_type_token_invalid",
];

/// Element depth of a matrix, independent of its channel count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Depth {
    U8,
    S8,
    U16,
    S16,
    S32,
    F32,
    F64,
}

impl Depth {
    pub const ALL: [Self; 7] = [
        Self::U8,
        Self::S8,
        Self::U16,
        Self::S16,
        Self::S32,
        Self::F32,
        Self::F64,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::U8 => "8U",
            Self::S8 => "8S",
            Self::U16 => "16U",
            Self::S16 => "16S",
            Self::S32 => "32S",
            Self::F32 => "32F",
            Self::F64 => "64F",
        }
    }

    #[must_use]
    pub const fn item_size(self) -> usize {
        match self {
            Self::U8 | Self::S8 => 1,
            Self::U16 | Self::S16 => 2,
            Self::S32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }

    #[must_use]
    pub const fn is_integer(self) -> bool {
        !self.is_float()
    }

    #[must_use]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    #[must_use]
    pub const fn is_signed(self) -> bool {
        !matches!(self, Self::U8 | Self::U16)
    }

    /// Smallest representable value.
    #[must_use]
    pub const fn min_value(self) -> f64 {
        match self {
            Self::U8 | Self::U16 => 0.0,
            Self::S8 => i8::MIN as f64,
            Self::S16 => i16::MIN as f64,
            Self::S32 => i32::MIN as f64,
            Self::F32 => f32::MIN as f64,
            Self::F64 => f64::MIN,
        }
    }

    /// Largest representable value.
    #[must_use]
    pub const fn max_value(self) -> f64 {
        match self {
            Self::U8 => u8::MAX as f64,
            Self::S8 => i8::MAX as f64,
            Self::U16 => u16::MAX as f64,
            Self::S16 => i16::MAX as f64,
            Self::S32 => i32::MAX as f64,
            Self::F32 => f32::MAX as f64,
            Self::F64 => f64::MAX,
        }
    }

    /// Converts `value` into the nearest representable value of this depth.
    ///
    /// Integer depths map NaN to zero, round half to even and clamp to the
    /// representable range. `F32` rounds through single precision.
    #[must_use]
    pub fn saturate(self, value: f64) -> f64 {
        match self {
            Self::F64 => value,
            Self::F32 => f64::from(value as f32),
            _ => {
                if value.is_nan() {
                    0.0
                } else {
                    value
                        .round_ties_even()
                        .clamp(self.min_value(), self.max_value())
                }
            }
        }
    }

    /// Bit pattern of an integer-depth value, sign-extended to 64 bits.
    #[must_use]
    pub fn to_bits(self, value: f64) -> i64 {
        self.saturate(value) as i64
    }

    /// Reinterprets the low bits of `bits` as a value of this integer depth.
    #[must_use]
    pub fn from_bits(self, bits: i64) -> f64 {
        match self {
            Self::U8 => f64::from(bits as u8),
            Self::S8 => f64::from(bits as i8),
            Self::U16 => f64::from(bits as u16),
            Self::S16 => f64::from(bits as i16),
            Self::S32 => f64::from(bits as i32),
            Self::F32 | Self::F64 => bits as f64,
        }
    }

    pub fn parse(token: &str) -> Result<Self, DepthError> {
        match token.trim().to_ascii_uppercase().as_str() {
            "8U" | "U8" => Ok(Self::U8),
            "8S" | "I8" => Ok(Self::S8),
            "16U" | "U16" => Ok(Self::U16),
            "16S" | "I16" => Ok(Self::S16),
            "32S" | "I32" => Ok(Self::S32),
            "32F" | "F32" => Ok(Self::F32),
            "64F" | "F64" => Ok(Self::F64),
            _ => Err(DepthError::UnknownDepth(token.to_string())),
        }
    }
}

impl std::fmt::Display for Depth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Depth plus channel count, e.g. `8UC3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MatType {
    depth: Depth,
    channels: usize,
}

impl MatType {
    pub fn new(depth: Depth, channels: usize) -> Result<Self, DepthError> {
        if channels == 0 || channels > MAX_CHANNELS {
            return Err(DepthError::InvalidChannels(channels));
        }
        Ok(Self { depth, channels })
    }

    /// `CN`-channel type of `depth`; the channel count is checked at compile time.
    #[must_use]
    pub const fn of<const CN: usize>(depth: Depth) -> Self {
        const { assert!(CN >= 1 && CN <= MAX_CHANNELS, "channel count out of range") };
        Self {
            depth,
            channels: CN,
        }
    }

    /// Single-channel type of `depth`.
    #[must_use]
    pub const fn single(depth: Depth) -> Self {
        Self { depth, channels: 1 }
    }

    #[must_use]
    pub const fn depth(self) -> Depth {
        self.depth
    }

    #[must_use]
    pub const fn channels(self) -> usize {
        self.channels
    }

    #[must_use]
    pub const fn elem_size(self) -> usize {
        self.depth.item_size() * self.channels
    }

    #[must_use]
    pub const fn with_depth(self, depth: Depth) -> Self {
        Self {
            depth,
            channels: self.channels,
        }
    }

    pub fn with_channels(self, channels: usize) -> Result<Self, DepthError> {
        Self::new(self.depth, channels)
    }

    /// Parses `8UC3`, `32FC1` or a bare depth such as `64F`.
    pub fn parse(token: &str) -> Result<Self, DepthError> {
        let upper = token.trim().to_ascii_uppercase();
        match upper.split_once('C') {
            Some((depth, channels)) => {
                let depth = Depth::parse(depth)?;
                let channels = channels
                    .parse::<usize>()
                    .map_err(|_| DepthError::InvalidTypeToken(token.to_string()))?;
                Self::new(depth, channels)
            }
            None => Depth::parse(&upper).map(Self::single),
        }
    }
}

impl std::fmt::Display for MatType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}C{}", self.depth.name(), self.channels)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepthError {
    UnknownDepth(String),
    InvalidChannels(usize),
    InvalidTypeToken(String),
}

impl DepthError {
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::UnknownDepth(_) => "dtype_unknown_depth",
            Self::InvalidChannels(_) => "dtype_channel_count_invalid",
            Self::InvalidTypeToken(_) => "dtype_type_token_invalid",
        }
    }
}

impl std::fmt::Display for DepthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownDepth(token) => write!(f, "unknown depth '{token}'"),
            Self::InvalidChannels(cn) => {
                write!(f, "channel count {cn} outside 1..={MAX_CHANNELS}")
            }
            Self::InvalidTypeToken(token) => write!(f, "invalid matrix type '{token}'"),
        }
    }
}

impl std::error::Error for DepthError {}

#[cfg(test)]
mod tests {
    use super::{DTYPE_REASON_CODES, Depth, DepthError, MatType};

    #[test]
    fn saturate_rounds_half_to_even_and_clamps() {
        assert_eq!(Depth::U8.saturate(2.5), 2.0);
        assert_eq!(Depth::U8.saturate(3.5), 4.0);
        assert_eq!(Depth::U8.saturate(-7.0), 0.0);
        assert_eq!(Depth::U8.saturate(300.0), 255.0);
        assert_eq!(Depth::S16.saturate(100_000.0), 32767.0);
        assert_eq!(Depth::S32.saturate(f64::NEG_INFINITY), f64::from(i32::MIN));
        assert_eq!(Depth::U16.saturate(f64::NAN), 0.0);
    }

    #[test]
    fn saturate_float_depths() {
        assert_eq!(Depth::F64.saturate(0.1), 0.1);
        assert_eq!(Depth::F32.saturate(0.1), f64::from(0.1f32));
        assert!(Depth::F32.saturate(f64::NAN).is_nan());
    }

    #[test]
    fn bit_roundtrip_wraps_to_depth() {
        assert_eq!(Depth::U8.from_bits(!Depth::U8.to_bits(5.0)), 250.0);
        assert_eq!(Depth::S32.from_bits(Depth::S32.to_bits(-1.0) << 4), -16.0);
        assert_eq!(Depth::U16.from_bits(0x1_0001), 1.0);
    }

    #[test]
    fn type_names_and_parsing() {
        let ty = MatType::new(Depth::U8, 3).expect("valid type");
        assert_eq!(ty.to_string(), "8UC3");
        assert_eq!(MatType::parse("8uc3").expect("parse"), ty);
        assert_eq!(
            MatType::parse("64F").expect("bare depth"),
            MatType::single(Depth::F64)
        );
        assert_eq!(ty.elem_size(), 3);
        assert_eq!(MatType::single(Depth::F64).elem_size(), 8);
    }

    #[test]
    fn const_types_match_parsed_tokens() {
        assert_eq!(MatType::of::<2>(Depth::S16), MatType::parse("16SC2").expect("type"));
        assert_eq!(MatType::of::<1>(Depth::F64), MatType::single(Depth::F64));
        assert_eq!(MatType::of::<4>(Depth::U8).to_string(), "8UC4");
    }

    #[test]
    fn invalid_types_are_rejected() {
        assert!(matches!(
            MatType::new(Depth::F32, 5),
            Err(DepthError::InvalidChannels(5))
        ));
        let err = MatType::parse("8UCx").expect_err("bad channel token");
        assert_eq!(err.reason_code(), "dtype_type_token_invalid");
        let err = Depth::parse("128Q").expect_err("unknown depth");
        assert!(DTYPE_REASON_CODES.contains(&err.reason_code()));
    }

    #[test]
    fn ranges_match_native_types() {
        assert_eq!(Depth::U16.max_value(), 65535.0);
        assert_eq!(Depth::S8.min_value(), -128.0);
        assert!(Depth::F32.is_float());
        assert!(Depth::S16.is_signed());
        assert!(!Depth::U8.is_signed());
    }
}
