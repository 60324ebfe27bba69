use thiserror::Error;

/// Invalid codec configuration. Raised once, when a [`crate::Codec`] or
/// [`crate::BinMap`] is built.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("sample rate must be non-zero")]
    ZeroSampleRate,

    #[error("frame length must be a power of two >= 4, got {0}")]
    FrameLengthNotPowerOfTwo(usize),

    #[error("frame stride {stride} must be non-zero and divide frame length {frame_length}")]
    InvalidStride { stride: usize, frame_length: usize },

    #[error("{region} bins {start}..{end} exceed available bins 1..{available}")]
    BinRangeOutOfBounds {
        region: &'static str,
        start: usize,
        end: usize,
        available: usize,
    },

    #[error("{0} region is empty")]
    EmptyRegion(&'static str),

    #[error("pilot bins {pilot_start}..{pilot_end} overlap data bins {data_start}..{data_end}")]
    RegionsOverlap {
        pilot_start: usize,
        pilot_end: usize,
        data_start: usize,
        data_end: usize,
    },

    #[error("pilot pattern has {pattern} bits but the pilot region has {bins} bins")]
    PilotPatternLength { pattern: usize, bins: usize },

    #[error("ratios must satisfy 0 < low < high, got low={low}, high={high}")]
    InvalidRatios { low: f64, high: f64 },

    #[error("redundancy factor must be at least 1")]
    ZeroRedundancy,

    #[error("acceptance threshold must be in (0, 1], got {0}")]
    InvalidThreshold(f64),

    #[error("noise floor must be finite and non-negative, got {0}")]
    InvalidNoiseFloor(f64),

    #[error("envelope radius must be at least 1")]
    ZeroEnvelopeRadius,

    #[error("payload length must be at least 1 bit")]
    ZeroPayloadLength,
}

/// Caller-supplied input that does not fit the configured codec.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("audio too short: need at least {needed} samples, got {got}")]
    TooShort { needed: usize, got: usize },

    #[error("sample rate mismatch: codec expects {expected} Hz, buffer is {got} Hz")]
    SampleRateMismatch { expected: u32, got: u32 },

    #[error("original has {original} samples but received audio has {received}")]
    LengthMismatch { original: usize, received: usize },

    #[error("invalid payload length: expected {expected} bits, got {got}")]
    PayloadLength { expected: usize, got: usize },

    #[error("{copies} payload copies need {needed} frames, audio holds {got}")]
    InsufficientFrames {
        copies: usize,
        needed: usize,
        got: usize,
    },

    #[error("invalid hex payload: {0}")]
    InvalidHex(String),

    #[error("invalid text payload: {0}")]
    InvalidText(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("input error: {0}")]
    Input(#[from] InputError),

    #[error("FFT error: {0}")]
    Fft(String),
}

pub type Result<T> = std::result::Result<T, Error>;
