pub mod binmap;
pub mod codec;
pub mod config;
pub mod detect;
pub mod embed;
pub mod error;
pub mod fft;
pub mod frame;
pub mod payload;

#[cfg(feature = "parallel")]
pub mod parallel;

// Re-export primary API types
pub use binmap::{BinMap, BinRole};
pub use codec::{Baseline, Codec, SampleBuffer};
pub use config::{BitRatios, WatermarkConfig};
pub use detect::{Bit, DetectionResult};
pub use error::{ConfigError, Error, InputError};
pub use fft::{SpectralTransform, Spectrum};
pub use payload::Payload;

/// Embed a watermark with a one-off codec.
///
/// Validates `config` on every call; build a [`Codec`] once to reuse it.
pub fn encode(
    input: &SampleBuffer,
    payload: &Payload,
    config: &WatermarkConfig,
) -> error::Result<SampleBuffer> {
    Codec::new(config.clone())?.encode(input, payload)
}

/// Detect a watermark with a one-off codec.
pub fn decode(
    received: &SampleBuffer,
    baseline: Baseline<'_>,
    config: &WatermarkConfig,
) -> error::Result<DetectionResult> {
    Codec::new(config.clone())?.decode(received, baseline)
}
