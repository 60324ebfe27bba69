use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for watermark embedding and detection.
///
/// Every field is a named knob; nothing in the codec hard-codes a value that
/// lives here. Partial TOML/JSON documents deserialize with the remaining
/// fields taken from [`Default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatermarkConfig {
    /// Sample rate in Hz. Default: 8000.
    pub sample_rate: u32,
    /// FFT frame length in samples. Must be a power of 2. Default: 256.
    pub frame_length: usize,
    /// Hop between candidate frame starts the detector scans. Must divide
    /// `frame_length`. Equal to `frame_length` (the default) assumes the
    /// received audio starts on a frame boundary; smaller values let the
    /// pilot find the alignment of shifted audio. Embedding always uses
    /// back-to-back frames.
    pub frame_stride: usize,
    /// Bins carrying the pilot pattern (half-open). Default: 10..18.
    pub pilot_bins: Range<usize>,
    /// Expected pilot bits, one per pilot bin. Default: 0,1,0,1,0,1,0,1.
    pub pilot_pattern: Vec<bool>,
    /// Bins carrying payload bits (half-open). Default: 18..50.
    pub data_bins: Range<usize>,
    /// Magnitude ratio encoding a 0 bit. Default: 0.85.
    pub low_ratio: f64,
    /// Magnitude ratio encoding a 1 bit. Default: 1.15.
    pub high_ratio: f64,
    /// Number of payload copies embedded across frames. Default: 3.
    pub redundancy_factor: usize,
    /// Minimum fraction of pilot bits that must match for a frame to be
    /// accepted. Default: 1.0 (exact match).
    pub acceptance_threshold: f64,
    /// Baseline magnitudes below this (normalized by frame length) give no
    /// ratio; the bit is reported as unknown. Default: 1e-6.
    pub noise_floor: f64,
    /// Half-width in bins of the median window used to estimate a baseline
    /// when the original audio is unavailable. Default: 4.
    pub envelope_radius: usize,
    /// Payload length in bits. Default: 32.
    pub payload_len: usize,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            sample_rate: 8000,
            frame_length: 256,
            frame_stride: 256,
            pilot_bins: 10..18,
            pilot_pattern: vec![false, true, false, true, false, true, false, true],
            data_bins: 18..50,
            low_ratio: 0.85,
            high_ratio: 1.15,
            redundancy_factor: 3,
            acceptance_threshold: 1.0,
            noise_floor: 1e-6,
            envelope_radius: 4,
            payload_len: 32,
        }
    }
}

impl WatermarkConfig {
    /// Number of complex frequency bins (frame_length / 2 + 1).
    pub fn num_bins(&self) -> usize {
        self.frame_length / 2 + 1
    }

    /// Width of one bin in Hz.
    pub fn bin_resolution(&self) -> f64 {
        self.sample_rate as f64 / self.frame_length as f64
    }

    pub fn pilot_len(&self) -> usize {
        self.pilot_bins.len()
    }

    /// Data slots available in each frame.
    pub fn data_slots(&self) -> usize {
        self.data_bins.len()
    }

    pub fn ratios(&self) -> BitRatios {
        BitRatios {
            low: self.low_ratio,
            high: self.high_ratio,
        }
    }

    /// Check every field and cross-field constraint except the bin layout,
    /// which [`crate::BinMap::new`] validates.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        if !self.frame_length.is_power_of_two() || self.frame_length < 4 {
            return Err(ConfigError::FrameLengthNotPowerOfTwo(self.frame_length));
        }
        if self.frame_stride == 0
            || self.frame_stride > self.frame_length
            || !self.frame_length.is_multiple_of(self.frame_stride)
        {
            return Err(ConfigError::InvalidStride {
                stride: self.frame_stride,
                frame_length: self.frame_length,
            });
        }
        let ratios_ok = self.low_ratio.is_finite()
            && self.high_ratio.is_finite()
            && self.low_ratio > 0.0
            && self.low_ratio < self.high_ratio;
        if !ratios_ok {
            return Err(ConfigError::InvalidRatios {
                low: self.low_ratio,
                high: self.high_ratio,
            });
        }
        if self.redundancy_factor == 0 {
            return Err(ConfigError::ZeroRedundancy);
        }
        if !(self.acceptance_threshold > 0.0 && self.acceptance_threshold <= 1.0) {
            return Err(ConfigError::InvalidThreshold(self.acceptance_threshold));
        }
        if !self.noise_floor.is_finite() || self.noise_floor < 0.0 {
            return Err(ConfigError::InvalidNoiseFloor(self.noise_floor));
        }
        if self.envelope_radius == 0 {
            return Err(ConfigError::ZeroEnvelopeRadius);
        }
        if self.payload_len == 0 {
            return Err(ConfigError::ZeroPayloadLength);
        }
        Ok(())
    }
}

/// The two nominal magnitude ratios and the nearest-neighbour rule between
/// them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BitRatios {
    pub low: f64,
    pub high: f64,
}

impl BitRatios {
    pub fn for_bit(&self, bit: bool) -> f64 {
        if bit { self.high } else { self.low }
    }

    /// Decision boundary: the midpoint, 1.0 for the default 0.85/1.15.
    pub fn boundary(&self) -> f64 {
        (self.low + self.high) / 2.0
    }

    /// Distance of `ratio` from the nearer nominal ratio.
    pub fn distance(&self, ratio: f64) -> f64 {
        (ratio - self.low).abs().min((ratio - self.high).abs())
    }

    /// Distance reported for a bit that could not be decided.
    pub fn max_distance(&self) -> f64 {
        (self.high - self.low) / 2.0
    }
}
