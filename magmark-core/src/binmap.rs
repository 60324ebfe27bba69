use std::ops::Range;

use crate::config::WatermarkConfig;
use crate::error::ConfigError;

/// What a frequency bin carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinRole {
    /// Pilot bin with the bit it always carries.
    Pilot { expected: bool },
    /// Data bin; `slot` indexes the frame's data slots.
    Data { slot: usize },
    Unused,
}

/// Fixed assignment of frequency bins to pilot and data roles.
///
/// A pure function of the configuration: two maps built from equal
/// configurations are equal, so an encoder and a decoder constructed
/// independently agree on every bin. Built once per codec and shared
/// read-only between frames.
#[derive(Debug, Clone, PartialEq)]
pub struct BinMap {
    pilot_bins: Range<usize>,
    pilot_pattern: Vec<bool>,
    data_bins: Range<usize>,
    bin_resolution: f64,
}

impl BinMap {
    pub fn new(config: &WatermarkConfig) -> Result<Self, ConfigError> {
        let available = config.num_bins();
        check_region("pilot", &config.pilot_bins, available)?;
        check_region("data", &config.data_bins, available)?;

        let (p, d) = (&config.pilot_bins, &config.data_bins);
        if p.start < d.end && d.start < p.end {
            return Err(ConfigError::RegionsOverlap {
                pilot_start: p.start,
                pilot_end: p.end,
                data_start: d.start,
                data_end: d.end,
            });
        }
        if config.pilot_pattern.len() != p.len() {
            return Err(ConfigError::PilotPatternLength {
                pattern: config.pilot_pattern.len(),
                bins: p.len(),
            });
        }

        Ok(Self {
            pilot_bins: p.clone(),
            pilot_pattern: config.pilot_pattern.clone(),
            data_bins: d.clone(),
            bin_resolution: config.bin_resolution(),
        })
    }

    pub fn pilot_len(&self) -> usize {
        self.pilot_bins.len()
    }

    pub fn data_slots(&self) -> usize {
        self.data_bins.len()
    }

    pub fn pilot_pattern(&self) -> &[bool] {
        &self.pilot_pattern
    }

    /// Pilot bins paired with their expected bits, in pattern order.
    pub fn pilot_bins(&self) -> impl Iterator<Item = (usize, bool)> + '_ {
        self.pilot_bins.clone().zip(self.pilot_pattern.iter().copied())
    }

    /// Data bins in slot order.
    pub fn data_bins(&self) -> Range<usize> {
        self.data_bins.clone()
    }

    /// Bin carrying logical position `index`: pilot positions come first,
    /// then data slots.
    pub fn bin_for(&self, index: usize) -> Option<usize> {
        let pilot_len = self.pilot_len();
        if index < pilot_len {
            Some(self.pilot_bins.start + index)
        } else if index < pilot_len + self.data_slots() {
            Some(self.data_bins.start + index - pilot_len)
        } else {
            None
        }
    }

    pub fn role_of(&self, bin: usize) -> BinRole {
        if self.pilot_bins.contains(&bin) {
            BinRole::Pilot {
                expected: self.pilot_pattern[bin - self.pilot_bins.start],
            }
        } else if self.data_bins.contains(&bin) {
            BinRole::Data {
                slot: bin - self.data_bins.start,
            }
        } else {
            BinRole::Unused
        }
    }

    /// Centre frequency of `bin` in Hz.
    pub fn frequency_of(&self, bin: usize) -> f64 {
        bin as f64 * self.bin_resolution
    }

    /// Frames needed to carry one copy of a `payload_len`-bit payload.
    pub fn segments_per_copy(&self, payload_len: usize) -> usize {
        payload_len.div_ceil(self.data_slots())
    }

    /// Payload bit carried by data `slot` of copy segment `segment`.
    ///
    /// Slots past the end of the payload wrap around to its start, so a
    /// payload shorter than a frame is repeated cyclically within the frame.
    pub fn payload_index(&self, segment: usize, slot: usize, payload_len: usize) -> usize {
        (segment * self.data_slots() + slot) % payload_len
    }
}

fn check_region(
    region: &'static str,
    bins: &Range<usize>,
    available: usize,
) -> Result<(), ConfigError> {
    if bins.is_empty() {
        return Err(ConfigError::EmptyRegion(region));
    }
    // Bin 0 is DC: its phase is pinned, so it cannot carry a magnitude ratio.
    if bins.start == 0 || bins.end > available {
        return Err(ConfigError::BinRangeOutOfBounds {
            region,
            start: bins.start,
            end: bins.end,
            available,
        });
    }
    Ok(())
}
