use tracing::{debug, trace, warn};

use crate::binmap::BinMap;
use crate::config::WatermarkConfig;
use crate::detect::{self, Bit, DetectionResult, FrameReading, MajorityVote, envelope};
use crate::embed::embed_frame;
use crate::error::{InputError, Result};
use crate::fft::SpectralTransform;
use crate::frame::Framer;
use crate::payload::Payload;

/// Mono PCM samples at a known sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    sample_rate: u32,
    samples: Vec<f64>,
}

impl SampleBuffer {
    pub fn new(sample_rate: u32, samples: Vec<f64>) -> Self {
        Self {
            sample_rate,
            samples,
        }
    }

    pub fn from_f32(sample_rate: u32, samples: &[f32]) -> Self {
        Self::new(sample_rate, samples.iter().map(|&s| s as f64).collect())
    }

    pub fn to_f32(&self) -> Vec<f32> {
        self.samples.iter().map(|&s| s as f32).collect()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f64> {
        self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// What the detector divides received magnitudes by.
#[derive(Debug, Clone, Copy)]
pub enum Baseline<'a> {
    /// The unwatermarked audio, frame-aligned with the received audio.
    Original(&'a SampleBuffer),
    /// Blind detection: a median envelope of the received spectrum itself.
    Envelope,
}

/// Watermark encoder/decoder for one validated configuration.
///
/// Construction validates everything once; afterwards `encode` and `decode`
/// are pure functions of the configuration and their inputs.
#[derive(Debug, Clone)]
pub struct Codec {
    config: WatermarkConfig,
    bin_map: BinMap,
    /// Back-to-back frames the encoder writes.
    embed_framer: Framer,
    /// Candidate frames the decoder reads, `frame_stride` apart.
    scan_framer: Framer,
}

impl Codec {
    pub fn new(config: WatermarkConfig) -> Result<Self> {
        config.validate()?;
        let bin_map = BinMap::new(&config)?;
        let embed_framer = Framer::new(config.frame_length, config.frame_length);
        let scan_framer = Framer::new(config.frame_length, config.frame_stride);
        if config.redundancy_factor.is_multiple_of(2) {
            warn!(
                redundancy = config.redundancy_factor,
                "even redundancy factor: split votes decode as unknown bits"
            );
        }
        debug!(
            sample_rate = config.sample_rate,
            frame_length = config.frame_length,
            frame_stride = config.frame_stride,
            bin_hz = config.bin_resolution(),
            "codec configured"
        );
        Ok(Self {
            config,
            bin_map,
            embed_framer,
            scan_framer,
        })
    }

    pub fn config(&self) -> &WatermarkConfig {
        &self.config
    }

    pub fn bin_map(&self) -> &BinMap {
        &self.bin_map
    }

    /// Candidate frames the decoder scans in `len` samples.
    pub fn frame_count(&self, len: usize) -> usize {
        self.scan_framer.frame_count(len)
    }

    /// Frames spanned by one payload copy.
    pub fn segments_per_copy(&self) -> usize {
        self.bin_map.segments_per_copy(self.config.payload_len)
    }

    /// Frames the encoder watermarks: every copy, back to back from frame 0.
    pub fn frames_required(&self) -> usize {
        self.segments_per_copy() * self.config.redundancy_factor
    }

    /// Embed `payload` into `input`.
    ///
    /// The output has the same length and sample rate. Frames after the last
    /// payload copy, and samples after the last complete frame, are returned
    /// unchanged.
    pub fn encode(&self, input: &SampleBuffer, payload: &Payload) -> Result<SampleBuffer> {
        self.check_encode(input, payload)?;
        let mut transform = SpectralTransform::new(self.config.frame_length)?;
        let frames = (0..self.frames_required())
            .map(|index| self.encode_frame(&mut transform, input.samples(), payload, index))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.assemble(input, &frames))
    }

    /// Locate watermark-bearing frames via the pilot and recover the payload.
    ///
    /// Unwatermarked input is not an error: the result has
    /// `pilot_found == false`.
    pub fn decode(
        &self,
        received: &SampleBuffer,
        baseline: Baseline<'_>,
    ) -> Result<DetectionResult> {
        let num_frames = self.check_decode(received, baseline)?;
        let mut transform = SpectralTransform::new(self.config.frame_length)?;
        let readings = (0..num_frames)
            .map(|index| self.read_frame(&mut transform, received, baseline, index))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.aggregate(&readings))
    }

    pub(crate) fn check_encode(&self, input: &SampleBuffer, payload: &Payload) -> Result<()> {
        if payload.len() != self.config.payload_len {
            return Err(InputError::PayloadLength {
                expected: self.config.payload_len,
                got: payload.len(),
            }
            .into());
        }
        self.check_buffer(input)?;
        let available = self.embed_framer.frame_count(input.len());
        let needed = self.frames_required();
        if available < needed {
            return Err(InputError::InsufficientFrames {
                copies: self.config.redundancy_factor,
                needed,
                got: available,
            }
            .into());
        }
        Ok(())
    }

    /// Validates both buffers and returns the number of scan frames.
    pub(crate) fn check_decode(
        &self,
        received: &SampleBuffer,
        baseline: Baseline<'_>,
    ) -> Result<usize> {
        self.check_buffer(received)?;
        if let Baseline::Original(original) = baseline {
            self.check_buffer(original)?;
            if original.len() != received.len() {
                return Err(InputError::LengthMismatch {
                    original: original.len(),
                    received: received.len(),
                }
                .into());
            }
        }
        Ok(self.scan_framer.frame_count(received.len()))
    }

    fn check_buffer(&self, buffer: &SampleBuffer) -> Result<()> {
        if buffer.sample_rate() != self.config.sample_rate {
            return Err(InputError::SampleRateMismatch {
                expected: self.config.sample_rate,
                got: buffer.sample_rate(),
            }
            .into());
        }
        if buffer.len() < self.config.frame_length {
            return Err(InputError::TooShort {
                needed: self.config.frame_length,
                got: buffer.len(),
            }
            .into());
        }
        Ok(())
    }

    /// Watermarked samples of embed frame `index`, which must be below
    /// [`Codec::frames_required`].
    pub(crate) fn encode_frame(
        &self,
        transform: &mut SpectralTransform,
        samples: &[f64],
        payload: &Payload,
        index: usize,
    ) -> Result<Vec<f64>> {
        let segment = index % self.segments_per_copy();
        let mut spectrum = transform.forward(self.embed_framer.frame(samples, index))?;
        embed_frame(
            &mut spectrum,
            &self.bin_map,
            segment,
            payload.bits(),
            self.config.ratios(),
        );
        transform.inverse(&spectrum)
    }

    pub(crate) fn assemble(&self, input: &SampleBuffer, frames: &[Vec<f64>]) -> SampleBuffer {
        debug!(
            frames = frames.len(),
            copies = self.config.redundancy_factor,
            untouched_samples = input.len() - frames.len() * self.config.frame_length,
            "watermark embedded"
        );
        SampleBuffer::new(
            input.sample_rate(),
            self.embed_framer.splice(input.samples(), frames),
        )
    }

    pub(crate) fn read_frame(
        &self,
        transform: &mut SpectralTransform,
        received: &SampleBuffer,
        baseline: Baseline<'_>,
        index: usize,
    ) -> Result<FrameReading> {
        let measured = transform
            .forward(self.scan_framer.frame(received.samples(), index))?
            .magnitude;
        let reference = match baseline {
            Baseline::Original(original) => {
                transform
                    .forward(self.scan_framer.frame(original.samples(), index))?
                    .magnitude
            }
            Baseline::Envelope => envelope(&measured, self.config.envelope_radius),
        };
        let reading = detect::read_frame(
            &measured,
            &reference,
            &self.bin_map,
            self.config.noise_floor,
            self.config.ratios(),
        );
        trace!(
            frame = index,
            pilot_score = reading.pilot_score,
            pilot_quality = reading.pilot_quality,
            "frame read"
        );
        Ok(reading)
    }

    /// Accept frames by pilot score, settle on one frame alignment and fold
    /// that alignment's data bits, in frame order, into a majority vote.
    ///
    /// With overlapping scan frames, only one in every `phases` candidates
    /// can line up with the embedded frames. The phase whose accepted frames
    /// have the highest mean pilot quality wins; ties go to the earliest
    /// phase.
    ///
    /// The pilot does not say which segment of a copy a frame holds, and
    /// the first embedded frames may be missing or damaged. Every anchor
    /// (segment of the first accepted frame) is tried and the one with the
    /// largest vote margin wins. On a tie the anchor implied by the first
    /// frame's position in the received audio is kept. Only frames that
    /// fall inside the `C * R` embedded frames under that anchor vote.
    pub(crate) fn aggregate(&self, readings: &[FrameReading]) -> DetectionResult {
        let payload_len = self.config.payload_len;
        let ratios = self.config.ratios();
        let phases = self.scan_framer.phases();

        let mut quality = vec![(0.0f64, 0usize); phases];
        for (index, reading) in readings.iter().enumerate() {
            if reading.pilot_score >= self.config.acceptance_threshold {
                let (sum, count) = &mut quality[index % phases];
                *sum += reading.pilot_quality;
                *count += 1;
            }
        }
        let mut phase = None;
        let mut best_quality = f64::NEG_INFINITY;
        for (p, &(sum, count)) in quality.iter().enumerate() {
            if count > 0 && sum / count as f64 > best_quality {
                best_quality = sum / count as f64;
                phase = Some(p);
            }
        }

        let Some(phase) = phase else {
            let best = readings
                .iter()
                .map(|r| r.pilot_score)
                .fold(0.0f64, f64::max);
            debug!(
                frames = readings.len(),
                best_pilot_score = best,
                "watermark not found"
            );
            return DetectionResult {
                pilot_found: false,
                pilot_score: best,
                bits: vec![Bit::Unknown; payload_len],
                confidence: vec![ratios.max_distance(); payload_len],
                frames_scanned: readings.len(),
                accepted_frames: Vec::new(),
                watermark_offset: None,
            };
        };

        let candidates: Vec<usize> = readings
            .iter()
            .enumerate()
            .skip(phase)
            .step_by(phases)
            .filter(|(_, r)| r.pilot_score >= self.config.acceptance_threshold)
            .map(|(index, _)| index)
            .collect();
        // The winning phase has at least one accepted frame.
        let first = candidates[0];

        let watermark_offset = self.scan_framer.offset(first);
        // Whole or partial frames ahead of the first accepted one are taken
        // as lost copies of the preceding segments.
        let positional =
            watermark_offset.div_ceil(self.config.frame_length) % self.segments_per_copy();
        let mut anchor = positional;
        let (mut accepted, mut vote) = self.vote_from(readings, &candidates, first, anchor);
        for candidate in 0..self.segments_per_copy() {
            let (frames, tally) = self.vote_from(readings, &candidates, first, candidate);
            if tally.margin() > vote.margin() {
                (anchor, accepted, vote) = (candidate, frames, tally);
            }
        }
        let (bits, confidence) = vote.finish();
        let pilot_score = accepted
            .iter()
            .map(|&index| readings[index].pilot_score)
            .sum::<f64>()
            / accepted.len() as f64;

        debug!(
            frames = readings.len(),
            accepted = accepted.len(),
            phase,
            anchor,
            watermark_offset,
            pilot_score,
            unknown_bits = bits.iter().filter(|b| **b == Bit::Unknown).count(),
            "watermark found"
        );
        DetectionResult {
            pilot_found: true,
            pilot_score,
            bits,
            confidence,
            frames_scanned: readings.len(),
            accepted_frames: accepted,
            watermark_offset: Some(watermark_offset),
        }
    }

    /// Votes of the `candidates` that fall inside the embedded frames when
    /// frame `first` carries segment `anchor`.
    fn vote_from(
        &self,
        readings: &[FrameReading],
        candidates: &[usize],
        first: usize,
        anchor: usize,
    ) -> (Vec<usize>, MajorityVote) {
        let phases = self.scan_framer.phases();
        let segments = self.segments_per_copy();
        let payload_len = self.config.payload_len;
        let mut vote = MajorityVote::new(payload_len, self.config.ratios());
        let mut accepted = Vec::new();
        for &index in candidates {
            let position = (index - first) / phases + anchor;
            if position >= self.frames_required() {
                break;
            }
            let segment = position % segments;
            for (slot, &ratio) in readings[index].data.iter().enumerate() {
                vote.add(
                    self.bin_map.payload_index(segment, slot, payload_len),
                    ratio,
                );
            }
            accepted.push(index);
        }
        (accepted, vote)
    }
}
