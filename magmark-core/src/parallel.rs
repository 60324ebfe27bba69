//! Optional parallel processing using rayon.
//!
//! Enable with the `parallel` feature flag. Frames are split into batches of
//! 64; each batch is one rayon task with its own [`SpectralTransform`].
//! Batches are collected in frame order and the vote fold stays sequential,
//! so output matches the sequential path exactly.

use rayon::prelude::*;

use crate::codec::{Baseline, Codec, SampleBuffer};
use crate::detect::DetectionResult;
use crate::error::Result;
use crate::fft::SpectralTransform;
use crate::payload::Payload;

/// Number of frames processed per rayon task.
const BATCH_SIZE: usize = 64;

/// Run `per_frame` over frames `0..num_frames` in parallel batches,
/// returning results in frame order.
fn process_batched<T, F>(frame_length: usize, num_frames: usize, per_frame: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(&mut SpectralTransform, usize) -> Result<T> + Sync,
{
    let batches = (0..num_frames.div_ceil(BATCH_SIZE))
        .into_par_iter()
        .map(|batch| -> Result<Vec<T>> {
            let mut transform = SpectralTransform::new(frame_length)?;
            let start = batch * BATCH_SIZE;
            let end = (start + BATCH_SIZE).min(num_frames);
            (start..end)
                .map(|index| per_frame(&mut transform, index))
                .collect()
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(batches.into_iter().flatten().collect())
}

impl Codec {
    /// [`Codec::encode`] with frames processed in parallel.
    pub fn encode_parallel(&self, input: &SampleBuffer, payload: &Payload) -> Result<SampleBuffer> {
        self.check_encode(input, payload)?;
        let frames = process_batched(
            self.config().frame_length,
            self.frames_required(),
            |transform, index| self.encode_frame(transform, input.samples(), payload, index),
        )?;
        Ok(self.assemble(input, &frames))
    }

    /// [`Codec::decode`] with frame measurement done in parallel.
    pub fn decode_parallel(
        &self,
        received: &SampleBuffer,
        baseline: Baseline<'_>,
    ) -> Result<DetectionResult> {
        let num_frames = self.check_decode(received, baseline)?;
        let readings = process_batched(
            self.config().frame_length,
            num_frames,
            |transform, index| self.read_frame(transform, received, baseline, index),
        )?;
        Ok(self.aggregate(&readings))
    }
}
