/// Slices a sample buffer into fixed-length frames starting every `stride`
/// samples.
///
/// Only complete frames are produced; samples after the last complete frame
/// never belong to a frame. Frames are rectangular: the bin scaling the
/// embedder applies survives resynthesis exactly only without a taper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Framer {
    frame_length: usize,
    stride: usize,
}

impl Framer {
    /// Both values are assumed validated by [`crate::WatermarkConfig::validate`].
    pub fn new(frame_length: usize, stride: usize) -> Self {
        Self {
            frame_length,
            stride,
        }
    }

    pub fn frame_length(&self) -> usize {
        self.frame_length
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Frames per `frame_length` of audio; 1 when frames do not overlap.
    pub fn phases(&self) -> usize {
        self.frame_length / self.stride
    }

    /// Number of complete frames in `len` samples.
    pub fn frame_count(&self, len: usize) -> usize {
        if len < self.frame_length {
            0
        } else {
            (len - self.frame_length) / self.stride + 1
        }
    }

    /// First sample of frame `index`.
    pub fn offset(&self, index: usize) -> usize {
        index * self.stride
    }

    /// Frame `index` of `samples`. The caller guarantees
    /// `index < frame_count(samples.len())`.
    pub fn frame<'a>(&self, samples: &'a [f64], index: usize) -> &'a [f64] {
        let start = self.offset(index);
        &samples[start..start + self.frame_length]
    }

    /// Copy of `original` with frame `k` replaced by `frames[k]`.
    ///
    /// Later frames win where frames overlap; the embedder only splices
    /// with a non-overlapping framer.
    pub fn splice(&self, original: &[f64], frames: &[Vec<f64>]) -> Vec<f64> {
        let mut out = original.to_vec();
        for (index, frame) in frames.iter().enumerate() {
            let start = self.offset(index);
            out[start..start + frame.len()].copy_from_slice(frame);
        }
        out
    }
}
