use realfft::num_complex::Complex64;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use std::sync::Arc;

use crate::error::{ConfigError, Error, Result};

/// Magnitude/phase view of one frame, `frame_length / 2 + 1` bins.
///
/// Magnitudes are normalized by the frame length, so a full-scale sinusoid
/// centred on a bin reads 0.5 regardless of frame size.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    pub magnitude: Vec<f64>,
    pub phase: Vec<f64>,
}

impl Spectrum {
    pub fn num_bins(&self) -> usize {
        self.magnitude.len()
    }
}

/// Pre-planned real FFT for a fixed frame length.
///
/// Holds its own scratch buffers, so one instance is needed per thread.
pub struct SpectralTransform {
    frame_length: usize,
    forward: Arc<dyn RealToComplex<f64>>,
    inverse: Arc<dyn ComplexToReal<f64>>,
    time_buf: Vec<f64>,
    freq_buf: Vec<Complex64>,
    scratch_fwd: Vec<Complex64>,
    scratch_inv: Vec<Complex64>,
}

impl SpectralTransform {
    /// Plan forward and inverse transforms. `frame_length` must be a power
    /// of two.
    pub fn new(frame_length: usize) -> Result<Self> {
        if !frame_length.is_power_of_two() || frame_length < 4 {
            return Err(ConfigError::FrameLengthNotPowerOfTwo(frame_length).into());
        }
        let mut planner = RealFftPlanner::<f64>::new();
        let forward = planner.plan_fft_forward(frame_length);
        let inverse = planner.plan_fft_inverse(frame_length);

        let time_buf = forward.make_input_vec();
        let freq_buf = forward.make_output_vec();
        let scratch_fwd = forward.make_scratch_vec();
        let scratch_inv = inverse.make_scratch_vec();

        Ok(Self {
            frame_length,
            forward,
            inverse,
            time_buf,
            freq_buf,
            scratch_fwd,
            scratch_inv,
        })
    }

    pub fn frame_length(&self) -> usize {
        self.frame_length
    }

    pub fn num_bins(&self) -> usize {
        self.frame_length / 2 + 1
    }

    /// Time domain -> magnitude/phase spectrum.
    pub fn forward(&mut self, frame: &[f64]) -> Result<Spectrum> {
        self.check_len(frame.len())?;
        self.time_buf.copy_from_slice(frame);
        self.forward
            .process_with_scratch(&mut self.time_buf, &mut self.freq_buf, &mut self.scratch_fwd)
            .map_err(|e| Error::Fft(e.to_string()))?;

        let scale = 1.0 / self.frame_length as f64;
        let (magnitude, phase) = self
            .freq_buf
            .iter()
            .map(|c| (c.norm() * scale, c.arg()))
            .unzip();
        Ok(Spectrum { magnitude, phase })
    }

    /// Magnitude/phase spectrum -> time domain.
    ///
    /// Each bin is rebuilt as `magnitude * e^(i*phase)`. The DC and Nyquist
    /// bins of a real signal have no imaginary part, so theirs is dropped.
    pub fn inverse(&mut self, spectrum: &Spectrum) -> Result<Vec<f64>> {
        if spectrum.num_bins() != self.num_bins() || spectrum.phase.len() != self.num_bins() {
            return Err(Error::Fft(format!(
                "expected {} bins, got {}",
                self.num_bins(),
                spectrum.num_bins()
            )));
        }
        let scale = self.frame_length as f64;
        for (bin, (&mag, &phase)) in self
            .freq_buf
            .iter_mut()
            .zip(spectrum.magnitude.iter().zip(&spectrum.phase))
        {
            *bin = Complex64::from_polar(mag * scale, phase);
        }
        let last = self.freq_buf.len() - 1;
        self.freq_buf[0].im = 0.0;
        self.freq_buf[last].im = 0.0;

        // realfft leaves the inverse unnormalized.
        let mut out = vec![0.0f64; self.frame_length];
        self.inverse
            .process_with_scratch(&mut self.freq_buf, &mut out, &mut self.scratch_inv)
            .map_err(|e| Error::Fft(e.to_string()))?;
        let norm = 1.0 / self.frame_length as f64;
        for s in out.iter_mut() {
            *s *= norm;
        }
        Ok(out)
    }

    fn check_len(&self, got: usize) -> Result<()> {
        if got != self.frame_length {
            return Err(Error::Fft(format!(
                "expected {} samples, got {got}",
                self.frame_length
            )));
        }
        Ok(())
    }
}
