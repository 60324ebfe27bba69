use crate::binmap::BinMap;
use crate::config::BitRatios;
use crate::payload::Payload;

/// A decoded bit. `Unknown` is a normal outcome: the bin was below the
/// noise floor, or repeated copies disagreed evenly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bit {
    Zero,
    One,
    Unknown,
}

impl Bit {
    pub fn to_bool(self) -> Option<bool> {
        match self {
            Bit::Zero => Some(false),
            Bit::One => Some(true),
            Bit::Unknown => None,
        }
    }
}

impl From<bool> for Bit {
    fn from(bit: bool) -> Self {
        if bit { Bit::One } else { Bit::Zero }
    }
}

/// Outcome of a decode. "No watermark" is `pilot_found == false`, not an
/// error.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    pub pilot_found: bool,
    /// Mean pilot score of the accepted frames, or the best score seen when
    /// none was accepted.
    pub pilot_score: f64,
    /// One entry per payload bit; all `Unknown` when the pilot was not found.
    pub bits: Vec<Bit>,
    /// Per-bit distance of the measured ratio from the nearest nominal
    /// ratio. 0.0 is a perfect match; undecided bits report half the gap
    /// between the nominal ratios.
    pub confidence: Vec<f64>,
    pub frames_scanned: usize,
    /// Indices of the accepted frames on the winning alignment, in frame
    /// order.
    pub accepted_frames: Vec<usize>,
    /// Sample offset of the first accepted frame.
    pub watermark_offset: Option<usize>,
}

impl DetectionResult {
    /// The recovered payload, if every bit was decided.
    pub fn payload(&self) -> Option<Payload> {
        if !self.pilot_found {
            return None;
        }
        self.bits
            .iter()
            .map(|b| b.to_bool())
            .collect::<Option<Vec<bool>>>()
            .map(Payload::from_bits)
    }
}

/// Magnitude ratio at `bin`, or `None` when the baseline magnitude is below
/// `noise_floor` (or the bin does not exist).
pub fn ratio(measured: &[f64], baseline: &[f64], bin: usize, noise_floor: f64) -> Option<f64> {
    let m = *measured.get(bin)?;
    let b = *baseline.get(bin)?;
    if b < noise_floor || b <= 0.0 {
        return None;
    }
    Some(m / b)
}

/// Nearest-neighbour classification against the two nominal ratios.
pub fn classify(ratio: Option<f64>, ratios: BitRatios) -> Bit {
    match ratio {
        Some(r) if r < ratios.boundary() => Bit::Zero,
        Some(_) => Bit::One,
        None => Bit::Unknown,
    }
}

/// Smooth envelope estimate for detection without the original audio.
///
/// Each bin's baseline is the median magnitude of up to `radius` neighbours
/// on either side, excluding the bin itself and DC.
pub fn envelope(magnitude: &[f64], radius: usize) -> Vec<f64> {
    let n = magnitude.len();
    let mut neighbours = Vec::with_capacity(2 * radius);
    (0..n)
        .map(|bin| {
            neighbours.clear();
            let lo = bin.saturating_sub(radius).max(1);
            let hi = (bin + radius).min(n.saturating_sub(1));
            neighbours.extend((lo..=hi).filter(|&b| b != bin).map(|b| magnitude[b]));
            median(&mut neighbours)
        })
        .collect()
}

fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len().is_multiple_of(2) {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// What one frame says about the watermark.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReading {
    /// Fraction of pilot bins whose inferred bit matches the pattern.
    pub pilot_score: f64,
    /// 1.0 when every pilot ratio sits exactly on its nominal value, falling
    /// to 0.0 at the decision boundary. Ranks competing frame alignments.
    pub pilot_quality: f64,
    /// Ratio per data slot, `None` below the noise floor.
    pub data: Vec<Option<f64>>,
}

/// Measure pilot and data ratios of one frame against its baseline.
pub fn read_frame(
    measured: &[f64],
    baseline: &[f64],
    bin_map: &BinMap,
    noise_floor: f64,
    ratios: BitRatios,
) -> FrameReading {
    let mut matches = 0usize;
    let mut distance = 0.0f64;
    for (bin, expected) in bin_map.pilot_bins() {
        let r = ratio(measured, baseline, bin, noise_floor);
        if classify(r, ratios) == Bit::from(expected) {
            matches += 1;
        }
        distance += r.map_or(ratios.max_distance(), |r| ratios.distance(r));
    }
    let pilot_len = bin_map.pilot_len() as f64;
    let data = bin_map
        .data_bins()
        .map(|bin| ratio(measured, baseline, bin, noise_floor))
        .collect();
    FrameReading {
        pilot_score: matches as f64 / pilot_len,
        pilot_quality: (1.0 - distance / pilot_len / ratios.max_distance()).clamp(0.0, 1.0),
        data,
    }
}

#[derive(Debug, Clone, Default)]
struct Tally {
    ones: usize,
    zeros: usize,
    one_sum: f64,
    zero_sum: f64,
}

/// Per-bit majority vote over repeated payload copies.
///
/// Observations are folded in frame order. Below-noise-floor observations
/// abstain. A tie, including no votes at all, yields `Bit::Unknown`.
#[derive(Debug, Clone)]
pub struct MajorityVote {
    tallies: Vec<Tally>,
    ratios: BitRatios,
}

impl MajorityVote {
    pub fn new(payload_len: usize, ratios: BitRatios) -> Self {
        Self {
            tallies: vec![Tally::default(); payload_len],
            ratios,
        }
    }

    pub fn add(&mut self, index: usize, ratio: Option<f64>) {
        let tally = &mut self.tallies[index];
        match (classify(ratio, self.ratios), ratio) {
            (Bit::One, Some(r)) => {
                tally.ones += 1;
                tally.one_sum += r;
            }
            (Bit::Zero, Some(r)) => {
                tally.zeros += 1;
                tally.zero_sum += r;
            }
            _ => {}
        }
    }

    /// Total lead of the winning side over all bits. Higher when the folded
    /// observations agree with each other.
    pub fn margin(&self) -> usize {
        self.tallies.iter().map(|t| t.ones.abs_diff(t.zeros)).sum()
    }

    /// Decided bits and their confidence (distance of the winning side's
    /// mean ratio from the nearest nominal ratio).
    pub fn finish(self) -> (Vec<Bit>, Vec<f64>) {
        let ratios = self.ratios;
        self.tallies
            .into_iter()
            .map(|t| match t.ones.cmp(&t.zeros) {
                std::cmp::Ordering::Greater => {
                    (Bit::One, ratios.distance(t.one_sum / t.ones as f64))
                }
                std::cmp::Ordering::Less => {
                    (Bit::Zero, ratios.distance(t.zero_sum / t.zeros as f64))
                }
                std::cmp::Ordering::Equal => (Bit::Unknown, ratios.max_distance()),
            })
            .unzip()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WatermarkConfig;
    use crate::embed::{embed_bit, embed_frame};
    use crate::fft::Spectrum;

    fn ratios() -> BitRatios {
        WatermarkConfig::default().ratios()
    }

    fn spectrum(bins: usize) -> Spectrum {
        Spectrum {
            magnitude: (0..bins).map(|b| 0.01 + 0.001 * (b % 7) as f64).collect(),
            phase: vec![0.4; bins],
        }
    }

    #[test]
    fn embedded_ratio_is_recovered_exactly() {
        let original = spectrum(129);
        for (bit, nominal) in [(false, 0.85), (true, 1.15)] {
            let mut marked = original.clone();
            embed_bit(&mut marked, 30, bit, ratios());
            let r = ratio(&marked.magnitude, &original.magnitude, 30, 1e-6).unwrap();
            assert!((r - nominal).abs() < 1e-12);
            assert_eq!(classify(Some(r), ratios()), Bit::from(bit));
        }
    }

    #[test]
    fn boundary_goes_to_one() {
        assert_eq!(classify(Some(0.9999), ratios()), Bit::Zero);
        assert_eq!(classify(Some(1.0), ratios()), Bit::One);
        assert_eq!(classify(None, ratios()), Bit::Unknown);
    }

    #[test]
    fn below_noise_floor_is_unknown() {
        let measured = vec![0.5; 4];
        let baseline = vec![1e-9, 0.5, 0.0, 0.5];
        assert_eq!(ratio(&measured, &baseline, 0, 1e-6), None);
        assert_eq!(ratio(&measured, &baseline, 2, 0.0), None);
        assert_eq!(ratio(&measured, &baseline, 1, 1e-6), Some(1.0));
        assert_eq!(ratio(&measured, &baseline, 9, 1e-6), None);
    }

    #[test]
    fn pilot_score_counts_matches() {
        let config = WatermarkConfig::default();
        let map = BinMap::new(&config).unwrap();
        let original = spectrum(config.num_bins());

        let unmarked = read_frame(
            &original.magnitude,
            &original.magnitude,
            &map,
            config.noise_floor,
            ratios(),
        );
        // Ratio 1.0 everywhere reads as all ones: half the alternating pilot.
        assert!((unmarked.pilot_score - 0.5).abs() < 1e-12);

        let mut marked = original.clone();
        embed_frame(&mut marked, &map, 0, &[true, false], ratios());
        let reading = read_frame(
            &marked.magnitude,
            &original.magnitude,
            &map,
            config.noise_floor,
            ratios(),
        );
        assert_eq!(reading.pilot_score, 1.0);
        assert!(reading.pilot_quality > 0.999_999);
        assert!(unmarked.pilot_quality.abs() < 1e-9);
        assert_eq!(reading.data.len(), map.data_slots());
        assert!((reading.data[1].unwrap() - 0.85).abs() < 1e-12);
    }

    #[test]
    fn envelope_tracks_smooth_spectrum() {
        let flat = vec![0.3; 64];
        let env = envelope(&flat, 4);
        assert!(env[1..].iter().all(|&v| (v - 0.3).abs() < 1e-12));

        let mut spiky = flat.clone();
        spiky[20] = 0.3 * 1.15;
        let env = envelope(&spiky, 4);
        assert!((env[20] - 0.3).abs() < 1e-12, "spike excluded from its own baseline");
    }

    #[test]
    fn majority_vote_and_ties() {
        let mut vote = MajorityVote::new(3, ratios());
        vote.add(0, Some(1.15));
        vote.add(0, Some(1.13));
        vote.add(0, Some(0.85));
        vote.add(1, Some(0.85));
        vote.add(1, Some(1.15));
        vote.add(2, None);
        assert_eq!(vote.margin(), 1);
        let (bits, confidence) = vote.finish();
        assert_eq!(bits, vec![Bit::One, Bit::Unknown, Bit::Unknown]);
        assert!((confidence[0] - 0.01).abs() < 1e-12);
        assert!((confidence[1] - 0.15).abs() < 1e-12);
    }

    #[test]
    fn payload_only_when_decided() {
        let mut result = DetectionResult {
            pilot_found: true,
            pilot_score: 1.0,
            bits: vec![Bit::One, Bit::Zero],
            confidence: vec![0.0, 0.0],
            frames_scanned: 1,
            accepted_frames: vec![0],
            watermark_offset: Some(0),
        };
        assert_eq!(result.payload(), Some(Payload::from_bits(vec![true, false])));
        result.bits[1] = Bit::Unknown;
        assert_eq!(result.payload(), None);
    }
}
