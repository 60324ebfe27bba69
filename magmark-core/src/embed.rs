use crate::binmap::BinMap;
use crate::config::BitRatios;
use crate::fft::Spectrum;

/// Scale the magnitude at `bin` by the ratio for `bit`. Phase and every
/// other bin are left alone.
pub fn embed_bit(spectrum: &mut Spectrum, bin: usize, bit: bool, ratios: BitRatios) {
    if let Some(mag) = spectrum.magnitude.get_mut(bin) {
        *mag *= ratios.for_bit(bit);
    }
}

/// Write the pilot pattern and one payload segment into a frame's spectrum.
///
/// Data slot `s` receives `payload[bin_map.payload_index(segment, s, len)]`.
pub fn embed_frame(
    spectrum: &mut Spectrum,
    bin_map: &BinMap,
    segment: usize,
    payload: &[bool],
    ratios: BitRatios,
) {
    for (bin, expected) in bin_map.pilot_bins() {
        embed_bit(spectrum, bin, expected, ratios);
    }
    for (slot, bin) in bin_map.data_bins().enumerate() {
        let bit = payload[bin_map.payload_index(segment, slot, payload.len())];
        embed_bit(spectrum, bin, bit, ratios);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WatermarkConfig;

    fn flat_spectrum(bins: usize) -> Spectrum {
        Spectrum {
            magnitude: vec![0.2; bins],
            phase: (0..bins).map(|b| b as f64 * 0.1).collect(),
        }
    }

    #[test]
    fn embed_bit_touches_only_one_magnitude() {
        let ratios = WatermarkConfig::default().ratios();
        let original = flat_spectrum(129);

        for (bit, expected) in [(false, 0.85), (true, 1.15)] {
            let mut spectrum = original.clone();
            embed_bit(&mut spectrum, 20, bit, ratios);
            assert!((spectrum.magnitude[20] / original.magnitude[20] - expected).abs() < 1e-12);
            assert_eq!(spectrum.phase, original.phase);
            for b in (0..129).filter(|&b| b != 20) {
                assert_eq!(spectrum.magnitude[b], original.magnitude[b]);
            }
        }
    }

    #[test]
    fn embed_frame_writes_pilot_and_cyclic_payload() {
        let config = WatermarkConfig::default();
        let map = BinMap::new(&config).unwrap();
        let original = flat_spectrum(config.num_bins());
        let mut spectrum = original.clone();
        let payload = [true, false, true, true];

        embed_frame(&mut spectrum, &map, 0, &payload, config.ratios());

        for (bin, expected) in map.pilot_bins() {
            let ratio = spectrum.magnitude[bin] / original.magnitude[bin];
            assert!((ratio - config.ratios().for_bit(expected)).abs() < 1e-12);
        }
        for (slot, bin) in map.data_bins().enumerate() {
            let ratio = spectrum.magnitude[bin] / original.magnitude[bin];
            let bit = payload[slot % payload.len()];
            assert!((ratio - config.ratios().for_bit(bit)).abs() < 1e-12);
        }
        assert_eq!(spectrum.magnitude[5], original.magnitude[5]);
        assert_eq!(spectrum.magnitude[60], original.magnitude[60]);
    }
}
