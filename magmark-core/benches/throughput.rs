use criterion::{Criterion, black_box, criterion_group, criterion_main};

use magmark_core::{Baseline, Codec, Payload, SampleBuffer, SpectralTransform, WatermarkConfig};

fn make_test_audio(num_samples: usize, sample_rate: u32) -> SampleBuffer {
    let mut samples = vec![0.0f64; num_samples];
    for (i, sample) in samples.iter_mut().enumerate() {
        let t = i as f64 / sample_rate as f64;
        for k in 1u32..60 {
            let freq = k as f64 * 61.0;
            let amp = 1.0 / (k as f64).sqrt();
            *sample += amp * (2.0 * std::f64::consts::PI * freq * t + k as f64).sin();
        }
    }
    let peak = samples.iter().map(|s| s.abs()).fold(0.0f64, f64::max);
    if peak > 0.0 {
        for s in samples.iter_mut() {
            *s *= 0.5 / peak;
        }
    }
    SampleBuffer::new(sample_rate, samples)
}

/// Enough copies to watermark 10 seconds of 8 kHz audio end to end.
fn long_config() -> WatermarkConfig {
    WatermarkConfig {
        redundancy_factor: 311,
        ..WatermarkConfig::default()
    }
}

fn bench_encode(c: &mut Criterion) {
    let codec = Codec::new(long_config()).unwrap();
    let payload = Payload::from_hex("deadbeef").unwrap();
    let audio = make_test_audio(80000, 8000);

    c.bench_function("encode_10s_8khz", |b| {
        b.iter(|| {
            black_box(codec.encode(black_box(&audio), &payload).unwrap());
        });
    });
}

fn bench_decode_original(c: &mut Criterion) {
    let codec = Codec::new(long_config()).unwrap();
    let payload = Payload::from_hex("deadbeef").unwrap();
    let audio = make_test_audio(80000, 8000);
    let marked = codec.encode(&audio, &payload).unwrap();

    c.bench_function("decode_original_10s_8khz", |b| {
        b.iter(|| {
            black_box(
                codec
                    .decode(black_box(&marked), Baseline::Original(&audio))
                    .unwrap(),
            );
        });
    });
}

fn bench_decode_blind(c: &mut Criterion) {
    let codec = Codec::new(long_config()).unwrap();
    let payload = Payload::from_hex("deadbeef").unwrap();
    let audio = make_test_audio(80000, 8000);
    let marked = codec.encode(&audio, &payload).unwrap();

    c.bench_function("decode_envelope_10s_8khz", |b| {
        b.iter(|| {
            black_box(codec.decode(black_box(&marked), Baseline::Envelope).unwrap());
        });
    });
}

#[cfg(feature = "parallel")]
fn bench_parallel_encode(c: &mut Criterion) {
    let codec = Codec::new(long_config()).unwrap();
    let payload = Payload::from_hex("deadbeef").unwrap();
    let audio = make_test_audio(80000, 8000);

    c.bench_function("parallel_encode_10s_8khz", |b| {
        b.iter(|| {
            black_box(codec.encode_parallel(black_box(&audio), &payload).unwrap());
        });
    });
}

#[cfg(feature = "parallel")]
fn bench_parallel_decode(c: &mut Criterion) {
    let codec = Codec::new(WatermarkConfig {
        frame_stride: 64,
        ..long_config()
    })
    .unwrap();
    let payload = Payload::from_hex("deadbeef").unwrap();
    let audio = make_test_audio(80000, 8000);
    let marked = codec.encode(&audio, &payload).unwrap();

    c.bench_function("parallel_decode_stride64_10s_8khz", |b| {
        b.iter(|| {
            black_box(
                codec
                    .decode_parallel(black_box(&marked), Baseline::Original(&audio))
                    .unwrap(),
            );
        });
    });
}

fn bench_fft_frame(c: &mut Criterion) {
    let config = WatermarkConfig::default();
    let audio = make_test_audio(config.frame_length, config.sample_rate);
    let mut transform = SpectralTransform::new(config.frame_length).unwrap();

    c.bench_function("fft_forward_inverse_256", |b| {
        b.iter(|| {
            let spectrum = transform.forward(black_box(audio.samples())).unwrap();
            black_box(transform.inverse(&spectrum).unwrap());
        });
    });
}

#[cfg(not(feature = "parallel"))]
criterion_group!(
    benches,
    bench_encode,
    bench_decode_original,
    bench_decode_blind,
    bench_fft_frame,
);

#[cfg(feature = "parallel")]
criterion_group!(
    benches,
    bench_encode,
    bench_decode_original,
    bench_decode_blind,
    bench_fft_frame,
    bench_parallel_encode,
    bench_parallel_decode,
);

criterion_main!(benches);
