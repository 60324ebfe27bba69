use clap::{Args, Parser, Subcommand};
use magmark_core::payload::{decode_text, text_bits_len};
use magmark_core::{Baseline, Bit, Codec, Payload, SampleBuffer, WatermarkConfig};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "magmark", about = "FFT magnitude-ratio audio watermarking", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Embed a watermark into a WAV file
    Embed {
        /// Input WAV file
        #[arg(short, long)]
        input: PathBuf,

        /// Output WAV file (32-bit float)
        #[arg(short, long)]
        output: PathBuf,

        /// Payload as a hex string
        #[arg(short, long, conflicts_with = "text", required_unless_present = "text")]
        payload: Option<String>,

        /// Payload as UTF-8 text, prefixed with a 16-bit length
        #[arg(short, long)]
        text: Option<String>,

        #[command(flatten)]
        tuning: Tuning,
    },
    /// Detect a watermark in a WAV file
    Detect {
        /// Input WAV file
        #[arg(short, long)]
        input: PathBuf,

        /// Unwatermarked original; without it the baseline is estimated
        /// from the input's own spectrum
        #[arg(long)]
        original: Option<PathBuf>,

        /// Expected payload length in bits
        #[arg(long, conflicts_with = "text_bytes")]
        payload_bits: Option<usize>,

        /// Expected text length in bytes; decodes the payload as text
        #[arg(long)]
        text_bytes: Option<usize>,

        #[command(flatten)]
        tuning: Tuning,
    },
}

/// Options shared by both subcommands. Flags override the config file.
#[derive(Args)]
struct Tuning {
    /// TOML file with WatermarkConfig fields
    #[arg(long)]
    config: Option<PathBuf>,

    /// Detector scan hop in samples (must divide the frame length)
    #[arg(long)]
    stride: Option<usize>,

    /// Number of payload copies
    #[arg(long)]
    redundancy: Option<usize>,

    /// Fraction of pilot bits a frame must match to be accepted
    #[arg(long)]
    threshold: Option<f64>,
}

impl Tuning {
    fn build(
        &self,
        sample_rate: u32,
        payload_len: Option<usize>,
    ) -> Result<WatermarkConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => toml::from_str(&std::fs::read_to_string(path)?)?,
            None => WatermarkConfig::default(),
        };
        config.sample_rate = sample_rate;
        if let Some(payload_len) = payload_len {
            config.payload_len = payload_len;
        }
        if let Some(stride) = self.stride {
            config.frame_stride = stride;
        }
        if let Some(redundancy) = self.redundancy {
            config.redundancy_factor = redundancy;
        }
        if let Some(threshold) = self.threshold {
            config.acceptance_threshold = threshold;
        }
        debug!(?config, "effective configuration");
        Ok(config)
    }
}

/// Read a WAV file, keeping only the first channel.
fn read_wav(path: &Path) -> Result<SampleBuffer, Box<dyn std::error::Error>> {
    let reader = hound::WavReader::open(path)?;
    let spec = reader.spec();

    let mut samples: Vec<f64> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .map(|s| s.map(f64::from))
            .collect::<Result<Vec<f64>, _>>()?,
        hound::SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample - 1)) as f64;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|s| s as f64 / max))
                .collect::<Result<Vec<f64>, _>>()?
        }
    };

    if spec.channels > 1 {
        warn!(
            path = %path.display(),
            channels = spec.channels,
            "multi-channel input, only the first channel will be used"
        );
        samples = samples
            .chunks(spec.channels as usize)
            .map(|c| c[0])
            .collect();
    }
    Ok(SampleBuffer::new(spec.sample_rate, samples))
}

fn write_wav(path: &Path, audio: &SampleBuffer) -> Result<(), Box<dyn std::error::Error>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: audio.sample_rate(),
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for s in audio.to_f32() {
        writer.write_sample(s)?;
    }
    writer.finalize()?;
    Ok(())
}

fn render_bits(bits: &[Bit]) -> String {
    bits.iter()
        .map(|b| match b {
            Bit::Zero => '0',
            Bit::One => '1',
            Bit::Unknown => '?',
        })
        .collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Embed {
            input,
            output,
            payload,
            text,
            tuning,
        } => {
            let wm_payload = match (&payload, &text) {
                (_, Some(text)) => Payload::from_text(text)?,
                (Some(hex), None) => Payload::from_hex(hex)?,
                (None, None) => return Err("either --payload or --text is required".into()),
            };
            let audio = read_wav(&input)?;
            let config = tuning.build(audio.sample_rate(), Some(wm_payload.len()))?;
            let codec = Codec::new(config)?;

            eprintln!(
                "Embedding {} bits x{} into {} ({} samples, {}Hz)...",
                wm_payload.len(),
                codec.config().redundancy_factor,
                input.display(),
                audio.len(),
                audio.sample_rate()
            );

            let marked = codec.encode_parallel(&audio, &wm_payload)?;
            write_wav(&output, &marked)?;

            eprintln!("Watermarked audio written to {}", output.display());
            match wm_payload.to_hex() {
                Some(hex) => println!("Payload: {hex}"),
                None => {
                    let bits: Vec<Bit> = wm_payload.bits().iter().map(|&b| Bit::from(b)).collect();
                    println!("Payload: {}", render_bits(&bits));
                }
            }
        }
        Command::Detect {
            input,
            original,
            payload_bits,
            text_bytes,
            tuning,
        } => {
            let payload_len = text_bytes.map(text_bits_len).or(payload_bits);
            let received = read_wav(&input)?;
            let original = original.as_deref().map(read_wav).transpose()?;
            let config = tuning.build(received.sample_rate(), payload_len)?;
            let codec = Codec::new(config)?;

            let baseline = match &original {
                Some(original) => Baseline::Original(original),
                None => Baseline::Envelope,
            };
            eprintln!(
                "Detecting watermark in {} ({} samples, {}Hz, {} baseline)...",
                input.display(),
                received.len(),
                received.sample_rate(),
                if original.is_some() { "original" } else { "envelope" }
            );

            let result = codec.decode_parallel(&received, baseline)?;
            if !result.pilot_found {
                eprintln!(
                    "No watermark detected (best pilot score {:.3}).",
                    result.pilot_score
                );
                std::process::exit(1);
            }

            println!("Pilot score: {:.3}", result.pilot_score);
            println!(
                "Frames:      {} accepted of {}",
                result.accepted_frames.len(),
                result.frames_scanned
            );
            if let Some(offset) = result.watermark_offset {
                println!(
                    "Offset:      {} samples ({:.3} s)",
                    offset,
                    offset as f64 / received.sample_rate() as f64
                );
            }
            println!("Bits:        {}", render_bits(&result.bits));
            if text_bytes.is_some() {
                match decode_text(&result.bits) {
                    Ok(text) => println!("Text:        {text}"),
                    Err(e) => eprintln!("Text could not be decoded: {e}"),
                }
            } else if let Some(hex) = result.payload().and_then(|p| p.to_hex()) {
                println!("Payload:     {hex}");
            }
            let worst = result.confidence.iter().copied().fold(0.0f64, f64::max);
            println!("Worst bit distance: {worst:.4}");
        }
    }

    Ok(())
}
