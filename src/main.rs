//! vinyl-split command line interface
//!
//! Turns vinyl side captures into per-track WAV files.

use clap::{Parser, Subcommand};
use log::{error, info};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use vinyl_split::config::FragmentFilter;
use vinyl_split::processor::segment::Segmenter;
use vinyl_split::processor::speed::speed_shift_percent;
use vinyl_split::{
    decoder, processor, AudioResult, Pipeline, PipelineConfig, ReleaseCatalog, SilenceThreshold,
};

#[derive(Parser)]
#[command(name = "vinyl-split")]
#[command(about = "Speed-correct, normalize and split vinyl side captures", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file (TOML); defaults apply when it does not exist
    #[arg(short, long, value_name = "FILE", default_value = "vinyl-split.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline on each capture
    Process {
        /// Release catalogue (JSON)
        #[arg(short, long, value_name = "FILE")]
        metadata: PathBuf,

        /// Side captures named after their release id
        #[arg(value_name = "FILES", required = true)]
        files: Vec<PathBuf>,
    },

    /// Search for a threshold giving the expected track count (dry run)
    Split {
        /// Side capture
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Expected number of tracks
        #[arg(short, long)]
        tracks: usize,
    },

    /// List fragments at one threshold
    Scan {
        /// Side capture
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Silence threshold in dBFS
        #[arg(short, long, allow_hyphen_values = true, default_value = "-45")]
        threshold: f32,
    },

    /// Show the gain that would normalize a capture
    Gain {
        /// Side capture
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Show the speed shift percentage between two turntable speeds
    Speed {
        /// Speed the record was captured at
        #[arg(allow_hyphen_values = true)]
        from: f64,

        /// Speed the record should play at
        #[arg(allow_hyphen_values = true)]
        to: f64,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging
    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }

    info!("vinyl-split {}", vinyl_split::VERSION);

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether everything requested succeeded
fn run(cli: &Cli) -> AudioResult<bool> {
    let config = PipelineConfig::load_or_default(&cli.config)?;

    match &cli.command {
        Commands::Process { metadata, files } => {
            let catalog = ReleaseCatalog::load(metadata)?;
            info!("Loaded {} releases from {}", catalog.len(), metadata.display());
            let backend = processor::from_config(&config);

            let summary = Pipeline::new(&config, &catalog, backend.as_ref()).process_batch(files);
            print!("{}", summary);
            Ok(summary.failed() == 0 && summary.skipped() == 0)
        }
        Commands::Split { input, tracks } => {
            let buffer = decoder::decode_file(input)?;
            let outcome = config.splitter()?.split(&buffer, *tracks);
            println!("{}", outcome);
            println!("trace: {}", outcome.describe_trace());

            match outcome.into_fragments() {
                Some(fragments) => {
                    print_fragments(input, &fragments);
                    Ok(true)
                }
                None => Ok(false),
            }
        }
        Commands::Scan { input, threshold } => {
            let threshold = SilenceThreshold::new(*threshold)?;
            let buffer = decoder::decode_file(input)?;
            let segmenter = Segmenter::new(config.segment_params(FragmentFilter::Noise))?;
            let fragments = segmenter.segment(&buffer, threshold);
            println!("{} fragments at {}", fragments.len(), threshold);
            print_fragments(input, &fragments);
            Ok(true)
        }
        Commands::Gain { input } => {
            let buffer = decoder::decode_file(input)?;
            let estimator = config.gain_estimator()?;
            match (estimator.measure(&buffer), estimator.estimate_gain(&buffer)) {
                (Some(level), Some(gain)) => {
                    println!("{}: level {:.2} dBFS, gain {:+.2} dB", input.display(), level, gain);
                    Ok(true)
                }
                _ => {
                    println!("{}: gain cannot be estimated", input.display());
                    Ok(false)
                }
            }
        }
        Commands::Speed { from, to } => {
            if *from <= 0.0 || *to <= 0.0 {
                println!("speeds must be positive");
                return Ok(false);
            }
            println!("{:+.2}%", speed_shift_percent(*from, *to));
            Ok(true)
        }
    }
}

fn print_fragments(input: &Path, fragments: &[vinyl_split::Fragment]) {
    for (index, fragment) in fragments.iter().enumerate() {
        println!(
            "  {}#{}: {:>8.2}s + {:>7.2}s",
            input.display(),
            index + 1,
            fragment.start().as_secs_f64(),
            fragment.duration().as_secs_f64()
        );
    }
}
