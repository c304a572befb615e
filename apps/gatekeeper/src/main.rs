use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use dpfp_rs::{Compressor, Dpfp, Matcher};
use gatekeeper::config::{Config, TemplateFormat};
use gatekeeper::flows::{self, Event};
use gatekeeper::worker::{self, Outcome};
use gatekeeper::{logging, NewUser, Result, Station};
use tracing::error;

#[derive(Debug, Parser)]
#[command(
    name = "gatekeeper",
    version,
    about = "Fingerprint enrollment and identification station"
)]
struct Cli {
    /// Configuration file (defaults to <config dir>/gatekeeper/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List connected readers
    Devices,
    /// Show reader status and capabilities
    Status,
    /// Show library versions
    Version,
    /// Capture one image into the data directory
    Capture {
        #[arg(default_value = "capture")]
        name: String,
    },
    /// Wait for a finger in streaming mode, then capture
    Stream {
        #[arg(default_value = "stream")]
        name: String,
    },
    /// Enroll a new user
    Enroll {
        user_id: String,
        #[arg(long)]
        name: String,
        /// Secondary identifier such as an e-mail address
        #[arg(long)]
        secondary_id: Option<String>,
    },
    /// Verify a scan against one enrolled user
    Verify { user_id: String },
    /// Identify a scan against every enrolled user
    Identify,
    /// Identify a scan against the fmd_<id>.dat files in a directory
    IdentifyDir { dir: PathBuf },
    /// Compare two template files
    Compare {
        first: PathBuf,
        second: PathBuf,
        #[arg(long, value_enum, default_value = "ansi")]
        format: FormatArg,
    },
    /// Compress an 8 bpp raster file to WSQ
    Compress {
        input: PathBuf,
        #[arg(long)]
        width: u32,
        #[arg(long)]
        height: u32,
        #[arg(long, default_value_t = 500)]
        dpi: u32,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Expand a WSQ file to a raster file and a PNG preview
    Expand {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Copy, Clone, clap::ValueEnum)]
enum FormatArg {
    Ansi,
    Iso,
}

impl From<FormatArg> for TemplateFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Ansi => TemplateFormat::Ansi,
            FormatArg::Iso => TemplateFormat::Iso,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "command failed");
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    logging::init(&config.logging, &config.log_dir())?;

    match cli.command {
        Command::Devices => {
            let dpfp = load_reader(&config)?;
            for device in dpfp.enumerate()? {
                println!("{}", device.name);
            }
        }
        Command::Version => {
            let dpfp = load_reader(&config)?;
            println!("dpfpdd: {}", dpfp.version()?);
            println!("dpfj: {}", load_matcher(&config)?.version()?);
        }
        Command::Status => {
            let station = Station::open(config)?;
            let status = station.status()?;
            println!("reader: {}", status.reader);
            println!("state: {:?}", status.status.state);
            println!("finger detected: {}", status.status.finger_detected);
            println!("capabilities: {:#?}", status.capabilities);
            println!("dpfj: {}", station.matcher_version()?);
        }
        Command::Capture { name } => {
            let station = Arc::new(Station::open(config)?);
            let job = worker::spawn(station, move |station, _| {
                Ok(Outcome::Captured(station.capture(&name)?))
            });
            print_outcome(job.wait(print_event)?);
        }
        Command::Stream { name } => {
            let station = Arc::new(Station::open(config)?);
            let job = worker::spawn(station, move |station, on_event| {
                Ok(Outcome::Captured(station.stream(&name, on_event)?))
            });
            print_outcome(job.wait(print_event)?);
        }
        Command::Enroll {
            user_id,
            name,
            secondary_id,
        } => {
            let station = Arc::new(Station::open(config)?);
            let user = NewUser {
                user_id,
                name,
                secondary_id,
            };
            let job = worker::spawn(station, move |station, on_event| {
                Ok(Outcome::Enrolled(station.enroll(&user, on_event)?))
            });
            print_outcome(job.wait(print_event)?);
        }
        Command::Verify { user_id } => {
            let station = Arc::new(Station::open(config)?);
            let job = worker::spawn(station, move |station, on_event| {
                Ok(Outcome::Verified(station.verify(&user_id, on_event)?))
            });
            print_outcome(job.wait(print_event)?);
        }
        Command::Identify => {
            let station = Arc::new(Station::open(config)?);
            let job = worker::spawn(station, |station, on_event| {
                Ok(Outcome::Identified(station.identify(on_event)?))
            });
            print_outcome(job.wait(print_event)?);
        }
        Command::IdentifyDir { dir } => {
            let station = Arc::new(Station::open(config)?);
            let job = worker::spawn(station, move |station, on_event| {
                Ok(Outcome::Identified(station.identify_dir(&dir, on_event)?))
            });
            print_outcome(job.wait(print_event)?);
        }
        Command::Compare {
            first,
            second,
            format,
        } => {
            let matcher = load_matcher(&config)?;
            let format = TemplateFormat::from(format).into();
            let comparison = flows::compare_files(&matcher, format, &first, &second)?;
            println!("dissimilarity score: {}", comparison.score);
            println!("band: {:?}", comparison.band);
            println!("false match rate: {:.6}%", comparison.false_match_rate * 100.0);
        }
        Command::Compress {
            input,
            width,
            height,
            dpi,
            output,
        } => {
            let compressor = load_compressor(&config)?;
            let output = output.unwrap_or_else(|| input.with_extension("wsq"));
            let written =
                flows::compress_file(&compressor, &config, &input, width, height, dpi, &output)?;
            println!("{} bytes written to {}", written, output.display());
        }
        Command::Expand { input, output } => {
            let compressor = load_compressor(&config)?;
            let output = output.unwrap_or_else(|| input.with_extension("raw"));
            let image = flows::expand_file(&compressor, &input, &output)?;
            println!(
                "{}x{} at {} dpi written to {}",
                image.width,
                image.height,
                image.dpi,
                output.display()
            );
        }
    }

    Ok(())
}

fn load_reader(config: &Config) -> Result<Dpfp> {
    Ok(match &config.sdk.device_library {
        Some(path) => Dpfp::load_from(path)?,
        None => Dpfp::load()?,
    })
}

fn load_matcher(config: &Config) -> Result<Matcher> {
    Ok(match &config.sdk.matching_library {
        Some(path) => Matcher::load_from(path)?,
        None => Matcher::load()?,
    })
}

fn load_compressor(config: &Config) -> Result<Compressor> {
    let compressor = match &config.sdk.compression_library {
        Some(path) => Compressor::load_from(path)?,
        None => Compressor::load()?,
    };

    Ok(compressor.with_algorithm(config.compression.algorithm.into()))
}

fn print_event(event: &Event) {
    match event {
        Event::Prompt { scan, total } if *total > 1 => {
            println!("Scan your finger now ({}/{}).", scan, total)
        }
        Event::Prompt { .. } => println!("Scan your finger now."),
        Event::ScanStored { scan, wsq_bytes } => {
            println!("Scan {} stored ({} bytes WSQ).", scan, wsq_bytes)
        }
        Event::ScanSkipped { scan, reason } => {
            println!("Scan {} skipped: {}. Please try again.", scan, reason)
        }
        Event::TemplateReady { views } => println!("Template ready after {} views.", views),
        Event::FingerDetected(true) => println!("Finger detected."),
        Event::FingerDetected(false) => println!("No finger detected."),
        Event::Frame { bytes, quality } => {
            println!("Frame of {} bytes, quality {}.", bytes, quality)
        }
    }
}

fn print_outcome(outcome: Outcome) {
    match outcome {
        Outcome::Enrolled(report) => {
            println!(
                "User {} enrolled: {} scans stored, template from {} views.",
                report.user_id, report.scans_stored, report.views
            );
            println!("Template: {}", report.template_path.display());
            println!("Metadata: {}", report.metadata_path.display());
        }
        Outcome::Verified(verification) => {
            let score = verification
                .score
                .map(|score| score.to_string())
                .unwrap_or_else(|| "n/a".to_string());
            if verification.matched {
                println!(
                    "MATCH! {} ({}), score {}",
                    verification.user.name, verification.user.user_id, score
                );
            } else {
                println!("NO MATCH! best score {} over {} items", score, verification.compared);
            }
        }
        Outcome::Identified(Some(found)) => println!(
            "Found user {} (score {}, {} candidates).",
            found.user_id, found.score, found.candidates
        ),
        Outcome::Identified(None) => println!("No enrolled user matches."),
        Outcome::Captured(report) => println!(
            "{}x{} at {} dpi, {} bytes: {} / {}",
            report.width,
            report.height,
            report.dpi,
            report.bytes,
            report.raw_path.display(),
            report.png_path.display()
        ),
    }
}
