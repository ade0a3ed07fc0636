use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use lifemeter::batch::{self, BatchRequest, MaskOutcome};
use lifemeter::config::DetectorConfig;
use lifemeter::image_processing::GreenDetector;
use lifemeter::region::{RegionOfInterest, RegionSource};
use lifemeter::AppError;
use tracing::Level;

#[derive(Parser)]
#[command(name = "green-detector")]
#[command(version, about = "Compute the percentage of green pixels in an image", long_about = None)]
struct Cli {
    /// Image to analyse
    #[arg(long, value_name = "PATH")]
    image: PathBuf,

    /// Margin green must exceed red and blue by (default: 5)
    #[arg(long, visible_alias = "soglia", value_name = "N")]
    threshold: Option<u32>,

    /// Restrict analysis to a rectangle in image pixels (right/bottom exclusive)
    #[arg(long, value_name = "X1,Y1,X2,Y2")]
    roi: Option<RegionOfInterest>,

    /// JSON configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Where to write the green-pixel image
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Do not write the green-pixel image
    #[arg(long)]
    no_mask: bool,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<DetectorConfig, AppError> {
    let mut config = match &cli.config {
        Some(path) => DetectorConfig::from_json_file_over(path, DetectorConfig::batch())?,
        None => DetectorConfig::batch(),
    };
    if let Some(threshold) = cli.threshold {
        config = config.with_threshold(threshold);
    }
    if let Some(output) = &cli.output {
        config = config.with_mask_output(output);
    }
    Ok(config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e.user_facing_message());
            return ExitCode::FAILURE;
        }
    };

    let request = BatchRequest {
        image: cli.image.clone(),
        roi: cli.roi,
        mask_output: (!cli.no_mask).then(|| config.mask_output.clone()),
    };
    let detector = GreenDetector::new(config);

    let report = match batch::run(&detector, request).await {
        Ok(report) => report,
        Err(e) => {
            let error = AppError::from(e);
            eprintln!("Error: {}", error.message);
            return ExitCode::FAILURE;
        }
    };

    if let RegionSource::Fallback { requested, error } = &report.region.source {
        eprintln!("Ignoring region {requested}: {error}; analysing the whole image");
    }
    println!("Green percentage: {:.2}%", report.percentage);

    match report.mask {
        MaskOutcome::Saved(path) => {
            println!("Green-pixel image saved to: {}", path.display());
        }
        MaskOutcome::Failed(e) => {
            eprintln!("Error saving green-pixel image: {}", e.message);
        }
        MaskOutcome::Skipped => {}
    }

    ExitCode::SUCCESS
}
