use clap::Parser;
use log::{error, info};
use page_shot::capture::{self, CaptureRequest};
use std::process::ExitCode;

/// page-shot <url> <width> <height>
#[derive(Parser, Debug)]
#[command(
    name = "page-shot",
    disable_help_flag = true,
    disable_version_flag = true
)]
struct Args {
    /// Page to capture.
    url: String,
    /// Viewport width in CSS pixels.
    #[arg(allow_hyphen_values = true)]
    width: String,
    /// Accepted but not applied; the page decides the viewport height.
    #[arg(allow_hyphen_values = true)]
    height: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let request = match CaptureRequest::from_args(&args.url, &args.width, &args.height) {
        Ok(request) => request,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match capture::run(&request).await {
        Ok(report) => {
            info!(
                "Saved {} ({} bytes, viewport {}x{}, image {}x{})",
                report.output.display(),
                report.bytes,
                report.viewport.width,
                report.viewport.height,
                report.image.width,
                report.image.height
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
