use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::{error, info};

use deepscan_client::api::ApiClient;
use deepscan_client::chart::TerminalSurface;
use deepscan_client::config::{load_config, resolve_api_base};
use deepscan_client::form::Submission;
use deepscan_client::logging;
use deepscan_client::session::Session;
use deepscan_client::view::alert;

#[derive(Parser, Debug)]
#[command(name = "deepscan", version, about = "Deepfake detection client")]
struct Args {
    /// Service base URL (overrides ~/.config/deepscan.json and DEEPSCAN_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload an image or video to /predict
    Predict {
        /// Image (.jpg, .jpeg, .png) or video (.mp4, .avi, .mov)
        file: Option<PathBuf>,
    },
    /// Classify a text snippet via /text
    Text {
        /// Text to classify; words are joined with spaces
        #[arg(trailing_var_arg = true)]
        text: Vec<String>,
    },
    /// Read commands from stdin; the chart persists between predictions
    Session,
}

fn main() -> ExitCode {
    logging::init();
    let args = Args::parse();

    let config = match load_config() {
        Ok(config) => config,
        Err(err) => {
            error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let base = resolve_api_base(args.api_url.as_deref(), &config);
    let client = match ApiClient::new(base, config.timeout()) {
        Ok(client) => client,
        Err(err) => {
            error!("Failed to build HTTP client: {err}");
            return ExitCode::FAILURE;
        }
    };
    info!("Using detection service at {}", client.base_url());

    let mut session = Session::new(
        &client,
        io::stdout(),
        io::stdout(),
        TerminalSurface::new(io::stdout()),
    );

    let outcome = match args.command {
        Command::Predict { file } => session.predict(file.as_deref()),
        Command::Text { text } => session.classify(&text.join(" ")),
        Command::Session => {
            return match session.run(io::stdin().lock()) {
                Ok(()) => ExitCode::SUCCESS,
                Err(err) => {
                    error!("Failed to read input: {err}");
                    ExitCode::FAILURE
                }
            };
        }
    };

    match outcome {
        Ok(Submission::Rendered) => ExitCode::SUCCESS,
        Ok(Submission::Failed) => ExitCode::FAILURE,
        Err(err) => {
            alert(err);
            ExitCode::FAILURE
        }
    }
}
