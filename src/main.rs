use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use play_promote::config::{self, Inputs};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Optional YAML file supplying defaults for any input
    #[arg(long)]
    config: Option<PathBuf>,

    /// Application package name, e.g. com.example.app
    #[arg(long, env = "INPUT_PACKAGE-NAME")]
    package_name: Option<String>,

    /// Raw service account JSON key
    #[arg(long, env = "INPUT_SERVICE-ACCOUNT-JSON-RAW", hide_env_values = true)]
    service_account_json_raw: Option<String>,

    /// Track to read releases from
    #[arg(long, env = "INPUT_FROM-TRACK")]
    from_track: Option<String>,

    /// Track to write releases to
    #[arg(long, env = "INPUT_TO-TRACK")]
    to_track: Option<String>,

    /// Rollout fraction applied to every promoted release
    #[arg(long, env = "INPUT_USER-FRACTION")]
    user_fraction: Option<String>,

    /// In-app update priority applied to every promoted release
    #[arg(long, env = "INPUT_INAPP-UPDATE-PRIORITY")]
    inapp_update_priority: Option<String>,

    /// Where the credential payload is staged for the run
    #[arg(long, env = "PLAY_PROMOTE_CREDENTIALS_PATH")]
    credentials_path: Option<PathBuf>,

    /// Publisher API base URL
    #[arg(long, env = "PLAY_PROMOTE_API_BASE_URL")]
    api_base_url: Option<String>,
}

impl Args {
    fn inputs(&self) -> Inputs {
        Inputs {
            package_name: self.package_name.clone(),
            service_account_json_raw: self.service_account_json_raw.clone(),
            from_track: self.from_track.clone(),
            to_track: self.to_track.clone(),
            user_fraction: self.user_fraction.clone(),
            inapp_update_priority: self.inapp_update_priority.clone(),
            credentials_path: self.credentials_path.clone(),
            api_base_url: self.api_base_url.clone(),
        }
    }
}

async fn execute(args: &Args) -> Result<String> {
    let defaults = match &args.config {
        Some(path) => config::load(Some(path))?,
        None => Inputs::default(),
    };
    let cfg = defaults.overlay(args.inputs()).validate()?;
    let outcome = play_promote::run(&cfg).await?;
    Ok(outcome.track)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    match execute(&args).await {
        Ok(track) => info!("Successfully promoted release to {}", track),
        Err(err) => {
            error!("{:#}", err);
            // Workflow command picked up by the CI runner as the failure reason.
            println!("::error::{:#}", err);
            std::process::exit(1);
        }
    }
}
