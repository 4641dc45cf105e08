use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use play_promote::auth::{Authenticator, ServiceAccountKey};
use play_promote::publisher::{PublisherClient, PublisherService};

/// Print the releases currently on a track without changing anything.
#[derive(Parser, Debug)]
struct Args {
    /// Application package name
    #[arg(long)]
    package_name: String,

    /// Track to inspect
    #[arg(long, default_value = "production")]
    track: String,

    /// Path to a service account JSON key
    #[arg(long, env = "GOOGLE_APPLICATION_CREDENTIALS")]
    service_account_file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let key = ServiceAccountKey::from_file(&args.service_account_file)?;
    let token = Authenticator::new(key)?.fetch_token().await?;
    let client = PublisherClient::new(token.secret().to_string())?;

    let edit = client.insert_edit(&args.package_name).await?;
    let edit_id = edit.id.context("edits.insert returned no edit id")?;
    let track = client.get_track(&args.package_name, &edit_id, &args.track).await;
    // Read-only: never leave the throwaway edit open.
    if let Err(err) = client.delete_edit(&args.package_name, &edit_id).await {
        warn!(?err, edit_id = %edit_id, "failed to delete inspection edit");
    }
    let track = track?;

    println!("Track: {}", track.track);
    if track.releases.is_empty() {
        println!("  (no releases)");
    }
    for release in &track.releases {
        println!(
            "  {} -> {{ status: {}, versionCodes: [{}], userFraction: {}, inAppUpdatePriority: {} }}",
            release.name.as_deref().unwrap_or("<unnamed>"),
            release.status.as_deref().unwrap_or("-"),
            release.version_codes.as_deref().unwrap_or_default().join(", "),
            release
                .user_fraction
                .map(|f| f.to_string())
                .unwrap_or_else(|| "-".into()),
            release
                .in_app_update_priority
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".into()),
        );
    }
    Ok(())
}
