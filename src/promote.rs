//! The promote-track workflow: open an edit, copy the source track's releases
//! onto the destination track with the configured rollout, commit.
use std::fmt;
use tracing::{info, instrument};

use crate::auth::{Authenticator, ServiceAccountKey};
use crate::config::{PromoteConfig, Rollout};
use crate::credentials::StagedCredentials;
use crate::error::PromoteError;
use crate::publisher::model::{Release, Track};
use crate::publisher::{PublisherClient, PublisherService};

/// Progress of a run. Transitions only move forward; a failure ends the run
/// at whatever stage was last reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Unauthenticated,
    EditOpen,
    SourceRead,
    DestinationStaged,
    Committed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Unauthenticated => "unauthenticated",
            Stage::EditOpen => "edit-open",
            Stage::SourceRead => "source-read",
            Stage::DestinationStaged => "destination-staged",
            Stage::Committed => "committed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PromoteOutcome {
    pub edit_id: String,
    pub track: String,
    pub releases: Vec<Release>,
}

/// Apply the configured rollout to each release. Values that were not
/// configured leave the release's own value in place.
pub fn apply_rollout(releases: Vec<Release>, rollout: &Rollout) -> Vec<Release> {
    releases
        .into_iter()
        .map(|mut release| {
            if let Some(fraction) = rollout.user_fraction {
                release.user_fraction = Some(fraction);
            }
            if let Some(priority) = rollout.in_app_update_priority {
                release.in_app_update_priority = Some(priority);
            }
            release
        })
        .collect()
}

fn remote(stage: Stage, operation: &'static str) -> impl FnOnce(anyhow::Error) -> PromoteError {
    move |error| PromoteError::Remote {
        stage,
        operation,
        error,
    }
}

/// Promote the releases of `config.from_track` onto `config.to_track` through
/// an already authenticated publisher.
#[instrument(skip_all, fields(package = %config.package_name, from = %config.from_track, to = %config.to_track))]
pub async fn promote<S: PublisherService + ?Sized>(
    publisher: &S,
    config: &PromoteConfig,
) -> Result<PromoteOutcome, PromoteError> {
    let package = config.package_name.as_str();

    info!("Creating a new edit");
    let edit = publisher
        .insert_edit(package)
        .await
        .map_err(remote(Stage::Unauthenticated, "edits.insert"))?;
    let edit_id = edit.id.filter(|id| !id.is_empty()).ok_or_else(|| {
        remote(Stage::Unauthenticated, "edits.insert")(anyhow::anyhow!(
            "response did not contain an edit id"
        ))
    })?;
    let mut stage = Stage::EditOpen;
    info!(edit_id = %edit_id, %stage, "edit opened");

    let source = publisher
        .get_track(package, &edit_id, &config.from_track)
        .await
        .map_err(remote(stage, "edits.tracks.get"))?;
    stage = Stage::SourceRead;
    info!(
        %stage,
        releases = source.releases.len(),
        "read releases from {}", config.from_track
    );

    let destination = Track {
        track: config.to_track.clone(),
        releases: apply_rollout(source.releases, &config.rollout),
    };
    info!(
        user_fraction = ?config.rollout.user_fraction,
        in_app_update_priority = ?config.rollout.in_app_update_priority,
        "Switching {} release to {}", config.from_track, config.to_track
    );
    publisher
        .update_track(package, &edit_id, &destination)
        .await
        .map_err(remote(stage, "edits.tracks.update"))?;
    stage = Stage::DestinationStaged;

    info!(%stage, "Committing changes");
    let commit = publisher
        .commit_edit(package, &edit_id)
        .await
        .map_err(remote(stage, "edits.commit"))?;
    if commit.edit_id.is_none() {
        return Err(PromoteError::CommitUnconfirmed {
            status: commit.status,
            status_text: commit.status_text,
        });
    }
    stage = Stage::Committed;
    info!(%stage, edit_id = %edit_id, "edit committed");

    Ok(PromoteOutcome {
        edit_id,
        track: destination.track,
        releases: destination.releases,
    })
}

/// Full run: stage credentials, authenticate, promote. The staged credential
/// file is removed when this returns, on success and on failure.
#[instrument(skip_all)]
pub async fn run(config: &PromoteConfig) -> Result<PromoteOutcome, PromoteError> {
    let _credentials =
        StagedCredentials::stage(&config.credentials_path, &config.service_account_json)?;

    let key = ServiceAccountKey::from_env()?;
    let token = Authenticator::new(key)?.fetch_token().await?;
    let client = PublisherClient::with_base_url(token.secret().to_string(), config.api_base_url.clone())
        .map_err(remote(Stage::Unauthenticated, "client setup"))?;

    promote(&client, config).await
}
