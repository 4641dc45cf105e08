//! Input loading and validation for a single promotion run.
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default location the raw service-account payload is staged at.
pub const DEFAULT_CREDENTIALS_PATH: &str = "service-account.json";
pub const DEFAULT_API_BASE_URL: &str = "https://androidpublisher.googleapis.com/";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Input required and not supplied: {0}")]
    Missing(&'static str),
    #[error("Input {field} is not a valid number: {value:?}")]
    InvalidNumber { field: &'static str, value: String },
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Raw inputs as the CI runner hands them over: every value is an optional
/// string. Keys use the same spelling as the action inputs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct Inputs {
    pub package_name: Option<String>,
    pub service_account_json_raw: Option<String>,
    pub from_track: Option<String>,
    pub to_track: Option<String>,
    pub user_fraction: Option<String>,
    pub inapp_update_priority: Option<String>,
    pub credentials_path: Option<PathBuf>,
    pub api_base_url: Option<String>,
}

/// Rollout parameters copied onto every promoted release. `None` leaves the
/// release's existing value alone.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rollout {
    pub user_fraction: Option<f64>,
    pub in_app_update_priority: Option<i32>,
}

/// Validated configuration for one promotion run.
#[derive(Clone)]
pub struct PromoteConfig {
    pub package_name: String,
    pub service_account_json: String,
    pub from_track: String,
    pub to_track: String,
    pub rollout: Rollout,
    pub credentials_path: PathBuf,
    pub api_base_url: Url,
}

impl fmt::Debug for PromoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromoteConfig")
            .field("package_name", &self.package_name)
            .field("from_track", &self.from_track)
            .field("to_track", &self.to_track)
            .field("rollout", &self.rollout)
            .field("credentials_path", &self.credentials_path)
            .field("api_base_url", &self.api_base_url)
            .finish_non_exhaustive()
    }
}

impl Inputs {
    /// Layer `over` on top of `self`. Values present in `over` win; blank
    /// values on either side count as absent.
    pub fn overlay(self, over: Inputs) -> Inputs {
        let (base, over) = (self.normalized(), over.normalized());
        Inputs {
            package_name: over.package_name.or(base.package_name),
            service_account_json_raw: over
                .service_account_json_raw
                .or(base.service_account_json_raw),
            from_track: over.from_track.or(base.from_track),
            to_track: over.to_track.or(base.to_track),
            user_fraction: over.user_fraction.or(base.user_fraction),
            inapp_update_priority: over.inapp_update_priority.or(base.inapp_update_priority),
            credentials_path: over.credentials_path.or(base.credentials_path),
            api_base_url: over.api_base_url.or(base.api_base_url),
        }
    }

    /// Drop blank values. The credential payload is kept verbatim otherwise.
    fn normalized(self) -> Inputs {
        Inputs {
            package_name: present(self.package_name),
            service_account_json_raw: self
                .service_account_json_raw
                .filter(|raw| !raw.trim().is_empty()),
            from_track: present(self.from_track),
            to_track: present(self.to_track),
            user_fraction: present(self.user_fraction),
            inapp_update_priority: present(self.inapp_update_priority),
            credentials_path: self
                .credentials_path
                .filter(|p| !p.as_os_str().is_empty()),
            api_base_url: present(self.api_base_url),
        }
    }

    pub fn validate(self) -> Result<PromoteConfig, ConfigError> {
        let package_name = required(self.package_name, "package-name")?;
        // The payload is passed through verbatim; only blankness is checked here.
        let service_account_json = self
            .service_account_json_raw
            .filter(|raw| !raw.trim().is_empty())
            .ok_or(ConfigError::Missing("service-account-json-raw"))?;
        let from_track = required(self.from_track, "from-track")?;
        let to_track = required(self.to_track, "to-track")?;

        let user_fraction = parse_optional::<f64>(self.user_fraction, "user-fraction")?;
        let in_app_update_priority =
            parse_optional::<i32>(self.inapp_update_priority, "inapp-update-priority")?;

        let credentials_path = self
            .credentials_path
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CREDENTIALS_PATH));

        let base = present(self.api_base_url).unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let api_base_url =
            Url::parse(&base).map_err(|_| ConfigError::Invalid("api-base-url must be a valid URL"))?;

        Ok(PromoteConfig {
            package_name,
            service_account_json,
            from_track,
            to_track,
            rollout: Rollout {
                user_fraction,
                in_app_update_priority,
            },
            credentials_path,
            api_base_url,
        })
    }
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(value: Option<String>, name: &'static str) -> Result<String, ConfigError> {
    present(value).ok_or(ConfigError::Missing(name))
}

fn parse_optional<T: std::str::FromStr>(
    value: Option<String>,
    field: &'static str,
) -> Result<Option<T>, ConfigError> {
    match present(value) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { field, value: raw }),
    }
}

/// Load input defaults from a YAML file.
/// - If `path` is None, uses `promote.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Inputs, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("promote.yaml"));
    let content = fs::read_to_string(path)?;
    let inputs: Inputs = serde_yaml::from_str(&content)?;
    Ok(inputs)
}

/// Example defaults file. The credential payload is normally injected from a
/// CI secret rather than written here.
pub fn example() -> &'static str {
    r#"package-name: "com.example.app"
from-track: "beta"
to-track: "production"
user-fraction: "0.5"
inapp-update-priority: "2"
credentials-path: "service-account.json"
api-base-url: "https://androidpublisher.googleapis.com/"
"#
}
