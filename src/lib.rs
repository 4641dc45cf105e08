//! Promote a Google Play release from one track to another inside a single
//! edit transaction, optionally changing its staged-rollout fraction and
//! in-app update priority.

pub mod auth;
pub mod config;
pub mod credentials;
pub mod error;
pub mod promote;
pub mod publisher;

pub use config::{Inputs, PromoteConfig, Rollout};
pub use error::PromoteError;
pub use promote::{apply_rollout, promote, run, PromoteOutcome, Stage};
pub use publisher::{PublisherClient, PublisherService};
