use std::io;

use thiserror::Error;

use crate::door::{identifier::Identifier, status::ParseFailure, Feature};

pub type GarageResult<T> = Result<T, GarageError>;

/// Failures of a door while running.
///
/// Cloneable so the last polling failure can be kept in the coordinator's snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GarageError {
  #[error("request to {url} failed: {reason}")]
  Network { url: String, reason: String },
  #[error(transparent)]
  Parse(#[from] ParseFailure),
  #[error("{identifier} could not be set up: {source}")]
  Setup {
    identifier: Identifier,
    source: Box<GarageError>,
  },
  #[error("{identifier} does not support the {feature} command")]
  Unsupported { identifier: Identifier, feature: Feature },
  #[error("unable to build HTTP client: {0}")]
  HttpClient(String),
  #[error("{0}")]
  InvalidConfig(String),
}

impl GarageError {
  pub(crate) fn network(url: &str, err: &reqwest::Error) -> Self {
    let reason = if err.is_timeout() {
      "timed out".to_string()
    }
    else {
      err.to_string()
    };

    GarageError::Network {
      url: url.to_string(),
      reason,
    }
  }
}

/// Failures while loading `garage-config.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("unable to read configuration: {0}")]
  Read(#[from] io::Error),
  #[error("unable to parse configuration: {0}")]
  Parse(#[from] toml::de::Error),
  #[error("invalid configuration for {identifier}: {reason}")]
  Invalid { identifier: Identifier, reason: String },
}
