use std::{collections::BTreeSet, fmt, time::Duration};

use serde::Deserialize;
use serde_with::{serde_as, DurationSeconds};

use super::{identifier::Identifier, Feature};
use crate::error::ConfigError;

const DEFAULT_NAME: &str = "Garage Door";

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct DoorConfig {
  /// Where the door controller is reachable, e.g. `http://192.168.1.40`
  pub base_url: String,

  /// Path of the page containing `Door Status: <state>`
  #[serde(default = "default_status_path")]
  pub status_path: String,

  /// Path that toggles the door relay
  #[serde(default = "default_toggle_path")]
  pub toggle_path: String,

  #[serde_as(as = "DurationSeconds<u64>")]
  #[serde(default = "default_poll_interval", alias = "scan_interval")]
  /// How often the status page is polled.
  ///
  /// Also used as the time the door is assumed to take to go to/from open/close.
  pub poll_interval: Duration,

  /// Basic auth user, only used together with `password`
  pub username: Option<String>,
  pub password: Option<Password>,

  /// Display name of the door
  pub name: Option<String>,

  /// Commands the door accepts
  #[serde(default = "default_features")]
  pub features: BTreeSet<Feature>,
}

fn default_status_path() -> String {
  "/".to_string()
}

fn default_toggle_path() -> String {
  "/?switch=1".to_string()
}

fn default_poll_interval() -> Duration {
  Duration::from_secs(35)
}

fn default_features() -> BTreeSet<Feature> {
  BTreeSet::from([Feature::Open, Feature::Close, Feature::Stop])
}

/// A basic auth password, kept out of debug output
#[derive(Clone, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Password(pub String);

impl fmt::Debug for Password {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Password(***)")
  }
}

/// Basic auth credentials for the door controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
  pub username: String,
  pub password: Password,
}

impl DoorConfig {
  /// A config with every optional field at its default
  pub fn new(base_url: impl Into<String>) -> Self {
    DoorConfig {
      base_url: base_url.into(),
      status_path: default_status_path(),
      toggle_path: default_toggle_path(),
      poll_interval: default_poll_interval(),
      username: None,
      password: None,
      name: None,
      features: default_features(),
    }
  }

  /// Normalise the config, rejecting values the door can't run with
  pub fn validate(mut self, identifier: &Identifier) -> Result<Self, ConfigError> {
    let invalid = |reason: &str| ConfigError::Invalid {
      identifier: identifier.clone(),
      reason: reason.to_string(),
    };

    self.base_url = self.base_url.trim().trim_end_matches('/').to_string();
    if self.base_url.is_empty() {
      return Err(invalid("base_url must not be empty"));
    }
    if self.poll_interval.is_zero() {
      return Err(invalid("poll_interval must be greater than zero"));
    }
    if !self.features.contains(&Feature::Open) || !self.features.contains(&Feature::Close) {
      return Err(invalid("features must include open and close"));
    }
    if self.credentials().is_none() && (self.username.is_some() || self.password.is_some()) {
      log::warn!("{identifier} has only one of username/password set, basic auth is disabled");
    }

    Ok(self)
  }

  /// Credentials, if both a username and password are set
  pub fn credentials(&self) -> Option<Credentials> {
    match (&self.username, &self.password) {
      (Some(username), Some(password)) if !username.is_empty() && !password.0.is_empty() => Some(Credentials {
        username: username.clone(),
        password: password.clone(),
      }),
      _ => None,
    }
  }

  pub fn status_url(&self) -> String {
    format!("{}{}", self.base_url, self.status_path)
  }

  pub fn toggle_url(&self) -> String {
    format!("{}{}", self.base_url, self.toggle_path)
  }

  pub fn name(&self) -> &str {
    self.name.as_deref().unwrap_or(DEFAULT_NAME)
  }
}
