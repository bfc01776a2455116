use std::{
  collections::{BTreeMap, HashMap},
  fs,
  path::Path,
};

use serde::Deserialize;

use crate::{
  door::{self, Identifier},
  error::ConfigError,
};

pub const DEFAULT_CONFIG_FILE: &str = "garage-config.toml";

#[derive(Debug, Deserialize)]
pub struct Config {
  /// A list of all doors to control
  pub doors: BTreeMap<Identifier, door::DoorConfig>,
}

impl Config {
  pub fn load(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let config = fs::read_to_string(path)?;
    Config::from_toml(&config)
  }

  pub fn from_toml(config: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(config)?;
    config.validate()
  }

  /// Validate every door, and make sure no device is configured twice
  fn validate(self) -> Result<Config, ConfigError> {
    let mut doors = BTreeMap::new();
    let mut base_urls: HashMap<String, Identifier> = HashMap::new();

    for (identifier, door_config) in self.doors {
      let door_config = door_config.validate(&identifier)?;
      if let Some(existing) = base_urls.insert(door_config.base_url.clone(), identifier.clone()) {
        return Err(ConfigError::Invalid {
          identifier,
          reason: format!("{} is already configured by {existing}", door_config.base_url),
        });
      }
      doors.insert(identifier, door_config);
    }

    Ok(Config { doors })
  }
}
