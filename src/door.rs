use std::{fmt, str::FromStr, sync::Arc};

pub use config::DoorConfig;
pub use coordinator::Snapshot;
pub use identifier::Identifier;
pub use remote::{DoorRemote, HttpRemote};
pub use state::{Direction, DoorState, EffectiveDoorState};
use serde::Deserialize;
use tokio::{sync::watch, task::JoinHandle};

use self::{coordinator::PollingCoordinator, machine::DoorStateMachine};
use crate::error::{GarageError, GarageResult};

pub mod config;
pub mod coordinator;
pub mod identifier;
pub mod machine;
pub mod remote;
pub mod state;
pub mod status;
#[cfg(test)]
pub(crate) mod testing;

/// A command a door can be configured to accept
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Feature {
  Open,
  Close,
  Stop,
}

impl FromStr for Feature {
  type Err = ();

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "open" => Ok(Feature::Open),
      "close" => Ok(Feature::Close),
      "stop" => Ok(Feature::Stop),
      _ => Err(()),
    }
  }
}

impl fmt::Display for Feature {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Feature::Open => write!(f, "open"),
      Feature::Close => write!(f, "close"),
      Feature::Stop => write!(f, "stop"),
    }
  }
}

/// A single configured door, polled in the background until shut down or dropped.
#[derive(Debug)]
pub struct Door<R: DoorRemote = HttpRemote> {
  identifier: Identifier,
  config: DoorConfig,
  coordinator: Arc<PollingCoordinator<R>>,
  machine: DoorStateMachine<R>,
  tasks: Vec<JoinHandle<()>>,
}

impl<R: DoorRemote> fmt::Display for Door<R> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Door ({})", self.identifier)
  }
}

impl Door<HttpRemote> {
  /// Bring a door controlled over HTTP online.
  ///
  /// Fails with [`GarageError::Setup`] if its status can't be read.
  pub async fn initialize(identifier: Identifier, config: DoorConfig) -> GarageResult<Door<HttpRemote>> {
    let config = validated(&identifier, config)?;
    let remote = HttpRemote::new(&config)?;
    Door::start(identifier, config, remote).await
  }
}

/// The config as the door runs it, or [`GarageError::InvalidConfig`]
fn validated(identifier: &Identifier, config: DoorConfig) -> GarageResult<DoorConfig> {
  config
    .validate(identifier)
    .map_err(|err| GarageError::InvalidConfig(err.to_string()))
}

impl<R: DoorRemote> Door<R> {
  pub async fn with_remote(identifier: Identifier, config: DoorConfig, remote: R) -> GarageResult<Door<R>> {
    let config = validated(&identifier, config)?;
    Door::start(identifier, config, remote).await
  }

  async fn start(identifier: Identifier, config: DoorConfig, remote: R) -> GarageResult<Door<R>> {
    let remote = Arc::new(remote);
    let coordinator = Arc::new(PollingCoordinator::new(
      identifier.clone(),
      Arc::clone(&remote),
      config.poll_interval,
    ));
    coordinator.first_refresh().await?;

    // the door is assumed to take one polling interval to travel
    let machine = DoorStateMachine::new(
      identifier.clone(),
      remote,
      Arc::clone(&coordinator),
      config.poll_interval,
    );
    let tasks = vec![coordinator.spawn_polling(), machine.spawn_snapshot_listener()];

    let door = Door {
      identifier,
      config,
      coordinator,
      machine,
      tasks,
    };
    log::info!("{} initialised as {}", door, door.state());
    Ok(door)
  }

  pub fn identifier(&self) -> &Identifier {
    &self.identifier
  }

  pub fn name(&self) -> &str {
    self.config.name()
  }

  /// Stable id of the device behind this door
  pub fn unique_id(&self) -> String {
    format!("{}_garage", self.config.base_url)
  }

  pub fn supports(&self, feature: Feature) -> bool {
    self.config.features.contains(&feature)
  }

  pub fn state(&self) -> EffectiveDoorState {
    self.machine.state()
  }

  pub fn snapshot(&self) -> Snapshot {
    self.coordinator.snapshot()
  }

  /// Notified whenever the effective state changes
  pub fn subscribe(&self) -> watch::Receiver<EffectiveDoorState> {
    self.machine.subscribe()
  }

  pub async fn refresh(&self) {
    self.coordinator.request_refresh().await
  }

  pub async fn open(&self) -> GarageResult<()> {
    self.ensure_supported(Feature::Open)?;
    self.machine.open().await
  }

  pub async fn close(&self) -> GarageResult<()> {
    self.ensure_supported(Feature::Close)?;
    self.machine.close().await
  }

  /// The controller has no stop command, so this presses the button again
  pub async fn stop(&self) -> GarageResult<()> {
    self.ensure_supported(Feature::Stop)?;
    self.machine.stop().await
  }

  pub async fn command(&self, feature: Feature) -> GarageResult<()> {
    match feature {
      Feature::Open => self.open().await,
      Feature::Close => self.close().await,
      Feature::Stop => self.stop().await,
    }
  }

  fn ensure_supported(&self, feature: Feature) -> GarageResult<()> {
    if self.supports(feature) {
      Ok(())
    }
    else {
      Err(GarageError::Unsupported {
        identifier: self.identifier.clone(),
        feature,
      })
    }
  }

  /// Stop polling and cancel any pending travel
  pub fn shutdown(&mut self) {
    for task in self.tasks.drain(..) {
      task.abort();
    }
    self.machine.shutdown();
    log::debug!("{} shut down", self);
  }
}

impl<R: DoorRemote> Drop for Door<R> {
  fn drop(&mut self) {
    if !self.tasks.is_empty() {
      self.shutdown();
    }
  }
}
