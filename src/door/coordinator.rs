use std::{
  fmt,
  sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
  },
  time::Duration,
};

use chrono::{DateTime, Utc};
use tokio::{
  sync::{watch, Mutex},
  task::JoinHandle,
  time::{self, Instant, MissedTickBehavior},
};

use super::{identifier::Identifier, remote::DoorRemote, state::DoorState, status};
use crate::error::{GarageError, GarageResult};

/// The most recently completed poll
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
  /// Last successfully parsed state, kept through failed polls
  pub last_value: Option<DoorState>,
  /// Why the last poll failed, cleared by the next success
  pub last_error: Option<GarageError>,
  /// When a poll last completed, successful or not
  pub last_update: Option<DateTime<Utc>>,
}

/// Polls a door's status page on an interval and on request, one fetch at a time.
#[derive(Debug)]
pub struct PollingCoordinator<R: DoorRemote> {
  identifier: Identifier,
  remote: Arc<R>,
  poll_interval: Duration,
  snapshot: watch::Sender<Snapshot>,
  /// Held for the duration of a fetch cycle
  cycle: Mutex<()>,
  /// Number of completed fetch cycles
  completed: AtomicU64,
}

impl<R: DoorRemote> fmt::Display for PollingCoordinator<R> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Door ({})", self.identifier)
  }
}

impl<R: DoorRemote> PollingCoordinator<R> {
  pub fn new(identifier: Identifier, remote: Arc<R>, poll_interval: Duration) -> Self {
    let (snapshot, _) = watch::channel(Snapshot::default());

    PollingCoordinator {
      identifier,
      remote,
      poll_interval,
      snapshot,
      cycle: Mutex::new(()),
      completed: AtomicU64::new(0),
    }
  }

  /// The most recent completed result. Never waits on an in-flight fetch.
  pub fn snapshot(&self) -> Snapshot {
    self.snapshot.borrow().clone()
  }

  /// Notified every time a fetch cycle completes
  pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
    self.snapshot.subscribe()
  }

  /// The initial fetch, made before the door is exposed. Unlike later polls, a failure here is
  /// returned so setup can be aborted.
  pub async fn first_refresh(&self) -> GarageResult<()> {
    let _cycle = self.cycle.lock().await;
    let result = self.fetch().await;
    let outcome = result.as_ref().map(|_| ()).map_err(Clone::clone);
    self.record(result);

    outcome.map_err(|source| GarageError::Setup {
      identifier: self.identifier.clone(),
      source: Box::new(source),
    })
  }

  /// Fetch and parse the status now.
  ///
  /// If a fetch is already in flight this waits for it to complete instead of starting another.
  /// Failures are recorded in the snapshot, never returned.
  pub async fn request_refresh(&self) {
    let observed = self.completed.load(Ordering::Acquire);
    let _cycle = self.cycle.lock().await;
    if self.completed.load(Ordering::Acquire) != observed {
      log::debug!("{} refresh satisfied by in-flight poll", self);
      return;
    }

    let result = self.fetch().await;
    self.record(result);
  }

  async fn fetch(&self) -> GarageResult<DoorState> {
    let text = self.remote.fetch_status().await?;
    Ok(status::parse(&text)?)
  }

  fn record(&self, result: GarageResult<DoorState>) {
    match &result {
      Ok(state) => log::debug!("{} polled state: {}", self, state),
      Err(err) => log::warn!("{} poll failed, keeping last state: {}", self, err),
    }

    self.snapshot.send_modify(|snapshot| {
      match result {
        Ok(state) => {
          snapshot.last_value = Some(state);
          snapshot.last_error = None;
        }
        Err(err) => snapshot.last_error = Some(err),
      }
      snapshot.last_update = Some(Utc::now());
    });
    self.completed.fetch_add(1, Ordering::Release);
  }

  /// Poll every `poll_interval`, starting one interval from now.
  ///
  /// Failures don't stop the polling. The task ends once the coordinator is dropped.
  pub fn spawn_polling(self: &Arc<Self>) -> JoinHandle<()> {
    let coordinator = Arc::downgrade(self);
    let period = self.poll_interval;

    tokio::spawn(async move {
      let mut ticker = time::interval_at(Instant::now() + period, period);
      ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
      loop {
        ticker.tick().await;
        match coordinator.upgrade() {
          Some(coordinator) => coordinator.request_refresh().await,
          None => return,
        }
      }
    })
  }
}
