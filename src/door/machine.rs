use std::{
  fmt,
  sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
  time::Duration,
};

use tokio::{sync::watch, task::JoinHandle, time::Instant};

use super::{
  coordinator::{PollingCoordinator, Snapshot},
  identifier::Identifier,
  remote::DoorRemote,
  state::{Direction, DoorState, EffectiveDoorState},
};
use crate::{
  error::GarageResult,
  timer::{TimerHandle, TimerToken, Timers},
};

/// An assumed travel, begun by a toggle. Once its timer fires the door is assumed to have arrived.
#[derive(Debug)]
struct MotionSession {
  direction: Direction,
  started_at: Instant,
  timer: TimerHandle,
}

#[derive(Debug, Default)]
struct Position {
  /// Only ever open or closed
  last_known: Option<DoorState>,
  motion: Option<MotionSession>,
}

impl Position {
  /// Resolve what the door looks like given the latest polled value
  fn resolve(&mut self, last_value: Option<DoorState>) -> EffectiveDoorState {
    if let Some(state @ (DoorState::Open | DoorState::Closed)) = last_value {
      self.last_known = Some(state);
    }

    let direction = self.motion.as_ref().map(|motion| motion.direction);
    EffectiveDoorState {
      is_closed: self.last_known.and_then(|state| state.closedness()),
      is_opening: direction == Some(Direction::Opening),
      is_closing: direction == Some(Direction::Closing),
    }
  }
}

/// State shared with motion timers and the snapshot listener
#[derive(Debug)]
struct Reconciler {
  identifier: Identifier,
  position: Mutex<Position>,
  snapshot: watch::Receiver<Snapshot>,
  state_tx: watch::Sender<EffectiveDoorState>,
  timers: Timers,
}

impl fmt::Display for Reconciler {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Door ({})", self.identifier)
  }
}

impl Reconciler {
  fn position(&self) -> MutexGuard<'_, Position> {
    self.position.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn last_value(&self) -> Option<DoorState> {
    self.snapshot.borrow().last_value
  }

  fn effective(&self) -> EffectiveDoorState {
    let last_value = self.last_value();
    self.position().resolve(last_value)
  }

  /// Recompute the effective state and notify observers if it changed
  fn publish(&self) {
    let state = self.effective();
    let changed = self.state_tx.send_if_modified(|current| {
      if *current != state {
        *current = state;
        true
      }
      else {
        false
      }
    });
    if changed {
      log::info!("{} is now {}", self, state);
    }
  }

  /// Replace any active travel with a new one in `direction`
  fn begin_motion(self: &Arc<Self>, direction: Direction, expected_duration: Duration) {
    let reconciler = Arc::downgrade(self);
    let timer = self.timers.schedule(expected_duration, move |token| {
      if let Some(reconciler) = Weak::upgrade(&reconciler) {
        reconciler.finish_motion(token);
      }
    });

    let session = MotionSession {
      direction,
      started_at: Instant::now(),
      timer,
    };
    if let Some(previous) = self.position().motion.replace(session) {
      log::debug!("{} superseding {:?} travel", self, previous.direction);
      previous.timer.cancel();
    }
    self.publish();
  }

  /// The travel's timer fired. Assume the door got there unless the status page says otherwise.
  fn finish_motion(&self, token: TimerToken) {
    let last_value = self.last_value();
    {
      let mut position = self.position();
      // a superseded travel whose timer fired before it could be cancelled
      if position.motion.as_ref().map(|motion| motion.timer.token()) != Some(token) {
        return;
      }
      let Some(motion) = position.motion.take()
      else {
        return;
      };

      log::debug!(
        "{} travel {:?} assumed complete after {:?}",
        self,
        motion.direction,
        motion.started_at.elapsed()
      );
      if !matches!(last_value, Some(DoorState::Open | DoorState::Closed)) {
        position.last_known = Some(motion.direction.end_state());
      }
    }
    self.publish();
  }

  /// Drop any active travel without assuming where the door ended up
  fn cancel_motion(&self) {
    if let Some(motion) = self.position().motion.take() {
      motion.timer.cancel();
    }
    self.publish();
  }

  fn has_pending_motion(&self) -> bool {
    self
      .position()
      .motion
      .as_ref()
      .is_some_and(|motion| !motion.timer.is_finished())
  }
}

/// Turns polled statuses and door commands into the state shown to users.
#[derive(Debug)]
pub struct DoorStateMachine<R: DoorRemote> {
  remote: Arc<R>,
  coordinator: Arc<PollingCoordinator<R>>,
  travel_duration: Duration,
  reconciler: Arc<Reconciler>,
}

impl<R: DoorRemote> DoorStateMachine<R> {
  pub fn new(
    identifier: Identifier,
    remote: Arc<R>,
    coordinator: Arc<PollingCoordinator<R>>,
    travel_duration: Duration,
  ) -> Self {
    let snapshot = coordinator.subscribe();
    let (state_tx, _) = watch::channel(EffectiveDoorState::default());
    let reconciler = Arc::new(Reconciler {
      identifier,
      position: Mutex::new(Position::default()),
      snapshot,
      state_tx,
      timers: Timers::new(),
    });
    reconciler.publish();

    DoorStateMachine {
      remote,
      coordinator,
      travel_duration,
      reconciler,
    }
  }

  /// Republish the effective state each time the coordinator completes a poll.
  pub fn spawn_snapshot_listener(&self) -> JoinHandle<()> {
    let reconciler = Arc::downgrade(&self.reconciler);
    let mut snapshot = self.coordinator.subscribe();

    tokio::spawn(async move {
      while snapshot.changed().await.is_ok() {
        match reconciler.upgrade() {
          Some(reconciler) => reconciler.publish(),
          None => return,
        }
      }
    })
  }

  pub fn state(&self) -> EffectiveDoorState {
    self.reconciler.effective()
  }

  pub fn subscribe(&self) -> watch::Receiver<EffectiveDoorState> {
    self.reconciler.state_tx.subscribe()
  }

  /// The active travel's direction, if any
  pub fn motion(&self) -> Option<Direction> {
    self.reconciler.position().motion.as_ref().map(|motion| motion.direction)
  }

  /// True while a travel timer is waiting to fire
  pub fn has_pending_motion(&self) -> bool {
    self.reconciler.has_pending_motion()
  }

  pub async fn open(&self) -> GarageResult<()> {
    self.travel(Direction::Opening).await
  }

  pub async fn close(&self) -> GarageResult<()> {
    self.travel(Direction::Closing).await
  }

  /// Press the button to halt the door, forgetting any assumed travel once the press went through.
  ///
  /// Like open/close, a failed press leaves the travel to expire on its own.
  pub async fn stop(&self) -> GarageResult<()> {
    self.send_toggle().await?;
    self.reconciler.cancel_motion();
    self.coordinator.request_refresh().await;
    Ok(())
  }

  /// Shown as travelling straight away; a failed toggle leaves the travel to expire on its own.
  async fn travel(&self, direction: Direction) -> GarageResult<()> {
    self.reconciler.begin_motion(direction, self.travel_duration);
    self.toggle().await
  }

  async fn toggle(&self) -> GarageResult<()> {
    self.send_toggle().await?;
    self.coordinator.request_refresh().await;
    Ok(())
  }

  async fn send_toggle(&self) -> GarageResult<()> {
    self.remote.send_toggle().await.inspect_err(|err| {
      log::error!("{} toggle request failed: {}", self.reconciler, err);
    })
  }

  /// Cancel any pending travel timer
  pub fn shutdown(&self) {
    if let Some(motion) = self.reconciler.position().motion.take() {
      motion.timer.cancel();
    }
  }
}
