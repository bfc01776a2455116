//! A scriptable door controller for exercising the coordinator and state machine without HTTP.

use std::{
  collections::VecDeque,
  sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Mutex, PoisonError,
  },
};

use tokio::sync::Semaphore;

use super::remote::DoorRemote;
use crate::error::{GarageError, GarageResult};

#[derive(Debug, Default)]
pub struct FakeRemote {
  /// Responses handed out in order, unreachable once exhausted
  statuses: Mutex<VecDeque<GarageResult<String>>>,
  status_calls: AtomicUsize,
  toggle_calls: AtomicUsize,
  toggle_fails: AtomicBool,
  /// When set, each status fetch waits for a permit
  status_gate: Option<Semaphore>,
  /// When set, each toggle waits for a permit
  toggle_gate: Option<Semaphore>,
}

impl FakeRemote {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_statuses<'a>(statuses: impl IntoIterator<Item = &'a str>) -> Self {
    let remote = Self::new();
    for status in statuses {
      remote.push_status(Ok(status.to_string()));
    }
    remote
  }

  /// Status fetches block until [`FakeRemote::release`] is called
  pub fn gated() -> Self {
    FakeRemote {
      status_gate: Some(Semaphore::new(0)),
      ..Self::default()
    }
  }

  /// Toggles block until [`FakeRemote::release_toggle`] is called
  pub fn gated_toggles(self) -> Self {
    FakeRemote {
      toggle_gate: Some(Semaphore::new(0)),
      ..self
    }
  }

  pub fn unreachable() -> GarageError {
    GarageError::Network {
      url: "http://device.local/".to_string(),
      reason: "connection refused".to_string(),
    }
  }

  pub fn push_status(&self, status: GarageResult<String>) {
    self
      .statuses
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .push_back(status);
  }

  pub fn fail_toggles(&self, fail: bool) {
    self.toggle_fails.store(fail, Ordering::SeqCst);
  }

  pub fn release(&self) {
    if let Some(gate) = &self.status_gate {
      gate.add_permits(1);
    }
  }

  pub fn release_toggle(&self) {
    if let Some(gate) = &self.toggle_gate {
      gate.add_permits(1);
    }
  }

  pub fn status_calls(&self) -> usize {
    self.status_calls.load(Ordering::SeqCst)
  }

  pub fn toggle_calls(&self) -> usize {
    self.toggle_calls.load(Ordering::SeqCst)
  }
}

async fn pass(gate: &Option<Semaphore>) {
  if let Some(gate) = gate {
    if let Ok(permit) = gate.acquire().await {
      permit.forget();
    }
  }
}

impl DoorRemote for FakeRemote {
  async fn fetch_status(&self) -> GarageResult<String> {
    self.status_calls.fetch_add(1, Ordering::SeqCst);
    pass(&self.status_gate).await;
    self
      .statuses
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .pop_front()
      .unwrap_or_else(|| Err(FakeRemote::unreachable()))
  }

  async fn send_toggle(&self) -> GarageResult<()> {
    self.toggle_calls.fetch_add(1, Ordering::SeqCst);
    pass(&self.toggle_gate).await;
    if self.toggle_fails.load(Ordering::SeqCst) {
      Err(FakeRemote::unreachable())
    }
    else {
      Ok(())
    }
  }
}
