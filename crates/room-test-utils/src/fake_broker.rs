//! In-memory meeting broker for controller tests.
//!
//! Configurable join responses (including malformed and case-variant
//! shapes), a mutable roster, and call counters so tests can assert on
//! exit-notification behavior.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use room_session::broker::{JoinInfo, MeetingBroker, Participant};
use room_session::errors::RoomError;

/// Fake meeting broker.
#[derive(Debug, Default)]
pub struct FakeBroker {
    join_response: Mutex<Option<Value>>,
    roster: Mutex<Vec<Participant>>,
    fail_join: bool,
    fail_fetch: bool,
    join_calls: AtomicUsize,
    exit_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl FakeBroker {
    /// Broker answering with the default snake_case join response.
    #[must_use]
    pub fn new() -> Self {
        Self {
            join_response: Mutex::new(Some(crate::fixtures::join_response_snake_case())),
            ..Self::default()
        }
    }

    /// Replace the raw join response.
    #[must_use]
    pub fn with_join_response(self, response: Value) -> Self {
        *lock(&self.join_response) = Some(response);
        self
    }

    /// Seed the roster returned by `fetch_participants`.
    #[must_use]
    pub fn with_roster(self, roster: Vec<Participant>) -> Self {
        *lock(&self.roster) = roster;
        self
    }

    /// Broker whose join requests fail at the network level.
    #[must_use]
    pub fn failing_join(mut self) -> Self {
        self.fail_join = true;
        self
    }

    /// Broker whose roster fetches fail.
    #[must_use]
    pub fn failing_fetch(mut self) -> Self {
        self.fail_fetch = true;
        self
    }

    /// Update the roster between fetches (simulates roster catch-up).
    pub fn set_roster(&self, roster: Vec<Participant>) {
        *lock(&self.roster) = roster;
    }

    #[must_use]
    pub fn join_calls(&self) -> usize {
        self.join_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn exit_notifications(&self) -> usize {
        self.exit_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn roster_fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MeetingBroker for FakeBroker {
    async fn join_meeting(
        &self,
        _space_pk: &str,
        _discussion_pk: &str,
    ) -> Result<JoinInfo, RoomError> {
        self.join_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_join {
            return Err(RoomError::Broker("join unavailable".to_string()));
        }
        let raw = lock(&self.join_response)
            .clone()
            .ok_or_else(|| RoomError::Broker("no join response configured".to_string()))?;
        Ok(JoinInfo::from_raw(&raw)?)
    }

    async fn notify_exit(&self, _space_pk: &str, _discussion_pk: &str) -> Result<(), RoomError> {
        self.exit_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn fetch_participants(
        &self,
        _space_pk: &str,
        _discussion_pk: &str,
    ) -> Result<Vec<Participant>, RoomError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch {
            return Err(RoomError::Broker("roster unavailable".to_string()));
        }
        Ok(lock(&self.roster).clone())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
