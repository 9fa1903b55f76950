//! Per-room state
//!
//! A [`Room`] owns the single critical section for its queue, session, token
//! and display. Different rooms never contend.

use roomq_common::RoomId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard, Notify};
use tokio::time::Instant;

use super::queue::RoomQueue;
use super::session::{Session, SessionSample};
use crate::services::DisplayHandle;

/// Where a room is in its start/play cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    /// Nothing playing and no start in progress
    Idle,
    /// A track was popped and is being resolved
    Starting,
    /// A session is live
    Playing,
}

/// Everything guarded by the room lock
pub struct RoomState {
    pub(crate) queue: RoomQueue,
    pub(crate) session: Option<Session>,
    pub(crate) phase: RoomPhase,
    pub(crate) display: Option<Arc<dyn DisplayHandle>>,
    /// Set by disconnect; late completions and resolutions are discarded
    pub(crate) closed: bool,
    /// Sessions in a row that ended with a transport error
    pub(crate) transport_failures: usize,
    current_token: u64,
    last_bound: u64,
}

impl RoomState {
    fn new() -> Self {
        Self {
            queue: RoomQueue::new(),
            session: None,
            phase: RoomPhase::Idle,
            display: None,
            closed: false,
            transport_failures: 0,
            current_token: 0,
            last_bound: 0,
        }
    }

    pub fn queue(&self) -> &RoomQueue {
        &self.queue
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn current_token(&self) -> u64 {
        self.current_token
    }

    /// Token for a new session
    ///
    /// A token already held by an earlier session is never handed out again.
    pub(crate) fn bind_token(&mut self) -> u64 {
        if self.last_bound == self.current_token {
            self.current_token += 1;
        }
        self.last_bound = self.current_token;
        self.current_token
    }

    /// Invalidate the current session's token
    pub(crate) fn retire_token(&mut self) {
        self.current_token += 1;
    }

    /// True while `token` names the live session
    pub fn is_current(&self, token: u64) -> bool {
        self.current_token == token
            && self.session.as_ref().is_some_and(|s| s.token() == token)
    }

    /// Sample the session bound to `token`, if it is still current
    pub fn sample(&self, token: u64, now: Instant, grace: Duration) -> Option<SessionSample> {
        if !self.is_current(token) {
            return None;
        }
        self.session
            .as_ref()
            .map(|session| SessionSample::take(session, now, grace))
    }
}

/// One isolated playback tenant
pub struct Room {
    id: RoomId,
    state: Mutex<RoomState>,
    torn_down: Notify,
}

impl Room {
    pub fn new(id: RoomId) -> Self {
        Self {
            id,
            state: Mutex::new(RoomState::new()),
            torn_down: Notify::new(),
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    /// Enter the room's critical section
    ///
    /// Callers must drop the guard before any collaborator I/O.
    pub async fn lock(&self) -> MutexGuard<'_, RoomState> {
        self.state.lock().await
    }

    pub async fn current_token(&self) -> u64 {
        self.state.lock().await.current_token()
    }

    /// Wake everyone waiting in [`Room::wait_torn_down`]
    pub(crate) fn mark_torn_down(&self) {
        self.torn_down.notify_waiters();
    }

    /// Wait until `gone` reports this room was dropped from its registry
    ///
    /// `gone` is rechecked after every wakeup, so a teardown that finished
    /// before the call is not missed.
    pub(crate) async fn wait_torn_down<F, Fut>(&self, mut gone: F)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        loop {
            let notified = self.torn_down.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if gone().await {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{Resolved, StreamHandle};
    use roomq_common::{Requester, SourceRef, Track};

    fn session(token: u64) -> Session {
        let resolved = Resolved {
            stream: StreamHandle::new("s"),
            title: "t".to_string(),
            duration_secs: Some(10),
            artist: None,
            thumbnail: None,
        };
        let track = Track::new(SourceRef::new("s"), "t", Requester::new("1", "a"));
        Session::new(track, token, &resolved, Instant::now())
    }

    #[test]
    fn test_first_session_gets_token_one() {
        let mut state = RoomState::new();
        assert_eq!(state.current_token(), 0);
        assert_eq!(state.bind_token(), 1);
    }

    #[test]
    fn test_tokens_strictly_increase() {
        let mut state = RoomState::new();
        let mut seen = Vec::new();

        for round in 0..10 {
            let token = state.bind_token();
            state.session = Some(session(token));
            seen.push(token);
            // Alternate between retiring and rebinding directly
            if round % 2 == 0 {
                state.session = None;
                state.retire_token();
            }
        }

        assert!(seen.windows(2).all(|w| w[0] < w[1]), "{seen:?}");
    }

    #[test]
    fn test_retire_then_bind_reuses_fresh_token() {
        let mut state = RoomState::new();
        let first = state.bind_token();
        state.session = Some(session(first));
        state.session = None;
        state.retire_token();

        // Retiring already moved past the old token
        assert_eq!(state.bind_token(), 2);
    }

    #[test]
    fn test_is_current_requires_matching_session() {
        let mut state = RoomState::new();
        let token = state.bind_token();
        assert!(!state.is_current(token));

        state.session = Some(session(token));
        assert!(state.is_current(token));
        assert!(state.sample(token, Instant::now(), Duration::ZERO).is_some());

        state.retire_token();
        assert!(!state.is_current(token));
        assert!(state.sample(token, Instant::now(), Duration::ZERO).is_none());
    }

    #[tokio::test]
    async fn test_room_lock_round_trip() {
        let room = Room::new(RoomId::new("r"));
        room.lock().await.bind_token();
        assert_eq!(room.current_token().await, 1);
        assert_eq!(room.id().as_str(), "r");
    }

    #[tokio::test]
    async fn test_wait_torn_down_sees_earlier_teardown() {
        let room = Arc::new(Room::new(RoomId::new("r")));
        let gone = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let waiter = {
            let room = room.clone();
            let gone = gone.clone();
            tokio::spawn(async move {
                room.wait_torn_down(|| {
                    let gone = gone.clone();
                    async move { gone.load(std::sync::atomic::Ordering::SeqCst) }
                })
                .await;
            })
        };
        tokio::task::yield_now().await;

        gone.store(true, std::sync::atomic::Ordering::SeqCst);
        room.mark_torn_down();
        waiter.await.unwrap();

        // Already gone: returns without a wakeup
        room.wait_torn_down(|| async { true }).await;
    }
}
