//! Typing indicator debounce.
//!
//! The first keystroke emits `typing-start`. Every keystroke pushes the idle
//! deadline out; once the deadline passes without input, `typing-stop` is
//! emitted.

use crate::events::ClientEvent;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

pub const TYPING_IDLE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingSignal {
    Start,
    Stop,
}

/// Deadline bookkeeping without any timers, driven by explicit instants.
#[derive(Debug, Clone)]
pub struct TypingTracker {
    idle: Duration,
    deadline: Option<Instant>,
}

impl TypingTracker {
    pub fn new(idle: Duration) -> Self {
        Self { idle, deadline: None }
    }

    pub fn is_active(&self, now: Instant) -> bool {
        self.deadline.map_or(false, |d| d > now)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn keystroke(&mut self, now: Instant) -> Option<TypingSignal> {
        let was_active = self.is_active(now);
        self.deadline = Some(now + self.idle);
        (!was_active).then_some(TypingSignal::Start)
    }

    /// Returns `Stop` once the deadline has passed.
    pub fn expire(&mut self, now: Instant) -> Option<TypingSignal> {
        match self.deadline {
            Some(d) if d <= now => {
                self.deadline = None;
                Some(TypingSignal::Stop)
            }
            _ => None,
        }
    }

    /// Explicit stop, e.g. after sending or closing the conversation.
    pub fn stop(&mut self, now: Instant) -> Option<TypingSignal> {
        let was_active = self.is_active(now);
        self.deadline = None;
        was_active.then_some(TypingSignal::Stop)
    }
}

/// Runs a [`TypingTracker`] against the tokio clock and emits the matching
/// socket events on `outbound`.
#[derive(Debug)]
pub struct TypingDebouncer {
    tracker: TypingTracker,
    peer_id: Option<String>,
    timer: Option<JoinHandle<()>>,
}

impl TypingDebouncer {
    pub fn new(idle: Duration) -> Self {
        Self {
            tracker: TypingTracker::new(idle),
            peer_id: None,
            timer: None,
        }
    }

    pub fn is_typing(&self) -> bool {
        self.tracker.is_active(Instant::now())
    }

    pub fn keystroke(&mut self, peer_id: &str, outbound: &mpsc::UnboundedSender<ClientEvent>) {
        if self.peer_id.as_deref().is_some_and(|p| p != peer_id) {
            self.stop(outbound);
        }

        let now = Instant::now();
        if self.tracker.keystroke(now) == Some(TypingSignal::Start) {
            let _ = outbound.send(ClientEvent::TypingStart {
                receiver_id: peer_id.to_string(),
            });
        }
        self.peer_id = Some(peer_id.to_string());

        if let Some(timer) = self.timer.take() {
            timer.abort();
        }

        let Some(deadline) = self.tracker.deadline() else {
            return;
        };
        let tx = outbound.clone();
        let receiver_id = peer_id.to_string();
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let _ = tx.send(ClientEvent::TypingStop { receiver_id });
        }));
    }

    pub fn stop(&mut self, outbound: &mpsc::UnboundedSender<ClientEvent>) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }

        let peer_id = self.peer_id.take();
        if self.tracker.stop(Instant::now()) == Some(TypingSignal::Stop) {
            if let Some(receiver_id) = peer_id {
                let _ = outbound.send(ClientEvent::TypingStop { receiver_id });
            }
        }
    }
}

impl Drop for TypingDebouncer {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_start_once_then_stop() {
        let mut tracker = TypingTracker::new(TYPING_IDLE_TIMEOUT);
        let t0 = Instant::now();

        assert_eq!(tracker.keystroke(t0), Some(TypingSignal::Start));
        assert_eq!(tracker.keystroke(t0 + Duration::from_millis(500)), None);
        assert_eq!(tracker.keystroke(t0 + Duration::from_millis(1500)), None);

        // Deadline moved to 3.5s by the last keystroke.
        assert_eq!(tracker.expire(t0 + Duration::from_millis(3000)), None);
        assert_eq!(tracker.expire(t0 + Duration::from_millis(3500)), Some(TypingSignal::Stop));
        assert_eq!(tracker.expire(t0 + Duration::from_millis(4000)), None);

        // Typing again after going idle starts a new burst.
        assert_eq!(tracker.keystroke(t0 + Duration::from_secs(5)), Some(TypingSignal::Start));
    }

    #[test]
    fn test_tracker_explicit_stop() {
        let mut tracker = TypingTracker::new(TYPING_IDLE_TIMEOUT);
        let t0 = Instant::now();

        assert_eq!(tracker.stop(t0), None);
        tracker.keystroke(t0);
        assert_eq!(tracker.stop(t0 + Duration::from_millis(10)), Some(TypingSignal::Stop));
        assert_eq!(tracker.stop(t0 + Duration::from_millis(20)), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debouncer_emits_stop_after_idle() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut debouncer = TypingDebouncer::new(TYPING_IDLE_TIMEOUT);

        debouncer.keystroke("bob", &tx);
        assert_eq!(rx.recv().await, Some(ClientEvent::TypingStart { receiver_id: "bob".into() }));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        debouncer.keystroke("bob", &tx);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(rx.try_recv().is_err());
        assert!(debouncer.is_typing());

        let started = Instant::now();
        let stop = rx.recv().await;
        assert_eq!(stop, Some(ClientEvent::TypingStop { receiver_id: "bob".into() }));
        assert!(started.elapsed() <= Duration::from_millis(500));
        assert!(!debouncer.is_typing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_debouncer_stop_cancels_timer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut debouncer = TypingDebouncer::new(TYPING_IDLE_TIMEOUT);

        debouncer.keystroke("bob", &tx);
        debouncer.stop(&tx);

        assert_eq!(rx.recv().await, Some(ClientEvent::TypingStart { receiver_id: "bob".into() }));
        assert_eq!(rx.recv().await, Some(ClientEvent::TypingStop { receiver_id: "bob".into() }));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_switching_peer_stops_previous() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut debouncer = TypingDebouncer::new(TYPING_IDLE_TIMEOUT);

        debouncer.keystroke("bob", &tx);
        debouncer.keystroke("ann", &tx);

        assert_eq!(rx.recv().await, Some(ClientEvent::TypingStart { receiver_id: "bob".into() }));
        assert_eq!(rx.recv().await, Some(ClientEvent::TypingStop { receiver_id: "bob".into() }));
        assert_eq!(rx.recv().await, Some(ClientEvent::TypingStart { receiver_id: "ann".into() }));
        assert_eq!(rx.recv().await, Some(ClientEvent::TypingStop { receiver_id: "ann".into() }));
    }
}
