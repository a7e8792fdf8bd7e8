//! Notifier (spec §4.9): threshold-gated, debounced, foreground-aware
//! notification delivery. State transitions run synchronously inside the
//! cooperative loop; only the backend `send` call is handed to a worker via
//! `tokio::task::spawn_local` (the core is `Rc`-based and non-`Send`, so the
//! caller's runtime must drive this crate inside a `tokio::task::LocalSet`
//! — see the Orchestrator).

use std::rc::Rc;
use std::time::Duration;

use tokio::time::Instant;

const MIN_THRESHOLD_SECONDS: u64 = 60;
const DEFAULT_DEBOUNCE_SECONDS: f64 = 5.0;
const MAX_MESSAGE_CHARS: usize = 80;
const FALLBACK_MESSAGE: &str = "Response complete";

#[derive(Debug, Clone, PartialEq)]
pub struct NotifierConfig {
    pub enabled: bool,
    pub sound: Option<String>,
    pub threshold_seconds: u64,
    pub debounce_seconds: f64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sound: None,
            threshold_seconds: MIN_THRESHOLD_SECONDS,
            debounce_seconds: DEFAULT_DEBOUNCE_SECONDS,
        }
    }
}

impl NotifierConfig {
    fn normalized(mut self) -> Self {
        self.threshold_seconds = self.threshold_seconds.max(MIN_THRESHOLD_SECONDS);
        self
    }
}

/// Best-effort delivery backend. `send` must never panic or block for long;
/// it always runs inside a spawned task, never inline with the caller.
pub trait NotificationBackend {
    fn is_available(&self) -> bool;
    fn send(&self, title: &str, message: &str, sound: Option<&str>);
}

/// `notify-rust`-backed desktop delivery, the default production backend.
pub struct DesktopNotificationBackend;

impl NotificationBackend for DesktopNotificationBackend {
    fn is_available(&self) -> bool {
        true
    }

    fn send(&self, title: &str, message: &str, _sound: Option<&str>) {
        if let Err(err) = notify_rust::Notification::new().summary(title).body(message).show() {
            tracing::warn!(error = %err, "desktop notification delivery failed");
        }
    }
}

pub struct Notifier {
    config: NotifierConfig,
    backend: Option<Rc<dyn NotificationBackend>>,
    turn_start: Option<Instant>,
    pending: Option<String>,
    deadline: Option<Instant>,
    foreground: bool,
}

impl Notifier {
    pub fn new(config: NotifierConfig, backend: Option<Rc<dyn NotificationBackend>>) -> Self {
        Self {
            config: config.normalized(),
            backend,
            turn_start: None,
            pending: None,
            deadline: None,
            foreground: false,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// Wired to terminal focus state by the embedder; defaults to `false`
    /// (background) so delivery is exercised in the absence of an embedder.
    pub fn set_foreground(&mut self, foreground: bool) {
        self.foreground = foreground;
    }

    pub fn mark_turn_start(&mut self) {
        self.turn_start = Some(Instant::now());
    }

    /// Queue a candidate notification. Silently drops it unless enabled, a
    /// backend is present, and the turn has run at least `threshold_seconds`.
    pub fn queue(&mut self, message: &str) {
        if !self.config.enabled || self.backend.is_none() {
            return;
        }
        let elapsed = self
            .turn_start
            .map(|start| start.elapsed())
            .unwrap_or(Duration::MAX);
        if elapsed < Duration::from_secs(self.config.threshold_seconds) {
            return;
        }
        self.pending = Some(Self::truncate(message));
        self.deadline = Some(Instant::now() + Duration::from_secs_f64(self.config.debounce_seconds));
    }

    fn truncate(message: &str) -> String {
        if message.is_empty() {
            return FALLBACK_MESSAGE.to_string();
        }
        message.chars().take(MAX_MESSAGE_CHARS).collect()
    }

    /// The instant the dispatcher's `tokio::select!` should wait on, if a
    /// delivery is pending.
    pub fn pending_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Called by the dispatcher when `pending_deadline()` elapses.
    pub fn on_timer_expired(&mut self) {
        self.attempt_delivery();
    }

    /// Cancel the timer and attempt delivery immediately if pending.
    pub fn flush(&mut self) {
        self.attempt_delivery();
    }

    fn attempt_delivery(&mut self) {
        self.deadline = None;
        let Some(message) = self.pending.take() else {
            return;
        };
        if self.foreground {
            return;
        }
        let Some(backend) = self.backend.clone() else {
            return;
        };
        let sound = self.config.sound.clone();
        tokio::task::spawn_local(async move {
            backend.send("Agent REPL", &message, sound.as_deref());
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingBackend {
        calls: RefCell<Vec<(String, String)>>,
    }

    impl NotificationBackend for RecordingBackend {
        fn is_available(&self) -> bool {
            true
        }
        fn send(&self, title: &str, message: &str, _sound: Option<&str>) {
            self.calls
                .borrow_mut()
                .push((title.to_string(), message.to_string()));
        }
    }

    fn enabled_config() -> NotifierConfig {
        NotifierConfig {
            enabled: true,
            sound: None,
            threshold_seconds: 0,
            debounce_seconds: 5.0,
        }
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn threshold_suppresses_premature_delivery() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let recorder = Rc::new(RecordingBackend::default());
                let mut config = enabled_config();
                config.threshold_seconds = 120;
                let mut notifier = Notifier::new(config, Some(recorder.clone() as Rc<dyn NotificationBackend>));
                notifier.mark_turn_start();
                notifier.queue("hello");
                assert!(notifier.pending_deadline().is_none());
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn debounce_collapses_to_last_message() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let recorder = Rc::new(RecordingBackend::default());
                let mut notifier =
                    Notifier::new(enabled_config(), Some(recorder.clone() as Rc<dyn NotificationBackend>));
                notifier.mark_turn_start();

                notifier.queue("A");
                tokio::time::advance(Duration::from_secs(2)).await;
                notifier.queue("B");

                notifier.flush();
                tokio::task::yield_now().await;

                let calls = recorder.calls.borrow();
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].1, "B");
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn timer_expiry_without_flush_still_delivers() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let recorder = Rc::new(RecordingBackend::default());
                let mut notifier =
                    Notifier::new(enabled_config(), Some(recorder.clone() as Rc<dyn NotificationBackend>));
                notifier.mark_turn_start();

                notifier.queue("A");
                tokio::time::advance(Duration::from_secs(2)).await;
                notifier.queue("B");

                let deadline = notifier.pending_deadline().expect("pending");
                tokio::time::sleep_until(deadline).await;
                notifier.on_timer_expired();
                tokio::task::yield_now().await;

                let calls = recorder.calls.borrow();
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].1, "B");
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn foreground_suppresses_delivery() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let recorder = Rc::new(RecordingBackend::default());
                let mut notifier =
                    Notifier::new(enabled_config(), Some(recorder.clone() as Rc<dyn NotificationBackend>));
                notifier.set_foreground(true);
                notifier.mark_turn_start();
                notifier.queue("A");
                notifier.flush();
                tokio::task::yield_now().await;
                assert!(recorder.calls.borrow().is_empty());
            })
            .await;
    }
}
