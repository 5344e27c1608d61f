//! User-facing notifications
//!
//! Non-fatal messages for whatever front end drives the player. Every
//! notification is also logged, once: errors the player recovers from go
//! to the log at `warn`, failed backend calls at `error`.

use crossbeam_channel::{unbounded, Receiver, Sender};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: Level,
    pub message: String,
}

/// Sending half of the notification channel
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: Option<Sender<Notification>>,
}

impl Notifier {
    pub fn channel() -> (Self, Receiver<Notification>) {
        let (tx, rx) = unbounded();
        (Self { tx: Some(tx) }, rx)
    }

    /// Log only
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn notify(&self, level: Level, message: impl Into<String>) {
        let log_level = match level {
            Level::Error => tracing::Level::ERROR,
            Level::Info | Level::Success => tracing::Level::INFO,
        };
        self.notify_logged(level, log_level, message);
    }

    /// Notify at `level`, logging at `log_level`
    pub fn notify_logged(
        &self,
        level: Level,
        log_level: tracing::Level,
        message: impl Into<String>,
    ) {
        let message = message.into();
        if log_level == tracing::Level::ERROR {
            tracing::error!("{}", message);
        } else if log_level == tracing::Level::WARN {
            tracing::warn!("{}", message);
        } else if log_level == tracing::Level::INFO {
            tracing::info!("{}", message);
        } else {
            tracing::debug!("{}", message);
        }
        if let Some(tx) = &self.tx {
            let _ = tx.send(Notification { level, message });
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.notify(Level::Info, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.notify(Level::Success, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.notify(Level::Error, message);
    }

    /// An error shown to the user that playback carries on past
    pub fn recovered(&self, message: impl Into<String>) {
        self.notify_logged(Level::Error, tracing::Level::WARN, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::io;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn logged(f: impl FnOnce()) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = captured.0.lock().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_notifications_are_delivered_in_order() {
        let (notifier, rx) = Notifier::channel();
        notifier.success("Background track uploaded!");
        notifier.error("Failed to upload track");

        let received: Vec<_> = rx.try_iter().collect();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].level, Level::Success);
        assert_eq!(received[1].message, "Failed to upload track");
    }

    #[test]
    fn test_dropped_receiver_is_harmless() {
        let (notifier, rx) = Notifier::channel();
        drop(rx);
        notifier.info("still fine");
        Notifier::disabled().error("logged only");
    }

    #[test]
    fn test_recovered_errors_log_once_at_warn() {
        let (notifier, rx) = Notifier::channel();
        let log = logged(|| {
            notifier.recovered("Could not play background music: No media loaded");
        });

        assert_eq!(log.lines().count(), 1);
        assert!(log.contains("WARN"));
        assert!(!log.contains("ERROR"));
        assert_eq!(
            rx.try_recv().unwrap(),
            Notification {
                level: Level::Error,
                message: "Could not play background music: No media loaded".to_string(),
            }
        );
    }

    #[test]
    fn test_backend_errors_log_at_error() {
        let (notifier, _rx) = Notifier::channel();
        let log = logged(|| notifier.error("Failed to upload track"));
        assert_eq!(log.lines().count(), 1);
        assert!(log.contains("ERROR"));
    }
}
