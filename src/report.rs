use crate::events::AppEvent;
use crate::traits::ErrorReporter;
use color_eyre::eyre::Report;
use tokio::sync::mpsc;

/// Posts failures to the event loop, which shows them as an error toast.
/// Optionally mirrors them as a desktop notification.
pub struct ToastReporter {
    tx: mpsc::UnboundedSender<AppEvent>,
    desktop: bool,
}

impl ToastReporter {
    pub fn new(tx: mpsc::UnboundedSender<AppEvent>, desktop: bool) -> Self {
        Self { tx, desktop }
    }
}

impl ErrorReporter for ToastReporter {
    fn report(&self, error: &Report) {
        let message = format!("{error}");
        if self.desktop {
            send_desktop(&message);
        }
        if self.tx.send(AppEvent::Error(message)).is_err() {
            tracing::warn!("report: channel closed");
        }
    }
}

#[cfg(feature = "desktop-notify")]
fn send_desktop(message: &str) {
    use notify_rust::{Notification, Urgency};

    if let Err(e) = Notification::new()
        .summary("Run history")
        .body(message)
        .icon("dialog-error")
        .urgency(Urgency::Critical)
        .show()
    {
        tracing::debug!("desktop notification failed: {e}");
    }
}

#[cfg(not(feature = "desktop-notify"))]
fn send_desktop(_message: &str) {}
