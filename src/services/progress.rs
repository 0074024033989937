use crate::domain::dispatch::ProgressEvent;
use tokio::sync::mpsc;

/// Receives the status line and progress fraction a job produces.
///
/// Sinks are called from the background send task, so implementations must
/// not assume they run on the caller's thread.
pub trait ProgressSink: Send + Sync + std::fmt::Debug {
    fn emit(&self, event: ProgressEvent);
}

/// Writes every event to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn emit(&self, event: ProgressEvent) {
        let line = event.status_line();
        match (&event, event.fraction()) {
            (ProgressEvent::Status(_), _) => tracing::info!(status = %line),
            (_, Some(fraction)) => tracing::info!(progress = format_args!("{:.0}%", fraction * 100.0), "{line}"),
            (_, None) => tracing::info!("{line}"),
        }
    }
}

/// Forwards events to a channel so a host can render them on its own task.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelSink {
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelSink {
    fn emit(&self, event: ProgressEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("Progress receiver dropped, discarding event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_sink_preserves_order() {
        let (sink, mut rx) = ChannelSink::channel();
        sink.emit(ProgressEvent::Status("first".into()));
        sink.emit(ProgressEvent::Status("second".into()));

        assert_eq!(rx.try_recv().ok(), Some(ProgressEvent::Status("first".into())));
        assert_eq!(rx.try_recv().ok(), Some(ProgressEvent::Status("second".into())));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_sink_survives_dropped_receiver() {
        let (sink, rx) = ChannelSink::channel();
        drop(rx);
        sink.emit(ProgressEvent::Status("ignored".into()));
    }
}
