use tokio::sync::mpsc;
use tracing::debug;

use crate::content::Attachment;

/// Live feedback emitted while a delegated call is running.
///
/// These events exist for display only; the returned reply does not depend
/// on whether anyone consumes them.
#[derive(Clone, Debug, PartialEq)]
pub enum ProgressEvent {
    /// Suffix for the caller's own stage name (`": <prompt>"`).
    Title(String),
    /// Reply text fragment, in arrival order.
    Content(String),
    StageOpened { index: u64, name: Option<String> },
    StageName { index: u64, fragment: String },
    StageContent { index: u64, fragment: String },
    StageAttachment { index: u64, attachment: Attachment },
    StageClosed { index: u64 },
    /// Reply-level attachment, forwarded once the stream is drained.
    Attachment(Attachment),
}

/// Receiver of progress events for one invocation.
///
/// Stage indices are per stream, so a sink must not be shared between
/// concurrent invocations unless it can tell them apart.
#[async_trait::async_trait]
pub trait ProgressSink: Send + Sync {
    /// Delivers one event. Implementations may await to apply backpressure
    /// but must not fail the caller.
    async fn emit(&self, event: ProgressEvent);
}

/// Sink that drops every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

#[async_trait::async_trait]
impl ProgressSink for NoopSink {
    async fn emit(&self, _event: ProgressEvent) {}
}

/// Sink backed by a bounded tokio channel.
#[derive(Clone, Debug)]
pub struct ChannelSink {
    tx: mpsc::Sender<ProgressEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<ProgressEvent>) -> Self {
        Self { tx }
    }

    /// Creates a sink and the receiver that observes it.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait::async_trait]
impl ProgressSink for ChannelSink {
    async fn emit(&self, event: ProgressEvent) {
        if self.tx.send(event).await.is_err() {
            debug!("progress receiver dropped; event discarded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_sink_preserves_order() {
        let (sink, mut rx) = ChannelSink::channel(8);
        sink.emit(ProgressEvent::Content("a".into())).await;
        sink.emit(ProgressEvent::StageClosed { index: 0 }).await;
        assert_eq!(rx.recv().await, Some(ProgressEvent::Content("a".into())));
        assert_eq!(rx.recv().await, Some(ProgressEvent::StageClosed { index: 0 }));
    }

    #[tokio::test]
    async fn channel_sink_tolerates_dropped_receiver() {
        let (sink, rx) = ChannelSink::channel(1);
        drop(rx);
        sink.emit(ProgressEvent::Title(": hi".into())).await;
    }
}
