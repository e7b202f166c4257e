//! 发布循环（服务端）
//!
//! Samples the shared value once per tick and pushes it to every subscriber,
//! or pushes the heartbeat sentinel when nothing changed.
//!
//! ```text
//! Idle ──tick──▶ read clipboard ──changed──▶ broadcast(value)  ──▶ Idle
//!                              └─unchanged─▶ broadcast("¤")    ──▶ Idle
//! ```

use cc_core::ports::{BroadcastPort, ClipboardReaderPort, DataViewPort};
use cc_core::protocol::{Response, HEARTBEAT_SENTINEL, MAX_FRAME_BYTES};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, trace, warn, Instrument};

/// What a single tick pushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Published(String),
    Heartbeat,
}

pub struct PublishLoop {
    reader: Arc<dyn ClipboardReaderPort>,
    broadcaster: Arc<dyn BroadcastPort>,
    data_view: Option<Arc<dyn DataViewPort>>,
    tick_interval: Duration,
    max_frame_bytes: usize,
    last_pushed: Option<String>,
    last_refused_len: Option<usize>,
}

impl PublishLoop {
    pub fn new(
        reader: Arc<dyn ClipboardReaderPort>,
        broadcaster: Arc<dyn BroadcastPort>,
        tick_interval: Duration,
    ) -> Self {
        Self {
            reader,
            broadcaster,
            data_view: None,
            tick_interval,
            max_frame_bytes: MAX_FRAME_BYTES,
            last_pushed: None,
            last_refused_len: None,
        }
    }

    pub fn with_data_view(mut self, data_view: Arc<dyn DataViewPort>) -> Self {
        self.data_view = Some(data_view);
        self
    }

    /// Values longer than this stay unpublished.
    pub fn with_max_frame_bytes(mut self, max_frame_bytes: usize) -> Self {
        self.max_frame_bytes = max_frame_bytes;
        self
    }

    pub fn last_pushed(&self) -> Option<&str> {
        self.last_pushed.as_deref()
    }

    /// Run one Idle → Pushed → Idle transition.
    pub async fn tick(&mut self) -> TickOutcome {
        if let Some(value) = self.read_value().await {
            if value.len() > self.max_frame_bytes {
                if self.last_refused_len != Some(value.len()) {
                    warn!(len = value.len(), max = self.max_frame_bytes, "clipboard text too large to publish");
                    self.last_refused_len = Some(value.len());
                }
            } else if self.last_pushed.as_deref() != Some(value.as_str()) {
                match Response::for_value(&value) {
                    Some(response) => {
                        self.broadcaster.broadcast(response.as_wire()).await;
                        debug!(len = value.len(), "published new value");
                        if let Some(view) = &self.data_view {
                            view.show(&value);
                        }
                        self.last_pushed = Some(value.clone());
                        self.last_refused_len = None;
                        return TickOutcome::Published(value);
                    }
                    None => debug!("clipboard holds the heartbeat sentinel, not publishing"),
                }
            }
        }

        self.broadcaster.broadcast(HEARTBEAT_SENTINEL).await;
        TickOutcome::Heartbeat
    }

    /// Tick until `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        let span = info_span!("usecase.publish_loop.run", tick_ms = self.tick_interval.as_millis() as u64);

        async move {
            info!("publish loop started");
            let mut interval = tokio::time::interval(self.tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {}
                }
                self.tick().await;
            }
            info!("publish loop stopped");
        }
        .instrument(span)
        .await
    }

    /// Read failures count as "no change this tick".
    async fn read_value(&self) -> Option<String> {
        let reader = Arc::clone(&self.reader);
        match tokio::task::spawn_blocking(move || reader.read_current_value()).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                trace!(error = %e, "clipboard read failed, treating as unchanged");
                None
            }
            Err(e) => {
                debug!(error = %e, "clipboard read task failed, treating as unchanged");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cc_core::ports::mocks::{MockClipboardReader, MockDataView};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Broadcaster that records every frame it was asked to send.
    #[derive(Default)]
    struct RecordingBroadcaster {
        sent: Mutex<Vec<String>>,
    }

    impl RecordingBroadcaster {
        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BroadcastPort for RecordingBroadcaster {
        async fn broadcast(&self, text: &str) {
            self.sent.lock().unwrap().push(text.to_string());
        }

        async fn size(&self) -> usize {
            1
        }
    }

    /// Clipboard that replays a fixed script, then repeats its last entry.
    struct ScriptedClipboard {
        script: Mutex<VecDeque<anyhow::Result<String>>>,
        last: Mutex<Option<String>>,
    }

    impl ScriptedClipboard {
        fn new(script: Vec<anyhow::Result<String>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                last: Mutex::new(None),
            }
        }
    }

    impl ClipboardReaderPort for ScriptedClipboard {
        fn read_current_value(&self) -> anyhow::Result<String> {
            match self.script.lock().unwrap().pop_front() {
                Some(Ok(value)) => {
                    *self.last.lock().unwrap() = Some(value.clone());
                    Ok(value)
                }
                Some(Err(e)) => Err(e),
                None => self
                    .last
                    .lock()
                    .unwrap()
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("empty clipboard")),
            }
        }
    }

    fn publish_loop(
        script: Vec<anyhow::Result<String>>,
    ) -> (PublishLoop, Arc<RecordingBroadcaster>) {
        let broadcaster = Arc::new(RecordingBroadcaster::default());
        let publish = PublishLoop::new(
            Arc::new(ScriptedClipboard::new(script)),
            broadcaster.clone(),
            Duration::from_millis(100),
        );
        (publish, broadcaster)
    }

    #[tokio::test]
    async fn new_value_is_published_then_heartbeats() {
        let (mut publish, broadcaster) = publish_loop(vec![Ok("hello".into())]);

        assert_eq!(publish.tick().await, TickOutcome::Published("hello".into()));
        assert_eq!(publish.tick().await, TickOutcome::Heartbeat);
        assert_eq!(publish.tick().await, TickOutcome::Heartbeat);

        assert_eq!(broadcaster.sent(), vec!["hello", "¤", "¤"]);
        assert_eq!(publish.last_pushed(), Some("hello"));
    }

    #[tokio::test]
    async fn read_failure_counts_as_no_change() {
        let (mut publish, broadcaster) = publish_loop(vec![
            Ok("a".into()),
            Err(anyhow::anyhow!("clipboard busy")),
            Ok("b".into()),
        ]);

        publish.tick().await;
        assert_eq!(publish.tick().await, TickOutcome::Heartbeat);
        assert_eq!(publish.tick().await, TickOutcome::Published("b".into()));

        assert_eq!(broadcaster.sent(), vec!["a", "¤", "b"]);
    }

    #[tokio::test]
    async fn sentinel_valued_clipboard_is_never_published() {
        let (mut publish, broadcaster) = publish_loop(vec![Ok(HEARTBEAT_SENTINEL.into())]);

        assert_eq!(publish.tick().await, TickOutcome::Heartbeat);
        assert_eq!(publish.last_pushed(), None);
        assert_eq!(broadcaster.sent(), vec!["¤"]);
    }

    #[tokio::test]
    async fn oversize_value_is_held_back() {
        let (publish, broadcaster) =
            publish_loop(vec![Ok("small".into()), Ok("far too long".into())]);
        let mut publish = publish.with_max_frame_bytes(8);

        assert_eq!(publish.tick().await, TickOutcome::Published("small".into()));
        assert_eq!(publish.tick().await, TickOutcome::Heartbeat);
        assert_eq!(publish.last_pushed(), Some("small"));
        assert_eq!(broadcaster.sent(), vec!["small", "¤"]);
    }

    #[tokio::test]
    async fn returning_to_a_previous_value_publishes_again() {
        let (mut publish, broadcaster) =
            publish_loop(vec![Ok("a".into()), Ok("b".into()), Ok("a".into())]);

        for _ in 0..3 {
            publish.tick().await;
        }
        assert_eq!(broadcaster.sent(), vec!["a", "b", "a"]);
    }

    #[tokio::test]
    async fn data_view_sees_each_published_value_once() {
        let mut reader = MockClipboardReader::new();
        reader
            .expect_read_current_value()
            .returning(|| Ok("shown".to_string()));
        let mut view = MockDataView::new();
        view.expect_show()
            .withf(|text| text == "shown")
            .times(1)
            .return_const(());

        let broadcaster = Arc::new(RecordingBroadcaster::default());
        let mut publish = PublishLoop::new(
            Arc::new(reader),
            broadcaster.clone(),
            Duration::from_millis(100),
        )
        .with_data_view(Arc::new(view));

        for _ in 0..3 {
            publish.tick().await;
        }
        assert_eq!(broadcaster.sent(), vec!["shown", "¤", "¤"]);
    }

    #[tokio::test(start_paused = true)]
    async fn run_ticks_on_interval_until_cancelled() {
        let (publish, broadcaster) = publish_loop(vec![Ok("v".into())]);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(publish.run(cancel.clone()));

        tokio::time::sleep(Duration::from_millis(350)).await;
        cancel.cancel();
        handle.await.unwrap();

        let sent = broadcaster.sent();
        assert_eq!(sent.first().map(String::as_str), Some("v"));
        // Ticks at 0, 100, 200 and 300ms.
        assert!((3..=4).contains(&sent.len()), "ticks: {sent:?}");
        assert!(sent[1..].iter().all(|s| s == "¤"));

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(broadcaster.sent().len(), sent.len());
    }
}
