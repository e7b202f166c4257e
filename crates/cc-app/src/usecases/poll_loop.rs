//! 轮询循环（客户端）
//!
//! Requests the shared value, waits for the publisher's answer and hands
//! actionable updates to the presenter. Runs until the publisher is gone or
//! the process is asked to stop.

use cc_core::cache::ClientCache;
use cc_core::error::{ConnError, ServiceError};
use cc_core::ports::{PollTransportPort, SubscriberNotifierPort};
use cc_core::protocol::Response;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, trace, warn, Instrument};

const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(1);
const DEFAULT_DEAD_PEER_AFTER: Duration = Duration::from_secs(10);

/// Result of one request/response round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStep {
    /// The cache took a new value and the presenter was told.
    Updated(String),
    /// Heartbeat, undecodable frame or a repeat of the cached value.
    Unchanged,
    Cancelled,
}

enum Received {
    Frame(Option<String>),
    Cancelled,
}

pub struct PollLoop<T> {
    transport: T,
    cache: ClientCache,
    notifier: Arc<dyn SubscriberNotifierPort>,
    receive_timeout: Duration,
    dead_peer_after: Duration,
}

impl<T: PollTransportPort> PollLoop<T> {
    pub fn new(
        transport: T,
        cache: ClientCache,
        notifier: Arc<dyn SubscriberNotifierPort>,
    ) -> Self {
        Self {
            transport,
            cache,
            notifier,
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            dead_peer_after: DEFAULT_DEAD_PEER_AFTER,
        }
    }

    /// How long to wait before counting the silence as one heartbeat.
    pub fn with_receive_timeout(mut self, receive_timeout: Duration) -> Self {
        self.receive_timeout = receive_timeout.max(Duration::from_millis(1));
        self
    }

    /// Silence after which the publisher is considered gone.
    pub fn with_dead_peer_after(mut self, dead_peer_after: Duration) -> Self {
        self.dead_peer_after = dead_peer_after;
        self
    }

    pub fn cache(&self) -> &ClientCache {
        &self.cache
    }

    /// Send one request and process the answer.
    ///
    /// A receive timeout does not end the round: the pending read is kept
    /// (dropping it mid-frame would desync the stream) and only silence of
    /// `dead_peer_after` or longer turns into `ConnError::Disconnected`.
    pub async fn poll_once(&mut self, cancel: &CancellationToken) -> Result<PollStep, ConnError> {
        if cancel.is_cancelled() {
            return Ok(PollStep::Cancelled);
        }

        self.transport.send_request().await?;

        let response = match self.await_response(cancel).await? {
            Received::Frame(response) => response,
            Received::Cancelled => return Ok(PollStep::Cancelled),
        };

        let text = match response.map(Response::from_text) {
            Some(Response::Value(text)) => Some(text),
            Some(Response::Heartbeat) => {
                trace!("heartbeat");
                None
            }
            None => None,
        };

        match self.cache.reconcile(text.as_deref()) {
            Some(value) => {
                self.notifier.on_data_received(&value);
                Ok(PollStep::Updated(value))
            }
            None => Ok(PollStep::Unchanged),
        }
    }

    async fn await_response(&mut self, cancel: &CancellationToken) -> Result<Received, ConnError> {
        let patience = self.receive_timeout;
        let dead_after = self.dead_peer_after;
        let started = Instant::now();

        let receive = self.transport.receive();
        tokio::pin!(receive);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(Received::Cancelled),
                result = &mut receive => return result.map(Received::Frame),
                _ = tokio::time::sleep(patience) => {
                    let silent = started.elapsed();
                    if silent >= dead_after {
                        return Err(ConnError::disconnected(format!(
                            "no response from server for {}ms",
                            silent.as_millis()
                        )));
                    }
                    trace!(silent_ms = silent.as_millis() as u64, "receive timed out, treating as heartbeat");
                }
            }
        }
    }

    /// Poll until the publisher is lost or `cancel` fires.
    ///
    /// Losing the publisher closes the transport, notifies the presenter
    /// once and returns [`ServiceError::PeerDisconnected`]. There is no
    /// reconnect.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), ServiceError> {
        let session = self.transport.session_id();
        let span = info_span!("usecase.poll_loop.run", session = %session);

        async move {
            info!("subscribed to publisher as {session}");

            loop {
                match self.poll_once(&cancel).await {
                    Ok(PollStep::Updated(value)) => {
                        debug!(len = value.len(), "received update");
                    }
                    Ok(PollStep::Unchanged) => {}
                    Ok(PollStep::Cancelled) => {
                        self.transport.close().await;
                        info!("poll loop stopped");
                        return Ok(());
                    }
                    Err(e) => {
                        warn!(error = %e, "lost connection to the publisher");
                        self.transport.close().await;
                        self.notifier.on_heartbeat_connection_lost();
                        return Err(ServiceError::from(e));
                    }
                }
            }
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cc_core::ids::SessionId;
    use cc_core::ports::mocks::MockSubscriberNotifier;
    use cc_core::protocol::HEARTBEAT_SENTINEL;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    enum Scripted {
        Frame(Option<&'static str>),
        Late(Duration, &'static str),
        Silence,
        Disconnect,
    }

    #[derive(Default, Clone)]
    struct Tracker {
        requests: Arc<AtomicUsize>,
        closed: Arc<AtomicBool>,
    }

    /// Transport that answers from a script; an exhausted script disconnects.
    struct ScriptedTransport {
        script: VecDeque<Scripted>,
        tracker: Tracker,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Scripted>) -> (Self, Tracker) {
            let tracker = Tracker::default();
            (
                Self {
                    script: script.into(),
                    tracker: tracker.clone(),
                },
                tracker,
            )
        }
    }

    #[async_trait]
    impl PollTransportPort for ScriptedTransport {
        fn session_id(&self) -> SessionId {
            SessionId::new("127.0.0.1:50123".parse().unwrap())
        }

        async fn send_request(&mut self) -> Result<(), ConnError> {
            self.tracker.requests.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn receive(&mut self) -> Result<Option<String>, ConnError> {
            match self.script.pop_front() {
                Some(Scripted::Frame(frame)) => Ok(frame.map(str::to_string)),
                Some(Scripted::Late(delay, text)) => {
                    tokio::time::sleep(delay).await;
                    Ok(Some(text.to_string()))
                }
                Some(Scripted::Silence) => std::future::pending().await,
                Some(Scripted::Disconnect) | None => {
                    Err(ConnError::disconnected("connection closed by peer"))
                }
            }
        }

        async fn close(&mut self) {
            self.tracker.closed.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn only_new_values_reach_the_presenter() {
        let (transport, tracker) = ScriptedTransport::new(vec![
            Scripted::Frame(Some("X")),
            Scripted::Frame(Some(HEARTBEAT_SENTINEL)),
            Scripted::Frame(None),
            Scripted::Frame(Some("Y")),
        ]);
        let mut notifier = MockSubscriberNotifier::new();
        notifier
            .expect_on_data_received()
            .withf(|text| text == "Y")
            .times(1)
            .return_const(());
        notifier.expect_on_heartbeat_connection_lost().times(0);

        let mut poll = PollLoop::new(transport, ClientCache::with_value("X"), Arc::new(notifier));
        let cancel = CancellationToken::new();

        assert_eq!(poll.poll_once(&cancel).await.unwrap(), PollStep::Unchanged);
        assert_eq!(poll.poll_once(&cancel).await.unwrap(), PollStep::Unchanged);
        assert_eq!(poll.poll_once(&cancel).await.unwrap(), PollStep::Unchanged);
        assert_eq!(
            poll.poll_once(&cancel).await.unwrap(),
            PollStep::Updated("Y".into())
        );
        assert_eq!(poll.cache().current(), "Y");
        assert_eq!(tracker.requests.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn disconnect_ends_the_loop_with_one_notification() {
        let (transport, tracker) = ScriptedTransport::new(vec![
            Scripted::Frame(Some("hello")),
            Scripted::Frame(Some(HEARTBEAT_SENTINEL)),
            Scripted::Frame(Some(HEARTBEAT_SENTINEL)),
            Scripted::Disconnect,
        ]);
        let mut notifier = MockSubscriberNotifier::new();
        notifier
            .expect_on_data_received()
            .withf(|text| text == "hello")
            .times(1)
            .return_const(());
        notifier
            .expect_on_heartbeat_connection_lost()
            .times(1)
            .return_const(());

        let poll = PollLoop::new(transport, ClientCache::new(), Arc::new(notifier));
        let err = poll.run(CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, ServiceError::PeerDisconnected(_)));
        assert!(tracker.closed.load(Ordering::SeqCst));
        assert_eq!(tracker.requests.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_without_reporting_loss() {
        let (transport, tracker) = ScriptedTransport::new(vec![Scripted::Silence]);
        let mut notifier = MockSubscriberNotifier::new();
        notifier.expect_on_data_received().times(0);
        notifier.expect_on_heartbeat_connection_lost().times(0);

        let cancel = CancellationToken::new();
        let poll = PollLoop::new(transport, ClientCache::new(), Arc::new(notifier));
        let handle = tokio::spawn(poll.run(cancel.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        assert!(handle.await.unwrap().is_ok());
        assert!(tracker.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn already_cancelled_token_sends_nothing() {
        let (transport, tracker) = ScriptedTransport::new(vec![Scripted::Frame(Some("x"))]);
        let notifier = MockSubscriberNotifier::new();
        let mut poll = PollLoop::new(transport, ClientCache::new(), Arc::new(notifier));

        let cancel = CancellationToken::new();
        cancel.cancel();

        assert_eq!(poll.poll_once(&cancel).await.unwrap(), PollStep::Cancelled);
        assert_eq!(tracker.requests.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn receive_timeouts_are_heartbeats() {
        let (transport, _tracker) = ScriptedTransport::new(vec![Scripted::Late(
            Duration::from_millis(2500),
            "late",
        )]);
        let mut notifier = MockSubscriberNotifier::new();
        notifier
            .expect_on_data_received()
            .withf(|text| text == "late")
            .times(1)
            .return_const(());

        let mut poll = PollLoop::new(transport, ClientCache::new(), Arc::new(notifier))
            .with_receive_timeout(Duration::from_secs(1))
            .with_dead_peer_after(Duration::from_secs(10));

        let step = poll.poll_once(&CancellationToken::new()).await.unwrap();
        assert_eq!(step, PollStep::Updated("late".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn prolonged_silence_means_the_publisher_is_gone() {
        let (transport, tracker) = ScriptedTransport::new(vec![Scripted::Silence]);
        let mut notifier = MockSubscriberNotifier::new();
        notifier.expect_on_data_received().times(0);
        notifier
            .expect_on_heartbeat_connection_lost()
            .times(1)
            .return_const(());

        let poll = PollLoop::new(transport, ClientCache::new(), Arc::new(notifier))
            .with_receive_timeout(Duration::from_secs(1))
            .with_dead_peer_after(Duration::from_secs(3));

        let started = Instant::now();
        let err = poll.run(CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, ServiceError::PeerDisconnected(_)));
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert!(tracker.closed.load(Ordering::SeqCst));
    }
}
