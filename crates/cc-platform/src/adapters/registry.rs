//! Server-side registry of live subscriber connections.
//!
//! One `tokio::sync::Mutex` guards the set. Admission, broadcast iteration and
//! failure-triggered removal all take it, so a broadcast never observes a
//! half-modified set and never writes to an entry that is being removed.
//!
//! ```text
//! accept loop ──try_accept──▶ ┌──────────────────────┐ ◀──broadcast── publish loop
//!                             │ Mutex<HashMap<Id, …>>│
//! drain task  ──remove──────▶ └──────────────────────┘
//! ```

use async_trait::async_trait;
use cc_core::ids::SessionId;
use cc_core::ports::{AdmissionNotifierPort, BroadcastPort};
use cc_core::protocol::{Request, MAX_FRAME_BYTES};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::connection::{Connection, ConnectionReader, ConnectionWriter};

struct Entry {
    writer: ConnectionWriter,
    /// Distinguishes this admission from a later one that reuses the id.
    generation: u64,
    /// Stops this peer's request-drain task.
    drain: CancellationToken,
}

struct RegistryInner {
    connections: Mutex<HashMap<SessionId, Entry>>,
    max_connections: usize,
    max_frame_bytes: usize,
    next_generation: AtomicU64,
    notifier: Arc<dyn AdmissionNotifierPort>,
    shutdown: CancellationToken,
}

/// Live subscriber set with admission control.
#[derive(Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RegistryInner>,
}

impl ConnectionRegistry {
    pub fn new(max_connections: usize, notifier: Arc<dyn AdmissionNotifierPort>) -> Self {
        Self::with_shutdown(max_connections, notifier, CancellationToken::new())
    }

    /// Drain tasks stop when `shutdown` is cancelled.
    pub fn with_shutdown(
        max_connections: usize,
        notifier: Arc<dyn AdmissionNotifierPort>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                connections: Mutex::new(HashMap::new()),
                max_connections,
                max_frame_bytes: MAX_FRAME_BYTES,
                next_generation: AtomicU64::new(0),
                notifier,
                shutdown,
            }),
        }
    }

    pub fn max_connections(&self) -> usize {
        self.inner.max_connections
    }

    /// Admit `conn` if there is room.
    ///
    /// On rejection (capacity reached, or the id is already registered) the
    /// connection is closed immediately and `false` is returned; reporting
    /// the attempt is up to the caller. On admission the
    /// registry keeps the write half and spawns a task that drains the peer's
    /// check requests and evicts it when the read side fails.
    pub async fn try_accept(&self, conn: Connection) -> bool {
        let (reader, mut writer) = conn.into_split();
        let id = writer.id();
        let drain = self.inner.shutdown.child_token();
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);

        {
            let mut connections = self.inner.connections.lock().await;
            if connections.contains_key(&id) {
                drop(connections);
                writer.close().await;
                warn!(peer = %id, "connection refused, id already registered");
                return false;
            }
            if connections.len() >= self.inner.max_connections {
                drop(connections);
                writer.close().await;
                debug!(peer = %id, max = self.inner.max_connections, "connection refused at capacity");
                return false;
            }

            let entry = Entry {
                writer,
                generation,
                drain: drain.clone(),
            };
            connections.insert(id, entry);
            info!(peer = %id, live = connections.len(), "connected");
        }

        self.spawn_request_drain(reader, generation, drain);
        true
    }

    /// Send `text` to every live connection, evicting those that fail.
    ///
    /// The lock is held for the whole fan-out, so broadcasts reach each peer
    /// in call order. Failed peers are removed before the lock is released.
    pub async fn broadcast(&self, text: &str) {
        let evicted = {
            let mut connections = self.inner.connections.lock().await;

            let mut failed = Vec::new();
            for (id, entry) in connections.iter_mut() {
                if let Err(e) = entry.writer.send(text).await {
                    warn!(peer = %id, error = %e, "send failed, evicting peer");
                    failed.push(*id);
                }
            }

            failed
                .into_iter()
                .filter_map(|id| connections.remove(&id).map(|entry| (id, entry)))
                .collect::<Vec<_>>()
        };

        for (id, entry) in evicted {
            self.finish_eviction(id, entry).await;
        }
    }

    /// Remove a peer. Returns whether it was still registered.
    pub async fn remove(&self, id: &SessionId) -> bool {
        let entry = self.inner.connections.lock().await.remove(id);
        match entry {
            Some(entry) => {
                self.finish_eviction(*id, entry).await;
                true
            }
            None => false,
        }
    }

    /// Remove `id` only if it is still the admission identified by `generation`.
    async fn remove_generation(&self, id: &SessionId, generation: u64) -> bool {
        let entry = {
            let mut connections = self.inner.connections.lock().await;
            match connections.get(id) {
                Some(entry) if entry.generation == generation => connections.remove(id),
                _ => None,
            }
        };
        match entry {
            Some(entry) => {
                self.finish_eviction(*id, entry).await;
                true
            }
            None => false,
        }
    }

    pub async fn size(&self) -> usize {
        self.inner.connections.lock().await.len()
    }

    pub async fn contains(&self, id: &SessionId) -> bool {
        self.inner.connections.lock().await.contains_key(id)
    }

    pub async fn ids(&self) -> Vec<SessionId> {
        self.inner.connections.lock().await.keys().copied().collect()
    }

    /// Close every connection and stop all drain tasks.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let drained: Vec<_> = self.inner.connections.lock().await.drain().collect();
        info!(count = drained.len(), "closing all connections");
        for (_, mut entry) in drained {
            entry.writer.close().await;
        }
    }

    async fn finish_eviction(&self, id: SessionId, mut entry: Entry) {
        entry.drain.cancel();
        entry.writer.close().await;
        info!(peer = %id, "closed the connection");
        self.inner.notifier.on_connection_lost(&id);
    }

    fn spawn_request_drain(
        &self,
        mut reader: ConnectionReader,
        generation: u64,
        drain: CancellationToken,
    ) {
        let registry = self.clone();
        let max_frame_bytes = self.inner.max_frame_bytes;

        tokio::spawn(async move {
            let id = reader.id();
            loop {
                tokio::select! {
                    _ = drain.cancelled() => {
                        trace!(peer = %id, "request drain stopped");
                        break;
                    }
                    result = reader.receive(max_frame_bytes) => {
                        match result {
                            Ok(Some(text)) => match Request::parse(&text) {
                                Some(request) => trace!(peer = %id, ?request, "request received"),
                                None => debug!(peer = %id, "ignoring non-request frame"),
                            },
                            Ok(None) => {}
                            Err(e) => {
                                debug!(peer = %id, error = %e, "receive failed");
                                registry.remove_generation(&id, generation).await;
                                break;
                            }
                        }
                    }
                }
            }
        });
    }
}

#[async_trait]
impl BroadcastPort for ConnectionRegistry {
    async fn broadcast(&self, text: &str) {
        ConnectionRegistry::broadcast(self, text).await;
    }

    async fn size(&self) -> usize {
        ConnectionRegistry::size(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::framing::{read_frame, write_frame, Frame};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;
    use tokio::io::{duplex, AsyncReadExt, DuplexStream};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        Accepted(SessionId),
        Rejected(SessionId),
        Lost(SessionId),
    }

    #[derive(Default)]
    struct RecordingNotifier {
        events: StdMutex<Vec<Event>>,
    }

    impl RecordingNotifier {
        fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }

        fn lost_count(&self, id: &SessionId) -> usize {
            self.events()
                .iter()
                .filter(|e| **e == Event::Lost(*id))
                .count()
        }
    }

    impl AdmissionNotifierPort for RecordingNotifier {
        fn on_connection_accepted(&self, id: &SessionId) {
            self.events.lock().unwrap().push(Event::Accepted(*id));
        }
        fn on_connection_rejected(&self, id: &SessionId) {
            self.events.lock().unwrap().push(Event::Rejected(*id));
        }
        fn on_connection_lost(&self, id: &SessionId) {
            self.events.lock().unwrap().push(Event::Lost(*id));
        }
    }

    fn session(port: u16) -> SessionId {
        SessionId::new(format!("127.0.0.1:{port}").parse().unwrap())
    }

    /// A connection backed by two pipes so the read and write sides can fail
    /// independently. Returns (connection, peer_reads, peer_writes).
    fn peer(port: u16) -> (Connection, DuplexStream, DuplexStream) {
        let (to_peer, peer_reads) = duplex(64 * 1024);
        let (from_peer, peer_writes) = duplex(64 * 1024);
        (
            Connection::new(session(port), from_peer, to_peer),
            peer_reads,
            peer_writes,
        )
    }

    async fn next_text(stream: &mut DuplexStream) -> String {
        match read_frame(stream, 1024).await.unwrap() {
            Some(Frame::Body(body)) => String::from_utf8(body).unwrap(),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[tokio::test]
    async fn admission_never_exceeds_capacity() {
        let notifier = Arc::new(RecordingNotifier::default());
        let registry = ConnectionRegistry::new(2, notifier);
        let mut peers = Vec::new();

        for port in 0..5u16 {
            let (conn, reads, writes) = peer(41000 + port);
            let admitted = registry.try_accept(conn).await;
            assert_eq!(admitted, port < 2);
            assert!(registry.size().await <= 2);
            peers.push((reads, writes));
        }

        assert_eq!(registry.size().await, 2);
    }

    #[tokio::test]
    async fn rejected_peer_socket_is_closed() {
        let registry = ConnectionRegistry::new(1, Arc::new(RecordingNotifier::default()));
        let (first, _r1, _w1) = peer(41100);
        let (second, mut second_reads, _w2) = peer(41101);

        assert!(registry.try_accept(first).await);
        assert!(!registry.try_accept(second).await);
        assert!(!registry.contains(&session(41101)).await);

        let mut buf = [0u8; 1];
        assert_eq!(second_reads.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn duplicate_id_is_refused_and_original_kept() {
        let notifier = Arc::new(RecordingNotifier::default());
        let registry = ConnectionRegistry::new(4, notifier.clone());
        let (first, mut first_reads, _w1) = peer(41150);
        let (second, mut second_reads, _w2) = peer(41150);

        assert!(registry.try_accept(first).await);
        assert!(!registry.try_accept(second).await);
        assert_eq!(registry.size().await, 1);

        let mut buf = [0u8; 1];
        assert_eq!(second_reads.read(&mut buf).await.unwrap(), 0);

        registry.broadcast("still here").await;
        assert_eq!(next_text(&mut first_reads).await, "still here");
        assert!(notifier.events().is_empty());
    }

    #[tokio::test]
    async fn stale_drain_does_not_evict_a_readmitted_id() {
        let notifier = Arc::new(RecordingNotifier::default());
        let registry = ConnectionRegistry::new(4, notifier.clone());
        let id = session(41160);

        let (old, _old_reads, _old_writes) = peer(41160);
        assert!(registry.try_accept(old).await);
        let old_generation = registry.inner.connections.lock().await[&id].generation;
        assert!(registry.remove(&id).await);

        let (new, mut new_reads, _new_writes) = peer(41160);
        assert!(registry.try_accept(new).await);

        // A late read failure from the first admission's drain task.
        assert!(!registry.remove_generation(&id, old_generation).await);
        assert!(registry.contains(&id).await);
        assert_eq!(notifier.lost_count(&id), 1);

        registry.broadcast("live").await;
        assert_eq!(next_text(&mut new_reads).await, "live");
    }

    #[tokio::test]
    async fn concurrent_accepts_respect_capacity() {
        let registry = ConnectionRegistry::new(3, Arc::new(RecordingNotifier::default()));
        let mut handles = Vec::new();
        let mut keep = Vec::new();

        for port in 0..10u16 {
            let (conn, reads, writes) = peer(41200 + port);
            keep.push((reads, writes));
            let registry = registry.clone();
            handles.push(tokio::spawn(async move { registry.try_accept(conn).await }));
        }

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 3);
        assert_eq!(registry.size().await, 3);
    }

    #[tokio::test]
    async fn broadcast_preserves_order_without_duplicates() {
        let registry = ConnectionRegistry::new(4, Arc::new(RecordingNotifier::default()));
        let (conn, mut reads, _writes) = peer(41300);
        assert!(registry.try_accept(conn).await);

        for value in ["a", "b", "c"] {
            registry.broadcast(value).await;
        }

        assert_eq!(next_text(&mut reads).await, "a");
        assert_eq!(next_text(&mut reads).await, "b");
        assert_eq!(next_text(&mut reads).await, "c");

        let pending = tokio::time::timeout(Duration::from_millis(50), next_text(&mut reads)).await;
        assert!(pending.is_err(), "no extra frames expected");
    }

    #[tokio::test]
    async fn failed_send_evicts_peer_and_notifies_once() {
        let notifier = Arc::new(RecordingNotifier::default());
        let registry = ConnectionRegistry::new(4, notifier.clone());
        let (alive, mut alive_reads, _alive_writes) = peer(41400);
        let (dying, dying_reads, _dying_writes) = peer(41401);
        assert!(registry.try_accept(alive).await);
        assert!(registry.try_accept(dying).await);

        // Peer stops reading: its next write fails with a broken pipe.
        drop(dying_reads);
        registry.broadcast("tick").await;

        assert!(!registry.contains(&session(41401)).await);
        assert!(registry.contains(&session(41400)).await);
        assert_eq!(notifier.lost_count(&session(41401)), 1);
        assert_eq!(next_text(&mut alive_reads).await, "tick");

        // A later failure path for the same peer does not notify again.
        assert!(!registry.remove(&session(41401)).await);
        registry.broadcast("tick").await;
        assert_eq!(notifier.lost_count(&session(41401)), 1);
    }

    #[tokio::test]
    async fn read_side_failure_evicts_peer() {
        let notifier = Arc::new(RecordingNotifier::default());
        let registry = ConnectionRegistry::new(4, notifier.clone());
        let (conn, _reads, writes) = peer(41500);
        assert!(registry.try_accept(conn).await);

        drop(writes);

        for _ in 0..50 {
            if registry.size().await == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(registry.size().await, 0);
        assert_eq!(notifier.events(), vec![Event::Lost(session(41500))]);
    }

    #[tokio::test]
    async fn check_requests_are_drained_without_eviction() {
        let registry = ConnectionRegistry::new(4, Arc::new(RecordingNotifier::default()));
        let (conn, _reads, mut writes) = peer(41600);
        assert!(registry.try_accept(conn).await);

        for _ in 0..20 {
            write_frame(&mut writes, b"check").await.unwrap();
        }
        write_frame(&mut writes, b"unexpected").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(registry.contains(&session(41600)).await);
    }

    #[tokio::test]
    async fn shutdown_closes_every_peer() {
        let registry = ConnectionRegistry::new(4, Arc::new(RecordingNotifier::default()));
        let (conn, mut reads, _writes) = peer(41700);
        assert!(registry.try_accept(conn).await);

        registry.shutdown().await;

        assert_eq!(registry.size().await, 0);
        let mut buf = [0u8; 1];
        assert_eq!(reads.read(&mut buf).await.unwrap(), 0);
    }
}
