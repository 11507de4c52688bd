//! Live notification connections, one slot per user.
//!
//! Slots and pooled messages sit behind one mutex that is never held while writing to a socket.
//! Each connection has its own write lock instead; a backlog flush holds it from the moment the
//! connection is installed, so deliveries made meanwhile queue up behind the backlog.

use alloc::{collections::VecDeque, sync::Arc};
use core::sync::atomic::{AtomicU64, Ordering};
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::{sync::Mutex, task::JoinHandle, time};
use tracing::{Instrument as _, debug, info, warn};

use crate::{config::NotificationsConfig, websocket::WsMessage};

/// Write side of a client connection.
#[async_trait]
pub(crate) trait LiveChannel: Send + Sync + 'static {
    async fn send(&self, message: &WsMessage) -> eyre::Result<()>;
    async fn ping(&self) -> eyre::Result<()>;
    async fn close(&self);
}

pub(crate) type ConnectionId = u64;

/// Where a message ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    /// Written to the user's live connection.
    Live,
    /// Held in memory until the user connects again.
    Pooled,
}

struct Connection {
    channel: Arc<dyn LiveChannel>,
    writes: Mutex<()>,
}

struct Slot {
    id: ConnectionId,
    connection: Arc<Connection>,
    keepalive: JoinHandle<()>,
}

#[derive(Default)]
struct Inner {
    slots: HashMap<i64, Slot>,
    pending: HashMap<i64, VecDeque<WsMessage>>,
}

pub(crate) struct ConnectionRegistry {
    inner: Mutex<Inner>,
    next_id: AtomicU64,
    settings: NotificationsConfig,
}

impl ConnectionRegistry {
    pub(crate) fn new(settings: NotificationsConfig) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner::default()),
            next_id: AtomicU64::new(1),
            settings,
        })
    }

    /// Installs `channel` as the live connection of `user_id`.
    ///
    /// A previous connection of the user is closed. Messages pooled while the user was away are
    /// written first, in order. If that fails the connection is dropped again and the unsent rest
    /// goes back to the pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the backlog could not be written to `channel`.
    #[tracing::instrument(skip(self, channel), err(Debug))]
    pub(crate) async fn register(
        self: &Arc<Self>,
        user_id: i64,
        channel: Arc<dyn LiveChannel>,
    ) -> eyre::Result<ConnectionId> {
        let connection = Arc::new(Connection {
            channel,
            writes: Mutex::new(()),
        });
        let writes = connection.writes.lock().await;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let mut backlog = {
            let mut inner = self.inner.lock().await;
            if let Some(previous) = inner.slots.remove(&user_id) {
                info!(connection = previous.id, "Replacing existing connection");
                retire(previous);
            }
            let keepalive = tokio::spawn(
                Arc::clone(self)
                    .keepalive(user_id, id, Arc::clone(&connection.channel))
                    .in_current_span(),
            );
            inner.slots.insert(
                user_id,
                Slot {
                    id,
                    connection: Arc::clone(&connection),
                    keepalive,
                },
            );
            inner.pending.remove(&user_id).unwrap_or_default()
        };

        if !backlog.is_empty() {
            debug!(count = backlog.len(), "Flushing pooled messages");
        }
        while let Some(message) = backlog.pop_front() {
            if let Err(e) = self.write(connection.channel.as_ref(), &message).await {
                backlog.push_front(message);
                drop(writes);
                self.requeue(user_id, id, backlog).await;
                return Err(e);
            }
        }
        drop(writes);
        Ok(id)
    }

    /// Puts back the unsent rest of a failed backlog flush of connection `id`.
    async fn requeue(&self, user_id: i64, id: ConnectionId, mut rest: VecDeque<WsMessage>) {
        let mut inner = self.inner.lock().await;
        if let Some(slot) = remove_slot(&mut inner, user_id, id) {
            retire(slot);
        }
        if inner.slots.contains_key(&user_id) {
            // A newer connection took over and has already flushed the pool.
            drop(inner);
            for message in rest {
                self.deliver(user_id, message).await;
            }
            return;
        }
        // Anything pooled meanwhile is newer than the backlog.
        let pending = inner.pending.entry(user_id).or_default();
        rest.append(pending);
        *pending = rest;
    }

    /// Frees the slot of `user_id` if it still holds connection `id`.
    pub(crate) async fn unregister(&self, user_id: i64, id: ConnectionId) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.slots.get(&user_id) {
            Some(slot) if slot.id == id => {
                if let Some(slot) = inner.slots.remove(&user_id) {
                    slot.keepalive.abort();
                }
                debug!(user_id, connection = id, "Connection unregistered");
                true
            }
            _ => false,
        }
    }

    /// Writes `message` to the live connection of `user_id`, or pools it.
    ///
    /// A connection that fails the write is dropped from the registry.
    pub(crate) async fn deliver(&self, user_id: i64, message: WsMessage) -> Delivery {
        loop {
            let (id, connection) = {
                let mut inner = self.inner.lock().await;
                let Some(slot) = inner.slots.get(&user_id) else {
                    self.pool(&mut inner, user_id, message);
                    return Delivery::Pooled;
                };
                (slot.id, Arc::clone(&slot.connection))
            };

            let writes = connection.writes.lock().await;
            let written = self.write(connection.channel.as_ref(), &message).await;
            drop(writes);
            let Err(e) = written else {
                return Delivery::Live;
            };

            warn!(user_id, "Live delivery failed: {e:#}");
            let mut inner = self.inner.lock().await;
            if let Some(slot) = remove_slot(&mut inner, user_id, id) {
                retire(slot);
            }
            if !inner.slots.contains_key(&user_id) {
                self.pool(&mut inner, user_id, message);
                return Delivery::Pooled;
            }
            // Replaced by a newer connection while writing; try that one.
        }
    }

    #[cfg(test)]
    pub(crate) async fn is_connected(&self, user_id: i64) -> bool {
        self.inner.lock().await.slots.contains_key(&user_id)
    }

    #[cfg(test)]
    pub(crate) async fn pending_count(&self, user_id: i64) -> usize {
        self.inner
            .lock()
            .await
            .pending
            .get(&user_id)
            .map_or(0, VecDeque::len)
    }

    fn pool(&self, inner: &mut Inner, user_id: i64, message: WsMessage) {
        let queue = inner.pending.entry(user_id).or_default();
        queue.push_back(message);
        while queue.len() > self.settings.pending_limit {
            drop(queue.pop_front());
            warn!(user_id, "Pending notification pool full, dropped oldest message");
        }
    }

    async fn write(&self, channel: &dyn LiveChannel, message: &WsMessage) -> eyre::Result<()> {
        time::timeout(self.settings.write_deadline(), channel.send(message))
            .await
            .map_err(|_| eyre::eyre!("write deadline exceeded"))?
    }

    async fn keepalive(self: Arc<Self>, user_id: i64, id: ConnectionId, channel: Arc<dyn LiveChannel>) {
        let mut ticker = time::interval(self.settings.keepalive_interval());
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match time::timeout(self.settings.write_deadline(), channel.ping()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    info!(user_id, connection = id, "Keep-alive failed: {e:#}");
                    break;
                }
                Err(_) => {
                    info!(user_id, connection = id, "Keep-alive timed out");
                    break;
                }
            }
        }
        channel.close().await;
        self.unregister(user_id, id).await;
    }
}

/// Removes the slot of `user_id` if it still holds connection `id`.
fn remove_slot(inner: &mut Inner, user_id: i64, id: ConnectionId) -> Option<Slot> {
    if inner.slots.get(&user_id)?.id == id {
        inner.slots.remove(&user_id)
    } else {
        None
    }
}

/// Stops the keep-alive of a removed slot and closes its channel in the background.
fn retire(slot: Slot) {
    slot.keepalive.abort();
    let channel = Arc::clone(&slot.connection.channel);
    drop(tokio::spawn(async move { channel.close().await }.in_current_span()));
}

#[cfg(test)]
pub(crate) mod test_support {
    use alloc::sync::Arc;
    use core::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use eyre::bail;

    use super::LiveChannel;
    use crate::websocket::WsMessage;

    /// Records what is written to it; can be told to fail.
    #[derive(Default)]
    pub(crate) struct FakeChannel {
        pub sent: StdMutex<Vec<WsMessage>>,
        pub fail_sends: AtomicBool,
        pub fail_pings: AtomicBool,
        pub closed: AtomicBool,
    }

    impl FakeChannel {
        pub(crate) fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub(crate) fn messages(&self) -> Vec<WsMessage> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LiveChannel for FakeChannel {
        async fn send(&self, message: &WsMessage) -> eyre::Result<()> {
            if self.fail_sends.load(Ordering::SeqCst) {
                bail!("connection reset");
            }
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }

        async fn ping(&self) -> eyre::Result<()> {
            if self.fail_pings.load(Ordering::SeqCst) {
                bail!("broken pipe");
            }
            Ok(())
        }

        async fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }
}
