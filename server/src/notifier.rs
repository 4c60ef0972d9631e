use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{RwLock, mpsc};
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use common::LiveMessage;

/// Redis channel carrying score updates between hub instances
pub const SCORE_UPDATES_CHANNEL: &str = "gamehub:score-updates";

/// Per-subscriber queue depth. A viewer this far behind misses updates.
const SUBSCRIBER_BUFFER: usize = 32;

pub type SubscriberId = u64;

/// A live viewer's registration. Dropping it closes the channel, and the
/// notifier forgets the subscriber on its next publish.
pub struct Subscription {
    pub id: SubscriberId,
    receiver: mpsc::Receiver<LiveMessage>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<LiveMessage> {
        self.receiver.recv().await
    }

    /// Non-blocking poll; `None` when nothing is queued.
    pub fn try_recv(&mut self) -> Option<LiveMessage> {
        self.receiver.try_recv().ok()
    }
}

/// Best-effort fan-out of "leaderboard changed" signals to live viewers.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn subscribe(&self) -> Subscription;
    async fn unsubscribe(&self, id: SubscriberId);
    async fn publish(&self, message: LiveMessage) -> Result<()>;
}

/// In-process subscriber registry.
pub struct LocalNotifier {
    subscribers: RwLock<HashMap<SubscriberId, mpsc::Sender<LiveMessage>>>,
    next_id: AtomicU64,
    buffer: usize,
}

impl Default for LocalNotifier {
    fn default() -> Self {
        Self::with_buffer(SUBSCRIBER_BUFFER)
    }
}

impl LocalNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_buffer(buffer: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
        }
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Sends to every subscriber without waiting on any of them and returns
    /// how many accepted the message. Full queues are skipped, closed ones
    /// are removed.
    pub async fn broadcast(&self, message: LiveMessage) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        {
            let subscribers = self.subscribers.read().await;
            for (id, sender) in subscribers.iter() {
                match sender.try_send(message) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        debug!("Subscriber {} is not keeping up, skipping update", id);
                    }
                    Err(TrySendError::Closed(_)) => closed.push(*id),
                }
            }
        }

        if !closed.is_empty() {
            let mut subscribers = self.subscribers.write().await;
            for id in &closed {
                subscribers.remove(id);
            }
            debug!("Dropped {} disconnected subscribers", closed.len());
        }

        delivered
    }
}

#[async_trait]
impl Notifier for LocalNotifier {
    async fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.buffer);
        self.subscribers.write().await.insert(id, tx);
        debug!("Subscriber {} registered", id);
        Subscription { id, receiver: rx }
    }

    async fn unsubscribe(&self, id: SubscriberId) {
        if self.subscribers.write().await.remove(&id).is_some() {
            debug!("Subscriber {} unregistered", id);
        }
    }

    async fn publish(&self, message: LiveMessage) -> Result<()> {
        let delivered = self.broadcast(message).await;
        debug!("Delivered {:?} to {} subscribers", message, delivered);
        Ok(())
    }
}

/// Notifier shared by every hub instance connected to the same Redis.
///
/// Publishing goes through Redis; a background listener feeds whatever
/// arrives on the channel into the local registry, including this
/// instance's own publishes.
pub struct RedisNotifier {
    redis_conn: ConnectionManager,
    local: Arc<LocalNotifier>,
}

impl RedisNotifier {
    pub async fn connect(redis_url: &str, cancellation_token: CancellationToken) -> Result<Self> {
        let client = Client::open(redis_url).context("Failed to create Redis client")?;
        let redis_conn = ConnectionManager::new(client)
            .await
            .context("Failed to create Redis connection manager")?;

        let local = Arc::new(LocalNotifier::new());
        tokio::spawn(run_listener(redis_url.to_string(), local.clone(), cancellation_token));

        Ok(Self { redis_conn, local })
    }
}

#[async_trait]
impl Notifier for RedisNotifier {
    async fn subscribe(&self) -> Subscription {
        self.local.subscribe().await
    }

    async fn unsubscribe(&self, id: SubscriberId) {
        self.local.unsubscribe(id).await
    }

    async fn publish(&self, message: LiveMessage) -> Result<()> {
        let data = serde_json::to_vec(&message).context("Failed to serialize live message")?;
        let mut conn = self.redis_conn.clone();
        let _: () = conn
            .publish(SCORE_UPDATES_CHANNEL, data)
            .await
            .context("Failed to publish score update")?;
        Ok(())
    }
}

/// Keeps a Redis subscription alive until cancelled, reconnecting on failure.
async fn run_listener(redis_url: String, local: Arc<LocalNotifier>, cancellation_token: CancellationToken) {
    loop {
        match forward_score_updates(&redis_url, &local, &cancellation_token).await {
            Ok(()) => break,
            Err(e) => error!("Score update listener failed: {:#}", e),
        }

        tokio::select! {
            _ = cancellation_token.cancelled() => break,
            _ = tokio::time::sleep(Duration::from_secs(1)) => {
                info!("Reconnecting score update listener");
            }
        }
    }
    info!("Score update listener stopped");
}

async fn forward_score_updates(
    redis_url: &str,
    local: &LocalNotifier,
    cancellation_token: &CancellationToken,
) -> Result<()> {
    let client = Client::open(redis_url).context("Failed to create Redis client for subscription")?;
    let mut pubsub = client
        .get_async_pubsub()
        .await
        .context("Failed to create PubSub connection")?;
    pubsub
        .subscribe(SCORE_UPDATES_CHANNEL)
        .await
        .context("Failed to subscribe to score update channel")?;

    info!("Subscribed to {}", SCORE_UPDATES_CHANNEL);

    let mut messages = pubsub.on_message();
    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => return Ok(()),
            msg = messages.next() => {
                let Some(msg) = msg else {
                    anyhow::bail!("PubSub stream ended");
                };
                let payload: Vec<u8> = msg.get_payload().context("Failed to get update payload")?;
                match serde_json::from_slice::<LiveMessage>(&payload) {
                    Ok(message) => {
                        local.broadcast(message).await;
                    }
                    Err(e) => warn!("Ignoring malformed score update: {}", e),
                }
            }
        }
    }
}
