//! Plain channel publish/subscribe.
//!
//! Unlike the dealers there is no filtering: every client subscribed to a
//! channel receives every message published on it.

use crate::error::{DataSyncError, Result};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Unique identifier for a connected client.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub u64);

impl fmt::Debug for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClientId({})", self.0)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PubSubConfig {
    /// Max queued messages per client before messages are discarded.
    /// Values below 1 are treated as 1. Default: 1000
    pub buffer_size: usize,
}

impl Default for PubSubConfig {
    fn default() -> Self {
        Self { buffer_size: 1000 }
    }
}

/// Message sent to subscribers of a channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "message")]
pub struct PubSubMessage {
    pub channel: String,
    pub message: Value,
}

/// Decides who may publish where.
pub trait PublishPolicy: Send + Sync {
    fn can_publish(&self, client: ClientId, channel: &str) -> bool;
}

/// Everyone may publish everywhere.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllowAll;

impl PublishPolicy for AllowAll {
    fn can_publish(&self, _client: ClientId, _channel: &str) -> bool {
        true
    }
}

impl<F> PublishPolicy for F
where
    F: Fn(ClientId, &str) -> bool + Send + Sync,
{
    fn can_publish(&self, client: ClientId, channel: &str) -> bool {
        self(client, channel)
    }
}

/// A connected client's end of the service.
pub struct PubSubClient {
    pub id: ClientId,
    pub receiver: Receiver<PubSubMessage>,
}

impl PubSubClient {
    pub fn try_recv(&self) -> Option<PubSubMessage> {
        self.receiver.try_recv().ok()
    }

    /// Drain everything currently buffered.
    pub fn drain(&self) -> Vec<PubSubMessage> {
        self.receiver.try_iter().collect()
    }
}

/// Channel pub/sub service.
pub struct PubSubService {
    config: PubSubConfig,
    policy: Box<dyn PublishPolicy>,
    clients: RwLock<HashMap<ClientId, Sender<PubSubMessage>>>,
    /// channel -> subscribed clients
    subscriptions: RwLock<HashMap<String, HashSet<ClientId>>>,
    next_id: AtomicU64,
}

impl PubSubService {
    pub fn new() -> Self {
        Self::with_policy(PubSubConfig::default(), AllowAll)
    }

    pub fn with_policy(config: PubSubConfig, policy: impl PublishPolicy + 'static) -> Self {
        Self {
            config,
            policy: Box::new(policy),
            clients: RwLock::new(HashMap::new()),
            subscriptions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a client.
    pub fn connect(&self) -> PubSubClient {
        let id = ClientId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(self.config.buffer_size.max(1));
        self.clients.write().insert(id, sender);
        PubSubClient { id, receiver }
    }

    /// Forget a client and all its channel subscriptions.
    pub fn disconnect(&self, client: ClientId) {
        let mut subs = self.subscriptions.write();
        subs.retain(|_, clients| {
            clients.remove(&client);
            !clients.is_empty()
        });
        self.clients.write().remove(&client);
    }

    /// Subscribe a connected client to a channel.
    pub fn subscribe(&self, client: ClientId, channel: &str) -> Result<()> {
        let mut subs = self.subscriptions.write();
        // Checked under the subscriptions lock so a concurrent disconnect
        // cannot slip in between
        if !self.clients.read().contains_key(&client) {
            return Err(DataSyncError::ClientNotFound(client));
        }
        if !subs.entry(channel.to_string()).or_default().insert(client) {
            return Err(DataSyncError::AlreadySubscribed);
        }
        debug!(client = %client, channel, "Subscribed to channel");
        Ok(())
    }

    pub fn unsubscribe(&self, client: ClientId, channel: &str) -> Result<()> {
        let mut subs = self.subscriptions.write();
        let Some(clients) = subs.get_mut(channel) else {
            return Err(DataSyncError::NotSubscribed);
        };
        if !clients.remove(&client) {
            return Err(DataSyncError::NotSubscribed);
        }
        if clients.is_empty() {
            subs.remove(channel);
        }
        debug!(client = %client, channel, "Unsubscribed from channel");
        Ok(())
    }

    /// Publish on behalf of a client, subject to the publish policy.
    pub fn publish(&self, client: ClientId, channel: &str, message: Value) -> Result<usize> {
        if !self.policy.can_publish(client, channel) {
            return Err(DataSyncError::NotAuthorized {
                channel: channel.to_string(),
            });
        }
        Ok(self.publish_unchecked(channel, message))
    }

    /// Publish without an authorization check, for trusted backends.
    ///
    /// Returns how many clients the message was queued for.
    pub fn publish_unchecked(&self, channel: &str, message: Value) -> usize {
        let subs = self.subscriptions.read();
        let Some(subscribers) = subs.get(channel) else {
            return 0;
        };

        let clients = self.clients.read();
        let outgoing = PubSubMessage {
            channel: channel.to_string(),
            message,
        };

        let mut delivered = 0;
        for id in subscribers {
            let Some(sender) = clients.get(id) else {
                continue;
            };
            match sender.try_send(outgoing.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(client = %id, channel, "Client buffer full, message discarded")
                }
                Err(TrySendError::Disconnected(_)) => {
                    debug!(client = %id, channel, "Client gone, message discarded")
                }
            }
        }
        delivered
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.subscriptions
            .read()
            .get(channel)
            .map_or(0, HashSet::len)
    }
}

impl Default for PubSubService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_publish_reaches_subscribers_only() {
        let service = PubSubService::new();
        let alice = service.connect();
        let bob = service.connect();
        service.subscribe(alice.id, "news").unwrap();

        let delivered = service.publish(bob.id, "news", json!("hello")).unwrap();
        assert_eq!(delivered, 1);
        assert_eq!(
            alice.drain(),
            vec![PubSubMessage {
                channel: "news".to_string(),
                message: json!("hello")
            }]
        );
        assert!(bob.try_recv().is_none());
    }

    #[test]
    fn test_message_wire_form() {
        let message = PubSubMessage {
            channel: "news".to_string(),
            message: json!({"a": 1}),
        };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({"type": "message", "channel": "news", "message": {"a": 1}})
        );
    }

    #[test]
    fn test_subscription_errors() {
        let service = PubSubService::new();
        let client = service.connect();

        service.subscribe(client.id, "news").unwrap();
        assert!(matches!(
            service.subscribe(client.id, "news"),
            Err(DataSyncError::AlreadySubscribed)
        ));

        service.unsubscribe(client.id, "news").unwrap();
        assert!(matches!(
            service.unsubscribe(client.id, "news"),
            Err(DataSyncError::NotSubscribed)
        ));
        assert_eq!(service.subscriber_count("news"), 0);
    }

    #[test]
    fn test_policy_denies() {
        let service = PubSubService::with_policy(PubSubConfig::default(), |_: ClientId, channel: &str| {
            !channel.starts_with("admin.")
        });
        let client = service.connect();
        service.subscribe(client.id, "admin.alerts").unwrap();

        let result = service.publish(client.id, "admin.alerts", json!(1));
        assert!(matches!(result, Err(DataSyncError::NotAuthorized { .. })));
        assert!(client.try_recv().is_none());

        // Backend relay skips the check
        assert_eq!(service.publish_unchecked("admin.alerts", json!(1)), 1);
    }

    #[test]
    fn test_disconnect_removes_subscriptions() {
        let service = PubSubService::new();
        let client = service.connect();
        service.subscribe(client.id, "a").unwrap();
        service.subscribe(client.id, "b").unwrap();

        service.disconnect(client.id);
        assert_eq!(service.subscriber_count("a"), 0);
        assert_eq!(service.subscriber_count("b"), 0);
        assert_eq!(service.publish_unchecked("a", json!(null)), 0);
    }

    #[test]
    fn test_subscribe_requires_connected_client() {
        let service = PubSubService::new();
        let stranger = ClientId(99);
        assert!(matches!(
            service.subscribe(stranger, "news"),
            Err(DataSyncError::ClientNotFound(id)) if id == stranger
        ));

        let alice = service.connect();
        service.disconnect(alice.id);
        assert!(matches!(
            service.subscribe(alice.id, "news"),
            Err(DataSyncError::ClientNotFound(_))
        ));
        assert_eq!(service.subscriber_count("news"), 0);
    }

    #[test]
    fn test_zero_buffer_client_receives() {
        let service =
            PubSubService::with_policy(PubSubConfig { buffer_size: 0 }, AllowAll);
        let alice = service.connect();
        service.subscribe(alice.id, "news").unwrap();

        assert_eq!(service.publish(alice.id, "news", json!("hello")).unwrap(), 1);
        assert_eq!(alice.drain().len(), 1);
    }
}
