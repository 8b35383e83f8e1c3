//! Wire encoding for outbound events.

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// How events are framed for a transport.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    #[default]
    Json,
    /// MessagePack with named fields, so it decodes into the same shapes as JSON.
    MessagePack,
}

impl Encoding {
    pub fn encode<T: Serialize>(self, value: &T) -> Result<Vec<u8>> {
        match self {
            Encoding::Json => Ok(serde_json::to_vec(value)?),
            Encoding::MessagePack => Ok(rmp_serde::to_vec_named(value)?),
        }
    }

    pub fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> Result<T> {
        match self {
            Encoding::Json => Ok(serde_json::from_slice(bytes)?),
            Encoding::MessagePack => Ok(rmp_serde::from_slice(bytes)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::Delta;
    use crate::error::DataSyncError;
    use crate::subscriptions::{DropReason, SubscriptionEvent};
    use serde_json::json;

    #[test]
    fn test_msgpack_event() {
        let event = SubscriptionEvent::Delta {
            delta: Delta::update("m1", json!({"color": "red"}), json!({"color": "blue"})),
        };
        let bytes = Encoding::MessagePack.encode(&event).unwrap();
        let decoded: SubscriptionEvent = Encoding::MessagePack.decode(&bytes).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn test_json_event_shape() {
        let event = SubscriptionEvent::Dropped {
            reason: DropReason::BufferOverflow,
        };
        let bytes = Encoding::Json.encode(&event).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value, json!({"type": "dropped", "reason": "buffer_overflow"}));
    }

    #[test]
    fn test_decode_garbage() {
        let result: Result<Delta> = Encoding::Json.decode(b"{not json");
        assert!(matches!(result, Err(DataSyncError::Deserialization(_))));

        let result: Result<Delta> = Encoding::MessagePack.decode(&[0xc1]);
        assert!(matches!(result, Err(DataSyncError::Deserialization(_))));
    }
}
