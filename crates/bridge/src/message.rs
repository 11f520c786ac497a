use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Well-known bridge topics.
pub mod topics {
    /// An agent finished swapping in new class implementations.
    pub const CLASS_RELOADED: &str = "relive.class.reloaded";
}

/// Envelope an injection agent sends after swapping classes.
///
/// MessagePack on the wire. `topic` drives SUB-side prefix filtering;
/// `correlation_id` lets the agent match our log lines with its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeMessage {
    pub topic: String,

    /// Encoded [`ClassReloaded`].
    #[serde(with = "msgpack_bin")]
    pub payload: Vec<u8>,

    pub timestamp: DateTime<Utc>,

    pub correlation_id: Uuid,

    /// Envelopes that omit it are treated as version 1.
    #[serde(default = "default_version")]
    pub version: u16,
}

fn default_version() -> u16 {
    1
}

impl BridgeMessage {
    /// Announce reloaded classes on [`topics::CLASS_RELOADED`], in the
    /// order the agent swapped them.
    pub fn class_reloaded(
        classes: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, rmp_serde::encode::Error> {
        Ok(Self {
            topic: topics::CLASS_RELOADED.to_string(),
            payload: rmp_serde::to_vec(&ClassReloaded::new(classes))?,
            timestamp: Utc::now(),
            correlation_id: Uuid::new_v4(),
            version: 1,
        })
    }

    /// Send on a custom topic instead of the default one.
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    /// Reloaded class names carried by this envelope.
    pub fn classes(&self) -> Result<Vec<String>, rmp_serde::decode::Error> {
        let reloaded: ClassReloaded = rmp_serde::from_slice(&self.payload)?;
        Ok(reloaded.classes)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, rmp_serde::decode::Error> {
        rmp_serde::from_slice(bytes)
    }
}

/// Payload of [`topics::CLASS_RELOADED`]. Routers act on the first class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassReloaded {
    pub classes: Vec<String>,
}

impl ClassReloaded {
    pub fn new(classes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            classes: classes.into_iter().map(Into::into).collect(),
        }
    }
}

/// Payload bytes as a MessagePack bin, not an array of integers.
mod msgpack_bin {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let bytes: &[u8] = Deserialize::deserialize(d)?;
        Ok(bytes.to_vec())
    }
}
