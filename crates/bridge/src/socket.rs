//! ZeroMQ PUB/SUB sockets for agent events.
//!
//! Messages travel as two frames: the topic string (for SUB prefix
//! filtering) followed by the MessagePack [`BridgeMessage`] envelope.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};
use zeromq::prelude::*;
use zeromq::{PubSocket, SubSocket, ZmqMessage};

use crate::bridge::AgentSource;
use crate::error::BridgeError;
use crate::message::BridgeMessage;

/// PUB side, used by injection agents (and tests) to announce reloads.
pub struct AgentPublisher {
    socket: Mutex<PubSocket>,
}

impl AgentPublisher {
    /// Bind a PUB socket; subscribers connect to it.
    #[instrument(skip_all, fields(endpoint = %endpoint))]
    pub async fn bind(endpoint: &str) -> Result<Self, BridgeError> {
        let mut socket = PubSocket::new();
        info!("binding agent PUB socket");
        socket.bind(endpoint).await?;
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }

    /// Connect a PUB socket to a subscriber that binds.
    #[instrument(skip_all, fields(endpoint = %endpoint))]
    pub async fn connect(endpoint: &str) -> Result<Self, BridgeError> {
        let mut socket = PubSocket::new();
        info!("connecting agent PUB socket");
        socket.connect(endpoint).await?;
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }

    pub async fn publish(&self, message: &BridgeMessage) -> Result<(), BridgeError> {
        let envelope = message.to_bytes()?;
        let mut frames = ZmqMessage::from(message.topic.as_str());
        frames.push_back(envelope.into());

        self.socket.lock().await.send(frames).await?;
        debug!(topic = %message.topic, correlation_id = %message.correlation_id, "published agent event");
        Ok(())
    }
}

/// SUB side, owned by the bridge inside the host process.
pub struct AgentSubscriber {
    socket: Mutex<SubSocket>,
}

impl AgentSubscriber {
    #[instrument(skip_all, fields(endpoint = %endpoint))]
    pub async fn connect(endpoint: &str) -> Result<Self, BridgeError> {
        let mut socket = SubSocket::new();
        info!("connecting bridge SUB socket");
        socket.connect(endpoint).await?;
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }

    /// Subscribe to topics starting with `topic_prefix`. Empty means all.
    pub async fn subscribe(&self, topic_prefix: &str) -> Result<(), BridgeError> {
        self.socket.lock().await.subscribe(topic_prefix).await?;
        info!(topic_prefix, "subscribed to agent topic");
        Ok(())
    }
}

#[async_trait]
impl AgentSource for AgentSubscriber {
    async fn recv(&self) -> Result<BridgeMessage, BridgeError> {
        let frames = self.socket.lock().await.recv().await?;
        let frames: Vec<_> = frames.iter().collect();

        // Expect [topic, envelope]; tolerate a lone envelope frame.
        let envelope = match frames.as_slice() {
            [_, envelope, ..] => envelope.as_ref(),
            [envelope] => envelope.as_ref(),
            [] => return Err(BridgeError::Transport("empty ZMQ message".into())),
        };
        let message = BridgeMessage::from_bytes(envelope)?;
        debug!(topic = %message.topic, "received agent event");
        Ok(message)
    }
}
