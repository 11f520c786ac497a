use std::sync::Arc;

use async_trait::async_trait;
use relive_bus::EventBus;
use relive_core::{ClassId, Payload, RawNotification, Subject};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::error::BridgeError;
use crate::message::BridgeMessage;

/// Source of agent envelopes. Implemented by [`crate::AgentSubscriber`];
/// tests substitute in-memory sources.
#[async_trait]
pub trait AgentSource: Send + Sync {
    /// Wait for the next envelope.
    async fn recv(&self) -> Result<BridgeMessage, BridgeError>;
}

/// Convert an agent envelope into a bus notification named
/// `notification_name`.
///
/// One class becomes a class-only payload; several become an ordered
/// collection of class-only subjects. An empty list yields an empty
/// payload, which matches nothing downstream.
pub fn to_notification(
    message: &BridgeMessage,
    notification_name: &str,
) -> Result<RawNotification, BridgeError> {
    let classes = message.classes()?;
    let payload = match classes.as_slice() {
        [] => Payload::Empty,
        [class] => Payload::Class(ClassId::new(class.as_str())),
        classes => Payload::Collection(
            classes
                .iter()
                .map(|c| Subject::class_only(c.as_str()))
                .collect(),
        ),
    };
    Ok(RawNotification::new(notification_name, payload))
}

/// Forward agent envelopes onto `bus` until `shutdown` is notified.
///
/// Undecodable envelopes are logged and skipped; transport errors end the
/// loop. Returns the number of notifications published. Use
/// [`Notify::notify_one`] to stop, so a signal sent before the loop starts
/// waiting is not lost.
pub async fn run_bridge<S>(
    source: &S,
    bus: &dyn EventBus,
    notification_name: &str,
    shutdown: Arc<Notify>,
) -> Result<u64, BridgeError>
where
    S: AgentSource + ?Sized,
{
    let mut forwarded = 0u64;
    info!(notification = notification_name, "agent bridge running");

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                info!(forwarded, "agent bridge shutting down");
                return Ok(forwarded);
            }
            received = source.recv() => {
                let message = match received {
                    Ok(message) => message,
                    Err(BridgeError::Decode(e)) => {
                        warn!(error = %e, "dropping undecodable agent envelope");
                        continue;
                    }
                    Err(e) => return Err(e),
                };

                match to_notification(&message, notification_name) {
                    Ok(notification) => {
                        let reached = bus.publish(notification);
                        forwarded += 1;
                        debug!(
                            correlation_id = %message.correlation_id,
                            handlers = reached,
                            "forwarded agent event"
                        );
                    }
                    Err(e) => warn!(
                        correlation_id = %message.correlation_id,
                        error = %e,
                        "dropping agent event with unexpected payload"
                    ),
                }
            }
        }
    }
}
