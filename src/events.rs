//! Events raised by the engine for presentation and notification layers

use crate::core::types::OperationType;
use crate::core::verdict::OperationVerdict;
use crate::managers::ManagerState;
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub struct ManagerInitialized {
    pub manager: String,
    pub state: ManagerState,
    pub version: String,
    pub executable: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperationVerdictProduced {
    pub manager: String,
    pub package_id: String,
    pub operation: OperationType,
    pub verdict: OperationVerdict,
    /// Zero-based attempt index within the operation's retry loop
    pub attempt: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    ManagerInitialized(ManagerInitialized),
    OperationVerdictProduced(OperationVerdictProduced),
}

/// Fan-out channel for engine events. Publishing with no subscribers is fine.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn publish(&self, event: EngineEvent) {
        // Err only means nobody is listening
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_published_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(EngineEvent::OperationVerdictProduced(OperationVerdictProduced {
            manager: "Npm".to_string(),
            package_id: "left-pad".to_string(),
            operation: OperationType::Install,
            verdict: OperationVerdict::Succeeded,
            attempt: 0,
        }));

        match rx.recv().await.unwrap() {
            EngineEvent::OperationVerdictProduced(e) => {
                assert_eq!(e.package_id, "left-pad");
                assert_eq!(e.verdict, OperationVerdict::Succeeded);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_publish_without_subscribers_is_ok() {
        let bus = EventBus::new();
        bus.publish(EngineEvent::ManagerInitialized(ManagerInitialized {
            manager: "Pip".to_string(),
            state: ManagerState::Disabled,
            version: String::new(),
            executable: None,
        }));
    }
}
