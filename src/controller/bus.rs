//! Subscriber registration for controller events.
//!
//! Input sources publish onto the bus; any number of consumers (the engine's
//! router, diagnostics, a settings UI) subscribe independently.

use tokio::sync::broadcast;
use tracing::trace;

use super::types::ControllerEvent;

pub const BUS_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct ControllerEventBus {
    sender: broadcast::Sender<ControllerEvent>,
}

impl ControllerEventBus {
    pub fn new() -> Self {
        Self::with_capacity(BUS_CAPACITY)
    }

    /// Subscribers that fall more than `capacity` events behind lose the
    /// oldest ones.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Delivers an event to every current subscriber.
    pub fn publish(&self, event: ControllerEvent) {
        if let Err(e) = self.sender.send(event) {
            trace!("Controller event dropped, no subscribers: {:?}", e.0);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ControllerEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::types::Stick;

    #[tokio::test]
    async fn every_subscriber_sees_events() {
        let bus = ControllerEventBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        let event = ControllerEvent::AxisChanged {
            stick: Stick::Left,
            x: 0.5,
            y: 0.0,
        };
        bus.publish(event.clone());

        assert_eq!(first.recv().await.unwrap(), event);
        assert_eq!(second.recv().await.unwrap(), event);
    }

    #[test]
    fn publishing_without_subscribers_is_harmless() {
        let bus = ControllerEventBus::default();
        bus.publish(ControllerEvent::Disconnected { id: 3 });
        assert_eq!(bus.subscriber_count(), 0);
    }
}
