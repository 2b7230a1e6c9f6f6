use std::sync::mpsc::{channel, Receiver, Sender};

use winit::dpi::PhysicalSize;

/// Fans window resizes out to the parts of the viewer that track the viewport size.
#[derive(Default)]
pub struct ResizeEvents {
    senders: Vec<Sender<PhysicalSize<u32>>>,
}

impl ResizeEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> ResizeSubscription {
        let (sender, receiver) = channel();
        self.senders.push(sender);
        ResizeSubscription { receiver }
    }

    /// Delivers `size` to every live subscription and returns how many received it.
    ///
    /// Zero-sized events (minimised windows) are dropped.
    pub fn emit(&mut self, size: PhysicalSize<u32>) -> usize {
        if size.width == 0 || size.height == 0 {
            return 0;
        }

        self.senders.retain(|sender| sender.send(size).is_ok());
        self.senders.len()
    }
}

/// Owned handle to resize notifications. Dropping it unsubscribes.
pub struct ResizeSubscription {
    receiver: Receiver<PhysicalSize<u32>>,
}

impl ResizeSubscription {
    /// Drains pending events and returns the most recent size, if any arrived.
    pub fn latest(&self) -> Option<PhysicalSize<u32>> {
        self.receiver.try_iter().last()
    }

    pub fn dispose(self) {
        drop(self.receiver);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_size_wins() {
        let mut events = ResizeEvents::new();
        let subscription = events.subscribe();

        events.emit(PhysicalSize::new(800, 600));
        events.emit(PhysicalSize::new(1024, 768));

        assert_eq!(subscription.latest(), Some(PhysicalSize::new(1024, 768)));
        assert_eq!(subscription.latest(), None);
    }

    #[test]
    fn every_subscriber_is_notified() {
        let mut events = ResizeEvents::new();
        let a = events.subscribe();
        let b = events.subscribe();

        assert_eq!(events.emit(PhysicalSize::new(640, 480)), 2);
        assert_eq!(a.latest(), Some(PhysicalSize::new(640, 480)));
        assert_eq!(b.latest(), Some(PhysicalSize::new(640, 480)));
    }

    #[test]
    fn disposed_subscriptions_are_pruned() {
        let mut events = ResizeEvents::new();
        let kept = events.subscribe();
        events.subscribe().dispose();

        assert_eq!(events.emit(PhysicalSize::new(640, 480)), 1);
        assert!(kept.latest().is_some());
    }

    #[test]
    fn zero_sizes_are_ignored() {
        let mut events = ResizeEvents::new();
        let subscription = events.subscribe();

        assert_eq!(events.emit(PhysicalSize::new(0, 480)), 0);
        assert_eq!(subscription.latest(), None);
    }
}
