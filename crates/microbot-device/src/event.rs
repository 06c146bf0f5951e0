use crate::{DeviceId, MergeReport};
use tokio::sync::broadcast;
use tracing::trace;

/// 设备集合变更事件
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionEvent {
    /// 一次合并产生了新增或更新
    Merged(MergeReport),
    /// 设备被显式移除
    Pruned(Vec<DeviceId>),
    /// 本地编辑（改名、校准）
    Edited(DeviceId),
}

/// 集合事件总线
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CollectionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CollectionEvent> {
        self.sender.subscribe()
    }

    /// 发布事件，没有订阅者时直接丢弃
    pub fn publish(&self, event: CollectionEvent) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(event)) => {
                trace!(?event, "No subscribers for collection event");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = EventBus::new(10);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let delivered = bus.publish(CollectionEvent::Edited(DeviceId::Number(1)));
        assert_eq!(delivered, 2);

        let ev = timeout(Duration::from_millis(100), rx1.recv())
            .await
            .expect("Timeout waiting for event")
            .expect("Failed to receive event");
        assert_eq!(ev, CollectionEvent::Edited(DeviceId::Number(1)));
        assert!(rx2.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus = EventBus::new(10);
        assert_eq!(bus.publish(CollectionEvent::Pruned(vec![])), 0);
    }
}
