use async_trait::async_trait;
use microbot_control::{MicrobotApi, MockMicrobotApi, Result};
use microbot_device::{CollectionEvent, Device, DeviceCollection, DeviceId};
use microbot_poller::{Poller, PollerConfig};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};

fn fast_config() -> PollerConfig {
    PollerConfig {
        interval: Duration::from_millis(10),
        prune_missing: false,
    }
}

fn parse(value: serde_json::Value) -> Vec<Device> {
    serde_json::from_value(value).unwrap()
}

/// 等待集合满足条件
async fn wait_for<F>(collection: &DeviceCollection, mut check: F)
where
    F: FnMut(&[Device]) -> bool,
{
    timeout(Duration::from_secs(5), async {
        loop {
            if check(&collection.snapshot().await) {
                return;
            }
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("Timeout waiting for collection state");
}

/// 两轮轮询：id 1 在原句柄上被更新，id 2 被新增
#[tokio::test]
async fn test_two_cycles_preserve_identity() {
    let api = Arc::new(MockMicrobotApi::new());
    api.push_list(parse(json!([{"id": 1, "name": "A"}]))).await;
    api.push_list(parse(json!([{"id": 1, "name": "B"}, {"id": 2, "name": "C"}])))
        .await;

    let collection = Arc::new(DeviceCollection::new());
    let poller = Poller::new(api, collection.clone());

    poller.poll_once().await.unwrap();
    let first = collection.get(&DeviceId::Number(1)).await.unwrap();
    assert_eq!(first.read().await.name, "A");

    poller.poll_once().await.unwrap();
    let one = collection.get(&DeviceId::Number(1)).await.unwrap();
    let two = collection.get(&DeviceId::Number(2)).await.unwrap();

    assert!(one.ptr_eq(&first));
    assert_eq!(first.read().await.name, "B");
    assert_eq!(two.read().await.name, "C");
}

/// 拉取失败后循环继续
#[tokio::test]
async fn test_loop_survives_failures() {
    let api = Arc::new(MockMicrobotApi::new());
    api.push_list(parse(json!([{"id": 1, "name": "A"}]))).await;
    api.push_failure("HTTP 502").await;
    api.push_failure("HTTP 502").await;
    api.push_list(parse(json!([{"id": 1, "name": "B"}, {"id": 2, "name": "C"}])))
        .await;

    let collection = Arc::new(DeviceCollection::new());
    let handle = Poller::new(api.clone(), collection.clone())
        .with_config(fast_config())
        .start();

    wait_for(&collection, |devices| devices.len() == 2).await;

    let stats = handle.stats().await;
    assert_eq!(stats.failures, 2);
    assert!(stats.cycles >= 4);
    assert_eq!(stats.consecutive_failures, 0);

    handle.stop().await;
}

#[tokio::test]
async fn test_stop_ends_loop() {
    let api = Arc::new(MockMicrobotApi::new());
    api.push_list(vec![Device::new(1, "A")]).await;

    let collection = Arc::new(DeviceCollection::new());
    let handle = Poller::new(api.clone(), collection.clone())
        .with_config(fast_config())
        .start();

    wait_for(&collection, |devices| devices.len() == 1).await;
    timeout(Duration::from_secs(1), handle.stop())
        .await
        .expect("Poller did not stop");

    let calls = api.list_calls().await;
    sleep(Duration::from_millis(50)).await;
    assert_eq!(api.list_calls().await, calls);
}

#[tokio::test]
async fn test_dropping_handle_ends_loop() {
    let api = Arc::new(MockMicrobotApi::new());
    api.push_list(vec![Device::new(1, "A")]).await;

    let collection = Arc::new(DeviceCollection::new());
    let handle = Poller::new(api.clone(), collection.clone())
        .with_config(fast_config())
        .start();

    wait_for(&collection, |devices| devices.len() == 1).await;
    drop(handle);
    sleep(Duration::from_millis(30)).await;

    let calls = api.list_calls().await;
    sleep(Duration::from_millis(60)).await;
    assert_eq!(api.list_calls().await, calls);
}

/// 默认不移除消失的设备
#[tokio::test]
async fn test_missing_devices_kept_by_default() {
    let api = Arc::new(MockMicrobotApi::new());
    api.push_list(vec![Device::new(1, "A"), Device::new(2, "B")]).await;
    api.push_list(vec![Device::new(1, "A")]).await;

    let collection = Arc::new(DeviceCollection::new());
    let poller = Poller::new(api, collection.clone());
    poller.poll_once().await.unwrap();
    poller.poll_once().await.unwrap();

    assert_eq!(collection.len().await, 2);
}

#[tokio::test]
async fn test_prune_missing_when_enabled() {
    let api = Arc::new(MockMicrobotApi::new());
    api.push_list(vec![Device::new(1, "A"), Device::new(2, "B")]).await;
    api.push_list(vec![Device::new(2, "B")]).await;

    let collection = Arc::new(DeviceCollection::new());
    let mut rx = collection.subscribe();
    let poller = Poller::new(api, collection.clone()).with_config(PollerConfig {
        prune_missing: true,
        ..fast_config()
    });

    poller.poll_once().await.unwrap();
    poller.poll_once().await.unwrap();

    assert_eq!(collection.ids().await, vec![DeviceId::Number(2)]);
    assert!(matches!(rx.recv().await.unwrap(), CollectionEvent::Merged(_)));
    assert_eq!(
        rx.recv().await.unwrap(),
        CollectionEvent::Pruned(vec![DeviceId::Number(1)])
    );
}

/// 记录最大并发请求数的慢速接口
struct SlowApi {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

#[async_trait]
impl MicrobotApi for SlowApi {
    async fn list_devices(&self) -> Result<Vec<Device>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let n = self.calls.fetch_add(1, Ordering::SeqCst) as i64;

        sleep(Duration::from_millis(20)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(vec![Device::new(1, format!("cycle {}", n))])
    }

    async fn get_device(&self, _id: &DeviceId) -> Result<Device> {
        unreachable!()
    }

    async fn save_device(&self, _device: &Device) -> Result<()> {
        unreachable!()
    }

    async fn trigger_action(&self, _id: &DeviceId, _action: &str, _args: &[String]) -> Result<()> {
        unreachable!()
    }
}

/// 慢请求不会导致两轮重叠
#[tokio::test]
async fn test_cycles_never_overlap() {
    let api = Arc::new(SlowApi {
        in_flight: AtomicUsize::new(0),
        max_in_flight: AtomicUsize::new(0),
        calls: AtomicUsize::new(0),
    });

    let collection = Arc::new(DeviceCollection::new());
    let handle = Poller::new(api.clone(), collection.clone())
        .with_config(PollerConfig {
            interval: Duration::from_millis(1),
            prune_missing: false,
        })
        .start();

    wait_for(&collection, |devices| {
        devices.first().map(|d| d.name.as_str()) == Some("cycle 3")
    })
    .await;
    handle.stop().await;

    assert_eq!(api.max_in_flight.load(Ordering::SeqCst), 1);
}
