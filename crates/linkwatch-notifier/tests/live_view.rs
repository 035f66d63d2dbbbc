use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use linkwatch_core::{ClickMetadata, ReadRepository, Repository, ShortCode};
use linkwatch_notifier::{ChangeNotifier, NotifierError};
use linkwatch_redirector::AnalyticsRecorder;
use linkwatch_storage::KvLinkStore;
use tokio::time::timeout;

const PROPAGATION: Duration = Duration::from_secs(2);

async fn seeded(code: &ShortCode) -> Arc<KvLinkStore> {
    let store = Arc::new(KvLinkStore::new());
    store.create(code, "https://a.com", None).await.unwrap();
    store
}

fn visitor(agent: &str) -> ClickMetadata {
    ClickMetadata {
        user_agent: Some(agent.to_string()),
        country: Some("SE".to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn viewer_sees_click_from_another_task() {
    let code = ShortCode::new("live").unwrap();
    let store = seeded(&code).await;
    let notifier = ChangeNotifier::new(Arc::clone(&store));
    let recorder = AnalyticsRecorder::new(Arc::clone(&store));

    let mut watch = notifier.watch(&code).await.unwrap();

    let clicker = {
        let code = code.clone();
        tokio::spawn(async move { recorder.record_click(&code, visitor("firefox")).await })
    };

    let event = timeout(PROPAGATION, watch.next())
        .await
        .expect("change propagated")
        .unwrap()
        .unwrap();
    clicker.await.unwrap().unwrap();

    assert_eq!(event.click_count(), 1);
    let update = event.to_live_update();
    let json = serde_json::to_value(&update).unwrap();
    assert_eq!(json["clickCount"], 1);
    assert_eq!(json["clickAnalytics"]["sequence"], 1);
    assert_eq!(json["clickAnalytics"]["userAgent"], "firefox");
    assert_eq!(json["clickAnalytics"]["country"], "SE");

    let frame = update.to_sse_frame().unwrap();
    assert!(frame.starts_with("data: {"));
    assert!(frame.ends_with("}\n\n"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stream_reflects_clicks_in_commit_order() {
    let code = ShortCode::new("ordered").unwrap();
    let store = seeded(&code).await;
    let notifier = ChangeNotifier::new(Arc::clone(&store));

    let watch = notifier.watch(&code).await.unwrap();
    let cancel = watch.cancel_handle();
    let mut stream = Box::pin(watch.into_stream());

    let recorder = AnalyticsRecorder::new(Arc::clone(&store));
    let clicks = {
        let code = code.clone();
        tokio::spawn(async move {
            for i in 0..20 {
                recorder
                    .record_click(&code, visitor(&format!("agent-{i}")))
                    .await
                    .unwrap();
            }
        })
    };

    let mut seen = Vec::new();
    while seen.last() != Some(&20) {
        let event = timeout(PROPAGATION, stream.next())
            .await
            .expect("change propagated")
            .unwrap()
            .unwrap();
        seen.push(event.click_count());
    }
    clicks.await.unwrap();

    assert!(seen.windows(2).all(|pair| pair[0] < pair[1]), "{seen:?}");

    cancel.cancel();
    assert!(timeout(PROPAGATION, stream.next()).await.unwrap().is_none());
    assert_eq!(store.active_watchers(&code), 0);
}

#[tokio::test]
async fn cancelling_from_another_task_stops_a_parked_viewer() {
    let code = ShortCode::new("parked").unwrap();
    let store = seeded(&code).await;
    let notifier = ChangeNotifier::new(Arc::clone(&store));

    let mut watch = notifier.watch(&code).await.unwrap();
    let cancel = watch.cancel_handle();
    let viewer = tokio::spawn(async move {
        let mut delivered = 0;
        while let Some(event) = watch.next().await {
            event.unwrap();
            delivered += 1;
        }
        delivered
    });

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(store.active_watchers(&code), 1);

    cancel.cancel();
    assert!(cancel.is_cancelled());
    let delivered = timeout(PROPAGATION, viewer).await.unwrap().unwrap();
    assert_eq!(delivered, 0);
    assert_eq!(store.active_watchers(&code), 0);

    // clicks after cancellation reach nobody and leave nothing behind
    let recorder = AnalyticsRecorder::new(Arc::clone(&store));
    recorder.record_click(&code, visitor("curl")).await.unwrap();
    assert_eq!(store.active_watchers(&code), 0);
    assert_eq!(store.kv().watched_keys(), 0);
}

#[tokio::test]
async fn dropped_viewer_releases_its_channel() {
    let code = ShortCode::new("dropped").unwrap();
    let store = seeded(&code).await;
    let notifier = ChangeNotifier::new(Arc::clone(&store));

    let first = notifier.watch(&code).await.unwrap();
    let second = notifier.watch(&code).await.unwrap();
    assert_eq!(store.active_watchers(&code), 2);

    drop(first);
    assert_eq!(store.active_watchers(&code), 1);
    drop(second);
    assert_eq!(store.active_watchers(&code), 0);
}

#[tokio::test]
async fn every_viewer_gets_the_update() {
    let code = ShortCode::new("shared").unwrap();
    let store = seeded(&code).await;
    let notifier = ChangeNotifier::new(Arc::clone(&store));

    let mut a = notifier.watch(&code).await.unwrap();
    let mut b = notifier.watch(&code).await.unwrap();

    store.update_long_url(&code, "https://b.com").await.unwrap();

    for watch in [&mut a, &mut b] {
        let event = timeout(PROPAGATION, watch.next()).await.unwrap().unwrap().unwrap();
        assert_eq!(event.link.long_url, "https://b.com");
        assert_eq!(event.click_count(), 0);
    }
}

#[tokio::test]
async fn store_shutdown_ends_the_stream_with_a_failure() {
    let code = ShortCode::new("shutdown").unwrap();
    let store = seeded(&code).await;
    let notifier = ChangeNotifier::new(Arc::clone(&store));

    let mut stream = Box::pin(notifier.watch(&code).await.unwrap().into_stream());

    store.close_watches();

    let item = timeout(PROPAGATION, stream.next()).await.unwrap().unwrap();
    assert!(matches!(item, Err(NotifierError::ChannelClosed { .. })));
    assert!(timeout(PROPAGATION, stream.next()).await.unwrap().is_none());

    // the link itself survives the failed subscription
    let link = store.get(&code).await.unwrap().unwrap();
    assert_eq!(link.long_url, "https://a.com");
}
