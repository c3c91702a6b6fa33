mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};

use common::{enabled_labels, local_settings, read_all, start_tagged_backend, task, ScriptedMarathon};
use marathon_tlb::discovery::marathon::{
    ApiRequest, App, AppDefinition, IpAddress, MarathonEvent, StatusUpdate, TaskStatus,
};
use marathon_tlb::discovery::{
    AppInfo, BackendInfo, Command, EventProcessor, OrchestratorError, ResubscribePolicy,
};
use marathon_tlb::resilience::Backoff;
use marathon_tlb::Router;

async fn next(rx: &mut mpsc::Receiver<Command>) -> Command {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("command in time")
        .expect("channel open")
}

fn status(app_id: &str, status: &str, node: std::net::SocketAddr) -> MarathonEvent {
    MarathonEvent::StatusUpdate(StatusUpdate {
        app_id: app_id.to_string(),
        task_id: format!("{}.task", app_id),
        task_status: TaskStatus::from(status.to_string()),
        host: "agent".into(),
        ports: vec![node.port()],
        ip_addresses: vec![IpAddress::new(node.ip().to_string())],
    })
}

fn quick_policy() -> ResubscribePolicy {
    ResubscribePolicy {
        attempts: 2,
        backoff: Backoff::new(1, 5),
    }
}

#[tokio::test]
async fn scan_and_events_reach_a_serving_frontend() {
    let first = start_tagged_backend("first").await;
    let second = start_tagged_backend("second").await;

    let app = App {
        id: "/svc".into(),
        labels: enabled_labels(),
        tasks: vec![task(&first.ip().to_string(), first.port())],
    };
    let (marathon, events) = ScriptedMarathon::new(vec![app]);

    let (tx, mut rx) = mpsc::channel(1);
    let (stop_tx, stop_rx) = broadcast::channel(1);
    let processor = tokio::spawn(EventProcessor::new(marathon, tx, quick_policy()).run(stop_rx));

    let mut router = Router::with_settings(local_settings(), HashMap::new(), Duration::from_secs(1));

    // Initial scan: the app, then its running task.
    let cmd = next(&mut rx).await;
    assert!(matches!(&cmd, Command::AppUpdated(a) if a.app_id == "/svc"));
    router.apply(cmd).await;
    let cmd = next(&mut rx).await;
    assert!(matches!(&cmd, Command::AddBackend(b) if b.node == first.to_string()));
    router.apply(cmd).await;

    let addr = router.frontend("/svc").unwrap().local_addr().unwrap();
    assert_eq!(read_all(addr).await, "first");

    // A new task starts and the old one is killed.
    events.send(Ok(status("/svc", "TASK_RUNNING", second))).unwrap();
    events.send(Ok(status("/svc", "TASK_KILLED", first))).unwrap();
    router.apply(next(&mut rx).await).await;
    router.apply(next(&mut rx).await).await;
    assert_eq!(read_all(addr).await, "second");
    assert_eq!(read_all(addr).await, "second");

    // Events for apps that were never enabled produce nothing.
    events.send(Ok(status("/other", "TASK_RUNNING", first))).unwrap();

    stop_tx.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), processor)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
    assert!(rx.try_recv().is_err());
    router.shutdown().await;
}

#[tokio::test]
async fn api_request_for_deleted_app_drops_it() {
    let app = App {
        id: "/gone".into(),
        labels: enabled_labels(),
        tasks: Vec::new(),
    };
    // Only the scan sees the app; the later fetch fails.
    let (marathon, events) = ScriptedMarathon::new(vec![app]);
    let marathon = Arc::new(marathon);

    let (tx, mut rx) = mpsc::channel(4);
    let (stop_tx, stop_rx) = broadcast::channel(1);
    let processor = tokio::spawn(
        EventProcessor::new(Arc::clone(&marathon), tx, quick_policy()).run(stop_rx),
    );

    assert!(matches!(next(&mut rx).await, Command::AppUpdated(_)));
    marathon.remove("/gone");

    events
        .send(Ok(MarathonEvent::ApiRequest(ApiRequest {
            app_definition: AppDefinition {
                id: "/gone".into(),
            },
        })))
        .unwrap();
    assert!(matches!(next(&mut rx).await, Command::AppDropped(a) if a.app_id == "/gone"));

    stop_tx.send(()).unwrap();
    processor.await.unwrap().unwrap();
}

#[tokio::test]
async fn lost_stream_is_healed_by_rescan() {
    let (marathon, first) = ScriptedMarathon::new(vec![
        App {
            id: "/a".into(),
            labels: enabled_labels(),
            tasks: vec![task("10.0.0.1", 9000), task("10.0.0.2", 9000)],
        },
        App {
            id: "/b".into(),
            labels: enabled_labels(),
            tasks: vec![task("10.0.0.3", 9000)],
        },
    ]);
    let marathon = Arc::new(marathon);

    let (tx, mut rx) = mpsc::channel(16);
    let (stop_tx, stop_rx) = broadcast::channel(1);
    let processor = tokio::spawn(
        EventProcessor::new(Arc::clone(&marathon), tx, quick_policy()).run(stop_rx),
    );
    for _ in 0..5 {
        next(&mut rx).await;
    }

    // Missed while the stream is down: a task of /a dies and /b is deleted.
    marathon.put(App {
        id: "/a".into(),
        labels: enabled_labels(),
        tasks: vec![task("10.0.0.2", 9000)],
    });
    marathon.remove("/b");
    let _second = marathon.next_stream();
    first
        .send(Err(OrchestratorError::Stream("connection reset".into())))
        .unwrap();

    assert_eq!(
        next(&mut rx).await,
        Command::AppUpdated(AppInfo {
            app_id: "/a".into(),
            labels: enabled_labels(),
        })
    );
    assert_eq!(
        next(&mut rx).await,
        Command::RemoveBackend(BackendInfo {
            app_id: "/a".into(),
            node: "10.0.0.1:9000".into(),
        })
    );
    assert!(matches!(next(&mut rx).await, Command::AppDropped(a) if a.app_id == "/b"));

    stop_tx.send(()).unwrap();
    processor.await.unwrap().unwrap();
}

#[tokio::test]
async fn exhausted_resubscribe_is_fatal() {
    let (marathon, events) = ScriptedMarathon::new(Vec::new());
    let (tx, _rx) = mpsc::channel(1);
    let (_stop_tx, stop_rx) = broadcast::channel(1);
    let processor = tokio::spawn(EventProcessor::new(marathon, tx, quick_policy()).run(stop_rx));

    // Ending the stream forces a resubscribe, which the fake refuses.
    drop(events);

    let result = tokio::time::timeout(Duration::from_secs(5), processor)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_err());
}

#[tokio::test]
async fn closed_command_channel_ends_discovery_quietly() {
    let app = App {
        id: "/svc".into(),
        labels: enabled_labels(),
        tasks: Vec::new(),
    };
    let (marathon, _events) = ScriptedMarathon::new(vec![app]);
    let (tx, rx) = mpsc::channel(1);
    drop(rx);
    let (_stop_tx, stop_rx) = broadcast::channel(1);

    let result = EventProcessor::new(marathon, tx, quick_policy())
        .run(stop_rx)
        .await;
    assert!(result.is_ok());
}
