mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use common::{eventually, local_settings, read_all, start_echo_backend, start_tagged_backend};
use marathon_tlb::load_balancer::StrategyKind;
use marathon_tlb::net::listener::ListenerError;
use marathon_tlb::Frontend;

async fn serve(frontend: &Arc<Frontend>) -> tokio::task::JoinHandle<()> {
    let listener = frontend.bind().await.unwrap();
    tokio::spawn(Arc::clone(frontend).serve(listener))
}

#[tokio::test]
async fn relays_bytes_to_backend_and_back() {
    let backend = start_echo_backend().await;
    let fe = Arc::new(Frontend::new(
        "/echo",
        0,
        StrategyKind::RoundRobin,
        vec![backend.to_string()],
        local_settings(),
    ));
    let task = serve(&fe).await;

    let mut client = TcpStream::connect(fe.local_addr().unwrap()).await.unwrap();
    client.write_all(b"ping").await.unwrap();
    let mut buf = [0u8; 4];
    tokio::time::timeout(Duration::from_secs(5), client.read_exact(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&buf, b"ping");

    drop(client);
    fe.stop();
    task.await.unwrap();
}

#[tokio::test]
async fn round_robin_alternates_backends() {
    let a = start_tagged_backend("a").await;
    let b = start_tagged_backend("b").await;
    let fe = Arc::new(Frontend::new(
        "/rr",
        0,
        StrategyKind::RoundRobin,
        vec![a.to_string(), b.to_string()],
        local_settings(),
    ));
    let task = serve(&fe).await;
    let addr = fe.local_addr().unwrap();

    let mut seen = Vec::new();
    for _ in 0..4 {
        seen.push(read_all(addr).await);
    }
    assert_eq!(seen, vec!["a", "b", "a", "b"]);

    fe.stop();
    task.await.unwrap();
}

#[tokio::test]
async fn backends_added_later_are_used() {
    let a = start_tagged_backend("late").await;
    let fe = Arc::new(Frontend::new("/late", 0, StrategyKind::Random, Vec::new(), local_settings()));
    let task = serve(&fe).await;
    let addr = fe.local_addr().unwrap();

    assert_eq!(read_all(addr).await, "");

    assert!(fe.add_backend(&a.to_string()));
    assert!(!fe.add_backend(&a.to_string()));
    assert_eq!(read_all(addr).await, "late");

    assert!(fe.remove_backend(&a.to_string()));
    assert_eq!(read_all(addr).await, "");

    fe.stop();
    task.await.unwrap();
}

#[tokio::test]
async fn stop_refuses_new_connections_but_finishes_relays() {
    let backend = start_echo_backend().await;
    let fe = Arc::new(Frontend::new(
        "/drain",
        0,
        StrategyKind::RoundRobin,
        vec![backend.to_string()],
        local_settings(),
    ));
    let task = serve(&fe).await;
    let addr = fe.local_addr().unwrap();

    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(b"one").await.unwrap();
    let mut buf = [0u8; 3];
    client.read_exact(&mut buf).await.unwrap();

    fe.stop();
    task.await.unwrap();

    // The listener is gone.
    assert!(TcpStream::connect(addr).await.is_err());

    // The open relay still works.
    client.write_all(b"two").await.unwrap();
    client.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"two");
    assert_eq!(fe.relays().active_count(), 1);

    drop(client);
    tokio::time::timeout(Duration::from_secs(5), fe.relays().wait_for_drain())
        .await
        .unwrap();
}

#[tokio::test]
async fn start_binds_and_serves_until_stopped() {
    let backend = start_tagged_backend("started").await;
    let fe = Arc::new(Frontend::new(
        "/start",
        0,
        StrategyKind::RoundRobin,
        vec![backend.to_string()],
        local_settings(),
    ));
    let task = tokio::spawn(Arc::clone(&fe).start());

    assert!(eventually(|| fe.local_addr().is_some()).await);
    assert_eq!(read_all(fe.local_addr().unwrap()).await, "started");

    fe.stop();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn start_reports_bind_failure() {
    let blocker = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = blocker.local_addr().unwrap().port();
    let fe = Arc::new(Frontend::new("/taken", port, StrategyKind::RoundRobin, Vec::new(), local_settings()));

    let err = Arc::clone(&fe).start().await.unwrap_err();
    assert!(matches!(err, ListenerError::Bind { port: p, .. } if p == port));
    assert!(fe.local_addr().is_none());
}
