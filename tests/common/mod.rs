//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use marathon_tlb::discovery::marathon::{App, EventKind, IpAddress, MarathonEvent, Task};
use marathon_tlb::discovery::{labels, EventStream, Labels, Orchestrator, OrchestratorError};
use marathon_tlb::frontend::FrontendSettings;

/// Settings for frontends bound on loopback.
pub fn local_settings() -> FrontendSettings {
    FrontendSettings {
        bind_host: "127.0.0.1".into(),
        connect_timeout: Duration::from_secs(2),
        ..FrontendSettings::default()
    }
}

/// A loopback port that was free a moment ago.
pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Start a backend that echoes everything it reads.
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut reader, mut writer) = socket.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });
    addr
}

/// Start a backend that writes `tag` and closes.
pub async fn start_tagged_backend(tag: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let _ = socket.write_all(tag.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

/// Connect to `addr` and read until the peer closes.
pub async fn read_all(addr: SocketAddr) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let mut out = String::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_string(&mut out))
        .await
        .unwrap()
        .unwrap();
    out
}

/// Poll `check` until it holds or five seconds pass.
pub async fn eventually<F: FnMut() -> bool>(mut check: F) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    check()
}

/// Labels enabling an app on an ephemeral frontend port.
pub fn enabled_labels() -> Labels {
    [
        (labels::TLB_ENABLED.to_string(), "true".to_string()),
        (labels::TLB_PORT.to_string(), "0".to_string()),
    ]
    .into_iter()
    .collect()
}

pub fn task(ip: &str, port: u16) -> Task {
    Task {
        id: format!("{}.{}", ip, port),
        host: "agent".into(),
        ports: vec![port],
        ip_addresses: vec![IpAddress::new(ip)],
    }
}

/// Items a scripted event stream yields.
pub type ScriptedEvent = Result<MarathonEvent, OrchestratorError>;

/// An orchestrator whose apps are a mutable map and whose event streams are
/// fed by the test through channels, one channel per subscription.
pub struct ScriptedMarathon {
    apps: Mutex<HashMap<String, App>>,
    streams: Mutex<VecDeque<mpsc::UnboundedReceiver<ScriptedEvent>>>,
}

impl ScriptedMarathon {
    /// The returned sender feeds the first subscription.
    pub fn new(apps: Vec<App>) -> (Self, mpsc::UnboundedSender<ScriptedEvent>) {
        let marathon = Self {
            apps: Mutex::new(apps.into_iter().map(|a| (a.id.clone(), a)).collect()),
            streams: Mutex::new(VecDeque::new()),
        };
        let tx = marathon.next_stream();
        (marathon, tx)
    }

    /// Queue another subscription. Without one, `subscribe` fails.
    pub fn next_stream(&self) -> mpsc::UnboundedSender<ScriptedEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.streams.lock().unwrap().push_back(rx);
        tx
    }

    pub fn put(&self, app: App) {
        self.apps.lock().unwrap().insert(app.id.clone(), app);
    }

    /// Forget an application, as if it was deleted.
    pub fn remove(&self, app_id: &str) {
        self.apps.lock().unwrap().remove(app_id);
    }
}

#[async_trait]
impl Orchestrator for ScriptedMarathon {
    async fn applications(&self) -> Result<Vec<App>, OrchestratorError> {
        let mut apps: Vec<App> = self.apps.lock().unwrap().values().cloned().collect();
        apps.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(apps)
    }

    async fn application(&self, app_id: &str) -> Result<App, OrchestratorError> {
        self.apps
            .lock()
            .unwrap()
            .get(app_id)
            .cloned()
            .ok_or_else(|| OrchestratorError::NotFound(app_id.to_string()))
    }

    async fn subscribe(&self, _kinds: &[EventKind]) -> Result<EventStream, OrchestratorError> {
        let next = self.streams.lock().unwrap().pop_front();
        match next {
            Some(rx) => Ok(Box::pin(stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|event| (event, rx))
            }))),
            None => Err(OrchestratorError::Stream("no stream scripted".into())),
        }
    }
}
