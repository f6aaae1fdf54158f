//! Startup sequencing against real sockets.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};

use fusion_ingress::dependencies::{MemoryCacheConnector, ProbeDatabaseConnector};
use fusion_ingress::lifecycle::{self, DependencySequencer, LifecycleState, Shutdown, StartupError};
use fusion_ingress::routing::{HealthCheck, RouterTable};

mod common;
use common::*;

fn table() -> RouterTable {
    let mut table = RouterTable::new();
    table.bind("/", Arc::new(HealthCheck)).unwrap();
    table.bind("/api/", Arc::new(cache_group())).unwrap();
    table
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

async fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test]
async fn critical_failure_never_binds_listener() {
    let port = free_port().await;
    let mut config = test_config();
    config.listener.port = port;

    let sequencer = DependencySequencer::new(Arc::new(FailingDatabase), timeouts());
    let state = sequencer.lifecycle();

    let result = lifecycle::prepare(config, sequencer, table()).await;
    assert!(matches!(
        result,
        Err(StartupError::CriticalDependency { name: "database", .. })
    ));
    assert_eq!(state.current(), LifecycleState::Failed);
    assert!(TcpStream::connect(("127.0.0.1", port)).await.is_err());
}

#[tokio::test]
async fn optional_failure_degrades_and_still_serves() {
    let (_db, url) = start_fake_database().await;
    let sequencer = DependencySequencer::new(Arc::new(ProbeDatabaseConnector::new(url)), timeouts())
        .with_cache(Arc::new(FailingCache));
    let state = sequencer.lifecycle();

    let prepared = lifecycle::prepare(test_config(), sequencer, table())
        .await
        .unwrap();
    assert_eq!(state.current(), LifecycleState::Degraded);

    let addr = prepared.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = tokio::spawn(prepared.serve(shutdown.subscribe()));

    let client = client();
    for _ in 0..2 {
        let res = client
            .get(format!("http://{addr}/api/feed"))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 200);
        assert_eq!(res.text().await.unwrap(), "fresh");
    }

    let res = client
        .get(format!("http://{addr}/api/status"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.text().await.unwrap(), "degraded");

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn available_cache_serves_hits() {
    let (_db, url) = start_fake_database().await;
    let sequencer = DependencySequencer::new(Arc::new(ProbeDatabaseConnector::new(url)), timeouts())
        .with_cache(Arc::new(MemoryCacheConnector));
    let sink = Arc::new(RecordingSink::default());

    let recording = sink.clone();
    let prepared = lifecycle::prepare(test_config(), sequencer, table())
        .await
        .unwrap()
        .configure(move |server| server.with_telemetry_sink(recording));
    let addr = prepared.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = tokio::spawn(prepared.serve(shutdown.subscribe()));

    let client = client();
    let first = client.get(format!("http://{addr}/api/feed")).send().await.unwrap();
    assert_eq!(first.text().await.unwrap(), "fresh");
    let second = client.get(format!("http://{addr}/api/feed")).send().await.unwrap();
    assert_eq!(second.text().await.unwrap(), "cached");

    let status = client.get(format!("http://{addr}/api/status")).send().await.unwrap();
    assert_eq!(status.text().await.unwrap(), "ready");

    let health = client.get(format!("http://{addr}/")).send().await.unwrap();
    assert_eq!(health.status(), 200);
    assert_eq!(health.text().await.unwrap(), "Server is running");
    assert_eq!(sink.statuses(), vec![200, 200, 200, 200]);

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn unreachable_database_fails_startup() {
    let port = free_port().await;
    let sequencer = DependencySequencer::new(
        Arc::new(ProbeDatabaseConnector::new(format!("mongodb://127.0.0.1:{port}/fusion"))),
        timeouts(),
    );
    let state = sequencer.lifecycle();

    let result = lifecycle::prepare(test_config(), sequencer, table()).await;
    assert!(result.is_err());
    assert_eq!(state.current(), LifecycleState::Failed);
}
