//! End-to-end tests against local HTTP/1.1 backends.

use std::sync::Arc;
use std::time::Duration;

use pooled_http::{ClientConfig, ClientContext, ClientError, FaultKind};

mod common;

use common::Behavior;

fn context(config: ClientConfig) -> Arc<ClientContext> {
    Arc::new(ClientContext::from_config(config).unwrap())
}

#[tokio::test]
async fn test_sequential_requests_share_one_connection() {
    let backend = common::start_mock_backend(Behavior::KeepAlive, "pong").await;
    let ctx = context(ClientConfig::default());
    let client = ctx.client();

    for _ in 0..5 {
        let response = client.get(&backend.url("/ping")).await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.body().as_ref(), b"pong");
    }

    assert_eq!(backend.requests(), 5);
    assert_eq!(backend.accepted(), 1);
    let stats = client.stats();
    assert_eq!(stats.created, 1);
    assert_eq!(stats.reused, 4);
    assert_eq!(stats.idle, 1);

    ctx.shutdown();
}

#[tokio::test]
async fn test_connection_close_is_honoured() {
    let backend = common::start_mock_backend(Behavior::Close, "bye").await;
    let ctx = context(ClientConfig::default());
    let client = ctx.client();

    for _ in 0..3 {
        client.get(&backend.url("/")).await.unwrap();
    }

    assert_eq!(backend.accepted(), 3);
    assert_eq!(client.stats().idle, 0);
    ctx.shutdown();
}

#[tokio::test]
async fn test_silently_closed_idle_connection_is_replaced() {
    let backend = common::start_mock_backend(Behavior::DropAfterResponse, "ok").await;
    let ctx = context(ClientConfig::default());
    let client = ctx.client();

    client.get(&backend.url("/")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let response = client.get(&backend.url("/")).await.unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(backend.accepted(), 2);
    ctx.shutdown();
}

#[tokio::test]
async fn test_refused_connection_is_not_retried() {
    let addr = common::closed_port().await;
    let ctx = context(ClientConfig::default());

    let err = ctx.client().get(&format!("http://{addr}/")).await.unwrap_err();
    assert!(
        matches!(err, ClientError::Transport(ref fault) if fault.kind == FaultKind::ConnectionRefused),
        "unexpected error: {err:?}"
    );
    ctx.shutdown();
}

#[tokio::test]
async fn test_peer_hang_up_exhausts_retries() {
    let backend = common::start_mock_backend(Behavior::HangUp, "").await;
    let ctx = context(ClientConfig::default());

    let err = ctx.client().get(&backend.url("/")).await.unwrap_err();
    match err {
        ClientError::RetryExhausted { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("expected RetryExhausted, got {other:?}"),
    }
    assert_eq!(backend.accepted(), 3);
    assert_eq!(ctx.client().stats().total, 0);
    ctx.shutdown();
}

#[tokio::test]
async fn test_unresolvable_host() {
    let config = ClientConfig {
        connect_timeout_ms: 30_000,
        ..ClientConfig::default()
    };
    let ctx = context(config);

    let err = ctx.client().get("http://pooled-http-test.invalid/").await.unwrap_err();
    assert_eq!(err.fault_kind(), Some(FaultKind::UnresolvableHost));
    ctx.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_per_route_cap_holds_under_concurrency() {
    let backend = common::start_mock_backend(Behavior::Delay(Duration::from_millis(50)), "slow").await;
    let config = ClientConfig {
        per_route_max_connections: 2,
        ..ClientConfig::default()
    };
    let ctx = context(config);
    let client = ctx.client();

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..10 {
        let client = client.clone();
        let url = backend.url("/");
        tasks.spawn(async move { client.get(&url).await });
    }
    while let Some(result) = tasks.join_next().await {
        assert_eq!(result.unwrap().unwrap().status(), 200);
    }

    assert_eq!(backend.requests(), 10);
    assert!(backend.max_open() <= 2, "max open was {}", backend.max_open());
    assert!(client.stats().total <= 2);
    ctx.shutdown();
}

#[tokio::test]
async fn test_shutdown_interrupts_in_flight_exchange() {
    let backend = common::start_mock_backend(Behavior::Delay(Duration::from_secs(30)), "late").await;
    let config = ClientConfig {
        socket_timeout_ms: 0,
        ..ClientConfig::default()
    };
    let ctx = context(config);
    let client = ctx.client();

    let url = backend.url("/");
    let in_flight = tokio::spawn(async move { client.get(&url).await });
    while backend.requests() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    ctx.shutdown();
    let result = tokio::time::timeout(Duration::from_secs(5), in_flight)
        .await
        .expect("in-flight request hung after shutdown")
        .unwrap();

    match result {
        Err(ClientError::PoolClosed) => {}
        Err(ref err) if err.fault_kind().is_some() => {}
        other => panic!("expected PoolClosed or a transport fault, got {other:?}"),
    }
    assert_eq!(ctx.client().stats().total, 0);
}

#[tokio::test]
async fn test_requests_after_shutdown_fail_with_pool_closed() {
    let backend = common::start_mock_backend(Behavior::KeepAlive, "pong").await;
    let ctx = context(ClientConfig::default());
    let client = ctx.client();
    client.get(&backend.url("/")).await.unwrap();

    ctx.shutdown();
    ctx.shutdown();

    let err = client.get(&backend.url("/")).await.unwrap_err();
    assert!(matches!(err, ClientError::PoolClosed));
    assert_eq!(client.stats().total, 0);
}
