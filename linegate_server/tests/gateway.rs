//! End-to-end tests driving a real gateway over the loopback interface.

use linegate_client::Client;
use linegate_server::{Error, Gateway, GatewayBuilder};
use linegate_test_helpers::MockConsumer;
use linegate_types::{Consumer, LpDecoder, PointDecoder, Precision};
use pretty_assertions::assert_eq;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

const LP: &str = "cpu,host=a usage=0.5 100";

/// Bind on an ephemeral port, build a gateway around `consumers` and start
/// it. Returns the gateway and a client pointed at it.
async fn started_gateway(
    consumers: Vec<Arc<dyn Consumer>>,
    mirror_endpoint: Option<String>,
) -> (Gateway, Client) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

    let mut builder = GatewayBuilder::new();
    for consumer in consumers {
        builder = builder.register(consumer);
    }
    if let Some(endpoint) = mirror_endpoint {
        builder = builder
            .mirror_endpoint(endpoint)
            .mirror_connect_timeout(Duration::from_millis(250));
    }
    let gateway = builder.tcp_listener(listener).build().unwrap();
    gateway.start().await.unwrap();

    let client = Client::new(format!("http://{}", gateway.local_addr())).unwrap();
    (gateway, client)
}

/// Accept one connection and capture everything sent on it until `marker`
/// has been seen, then answer with a canned 204.
async fn capture_request_with(listener: TcpListener, marker: &[u8]) -> Vec<u8> {
    let (mut stream, _) = listener.accept().await.unwrap();
    let mut captured = Vec::new();
    let mut chunk = [0u8; 1024];
    while !captured
        .windows(marker.len())
        .any(|window| window == marker)
    {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "mirror peer hung up before the body arrived");
        captured.extend_from_slice(&chunk[..n]);
    }
    stream
        .write_all(b"HTTP/1.1 204 No Content\r\n\r\n")
        .await
        .unwrap();
    captured
}

#[test_log::test(tokio::test)]
async fn write_reaches_the_registered_consumer() {
    let consumer = MockConsumer::new("metrics");
    let (gateway, client) = started_gateway(vec![Arc::clone(&consumer) as _], None).await;

    assert!(consumer.is_started(), "start() runs the consumer's own loop");

    client.write("metrics").body(LP).send().await.unwrap();

    let updates = consumer.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].len(), 1);
    assert_eq!(updates[0][0].measurement, "cpu");
    assert_eq!(updates[0][0].time_ns, 100);

    gateway.stop().await;
}

#[test_log::test(tokio::test)]
async fn gzip_write_round_trip() {
    let consumer = MockConsumer::new("metrics");
    let (gateway, client) = started_gateway(vec![Arc::clone(&consumer) as _], None).await;

    client
        .write("metrics")
        .gzip(true)
        .precision(Precision::Second)
        .body("cpu,host=a usage=0.5 1708976567")
        .send()
        .await
        .unwrap();

    let updates = consumer.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0][0].time_ns, 1_708_976_567_000_000_000);

    gateway.stop().await;
}

#[test_log::test(tokio::test)]
async fn empty_body_means_nothing_to_ingest() {
    let consumer = MockConsumer::new("metrics");
    let (gateway, _client) = started_gateway(vec![Arc::clone(&consumer) as _], None).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/write?db=metrics", gateway.local_addr()))
        .body("")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(consumer.update_count(), 0);

    gateway.stop().await;
}

#[test_log::test(tokio::test)]
async fn malformed_body_surfaces_the_parser_error() {
    let consumer = MockConsumer::new("metrics");
    let (gateway, client) = started_gateway(vec![Arc::clone(&consumer) as _], None).await;

    let err = client
        .write("metrics")
        .body("cpu usage= 100")
        .send()
        .await
        .unwrap_err();

    let expected = LpDecoder::new()
        .decode("cpu usage= 100", 0, Precision::Nanosecond)
        .unwrap_err()
        .to_string();
    match err {
        linegate_client::Error::ApiError { code, message } => {
            assert_eq!(code, reqwest::StatusCode::BAD_REQUEST);
            assert_eq!(message, expected);
        }
        other => panic!("unexpected error variant: {other:?}"),
    }
    assert_eq!(consumer.update_count(), 0);

    gateway.stop().await;
}

#[test_log::test(tokio::test)]
async fn unknown_database_is_dropped_silently() {
    let consumer = MockConsumer::new("metrics");
    let (gateway, _client) = started_gateway(vec![Arc::clone(&consumer) as _], None).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/write?db=unknown", gateway.local_addr()))
        .body(LP)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::NO_CONTENT);
    assert_eq!(consumer.update_count(), 0);

    gateway.stop().await;
}

#[test_log::test(tokio::test)]
async fn mirror_receives_an_identical_copy() {
    let sink = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let sink_addr = sink.local_addr().unwrap();
    let capture = tokio::spawn(async move { capture_request_with(sink, LP.as_bytes()).await });

    let consumer = MockConsumer::new("metrics");
    let (gateway, client) =
        started_gateway(vec![Arc::clone(&consumer) as _], Some(sink_addr.to_string())).await;

    client.write("metrics").body(LP).send().await.unwrap();

    // The primary path is done; the mirror copy arrives on its own time.
    let captured = timeout(Duration::from_secs(5), capture)
        .await
        .expect("mirror copy must arrive")
        .unwrap();
    let text = String::from_utf8_lossy(&captured);
    assert!(text.starts_with("POST /write?db=metrics HTTP/1.1\r\n"), "{text}");
    assert!(text.ends_with(LP), "{text}");

    // Teeing did not change what the consumer saw.
    let updates = consumer.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].len(), 1);

    gateway.stop().await;
}

#[test_log::test(tokio::test)]
async fn unreachable_mirror_leaves_the_primary_path_unaffected() {
    // Bind-then-drop to get a port with nothing listening on it.
    let unreachable = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let consumer = MockConsumer::new("metrics");
    let (gateway, client) =
        started_gateway(vec![Arc::clone(&consumer) as _], Some(unreachable.to_string())).await;

    client.write("metrics").body(LP).send().await.unwrap();

    let updates = consumer.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].len(), 1);

    gateway.stop().await;
}

#[test_log::test(tokio::test)]
async fn stop_halts_ingress_before_stopping_consumers() {
    let consumer = MockConsumer::new("metrics");
    let (gateway, client) = started_gateway(vec![Arc::clone(&consumer) as _], None).await;
    let addr: SocketAddr = gateway.local_addr();

    client.write("metrics").body(LP).send().await.unwrap();

    gateway.stop().await;
    assert_eq!(consumer.stop_count(), 1);

    // No new connection can reach a consumer once stop has returned. A
    // fresh client guarantees a fresh connection; the old one may hold a
    // pooled keep-alive connection accepted before the listener stopped.
    TcpStream::connect(addr).await.unwrap_err();
    let fresh = Client::new(format!("http://{addr}")).unwrap();
    fresh.write("metrics").body(LP).send().await.unwrap_err();
    assert_eq!(consumer.update_count(), 1);

    // A second stop is a no-op.
    gateway.stop().await;
    assert_eq!(consumer.stop_count(), 1);
}

#[test_log::test(tokio::test)]
async fn start_twice_is_an_error() {
    let consumer = MockConsumer::new("metrics");
    let (gateway, _client) = started_gateway(vec![Arc::clone(&consumer) as _], None).await;

    let err = gateway.start().await.unwrap_err();
    assert!(matches!(err, Error::AlreadyStarted));

    gateway.stop().await;
    assert_eq!(consumer.stop_count(), 1);
}

#[test_log::test(tokio::test)]
async fn stop_before_start_is_a_no_op() {
    let consumer = MockConsumer::new("metrics");
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let gateway = GatewayBuilder::new()
        .register(Arc::clone(&consumer) as _)
        .tcp_listener(listener)
        .build()
        .unwrap();

    gateway.stop().await;
    gateway.stop().await;
    assert_eq!(consumer.stop_count(), 0);
}

#[test_log::test(tokio::test)]
async fn health_and_ping_answer_while_serving() {
    let (gateway, client) = started_gateway(vec![], None).await;

    client.health().await.unwrap();
    let ping = client.ping().await.unwrap();
    assert_eq!(ping.version(), env!("CARGO_PKG_VERSION"));

    gateway.stop().await;
}
