//! Connect, read/write and whole-request deadlines.

mod common;

use common::SLOW_ROUTE_DELAY;
use common::TestServer;
use common::init_tracing;
use common::ok;
use hc_net::Client;
use hc_net::ClientConfig;
use hc_net::ErrorKind;
use std::time::Duration;
use std::time::Instant;

#[test]
fn short_read_write_timeout_fails_the_slow_route() {
    init_tracing();
    let server = TestServer::start();
    let client = ok(Client::new(
        ClientConfig::default().with_read_write_timeout(Duration::from_millis(50)),
    ));

    let started = Instant::now();
    let result = client.get(&server.url("/test"));
    assert!(matches!(
        result,
        Err(ref error) if error.kind() == ErrorKind::RequestTimeout
    ));
    assert!(started.elapsed() < SLOW_ROUTE_DELAY);

    let stats = client.pool_stats();
    assert_eq!(stats.bound_requests, 0);
    assert_eq!(stats.idle_connections, 0);
    assert_eq!(stats.outstanding, 0);
}

#[test]
fn generous_read_write_timeout_succeeds() {
    let server = TestServer::start();
    let client = ok(Client::new(
        ClientConfig::default().with_read_write_timeout(Duration::from_millis(250)),
    ));

    let response = ok(client.get(&server.url("/test")));
    assert_eq!(response.body, b"Hello world");
    assert!(client.finish_request(&response.request).is_ok());
}

#[test]
fn request_timeout_cancels_in_flight_io() {
    init_tracing();
    let server = TestServer::start();
    let client = ok(Client::new(
        ClientConfig::default().with_request_timeout(Duration::from_millis(50)),
    ));

    let result = client.get(&server.url("/test"));
    assert!(matches!(
        result,
        Err(ref error) if error.kind() == ErrorKind::Cancelled
    ));

    let stats = client.pool_stats();
    assert_eq!(stats.bound_requests, 0);
    assert_eq!(stats.idle_connections, 0);
    assert_eq!(stats.outstanding, 0);
    assert!(client.close().is_ok());
}

#[test]
fn request_timeout_leaves_fast_requests_alone() {
    let server = TestServer::start();
    let client = ok(Client::new(
        ClientConfig::default().with_request_timeout(Duration::from_millis(500)),
    ));

    for _ in 0..3 {
        let response = ok(client.get(&server.url("/plain")));
        assert!(client.finish_request(&response.request).is_ok());
    }

    // Deadlines past their requests' completion must not close cached connections.
    std::thread::sleep(Duration::from_millis(600));
    let response = ok(client.get(&server.url("/plain")));
    assert!(client.finish_request(&response.request).is_ok());

    assert_eq!(server.accepted(), 1);
    assert!(client.close().is_ok());
}

#[test]
fn failed_connection_is_replaced_by_a_fresh_dial() {
    let server = TestServer::start();
    let client = ok(Client::new(
        ClientConfig::default().with_read_write_timeout(Duration::from_millis(50)),
    ));

    assert!(client.get(&server.url("/test")).is_err());
    assert_eq!(client.pool_stats().idle_connections, 0);

    let response = ok(client.get(&server.url("/plain")));
    assert!(client.finish_request(&response.request).is_ok());
    assert_eq!(server.accepted(), 2);
}

#[test]
fn response_header_timeout_bounds_the_wait_for_the_head() {
    let server = TestServer::start();
    let client = ok(Client::new(
        ClientConfig::default().with_response_header_timeout(Duration::from_millis(50)),
    ));

    let result = client.get(&server.url("/test"));
    assert!(matches!(
        result,
        Err(ref error) if error.kind() == ErrorKind::RequestTimeout
    ));
}

#[test]
#[ignore = "needs a black-holed route to an unreachable address"]
fn unreachable_host_hits_the_connect_timeout() {
    let client = ok(Client::new(
        ClientConfig::default().with_connect_timeout(Duration::from_secs(1)),
    ));

    let started = Instant::now();
    let result = client.get("http://10.255.255.1:81/");
    assert!(matches!(
        result,
        Err(ref error) if error.kind() == ErrorKind::ConnectTimeout
    ));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(client.pool_stats().outstanding, 0);
}
