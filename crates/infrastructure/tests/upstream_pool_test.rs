mod helpers;

use helpers::{answer_ips, closed_port, ip, query_message, MockDnsServer, MockReply};
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::RecordType;
use sans_application::ports::UpstreamClient;
use sans_domain::{UpstreamEndpoint, UpstreamGroup, UpstreamStrategy};
use sans_infrastructure::dns::UpstreamPool;
use std::time::Duration;

fn pool() -> UpstreamPool {
    UpstreamPool::new(Duration::from_millis(200))
}

fn udp(addr: std::net::SocketAddr) -> UpstreamEndpoint {
    UpstreamEndpoint::Udp { addr }
}

fn tcp(addr: std::net::SocketAddr) -> UpstreamEndpoint {
    UpstreamEndpoint::Tcp { addr }
}

fn group(endpoints: Vec<UpstreamEndpoint>) -> UpstreamGroup {
    UpstreamGroup::new(0, "test", endpoints).with_timeout(Duration::from_millis(1000))
}

// ── id handling ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_send_uses_fresh_transaction_id() {
    let server = MockDnsServer::start(MockReply::Answer(vec![ip("140.205.94.189")]))
        .await
        .unwrap();
    let request = query_message(0xbeef, "www.taobao.com.", RecordType::A);

    let reply = pool()
        .send(&group(vec![udp(server.addr())]), &request)
        .await
        .unwrap();

    assert_ne!(reply.id(), 0);
    assert_eq!(answer_ips(&reply), vec![ip("140.205.94.189")]);
}

#[tokio::test]
async fn test_concurrent_sends_do_not_cross_talk() {
    let server = MockDnsServer::start_with_delay(
        MockReply::Answer(vec![ip("1.1.1.1")]),
        Duration::from_millis(20),
    )
    .await
    .unwrap();
    let pool = pool();
    let group = group(vec![udp(server.addr())]);

    let names = ["a.example.", "b.example.", "c.example.", "d.example."];
    let requests: Vec<_> = names
        .iter()
        .map(|n| query_message(1, n, RecordType::A))
        .collect();
    let replies =
        futures::future::join_all(requests.iter().map(|r| pool.send(&group, r))).await;

    for (name, reply) in names.iter().zip(replies) {
        let reply = reply.unwrap();
        assert_eq!(reply.queries()[0].name().to_ascii(), *name);
    }
}

// ── protocol behaviour ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_truncated_udp_reply_retried_over_tcp() {
    let server = MockDnsServer::start(MockReply::TruncatedUdp(vec![ip("9.9.9.9")]))
        .await
        .unwrap();
    let request = query_message(3, "big.example.", RecordType::A);

    let reply = pool()
        .send(&group(vec![udp(server.addr())]), &request)
        .await
        .unwrap();

    assert!(!reply.truncated());
    assert_eq!(answer_ips(&reply), vec![ip("9.9.9.9")]);
    assert_eq!(server.udp_queries(), 1);
    assert_eq!(server.tcp_queries(), 1);
}

#[tokio::test]
async fn test_server_failure_reply_is_returned_for_arbitration() {
    let server = MockDnsServer::start(MockReply::Rcode(ResponseCode::ServFail))
        .await
        .unwrap();
    let request = query_message(3, "example.com.", RecordType::A);

    let reply = pool()
        .send(&group(vec![tcp(server.addr())]), &request)
        .await
        .unwrap();
    assert_eq!(reply.response_code(), ResponseCode::ServFail);
}

#[tokio::test]
async fn test_silent_group_times_out_within_group_timeout() {
    let server = MockDnsServer::start(MockReply::Silent).await.unwrap();
    let request = query_message(3, "example.com.", RecordType::A);
    let group = group(vec![udp(server.addr())]).with_timeout(Duration::from_millis(300));

    let err = pool().send(&group, &request).await.unwrap_err();
    assert!(err.is_timeout());
}

// ── strategies ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_failover_skips_refused_endpoint() {
    let server = MockDnsServer::start(MockReply::Answer(vec![ip("8.8.8.8")]))
        .await
        .unwrap();
    let request = query_message(3, "dns.google.", RecordType::A);
    let group = group(vec![tcp(closed_port().await), udp(server.addr())])
        .with_strategy(UpstreamStrategy::Failover);

    let reply = pool().send(&group, &request).await.unwrap();
    assert_eq!(answer_ips(&reply), vec![ip("8.8.8.8")]);
}

#[tokio::test]
async fn test_parallel_takes_first_reply() {
    let slow = MockDnsServer::start_with_delay(
        MockReply::Answer(vec![ip("2.2.2.2")]),
        Duration::from_millis(400),
    )
    .await
    .unwrap();
    let fast = MockDnsServer::start(MockReply::Answer(vec![ip("1.1.1.1")]))
        .await
        .unwrap();
    let request = query_message(3, "example.com.", RecordType::A);
    let group = group(vec![udp(slow.addr()), udp(fast.addr())])
        .with_strategy(UpstreamStrategy::Parallel);

    let reply = pool().send(&group, &request).await.unwrap();
    assert_eq!(answer_ips(&reply), vec![ip("1.1.1.1")]);
}

#[tokio::test]
async fn test_all_endpoints_refused_reports_transport_error() {
    let request = query_message(3, "example.com.", RecordType::A);
    let group = group(vec![tcp(closed_port().await), tcp(closed_port().await)])
        .with_strategy(UpstreamStrategy::Parallel);

    let err = pool().send(&group, &request).await.unwrap_err();
    assert!(!err.is_timeout());
    assert!(err.is_upstream_failure());
}
