//! End-to-end tests against in-process mock nameservers, exercising
//! `dns_resolver::resolve_from` the way a real walk would use
//! `dns_resolver::resolve` against the real root servers.
//!
//! A mock nameserver is just a UDP socket with a handler closure: it
//! receives one query, decides on a response by inspecting the
//! question (and, for the delegation-chain test, how many times it's
//! already been asked), and sends that back. `resolve_from`'s
//! `server_list` doubles as the restart point for nested sub-
//! resolutions (`CNAME` chases, nameserver-address lookups), so those
//! scenarios need no port trickery. Glue and resolved nameserver
//! addresses, however, are always redialled on port 53 by the
//! resolver itself (matching real DNS), so the delegation-chain tests
//! below bind their mocks to distinct loopback addresses on port 53.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use dns_types::protocol::types::test_util::*;
use dns_types::protocol::types::*;
use tokio::net::UdpSocket;

/// Bind a mock nameserver at `addr` and serve forever, answering every
/// query with `handler(call_count, question)`. `call_count` starts at
/// zero and increments on every request this socket receives,
/// regardless of what the question was — enough to let a single mock
/// stand in for a whole delegation chain by changing its answer each
/// time it's asked the same question again.
async fn spawn_mock(addr: SocketAddr, handler: impl Fn(u32, &Question) -> Message + Send + 'static) {
    let socket = UdpSocket::bind(addr).await.expect("mock bind failed");
    let calls = Arc::new(AtomicU32::new(0));

    tokio::spawn(async move {
        let mut buf = vec![0u8; 512];
        loop {
            let (size, peer) = match socket.recv_from(&mut buf).await {
                Ok(ok) => ok,
                Err(_) => return,
            };
            let request = match Message::from_octets(&buf[..size]) {
                Ok(request) => request,
                Err(_) => continue,
            };
            let Some(question) = request.questions.first() else {
                continue;
            };
            let call = calls.fetch_add(1, Ordering::SeqCst);
            let mut response = handler(call, question);
            response.header.id = request.header.id;
            let bytes = response.into_octets().expect("mock response serialises");
            let _ = socket.send_to(&bytes, peer).await;
        }
    });

    // give the listener a moment to start accepting before the first query
    tokio::task::yield_now().await;
}

fn ipv4(addr: SocketAddr) -> Ipv4Addr {
    match addr.ip() {
        std::net::IpAddr::V4(v4) => v4,
        std::net::IpAddr::V6(_) => panic!("expected an IPv4 address"),
    }
}

fn a_question(name: &str) -> Question {
    Question {
        name: domain(name),
        qtype: QueryType::Record(RecordType::A),
        qclass: QueryClass::Record(RecordClass::IN),
    }
}

fn referral(ns_owner: &str, ns_name: &str, glue: Option<(&str, Ipv4Addr)>) -> Message {
    let mut additional = Vec::new();
    if let Some((glue_name, glue_addr)) = glue {
        additional.push(a_record(glue_name, glue_addr));
    }
    Message {
        header: Header {
            id: 0,
            is_response: true,
            opcode: Opcode::Standard,
            is_authoritative: false,
            is_truncated: false,
            recursion_desired: false,
            recursion_available: true,
            rcode: Rcode::NoError,
        },
        questions: Vec::new(),
        answers: Vec::new(),
        authority: vec![ns_record(ns_owner, ns_name)],
        additional,
    }
}

fn authoritative_answer(name: &str, address: Ipv4Addr) -> Message {
    Message {
        header: Header {
            id: 0,
            is_response: true,
            opcode: Opcode::Standard,
            is_authoritative: true,
            is_truncated: false,
            recursion_desired: false,
            recursion_available: true,
            rcode: Rcode::NoError,
        },
        questions: Vec::new(),
        answers: vec![a_record(name, address)],
        authority: Vec::new(),
        additional: Vec::new(),
    }
}

fn nxdomain() -> Message {
    Message {
        header: Header {
            id: 0,
            is_response: true,
            opcode: Opcode::Standard,
            is_authoritative: false,
            is_truncated: false,
            recursion_desired: false,
            recursion_available: true,
            rcode: Rcode::NameError,
        },
        questions: Vec::new(),
        answers: Vec::new(),
        authority: Vec::new(),
        additional: Vec::new(),
    }
}

#[tokio::test]
async fn authoritative_leaf_via_glue_delegation() {
    // root -> com. (glued) -> example.com. (glued) -> AA answer
    let root: SocketAddr = (Ipv4Addr::new(127, 0, 60, 1), 53).into();
    let com_ns: SocketAddr = (Ipv4Addr::new(127, 0, 60, 2), 53).into();
    let example_ns: SocketAddr = (Ipv4Addr::new(127, 0, 60, 3), 53).into();
    let answer_ip = Ipv4Addr::new(93, 184, 216, 34);

    spawn_mock(root, move |_call, _question| {
        referral("com.", "ns.com.", Some(("ns.com.", ipv4(com_ns))))
    })
    .await;
    spawn_mock(com_ns, move |_call, _question| {
        referral(
            "example.com.",
            "ns.example.com.",
            Some(("ns.example.com.", ipv4(example_ns))),
        )
    })
    .await;
    spawn_mock(example_ns, move |_call, _question| {
        authoritative_answer("example.com.", answer_ip)
    })
    .await;

    let question = a_question("example.com.");
    let response = dns_resolver::resolve_from(&[root], &question)
        .await
        .expect("resolution should succeed");

    assert!(response.header.is_authoritative);
    assert_eq!(Rcode::NoError, response.header.rcode);
    assert_eq!(vec![a_record("example.com.", answer_ip)], response.answers);
}

#[tokio::test]
async fn cname_chase_restarts_from_roots() {
    let root: SocketAddr = (Ipv4Addr::LOCALHOST, 0).into();
    let socket = UdpSocket::bind(root).await.unwrap();
    let root = socket.local_addr().unwrap();
    drop(socket);

    let answer_ip = Ipv4Addr::new(93, 184, 216, 34);
    spawn_mock(root, move |_call, question| {
        if question.name == domain("www.example.com.") {
            Message {
                header: Header {
                    id: 0,
                    is_response: true,
                    opcode: Opcode::Standard,
                    is_authoritative: false,
                    is_truncated: false,
                    recursion_desired: false,
                    recursion_available: true,
                    rcode: Rcode::NoError,
                },
                questions: Vec::new(),
                answers: vec![cname_record("www.example.com.", "example.com.")],
                authority: Vec::new(),
                additional: Vec::new(),
            }
        } else {
            authoritative_answer("example.com.", answer_ip)
        }
    })
    .await;

    let question = a_question("www.example.com.");
    let response = dns_resolver::resolve_from(&[root], &question)
        .await
        .expect("resolution should succeed");

    assert_eq!(vec![a_record("example.com.", answer_ip)], response.answers);
}

#[tokio::test]
async fn delegation_without_glue_resolves_nameserver_by_nested_lookup() {
    let front: SocketAddr = (Ipv4Addr::LOCALHOST, 0).into();
    let socket = UdpSocket::bind(front).await.unwrap();
    let front = socket.local_addr().unwrap();
    drop(socket);

    let ns_addr: SocketAddr = (Ipv4Addr::new(127, 0, 60, 4), 53).into();

    spawn_mock(front, move |_call, question| {
        if question.name == domain("a.slow-ns.test.") {
            referral("slow-ns.test.", "ns1.other.test.", None)
        } else if question.name == domain("ns1.other.test.") {
            authoritative_answer("ns1.other.test.", ipv4(ns_addr))
        } else {
            nxdomain()
        }
    })
    .await;
    spawn_mock(ns_addr, move |_call, _question| {
        authoritative_answer("a.slow-ns.test.", Ipv4Addr::new(10, 0, 0, 1))
    })
    .await;

    let question = a_question("a.slow-ns.test.");
    let response = dns_resolver::resolve_from(&[front], &question)
        .await
        .expect("resolution should succeed");

    assert!(response.header.is_authoritative);
    assert_eq!(
        vec![a_record("a.slow-ns.test.", Ipv4Addr::new(10, 0, 0, 1))],
        response.answers
    );
}

#[tokio::test]
async fn nxdomain_on_empty_authority_and_answer() {
    let server: SocketAddr = (Ipv4Addr::LOCALHOST, 0).into();
    let socket = UdpSocket::bind(server).await.unwrap();
    let server = socket.local_addr().unwrap();
    drop(socket);

    spawn_mock(server, |_call, _question| nxdomain()).await;

    let question = a_question("no-such.example.");
    let response = dns_resolver::resolve_from(&[server], &question)
        .await
        .expect("resolution should succeed");

    assert_eq!(Rcode::NameError, response.header.rcode);
    assert!(response.header.is_response);
    assert!(response.answers.is_empty());
}

#[tokio::test]
async fn iteration_cap_on_delegation_ping_pong() {
    // every query gets referred right back to the same server via
    // glue, forever: the walk must give up after exactly 10 iterations
    // rather than looping indefinitely or overflowing the stack.
    let server: SocketAddr = (Ipv4Addr::new(127, 0, 60, 5), 53).into();

    spawn_mock(server, move |_call, _question| {
        referral(
            "loop.test.",
            "ns.loop.test.",
            Some(("ns.loop.test.", ipv4(server))),
        )
    })
    .await;

    let question = a_question("loop.test.");
    let error = dns_resolver::resolve_from(&[server], &question)
        .await
        .expect_err("a self-referential delegation must not resolve");

    assert_eq!("gave up after 10 iterations without a terminal answer", error.to_string());
}

#[tokio::test]
async fn server_failover_tries_next_candidate() {
    let dead: SocketAddr = (Ipv4Addr::LOCALHOST, 1).into(); // port 0/1 refuses, nobody's listening
    let alive: SocketAddr = (Ipv4Addr::LOCALHOST, 0).into();
    let socket = UdpSocket::bind(alive).await.unwrap();
    let alive = socket.local_addr().unwrap();
    drop(socket);

    let answer_ip = Ipv4Addr::new(1, 2, 3, 4);
    spawn_mock(alive, move |_call, _question| authoritative_answer("example.com.", answer_ip)).await;

    let question = a_question("example.com.");
    let response = dns_resolver::resolve_from(&[dead, alive], &question)
        .await
        .expect("failover to the second server should still resolve");

    assert_eq!(vec![a_record("example.com.", answer_ip)], response.answers);
}
