use std::net::{Ipv4Addr, SocketAddr};
use std::process;
use std::sync::Arc;

use clap::Parser;
use tokio::net::UdpSocket;
use tracing_subscriber::EnvFilter;

use dns_types::protocol::types::{Header, Message, Rcode};

const RECV_BUFFER_SIZE: usize = 512;

/// A simple recursive-iterative DNS resolver for stub clients.
///
/// It walks the delegation chain itself, starting from the root
/// servers, rather than forwarding to an upstream recursive resolver.
/// There is no cache: every query starts from root.
#[derive(Debug, Parser)]
struct Args {
    /// Interface to listen on
    #[clap(short, long, value_parser, default_value_t = Ipv4Addr::UNSPECIFIED)]
    interface: Ipv4Addr,

    /// Port to listen on
    #[clap(short, long, value_parser, default_value_t = 8001)]
    port: u16,
}

fn begin_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

/// A minimal `SERVER_FAILURE` response, with the original question
/// echoed back and the original header's ID and opcode preserved.
fn servfail(request: &Message) -> Message {
    Message {
        header: Header {
            id: request.header.id,
            is_response: true,
            opcode: request.header.opcode,
            is_authoritative: false,
            is_truncated: false,
            recursion_desired: request.header.recursion_desired,
            recursion_available: true,
            rcode: Rcode::ServerFailure,
        },
        questions: request.questions.clone(),
        answers: Vec::new(),
        authority: Vec::new(),
        additional: Vec::new(),
    }
}

/// A best-effort `SERVER_FAILURE` response for a datagram that could
/// not be parsed: no question to echo, and the opcode is whatever
/// `make_format_error_response` defaults to, since a datagram that
/// failed to parse may not have a recoverable opcode either.
fn servfail_for_id(id: u16) -> Message {
    let mut response = Message::make_format_error_response(id);
    response.header.rcode = Rcode::ServerFailure;
    response
}

/// Parse, resolve, and stamp a single inbound datagram, producing the
/// bytes to send back to the client (if any).
///
/// Returns `None` only when the datagram could not be parsed well
/// enough to recover even its ID: there is nobody to address a
/// response to.
async fn handle_datagram(peer: SocketAddr, raw: &[u8]) -> Option<Vec<u8>> {
    let request = match Message::from_octets(raw) {
        Ok(request) => request,
        Err(error) => {
            tracing::debug!(?peer, ?error, "could not parse request");
            return error.id().map(|id| {
                servfail_for_id(id)
                    .into_octets()
                    .expect("a format-error response always serialises")
            });
        }
    };

    let Some(question) = request.questions.first().cloned() else {
        tracing::debug!(?peer, "request had no question");
        let mut response = servfail_for_id(request.header.id);
        response.header.opcode = request.header.opcode;
        return Some(
            response
                .into_octets()
                .expect("a format-error response always serialises"),
        );
    };

    tracing::info!(%peer, %question, "resolving");

    let mut response = match dns_resolver::resolve(&question).await {
        Ok(response) => response,
        Err(error) => {
            tracing::info!(%peer, %question, %error, "resolution failed, returning SERVFAIL");
            servfail(&request)
        }
    };

    response.header.id = request.header.id;

    tracing::info!(%peer, %question, rcode = %response.header.rcode, answers = response.answers.len(), "responding");

    match response.clone().into_octets() {
        Ok(bytes) => Some(bytes),
        Err(error) => {
            tracing::warn!(%peer, ?error, ?response, "could not serialise response, returning SERVFAIL");
            servfail(&request).into_octets().ok()
        }
    }
}

async fn listen_udp_task(socket: Arc<UdpSocket>) {
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];

    loop {
        let (size, peer) = match socket.recv_from(&mut buf).await {
            Ok(ok) => ok,
            Err(error) => {
                tracing::warn!(?error, "UDP receive error");
                continue;
            }
        };

        let datagram = buf[..size].to_vec();
        let socket = socket.clone();
        tokio::spawn(async move {
            if let Some(response) = handle_datagram(peer, &datagram).await {
                if let Err(error) = socket.send_to(&response, peer).await {
                    tracing::debug!(?peer, ?error, "UDP send error");
                }
            }
        });
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    begin_logging();

    tracing::info!(interface = %args.interface, port = %args.port, "binding DNS UDP socket");
    let socket = match UdpSocket::bind((args.interface, args.port)).await {
        Ok(socket) => Arc::new(socket),
        Err(error) => {
            tracing::error!(?error, "could not bind DNS UDP socket");
            process::exit(1);
        }
    };

    listen_udp_task(socket).await;
}
