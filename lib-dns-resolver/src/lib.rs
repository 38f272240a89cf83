#![warn(clippy::pedantic)]
// Don't care enough to fix
#![allow(clippy::match_same_arms)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::similar_names)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::wildcard_imports)]

pub mod error;
pub mod recursive;
pub mod selector;
pub mod transport;

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use dns_types::protocol::types::{Message, Question};

use self::error::ResolverError;

/// Number of resolution steps a single `resolve` invocation (and each
/// nested sub-resolution it spawns) may take before giving up.
pub const ITERATION_LIMIT: usize = 10;

/// Total hops available across an entire call tree: the top-level
/// resolution, plus every nested `CNAME`/nameserver sub-resolution it
/// spawns.  This is the supplementing, outer guard against pathological
/// delegation loops; the per-call `ITERATION_LIMIT` is the inner one.
pub const HOP_BUDGET: u32 = 32;

/// The standard DNS port, used for every upstream nameserver this
/// resolver talks to, whether from the root hint list, glue, or a
/// nested nameserver sub-resolution.
pub const DNS_PORT: u16 = 53;

/// The 13 canonical IPv4 root server addresses, A through M.
const ROOT_SERVERS: [Ipv4Addr; 13] = [
    Ipv4Addr::new(198, 41, 0, 4),     // a.root-servers.net
    Ipv4Addr::new(199, 9, 14, 201),   // b.root-servers.net
    Ipv4Addr::new(192, 33, 4, 12),    // c.root-servers.net
    Ipv4Addr::new(199, 7, 91, 13),    // d.root-servers.net
    Ipv4Addr::new(192, 203, 230, 10), // e.root-servers.net
    Ipv4Addr::new(192, 5, 5, 241),    // f.root-servers.net
    Ipv4Addr::new(192, 112, 36, 4),   // g.root-servers.net
    Ipv4Addr::new(198, 97, 190, 53),  // h.root-servers.net
    Ipv4Addr::new(192, 36, 148, 17),  // i.root-servers.net
    Ipv4Addr::new(192, 58, 128, 30),  // j.root-servers.net
    Ipv4Addr::new(193, 0, 14, 129),   // k.root-servers.net
    Ipv4Addr::new(199, 7, 83, 42),    // l.root-servers.net
    Ipv4Addr::new(202, 12, 27, 33),   // m.root-servers.net
];

/// The root hint list as connectable socket addresses (port 53).
fn root_server_addrs() -> Vec<SocketAddr> {
    ROOT_SERVERS
        .iter()
        .map(|&ip| SocketAddr::from((ip, DNS_PORT)))
        .collect()
}

/// A counter, shared by reference across an entire resolution call
/// tree, bounding the total number of iterations performed by the
/// top-level call and everything it recursively spawns.
///
/// This backstops the per-call `ITERATION_LIMIT`: without it, a
/// pathological chain of distinct `CNAME` targets or nameserver
/// referrals could still do unbounded work by staying just inside the
/// 10-iteration cap at every level of recursion.
#[derive(Clone)]
pub struct HopBudget(Arc<AtomicU32>);

impl HopBudget {
    fn new(hops: u32) -> Self {
        HopBudget(Arc::new(AtomicU32::new(hops)))
    }

    /// Spend one hop. Returns `false` once the budget is exhausted.
    fn take(&self) -> bool {
        self.0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |hops| {
                hops.checked_sub(1)
            })
            .is_ok()
    }
}

/// Resolve `question` iteratively, starting from the root servers.
///
/// This is the resolver's main public entry point: it parses no wire
/// format itself (that's `dns-types`'s job) and knows nothing of
/// sockets beyond the ones it opens to talk to upstream nameservers
/// (that's the caller's concern, typically a UDP listen loop).
///
/// # Errors
///
/// See `ResolverError`. Every error variant corresponds to a
/// `SERVFAIL` at the dispatcher boundary; this function never panics
/// on a malformed or hostile upstream response.
pub async fn resolve(question: &Question) -> Result<Message, ResolverError> {
    resolve_from(&root_server_addrs(), question).await
}

/// Resolve `question` iteratively, starting from an arbitrary
/// candidate server set instead of the real root hints.
///
/// `server_list` also becomes the restart point (the "roots") for
/// every nested sub-resolution this call spawns — a `CNAME` chase or
/// a nameserver-address lookup restarts from `server_list`, not from
/// the real root servers. This is the seam integration tests use to
/// point an entire resolution, including its nested restarts, at an
/// in-process mock nameserver; it has no other caller in this crate.
///
/// # Errors
///
/// See `ResolverError`.
pub async fn resolve_from(
    server_list: &[SocketAddr],
    question: &Question,
) -> Result<Message, ResolverError> {
    let hop_budget = HopBudget::new(HOP_BUDGET);
    recursive::resolve(server_list, server_list, question, &hop_budget).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hop_budget_runs_out() {
        let budget = HopBudget::new(2);
        assert!(budget.take());
        assert!(budget.take());
        assert!(!budget.take());
        assert!(!budget.take());
    }

    #[test]
    fn root_server_addrs_has_thirteen_entries_on_port_53() {
        let addrs = root_server_addrs();
        assert_eq!(13, addrs.len());
        assert!(addrs.iter().all(|addr| addr.port() == DNS_PORT));
    }
}
