//! The iterative resolution algorithm: walk the delegation chain from
//! a candidate server list down to an authoritative answer, following
//! `CNAME`s and glue as we go.
//!
//! See section 5.3.3 of RFC 1034 for the standard resolver algorithm
//! this is modelled on.

use async_recursion::async_recursion;
use std::net::SocketAddr;

use dns_types::protocol::types::*;

use crate::error::ResolverError;
use crate::{HopBudget, DNS_PORT, ITERATION_LIMIT};

/// Resolve `question` iteratively, starting from `server_list`.
///
/// Every nested sub-resolution this call spawns (to chase a `CNAME`,
/// or to turn a nameserver hostname into an address) restarts from
/// `roots`, but shares `hop_budget` with this call, so the total
/// amount of work done across the whole tree is bounded regardless of
/// how deep any one chain of calls gets.
///
/// `roots` is threaded through separately from `server_list` (rather
/// than read from a global) so that `dns_resolver::resolve_from` can
/// point an entire call tree — including nested restarts — at an
/// in-process mock nameserver instead of the real root servers.
///
/// # Errors
///
/// See `ResolverError`.
#[async_recursion]
pub(crate) async fn resolve(
    server_list: &[SocketAddr],
    roots: &[SocketAddr],
    question: &Question,
    hop_budget: &HopBudget,
) -> Result<Message, ResolverError> {
    let mut current_servers = server_list.to_vec();

    for _iteration in 0..ITERATION_LIMIT {
        if !hop_budget.take() {
            tracing::debug!(%question, "hop budget exhausted");
            return Err(ResolverError::HopBudgetExhausted);
        }

        let response = crate::selector::try_servers(&current_servers, question).await?;

        // Step 1: a CNAME at the question name redirects the whole
        // resolution, restarting from the root.
        if let Some(target) = cname_redirect_target(&response.answers, &question.name) {
            let cname_question = Question {
                name: target,
                qtype: QueryType::Record(RecordType::A),
                qclass: QueryClass::Record(RecordClass::IN),
            };
            tracing::trace!(%question, target = %cname_question.name, "following CNAME, restarting from root");
            return resolve(roots, roots, &cname_question, hop_budget).await;
        }

        // Step 2: an authoritative, non-empty answer terminates the walk.
        if response.header.is_authoritative && !response.answers.is_empty() {
            tracing::trace!(%question, answers = response.answers.len(), "authoritative answer");
            return Ok(terminal_response(question, true, Rcode::NoError, response.answers));
        }

        // Step 3: no authority at all and no answer means the name does not exist.
        if response.authority.is_empty() {
            tracing::trace!(%question, "empty authority, no answer: NXDOMAIN");
            return Ok(terminal_response(
                question,
                response.header.is_authoritative,
                Rcode::NameError,
                Vec::new(),
            ));
        }

        // Step 4: collect the delegation's nameserver names.
        let ns_names = delegation_ns_names(&response.authority);
        if ns_names.is_empty() {
            tracing::trace!(%question, "authority section had no NS records, retrying");
            continue;
        }

        // Step 5: glue in the additional section lets us skip a nested lookup.
        let glue = glue_addresses(&response.additional, &ns_names);
        if !glue.is_empty() {
            tracing::trace!(%question, count = glue.len(), "using glue addresses for delegation");
            current_servers = glue;
            continue;
        }

        // Step 6: no glue, so resolve one of the nameserver names to an address.
        match resolve_nameserver_addresses(&ns_names, roots, hop_budget).await {
            Some(addresses) => {
                tracing::trace!(%question, count = addresses.len(), "resolved nameserver without glue");
                current_servers = addresses;
                continue;
            }
            None => {
                tracing::debug!(%question, "no glue and every nameserver sub-resolution failed");
                return Err(ResolverError::NoGlueNoResolution);
            }
        }
    }

    tracing::debug!(%question, "iteration cap reached without a terminal answer");
    Err(ResolverError::IterationExhausted)
}

/// Build the `Message` returned as the result of a terminated walk.
fn terminal_response(
    question: &Question,
    is_authoritative: bool,
    rcode: Rcode,
    answers: Vec<ResourceRecord>,
) -> Message {
    Message {
        header: Header {
            id: 0,
            is_response: true,
            opcode: Opcode::Standard,
            is_authoritative,
            is_truncated: false,
            recursion_desired: false,
            recursion_available: true,
            rcode,
        },
        questions: vec![question.clone()],
        answers,
        authority: Vec::new(),
        additional: Vec::new(),
    }
}

/// If `answers` contains a `CNAME` whose owner name is `target`,
/// return its redirect target.  Only the first such record is
/// followed; RFC 1035 does not envisage more than one.
fn cname_redirect_target(answers: &[ResourceRecord], target: &DomainName) -> Option<DomainName> {
    answers.iter().find_map(|rr| {
        if &rr.name == target {
            if let RecordTypeWithData::CNAME { cname } = &rr.rtype_with_data {
                return Some(cname.clone());
            }
        }
        None
    })
}

/// Collect the `NSDNAME`s of every `NS` record in a delegation's
/// authority section.
fn delegation_ns_names(authority: &[ResourceRecord]) -> Vec<DomainName> {
    authority
        .iter()
        .filter_map(|rr| match &rr.rtype_with_data {
            RecordTypeWithData::NS { nsdname } => Some(nsdname.clone()),
            _ => None,
        })
        .collect()
}

/// Pick out the `A` records in `additional` whose owner name matches
/// one of `ns_names` — the glue that lets us skip resolving the
/// nameserver's address separately.
fn glue_addresses(additional: &[ResourceRecord], ns_names: &[DomainName]) -> Vec<SocketAddr> {
    additional
        .iter()
        .filter_map(|rr| match &rr.rtype_with_data {
            RecordTypeWithData::A { address } if ns_names.contains(&rr.name) => {
                Some(SocketAddr::from((*address, DNS_PORT)))
            }
            _ => None,
        })
        .collect()
}

/// Resolve each nameserver name in turn (always restarting from the
/// root), stopping as soon as one yields at least one address.
/// Returns `None` only if every name fails to resolve.
async fn resolve_nameserver_addresses(
    ns_names: &[DomainName],
    roots: &[SocketAddr],
    hop_budget: &HopBudget,
) -> Option<Vec<SocketAddr>> {
    for ns_name in ns_names {
        let ns_question = Question {
            name: ns_name.clone(),
            qtype: QueryType::Record(RecordType::A),
            qclass: QueryClass::Record(RecordClass::IN),
        };

        let result = resolve(roots, roots, &ns_question, hop_budget).await;
        let addresses: Vec<SocketAddr> = match result {
            Ok(message) => message
                .answers
                .iter()
                .filter_map(|rr| match &rr.rtype_with_data {
                    RecordTypeWithData::A { address } => {
                        Some(SocketAddr::from((*address, DNS_PORT)))
                    }
                    _ => None,
                })
                .collect(),
            Err(error) => {
                tracing::debug!(%ns_name, %error, "nameserver sub-resolution failed");
                Vec::new()
            }
        };

        if !addresses.is_empty() {
            return Some(addresses);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use dns_types::protocol::types::test_util::*;
    use std::net::Ipv4Addr;

    use super::*;

    #[test]
    fn cname_redirect_target_finds_matching_owner() {
        let rrs = vec![cname_record("www.example.com.", "example.com.")];
        assert_eq!(
            Some(domain("example.com.")),
            cname_redirect_target(&rrs, &domain("www.example.com."))
        );
    }

    #[test]
    fn cname_redirect_target_ignores_other_owners() {
        let rrs = vec![cname_record("other.example.com.", "example.com.")];
        assert_eq!(
            None,
            cname_redirect_target(&rrs, &domain("www.example.com."))
        );
    }

    #[test]
    fn delegation_ns_names_collects_ns_records_only() {
        let rrs = vec![
            ns_record("example.com.", "ns1.example.com."),
            a_record("example.com.", Ipv4Addr::new(1, 1, 1, 1)),
            ns_record("example.com.", "ns2.example.com."),
        ];
        assert_eq!(
            vec![domain("ns1.example.com."), domain("ns2.example.com.")],
            delegation_ns_names(&rrs)
        );
    }

    #[test]
    fn glue_addresses_matches_by_owner_name() {
        let ns_names = vec![domain("ns1.example.com.")];
        let rrs = vec![
            a_record("ns1.example.com.", Ipv4Addr::new(1, 1, 1, 1)),
            a_record("ns2.example.com.", Ipv4Addr::new(2, 2, 2, 2)),
        ];
        assert_eq!(
            vec![SocketAddr::from((Ipv4Addr::new(1, 1, 1, 1), DNS_PORT))],
            glue_addresses(&rrs, &ns_names)
        );
    }
}
