//! Try a candidate list of servers in order until one gives back a
//! parseable, matching response.

use std::net::SocketAddr;

use dns_types::protocol::types::{Message, Question};
use rand::Rng;

use crate::error::ResolverError;
use crate::transport;

/// Pack `question` once with a fresh ID, then try each server in
/// `server_list` in turn.
///
/// A server "fails" for the purposes of this function if the
/// transport times out or errors, the response fails to parse, or the
/// response ID does not match the query ID — in all three cases we
/// just move on to the next candidate.  RCODEs in an otherwise-valid
/// response are never treated as a failure here; that is the caller's
/// decision to make.
pub async fn try_servers(
    server_list: &[SocketAddr],
    question: &Question,
) -> Result<Message, ResolverError> {
    let query_id = rand::thread_rng().gen();
    let request = Message::from_question(query_id, question.clone());
    let packed_query = request
        .into_octets()
        .expect("a freshly-built single-question query always serialises");

    for &server in server_list {
        tracing::trace!(%server, %question, "querying nameserver");

        let raw = match transport::send_one(server, &packed_query).await {
            Ok(raw) => raw,
            Err(error) => {
                tracing::debug!(%server, %error, "transport failure, trying next server");
                continue;
            }
        };

        let response = match Message::from_octets(&raw) {
            Ok(response) => response,
            Err(error) => {
                tracing::debug!(%server, ?error, "could not parse response, trying next server");
                continue;
            }
        };

        if response.header.id != query_id {
            tracing::debug!(%server, expected = %query_id, got = %response.header.id, "response ID mismatch, trying next server");
            continue;
        }

        return Ok(response);
    }

    Err(ResolverError::AllServersFailed)
}
