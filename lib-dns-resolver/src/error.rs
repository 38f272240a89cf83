//! Error taxonomy for the resolver.
//!
//! Per-hop transport and parse failures are recovered locally (the
//! selector just tries the next server); only failures which abort an
//! entire resolution step surface as a `ResolverError`.  Converting one
//! of these into an RCODE is the dispatcher's job, not this module's.

use std::io;

/// Failure sending to or receiving from a single upstream server.
#[derive(Debug)]
pub enum TransportError {
    Io(io::Error),
    Timeout,
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            TransportError::Io(err) => write!(f, "i/o error: {err}"),
            TransportError::Timeout => write!(f, "timed out"),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Io(err) => Some(err),
            TransportError::Timeout => None,
        }
    }
}

/// A failure which aborts an in-progress resolution.
///
/// `NameError` (NXDOMAIN) is deliberately absent: an empty-authority
/// terminal is a successful resolution outcome (see
/// `recursive::resolve`), not a failure, so it is represented as an
/// `Ok` response message with `RCODE = NameError` rather than as a
/// variant here.
#[derive(Debug)]
pub enum ResolverError {
    /// Every server in the current candidate set failed (transport
    /// error, parse error, or ID mismatch on every one of them).
    AllServersFailed,
    /// There was no glue for a delegation, and every nested attempt to
    /// resolve an NS hostname to an address also failed.
    NoGlueNoResolution,
    /// Ten iterations of the resolution loop passed without reaching a
    /// terminal state.
    IterationExhausted,
    /// The global hop budget shared across a whole call tree ran out.
    HopBudgetExhausted,
}

impl std::fmt::Display for ResolverError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ResolverError::AllServersFailed => write!(f, "all candidate servers failed"),
            ResolverError::NoGlueNoResolution => {
                write!(f, "no glue, and every nameserver sub-resolution failed")
            }
            ResolverError::IterationExhausted => {
                write!(f, "gave up after 10 iterations without a terminal answer")
            }
            ResolverError::HopBudgetExhausted => write!(f, "global hop budget exhausted"),
        }
    }
}

impl std::error::Error for ResolverError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}
