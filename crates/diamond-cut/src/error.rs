use std::fmt;
use std::time::Duration;

use diamond_abi::{AbiError, Address, Selector};
use serde::Serialize;
use thiserror::Error;

use crate::artifacts::ArtifactError;
use crate::proxy::ProxyError;

#[derive(Debug, Error)]
pub enum CutError {
    #[error("malformed signature in facet '{facet}': {source}")]
    MalformedSignature {
        facet: String,
        #[source]
        source: AbiError,
    },
    #[error("selector {selector} ({signature}) is claimed by both '{first}' and '{second}'")]
    SelectorCollision {
        selector: Selector,
        signature: String,
        first: String,
        second: String,
    },
    #[error(
        "target facet list is empty but the proxy routes {live_selectors} selector(s); explicit teardown required"
    )]
    EmptyTarget { live_selectors: usize },
    #[error("timed out after {timeout:?} waiting for {phase}; on-chain outcome unknown, re-run to resolve")]
    ConfirmationTimeout { phase: Phase, timeout: Duration },
    #[error("routing after cut does not match the target: {}", describe_mismatch(.missing, .unexpected, .misrouted))]
    ReconciliationMismatch {
        missing: Vec<(Selector, Address)>,
        unexpected: Vec<(Selector, Address)>,
        misrouted: Vec<Misroute>,
    },
    #[error("facet '{0}' has no deployed address")]
    UndeployedFacet(String),
    #[error("no interface description for facet '{0}'")]
    UnknownFacet(String),
    #[error("unknown facet group '{0}'")]
    UnknownGroup(String),
    #[error("selector {selector} ({signature}) claimed by facet '{facet}' is immutable on the proxy")]
    ImmutableSelector {
        selector: Selector,
        signature: String,
        facet: String,
    },
    #[error("loupe reports selector {selector} under both {first} and {second}")]
    InconsistentLoupe {
        selector: Selector,
        first: Address,
        second: Address,
    },
    #[error("proxy error: {0}")]
    Proxy(#[from] ProxyError),
    #[error("artifact error: {0}")]
    Artifact(#[from] ArtifactError),
    #[error("config error: {0}")]
    Config(String),
}

impl CutError {
    pub fn malformed(facet: impl Into<String>, source: AbiError) -> Self {
        CutError::MalformedSignature {
            facet: facet.into(),
            source,
        }
    }

    /// Whether re-invoking the reconciliation may succeed without changes to
    /// the inputs.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CutError::ConfirmationTimeout { .. }
                | CutError::Proxy(ProxyError::Transport(_))
        )
    }
}

/// Awaited phase of a reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Snapshot,
    Confirmation,
    Verification,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Snapshot => "routing snapshot",
            Phase::Confirmation => "cut confirmation",
            Phase::Verification => "post-cut verification",
        })
    }
}

/// Selector routed to a different facet than the target assigns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Misroute {
    pub selector: Selector,
    pub expected: Address,
    pub actual: Address,
}

fn describe_mismatch(
    missing: &[(Selector, Address)],
    unexpected: &[(Selector, Address)],
    misrouted: &[Misroute],
) -> String {
    let mut parts = Vec::new();
    if !missing.is_empty() {
        let list: Vec<String> = missing.iter().map(|(s, a)| format!("{s}->{a}")).collect();
        parts.push(format!("missing [{}]", list.join(", ")));
    }
    if !unexpected.is_empty() {
        let list: Vec<String> = unexpected.iter().map(|(s, a)| format!("{s}->{a}")).collect();
        parts.push(format!("unexpected [{}]", list.join(", ")));
    }
    if !misrouted.is_empty() {
        let list: Vec<String> = misrouted
            .iter()
            .map(|m| format!("{} expected {} got {}", m.selector, m.expected, m.actual))
            .collect();
        parts.push(format!("misrouted [{}]", list.join(", ")));
    }
    parts.join("; ")
}
