//! Submitting a planned cut and verifying the resulting routing.

use std::time::Duration;

use serde::Serialize;

use crate::error::{CutError, Phase};
use crate::facet::InitializerSpec;
use crate::planner::CutPlan;
use crate::proxy::{DiamondProxy, TxHandle, TxReceipt};
use crate::snapshot::read_phase;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Bound on each awaited phase: confirmation and the verification read.
    pub timeout: Duration,
    /// Re-read the routing after confirmation and compare to the plan.
    pub verify: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            verify: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub applied: bool,
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx: Option<TxHandle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<TxReceipt>,
}

impl ApplyReport {
    fn skipped() -> Self {
        Self {
            applied: false,
            skipped: true,
            tx: None,
            receipt: None,
        }
    }
}

/// Apply `plan` to the proxy as a single transaction and wait for it.
///
/// An empty plan submits nothing, and its initializer is not run. On a
/// confirmation timeout the on-chain outcome is unknown; re-running the
/// reconciliation re-reads the routing and resolves it.
pub async fn apply_cut<P>(
    proxy: &P,
    plan: &CutPlan,
    init: Option<&InitializerSpec>,
    opts: &ApplyOptions,
) -> Result<ApplyReport, CutError>
where
    P: DiamondProxy + ?Sized,
{
    if plan.is_empty() {
        if let Some(init) = init {
            tracing::warn!(
                target_address = %init.target_address,
                "routing already matches target; initializer not run"
            );
        }
        tracing::info!(proxy = %proxy.address(), "no cut needed");
        return Ok(ApplyReport::skipped());
    }

    let (tx, receipt) = tokio::time::timeout(opts.timeout, async {
        let tx = proxy.submit_cut(&plan.actions, init).await?;
        tracing::info!(%tx, actions = plan.actions.len(), "cut submitted");
        let receipt = proxy.wait_confirmed(&tx).await?;
        Ok::<_, CutError>((tx, receipt))
    })
    .await
    .map_err(|_| {
        tracing::warn!(timeout = ?opts.timeout, "cut confirmation timed out");
        CutError::ConfirmationTimeout {
            phase: Phase::Confirmation,
            timeout: opts.timeout,
        }
    })??;
    tracing::info!(%tx, block = ?receipt.block_number, "cut confirmed");

    if opts.verify {
        let actual = read_phase(proxy, opts.timeout, Phase::Verification).await?;
        if let Some(err) = plan.expected.mismatch(&actual) {
            tracing::error!(%tx, "post-cut routing differs from the plan");
            return Err(err);
        }
        tracing::debug!(selectors = actual.len(), "post-cut routing verified");
    }

    Ok(ApplyReport {
        applied: true,
        skipped: false,
        tx: Some(tx),
        receipt: Some(receipt),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{PlannerOptions, plan_cut};
    use crate::proxy::MemProxy;
    use crate::snapshot::read_snapshot;
    use crate::facet::FacetDescriptor;
    use diamond_abi::{Address, Selector};

    fn addr(last: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[19] = last;
        Address::new(bytes)
    }

    fn sel(sig: &str) -> Selector {
        Selector::of_signature(sig)
    }

    async fn plan_for(proxy: &MemProxy, target: &[FacetDescriptor]) -> CutPlan {
        let live = read_snapshot(proxy, Duration::from_secs(1)).await.unwrap();
        plan_cut(&live, target, &PlannerOptions::default()).unwrap()
    }

    #[tokio::test]
    async fn empty_plan_skips_initializer() {
        let proxy = MemProxy::new(addr(0xdd));
        proxy.seed(addr(1), [sel("a()")]);
        proxy.register_initializer(addr(9), |_| Ok(()));
        let plan = plan_for(&proxy, &[FacetDescriptor::new("A", Some(addr(1)), [sel("a()")])]).await;
        let init = InitializerSpec::from_signature(addr(9), "init()", vec![]).unwrap();

        let report = apply_cut(&proxy, &plan, Some(&init), &ApplyOptions::default())
            .await
            .unwrap();
        assert!(report.skipped);
        assert!(!report.applied);
        assert_eq!(proxy.cut_count(), 0);
        assert!(proxy.init_calls().is_empty());
    }

    #[tokio::test]
    async fn applies_and_verifies() {
        let proxy = MemProxy::new(addr(0xdd));
        proxy.seed(addr(1), [sel("a()"), sel("b()")]);
        let target = [FacetDescriptor::new("B", Some(addr(2)), [sel("a()"), sel("c()")])];
        let plan = plan_for(&proxy, &target).await;

        let report = apply_cut(&proxy, &plan, None, &ApplyOptions::default())
            .await
            .unwrap();
        assert!(report.applied);
        assert_eq!(report.receipt.unwrap().block_number, Some(1));
        assert_eq!(proxy.owner(&sel("a()")), Some(addr(2)));
        assert_eq!(proxy.owner(&sel("b()")), None);
        assert_eq!(proxy.owner(&sel("c()")), Some(addr(2)));
    }

    #[tokio::test]
    async fn slow_confirmation_times_out() {
        let proxy = MemProxy::new(addr(0xdd)).with_confirmation_delay(Duration::from_millis(200));
        let target = [FacetDescriptor::new("A", Some(addr(1)), [sel("a()")])];
        let plan = plan_for(&proxy, &target).await;
        let opts = ApplyOptions {
            timeout: Duration::from_millis(20),
            verify: true,
        };

        let err = apply_cut(&proxy, &plan, None, &opts).await.unwrap_err();
        assert!(matches!(
            err,
            CutError::ConfirmationTimeout {
                phase: Phase::Confirmation,
                ..
            }
        ));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn tampered_routing_is_reported() {
        let proxy = MemProxy::new(addr(0xdd));
        let target = [FacetDescriptor::new("A", Some(addr(1)), [sel("a()"), sel("b()")])];
        let plan = plan_for(&proxy, &target).await;
        proxy.after_next_cut(|table| {
            table.unroute(Selector::of_signature("b()"));
        });

        match apply_cut(&proxy, &plan, None, &ApplyOptions::default()).await {
            Err(CutError::ReconciliationMismatch { missing, .. }) => {
                assert_eq!(missing, vec![(sel("b()"), addr(1))]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
