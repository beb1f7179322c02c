//! Entry points for deployment scripts: reconcile a proxy toward a named
//! facet set and export the combined interface.

use diamond_abi::{Address, InterfaceDescription};
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use crate::aggregate::{AggregateFilter, AggregateResult, aggregate};
use crate::applier::apply_cut;
use crate::artifacts::{ArtifactError, ArtifactSource};
use crate::config::ReconcileConfig;
use crate::error::CutError;
use crate::facet::{CutAction, FacetDescriptor, InitializerSpec};
use crate::planner::{CutPlan, PlannerOptions, plan_cut};
use crate::proxy::{DiamondProxy, TxHandle, TxReceipt};
use crate::snapshot::{RoutingSnapshot, read_snapshot};

/// Outcome of [`Reconciler::reconcile`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanResult {
    pub applied: Vec<CutAction>,
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx: Option<TxHandle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<TxReceipt>,
}

/// Ties a proxy, an artifact source and run options together.
///
/// Holds no state between calls; the proxy's loupe is the source of truth.
pub struct Reconciler<P, A> {
    proxy: P,
    artifacts: A,
    config: ReconcileConfig,
}

impl<P, A> Reconciler<P, A>
where
    P: DiamondProxy,
    A: ArtifactSource,
{
    pub fn new(proxy: P, artifacts: A, config: ReconcileConfig) -> Self {
        Self {
            proxy,
            artifacts,
            config,
        }
    }

    pub fn proxy(&self) -> &P {
        &self.proxy
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Interface of a facet, with the configured deployment address applied.
    pub fn interface(&self, name: &str) -> Result<InterfaceDescription, CutError> {
        load_interface(&self.artifacts, &self.config.deployments, name)
    }

    /// Target descriptors for `names`, in order, each name once.
    pub fn describe(&self, names: &[String]) -> Result<Vec<FacetDescriptor>, CutError> {
        let unique: IndexSet<&str> = names.iter().map(String::as_str).collect();
        unique
            .into_iter()
            .map(|name| FacetDescriptor::describe(&self.interface(name)?, &self.config.exclusions))
            .collect()
    }

    pub async fn snapshot(&self) -> Result<RoutingSnapshot, CutError> {
        read_snapshot(&self.proxy, self.config.apply.timeout).await
    }

    /// Compute the cut for `names` without submitting it.
    pub async fn plan(&self, names: &[String]) -> Result<CutPlan, CutError> {
        let target = self.describe(names)?;
        let live = self.snapshot().await?;
        plan_cut(&live, &target, &self.planner_options())
    }

    /// Bring the proxy's routing to exactly the selectors of `names`.
    ///
    /// Safe to re-run after any failure: the plan is recomputed from the
    /// live routing every time, and a converged proxy yields a skipped run.
    pub async fn reconcile(
        &self,
        names: &[String],
        init: Option<&InitializerSpec>,
    ) -> Result<PlanResult, CutError> {
        let plan = self.plan(names).await?;
        let report = apply_cut(&self.proxy, &plan, init, &self.config.apply).await?;
        Ok(PlanResult {
            applied: if report.applied { plan.actions } else { Vec::new() },
            skipped: report.skipped,
            tx: report.tx,
            receipt: report.receipt,
        })
    }

    /// Merge the interfaces of `names` in order into one description.
    pub fn aggregate_interface(
        &self,
        names: &[String],
        filter: &AggregateFilter,
    ) -> Result<AggregateResult, CutError> {
        aggregate_interface(&self.artifacts, &self.config.deployments, names, filter)
    }

    fn planner_options(&self) -> PlannerOptions {
        PlannerOptions {
            allow_teardown: self.config.allow_teardown,
            immutable_owner: Some(self.proxy.address()),
        }
    }
}

/// Interface of `name` from `artifacts`, with its address taken from
/// `deployments` when listed there.
pub fn load_interface<A>(
    artifacts: &A,
    deployments: &IndexMap<String, Address>,
    name: &str,
) -> Result<InterfaceDescription, CutError>
where
    A: ArtifactSource + ?Sized,
{
    let mut iface = artifacts.interface(name).map_err(|e| match e {
        ArtifactError::NotFound(name) => CutError::UnknownFacet(name),
        other => CutError::Artifact(other),
    })?;
    if let Some(address) = deployments.get(name) {
        iface.address = Some(*address);
    }
    Ok(iface)
}

/// Merge the interfaces of `names`, in order and each name once, into one
/// description. Needs no proxy.
pub fn aggregate_interface<A>(
    artifacts: &A,
    deployments: &IndexMap<String, Address>,
    names: &[String],
    filter: &AggregateFilter,
) -> Result<AggregateResult, CutError>
where
    A: ArtifactSource + ?Sized,
{
    let unique: IndexSet<&str> = names.iter().map(String::as_str).collect();
    let facets = unique
        .into_iter()
        .map(|name| load_interface(artifacts, deployments, name))
        .collect::<Result<Vec<_>, _>>()?;
    aggregate(&facets, filter)
}
