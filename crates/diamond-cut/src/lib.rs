//! Facet cut reconciliation for diamond proxies: read the live selector
//! routing, plan the minimal Add/Replace/Remove cut toward a declared facet
//! set, apply it atomically and verify the outcome. Also merges facet
//! interfaces into one combined ABI.

pub mod aggregate;
pub mod applier;
pub mod artifacts;
pub mod config;
pub mod error;
pub mod facet;
pub mod planner;
pub mod proxy;
pub mod reconciler;
pub mod snapshot;

pub use aggregate::{AggregateFilter, AggregateResult, InterfaceElement, aggregate};
pub use applier::{ApplyOptions, ApplyReport, apply_cut};
pub use artifacts::{ArtifactError, ArtifactSource, FsArtifacts, MemArtifacts};
pub use config::{ProjectConfig, ReconcileConfig, load_config};
pub use error::{CutError, Misroute, Phase};
pub use facet::{CutAction, CutKind, FacetDescriptor, InitializerSpec};
pub use planner::{CutPlan, PlannerOptions, plan_cut};
pub use proxy::{DiamondProxy, MemProxy, ProxyError, RpcProxy, TxHandle, TxReceipt};
pub use reconciler::{PlanResult, Reconciler, aggregate_interface, load_interface};
pub use snapshot::{RoutingSnapshot, read_snapshot};
