//! Live routing snapshots.

use std::time::Duration;

use diamond_abi::codec::{CutAction, CutKind, LoupeFacet};
use diamond_abi::{Address, Selector};
use indexmap::IndexMap;
use serde::Serialize;

use crate::error::{CutError, Misroute, Phase};
use crate::proxy::DiamondProxy;

/// Selector to facet address mapping, in loupe enumeration order.
///
/// Equality ignores order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RoutingSnapshot {
    routes: IndexMap<Selector, Address>,
}

impl RoutingSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flatten a loupe enumeration. Zero-address entries are ignored; a
    /// selector listed under two different facets is a broken proxy.
    pub fn from_loupe(facets: &[LoupeFacet]) -> Result<Self, CutError> {
        let mut routes = IndexMap::new();
        for facet in facets {
            if facet.address.is_zero() {
                continue;
            }
            for selector in &facet.selectors {
                if let Some(first) = routes.insert(*selector, facet.address) {
                    if first != facet.address {
                        return Err(CutError::InconsistentLoupe {
                            selector: *selector,
                            first,
                            second: facet.address,
                        });
                    }
                }
            }
        }
        Ok(Self { routes })
    }

    pub fn get(&self, selector: &Selector) -> Option<Address> {
        self.routes.get(selector).copied()
    }

    pub fn contains(&self, selector: &Selector) -> bool {
        self.routes.contains_key(selector)
    }

    pub fn insert(&mut self, selector: Selector, facet: Address) -> Option<Address> {
        self.routes.insert(selector, facet)
    }

    pub fn remove(&mut self, selector: &Selector) -> Option<Address> {
        self.routes.shift_remove(selector)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Selector, Address)> + '_ {
        self.routes.iter().map(|(s, a)| (*s, *a))
    }

    /// Selectors grouped by owning facet, in first-seen order.
    pub fn by_facet(&self) -> IndexMap<Address, Vec<Selector>> {
        let mut grouped: IndexMap<Address, Vec<Selector>> = IndexMap::new();
        for (selector, facet) in &self.routes {
            grouped.entry(*facet).or_default().push(*selector);
        }
        grouped
    }

    /// The routing that results from applying `actions` to this snapshot.
    pub fn apply(&self, actions: &[CutAction]) -> Self {
        let mut next = self.clone();
        for action in actions {
            for selector in &action.selectors {
                match action.kind {
                    CutKind::Remove => {
                        next.remove(selector);
                    }
                    CutKind::Add | CutKind::Replace => {
                        next.insert(*selector, action.facet_address);
                    }
                }
            }
        }
        next
    }

    /// Differences between this (expected) snapshot and `actual`, or `None`
    /// when they agree.
    pub fn mismatch(&self, actual: &RoutingSnapshot) -> Option<CutError> {
        let mut missing = Vec::new();
        let mut misrouted = Vec::new();
        for (selector, expected) in self.iter() {
            match actual.get(&selector) {
                None => missing.push((selector, expected)),
                Some(found) if found != expected => misrouted.push(Misroute {
                    selector,
                    expected,
                    actual: found,
                }),
                Some(_) => {}
            }
        }
        let unexpected: Vec<(Selector, Address)> = actual
            .iter()
            .filter(|(selector, _)| !self.contains(selector))
            .collect();
        if missing.is_empty() && misrouted.is_empty() && unexpected.is_empty() {
            None
        } else {
            Some(CutError::ReconciliationMismatch {
                missing,
                unexpected,
                misrouted,
            })
        }
    }
}

impl FromIterator<(Selector, Address)> for RoutingSnapshot {
    fn from_iter<T: IntoIterator<Item = (Selector, Address)>>(iter: T) -> Self {
        Self {
            routes: iter.into_iter().collect(),
        }
    }
}

/// Read the proxy's current routing. An uninitialized proxy reads as an
/// empty snapshot.
pub async fn read_snapshot<P>(proxy: &P, timeout: Duration) -> Result<RoutingSnapshot, CutError>
where
    P: DiamondProxy + ?Sized,
{
    read_phase(proxy, timeout, Phase::Snapshot).await
}

pub(crate) async fn read_phase<P>(
    proxy: &P,
    timeout: Duration,
    phase: Phase,
) -> Result<RoutingSnapshot, CutError>
where
    P: DiamondProxy + ?Sized,
{
    let facets = tokio::time::timeout(timeout, proxy.facets())
        .await
        .map_err(|_| CutError::ConfirmationTimeout { phase, timeout })??;
    let snapshot = RoutingSnapshot::from_loupe(&facets)?;
    tracing::info!(
        proxy = %proxy.address(),
        facets = facets.len(),
        selectors = snapshot.len(),
        "read routing snapshot"
    );
    Ok(snapshot)
}
