//! Cut planning: the minimal ordered action list that turns the live routing
//! into the routing a target facet list implies.

use std::fmt::Write as _;

use diamond_abi::{Address, Selector};
use indexmap::IndexMap;
use serde::Serialize;

use crate::error::CutError;
use crate::facet::{CutAction, CutKind, FacetDescriptor};
use crate::snapshot::RoutingSnapshot;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlannerOptions {
    /// Permit an empty target to remove every live selector.
    pub allow_teardown: bool,
    /// Selectors routed to this address are immutable: never removed or
    /// replaced. Set to the proxy's own address.
    pub immutable_owner: Option<Address>,
}

/// Ordered cut actions plus the routing they are expected to produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CutPlan {
    pub actions: Vec<CutAction>,
    /// Routing the proxy must report once the actions are applied.
    pub expected: RoutingSnapshot,
    #[serde(skip)]
    signatures: IndexMap<Selector, String>,
}

impl CutPlan {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn signature(&self, selector: &Selector) -> Option<&str> {
        self.signatures.get(selector).map(String::as_str)
    }

    pub fn count(&self, kind: CutKind) -> usize {
        self.actions
            .iter()
            .filter(|a| a.kind == kind)
            .map(|a| a.selectors.len())
            .sum()
    }

    /// Human-readable listing, one block per action.
    pub fn render(&self) -> String {
        if self.actions.is_empty() {
            return "routing already matches target; nothing to cut\n".into();
        }
        let mut out = String::new();
        for action in &self.actions {
            let _ = writeln!(
                out,
                "{:<8} {}  ({} selector{})",
                action.kind,
                action.facet_address,
                action.selectors.len(),
                if action.selectors.len() == 1 { "" } else { "s" }
            );
            for selector in &action.selectors {
                match self.signature(selector) {
                    Some(sig) => {
                        let _ = writeln!(out, "    {selector}  {sig}");
                    }
                    None => {
                        let _ = writeln!(out, "    {selector}");
                    }
                }
            }
        }
        out
    }
}

/// Compute the cut that brings `live` to the routing implied by `target`.
///
/// Removes come first as a single action on the zero address, in live
/// enumeration order. Adds and Replaces follow, grouped per (kind, facet) in
/// order of first appearance in the target, each keeping target declaration
/// order.
pub fn plan_cut(
    live: &RoutingSnapshot,
    target: &[FacetDescriptor],
    opts: &PlannerOptions,
) -> Result<CutPlan, CutError> {
    let immutable = |facet: Address| opts.immutable_owner == Some(facet);

    if target.is_empty() && !opts.allow_teardown {
        let live_selectors = live.iter().filter(|(_, facet)| !immutable(*facet)).count();
        if live_selectors > 0 {
            return Err(CutError::EmptyTarget { live_selectors });
        }
    }

    // Ownership of every target selector; collisions fail before anything
    // is planned.
    let mut owners: IndexMap<Selector, usize> = IndexMap::new();
    let mut addresses = Vec::with_capacity(target.len());
    for (idx, facet) in target.iter().enumerate() {
        let address = match facet.address {
            Some(address) if !address.is_zero() => address,
            _ => return Err(CutError::UndeployedFacet(facet.name.clone())),
        };
        addresses.push(address);
        for selector in &facet.selectors {
            if let Some(first) = owners.insert(*selector, idx) {
                return Err(CutError::SelectorCollision {
                    selector: *selector,
                    signature: target[first].label(selector),
                    first: target[first].name.clone(),
                    second: facet.name.clone(),
                });
            }
        }
    }

    let mut groups: IndexMap<(CutKind, Address), Vec<Selector>> = IndexMap::new();
    let mut expected = RoutingSnapshot::new();
    let mut signatures = IndexMap::new();
    for (selector, idx) in &owners {
        let facet = &target[*idx];
        let address = addresses[*idx];
        if let Some(sig) = facet.signatures.get(selector) {
            signatures.insert(*selector, sig.clone());
        }
        expected.insert(*selector, address);
        match live.get(selector) {
            None => groups.entry((CutKind::Add, address)).or_default().push(*selector),
            Some(current) if current == address => {}
            Some(current) if immutable(current) => {
                return Err(CutError::ImmutableSelector {
                    selector: *selector,
                    signature: facet.label(selector),
                    facet: facet.name.clone(),
                });
            }
            Some(_) => groups
                .entry((CutKind::Replace, address))
                .or_default()
                .push(*selector),
        }
    }

    let mut removals = Vec::new();
    for (selector, facet) in live.iter() {
        if owners.contains_key(&selector) {
            continue;
        }
        if immutable(facet) {
            tracing::warn!(%selector, "keeping immutable selector");
            expected.insert(selector, facet);
            continue;
        }
        removals.push(selector);
    }

    let mut actions = Vec::with_capacity(groups.len() + 1);
    if !removals.is_empty() {
        actions.push(CutAction {
            kind: CutKind::Remove,
            facet_address: Address::ZERO,
            selectors: removals,
        });
    }
    actions.extend(groups.into_iter().map(|((kind, facet_address), selectors)| CutAction {
        kind,
        facet_address,
        selectors,
    }));

    for action in &actions {
        tracing::debug!(
            kind = %action.kind,
            facet = %action.facet_address,
            selectors = action.selectors.len(),
            "planned cut action"
        );
    }
    let plan = CutPlan {
        actions,
        expected,
        signatures,
    };
    tracing::info!(
        add = plan.count(CutKind::Add),
        replace = plan.count(CutKind::Replace),
        remove = plan.count(CutKind::Remove),
        "cut plan computed"
    );
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(last: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[19] = last;
        Address::new(bytes)
    }

    fn sel(n: u8) -> Selector {
        Selector::new([0xab, 0, 0, n])
    }

    fn facet(name: &str, address: u8, selectors: &[u8]) -> FacetDescriptor {
        FacetDescriptor::new(name, Some(addr(address)), selectors.iter().map(|n| sel(*n)))
    }

    fn live(entries: &[(u8, u8)]) -> RoutingSnapshot {
        entries.iter().map(|(s, a)| (sel(*s), addr(*a))).collect()
    }

    const X: u8 = 0x0a;
    const Y: u8 = 0x0b;

    #[test]
    fn replace_then_add_for_moved_facet() {
        let plan = plan_cut(&live(&[(1, X)]), &[facet("FacetY", Y, &[1, 2])], &PlannerOptions::default())
            .unwrap();
        assert_eq!(
            plan.actions,
            vec![
                CutAction {
                    kind: CutKind::Replace,
                    facet_address: addr(Y),
                    selectors: vec![sel(1)],
                },
                CutAction {
                    kind: CutKind::Add,
                    facet_address: addr(Y),
                    selectors: vec![sel(2)],
                },
            ]
        );
    }

    #[test]
    fn teardown_removes_everything_on_zero_address() {
        let opts = PlannerOptions {
            allow_teardown: true,
            ..Default::default()
        };
        let plan = plan_cut(&live(&[(1, X), (2, X)]), &[], &opts).unwrap();
        assert_eq!(
            plan.actions,
            vec![CutAction {
                kind: CutKind::Remove,
                facet_address: Address::ZERO,
                selectors: vec![sel(1), sel(2)],
            }]
        );
        assert!(plan.expected.is_empty());
    }

    #[test]
    fn empty_target_without_override_is_refused() {
        let err = plan_cut(&live(&[(1, X)]), &[], &PlannerOptions::default()).unwrap_err();
        assert!(matches!(err, CutError::EmptyTarget { live_selectors: 1 }));
        // Nothing live: an empty target is simply a no-op.
        let plan = plan_cut(&RoutingSnapshot::new(), &[], &PlannerOptions::default()).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn collision_is_fatal_and_names_both_facets() {
        let err = plan_cut(
            &RoutingSnapshot::new(),
            &[facet("A", 1, &[1, 2]), facet("B", 2, &[3, 2])],
            &PlannerOptions::default(),
        )
        .unwrap_err();
        match err {
            CutError::SelectorCollision {
                selector,
                first,
                second,
                ..
            } => {
                assert_eq!(selector, sel(2));
                assert_eq!(first, "A");
                assert_eq!(second, "B");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn removes_precede_adds_and_replaces() {
        let plan = plan_cut(
            &live(&[(1, X), (2, X), (3, Y)]),
            &[facet("New", 0x0c, &[4, 1]), facet("Y", Y, &[3])],
            &PlannerOptions::default(),
        )
        .unwrap();
        let kinds: Vec<CutKind> = plan.actions.iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![CutKind::Remove, CutKind::Add, CutKind::Replace]);
        assert_eq!(plan.actions[0].selectors, vec![sel(2)]);
        assert_eq!(plan.actions[1].selectors, vec![sel(4)]);
        assert_eq!(plan.actions[2].selectors, vec![sel(1)]);
    }

    #[test]
    fn selectors_are_grouped_per_kind_and_facet() {
        let plan = plan_cut(
            &live(&[(1, X), (3, X)]),
            &[facet("Y", Y, &[1, 2, 3, 4])],
            &PlannerOptions::default(),
        )
        .unwrap();
        assert_eq!(plan.actions.len(), 2);
        assert_eq!(plan.actions[0].kind, CutKind::Replace);
        assert_eq!(plan.actions[0].selectors, vec![sel(1), sel(3)]);
        assert_eq!(plan.actions[1].kind, CutKind::Add);
        assert_eq!(plan.actions[1].selectors, vec![sel(2), sel(4)]);
    }

    #[test]
    fn applying_the_plan_reaches_the_target_and_replanning_is_empty() {
        let cases: Vec<(RoutingSnapshot, Vec<FacetDescriptor>)> = vec![
            (RoutingSnapshot::new(), vec![facet("A", 1, &[1, 2])]),
            (live(&[(1, 1), (2, 1)]), vec![facet("A", 1, &[1, 2])]),
            (live(&[(1, 1), (2, 1), (5, 3)]), vec![facet("A", 2, &[2, 3]), facet("B", 3, &[1])]),
            (live(&[(9, 4)]), vec![facet("C", 5, &[7]), facet("D", 6, &[8, 9])]),
        ];
        for (live, target) in cases {
            let plan = plan_cut(&live, &target, &PlannerOptions::default()).unwrap();
            let after = live.apply(&plan.actions);
            assert_eq!(after, plan.expected);
            for facet in &target {
                for selector in &facet.selectors {
                    assert_eq!(after.get(selector), facet.address);
                }
            }
            let again = plan_cut(&after, &target, &PlannerOptions::default()).unwrap();
            assert!(again.is_empty(), "second plan should be empty: {:?}", again.actions);
        }
    }

    #[test]
    fn immutable_selectors_are_kept_and_protected() {
        let diamond = 0xdd;
        let opts = PlannerOptions {
            allow_teardown: false,
            immutable_owner: Some(addr(diamond)),
        };
        let routing = live(&[(1, diamond), (2, X)]);
        let plan = plan_cut(&routing, &[facet("Y", Y, &[3])], &opts).unwrap();
        assert_eq!(plan.actions[0].selectors, vec![sel(2)]);
        assert_eq!(plan.expected.get(&sel(1)), Some(addr(diamond)));

        let err = plan_cut(&routing, &[facet("Y", Y, &[1])], &opts).unwrap_err();
        assert!(matches!(err, CutError::ImmutableSelector { .. }));

        // Only immutable selectors live: an empty target is not a teardown.
        let only_immutable = live(&[(1, diamond)]);
        assert!(plan_cut(&only_immutable, &[], &opts).unwrap().is_empty());
    }

    #[test]
    fn undeployed_facet_is_rejected() {
        let pending = FacetDescriptor::new("Pending", None, [sel(1)]);
        let err = plan_cut(&RoutingSnapshot::new(), &[pending], &PlannerOptions::default()).unwrap_err();
        assert!(matches!(err, CutError::UndeployedFacet(name) if name == "Pending"));
    }

    #[test]
    fn render_lists_signatures_when_known() {
        let mut descriptor = facet("Y", Y, &[]);
        let transfer = Selector::of_signature("transfer(address,uint256)");
        descriptor.selectors.insert(transfer);
        descriptor.signatures.insert(transfer, "transfer(address,uint256)".into());
        let plan = plan_cut(&RoutingSnapshot::new(), &[descriptor], &PlannerOptions::default()).unwrap();
        let text = plan.render();
        assert!(text.starts_with("add"));
        assert!(text.contains("0xa9059cbb  transfer(address,uint256)"));
    }
}
