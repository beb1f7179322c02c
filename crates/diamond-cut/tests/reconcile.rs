use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use diamond_abi::{AbiEntry, AbiParam, Address, ExclusionList, InterfaceDescription, Selector};
use diamond_cut::{
    AggregateFilter, ApplyOptions, CutError, CutKind, InitializerSpec, MemArtifacts, MemProxy, Phase,
    ReconcileConfig, Reconciler,
};

const PROXY: u8 = 0xdd;
const CUT_FACET: u8 = 0xc1;
const LOUPE_FACET: u8 = 0xc2;
const TOKEN_V1: u8 = 0xa1;
const TOKEN_V2: u8 = 0xa2;
const INIT: u8 = 0x1e;

fn addr(last: u8) -> Address {
    let mut bytes = [0u8; 20];
    bytes[19] = last;
    Address::new(bytes)
}

fn sel(sig: &str) -> Selector {
    Selector::of_signature(sig)
}

fn func(name: &str, types: &[&str]) -> AbiEntry {
    AbiEntry::function(
        name,
        types
            .iter()
            .enumerate()
            .map(|(i, ty)| AbiParam::new(format!("arg{i}"), *ty))
            .collect(),
    )
}

fn artifacts() -> MemArtifacts {
    MemArtifacts::new()
        .with(
            InterfaceDescription::new(
                "DiamondCutFacet",
                vec![AbiEntry::function(
                    "diamondCut",
                    vec![
                        AbiParam::tuple(
                            "_diamondCut",
                            "tuple[]",
                            vec![
                                AbiParam::new("facetAddress", "address"),
                                AbiParam::new("action", "uint8"),
                                AbiParam::new("functionSelectors", "bytes4[]"),
                            ],
                        ),
                        AbiParam::new("_init", "address"),
                        AbiParam::new("_calldata", "bytes"),
                    ],
                )],
            )
            .with_address(addr(CUT_FACET)),
        )
        .with(
            InterfaceDescription::new(
                "DiamondLoupeFacet",
                vec![
                    func("facets", &[]),
                    func("facetAddress", &["bytes4"]),
                    func("supportsInterface", &["bytes4"]),
                ],
            )
            .with_address(addr(LOUPE_FACET)),
        )
        .with(
            InterfaceDescription::new(
                "TokenFacet",
                vec![
                    func("initialize", &[]),
                    func("initialize", &["uint256"]),
                    func("transfer", &["address", "uint256"]),
                    func("balanceOf", &["address"]),
                ],
            )
            .with_address(addr(TOKEN_V1)),
        )
        .with(
            InterfaceDescription::new(
                "TokenFacetV2",
                vec![
                    func("transfer", &["address", "uint256"]),
                    func("balanceOf", &["address"]),
                    func("burn", &["uint256"]),
                ],
            )
            .with_address(addr(TOKEN_V2)),
        )
        .with(
            InterfaceDescription::new("Clashing", vec![func("balanceOf", &["address"])])
                .with_address(addr(0xee)),
        )
}

fn config() -> ReconcileConfig {
    ReconcileConfig {
        exclusions: ExclusionList::new(["initialize"]).unwrap(),
        ..ReconcileConfig::default()
    }
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn reconciler(proxy: &Arc<MemProxy>, config: ReconcileConfig) -> Reconciler<Arc<MemProxy>, MemArtifacts> {
    Reconciler::new(proxy.clone(), artifacts(), config)
}

#[tokio::test]
async fn fresh_proxy_converges_and_rerun_is_a_no_op() {
    let proxy = Arc::new(MemProxy::new(addr(PROXY)));
    let rec = reconciler(&proxy, config());
    let target = names(&["DiamondCutFacet", "DiamondLoupeFacet", "TokenFacet"]);

    let first = rec.reconcile(&target, None).await.unwrap();
    assert!(!first.skipped);
    assert!(first.applied.iter().all(|a| a.kind == CutKind::Add));
    assert_eq!(first.applied.len(), 3);
    assert!(first.tx.is_some());

    // `initialize()` is excluded; the overload stays routable.
    assert_eq!(proxy.owner(&sel("initialize()")), None);
    assert_eq!(proxy.owner(&sel("initialize(uint256)")), Some(addr(TOKEN_V1)));
    assert_eq!(
        proxy.owner(&sel("diamondCut((address,uint8,bytes4[])[],address,bytes)")),
        Some(addr(CUT_FACET))
    );

    let second = rec.reconcile(&target, None).await.unwrap();
    assert!(second.skipped);
    assert!(second.applied.is_empty());
    assert_eq!(proxy.cut_count(), 1);
}

#[tokio::test]
async fn upgrade_replaces_adds_and_removes_in_one_cut() {
    let proxy = Arc::new(MemProxy::new(addr(PROXY)));
    let rec = reconciler(&proxy, config());
    rec.reconcile(&names(&["DiamondLoupeFacet", "TokenFacet"]), None)
        .await
        .unwrap();

    let result = rec
        .reconcile(&names(&["DiamondLoupeFacet", "TokenFacetV2"]), None)
        .await
        .unwrap();
    let kinds: Vec<_> = result.applied.iter().map(|a| a.kind).collect();
    assert_eq!(kinds, vec![CutKind::Remove, CutKind::Replace, CutKind::Add]);
    assert_eq!(result.applied[0].selectors, vec![sel("initialize(uint256)")]);
    assert_eq!(
        result.applied[1].selectors,
        vec![sel("transfer(address,uint256)"), sel("balanceOf(address)")]
    );
    assert_eq!(result.applied[2].selectors, vec![sel("burn(uint256)")]);
    assert_eq!(proxy.cut_count(), 2);
    assert_eq!(proxy.owner(&sel("burn(uint256)")), Some(addr(TOKEN_V2)));
}

#[tokio::test]
async fn deployment_addresses_override_artifacts() {
    let proxy = Arc::new(MemProxy::new(addr(PROXY)));
    let mut cfg = config();
    cfg.deployments.insert("TokenFacetV2".into(), addr(0xb2));
    let rec = reconciler(&proxy, cfg);
    rec.reconcile(&names(&["TokenFacetV2"]), None).await.unwrap();
    assert_eq!(proxy.owner(&sel("burn(uint256)")), Some(addr(0xb2)));
}

#[tokio::test]
async fn initializer_runs_in_the_cut_transaction() {
    let proxy = Arc::new(MemProxy::new(addr(PROXY)));
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    proxy.register_initializer(addr(INIT), move |data| {
        seen.fetch_add(1, Ordering::SeqCst);
        if data.len() == 36 {
            Ok(())
        } else {
            Err("DiamondInit: bad arguments".into())
        }
    });
    let rec = reconciler(&proxy, config());
    let target = names(&["TokenFacet"]);

    let bad = InitializerSpec::from_signature(addr(INIT), "init(uint256)", vec![]).unwrap();
    let err = rec.reconcile(&target, Some(&bad)).await.unwrap_err();
    assert!(matches!(err, CutError::Proxy(_)));
    assert!(proxy.routing().is_empty(), "reverted initializer must roll back the cut");

    let good = InitializerSpec::from_signature(addr(INIT), "init(uint256)", vec![0u8; 32]).unwrap();
    let result = rec.reconcile(&target, Some(&good)).await.unwrap();
    assert!(!result.skipped);
    assert_eq!(proxy.init_calls().len(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    // Converged: the initializer is not run again.
    let again = rec.reconcile(&target, Some(&good)).await.unwrap();
    assert!(again.skipped);
    assert_eq!(proxy.init_calls().len(), 1);
}

#[tokio::test]
async fn timed_out_run_resolves_on_rerun() {
    let proxy = Arc::new(MemProxy::new(addr(PROXY)).with_confirmation_delay(Duration::from_millis(300)));
    let cfg = ReconcileConfig {
        apply: ApplyOptions {
            timeout: Duration::from_millis(30),
            verify: true,
        },
        ..config()
    };
    let rec = reconciler(&proxy, cfg);
    let target = names(&["DiamondLoupeFacet"]);

    let err = rec.reconcile(&target, None).await.unwrap_err();
    assert!(matches!(
        err,
        CutError::ConfirmationTimeout {
            phase: Phase::Confirmation,
            ..
        }
    ));
    assert!(err.is_retryable());

    // The cut landed after all; the re-run reads it back and has nothing to do.
    let rerun = rec.reconcile(&target, None).await.unwrap();
    assert!(rerun.skipped);
    assert_eq!(proxy.cut_count(), 1);
}

#[tokio::test]
async fn concurrent_mutation_is_reported_as_mismatch() {
    let proxy = Arc::new(MemProxy::new(addr(PROXY)));
    proxy.after_next_cut(|table| table.route(Selector::of_signature("rogue()"), Address::new([9u8; 20])));
    let rec = reconciler(&proxy, config());

    match rec.reconcile(&names(&["DiamondLoupeFacet"]), None).await {
        Err(CutError::ReconciliationMismatch {
            missing,
            unexpected,
            misrouted,
        }) => {
            assert!(missing.is_empty());
            assert!(misrouted.is_empty());
            assert_eq!(unexpected, vec![(sel("rogue()"), Address::new([9u8; 20]))]);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn collision_and_unknown_facet_abort_before_any_cut() {
    let proxy = Arc::new(MemProxy::new(addr(PROXY)));
    let rec = reconciler(&proxy, config());

    let err = rec
        .reconcile(&names(&["TokenFacet", "Clashing"]), None)
        .await
        .unwrap_err();
    match err {
        CutError::SelectorCollision {
            signature,
            first,
            second,
            ..
        } => {
            assert_eq!(signature, "balanceOf(address)");
            assert_eq!(first, "TokenFacet");
            assert_eq!(second, "Clashing");
        }
        other => panic!("unexpected {other:?}"),
    }

    let err = rec.reconcile(&names(&["Nope"]), None).await.unwrap_err();
    assert!(matches!(err, CutError::UnknownFacet(name) if name == "Nope"));
    assert_eq!(proxy.cut_count(), 0);
}

#[tokio::test]
async fn empty_target_requires_teardown() {
    let proxy = Arc::new(MemProxy::new(addr(PROXY)));
    reconciler(&proxy, config())
        .reconcile(&names(&["DiamondLoupeFacet"]), None)
        .await
        .unwrap();

    let err = reconciler(&proxy, config()).reconcile(&[], None).await.unwrap_err();
    assert!(matches!(err, CutError::EmptyTarget { live_selectors: 3 }));

    let teardown = ReconcileConfig {
        allow_teardown: true,
        ..config()
    };
    let result = reconciler(&proxy, teardown).reconcile(&[], None).await.unwrap();
    assert_eq!(result.applied.len(), 1);
    assert_eq!(result.applied[0].kind, CutKind::Remove);
    assert!(proxy.routing().is_empty());
}

#[tokio::test]
async fn immutable_selectors_survive_reconciliation() {
    let proxy = Arc::new(MemProxy::new(addr(PROXY)));
    proxy.seed(addr(PROXY), [sel("diamondCut((address,uint8,bytes4[])[],address,bytes)")]);
    let rec = reconciler(&proxy, config());

    let result = rec.reconcile(&names(&["DiamondLoupeFacet"]), None).await.unwrap();
    assert!(result.applied.iter().all(|a| a.kind == CutKind::Add));
    assert_eq!(
        proxy.owner(&sel("diamondCut((address,uint8,bytes4[])[],address,bytes)")),
        Some(addr(PROXY))
    );

    let err = rec.reconcile(&names(&["DiamondCutFacet"]), None).await.unwrap_err();
    assert!(matches!(err, CutError::ImmutableSelector { .. }));
}

#[tokio::test]
async fn dry_run_plan_submits_nothing() {
    let proxy = Arc::new(MemProxy::new(addr(PROXY)));
    let rec = reconciler(&proxy, config());
    let plan = rec.plan(&names(&["TokenFacet"])).await.unwrap();
    assert_eq!(plan.count(CutKind::Add), 3);
    assert!(plan.render().contains("transfer(address,uint256)"));
    assert_eq!(proxy.cut_count(), 0);
}

#[tokio::test]
async fn aggregate_interface_keeps_first_definition() {
    let proxy = Arc::new(MemProxy::new(addr(PROXY)));
    let rec = reconciler(&proxy, config());

    let result = rec
        .aggregate_interface(&names(&["TokenFacet", "TokenFacetV2"]), &AggregateFilter::default())
        .unwrap();
    let transfer: Vec<_> = result.kept.iter().filter(|e| e.name == "transfer").collect();
    assert_eq!(transfer.len(), 1);
    assert_eq!(transfer[0].source_facet, "TokenFacet");
    assert!(result.shadowed.iter().any(|e| e.name == "balanceOf" && e.source_facet == "TokenFacetV2"));
    assert!(result.kept.iter().any(|e| e.name == "burn"));

    let flipped = rec
        .aggregate_interface(&names(&["TokenFacetV2", "TokenFacet"]), &AggregateFilter::default())
        .unwrap();
    let transfer = flipped.kept.iter().find(|e| e.name == "transfer").unwrap();
    assert_eq!(transfer.source_facet, "TokenFacetV2");
}
