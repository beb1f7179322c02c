use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use diamond_abi::codec::{CutAction, CutKind, LoupeFacet};
use diamond_abi::{Address, Selector};
use indexmap::{IndexMap, IndexSet};

use super::{DiamondProxy, ProxyError, TxHandle, TxReceipt};
use crate::facet::InitializerSpec;

type InitHook = Arc<dyn Fn(&[u8]) -> Result<(), String> + Send + Sync>;
type CutHook = Box<dyn FnOnce(&mut RoutingTable) + Send>;

/// Selector routing of an in-memory diamond, enumerated in facet insertion
/// order like the reference loupe.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    facets: IndexMap<Address, IndexSet<Selector>>,
    routes: HashMap<Selector, Address>,
}

impl RoutingTable {
    pub fn owner(&self, selector: &Selector) -> Option<Address> {
        self.routes.get(selector).copied()
    }

    /// Route a selector, detaching it from any previous facet.
    pub fn route(&mut self, selector: Selector, facet: Address) {
        self.unroute(selector);
        self.facets.entry(facet).or_default().insert(selector);
        self.routes.insert(selector, facet);
    }

    pub fn unroute(&mut self, selector: Selector) -> Option<Address> {
        let previous = self.routes.remove(&selector)?;
        if let Some(selectors) = self.facets.get_mut(&previous) {
            selectors.shift_remove(&selector);
            if selectors.is_empty() {
                self.facets.shift_remove(&previous);
            }
        }
        Some(previous)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn loupe(&self) -> Vec<LoupeFacet> {
        self.facets
            .iter()
            .map(|(address, selectors)| LoupeFacet {
                address: *address,
                selectors: selectors.iter().copied().collect(),
            })
            .collect()
    }

    /// Apply one action with the reference `diamondCut` rules.
    pub fn apply(&mut self, diamond: Address, action: &CutAction) -> Result<(), String> {
        if action.selectors.is_empty() {
            return Err("LibDiamondCut: No selectors in facet to cut".into());
        }
        let facet = action.facet_address;
        match action.kind {
            CutKind::Add => {
                if facet.is_zero() {
                    return Err("LibDiamondCut: Add facet can't be address(0)".into());
                }
                for selector in &action.selectors {
                    if self.routes.contains_key(selector) {
                        return Err(format!(
                            "LibDiamondCut: Can't add function that already exists ({selector})"
                        ));
                    }
                    self.route(*selector, facet);
                }
            }
            CutKind::Replace => {
                if facet.is_zero() {
                    return Err("LibDiamondCut: Replace facet can't be address(0)".into());
                }
                for selector in &action.selectors {
                    match self.owner(selector) {
                        None => {
                            return Err(format!(
                                "LibDiamondCut: Can't replace function that doesn't exist ({selector})"
                            ));
                        }
                        Some(old) if old == diamond => {
                            return Err(format!(
                                "LibDiamondCut: Can't replace immutable function ({selector})"
                            ));
                        }
                        Some(old) if old == facet => {
                            return Err(format!(
                                "LibDiamondCut: Can't replace function with same function ({selector})"
                            ));
                        }
                        Some(_) => self.route(*selector, facet),
                    }
                }
            }
            CutKind::Remove => {
                if !facet.is_zero() {
                    return Err("LibDiamondCut: Remove facet address must be address(0)".into());
                }
                for selector in &action.selectors {
                    match self.owner(selector) {
                        None => {
                            return Err(format!(
                                "LibDiamondCut: Can't remove function that doesn't exist ({selector})"
                            ));
                        }
                        Some(old) if old == diamond => {
                            return Err(format!(
                                "LibDiamondCut: Can't remove immutable function ({selector})"
                            ));
                        }
                        Some(_) => {
                            self.unroute(*selector);
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Default)]
struct MemState {
    table: RoutingTable,
    initializers: HashMap<Address, InitHook>,
    after_next_cut: Option<CutHook>,
    receipts: HashMap<TxHandle, TxReceipt>,
    init_calls: Vec<(Address, Vec<u8>)>,
    block: u64,
}

/// In-memory diamond proxy enforcing the reference cut rules with
/// all-or-nothing application.
#[derive(Clone)]
pub struct MemProxy {
    address: Address,
    state: Arc<Mutex<MemState>>,
    confirmation_delay: Option<Duration>,
}

impl std::fmt::Debug for MemProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().unwrap();
        f.debug_struct("MemProxy")
            .field("address", &self.address)
            .field("routes", &state.table.len())
            .field("block", &state.block)
            .finish()
    }
}

impl MemProxy {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            state: Arc::new(Mutex::new(MemState::default())),
            confirmation_delay: None,
        }
    }

    /// Delay every confirmation; the cut itself lands at submission.
    pub fn with_confirmation_delay(mut self, delay: Duration) -> Self {
        self.confirmation_delay = Some(delay);
        self
    }

    /// Install routes directly, as a constructor would.
    pub fn seed(&self, facet: Address, selectors: impl IntoIterator<Item = Selector>) {
        let mut state = self.state.lock().unwrap();
        for selector in selectors {
            state.table.route(selector, facet);
        }
    }

    /// Register code at `address` that accepts initializer calls.
    pub fn register_initializer<F>(&self, address: Address, hook: F)
    where
        F: Fn(&[u8]) -> Result<(), String> + Send + Sync + 'static,
    {
        self.state
            .lock()
            .unwrap()
            .initializers
            .insert(address, Arc::new(hook));
    }

    /// Mutate the routing right after the next successful cut, standing in
    /// for a concurrent actor or a non-conformant proxy.
    pub fn after_next_cut<F>(&self, hook: F)
    where
        F: FnOnce(&mut RoutingTable) + Send + 'static,
    {
        self.state.lock().unwrap().after_next_cut = Some(Box::new(hook));
    }

    pub fn routing(&self) -> RoutingTable {
        self.state.lock().unwrap().table.clone()
    }

    pub fn owner(&self, selector: &Selector) -> Option<Address> {
        self.state.lock().unwrap().table.owner(selector)
    }

    /// Initializer calls executed so far, in order.
    pub fn init_calls(&self) -> Vec<(Address, Vec<u8>)> {
        self.state.lock().unwrap().init_calls.clone()
    }

    /// Number of cut transactions that were accepted.
    pub fn cut_count(&self) -> u64 {
        self.state.lock().unwrap().block
    }
}

#[async_trait]
impl DiamondProxy for MemProxy {
    fn address(&self) -> Address {
        self.address
    }

    async fn facets(&self) -> Result<Vec<LoupeFacet>, ProxyError> {
        Ok(self.state.lock().unwrap().table.loupe())
    }

    async fn submit_cut(
        &self,
        actions: &[CutAction],
        init: Option<&InitializerSpec>,
    ) -> Result<TxHandle, ProxyError> {
        let mut state = self.state.lock().unwrap();
        let tx = TxHandle(format!("0x{:064x}", state.block + 1));

        let mut next = state.table.clone();
        for action in actions {
            next.apply(self.address, action).map_err(|reason| ProxyError::Reverted {
                tx: tx.0.clone(),
                reason: Some(reason),
            })?;
        }
        if let Some(init) = init {
            let hook = state.initializers.get(&init.target_address).cloned().ok_or_else(|| {
                ProxyError::Reverted {
                    tx: tx.0.clone(),
                    reason: Some("LibDiamondCut: _init address has no code".into()),
                }
            })?;
            hook(&init.calldata()).map_err(|reason| ProxyError::Reverted {
                tx: tx.0.clone(),
                reason: Some(reason),
            })?;
            state.init_calls.push((init.target_address, init.calldata()));
        }

        state.table = next;
        if let Some(hook) = state.after_next_cut.take() {
            hook(&mut state.table);
        }
        state.block += 1;
        let receipt = TxReceipt {
            tx: tx.clone(),
            block_number: Some(state.block),
            gas_used: None,
        };
        state.receipts.insert(tx.clone(), receipt);
        Ok(tx)
    }

    async fn wait_confirmed(&self, tx: &TxHandle) -> Result<TxReceipt, ProxyError> {
        if let Some(delay) = self.confirmation_delay {
            tokio::time::sleep(delay).await;
        }
        self.state
            .lock()
            .unwrap()
            .receipts
            .get(tx)
            .cloned()
            .ok_or_else(|| ProxyError::Rpc {
                code: -32000,
                message: format!("unknown transaction {tx}"),
            })
    }
}
