use crate::coin::CoinRecord;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Default)]
struct SelectionState {
    coin: Option<CoinRecord>,
    generation: u64,
}

/// Shared "currently selected coin" holder. Clones share the same state, so
/// every view that was handed a clone sees the same selection. UI-thread only.
#[derive(Clone, Debug, Default)]
pub struct SelectionContext {
    inner: Rc<RefCell<SelectionState>>,
}

impl SelectionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the selected coin as it was when selected.
    pub fn get(&self) -> Option<CoinRecord> {
        self.inner.borrow().coin.clone()
    }

    /// Last write wins. `None` clears the selection.
    pub fn set(&self, coin: Option<CoinRecord>) {
        let mut state = self.inner.borrow_mut();
        state.coin = coin;
        state.generation += 1;
    }

    /// Bumped on every write; lets readers notice a new selection even when
    /// the same coin id is picked again.
    pub fn generation(&self) -> u64 {
        self.inner.borrow().generation
    }

    pub fn selected_id(&self) -> Option<String> {
        self.inner.borrow().coin.as_ref().map(|c| c.id.clone())
    }
}
