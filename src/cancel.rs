//! Cooperative cancellation (component C8, second layer): tower-lsp
//! already aborts the tokio task backing a request on `$/cancelRequest`,
//! but a long-running AST walk holding no `.await` points inside its loop
//! body would never yield control back to the runtime for that abort to
//! land on. This registry lets such a loop poll a flag between iterations
//! instead.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tower_lsp::jsonrpc::Id as RequestId;

#[derive(Default)]
pub struct CancellationRegistry {
    flags: DashMap<RequestId, Arc<AtomicBool>>,
}

/// RAII handle returned by [`CancellationRegistry::register`]; removes the
/// flag from the registry on drop so a completed or cancelled request
/// never lingers in the map.
pub struct CancellationGuard<'a> {
    registry: &'a CancellationRegistry,
    id: RequestId,
    pub flag: Arc<AtomicBool>,
}

impl Drop for CancellationGuard<'_> {
    fn drop(&mut self) {
        self.registry.flags.remove(&self.id);
    }
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: RequestId) -> CancellationGuard<'_> {
        let flag = Arc::new(AtomicBool::new(false));
        self.flags.insert(id.clone(), flag.clone());
        CancellationGuard { registry: self, id, flag }
    }

    /// Called from the `$/cancelRequest` notification handler.
    pub fn cancel(&self, id: &RequestId) {
        if let Some(flag) = self.flags.get(id) {
            flag.store(true, Ordering::Release);
        }
    }

    pub fn is_cancelled(flag: &AtomicBool) -> bool {
        flag.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_sets_the_flag_the_guard_exposes() {
        let registry = CancellationRegistry::new();
        let guard = registry.register(RequestId::Number(1));
        assert!(!CancellationRegistry::is_cancelled(&guard.flag));
        registry.cancel(&RequestId::Number(1));
        assert!(CancellationRegistry::is_cancelled(&guard.flag));
    }

    #[test]
    fn dropping_the_guard_removes_it_from_the_registry() {
        let registry = CancellationRegistry::new();
        {
            let _guard = registry.register(RequestId::Number(2));
            assert!(registry.flags.contains_key(&RequestId::Number(2)));
        }
        assert!(!registry.flags.contains_key(&RequestId::Number(2)));
    }

    #[test]
    fn cancelling_an_unregistered_id_is_a_no_op() {
        let registry = CancellationRegistry::new();
        registry.cancel(&RequestId::Number(999));
    }
}
