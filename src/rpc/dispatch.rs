use std::{collections::HashMap, fmt, sync::Arc};

use crate::rpc::message::Handler;

/// Registry of method name to handler.
///
/// Populated before the server starts, then shared read-only behind an `Arc`.
#[derive(Clone, Default)]
pub struct DispatchTable {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the handler for `method`, returning the replaced one.
    pub fn register(
        &mut self,
        method: impl Into<String>,
        handler: impl Handler,
    ) -> Option<Arc<dyn Handler>> {
        self.handlers.insert(method.into(), Arc::new(handler))
    }

    pub fn resolve(&self, method: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(method).cloned()
    }

    pub fn methods(&self) -> Vec<&str> {
        let mut methods: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        methods.sort_unstable();
        methods
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTable")
            .field("methods", &self.methods())
            .finish()
    }
}
