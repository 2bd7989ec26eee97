//! # Application State
//!
//! Typed, shared resources handed to every request, most commonly the
//! [`Database`](crate::Database) handle.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Thread-safe container keyed by type
///
/// Clones share storage.
///
/// ```ignore
/// let state = AppState::new();
/// state.insert(db.clone());
/// let db = state.get::<Database>().expect("database configured");
/// ```
#[derive(Clone, Default)]
pub struct AppState {
    data: Arc<RwLock<HashMap<TypeId, Box<dyn Any + Send + Sync>>>>,
}

impl AppState {
    /// Create a new empty state container
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value by its type, replacing any previous one
    pub fn insert<T: Send + Sync + 'static>(&self, value: T) {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        data.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Get a cloned value by type
    #[must_use]
    pub fn get<T: Clone + Send + Sync + 'static>(&self) -> Option<T> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        data.get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<T>())
            .cloned()
    }

    /// Check if a type exists
    #[must_use]
    pub fn contains<T: 'static>(&self) -> bool {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        data.contains_key(&TypeId::of::<T>())
    }

    /// Number of stored values
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("entries", &self.len())
            .finish()
    }
}
