//! Reference Lifecycle Protocol
//!
//! The store itself carries the reference count: next to each hash object
//! lives a list object (`lock#<identifier>`) holding one token per live
//! handle, across every process attached to the identifier. Opening a
//! handle pushes a token; releasing one pops a token and, if the list
//! then reads empty, the releasing handle clears the hash. No external
//! coordination service is involved.
//!
//! The pop and the zero-length check run in separate critical sections.
//! An open landing between the two can observe its freshly referenced
//! hash being cleared; this narrow window is accepted rather than closed,
//! since closing it would need a combined pop-and-length primitive the
//! store does not offer.

use crate::map::guard::Guard;
use crate::store::{Store, StoreError};
use std::sync::Arc;
use tracing::debug;

/// Token pushed onto the reference list for each live handle.
const REF_TOKEN: &str = "ok";

/// Namespace tag deriving the reference list name from the identifier.
const REF_LIST_PREFIX: &str = "lock#";

/// Name of the reference list companion to a hash object.
pub(crate) fn ref_list_key(identifier: &str) -> String {
    format!("{REF_LIST_PREFIX}{identifier}")
}

/// The reference list of one identifier, as seen by one handle.
pub(crate) struct RefList {
    store: Arc<dyn Store>,
    key: String,
    guard: Guard,
}

impl RefList {
    pub(crate) fn new(store: Arc<dyn Store>, identifier: &str, guard: Guard) -> Self {
        Self {
            store,
            key: ref_list_key(identifier),
            guard,
        }
    }

    /// Registers one live handle: pushes one token.
    ///
    /// Every call adds exactly one reference; opening twice yields two.
    pub(crate) fn acquire(&self) -> Result<(), StoreError> {
        let _exclusive = self.guard.write().unwrap();
        self.store.list_push(&self.key, REF_TOKEN)?;
        debug!(list = %self.key, "reference acquired");
        Ok(())
    }

    /// Deregisters one handle: pops one token, then reads the length
    /// under a separate shared section.
    ///
    /// # Returns
    ///
    /// Returns `true` if this call observed the count reach zero; the
    /// caller then performs the cooperative clear of the hash object.
    pub(crate) fn release(&self) -> Result<bool, StoreError> {
        {
            let _exclusive = self.guard.write().unwrap();
            self.store.list_pop(&self.key)?;
        }

        let remaining = {
            let _shared = self.guard.read().unwrap();
            self.store.list_len(&self.key)?
        };
        debug!(list = %self.key, remaining, "reference released");
        Ok(remaining == 0)
    }
}
