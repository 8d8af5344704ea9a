//! Per-Identifier Concurrency Guard
//!
//! Every map operation this process issues against the store runs under a
//! reader/writer lock, so a multi-step protocol section (prior-value read
//! plus write, token pop plus length check) is never interleaved with
//! another local operation on the same identifier. Read-only operations
//! share the lock; mutating operations hold it exclusively.
//!
//! The locks are process-wide and keyed by identifier: every handle on
//! the same identifier in this process shares one lock, while unrelated
//! identifiers proceed independently. Cross-process exclusion is *not*
//! provided here; across processes only the atomicity of individual store
//! primitives holds.
//!
//! Registry entries are weak. Once the last local handle for an
//! identifier drops, its entry becomes dead and is purged the next time
//! the registry misses, so long-lived processes churning through random
//! identifiers do not accumulate locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, RwLock, Weak};

/// The lock shared by all local handles on one identifier.
pub(crate) type Guard = Arc<RwLock<()>>;

type Registry = Mutex<HashMap<String, Weak<RwLock<()>>>>;

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Returns the process-wide guard for `identifier`, creating it if no
/// live handle currently holds one.
pub(crate) fn guard_for(identifier: &str) -> Guard {
    let mut registry = registry().lock().unwrap();

    if let Some(existing) = registry.get(identifier).and_then(Weak::upgrade) {
        return existing;
    }

    // Miss: drop entries whose handles are all gone, then insert fresh
    registry.retain(|_, weak| weak.strong_count() > 0);

    let fresh: Guard = Arc::new(RwLock::new(()));
    registry.insert(identifier.to_string(), Arc::downgrade(&fresh));
    fresh
}
