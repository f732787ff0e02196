//! Subscription registry and event dispatch.

use crate::detect::ChangeEvent;
use entwatch_source::EntityId;
use parking_lot::RwLock;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{trace, warn};

/// Opaque identifier for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(pub u64);

impl SubscriptionId {
    /// Creates a subscription ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub:{}", self.0)
    }
}

/// Produces unique subscription ids.
pub trait IdGenerator: Send + Sync {
    /// Returns a fresh, never-before-returned id.
    fn next_id(&self) -> SubscriptionId;
}

/// Monotonic counter id generator; ids start at 1.
#[derive(Debug, Default)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl SequentialIds {
    /// Creates a generator starting at id 1.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> SubscriptionId {
        SubscriptionId::new(self.next.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

/// Callback invoked with each matching change event.
pub type ChangeCallback = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

struct Subscription {
    id: SubscriptionId,
    entity_type: String,
    entity_id: Option<EntityId>,
    callback: ChangeCallback,
}

impl Subscription {
    fn matches(&self, event: &ChangeEvent) -> bool {
        self.entity_type == event.entity_type
            && self.entity_id.map_or(true, |id| id == event.entity_id)
    }
}

/// Holds active subscriber registrations.
///
/// The registry tolerates `subscribe`/`unsubscribe` arriving while a
/// dispatch is iterating it; matching subscriptions are copied out
/// under the lock before any callback runs, so a callback may itself
/// unsubscribe without deadlocking.
#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: RwLock<Vec<Subscription>>,
    ids: SequentialIds,
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback for events of `entity_type`.
    ///
    /// A `Some(entity_id)` filter restricts delivery to that single
    /// entity; `None` receives every event of the type. Returns
    /// immediately; no I/O is performed.
    pub fn subscribe<F>(
        &self,
        entity_type: impl Into<String>,
        entity_id: Option<EntityId>,
        callback: F,
    ) -> SubscriptionId
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        let id = self.ids.next_id();
        self.entries.write().push(Subscription {
            id,
            entity_type: entity_type.into(),
            entity_id,
            callback: Arc::new(callback),
        });
        id
    }

    /// Removes a registration. Unknown ids are ignored.
    ///
    /// Once this returns, the callback is never invoked again, even
    /// for events produced earlier in a cycle still being dispatched.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.entries.write().retain(|s| s.id != id);
    }

    /// Number of active registrations.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if no registrations exist.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn contains(&self, id: SubscriptionId) -> bool {
        self.entries.read().iter().any(|s| s.id == id)
    }

    fn matching(&self, event: &ChangeEvent) -> Vec<(SubscriptionId, ChangeCallback)> {
        self.entries
            .read()
            .iter()
            .filter(|s| s.matches(event))
            .map(|s| (s.id, Arc::clone(&s.callback)))
            .collect()
    }
}

/// Routes change events to matching subscriptions.
pub struct Dispatcher {
    registry: Arc<SubscriptionRegistry>,
}

impl Dispatcher {
    /// Creates a dispatcher over the given registry.
    #[must_use]
    pub fn new(registry: Arc<SubscriptionRegistry>) -> Self {
        Self { registry }
    }

    /// Delivers one event to every matching subscription.
    ///
    /// Each invocation is isolated: a panicking subscriber is logged
    /// and delivery continues with the remaining subscribers. No
    /// ordering is guaranteed across subscribers for the same event.
    pub fn dispatch(&self, event: &ChangeEvent) {
        for (id, callback) in self.registry.matching(event) {
            // Membership re-check: the subscription may have been
            // removed after the snapshot was taken.
            if !self.registry.contains(id) {
                continue;
            }
            trace!(subscription = %id, entity = %event.entity_id, "delivering change event");
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                warn!(
                    subscription = %id,
                    entity_type = %event.entity_type,
                    "subscriber callback panicked; continuing with remaining subscribers"
                );
            }
        }
    }
}
