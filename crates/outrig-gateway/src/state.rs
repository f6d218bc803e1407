//! Per-call state store owned by the gateway's filter chain
//!
//! Slots are keyed by name and hold values of any type. Reads are typed:
//! a slot that is missing and a slot holding a different type look the same
//! to the caller.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

/// Well-known slot keys
pub mod keys {
    /// `DateTime<Utc>` recorded right before dispatch
    pub const PRE_ROUTE_TIME: &str = "outrig.pre_route_time";

    /// [`UpstreamResponse`](crate::UpstreamResponse) of the completed call
    pub const UPSTREAM_RESPONSE: &str = "outrig.upstream_response";

    /// `String` id of the routed service, written by the routing filter
    pub const SERVICE_ID: &str = "outrig.service_id";

    /// [`CallFailure`](outrig_core::CallFailure) describing an abnormal outcome
    pub const CALL_FAILURE: &str = "outrig.call_failure";

    /// [`CallContext`](outrig_core::CallContext) shared by every stage of the call
    pub const CALL_CONTEXT: &str = "outrig.call_context";
}

/// Typed slot map scoped to a single call
#[derive(Default)]
pub struct CallState {
    slots: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl CallState {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value, replacing whatever the slot held
    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.slots.insert(key.into(), Box::new(value));
    }

    /// Read a slot as `T`; `None` when missing or of another type
    pub fn try_get<T: Any>(&self, key: &str) -> Option<&T> {
        self.slots.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    /// Mutable variant of [`try_get`](Self::try_get)
    pub fn try_get_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.slots.get_mut(key).and_then(|v| v.downcast_mut::<T>())
    }

    /// Remove a slot and return it as `T`
    ///
    /// A slot of another type is left untouched.
    pub fn take<T: Any>(&mut self, key: &str) -> Option<T> {
        if !self.slots.get(key).is_some_and(|v| v.is::<T>()) {
            return None;
        }
        self.slots
            .remove(key)
            .and_then(|v| v.downcast::<T>().ok())
            .map(|v| *v)
    }

    /// Remove a slot regardless of its type
    pub fn remove(&mut self, key: &str) -> bool {
        self.slots.remove(key).is_some()
    }

    /// Check if a slot exists, whatever its type
    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl fmt::Debug for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.slots.keys().map(String::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("CallState").field("slots", &keys).finish()
    }
}
