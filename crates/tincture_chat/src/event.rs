//! The cancellable format event and its listener registry.

use dashmap::DashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

use crate::profile::SenderProfile;

/// Fired once per chat message, off the tick threads, before formatting.
///
/// Listeners may rewrite the message, the resolved prefix and suffix and the
/// template, or cancel the message outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatEvent {
    sender: SenderProfile,
    message: String,
    prefix: String,
    suffix: String,
    format: String,
    cancelled: bool,
}

impl FormatEvent {
    /// Creates an uncancelled event.
    ///
    /// # Arguments
    ///
    /// * `sender` - Profile captured on the sender's context
    /// * `message` - Message body as typed
    /// * `prefix` / `suffix` - Values resolved from the identity providers
    /// * `format` - Template with `{prefix}`-style placeholders
    pub fn new(
        sender: SenderProfile,
        message: impl Into<String>,
        prefix: impl Into<String>,
        suffix: impl Into<String>,
        format: impl Into<String>,
    ) -> Self {
        Self {
            sender,
            message: message.into(),
            prefix: prefix.into(),
            suffix: suffix.into(),
            format: format.into(),
            cancelled: false,
        }
    }

    /// Who sent the message. Read-only: listeners cannot re-attribute it.
    pub fn sender(&self) -> &SenderProfile {
        &self.sender
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Replaces the body. The permission gate still applies to the new text.
    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = message.into();
    }

    /// Resolved prefix, or empty when no provider had one.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Overrides the prefix. Providers are not consulted again.
    pub fn set_prefix(&mut self, prefix: impl Into<String>) {
        self.prefix = prefix.into();
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn set_suffix(&mut self, suffix: impl Into<String>) {
        self.suffix = suffix.into();
    }

    /// The template the message will be substituted into.
    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn set_format(&mut self, format: impl Into<String>) {
        self.format = format.into();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Cancelling stops the message once every listener has run. Nobody,
    /// including the console, receives a cancelled message.
    pub fn set_cancelled(&mut self, cancelled: bool) {
        self.cancelled = cancelled;
    }
}

/// Listener order. Lower priorities run first, so `Highest` has the last word.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ListenerPriority {
    Lowest,
    Low,
    #[default]
    Normal,
    High,
    Highest,
}

/// Observes or rewrites messages before they are formatted.
///
/// Listeners run on the async pool, never on a tick thread, so they must not
/// touch host state that is owned by a region. Any `Fn(&mut FormatEvent)`
/// closure is a listener.
pub trait FormatListener: Send + Sync {
    /// Called once per message with the mutable event.
    fn on_format(&self, event: &mut FormatEvent);
}

impl<F> FormatListener for F
where
    F: Fn(&mut FormatEvent) + Send + Sync,
{
    fn on_format(&self, event: &mut FormatEvent) {
        self(event)
    }
}

/// Returned by [`FormatHooks::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

struct Registration {
    priority: ListenerPriority,
    listener: Arc<dyn FormatListener>,
}

/// Registered [`FormatListener`]s.
#[derive(Default)]
pub struct FormatHooks {
    listeners: DashMap<ListenerId, Registration>,
    next_id: AtomicU64,
}

impl FormatHooks {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a listener.
    ///
    /// # Arguments
    ///
    /// * `priority` - Where the listener runs relative to others
    /// * `listener` - The listener, usually a closure
    ///
    /// # Returns
    ///
    /// An id for [`FormatHooks::unregister`]. Ids are never reused.
    pub fn register<L>(&self, priority: ListenerPriority, listener: L) -> ListenerId
    where
        L: FormatListener + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.insert(
            id,
            Registration {
                priority,
                listener: Arc::new(listener),
            },
        );
        debug!("📝 Registered format listener {:?} at {:?}", id, priority);
        id
    }

    /// Removes a listener. Returns false if it was not registered.
    pub fn unregister(&self, id: ListenerId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Runs every listener in priority order, then registration order.
    ///
    /// Listeners are collected before any runs, so a listener may register or
    /// unregister others without deadlocking. Cancellation does not stop later
    /// listeners; they can still see and clear the flag.
    pub fn dispatch(&self, event: &mut FormatEvent) {
        let mut ordered: Vec<(ListenerPriority, ListenerId, Arc<dyn FormatListener>)> = self
            .listeners
            .iter()
            .map(|entry| (entry.priority, *entry.key(), entry.listener.clone()))
            .collect();
        ordered.sort_by_key(|(priority, id, _)| (*priority, *id));

        for (priority, id, listener) in ordered {
            let outcome = catch_unwind(AssertUnwindSafe(|| listener.on_format(event)));
            if outcome.is_err() {
                error!(
                    "❌ Format listener {:?} ({:?}) panicked while handling a message from {}",
                    id,
                    priority,
                    event.sender().name
                );
            }
        }
    }
}

impl std::fmt::Debug for FormatHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatHooks")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::ColorPermissions;
    use tincture_scheduler::EntityId;

    fn event() -> FormatEvent {
        let sender = SenderProfile {
            id: EntityId::new(),
            name: "dana".into(),
            display_name: "Dana".into(),
            world: None,
            permissions: ColorPermissions::ALL,
        };
        FormatEvent::new(sender, "hello", "", "", "{message}")
    }

    #[test]
    fn test_priority_then_registration_order() {
        let hooks = FormatHooks::new();
        hooks.register(ListenerPriority::Highest, |e: &mut FormatEvent| {
            let m = format!("{}|highest", e.message());
            e.set_message(m);
        });
        hooks.register(ListenerPriority::Normal, |e: &mut FormatEvent| {
            let m = format!("{}|normal-1", e.message());
            e.set_message(m);
        });
        hooks.register(ListenerPriority::Lowest, |e: &mut FormatEvent| {
            let m = format!("{}|lowest", e.message());
            e.set_message(m);
        });
        hooks.register(ListenerPriority::Normal, |e: &mut FormatEvent| {
            let m = format!("{}|normal-2", e.message());
            e.set_message(m);
        });

        let mut event = event();
        hooks.dispatch(&mut event);
        assert_eq!(event.message(), "hello|lowest|normal-1|normal-2|highest");
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let hooks = FormatHooks::new();
        hooks.register(ListenerPriority::Low, |_: &mut FormatEvent| {
            panic!("listener bug");
        });
        hooks.register(ListenerPriority::High, |e: &mut FormatEvent| {
            e.set_prefix("[ok] ");
            e.set_cancelled(true);
        });

        let mut event = event();
        hooks.dispatch(&mut event);
        assert_eq!(event.prefix(), "[ok] ");
        assert!(event.is_cancelled());
    }

    #[test]
    fn test_unregister() {
        let hooks = FormatHooks::new();
        let id = hooks.register(ListenerPriority::Normal, |e: &mut FormatEvent| {
            e.set_cancelled(true);
        });
        assert_eq!(hooks.len(), 1);
        assert!(hooks.unregister(id));
        assert!(!hooks.unregister(id));

        let mut event = event();
        hooks.dispatch(&mut event);
        assert!(!event.is_cancelled());
    }
}
