//! Prefix and suffix sources.
//!
//! Providers are queried in configured priority order; the first non-blank
//! answer wins. A provider that is unavailable, errors or panics counts as
//! having no value.

use dashmap::DashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tincture_scheduler::EntityId;
use tracing::{debug, warn};

/// Why a provider had no answer. The chain treats every error as "no value".
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// The backing service is not loaded or not reachable.
    #[error("provider is not available")]
    Unavailable,
    /// The lookup itself failed.
    #[error("lookup failed: {0}")]
    Lookup(String),
}

/// Which affix is being resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Affix {
    Prefix,
    Suffix,
}

impl std::fmt::Display for Affix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Affix::Prefix => f.write_str("prefix"),
            Affix::Suffix => f.write_str("suffix"),
        }
    }
}

/// A source of player prefixes and suffixes.
pub trait IdentityProvider: Send + Sync {
    /// Name used in `provider_priority`.
    fn name(&self) -> &str;

    /// Checked before every lookup. Unavailable providers are skipped.
    fn is_available(&self) -> bool {
        true
    }

    /// The player's prefix. `Ok(None)` and blank values mean "ask the next
    /// provider".
    fn prefix(&self, player: EntityId) -> Result<Option<String>, ProviderError>;

    /// The player's suffix, with the same conventions as
    /// [`IdentityProvider::prefix`].
    fn suffix(&self, player: EntityId) -> Result<Option<String>, ProviderError>;

    fn affix(&self, player: EntityId, affix: Affix) -> Result<Option<String>, ProviderError> {
        match affix {
            Affix::Prefix => self.prefix(player),
            Affix::Suffix => self.suffix(player),
        }
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Providers in priority order.
///
/// Prefix and suffix are resolved independently: the first provider with a
/// non-blank prefix supplies the prefix even if a later one supplies the
/// suffix. Providers after the one that answered are never called.
#[derive(Clone, Default)]
pub struct ProviderChain {
    providers: Vec<Arc<dyn IdentityProvider>>,
}

impl ProviderChain {
    /// Uses `providers` in the order given.
    pub fn new(providers: Vec<Arc<dyn IdentityProvider>>) -> Self {
        Self { providers }
    }

    /// Orders `registered` by `priority`. Registered providers that are not
    /// named are left out.
    ///
    /// # Arguments
    ///
    /// * `priority` - Provider names, highest priority first
    /// * `registered` - Every provider the host offers
    ///
    /// Names without a registered provider are logged and skipped.
    pub fn from_priority(priority: &[String], registered: Vec<Arc<dyn IdentityProvider>>) -> Self {
        let mut providers = Vec::with_capacity(priority.len());
        for name in priority {
            match registered.iter().find(|p| p.name() == name) {
                Some(provider) => providers.push(provider.clone()),
                None => warn!("Identity provider '{}' is configured but not registered", name),
            }
        }
        for provider in &registered {
            if !priority.iter().any(|name| name == provider.name()) {
                debug!("Identity provider '{}' not in provider_priority, skipped", provider.name());
            }
        }
        Self { providers }
    }

    /// Provider names in query order.
    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// First non-blank value in priority order, or an empty string.
    pub fn resolve(&self, player: EntityId, affix: Affix) -> String {
        for provider in &self.providers {
            let lookup = catch_unwind(AssertUnwindSafe(|| {
                if !provider.is_available() {
                    return Err(ProviderError::Unavailable);
                }
                provider.affix(player, affix)
            }));

            match lookup {
                Ok(Ok(Some(value))) if !is_blank(&value) => return value,
                Ok(Ok(_)) | Ok(Err(ProviderError::Unavailable)) => {}
                Ok(Err(e)) => debug!("{} lookup via '{}' failed: {}", affix, provider.name(), e),
                Err(_) => warn!("Identity provider '{}' panicked during {} lookup", provider.name(), affix),
            }
        }
        String::new()
    }

    /// Resolved prefix, or an empty string.
    pub fn prefix(&self, player: EntityId) -> String {
        self.resolve(player, Affix::Prefix)
    }

    /// Resolved suffix, or an empty string.
    pub fn suffix(&self, player: EntityId) -> String {
        self.resolve(player, Affix::Suffix)
    }
}

impl std::fmt::Debug for ProviderChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[derive(Debug, Clone, Default)]
struct Meta {
    prefix: Option<String>,
    suffix: Option<String>,
}

/// In-memory provider keyed by player id.
#[derive(Debug)]
pub struct MetaStore {
    name: String,
    entries: DashMap<EntityId, Meta>,
    available: AtomicBool,
}

impl MetaStore {
    /// Creates an empty store answering to `name` in `provider_priority`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: DashMap::new(),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_prefix(&self, player: EntityId, prefix: impl Into<String>) {
        self.entries.entry(player).or_default().prefix = Some(prefix.into());
    }

    pub fn set_suffix(&self, player: EntityId, suffix: impl Into<String>) {
        self.entries.entry(player).or_default().suffix = Some(suffix.into());
    }

    /// Forgets both affixes of `player`, e.g. when it disconnects.
    pub fn clear(&self, player: EntityId) {
        self.entries.remove(&player);
    }

    /// Simulates the backing service going away or coming back.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }
}

impl IdentityProvider for MetaStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    fn prefix(&self, player: EntityId) -> Result<Option<String>, ProviderError> {
        Ok(self.entries.get(&player).and_then(|meta| meta.prefix.clone()))
    }

    fn suffix(&self, player: EntityId) -> Result<Option<String>, ProviderError> {
        Ok(self.entries.get(&player).and_then(|meta| meta.suffix.clone()))
    }
}
