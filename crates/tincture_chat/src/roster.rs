//! Players, message sinks and an in-memory player directory.
//!
//! The pipeline only sees the [`PlayerDirectory`] and [`ChatPlayer`] traits.
//! [`Roster`] is the in-process implementation used by the binary and the
//! tests; a real host would wrap its own player objects instead.

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::Arc;
use tincture_markup::strip_native_codes;
use tincture_scheduler::EntityId;
use tracing::{debug, info};

/// Anything that can receive rendered chat text.
pub trait MessageSink: Send + Sync {
    /// Receives one rendered line, native escape codes included.
    fn send_message(&self, text: &str);
}

/// A connected player as seen by the chat pipeline.
///
/// Reading a player is only safe on the context that owns its entity, which
/// is why the pipeline captures a [`SenderProfile`](crate::SenderProfile)
/// once instead of holding on to the player.
pub trait ChatPlayer: Send + Sync {
    fn id(&self) -> EntityId;
    /// Account name.
    fn name(&self) -> String;
    /// Falls back to [`ChatPlayer::name`] when no display name is set.
    fn display_name(&self) -> String;
    fn world(&self) -> Option<String>;
    fn has_permission(&self, node: &str) -> bool;
    /// Shows `text` to the player. Called on the player's own context.
    fn send_message(&self, text: &str);
}

/// Lookup of connected players plus the console sink.
pub trait PlayerDirectory: Send + Sync {
    /// The player if still connected.
    fn player(&self, id: EntityId) -> Option<Arc<dyn ChatPlayer>>;
    /// Where the plain-text copy of every message goes.
    fn console(&self) -> Arc<dyn MessageSink>;
}

/// Records every message it receives.
#[derive(Debug, Default)]
pub struct Inbox {
    messages: Mutex<Vec<String>>,
}

impl Inbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything received so far, oldest first.
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    /// Drains the inbox.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.messages.lock())
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }
}

impl MessageSink for Inbox {
    fn send_message(&self, text: &str) {
        self.messages.lock().push(text.to_string());
    }
}

/// Console sink: logs the plain text and keeps a copy.
#[derive(Debug, Default)]
pub struct ConsoleSink {
    log: Inbox,
}

impl ConsoleSink {
    /// Plain-text lines logged so far.
    pub fn log(&self) -> &Inbox {
        &self.log
    }
}

impl MessageSink for ConsoleSink {
    fn send_message(&self, text: &str) {
        let plain = strip_native_codes(text);
        info!(target: "chat", "{}", plain);
        self.log.send_message(&plain);
    }
}

#[derive(Debug, Default)]
struct PlayerState {
    display_name: Option<String>,
    world: Option<String>,
    permissions: HashSet<String>,
}

/// A player held by the [`Roster`]. Delivered messages land in its inbox.
#[derive(Debug)]
pub struct RosterPlayer {
    id: EntityId,
    name: String,
    state: RwLock<PlayerState>,
    inbox: Inbox,
}

impl RosterPlayer {
    /// A player with no display name, no world and no permissions.
    ///
    /// # Arguments
    ///
    /// * `id` - Entity the host spawned for this player
    /// * `name` - Account name; the roster matches it case-insensitively
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            state: RwLock::new(PlayerState::default()),
            inbox: Inbox::new(),
        }
    }

    pub fn with_display_name(self, display_name: impl Into<String>) -> Self {
        self.set_display_name(Some(display_name.into()));
        self
    }

    pub fn with_world(self, world: impl Into<String>) -> Self {
        self.set_world(Some(world.into()));
        self
    }

    /// Grants every node in `nodes`. `*` grants all nodes.
    pub fn with_permissions<I, S>(self, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for node in nodes {
            self.grant(node);
        }
        self
    }

    /// `None` falls back to the account name.
    pub fn set_display_name(&self, display_name: Option<String>) {
        self.state.write().display_name = display_name;
    }

    pub fn set_world(&self, world: Option<String>) {
        self.state.write().world = world;
    }

    pub fn grant(&self, node: impl Into<String>) {
        self.state.write().permissions.insert(node.into());
    }

    /// Returns whether the node had been granted.
    pub fn revoke(&self, node: &str) -> bool {
        self.state.write().permissions.remove(node)
    }

    /// Messages delivered to this player.
    pub fn inbox(&self) -> &Inbox {
        &self.inbox
    }
}

impl ChatPlayer for RosterPlayer {
    fn id(&self) -> EntityId {
        self.id
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn display_name(&self) -> String {
        self.state
            .read()
            .display_name
            .clone()
            .unwrap_or_else(|| self.name.clone())
    }

    fn world(&self) -> Option<String> {
        self.state.read().world.clone()
    }

    /// `*` grants every node.
    fn has_permission(&self, node: &str) -> bool {
        let state = self.state.read();
        state.permissions.contains(node) || state.permissions.contains("*")
    }

    fn send_message(&self, text: &str) {
        self.inbox.send_message(text);
    }
}

/// Thread-safe in-memory [`PlayerDirectory`].
#[derive(Debug, Default)]
pub struct Roster {
    players: DashMap<EntityId, Arc<RosterPlayer>>,
    names: DashMap<String, EntityId>,
    console: Arc<ConsoleSink>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a player, replacing any online player with the same name.
    ///
    /// Use [`Roster::join_replacing`] when the replaced session's entity has
    /// to be retired.
    pub fn join(&self, player: RosterPlayer) -> Arc<RosterPlayer> {
        self.join_replacing(player).0
    }

    /// Adds a player and hands back the session it displaced, if any.
    ///
    /// # Arguments
    ///
    /// * `player` - The new session. Names match case-insensitively.
    ///
    /// # Returns
    ///
    /// The joined player, plus the previous player with the same name. The
    /// previous player is already off the roster, but its host entity is
    /// still live until the caller retires it.
    pub fn join_replacing(
        &self,
        player: RosterPlayer,
    ) -> (Arc<RosterPlayer>, Option<Arc<RosterPlayer>>) {
        let key = player.name.to_lowercase();
        let replaced = self
            .names
            .get(&key)
            .map(|id| *id)
            .and_then(|previous| self.players.remove(&previous))
            .map(|(_, previous)| previous);
        if let Some(previous) = &replaced {
            debug!("{} replaced stale session {}", previous.name, previous.id);
        }

        let player = Arc::new(player);
        self.names.insert(key, player.id);
        self.players.insert(player.id, player.clone());
        debug!("👋 {} joined the roster ({})", player.name, player.id);
        (player, replaced)
    }

    /// Takes a player offline. Pending deliveries to it are skipped from now
    /// on; retiring its entity is up to the caller.
    pub fn leave(&self, id: EntityId) -> Option<Arc<RosterPlayer>> {
        let (_, player) = self.players.remove(&id)?;
        self.names.remove_if(&player.name.to_lowercase(), |_, owner| *owner == id);
        debug!("{} left the roster", player.name);
        Some(player)
    }

    pub fn get(&self, id: EntityId) -> Option<Arc<RosterPlayer>> {
        self.players.get(&id).map(|entry| entry.value().clone())
    }

    /// Case-insensitive name lookup.
    pub fn by_name(&self, name: &str) -> Option<Arc<RosterPlayer>> {
        let id = *self.names.get(&name.to_lowercase())?;
        self.get(id)
    }

    /// Everyone online, in no particular order.
    pub fn online(&self) -> Vec<EntityId> {
        self.players.iter().map(|entry| *entry.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// The concrete console sink, for reading back its log.
    pub fn console_sink(&self) -> &Arc<ConsoleSink> {
        &self.console
    }
}

impl PlayerDirectory for Roster {
    fn player(&self, id: EntityId) -> Option<Arc<dyn ChatPlayer>> {
        self.get(id).map(|player| player as Arc<dyn ChatPlayer>)
    }

    fn console(&self) -> Arc<dyn MessageSink> {
        self.console.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_leave_and_lookup() {
        let roster = Roster::new();
        let alice = roster.join(RosterPlayer::new(EntityId::new(), "Alice"));
        assert_eq!(roster.by_name("alice").map(|p| p.id()), Some(alice.id()));
        assert_eq!(roster.len(), 1);

        assert!(roster.leave(alice.id()).is_some());
        assert!(roster.by_name("Alice").is_none());
        assert!(roster.player(alice.id()).is_none());
        assert!(roster.is_empty());
    }

    #[test]
    fn test_rejoin_with_same_name_replaces_old_session() {
        let roster = Roster::new();
        let first = roster.join(RosterPlayer::new(EntityId::new(), "Bob"));
        let (second, replaced) = roster.join_replacing(RosterPlayer::new(EntityId::new(), "bob"));
        assert_eq!(replaced.map(|p| p.id()), Some(first.id()));
        assert!(roster.get(first.id()).is_none());
        assert_eq!(roster.by_name("BOB").map(|p| p.id()), Some(second.id()));

        // Leaving the stale session must not unlink the new one.
        assert!(roster.leave(first.id()).is_none());
        assert!(roster.by_name("bob").is_some());
    }

    #[test]
    fn test_player_state() {
        let player = RosterPlayer::new(EntityId::new(), "Carol")
            .with_world("nether")
            .with_permissions(["chat.color"]);
        assert_eq!(player.display_name(), "Carol");
        player.set_display_name(Some("Captain Carol".into()));
        assert_eq!(player.display_name(), "Captain Carol");
        assert_eq!(player.world().as_deref(), Some("nether"));
        assert!(player.has_permission("chat.color"));
        assert!(!player.has_permission("chat.color.special"));
        player.grant("*");
        assert!(player.has_permission("chat.color.special"));
    }

    #[test]
    fn test_console_sink_strips_native_codes() {
        let roster = Roster::new();
        roster.console().send_message("§aHello §x§f§f§0§0§0§0world");
        assert_eq!(roster.console_sink().log().messages(), vec!["Hello world"]);
    }
}
