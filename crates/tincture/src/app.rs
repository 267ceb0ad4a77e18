//! The running chat server: host, roster, providers and pipeline.

use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use tincture_chat::{
    ChatEvent, ChatOutcome, ChatPipeline, ChatPlayer, ChatTicket, IdentityProvider, MetaStore,
    Roster, RosterPlayer,
};
use tincture_markup::strip_native_codes;
use tincture_scheduler::{
    create_scheduler, Host, LocalHost, ScheduledTaskHandle, TICKS_PER_SECOND,
};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, PlayerSeed};
use crate::console::{ConsoleCommand, HELP};

/// Name of the built-in identity provider.
pub const META_PROVIDER: &str = "meta";

/// The host, roster, meta store and pipeline of one running server.
pub struct ChatServer {
    host: LocalHost,
    roster: Arc<Roster>,
    meta: Arc<MetaStore>,
    pipeline: ChatPipeline,
    mail_pump: ScheduledTaskHandle,
}

impl ChatServer {
    /// Starts the host threads and wires the pipeline. Does not seed players.
    ///
    /// # Arguments
    ///
    /// * `config` - Validated application configuration.
    /// * `runtime` - Runtime the pipeline's async stages run on.
    ///
    /// # Returns
    ///
    /// The running server, or an error if the host or pipeline could not be
    /// built from the configuration.
    pub fn start(config: &AppConfig, runtime: Handle) -> Result<Self> {
        let host = LocalHost::builder()
            .threading(config.host.threading())
            .runtime(runtime)
            .build()
            .context("starting local host")?;
        let scheduler = create_scheduler(Arc::new(host.clone()));

        let roster = Arc::new(Roster::new());
        let meta = Arc::new(MetaStore::new(META_PROVIDER));
        let pipeline = ChatPipeline::builder(config.chat.clone(), scheduler.clone(), roster.clone())
            .provider(meta.clone() as Arc<dyn IdentityProvider>)
            .build()
            .context("building chat pipeline")?;

        let pump_roster = roster.clone();
        let mail_pump = scheduler.run_global_every(
            TICKS_PER_SECOND,
            TICKS_PER_SECOND,
            Arc::new(move || drain_inboxes(&pump_roster)),
        );

        info!("🎨 Tincture chat server running on {}", host.name());
        Ok(Self {
            host,
            roster,
            meta,
            pipeline,
            mail_pump,
        })
    }

    /// Players currently online.
    pub fn roster(&self) -> &Arc<Roster> {
        &self.roster
    }

    pub fn pipeline(&self) -> &ChatPipeline {
        &self.pipeline
    }

    /// Puts a configured player online with its prefix and suffix.
    ///
    /// A player already online under the same name is replaced, and its
    /// entity is retired like on `/leave`.
    pub fn seed(&self, seed: &PlayerSeed) -> Arc<RosterPlayer> {
        let mut player = RosterPlayer::new(self.host.spawn_entity(seed.region), &seed.name)
            .with_permissions(seed.permissions.iter().cloned());
        if let Some(display_name) = &seed.display_name {
            player = player.with_display_name(display_name);
        }
        if let Some(world) = &seed.world {
            player = player.with_world(world);
        }
        let (player, replaced) = self.roster.join_replacing(player);
        if let Some(previous) = replaced {
            self.retire(&previous);
        }

        if let Some(prefix) = &seed.prefix {
            self.meta.set_prefix(player.id(), prefix);
        }
        if let Some(suffix) = &seed.suffix {
            self.meta.set_suffix(player.id(), suffix);
        }
        info!("👤 {} online in region {}", seed.name, seed.region);
        player
    }

    fn find(&self, name: &str) -> Result<Arc<RosterPlayer>> {
        self.roster
            .by_name(name)
            .ok_or_else(|| anyhow!("{} is not online", name))
    }

    /// Runs one console command. Chat lines return the pipeline's ticket.
    pub fn execute(&self, command: ConsoleCommand) -> Result<Option<ChatTicket>> {
        match command {
            ConsoleCommand::Chat { sender, message } => {
                let sender = self.find(&sender)?;
                let mut event = ChatEvent::new(sender.id(), message, self.roster.online());
                Ok(self.pipeline.handle_chat(&mut event))
            }
            ConsoleCommand::Join { name, region } => {
                if self.roster.by_name(&name).is_some() {
                    return Err(anyhow!("{} is already online", name));
                }
                self.seed(&PlayerSeed {
                    name,
                    region,
                    ..Default::default()
                });
                Ok(None)
            }
            ConsoleCommand::Leave { name } => {
                let player = self.find(&name)?;
                self.roster.leave(player.id());
                self.retire(&player);
                info!("👋 {} left", name);
                Ok(None)
            }
            ConsoleCommand::Move { name, region } => {
                let player = self.find(&name)?;
                let owner = self
                    .host
                    .move_entity(player.id(), region)
                    .ok_or_else(|| anyhow!("{} has no live entity", name))?;
                info!("🧭 {} moved to {}", name, owner);
                Ok(None)
            }
            ConsoleCommand::List => {
                let mut names: Vec<String> = self
                    .roster
                    .online()
                    .into_iter()
                    .filter_map(|id| self.roster.get(id))
                    .map(|player| match self.host.owner_of(player.id()) {
                        Some(owner) => format!("{} ({})", player.name(), owner),
                        None => player.name(),
                    })
                    .collect();
                names.sort();
                info!("📋 {} online: {}", names.len(), names.join(", "));
                Ok(None)
            }
            ConsoleCommand::Help => {
                info!("❓ {}", HELP);
                Ok(None)
            }
        }
    }

    /// Drops the affixes of a player that is off the roster and retires its
    /// entity, so tasks still queued for it are dropped.
    fn retire(&self, player: &RosterPlayer) {
        self.meta.clear(player.id());
        self.host.retire_entity(player.id());
    }

    /// Stops the mail pump and joins the host threads.
    pub fn shutdown(&self) {
        self.mail_pump.cancel();
        self.host.shutdown();
    }
}

/// Logs what each online player has received since the last pump.
fn drain_inboxes(roster: &Roster) {
    for id in roster.online() {
        let Some(player) = roster.get(id) else {
            continue;
        };
        for line in player.inbox().take() {
            debug!(target: "chat::inbox", "📨 {} <- {}", player.name(), strip_native_codes(&line));
        }
    }
}

/// Logs how a chat ticket ended.
pub async fn report(ticket: ChatTicket) {
    match ticket.outcome().await {
        ChatOutcome::Dispatched { recipients, .. } => {
            debug!("Chat delivered to {} player(s)", recipients)
        }
        ChatOutcome::Cancelled => info!("🚫 Message cancelled by a listener"),
        ChatOutcome::SenderUnavailable => warn!("Sender went offline before the message was sent"),
        ChatOutcome::Dropped => warn!("Message dropped in flight"),
    }
}
