//! The per-message chat pipeline.
//!
//! A chat event travels through four hops:
//!
//! 1. **Event context** (caller): recipients are snapshotted and the host's
//!    own broadcast is cancelled.
//! 2. **Sender context**: the sender's name, world and permissions are
//!    captured while it is safe to read them.
//! 3. **Async worker**: prefix and suffix are resolved, [`FormatHooks`]
//!    listeners run, and the message is gated, substituted, expanded and
//!    rendered.
//! 4. **Recipient contexts**: one delivery per recipient on the context that
//!    owns it, plus one console delivery on the global context.
//!
//! Only a listener cancelling the [`FormatEvent`](crate::FormatEvent) stops a
//! message. Offline recipients and failing providers are skipped.

use std::sync::Arc;
use tincture_scheduler::{EntityId, TaskScheduler};
use tokio::sync::oneshot;
use tracing::{debug, info, trace};

use crate::config::{ChatSettings, ConfigError};
use crate::event::FormatHooks;
use crate::expansion::{BuiltinPlaceholders, PlaceholderExpander, TokenExpander};
use crate::format::{FormatRequest, Formatter};
use crate::identity::{IdentityProvider, ProviderChain};
use crate::profile::SenderProfile;
use crate::roster::PlayerDirectory;
use crate::snapshot::RecipientSnapshot;

/// A chat message as received from the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEvent {
    sender: EntityId,
    message: String,
    recipients: Vec<EntityId>,
    cancelled: bool,
}

impl ChatEvent {
    /// Creates an uncancelled event.
    ///
    /// # Arguments
    ///
    /// * `sender` - Entity of the player who typed the message
    /// * `message` - Raw message text, before any formatting
    /// * `recipients` - Players the host would broadcast to, in delivery order
    pub fn new<I>(sender: EntityId, message: impl Into<String>, recipients: I) -> Self
    where
        I: IntoIterator<Item = EntityId>,
    {
        Self {
            sender,
            message: message.into(),
            recipients: recipients.into_iter().collect(),
            cancelled: false,
        }
    }

    /// The player who sent the message.
    pub fn sender(&self) -> EntityId {
        self.sender
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Recipients as the host supplied them.
    pub fn recipients(&self) -> &[EntityId] {
        &self.recipients
    }

    /// Lets other host listeners narrow or extend the audience before the
    /// pipeline takes its snapshot.
    pub fn recipients_mut(&mut self) -> &mut Vec<EntityId> {
        &mut self.recipients
    }

    /// A cancelled event is not broadcast by the host.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn set_cancelled(&mut self, cancelled: bool) {
        self.cancelled = cancelled;
    }
}

/// How a chat message ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOutcome {
    /// Delivery was scheduled for `recipients` players and the console.
    Dispatched { recipients: usize, text: String },
    /// A format listener cancelled the message.
    Cancelled,
    /// The sender went offline before its state could be captured.
    SenderUnavailable,
    /// The message was lost in flight, e.g. the host shut down.
    Dropped,
}

/// Resolves once the pipeline has finished with a message.
///
/// Dispatch does not wait for the deliveries themselves to run.
#[derive(Debug)]
pub struct ChatTicket {
    rx: oneshot::Receiver<ChatOutcome>,
}

impl ChatTicket {
    /// Waits for the pipeline to finish with the message.
    ///
    /// # Returns
    ///
    /// The final [`ChatOutcome`]. If the pipeline task vanished without
    /// reporting, which happens when the host stops mid-flight, the result
    /// is [`ChatOutcome::Dropped`].
    pub async fn outcome(self) -> ChatOutcome {
        self.rx.await.unwrap_or(ChatOutcome::Dropped)
    }
}

/// Reports an outcome exactly once. If dropped unfinished, reports the
/// fallback instead.
struct Completion {
    tx: Option<oneshot::Sender<ChatOutcome>>,
    fallback: ChatOutcome,
}

impl Completion {
    fn new(tx: oneshot::Sender<ChatOutcome>, fallback: ChatOutcome) -> Self {
        Self {
            tx: Some(tx),
            fallback,
        }
    }

    fn with_fallback(mut self, fallback: ChatOutcome) -> Self {
        self.fallback = fallback;
        self
    }

    fn finish(mut self, outcome: ChatOutcome) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(outcome);
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(std::mem::replace(&mut self.fallback, ChatOutcome::Dropped));
        }
    }
}

/// Read-only state shared by every in-flight message.
struct PipelineInner {
    settings: Arc<ChatSettings>,
    scheduler: Arc<dyn TaskScheduler>,
    directory: Arc<dyn PlayerDirectory>,
    formatter: Formatter,
    hooks: Arc<FormatHooks>,
}

/// Formats chat messages and delivers them on the right contexts.
///
/// Cheap to clone. Each message owns its own request and snapshot; the
/// pipeline itself only holds read-only state.
#[derive(Clone)]
pub struct ChatPipeline {
    inner: Arc<PipelineInner>,
}

/// Collects providers, the expander and the listener registry before
/// validating settings. Created by [`ChatPipeline::builder`].
pub struct ChatPipelineBuilder {
    settings: ChatSettings,
    scheduler: Arc<dyn TaskScheduler>,
    directory: Arc<dyn PlayerDirectory>,
    providers: Vec<Arc<dyn IdentityProvider>>,
    expander: Option<Arc<dyn PlaceholderExpander>>,
    hooks: Option<Arc<FormatHooks>>,
}

impl ChatPipelineBuilder {
    /// Registers an identity provider. Only providers named in
    /// `provider_priority` are consulted.
    pub fn provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Replaces the built-in `%player_*%` expander.
    pub fn expander(mut self, expander: Arc<dyn PlaceholderExpander>) -> Self {
        self.expander = Some(expander);
        self
    }

    /// Shares an existing listener registry.
    pub fn hooks(mut self, hooks: Arc<FormatHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Validates the settings and assembles the pipeline.
    ///
    /// Providers are ordered by `provider_priority`. Without an explicit
    /// expander, a [`TokenExpander`] over [`BuiltinPlaceholders`] is used with
    /// the configured pass cap.
    ///
    /// # Returns
    ///
    /// The pipeline, or the first [`ConfigError`] found in the settings.
    pub fn build(self) -> Result<ChatPipeline, ConfigError> {
        self.settings.validate()?;
        let settings = Arc::new(self.settings);

        let providers = ProviderChain::from_priority(&settings.provider_priority, self.providers);
        let expander = self.expander.unwrap_or_else(|| {
            Arc::new(TokenExpander::new(BuiltinPlaceholders, settings.expansion_passes))
                as Arc<dyn PlaceholderExpander>
        });

        info!(
            "💬 Chat pipeline ready ({} scheduler, providers {:?})",
            self.scheduler.profile(),
            providers.names()
        );

        let formatter = Formatter::new(settings.clone(), providers, expander);
        Ok(ChatPipeline {
            inner: Arc::new(PipelineInner {
                settings,
                scheduler: self.scheduler,
                directory: self.directory,
                formatter,
                hooks: self.hooks.unwrap_or_default(),
            }),
        })
    }
}

impl ChatPipeline {
    /// Starts building a pipeline.
    ///
    /// # Arguments
    ///
    /// * `settings` - Chat configuration, validated by
    ///   [`ChatPipelineBuilder::build`]
    /// * `scheduler` - Scheduler from
    ///   [`create_scheduler`](tincture_scheduler::create_scheduler); decides
    ///   which contexts the hops run on
    /// * `directory` - Lookup of connected players and the console sink
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let pipeline = ChatPipeline::builder(settings, scheduler, roster)
    ///     .provider(meta as Arc<dyn IdentityProvider>)
    ///     .build()?;
    /// ```
    pub fn builder(
        settings: ChatSettings,
        scheduler: Arc<dyn TaskScheduler>,
        directory: Arc<dyn PlayerDirectory>,
    ) -> ChatPipelineBuilder {
        ChatPipelineBuilder {
            settings,
            scheduler,
            directory,
            providers: Vec::new(),
            expander: None,
            hooks: None,
        }
    }

    /// The validated settings this pipeline runs with.
    pub fn settings(&self) -> &ChatSettings {
        &self.inner.settings
    }

    /// The scheduler chosen at startup. Its
    /// [`profile`](TaskScheduler::profile) tells which threading model the
    /// host offered.
    pub fn scheduler(&self) -> &Arc<dyn TaskScheduler> {
        &self.inner.scheduler
    }

    /// Format listener registration.
    pub fn hooks(&self) -> &Arc<FormatHooks> {
        &self.inner.hooks
    }

    /// Handles an inbound chat event.
    ///
    /// Call on the context that delivered the event. Returns `None` when the
    /// pipeline is disabled or the event was already cancelled; otherwise the
    /// event is cancelled (if `override_vanilla_chat` is set) and the message
    /// continues on the scheduler.
    ///
    /// # Arguments
    ///
    /// * `event` - The host's chat event. Its recipients are copied here, so
    ///   later changes to the event do not affect delivery.
    ///
    /// # Returns
    ///
    /// A [`ChatTicket`] for the message's outcome, or `None` if the pipeline
    /// did not take the event.
    pub fn handle_chat(&self, event: &mut ChatEvent) -> Option<ChatTicket> {
        if !self.inner.settings.enabled || event.is_cancelled() {
            return None;
        }

        let snapshot: RecipientSnapshot = event.recipients().iter().copied().collect();
        let message = event.message().to_string();
        let sender = event.sender();
        if self.inner.settings.override_vanilla_chat {
            event.set_cancelled(true);
        }

        let (tx, rx) = oneshot::channel();
        let completion = Completion::new(tx, ChatOutcome::SenderUnavailable);
        let pipeline = self.clone();

        self.inner.scheduler.run_for_entity(
            sender,
            Box::new(move || pipeline.capture_sender(sender, message, snapshot, completion)),
        );

        Some(ChatTicket { rx })
    }

    /// Runs on the sender's context. A sender that left before this hop ends
    /// the message as [`ChatOutcome::SenderUnavailable`].
    fn capture_sender(
        &self,
        sender: EntityId,
        message: String,
        snapshot: RecipientSnapshot,
        completion: Completion,
    ) {
        let Some(player) = self.inner.directory.player(sender) else {
            debug!("Chat sender {} went offline before capture", sender);
            return completion.finish(ChatOutcome::SenderUnavailable);
        };
        let profile = SenderProfile::capture(player.as_ref(), &self.inner.settings.permissions);
        let completion = completion.with_fallback(ChatOutcome::Dropped);

        let pipeline = self.clone();
        self.inner.scheduler.run_async(Box::new(move || {
            pipeline.format_and_deliver(profile, message, snapshot, completion)
        }));
    }

    /// Runs on the async pool: resolve, listeners, render, schedule delivery.
    fn format_and_deliver(
        &self,
        profile: SenderProfile,
        message: String,
        snapshot: RecipientSnapshot,
        completion: Completion,
    ) {
        let mut event = self.inner.formatter.resolve(profile, &message);
        self.inner.hooks.dispatch(&mut event);
        if event.is_cancelled() {
            debug!("Chat message from {} cancelled by a listener", event.sender().name);
            return completion.finish(ChatOutcome::Cancelled);
        }

        let request = FormatRequest::from(event);
        let text = self.inner.formatter.render(&request);
        let recipients = self.deliver(&snapshot, &text);

        completion.finish(ChatOutcome::Dispatched { recipients, text });
    }

    /// Schedules one delivery per connected recipient plus the console.
    fn deliver(&self, snapshot: &RecipientSnapshot, text: &str) -> usize {
        let text: Arc<str> = Arc::from(text);
        let mut scheduled = 0;

        for recipient in snapshot.iter() {
            if self.inner.directory.player(recipient).is_none() {
                trace!("Recipient {} is offline, skipped", recipient);
                continue;
            }
            let directory = self.inner.directory.clone();
            let text = text.clone();
            self.inner.scheduler.run_for_entity(
                recipient,
                Box::new(move || {
                    if let Some(player) = directory.player(recipient) {
                        player.send_message(&text);
                    }
                }),
            );
            scheduled += 1;
        }

        let directory = self.inner.directory.clone();
        self.inner
            .scheduler
            .run_global(Box::new(move || directory.console().send_message(&text)));

        scheduled
    }

    /// Formats `message` as `sender` without firing listeners or delivering.
    ///
    /// Reads the sender directly, so call it where reading that player is
    /// safe. `None` if the sender is offline.
    pub fn format_message(&self, sender: EntityId, message: &str) -> Option<String> {
        let player = self.inner.directory.player(sender)?;
        let profile = SenderProfile::capture(player.as_ref(), &self.inner.settings.permissions);
        Some(self.inner.formatter.format(profile, message))
    }

    /// Resolved prefix of `player`, or an empty string.
    pub fn prefix(&self, player: EntityId) -> String {
        self.inner.formatter.providers().prefix(player)
    }

    /// Resolved suffix of `player`, or an empty string.
    pub fn suffix(&self, player: EntityId) -> String {
        self.inner.formatter.providers().suffix(player)
    }
}

impl std::fmt::Debug for ChatPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatPipeline")
            .field("scheduler", &self.inner.scheduler.profile())
            .field("formatter", &self.inner.formatter)
            .field("hooks", &self.inner.hooks)
            .finish()
    }
}
