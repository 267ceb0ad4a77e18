//! # Tincture Chat
//!
//! Chat formatting for game servers: prefixes and suffixes from identity
//! providers, format listeners, permission-gated colors, template
//! substitution, `%placeholder%` expansion and markup rendering, with
//! delivery on each recipient's own execution context.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tincture_chat::{
//!     ChatEvent, ChatPipeline, ChatPlayer, ChatSettings, IdentityProvider, MetaStore, Roster,
//!     RosterPlayer,
//! };
//! use tincture_scheduler::{create_scheduler, EntityId, LocalHost};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let host = LocalHost::builder().build()?;
//! let scheduler = create_scheduler(Arc::new(host));
//! let roster = Arc::new(Roster::new());
//! let meta = Arc::new(MetaStore::new("meta"));
//!
//! let pipeline = ChatPipeline::builder(ChatSettings::default(), scheduler, roster.clone())
//!     .provider(meta.clone() as Arc<dyn IdentityProvider>)
//!     .build()?;
//!
//! let alice = roster.join(RosterPlayer::new(EntityId::new(), "Alice"));
//! meta.set_prefix(alice.id(), "&c[Admin] ");
//!
//! let mut event = ChatEvent::new(alice.id(), "hello <rainbow>world", roster.online());
//! if let Some(ticket) = pipeline.handle_chat(&mut event) {
//!     println!("{:?}", ticket.outcome().await);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod event;
pub mod expansion;
pub mod format;
pub mod identity;
pub mod permissions;
pub mod pipeline;
pub mod profile;
pub mod roster;
pub mod snapshot;
pub mod template;

pub use config::{ChatSettings, ConfigError, PermissionNodes, MAX_EXPANSION_PASSES};
pub use event::{FormatEvent, FormatHooks, FormatListener, ListenerId, ListenerPriority};
pub use expansion::{
    BuiltinPlaceholders, NoExpansion, PlaceholderExpander, PlaceholderResolver, TokenExpander,
};
pub use format::{FormatRequest, Formatter};
pub use identity::{Affix, IdentityProvider, MetaStore, ProviderChain, ProviderError};
pub use permissions::{gate_message, ColorPermissions};
pub use pipeline::{ChatEvent, ChatOutcome, ChatPipeline, ChatPipelineBuilder, ChatTicket};
pub use profile::SenderProfile;
pub use roster::{ChatPlayer, ConsoleSink, Inbox, MessageSink, PlayerDirectory, Roster, RosterPlayer};
pub use snapshot::RecipientSnapshot;
pub use template::{substitute, Placeholders};
