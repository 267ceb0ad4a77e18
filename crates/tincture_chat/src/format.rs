//! Turns a resolved chat message into rendered text.

use std::sync::Arc;
use tincture_markup::MarkupEngine;
use tracing::trace;

use crate::config::ChatSettings;
use crate::event::FormatEvent;
use crate::expansion::PlaceholderExpander;
use crate::identity::ProviderChain;
use crate::permissions::gate_message;
use crate::profile::SenderProfile;
use crate::template::{substitute, Placeholders};

/// Everything needed to render one chat message. Owned by a single event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatRequest {
    pub sender: SenderProfile,
    /// Body as the sender typed it, or as a listener rewrote it.
    pub message: String,
    pub prefix: String,
    pub suffix: String,
    /// Template the other fields are substituted into.
    pub format: String,
}

impl From<FormatEvent> for FormatRequest {
    fn from(event: FormatEvent) -> Self {
        Self {
            message: event.message().to_string(),
            prefix: event.prefix().to_string(),
            suffix: event.suffix().to_string(),
            format: event.format().to_string(),
            sender: event.sender().clone(),
        }
    }
}

/// Resolves identity data and renders messages. Holds no per-message state.
pub struct Formatter {
    settings: Arc<ChatSettings>,
    providers: ProviderChain,
    expander: Arc<dyn PlaceholderExpander>,
    engine: MarkupEngine,
}

impl Formatter {
    /// Creates a formatter. The markup engine is built once from `settings`.
    pub fn new(
        settings: Arc<ChatSettings>,
        providers: ProviderChain,
        expander: Arc<dyn PlaceholderExpander>,
    ) -> Self {
        let engine = settings.markup_engine();
        Self {
            settings,
            providers,
            expander,
            engine,
        }
    }

    /// The identity providers in priority order.
    pub fn providers(&self) -> &ProviderChain {
        &self.providers
    }

    /// Builds the format event for `message`: resolved prefix and suffix plus
    /// the configured template.
    pub fn resolve(&self, sender: SenderProfile, message: &str) -> FormatEvent {
        let prefix = self.providers.prefix(sender.id);
        let suffix = self.providers.suffix(sender.id);
        FormatEvent::new(sender, message, prefix, suffix, self.settings.format.clone())
    }

    /// Gate, substitute, expand, render.
    ///
    /// Only the body is gated by the sender's color permissions. Prefix,
    /// suffix and template come from configuration or listeners and keep
    /// their markup.
    ///
    /// # Returns
    ///
    /// The line in native escape codes, ready for delivery.
    pub fn render(&self, request: &FormatRequest) -> String {
        let body = gate_message(
            &request.message,
            request.sender.permissions,
            self.settings.strip_colors_without_permission,
        );

        let world = request.sender.world.as_deref().unwrap_or("");
        let substituted = substitute(
            &request.format,
            &Placeholders {
                prefix: &request.prefix,
                suffix: &request.suffix,
                player: &request.sender.name,
                display_name: &request.sender.display_name,
                message: &body,
                world,
            },
        );

        let expanded = if self.expander.is_available() {
            self.expander.expand(&request.sender, &substituted)
        } else {
            substituted
        };
        trace!("Rendering chat line for {}: {:?}", request.sender.name, expanded);

        self.engine.render(&expanded)
    }

    /// [`Formatter::resolve`] followed by [`Formatter::render`], without hooks.
    pub fn format(&self, sender: SenderProfile, message: &str) -> String {
        self.render(&self.resolve(sender, message).into())
    }
}

impl std::fmt::Debug for Formatter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Formatter")
            .field("providers", &self.providers)
            .field("engine", &self.engine)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expansion::{BuiltinPlaceholders, NoExpansion, TokenExpander};
    use crate::identity::{IdentityProvider, MetaStore};
    use crate::permissions::ColorPermissions;
    use tincture_scheduler::EntityId;

    fn sender(permissions: ColorPermissions) -> SenderProfile {
        SenderProfile {
            id: EntityId::new(),
            name: "erin".into(),
            display_name: "Erin".into(),
            world: Some("end".into()),
            permissions,
        }
    }

    fn formatter(format: &str, store: Arc<MetaStore>) -> Formatter {
        let settings = ChatSettings {
            format: format.into(),
            ..Default::default()
        };
        Formatter::new(
            Arc::new(settings),
            ProviderChain::new(vec![store as Arc<dyn IdentityProvider>]),
            Arc::new(TokenExpander::new(BuiltinPlaceholders, 3)),
        )
    }

    #[test]
    fn test_prefix_from_provider_and_colors_rendered() {
        let store = Arc::new(MetaStore::new("meta"));
        let sender = sender(ColorPermissions::ALL);
        store.set_prefix(sender.id, "&c[A] ");

        let text = formatter("{prefix}{displayname}: {message}", store).format(sender, "&ahi");
        assert_eq!(text, "§c[A] Erin: §ahi");
    }

    #[test]
    fn test_body_is_gated_but_template_is_not() {
        let store = Arc::new(MetaStore::new("meta"));
        let sender = sender(ColorPermissions::NONE);
        store.set_suffix(sender.id, "&6*");

        let text = formatter("&7{player}{suffix}&f: {message}", store)
            .format(sender, "&ahi <rainbow>x</rainbow>");
        assert_eq!(text, "§7erin§6*§f: hi x");
    }

    #[test]
    fn test_placeholders_see_substituted_text() {
        let store = Arc::new(MetaStore::new("meta"));
        let text = formatter("[%player_world%] {player}: {message}", store)
            .format(sender(ColorPermissions::ALL), "I am %player_name%");
        assert_eq!(text, "[end] erin: I am erin");
    }

    #[test]
    fn test_unavailable_expander_is_identity() {
        let settings = Arc::new(ChatSettings {
            format: "{message}".into(),
            ..Default::default()
        });
        let formatter = Formatter::new(settings, ProviderChain::default(), Arc::new(NoExpansion));
        assert_eq!(
            formatter.format(sender(ColorPermissions::ALL), "%player_name%"),
            "%player_name%"
        );
    }
}
