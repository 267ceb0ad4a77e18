//! Chat settings, loaded once and shared read-only.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tincture_markup::MarkupEngine;

/// Upper bound accepted for [`ChatSettings::expansion_passes`].
pub const MAX_EXPANSION_PASSES: usize = 16;

/// A setting the pipeline refuses to start with.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("chat format template must not be empty")]
    EmptyFormat,
    #[error("permission node for {0} must not be empty")]
    EmptyPermissionNode(&'static str),
    #[error("expansion_passes must be between 1 and {max}, got {0}", max = MAX_EXPANSION_PASSES)]
    ExpansionPasses(usize),
    #[error("provider '{0}' is listed more than once in provider_priority")]
    DuplicateProvider(String),
}

/// Permission nodes checked on the sender.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PermissionNodes {
    /// Allows legacy and hex color codes in messages.
    pub color: String,
    /// Allows `<hex>`, `<gradient>` and `<rainbow>` tags in messages.
    pub special: String,
}

impl Default for PermissionNodes {
    fn default() -> Self {
        Self {
            color: "tincture.color".to_string(),
            special: "tincture.color.special".to_string(),
        }
    }
}

/// Everything the pipeline reads from configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChatSettings {
    /// Master switch.
    pub enabled: bool,
    /// Cancel the host's own broadcast and deliver formatted text instead.
    pub override_vanilla_chat: bool,
    /// Template using `{prefix}`, `{suffix}`, `{player}`, `{displayname}`,
    /// `{message}` and `{world}`.
    pub format: String,
    /// Identity provider names, highest priority first.
    pub provider_priority: Vec<String>,
    pub permissions: PermissionNodes,
    /// Strip color codes from the body of senders without the color node.
    /// When off, their codes are sent as typed.
    pub strip_colors_without_permission: bool,
    /// An unclosed span tag colors the rest of the line. When off it stays
    /// literal text.
    pub tags_apply_to_rest_of_string: bool,
    /// Maximum placeholder expansion passes.
    pub expansion_passes: usize,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            override_vanilla_chat: true,
            format: "{prefix}{displayname}&7: &f{message}".to_string(),
            provider_priority: vec!["meta".to_string()],
            permissions: PermissionNodes::default(),
            strip_colors_without_permission: true,
            tags_apply_to_rest_of_string: true,
            expansion_passes: 3,
        }
    }
}

impl ChatSettings {
    /// Checks the settings before a pipeline is built.
    ///
    /// # Returns
    ///
    /// `Ok(())`, or the first problem found: an empty template, an empty
    /// permission node, an out-of-range pass cap or a provider listed twice.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.format.trim().is_empty() {
            return Err(ConfigError::EmptyFormat);
        }
        if self.permissions.color.trim().is_empty() {
            return Err(ConfigError::EmptyPermissionNode("color"));
        }
        if self.permissions.special.trim().is_empty() {
            return Err(ConfigError::EmptyPermissionNode("special tags"));
        }
        if !(1..=MAX_EXPANSION_PASSES).contains(&self.expansion_passes) {
            return Err(ConfigError::ExpansionPasses(self.expansion_passes));
        }
        for (i, name) in self.provider_priority.iter().enumerate() {
            if self.provider_priority[..i].contains(name) {
                return Err(ConfigError::DuplicateProvider(name.clone()));
            }
        }
        Ok(())
    }

    /// The markup engine these settings describe.
    pub fn markup_engine(&self) -> MarkupEngine {
        MarkupEngine::new().with_tags_apply_to_rest(self.tags_apply_to_rest_of_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = ChatSettings::default();
        assert_eq!(settings.validate(), Ok(()));
        assert_eq!(settings.format, "{prefix}{displayname}&7: &f{message}");
        assert_eq!(settings.expansion_passes, 3);
    }

    #[test]
    fn test_validation_failures() {
        let mut settings = ChatSettings {
            format: "  ".into(),
            ..Default::default()
        };
        assert_eq!(settings.validate(), Err(ConfigError::EmptyFormat));

        settings.format = "{message}".into();
        settings.expansion_passes = 0;
        assert_eq!(settings.validate(), Err(ConfigError::ExpansionPasses(0)));

        settings.expansion_passes = 3;
        settings.permissions.special.clear();
        assert_eq!(
            settings.validate(),
            Err(ConfigError::EmptyPermissionNode("special tags"))
        );

        settings.permissions = PermissionNodes::default();
        settings.provider_priority = vec!["meta".into(), "groups".into(), "meta".into()];
        assert_eq!(
            settings.validate(),
            Err(ConfigError::DuplicateProvider("meta".into()))
        );
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let settings: ChatSettings = toml::from_str(
            r#"
            format = "{player}: {message}"
            provider_priority = ["groups", "meta"]

            [permissions]
            color = "chat.color"
            "#,
        )
        .unwrap();

        assert_eq!(settings.format, "{player}: {message}");
        assert_eq!(settings.provider_priority, vec!["groups", "meta"]);
        assert_eq!(settings.permissions.color, "chat.color");
        assert_eq!(settings.permissions.special, "tincture.color.special");
        assert!(settings.enabled);
    }
}
