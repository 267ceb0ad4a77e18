//! External placeholder expansion (`%identifier%` tokens).
//!
//! Expansion runs after the template has been filled in, so a placeholder can
//! see the whole line, prefix and suffix included. Values may themselves
//! contain placeholders; [`TokenExpander`] re-runs until the text settles.

use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{trace, warn};

use crate::profile::SenderProfile;

/// Expands placeholders in fully substituted chat text.
pub trait PlaceholderExpander: Send + Sync {
    /// When false the pipeline skips expansion entirely.
    fn is_available(&self) -> bool {
        true
    }

    /// Returns `text` with every placeholder this expander knows replaced.
    ///
    /// Must tolerate being called on its own output, and must not panic on
    /// text it does not understand.
    fn expand(&self, sender: &SenderProfile, text: &str) -> String;
}

/// Leaves text untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExpansion;

impl PlaceholderExpander for NoExpansion {
    fn is_available(&self) -> bool {
        false
    }

    fn expand(&self, _sender: &SenderProfile, text: &str) -> String {
        text.to_string()
    }
}

/// Resolves one placeholder identifier (the text between the `%` signs).
///
/// Closures `Fn(&SenderProfile, &str) -> Option<String>` are resolvers, and a
/// pair `(a, b)` asks `a` first and falls back to `b`.
pub trait PlaceholderResolver: Send + Sync {
    /// The value for `identifier`, or `None` to leave the token as typed.
    fn resolve(&self, sender: &SenderProfile, identifier: &str) -> Option<String>;
}

impl<F> PlaceholderResolver for F
where
    F: Fn(&SenderProfile, &str) -> Option<String> + Send + Sync,
{
    fn resolve(&self, sender: &SenderProfile, identifier: &str) -> Option<String> {
        self(sender, identifier)
    }
}

/// Tries the first resolver, then the second.
impl<A, B> PlaceholderResolver for (A, B)
where
    A: PlaceholderResolver,
    B: PlaceholderResolver,
{
    fn resolve(&self, sender: &SenderProfile, identifier: &str) -> Option<String> {
        self.0
            .resolve(sender, identifier)
            .or_else(|| self.1.resolve(sender, identifier))
    }
}

/// `player_name`, `player_displayname`, `player_world` and `player_uuid`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinPlaceholders;

impl PlaceholderResolver for BuiltinPlaceholders {
    fn resolve(&self, sender: &SenderProfile, identifier: &str) -> Option<String> {
        match identifier.to_ascii_lowercase().as_str() {
            "player_name" => Some(sender.name.clone()),
            "player_displayname" => Some(sender.display_name.clone()),
            "player_world" => Some(sender.world.clone().unwrap_or_default()),
            "player_uuid" => Some(sender.id.to_string()),
            _ => None,
        }
    }
}

/// Replaces `%identifier%` tokens one at a time, repeating until the text
/// stops changing or `max_passes` passes have run.
///
/// Adjacent tokens (`%a%%b%`) are both replaced. Unknown tokens, and tokens
/// whose resolver panics, stay as they are.
pub struct TokenExpander<R> {
    resolver: R,
    max_passes: usize,
}

impl<R: PlaceholderResolver> TokenExpander<R> {
    /// Creates an expander.
    ///
    /// # Arguments
    ///
    /// * `resolver` - Supplies token values
    /// * `max_passes` - Upper bound on re-expansion; `0` disables expansion
    pub fn new(resolver: R, max_passes: usize) -> Self {
        Self {
            resolver,
            max_passes,
        }
    }

    fn resolve_token(&self, sender: &SenderProfile, identifier: &str) -> Option<String> {
        match catch_unwind(AssertUnwindSafe(|| self.resolver.resolve(sender, identifier))) {
            Ok(value) => value,
            Err(_) => {
                warn!("Placeholder resolver panicked on '%{}%'", identifier);
                None
            }
        }
    }

    /// One left-to-right scan. Inserted values are not rescanned within the
    /// same pass.
    fn expand_once(&self, sender: &SenderProfile, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(start) = rest.find('%') {
            let after = &rest[start + 1..];
            match after.find('%') {
                // "%%" has no identifier; the second '%' may open a token.
                Some(0) => {
                    out.push_str(&rest[..=start]);
                    rest = after;
                }
                Some(end) => {
                    let identifier = &after[..end];
                    out.push_str(&rest[..start]);
                    match self.resolve_token(sender, identifier) {
                        Some(value) => out.push_str(&value),
                        None => out.push_str(&rest[start..start + end + 2]),
                    }
                    rest = &after[end + 1..];
                }
                None => break,
            }
        }
        out.push_str(rest);
        out
    }
}

impl<R: PlaceholderResolver> PlaceholderExpander for TokenExpander<R> {
    fn expand(&self, sender: &SenderProfile, text: &str) -> String {
        let mut current = text.to_string();
        for pass in 0..self.max_passes {
            if !current.contains('%') {
                break;
            }
            let next = self.expand_once(sender, &current);
            if next == current {
                trace!("Placeholder expansion stable after {} pass(es)", pass);
                break;
            }
            current = next;
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::ColorPermissions;
    use tincture_scheduler::EntityId;

    fn sender() -> SenderProfile {
        SenderProfile {
            id: EntityId::new(),
            name: "alex".into(),
            display_name: "Alex".into(),
            world: Some("overworld".into()),
            permissions: ColorPermissions::NONE,
        }
    }

    #[test]
    fn test_builtin_and_adjacent_tokens() {
        let expander = TokenExpander::new(BuiltinPlaceholders, 3);
        let s = sender();
        assert_eq!(
            expander.expand(&s, "%player_name%%player_world% %unknown% 100%"),
            "alexoverworld %unknown% 100%"
        );
        assert_eq!(expander.expand(&s, "%%player_name%"), "%alex");
    }

    #[test]
    fn test_nested_output_expands_up_to_cap() {
        let chain = |_: &SenderProfile, id: &str| match id {
            "a" => Some("%b%".to_string()),
            "b" => Some("%c%".to_string()),
            "c" => Some("%d%".to_string()),
            "d" => Some("done".to_string()),
            _ => None,
        };
        let s = sender();
        assert_eq!(TokenExpander::new(chain, 3).expand(&s, "%a%"), "%d%");
        assert_eq!(TokenExpander::new(chain, 4).expand(&s, "%a%"), "done");
    }

    #[test]
    fn test_resolver_tuple_falls_through() {
        let rank = |_: &SenderProfile, id: &str| (id == "rank").then(|| "Knight".to_string());
        let expander = TokenExpander::new((rank, BuiltinPlaceholders), 3);
        assert_eq!(
            expander.expand(&sender(), "%rank% %player_displayname%"),
            "Knight Alex"
        );
    }

    #[test]
    fn test_panicking_resolver_keeps_token() {
        let boom = |_: &SenderProfile, _: &str| -> Option<String> { panic!("resolver failure") };
        let expander = TokenExpander::new(boom, 3);
        assert_eq!(expander.expand(&sender(), "hi %x%"), "hi %x%");
    }
}
