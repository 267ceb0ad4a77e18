//! Color permission gate for message bodies.

use tincture_markup::{strip_color_codes, strip_special_tags};

use crate::config::PermissionNodes;
use crate::roster::ChatPlayer;

/// The two color permissions of a sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColorPermissions {
    /// May use legacy `&` codes and native hex codes.
    pub color: bool,
    /// May use `<hex>`, `<gradient>` and `<rainbow>` tags.
    pub special: bool,
}

impl ColorPermissions {
    /// Both permissions granted.
    pub const ALL: ColorPermissions = ColorPermissions {
        color: true,
        special: true,
    };

    pub const NONE: ColorPermissions = ColorPermissions {
        color: false,
        special: false,
    };

    /// Checks both configured nodes on `player`.
    pub fn of(player: &dyn ChatPlayer, nodes: &PermissionNodes) -> Self {
        Self {
            color: player.has_permission(&nodes.color),
            special: player.has_permission(&nodes.special),
        }
    }
}

/// Strips what the sender may not use from a message body.
///
/// Legacy and hex codes go when `color` is denied and `strip_colors` is set.
/// Span tags go whenever `special` is denied; legacy codes survive that.
/// Templates, prefixes and suffixes are never passed through here.
pub fn gate_message(message: &str, permissions: ColorPermissions, strip_colors: bool) -> String {
    let mut body = message.to_string();
    if !permissions.color && strip_colors {
        body = strip_color_codes(&body);
    }
    if !permissions.special {
        body = strip_special_tags(&body);
    }
    body
}
