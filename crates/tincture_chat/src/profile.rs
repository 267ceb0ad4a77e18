use tincture_scheduler::EntityId;

use crate::config::PermissionNodes;
use crate::permissions::ColorPermissions;
use crate::roster::ChatPlayer;

/// Sender state captured on the sender's own execution context.
///
/// Everything after the capture hop reads this copy instead of the live
/// player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderProfile {
    pub id: EntityId,
    /// Account name, used for `{player}`.
    pub name: String,
    /// Display name, or the account name when none is set.
    pub display_name: String,
    /// World the sender stood in. `{world}` renders empty when unknown.
    pub world: Option<String>,
    pub permissions: ColorPermissions,
}

impl SenderProfile {
    /// Reads `player`. Call only on the context that owns the player.
    ///
    /// # Arguments
    ///
    /// * `player` - The live sender
    /// * `nodes` - Permission nodes checked for color and special tags
    pub fn capture(player: &dyn ChatPlayer, nodes: &PermissionNodes) -> Self {
        let name = player.name();
        let display_name = player.display_name();
        Self {
            id: player.id(),
            display_name: if display_name.is_empty() {
                name.clone()
            } else {
                display_name
            },
            name,
            world: player.world(),
            permissions: ColorPermissions::of(player, nodes),
        }
    }
}
