//! Database models for board registrations.

use serde::{Deserialize, Serialize};

/// A row from the `boards` table, written by the control plane and
/// read-only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardRegistration {
    /// Board id.
    pub id: String,
    /// Per-board access token for the external API.
    pub token: String,
    /// Whether enforcement is switched on for this board.
    pub enabled: bool,
}
