//! Privilege check for event actors.
//!
//! An actor is privileged when they administer the board (confirmed via the
//! board membership listing, with a short-lived cache in front) or, failing
//! that, when they are assigned to the card the event targets. Any failure
//! to confirm privilege counts as unprivileged: the check fails closed.

use crate::cache::AdminCache;
use crate::domain::{Membership, User};
use crate::trello::ApiClient;

/// Decides whether an event actor was privileged to make a change.
#[derive(Debug, Clone)]
pub struct Authorizer {
    admin_cache: AdminCache,
}

impl Authorizer {
    /// Creates an authorizer backed by the given admin cache.
    pub fn new(admin_cache: AdminCache) -> Self {
        Self { admin_cache }
    }

    /// Returns `true` when `user_id` is a board admin or, if `card_id` is
    /// present, a member assigned to that card.
    ///
    /// The admin check is consulted first and its positive result cached;
    /// the card membership check never populates the cache. Lookup failures
    /// are logged and treated as "not privileged".
    pub async fn is_authorized(
        &self,
        client: &ApiClient,
        board_id: &str,
        user_id: &str,
        card_id: Option<&str>,
    ) -> bool {
        if user_id.is_empty() {
            return false;
        }

        if self.admin_cache.is_confirmed_admin(board_id, user_id).await {
            return true;
        }

        let path = format!("/1/boards/{board_id}/memberships?member=false&orgMemberType=true");
        match client.get::<Vec<Membership>>(&path).await {
            Ok(memberships) => {
                let is_admin = memberships
                    .iter()
                    .any(|m| m.id_member == user_id && m.is_admin());
                if is_admin {
                    self.admin_cache.confirm_admin(board_id, user_id).await;
                    return true;
                }
            }
            Err(e) => {
                tracing::warn!(
                    board = board_id,
                    user = user_id,
                    error = %e,
                    "failed to list board memberships; treating actor as unprivileged"
                );
                return false;
            }
        }

        let Some(card_id) = card_id.filter(|id| !id.is_empty()) else {
            return false;
        };

        let path = format!("/1/cards/{card_id}/members?fields=id");
        match client.get::<Vec<User>>(&path).await {
            Ok(members) => members.iter().any(|m| m.id == user_id),
            Err(e) => {
                tracing::warn!(
                    board = board_id,
                    card = card_id,
                    user = user_id,
                    error = %e,
                    "failed to list card members; treating actor as unprivileged"
                );
                false
            }
        }
    }
}
