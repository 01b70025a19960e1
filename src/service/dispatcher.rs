//! Per-event dispatch: registration lookup, client construction and
//! routing between the apply and compensate paths.

use std::sync::Arc;

use crate::domain::{Action, EventKind, WebhookEnvelope};
use crate::error::WardenError;
use crate::persistence::BoardRegistry;
use crate::service::apply::Applier;
use crate::service::authorize::Authorizer;
use crate::service::compensate::Compensator;
use crate::trello::{ApiClient, HttpTransport};

/// Routes each delivered event to the apply or compensate path.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<dyn BoardRegistry>,
    authorizer: Authorizer,
    applier: Applier,
    compensator: Compensator,
    http: reqwest::Client,
    api_base_url: String,
    api_key: String,
}

impl Dispatcher {
    /// Creates a dispatcher over the given registry and processing paths.
    #[must_use]
    pub fn new(
        registry: Arc<dyn BoardRegistry>,
        authorizer: Authorizer,
        applier: Applier,
        compensator: Compensator,
        http: reqwest::Client,
        api_base_url: String,
        api_key: String,
    ) -> Self {
        Self {
            registry,
            authorizer,
            applier,
            compensator,
            http,
            api_base_url,
            api_key,
        }
    }

    /// Processes one acknowledged delivery. All outcomes are logged; the
    /// upstream sender never sees them.
    pub async fn process(&self, envelope: WebhookEnvelope) {
        let action = envelope.action;
        if matches!(action.kind, EventKind::Other) {
            tracing::debug!("untracked event type; ignoring");
            return;
        }

        let board_id = action.data.board.id.clone();
        let client = match self.client_for(&board_id).await {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!(board = board_id, error = %e, "dropping event");
                return;
            }
        };

        self.route(&client, action).await;
    }

    /// Resolves the board registration and builds a client bound to its
    /// token. Missing or disabled registrations fail closed.
    ///
    /// # Errors
    ///
    /// Fails when the board is unknown, disabled, or the registry is
    /// unavailable.
    pub async fn client_for(&self, board_id: &str) -> Result<ApiClient, WardenError> {
        let registration = self
            .registry
            .lookup(board_id)
            .await?
            .ok_or_else(|| WardenError::BoardNotRegistered(board_id.to_string()))?;
        if !registration.enabled {
            return Err(WardenError::BoardDisabled(board_id.to_string()));
        }
        let transport = HttpTransport::new(
            self.http.clone(),
            &self.api_base_url,
            &self.api_key,
            &registration.token,
        );
        Ok(ApiClient::new(Arc::new(transport)))
    }

    /// The applier, for control-plane triggered sweeps.
    #[must_use]
    pub fn applier(&self) -> &Applier {
        &self.applier
    }

    async fn route(&self, client: &ApiClient, action: Action) {
        let board_id = action.data.board.id.clone();
        let card_id = action.data.card.id.clone();
        let user_id = action.member_creator.id.clone();
        let event = action.kind.as_str();

        let card_ref = (!card_id.is_empty()).then_some(card_id.as_str());
        let allowed = self
            .authorizer
            .is_authorized(client, &board_id, &user_id, card_ref)
            .await;

        if allowed {
            tracing::info!(board = board_id, card = card_id, user = user_id, event,
                "actor privileged; mirroring change");
            if let Err(e) = self.applier.apply(client, &action).await {
                tracing::warn!(board = board_id, card = card_id, event, error = %e,
                    "failed to mirror change");
            }
        } else {
            tracing::info!(board = board_id, card = card_id, user = user_id, event,
                "actor not privileged; reversing change");
            self.compensator.compensate(client, action).await;
        }
    }
}
