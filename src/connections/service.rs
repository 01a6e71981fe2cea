use crate::connections::{ConnectionStore, StoreError};
use crate::discord::ActorToken;
use crate::domain::{
    Connection, ConnectionKind, ConnectionName, ConnectionPatch, NewConnection, WebhookRef,
};
use crate::error::{error_chain_fmt, ErrorKind};
use crate::verifier::{DestinationVerifier, VerificationError};
use secrecy::ExposeSecret;
use std::sync::Arc;
use uuid::Uuid;

#[derive(thiserror::Error)]
pub enum ConnectionServiceError {
    #[error(transparent)]
    Verification(#[from] VerificationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Connection {connection_id} is not a channel connection.")]
    NotAChannelConnection { connection_id: Uuid },
}

impl std::fmt::Debug for ConnectionServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ConnectionServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConnectionServiceError::Verification(e) => e.kind(),
            ConnectionServiceError::Store(e) => e.kind(),
            ConnectionServiceError::NotAChannelConnection { .. } => ErrorKind::TypeMismatch,
        }
    }
}

/// Display metadata for the webhook a connection will deliver through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookInput {
    pub id: String,
    pub name: Option<String>,
    pub icon_url: Option<String>,
}

/// Verifies destinations before any connection is persisted.
///
/// Creates are not idempotent: retrying one stores a second connection with
/// a new id.
#[derive(Clone)]
pub struct ConnectionService {
    verifier: DestinationVerifier,
    store: Arc<dyn ConnectionStore>,
}

impl ConnectionService {
    pub fn new(verifier: DestinationVerifier, store: Arc<dyn ConnectionStore>) -> Self {
        Self { verifier, store }
    }

    #[tracing::instrument(
        name = "Creating a channel connection",
        skip(self, actor_token, name),
        fields(connection_name = %name)
    )]
    pub async fn create_channel_connection(
        &self,
        feed_id: Uuid,
        name: ConnectionName,
        channel_id: &str,
        actor_token: &ActorToken,
        group_id: &str,
    ) -> Result<Connection, ConnectionServiceError> {
        self.verifier
            .verify_channel_usable(actor_token, channel_id, group_id)
            .await?;

        let connection = self
            .store
            .append_connection(feed_id, NewConnection::channel(name, channel_id.to_string()))
            .await?;
        tracing::info!(connection_id = %connection.id, "Channel connection created");
        Ok(connection)
    }

    /// Any destination the patch moves the connection to is re-verified
    /// against the connection's own guild. A new webhook's token always comes
    /// from Discord, never from the patch.
    #[tracing::instrument(
        name = "Updating a channel connection",
        skip(self, actor_token, patch)
    )]
    pub async fn update_channel_connection(
        &self,
        feed_id: Uuid,
        connection_id: Uuid,
        actor_token: &ActorToken,
        group_id: &str,
        mut patch: ConnectionPatch,
    ) -> Result<Connection, ConnectionServiceError> {
        // An unknown connection falls through to the store, which reports it.
        if let Some(existing) = self.store.find_connection(feed_id, connection_id).await? {
            if existing.kind != ConnectionKind::Channel {
                return Err(ConnectionServiceError::NotAChannelConnection { connection_id });
            }
        }

        if let Some(channel) = patch.new_channel() {
            self.verifier
                .verify_channel_usable(actor_token, &channel.id, group_id)
                .await?;
        }

        if let Some(webhook) = patch.new_webhook_mut() {
            let usable = self
                .verifier
                .verify_webhook_usable(&webhook.id, group_id, actor_token)
                .await?;
            webhook.token = Some(usable.token.expose_secret().clone());
        }

        Ok(self
            .store
            .patch_connection(feed_id, connection_id, patch)
            .await?)
    }

    #[tracing::instrument(
        name = "Creating a webhook connection",
        skip(self, actor_token, name),
        fields(connection_name = %name)
    )]
    pub async fn create_webhook_connection(
        &self,
        feed_id: Uuid,
        actor_token: &ActorToken,
        group_id: &str,
        name: ConnectionName,
        webhook: WebhookInput,
    ) -> Result<Connection, ConnectionServiceError> {
        let usable = self
            .verifier
            .verify_webhook_usable(&webhook.id, group_id, actor_token)
            .await?;

        let webhook = WebhookRef {
            id: webhook.id,
            token: usable.token.expose_secret().clone(),
            name: webhook.name,
            icon_url: webhook.icon_url,
        };
        let connection = self
            .store
            .append_connection(feed_id, NewConnection::webhook(name, webhook))
            .await?;
        tracing::info!(connection_id = %connection.id, "Webhook connection created");
        Ok(connection)
    }
}
