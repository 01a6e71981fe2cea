use crate::discord::{ActorToken, Channel, ChatApiError, ChatPlatform, GroupAuthorizer, Webhook};
use crate::error::{error_chain_fmt, ErrorKind};
use reqwest::StatusCode;
use secrecy::Secret;
use std::sync::Arc;

#[derive(thiserror::Error)]
pub enum VerificationError {
    #[error("Channel {channel_id} does not exist.")]
    ChannelNotFound { channel_id: String },
    #[error("Missing permissions to access channel {channel_id}.")]
    ChannelPermissionDenied { channel_id: String },
    #[error("Channel {channel_id} does not belong to guild {expected_group_id}.")]
    ChannelNotOwned {
        channel_id: String,
        expected_group_id: String,
    },
    #[error("Webhook {webhook_id} does not exist.")]
    WebhookNonexistent { webhook_id: String },
    #[error("Webhook {webhook_id} cannot be used to send messages.")]
    WebhookWrongType { webhook_id: String },
    #[error("Webhook {webhook_id} does not belong to guild {expected_group_id}.")]
    WebhookNotOwned {
        webhook_id: String,
        expected_group_id: String,
    },
    #[error("The requester does not manage guild {expected_group_id}.")]
    WebhookMissingUserPermission { expected_group_id: String },
    #[error(transparent)]
    Remote(#[from] ChatApiError),
}

impl std::fmt::Debug for VerificationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl VerificationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VerificationError::ChannelNotFound { .. }
            | VerificationError::WebhookNonexistent { .. } => ErrorKind::NotFound,
            VerificationError::ChannelPermissionDenied { .. }
            | VerificationError::ChannelNotOwned { .. }
            | VerificationError::WebhookNotOwned { .. }
            | VerificationError::WebhookMissingUserPermission { .. } => {
                ErrorKind::PermissionDenied
            }
            VerificationError::WebhookWrongType { .. } => ErrorKind::TypeMismatch,
            VerificationError::Remote(_) => ErrorKind::Unexpected,
        }
    }
}

/// A webhook that passed every check, with the token deliveries use.
#[derive(Debug, Clone)]
pub struct UsableWebhook {
    pub webhook: Webhook,
    pub token: Secret<String>,
}

/// Confirms a destination exists, can be used by the bot and belongs to the
/// guild the caller claims.
#[derive(Clone)]
pub struct DestinationVerifier {
    platform: Arc<dyn ChatPlatform>,
    authorizer: Arc<dyn GroupAuthorizer>,
}

impl DestinationVerifier {
    pub fn new(platform: Arc<dyn ChatPlatform>, authorizer: Arc<dyn GroupAuthorizer>) -> Self {
        Self {
            platform,
            authorizer,
        }
    }

    #[tracing::instrument(name = "Verify channel is usable", skip(self, actor_token))]
    pub async fn verify_channel_usable(
        &self,
        actor_token: &ActorToken,
        channel_id: &str,
        expected_group_id: &str,
    ) -> Result<Channel, VerificationError> {
        let channel = self
            .platform
            .get_channel(actor_token, channel_id)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    VerificationError::ChannelNotFound {
                        channel_id: channel_id.to_string(),
                    }
                } else if e.status() == Some(StatusCode::FORBIDDEN) {
                    VerificationError::ChannelPermissionDenied {
                        channel_id: channel_id.to_string(),
                    }
                } else {
                    VerificationError::Remote(e)
                }
            })?;

        if channel.guild_id.as_deref() != Some(expected_group_id) {
            return Err(VerificationError::ChannelNotOwned {
                channel_id: channel_id.to_string(),
                expected_group_id: expected_group_id.to_string(),
            });
        }
        Ok(channel)
    }

    /// Checks run in order (existence, type, ownership, requester permission)
    /// and stop at the first failure.
    #[tracing::instrument(name = "Verify webhook is usable", skip(self, actor_token))]
    pub async fn verify_webhook_usable(
        &self,
        webhook_id: &str,
        expected_group_id: &str,
        actor_token: &ActorToken,
    ) -> Result<UsableWebhook, VerificationError> {
        let webhook = self
            .platform
            .get_webhook(webhook_id)
            .await
            .map_err(|e| {
                if e.is_not_found() || e.status() == Some(StatusCode::FORBIDDEN) {
                    VerificationError::WebhookNonexistent {
                        webhook_id: webhook_id.to_string(),
                    }
                } else {
                    VerificationError::Remote(e)
                }
            })?;

        let token = match (webhook.is_incoming(), webhook.token.clone()) {
            (true, Some(token)) => Secret::new(token),
            _ => {
                return Err(VerificationError::WebhookWrongType {
                    webhook_id: webhook_id.to_string(),
                })
            }
        };

        if webhook.guild_id.as_deref() != Some(expected_group_id) {
            return Err(VerificationError::WebhookNotOwned {
                webhook_id: webhook_id.to_string(),
                expected_group_id: expected_group_id.to_string(),
            });
        }

        if !self
            .authorizer
            .actor_manages_group(actor_token, expected_group_id)
            .await?
        {
            return Err(VerificationError::WebhookMissingUserPermission {
                expected_group_id: expected_group_id.to_string(),
            });
        }

        Ok(UsableWebhook { webhook, token })
    }
}
