//! # Guild Membership
//!
//! Readiness signal for the set of guilds the bot belongs to. Guild-scoped
//! commands are only posted to guilds in this set.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: Gateway-fed membership through a `watch` channel instead of polling the cache
//! - 1.0.0: Static and REST membership

use async_trait::async_trait;
use log::{debug, info};
use serenity::model::gateway::Ready;
use serenity::model::id::GuildId;
use serenity::prelude::{Context, EventHandler};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::api::CommandApi;
use crate::core::{DeployError, RemoteError};

/// Source of the bot's guild membership
#[async_trait]
pub trait GuildMembership: Send + Sync {
    /// Resolve the membership set, waiting at most `timeout` for it to exist
    ///
    /// `None` waits without a bound.
    async fn wait_ready(
        &self,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<HashSet<String>, DeployError>;
}

/// Membership known up front
#[derive(Debug, Clone, Default)]
pub struct StaticMembership {
    guild_ids: HashSet<String>,
}

impl StaticMembership {
    pub fn new<I, S>(guild_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            guild_ids: guild_ids.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl GuildMembership for StaticMembership {
    async fn wait_ready(
        &self,
        _timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<HashSet<String>, DeployError> {
        if cancel.is_cancelled() {
            return Err(DeployError::Cancelled);
        }
        Ok(self.guild_ids.clone())
    }
}

/// Membership fetched once from `/users/@me/guilds`
pub struct RestMembership {
    api: Arc<dyn CommandApi>,
}

impl RestMembership {
    pub fn new(api: Arc<dyn CommandApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl GuildMembership for RestMembership {
    async fn wait_ready(
        &self,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<HashSet<String>, DeployError> {
        let fetch = async { self.api.list_guild_ids().await };
        let guild_ids = wait_bounded(fetch, timeout, cancel).await??;
        debug!("Fetched membership for {} guilds", guild_ids.len());
        Ok(guild_ids.into_iter().collect())
    }
}

/// Membership published by a gateway session once it is ready
///
/// Pair it with [`GatewayMembershipHandler`] registered on the serenity client.
#[derive(Clone)]
pub struct GatewayMembership {
    receiver: watch::Receiver<Option<HashSet<String>>>,
}

impl GatewayMembership {
    /// Create the membership signal and the event handler that feeds it
    pub fn channel() -> (Self, GatewayMembershipHandler) {
        let (sender, receiver) = watch::channel(None);
        (
            Self { receiver },
            GatewayMembershipHandler {
                sender: Arc::new(sender),
            },
        )
    }

    /// Current membership without waiting
    pub fn snapshot(&self) -> Option<HashSet<String>> {
        self.receiver.borrow().clone()
    }
}

#[async_trait]
impl GuildMembership for GatewayMembership {
    async fn wait_ready(
        &self,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<HashSet<String>, DeployError> {
        let mut receiver = self.receiver.clone();
        let ready = async move {
            receiver
                .wait_for(Option::is_some)
                .await
                .map(|guilds| guilds.clone().unwrap_or_default())
                .map_err(|_| {
                    DeployError::from(RemoteError::MembershipUnavailable(
                        "gateway session closed before it was ready".to_string(),
                    ))
                })
        };
        wait_bounded(ready, timeout, cancel).await?
    }
}

/// Serenity event handler that publishes guild membership on `ready`
pub struct GatewayMembershipHandler {
    sender: Arc<watch::Sender<Option<HashSet<String>>>>,
}

impl GatewayMembershipHandler {
    /// Publish a membership set directly
    pub fn publish<I: IntoIterator<Item = GuildId>>(&self, guilds: I) {
        let ids: HashSet<String> = guilds.into_iter().map(|g| g.0.to_string()).collect();
        info!("📡 Guild membership ready ({} guilds)", ids.len());
        self.sender.send_replace(Some(ids));
    }
}

#[async_trait]
impl EventHandler for GatewayMembershipHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        self.publish(ready.guilds.iter().map(|g| g.id));
    }
}

/// Run `future` under an optional timeout, aborting early on cancellation
async fn wait_bounded<F, T>(
    future: F,
    timeout: Option<Duration>,
    cancel: &CancellationToken,
) -> Result<T, DeployError>
where
    F: std::future::Future<Output = T>,
{
    let bounded = async {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, future).await.map_err(|_| {
                DeployError::from(RemoteError::MembershipUnavailable(format!(
                    "not ready after {}s",
                    limit.as_secs_f64()
                )))
            }),
            None => Ok(future.await),
        }
    };

    tokio::select! {
        _ = cancel.cancelled() => Err(DeployError::Cancelled),
        result = bounded => result,
    }
}
