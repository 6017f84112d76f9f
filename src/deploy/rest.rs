//! # Discord REST Client
//!
//! `CommandApi` over Discord's v10 HTTP routes using `reqwest`.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: Paginated guild membership listing
//! - 1.0.0: Initial global and guild command routes

use async_trait::async_trait;
use log::debug;
use reqwest::header::{AUTHORIZATION, USER_AGENT};
use reqwest::{Method, Response};
use serde_json::Value;
use std::time::Duration;

use super::api::{CommandApi, Scope};
use crate::commands::RemoteCommand;
use crate::core::{DeployError, RemoteError};

/// Discord API base including the version segment
pub const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

/// Default per-request timeout in seconds
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Discord's page size cap for `/users/@me/guilds`
const GUILD_PAGE_LIMIT: usize = 200;

/// Route builders for the application command endpoints
pub mod routes {
    pub fn commands(app_id: &str) -> String {
        format!("/applications/{app_id}/commands")
    }

    pub fn command(app_id: &str, command_id: &str) -> String {
        format!("/applications/{app_id}/commands/{command_id}")
    }

    pub fn guild_commands(app_id: &str, guild_id: &str) -> String {
        format!("/applications/{app_id}/guilds/{guild_id}/commands")
    }

    pub fn guild_command(app_id: &str, guild_id: &str, command_id: &str) -> String {
        format!("/applications/{app_id}/guilds/{guild_id}/commands/{command_id}")
    }

    pub fn current_user_guilds(limit: usize, after: Option<&str>) -> String {
        match after {
            Some(after) => format!("/users/@me/guilds?limit={limit}&after={after}"),
            None => format!("/users/@me/guilds?limit={limit}"),
        }
    }
}

/// Authenticated HTTP client bound to one application
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    app_id: String,
    authorization: String,
}

impl RestClient {
    /// Create a client against the public Discord API
    pub fn new(app_token: &str, app_id: &str) -> Result<Self, DeployError> {
        Self::with_base_url(
            app_token,
            app_id,
            DISCORD_API_BASE,
            Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        )
    }

    /// Create a client against a custom base URL (proxies, test servers)
    pub fn with_base_url(
        app_token: &str,
        app_id: &str,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, DeployError> {
        if app_token.trim().is_empty() || app_id.trim().is_empty() {
            return Err(DeployError::validation("Missing 'app_token' or 'app_id'"));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeployError::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            app_id: app_id.to_string(),
            authorization: bot_authorization(app_token),
        })
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    fn scope_route(&self, scope: &Scope) -> String {
        match scope {
            Scope::Global => routes::commands(&self.app_id),
            Scope::Guild(guild_id) => routes::guild_commands(&self.app_id, guild_id),
        }
    }

    async fn execute(
        &self,
        method: Method,
        route: &str,
        body: Option<&Value>,
    ) -> Result<Response, DeployError> {
        debug!("{method} {route}");

        let mut request = self
            .http
            .request(method.clone(), format!("{}{}", self.base_url, route))
            .header(AUTHORIZATION, &self.authorization)
            .header(USER_AGENT, concat!("command-sync/", env!("CARGO_PKG_VERSION")));
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| RemoteError::Transport {
            method: method.to_string(),
            route: route.to_string(),
            message: if e.is_timeout() {
                "request timed out".to_string()
            } else if e.is_connect() {
                "could not connect to the server".to_string()
            } else {
                e.to_string()
            },
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Http {
                method: method.to_string(),
                route: route.to_string(),
                status: status.as_u16(),
                message: api_error_message(&body),
            }
            .into());
        }

        Ok(response)
    }

    async fn execute_json(
        &self,
        method: Method,
        route: &str,
        body: Option<&Value>,
    ) -> Result<Value, DeployError> {
        let response = self.execute(method.clone(), route, body).await?;
        response.json::<Value>().await.map_err(|e| {
            RemoteError::Transport {
                method: method.to_string(),
                route: route.to_string(),
                message: format!("invalid JSON response: {e}"),
            }
            .into()
        })
    }
}

#[async_trait]
impl CommandApi for RestClient {
    async fn list_commands(&self, scope: &Scope) -> Result<Vec<RemoteCommand>, DeployError> {
        let route = self.scope_route(scope);
        let payload = self.execute_json(Method::GET, &route, None).await?;
        remote_commands(&route, payload)
    }

    async fn create_command(
        &self,
        scope: &Scope,
        data: &Value,
    ) -> Result<RemoteCommand, DeployError> {
        let route = self.scope_route(scope);
        let payload = self.execute_json(Method::POST, &route, Some(data)).await?;
        RemoteCommand::from_api(payload).map_err(|e| malformed(&route, e))
    }

    async fn overwrite_commands(
        &self,
        scope: &Scope,
        commands: &[Value],
    ) -> Result<Vec<RemoteCommand>, DeployError> {
        let route = self.scope_route(scope);
        let body = Value::Array(commands.to_vec());
        let payload = self.execute_json(Method::PUT, &route, Some(&body)).await?;
        remote_commands(&route, payload)
    }

    async fn delete_command(&self, scope: &Scope, command_id: &str) -> Result<(), DeployError> {
        let route = match scope {
            Scope::Global => routes::command(&self.app_id, command_id),
            Scope::Guild(guild_id) => routes::guild_command(&self.app_id, guild_id, command_id),
        };
        self.execute(Method::DELETE, &route, None).await?;
        Ok(())
    }

    async fn list_guild_ids(&self) -> Result<Vec<String>, DeployError> {
        let mut guild_ids = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let route = routes::current_user_guilds(GUILD_PAGE_LIMIT, after.as_deref());
            let payload = self.execute_json(Method::GET, &route, None).await?;
            let page = payload
                .as_array()
                .ok_or_else(|| malformed(&route, "expected an array".to_string()))?;

            let ids: Vec<String> = page
                .iter()
                .filter_map(|guild| guild.get("id").and_then(Value::as_str))
                .map(str::to_string)
                .collect();
            let full_page = page.len() >= GUILD_PAGE_LIMIT;
            after = ids.last().cloned();
            guild_ids.extend(ids);

            if !full_page || after.is_none() {
                break;
            }
        }

        Ok(guild_ids)
    }
}

/// `Authorization` header value for a bot token, with or without the prefix
fn bot_authorization(token: &str) -> String {
    let token = token.trim();
    if token.starts_with("Bot ") {
        token.to_string()
    } else {
        format!("Bot {token}")
    }
}

/// Pull Discord's `message` out of an error body, falling back to the raw text
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.chars().take(200).collect())
}

fn remote_commands(route: &str, payload: Value) -> Result<Vec<RemoteCommand>, DeployError> {
    match payload {
        Value::Array(items) => items
            .into_iter()
            .map(|item| RemoteCommand::from_api(item).map_err(|e| malformed(route, e)))
            .collect(),
        _ => Err(malformed(route, "expected an array".to_string())),
    }
}

fn malformed(route: &str, reason: String) -> DeployError {
    RemoteError::Transport {
        method: "decode".to_string(),
        route: route.to_string(),
        message: reason,
    }
    .into()
}
