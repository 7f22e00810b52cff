//! Azure identity sources
//!
//! Handlers never read ambient credentials themselves. A single
//! [`TokenCredential`] is built at startup from configuration and injected
//! into the [`ArmClient`](crate::arm::ArmClient), which asks it for a bearer
//! token on every call.

use crate::error::{AzureError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Token scope for Azure Resource Manager
pub const ARM_SCOPE: &str = "https://management.azure.com/.default";

/// Tokens closer than this to expiry are refreshed
const REFRESH_MARGIN_SECS: i64 = 300;

/// Bearer token plus its expiry
#[derive(Debug, Clone, PartialEq)]
pub struct AccessToken {
    pub token: String,
    pub expires_on: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, expires_on: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_on,
        }
    }

    /// Returns true if the token expires within `margin`
    pub fn is_expiring(&self, margin: Duration) -> bool {
        self.expires_on - margin <= Utc::now()
    }
}

/// Anything able to produce a bearer token for a scope
#[async_trait]
pub trait TokenCredential: Send + Sync {
    async fn get_token(&self, scope: &str) -> Result<AccessToken>;

    /// Short name used in logs and chained-credential errors
    fn name(&self) -> &'static str;
}

/// OAuth2 client-credentials grant against Entra ID
pub struct ClientSecretCredential {
    http: reqwest::Client,
    authority_host: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
}

#[derive(Deserialize)]
struct ClientSecretTokenResponse {
    access_token: String,
    expires_in: i64,
}

impl ClientSecretCredential {
    pub fn new(
        http: reqwest::Client,
        authority_host: impl Into<String>,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http,
            authority_host: authority_host.into(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    async fn get_token(&self, scope: &str) -> Result<AccessToken> {
        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host.trim_end_matches('/'),
            self.tenant_id
        );
        let form = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", scope),
            ("grant_type", "client_credentials"),
        ];

        let response = self.http.post(&url).form(&form).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(AzureError::Credential(format!(
                "client secret token request failed ({}): {}",
                status.as_u16(),
                token_error_description(&body)
            )));
        }

        let parsed: ClientSecretTokenResponse = serde_json::from_str(&body)?;
        Ok(AccessToken::new(
            parsed.access_token,
            Utc::now() + Duration::seconds(parsed.expires_in),
        ))
    }

    fn name(&self) -> &'static str {
        "ClientSecretCredential"
    }
}

/// Token from the instance metadata service of the hosting VM or app
pub struct ManagedIdentityCredential {
    http: reqwest::Client,
    endpoint: String,
    client_id: Option<String>,
}

#[derive(Deserialize)]
struct ManagedIdentityTokenResponse {
    access_token: String,
    expires_on: serde_json::Value,
}

impl ManagedIdentityCredential {
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>, client_id: Option<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            client_id,
        }
    }
}

/// IMDS takes a resource rather than a `/.default` scope
fn scope_to_resource(scope: &str) -> &str {
    scope.strip_suffix("/.default").unwrap_or(scope)
}

/// `expires_on` comes back as epoch seconds, either quoted or bare
fn parse_epoch(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    let secs = match value {
        serde_json::Value::String(s) => s.parse::<i64>().ok()?,
        serde_json::Value::Number(n) => n.as_i64()?,
        _ => return None,
    };
    DateTime::from_timestamp(secs, 0)
}

#[async_trait]
impl TokenCredential for ManagedIdentityCredential {
    async fn get_token(&self, scope: &str) -> Result<AccessToken> {
        let url = format!(
            "{}/metadata/identity/oauth2/token",
            self.endpoint.trim_end_matches('/')
        );
        let resource = format!("{}/", scope_to_resource(scope).trim_end_matches('/'));

        let mut query = vec![("api-version", "2018-02-01"), ("resource", resource.as_str())];
        if let Some(client_id) = &self.client_id {
            query.push(("client_id", client_id.as_str()));
        }

        let response = self
            .http
            .get(&url)
            .header("Metadata", "true")
            .query(&query)
            .send()
            .await
            .map_err(|e| AzureError::Credential(format!("managed identity endpoint unreachable: {e}")))?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(AzureError::Credential(format!(
                "managed identity token request failed ({}): {}",
                status.as_u16(),
                token_error_description(&body)
            )));
        }

        let parsed: ManagedIdentityTokenResponse = serde_json::from_str(&body)?;
        let expires_on = parse_epoch(&parsed.expires_on).ok_or_else(|| {
            AzureError::Credential(format!("unparseable expires_on: {}", parsed.expires_on))
        })?;

        Ok(AccessToken::new(parsed.access_token, expires_on))
    }

    fn name(&self) -> &'static str {
        "ManagedIdentityCredential"
    }
}

/// Fixed token, handy for local development and tests
pub struct StaticTokenCredential {
    token: AccessToken,
}

impl StaticTokenCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: AccessToken::new(token, DateTime::<Utc>::MAX_UTC),
        }
    }
}

#[async_trait]
impl TokenCredential for StaticTokenCredential {
    async fn get_token(&self, _scope: &str) -> Result<AccessToken> {
        Ok(self.token.clone())
    }

    fn name(&self) -> &'static str {
        "StaticTokenCredential"
    }
}

/// Tries each source in order; the first token wins
pub struct ChainedCredential {
    sources: Vec<Arc<dyn TokenCredential>>,
}

impl ChainedCredential {
    pub fn new(sources: Vec<Arc<dyn TokenCredential>>) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl TokenCredential for ChainedCredential {
    async fn get_token(&self, scope: &str) -> Result<AccessToken> {
        let mut failures = Vec::with_capacity(self.sources.len());

        for source in &self.sources {
            match source.get_token(scope).await {
                Ok(token) => {
                    debug!(credential = source.name(), "Acquired token");
                    return Ok(token);
                }
                Err(e) => {
                    debug!(credential = source.name(), error = %e, "Credential source failed");
                    failures.push(format!("{}: {}", source.name(), e));
                }
            }
        }

        if failures.is_empty() {
            return Err(AzureError::Credential("no credential sources configured".into()));
        }
        Err(AzureError::Credential(failures.join("; ")))
    }

    fn name(&self) -> &'static str {
        "ChainedCredential"
    }
}

/// Per-scope token cache in front of another credential
pub struct CachedCredential {
    inner: Arc<dyn TokenCredential>,
    tokens: DashMap<String, AccessToken>,
}

impl CachedCredential {
    pub fn new(inner: Arc<dyn TokenCredential>) -> Self {
        Self {
            inner,
            tokens: DashMap::new(),
        }
    }
}

#[async_trait]
impl TokenCredential for CachedCredential {
    async fn get_token(&self, scope: &str) -> Result<AccessToken> {
        if let Some(token) = self.tokens.get(scope) {
            if !token.is_expiring(Duration::seconds(REFRESH_MARGIN_SECS)) {
                return Ok(token.clone());
            }
        }

        let token = self.inner.get_token(scope).await?;
        self.tokens.insert(scope.to_string(), token.clone());
        Ok(token)
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

/// Which identity source the service should use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    /// Client secret when configured, then managed identity
    #[default]
    Auto,
    ClientSecret,
    ManagedIdentity,
    Static,
}

/// Everything needed to build a credential
#[derive(Debug, Clone, Default)]
pub struct CredentialSettings {
    pub kind: CredentialKind,
    pub authority_host: String,
    pub imds_endpoint: String,
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub access_token: Option<String>,
}

/// Build the configured credential, wrapped in a token cache
pub fn build_credential(
    settings: &CredentialSettings,
    http: reqwest::Client,
) -> Result<Arc<dyn TokenCredential>> {
    let client_secret = || -> Option<Arc<dyn TokenCredential>> {
        match (&settings.tenant_id, &settings.client_id, &settings.client_secret) {
            (Some(tenant), Some(client), Some(secret)) => {
                let credential: Arc<dyn TokenCredential> = Arc::new(ClientSecretCredential::new(
                    http.clone(),
                    &settings.authority_host,
                    tenant,
                    client,
                    secret,
                ));
                Some(credential)
            }
            _ => None,
        }
    };
    let managed_identity = || -> Arc<dyn TokenCredential> {
        Arc::new(ManagedIdentityCredential::new(
            http.clone(),
            &settings.imds_endpoint,
            settings.client_id.clone(),
        ))
    };

    let inner: Arc<dyn TokenCredential> = match settings.kind {
        CredentialKind::Static => {
            let token = settings.access_token.as_ref().ok_or_else(|| {
                AzureError::Credential("static credential selected but no access token configured".into())
            })?;
            Arc::new(StaticTokenCredential::new(token))
        }
        CredentialKind::ClientSecret => client_secret().ok_or_else(|| {
            AzureError::Credential(
                "client secret credential requires tenant_id, client_id and client_secret".into(),
            )
        })?,
        CredentialKind::ManagedIdentity => managed_identity(),
        CredentialKind::Auto => {
            let mut sources = Vec::new();
            if let Some(source) = client_secret() {
                sources.push(source);
            } else {
                warn!("No client secret configured, falling back to managed identity");
            }
            sources.push(managed_identity());
            Arc::new(ChainedCredential::new(sources))
        }
    };

    Ok(Arc::new(CachedCredential::new(inner)))
}

fn token_error_description(body: &str) -> String {
    #[derive(Deserialize)]
    struct TokenError {
        error: Option<String>,
        error_description: Option<String>,
    }

    match serde_json::from_str::<TokenError>(body) {
        Ok(TokenError {
            error_description: Some(description),
            ..
        }) => description,
        Ok(TokenError { error: Some(error), .. }) => error,
        _ => body.trim().to_string(),
    }
}
