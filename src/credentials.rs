//! Identity token acquisition.
//!
//! A [`TokenProvider`] is built once per process and handed to every flow
//! and to the workflow poller. Nothing in the crate reads ambient credentials
//! except through this trait.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_TOKEN_ENV: &str = "DRSPROBE_ACCESS_TOKEN";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("no credential configured (set {env} or log in with gcloud)")]
    NotConfigured { env: String },

    #[error("failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("credential source returned an empty token")]
    EmptyToken,
}

/// Source of bearer tokens for the current principal.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> Result<String, CredentialError>;

    /// Short label for log lines.
    fn describe(&self) -> String;
}

/// A fixed token.
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticToken(<redacted>)")
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Result<String, CredentialError> {
        non_empty(self.0.clone())
    }

    fn describe(&self) -> String {
        "static".to_string()
    }
}

/// Token taken from an environment variable at call time.
#[derive(Debug, Clone)]
pub struct EnvToken {
    var: String,
}

impl EnvToken {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

#[async_trait]
impl TokenProvider for EnvToken {
    async fn token(&self) -> Result<String, CredentialError> {
        match std::env::var(&self.var) {
            Ok(v) => non_empty(v),
            Err(_) => Err(CredentialError::NotConfigured { env: self.var.clone() }),
        }
    }

    fn describe(&self) -> String {
        format!("env:{}", self.var)
    }
}

/// Application-default Google credential, via `gcloud auth print-access-token`.
#[derive(Debug, Clone)]
pub struct GcloudToken {
    program: String,
}

impl GcloudToken {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }
}

#[async_trait]
impl TokenProvider for GcloudToken {
    async fn token(&self) -> Result<String, CredentialError> {
        let output = tokio::process::Command::new(&self.program)
            .args(["auth", "print-access-token"])
            .output()
            .await
            .map_err(|source| CredentialError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(CredentialError::CommandFailed {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        non_empty(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn describe(&self) -> String {
        format!("gcloud:{}", self.program)
    }
}

/// Tries each provider in order and returns the first token obtained.
pub struct ChainedTokenProvider {
    providers: Vec<Arc<dyn TokenProvider>>,
    env_hint: String,
}

impl ChainedTokenProvider {
    pub fn new(providers: Vec<Arc<dyn TokenProvider>>, env_hint: impl Into<String>) -> Self {
        Self {
            providers,
            env_hint: env_hint.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for ChainedTokenProvider {
    async fn token(&self) -> Result<String, CredentialError> {
        for provider in &self.providers {
            match provider.token().await {
                Ok(token) => return Ok(token),
                Err(e) => debug!(source = %provider.describe(), error = %e, "Credential source unavailable"),
            }
        }
        Err(CredentialError::NotConfigured {
            env: self.env_hint.clone(),
        })
    }

    fn describe(&self) -> String {
        let names: Vec<String> = self.providers.iter().map(|p| p.describe()).collect();
        format!("chain[{}]", names.join(", "))
    }
}

fn non_empty(token: String) -> Result<String, CredentialError> {
    if token.trim().is_empty() {
        Err(CredentialError::EmptyToken)
    } else {
        Ok(token)
    }
}

/// Ambient credential chain: the environment variable first, then gcloud.
pub fn ambient(token_env: &str, gcloud_path: &str) -> Arc<dyn TokenProvider> {
    Arc::new(ChainedTokenProvider::new(
        vec![
            Arc::new(EnvToken::new(token_env)),
            Arc::new(GcloudToken::new(gcloud_path)),
        ],
        token_env,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token() {
        assert_eq!(StaticToken::new("abc").token().await.unwrap(), "abc");
        assert!(matches!(StaticToken::new("  ").token().await, Err(CredentialError::EmptyToken)));
    }

    #[tokio::test]
    async fn test_env_token_missing() {
        let p = EnvToken::new("DRSPROBE_TEST_SURELY_UNSET_VAR");
        assert!(matches!(p.token().await, Err(CredentialError::NotConfigured { .. })));
    }

    #[tokio::test]
    async fn test_gcloud_missing_binary() {
        let p = GcloudToken::new("/nonexistent/gcloud");
        assert!(matches!(p.token().await, Err(CredentialError::Spawn { .. })));
    }

    #[tokio::test]
    async fn test_chain_falls_through() {
        let chain = ChainedTokenProvider::new(
            vec![
                Arc::new(EnvToken::new("DRSPROBE_TEST_SURELY_UNSET_VAR")),
                Arc::new(StaticToken::new("fallback")),
            ],
            "DRSPROBE_TEST_SURELY_UNSET_VAR",
        );
        assert_eq!(chain.token().await.unwrap(), "fallback");
        assert!(chain.describe().starts_with("chain[env:"));
    }

    #[tokio::test]
    async fn test_chain_exhausted() {
        let chain = ChainedTokenProvider::new(
            vec![Arc::new(GcloudToken::new("/nonexistent/gcloud"))],
            "SOME_VAR",
        );
        let err = chain.token().await.unwrap_err();
        assert!(err.to_string().contains("SOME_VAR"));
    }

    #[test]
    fn test_static_token_debug_redacts() {
        assert_eq!(format!("{:?}", StaticToken::new("secret")), "StaticToken(<redacted>)");
    }
}
