use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::core::app_error::AppError;

/// The authenticated identity attached to a request once its bearer
/// credential has been verified.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthIdentity {
    pub email: String,
}

/// Verifies a bearer credential with the external token-issuing service.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<AuthIdentity, AppError>;
}

pub struct HttpTokenVerifier {
    client: Client,
    verify_url: String,
}

impl HttpTokenVerifier {
    pub fn new(client: Client, verify_url: String) -> Self {
        Self { client, verify_url }
    }
}

#[async_trait]
impl TokenVerifier for HttpTokenVerifier {
    async fn verify(&self, token: &str) -> Result<AuthIdentity, AppError> {
        let res = self
            .client
            .get(&self.verify_url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|_| AppError::ServiceUnreachable("IdentityService".into()))?;

        if !res.status().is_success() {
            return Err(AppError::Unauthorized("Invalid access token".into()));
        }

        let identity: AuthIdentity = res
            .json()
            .await
            .context("Failed to parse identity response")?;

        Ok(identity)
    }
}
