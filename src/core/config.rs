use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub cors_origin: String,
}

#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    pub api_base: String,
    pub secret_key: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub verify_url: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub checkout: CheckoutConfig,
    pub identity: IdentityConfig,
}

pub fn load() -> Result<Config> {
    Ok(Config {
        database: DatabaseConfig {
            url: required("DATABASE_URL")?,
        },
        server: ServerConfig {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".into())
                .parse()
                .context("PORT must be a number")?,
            cors_origin: std::env::var("CORS_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:5173".into()),
        },
        checkout: CheckoutConfig {
            api_base: std::env::var("CHECKOUT_API_BASE")
                .unwrap_or_else(|_| "https://api.stripe.com".into()),
            secret_key: required("STRIPE_SECRET_KEY")?,
            success_url: required("CHECKOUT_SUCCESS_URL")?,
            cancel_url: required("CHECKOUT_CANCEL_URL")?,
        },
        identity: IdentityConfig {
            verify_url: required("AUTH_VERIFY_URL")?,
        },
    })
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("{key} must be set"))
}
