use anyhow::{Context, Result};
use ras_identity_oauth2::{FlowConfig, ProviderCredentials, providers};

/// Configuration for the federation server
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub url: String,
    pub issuer: String,
    pub jwt_secret: String,
    pub server_host: String,
    pub server_port: u16,
    pub http_timeout_seconds: u64,
    /// Catalog providers with both credentials set.
    pub providers: Vec<(String, ProviderCredentials)>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let server_port: u16 = env_or("SERVER_PORT", "8080")
            .parse()
            .context("SERVER_PORT must be a valid port number")?;

        Ok(Self {
            url: env_or("FEDERATION_URL", &format!("http://localhost:{server_port}")),
            issuer: env_or("FEDERATION_ISSUER", "ras-identity"),
            jwt_secret: std::env::var("JWT_SECRET")
                .context("JWT_SECRET environment variable is required")?,
            server_host: env_or("SERVER_HOST", "0.0.0.0"),
            server_port,
            http_timeout_seconds: env_or("HTTP_TIMEOUT_SECONDS", "10")
                .parse()
                .context("HTTP_TIMEOUT_SECONDS must be a number of seconds")?,
            providers: providers::NAMES
                .iter()
                .filter_map(|name| credentials(name).map(|c| (name.to_string(), c)))
                .collect(),
        })
    }

    pub fn flow_config(&self) -> FlowConfig {
        FlowConfig::new(self.url.clone())
            .with_issuer(self.issuer.clone())
            .with_http_timeout(self.http_timeout_seconds)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// `<NAME>_CLIENT_ID` and `<NAME>_CLIENT_SECRET`, if both are set.
fn credentials(name: &str) -> Option<ProviderCredentials> {
    let prefix = name.to_uppercase();
    let client_id = std::env::var(format!("{prefix}_CLIENT_ID")).ok()?;
    let client_secret = std::env::var(format!("{prefix}_CLIENT_SECRET")).ok()?;
    Some(ProviderCredentials::new(client_id, client_secret))
}
