use serde::{Deserialize, Serialize};

pub const DEFAULT_REGISTRY_URL: &str = "https://registry.chitty.cc";
pub const DEFAULT_ROUTER_URL: &str = "https://router.chitty.cc";
pub const DEFAULT_HEARTBEAT_MARKER: &str = "registry.chitty.cc/api/v1/heartbeat";
pub const DEFAULT_AUTH_PROVIDER: &str = "chittyauth";
pub const DEFAULT_PROVISIONS: [&str; 4] = [
    "chitty_id",
    "chitty_auth_token",
    "chitty_trust_score",
    "chitty_cert",
];

/// Ecosystem-wide facts the checks compare against. Passed in explicitly so an
/// audit is reproducible from its inputs alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcosystemConfig {
    pub registry_url: String,
    pub router_url: String,
    pub registry_heartbeat_marker: String,
    pub required_provisions: Vec<String>,
    pub auth_provider: String,
}

impl Default for EcosystemConfig {
    fn default() -> Self {
        Self {
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            router_url: DEFAULT_ROUTER_URL.to_string(),
            registry_heartbeat_marker: DEFAULT_HEARTBEAT_MARKER.to_string(),
            required_provisions: DEFAULT_PROVISIONS.iter().map(|p| p.to_string()).collect(),
            auth_provider: DEFAULT_AUTH_PROVIDER.to_string(),
        }
    }
}

impl EcosystemConfig {
    pub fn service_lookup_url(&self, service: &str) -> String {
        format!(
            "{}/api/v1/services/{}",
            self.registry_url.trim_end_matches('/'),
            service
        )
    }

    pub fn route_lookup_url(&self, domain: &str) -> String {
        format!(
            "{}/api/v1/routes/{}",
            self.router_url.trim_end_matches('/'),
            domain
        )
    }

    /// Domains may carry an explicit scheme (useful for staging hosts); bare
    /// domains are probed over HTTPS.
    pub fn health_url(&self, domain: &str) -> String {
        let base = if domain.starts_with("http://") || domain.starts_with("https://") {
            domain.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", domain.trim_end_matches('/'))
        };
        format!("{}/health", base)
    }
}
