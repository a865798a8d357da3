/// HTTP endpoint paths served in front of a store.
pub mod endpoints {
    pub const ADD: &str = "/add";
    pub const REDIRECT: &str = "/:key";
    pub const HEALTH: &str = "/v1/health";
}

/// Health check response.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub protocol_version: u32,
    /// `"primary"` or `"replica"`.
    pub role: String,
}

impl HealthResponse {
    pub fn for_role(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            ..Self::default()
        }
    }
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            protocol_version: super::message::PROTOCOL_VERSION,
            role: "primary".into(),
        }
    }
}
