use {
    crate::{DotPolicy, Error, Result},
    byte_unit::Byte,
    serde::Deserialize,
};

///
/// Configuration shared by every [`Router`](crate::Router), whatever the
/// engine underneath.
///
#[derive(Debug, Clone, Deserialize)]
pub struct RoutingConfig {
    /// Maximum number of `(method, path)` entries remembered by the shadow
    /// router before its cache is reset. Zero disables caching.
    /// By default `max_shadow_cache_size` is 10000.
    #[serde(default = "RoutingConfig::default_max_shadow_cache_size")]
    pub max_shadow_cache_size: usize,

    /// Largest request body that is buffered into the request state.
    /// Larger bodies are rejected with a 413 Payload Too Large response.
    /// By default `max_body_bytes` is 2MiB.
    #[serde(default = "RoutingConfig::default_max_body_bytes")]
    pub max_body_bytes: Byte,

    /// How the built-in mux engine handles dotted parameter names such as
    /// `:name.json`. One of `split`, `encode` or `verbatim` (the default).
    #[serde(default)]
    pub mux_dot_policy: DotPolicy,
}

impl RoutingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_body_bytes.as_u64() == 0 {
            return Err(Error::config("routing.max_body_bytes must be positive"));
        }
        Ok(())
    }

    fn default_max_shadow_cache_size() -> usize {
        10_000
    }

    fn default_max_body_bytes() -> Byte {
        Byte::from_u64(2 * 1024 * 1024)
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            max_shadow_cache_size: Self::default_max_shadow_cache_size(),
            max_body_bytes: Self::default_max_body_bytes(),
            mux_dot_policy: DotPolicy::default(),
        }
    }
}
