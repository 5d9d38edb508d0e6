//! Bridge adapter configuration.

/// Static values the adapter reports or stamps on responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Application protocol version reported by `Info`.
    pub app_version: u64,
    /// Software version string reported by `Info`.
    pub version: String,
    /// Priority attached to every admitted transaction.
    pub check_priority: i64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            app_version: 1,
            version: env!("CARGO_PKG_VERSION").to_string(),
            check_priority: 10,
        }
    }
}
