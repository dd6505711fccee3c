use serde::{Deserialize, Serialize};

use super::hydrate::Hydrate;
use super::port::Port;

/// Metrics listener port used when none is stored
pub const DEFAULT_STATS_PORT: u16 = 18688;

/// Engine-wide tunables (`ray_common_config.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RayCommonConfig {
    /// debug / info / warning / error / none
    pub ray_log_level: String,

    pub stats_enable: bool,
    pub stats_port: Port,

    pub socks_enable: bool,
    pub http_enable: bool,

    pub socks_udp: bool,
    pub socks_sniffing: bool,
    pub socks_sniffing_dest_override: Vec<String>,

    pub outbounds_mux: bool,
    pub outbounds_concurrency: i64,
}

impl Default for RayCommonConfig {
    fn default() -> Self {
        Self {
            ray_log_level: "warning".to_string(),
            stats_enable: false,
            stats_port: Port::new(DEFAULT_STATS_PORT),
            socks_enable: true,
            http_enable: true,
            socks_udp: true,
            socks_sniffing: true,
            socks_sniffing_dest_override: vec!["http".to_string(), "tls".to_string()],
            outbounds_mux: false,
            outbounds_concurrency: 8,
        }
    }
}

impl Hydrate for RayCommonConfig {
    const KIND: &'static str = "ray common config";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_older_config_gains_new_fields() {
        let config = RayCommonConfig::hydrate(json!({"ray_log_level": "debug", "stats_port": ""})).unwrap();
        assert_eq!(config.ray_log_level, "debug");
        assert!(!config.stats_port.is_set());
        assert_eq!(config.outbounds_concurrency, 8);
        assert_eq!(config.socks_sniffing_dest_override, vec!["http", "tls"]);
    }
}
