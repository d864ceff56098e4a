use serde::Deserialize;

/// Read-only analysis options. The engine consumes these as opaque flags;
/// the CLI can populate them from a JSON file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Skip call-site re-analysis and don't retain body AST handles on
    /// declarations. A throughput/precision trade-off, not an algorithmic
    /// branch.
    pub quick_mode: bool,
    /// Writing to an undeclared property synthesizes it instead of
    /// reporting it.
    pub allow_undeclared_property_write: bool,
    /// Maximum depth for call-site re-analysis of callees with undeclared
    /// parameter types.
    pub recursion_depth_cap: usize,
    /// Report ineffective statements (bare variables/literals) as NoOp.
    pub dead_code_detection: bool,
    /// Target runtime version; builtins introduced later are Availability
    /// issues at their use sites.
    pub target_version: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            quick_mode: false,
            allow_undeclared_property_write: false,
            recursion_depth_cap: 2,
            dead_code_detection: false,
            target_version: "8.0".to_string(),
        }
    }
}

impl Config {
    /// Parses a version string like `"7.4"` into a comparable pair.
    pub(crate) fn version_pair(version: &str) -> (u32, u32) {
        let mut parts = version.splitn(2, '.');
        let major = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
        let minor = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
        (major, minor)
    }

    pub(crate) fn supports_version(&self, required: &str) -> bool {
        Self::version_pair(&self.target_version) >= Self::version_pair(required)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_comparison() {
        let config = Config {
            target_version: "7.4".to_string(),
            ..Config::default()
        };
        assert!(config.supports_version("7.0"));
        assert!(config.supports_version("7.4"));
        assert!(!config.supports_version("8.0"));
    }
}
