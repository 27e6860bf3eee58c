use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Commands and limits for [`ProcessSandbox`](super::ProcessSandbox).
/// Read from the `[sandbox]` section of `.genforge/genforge.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxConfig {
    #[serde(default = "default_install_cmd")]
    pub install_cmd: String,
    #[serde(default = "default_build_cmd")]
    pub build_cmd: String,
    /// `{port}` is replaced with the port picked for the preview server.
    #[serde(default = "default_serve_cmd")]
    pub serve_cmd: String,
    /// Limit for each individual sandbox operation.
    #[serde(default = "default_op_timeout_secs")]
    pub op_timeout_secs: u64,
    /// Parent directory for sandbox working directories (system temp dir if unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_root: Option<PathBuf>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

fn default_install_cmd() -> String {
    "npm install".to_string()
}

fn default_build_cmd() -> String {
    "npm run build".to_string()
}

fn default_serve_cmd() -> String {
    "npx vite preview --host 127.0.0.1 --port {port}".to_string()
}

fn default_op_timeout_secs() -> u64 {
    300
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            install_cmd: default_install_cmd(),
            build_cmd: default_build_cmd(),
            serve_cmd: default_serve_cmd(),
            op_timeout_secs: default_op_timeout_secs(),
            work_root: None,
            env: HashMap::new(),
        }
    }
}

impl SandboxConfig {
    pub fn op_timeout(&self) -> Duration {
        Duration::from_secs(self.op_timeout_secs)
    }

    pub fn serve_command(&self, port: u16) -> String {
        self.serve_cmd.replace("{port}", &port.to_string())
    }

    pub fn work_root(&self) -> PathBuf {
        self.work_root
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("genforge"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Wrapper {
        #[serde(default)]
        sandbox: SandboxConfig,
    }

    #[test]
    fn test_sandbox_config_defaults() {
        let config = SandboxConfig::default();
        assert_eq!(config.install_cmd, "npm install");
        assert_eq!(config.build_cmd, "npm run build");
        assert_eq!(config.op_timeout(), Duration::from_secs(300));
        assert!(config.work_root.is_none());
        assert!(config.env.is_empty());
    }

    #[test]
    fn test_sandbox_config_load_full() {
        let parsed: Wrapper = toml::from_str(
            r#"
[sandbox]
install_cmd = "pnpm install"
build_cmd = "pnpm build"
serve_cmd = "pnpm preview --port {port}"
op_timeout_secs = 60
work_root = "/var/tmp/gf"

[sandbox.env]
NODE_ENV = "production"
"#,
        )
        .unwrap();
        let config = parsed.sandbox;
        assert_eq!(config.install_cmd, "pnpm install");
        assert_eq!(config.serve_command(4173), "pnpm preview --port 4173");
        assert_eq!(config.op_timeout_secs, 60);
        assert_eq!(config.work_root(), PathBuf::from("/var/tmp/gf"));
        assert_eq!(config.env.get("NODE_ENV").unwrap(), "production");
    }

    #[test]
    fn test_sandbox_config_load_partial() {
        let parsed: Wrapper = toml::from_str("[sandbox]\nbuild_cmd = \"make\"\n").unwrap();
        assert_eq!(parsed.sandbox.build_cmd, "make");
        assert_eq!(parsed.sandbox.install_cmd, "npm install"); // default
        assert_eq!(parsed.sandbox.op_timeout_secs, 300); // default
    }

    #[test]
    fn test_sandbox_config_load_empty_section() {
        let parsed: Wrapper = toml::from_str("").unwrap();
        assert_eq!(parsed.sandbox, SandboxConfig::default());
    }

    #[test]
    fn test_default_work_root_under_temp_dir() {
        assert!(SandboxConfig::default().work_root().starts_with(std::env::temp_dir()));
    }
}
