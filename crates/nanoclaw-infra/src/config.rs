//! Engine configuration loader.
//!
//! Reads `.nanoclaw/config.toml` under the project root and deserializes it
//! into [`EngineConfig`]. Falls back to defaults when the file is missing or
//! malformed, so a broken config never blocks an apply.

use std::path::Path;

use nanoclaw_types::config::EngineConfig;
use nanoclaw_types::state::config_path;

/// Load engine configuration for the project at `project_root`.
///
/// - Missing file: [`EngineConfig::default()`].
/// - Unreadable or unparsable file: logs a warning and returns the default.
pub async fn load_engine_config(project_root: &Path) -> EngineConfig {
    let path = config_path(project_root);

    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", path.display());
            return EngineConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", path.display());
            return EngineConfig::default();
        }
    };

    match toml::from_str::<EngineConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", path.display());
            EngineConfig::default()
        }
    }
}
