//! Configuration types for the page renderer.

use crate::error::{RendererError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How render requests are executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RenderMode {
    /// Pages are rendered on the calling thread, inside `request_page`.
    #[default]
    SingleThreaded,
    /// Pages are rendered on a dedicated background worker thread.
    MultiThreaded,
}

/// Configuration for a [`PageRenderer`](crate::PageRenderer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Initial render mode.
    /// Default: single threaded.
    pub render_mode: RenderMode,

    /// Name given to the background worker thread.
    /// Default: "page-render-worker".
    pub worker_thread_name: String,

    /// Reorder queued requests by priority instead of plain admission order.
    /// Requests of equal priority are always served first-in first-out.
    /// Default: false.
    pub priority_ordering: bool,

    /// Drop results of renders that were dispatched against a document
    /// which has since been replaced.
    /// Default: true.
    pub discard_stale_results: bool,

    /// Number of rendered pages kept by a [`PageImageCache`](crate::PageImageCache)
    /// built from this config.
    /// Default: 20.
    pub cache_capacity: usize,

    /// PNG compression level (0-9) used by `RenderResult::to_png`.
    /// Default: 1.
    pub png_compression: u8,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            render_mode: RenderMode::SingleThreaded,
            worker_thread_name: "page-render-worker".to_string(),
            priority_ordering: false,
            discard_stale_results: true,
            cache_capacity: 20,
            png_compression: 1,
        }
    }
}

impl RendererConfig {
    /// Create a config with the given render mode.
    pub fn with_render_mode(render_mode: RenderMode) -> Self {
        Self {
            render_mode,
            ..Default::default()
        }
    }

    /// Set the worker thread name.
    pub fn worker_thread_name(mut self, name: impl Into<String>) -> Self {
        self.worker_thread_name = name.into();
        self
    }

    /// Enable or disable priority ordering of the request queue.
    pub fn priority_ordering(mut self, enabled: bool) -> Self {
        self.priority_ordering = enabled;
        self
    }

    /// Enable or disable discarding of results rendered against a replaced document.
    pub fn discard_stale_results(mut self, enabled: bool) -> Self {
        self.discard_stale_results = enabled;
        self
    }

    /// Set the page image cache capacity.
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Set PNG compression level.
    pub fn png_compression(mut self, level: u8) -> Self {
        self.png_compression = level.min(9);
        self
    }

    /// Parse a config from JSON. Missing fields take their default values.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            RendererError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.worker_thread_name.is_empty() || self.worker_thread_name.contains('\0') {
            return Err(RendererError::InvalidConfig(
                "worker_thread_name must be non-empty and free of NUL bytes".to_string(),
            ));
        }
        if self.cache_capacity == 0 {
            return Err(RendererError::InvalidConfig(
                "cache_capacity must be at least 1".to_string(),
            ));
        }
        if self.png_compression > 9 {
            return Err(RendererError::InvalidConfig(
                "png_compression must be between 0 and 9".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renderer_config_defaults() {
        let config = RendererConfig::default();
        assert_eq!(config.render_mode, RenderMode::SingleThreaded);
        assert_eq!(config.worker_thread_name, "page-render-worker");
        assert!(!config.priority_ordering);
        assert!(config.discard_stale_results);
        assert_eq!(config.cache_capacity, 20);
        assert_eq!(config.png_compression, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_render_mode_default_is_single_threaded() {
        assert_eq!(RenderMode::default(), RenderMode::SingleThreaded);
    }

    #[test]
    fn test_renderer_config_builder_pattern() {
        let config = RendererConfig::with_render_mode(RenderMode::MultiThreaded)
            .worker_thread_name("thumbs")
            .priority_ordering(true)
            .discard_stale_results(false)
            .cache_capacity(64)
            .png_compression(6);

        assert_eq!(config.render_mode, RenderMode::MultiThreaded);
        assert_eq!(config.worker_thread_name, "thumbs");
        assert!(config.priority_ordering);
        assert!(!config.discard_stale_results);
        assert_eq!(config.cache_capacity, 64);
        assert_eq!(config.png_compression, 6);
    }

    #[test]
    fn test_renderer_config_png_compression_clamped() {
        let config = RendererConfig::default().png_compression(15);
        assert_eq!(config.png_compression, 9);
    }

    #[test]
    fn test_renderer_config_validation_zero_cache() {
        let config = RendererConfig::default().cache_capacity(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_renderer_config_validation_thread_name() {
        let mut config = RendererConfig::default();
        config.worker_thread_name = String::new();
        assert!(config.validate().is_err());

        config.worker_thread_name = "bad\0name".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_renderer_config_validation_compression_out_of_range() {
        let mut config = RendererConfig::default();
        config.png_compression = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_renderer_config_from_partial_json() {
        let config =
            RendererConfig::from_json_str(r#"{ "render_mode": "MultiThreaded", "cache_capacity": 8 }"#)
                .unwrap();
        assert_eq!(config.render_mode, RenderMode::MultiThreaded);
        assert_eq!(config.cache_capacity, 8);
        assert_eq!(config.worker_thread_name, "page-render-worker");
        assert!(config.discard_stale_results);
    }

    #[test]
    fn test_renderer_config_from_json_rejects_invalid_values() {
        let result = RendererConfig::from_json_str(r#"{ "cache_capacity": 0 }"#);
        assert!(matches!(result, Err(RendererError::InvalidConfig(_))));
    }

    #[test]
    fn test_renderer_config_from_json_rejects_garbage() {
        let result = RendererConfig::from_json_str("render_mode = 'fast'");
        assert!(matches!(result, Err(RendererError::ConfigParse(_))));
    }

    #[test]
    fn test_renderer_config_from_missing_file() {
        let result = RendererConfig::from_json_file(Path::new("/nonexistent/renderer.json"));
        assert!(matches!(result, Err(RendererError::InvalidConfig(_))));
    }
}
