/// Configuration types for the copy pipeline.
///
/// This module defines the user-facing settings (translation, interception)
/// and the operational knobs (timeouts, cache size) consumed by the
/// orchestrator, plus the [`ConfigStore`] seam through which they are loaded.
use crate::common::{Error, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration options for a copy request.
///
/// # Examples
///
/// ```rust
/// use officeclip::config::CopyConfig;
///
/// let config = CopyConfig::new()
///     .with_translation(true)
///     .with_target_language("de")
///     .with_cache_capacity(256);
/// assert_eq!(config.translation.target_language, "de");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CopyConfig {
    /// Translation settings for translate-then-copy
    pub translation: TranslationConfig,
    /// Whether native copy events are intercepted and routed through the pipeline
    pub intercept_copy: bool,
    /// Whether the page URL is embedded as `SourceURL` in CF_HTML
    pub include_source_url: bool,
    /// Time budgets for every suspend point
    pub timeouts: TimeoutConfig,
    /// Conversion cache sizing
    pub cache: CacheConfig,
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self {
            translation: TranslationConfig::default(),
            intercept_copy: false,
            include_source_url: true,
            timeouts: TimeoutConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl CopyConfig {
    /// Create a new `CopyConfig` with default values.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable translate-then-copy.
    #[inline]
    pub fn with_translation(mut self, enabled: bool) -> Self {
        self.translation.enabled = enabled;
        self
    }

    /// Set the translation target language (BCP-47 tag such as `de` or `zh-CN`).
    #[inline]
    pub fn with_target_language(mut self, lang: impl Into<String>) -> Self {
        self.translation.target_language = lang.into();
        self
    }

    /// Select the translation service identifier.
    #[inline]
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.translation.service = service.into();
        self
    }

    /// Translate formula text (`\text{...}`) separately instead of keeping it verbatim.
    #[inline]
    pub fn with_formula_translation(mut self, enabled: bool) -> Self {
        self.translation.translate_formulas = enabled;
        self
    }

    /// Toggle copy-event interception.
    #[inline]
    pub fn with_interception(mut self, enabled: bool) -> Self {
        self.intercept_copy = enabled;
        self
    }

    /// Replace all timeouts.
    #[inline]
    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set the conversion cache capacity.
    #[inline]
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache.capacity = capacity;
        self
    }

    /// Parse a configuration from YAML. Missing keys keep their defaults.
    ///
    /// ```rust
    /// use officeclip::config::CopyConfig;
    ///
    /// let config = CopyConfig::from_yaml("translation:\n  enabled: true\n").unwrap();
    /// assert!(config.translation.enabled);
    /// assert_eq!(config.cache.capacity, 100);
    /// ```
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_saphyr::from_str(yaml).map_err(|e| Error::Config(e.to_string()))
    }

    /// Serialize the configuration to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        serde_saphyr::to_string(self).map_err(|e| Error::Config(e.to_string()))
    }
}

/// Translation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    /// Whether translate-then-copy is active
    pub enabled: bool,
    /// Target language tag
    pub target_language: String,
    /// Service identifier understood by the translator
    pub service: String,
    /// Translate formula text separately when the service supports it
    pub translate_formulas: bool,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            target_language: "en".to_string(),
            service: "google".to_string(),
            translate_formulas: false,
        }
    }
}

/// Time budgets in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// One TeX conversion on any backend
    pub conversion_ms: u64,
    /// Loading a backend (engine script, cross-context worker)
    pub backend_load_ms: u64,
    /// One translation call
    pub translation_ms: u64,
    /// One message bus round-trip
    pub bus_ms: u64,
    /// One clipboard write attempt
    pub clipboard_ms: u64,
    /// Interval between readiness probes
    pub ready_poll_ms: u64,
    /// Deadline for an engine to announce readiness
    pub ready_deadline_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            conversion_ms: 4_000,
            backend_load_ms: 8_000,
            translation_ms: 30_000,
            bus_ms: 5_000,
            clipboard_ms: 3_000,
            ready_poll_ms: 50,
            ready_deadline_ms: 8_000,
        }
    }
}

impl TimeoutConfig {
    #[inline]
    pub fn conversion(&self) -> Duration {
        Duration::from_millis(self.conversion_ms)
    }

    #[inline]
    pub fn backend_load(&self) -> Duration {
        Duration::from_millis(self.backend_load_ms)
    }

    /// Budget for a conversion that may first have to load its backend.
    #[inline]
    pub fn cross_context(&self) -> Duration {
        self.backend_load().max(self.conversion())
    }

    #[inline]
    pub fn translation(&self) -> Duration {
        Duration::from_millis(self.translation_ms)
    }

    #[inline]
    pub fn bus(&self) -> Duration {
        Duration::from_millis(self.bus_ms)
    }

    #[inline]
    pub fn clipboard(&self) -> Duration {
        Duration::from_millis(self.clipboard_ms)
    }

    #[inline]
    pub fn ready_poll(&self) -> Duration {
        Duration::from_millis(self.ready_poll_ms)
    }

    #[inline]
    pub fn ready_deadline(&self) -> Duration {
        Duration::from_millis(self.ready_deadline_ms)
    }
}

/// Conversion cache sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached conversions
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { capacity: 100 }
    }
}

/// Asynchronous settings storage.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Load the current configuration.
    async fn get_config(&self) -> Result<CopyConfig>;

    /// Persist a new configuration.
    async fn set_config(&self, config: CopyConfig) -> Result<()>;
}

/// In-process configuration store.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    inner: RwLock<CopyConfig>,
}

impl MemoryConfigStore {
    pub fn new(config: CopyConfig) -> Self {
        Self {
            inner: RwLock::new(config),
        }
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn get_config(&self) -> Result<CopyConfig> {
        Ok(self.inner.read().clone())
    }

    async fn set_config(&self, config: CopyConfig) -> Result<()> {
        *self.inner.write() = config;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CopyConfig::default();
        assert!(!config.translation.enabled);
        assert_eq!(config.cache.capacity, 100);
        assert_eq!(config.timeouts.cross_context(), Duration::from_millis(8_000));
    }

    #[test]
    fn test_yaml_roundtrip_keeps_values() {
        let config = CopyConfig::new()
            .with_translation(true)
            .with_target_language("fr")
            .with_service("deepl")
            .with_cache_capacity(7);
        let yaml = config.to_yaml().unwrap();
        let back = CopyConfig::from_yaml(&yaml).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_yaml_rejects_garbage() {
        assert!(matches!(
            CopyConfig::from_yaml("translation: [1, 2"),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryConfigStore::default();
        assert!(!store.get_config().await.unwrap().intercept_copy);
        store
            .set_config(CopyConfig::new().with_interception(true))
            .await
            .unwrap();
        assert!(store.get_config().await.unwrap().intercept_copy);
    }
}
