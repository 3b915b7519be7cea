//! Configuration for the context engine.
//!
//! This module provides TOML-based configuration for assembly thresholds and
//! per-model capabilities. Sources are merged in order:
//! - Bundled defaults (include_str! from fabula.toml)
//! - User config in home directory (~/.config/fabula/fabula.toml)
//! - User config in current directory (./fabula.toml)
//!
//! Model behaviour is driven by explicit capability flags, never by matching
//! substrings of the model name.

use config::{Config, File, FileFormat};
use fabula_core::CacheTtl;
use fabula_error::{ConfigError, FabulaError, FabulaResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, instrument};

/// Bundled default configuration.
const DEFAULT_CONFIG: &str = include_str!("../fabula.toml");

/// What a model does with an assembled context.
///
/// # Examples
///
/// ```
/// use fabula_context::ModelCapabilities;
///
/// let caps = ModelCapabilities::builder()
///     .supports_prompt_caching(true)
///     .treats_current_container_as_always_full(true)
///     .context_window(Some(200_000))
///     .build()
///     .unwrap();
///
/// assert!(*caps.supports_prompt_caching());
/// assert_eq!(*caps.context_window(), Some(200_000));
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    derive_builder::Builder,
    derive_getters::Getters,
)]
#[builder(default)]
pub struct ModelCapabilities {
    /// The provider honours `cache_control` hints
    #[serde(default)]
    supports_prompt_caching: bool,
    /// Messages of the chapter being written are always sent verbatim
    #[serde(default)]
    treats_current_container_as_always_full: bool,
    /// Context window in tokens, when known
    #[serde(default)]
    context_window: Option<usize>,
}

impl ModelCapabilities {
    /// Creates a new capabilities builder.
    pub fn builder() -> ModelCapabilitiesBuilder {
        ModelCapabilitiesBuilder::default()
    }
}

/// A model id together with its resolved capabilities.
///
/// This is what the assembler receives in place of a bare model name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_getters::Getters)]
pub struct ModelProfile {
    /// Model identifier passed to the backend
    id: String,
    /// Provider name
    provider: String,
    /// Resolved capabilities
    capabilities: ModelCapabilities,
}

impl ModelProfile {
    /// Creates a profile from its parts.
    pub fn new(
        id: impl Into<String>,
        provider: impl Into<String>,
        capabilities: ModelCapabilities,
    ) -> Self {
        Self {
            id: id.into(),
            provider: provider.into(),
            capabilities,
        }
    }

    /// Whether cache hints should be attached.
    pub fn caches_prompts(&self) -> bool {
        self.capabilities.supports_prompt_caching
    }

    /// Whether the current container bypasses tiering.
    pub fn current_container_always_full(&self) -> bool {
        self.capabilities.treats_current_container_as_always_full
    }
}

impl Default for ModelProfile {
    fn default() -> Self {
        Self::new("unknown", "unknown", ModelCapabilities::default())
    }
}

/// Model-specific capability overrides.
///
/// Only specified fields override the provider defaults.
///
/// ```toml
/// [providers.openrouter.models."anthropic/claude-sonnet-4"]
/// supports_prompt_caching = true
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCapabilityOverrides {
    /// Overrides `supports_prompt_caching`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supports_prompt_caching: Option<bool>,
    /// Overrides `treats_current_container_as_always_full`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub treats_current_container_as_always_full: Option<bool>,
    /// Overrides `context_window`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_window: Option<usize>,
}

/// Capability defaults for every model of one provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider-level `supports_prompt_caching`
    #[serde(default)]
    pub supports_prompt_caching: bool,
    /// Provider-level `treats_current_container_as_always_full`
    #[serde(default)]
    pub treats_current_container_as_always_full: bool,
    /// Provider-level context window
    #[serde(default)]
    pub context_window: Option<usize>,
    /// Per-model overrides keyed by model id
    #[serde(default)]
    pub models: HashMap<String, ModelCapabilityOverrides>,
}

impl ProviderConfig {
    /// Capabilities for `model_name` with its overrides applied.
    pub fn for_model(&self, model_name: &str) -> ModelCapabilities {
        let defaults = ModelCapabilities {
            supports_prompt_caching: self.supports_prompt_caching,
            treats_current_container_as_always_full: self.treats_current_container_as_always_full,
            context_window: self.context_window,
        };

        match self.models.get(model_name) {
            Some(overrides) => ModelCapabilities {
                supports_prompt_caching: overrides
                    .supports_prompt_caching
                    .unwrap_or(defaults.supports_prompt_caching),
                treats_current_container_as_always_full: overrides
                    .treats_current_container_as_always_full
                    .unwrap_or(defaults.treats_current_container_as_always_full),
                context_window: overrides.context_window.or(defaults.context_window),
            },
            None => defaults,
        }
    }
}

/// Thresholds used while assembling and estimating context.
///
/// Missing keys fall back to the bundled defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
#[serde(default)]
pub struct ContextSettings {
    /// `turns_from_end` above this uses the sentence summary
    sentence_summary_after: usize,
    /// `turns_from_end` above this uses the paragraph summary
    paragraph_summary_after: usize,
    /// Largest flat story accepted for always-full models
    flat_story_limit: usize,
    /// Trailing narrative blocks of the current container carrying cache hints
    cached_tail: usize,
    /// Lifetime of attached cache hints
    cache_ttl: CacheTtl,
    /// Default number of prior Q&A pairs replayed in query contexts
    max_query_history: usize,
    /// Upper bound for the smart-context analyzer, in milliseconds
    smart_context_timeout_ms: u64,
    /// Characters per token used by estimates
    chars_per_token: f64,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            sentence_summary_after: 14,
            paragraph_summary_after: 7,
            flat_story_limit: 50,
            cached_tail: 3,
            cache_ttl: CacheTtl::OneHour,
            max_query_history: 5,
            smart_context_timeout_ms: 30_000,
            chars_per_token: 4.0,
        }
    }
}

impl ContextSettings {
    /// Checks that the thresholds are usable.
    ///
    /// # Errors
    ///
    /// Returns an error when the paragraph threshold exceeds the sentence
    /// threshold (tiers would no longer degrade with distance) or when
    /// `chars_per_token` is not positive.
    pub fn validate(&self) -> FabulaResult<()> {
        if self.paragraph_summary_after > self.sentence_summary_after {
            return Err(FabulaError::from(ConfigError::new(format!(
                "paragraph_summary_after ({}) must not exceed sentence_summary_after ({})",
                self.paragraph_summary_after, self.sentence_summary_after
            ))));
        }
        if self.chars_per_token.is_nan() || self.chars_per_token <= 0.0 {
            return Err(FabulaError::from(ConfigError::new(format!(
                "chars_per_token must be positive, got {}",
                self.chars_per_token
            ))));
        }
        Ok(())
    }

    /// Returns the settings with different tier thresholds.
    pub fn with_tier_thresholds(mut self, sentence_after: usize, paragraph_after: usize) -> Self {
        self.sentence_summary_after = sentence_after;
        self.paragraph_summary_after = paragraph_after;
        self
    }

    /// Returns the settings with a different flat-story limit.
    pub fn with_flat_story_limit(mut self, limit: usize) -> Self {
        self.flat_story_limit = limit;
        self
    }

    /// Returns the settings with a different smart-context timeout.
    pub fn with_smart_context_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.smart_context_timeout_ms = timeout_ms;
        self
    }
}

/// A genre offered to authors, used by the story system prompt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorySetting {
    /// Stored value, e.g. "science-fiction"
    pub value: String,
    /// Display label, e.g. "Science Fiction"
    pub label: String,
}

/// Top-level Fabula configuration.
///
/// # Example
///
/// ```no_run
/// use fabula_context::FabulaConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = FabulaConfig::load()?;
/// let profile = config.capabilities("anthropic", "claude-sonnet-4-5");
/// assert!(profile.caches_prompts());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FabulaConfig {
    /// Assembly thresholds
    #[serde(default)]
    pub context: ContextSettings,

    /// Map of provider name to capability configuration
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Genres known to the story prompt
    #[serde(default)]
    pub story_settings: Vec<StorySetting>,
}

impl FabulaConfig {
    /// Load configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<std::path::Path>) -> FabulaResult<Self> {
        debug!("Loading configuration from file");

        let config: Self = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .map_err(|e| {
                FabulaError::from(ConfigError::new(format!(
                    "Failed to read configuration from {}: {}",
                    path.as_ref().display(),
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                FabulaError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })?;

        config.context.validate()?;
        Ok(config)
    }

    /// Load configuration with precedence: current dir > home dir > bundled defaults.
    ///
    /// User config files are optional and silently skipped when absent.
    #[instrument]
    pub fn load() -> FabulaResult<Self> {
        debug!("Loading configuration with precedence: current dir > home dir > bundled defaults");

        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/fabula/fabula.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder.add_source(File::with_name("fabula").required(false));

        let config: Self = builder
            .build()
            .map_err(|e| {
                FabulaError::from(ConfigError::new(format!(
                    "Failed to build configuration: {}",
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                FabulaError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })?;

        config.context.validate()?;
        Ok(config)
    }

    /// The bundled defaults only, ignoring user files.
    ///
    /// # Errors
    ///
    /// Returns an error if the bundled file fails to parse, which indicates a
    /// packaging problem.
    pub fn bundled() -> FabulaResult<Self> {
        Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| {
                FabulaError::from(ConfigError::new(format!(
                    "Failed to parse bundled configuration: {}",
                    e
                )))
            })
    }

    /// Resolve the profile for `model` served by `provider`.
    ///
    /// Unknown providers get conservative defaults: no prompt caching and
    /// tiering everywhere.
    #[instrument(skip(self))]
    pub fn capabilities(&self, provider: &str, model: &str) -> ModelProfile {
        let capabilities = match self.providers.get(provider) {
            Some(provider_config) => provider_config.for_model(model),
            None => {
                debug!(provider, "Unknown provider, using conservative capabilities");
                ModelCapabilities::default()
            }
        };
        ModelProfile::new(model, provider, capabilities)
    }

    /// Looks up a story setting by its stored value.
    pub fn story_setting(&self, value: &str) -> Option<&StorySetting> {
        self.story_settings.iter().find(|s| s.value == value)
    }
}
