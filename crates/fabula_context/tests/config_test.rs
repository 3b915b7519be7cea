//! Tests for context configuration and model capabilities.

use fabula_context::{ContextSettings, FabulaConfig, ModelCapabilityOverrides, ProviderConfig};
use fabula_core::CacheTtl;
use std::collections::HashMap;
use std::io::Write;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_load_bundled_defaults() {
    let config = FabulaConfig::bundled().unwrap();

    assert_eq!(config.context, ContextSettings::default());
    assert_eq!(*config.context.cache_ttl(), CacheTtl::OneHour);
    assert!(config.providers.contains_key("anthropic"));
    assert!(config.providers.contains_key("ollama"));
    assert_eq!(config.story_settings.len(), 7);
}

#[test]
fn test_layered_load_succeeds() {
    let config = FabulaConfig::load().unwrap();
    assert!(config.providers.contains_key("anthropic"));
}

#[test]
fn test_capabilities_for_caching_provider() {
    let config = FabulaConfig::bundled().unwrap();
    let profile = config.capabilities("anthropic", "claude-sonnet-4-5");

    assert_eq!(profile.id(), "claude-sonnet-4-5");
    assert_eq!(profile.provider(), "anthropic");
    assert!(profile.caches_prompts());
    assert!(profile.current_container_always_full());
    assert_eq!(*profile.capabilities().context_window(), Some(200_000));
}

#[test]
fn test_model_override_within_provider() {
    let config = FabulaConfig::bundled().unwrap();

    let routed = config.capabilities("openrouter", "anthropic/claude-sonnet-4");
    assert!(routed.caches_prompts());
    assert_eq!(*routed.capabilities().context_window(), Some(200_000));

    let other = config.capabilities("openrouter", "mistral/mistral-large");
    assert!(!other.caches_prompts());
    assert!(!other.current_container_always_full());
    assert_eq!(*other.capabilities().context_window(), Some(128_000));
}

#[test]
fn test_unknown_provider_is_conservative() {
    let config = FabulaConfig::bundled().unwrap();
    let profile = config.capabilities("somewhere", "mystery-model");

    assert!(!profile.caches_prompts());
    assert!(!profile.current_container_always_full());
    assert_eq!(*profile.capabilities().context_window(), None);
}

#[test]
fn test_provider_config_for_model() {
    let mut models = HashMap::new();
    models.insert(
        "small".to_string(),
        ModelCapabilityOverrides {
            context_window: Some(8_192),
            ..Default::default()
        },
    );
    let provider = ProviderConfig {
        supports_prompt_caching: true,
        treats_current_container_as_always_full: false,
        context_window: Some(64_000),
        models,
    };

    let small = provider.for_model("small");
    assert!(*small.supports_prompt_caching());
    assert_eq!(*small.context_window(), Some(8_192));

    let large = provider.for_model("large");
    assert_eq!(*large.context_window(), Some(64_000));
}

#[test]
fn test_from_file_overrides_thresholds() {
    let file = write_config(
        r#"
[context]
sentence_summary_after = 20
paragraph_summary_after = 10
cache_ttl = "5m"

[providers.local]
context_window = 4096
"#,
    );

    let config = FabulaConfig::from_file(file.path()).unwrap();

    assert_eq!(*config.context.sentence_summary_after(), 20);
    assert_eq!(*config.context.paragraph_summary_after(), 10);
    assert_eq!(*config.context.cache_ttl(), CacheTtl::FiveMinutes);
    // Keys absent from the file keep their defaults.
    assert_eq!(*config.context.flat_story_limit(), 50);
    assert_eq!(
        *config.capabilities("local", "any").capabilities().context_window(),
        Some(4096)
    );
}

#[test]
fn test_from_file_rejects_inverted_thresholds() {
    let file = write_config(
        r#"
[context]
sentence_summary_after = 5
paragraph_summary_after = 9
"#,
    );

    let err = FabulaConfig::from_file(file.path()).unwrap_err();
    assert!(err.to_string().contains("paragraph_summary_after (9)"));
}

#[test]
fn test_from_file_missing_path() {
    let err = FabulaConfig::from_file("/nonexistent/fabula.toml").unwrap_err();
    assert!(err.to_string().contains("Configuration Error"));
}

#[test]
fn test_story_setting_lookup() {
    let config = FabulaConfig::bundled().unwrap();

    let setting = config.story_setting("science-fiction").unwrap();
    assert_eq!(setting.label, "Science Fiction");
    assert!(config.story_setting("western").is_none());
}
