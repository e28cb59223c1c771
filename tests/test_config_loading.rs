//! Configuration loading and validation tests
//!
//! Tests focus on BEHAVIOR of configuration loading, validation, and error handling.
//! We test observable outcomes, not implementation details of TOML parsing.

use restaurant_pos::config::{AppConfig, ConfigError, EmailBackend};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

#[test]
fn test_shipped_config_file_is_valid() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/restaurant.toml");
    let config = AppConfig::load_from_file(&path).unwrap();

    assert_eq!(config.server.port, 8000);
    assert_eq!(config.server.utc_offset_minutes, 480);
    assert_eq!(config.llm.provider, "gemini");
    assert_eq!(config.llm.api_key_env, "GOOGLE_API_KEY");
    assert_eq!(config.email.backend, EmailBackend::Console);
    assert_eq!(config.recommendation.chunk_size, 1000);
    assert_eq!(config.recommendation.chunk_overlap, 200);
    assert_eq!(config.recommendation.top_k, 2);
    assert_eq!(config.orders.pending_timeout_minutes, 60);
}

#[test]
fn test_config_loads_successfully_from_minimal_toml() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(
        temp_file,
        r#"
[auth]
secret_key_env = "SECRET_KEY"

[llm]
provider = "openai"
model = "gpt-4o-mini"
api_key_env = "OPENAI_API_KEY"
"#
    )
    .unwrap();

    let config = AppConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.llm.provider, "openai");
    assert_eq!(config.llm.temperature, None);
    assert_eq!(config.server.page_size, 10);
    assert_eq!(config.auth.access_token_minutes, 5);
    assert_eq!(config.face.match_threshold, 10.0);
    assert_eq!(config.bind_address(), "0.0.0.0:8000");
}

#[test]
fn test_config_fails_with_missing_file() {
    let result = AppConfig::load_from_file(Path::new("/nonexistent/restaurant.toml"));
    assert!(matches!(result, Err(ConfigError::FileRead(_))));
}

#[test]
fn test_config_fails_with_malformed_toml() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "[llm\nprovider = ").unwrap();

    let result = AppConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_config_fails_without_required_sections() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(
        temp_file,
        r#"
[server]
port = 8000
"#
    )
    .unwrap();

    let result = AppConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_config_rejects_out_of_range_values() {
    for section in [
        "[server]\nutc_offset_minutes = 1440",
        "[server]\npage_size = 500\nmax_page_size = 100",
        "[orders]\npending_timeout_minutes = 0",
        "[recommendation]\nchunk_size = 100\nchunk_overlap = 100",
    ] {
        let content = format!(
            "{section}\n\n[auth]\nsecret_key_env = \"SECRET_KEY\"\n\n\
             [llm]\nprovider = \"gemini\"\nmodel = \"gemini-2.0-flash\"\napi_key_env = \"GOOGLE_API_KEY\"\n"
        );
        let result = AppConfig::from_toml_str(&content);
        assert!(
            matches!(result, Err(ConfigError::InvalidConfig(_))),
            "expected rejection for {section:?}"
        );
    }
}

#[test]
fn test_config_round_trips_through_toml() {
    let config = AppConfig::test_config();
    let rendered = toml::to_string_pretty(&config).unwrap();
    let reparsed = AppConfig::from_toml_str(&rendered).unwrap();
    assert_eq!(reparsed, config);
}
