use maestro_domain::config::{Config, ConfigSeverity, FusionStrategy, LlmKind};

#[test]
fn default_host_is_localhost() {
    let config = Config::default();
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 8010);
}

#[test]
fn explicit_zero_host_parses() {
    let toml_str = r#"
[server]
host = "0.0.0.0"
port = 8010
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.server.host, "0.0.0.0");
}

#[test]
fn retrieval_defaults_match_tuning() {
    let config = Config::default();
    assert_eq!(config.retrieval.alpha, 0.6);
    assert_eq!(config.retrieval.rrf_k, 60.0);
    assert_eq!(config.retrieval.vector_mult, 4);
    assert_eq!(config.retrieval.fusion, FusionStrategy::Rrf);
    assert_eq!(config.retrieval.chunk_size, 900);
    assert_eq!(config.retrieval.chunk_overlap, 120);
}

#[test]
fn llm_defaults_to_disabled_with_warning() {
    let config = Config::default();
    assert_eq!(config.llm.kind, LlmKind::Disabled);
    let issues = config.validate();
    assert!(issues
        .iter()
        .any(|i| i.severity == ConfigSeverity::Warning && i.field == "llm.kind"));
    assert!(!issues.iter().any(|i| i.severity == ConfigSeverity::Error));
}

#[test]
fn bad_overlap_is_an_error() {
    let toml_str = r#"
[retrieval]
chunk_size = 100
chunk_overlap = 100
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    let issues = config.validate();
    assert!(issues
        .iter()
        .any(|i| i.severity == ConfigSeverity::Error && i.field == "retrieval.chunk_overlap"));
}

#[test]
fn fusion_strategy_parses_from_toml() {
    let toml_str = r#"
[retrieval]
fusion = "minmax"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.retrieval.fusion, FusionStrategy::Minmax);
}
