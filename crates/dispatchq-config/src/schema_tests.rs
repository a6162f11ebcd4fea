use super::*;

#[test]
fn test_default_config_sections() {
    let config = Config::default();
    assert_eq!(config.server.port, 8686);
    assert_eq!(config.dispatch.default_priority, 5);
    assert_eq!(config.dispatch.min_priority, 0);
    assert_eq!(config.dispatch.max_priority, 10);
    assert!(config.reaper.enabled);
    assert_eq!(config.reaper.max_attempts, 0);
    assert_eq!(config.stats.cache_ttl_ms, 2000);
}

#[test]
fn test_default_database_under_home() {
    let storage = StorageConfig::default();
    assert!(storage.database_path.ends_with("queue.db"));
    assert!(!storage.is_in_memory());
}

#[test]
fn test_in_memory_database() {
    let storage = StorageConfig {
        database_path: PathBuf::from(":memory:"),
        ..Default::default()
    };
    assert!(storage.is_in_memory());
}

#[test]
fn test_priority_order_serde() {
    let text = toml::to_string(&DispatchConfig::default()).unwrap();
    assert!(text.contains("higher_first"));

    let parsed: DispatchConfig = toml::from_str("priority_order = \"lower_first\"").unwrap();
    assert_eq!(parsed.priority_order, PriorityOrder::LowerFirst);
    assert_eq!(parsed.default_priority, 5);
}

#[test]
fn test_reaper_partial_override() {
    let parsed: ReaperConfig = toml::from_str("enabled = false").unwrap();
    assert!(!parsed.enabled);
    assert_eq!(parsed.interval_secs, 30);
    assert_eq!(parsed.claim_timeout_secs, 1800);
}

#[test]
fn test_tickets_defaults() {
    let tickets = TicketsConfig::default();
    assert!(tickets.storage_path.ends_with("ticket_storage"));
    assert!(tickets.projects_index.ends_with("projects.json"));
}

#[test]
fn test_config_roundtrips_through_toml() {
    let config = Config::default();
    let text = toml::to_string(&config).unwrap();
    let parsed: Config = toml::from_str(&text).unwrap();
    assert_eq!(parsed.server.host, config.server.host);
    assert_eq!(parsed.logging.file_prefix, "dispatchq");
}
