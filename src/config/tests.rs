use clap::Parser;

use super::*;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.logging.format, LogFormat::Json);
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["storefront"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "storefront",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--database-url",
        "postgres://override",
        "--cache-enabled=false",
        "--cache-max-entries",
        "64",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(
                serve.overrides.database.database_url.as_deref(),
                Some("postgres://override")
            );
            assert_eq!(serve.overrides.cache_enabled, Some(false));
            assert_eq!(serve.overrides.cache_max_entries, Some(64));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_migrate_arguments() {
    let args = CliArgs::parse_from([
        "storefront",
        "migrate",
        "--database-url",
        "postgres://example",
    ]);

    match args.command.expect("migrate command") {
        Command::Migrate(migrate) => {
            assert_eq!(
                migrate.database.database_url.as_deref(),
                Some("postgres://example")
            );
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn cache_settings_use_correct_defaults() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert!(settings.cache.enabled);
    assert!(settings.cache.render_enabled);
    assert_eq!(settings.cache.max_entries, 1000);
    assert_eq!(settings.cache.product_ttl_seconds, 3600);
    assert_eq!(settings.cache.listing_ttl_seconds, 300);
    assert_eq!(settings.cache.homepage_ttl_seconds, 300);
    assert_eq!(settings.cache.stats_ttl_seconds, 600);

    let config = crate::cache::CacheConfig::from(&settings.cache);
    assert_eq!(config, crate::cache::CacheConfig::default());
}

#[test]
fn cache_settings_can_be_overridden_via_cli() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        cache_enabled: Some(false),
        cache_max_entries: Some(50),
        render_cache_enabled: Some(false),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(!settings.cache.enabled);
    assert!(!settings.cache.render_enabled);
    assert_eq!(settings.cache.max_entries, 50);
    assert_eq!(settings.cache.history_limit, 200);
}

#[test]
fn blank_database_url_is_treated_as_absent() {
    let mut raw = RawSettings::default();
    raw.database.url = Some("   ".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.database.url.is_none());
}

#[test]
fn zero_port_is_rejected() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(0);

    let err = Settings::from_raw(raw).expect_err("port zero");
    assert!(matches!(err, LoadError::Invalid { key: "server.port", .. }));
}

#[test]
fn max_page_size_below_page_size_is_rejected() {
    let mut raw = RawSettings::default();
    raw.catalog.page_size = Some(50);
    raw.catalog.max_page_size = Some(10);

    let err = Settings::from_raw(raw).expect_err("inconsistent page sizes");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "catalog.max_page_size",
            ..
        }
    ));
}

#[test]
fn upstream_timeout_is_milliseconds() {
    let mut raw = RawSettings::default();
    raw.upstream.timeout_ms = Some(1500);
    raw.upstream.social_feed_url = Some("https://feed.example/posts".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.upstream.timeout, Duration::from_millis(1500));
    assert_eq!(
        settings.upstream.social_feed_url.as_deref(),
        Some("https://feed.example/posts")
    );
}
