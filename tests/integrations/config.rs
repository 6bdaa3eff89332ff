use serial_test::serial;
use sigrelay::cli::Cli;
use sigrelay::config::Config;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

/// A helper function to run a test with a temporary config file.
fn with_config_file<F>(toml_content: &str, test_fn: F)
where
    F: FnOnce(PathBuf),
{
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", toml_content).unwrap();
    test_fn(file.path().to_path_buf());
}

fn cli_for(path: PathBuf) -> Cli {
    Cli {
        config: Some(path),
        ..Default::default()
    }
}

fn clear_env() {
    for key in [
        "BOT_TOKEN",
        "PORT",
        "SIGRELAY_TELEGRAM__BOT_TOKEN",
        "SIGRELAY_SERVER__PORT",
        "SIGRELAY_RELAY__MAX_CONCURRENT_SENDS",
        "SIGRELAY_LOG_LEVEL",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
#[serial]
fn test_load_full_valid_config() {
    clear_env();
    let toml_content = r#"
        log_level = "debug"
        [server]
        host = "127.0.0.1"
        port = 9000
        [telegram]
        bot_token = "123:abc"
        api_url = "http://localhost:8081"
        timeout_ms = 2500
        [subscribers]
        path = "/var/lib/sigrelay/subscribers.json"
        [relay]
        default_message = "Signal"
        max_concurrent_sends = 4
        send_timeout_ms = 3000
        [metrics]
        enabled = true
    "#;

    with_config_file(toml_content, |path| {
        let config = Config::load(&cli_for(path)).unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.telegram.bot_token, "123:abc");
        assert_eq!(config.telegram.api_url, "http://localhost:8081");
        assert_eq!(config.telegram.timeout_ms, 2500);
        assert_eq!(
            config.subscribers.path,
            PathBuf::from("/var/lib/sigrelay/subscribers.json")
        );
        assert_eq!(config.relay.default_message, "Signal");
        assert_eq!(config.relay.max_concurrent_sends, 4);
        assert_eq!(config.relay.send_timeout_ms, 3000);
        assert!(config.metrics.enabled);
        assert!(config.validate().is_ok());
    });
}

#[test]
#[serial]
fn test_load_default_values() {
    clear_env();
    with_config_file("", |path| {
        let config = Config::load(&cli_for(path)).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.relay.default_message, "New signal received");
        assert_eq!(config.server.port, 8080);
    });
}

#[test]
#[serial]
fn test_missing_file_uses_defaults() {
    clear_env();
    let cli = cli_for(PathBuf::from("/nonexistent/sigrelay.toml"));
    let config = Config::load(&cli).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
#[serial]
fn test_invalid_value_type() {
    clear_env();
    with_config_file("[server]\nport = \"eighty\"\n", |path| {
        assert!(Config::load(&cli_for(path)).is_err());
    });
}

#[test]
#[serial]
fn test_deployment_env_vars_override_file() {
    clear_env();
    std::env::set_var("BOT_TOKEN", "999:fromenv");
    std::env::set_var("PORT", "7070");

    with_config_file("[server]\nport = 9000\n", |path| {
        let config = Config::load(&cli_for(path)).unwrap();
        assert_eq!(config.telegram.bot_token, "999:fromenv");
        assert_eq!(config.server.port, 7070);
        assert!(config.validate().is_ok());
    });

    clear_env();
}

#[test]
#[serial]
fn test_plain_deployment_vars_beat_prefixed_vars() {
    clear_env();
    std::env::set_var("BOT_TOKEN", "plain");
    std::env::set_var("SIGRELAY_TELEGRAM__BOT_TOKEN", "prefixed");
    std::env::set_var("PORT", "7070");
    std::env::set_var("SIGRELAY_SERVER__PORT", "6060");

    with_config_file("", |path| {
        let config = Config::load(&cli_for(path)).unwrap();
        assert_eq!(config.telegram.bot_token, "plain");
        assert_eq!(config.server.port, 7070);
    });

    clear_env();
}

#[test]
#[serial]
fn test_prefixed_env_vars_apply_without_plain_vars() {
    clear_env();
    std::env::set_var("SIGRELAY_TELEGRAM__BOT_TOKEN", "prefixed");

    with_config_file("[telegram]\nbot_token = \"from-file\"\n", |path| {
        let config = Config::load(&cli_for(path)).unwrap();
        assert_eq!(config.telegram.bot_token, "prefixed");
    });

    clear_env();
}

#[test]
#[serial]
fn test_prefixed_env_vars_are_nested() {
    clear_env();
    std::env::set_var("SIGRELAY_RELAY__MAX_CONCURRENT_SENDS", "32");
    std::env::set_var("SIGRELAY_LOG_LEVEL", "warn");

    with_config_file("", |path| {
        let config = Config::load(&cli_for(path)).unwrap();
        assert_eq!(config.relay.max_concurrent_sends, 32);
        assert_eq!(config.log_level, "warn");
    });

    clear_env();
}

#[test]
#[serial]
fn test_cli_overrides_everything() {
    clear_env();
    std::env::set_var("PORT", "7070");

    with_config_file("[server]\nport = 9000\n", |path| {
        let cli = Cli {
            config: Some(path),
            port: Some(6060),
            host: Some("127.0.0.1".to_string()),
            subscribers_file: Some(PathBuf::from("/tmp/subs.json")),
            log_level: Some("trace".to_string()),
            metrics: true,
            json_logs: false,
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.port, 6060);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.subscribers.path, PathBuf::from("/tmp/subs.json"));
        assert_eq!(config.log_level, "trace");
        assert!(config.metrics.enabled);
    });

    clear_env();
}

#[test]
#[serial]
fn test_missing_token_fails_validation() {
    clear_env();
    with_config_file("", |path| {
        let config = Config::load(&cli_for(path)).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("BOT_TOKEN"));
    });
}
