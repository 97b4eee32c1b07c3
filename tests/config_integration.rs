use serial_test::serial;
use std::env;
use std::io::Write;
use utm_parameter::config::AppConfig;
use utm_parameter::utm::{UtmSettings, Whitelist};

// Helper to clear environment variables that might interfere with tests
fn clear_env_vars() {
    unsafe {
        env::remove_var("PORT");
        env::remove_var("CONFIG_FILE");
        env::remove_var("UTM_SESSION_KEY");
        env::remove_var("OVERRIDE_UTM_PARAMETERS");
        env::remove_var("UTM_PARAMETER_SERVER__PORT");
        env::remove_var("UTM_PARAMETER_TRACKING__SESSION_KEY");
        env::remove_var("UTM_PARAMETER_TRACKING__OVERRIDE_UTM_PARAMETERS");
        env::remove_var("UTM_PARAMETER_TRACKING__ALLOWED_UTM_PARAMETERS");
    }
}

fn load(args: &[&str]) -> AppConfig {
    let argv = std::iter::once("utm-parameter").chain(args.iter().copied());
    AppConfig::load_from_args(argv).expect("Failed to load config")
}

#[test]
#[serial]
fn test_default_config() {
    clear_env_vars();

    let config = load(&[]);
    assert_eq!(config.server.port, 3000);
    assert_eq!(config.tracking.session_key, "utm");
    assert!(!config.tracking.override_utm_parameters);
    assert_eq!(
        config.tracking.allowed_utm_parameters,
        vec!["source", "medium", "campaign", "term", "content"]
    );
    assert_eq!(config.session.cookie_name, "utm_session");

    let settings = UtmSettings::from(&config.tracking);
    assert_eq!(settings, UtmSettings::default());
}

#[test]
#[serial]
fn test_env_override() {
    clear_env_vars();
    unsafe {
        env::set_var("UTM_PARAMETER_SERVER__PORT", "9090");
        env::set_var("UTM_PARAMETER_TRACKING__SESSION_KEY", "campaign_data");
        env::set_var("UTM_PARAMETER_TRACKING__OVERRIDE_UTM_PARAMETERS", "true");
    }

    let config = load(&[]);
    assert_eq!(config.server.port, 9090);
    assert_eq!(config.tracking.session_key, "campaign_data");
    assert!(config.tracking.override_utm_parameters);

    clear_env_vars();
}

#[test]
#[serial]
fn test_env_whitelist_list() {
    clear_env_vars();
    unsafe {
        env::set_var(
            "UTM_PARAMETER_TRACKING__ALLOWED_UTM_PARAMETERS",
            "utm_source,medium",
        );
    }

    let config = load(&[]);
    let whitelist = Whitelist::new(&config.tracking.allowed_utm_parameters);
    assert!(whitelist.allows("utm_source"));
    assert!(whitelist.allows("utm_medium"));
    assert!(!whitelist.allows("utm_campaign"));

    clear_env_vars();
}

#[test]
#[serial]
fn test_cli_wins_over_env() {
    clear_env_vars();
    unsafe {
        env::set_var("UTM_PARAMETER_TRACKING__SESSION_KEY", "from_env");
    }

    let config = load(&[
        "--session-key",
        "from_cli",
        "--override-utm-parameters",
        "true",
        "--port",
        "4000",
    ]);
    assert_eq!(config.tracking.session_key, "from_cli");
    assert!(config.tracking.override_utm_parameters);
    assert_eq!(config.server.port, 4000);

    clear_env_vars();
}

#[test]
#[serial]
fn test_file_load() {
    clear_env_vars();

    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .expect("Failed to create temp config");
    write!(
        file,
        r#"
server:
  port: 7070
tracking:
  session_key: custom_utm_key
  allowed_utm_parameters:
    - utm_source
    - utm_medium
"#
    )
    .expect("Failed to write temp config");

    let path = file.path().to_str().expect("temp path is utf-8").to_string();
    let config = load(&["--config", &path]);
    assert_eq!(config.server.port, 7070);
    assert_eq!(config.tracking.session_key, "custom_utm_key");
    assert!(!config.tracking.override_utm_parameters);
    assert_eq!(
        config.tracking.allowed_utm_parameters,
        vec!["utm_source", "utm_medium"]
    );

    clear_env_vars();
}

#[test]
#[serial]
fn test_missing_explicit_file_fails() {
    clear_env_vars();

    let result = AppConfig::load_from_args(["utm-parameter", "--config", "does-not-exist.yaml"]);
    assert!(result.is_err());
}
