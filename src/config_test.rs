use super::*;

/// # Safety
/// Only `from_env_reads_server_settings` touches these variables.
unsafe fn clear_server_env() {
    unsafe {
        std::env::remove_var("PORT");
        std::env::remove_var("SERVER_MODE");
        std::env::remove_var("LAYOUT_MODULES");
        std::env::remove_var("MODULE_HANDSHAKE_TIMEOUT_MS");
        std::env::remove_var("CLIENT_DIR");
    }
}

#[test]
fn from_env_reads_server_settings() {
    unsafe { clear_server_env() };
    assert_eq!(ServerConfig::from_env().unwrap(), ServerConfig::default());

    unsafe {
        std::env::set_var("PORT", "9090");
        std::env::set_var("SERVER_MODE", "check");
        std::env::set_var("LAYOUT_MODULES", "/opt/elk/0.9.1-a, /opt/elk/0.8.0-b");
        std::env::set_var("MODULE_HANDSHAKE_TIMEOUT_MS", "250");
        std::env::set_var("CLIENT_DIR", "/srv/client");
    }
    let cfg = ServerConfig::from_env().unwrap();
    assert_eq!(cfg.port, 9090);
    assert_eq!(cfg.mode, ServerMode::Check);
    assert_eq!(cfg.layout_modules, vec![PathBuf::from("/opt/elk/0.9.1-a"), PathBuf::from("/opt/elk/0.8.0-b")]);
    assert_eq!(cfg.module_handshake_timeout, Duration::from_millis(250));
    assert_eq!(cfg.client_dir, Some(PathBuf::from("/srv/client")));

    unsafe { std::env::set_var("PORT", "not-a-port") };
    assert_eq!(ServerConfig::from_env().unwrap().port, DEFAULT_PORT);

    unsafe { std::env::set_var("SERVER_MODE", "daemon") };
    let err = ServerConfig::from_env().unwrap_err();
    assert_eq!(err.error_code(), "E_CONFIG_MODE");

    unsafe { clear_server_env() };
}

#[test]
fn mode_parsing_is_case_insensitive() {
    assert_eq!(parse_mode(None).unwrap(), ServerMode::Serve);
    assert_eq!(parse_mode(Some("CHECK")).unwrap(), ServerMode::Check);
    assert_eq!(parse_mode(Some(" serve ")).unwrap(), ServerMode::Serve);
    assert!(parse_mode(Some("watch")).is_err());
}

#[test]
fn module_list_skips_blank_entries() {
    assert!(parse_module_list(None).is_empty());
    assert!(parse_module_list(Some("  ")).is_empty());
    assert_eq!(parse_module_list(Some("a-1,,b-2,")), vec![PathBuf::from("a-1"), PathBuf::from("b-2")]);
}

#[test]
fn env_parse_falls_back_on_missing_keys() {
    assert_eq!(env_parse("DIAGRAM_SERVER_TEST_UNSET_KEY", 7_u32), 7);
}
