use agentd_domain::config::Config;

#[test]
fn default_bind_host_is_wildcard() {
    let config = Config::default();
    assert_eq!(config.server.bind_host, "0.0.0.0");
    assert_eq!(config.server.bind_port, 50051);
}

#[test]
fn explicit_bind_host_and_port_parse() {
    let toml_str = r#"
[server]
bind_host = "127.0.0.1"
bind_port = 3210
"#;
    let config = Config::from_toml_str(toml_str).unwrap();
    assert_eq!(config.server.bind_host, "127.0.0.1");
    assert_eq!(config.server.bind_port, 3210);
}

#[test]
fn tls_is_disabled_by_default() {
    let config = Config::default();
    assert!(!config.tls.enabled);
    assert!(config.tls.cert_path.is_none());
}

#[test]
fn auth_skip_methods_default_includes_health_check() {
    let config = Config::default();
    assert!(config
        .auth
        .skip_methods
        .iter()
        .any(|m| m == "grpc.health.v1.Health/Check"));
}

#[test]
fn auth_skip_methods_default_includes_get_server_info() {
    let config = Config::default();
    assert!(config
        .auth
        .skip_methods
        .iter()
        .any(|m| m == "agentd.agent.v1.AgentService/GetServerInfo"));
}
