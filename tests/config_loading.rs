//! Integration test: configuration loading
//!
//! Tests the bin_common configuration resolution and the YAML shapes a
//! client config file accepts.

use std::env;
use std::io::Write;
use std::path::PathBuf;

use gateherd::{ClientConfig, HostConfig, Persistence, Protocol};
use gateherd_probe::bin_common::{config_path_from_env, load_client_config, CONFIG_PATH_ENV};

#[test]
fn test_config_path_env_override() {
    env::set_var(CONFIG_PATH_ENV, "custom/probe.yaml");
    assert_eq!(config_path_from_env(), PathBuf::from("custom/probe.yaml"));
    env::remove_var(CONFIG_PATH_ENV);
    assert_eq!(config_path_from_env(), PathBuf::from("config.yaml"));
}

#[test]
fn test_full_config_file_round_trip() {
    let yaml = r#"
name: probe
host: "broker.example.com:8080"
protocol: wss
transport:
  auth_token: tok
  socket_connect_timeout: 5000
producer:
  - tenant: t
    namespace: n
    topic: top-a
  - tenant: t
    namespace: n
    topic: top-b
consumer:
  tenant: t
  namespace: n
  topic: top
  subscription: sub1
  params:
    receiverQueueSize: "500"
"#;
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();

    let config = load_client_config(file.path()).unwrap();
    assert_eq!(config.name.as_deref(), Some("probe"));
    assert_eq!(config.protocol, Protocol::Wss);
    assert_eq!(
        config.host,
        HostConfig::Literal("broker.example.com:8080".to_string())
    );
    assert_eq!(config.transport.auth_token.as_deref(), Some("tok"));
    assert_eq!(config.transport.socket_connect_timeout, Some(5000));

    let producers = config.producer.unwrap();
    assert!(producers.is_many());
    assert_eq!(producers.len(), 2);

    let consumer = config.consumer.unwrap();
    assert_eq!(consumer.subscription.as_deref(), Some("sub1"));
    assert_eq!(
        consumer.params.get("receiverQueueSize").map(String::as_str),
        Some("500")
    );
    assert!(config.reader.is_none());
}

#[test]
fn test_host_shapes_parse() {
    let config: ClientConfig = serde_yaml::from_str("host: \"broker:6650\"\n").unwrap();
    assert_eq!(config.host, HostConfig::Literal("broker:6650".to_string()));

    let config: ClientConfig = serde_yaml::from_str("host: [broker, 6650]\n").unwrap();
    assert_eq!(config.host, HostConfig::Pair("broker".to_string(), 6650));

    let config: ClientConfig = serde_yaml::from_str("host: [[broker, 6650]]\n").unwrap();
    assert_eq!(
        config.host,
        HostConfig::Pairs(vec![("broker".to_string(), 6650)])
    );
}

#[test]
fn test_single_producer_map_form() {
    let yaml = r#"
host: "broker:8080"
producer:
  tenant: t
  namespace: n
  topic: top
"#;
    let config: ClientConfig = serde_yaml::from_str(yaml).unwrap();
    let producers = config.producer.unwrap();
    assert!(!producers.is_many());
    assert_eq!(producers.len(), 1);

    // Omitted fields fall back to their defaults
    assert_eq!(config.protocol, Protocol::Ws);
    for args in producers.iter() {
        assert_eq!(args.persistence, Persistence::Persistent);
        assert!(args.subscription.is_none());
        assert!(args.params.is_empty());
    }
}

#[test]
fn test_parsed_config_plans_expected_urls() {
    let yaml = r#"
host: "broker:8080"
producer:
  tenant: t
  namespace: n
  topic: top
"#;
    let config: ClientConfig = serde_yaml::from_str(yaml).unwrap();
    let plan = gateherd::plan(&config).unwrap();

    assert_eq!(plan.child_names(), vec!["registry", "producer"]);
    let spec = plan.children[1].connection().unwrap();
    let settings =
        gateherd::ConnectionSettings::build(&spec.endpoint, spec.role, &spec.extra_query).unwrap();
    assert_eq!(
        settings.url,
        "ws://broker:8080/ws/v2/producer/persistent/t/n/top"
    );
}
