//! Tests for the memqueue-cli library module.

use super::*;
use std::io::Write;

fn fast_config() -> MemoryQueueConfig {
    MemoryQueueConfig {
        name: "demo-queue".to_string(),
        listen_poll_interval_ms: 5,
        listen_receive_timeout_ms: 50,
    }
}

fn demo_options(messages: usize, fail_every: Option<usize>) -> DemoOptions {
    DemoOptions {
        messages,
        message_type: "demo".to_string(),
        fail_every,
        timeout: Duration::from_secs(10),
    }
}

#[test]
fn test_cli_parsing() {
    let cli = Cli::try_parse_from([
        "memqueue",
        "demo",
        "--messages",
        "5",
        "--fail-every",
        "2",
    ]);
    assert!(cli.is_ok());

    let cli = cli.unwrap();
    assert_eq!(cli.log_level, "info");
    assert!(!cli.json_logs);
    match cli.command {
        Commands::Demo {
            messages,
            message_type,
            fail_every,
            timeout,
        } => {
            assert_eq!(messages, 5);
            assert_eq!(message_type, "demo");
            assert_eq!(fail_every, Some(2));
            assert_eq!(timeout, 60);
        }
        _ => panic!("Expected Demo command"),
    }
}

#[test]
fn test_config_command_parsing() {
    let cli = Cli::try_parse_from(["memqueue", "--json-logs", "config", "--format", "json"]).unwrap();
    assert!(cli.json_logs);
    match cli.command {
        Commands::Config { format } => assert_eq!(format, ConfigFormat::Json),
        _ => panic!("Expected Config command"),
    }

    assert!(Cli::try_parse_from(["memqueue", "config", "--format", "yaml"]).is_err());
    assert!(Cli::try_parse_from(["memqueue"]).is_err());
}

#[test]
fn test_load_configuration_reads_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "name = \"from-file\"").unwrap();
    writeln!(file, "listen_poll_interval_ms = 20").unwrap();

    let config = load_configuration(Some(file.path())).unwrap();

    assert_eq!(config.name, "from-file");
    assert_eq!(config.listen_poll_interval_ms, 20);
    assert_eq!(config.listen_receive_timeout_ms, 1000);
}

#[test]
fn test_load_configuration_missing_file() {
    let result = load_configuration(Some(Path::new("/definitely/not/here.toml")));
    assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
}

#[test]
fn test_render_config_formats() {
    let config = fast_config();

    let toml = render_config(&config, &ConfigFormat::Toml).unwrap();
    assert!(toml.contains("name = \"demo-queue\""));
    assert!(toml.contains("listen_poll_interval_ms = 5"));

    let json = render_config(&config, &ConfigFormat::Json).unwrap();
    let parsed: MemoryQueueConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, config);
}

#[tokio::test]
async fn test_demo_completes_every_message() {
    let summary = execute_demo_command(&fast_config(), demo_options(5, None))
        .await
        .unwrap();

    assert_eq!(
        summary,
        DemoSummary {
            queue: "demo-queue".to_string(),
            sent: 5,
            received: 5,
            completed: 5,
            dead_lettered: 0,
        }
    );
}

#[tokio::test]
async fn test_demo_dead_letters_every_kth_message() {
    let summary = execute_demo_command(&fast_config(), demo_options(6, Some(3)))
        .await
        .unwrap();

    assert_eq!(summary.received, 6);
    assert_eq!(summary.completed, 4);
    assert_eq!(summary.dead_lettered, 2);
}

#[tokio::test]
async fn test_demo_with_no_messages() {
    let summary = execute_demo_command(&fast_config(), demo_options(0, None))
        .await
        .unwrap();

    assert_eq!(summary.sent, 0);
    assert_eq!(summary.completed, 0);
}

#[tokio::test]
async fn test_demo_rejects_zero_fail_every() {
    let result = execute_demo_command(&fast_config(), demo_options(1, Some(0))).await;
    assert!(matches!(result, Err(CliError::InvalidArgument { .. })));
}

#[test]
fn test_summary_display() {
    let summary = DemoSummary {
        queue: "q".to_string(),
        sent: 3,
        received: 3,
        completed: 2,
        dead_lettered: 1,
    };

    let rendered = summary.to_string();
    assert!(rendered.contains("Completed:     2"));
    assert!(rendered.ends_with("Dead-lettered: 1"));
}
