use std::io::Write;
use std::time::Duration;

use helpers::config::{Config, LogFormat};
use helpers::metrics::init_metrics;
use helpers::retry;
use helpers_test::{Counter, setup};
use tracing::level_filters::LevelFilter;

use crate::flaky;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_full_config() {
    let file = write_config(
        r#"
        logging:
          level: debug
          format: json
        metrics:
          statsd: ~
          prefix: app
          custom_tags:
            region: eu
        retry:
          max_retries: 2
          timeout_multiplier: 5ms
        "#,
    );

    let config = Config::get(Some(file.path())).unwrap();
    assert_eq!(config.logging.level, LevelFilter::DEBUG);
    assert_eq!(config.logging.format, LogFormat::Json);
    assert_eq!(config.metrics.statsd, None);
    assert_eq!(config.metrics.prefix, "app");
    assert_eq!(config.metrics.custom_tags["region"], "eu");
    assert_eq!(config.retry.max_retries, 2);
    assert_eq!(config.retry.timeout_multiplier, Duration::from_millis(5));

    // without a statsd host this is a no-op
    init_metrics(&config.metrics).unwrap();
}

#[test]
fn test_invalid_config() {
    let empty = write_config("   \n");
    assert!(Config::get(Some(empty.path())).is_err());

    let bad_level = write_config("logging:\n  level: loud\n");
    let error = Config::get(Some(bad_level.path())).unwrap_err();
    assert_eq!(error.to_string(), "failed to parse config YAML");
}

#[tokio::test]
async fn test_retry_with_configured_limit() {
    setup();

    let file = write_config("retry:\n  max_retries: 2\n  timeout_multiplier: 1ms\n");
    let config = Config::get(Some(file.path())).unwrap();

    let attempts = Counter::new();
    let result = retry(flaky(5, attempts.clone()))
        .with_config(&config.retry)
        .run()
        .await;

    assert!(result.is_err());
    assert_eq!(attempts.get(), 3);
}
