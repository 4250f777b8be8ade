//! Global subscriber installation. Kept in its own binary so no other test
//! has installed a subscriber first.

use clarity_translate::{init_tracing, LogFormat, LoggingConfig};

#[test]
fn json_subscriber_installs_once() {
    let logging = LoggingConfig {
        level: "debug".into(),
        format: LogFormat::Json,
    };
    init_tracing(&logging).unwrap();
    tracing::info!(target: "clarity_translate", event = "json", "subscriber installed");

    let text = LoggingConfig::default();
    assert!(init_tracing(&text).is_err());
}
