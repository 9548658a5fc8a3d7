//! Configuration validation.
//!
//! Each section has its own check; all errors are collected into a single
//! `ConfigError::ValidationError`.

mod helpers;


use crate::schema::PubhubConfig;
use helpers::validate_range;
use pubhub_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &PubhubConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    validate_hub(&mut errors, config);
    validate_server(&mut errors, config);
    validate_logging(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

fn validate_hub(errors: &mut Vec<String>, config: &PubhubConfig) {
    validate_range(
        errors,
        "hub.serial_publish_max_wait_ms",
        config.hub.serial_publish_max_wait_ms,
        1,
        600_000,
    );
}

fn validate_server(errors: &mut Vec<String>, config: &PubhubConfig) {
    if config
        .server
        .bind
        .parse::<std::net::SocketAddr>()
        .is_err()
    {
        errors.push(format!(
            "server.bind = {:?} is not a socket address",
            config.server.bind
        ));
    }
    validate_range(
        errors,
        "server.hello_timeout_secs",
        config.server.hello_timeout_secs,
        1,
        300,
    );
    validate_range(
        errors,
        "server.outbound_capacity",
        config.server.outbound_capacity,
        1,
        65_536,
    );
    validate_range(
        errors,
        "server.send_timeout_ms",
        config.server.send_timeout_ms,
        1,
        600_000,
    );
}

fn validate_logging(errors: &mut Vec<String>, config: &PubhubConfig) {
    if config.logging.filter.trim().is_empty() {
        errors.push("logging.filter must not be empty".into());
    }
}
