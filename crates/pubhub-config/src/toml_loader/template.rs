//! Annotated TOML: a commented header over the serialized config.

use crate::schema::PubhubConfig;

const HEADER: &str = "\
# pubhub configuration
# Fields left out fall back to their defaults.
#
# Accepted values:
#   hub.serial_publish_max_wait_ms  1-600000
#   server.bind                     socket address, e.g. 0.0.0.0:8080
#   server.hello_timeout_secs       1-300
#   server.outbound_capacity        1-65536
#   server.send_timeout_ms          1-600000
#   logging.filter                  tracing directive, RUST_LOG wins

";

pub(crate) fn annotated_config(config: &PubhubConfig) -> String {
    let mut out = String::from(HEADER);
    out.push_str(&crate::config_to_toml(config));
    out
}
