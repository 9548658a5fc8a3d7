//! Stdin publisher: every non-empty line on stdin is broadcast to all
//! subscribers through the serialized publish path.

use std::time::Duration;

use pubhub_core::PublishCoordinator;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run_stdin_publisher(hub: PublishCoordinator, max_wait: Duration) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match hub.publish_serial(line, max_wait).await {
                    Some(_) => {
                        tracing::debug!(subscribers = hub.subscriber_count(), "Published line");
                    }
                    None => {
                        tracing::warn!(?max_wait, "Previous publish still in progress, line dropped");
                    }
                }
            }
            Ok(None) => {
                tracing::info!("stdin closed, publisher stopped");
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read stdin, publisher stopped");
                return;
            }
        }
    }
}
