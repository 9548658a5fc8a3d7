//! Out-of-band error reporting.

use pubhub_common::{ConnectionId, DeliveryError, RegistrationError};

/// A failure the hub reports instead of (or before) returning it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorReport {
    /// A subscribe call failed; the error is also returned to the caller.
    Registration {
        name: String,
        error: RegistrationError,
    },
    /// One subscriber could not be sent a broadcast payload.
    Delivery {
        name: String,
        connection: ConnectionId,
        error: DeliveryError,
    },
}

impl ErrorReport {
    /// Name of the subscriber the report is about.
    pub fn name(&self) -> &str {
        match self {
            Self::Registration { name, .. } | Self::Delivery { name, .. } => name,
        }
    }
}

/// Receives [`ErrorReport`]s. Called from broadcast workers, so it must be
/// cheap and must not block.
pub trait ErrorHook: Send + Sync + 'static {
    fn report(&self, report: &ErrorReport);
}

impl<F> ErrorHook for F
where
    F: Fn(&ErrorReport) + Send + Sync + 'static,
{
    fn report(&self, report: &ErrorReport) {
        self(report)
    }
}

/// Default hook: logs through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingHook;

impl ErrorHook for TracingHook {
    fn report(&self, report: &ErrorReport) {
        match report {
            ErrorReport::Registration { name, error } => {
                tracing::error!(subscriber = %name, error = %error, "Unable to register subscriber");
            }
            ErrorReport::Delivery {
                name,
                connection,
                error,
            } => {
                tracing::error!(
                    subscriber = %name,
                    connection = %connection,
                    error = %error,
                    "Failed to send data to subscriber"
                );
            }
        }
    }
}
