//! Client error types.

use std::time::Duration;

use connector_core::ConnectorError;
use execution_core::{AllocatorError, ClassifyError, RegisterError, RequestFailure};
use thiserror::Error;

/// Errors returned by [`GatewayClient`](crate::GatewayClient) operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The instrument string could not be classified. Never sent.
    #[error(transparent)]
    UnsupportedInstrument(#[from] ClassifyError),

    /// No next valid id has been received from the gateway.
    #[error("client not ready: {0}")]
    NotReady(String),

    /// The gateway reported an error for this request.
    #[error("gateway error {code}: {message}")]
    GatewayError {
        /// Gateway error code.
        code: i32,
        /// Gateway error text.
        message: String,
    },

    /// No answer within the request deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The connection was closed while the request was pending, or before
    /// it was issued.
    #[error("disconnected from gateway")]
    Disconnected,

    /// The gateway finished a request without the expected data.
    #[error("incomplete response: {0}")]
    IncompleteResponse(String),

    /// Request id collision in the correlation table.
    #[error("correlation error: {0}")]
    Correlation(#[from] RegisterError),

    /// Transport failure while issuing a request.
    #[error("transport error: {0}")]
    Connector(#[from] ConnectorError),
}

impl ClientError {
    /// Convert a waiter failure, recording the deadline that applied.
    pub(crate) fn from_failure(failure: RequestFailure, timeout: Duration) -> Self {
        match failure {
            RequestFailure::Gateway { code, message } => Self::GatewayError { code, message },
            RequestFailure::Timeout => Self::Timeout(timeout),
            RequestFailure::Disconnected => Self::Disconnected,
            RequestFailure::Incomplete(reason) => Self::IncompleteResponse(reason),
        }
    }

    /// Whether the same call may simply be made again.
    ///
    /// Only true when nothing reached the gateway. A timed-out order may
    /// still have been taken, so resubmitting it is the caller's decision.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NotReady(_))
    }

    /// True if the gateway itself rejected the request.
    pub fn is_gateway_error(&self) -> bool {
        matches!(self, Self::GatewayError { .. })
    }
}

impl From<AllocatorError> for ClientError {
    fn from(err: AllocatorError) -> Self {
        Self::NotReady(err.to_string())
    }
}
