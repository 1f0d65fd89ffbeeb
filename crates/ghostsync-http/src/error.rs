//! Server error types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use std::net::SocketAddr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Failed to bind discovery server to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// A discovery request could not open its session channel.
#[derive(Error, Debug)]
#[error("Failed to open session channel: {0}")]
pub struct DiscoveryBindError(#[from] pub std::io::Error);

impl IntoResponse for DiscoveryBindError {
    fn into_response(self) -> Response {
        log::error!("{}", self);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_error_is_a_500() {
        let err = DiscoveryBindError(std::io::Error::new(
            std::io::ErrorKind::AddrInUse,
            "address in use",
        ));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers()["content-type"],
            "application/json"
        );
    }

    #[test]
    fn server_error_messages() {
        let err = ServerError::Bind {
            addr: "127.0.0.1:4001".parse().unwrap(),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        };
        assert_eq!(
            err.to_string(),
            "Failed to bind discovery server to 127.0.0.1:4001: in use"
        );
    }
}
