//! Thingcast HTTP server lifecycle management.
//!
//! Provides [`start_server`] which binds to a TCP port and runs the Axum
//! server until the provided shutdown future resolves.

use std::future::Future;
use std::io;
use std::net::{AddrParseError, SocketAddr};
use std::sync::Arc;

use thingcast_core::config::ServerSection;
use tokio::net::TcpListener;
use tracing::info;

use crate::router::build_router;
use crate::state::AppState;

/// Start the Thingcast HTTP server.
///
/// Binds to the configured address, builds the router, and serves requests
/// until `shutdown` resolves. In-flight requests are allowed to finish;
/// open `WebSocket` relays end when the runtime shuts down.
///
/// # Errors
///
/// Returns [`ServerError::Address`] or [`ServerError::Bind`] when the
/// listener cannot come up, and [`ServerError::Serve`] when accepting
/// connections fails.
pub async fn start_server<F>(
    config: &ServerSection,
    state: Arc<AppState>,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = socket_addr(config)?;
    let router = build_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;

    info!(%addr, "Thingcast server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ServerError::Serve)?;

    info!("Thingcast server stopped");
    Ok(())
}

/// Parse the configured host and port.
///
/// # Errors
///
/// Returns [`ServerError::Address`] when `server.host` is not an IP
/// address.
pub fn socket_addr(config: &ServerSection) -> Result<SocketAddr, ServerError> {
    format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|source| ServerError::Address {
            host: config.host.clone(),
            source,
        })
}

/// Why the thing API listener did not come up or stopped.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// `server.host` is not an IP address.
    #[error("server.host {host:?} is not an IP address: {source}")]
    Address {
        /// The configured host.
        host: String,
        /// Parse failure.
        source: AddrParseError,
    },

    /// The listener could not take the configured port.
    #[error("cannot listen for thing requests on {addr}: {source}")]
    Bind {
        /// Address the listener tried to bind.
        addr: SocketAddr,
        /// Underlying socket error.
        source: io::Error,
    },

    /// Accepting connections failed after the listener was up.
    #[error("thing API stopped accepting connections: {0}")]
    Serve(#[source] io::Error),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use thingcast_core::ServiceContext;

    use super::*;

    #[test]
    fn address_is_host_and_port() {
        let config = ServerSection {
            host: "127.0.0.1".to_owned(),
            port: 8000,
        };
        assert_eq!(socket_addr(&config).unwrap().port(), 8000);
    }

    #[test]
    fn bad_host_names_the_configured_host() {
        let config = ServerSection {
            host: "not a host".to_owned(),
            port: 8000,
        };
        let err = socket_addr(&config).unwrap_err();
        assert!(matches!(&err, ServerError::Address { host, .. } if host == "not a host"));
        assert!(
            err.to_string()
                .starts_with("server.host \"not a host\" is not an IP address")
        );
    }

    #[tokio::test]
    async fn taken_port_is_a_bind_error() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();
        let config = ServerSection {
            host: addr.ip().to_string(),
            port: addr.port(),
        };
        let state = Arc::new(AppState::new(ServiceContext::in_memory(Vec::new())));

        let err = start_server(&config, state, std::future::pending())
            .await
            .unwrap_err();
        assert!(matches!(&err, ServerError::Bind { addr: bound, .. } if *bound == addr));
        assert!(
            err.to_string()
                .starts_with(&format!("cannot listen for thing requests on {addr}"))
        );
    }
}
