//! `HostServer` builder and accept loop.

use std::sync::Arc;

use atrium_media::MediaSystem;
use atrium_transport::{Transport, WebSocketTransport};
use atrium_world::WorldRegistry;

use crate::handler::handle_connection;
use crate::AtriumError;

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<M: MediaSystem> {
    pub(crate) registry: WorldRegistry<M>,
}

/// Builder for configuring and starting a world host.
///
/// # Example
///
/// ```rust,no_run
/// # use atrium::HostServer;
/// # use atrium_media::NullMedia;
/// # async fn run() -> Result<(), atrium::AtriumError> {
/// let server = HostServer::<NullMedia>::builder()
///     .bind("0.0.0.0:4000")
///     .build(NullMedia)
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct HostServerBuilder {
    bind_addr: String,
}

impl HostServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:4000".to_string(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Binds the transport and builds the server around the given media
    /// subsystem.
    pub async fn build<M: MediaSystem>(self, media: M) -> Result<HostServer<M>, AtriumError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            registry: WorldRegistry::new(media),
        });

        Ok(HostServer { transport, state })
    }
}

impl Default for HostServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running world host.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct HostServer<M: MediaSystem> {
    transport: WebSocketTransport,
    state: Arc<ServerState<M>>,
}

impl<M: MediaSystem> HostServer<M> {
    /// Creates a new builder.
    pub fn builder() -> HostServerBuilder {
        HostServerBuilder::new()
    }

    /// Returns the local address the server is bound to. Useful when
    /// binding to port 0.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The world registry backing this server.
    pub fn registry(&self) -> &WorldRegistry<M> {
        &self.state.registry
    }

    /// Runs the accept loop: each incoming connection gets its own
    /// handler task. Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), AtriumError> {
        tracing::info!("world host running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
