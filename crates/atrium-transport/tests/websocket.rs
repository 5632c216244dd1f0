//! Integration tests for the WebSocket transport: a real listener, a real
//! dialer, frames flowing both ways.

#[cfg(feature = "websocket")]
mod websocket {
    use atrium_transport::{
        Connection, Connector, Transport, WebSocketConnector, WebSocketTransport,
    };

    /// Binds a transport on an OS-assigned port and returns it with the
    /// address a client should dial.
    async fn bind_ephemeral() -> (WebSocketTransport, String) {
        let transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("should have local addr");
        (transport, format!("ws://{addr}"))
    }

    #[tokio::test]
    async fn test_accept_and_exchange_frames() {
        let (mut transport, url) = bind_ephemeral().await;

        let server_handle =
            tokio::spawn(async move { transport.accept().await.expect("should accept") });

        let client_conn = WebSocketConnector
            .connect(&url)
            .await
            .expect("client should connect");
        let server_conn = server_handle.await.expect("task should complete");

        // Both ends got distinct process-unique ids.
        assert_ne!(server_conn.id(), client_conn.id());

        // --- Server sends, client receives ---
        server_conn
            .send(b"hello from server")
            .await
            .expect("send should succeed");
        let frame = client_conn
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should have data");
        assert_eq!(frame, b"hello from server");

        // --- Client sends, server receives ---
        client_conn
            .send(b"hello from client")
            .await
            .expect("send should succeed");
        let frame = server_conn
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should have data");
        assert_eq!(frame, b"hello from client");

        server_conn.close().await.expect("close should succeed");
    }

    #[tokio::test]
    async fn test_recv_returns_none_on_peer_close() {
        let (mut transport, url) = bind_ephemeral().await;

        let server_handle =
            tokio::spawn(async move { transport.accept().await.expect("should accept") });

        let client_conn = WebSocketConnector
            .connect(&url)
            .await
            .expect("client should connect");
        let server_conn = server_handle.await.unwrap();

        client_conn.close().await.expect("close should succeed");

        let result = server_conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on peer close");
    }

    #[tokio::test]
    async fn test_connect_to_dead_port_fails() {
        // Bind and immediately drop to get a port nothing listens on.
        let (transport, url) = bind_ephemeral().await;
        drop(transport);

        let result = WebSocketConnector.connect(&url).await;
        assert!(result.is_err(), "dialing a dead port should fail");
    }
}
