//! Integration tests for the WebSocket transport.
//!
//! These spin up a real listener on a loopback port chosen by the OS and
//! talk to it with a plain `tokio-tungstenite` client.

#[cfg(feature = "websocket")]
mod websocket {
    use futures_util::{SinkExt, StreamExt};
    use std::time::Duration;

    use roomcast_transport::{
        Connection, Frame, Handshake, Transport, WebSocketConnection, WebSocketTransport,
    };
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    /// Binds on port 0, connects one client, and returns both ends.
    async fn connected_pair() -> (WebSocketConnection, ClientWs) {
        let transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        pair_on(transport).await
    }

    async fn pair_on(mut transport: WebSocketTransport) -> (WebSocketConnection, ClientWs) {
        let addr = transport.local_addr().expect("local addr");

        let server = tokio::spawn(async move {
            let pending = transport.accept().await.expect("should accept");
            pending.complete().await.expect("should upgrade")
        });

        let (client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("client should connect");
        let conn = server.await.expect("accept task");
        (conn, client)
    }

    #[tokio::test]
    async fn test_websocket_send_and_receive_text() {
        let (conn, mut client) = connected_pair().await;

        conn.send(br#"{"type":"error","message":"hi"}"#)
            .await
            .expect("send should succeed");

        let msg = client.next().await.unwrap().unwrap();
        assert!(msg.is_text(), "UTF-8 payloads go out as text frames");
        assert_eq!(msg.into_text().unwrap().as_str(), r#"{"type":"error","message":"hi"}"#);

        client
            .send(Message::Text(r#"{"type":"leave_room"}"#.into()))
            .await
            .unwrap();
        let frame = conn.recv().await.expect("recv").expect("frame");
        assert_eq!(frame, Frame::Data(br#"{"type":"leave_room"}"#.to_vec()));
    }

    #[tokio::test]
    async fn test_websocket_non_utf8_goes_out_as_binary() {
        let (conn, mut client) = connected_pair().await;

        conn.send(&[0xff, 0xfe]).await.expect("send");

        let msg = client.next().await.unwrap().unwrap();
        assert!(msg.is_binary());
        assert_eq!(msg.into_data().as_ref(), &[0xff, 0xfe]);
    }

    #[tokio::test]
    async fn test_websocket_ping_surfaces_as_heartbeat() {
        let (conn, mut client) = connected_pair().await;

        client.send(Message::Ping(Vec::new().into())).await.unwrap();

        let frame = conn.recv().await.expect("recv").expect("frame");
        assert_eq!(frame, Frame::Heartbeat);
    }

    #[tokio::test]
    async fn test_websocket_recv_returns_none_on_client_close() {
        let (conn, mut client) = connected_pair().await;

        client.send(Message::Close(None)).await.unwrap();

        let result = conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
    }

    #[tokio::test]
    async fn test_websocket_send_while_reader_is_parked() {
        // The read half is locked by a pending recv; writes must still go
        // through.
        let (conn, mut client) = connected_pair().await;
        let conn = std::sync::Arc::new(conn);

        let reader = {
            let conn = std::sync::Arc::clone(&conn);
            tokio::spawn(async move { conn.recv().await })
        };
        tokio::task::yield_now().await;

        conn.send(b"{}").await.expect("send while reading");
        let msg = client.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"{}");

        client.send(Message::Close(None)).await.unwrap();
        let result = reader.await.expect("reader task").expect("recv");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_websocket_connection_ids_differ() {
        let (a, _client_a) = connected_pair().await;
        let (b, _client_b) = connected_pair().await;
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn test_websocket_limit_accepts_message_within_bound() {
        let transport = WebSocketTransport::bind_with_limit("127.0.0.1:0", 64)
            .await
            .expect("should bind");
        let (conn, mut client) = pair_on(transport).await;

        client.send(Message::Text("x".repeat(64).into())).await.unwrap();

        let frame = conn.recv().await.expect("recv").expect("frame");
        assert_eq!(frame, Frame::Data(vec![b'x'; 64]));
    }

    #[tokio::test]
    async fn test_websocket_limit_fails_read_of_oversized_message() {
        let transport = WebSocketTransport::bind_with_limit("127.0.0.1:0", 64)
            .await
            .expect("should bind");
        let (conn, mut client) = pair_on(transport).await;

        // Far past the limit; the read must fail on the frame header rather
        // than hand back a buffered payload. Sent from its own task since
        // the server stops reading partway through.
        tokio::spawn(async move {
            let _ = client.send(Message::Binary(vec![0u8; 1 << 20].into())).await;
            client
        });

        let result = tokio::time::timeout(Duration::from_secs(2), conn.recv())
            .await
            .expect("recv should not hang");
        assert!(result.is_err(), "oversized message must not be returned");
    }

    #[tokio::test]
    async fn test_websocket_stalled_handshake_does_not_block_accept() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("local addr");

        let server = tokio::spawn(async move {
            let mut upgraded = Vec::new();
            for _ in 0..2 {
                let pending = transport.accept().await.expect("should accept");
                upgraded.push(tokio::spawn(pending.complete()));
            }
            upgraded
        });

        // Opens a socket and never speaks.
        let _silent = tokio::net::TcpStream::connect(addr).await.unwrap();

        let (_client, _) = tokio::time::timeout(
            Duration::from_secs(2),
            tokio_tungstenite::connect_async(format!("ws://{addr}")),
        )
        .await
        .expect("second peer must not wait on the first")
        .expect("client should connect");

        let mut upgraded = server.await.expect("accept task");
        let second = upgraded.pop().unwrap().await.expect("handshake task");
        assert!(second.is_ok());
        upgraded.pop().unwrap().abort();
    }
}
