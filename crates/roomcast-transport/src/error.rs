use std::io;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Binding the listening socket failed.
    #[error("bind failed: {0}")]
    Bind(#[source] io::Error),

    /// Accepting a TCP stream or completing the upgrade handshake failed.
    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),

    /// Writing a frame to the peer failed.
    #[error("send failed: {0}")]
    Send(#[source] io::Error),

    /// Reading a frame from the peer failed.
    #[error("receive failed: {0}")]
    Receive(#[source] io::Error),
}

impl TransportError {
    /// Wraps any displayable transport-library error as an `io::Error` of
    /// the given kind. Keeps the public error free of library types.
    pub(crate) fn io<E>(kind: io::ErrorKind, err: E) -> io::Error
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        io::Error::new(kind, err)
    }
}
