use crate::error::Result;
use tokio::net::{TcpStream, ToSocketAddrs};

/// Dials a broker over plain TCP and disables Nagle, returning a stream
/// ready to hand to [`crate::session::Session::connect`].
///
/// Reconnection supervision is deliberately left to the caller.
///
/// # Errors
///
/// Returns `MqttError::Io` when the connection cannot be established.
pub async fn connect(addr: impl ToSocketAddrs) -> Result<TcpStream> {
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn dials_a_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (stream, accepted) = tokio::join!(connect(addr), listener.accept());
        assert!(stream.is_ok());
        assert!(accepted.is_ok());
    }

    #[tokio::test]
    async fn refused_connection_is_an_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        assert!(connect(addr).await.is_err());
    }
}
