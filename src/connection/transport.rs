//! The byte stream under a broker connection: plain TCP or TLS, behind one type.

use std::ops::DerefMut;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::{client::TlsStream, TlsConnector};

/// Keepalive probe interval applied to every dialed socket.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("IO Error: {0}")]
    IO(#[from] std::io::Error),

    #[error("Invalid host-port string: {0}")]
    InvalidHostPort(String),

    #[error("Connecting to broker timed out")]
    ConnectTimeout,

    #[error("Invalid hostname: {0}")]
    BadHostname(#[from] rustls::pki_types::InvalidDnsNameError),

    #[error("Invalid TLS configuration: {0}")]
    Tls(#[from] rustls::Error),

    #[error("No private key found in the key PEM")]
    MissingPrivateKey,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug)]
pub enum Transport {
    Plain {
        inner: TcpStream,
    },

    Tls {
        inner: Pin<Box<TlsStream<TcpStream>>>,
    },
}

impl AsyncRead for Transport {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.deref_mut() {
            Self::Plain { inner } => Pin::new(inner).poll_read(cx, buf),
            Self::Tls { inner } => inner.as_mut().poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Transport {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.deref_mut() {
            Self::Plain { inner } => Pin::new(inner).poll_write(cx, buf),
            Self::Tls { inner } => inner.as_mut().poll_write(cx, buf),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.deref_mut() {
            Self::Plain { inner } => Pin::new(inner).poll_flush(cx),
            Self::Tls { inner } => inner.as_mut().poll_flush(cx),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.deref_mut() {
            Self::Plain { inner } => Pin::new(inner).poll_shutdown(cx),
            Self::Tls { inner } => inner.as_mut().poll_shutdown(cx),
        }
    }
}

impl Transport {
    /// Open a plain TCP stream to `broker`.
    pub async fn connect(broker: &str, connect_timeout: Option<Duration>) -> Result<Self> {
        let inner = Self::dial(broker, connect_timeout).await?;
        Ok(Self::Plain { inner })
    }

    /// Open a TCP stream to `broker` and wrap it in TLS.
    pub async fn connect_tls(
        broker: &str,
        tls_config: Arc<rustls::ClientConfig>,
        connect_timeout: Option<Duration>,
    ) -> Result<Self> {
        let tcp_stream = Self::dial(broker, connect_timeout).await?;

        // Strip port if any
        let host = broker
            .split(':')
            .next()
            .ok_or_else(|| Error::InvalidHostPort(broker.to_owned()))?
            .to_owned();
        let server_name = rustls::pki_types::ServerName::try_from(host)?;

        let connector = TlsConnector::from(tls_config);
        let tls_stream = connector.connect(server_name, tcp_stream).await?;
        Ok(Self::Tls {
            inner: Box::pin(tls_stream),
        })
    }

    async fn dial(broker: &str, connect_timeout: Option<Duration>) -> Result<TcpStream> {
        let stream = match connect_timeout {
            Some(timeout) => tokio::time::timeout(timeout, TcpStream::connect(broker))
                .await
                .map_err(|_| Error::ConnectTimeout)??,
            None => TcpStream::connect(broker).await?,
        };

        let keepalive = socket2::TcpKeepalive::new()
            .with_time(KEEPALIVE_INTERVAL)
            .with_interval(KEEPALIVE_INTERVAL);
        socket2::SockRef::from(&stream).set_tcp_keepalive(&keepalive)?;

        Ok(stream)
    }
}

/// Build a TLS client config from PEM data.
///
/// `ca_pem` is the sole trust root; system roots are not consulted. The client
/// certificate and key are presented to the broker for mutual TLS.
pub fn tls_config(
    ca_pem: &[u8],
    cert_pem: &[u8],
    key_pem: &[u8],
) -> Result<Arc<rustls::ClientConfig>> {
    let mut roots = rustls::RootCertStore::empty();
    for cert in rustls_pemfile::certs(&mut &*ca_pem) {
        roots.add(cert?)?;
    }

    let certs = rustls_pemfile::certs(&mut &*cert_pem).collect::<std::io::Result<Vec<_>>>()?;
    let key = rustls_pemfile::private_key(&mut &*key_pem)?.ok_or(Error::MissingPrivateKey)?;

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_client_auth_cert(certs, key)?;

    Ok(Arc::new(config))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn tls_config_rejects_garbage() {
        assert_matches!(
            tls_config(b"not a cert", b"", b""),
            Err(Error::MissingPrivateKey)
        );
    }

    #[tokio::test]
    async fn connect_timeout_fires() {
        // 192.0.2.0/24 is TEST-NET-1, nothing answers there
        let result = Transport::connect("192.0.2.1:9092", Some(Duration::from_millis(50))).await;
        assert_matches!(result, Err(Error::ConnectTimeout) | Err(Error::IO(_)));
    }
}
