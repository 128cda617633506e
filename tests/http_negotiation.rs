//! Negotiation over HTTP against a minimal local server.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::timeout;

use sockets_client::client::{HttpNegotiator, Negotiator};
use sockets_client::transport::MemoryTransport;
use sockets_client::{Connection, Error};

const WAIT: Duration = Duration::from_secs(5);

// ============================================================================
// Helpers
// ============================================================================

/// Serves one HTTP request with `status` and `body`, reporting the request line.
async fn serve_once(
    status: &'static str,
    body: &'static str,
) -> anyhow::Result<(SocketAddr, oneshot::Receiver<String>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let Ok((mut stream, _)) = listener.accept().await else {
            return;
        };

        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            match stream.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => request.extend_from_slice(&buf[..n]),
            }
        }

        let request = String::from_utf8_lossy(&request);
        let request_line = request.lines().next().unwrap_or_default().to_string();
        let _ = tx.send(request_line);

        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let _ = stream.write_all(response.as_bytes()).await;
        let _ = stream.shutdown().await;
    });

    Ok((addr, rx))
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_http_negotiator_reads_connection_id() -> anyhow::Result<()> {
    let (addr, request_line) = serve_once("200 OK", "conn-42").await?;
    let url = url::Url::parse(&format!("http://{addr}/chat/negotiate"))?;

    let id = HttpNegotiator::new().negotiate(&url).await?;
    assert_eq!(id.as_str(), "conn-42");

    let request_line = timeout(WAIT, request_line).await??;
    assert_eq!(request_line, "GET /chat/negotiate HTTP/1.1");
    Ok(())
}

#[tokio::test]
async fn test_http_negotiator_keeps_body_verbatim() -> anyhow::Result<()> {
    let (addr, _request_line) = serve_once("200 OK", " conn-42\n").await?;
    let url = url::Url::parse(&format!("http://{addr}/chat/negotiate"))?;

    let id = HttpNegotiator::new().negotiate(&url).await?;
    assert_eq!(id.as_str(), " conn-42\n");
    Ok(())
}

#[tokio::test]
async fn test_builder_negotiates_over_http() -> anyhow::Result<()> {
    let (addr, request_line) = serve_once("200 OK", "abc").await?;
    let transport = MemoryTransport::new();

    let connection = Connection::builder()
        .url(format!("http://{addr}/chat"))
        .transport(transport.clone())
        .http_client(reqwest::Client::new())
        .connect()
        .await?;

    assert_eq!(connection.connection_id().as_str(), "abc");
    assert_eq!(
        transport.started_url().expect("started").as_str(),
        format!("http://{addr}/chat?id=abc")
    );

    let request_line = timeout(WAIT, request_line).await??;
    assert_eq!(request_line, "GET /chat/negotiate HTTP/1.1");
    Ok(())
}

#[tokio::test]
async fn test_error_status_fails_negotiation() -> anyhow::Result<()> {
    let (addr, _request_line) = serve_once("404 Not Found", "").await?;
    let transport = MemoryTransport::new();

    let err = Connection::builder()
        .url(format!("http://{addr}/chat"))
        .transport(transport.clone())
        .http_client(reqwest::Client::new())
        .connect()
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NegotiationFailed { .. }));
    assert!(!transport.is_started());
    Ok(())
}

#[tokio::test]
async fn test_empty_body_fails_negotiation() -> anyhow::Result<()> {
    let (addr, _request_line) = serve_once("200 OK", "").await?;
    let url = url::Url::parse(&format!("http://{addr}/chat/negotiate"))?;

    let err = HttpNegotiator::new().negotiate(&url).await.unwrap_err();
    assert!(matches!(err, Error::NegotiationFailed { .. }));
    Ok(())
}
