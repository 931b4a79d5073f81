//! FastCGI transport: one GET-style responder request per connection.
//!
//! The pool manager serves its status page to FastCGI clients directly, so
//! no web server is needed in front of it. The request carries a synthetic
//! CGI environment naming the status script; the response's STDOUT stream is
//! a CGI document (headers, blank line, body).

use crate::endpoint::{FastCgiTarget, SocketAddress};
use crate::error::{Error, Result};
use fastcgi_client::{Client, Params, Request};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Splits a CGI document into its status code and body. A missing `Status`
/// header yields 0, which responders use for an implicit success.
fn split_cgi_response(stdout: &[u8]) -> Result<(u16, &[u8])> {
    let crlf = find(stdout, b"\r\n\r\n").map(|i| (i, 4));
    let lf = find(stdout, b"\n\n").map(|i| (i, 2));
    let Some((end, sep_len)) = [crlf, lf].into_iter().flatten().min() else {
        return Ok((0, stdout));
    };

    let headers = String::from_utf8_lossy(&stdout[..end]);
    let mut status: u16 = 0;
    for line in headers.lines() {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if name.trim().eq_ignore_ascii_case("status") {
            let code = value.split_whitespace().next().unwrap_or_default();
            status = code
                .parse()
                .map_err(|_| Error::FastCgi(format!("malformed status header: {}", line)))?;
        }
    }

    Ok((status, &stdout[end + sep_len..]))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

pub struct FastCgiFetcher {
    timeout: Duration,
}

impl FastCgiFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn get(&self, target: &FastCgiTarget) -> Result<Vec<u8>> {
        log::debug!("Fetching status from {}{}", target.address, target.script_path);

        tokio::time::timeout(self.timeout, self.exchange(target))
            .await
            .map_err(|_| Error::Timeout)?
    }

    async fn exchange(&self, target: &FastCgiTarget) -> Result<Vec<u8>> {
        match &target.address {
            SocketAddress::Tcp(addr) => {
                let stream = TcpStream::connect(addr.as_str()).await?;
                roundtrip(stream, target).await
            }
            #[cfg(unix)]
            SocketAddress::Unix(path) => {
                let stream = tokio::net::UnixStream::connect(path).await?;
                roundtrip(stream, target).await
            }
            #[cfg(not(unix))]
            SocketAddress::Unix(path) => Err(Error::FastCgi(format!(
                "unix sockets are not supported on this platform: {}",
                path.display()
            ))),
        }
    }
}

async fn roundtrip<S>(stream: S, target: &FastCgiTarget) -> Result<Vec<u8>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let params = Params::default()
        .request_method("GET")
        .content_length(0)
        .script_filename(target.script_path.as_str())
        .script_name(target.script_path.as_str())
        .query_string(target.query.as_str());

    let output = Client::new(stream)
        .execute_once(Request::new(params, &mut tokio::io::empty()))
        .await
        .map_err(|e| Error::FastCgi(e.to_string()))?;

    if let Some(stderr) = output.stderr.filter(|s| !s.is_empty()) {
        log::warn!(
            "FastCGI responder wrote to stderr: {}",
            String::from_utf8_lossy(&stderr).trim()
        );
    }

    let stdout = output.stdout.unwrap_or_default();
    let (status, body) = split_cgi_response(&stdout)?;
    if status != 200 && status != 0 {
        return Err(Error::UnexpectedStatus(status));
    }

    Ok(body.to_vec())
}
