use crate::error::{Error, Result};
use std::fmt;
use std::path::PathBuf;
use url::Url;

/// Script path requested from the pool when the URL does not name one.
pub const DEFAULT_STATUS_PATH: &str = "/status";

/// Where the status report is fetched from. Exactly one is active per collector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Http(Url),
    FastCgi(FastCgiTarget),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketAddress {
    /// `host:port`
    Tcp(String),
    Unix(PathBuf),
}

/// A FastCGI responder plus the synthetic CGI request sent to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastCgiTarget {
    pub address: SocketAddress,
    pub script_path: String,
    pub query: String,
}

impl Endpoint {
    pub fn http(raw: &str) -> Result<Self> {
        let url = Url::parse(raw)?;
        match url.scheme() {
            "http" | "https" => Ok(Endpoint::Http(url)),
            other => Err(Error::Endpoint(format!(
                "unsupported HTTP scheme '{}' in {}",
                other, raw
            ))),
        }
    }

    pub fn fastcgi(raw: &str) -> Result<Self> {
        let url = Url::parse(raw)?;
        Ok(Endpoint::FastCgi(FastCgiTarget::from_url(&url)?))
    }
}

impl FastCgiTarget {
    /// The URL scheme names the network: `tcp://host:port/path?query` or
    /// `unix:///path/to/socket`. Unix sockets always request the default status path.
    pub fn from_url(url: &Url) -> Result<Self> {
        let (address, script_path) = match url.scheme() {
            "unix" => {
                if url.path().is_empty() {
                    return Err(Error::Endpoint(format!("missing socket path in {}", url)));
                }
                (
                    SocketAddress::Unix(PathBuf::from(url.path())),
                    DEFAULT_STATUS_PATH.to_string(),
                )
            }
            "tcp" => {
                let host = url
                    .host_str()
                    .ok_or_else(|| Error::Endpoint(format!("missing host in {}", url)))?;
                let port = url
                    .port()
                    .ok_or_else(|| Error::Endpoint(format!("missing port in {}", url)))?;
                let path = if url.path().is_empty() {
                    DEFAULT_STATUS_PATH.to_string()
                } else {
                    url.path().to_string()
                };
                (SocketAddress::Tcp(format!("{}:{}", host, port)), path)
            }
            other => {
                return Err(Error::Endpoint(format!(
                    "unsupported FastCGI network '{}' in {}",
                    other, url
                )));
            }
        };

        Ok(Self {
            address,
            script_path,
            query: sorted_query(url),
        })
    }
}

fn sorted_query(url: &Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    pairs.sort();

    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

impl fmt::Display for SocketAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocketAddress::Tcp(addr) => write!(f, "tcp://{}", addr),
            SocketAddress::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Http(url) => write!(f, "{}", url),
            Endpoint::FastCgi(target) => {
                write!(f, "{}{}", target.address, target.script_path)?;
                if !target.query.is_empty() {
                    write!(f, "?{}", target.query)?;
                }
                Ok(())
            }
        }
    }
}
