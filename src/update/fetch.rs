//! Remote artifact fetching.
//!
//! Abstracts the download so the checker can be exercised without a network:
//! - `Fetcher` trait: stream a URL's body into a writer
//! - `HttpFetcher`: blocking HTTP(S) GET via ureq
//! - `FileFetcher`: `file://` URLs (local mirrors)
//! - `DefaultFetcher`: picks one of the above by scheme

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

/// Fetch errors
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("transport error fetching {url}: {message}")]
    Transport { url: String, message: String },

    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("I/O error fetching {url}: {source}")]
    Io {
        url: String,
        #[source]
        source: io::Error,
    },
}

/// Something that can stream a URL's body into a writer.
pub trait Fetcher {
    /// Write the body of `url` into `sink`, returning the byte count.
    fn fetch(&self, url: &str, sink: &mut dyn Write) -> Result<u64, FetchError>;
}

impl<T: Fetcher + ?Sized> Fetcher for &T {
    fn fetch(&self, url: &str, sink: &mut dyn Write) -> Result<u64, FetchError> {
        (**self).fetch(url, sink)
    }
}

/// Blocking HTTP(S) fetcher
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    /// Create a fetcher whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("sbot/", env!("CARGO_PKG_VERSION")))
            .build();
        Self { agent }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, sink: &mut dyn Write) -> Result<u64, FetchError> {
        debug!(url, "fetching");
        let response = match self.agent.get(url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(status, _)) => {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status,
                })
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(FetchError::Transport {
                    url: url.to_string(),
                    message: transport.to_string(),
                })
            }
        };

        let status = response.status();
        if !(200..300).contains(&status) {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let mut reader = response.into_reader();
        io::copy(&mut reader, sink).map_err(|source| FetchError::Io {
            url: url.to_string(),
            source,
        })
    }
}

/// Reads `file://` URLs from the local filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct FileFetcher;

impl FileFetcher {
    fn path_of(url: &str) -> Result<PathBuf, FetchError> {
        url.strip_prefix("file://")
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| FetchError::UnsupportedScheme(url.to_string()))
    }
}

impl Fetcher for FileFetcher {
    fn fetch(&self, url: &str, sink: &mut dyn Write) -> Result<u64, FetchError> {
        let path = Self::path_of(url)?;
        let io_err = |source| FetchError::Io {
            url: url.to_string(),
            source,
        };
        let mut file = File::open(&path).map_err(io_err)?;
        io::copy(&mut file, sink).map_err(io_err)
    }
}

/// Dispatches on URL scheme
pub struct DefaultFetcher {
    http: HttpFetcher,
    file: FileFetcher,
}

impl DefaultFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            http: HttpFetcher::new(timeout),
            file: FileFetcher,
        }
    }
}

impl Fetcher for DefaultFetcher {
    fn fetch(&self, url: &str, sink: &mut dyn Write) -> Result<u64, FetchError> {
        match Scheme::of(url)? {
            Scheme::Http => self.http.fetch(url, sink),
            Scheme::File => self.file.fetch(url, sink),
        }
    }
}

/// URL schemes the installer can fetch from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    File,
}

impl Scheme {
    pub fn of(url: &str) -> Result<Self, FetchError> {
        let lower = url.trim_start().to_ascii_lowercase();
        if lower.starts_with("https://") || lower.starts_with("http://") {
            Ok(Scheme::Http)
        } else if lower.starts_with("file://") {
            Ok(Scheme::File)
        } else {
            Err(FetchError::UnsupportedScheme(url.to_string()))
        }
    }
}
