//! HTTP client abstraction for testability

use std::io::Read;
use std::time::Duration;

use thiserror::Error;

use crate::progress::Progress;

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Buffer size for reading response bodies (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Upper bound on the body preallocation taken from `Content-Length` (1MB).
const MAX_PREALLOCATION: u64 = BUFFER_SIZE as u64 * 16;

/// Errors reported by an [`HttpClient`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpError {
    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// The request could not be sent or the body could not be read.
    #[error("Request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    /// The request was abandoned because its progress was cancelled.
    #[error("Request cancelled")]
    Cancelled,
}

impl HttpError {
    /// Returns true for an HTTP 404 response.
    pub fn is_not_found(&self) -> bool {
        matches!(self, HttpError::Status { status: 404, .. })
    }
}

/// Trait for HTTP client operations.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling mock HTTP clients in tests. Implementations are shared
/// between worker threads and must tolerate concurrent calls.
pub trait HttpClient: Send + Sync {
    /// Performs an HTTP GET request.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to request
    /// * `progress` - Polled for cancellation while the body is read
    ///
    /// # Returns
    ///
    /// The response body as bytes or an error.
    fn get(&self, url: &str, progress: &dyn Progress) -> Result<Vec<u8>, HttpError>;
}

impl<C: HttpClient + ?Sized> HttpClient for std::sync::Arc<C> {
    fn get(&self, url: &str, progress: &dyn Progress) -> Result<Vec<u8>, HttpError> {
        (**self).get(url, progress)
    }
}

/// Real HTTP client implementation using reqwest.
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Creates a new ReqwestClient with default configuration.
    pub fn new() -> Result<Self, HttpError> {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a new ReqwestClient with custom timeout.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, HttpError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HttpError::Transport {
                url: String::new(),
                reason: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str, progress: &dyn Progress) -> Result<Vec<u8>, HttpError> {
        if progress.is_cancelled() {
            return Err(HttpError::Cancelled);
        }

        let mut response = self.client.get(url).send().map_err(|e| HttpError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        // Check HTTP status
        let status = response.status();
        if !status.is_success() {
            return Err(HttpError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        // Read response body, polling for cancellation between chunks.
        // Dropping the response on early return releases the connection.
        let total = response.content_length();
        // Content-Length is only a hint; the server may lie about it.
        let mut body = Vec::with_capacity(total.map_or(0, |t| t.min(MAX_PREALLOCATION) as usize));
        let mut buffer = vec![0u8; BUFFER_SIZE];
        loop {
            if progress.is_cancelled() {
                return Err(HttpError::Cancelled);
            }
            let n = response.read(&mut buffer).map_err(|e| HttpError::Transport {
                url: url.to_string(),
                reason: format!("Failed to read response: {}", e),
            })?;
            if n == 0 {
                break;
            }
            body.extend_from_slice(&buffer[..n]);
            progress.report(body.len() as u64, total);
        }

        Ok(body)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::progress::{NoProgress, ProgressToken};
    use parking_lot::Mutex;

    /// Mock HTTP client for testing.
    ///
    /// Serves the same response for every URL and records what was asked for.
    pub struct MockHttpClient {
        pub response: Result<Vec<u8>, HttpError>,
        requests: Mutex<Vec<String>>,
    }

    impl MockHttpClient {
        pub fn new(response: Result<Vec<u8>, HttpError>) -> Self {
            Self {
                response,
                requests: Mutex::new(Vec::new()),
            }
        }

        /// URLs requested so far, in call order.
        pub fn requests(&self) -> Vec<String> {
            self.requests.lock().clone()
        }
    }

    impl HttpClient for MockHttpClient {
        fn get(&self, url: &str, progress: &dyn Progress) -> Result<Vec<u8>, HttpError> {
            self.requests.lock().push(url.to_string());
            if progress.is_cancelled() {
                return Err(HttpError::Cancelled);
            }
            self.response.clone()
        }
    }

    #[test]
    fn test_mock_client_success() {
        let mock = MockHttpClient::new(Ok(vec![1, 2, 3, 4]));

        let result = mock.get("http://example.com", &NoProgress);
        assert!(result.is_ok());
        assert_eq!(result.unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(mock.requests(), vec!["http://example.com".to_string()]);
    }

    #[test]
    fn test_mock_client_error() {
        let mock = MockHttpClient::new(Err(HttpError::Transport {
            url: "http://example.com".to_string(),
            reason: "Test error".to_string(),
        }));

        let result = mock.get("http://example.com", &NoProgress);
        assert!(result.is_err());
    }

    #[test]
    fn test_mock_client_observes_cancellation() {
        let mock = MockHttpClient::new(Ok(vec![1]));
        let token = ProgressToken::new();
        token.cancel();

        assert_eq!(
            mock.get("http://example.com", &token),
            Err(HttpError::Cancelled)
        );
    }

    #[test]
    fn test_is_not_found() {
        let not_found = HttpError::Status {
            status: 404,
            url: "http://example.com".to_string(),
        };
        let server_error = HttpError::Status {
            status: 500,
            url: "http://example.com".to_string(),
        };
        assert!(not_found.is_not_found());
        assert!(!server_error.is_not_found());
        assert!(!HttpError::Cancelled.is_not_found());
    }

    /// Serve one connection with a fixed raw response, then close it.
    fn serve_once(response: &'static [u8]) -> String {
        use std::io::{Read, Write};
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            let _ = stream.write_all(response);
        });
        format!("http://{}/tile/0/0/0.png", addr)
    }

    #[test]
    fn test_reqwest_client_huge_content_length() {
        let url = serve_once(b"HTTP/1.1 200 OK\r\nContent-Length: 1125899906842624\r\n\r\nabc");
        let client = ReqwestClient::new().unwrap();

        let result = client.get(&url, &NoProgress);
        assert!(
            matches!(result, Err(HttpError::Transport { .. })),
            "unexpected result: {:?}",
            result.map(|b| b.len())
        );
    }

    #[test]
    fn test_reqwest_client_reads_body() {
        let url = serve_once(b"HTTP/1.1 200 OK\r\nContent-Length: 3\r\nConnection: close\r\n\r\nabc");
        let client = ReqwestClient::new().unwrap();
        let token = ProgressToken::new();

        assert_eq!(client.get(&url, &token).unwrap(), b"abc".to_vec());
        assert_eq!(token.bytes_received(), 3);
    }

    #[test]
    fn test_reqwest_client_cancelled_before_send() {
        let client = ReqwestClient::new().unwrap();
        let token = ProgressToken::new();
        token.cancel();

        // No request is issued, so an unroutable URL is fine here.
        let result = client.get("http://127.0.0.1:9/unused", &token);
        assert_eq!(result, Err(HttpError::Cancelled));
    }

    #[test]
    fn test_error_display() {
        let err = HttpError::Status {
            status: 500,
            url: "http://host/MapServer?f=json".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 500 from http://host/MapServer?f=json");
    }
}
