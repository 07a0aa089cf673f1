// HTTP client configuration and utilities

use pitch_core::{PlaybackError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

const CANCEL_POLL: Duration = Duration::from_millis(20);

/// Agent settings
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub max_retries: u32,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(60),
            max_retries: 3,
            user_agent: "Mozilla/5.0 (compatible; PitchAudioPlayer/0.1)".to_string(),
        }
    }
}

/// Create a configured HTTP agent
pub fn create_http_agent(settings: &HttpSettings) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(settings.connect_timeout)
        .timeout_read(settings.read_timeout)
        .user_agent(&settings.user_agent)
        .redirects(10)
        .build()
}

/// HTTP client wrapper
pub struct HttpClient {
    agent: ureq::Agent,
    settings: HttpSettings,
}

impl HttpClient {
    pub fn new(settings: HttpSettings) -> Self {
        Self {
            agent: create_http_agent(&settings),
            settings,
        }
    }

    /// GET with exponential backoff. Client errors (4xx) are not retried.
    ///
    /// `cancel` is checked before every attempt and during the backoff sleep.
    pub fn get(&self, url: &str, cancel: &AtomicBool) -> Result<ureq::Response> {
        let mut last_error = String::new();

        for attempt in 0..=self.settings.max_retries {
            if cancel.load(Ordering::Relaxed) {
                return Err(PlaybackError::unavailable(url, "request cancelled"));
            }

            match self.agent.get(url).call() {
                Ok(response) => return Ok(response),
                Err(ureq::Error::Status(code, _)) if (400..500).contains(&code) => {
                    return Err(PlaybackError::unavailable(url, format!("HTTP status {}", code)));
                }
                Err(e) => {
                    last_error = e.to_string();
                    if attempt < self.settings.max_retries {
                        let delay = backoff_delay(attempt);
                        log::warn!(
                            "Request failed (attempt {}), retrying after {:?}: {}",
                            attempt + 1,
                            delay,
                            last_error
                        );
                        if !sleep_unless_cancelled(delay, cancel) {
                            return Err(PlaybackError::unavailable(url, "request cancelled"));
                        }
                    }
                }
            }
        }

        Err(PlaybackError::unavailable(
            url,
            format!(
                "request failed after {} attempts: {}",
                self.settings.max_retries + 1,
                last_error
            ),
        ))
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new(HttpSettings::default())
    }
}

/// Sleep in short slices; false if `cancel` was raised meanwhile
fn sleep_unless_cancelled(delay: Duration, cancel: &AtomicBool) -> bool {
    let deadline = Instant::now() + delay;
    loop {
        if cancel.load(Ordering::Relaxed) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep((deadline - now).min(CANCEL_POLL));
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(500 * 2u64.pow(attempt.min(6)))
}

/// Whether a URI should go through this transport
pub fn is_http_url(uri: &str) -> bool {
    let lower = uri.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_http_url() {
        assert!(is_http_url("https://example.com/elevator-pitch.mp3"));
        assert!(is_http_url("HTTP://example.com/a.mp3"));
        assert!(!is_http_url("/elevator-pitch.mp3"));
        assert!(!is_http_url("file:///tmp/a.mp3"));
    }

    #[test]
    fn test_backoff_grows() {
        assert_eq!(backoff_delay(0), Duration::from_millis(500));
        assert_eq!(backoff_delay(2), Duration::from_millis(2000));
        assert_eq!(backoff_delay(40), backoff_delay(6));
    }

    #[test]
    fn test_cancelled_request_skips_network() {
        let client = HttpClient::default();
        let cancel = AtomicBool::new(true);
        let started = Instant::now();
        let err = client.get("http://127.0.0.1:9/elevator-pitch.mp3", &cancel).unwrap_err();
        assert!(err.to_string().contains("cancelled"));
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_backoff_sleep_stops_on_cancel() {
        let cancel = AtomicBool::new(false);
        assert!(sleep_unless_cancelled(Duration::from_millis(5), &cancel));

        cancel.store(true, Ordering::Relaxed);
        let started = Instant::now();
        assert!(!sleep_unless_cancelled(Duration::from_secs(10), &cancel));
        assert!(started.elapsed() < Duration::from_millis(100));
    }
}
