// Whole-body download of a remote audio source

use crate::client::HttpClient;
use pitch_core::{PlaybackError, Result};
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};

const CHUNK_SIZE: usize = 64 * 1024;

/// Download `url` into memory.
///
/// `cancel` is checked between chunks so a released binding does not keep a
/// download thread busy.
pub fn fetch_to_memory(client: &HttpClient, url: &str, cancel: &AtomicBool) -> Result<Vec<u8>> {
    log::info!("Starting download from: {}", url);

    let response = client.get(url, cancel)?;
    let content_length = response
        .header("Content-Length")
        .and_then(|s| s.parse::<usize>().ok());

    log::info!("Content length: {:?} bytes", content_length);

    let mut body = Vec::with_capacity(content_length.unwrap_or(CHUNK_SIZE));
    let mut reader = response.into_reader();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut last_log_mb = 0;

    loop {
        if cancel.load(Ordering::Relaxed) {
            return Err(PlaybackError::unavailable(url, "download cancelled"));
        }

        let bytes_read = reader
            .read(&mut buffer)
            .map_err(|e| PlaybackError::unavailable(url, format!("download failed: {}", e)))?;
        if bytes_read == 0 {
            break;
        }
        body.extend_from_slice(&buffer[..bytes_read]);

        let current_mb = body.len() / (1024 * 1024);
        if current_mb > last_log_mb {
            log::debug!("Downloaded: {} MB", current_mb);
            last_log_mb = current_mb;
        }
    }

    if body.is_empty() {
        return Err(PlaybackError::unavailable(url, "empty response body"));
    }

    log::info!("Download complete: {} bytes", body.len());
    Ok(body)
}
