use crate::error::{PacError, Result};
use reqwest::blocking::Client;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

/// Where PAC script bodies come from.
pub trait ScriptFetcher: Send + Sync {
    /// Returns the script text, or an error if nothing arrived within `timeout`.
    fn fetch(&self, location: &str, timeout: Duration) -> Result<String>;
}

/// Fetches `http(s)://` URLs with a blocking GET and reads `file://` URLs or
/// plain paths from disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpFetcher;

impl ScriptFetcher for HttpFetcher {
    fn fetch(&self, location: &str, timeout: Duration) -> Result<String> {
        match Url::parse(location) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => download_pac(&url, timeout),
            Ok(url) if url.scheme() == "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|_| PacError::fetch(location, "not a local file URL"))?;
                read_pac(&path, location)
            }
            // Drive letters parse as one-character schemes.
            Ok(url) if url.scheme().len() > 1 => Err(PacError::fetch(
                location,
                format!("unsupported scheme {}", url.scheme()),
            )),
            _ => read_pac(Path::new(location), location),
        }
    }
}

/// Download PAC file from URL, return its JS string.
pub fn download_pac(pac_url: &Url, timeout: Duration) -> Result<String> {
    let client = Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| PacError::fetch(pac_url.as_str(), e))?;
    info!("Downloading PAC file from {}", pac_url);
    let resp = client
        .get(pac_url.clone())
        .send()
        .map_err(|e| PacError::fetch(pac_url.as_str(), e))?;
    if !resp.status().is_success() {
        warn!("Failed to download PAC file: status={}", resp.status());
        return Err(PacError::fetch(
            pac_url.as_str(),
            format!("HTTP status {}", resp.status()),
        ));
    }
    resp.text().map_err(|e| PacError::fetch(pac_url.as_str(), e))
}

fn read_pac(path: &Path, location: &str) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| PacError::fetch(location, e))
}
