//! Image analysis collaborator
//!
//! Turns an uploaded photo into raw size/color/texture sub-scores. The
//! analyzer is external and may be slow or unavailable; callers bound it with
//! a timeout and record nothing when it fails.

use std::time::Duration;

use async_trait::async_trait;
use dropboard_common::config::AnalyzerConfig;
use dropboard_common::models::AnalysisTriple;
use dropboard_common::{Error, Result};
use tracing::{debug, warn};

/// Largest accepted upload
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Produces an analysis triple for an image
#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    /// Analyzer identifier for logs
    fn source_id(&self) -> &'static str;

    /// Analyze one image
    ///
    /// The returned triple is unvalidated; range checks belong to scoring.
    async fn analyze(&self, image: &[u8]) -> Result<AnalysisTriple>;

    /// Whether the analyzer can be called at all
    fn is_available(&self) -> bool {
        true
    }
}

/// Reject empty and oversized uploads before they reach an analyzer
pub fn validate_image(image: &[u8]) -> Result<()> {
    if image.is_empty() {
        return Err(Error::InvalidInput("Image upload is empty".to_string()));
    }
    if image.len() > MAX_IMAGE_BYTES {
        return Err(Error::InvalidInput(format!(
            "Image is {} bytes, limit is {}",
            image.len(),
            MAX_IMAGE_BYTES
        )));
    }
    Ok(())
}

/// Posts the raw image to an HTTP endpoint answering `{size, color, texture}`
pub struct HttpImageAnalyzer {
    url: String,
    client: reqwest::Client,
}

impl HttpImageAnalyzer {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl ImageAnalyzer for HttpImageAnalyzer {
    fn source_id(&self) -> &'static str {
        "http"
    }

    async fn analyze(&self, image: &[u8]) -> Result<AnalysisTriple> {
        debug!("Posting {} byte image to {}", image.len(), self.url);

        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(image.to_vec())
            .send()
            .await
            .map_err(|e| {
                warn!("Image analyzer request failed: {}", e);
                Error::AnalysisUnavailable(format!("Request failed: {}", e))
            })?;

        if !response.status().is_success() {
            warn!("Image analyzer returned {}", response.status());
            return Err(Error::AnalysisUnavailable(format!(
                "Analyzer returned {}",
                response.status()
            )));
        }

        response.json::<AnalysisTriple>().await.map_err(|e| {
            warn!("Image analyzer sent an unreadable body: {}", e);
            Error::AnalysisUnavailable(format!("Malformed analyzer response: {}", e))
        })
    }
}

/// Stand-in used when no analyzer URL is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredAnalyzer;

#[async_trait]
impl ImageAnalyzer for UnconfiguredAnalyzer {
    fn source_id(&self) -> &'static str {
        "unconfigured"
    }

    async fn analyze(&self, _image: &[u8]) -> Result<AnalysisTriple> {
        Err(Error::AnalysisUnavailable(
            "No image analyzer is configured".to_string(),
        ))
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// Build the analyzer described by configuration
pub fn from_config(config: &AnalyzerConfig) -> Result<Box<dyn ImageAnalyzer>> {
    match config.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        Some(url) => Ok(Box::new(HttpImageAnalyzer::new(
            url,
            Duration::from_millis(config.timeout_ms),
        )?)),
        None => Ok(Box::new(UnconfiguredAnalyzer)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_image_bounds() {
        assert!(matches!(validate_image(&[]), Err(Error::InvalidInput(_))));
        assert!(validate_image(&[0xFF, 0xD8]).is_ok());
        assert!(validate_image(&vec![0u8; MAX_IMAGE_BYTES]).is_ok());
        assert!(matches!(
            validate_image(&vec![0u8; MAX_IMAGE_BYTES + 1]),
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_unconfigured_analyzer_is_unavailable() {
        let analyzer = from_config(&AnalyzerConfig::default()).unwrap();
        assert!(!analyzer.is_available());
        assert!(matches!(
            analyzer.analyze(b"jpeg").await,
            Err(Error::AnalysisUnavailable(_))
        ));
    }

    #[test]
    fn test_configured_url_builds_http_analyzer() {
        let config = AnalyzerConfig {
            url: Some("http://127.0.0.1:9/analyze".to_string()),
            ..AnalyzerConfig::default()
        };
        let analyzer = from_config(&config).unwrap();
        assert_eq!(analyzer.source_id(), "http");
        assert!(analyzer.is_available());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_unavailable() {
        // Port 9 (discard) is closed on test hosts
        let analyzer = HttpImageAnalyzer::new("http://127.0.0.1:9/analyze", Duration::from_secs(2)).unwrap();
        assert!(matches!(
            analyzer.analyze(b"jpeg").await,
            Err(Error::AnalysisUnavailable(_))
        ));
    }
}
