use crate::types::{BoundingBox, CancelToken, SatError, SatResult};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default public endpoint of the super-resolution service
pub const DEFAULT_ENDPOINT: &str =
    "http://satsr.deep-hybrid-datacloud.eu/api/v2/models/satsr/predict/";

/// Extension given to enhanced raster outputs
pub const RASTER_EXTENSION: &str = "tif";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
const USER_AGENT: &str = "satpipe/0.2.0 (Satellite Imagery Pipeline)";

// Query values must arrive percent-encoded with spaces as %20, never '+'.
// Alphanumerics, the usual unreserved marks and '/' pass through; brackets,
// commas and quotes are encoded.
const QUERY_VALUE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// Retry behavior for enhancement requests.
///
/// The default performs no automatic retry; retries are the caller's
/// decision. Only transport failures are ever retried; a rejection from
/// the remote is final.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::from_secs(2),
        }
    }
}

/// Client for the external super-resolution/preprocessing service.
///
/// One invocation performs one network call and, on success, one file
/// write: the returned raster bytes land next to the source archive with
/// the extension swapped for `.tif`, overwriting any previous output.
pub struct EnhancementClient {
    base_url: String,
    client: reqwest::blocking::Client,
    retry: RetryPolicy,
}

impl EnhancementClient {
    pub fn new(base_url: impl Into<String>) -> SatResult<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> SatResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| {
                SatError::EnhancementUnavailable(format!("failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            base_url: base_url.into(),
            client,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Submit one product archive for enhancement and persist the returned
    /// raster. Returns the output path (source path with a `.tif` extension).
    pub fn enhance(&self, file_path: &Path, bbox: &BoundingBox) -> SatResult<PathBuf> {
        if !bbox.is_finite() {
            return Err(SatError::InvalidRegion(format!(
                "bounding box has non-finite components: {:?}",
                bbox
            )));
        }

        let payload = fs::read(file_path)?;
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "data.zip".to_string());

        let url = format!("{}?{}", self.base_url, build_query(bbox));
        log::info!("Submitting {} for enhancement", file_path.display());
        log::debug!("Enhancement request URL: {}", url);

        let body = self.post_with_retry(&url, &file_name, &payload)?;

        let output_path = file_path.with_extension(RASTER_EXTENSION);
        fs::write(&output_path, &body)?;
        log::info!(
            "Enhanced raster written to {} ({} bytes)",
            output_path.display(),
            body.len()
        );

        Ok(output_path)
    }

    /// Enhance a multi-selection of archives, strictly sequentially: each
    /// job completes (including its file write) before the next begins.
    /// Failures are isolated per file and never abort the batch; a tripped
    /// cancellation token stops before the next file starts.
    pub fn enhance_batch(
        &self,
        files: &[PathBuf],
        bbox: &BoundingBox,
        cancel: Option<&CancelToken>,
    ) -> Vec<(PathBuf, SatResult<PathBuf>)> {
        let mut results = Vec::with_capacity(files.len());

        for file in files {
            if let Some(token) = cancel {
                if let Err(e) = token.checkpoint() {
                    log::warn!("Enhancement batch cancelled before {}", file.display());
                    results.push((file.clone(), Err(e)));
                    break;
                }
            }

            let outcome = self.enhance(file, bbox);
            if let Err(ref e) = outcome {
                log::error!("Enhancement failed for {}: {}", file.display(), e);
            }
            results.push((file.clone(), outcome));
        }

        results
    }

    fn post_with_retry(&self, url: &str, file_name: &str, payload: &[u8]) -> SatResult<Vec<u8>> {
        let mut last_error = None;

        for attempt in 1..=self.retry.max_attempts.max(1) {
            log::debug!("Enhancement attempt {} of {}", attempt, self.retry.max_attempts);

            match self.post_once(url, file_name, payload) {
                Ok(body) => return Ok(body),
                // A remote rejection is final; only transport failures retry
                Err(e @ SatError::EnhancementService { .. }) => return Err(e),
                Err(e) => {
                    log::warn!("Enhancement attempt {} failed: {}", attempt, e);
                    last_error = Some(e);
                    if attempt < self.retry.max_attempts {
                        std::thread::sleep(self.retry.backoff);
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            SatError::EnhancementUnavailable("request failed after all attempts".to_string())
        }))
    }

    fn post_once(&self, url: &str, file_name: &str, payload: &[u8]) -> SatResult<Vec<u8>> {
        let part = reqwest::blocking::multipart::Part::bytes(payload.to_vec())
            .file_name(file_name.to_string())
            .mime_str("application/zip")
            .map_err(|e| SatError::InvalidFormat(format!("multipart part: {}", e)))?;
        let form = reqwest::blocking::multipart::Form::new().part("data", part);

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .map_err(|e| SatError::EnhancementUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(SatError::EnhancementService {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .bytes()
            .map_err(|e| SatError::EnhancementUnavailable(e.to_string()))?;
        Ok(body.to_vec())
    }
}

/// Build the fixed query string for one enhancement request.
///
/// The service parses each value as a JSON literal: strings quoted, the
/// region of interest a bare number array, disabled fields the literal
/// `null`.
fn build_query(bbox: &BoundingBox) -> String {
    let fields: [(&str, String); 8] = [
        ("accept", "image/tiff".to_string()),
        ("satellite", "\"sentinel2\"".to_string()),
        ("roi_x_y_test", "null".to_string()),
        ("roi_lon_lat_test", bbox.to_roi_string()),
        ("max_res_test", "null".to_string()),
        ("copy_original_bands", "true".to_string()),
        ("output_path", "null".to_string()),
        ("output_file_format", "\"GTiff\"".to_string()),
    ];

    fields
        .iter()
        .map(|(key, value)| {
            format!("{}={}", key, utf8_percent_encode(value, QUERY_VALUE_SET))
        })
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_encodes_roi_brackets_and_commas() {
        let bbox = BoundingBox::new(-6.5, 36.8, -6.2, 37.0);
        let query = build_query(&bbox);
        assert!(query.contains("roi_lon_lat_test=%5B-6.5%2C36.8%2C-6.2%2C37.0%5D"));
    }

    #[test]
    fn query_never_contains_plus() {
        let bbox = BoundingBox::new(-6.5, 36.8, -6.2, 37.0);
        assert!(!build_query(&bbox).contains('+'));
    }

    #[test]
    fn query_field_order_is_fixed() {
        let bbox = BoundingBox::new(-6.5, 36.8, -6.2, 37.0);
        let query = build_query(&bbox);
        assert!(query.starts_with("accept=image/tiff&satellite=%22sentinel2%22"));
        assert!(query.ends_with("output_file_format=%22GTiff%22"));
        assert!(query.contains("copy_original_bands=true"));
        assert!(query.contains("roi_x_y_test=null&"));
        assert!(query.contains("max_res_test=null&"));
        assert!(query.contains("output_path=null&"));
    }

    #[test]
    fn non_finite_bbox_fails_before_any_io() {
        let client = EnhancementClient::new("http://127.0.0.1:9").unwrap();
        let bbox = BoundingBox::new(f64::NAN, 36.8, -6.2, 37.0);
        let err = client
            .enhance(Path::new("/nonexistent/file.zip"), &bbox)
            .unwrap_err();
        assert!(matches!(err, SatError::InvalidRegion(_)));
    }

    #[test]
    fn output_path_swaps_extension() {
        let path = Path::new("/data/Donana/S2A_MSIL1C_tile.zip");
        assert_eq!(
            path.with_extension(RASTER_EXTENSION),
            PathBuf::from("/data/Donana/S2A_MSIL1C_tile.tif")
        );
    }
}
