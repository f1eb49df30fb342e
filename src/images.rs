use axum::http::StatusCode;
use axum::async_trait;
use tracing::debug;

use crate::error::ApiError;

/// Placeholder stored when a record is created without an image URL.
pub const DEFAULT_IMG_URL: &str =
    "http://img2.wikia.nocookie.net/__cb20130511180903/legendmarielu/images/b/b4/No_image_available.jpg";

const MSG_NOT_FOUND: &str =
    "Image was not found. Enter a valid url or leave the field blank.";
const MSG_MISSING_SCHEMA: &str =
    "Image url is missing schema. A preceding \"http://\" might fix it, or leave the field blank.";
const MSG_INVALID_SCHEMA: &str =
    "Image url is an invalid schema. Enter a valid url or leave the field blank.";
const MSG_UNREACHABLE: &str =
    "We don't know what's wrong with the entered image url, but please fix it.";

/// Issues the reachability GET for a caller-supplied image URL.
#[async_trait]
pub trait ImageProbe: Send + Sync {
    async fn fetch_status(&self, url: &str) -> anyhow::Result<StatusCode>;
}

pub struct HttpImageProbe {
    http: reqwest::Client,
}

impl HttpImageProbe {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ImageProbe for HttpImageProbe {
    async fn fetch_status(&self, url: &str) -> anyhow::Result<StatusCode> {
        let response = self.http.get(url).send().await?;
        Ok(response.status())
    }
}

/// Resolve the image URL to store for a record. Empty input short-circuits to
/// the placeholder without touching the network; a 404 from the probe becomes
/// a 400, any other failure status passes through to the client as-is.
pub async fn validate_image_url(probe: &dyn ImageProbe, img_url: &str) -> Result<String, ApiError> {
    if img_url.is_empty() {
        return Ok(DEFAULT_IMG_URL.to_string());
    }

    let parsed = reqwest::Url::parse(img_url)
        .map_err(|_| ApiError::BadRequest(MSG_MISSING_SCHEMA.into()))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ApiError::BadRequest(MSG_INVALID_SCHEMA.into()));
    }

    let status = match probe.fetch_status(parsed.as_str()).await {
        Ok(status) => status,
        Err(e) => {
            debug!(error = %e, url = %img_url, "image url probe failed");
            return Err(ApiError::BadRequest(MSG_UNREACHABLE.into()));
        }
    };

    if status == StatusCode::NOT_FOUND {
        Err(ApiError::BadRequest(MSG_NOT_FOUND.into()))
    } else if status.is_success() {
        Ok(img_url.to_string())
    } else {
        Err(ApiError::UpstreamStatus(
            status,
            format!("Image url responded with status {}.", status.as_u16()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProbe(StatusCode);

    #[async_trait]
    impl ImageProbe for FixedProbe {
        async fn fetch_status(&self, _url: &str) -> anyhow::Result<StatusCode> {
            Ok(self.0)
        }
    }

    struct FailingProbe;

    #[async_trait]
    impl ImageProbe for FailingProbe {
        async fn fetch_status(&self, _url: &str) -> anyhow::Result<StatusCode> {
            anyhow::bail!("connection refused")
        }
    }

    #[tokio::test]
    async fn empty_url_returns_placeholder_without_probing() {
        let url = validate_image_url(&FailingProbe, "").await.unwrap();
        assert_eq!(url, DEFAULT_IMG_URL);
    }

    #[tokio::test]
    async fn reachable_url_passes_through_unchanged() {
        let url = validate_image_url(&FixedProbe(StatusCode::OK), "https://example.com/cat.png")
            .await
            .unwrap();
        assert_eq!(url, "https://example.com/cat.png");
    }

    #[tokio::test]
    async fn missing_schema_is_rejected_with_400() {
        let err = validate_image_url(&FixedProbe(StatusCode::OK), "example.com/cat.png")
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("missing schema"));
    }

    #[tokio::test]
    async fn non_http_schema_is_rejected_with_400() {
        let err = validate_image_url(&FixedProbe(StatusCode::OK), "ftp://example.com/cat.png")
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("invalid schema"));
    }

    #[tokio::test]
    async fn probe_404_maps_to_400_with_not_found_message() {
        let err = validate_image_url(
            &FixedProbe(StatusCode::NOT_FOUND),
            "https://example.com/gone.png",
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("Image was not found"));
    }

    #[tokio::test]
    async fn other_probe_statuses_pass_through() {
        let err = validate_image_url(
            &FixedProbe(StatusCode::SERVICE_UNAVAILABLE),
            "https://example.com/cat.png",
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn unreachable_host_maps_to_400() {
        let err = validate_image_url(&FailingProbe, "https://example.invalid/cat.png")
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
