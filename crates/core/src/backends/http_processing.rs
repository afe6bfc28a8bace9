//! Processing endpoint client over HTTP.

use crate::error::ProcessingError;
use crate::ports::ProcessingClient;
use api_shared::{ProcessReq, ProcessRes, API_KEY_HEADER};
use async_trait::async_trait;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct HttpProcessingClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpProcessingClient {
    /// Creates a client posting to `endpoint`, sending `api_key` in `x-api-key` when set.
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Result<Self, ProcessingError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ProcessingError::Http(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ProcessingClient for HttpProcessingClient {
    async fn process(&self, req: &ProcessReq) -> Result<ProcessRes, ProcessingError> {
        let mut request = self.client.post(&self.endpoint).json(req);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProcessingError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProcessingError::Status(status.as_u16()));
        }

        let body: ProcessRes = response
            .json()
            .await
            .map_err(|e| ProcessingError::Decode(e.to_string()))?;

        if !body.success {
            return Err(ProcessingError::Rejected(body.message));
        }

        tracing::debug!(file = %req.file_name, "processing accepted");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};

    async fn spawn(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/process", addr)
    }

    fn req() -> ProcessReq {
        ProcessReq {
            user_id: "u-jane".into(),
            file_name: "1686000000000-report.pdf".into(),
        }
    }

    #[tokio::test]
    async fn test_success_response() {
        let app = Router::new().route(
            "/process",
            post(|Json(body): Json<ProcessReq>| async move {
                assert_eq!(body.user_id, "u-jane");
                Json(ProcessRes::ok("indexed"))
            }),
        );
        let client = HttpProcessingClient::new(spawn(app).await, None).unwrap();

        let res = client.process(&req()).await.unwrap();
        assert!(res.success);
    }

    #[tokio::test]
    async fn test_unsuccessful_body_is_rejected() {
        let app = Router::new().route(
            "/process",
            post(|| async { Json(ProcessRes::failed("unreadable scan")) }),
        );
        let client = HttpProcessingClient::new(spawn(app).await, None).unwrap();

        let err = client.process(&req()).await.unwrap_err();
        assert!(matches!(err, ProcessingError::Rejected(Some(ref m)) if m == "unreadable scan"));
    }

    #[tokio::test]
    async fn test_error_status() {
        let app = Router::new().route(
            "/process",
            post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        );
        let client = HttpProcessingClient::new(spawn(app).await, None).unwrap();

        assert!(matches!(
            client.process(&req()).await,
            Err(ProcessingError::Status(500))
        ));
    }

    #[tokio::test]
    async fn test_api_key_header_sent() {
        let app = Router::new().route(
            "/process",
            post(|headers: HeaderMap| async move {
                match headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
                    Some("k-123") => Ok(Json(ProcessRes::ok("indexed"))),
                    _ => Err(StatusCode::UNAUTHORIZED),
                }
            }),
        );
        let url = spawn(app).await;

        let with_key = HttpProcessingClient::new(url.clone(), Some("k-123".into())).unwrap();
        assert!(with_key.process(&req()).await.is_ok());

        let without_key = HttpProcessingClient::new(url, None).unwrap();
        assert!(matches!(
            without_key.process(&req()).await,
            Err(ProcessingError::Status(401))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = HttpProcessingClient::new(format!("http://{}/process", addr), None).unwrap();
        assert!(matches!(
            client.process(&req()).await,
            Err(ProcessingError::Http(_))
        ));
    }
}
