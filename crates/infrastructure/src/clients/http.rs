use std::time::Duration;

use pitrix_core::{PitrixError, PitrixResult};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

/// 发送和接收JSON的HTTP客户端
///
/// 连接失败和5xx归为网络错误，等待方会继续轮询；4xx直接报错。
#[derive(Clone)]
pub(crate) struct JsonHttpClient {
    base_url: String,
    http_client: Client,
}

impl JsonHttpClient {
    pub fn new(base_url: &str, request_timeout: Duration) -> PitrixResult<Self> {
        let http_client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| PitrixError::config_error(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn post<B, R>(&self, path: &str, body: &B) -> PitrixResult<R>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let url = self.url(path);
        debug!("POST {}", url);
        let response = self
            .http_client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| PitrixError::network_error(format!("POST {url} failed: {e}")))?;
        Self::decode(&url, response).await
    }

    /// 只关心状态码的POST
    pub async fn post_empty<B>(&self, path: &str, body: &B) -> PitrixResult<()>
    where
        B: Serialize + ?Sized + Sync,
    {
        let url = self.url(path);
        debug!("POST {}", url);
        let response = self
            .http_client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| PitrixError::network_error(format!("POST {url} failed: {e}")))?;
        Self::check(&url, response).await.map(|_| ())
    }

    pub async fn get<R: DeserializeOwned>(&self, path: &str) -> PitrixResult<R> {
        let url = self.url(path);
        debug!("GET {}", url);
        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| PitrixError::network_error(format!("GET {url} failed: {e}")))?;
        Self::decode(&url, response).await
    }

    /// 读取响应体失败属于传输错误；只有完整收到但无法解析的响应体才是格式错误
    async fn decode<R: DeserializeOwned>(url: &str, response: Response) -> PitrixResult<R> {
        let response = Self::check(url, response).await?;
        let body = response.bytes().await.map_err(|e| {
            PitrixError::network_error(format!("Reading response from {url} failed: {e}"))
        })?;
        serde_json::from_slice(&body)
            .map_err(|e| PitrixError::Serialization(format!("Invalid response from {url}: {e}")))
    }

    async fn check(url: &str, response: Response) -> PitrixResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        warn!("HTTP {} from {}: {}", status, url, body);
        Err(classify(status, url, &body))
    }
}

fn classify(status: StatusCode, url: &str, body: &str) -> PitrixError {
    if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        PitrixError::network_error(format!("HTTP {status} from {url}: {body}"))
    } else {
        PitrixError::internal(format!("HTTP {status} from {url}: {body}"))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    /// 启动只应答一次的HTTP服务，返回其地址
    async fn serve_once(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
        });
        format!("http://{address}")
    }

    #[tokio::test]
    async fn test_truncated_body_is_retryable() {
        let url = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 200\r\n\r\n{\"status\":",
        )
        .await;
        let client = JsonHttpClient::new(&url, Duration::from_secs(5)).unwrap();

        let err = client.get::<Value>("/v1/subtasks/st-1").await.unwrap_err();
        assert!(matches!(err, PitrixError::Network(_)), "{err:?}");
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_complete_invalid_body_is_not_retryable() {
        let url = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 8\r\n\r\nnot json",
        )
        .await;
        let client = JsonHttpClient::new(&url, Duration::from_secs(5)).unwrap();

        let err = client.get::<Value>("/v1/subtasks/st-1").await.unwrap_err();
        assert!(matches!(err, PitrixError::Serialization(_)), "{err:?}");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_server_errors_are_retryable() {
        assert!(classify(StatusCode::BAD_GATEWAY, "http://x", "").is_retryable());
        assert!(classify(StatusCode::TOO_MANY_REQUESTS, "http://x", "").is_retryable());
        assert!(!classify(StatusCode::NOT_FOUND, "http://x", "").is_retryable());
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = JsonHttpClient::new("http://pilot:9110/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.url("/v1/subtasks"), "http://pilot:9110/v1/subtasks");
    }
}
