//! API client for communicating with the Sensor Hub

use anyhow::{Context, Result};
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// Timeout for plain request/response calls; streams run unbounded
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// API client for the Sensor Hub
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).context("Invalid path")
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(self.url(path)?)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .context("Failed to send request")?;

        let response = check_status(response).await?;
        response.json().await.context("Failed to parse response")
    }

    /// Make a GET request and parse the body whatever the status
    ///
    /// Probe endpoints answer 503 with a meaningful body.
    pub async fn get_with_status<T: DeserializeOwned>(&self, path: &str) -> Result<(StatusCode, T)> {
        let response = self
            .client
            .get(self.url(path)?)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        let body = response.json().await.context("Failed to parse response")?;
        Ok((status, body))
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let response = self
            .client
            .post(self.url(path)?)
            .timeout(REQUEST_TIMEOUT)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        let response = check_status(response).await?;
        response.json().await.context("Failed to parse response")
    }

    /// Open a streaming GET request, for downloads and live events
    pub async fn open_stream(&self, path: &str) -> Result<Response> {
        let response = self
            .client
            .get(self.url(path)?)
            .send()
            .await
            .context("Failed to send request")?;

        check_status(response).await
    }
}

async fn check_status(response: Response) -> Result<Response> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<MessageResponse>(&body)
            .map(|m| m.message)
            .unwrap_or(body);
        anyhow::bail!("API error ({}): {}", status, message);
    }
    Ok(response)
}

// API request and response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorReading {
    pub temperature: f64,
    pub humidity: f64,
    pub soil_moisture: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub timestamp: String,
    pub temperature: f64,
    pub humidity: f64,
    pub soil_moisture: f64,
    pub is_abnormal: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbnormalHistoryEntry {
    pub timestamp: String,
    #[serde(rename = "type")]
    pub abnormal_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbnormalCount {
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationData {
    pub temperature: f64,
    pub humidity: f64,
    pub soil_moisture: f64,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub message: String,
    pub data: NotificationData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub consecutive_failures: u32,
    pub last_check_timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: HashMap<String, ComponentHealth>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[tokio::test]
    async fn test_get_parses_history() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/history")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!([{
                    "id": 2,
                    "timestamp": "2024-01-15 12:00:00",
                    "temperature": 55.0,
                    "humidity": 50.0,
                    "soil_moisture": 40.0,
                    "is_abnormal": true
                }])
                .to_string(),
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let history: Vec<HistoryEntry> = client.get("history").await.unwrap();

        mock.assert_async().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, 2);
        assert!(history[0].is_abnormal);
    }

    #[tokio::test]
    async fn test_post_sends_json_body() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/sensor-data")
            .match_body(Matcher::Json(json!({
                "temperature": 25.0,
                "humidity": 50.0,
                "soil_moisture": 40.0
            })))
            .with_status(200)
            .with_body(r#"{"message":"Data received successfully"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let reading = SensorReading {
            temperature: 25.0,
            humidity: 50.0,
            soil_moisture: 40.0,
        };
        let response: MessageResponse = client.post("sensor-data", &reading).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.message, "Data received successfully");
    }

    #[tokio::test]
    async fn test_error_status_surfaces_server_message() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/sensor-data")
            .with_status(400)
            .with_body(r#"{"message":"Invalid data"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let result: Result<MessageResponse> = client.post("sensor-data", &json!({})).await;

        let error = result.unwrap_err().to_string();
        assert!(error.contains("400"));
        assert!(error.contains("Invalid data"));
    }

    #[tokio::test]
    async fn test_get_with_status_accepts_unavailable() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/readyz")
            .with_status(503)
            .with_body(r#"{"ready":false,"reason":"Hub not yet initialized"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let (status, readiness): (StatusCode, ReadinessResponse) =
            client.get_with_status("readyz").await.unwrap();

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(!readiness.ready);
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        assert!(ApiClient::new("not a url").is_err());
    }
}
