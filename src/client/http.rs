use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{ApiClient, ClientError, ClientResult};
use crate::db::{
    LogFilter, MenuItem, MenuItemPatch, NewMenuItem, NewRecommendationLog, Page, RecommendationLog,
};
use crate::recommend::{RecommendRequest, RecommendResponse, Stats};

pub struct HttpClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> ClientResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Error bodies look like `{"error": "..."}`; fall back to the raw text.
async fn error_message(response: Response) -> String {
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or(text)
}

async fn decode<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let message = error_message(response).await;
    match status {
        StatusCode::NOT_FOUND => Err(ClientError::NotFound(message)),
        StatusCode::UNPROCESSABLE_ENTITY => Err(ClientError::Validation(message)),
        _ => Err(ClientError::Status {
            status: status.as_u16(),
            message,
        }),
    }
}

#[async_trait]
impl ApiClient for HttpClient {
    async fn list_menu_items(&self, page: Page) -> ClientResult<Vec<MenuItem>> {
        let response = self.client.get(self.url("/menu-items")).query(&page).send().await?;
        decode(response).await
    }

    async fn get_menu_item(&self, id: &str) -> ClientResult<MenuItem> {
        let response = self.client.get(self.url(&format!("/menu-items/{}", id))).send().await?;
        decode(response).await
    }

    async fn create_menu_item(&self, item: &NewMenuItem) -> ClientResult<MenuItem> {
        let response = self.client.post(self.url("/menu-items")).json(item).send().await?;
        decode(response).await
    }

    async fn update_menu_item(&self, id: &str, patch: &MenuItemPatch) -> ClientResult<MenuItem> {
        let response = self
            .client
            .put(self.url(&format!("/menu-items/{}", id)))
            .json(patch)
            .send()
            .await?;
        decode(response).await
    }

    async fn delete_menu_item(&self, id: &str) -> ClientResult<()> {
        let response = self
            .client
            .delete(self.url(&format!("/menu-items/{}", id)))
            .send()
            .await?;
        let _: serde_json::Value = decode(response).await?;
        Ok(())
    }

    async fn recommend(&self, request: &RecommendRequest) -> ClientResult<RecommendResponse> {
        debug!(cart = request.cart_items.len(), "Requesting recommendations");
        let response = self.client.post(self.url("/recommend")).json(request).send().await?;
        decode(response).await
    }

    async fn list_logs(&self, filter: &LogFilter, page: Page) -> ClientResult<Vec<RecommendationLog>> {
        let response = self
            .client
            .get(self.url("/logs"))
            .query(filter)
            .query(&page)
            .send()
            .await?;
        decode(response).await
    }

    async fn create_log(&self, log: &NewRecommendationLog) -> ClientResult<RecommendationLog> {
        let response = self.client.post(self.url("/logs")).json(log).send().await?;
        decode(response).await
    }

    async fn stats(&self, filter: &LogFilter) -> ClientResult<Stats> {
        let response = self.client.get(self.url("/stats")).query(filter).send().await?;
        decode(response).await
    }
}
