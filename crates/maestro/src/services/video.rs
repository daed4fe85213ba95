use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[cfg(test)]
use mockall::automock;

pub const YOUTUBE_HOST: &str = "https://www.googleapis.com";
pub const DEFAULT_MAX_RESULTS: u32 = 5;
pub const MAX_RESULTS_LIMIT: u32 = 25;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSummary {
    pub video_id: String,
    pub title: String,
    pub channel: String,
    pub description: String,
    pub published_at: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetails {
    pub video_id: String,
    pub title: String,
    pub channel: String,
    pub description: String,
    /// ISO 8601 duration as reported by the api, e.g. `PT3M20S`
    pub duration: Option<String>,
    pub view_count: Option<u64>,
    pub like_count: Option<u64>,
    pub tags: Vec<String>,
    pub url: String,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait VideoService: Send + Sync {
    async fn search(&self, query: &str, max_results: u32, api_key: &str) -> Result<Vec<VideoSummary>>;

    async fn analyze(&self, video_id: &str, api_key: &str) -> Result<VideoDetails>;
}

/// YouTube Data API v3
pub struct YouTubeClient {
    client: Client,
    host: String,
}

impl YouTubeClient {
    pub fn new(host: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Self {
            client,
            host: host.into(),
        })
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = format!("{}/youtube/v3/{}", self.host.trim_end_matches('/'), path);
        let response = self.client.get(&url).query(query).send().await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            status => {
                let body: Value = response.json().await.unwrap_or_default();
                let message = body["error"]["message"].as_str().unwrap_or("no details");
                Err(anyhow!("YouTube request failed ({}): {}", status, message))
            }
        }
    }
}

impl Default for YouTubeClient {
    fn default() -> Self {
        Self {
            client: Client::new(),
            host: YOUTUBE_HOST.to_string(),
        }
    }
}

fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

fn text(value: &Value) -> String {
    value.as_str().unwrap_or_default().to_string()
}

fn count(value: &Value) -> Option<u64> {
    value.as_str().and_then(|v| v.parse().ok()).or_else(|| value.as_u64())
}

#[async_trait]
impl VideoService for YouTubeClient {
    async fn search(&self, query: &str, max_results: u32, api_key: &str) -> Result<Vec<VideoSummary>> {
        let max_results = max_results.clamp(1, MAX_RESULTS_LIMIT);
        let body = self
            .get(
                "search",
                &[
                    ("part", "snippet".to_string()),
                    ("type", "video".to_string()),
                    ("q", query.to_string()),
                    ("maxResults", max_results.to_string()),
                    ("key", api_key.to_string()),
                ],
            )
            .await?;

        let items = body["items"].as_array().cloned().unwrap_or_default();
        Ok(items
            .iter()
            .filter_map(|item| {
                let video_id = item["id"]["videoId"].as_str()?;
                let snippet = &item["snippet"];
                Some(VideoSummary {
                    video_id: video_id.to_string(),
                    title: text(&snippet["title"]),
                    channel: text(&snippet["channelTitle"]),
                    description: text(&snippet["description"]),
                    published_at: snippet["publishedAt"].as_str().map(String::from),
                    url: watch_url(video_id),
                })
            })
            .collect())
    }

    async fn analyze(&self, video_id: &str, api_key: &str) -> Result<VideoDetails> {
        let body = self
            .get(
                "videos",
                &[
                    ("part", "snippet,contentDetails,statistics".to_string()),
                    ("id", video_id.to_string()),
                    ("key", api_key.to_string()),
                ],
            )
            .await?;

        let item = body["items"]
            .get(0)
            .ok_or_else(|| anyhow!("No video with id {}", video_id))?;
        let snippet = &item["snippet"];
        let statistics = &item["statistics"];

        Ok(VideoDetails {
            video_id: video_id.to_string(),
            title: text(&snippet["title"]),
            channel: text(&snippet["channelTitle"]),
            description: text(&snippet["description"]),
            duration: item["contentDetails"]["duration"].as_str().map(String::from),
            view_count: count(&statistics["viewCount"]),
            like_count: count(&statistics["likeCount"]),
            tags: snippet["tags"]
                .as_array()
                .map(|tags| tags.iter().filter_map(|t| t.as_str().map(String::from)).collect())
                .unwrap_or_default(),
            url: watch_url(video_id),
        })
    }
}
