use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use crate::tools::{Tool, ToolError};

const SEARCH_ENDPOINT: &str = "https://www.googleapis.com/youtube/v3/search";

/// "Autos & Vehicles" on YouTube.
const VEHICLE_CATEGORY_ID: &str = "28";
const MAX_RESULTS: u8 = 5;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReviewVideo {
    pub id: String,
    pub title: String,
    pub description: String,
    pub thumbnail: String,
    /// Embeddable player URL for the frontend.
    pub url: String,
}

/// Outcome of a review-video lookup. This is deliberately not a `Result`:
/// video search is a garnish on the conversation, so failures ride along as
/// a message instead of failing the request.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoSearchResult {
    pub videos: Vec<ReviewVideo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VideoSearchResult {
    fn failed(message: impl Into<String>) -> Self {
        Self { videos: Vec::new(), error: Some(message.into()) }
    }
}

/// YouTube Data API search scoped to car review videos.
pub struct ReviewVideoSearch {
    http: reqwest::Client,
    api_key: Option<SecretString>,
}

impl ReviewVideoSearch {
    pub fn new(api_key: Option<SecretString>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, api_key })
    }

    pub fn query_for(make: &str, model: &str, year: Option<i64>) -> String {
        match year {
            Some(year) => format!("{make} {model} {year} review"),
            None => format!("{make} {model} review"),
        }
    }

    pub async fn search(&self, make: &str, model: &str, year: Option<i64>) -> VideoSearchResult {
        let Some(api_key) = self.api_key.as_ref() else {
            return VideoSearchResult::failed("video search is not configured");
        };

        let query = Self::query_for(make, model, year);
        let response = self
            .http
            .get(SEARCH_ENDPOINT)
            .query(&[
                ("part", "id,snippet"),
                ("q", query.as_str()),
                ("type", "video"),
                ("videoCategoryId", VEHICLE_CATEGORY_ID),
                ("maxResults", &MAX_RESULTS.to_string()),
                ("relevanceLanguage", "en"),
                ("key", api_key.expose_secret()),
            ])
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(error) => {
                warn!(event_name = "video_search_transport_failed", error = %error);
                return VideoSearchResult::failed("video search is currently unavailable");
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(event_name = "video_search_rejected", status = status.as_u16());
            return VideoSearchResult::failed(format!(
                "video search returned status {}",
                status.as_u16()
            ));
        }

        match response.json::<SearchResponse>().await {
            Ok(body) => VideoSearchResult {
                videos: body.items.into_iter().filter_map(SearchItem::into_video).collect(),
                error: None,
            },
            Err(error) => {
                warn!(event_name = "video_search_parse_failed", error = %error);
                VideoSearchResult::failed("video search returned an unreadable response")
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
struct SearchItemId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    medium: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

impl SearchItem {
    fn into_video(self) -> Option<ReviewVideo> {
        let id = self.id.video_id?;
        let thumbnail = self
            .snippet
            .thumbnails
            .medium
            .or(self.snippet.thumbnails.default)
            .map(|thumb| thumb.url)
            .unwrap_or_default();

        Some(ReviewVideo {
            url: format!("https://www.youtube.com/embed/{id}"),
            id,
            title: self.snippet.title,
            description: self.snippet.description,
            thumbnail,
        })
    }
}

/// Tool wrapper so the model can pull review videos mid-conversation.
pub struct FindCarReviewVideosTool {
    search: Arc<ReviewVideoSearch>,
}

impl FindCarReviewVideosTool {
    pub const NAME: &'static str = "find_car_review_videos";

    pub fn new(search: Arc<ReviewVideoSearch>) -> Self {
        Self { search }
    }
}

#[derive(Debug, Deserialize)]
struct VideoToolArgs {
    car_make: String,
    car_model: String,
    #[serde(default)]
    year: Option<i64>,
}

#[async_trait]
impl Tool for FindCarReviewVideosTool {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn definition(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": Self::NAME,
                "description": "Find YouTube review videos for a specific vehicle so the customer can watch expert opinions.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "car_make": { "type": "string", "description": "Vehicle make, e.g. Nissan." },
                        "car_model": { "type": "string", "description": "Vehicle model, e.g. Altima." },
                        "year": { "type": "integer", "description": "Model year, if the customer mentioned one." }
                    },
                    "required": ["car_make", "car_model"]
                }
            }
        })
    }

    async fn execute(&self, arguments: &str) -> Result<Value, ToolError> {
        let args: VideoToolArgs =
            serde_json::from_str(arguments).map_err(|error| ToolError::InvalidArguments {
                tool: Self::NAME.to_string(),
                message: error.to_string(),
            })?;

        let result = self.search.search(&args.car_make, &args.car_model, args.year).await;
        serde_json::to_value(&result).map_err(|error| ToolError::Execution {
            tool: Self::NAME.to_string(),
            message: error.to_string(),
        })
    }
}
