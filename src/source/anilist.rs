use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::app::{AnifeedError, Result};
use crate::domain::{Activity, ActivityKind};
use crate::source::ActivitySource;

const API_URL: &str = "https://graphql.anilist.co";

const USER_QUERY: &str = r#"
query ($name: String) {
  User(name: $name) {
    id
  }
}
"#;

const LIST_ACTIVITIES_QUERY: &str = r#"
query ($userId: Int, $perPage: Int, $type: ActivityType) {
  Page(page: 1, perPage: $perPage) {
    activities(userId: $userId, type: $type, sort: ID_DESC) {
      ... on ListActivity {
        id
        status
        progress
        createdAt
        media {
          id
          siteUrl
          title {
            romaji
            english
          }
        }
      }
    }
  }
}
"#;

const TEXT_ACTIVITIES_QUERY: &str = r#"
query ($userId: Int, $perPage: Int) {
  Page(page: 1, perPage: $perPage) {
    activities(userId: $userId, type: TEXT, sort: ID_DESC) {
      ... on TextActivity {
        id
        text
        createdAt
      }
    }
  }
}
"#;

const MESSAGE_ACTIVITIES_QUERY: &str = r#"
query ($userId: Int, $perPage: Int) {
  Page(page: 1, perPage: $perPage) {
    activities(messengerId: $userId, type: MESSAGE, sort: ID_DESC) {
      ... on MessageActivity {
        id
        message
        createdAt
      }
    }
  }
}
"#;

/// AniList GraphQL implementation of [`ActivitySource`].
///
/// User ids are resolved from names once and cached for the lifetime of the
/// source; AniList ids are stable.
pub struct AniListSource {
    client: Client,
    user_ids: Mutex<HashMap<String, i64>>,
}

impl AniListSource {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("anifeed/0.1.0")
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            user_ids: Mutex::new(HashMap::new()),
        }
    }

    async fn post<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<GqlEnvelope<T>> {
        let response = self
            .client
            .post(API_URL)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        // AniList reports not-found lookups with a 404 and a GraphQL error
        // body, so the body is inspected before the status code.
        let envelope: GqlEnvelope<T> = response.json().await?;
        Ok(envelope)
    }

    async fn resolve_user_id(&self, identity: &str) -> Result<Option<i64>> {
        // A poisoned cache lock only costs a refetch, never an error.
        if let Ok(cache) = self.user_ids.lock() {
            if let Some(id) = cache.get(identity) {
                return Ok(Some(*id));
            }
        }

        let envelope: GqlEnvelope<UserData> =
            self.post(USER_QUERY, json!({ "name": identity })).await?;

        let id = envelope.data.and_then(|d| d.user).map(|u| u.id);
        if let Some(id) = id {
            if let Ok(mut cache) = self.user_ids.lock() {
                cache.insert(identity.to_string(), id);
            }
        }

        Ok(id)
    }

    async fn fetch_page(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<Vec<RawActivity>> {
        let envelope: GqlEnvelope<ActivityData> = self.post(query, variables).await?;

        if let Some(errors) = envelope.errors {
            let message = errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(AnifeedError::Api(message));
        }

        Ok(envelope
            .data
            .map(|d| d.page.activities)
            .unwrap_or_default())
    }
}

impl Default for AniListSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActivitySource for AniListSource {
    async fn fetch_activity(
        &self,
        identity: &str,
        kind: ActivityKind,
        limit: usize,
    ) -> Result<Vec<Activity>> {
        let user_id = self
            .resolve_user_id(identity)
            .await?
            .ok_or_else(|| AnifeedError::UnknownIdentity(identity.to_string()))?;

        let raw = match kind {
            ActivityKind::Anime | ActivityKind::Manga => {
                let activity_type = if kind == ActivityKind::Anime {
                    "ANIME_LIST"
                } else {
                    "MANGA_LIST"
                };
                self.fetch_page(
                    LIST_ACTIVITIES_QUERY,
                    json!({ "userId": user_id, "perPage": limit, "type": activity_type }),
                )
                .await?
            }
            ActivityKind::Text => {
                // Text feeds carry both the user's own posts and messages
                // left on their profile, merged newest-first.
                let mut merged = self
                    .fetch_page(
                        TEXT_ACTIVITIES_QUERY,
                        json!({ "userId": user_id, "perPage": limit }),
                    )
                    .await?;
                let messages = self
                    .fetch_page(
                        MESSAGE_ACTIVITIES_QUERY,
                        json!({ "userId": user_id, "perPage": limit }),
                    )
                    .await?;
                merged.extend(messages);
                merged.sort_by(|a, b| {
                    b.created_at
                        .cmp(&a.created_at)
                        .then(b.id.cmp(&a.id))
                });
                merged
            }
        };

        Ok(raw
            .into_iter()
            .filter_map(|r| r.into_activity(identity, kind))
            .collect())
    }

    async fn verify_identity(&self, identity: &str) -> Result<bool> {
        Ok(self.resolve_user_id(identity).await?.is_some())
    }
}

#[derive(Debug, Deserialize)]
struct GqlEnvelope<T> {
    data: Option<T>,
    errors: Option<Vec<GqlError>>,
}

#[derive(Debug, Deserialize)]
struct GqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct UserData {
    #[serde(rename = "User")]
    user: Option<RawUser>,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct ActivityData {
    #[serde(rename = "Page")]
    page: RawPage,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawPage {
    activities: Vec<RawActivity>,
}

/// One entry of the activities union. Fragments that don't match the
/// requested type come back as empty objects, hence every field is optional.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawActivity {
    id: Option<i64>,
    status: Option<String>,
    progress: Option<String>,
    text: Option<String>,
    message: Option<String>,
    #[serde(rename = "createdAt")]
    created_at: Option<i64>,
    media: Option<RawMedia>,
}

#[derive(Debug, Deserialize)]
struct RawMedia {
    id: i64,
    #[serde(rename = "siteUrl")]
    site_url: Option<String>,
    title: Option<RawTitle>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawTitle {
    romaji: Option<String>,
    english: Option<String>,
}

impl RawActivity {
    fn into_activity(self, identity: &str, kind: ActivityKind) -> Option<Activity> {
        let id = self.id?;
        let created_at = self
            .created_at
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let (media_id, media_title, media_url) = match self.media {
            Some(media) => {
                let title = media
                    .title
                    .and_then(|t| t.romaji.or(t.english));
                (Some(media.id), title, media.site_url)
            }
            None => (None, None, None),
        };

        Some(Activity {
            id,
            media_id,
            identity: identity.to_string(),
            kind,
            created_at,
            status: self.status,
            progress: self.progress,
            media_title,
            media_url,
            text: self.text.or(self.message),
        })
    }
}
