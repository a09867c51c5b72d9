use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::app::Result;
use crate::domain::{Activity, StatusCategory};
use crate::notifier::{Delivery, Notifier};

const COLOR_MAIN: u32 = 0xF5F5F5;
const COLOR_DONE: u32 = 0x00FFFF;
const COLOR_WARN: u32 = 0xFFFF00;
const COLOR_ERR: u32 = 0xFF0000;

/// Discord-compatible webhook implementation of [`Notifier`].
///
/// Destinations are webhook URLs. Rendering is intentionally minimal; this
/// layer only exists so the daemon has somewhere real to deliver to. It
/// never produces [`Delivery::Replace`]; that outcome belongs to richer
/// chat integrations that track their own sent messages.
pub struct WebhookNotifier {
    client: Client,
}

impl WebhookNotifier {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("anifeed/0.1.0")
            .build()
            .expect("Failed to build HTTP client");

        Self { client }
    }

    fn render(item: &Activity) -> serde_json::Value {
        if let Some(text) = &item.text {
            let mut body: String = text.chars().take(1024).collect();
            if body.len() < text.len() {
                body.push_str("...");
            }
            return json!({
                "title": format!("{} posted", item.identity),
                "description": body,
                "color": COLOR_MAIN,
            });
        }

        let color = match item.status_category() {
            Some(StatusCategory::InProgress) => COLOR_DONE,
            Some(StatusCategory::Completed) => COLOR_DONE,
            Some(StatusCategory::Paused) => COLOR_WARN,
            Some(StatusCategory::Dropped) => COLOR_ERR,
            _ => COLOR_MAIN,
        };

        let status = item.status.as_deref().unwrap_or("updated");
        let line = match item.progress.as_deref() {
            Some(progress) => format!("{} {}", status, progress),
            None => status.to_string(),
        };

        json!({
            "title": item.display_title(),
            "url": item.media_url,
            "description": format!("{}: {}", item.identity, line),
            "color": color,
        })
    }
}

impl Default for WebhookNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, item: &Activity, destination: &str) -> Result<Delivery> {
        let payload = json!({ "embeds": [Self::render(item)] });

        let response = self.client.post(destination).json(&payload).send().await?;
        response.error_for_status()?;

        Ok(Delivery::Sent)
    }

    async fn destination_ok(&self, destination: &str) -> bool {
        match self.client.get(destination).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("destination check failed for {}: {}", destination, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ActivityKind;
    use chrono::Utc;

    fn list_item() -> Activity {
        Activity {
            id: 1,
            media_id: Some(100),
            identity: "alice".into(),
            kind: ActivityKind::Anime,
            created_at: Utc::now(),
            status: Some("watched episode".into()),
            progress: Some("5".into()),
            media_title: Some("Example".into()),
            media_url: Some("https://anilist.co/anime/100".into()),
            text: None,
        }
    }

    #[test]
    fn test_render_list_activity() {
        let embed = WebhookNotifier::render(&list_item());
        assert_eq!(embed["title"], "Example");
        assert_eq!(embed["description"], "alice: watched episode 5");
        assert_eq!(embed["color"], COLOR_DONE);
    }

    #[test]
    fn test_render_text_post_truncates() {
        let mut item = list_item();
        item.media_id = None;
        item.kind = ActivityKind::Text;
        item.text = Some("x".repeat(2000));

        let embed = WebhookNotifier::render(&item);
        let description = embed["description"].as_str().unwrap();
        assert_eq!(description.len(), 1024 + 3);
        assert!(description.ends_with("..."));
    }
}
