//! Notification list, comment fetch, and mark-read over REST

use super::{check_response, parse_next_link, GithubClient, RemoteComment, RemoteNotification, API_BASE};
use crate::Result;
use serde_json::Value;

impl GithubClient {
    /// Fetch all notification pages.
    ///
    /// `since` is passed only on the first request; pagination URLs from
    /// the Link header already carry their own query parameters.
    pub async fn list_notifications(&self, since: Option<&str>) -> Result<Vec<RemoteNotification>> {
        let mut notifications = Vec::new();
        let mut next_url = Some(format!("{API_BASE}/notifications"));
        let mut is_first = true;

        while let Some(url) = next_url.take() {
            let mut request = self.get(&url);
            if is_first {
                if let Some(since) = since {
                    request = request.query(&[("since", since)]);
                }
                is_first = false;
            }
            let response = check_response(request.send().await?).await?;
            let link = response
                .headers()
                .get("Link")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();

            let page: Vec<Value> = response.json().await?;
            for value in page {
                notifications.push(RemoteNotification::from_value(value)?);
            }
            next_url = parse_next_link(&link);
        }

        tracing::debug!(count = notifications.len(), "Fetched notifications");
        Ok(notifications)
    }

    /// Fetch all comment pages from an issue/PR comments URL
    pub async fn list_comments(&self, comments_url: &str) -> Result<Vec<RemoteComment>> {
        let mut comments = Vec::new();
        let mut next_url = Some(comments_url.to_string());

        while let Some(url) = next_url.take() {
            let response = check_response(self.get(&url).send().await?).await?;
            let link = response
                .headers()
                .get("Link")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();

            let page: Vec<Value> = response.json().await?;
            comments.extend(page.iter().map(parse_comment));
            next_url = parse_next_link(&link);
        }
        Ok(comments)
    }

    /// Mark a notification thread as read upstream
    pub async fn patch_thread_read(&self, thread_id: &str) -> Result<()> {
        let url = format!("{API_BASE}/notifications/threads/{thread_id}");
        check_response(self.patch(&url).send().await?).await?;
        Ok(())
    }
}

/// Map one REST comment object; a deleted account has a null `user`
fn parse_comment(value: &Value) -> RemoteComment {
    let str_or = |path: &[&str], default: &str| -> String {
        let mut v = value;
        for key in path {
            match v.get(key) {
                Some(next) => v = next,
                None => return default.to_string(),
            }
        }
        v.as_str().unwrap_or(default).to_string()
    };
    RemoteComment {
        id: value
            .get("id")
            .map(|id| match id {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default(),
        author: str_or(&["user", "login"], "[deleted]"),
        body: str_or(&["body"], ""),
        created_at: str_or(&["created_at"], ""),
        updated_at: str_or(&["updated_at"], ""),
    }
}
