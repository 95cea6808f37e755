use std::collections::HashSet;
use std::time::Duration;

use crate::{data, HelixError};

const BASE_URL: &str = "https://api.twitch.tv/helix";
const PAGE_SIZE: &str = "100";

/// Thin wrapper over the Helix REST endpoints the lookout needs.
///
/// Holds no credential; the caller passes a bearer token per request so the
/// token can rotate underneath it.
#[derive(Clone)]
pub struct HelixClient {
    agent: reqwest::Client,
    client_id: String,
}

impl HelixClient {
    pub fn new(agent: reqwest::Client, client_id: &str) -> Self {
        Self {
            agent,
            client_id: client_id.to_string(),
        }
    }

    /// Every live stream for one game, or the whole unscoped live listing
    /// when `game_id` is `None`.
    ///
    /// Follows continuation cursors until the upstream stops returning one;
    /// an exhausted cursor is the only termination condition. Records that
    /// fail to decode are skipped, and pages occasionally repeat records, so
    /// results are de-duplicated by session key.
    pub async fn streams_for_game(
        &self,
        token: &str,
        game_id: Option<&str>,
    ) -> Result<Vec<data::Stream>, HelixError> {
        #[derive(serde::Deserialize)]
        struct Page {
            data: Vec<serde_json::Value>,
            #[serde(default)]
            pagination: data::Pagination,
        }

        let mut streams = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut query: Vec<(&str, &str)> = vec![("first", PAGE_SIZE)];
            if let Some(id) = game_id {
                query.push(("game_id", id));
            }
            if let Some(after) = &cursor {
                query.push(("after", after));
            }

            let page: Page = self.get("streams", &query, token).await?;
            log::trace!(
                "streams page: {} record(s), game={}",
                page.data.len(),
                game_id.unwrap_or("<any>")
            );

            for stream in decode_records(page.data) {
                if seen.insert(stream.session_key()) {
                    streams.push(stream);
                }
            }

            cursor = page.pagination.cursor.filter(|c| !c.is_empty());
            if cursor.is_none() {
                break;
            }
        }

        Ok(streams)
    }

    pub async fn games_by_id(
        &self,
        token: &str,
        ids: &[String],
    ) -> Result<Vec<data::Game>, HelixError> {
        let query: Vec<_> = ids.iter().map(|id| ("id", id.as_str())).collect();
        self.get::<data::Data<data::Game>>("games", &query, token)
            .await
            .map(|d| d.data)
    }

    pub async fn follower_count(&self, token: &str, user_id: &str) -> Result<u64, HelixError> {
        #[derive(serde::Deserialize)]
        struct Response {
            total: u64,
        }

        // only the total is wanted, so ask for a single record
        let query = [("broadcaster_id", user_id), ("first", "1")];
        self.get::<Response>("channels/followers", &query, token)
            .await
            .map(|r| r.total)
    }

    async fn get<T>(&self, ep: &str, query: &[(&str, &str)], token: &str) -> Result<T, HelixError>
    where
        for<'de> T: serde::Deserialize<'de>,
    {
        let url = format!("{BASE_URL}/{ep}");

        let response = self
            .agent
            .get(&url)
            .query(query)
            .header("client-id", &self.client_id)
            .header("authorization", format!("Bearer {token}"))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(HelixError::Auth(format!("{ep} rejected the token")));
        }

        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs);
            let message = response.text().await.unwrap_or_default();
            return Err(HelixError::Upstream {
                status: status.as_u16(),
                message,
                retry_after,
            });
        }

        response.json().await.map_err(Into::into)
    }
}

/// Decodes raw catalog records, dropping the ones that don't parse.
///
/// One malformed record must not abort its page.
fn decode_records(records: Vec<serde_json::Value>) -> Vec<data::Stream> {
    records
        .into_iter()
        .filter_map(|record| match serde_json::from_value(record) {
            Ok(stream) => Some(stream),
            Err(err) => {
                log::warn!("skipping malformed stream record: {err}");
                None
            }
        })
        .collect()
}
