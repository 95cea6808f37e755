#[derive(serde::Deserialize)]
pub struct Data<T> {
    pub data: Vec<T>,
}

#[derive(Default, serde::Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub cursor: Option<String>,
}

/// One live broadcast as reported by the catalog.
///
/// `id` is the session identifier: unique per continuous broadcast, replaced
/// when the same broadcaster goes live again later. Optional fields the
/// upstream sometimes omits or nulls (tags, language, title) decode as empty.
#[derive(Clone, Debug, serde::Deserialize)]
pub struct Stream {
    pub id: String,
    pub user_id: String,
    pub user_name: String,

    pub game_id: String,
    #[serde(default, deserialize_with = "crate::serde::null_default")]
    pub game_name: String,

    #[serde(default, deserialize_with = "crate::serde::null_default")]
    pub title: String,
    pub viewer_count: u64,

    #[serde(default, deserialize_with = "crate::serde::null_default")]
    pub language: String,
    #[serde(default, deserialize_with = "crate::serde::null_default")]
    pub tags: Vec<String>,

    #[serde(deserialize_with = "crate::serde::utc_date_time")]
    pub started_at: time::OffsetDateTime,
}

impl Stream {
    /// Dedup key for one broadcast session.
    pub fn session_key(&self) -> String {
        format!("{}_{}", self.user_id, self.id)
    }

    pub fn url(&self) -> String {
        format!("https://www.twitch.tv/{}", self.user_name)
    }
}

#[derive(Clone, Debug, serde::Deserialize)]
pub struct Game {
    pub id: String,
    pub name: String,
}
