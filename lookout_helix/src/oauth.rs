use lookout_config::Secret;
use time::{Duration, OffsetDateTime};

use crate::HelixError;

const TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";

// refresh early enough that a token we hand out survives one request round-trip
const REFRESH_MARGIN: Duration = Duration::seconds(60);

/// App-access-token holder for the client-credentials flow.
///
/// Owns the current token and its expiry. Callers always go through
/// [`AppAuth::bearer_token`], which refreshes when the remaining lifetime
/// drops under the margin; a cache hit does no I/O.
pub struct AppAuth {
    agent: reqwest::Client,
    client_id: String,
    client_secret: Secret<String>,
    token: Option<AppToken>,
}

#[derive(Clone)]
struct AppToken {
    bearer: String,
    expires_at: OffsetDateTime,
}

impl AppToken {
    fn is_stale(&self, now: OffsetDateTime) -> bool {
        self.expires_at - now < REFRESH_MARGIN
    }
}

impl AppAuth {
    /// Performs the initial token exchange.
    pub async fn create(
        agent: reqwest::Client,
        client_id: &str,
        client_secret: Secret<String>,
    ) -> Result<Self, HelixError> {
        let mut this = Self {
            agent,
            client_id: client_id.to_string(),
            client_secret,
            token: None,
        };
        this.refresh().await?;
        Ok(this)
    }

    /// A token guaranteed usable for at least one request round-trip.
    pub async fn bearer_token(&mut self) -> Result<&str, HelixError> {
        let now = OffsetDateTime::now_utc();
        if self.token.as_ref().map_or(true, |t| t.is_stale(now)) {
            self.refresh().await?;
        }

        match &self.token {
            Some(token) => Ok(&token.bearer),
            None => Err(HelixError::Auth(String::from("no app token available"))),
        }
    }

    /// Drops the cached token so the next lookup forces an exchange.
    ///
    /// Called when the upstream rejects a token we thought was fine.
    pub fn invalidate(&mut self) {
        log::debug!("invalidating cached app token");
        self.token = None;
    }

    async fn refresh(&mut self) -> Result<(), HelixError> {
        #[derive(serde::Deserialize)]
        struct Response {
            access_token: String,
            expires_in: i64,
        }

        let query = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "client_credentials"),
        ];

        let response = self
            .agent
            .post(TOKEN_URL)
            .query(&query)
            .send()
            .await
            .map_err(|err| HelixError::Auth(format!("token exchange failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HelixError::Auth(format!("token exchange rejected: {status}")));
        }

        let resp: Response = response
            .json()
            .await
            .map_err(|err| HelixError::Auth(format!("malformed token response: {err}")))?;

        log::debug!("obtained app access token, expires in {}s", resp.expires_in);
        self.token = Some(AppToken {
            bearer: resp.access_token,
            expires_at: OffsetDateTime::now_utc() + Duration::seconds(resp.expires_in),
        });
        Ok(())
    }
}
