use lookout_discord::{DiscordClient, Embed};
use lookout_helix::{data::Stream, AppAuth, HelixClient, HelixError};

use crate::monitor::{Notify, StreamSource};

/// The live Twitch-backed source: the credential manager plus the catalog
/// client, glued together so every query goes out with a usable token.
pub struct Helix {
    auth: AppAuth,
    client: HelixClient,
}

impl Helix {
    pub fn new(auth: AppAuth, client: HelixClient) -> Self {
        Self { auth, client }
    }
}

#[async_trait::async_trait]
impl StreamSource for Helix {
    async fn fetch_game(&mut self, game_id: Option<&str>) -> Result<Vec<Stream>, HelixError> {
        let token = self.auth.bearer_token().await?;
        self.client.streams_for_game(token, game_id).await
    }

    fn invalidate_credential(&mut self) {
        self.auth.invalidate()
    }

    async fn follower_count(&mut self, user_id: &str) -> Option<u64> {
        let token = match self.auth.bearer_token().await {
            Ok(token) => token,
            Err(err) => {
                log::debug!("no token for the follower lookup: {err}");
                return None;
            }
        };

        match self.client.follower_count(token, user_id).await {
            Ok(count) => Some(count),
            Err(err) => {
                log::debug!("follower lookup failed for {user_id}: {err}");
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl Notify for DiscordClient {
    async fn send(&mut self, embed: &Embed) -> anyhow::Result<()> {
        self.send_embed(embed).await
    }
}
