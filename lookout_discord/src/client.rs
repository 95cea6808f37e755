use lookout_config::Secret;

use crate::Embed;

const API_URL: &str = "https://discord.com/api/v10";

/// Posts messages to a single channel over the Discord REST API.
#[derive(Clone)]
pub struct DiscordClient {
    agent: reqwest::Client,
    bot_token: Secret<String>,
    channel_id: String,
}

impl DiscordClient {
    pub fn new(agent: reqwest::Client, bot_token: Secret<String>, channel_id: &str) -> Self {
        Self {
            agent,
            bot_token,
            channel_id: channel_id.to_string(),
        }
    }

    pub async fn send_embed(&self, embed: &Embed) -> anyhow::Result<()> {
        let url = format!("{API_URL}/channels/{}/messages", self.channel_id);
        let body = serde_json::json!({ "embeds": [embed] });

        let response = self
            .agent
            .post(&url)
            .header("authorization", format!("Bot {}", &*self.bot_token))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            anyhow::bail!("discord rejected the message ({status}): {message}")
        }

        log::trace!("posted embed to channel {}", self.channel_id);
        Ok(())
    }
}
