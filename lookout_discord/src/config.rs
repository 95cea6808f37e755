use lookout_config::{load_from_env, LoadFromEnv, Secret};

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct Discord {
    pub bot_token: Secret<String>,
    pub channel_id: String,
}

impl LoadFromEnv for Discord {
    fn load_from_env() -> anyhow::Result<Self> {
        load_from_env(&[
            ("LOOKOUT_DISCORD_BOT_TOKEN", |t, v| t.bot_token = Secret(v)),
            ("LOOKOUT_DISCORD_CHANNEL_ID", |t, v| t.channel_id = v),
        ])
    }
}
