use std::time::Duration;

use lookout::{monitor::Monitor, profile::InterestProfile, source::Helix};
use lookout_config::LoadFromEnv;
use lookout_discord::{config::Discord, DiscordClient};
use lookout_helix::{config::Twitch, AppAuth, HelixClient};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    simple_env_load::load_env_from([".dev.env"]);
    alto_logger::TermLogger::new(
        alto_logger::Options::default()
            .with_time(alto_logger::TimeConfig::relative_now())
            .with_style(alto_logger::StyleConfig::SingleLine),
    )?
    .init()?;

    log::info!("loading configuration");
    let profile = InterestProfile::load_from_env()?;
    let twitch = Twitch::load_from_env()?;
    let discord = Discord::load_from_env()?;

    let agent = reqwest::Client::builder()
        .user_agent(lookout::USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()?;

    log::info!("getting a twitch app access token");
    let mut auth =
        AppAuth::create(agent.clone(), &twitch.client_id, twitch.client_secret.clone()).await?;
    let client = HelixClient::new(agent.clone(), &twitch.client_id);

    describe_watch_list(&mut auth, &client, &profile).await;

    let notifier = DiscordClient::new(agent, discord.bot_token.clone(), &discord.channel_id);

    let (tx, rx) = tokio::sync::watch::channel(false);
    tokio::task::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                log::info!("interrupt received, finishing the current cycle");
                let _ = tx.send(true);
            }
            Err(err) => {
                log::error!("cannot listen for the interrupt signal: {err}");
                // a dropped sender reads as a shutdown request
                std::future::pending::<()>().await
            }
        }
    });

    Monitor::new(Helix::new(auth, client), notifier, profile)
        .run(rx)
        .await
}

async fn describe_watch_list(auth: &mut AppAuth, client: &HelixClient, profile: &InterestProfile) {
    if profile.game_ids.is_empty() {
        log::info!("no game filter, watching the whole live listing");
        return;
    }

    let lookup = async {
        let token = auth.bearer_token().await?;
        client.games_by_id(token, &profile.game_ids).await
    };

    match lookup.await {
        Ok(games) => {
            let names = games
                .iter()
                .map(|g| g.name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            log::info!("watching {} game(s): {names}", profile.game_ids.len());
        }
        Err(err) => log::warn!("could not resolve the watched game names: {err}"),
    }
}
