use std::time::Duration;

use lookout_config::{env_opt, split_csv, LoadFromEnv};

/// What to do with a session whose notification could not be delivered.
///
/// `MarkNotified` keeps the session recorded so it is never re-sent
/// (at-most-once). `RetryNextCycle` forgets it so the next poll tries again,
/// at the risk of a duplicate if the send partially went through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchFailure {
    MarkNotified,
    RetryNextCycle,
}

impl std::str::FromStr for DispatchFailure {
    type Err = anyhow::Error;
    fn from_str(input: &str) -> anyhow::Result<Self> {
        match input {
            "mark-notified" => Ok(Self::MarkNotified),
            "retry-next-cycle" => Ok(Self::RetryNextCycle),
            other => anyhow::bail!("unknown dispatch-failure policy: '{other}'"),
        }
    }
}

/// The filter criteria a stream has to satisfy to be notified.
///
/// Loaded once at startup and passed around by reference; nothing mutates it
/// afterwards.
#[derive(Clone, Debug)]
pub struct InterestProfile {
    /// Game identifiers to scope the catalog query by. Empty means the whole
    /// live listing.
    pub game_ids: Vec<String>,

    /// Inclusive viewer-count band.
    pub min_viewers: u64,
    pub max_viewers: u64,

    /// Follower band, applied after the pure filters since it needs lookups.
    pub min_followers: u64,
    pub max_followers: Option<u64>,

    /// Tags that must all be present, matched with the upstream's casing.
    pub required_tags: Vec<String>,
    /// Tags that reject a stream, compared case-insensitively.
    pub exclude_tags: Vec<String>,

    /// Channels never to notify for, by display name or identifier.
    pub ignored_channels: Vec<String>,

    /// Accepted language codes. Empty accepts everything.
    pub languages: Vec<String>,

    pub poll_interval: Duration,
    pub dedup_retention: Duration,
    pub on_dispatch_failure: DispatchFailure,
}

impl Default for InterestProfile {
    fn default() -> Self {
        Self {
            game_ids: Vec::new(),
            min_viewers: 0,
            max_viewers: 20,
            min_followers: 0,
            max_followers: None,
            required_tags: Vec::new(),
            exclude_tags: Vec::new(),
            ignored_channels: Vec::new(),
            languages: Vec::new(),
            poll_interval: Duration::from_secs(30 * 60),
            dedup_retention: Duration::from_secs(48 * 60 * 60),
            on_dispatch_failure: DispatchFailure::MarkNotified,
        }
    }
}

impl InterestProfile {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.min_viewers > self.max_viewers {
            anyhow::bail!(
                "min_viewers ({}) must not exceed max_viewers ({})",
                self.min_viewers,
                self.max_viewers
            )
        }
        if let Some(max) = self.max_followers {
            if self.min_followers > max {
                anyhow::bail!(
                    "min_followers ({}) must not exceed max_followers ({max})",
                    self.min_followers
                )
            }
        }
        if self.poll_interval.is_zero() {
            anyhow::bail!("poll interval must be greater than zero")
        }
        if self.dedup_retention.is_zero() {
            anyhow::bail!("dedup retention must be greater than zero")
        }
        Ok(())
    }
}

impl LoadFromEnv for InterestProfile {
    fn load_from_env() -> anyhow::Result<Self> {
        let csv = |key: &str| {
            std::env::var(key)
                .map(|v| split_csv(&v))
                .unwrap_or_default()
        };

        let mut profile = Self {
            game_ids: csv("LOOKOUT_GAME_IDS"),
            required_tags: csv("LOOKOUT_REQUIRED_TAGS"),
            exclude_tags: csv("LOOKOUT_EXCLUDE_TAGS"),
            ignored_channels: csv("LOOKOUT_IGNORED_CHANNELS"),
            languages: csv("LOOKOUT_LANGUAGES"),
            ..Self::default()
        };

        if let Some(min) = env_opt("LOOKOUT_MIN_VIEWERS")? {
            profile.min_viewers = min;
        }
        if let Some(max) = env_opt("LOOKOUT_MAX_VIEWERS")? {
            profile.max_viewers = max;
        }
        if let Some(min) = env_opt("LOOKOUT_MIN_FOLLOWERS")? {
            profile.min_followers = min;
        }
        profile.max_followers = env_opt("LOOKOUT_MAX_FOLLOWERS")?;

        if let Some(minutes) = env_opt::<u64>("LOOKOUT_POLL_INTERVAL_MINUTES")? {
            profile.poll_interval = Duration::from_secs(minutes * 60);
        }
        if let Some(hours) = env_opt::<u64>("LOOKOUT_DEDUP_RETENTION_HOURS")? {
            profile.dedup_retention = Duration::from_secs(hours * 60 * 60);
        }
        if let Some(policy) = env_opt("LOOKOUT_ON_DISPATCH_FAILURE")? {
            profile.on_dispatch_failure = policy;
        }

        profile.validate()?;
        log::debug!("created: {:?}", profile);
        Ok(profile)
    }
}
