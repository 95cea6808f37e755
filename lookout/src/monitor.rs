use std::collections::HashMap;
use std::time::Duration;

use anyhow::Context;
use lookout_discord::Embed;
use lookout_helix::{data::Stream, HelixError};
use time::OffsetDateTime;

use crate::{
    dedup::NotifiedStore,
    filter,
    profile::{DispatchFailure, InterestProfile},
    render,
};

const DEFAULT_BACKOFF: Duration = Duration::from_secs(2);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

// discord allows 5 messages per 5 seconds per channel
const DISPATCH_CHUNK: usize = 5;
const DISPATCH_PAUSE: Duration = Duration::from_secs(5);

/// Where live streams come from.
#[async_trait::async_trait]
pub trait StreamSource {
    /// One full paginated catalog query; `None` asks for the unscoped live
    /// listing.
    async fn fetch_game(&mut self, game_id: Option<&str>) -> Result<Vec<Stream>, HelixError>;

    /// Drops any cached credential after the upstream rejected it.
    fn invalidate_credential(&mut self);

    /// Best-effort follower count; `None` when it cannot be determined.
    async fn follower_count(&mut self, user_id: &str) -> Option<u64>;
}

/// Where rendered notifications go.
#[async_trait::async_trait]
pub trait Notify {
    async fn send(&mut self, embed: &Embed) -> anyhow::Result<()>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct CycleOutcome {
    pub fetched: usize,
    pub matched: usize,
    pub fresh: usize,
    pub sent: usize,
    pub failed: usize,
}

impl std::fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "fetched {}, matched {}, new {}, sent {} embed(s)",
            self.fetched, self.matched, self.fresh, self.sent
        )?;
        if self.failed > 0 {
            write!(f, " ({} failed)", self.failed)?;
        }
        Ok(())
    }
}

/// Drives the poll loop: fetch, filter, dedup, dispatch, sleep.
///
/// One cycle runs to completion (or aborts early) before the next starts, so
/// the dedup store and the cached credential are only ever touched by the
/// active cycle.
pub struct Monitor<S, N> {
    source: S,
    notifier: N,
    profile: InterestProfile,
    store: NotifiedStore,
}

impl<S, N> Monitor<S, N>
where
    S: StreamSource,
    N: Notify,
{
    pub fn new(source: S, notifier: N, profile: InterestProfile) -> Self {
        Self {
            source,
            notifier,
            profile,
            store: NotifiedStore::default(),
        }
    }

    /// Polls until a shutdown is requested.
    ///
    /// The signal is only honored between cycles, so an in-flight dispatch is
    /// never cut off halfway. A failed cycle is logged and slept off, never
    /// fatal.
    pub async fn run(
        mut self,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        log::info!(
            "starting the poll loop, one cycle every {:?}",
            self.profile.poll_interval
        );

        loop {
            match self.cycle().await {
                Ok(outcome) if outcome.fresh > 0 => log::info!("{outcome}"),
                Ok(outcome) => log::debug!("{outcome}"),
                Err(err) => log::warn!("cycle aborted: {err:#}"),
            }

            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    log::info!("shutdown requested, stopping the poll loop");
                    break;
                }
                _ = tokio::time::sleep(self.profile.poll_interval) => {}
            }
        }

        Ok(())
    }

    /// One fetch → filter → dedup → dispatch pass.
    pub async fn cycle(&mut self) -> anyhow::Result<CycleOutcome> {
        let now = OffsetDateTime::now_utc();

        let streams = self.poll().await?;
        let fetched = streams.len();

        let matched: Vec<Stream> = streams
            .into_iter()
            .filter(|stream| filter::matches(stream, &self.profile))
            .collect();

        let mut follower_counts = HashMap::new();
        let matched = self.apply_follower_bounds(matched, &mut follower_counts).await;

        let fresh: Vec<Stream> = matched
            .iter()
            .filter(|stream| self.store.should_notify(&stream.session_key(), now))
            .cloned()
            .collect();

        let mut outcome = CycleOutcome {
            fetched,
            matched: matched.len(),
            fresh: fresh.len(),
            ..CycleOutcome::default()
        };

        if !fresh.is_empty() {
            self.dispatch(&fresh, &mut follower_counts, &mut outcome).await;
        }

        let retention = time::Duration::seconds(self.profile.dedup_retention.as_secs() as i64);
        self.store.prune(now, retention);

        Ok(outcome)
    }

    /// Fetches every configured game, isolating failures per game.
    ///
    /// A game that keeps failing is skipped for this cycle; an exhausted
    /// credential aborts the whole cycle so nothing partially filtered gets
    /// dispatched.
    async fn poll(&mut self) -> anyhow::Result<Vec<Stream>> {
        let targets: Vec<Option<String>> = match self.profile.game_ids.as_slice() {
            [] => vec![None],
            ids => ids.iter().cloned().map(Some).collect(),
        };

        let mut streams = Vec::new();
        let mut auth_retried = false;

        for target in &targets {
            let game_id = target.as_deref();
            let label = game_id.unwrap_or("<any>");

            match self.fetch_with_retry(game_id, &mut auth_retried).await {
                Ok(batch) => {
                    log::debug!("fetched {} stream(s) for {label}", batch.len());
                    streams.extend(batch);
                }
                Err(err @ HelixError::Auth(..)) => {
                    return Err(err).context("credential exhausted, aborting the cycle")
                }
                Err(err) => log::warn!("giving up on {label} this cycle: {err}"),
            }
        }

        Ok(streams)
    }

    /// One catalog query with the per-cycle retry budget: a single forced
    /// credential refresh across the whole cycle, and a single backed-off
    /// retry per game for transient failures.
    async fn fetch_with_retry(
        &mut self,
        game_id: Option<&str>,
        auth_retried: &mut bool,
    ) -> Result<Vec<Stream>, HelixError> {
        let mut upstream_retried = false;

        loop {
            match self.source.fetch_game(game_id).await {
                Ok(batch) => return Ok(batch),
                Err(HelixError::Auth(reason)) if !*auth_retried => {
                    *auth_retried = true;
                    log::warn!("token rejected ({reason}), forcing a refresh");
                    self.source.invalidate_credential();
                }
                Err(err) if err.is_retryable() && !upstream_retried => {
                    upstream_retried = true;
                    let wait = err.retry_after().unwrap_or(DEFAULT_BACKOFF).min(MAX_BACKOFF);
                    log::warn!("transient upstream failure ({err}), retrying in {wait:?}");
                    tokio::time::sleep(wait).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// The follower band needs lookups, so it runs outside the pure filter.
    /// An undeterminable count passes rather than suppressing a match.
    async fn apply_follower_bounds(
        &mut self,
        matched: Vec<Stream>,
        counts: &mut HashMap<String, Option<u64>>,
    ) -> Vec<Stream> {
        let min = self.profile.min_followers;
        let max = self.profile.max_followers;
        if min == 0 && max.is_none() {
            return matched;
        }

        let mut kept = Vec::with_capacity(matched.len());
        for stream in matched {
            match self.lookup_followers(&stream.user_id, counts).await {
                Some(count) if count < min => {
                    log::debug!("'{}' under the follower band ({count})", stream.user_name)
                }
                Some(count) if max.map_or(false, |max| count > max) => {
                    log::debug!("'{}' over the follower band ({count})", stream.user_name)
                }
                _ => kept.push(stream),
            }
        }
        kept
    }

    async fn lookup_followers(
        &mut self,
        user_id: &str,
        counts: &mut HashMap<String, Option<u64>>,
    ) -> Option<u64> {
        if let Some(count) = counts.get(user_id) {
            return *count;
        }
        let count = self.source.follower_count(user_id).await;
        counts.insert(user_id.to_string(), count);
        count
    }

    async fn dispatch(
        &mut self,
        fresh: &[Stream],
        counts: &mut HashMap<String, Option<u64>>,
        outcome: &mut CycleOutcome,
    ) {
        for stream in fresh {
            self.lookup_followers(&stream.user_id, counts).await;
        }
        let known: HashMap<String, u64> = counts
            .iter()
            .filter_map(|(id, count)| count.map(|c| (id.clone(), c)))
            .collect();

        for (i, note) in render::notifications(fresh, &known).iter().enumerate() {
            if i > 0 && i % DISPATCH_CHUNK == 0 {
                log::debug!("pacing dispatches, sleeping {DISPATCH_PAUSE:?}");
                tokio::time::sleep(DISPATCH_PAUSE).await;
            }

            match self.notifier.send(&note.embed).await {
                Ok(()) => outcome.sent += 1,
                Err(err) => {
                    outcome.failed += 1;
                    log::warn!("dispatch failed: {err:#}");
                    if let DispatchFailure::RetryNextCycle = self.profile.on_dispatch_failure {
                        for session in &note.sessions {
                            self.store.forget(session);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;

    #[derive(Default)]
    struct TestSource {
        responses: HashMap<String, VecDeque<Result<Vec<Stream>, HelixError>>>,
        fetched: Vec<String>,
        invalidations: usize,
        followers: HashMap<String, u64>,
    }

    impl TestSource {
        fn respond(mut self, game: &str, result: Result<Vec<Stream>, HelixError>) -> Self {
            self.responses
                .entry(game.to_string())
                .or_default()
                .push_back(result);
            self
        }
    }

    #[async_trait::async_trait]
    impl StreamSource for TestSource {
        async fn fetch_game(&mut self, game_id: Option<&str>) -> Result<Vec<Stream>, HelixError> {
            let key = game_id.unwrap_or("<any>").to_string();
            self.fetched.push(key.clone());
            self.responses
                .get_mut(&key)
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(|| Ok(Vec::new()))
        }

        fn invalidate_credential(&mut self) {
            self.invalidations += 1;
        }

        async fn follower_count(&mut self, user_id: &str) -> Option<u64> {
            self.followers.get(user_id).copied()
        }
    }

    #[derive(Default)]
    struct TestNotifier {
        sent: Vec<Embed>,
        fail_next: usize,
    }

    #[async_trait::async_trait]
    impl Notify for TestNotifier {
        async fn send(&mut self, embed: &Embed) -> anyhow::Result<()> {
            if self.fail_next > 0 {
                self.fail_next -= 1;
                anyhow::bail!("channel unavailable")
            }
            self.sent.push(embed.clone());
            Ok(())
        }
    }

    fn stream(user: &str, session: &str, viewers: u64, tags: &[&str]) -> Stream {
        Stream {
            id: session.to_string(),
            user_id: format!("uid_{user}"),
            user_name: user.to_string(),
            game_id: String::from("509658"),
            game_name: String::from("Just Chatting"),
            title: String::from("come hang out"),
            viewer_count: viewers,
            language: String::from("en"),
            tags: tags.iter().map(ToString::to_string).collect(),
            started_at: time::OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn profile() -> InterestProfile {
        InterestProfile {
            game_ids: vec![String::from("509658")],
            exclude_tags: vec![String::from("nsfw")],
            ..InterestProfile::default()
        }
    }

    fn auth_rejected() -> HelixError {
        HelixError::Auth(String::from("expired"))
    }

    fn upstream(status: u16, retry_after: Option<Duration>) -> HelixError {
        HelixError::Upstream {
            status,
            message: String::new(),
            retry_after,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn only_matching_streams_are_dispatched_and_recorded() {
        let a = stream("alice", "1", 15, &[]);
        let b = stream("bob", "2", 15, &["nsfw"]);

        let source = TestSource::default().respond("509658", Ok(vec![a, b]));
        let mut monitor = Monitor::new(source, TestNotifier::default(), profile());

        let outcome = monitor.cycle().await.unwrap();
        assert_eq!(outcome.fetched, 2);
        assert_eq!(outcome.matched, 1);
        assert_eq!(outcome.fresh, 1);
        assert_eq!(outcome.sent, 1);

        assert_eq!(monitor.notifier.sent.len(), 1);
        assert_eq!(monitor.notifier.sent[0].fields[0].name, "alice");
        assert_eq!(monitor.store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn a_session_notifies_only_once_across_cycles() {
        let source = TestSource::default()
            .respond("509658", Ok(vec![stream("alice", "1", 15, &[])]))
            .respond("509658", Ok(vec![stream("alice", "1", 18, &[])]));
        let mut monitor = Monitor::new(source, TestNotifier::default(), profile());

        assert_eq!(monitor.cycle().await.unwrap().sent, 1);

        let second = monitor.cycle().await.unwrap();
        assert_eq!(second.matched, 1);
        assert_eq!(second.fresh, 0);
        assert_eq!(second.sent, 0);
        assert_eq!(monitor.notifier.sent.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn a_new_session_of_the_same_broadcaster_notifies_again() {
        let source = TestSource::default()
            .respond("509658", Ok(vec![stream("alice", "1", 15, &[])]))
            .respond("509658", Ok(Vec::new()))
            .respond("509658", Ok(vec![stream("alice", "9", 3, &[])]));
        let mut monitor = Monitor::new(source, TestNotifier::default(), profile());

        assert_eq!(monitor.cycle().await.unwrap().sent, 1);
        assert_eq!(monitor.cycle().await.unwrap().sent, 0);
        assert_eq!(monitor.cycle().await.unwrap().sent, 1);
        assert_eq!(monitor.store.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn auth_rejection_forces_one_refresh_then_aborts_the_cycle() {
        let source = TestSource::default()
            .respond("509658", Err(auth_rejected()))
            .respond("509658", Err(auth_rejected()));
        let mut monitor = Monitor::new(source, TestNotifier::default(), profile());

        assert!(monitor.cycle().await.is_err());
        assert_eq!(monitor.source.invalidations, 1);
        assert!(monitor.notifier.sent.is_empty());
        assert!(monitor.store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn auth_rejection_recovers_when_the_refreshed_token_works() {
        let source = TestSource::default()
            .respond("509658", Err(auth_rejected()))
            .respond("509658", Ok(vec![stream("alice", "1", 15, &[])]));
        let mut monitor = Monitor::new(source, TestNotifier::default(), profile());

        assert_eq!(monitor.cycle().await.unwrap().sent, 1);
        assert_eq!(monitor.source.invalidations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn one_games_failure_does_not_block_another() {
        let mut profile = profile();
        profile.game_ids = vec![String::from("1"), String::from("2")];

        let source = TestSource::default()
            .respond("1", Err(upstream(404, None)))
            .respond("2", Ok(vec![stream("alice", "1", 15, &[])]));
        let mut monitor = Monitor::new(source, TestNotifier::default(), profile);

        let outcome = monitor.cycle().await.unwrap();
        assert_eq!(outcome.fetched, 1);
        assert_eq!(outcome.sent, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn a_transient_failure_is_retried_once_within_the_cycle() {
        let source = TestSource::default()
            .respond("509658", Err(upstream(429, Some(Duration::from_secs(3)))))
            .respond("509658", Ok(vec![stream("alice", "1", 15, &[])]));
        let mut monitor = Monitor::new(source, TestNotifier::default(), profile());

        let outcome = monitor.cycle().await.unwrap();
        assert_eq!(outcome.sent, 1);
        assert_eq!(monitor.source.fetched.len(), 2);
        assert_eq!(monitor.source.invalidations, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn a_persistent_transient_failure_skips_the_game() {
        let source = TestSource::default()
            .respond("509658", Err(upstream(500, None)))
            .respond("509658", Err(upstream(500, None)));
        let mut monitor = Monitor::new(source, TestNotifier::default(), profile());

        let outcome = monitor.cycle().await.unwrap();
        assert_eq!(outcome.fetched, 0);
        assert_eq!(outcome.sent, 0);
        assert_eq!(monitor.source.fetched.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn dispatch_failure_still_marks_the_session_by_default() {
        let source = TestSource::default()
            .respond("509658", Ok(vec![stream("alice", "1", 15, &[])]))
            .respond("509658", Ok(vec![stream("alice", "1", 15, &[])]));
        let notifier = TestNotifier {
            fail_next: 1,
            ..TestNotifier::default()
        };
        let mut monitor = Monitor::new(source, notifier, profile());

        let first = monitor.cycle().await.unwrap();
        assert_eq!(first.failed, 1);
        assert_eq!(monitor.store.len(), 1);

        let second = monitor.cycle().await.unwrap();
        assert_eq!(second.fresh, 0);
        assert!(monitor.notifier.sent.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dispatch_failure_can_be_retried_next_cycle() {
        let mut profile = profile();
        profile.on_dispatch_failure = DispatchFailure::RetryNextCycle;

        let source = TestSource::default()
            .respond("509658", Ok(vec![stream("alice", "1", 15, &[])]))
            .respond("509658", Ok(vec![stream("alice", "1", 15, &[])]));
        let notifier = TestNotifier {
            fail_next: 1,
            ..TestNotifier::default()
        };
        let mut monitor = Monitor::new(source, notifier, profile);

        assert_eq!(monitor.cycle().await.unwrap().failed, 1);
        assert!(monitor.store.is_empty());

        let second = monitor.cycle().await.unwrap();
        assert_eq!(second.sent, 1);
        assert_eq!(monitor.notifier.sent.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn an_empty_game_list_polls_the_unscoped_listing() {
        let mut profile = profile();
        profile.game_ids.clear();

        let source =
            TestSource::default().respond("<any>", Ok(vec![stream("alice", "1", 15, &[])]));
        let mut monitor = Monitor::new(source, TestNotifier::default(), profile);

        let outcome = monitor.cycle().await.unwrap();
        assert_eq!(monitor.source.fetched, ["<any>"]);
        assert_eq!(outcome.sent, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn the_follower_band_drops_out_of_band_streams() {
        let mut profile = profile();
        profile.min_followers = 10;
        profile.max_followers = Some(100);

        let source = TestSource::default().respond(
            "509658",
            Ok(vec![
                stream("tiny", "1", 15, &[]),
                stream("inband", "2", 15, &[]),
                stream("huge", "3", 15, &[]),
                stream("unknown", "4", 15, &[]),
            ]),
        );
        let source = TestSource {
            followers: HashMap::from([
                (String::from("uid_tiny"), 2),
                (String::from("uid_inband"), 50),
                (String::from("uid_huge"), 5000),
            ]),
            ..source
        };
        let mut monitor = Monitor::new(source, TestNotifier::default(), profile);

        let outcome = monitor.cycle().await.unwrap();
        // the unknown count passes rather than suppressing a match
        assert_eq!(outcome.matched, 2);
        assert_eq!(outcome.sent, 1);

        let names: Vec<_> = monitor.notifier.sent[0]
            .fields
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, ["inband (50 followers)", "unknown"]);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_is_honored_between_cycles() {
        let source = TestSource::default();
        let monitor = Monitor::new(source, TestNotifier::default(), profile());

        let (tx, rx) = tokio::sync::watch::channel(false);
        let handle = tokio::spawn(monitor.run(rx));

        tx.send(true).unwrap();
        handle.await.unwrap().unwrap();
    }
}
