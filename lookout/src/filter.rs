use lookout_helix::data::Stream;

use crate::profile::InterestProfile;

/// Whether a stream satisfies the whole interest profile.
///
/// Pure; every check is an independent conjunct, evaluated cheapest-first.
/// Game scoping happened at query time and is not re-checked here.
pub fn matches(stream: &Stream, profile: &InterestProfile) -> bool {
    within_viewer_bounds(stream, profile)
        && !is_ignored(stream, profile)
        && language_accepted(stream, profile)
        && has_required_tags(stream, profile)
        && !has_excluded_tag(stream, profile)
}

fn within_viewer_bounds(stream: &Stream, profile: &InterestProfile) -> bool {
    (profile.min_viewers..=profile.max_viewers).contains(&stream.viewer_count)
}

// names compare case-insensitively, identifiers exactly
fn is_ignored(stream: &Stream, profile: &InterestProfile) -> bool {
    profile.ignored_channels.iter().any(|ignored| {
        ignored.to_lowercase() == stream.user_name.to_lowercase() || *ignored == stream.user_id
    })
}

fn language_accepted(stream: &Stream, profile: &InterestProfile) -> bool {
    profile.languages.is_empty() || profile.languages.contains(&stream.language)
}

fn has_required_tags(stream: &Stream, profile: &InterestProfile) -> bool {
    profile
        .required_tags
        .iter()
        .all(|required| stream.tags.contains(required))
}

fn has_excluded_tag(stream: &Stream, profile: &InterestProfile) -> bool {
    profile.exclude_tags.iter().any(|excluded| {
        let excluded = excluded.to_lowercase();
        stream
            .tags
            .iter()
            .any(|tag| tag.to_lowercase() == excluded)
    })
}
