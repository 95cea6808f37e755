use std::collections::HashMap;

use lookout_discord::Embed;
use lookout_helix::data::Stream;

// twitch purple
pub const EMBED_COLOR: u32 = 0x9146FF;

const STREAMS_PER_EMBED: usize = 10;
const FIELD_VALUE_LIMIT: usize = 1024;

/// One embed plus the sessions it announces, so a failed send can be traced
/// back to the sessions it covered.
pub struct Notification {
    pub embed: Embed,
    pub sessions: Vec<String>,
}

/// Renders matched streams into embeds: one embed per game, split into pages
/// of ten streams, each stream a link field with its viewer count and (when
/// known) the broadcaster's follower count.
pub fn notifications(streams: &[Stream], followers: &HashMap<String, u64>) -> Vec<Notification> {
    let mut by_game: Vec<(&str, Vec<&Stream>)> = Vec::new();
    for stream in streams {
        let game = match stream.game_name.as_str() {
            "" => "Unknown",
            name => name,
        };
        match by_game.iter_mut().find(|(name, ..)| *name == game) {
            Some((.., list)) => list.push(stream),
            None => by_game.push((game, vec![stream])),
        }
    }

    let mut out = Vec::new();
    for (game, list) in by_game {
        let pages = list.chunks(STREAMS_PER_EMBED).count();

        for (page, chunk) in list.chunks(STREAMS_PER_EMBED).enumerate() {
            let mut embed = Embed::new(game).with_color(EMBED_COLOR);

            for stream in chunk {
                let name = match followers.get(&stream.user_id) {
                    Some(count) => format!("{} ({count} followers)", stream.user_name),
                    None => stream.user_name.clone(),
                };
                let value = clip(format!(
                    "[**{}**]({}) (Viewers: {})",
                    stream.title,
                    stream.url(),
                    stream.viewer_count
                ));
                embed = embed.with_field(name, value);
            }

            if pages > 1 {
                embed = embed.with_footer(format!("Page {} of {pages}", page + 1));
            }

            out.push(Notification {
                embed,
                sessions: chunk.iter().map(|s| s.session_key()).collect(),
            });
        }
    }

    out
}

// discord caps field values at 1024 chars
fn clip(value: String) -> String {
    if value.len() <= FIELD_VALUE_LIMIT {
        return value;
    }

    let mut end = FIELD_VALUE_LIMIT - 4;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &value[..end])
}
