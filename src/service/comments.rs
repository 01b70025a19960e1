//! Formatting and batching of preserved comments.
//!
//! Comments removed alongside a deleted card are retained in the backup
//! store and re-posted onto the recreated card as quoted blocks. To avoid
//! posting hundreds of individual comments, consecutive blocks are packed
//! into batches kept under a fixed size limit, in chronological order.

use chrono::NaiveDateTime;

use crate::domain::Comment;

/// Upper bound, in bytes, for a single re-posted comment batch.
pub const MAX_BATCH_BYTES: usize = 16 * 1024;

/// Marker prefix of an already-quoted block; such comments are carried
/// verbatim instead of being quoted a second time.
const QUOTED_PREFIX: &str = "_On";

/// Renders a preserved comment as a quoted attribution block.
///
/// The block names the original author with a profile link and quotes the
/// comment text line by line. Comments that already start with the quoted
/// marker pass through unchanged; previously formatted blocks open with a
/// newline, so the marker check ignores leading whitespace.
pub fn format_comment(comment: &Comment) -> String {
    if comment.text.trim_start().starts_with(QUOTED_PREFIX) {
        return comment.text.clone();
    }

    let date = match NaiveDateTime::parse_from_str(&comment.date, "%Y-%m-%dT%H:%M:%S%.3fZ") {
        Ok(parsed) => parsed.format("%a, %b %-d %Y, %H:%M").to_string(),
        Err(_) => comment.date.clone(),
    };
    let quoted = comment.text.split('\n').collect::<Vec<_>>().join("\n> ");

    format!(
        "\n_On {date} [{username}](https://trello.com/{user_id}) wrote:_\n\n> {quoted}\n",
        username = comment.username,
        user_id = comment.user_id,
    )
}

/// Packs formatted comments into batches, each under [`MAX_BATCH_BYTES`].
///
/// Input order is preserved: callers pass comments oldest first and post
/// the returned batches in order, so the recreated card reads top to
/// bottom in chronological order. A single block longer than the limit is
/// truncated at a character boundary so no batch can exceed what the
/// external API accepts. Batches consisting only of whitespace are
/// dropped.
pub fn batch_comments(comments: &[Comment]) -> Vec<String> {
    let mut batches = Vec::new();
    let mut current = String::new();

    for comment in comments {
        let mut block = format_comment(comment);
        if block.len() >= MAX_BATCH_BYTES {
            let mut end = MAX_BATCH_BYTES - 1;
            while !block.is_char_boundary(end) {
                end -= 1;
            }
            block.truncate(end);
        }
        if !current.is_empty() && current.len() + block.len() >= MAX_BATCH_BYTES {
            batches.push(std::mem::take(&mut current));
        }
        current.push_str(&block);
    }

    if !current.trim().is_empty() {
        batches.push(current);
    }

    batches
}
