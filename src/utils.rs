//! Text utilities for the Discord reply path.

use unicode_segmentation::UnicodeSegmentation;

const CODE_FENCE: &str = "```";

/// Emit the accumulated part, closing an open code fence first and
/// reopening it in the next part so Discord keeps rendering the block.
/// `reopen` is false when the line that forced the flush was itself the
/// closing fence.
fn flush_part(parts: &mut Vec<String>, current: &mut String, close: bool, reopen: bool) {
    if close {
        current.push_str(CODE_FENCE);
        current.push('\n');
    }
    let trimmed = current.trim_end();
    if !trimmed.is_empty() {
        parts.push(trimmed.to_string());
    }
    current.clear();
    if reopen {
        current.push_str(CODE_FENCE);
        current.push('\n');
    }
}

/// Splits a long message into parts that fit within Discord's message limit.
///
/// Splitting happens on line boundaries where possible. Code blocks (triple
/// backticks) are closed at the end of a part and reopened at the start of
/// the next, so each part may exceed `max_length` by up to one fence; pass a
/// limit with enough margin below the hard platform cap. A single line
/// longer than the limit is split on grapheme cluster boundaries so
/// multi-byte sequences are never cut in half.
///
/// # Examples
///
/// ```
/// use quantified_ante_bot::utils::split_long_message;
/// let long_answer = "A very long answer line.\n".repeat(300);
/// let parts = split_long_message(&long_answer, 1990);
/// assert!(parts.len() > 1);
/// ```
#[must_use]
pub fn split_long_message(message: &str, max_length: usize) -> Vec<String> {
    if message.is_empty() {
        return Vec::new();
    }
    if message.len() <= max_length {
        return vec![message.to_string()];
    }

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_code_block = false;

    for line in message.lines() {
        if line.len() > max_length {
            if !current.is_empty() {
                flush_part(&mut parts, &mut current, in_code_block, in_code_block);
            }
            let mut chunk = String::new();
            for grapheme in line.graphemes(true) {
                if chunk.len() + grapheme.len() > max_length && !chunk.is_empty() {
                    let trimmed = chunk.trim_end();
                    if !trimmed.is_empty() {
                        parts.push(trimmed.to_string());
                    }
                    chunk.clear();
                }
                chunk.push_str(grapheme);
            }
            if !chunk.is_empty() {
                current.push_str(&chunk);
                current.push('\n');
            }
            continue;
        }

        // +1 for the newline. The fence state is toggled only after the
        // flush decision: a closing fence that forces a flush must still
        // see the block as open, so the emitted part gets closed and no
        // stray fence leaks into the next part.
        if current.len() + line.len() + 1 > max_length && !current.is_empty() {
            let closes_fence = in_code_block && line.starts_with(CODE_FENCE);
            flush_part(
                &mut parts,
                &mut current,
                in_code_block,
                in_code_block && !closes_fence,
            );
            if closes_fence {
                // The flush already closed the block this line was closing
                in_code_block = false;
                continue;
            }
        }
        if line.starts_with(CODE_FENCE) {
            in_code_block = !in_code_block;
        }
        current.push_str(line);
        current.push('\n');
    }

    if !current.trim_end().is_empty() {
        if in_code_block {
            current.push_str(CODE_FENCE);
        }
        parts.push(current.trim_end().to_string());
    }

    parts
}

/// Safely truncates a string to a maximum character length (not bytes).
///
/// UTF-8 safe, will not panic on multi-byte characters.
///
/// # Examples
///
/// ```
/// use quantified_ante_bot::utils::truncate_str;
/// let s = "Привет, мир!";
/// assert_eq!(truncate_str(s, 6), "Привет");
/// ```
pub fn truncate_str(s: impl AsRef<str>, max_chars: usize) -> String {
    let s = s.as_ref();
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.char_indices()
        .nth(max_chars)
        .map_or_else(|| s.to_string(), |(pos, _)| s[..pos].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_split_short_message_passthrough() {
        assert_eq!(split_long_message("hello", 1990), vec!["hello"]);
        assert!(split_long_message("", 1990).is_empty());
    }

    #[test]
    fn test_split_exactly_at_limit_is_not_split() {
        let message = "a".repeat(100);
        assert_eq!(split_long_message(&message, 100), vec![message]);
    }

    #[test]
    fn test_split_on_line_boundaries() {
        let input = "Line 1\nLine 2\nLine 3";
        // Max length 13. "Line 1\n" is 7. "Line 2\n" is 7. 7+7=14 > 13.
        let parts = split_long_message(input, 13);
        assert_eq!(parts, vec!["Line 1", "Line 2", "Line 3"]);
    }

    #[test]
    fn test_split_reopens_code_block() {
        let input = "Start\n```\nLine 1\nLine 2\n```\nEnd";
        let parts = split_long_message(input, 15);

        assert!(parts.len() > 1);
        assert!(parts[0].ends_with("```"));
        assert!(parts[1].starts_with("```"));
    }

    #[test]
    fn test_split_on_closing_fence_keeps_block_balanced() {
        // The closing fence itself overflows the part; the emitted part
        // must absorb the close instead of leaking a stray opener into
        // the next part.
        let input = "```\naaaaaaaaaa\n```\nafter";
        let parts = split_long_message(input, 16);
        assert_eq!(parts, vec!["```\naaaaaaaaaa\n```", "after"]);
        assert_eq!(parts[0].matches(CODE_FENCE).count(), 2);
    }

    #[test]
    fn test_split_very_long_line() {
        let input = "a".repeat(10000);
        let parts = split_long_message(&input, 1990);

        assert!(parts.len() >= 5);
        for part in &parts {
            assert!(part.len() <= 1990);
        }
        let concatenated: String = parts.join("");
        assert_eq!(concatenated.len(), input.len());
    }

    #[test]
    fn test_split_unicode_graphemes() {
        let input = "🔥".repeat(3000); // each emoji is 4 bytes
        let parts = split_long_message(&input, 1990);

        assert!(parts.len() >= 6);
        for part in &parts {
            assert!(part.len() <= 1990);
            assert!(part.chars().all(|c| c != '\u{FFFD}'));
        }
    }

    #[test]
    fn test_truncate_str_unicode() {
        let s = "Привет, мир!";
        assert_eq!(truncate_str(s, 6), "Привет");
        assert_eq!(truncate_str(s, 50), "Привет, мир!");
    }

    proptest! {
        #[test]
        fn split_parts_stay_within_limit(
            message in "[a-zA-Z0-9 \\n.!?]{0,600}",
            max_length in 40usize..200,
        ) {
            let parts = split_long_message(&message, max_length);
            for part in &parts {
                // reopened fences may add up to one fence plus newline
                prop_assert!(part.len() <= max_length + 4);
                prop_assert!(!part.trim().is_empty());
            }
        }

        #[test]
        fn split_preserves_non_whitespace_content(
            message in "[a-zA-Z0-9 \\n.!?]{0,600}",
            max_length in 40usize..200,
        ) {
            let strip = |s: &str| s.chars().filter(|c| !c.is_whitespace()).collect::<String>();
            let joined = split_long_message(&message, max_length).concat();
            prop_assert_eq!(strip(&joined), strip(&message));
        }
    }
}
