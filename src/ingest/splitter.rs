//! Recursive character text splitting.
//!
//! Splits a document on the coarsest separator that still appears in the
//! text (`"\n\n"`, `"\n"`, `" "`, then single characters) and merges the
//! pieces back into chunks of at most `chunk_size` characters with
//! `chunk_overlap` characters carried between consecutive chunks.

use std::collections::VecDeque;

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Chunker for knowledge-base documents. Lengths are measured in
/// characters, not bytes. `chunk_overlap` must be smaller than
/// `chunk_size`.
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    #[must_use]
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    /// Split `text` into chunks. Chunks are trimmed; whitespace-only
    /// chunks are dropped, so empty input yields no chunks.
    #[must_use]
    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, &SEPARATORS)
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        // First separator present in the text wins; "" always matches.
        let (sep_idx, separator) = separators
            .iter()
            .enumerate()
            .find(|(_, sep)| sep.is_empty() || text.contains(**sep))
            .map_or((separators.len().saturating_sub(1), ""), |(i, sep)| {
                (i, *sep)
            });
        let rest = &separators[sep_idx + 1..];

        let pieces: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            text.split(separator).map(str::to_string).collect()
        };

        let mut chunks = Vec::new();
        let mut good: Vec<String> = Vec::new();
        for piece in pieces {
            if len_chars(&piece) < self.chunk_size {
                good.push(piece);
            } else {
                if !good.is_empty() {
                    chunks.extend(self.merge(&good, separator));
                    good.clear();
                }
                if rest.is_empty() {
                    chunks.push(piece);
                } else {
                    chunks.extend(self.split_with(&piece, rest));
                }
            }
        }
        if !good.is_empty() {
            chunks.extend(self.merge(&good, separator));
        }
        chunks
    }

    /// Greedily pack pieces into chunks, keeping up to `chunk_overlap`
    /// characters of trailing pieces as the start of the next chunk.
    fn merge(&self, pieces: &[String], separator: &str) -> Vec<String> {
        let sep_len = len_chars(separator);
        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let piece_len = len_chars(piece);
            let join_len = if window.is_empty() { 0 } else { sep_len };
            if total + piece_len + join_len > self.chunk_size && !window.is_empty() {
                if let Some(chunk) = join_window(&window, separator) {
                    chunks.push(chunk);
                }
                // Shrink until the overlap budget holds and the incoming
                // piece fits.
                while total > self.chunk_overlap
                    || (total > 0
                        && total + piece_len + if window.is_empty() { 0 } else { sep_len }
                            > self.chunk_size)
                {
                    match window.pop_front() {
                        Some(front) => {
                            total -= len_chars(front)
                                + if window.is_empty() { 0 } else { sep_len };
                        }
                        None => break,
                    }
                }
            }
            total += piece_len + if window.is_empty() { 0 } else { sep_len };
            window.push_back(piece);
        }
        if let Some(chunk) = join_window(&window, separator) {
            chunks.push(chunk);
        }
        chunks
    }
}

fn len_chars(s: &str) -> usize {
    s.chars().count()
}

fn join_window(window: &VecDeque<&str>, separator: &str) -> Option<String> {
    let joined = window.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_a_single_chunk() {
        let splitter = TextSplitter::new(1000, 200);
        assert_eq!(splitter.split("hello world"), vec!["hello world"]);
    }

    #[test]
    fn empty_and_whitespace_input_yield_nothing() {
        let splitter = TextSplitter::new(1000, 200);
        assert!(splitter.split("").is_empty());
        assert!(splitter.split("  \n\n  \n ").is_empty());
    }

    #[test]
    fn paragraphs_within_budget_stay_together() {
        let splitter = TextSplitter::new(25, 5);
        let chunks = splitter.split("aaaa\n\nbbbb\n\ncccc");
        assert_eq!(chunks, vec!["aaaa\n\nbbbb\n\ncccc"]);
    }

    #[test]
    fn splits_at_paragraph_boundary_with_overlap() {
        let splitter = TextSplitter::new(12, 4);
        let chunks = splitter.split("aaaa\n\nbbbb\n\ncccc");
        assert_eq!(chunks, vec!["aaaa\n\nbbbb", "bbbb\n\ncccc"]);
    }

    #[test]
    fn unbroken_run_falls_back_to_character_windows() {
        let splitter = TextSplitter::new(10, 3);
        let chunks = splitter.split("abcdefghijklmnop");
        assert_eq!(chunks, vec!["abcdefghij", "hijklmnop"]);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 10);
        }
    }

    #[test]
    fn production_settings_respect_the_size_cap() {
        let paragraphs: Vec<String> = (0..40)
            .map(|i| format!("Paragraph {i} about market structure and liquidity. ").repeat(4))
            .collect();
        let text = paragraphs.join("\n\n");
        let splitter = TextSplitter::new(1000, 200);
        let chunks = splitter.split(&text);

        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 1000);
            assert!(!chunk.trim().is_empty());
        }
        // No paragraph may be lost to splitting.
        for paragraph in &paragraphs {
            let trimmed = paragraph.trim();
            assert!(
                chunks.iter().any(|c| c.contains(trimmed)),
                "paragraph missing from every chunk"
            );
        }
    }

    #[test]
    fn consecutive_chunks_share_overlap() {
        let splitter = TextSplitter::new(12, 4);
        let chunks = splitter.split("aaaa\n\nbbbb\n\ncccc\n\ndddd");
        for pair in chunks.windows(2) {
            let tail: String = pair[0].chars().rev().take(4).collect();
            let tail: String = tail.chars().rev().collect();
            assert!(
                pair[1].starts_with(&tail),
                "expected {:?} to start with {tail:?}",
                pair[1]
            );
        }
    }
}
