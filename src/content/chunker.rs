//! Fixed-width text chunking under the store's per-block text limit
//!
//! Lengths are counted in `char`s, so a chunk boundary never splits a code
//! point. Splitting is purely positional, never sentence-aware.

use tracing::warn;

/// Hard limit the store enforces on a single rich-text item
pub const STORE_TEXT_LIMIT: usize = 2000;

/// Default chunk width, a safety margin below [`STORE_TEXT_LIMIT`]
pub const MAX_CHUNK: usize = 1900;

/// Appended to a chunk that had to be cut down to fit the store limit
pub const TRUNCATION_MARKER: &str = "...";

/// Split `text` into consecutive chunks of `limit` chars, the last holding
/// the remainder
///
/// Empty text yields no chunks. A `limit` of zero falls back to
/// [`MAX_CHUNK`]. Any chunk still longer than [`STORE_TEXT_LIMIT`] (only
/// possible when the caller passes a limit above it) is cut to
/// [`MAX_CHUNK`] chars followed by [`TRUNCATION_MARKER`].
pub fn chunk(text: &str, limit: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let limit = if limit == 0 { MAX_CHUNK } else { limit };
    let chars: Vec<char> = text.chars().collect();

    chars
        .chunks(limit)
        .map(|piece| {
            if piece.len() > STORE_TEXT_LIMIT {
                warn!(
                    chunk_len = piece.len(),
                    limit = STORE_TEXT_LIMIT,
                    "Chunk exceeds store limit, truncating"
                );
                let mut truncated: String = piece[..MAX_CHUNK].iter().collect();
                truncated.push_str(TRUNCATION_MARKER);
                truncated
            } else {
                piece.iter().collect()
            }
        })
        .collect()
}

/// Cut `text` to at most `limit` chars, ending in [`TRUNCATION_MARKER`] when
/// anything was removed
pub fn truncate_with_marker(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }

    let keep = limit.saturating_sub(TRUNCATION_MARKER.len());
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn chunks_respect_limit_and_reassemble(text in "\\PC{0,6000}", limit in 1usize..=2000) {
            let chunks = chunk(&text, limit);
            prop_assert!(chunks.iter().all(|c| c.chars().count() <= limit));
            prop_assert!(chunks.iter().all(|c| !c.is_empty()));
            prop_assert_eq!(chunks.concat(), text);
        }

        #[test]
        fn chunk_count_is_ceiling_of_length(text in "[a-zé日]{0,5000}", limit in 1usize..=2000) {
            let len = text.chars().count();
            prop_assert_eq!(chunk(&text, limit).len(), len.div_ceil(limit));
        }
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        assert!(chunk("", MAX_CHUNK).is_empty());
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        assert_eq!(chunk("hello", MAX_CHUNK), vec!["hello".to_string()]);
    }

    #[test]
    fn test_5000_chars_split_into_three() {
        let text = "a".repeat(5000);
        let lengths: Vec<usize> = chunk(&text, 1900).iter().map(|c| c.len()).collect();
        assert_eq!(lengths, vec![1900, 1900, 1200]);
    }

    #[test]
    fn test_exact_multiple_has_no_empty_tail() {
        let text = "b".repeat(3800);
        let chunks = chunk(&text, 1900);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.len() == 1900));
    }

    #[test]
    fn test_multibyte_text_counts_chars() {
        let text = "日本語".repeat(1000);
        let chunks = chunk(&text, 1900);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), 1900);
        assert_eq!(chunks[1].chars().count(), 1100);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_oversized_limit_is_truncated_with_marker() {
        let text = "c".repeat(2500);
        let chunks = chunk(&text, 2500);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chars().count(), MAX_CHUNK + TRUNCATION_MARKER.len());
        assert!(chunks[0].ends_with(TRUNCATION_MARKER));
        assert!(chunks[0].chars().count() <= STORE_TEXT_LIMIT);
    }

    #[test]
    fn test_limit_at_store_limit_is_not_truncated() {
        let text = "d".repeat(2000);
        let chunks = chunk(&text, 2000);
        assert_eq!(chunks, vec![text]);
    }

    #[test]
    fn test_zero_limit_uses_default() {
        let text = "e".repeat(2000);
        let lengths: Vec<usize> = chunk(&text, 0).iter().map(|c| c.len()).collect();
        assert_eq!(lengths, vec![1900, 100]);
    }

    #[test]
    fn test_truncate_with_marker() {
        assert_eq!(truncate_with_marker("short", 10), "short");
        assert_eq!(truncate_with_marker("abcdefghijkl", 10), "abcdefg...");
        assert_eq!(truncate_with_marker("abcdefghijkl", 10).chars().count(), 10);
    }
}
