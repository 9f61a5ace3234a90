/// Approximate token count as seen by the embedding model. Four characters
/// per token is the usual rule of thumb for English prose.
pub fn approx_token_count(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Split text into chunks of at most `max_tokens`, preferring sentence
/// boundaries. A single sentence longer than the budget is hard-split.
pub fn split_text(text: &str, max_tokens: usize) -> Vec<String> {
    let max_chars = max_tokens.saturating_mul(4).max(1);

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    for sentence in sentences(text) {
        let sentence_len = sentence.chars().count();

        if sentence_len > max_chars {
            if !current.trim().is_empty() {
                chunks.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
            chunks.extend(hard_split(sentence, max_chars));
            continue;
        }

        if current.chars().count() + sentence_len > max_chars && !current.trim().is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        current.push_str(sentence);
    }

    if !current.trim().is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Split on sentence terminators, keeping the terminator with the sentence.
fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;

    for (i, c) in text.char_indices() {
        if matches!(c, '.' | '!' | '?' | '\n') {
            let end = i + c.len_utf8();
            let segment = &text[start..end];
            if !segment.trim().is_empty() {
                out.push(segment);
            }
            start = end;
        }
    }

    if start < text.len() {
        let tail = &text[start..];
        if !tail.trim().is_empty() {
            out.push(tail);
        }
    }

    out
}

fn hard_split(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars)
        .map(|piece| piece.iter().collect::<String>())
        .filter(|piece| !piece.trim().is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunks = split_text("One sentence. Another sentence.", 4096);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_chunks_respect_token_budget() {
        let text = "aaaa bbbb. cccc dddd. eeee ffff. gggg hhhh.";
        // 4 tokens = 16 chars; each sentence is ~11 chars.
        let chunks = split_text(text, 4);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(approx_token_count(chunk) <= 4, "oversized chunk: {chunk:?}");
        }
    }

    #[test]
    fn test_splits_on_sentence_boundaries() {
        let chunks = split_text("First point. Second point.", 4);
        assert_eq!(chunks, vec!["First point.", " Second point."]);
    }

    #[test]
    fn test_oversized_sentence_is_hard_split() {
        let long = "x".repeat(100);
        let chunks = split_text(&long, 4);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 16);
        }
        let rejoined: String = chunks.concat();
        assert_eq!(rejoined, long);
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        assert!(split_text("", 4096).is_empty());
        assert!(split_text("   \n  ", 4096).is_empty());
    }
}
