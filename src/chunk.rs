//! Paragraph-boundary chunker for corpus record bodies.
//!
//! Splits a record body into pieces under a configurable character budget,
//! preferring paragraph boundaries (`\n\n`) so each embedded chunk stays
//! semantically coherent. Indices are contiguous from 0 and the split is
//! deterministic for a given input.

/// One piece of a record body, ready for embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub record_key: String,
    pub chunk_index: i64,
    pub text: String,
}

/// Split `text` into chunks of at most `max_chars`, on paragraph boundaries
/// where possible. Always returns at least one chunk.
pub fn chunk_text(record_key: &str, text: &str, max_chars: usize) -> Vec<Chunk> {
    if text.is_empty() {
        return vec![make_chunk(record_key, 0, text)];
    }

    let paragraphs: Vec<&str> = text.split("\n\n").collect();
    let mut chunks = Vec::new();
    let mut current_buf = String::new();
    let mut chunk_index: i64 = 0;

    for para in paragraphs {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }

        // Flush the buffer if this paragraph would push it past the budget.
        let would_be = if current_buf.is_empty() {
            trimmed.len()
        } else {
            current_buf.len() + 2 + trimmed.len()
        };

        if would_be > max_chars && !current_buf.is_empty() {
            chunks.push(make_chunk(record_key, chunk_index, &current_buf));
            chunk_index += 1;
            current_buf.clear();
        }

        // A single oversized paragraph gets hard-split, preferring newline
        // or space boundaries.
        if trimmed.len() > max_chars {
            if !current_buf.is_empty() {
                chunks.push(make_chunk(record_key, chunk_index, &current_buf));
                chunk_index += 1;
                current_buf.clear();
            }
            let mut remaining = trimmed;
            while !remaining.is_empty() {
                let split_at = floor_char_boundary(remaining, remaining.len().min(max_chars));
                let actual_split = if split_at < remaining.len() {
                    remaining[..split_at]
                        .rfind('\n')
                        .or_else(|| remaining[..split_at].rfind(' '))
                        .map(|pos| pos + 1)
                        .unwrap_or(split_at)
                } else {
                    split_at
                };
                // A budget smaller than the first char must still advance.
                let actual_split = if actual_split == 0 {
                    remaining
                        .chars()
                        .next()
                        .map(|c| c.len_utf8())
                        .unwrap_or(remaining.len())
                } else {
                    actual_split
                };
                let piece = &remaining[..actual_split];
                chunks.push(make_chunk(record_key, chunk_index, piece.trim()));
                chunk_index += 1;
                remaining = &remaining[actual_split..];
            }
        } else {
            if !current_buf.is_empty() {
                current_buf.push_str("\n\n");
            }
            current_buf.push_str(trimmed);
        }
    }

    if !current_buf.is_empty() {
        chunks.push(make_chunk(record_key, chunk_index, &current_buf));
    }

    if chunks.is_empty() {
        chunks.push(make_chunk(record_key, 0, text.trim()));
    }

    chunks
}

fn make_chunk(record_key: &str, index: i64, text: &str) -> Chunk {
    Chunk {
        record_key: record_key.to_string(),
        chunk_index: index,
        text: text.to_string(),
    }
}

/// Largest char boundary at or below `index`.
fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_text_single_chunk() {
        let chunks = chunk_text("Economy.txt", "Hello, world!", 2800);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
    }

    #[test]
    fn empty_text_still_yields_a_chunk() {
        let chunks = chunk_text("k.txt", "", 2800);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
    }

    #[test]
    fn paragraphs_under_limit_stay_together() {
        let text = "First paragraph.\n\nSecond paragraph.\n\nThird paragraph.";
        let chunks = chunk_text("k.txt", text, 2800);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.contains("First paragraph."));
        assert!(chunks[0].text.contains("Third paragraph."));
    }

    #[test]
    fn indices_contiguous_when_split() {
        let text = (0..50)
            .map(|i| format!("Paragraph number {}.", i))
            .collect::<Vec<_>>()
            .join("\n\n");
        let chunks = chunk_text("k.txt", &text, 40);
        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64, "Index mismatch at position {}", i);
        }
    }

    #[test]
    fn oversized_paragraph_hard_splits() {
        let text = "word ".repeat(100);
        let chunks = chunk_text("k.txt", &text, 40);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.text.len() <= 40);
        }
    }

    #[test]
    fn deterministic() {
        let text = "Alpha\n\nBeta\n\nGamma\n\nDelta";
        let c1 = chunk_text("k.txt", text, 14);
        let c2 = chunk_text("k.txt", text, 14);
        assert_eq!(c1, c2);
    }

    #[test]
    fn multibyte_text_splits_on_char_boundary() {
        let text = "é".repeat(100);
        let chunks = chunk_text("k.txt", &text, 7);
        assert!(chunks.len() > 1);
    }
}
