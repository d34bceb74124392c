use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ChunkError {
    #[error("chunk size must be positive")]
    InvalidSize,

    #[error("chunk overlap {overlap} must be smaller than chunk size {size}")]
    InvalidOverlap { size: usize, overlap: usize },
}

/// A contiguous slice of one source document's normalized text.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub source_id: String,
    pub sequence_index: usize,
    pub text: String,
}

/// Collapses every whitespace run (newlines included) to a single space and
/// trims both ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Splits text into fixed-size overlapping windows measured in `char`s.
///
/// Each window is `size` characters long except possibly the last; the next
/// window starts `size - overlap` characters after the previous one.
pub fn chunk(text: &str, size: usize, overlap: usize) -> Result<Vec<String>, ChunkError> {
    if size == 0 {
        return Err(ChunkError::InvalidSize);
    }
    if overlap >= size {
        return Err(ChunkError::InvalidOverlap { size, overlap });
    }

    let normalized = normalize_whitespace(text);
    let chars: Vec<char> = normalized.chars().collect();
    if chars.is_empty() {
        return Ok(Vec::new());
    }

    let step = size - overlap;
    let mut chunks = Vec::with_capacity(chars.len() / step + 1);
    let mut start = 0;

    loop {
        let end = (start + size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }

    Ok(chunks)
}

/// Chunks one document and tags every piece with its source and position.
pub fn chunk_document(
    source_id: &str,
    text: &str,
    size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>, ChunkError> {
    Ok(chunk(text, size, overlap)?
        .into_iter()
        .enumerate()
        .map(|(sequence_index, text)| Chunk {
            source_id: source_id.to_string(),
            sequence_index,
            text,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconstruct(chunks: &[String], overlap: usize) -> String {
        let mut out = String::new();
        for (i, c) in chunks.iter().enumerate() {
            if i == 0 {
                out.push_str(c);
            } else {
                out.extend(c.chars().skip(overlap));
            }
        }
        out
    }

    #[test]
    fn test_devotion_sentence_chunks() {
        let chunks = chunk("Devotion is the path of love.", 20, 5).unwrap();
        assert_eq!(chunks, vec!["Devotion is the path", " path of love."]);
        assert_eq!(chunks[0].chars().count(), 20);
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = chunk("  Faith and\n\n patience  ", 500, 50).unwrap();
        assert_eq!(chunks, vec!["Faith and patience"]);
    }

    #[test]
    fn test_exact_fit_single_chunk() {
        let chunks = chunk("abcde", 5, 2).unwrap();
        assert_eq!(chunks, vec!["abcde"]);
    }

    #[test]
    fn test_empty_and_whitespace() {
        assert!(chunk("", 10, 2).unwrap().is_empty());
        assert!(chunk(" \n\t \n", 10, 2).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_parameters() {
        assert_eq!(chunk("abc", 0, 0), Err(ChunkError::InvalidSize));
        assert_eq!(
            chunk("abc", 5, 5),
            Err(ChunkError::InvalidOverlap { size: 5, overlap: 5 })
        );
    }

    #[test]
    fn test_whitespace_collapsed() {
        let chunks = chunk("line one\nline\t\ttwo\r\n\r\nthree", 100, 0).unwrap();
        assert_eq!(chunks, vec!["line one line two three"]);
    }

    #[test]
    fn test_length_bound_and_coverage() {
        let text = "Sabka malik ek. Shraddha and saburi, faith and patience, are the two coins \
                    asked of every devotee.\n\nService to others is worship. "
            .repeat(7);
        let normalized = normalize_whitespace(&text);

        for (size, overlap) in [(1, 0), (7, 3), (20, 5), (64, 0), (100, 99), (500, 50)] {
            let chunks = chunk(&text, size, overlap).unwrap();
            assert!(!chunks.is_empty());

            let (last, rest) = chunks.split_last().unwrap();
            for c in rest {
                assert_eq!(c.chars().count(), size, "non-final chunk must be full");
            }
            assert!(!last.is_empty() && last.chars().count() <= size);

            assert_eq!(reconstruct(&chunks, overlap), normalized, "size={size} overlap={overlap}");
        }
    }

    #[test]
    fn test_multibyte_text_split_on_chars() {
        let text = "श्रद्धा सबुरी ".repeat(10);
        let chunks = chunk(&text, 9, 3).unwrap();
        for c in &chunks {
            assert!(c.chars().count() <= 9);
        }
        assert_eq!(reconstruct(&chunks, 3), normalize_whitespace(&text));
    }

    #[test]
    fn test_chunk_document_tags() {
        let chunks = chunk_document("gita.txt", "abcdefghij", 4, 1).unwrap();
        assert_eq!(chunks.len(), 3);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.source_id, "gita.txt");
            assert_eq!(c.sequence_index, i);
        }
        assert_eq!(chunks[0].text, "abcd");
        assert_eq!(chunks[1].text, "defg");
        assert_eq!(chunks[2].text, "ghij");
    }
}
