/// Represents a text chunk with metadata
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    /// The actual text content of this chunk
    pub text: String,
    /// Estimated token count for this chunk
    pub token_count: usize,
    /// Identifier of the document this chunk belongs to
    pub document_id: String,
    /// Starting position of this chunk in the original document
    pub start_position: usize,
    /// Position of this chunk within its document
    pub chunk_index: usize,
}

/// Split text into chunks of approximately `target_tokens` tokens.
///
/// Paragraphs are packed together until the target is reached; a paragraph
/// larger than the target is split on sentence boundaries. Consecutive chunks
/// share roughly a tenth of the target as overlap.
pub fn split_into_chunks(text: &str, document_id: &str, target_tokens: usize) -> Vec<TextChunk> {
    let target_tokens = target_tokens.max(1);
    let mut chunks = split_recursive(text, document_id, target_tokens);

    for (index, chunk) in chunks.iter_mut().enumerate() {
        chunk.chunk_index = index;
    }

    chunks
}

fn split_recursive(text: &str, document_id: &str, target_tokens: usize) -> Vec<TextChunk> {
    let overlap_tokens = target_tokens / 10;

    let make_chunk = |chunk_text: String, token_count: usize| TextChunk {
        start_position: text.find(&chunk_text).unwrap_or(0),
        text: chunk_text,
        token_count,
        document_id: document_id.to_string(),
        chunk_index: 0,
    };

    // First, split by paragraphs
    let paragraphs = text
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty());

    let mut chunks = Vec::new();
    let mut current_chunk = String::new();
    let mut current_token_count = 0;

    for paragraph in paragraphs {
        let paragraph_token_count = estimate_token_count(paragraph);

        // If a single paragraph is too large, split it into sentences
        if paragraph_token_count > target_tokens {
            let sentences = paragraph
                .split(|c| ".!?\n".contains(c))
                .map(str::trim)
                .filter(|s| !s.is_empty());

            let mut sentence_buffer = String::new();
            let mut buffer_token_count = 0;

            for sentence in sentences {
                let sentence_token_count = estimate_token_count(sentence);

                if buffer_token_count + sentence_token_count > target_tokens
                    && !sentence_buffer.is_empty()
                {
                    chunks.push(make_chunk(sentence_buffer.clone(), buffer_token_count));

                    sentence_buffer = overlap_tail(&sentence_buffer, overlap_tokens);
                    buffer_token_count = estimate_token_count(&sentence_buffer);
                }

                if !sentence_buffer.is_empty() {
                    sentence_buffer.push(' ');
                }
                sentence_buffer.push_str(sentence);
                sentence_buffer.push('.');
                buffer_token_count += sentence_token_count + 1; // +1 for the period
            }

            if !sentence_buffer.is_empty() {
                chunks.push(make_chunk(sentence_buffer, buffer_token_count));
            }
        } else {
            if current_token_count + paragraph_token_count > target_tokens
                && !current_chunk.is_empty()
            {
                chunks.push(make_chunk(current_chunk.clone(), current_token_count));

                current_chunk = overlap_tail(&current_chunk, overlap_tokens);
                current_token_count = estimate_token_count(&current_chunk);
            }

            if !current_chunk.is_empty() {
                current_chunk.push_str("\n\n");
            }
            current_chunk.push_str(paragraph);
            current_token_count += paragraph_token_count;
        }
    }

    if !current_chunk.trim().is_empty() {
        chunks.push(make_chunk(current_chunk, current_token_count));
    }

    // Ensure no chunk is too large
    let mut final_chunks = Vec::new();
    for chunk in chunks {
        if chunk.token_count > target_tokens * 3 && chunk.text != text {
            final_chunks.extend(split_recursive(&chunk.text, document_id, target_tokens));
        } else {
            final_chunks.push(chunk);
        }
    }

    final_chunks
}

/// Last `overlap_tokens` worth of text (approximated as 4 chars per token)
fn overlap_tail(text: &str, overlap_tokens: usize) -> String {
    let keep_chars = overlap_tokens * 4;
    let start = text
        .char_indices()
        .nth(text.chars().count().saturating_sub(keep_chars))
        .map(|(i, _)| i)
        .unwrap_or(0);

    text[start..].trim().to_string()
}

/// Calculate approximate token count for a text
/// This is a very simple estimation - words plus punctuation
pub fn estimate_token_count(text: &str) -> usize {
    let words = text.split_whitespace().count();
    let punctuation = text.chars().filter(|c| c.is_ascii_punctuation()).count();
    words + punctuation
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_document_is_a_single_chunk() {
        let text = "First paragraph.\n\nSecond paragraph.";
        let chunks = split_into_chunks(text, "notes.txt", 1024);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "First paragraph.\n\nSecond paragraph.");
        assert_eq!(chunks[0].document_id, "notes.txt");
        assert_eq!(chunks[0].start_position, 0);
        assert_eq!(chunks[0].chunk_index, 0);
    }

    #[test]
    fn whitespace_only_document_has_no_chunks() {
        assert!(split_into_chunks("  \n\n \n\n", "blank.txt", 1024).is_empty());
    }

    #[test]
    fn paragraphs_are_packed_up_to_the_target() {
        let paragraph = "word ".repeat(40);
        let text = vec![paragraph.trim(); 5].join("\n\n");

        let chunks = split_into_chunks(&text, "doc", 100);

        assert!(chunks.len() > 1);
        for (index, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, index);
            assert!(chunk.token_count <= 100 + 40);
        }
    }

    #[test]
    fn oversized_paragraph_is_split_by_sentences() {
        let text = (0..60)
            .map(|i| format!("Sentence number {} talks about things", i))
            .collect::<Vec<_>>()
            .join(". ");

        let chunks = split_into_chunks(&text, "long.txt", 50);

        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.text.ends_with('.')));
    }

    #[test]
    fn estimate_counts_words_and_punctuation() {
        assert_eq!(estimate_token_count("Hello, world!"), 4);
    }
}
