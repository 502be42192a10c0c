//! Line-window chunking

use serde::{Deserialize, Serialize};

/// A contiguous window of lines from one source file
///
/// Line bounds are 0-based and half-open: `start_line..end_line`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeChunk {
    /// Path relative to the project root
    pub file_path: String,
    /// Lines joined with `\n`
    pub content: String,
    pub start_line: usize,
    pub end_line: usize,
}

impl CodeChunk {
    /// Number of lines covered by this chunk
    pub fn line_count(&self) -> usize {
        self.end_line - self.start_line
    }
}

/// Split file content into consecutive windows of `chunk_size` lines
///
/// Lines are split on `\n` exactly, so joining the chunk contents with `\n`
/// reproduces `content`. Only the final chunk may be shorter than `chunk_size`.
pub fn chunk_lines(file_path: &str, content: &str, chunk_size: usize) -> Vec<CodeChunk> {
    let chunk_size = chunk_size.max(1);
    let lines: Vec<&str> = content.split('\n').collect();

    lines
        .chunks(chunk_size)
        .enumerate()
        .map(|(i, window)| {
            let start_line = i * chunk_size;
            CodeChunk {
                file_path: file_path.to_string(),
                content: window.join("\n"),
                start_line,
                end_line: start_line + window.len(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn numbered_lines(n: usize) -> String {
        (0..n).map(|i| format!("line {}", i)).collect::<Vec<_>>().join("\n")
    }

    #[test]
    fn test_exact_multiple() {
        let chunks = chunk_lines("a.rs", &numbered_lines(100), 50);
        assert_eq!(chunks.len(), 2);
        assert_eq!((chunks[0].start_line, chunks[0].end_line), (0, 50));
        assert_eq!((chunks[1].start_line, chunks[1].end_line), (50, 100));
    }

    #[test]
    fn test_short_last_chunk() {
        let chunks = chunk_lines("a.rs", &numbered_lines(120), 50);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].line_count(), 20);
        assert!(chunks[2].content.starts_with("line 100"));
    }

    #[test]
    fn test_trailing_newline_is_an_empty_line() {
        let chunks = chunk_lines("a.rs", "one\ntwo\n", 50);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].end_line, 3);
        assert_eq!(chunks[0].content, "one\ntwo\n");
    }

    #[test]
    fn test_empty_file_yields_one_empty_chunk() {
        let chunks = chunk_lines("empty.ts", "", 50);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "");
        assert_eq!((chunks[0].start_line, chunks[0].end_line), (0, 1));
    }

    #[test]
    fn test_zero_chunk_size_treated_as_one() {
        let chunks = chunk_lines("a.rs", "a\nb", 0);
        assert_eq!(chunks.len(), 2);
    }

    proptest! {
        #[test]
        fn prop_chunks_reconstruct_file(lines in prop::collection::vec("[a-z ]{0,12}", 1..300), size in 1usize..80) {
            let content = lines.join("\n");
            let chunks = chunk_lines("f.rs", &content, size);

            prop_assert_eq!(chunks.len(), lines.len().div_ceil(size));

            let mut expected_start = 0;
            for (i, chunk) in chunks.iter().enumerate() {
                prop_assert_eq!(chunk.start_line, expected_start);
                if i + 1 < chunks.len() {
                    prop_assert_eq!(chunk.line_count(), size);
                } else {
                    prop_assert!(chunk.line_count() <= size);
                }
                expected_start = chunk.end_line;
            }
            prop_assert_eq!(expected_start, lines.len());

            let rebuilt = chunks.iter().map(|c| c.content.as_str()).collect::<Vec<_>>().join("\n");
            prop_assert_eq!(rebuilt, content);
        }
    }
}
