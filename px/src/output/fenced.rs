//! Fenced code block parser
//!
//! Recognises blocks of the form
//!
//! ````text
//! ```lang path/to/file
//! content
//! ```
//! ````
//!
//! The info line must start with a word (the language) followed by the path.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::{OutputError, OutputParser, ParsedFile};

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(\w+)\s*([^\n]+)\n((?s).+?)```").expect("valid fenced block pattern"));

/// Lenient parser for ```` ```lang path ```` blocks
#[derive(Debug, Clone, Copy, Default)]
pub struct FencedBlockParser;

impl OutputParser for FencedBlockParser {
    fn parse(&self, output: &str) -> Result<Vec<ParsedFile>, OutputError> {
        let files: Vec<ParsedFile> = FENCED_BLOCK
            .captures_iter(output)
            .map(|caps| ParsedFile {
                path: caps[2].trim().to_string(),
                content: caps[3].trim().to_string(),
            })
            .collect();

        debug!(count = files.len(), "FencedBlockParser::parse: done");
        if files.is_empty() {
            return Err(OutputError::NoCodeBlocks);
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Vec<ParsedFile>, OutputError> {
        FencedBlockParser.parse(text)
    }

    #[test]
    fn test_single_block() {
        let files = parse("```text a.txt\nhi\n```").unwrap();
        assert_eq!(
            files,
            vec![ParsedFile {
                path: "a.txt".into(),
                content: "hi".into()
            }]
        );
    }

    #[test]
    fn test_multiple_blocks_in_order() {
        let text = "Here you go:\n\n```rust src/main.rs\nfn main() {\n    lib::run();\n}\n```\n\nAnd the library:\n\n```rust src/lib.rs\npub fn run() {}\n```\n";
        let files = parse(text).unwrap();

        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, "src/main.rs");
        assert_eq!(files[0].content, "fn main() {\n    lib::run();\n}");
        assert_eq!(files[1].path, "src/lib.rs");
        assert_eq!(files[1].content, "pub fn run() {}");
    }

    #[test]
    fn test_path_and_content_trimmed() {
        let files = parse("```python   tools/x.py   \n\n  print('x')  \n\n```").unwrap();
        assert_eq!(files[0].path, "tools/x.py");
        assert_eq!(files[0].content, "print('x')");
    }

    #[test]
    fn test_block_without_path_is_ignored() {
        // Language alone on the info line, no path
        let err = parse("```rust\n```").unwrap_err();
        assert_eq!(err, OutputError::NoCodeBlocks);
    }

    #[test]
    fn test_no_blocks() {
        let err = parse("I could not produce any code for that.").unwrap_err();
        assert_eq!(err.to_string(), "No code blocks found in response");
    }

    #[test]
    fn test_empty_content_is_not_a_block() {
        assert!(parse("```txt a.txt\n```").is_err());
    }
}
