//! Tag extraction from entry names.
//!
//! Every non-empty `[...]` payload in a name is a tag. With
//! `first_dir_as_tag` enabled, the first path segment of a nested name is
//! prepended as an extra tag. Names are compared exactly.

use std::collections::HashSet;
use std::sync::LazyLock;

use crate::config::LibraryConfig;

static TAG_PATTERN: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"\[(.*?)\]").expect("tag pattern is valid"));

/// Derives tag names from entry names
#[derive(Debug, Clone, Copy, Default)]
pub struct TagParser {
    first_dir_as_tag: bool,
}

impl TagParser {
    pub fn new(first_dir_as_tag: bool) -> Self {
        Self { first_dir_as_tag }
    }

    pub fn from_config(config: &LibraryConfig) -> Self {
        Self::new(config.first_dir_as_tag)
    }

    /// Deduplicated tags in first-seen order
    pub fn parse(&self, name: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut tags = Vec::new();

        if self.first_dir_as_tag {
            if let Some(dir) = first_segment(name) {
                seen.insert(dir.to_string());
                tags.push(dir.to_string());
            }
        }

        for captures in TAG_PATTERN.captures_iter(name) {
            let Some(payload) = captures.get(1).map(|m| m.as_str()) else {
                continue;
            };
            if payload.is_empty() {
                continue;
            }
            if seen.insert(payload.to_string()) {
                tags.push(payload.to_string());
            }
        }

        tags
    }
}

/// First path segment of a nested name
fn first_segment(name: &str) -> Option<&str> {
    let (dir, _) = name.split_once(|c: char| c == '/' || std::path::is_separator(c))?;
    if dir.is_empty() {
        None
    } else {
        Some(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_tag() {
        let parser = TagParser::new(false);
        assert_eq!(parser.parse("[Test]Some weird name"), vec!["Test"]);
    }

    #[test]
    fn test_no_tag() {
        assert!(TagParser::new(false).parse("Hello World").is_empty());
    }

    #[test]
    fn test_multiple_tags() {
        let parser = TagParser::new(false);
        assert_eq!(
            parser.parse("[Test]Some weird name [Download]"),
            vec!["Test", "Download"]
        );
    }

    #[test]
    fn test_duplicates_keep_first_position() {
        let parser = TagParser::new(false);
        assert_eq!(
            parser.parse("[Test]something[Download]/[Test]Some weird name [Download]"),
            vec!["Test", "Download"]
        );
    }

    #[test]
    fn test_empty_brackets_are_skipped() {
        let parser = TagParser::new(false);
        assert!(parser.parse("[]Some weird name").is_empty());
        assert_eq!(parser.parse("[]Some weird name[Test]"), vec!["Test"]);
    }

    #[test]
    fn test_no_case_normalization() {
        let parser = TagParser::new(false);
        assert_eq!(parser.parse("[test][Test]"), vec!["test", "Test"]);
    }

    #[test]
    fn test_first_dir_disabled_ignores_directories() {
        let parser = TagParser::new(false);
        assert_eq!(parser.parse("dir1/[Test]Some weird name"), vec!["Test"]);
    }

    #[test]
    fn test_first_dir_without_directory() {
        let parser = TagParser::new(true);
        assert_eq!(parser.parse("[Test]Some weird name"), vec!["Test"]);
    }

    #[test]
    fn test_first_dir_one_level() {
        let parser = TagParser::new(true);
        assert_eq!(
            parser.parse("dir1/[Test]Some weird name"),
            vec!["dir1", "Test"]
        );
    }

    #[test]
    fn test_first_dir_two_levels() {
        let parser = TagParser::new(true);
        assert_eq!(
            parser.parse("dir1/dir2/[Test]Some weird name"),
            vec!["dir1", "Test"]
        );
    }
}
