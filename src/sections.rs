//! Heuristic section splitting for content merging.
//!
//! Source text is cut into coarse sections at top-level declaration
//! boundaries. This is a line-prefix scanner, not a parser; two sections are
//! considered the same only when their text is byte-identical, which biases
//! merges toward over-preserving content.

use std::collections::HashSet;

use crate::hasher::ContentHasher;

/// Declaration keywords that open a new section
const DECLARATION_KEYWORDS: &[&str] = &["import", "const", "export", "function", "interface", "type"];

/// A contiguous slice of a file's text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub text: String,
}

impl Section {
    pub fn new(text: String) -> Self {
        Self { text }
    }

    /// Digest of the section's exact text
    pub fn content_hash(&self) -> String {
        ContentHasher::new().hash_bytes(self.text.as_bytes())
    }
}

/// Splits source text into ordered declaration-bounded sections
#[derive(Debug, Clone, Copy, Default)]
pub struct SectionSplitter;

impl SectionSplitter {
    pub fn new() -> Self {
        Self
    }

    /// Split text into an ordered sequence of sections.
    ///
    /// A new section starts whenever a trimmed line begins with a
    /// declaration keyword; all other lines accumulate into the current
    /// section. Text with no recognized keyword yields exactly one section.
    pub fn split(&self, text: &str) -> Vec<Section> {
        let mut sections = Vec::new();
        let mut current: Vec<&str> = Vec::new();

        for line in text.lines() {
            if Self::starts_declaration(line) && !current.is_empty() {
                sections.push(Section::new(current.join("\n")));
                current.clear();
            }
            current.push(line);
        }

        if !current.is_empty() {
            sections.push(Section::new(current.join("\n")));
        }

        sections
    }

    /// Sections of `candidate` whose exact text does not already appear in
    /// `existing`, in candidate order.
    pub fn unique_sections(&self, candidate: &str, existing: &str) -> Vec<Section> {
        let known: HashSet<String> = self
            .split(existing)
            .iter()
            .map(Section::content_hash)
            .collect();

        self.split(candidate)
            .into_iter()
            .filter(|section| !known.contains(&section.content_hash()))
            .collect()
    }

    fn starts_declaration(line: &str) -> bool {
        let trimmed = line.trim_start();
        DECLARATION_KEYWORDS.iter().any(|keyword| {
            trimmed.strip_prefix(keyword).is_some_and(|rest| {
                rest.chars()
                    .next()
                    .is_some_and(|c| !c.is_alphanumeric() && c != '_')
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_split_at_declarations() {
        let splitter = SectionSplitter::new();
        let text = "import a from 'a';\nconst x = 1;\nfunction f() {\n  return x;\n}";

        let sections = splitter.split(text);
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[0].text, "import a from 'a';");
        assert_eq!(sections[1].text, "const x = 1;");
        assert_eq!(sections[2].text, "function f() {\n  return x;\n}");
    }

    #[test]
    fn test_no_keywords_yields_single_section() {
        let splitter = SectionSplitter::new();
        let text = "plain line one\nplain line two";

        let sections = splitter.split(text);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].text, text);
    }

    #[test]
    fn test_keyword_must_be_a_whole_token() {
        let splitter = SectionSplitter::new();
        // "constant" and "importance" must not open new sections
        let text = "const a = 1;\nconstant_value = 2\nimportance = 3";

        let sections = splitter.split(text);
        assert_eq!(sections.len(), 1);
    }

    #[test]
    fn test_self_comparison_yields_no_unique_sections() {
        let splitter = SectionSplitter::new();
        let text = "export const X = 1;\nexport const Y = 2;\nfunction f() {}";

        assert!(splitter.unique_sections(text, text).is_empty());
    }

    #[test]
    fn test_unique_sections_are_detected_in_order() {
        let splitter = SectionSplitter::new();
        let existing = "export const X = 1;";
        let candidate = "export const X = 1;\nexport const Z = 3;\nexport const W = 4;";

        let unique = splitter.unique_sections(candidate, existing);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].text, "export const Z = 3;");
        assert_eq!(unique[1].text, "export const W = 4;");
    }

    #[test]
    fn test_near_identical_sections_stay_unique() {
        let splitter = SectionSplitter::new();
        // One renamed identifier is enough to count as unique content
        let unique = splitter.unique_sections("const a = 1;", "const b = 1;");
        assert_eq!(unique.len(), 1);
    }
}
