//! The document tree the orchestrator walks.
//!
//! Format converters (EPUB, FB2, Markdown) live outside this crate; they hand
//! over a [`Document`], usually as JSON.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Bibliographic metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    pub title: String,
    pub authors: Vec<String>,
    pub description: String,
    pub publisher: String,
    /// Language code of the text, rewritten to the target after translation.
    pub language: String,
    pub isbn: String,
    pub date: String,
}

/// A section: optional title, body text, and nested subsections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Section {
    pub title: String,
    pub content: String,
    pub subsections: Vec<Section>,
}

impl Section {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            subsections: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_subsection(mut self, subsection: Self) -> Self {
        self.subsections.push(subsection);
        self
    }

    fn unit_count(&self) -> u64 {
        u64::from(!self.title.is_empty())
            + u64::from(!self.content.is_empty())
            + self.subsections.iter().map(Self::unit_count).sum::<u64>()
    }

    fn append_text(&self, out: &mut String) {
        if !self.title.is_empty() {
            out.push_str(&self.title);
            out.push('\n');
        }
        out.push_str(&self.content);
        out.push('\n');
        for sub in &self.subsections {
            sub.append_text(out);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Chapter {
    pub title: String,
    pub sections: Vec<Section>,
}

impl Chapter {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            sections: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_section(mut self, section: Section) -> Self {
        self.sections.push(section);
        self
    }
}

/// An owned, strictly hierarchical document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Document {
    pub metadata: Metadata,
    pub chapters: Vec<Chapter>,
}

impl Document {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            metadata: Metadata {
                title: title.into(),
                ..Metadata::default()
            },
            chapters: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_chapter(mut self, chapter: Chapter) -> Self {
        self.chapters.push(chapter);
        self
    }

    /// Reads a document from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidDocument(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::InvalidDocument(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// `true` when there is neither a title nor any chapter.
    pub fn is_empty(&self) -> bool {
        self.metadata.title.trim().is_empty() && self.chapters.is_empty()
    }

    pub fn chapter_count(&self) -> usize {
        self.chapters.len()
    }

    /// Number of non-empty texts a full translation visits, metadata included.
    pub fn unit_count(&self) -> u64 {
        let metadata = u64::from(!self.metadata.title.is_empty())
            + u64::from(!self.metadata.description.is_empty());
        let tree: u64 = self
            .chapters
            .iter()
            .map(|c| {
                u64::from(!c.title.is_empty()) + c.sections.iter().map(Section::unit_count).sum::<u64>()
            })
            .sum();
        metadata + tree
    }

    /// Title, chapter titles and section text in reading order.
    pub fn extract_text(&self) -> String {
        let mut text = format!("{}\n\n", self.metadata.title);
        for chapter in &self.chapters {
            text.push_str(&chapter.title);
            text.push('\n');
            for section in &chapter.sections {
                section.append_text(&mut text);
            }
            text.push('\n');
        }
        text
    }

    /// Rough whitespace-delimited word count.
    pub fn word_count(&self) -> usize {
        self.extract_text().split_whitespace().count()
    }
}

/// First `max_chars` characters of `text`, never splitting a code point.
pub fn sample(text: &str, max_chars: usize) -> &str {
    text.char_indices()
        .nth(max_chars)
        .map_or(text, |(idx, _)| &text[..idx])
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn book() -> Document {
        Document::new("Test Book")
            .with_chapter(
                Chapter::new("Chapter 1")
                    .with_section(
                        Section::new("Section 1.1", "This is the first section content.")
                            .with_subsection(Section::new("Subsection 1.1.1", "This is a subsection.")),
                    )
                    .with_section(Section::new("Section 1.2", "This is the second section content.")),
            )
            .with_chapter(Chapter::new("Chapter 2").with_section(Section::new("", "Untitled body.")))
    }

    #[test]
    fn test_extract_text_reading_order() {
        let text = book().extract_text();
        let order = [
            "Test Book",
            "Chapter 1",
            "Section 1.1",
            "first section",
            "Subsection 1.1.1",
            "Section 1.2",
            "Chapter 2",
            "Untitled body.",
        ];
        let mut last = 0;
        for needle in order {
            let pos = text.find(needle).unwrap();
            assert!(pos >= last, "{needle} out of order");
            last = pos;
        }
    }

    #[test]
    fn test_unit_count_skips_empty_texts() {
        // title + 2 chapter titles + 3 titled sections with content (6) + 1 untitled body
        assert_eq!(book().unit_count(), 10);

        let mut with_description = book();
        with_description.metadata.description = "About".to_string();
        assert_eq!(with_description.unit_count(), 11);
    }

    #[test]
    fn test_empty_document() {
        assert!(Document::default().is_empty());
        assert!(Document::new("   ").is_empty());
        assert!(!Document::new("Title").is_empty());
        assert!(!Document::default().with_chapter(Chapter::new("")).is_empty());
    }

    #[test]
    fn test_sample_respects_char_boundaries() {
        assert_eq!(sample("Ђорђе", 2), "Ђо");
        assert_eq!(sample("short", 100), "short");
        assert_eq!(sample("", 5), "");
    }

    #[test]
    fn test_json_with_missing_fields() {
        let doc = Document::from_json(r#"{"metadata":{"title":"T"},"chapters":[{"title":"C"}]}"#)
            .unwrap();
        assert_eq!(doc.metadata.title, "T");
        assert!(doc.chapters[0].sections.is_empty());
        assert!(Document::from_json("not json").is_err());
    }

    #[test]
    fn test_word_count() {
        assert_eq!(Document::new("Two words").word_count(), 2);
    }
}
