//! Turns the different "found text" shapes into one [`ExtractionResult`].
//!
//! Each provider has its own entry point, but all of them end in [`finalize`],
//! which owns the trimming and sentinel rules.

use super::types::{ExtractionResult, NO_TEXT_FOUND};

/// Block classification for document-style responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Line,
    Other,
}

#[derive(Debug, Clone, Copy)]
pub struct DocumentBlock<'a> {
    pub kind: BlockKind,
    pub text: Option<&'a str>,
}

pub fn finalize(text: Option<String>) -> ExtractionResult {
    let text = text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(NO_TEXT_FOUND)
        .to_string();

    ExtractionResult { text }
}

/// Form-upload style: the first parsed result carries the page text.
pub fn from_parsed_results<I>(parsed_texts: I) -> ExtractionResult
where
    I: IntoIterator<Item = Option<String>>,
{
    finalize(parsed_texts.into_iter().next().flatten())
}

/// Vision style: the first annotation holds the text of the whole image,
/// later entries are individual words.
pub fn from_text_annotations<I>(descriptions: I) -> ExtractionResult
where
    I: IntoIterator<Item = Option<String>>,
{
    finalize(descriptions.into_iter().next().flatten())
}

/// Document style: only line blocks count, joined in provider order.
pub fn from_document_blocks<'a, I>(blocks: I) -> ExtractionResult
where
    I: IntoIterator<Item = DocumentBlock<'a>>,
{
    let lines: Vec<&str> = blocks
        .into_iter()
        .filter(|b| b.kind == BlockKind::Line)
        .filter_map(|b| b.text)
        .collect();

    if lines.is_empty() {
        return finalize(None);
    }

    finalize(Some(lines.join("\n")))
}
