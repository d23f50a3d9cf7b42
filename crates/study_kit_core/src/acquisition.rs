//! crates/study_kit_core/src/acquisition.rs
//!
//! Input acquisition: turns pasted text, a video URL or a PDF into study material.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

use crate::{
    domain::{SourceKind, StudyMaterial},
    error::{StudyError, StudyResult},
    ports::{DocumentTextExtractor, PortError, TranscriptEntry, TranscriptService},
};

/// An 11-character id following `v=` or a path separator.
static VIDEO_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:v=|/)([0-9A-Za-z_-]{11})").expect("video id pattern is valid"));

/// Pasted text is used verbatim.
pub fn acquire_text(payload: &str) -> StudyResult<StudyMaterial> {
    if payload.trim().is_empty() {
        return Err(StudyError::EmptyInput);
    }
    Ok(StudyMaterial::new(SourceKind::Text, payload))
}

pub fn extract_video_id(url: &str) -> Option<&str> {
    VIDEO_ID_PATTERN
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Concatenates caption texts in order with a single space, ignoring timing gaps.
pub fn join_transcript(entries: &[TranscriptEntry]) -> String {
    entries
        .iter()
        .map(|entry| entry.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

pub async fn acquire_video(
    transcripts: &dyn TranscriptService,
    url: &str,
    languages: &[String],
) -> StudyResult<StudyMaterial> {
    let video_id =
        extract_video_id(url).ok_or_else(|| StudyError::UnparseableUrl(url.to_string()))?;
    info!("Fetching transcript for video {}", video_id);

    let entries = transcripts
        .fetch_transcript(video_id, languages)
        .await
        .map_err(|e| {
            warn!("Transcript fetch failed for video {}: {}", video_id, e);
            StudyError::NoTranscript(e.to_string())
        })?;

    let text = join_transcript(&entries);
    if text.trim().is_empty() {
        return Err(StudyError::NoTranscript(format!(
            "the transcript for {} is empty",
            video_id
        )));
    }

    info!(
        "Transcript loaded for video {}: {} entries, {} chars",
        video_id,
        entries.len(),
        text.chars().count()
    );
    Ok(StudyMaterial::new(SourceKind::Video, text))
}

/// Joins page texts in page order; pages that yielded nothing are skipped.
pub fn join_pages(pages: Vec<Option<String>>) -> String {
    pages
        .into_iter()
        .flatten()
        .filter(|page| !page.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

pub async fn acquire_document(
    extractor: &dyn DocumentTextExtractor,
    document: &[u8],
) -> StudyResult<StudyMaterial> {
    let pages = extractor
        .extract_pages(document)
        .await
        .map_err(|e| match e {
            PortError::InvalidInput(reason) => StudyError::UnreadableDocument(reason),
            other => StudyError::UnreadableDocument(other.to_string()),
        })?;

    let page_count = pages.len();
    let text = join_pages(pages);
    if text.trim().is_empty() {
        return Err(StudyError::NoExtractableText);
    }

    info!(
        "Extracted {} chars from a {}-page document",
        text.chars().count(),
        page_count
    );
    Ok(StudyMaterial::new(SourceKind::Document, text))
}
