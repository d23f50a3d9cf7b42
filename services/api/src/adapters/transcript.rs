//! services/api/src/adapters/transcript.rs
//!
//! This module contains the YouTube caption adapter. It implements the
//! `TranscriptService` port from the `core` crate by resolving the video's caption
//! tracks through the innertube player API and downloading the timed-text XML.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use study_kit_core::ports::{PortError, PortResult, TranscriptEntry, TranscriptService};
use tracing::{debug, info};

const WATCH_URL: &str = "https://www.youtube.com/watch";
const PLAYER_URL: &str = "https://www.youtube.com/youtubei/v1/player";
const INNERTUBE_CLIENT_NAME: &str = "ANDROID";
const INNERTUBE_CLIENT_VERSION: &str = "20.10.38";

static API_KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""INNERTUBE_API_KEY":\s*"([a-zA-Z0-9_-]+)""#).expect("valid api key regex")
});
static TEXT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<text start="([^"]*)"(?: dur="([^"]*)")?[^>]*>(.*?)</text>"#)
        .expect("valid timed text regex")
});
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

//=========================================================================================
// "Impure" Player Response Structs
//=========================================================================================

#[derive(Debug, Deserialize)]
struct PlayerResponse {
    #[serde(rename = "playabilityStatus")]
    playability_status: Option<PlayabilityStatus>,
    captions: Option<Captions>,
}

#[derive(Debug, Deserialize)]
struct PlayabilityStatus {
    status: Option<String>,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Captions {
    #[serde(rename = "playerCaptionsTracklistRenderer")]
    renderer: Option<TracklistRenderer>,
}

#[derive(Debug, Deserialize)]
struct TracklistRenderer {
    #[serde(rename = "captionTracks", default)]
    caption_tracks: Vec<CaptionTrack>,
}

#[derive(Debug, Clone, Deserialize)]
struct CaptionTrack {
    #[serde(rename = "baseUrl")]
    base_url: String,
    #[serde(rename = "languageCode")]
    language_code: String,
    /// `"asr"` marks an automatically generated track.
    kind: Option<String>,
}

impl CaptionTrack {
    fn is_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `TranscriptService` against YouTube.
#[derive(Clone, Default)]
pub struct YoutubeTranscriptAdapter {
    http: Client,
}

impl YoutubeTranscriptAdapter {
    pub fn new(http: Client) -> Self {
        Self { http }
    }

    async fn fetch_api_key(&self, video_id: &str) -> PortResult<String> {
        let page = self
            .http
            .get(WATCH_URL)
            .query(&[("v", video_id)])
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US")
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .text()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        extract_api_key(&page).ok_or_else(|| {
            PortError::Unexpected("Could not find the player API key on the watch page".to_string())
        })
    }

    async fn fetch_player(&self, video_id: &str, api_key: &str) -> PortResult<PlayerResponse> {
        let body = json!({
            "context": {
                "client": {
                    "clientName": INNERTUBE_CLIENT_NAME,
                    "clientVersion": INNERTUBE_CLIENT_VERSION,
                }
            },
            "videoId": video_id,
        });

        self.http
            .post(PLAYER_URL)
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .error_for_status()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .json::<PlayerResponse>()
            .await
            .map_err(|e| PortError::Unexpected(format!("Unreadable player response: {}", e)))
    }
}

fn extract_api_key(page: &str) -> Option<String> {
    API_KEY_RE
        .captures(page)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Fails when the video cannot be played, then returns its caption tracks.
fn caption_tracks(video_id: &str, player: PlayerResponse) -> PortResult<Vec<CaptionTrack>> {
    if let Some(status) = &player.playability_status {
        if status.status.as_deref().is_some_and(|s| s != "OK") {
            let reason = status.reason.clone().unwrap_or_else(|| "unplayable".to_string());
            return Err(PortError::NotFound(format!("Video {} is unavailable: {}", video_id, reason)));
        }
    }

    let tracks = player
        .captions
        .and_then(|c| c.renderer)
        .map(|r| r.caption_tracks)
        .unwrap_or_default();
    if tracks.is_empty() {
        return Err(PortError::NotFound(format!(
            "Transcripts are disabled for video {}",
            video_id
        )));
    }
    Ok(tracks)
}

/// Walks the preferred languages in order; for each one a manually created track
/// wins over a generated one.
fn select_track<'a>(tracks: &'a [CaptionTrack], languages: &[String]) -> Option<&'a CaptionTrack> {
    languages.iter().find_map(|code| {
        let mut matching = tracks.iter().filter(|t| &t.language_code == code);
        let manual = matching.clone().find(|t| !t.is_generated());
        manual.or_else(|| matching.next())
    })
}

/// Parses timed-text XML into entries. Cues whose text is empty are dropped.
fn parse_timed_text(xml: &str) -> Vec<TranscriptEntry> {
    TEXT_RE
        .captures_iter(xml)
        .filter_map(|caps| {
            let start = caps.get(1)?.as_str().parse::<f64>().ok()?;
            let duration = caps
                .get(2)
                .and_then(|m| m.as_str().parse::<f64>().ok())
                .unwrap_or(0.0);
            let raw = caps.get(3).map(|m| m.as_str()).unwrap_or_default();
            // Entities are decoded twice: cue text is escaped inside escaped XML.
            let text = unescape_entities(&unescape_entities(raw));
            let text = TAG_RE.replace_all(&text, "").trim().to_string();
            (!text.is_empty()).then_some(TranscriptEntry {
                text,
                start,
                duration,
            })
        })
        .collect()
}

fn unescape_entities(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        match tail.find(';').filter(|&end| end <= 10) {
            Some(end) => {
                let entity = &tail[1..end];
                match decode_entity(entity) {
                    Some(c) => out.push(c),
                    None => out.push_str(&tail[..=end]),
                }
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let code = if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                entity.strip_prefix('#')?.parse::<u32>().ok()?
            };
            char::from_u32(code)
        }
    }
}

//=========================================================================================
// `TranscriptService` Trait Implementation
//=========================================================================================

#[async_trait]
impl TranscriptService for YoutubeTranscriptAdapter {
    async fn fetch_transcript(
        &self,
        video_id: &str,
        languages: &[String],
    ) -> PortResult<Vec<TranscriptEntry>> {
        let api_key = self.fetch_api_key(video_id).await?;
        let player = self.fetch_player(video_id, &api_key).await?;
        let tracks = caption_tracks(video_id, player)?;

        let track = select_track(&tracks, languages).ok_or_else(|| {
            let available: Vec<&str> = tracks.iter().map(|t| t.language_code.as_str()).collect();
            PortError::NotFound(format!(
                "No transcript in {:?} for video {} (available: {:?})",
                languages, video_id, available
            ))
        })?;
        debug!(
            "Using {} caption track '{}' for video {}",
            if track.is_generated() { "generated" } else { "manual" },
            track.language_code,
            video_id
        );

        let xml = self
            .http
            .get(track.base_url.replace("&fmt=srv3", ""))
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .error_for_status()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .text()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let entries = parse_timed_text(&xml);
        info!("Fetched {} transcript entries for video {}", entries.len(), video_id);
        Ok(entries)
    }
}
