//! YouTube link handling.
//!
//! Video ids are parsed from three URL shapes: `youtube.com/watch?v=`,
//! `youtu.be/` and `youtube.com/embed/`. Transcript, title and duration
//! lookups are not supported yet; [`fetch_video`] returns a transcript
//! of [`SourceText::Unsupported`] built around the id.

use std::sync::LazyLock;

use regex::Regex;

use crate::extract::SourceText;

static RE_VIDEO_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:youtube\.com/watch\?v=|youtu\.be/|youtube\.com/embed/)([^&\n?#]+)")
        .expect("video id regex")
});

/// Transcript details for one video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoTranscript {
    pub video_id: String,
    pub transcript: SourceText,
    pub title: String,
    pub duration: String,
}

/// First video id found in `url`, if any of the accepted shapes match.
pub fn extract_video_id(url: &str) -> Option<String> {
    RE_VIDEO_ID
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Resolves a YouTube link. Returns `None` when no video id can be parsed.
pub fn fetch_video(url: &str) -> Option<VideoTranscript> {
    let video_id = extract_video_id(url)?;
    Some(VideoTranscript {
        transcript: SourceText::Unsupported(format!(
            "YouTube transcript extraction not implemented yet. Video ID: {}",
            video_id
        )),
        title: "YouTube Video".to_string(),
        duration: "Unknown".to_string(),
        video_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_url() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42s").as_deref(),
            Some("dQw4w9WgXcQ")
        );
    }

    #[test]
    fn short_url() {
        assert_eq!(
            extract_video_id("https://youtu.be/dQw4w9WgXcQ?si=abc").as_deref(),
            Some("dQw4w9WgXcQ")
        );
    }

    #[test]
    fn embed_url() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/embed/abc123#frag").as_deref(),
            Some("abc123")
        );
    }

    #[test]
    fn unrelated_urls_have_no_id() {
        assert_eq!(extract_video_id("https://vimeo.com/12345"), None);
        assert_eq!(extract_video_id("https://www.youtube.com/channel/xyz"), None);
        assert!(fetch_video("not a url").is_none());
    }

    #[test]
    fn placeholder_embeds_video_id() {
        let t = fetch_video("https://youtu.be/abc123").unwrap();
        assert_eq!(t.video_id, "abc123");
        assert!(!t.transcript.is_supported());
        assert_eq!(
            t.transcript.into_text(),
            "YouTube transcript extraction not implemented yet. Video ID: abc123"
        );
        assert_eq!(t.title, "YouTube Video");
        assert_eq!(t.duration, "Unknown");
    }
}
