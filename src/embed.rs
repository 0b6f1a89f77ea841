use percent_encoding::percent_decode_str;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VideoProvider {
    Youtube,
    Vimeo,
    Loom,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Embed {
    pub provider: VideoProvider,
    pub video_id: String,
    pub url: String,
}

fn youtube_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^.*(youtu\.be/|v/|u/\w/|embed/|watch\?v=|&v=)([^#&?]*).*")
            .expect("youtube regex")
    })
}

fn vimeo_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)vimeo\.com/(?:channels/(?:\w+/)?|groups/[^/]*/videos/|album/\d+/video/|video/|)(\d+)",
        )
        .expect("vimeo regex")
    })
}

fn loom_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)loom\.com/(?:share|embed)/([a-zA-Z0-9]+)").expect("loom regex")
    })
}

pub fn youtube_id(url: &str) -> Option<String> {
    let caps = youtube_re().captures(url)?;
    let id = caps.get(2)?.as_str();
    (id.len() == 11).then(|| id.to_string())
}

pub fn vimeo_id(url: &str) -> Option<String> {
    vimeo_re().captures(url).map(|c| c[1].to_string())
}

pub fn loom_id(url: &str) -> Option<String> {
    loom_re().captures(url).map(|c| c[1].to_string())
}

/// Rewrites a lesson video link into the provider's iframe URL, starting at
/// `start` seconds where the provider supports it. Anything unrecognised
/// gives `None`.
pub fn embed_for(video_url: &str, start: Option<f64>) -> Option<Embed> {
    let url = percent_decode_str(video_url.trim()).decode_utf8_lossy();
    let lower = url.to_lowercase();
    let start = start
        .filter(|s| s.is_finite() && *s >= 1.0)
        .map(|s| s.floor() as u64);

    if lower.contains("youtube.com") || lower.contains("youtu.be") {
        let id = youtube_id(&url)?;
        let mut embed = format!("https://www.youtube.com/embed/{}", id);
        if let Some(s) = start {
            embed.push_str(&format!("?start={}", s));
        }
        return Some(Embed { provider: VideoProvider::Youtube, video_id: id, url: embed });
    }
    if lower.contains("vimeo.com") {
        let id = vimeo_id(&url)?;
        let mut embed = format!("https://player.vimeo.com/video/{}", id);
        if let Some(s) = start {
            embed.push_str(&format!("#t={}s", s));
        }
        return Some(Embed { provider: VideoProvider::Vimeo, video_id: id, url: embed });
    }
    if lower.contains("loom.com") {
        let id = loom_id(&url)?;
        let embed = format!("https://www.loom.com/embed/{}", id);
        return Some(Embed { provider: VideoProvider::Loom, video_id: id, url: embed });
    }
    None
}
