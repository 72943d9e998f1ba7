use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub struct VideoId(pub String);

#[derive(Debug, Clone, derive_more::Display)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, derive_more::Display)]
pub struct ClientVersion(String);

impl ClientVersion {
    pub fn new(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Continuation(pub String);

fn capture_first(pattern: &str, haystack: &str) -> Option<String> {
    Regex::new(pattern)
        .ok()?
        .captures(haystack)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
}

/// Resolve a video ID from a bare 11-character ID or any common YouTube URL
/// form (`watch?v=`, `youtu.be/`, `/live/`, `/embed/`, `/shorts/`).
pub fn parse_video_id(url_or_id: &str) -> Option<VideoId> {
    let input = url_or_id.trim();

    let is_bare_id = Regex::new(r"^[a-zA-Z0-9_-]{11}$")
        .map(|re| re.is_match(input))
        .unwrap_or(false);
    if is_bare_id {
        return Some(VideoId(input.to_string()));
    }

    [
        r"(?:youtube\.com/watch\?(?:.*&)?v=|youtu\.be/)([a-zA-Z0-9_-]{11})",
        r"youtube\.com/live/([a-zA-Z0-9_-]{11})",
        r"youtube\.com/embed/([a-zA-Z0-9_-]{11})",
        r"youtube\.com/shorts/([a-zA-Z0-9_-]{11})",
    ]
    .iter()
    .find_map(|pattern| capture_first(pattern, input))
    .map(VideoId)
}

/// Watch page URL for a video
pub fn watch_url(video_id: &VideoId) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

pub fn extract_video_id(html: &str) -> Option<VideoId> {
    capture_first(
        r#"<link rel="canonical" href="https:\/\/www.youtube.com\/watch\?v=(.+?)">"#,
        html,
    )
    .map(VideoId)
}

pub fn extract_api_key(html: &str) -> Option<ApiKey> {
    capture_first(r#"['"]INNERTUBE_API_KEY['"]:\s*['"](.+?)['"]"#, html).map(ApiKey::new)
}

pub fn extract_replay(html: &str) -> bool {
    Regex::new(r#"['"]isReplay['"]:\s*true"#)
        .map(|re| re.is_match(html))
        .unwrap_or(false)
}

pub fn extract_client_version(html: &str) -> Option<ClientVersion> {
    capture_first(r#"['"]INNERTUBE_CLIENT_VERSION['"]:\s*['"](.+?)['"]"#, html)
        .map(ClientVersion::new)
}

pub fn extract_continuation(html: &str) -> Option<Continuation> {
    capture_first(r#"['"]continuation['"]:\s*['"](.+?)['"]"#, html).map(Continuation)
}

pub fn extract_hl(html: &str) -> Option<String> {
    capture_first(r#"['"]hl['"]:\s*['"](.+?)['"]"#, html)
}

pub fn extract_gl(html: &str) -> Option<String> {
    capture_first(r#"['"]gl['"]:\s*['"](.+?)['"]"#, html)
}
