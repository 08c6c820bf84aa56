use reqwest::Url;

use crate::error::{SyncError, SyncResult};

/// Embed URL for a YouTube watch or short link.
pub fn youtube_embed_url(raw: &str) -> SyncResult<String> {
    let url = Url::parse(raw.trim())
        .map_err(|err| SyncError::Validation(format!("invalid URL: {err}")))?;
    let host = url.host_str().unwrap_or_default();

    let video_id = if host == "youtu.be" {
        url.path().trim_start_matches('/').to_string()
    } else if host.contains("youtube.com") {
        url.query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned())
            .unwrap_or_default()
    } else {
        String::new()
    };

    if video_id.is_empty() {
        return Err(SyncError::Validation(
            "not a YouTube video link".to_string(),
        ));
    }
    Ok(format!("https://www.youtube.com/embed/{video_id}"))
}
