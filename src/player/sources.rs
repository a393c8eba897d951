use crate::catalog::Track;

/// Candidate audio URLs for `track`, best first.
///
/// Stream URL, download URL, then the short-link download page when
/// downloads are allowed. Anything mentioning mp3 is moved ahead of the rest
/// without disturbing relative order.
pub fn candidate_urls(track: &Track) -> Vec<String> {
    let short_link = track
        .short_url
        .as_deref()
        .filter(|_| track.download_allowed)
        .map(|s| format!("{}/download/", s.trim_end_matches('/')));

    let urls: Vec<String> = [track.audio.clone(), track.audio_download.clone(), short_link]
        .into_iter()
        .flatten()
        .filter(|u| !u.trim().is_empty())
        .collect();

    mp3_first(urls)
}

pub fn mp3_first(urls: Vec<String>) -> Vec<String> {
    let (mut mp3, other): (Vec<String>, Vec<String>) = urls
        .into_iter()
        .partition(|u| u.to_ascii_lowercase().contains("mp3"));
    mp3.extend(other);
    mp3
}
