use crate::model::TrackId;
use anyhow::{Context, Result};
use url::Url;

const TRACK_BASE: &str = "https://open.spotify.com/track/";
const EMBED_BASE: &str = "https://open.spotify.com/embed/track/";
const CARD_IMAGE_ENDPOINT: &str = "https://api.qrserver.com/v1/create-qr-code/";
pub const LOGIN_URL: &str = "https://accounts.spotify.com/login?continue=https://open.spotify.com";
pub const DEFAULT_CARD_IMAGE_SIZE: u32 = 400;

/// Player embed the playback surface loads for a round.
pub fn embed_url(id: &TrackId) -> String {
    format!("{EMBED_BASE}{id}?utm_source=generator&theme=0")
}

/// Canonical web link printed on a card.
pub fn track_url(id: &TrackId) -> String {
    format!("{TRACK_BASE}{id}")
}

pub fn card_image_url(id: &TrackId, size: u32) -> Result<String> {
    let dimensions = format!("{size}x{size}");
    let target = track_url(id);
    let url = Url::parse_with_params(
        CARD_IMAGE_ENDPOINT,
        &[("size", dimensions.as_str()), ("data", target.as_str())],
    )
    .context("failed to build card image url")?;
    Ok(url.into())
}
