//! Turns scanned or pasted text into a [`TrackId`].
//!
//! Rules are tried in a fixed order and the first one that matches decides the
//! outcome, even if a later rule would also have matched:
//!
//! 1. URI form, `spotify:track:<id>`
//! 2. web form, `https://open.spotify.com/track/<id>?<query>`
//! 3. a bare identifier of exactly [`TRACK_ID_LEN`] characters

use crate::model::{TRACK_ID_LEN, TrackId};
use thiserror::Error;

const URI_MARKER: &str = "spotify:track:";
const WEB_MARKER: &str = "open.spotify.com/track/";
const WEB_SPLIT: &str = "/track/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("input is empty")]
    Empty,
    #[error("track URI has no identifier segment")]
    MissingUriSegment,
    #[error("track link has no path segment after /track/")]
    MissingPathSegment,
    #[error("input is not a track link, URI or identifier")]
    Unrecognized,
}

pub fn resolve(input: &str) -> Result<TrackId, Rejection> {
    if input.is_empty() {
        return Err(Rejection::Empty);
    }

    if input.contains(URI_MARKER) {
        return match input.split(':').nth(2) {
            Some(segment) if !segment.is_empty() => Ok(TrackId::new(segment)),
            _ => Err(Rejection::MissingUriSegment),
        };
    }

    if input.contains(WEB_MARKER) {
        let segment = input
            .split(WEB_SPLIT)
            .nth(1)
            .and_then(|rest| rest.split('?').next())
            .unwrap_or_default();
        if segment.is_empty() {
            return Err(Rejection::MissingPathSegment);
        }
        return Ok(TrackId::new(segment));
    }

    if input.chars().count() == TRACK_ID_LEN {
        return Ok(TrackId::new(input));
    }

    Err(Rejection::Unrecognized)
}

/// Absent input is rejected the same way as empty input.
pub fn resolve_opt(input: Option<&str>) -> Result<TrackId, Rejection> {
    input.map_or(Err(Rejection::Empty), resolve)
}
