use crate::track::AlbumArt;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("payload is not a valid update ({source}); raw: {raw:?}")]
    Malformed {
        source: serde_json::Error,
        raw: String,
    },
}

#[derive(Error, Debug)]
pub enum DurationParseError {
    #[error("empty duration text")]
    Empty,

    #[error("invalid duration text: {0:?}")]
    Invalid(String),

    #[error("unknown duration unit {unit:?} in {text:?}")]
    UnknownUnit { unit: String, text: String },
}

/// Wire shape of one update message. Every field is optional; absence means
/// "no change to that attribute".
#[derive(Debug, Default, Deserialize)]
struct WireUpdate {
    #[serde(default)]
    track: Option<WireTrack>,
    #[serde(default)]
    progress: Option<String>,
    #[serde(default)]
    art: Option<Vec<i64>>,
}

#[derive(Debug, Default, Deserialize)]
struct WireTrack {
    #[serde(default)]
    name: String,
    #[serde(default)]
    album: String,
    #[serde(default)]
    artist: String,
    #[serde(default)]
    length: String,
}

impl WireTrack {
    fn is_empty(&self) -> bool {
        self.name.is_empty()
            && self.album.is_empty()
            && self.artist.is_empty()
            && self.length.is_empty()
    }
}

/// Track identity plus duration, replacing the current ones as a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackInfoUpdate {
    pub name: String,
    pub album: String,
    pub artist: String,
    pub length: Duration,
}

/// Decoded message with one optional sub-record per track attribute.
#[derive(Debug, Clone, Default)]
pub struct PartialUpdate {
    pub track: Option<TrackInfoUpdate>,
    pub progress: Option<Duration>,
    pub art: Option<AlbumArt>,
}

impl PartialUpdate {
    pub fn is_empty(&self) -> bool {
        self.track.is_none() && self.progress.is_none() && self.art.is_none()
    }
}

/// Parse a framed payload into a partial update.
///
/// A payload that is not structurally valid fails as a whole, carrying the
/// raw bytes for diagnostics. Sub-records that fail semantic parsing (bad
/// duration text, wrong-size art) are logged and dropped individually; the
/// remaining sub-records still apply. A track record whose length text does
/// not parse is dropped whole, so identity never lands without its
/// duration.
pub fn decode(payload: &[u8]) -> Result<PartialUpdate, DecodeError> {
    let wire: WireUpdate =
        serde_json::from_slice(payload).map_err(|source| DecodeError::Malformed {
            source,
            raw: String::from_utf8_lossy(payload).into_owned(),
        })?;

    let mut update = PartialUpdate::default();

    match wire.track {
        Some(track) if track.is_empty() => {
            log::debug!("empty track record, treating as absent");
        }
        Some(track) => match parse_duration(&track.length) {
            Ok(length) => {
                update.track = Some(TrackInfoUpdate {
                    name: track.name,
                    album: track.album,
                    artist: track.artist,
                    length,
                });
            }
            Err(e) => log::warn!(
                "bad track length {:?}, dropping track record: {}",
                track.length,
                e
            ),
        },
        None => {}
    }

    if let Some(progress) = wire.progress {
        match parse_duration(&progress) {
            Ok(elapsed) => update.progress = Some(elapsed),
            Err(e) => log::warn!("bad progress {:?}, dropping progress record: {}", progress, e),
        }
    }

    if let Some(values) = wire.art {
        match AlbumArt::from_values(&values) {
            Ok(art) => update.art = Some(art),
            Err(e) => log::warn!("dropping art record: {}", e),
        }
    }

    Ok(update)
}

/// Parse duration text like `3m30s`, `183000ms` or `1.5s`: one or more
/// decimal values, each with a unit of `ns`, `us`, `ms`, `s`, `m` or `h`.
/// The bare string `0` is also accepted. Signs are rejected; a negative
/// duration has no meaning here.
pub fn parse_duration(text: &str) -> Result<Duration, DurationParseError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(DurationParseError::Empty);
    }
    if trimmed == "0" {
        return Ok(Duration::ZERO);
    }

    let mut rest = trimmed;
    let mut total = Duration::ZERO;
    while !rest.is_empty() {
        let value_len = rest
            .char_indices()
            .find(|&(_, c)| !c.is_ascii_digit() && c != '.')
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        if value_len == 0 {
            return Err(DurationParseError::Invalid(text.to_string()));
        }
        let value: f64 = rest[..value_len]
            .parse()
            .map_err(|_| DurationParseError::Invalid(text.to_string()))?;
        rest = &rest[value_len..];

        let unit_len = rest
            .char_indices()
            .find(|&(_, c)| c.is_ascii_digit() || c == '.')
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        let seconds_per_unit = match unit {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => {
                return Err(DurationParseError::UnknownUnit {
                    unit: unit.to_string(),
                    text: text.to_string(),
                })
            }
        };
        rest = &rest[unit_len..];

        let term = Duration::try_from_secs_f64(value * seconds_per_unit)
            .map_err(|_| DurationParseError::Invalid(text.to_string()))?;
        total = total.saturating_add(term);
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::ART_PIXELS;

    #[test]
    fn test_parse_duration_compound() {
        assert_eq!(parse_duration("3m30s").unwrap(), Duration::from_secs(210));
        assert_eq!(parse_duration("1h2m3s").unwrap(), Duration::from_secs(3723));
    }

    #[test]
    fn test_parse_duration_millis() {
        assert_eq!(parse_duration("183000ms").unwrap().as_millis(), 183_000);
    }

    #[test]
    fn test_parse_duration_fractional() {
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
    }

    #[test]
    fn test_parse_duration_zero() {
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("-5s").is_err());
        assert!(parse_duration("5x").is_err());
    }

    #[test]
    fn test_decode_full_track() {
        let payload = br#"{"track":{"name":"A","album":"B","artist":"C","length":"3m30s"}}"#;
        let update = decode(payload).unwrap();

        let info = update.track.unwrap();
        assert_eq!(info.name, "A");
        assert_eq!(info.album, "B");
        assert_eq!(info.artist, "C");
        assert_eq!(info.length, Duration::from_secs(210));
        assert!(update.progress.is_none());
        assert!(update.art.is_none());
    }

    #[test]
    fn test_decode_progress_only() {
        let update = decode(br#"{"progress":"1m05s"}"#).unwrap();
        assert_eq!(update.progress, Some(Duration::from_secs(65)));
        assert!(update.track.is_none());
    }

    #[test]
    fn test_decode_empty_track_record_is_absent() {
        let payload = br#"{"track":{"name":"","album":"","artist":"","length":""}}"#;
        let update = decode(payload).unwrap();
        assert!(update.track.is_none());
        assert!(update.is_empty());
    }

    #[test]
    fn test_decode_bad_length_drops_only_track_record() {
        let payload =
            br#"{"track":{"name":"A","album":"B","artist":"C","length":"nope"},"progress":"10s"}"#;
        let update = decode(payload).unwrap();
        assert!(update.track.is_none());
        assert_eq!(update.progress, Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_decode_wrong_art_size_drops_only_art_record() {
        let payload = serde_json::json!({ "art": vec![1; 10], "progress": "5s" }).to_string();
        let update = decode(payload.as_bytes()).unwrap();
        assert!(update.art.is_none());
        assert_eq!(update.progress, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_decode_exact_size_art() {
        let payload = serde_json::json!({ "art": vec![1i64; ART_PIXELS] }).to_string();
        let update = decode(payload.as_bytes()).unwrap();
        assert_eq!(update.art.unwrap().set_count(), ART_PIXELS);
    }

    #[test]
    fn test_decode_error_carries_raw_payload() {
        let err = decode(b"not json").unwrap_err();
        assert!(err.to_string().contains("not json"));
    }
}
