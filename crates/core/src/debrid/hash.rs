//! Info-hash extraction.
//!
//! The lowercase 40-hex info hash is the canonical torrent key across the
//! system. It can come from a magnet URN, a bare hex string or the bencoded
//! `info` dictionary of a .torrent file.

use librqbit_core::torrent_metainfo::{torrent_from_bytes, TorrentMetaV1Owned};
use once_cell::sync::Lazy;
use regex_lite::Regex;
use thiserror::Error;

use super::TorrentSource;

static MAGNET_HASH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"btih:([0-9a-fA-F]{40})").expect("valid regex"));

#[derive(Debug, Error, PartialEq)]
pub enum HashError {
    #[error("No info hash in input")]
    NotFound,

    #[error("Failed to parse torrent: {0}")]
    ParseError(String),
}

/// Extract a hash from a magnet link or a bare 40-hex string.
pub fn extract_hash(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if is_hex_hash(trimmed) {
        return Some(trimmed.to_lowercase());
    }
    MAGNET_HASH
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase())
}

/// Compute the info hash of a .torrent file.
pub fn hash_from_torrent_bytes(bytes: &[u8]) -> Result<String, HashError> {
    let torrent: TorrentMetaV1Owned =
        torrent_from_bytes(bytes).map_err(|e| HashError::ParseError(e.to_string()))?;
    Ok(torrent.info_hash.as_string().to_lowercase())
}

/// Root name of a .torrent file, if present.
pub fn torrent_name(bytes: &[u8]) -> Option<String> {
    let torrent: TorrentMetaV1Owned = torrent_from_bytes(bytes).ok()?;
    let name = torrent.info.name.as_ref()?;
    Some(String::from_utf8_lossy(name.as_ref()).into_owned())
}

/// Hash of any torrent source.
pub fn hash_from_source(source: &TorrentSource) -> Result<String, HashError> {
    match source {
        TorrentSource::Magnet(uri) => extract_hash(uri).ok_or(HashError::NotFound),
        TorrentSource::File { bytes, .. } => hash_from_torrent_bytes(bytes),
    }
}

/// Minimal magnet link for a hash.
pub fn magnet_from_hash(hash: &str) -> String {
    format!("magnet:?xt=urn:btih:{}", hash.to_lowercase())
}

fn is_hex_hash(s: &str) -> bool {
    s.len() == 40 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TORRENT: &[u8] = b"d8:announce18:http://tracker/ann4:infod6:lengthi1024e4:name9:movie.mkv12:piece lengthi16384e6:pieces20:aaaaaaaaaaaaaaaaaaaaee";
    const TORRENT_HASH: &str = "ca212a51724ca99a56cd91300272d529158d3b80";

    #[test]
    fn test_extract_from_magnet_lowercases() {
        let magnet = "magnet:?xt=urn:btih:ABCDEF0123456789ABCDEF0123456789ABCDEF01&dn=Movie";
        assert_eq!(
            extract_hash(magnet).as_deref(),
            Some("abcdef0123456789abcdef0123456789abcdef01")
        );
    }

    #[test]
    fn test_extract_bare_hex() {
        let hash = "ABCDEF0123456789ABCDEF0123456789ABCDEF01";
        assert_eq!(extract_hash(hash), Some(hash.to_lowercase()));
    }

    #[test]
    fn test_extract_rejects_short_hashes() {
        assert_eq!(extract_hash("magnet:?xt=urn:btih:abcdef"), None);
        assert_eq!(extract_hash("abcdef"), None);
        assert_eq!(extract_hash("https://example.com/file.torrent"), None);
    }

    #[test]
    fn test_magnet_round_trip() {
        let hash = "0123456789abcdef0123456789abcdef01234567";
        let magnet = magnet_from_hash(hash);
        assert_eq!(extract_hash(&magnet).as_deref(), Some(hash));

        let upper = magnet_from_hash(&hash.to_uppercase());
        assert_eq!(extract_hash(&upper).as_deref(), Some(hash));
    }

    #[test]
    fn test_hash_from_torrent_file() {
        assert_eq!(hash_from_torrent_bytes(TORRENT).unwrap(), TORRENT_HASH);
        assert_eq!(torrent_name(TORRENT).as_deref(), Some("movie.mkv"));
        assert_eq!(
            hash_from_source(&TorrentSource::file(TORRENT.to_vec())).unwrap(),
            TORRENT_HASH
        );
    }

    #[test]
    fn test_invalid_torrent_bytes() {
        assert!(matches!(
            hash_from_torrent_bytes(b"not a torrent"),
            Err(HashError::ParseError(_))
        ));
    }

    #[test]
    fn test_hash_from_magnet_source_without_hash() {
        assert_eq!(
            hash_from_source(&TorrentSource::magnet("magnet:?dn=nothing")),
            Err(HashError::NotFound)
        );
    }
}
