//! Normalisation of scraper links into torrent sources.

use std::time::Duration;

use reqwest::{redirect, Client};
use thiserror::Error;
use tracing::debug;

use crate::debrid::{extract_hash, hash_from_torrent_bytes, magnet_from_hash, torrent_name, TorrentSource};

#[derive(Debug, Error, PartialEq)]
pub enum ResolveError {
    #[error("Unsupported link: {0}")]
    Unsupported(String),

    #[error("Failed to fetch link: {0}")]
    Http(String),

    #[error("Link did not resolve to a torrent: {0}")]
    NotATorrent(String),
}

/// Turns magnets, bare hashes and HTTP(S) download links into a [`TorrentSource`].
///
/// HTTP links are fetched with redirects disabled: indexers commonly answer
/// with a redirect to a `magnet:` URI, which cannot be followed.
pub struct LinkResolver {
    client: Client,
}

impl LinkResolver {
    pub fn new(timeout: Duration) -> Result<Self, ResolveError> {
        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .timeout(timeout)
            .build()
            .map_err(|e| ResolveError::Http(e.to_string()))?;
        Ok(Self { client })
    }

    pub async fn resolve(&self, link: &str) -> Result<TorrentSource, ResolveError> {
        let link = link.trim();
        if link.starts_with("magnet:") {
            return Ok(TorrentSource::magnet(link));
        }
        if link.len() == 40 {
            if let Some(hash) = extract_hash(link) {
                return Ok(TorrentSource::magnet(magnet_from_hash(&hash)));
            }
        }
        if !(link.starts_with("http://") || link.starts_with("https://")) {
            return Err(ResolveError::Unsupported(link.to_string()));
        }

        let response = self
            .client
            .get(link)
            .send()
            .await
            .map_err(|e| ResolveError::Http(e.to_string()))?;

        if response.status().is_redirection() {
            let location = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            debug!(link, location = %location, "Download link redirected");
            if location.starts_with("magnet:") {
                return Ok(TorrentSource::magnet(location));
            }
            return Err(ResolveError::NotATorrent(format!("redirect to {}", location)));
        }
        if !response.status().is_success() {
            return Err(ResolveError::Http(format!("HTTP {}", response.status())));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ResolveError::Http(e.to_string()))?
            .to_vec();

        if bytes.first() == Some(&b'd') && hash_from_torrent_bytes(&bytes).is_ok() {
            let name = torrent_name(&bytes);
            return Ok(TorrentSource::File { bytes, name });
        }

        let text = String::from_utf8_lossy(&bytes);
        let text = text.trim();
        if text.starts_with("magnet:") {
            return Ok(TorrentSource::magnet(text));
        }
        Err(ResolveError::NotATorrent(link.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::Router;

    const TORRENT: &[u8] = b"d8:announce18:http://tracker/ann4:infod6:lengthi1024e4:name9:movie.mkv12:piece lengthi16384e6:pieces20:aaaaaaaaaaaaaaaaaaaaee";
    const HASH: &str = "ca212a51724ca99a56cd91300272d529158d3b80";

    async fn serve() -> String {
        let app = Router::new()
            .route(
                "/redirect",
                get(|| async {
                    (
                        StatusCode::FOUND,
                        [(header::LOCATION, format!("magnet:?xt=urn:btih:{}", HASH))],
                    )
                        .into_response()
                }),
            )
            .route("/file", get(|| async { TORRENT.to_vec() }))
            .route(
                "/text",
                get(|| async { format!(" magnet:?xt=urn:btih:{}\n", HASH) }),
            )
            .route("/html", get(|| async { "<html></html>" }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn resolver() -> LinkResolver {
        LinkResolver::new(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_magnet_and_bare_hash() {
        let magnet = format!("magnet:?xt=urn:btih:{}", HASH);
        assert_eq!(
            resolver().resolve(&magnet).await.unwrap(),
            TorrentSource::magnet(magnet.clone())
        );
        assert_eq!(
            resolver().resolve(&HASH.to_uppercase()).await.unwrap(),
            TorrentSource::magnet(magnet)
        );
        assert!(matches!(
            resolver().resolve("ftp://x").await,
            Err(ResolveError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn test_http_links() {
        let base = serve().await;
        let resolver = resolver();

        match resolver.resolve(&format!("{}/redirect", base)).await.unwrap() {
            TorrentSource::Magnet(uri) => assert!(uri.contains(HASH)),
            other => panic!("expected magnet, got {:?}", other),
        }
        match resolver.resolve(&format!("{}/file", base)).await.unwrap() {
            TorrentSource::File { bytes, name } => {
                assert_eq!(bytes, TORRENT);
                assert_eq!(name.as_deref(), Some("movie.mkv"));
            }
            other => panic!("expected file, got {:?}", other),
        }
        assert_eq!(
            resolver.resolve(&format!("{}/text", base)).await.unwrap(),
            TorrentSource::magnet(format!("magnet:?xt=urn:btih:{}", HASH))
        );
        assert!(matches!(
            resolver.resolve(&format!("{}/html", base)).await,
            Err(ResolveError::NotATorrent(_))
        ));
    }
}
