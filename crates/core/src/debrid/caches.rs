//! Per-hash torrent id and title caches.

use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct Inner {
    ids: HashMap<String, String>,
    titles: HashMap<String, String>,
    hashes_by_id: HashMap<String, String>,
}

/// Process-wide maps from info hash to provider torrent id and filename.
///
/// Keys are normalised to lowercase.
#[derive(Default)]
pub struct HashCaches {
    inner: Mutex<Inner>,
}

impl HashCaches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remember(&self, hash: &str, torrent_id: &str, title: Option<&str>) {
        let hash = hash.to_lowercase();
        let mut inner = self.inner.lock().unwrap();
        inner.ids.insert(hash.clone(), torrent_id.to_string());
        inner
            .hashes_by_id
            .insert(torrent_id.to_string(), hash.clone());
        if let Some(title) = title {
            inner.titles.insert(hash, title.to_string());
        }
    }

    pub fn remember_title(&self, hash: &str, title: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.titles.insert(hash.to_lowercase(), title.to_string());
    }

    pub fn torrent_id(&self, hash: &str) -> Option<String> {
        self.inner.lock().unwrap().ids.get(&hash.to_lowercase()).cloned()
    }

    pub fn title(&self, hash: &str) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .titles
            .get(&hash.to_lowercase())
            .cloned()
    }

    pub fn hash_for_id(&self, torrent_id: &str) -> Option<String> {
        self.inner.lock().unwrap().hashes_by_id.get(torrent_id).cloned()
    }

    /// Forget a torrent id once it has been removed. Titles are kept.
    pub fn forget_id(&self, torrent_id: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(hash) = inner.hashes_by_id.remove(torrent_id) {
            if inner.ids.get(&hash).map(String::as_str) == Some(torrent_id) {
                inner.ids.remove(&hash);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remember_and_forget() {
        let caches = HashCaches::new();
        caches.remember("ABC", "RD1", Some("Movie.mkv"));

        assert_eq!(caches.torrent_id("abc").as_deref(), Some("RD1"));
        assert_eq!(caches.title("abc").as_deref(), Some("Movie.mkv"));
        assert_eq!(caches.hash_for_id("RD1").as_deref(), Some("abc"));

        caches.forget_id("RD1");
        assert_eq!(caches.torrent_id("abc"), None);
        assert_eq!(caches.hash_for_id("RD1"), None);
        assert_eq!(caches.title("abc").as_deref(), Some("Movie.mkv"));
    }

    #[test]
    fn test_forget_stale_id_keeps_newer_mapping() {
        let caches = HashCaches::new();
        caches.remember("abc", "RD1", None);
        caches.remember("abc", "RD2", None);

        caches.forget_id("RD1");
        assert_eq!(caches.torrent_id("abc").as_deref(), Some("RD2"));
    }
}
