//! Video file detection for torrent contents.

use super::TorrentFile;

/// Extensions treated as playable video.
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "mov", "wmv", "flv", "m4v", "webm", "mpg", "mpeg", "m2ts", "ts", "vob",
    "divx", "ogm",
];

/// Whether a path looks like a real video file (not a sample).
pub fn is_video_file(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path).to_lowercase();
    if name.contains("sample") {
        return false;
    }
    name.rsplit_once('.')
        .map(|(_, ext)| VIDEO_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

/// The video files of a torrent.
pub fn video_files(files: &[TorrentFile]) -> Vec<&TorrentFile> {
    files.iter().filter(|f| is_video_file(&f.path)).collect()
}
