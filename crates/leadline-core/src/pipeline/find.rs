//! Find stage: locate the on-device audio file produced for a call.
//!
//! Call recorder apps drop files in vendor-specific directories with no
//! stable naming scheme. A file is accepted when its name carries the
//! dialed number or its modification time lines up with the call.

use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::error::Result;
use crate::models::CallLog;
use crate::util::phone_tail;

/// Recorders often start a moment before the call connects.
const WINDOW_LEAD_MS: i64 = 30_000;
/// And finalize the file a moment after it ends.
const WINDOW_TRAIL_MS: i64 = 60_000;
/// Directory scan depth; recorder folders are flat or one level deep.
const MAX_SCAN_DEPTH: usize = 3;

const AUDIO_EXTENSIONS: &[&str] = &["m4a", "mp3", "amr", "wav", "aac", "ogg", "opus", "3gp"];

/// The recording file picked by the Find stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundFile {
    pub path: PathBuf,
    pub file_name: String,
    pub size: i64,
    pub format: String,
}

/// Search the recorder directories (then the general media directories)
/// for the audio file belonging to `call`.
///
/// An audio file qualifies when its name contains the dialed number's
/// 10-digit tail, or when its modification time falls inside the call's
/// window. The first qualifying file wins; recorder directories are
/// searched before media directories.
pub fn find_recording(
    call: &CallLog,
    recorder_dirs: &[PathBuf],
    media_dirs: &[PathBuf],
) -> Result<Option<FoundFile>> {
    let window_start = call.call_at - WINDOW_LEAD_MS;
    let window_end = call.call_at + call.duration_secs * 1000 + WINDOW_TRAIL_MS;
    let tail = phone_tail(&call.phone_number, 10);

    for dirs in [recorder_dirs, media_dirs] {
        for dir in dirs {
            if let Some(found) = scan_dir(dir, 0, &tail, window_start, window_end) {
                return Ok(Some(found));
            }
        }
    }
    Ok(None)
}

fn scan_dir(dir: &Path, depth: usize, tail: &str, start: i64, end: i64) -> Option<FoundFile> {
    if depth > MAX_SCAN_DEPTH {
        return None;
    }
    let Ok(entries) = fs::read_dir(dir) else {
        tracing::debug!(dir = %dir.display(), "recorder directory not readable");
        return None;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if let Some(found) = scan_dir(&path, depth + 1, tail, start, end) {
                return Some(found);
            }
            continue;
        }
        let Some(format) = audio_format(&path) else {
            continue;
        };
        let Ok(metadata) = entry.metadata() else {
            continue;
        };

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if !matches_call(&file_name, &metadata, tail, start, end) {
            continue;
        }

        return Some(FoundFile {
            size: i64::try_from(metadata.len()).unwrap_or(i64::MAX),
            file_name,
            format,
            path,
        });
    }
    None
}

/// Name hint or time window, either suffices.
fn matches_call(file_name: &str, metadata: &Metadata, tail: &str, start: i64, end: i64) -> bool {
    if !tail.is_empty() && phone_tail(file_name, usize::MAX).contains(tail) {
        return true;
    }
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .and_then(|d| i64::try_from(d.as_millis()).ok())
        .is_some_and(|modified_ms| modified_ms >= start && modified_ms <= end)
}

fn audio_format(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_string_lossy().to_lowercase();
    AUDIO_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CallType;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn call_at(phone: &str, call_at: i64) -> CallLog {
        CallLog::from_event(phone, CallType::Outgoing, 60, call_at, "dev-1")
    }

    fn call_now(phone: &str) -> CallLog {
        call_at(phone, chrono::Utc::now().timestamp_millis())
    }

    #[test]
    fn test_matches_on_phone_number_in_name() {
        let tmp = tempdir().unwrap();
        std::fs::write(tmp.path().join("rec_9876543210_x.m4a"), b"a").unwrap();

        let call = call_now("+91 98765 43210");
        let found = find_recording(&call, &[tmp.path().to_path_buf()], &[])
            .unwrap()
            .unwrap();
        assert_eq!(found.file_name, "rec_9876543210_x.m4a");
        assert_eq!(found.format, "m4a");
        assert_eq!(found.size, 1);
    }

    #[test]
    fn test_name_match_ignores_modification_time() {
        // the call happened long before the file's mtime; the name hint
        // alone must carry the match
        let tmp = tempdir().unwrap();
        std::fs::write(tmp.path().join("rec_9876543210.m4a"), b"a").unwrap();

        let call = call_at("+91 98765 43210", 1_500_000_000_000);
        let found = find_recording(&call, &[tmp.path().to_path_buf()], &[])
            .unwrap()
            .unwrap();
        assert_eq!(found.file_name, "rec_9876543210.m4a");
    }

    #[test]
    fn test_matches_on_time_window_without_name_hint() {
        let tmp = tempdir().unwrap();
        std::fs::write(tmp.path().join("voice.m4a"), b"a").unwrap();

        let call = call_now("9876543210");
        let found = find_recording(&call, &[tmp.path().to_path_buf()], &[])
            .unwrap()
            .unwrap();
        assert_eq!(found.file_name, "voice.m4a");
    }

    #[test]
    fn test_rejects_file_outside_window_without_name_hint() {
        let tmp = tempdir().unwrap();
        std::fs::write(tmp.path().join("voice.m4a"), b"a").unwrap();

        let call = call_at("9876543210", 1_500_000_000_000);
        assert!(find_recording(&call, &[tmp.path().to_path_buf()], &[])
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_ignores_non_audio_files() {
        let tmp = tempdir().unwrap();
        std::fs::write(tmp.path().join("notes.txt"), b"x").unwrap();
        std::fs::write(tmp.path().join("thumb.jpg"), b"x").unwrap();

        let call = call_now("9876543210");
        assert!(find_recording(&call, &[tmp.path().to_path_buf()], &[])
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_recorder_dirs_win_over_media_dirs() {
        let recorder = tempdir().unwrap();
        let media = tempdir().unwrap();
        std::fs::write(recorder.path().join("rec_9876543210.m4a"), b"a").unwrap();
        std::fs::write(media.path().join("rec_9876543210.mp3"), b"b").unwrap();

        let call = call_now("9876543210");
        let found = find_recording(
            &call,
            &[recorder.path().to_path_buf()],
            &[media.path().to_path_buf()],
        )
        .unwrap()
        .unwrap();
        assert_eq!(found.format, "m4a");
    }

    #[test]
    fn test_falls_back_to_media_dirs() {
        let recorder = tempdir().unwrap();
        let media = tempdir().unwrap();
        std::fs::write(media.path().join("call.mp3"), b"x").unwrap();

        let call = call_now("9876543210");
        let found = find_recording(
            &call,
            &[recorder.path().to_path_buf()],
            &[media.path().to_path_buf()],
        )
        .unwrap()
        .unwrap();
        assert_eq!(found.file_name, "call.mp3");
    }

    #[test]
    fn test_scans_nested_recorder_folders() {
        let tmp = tempdir().unwrap();
        let nested = tmp.path().join("Recordings").join("Call");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("x.amr"), b"x").unwrap();

        let call = call_now("9876543210");
        let found = find_recording(&call, &[tmp.path().to_path_buf()], &[])
            .unwrap()
            .unwrap();
        assert_eq!(found.format, "amr");
    }

    #[test]
    fn test_missing_directory_is_not_an_error() {
        let call = call_now("9876543210");
        let missing = PathBuf::from("/nonexistent/recorder/dir");
        assert!(find_recording(&call, &[missing], &[]).unwrap().is_none());
    }
}
