// Tests for timestamp-based change detection

use chrono::{DateTime, Duration, TimeZone, Utc};
use collectr::store::memory::RFC1123_FORMAT;
use collectr::store::RemoteObject;
use collectr::sync::{parse_remote_timestamp, ChangeDetector};
use filetime::{set_file_mtime, FileTime};
use std::path::Path;

use crate::support::write_file;

fn pin_mtime(path: &Path, ts: DateTime<Utc>) {
    set_file_mtime(path, FileTime::from_unix_time(ts.timestamp(), 0)).unwrap();
}

fn remote(key: &str, ts: DateTime<Utc>) -> RemoteObject {
    RemoteObject {
        key: key.to_string(),
        last_modified: Some(ts.format(RFC1123_FORMAT).to_string()),
    }
}

fn fixed() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2013, 5, 1, 12, 30, 45).unwrap()
}

#[test]
fn test_equal_timestamps_skip_upload() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "a.css", "a");
    pin_mtime(&path, fixed());

    let detector = ChangeDetector::new(false);
    assert!(!detector.should_upload(Some(fixed()), &path).unwrap());
    assert!(!detector
        .should_upload_object(Some(&remote("a.css", fixed())), &path)
        .unwrap());
}

#[test]
fn test_sub_second_difference_is_not_a_change() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "a.css", "a");
    set_file_mtime(&path, FileTime::from_unix_time(fixed().timestamp(), 600_000_000)).unwrap();

    assert!(!ChangeDetector::new(false)
        .should_upload(Some(fixed()), &path)
        .unwrap());
}

#[test]
fn test_any_difference_triggers_upload() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "a.css", "a");
    pin_mtime(&path, fixed());

    let detector = ChangeDetector::new(false);
    for offset in [1, -1, 3600, -86_400] {
        let ts = fixed() + Duration::seconds(offset);
        assert!(detector.should_upload(Some(ts), &path).unwrap(), "offset {offset}");
        assert!(detector
            .should_upload_object(Some(&remote("a.css", ts)), &path)
            .unwrap());
    }
}

#[test]
fn test_missing_remote_triggers_upload() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "a.css", "a");

    let detector = ChangeDetector::new(false);
    assert!(detector.should_upload(None, &path).unwrap());
    assert!(detector.should_upload_object(None, &path).unwrap());

    let no_timestamp = RemoteObject {
        key: "a.css".to_string(),
        last_modified: None,
    };
    assert!(detector.should_upload_object(Some(&no_timestamp), &path).unwrap());
}

#[test]
fn test_force_uploads_unchanged_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "a.css", "a");
    pin_mtime(&path, fixed());

    let detector = ChangeDetector::new(true);
    assert!(detector.should_upload(Some(fixed()), &path).unwrap());
    assert!(detector
        .should_upload_object(Some(&remote("a.css", fixed())), &path)
        .unwrap());
}

#[test]
fn test_force_does_not_stat_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("gone.css");
    assert!(ChangeDetector::new(true)
        .should_upload(Some(fixed()), &missing)
        .unwrap());
}

#[test]
fn test_unreadable_local_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("gone.css");
    assert!(ChangeDetector::new(false)
        .should_upload(Some(fixed()), &missing)
        .is_err());
}

#[test]
fn test_unparsable_remote_timestamp_triggers_upload() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "a.css", "a");
    pin_mtime(&path, fixed());

    let garbled = RemoteObject {
        key: "a.css".to_string(),
        last_modified: Some("yesterday-ish".to_string()),
    };
    assert!(ChangeDetector::new(false)
        .should_upload_object(Some(&garbled), &path)
        .unwrap());
}

#[test]
fn test_parse_remote_timestamp_formats() {
    for raw in [
        "Wed, 01 May 2013 12:30:45 GMT",
        "Wed, 01 May 2013 12:30:45 +0000",
        "2013-05-01T12:30:45Z",
        "2013-05-01T14:30:45+02:00",
        "2013-05-01 12:30:45 UTC",
    ] {
        assert_eq!(parse_remote_timestamp(raw), Some(fixed()), "{raw}");
    }
    assert_eq!(parse_remote_timestamp("not a date"), None);
}
