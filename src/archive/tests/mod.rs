use crate::archive::*;
use crate::types::ItemId;
use chrono::{TimeZone, Utc};
use std::path::PathBuf;
use tempfile::NamedTempFile;


async fn open_temp() -> (Archive, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let archive = Archive::open(temp_file.path()).await.unwrap();
    (archive, temp_file)
}

fn record(id: &str, artist: &str, completed_secs: i64, size: u64) -> ArchiveRecord {
    ArchiveRecord {
        id: ItemId::from(id),
        output_path: PathBuf::from(format!("/music/{artist}/{id}.flac")),
        completed_at: Utc.timestamp_opt(completed_secs, 0).unwrap(),
        size_bytes: Some(size),
        checksum: Some(format!("sha-{id}")),
        artist: Some(artist.to_string()),
        album: Some("Album".to_string()),
        title: Some(format!("Track {id}")),
    }
}
