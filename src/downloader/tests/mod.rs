use super::*;
use crate::catalog::CatalogEntity;
use crate::error::{CatalogError, Error};
use crate::test_helpers::{MockCatalog, album_info, flac_body, track_info};
use crate::types::{ItemId, UrlKind};
use test_helpers::{create_test_downloader, create_test_downloader_with};


fn album_url(id: &str) -> String {
    format!("https://www.qobuz.com/us-en/album/some-title/{id}")
}

fn track_url(id: &str) -> String {
    format!("https://open.qobuz.com/track/{id}")
}

/// Register an album whose tracks are `<id>-1` ... `<id>-<tracks>`
fn add_album(catalog: &MockCatalog, id: &str, title: &str, artist: &str, tracks: u32) -> Vec<ItemId> {
    let names: Vec<String> = (1..=tracks).map(|n| format!("{id}-{n}")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    catalog.add_album(album_info(id, title, artist, tracks), &refs)
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
