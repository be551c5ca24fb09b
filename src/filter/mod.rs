//! Discography filtering
//!
//! Two independent filters apply to artist and label expansions:
//! - [`smart::smart_filter`] keeps one edition per logical release
//! - [`albums_only`] drops singles and EPs by track count
//!
//! Both operate on [`AlbumGroup`]s built by [`group_albums`] and hand back a
//! flat item list in the original order.

use crate::types::{AlbumGroup, Collection, ItemDescriptor, Quality, UrlKind};

pub mod smart;

/// Settings for [`apply`]
#[derive(Clone, Debug, PartialEq)]
pub struct FilterOptions {
    /// Collapse duplicate editions
    pub smart: bool,
    /// Drop groups below `min_album_tracks`
    pub albums_only: bool,
    /// Album threshold for `albums_only`
    pub min_album_tracks: u32,
    /// Prefer non-extra editions in the smart filter
    pub skip_extras: bool,
    /// Requested quality tier
    pub quality: Quality,
}

/// Items that survived filtering
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filtered {
    /// Kept items, in input order
    pub items: Vec<ItemDescriptor>,
    /// Number of items removed
    pub removed: usize,
}

/// Group items by album identity, preserving first-seen order
pub fn group_albums(items: Vec<ItemDescriptor>) -> Vec<AlbumGroup> {
    let mut groups: Vec<AlbumGroup> = Vec::new();
    for item in items {
        match groups.iter_mut().find(|g| g.album_id == item.album_id) {
            Some(group) => group.items.push(item),
            None => groups.push(AlbumGroup {
                album_id: item.album_id.clone(),
                title: item.album_title.clone(),
                version: item.album_version.clone(),
                artist: item.album_artist.clone(),
                max_quality: item.max_quality,
                year: item.year,
                items: vec![item],
            }),
        }
    }
    groups
}

/// Drop groups with fewer than `min_tracks` tracks
pub fn albums_only(groups: Vec<AlbumGroup>, min_tracks: u32) -> Vec<AlbumGroup> {
    groups
        .into_iter()
        .filter(|g| {
            let keep = g.track_count() >= min_tracks;
            if !keep {
                tracing::debug!(album = %g.title, tracks = g.track_count(), "Dropping single/EP");
            }
            keep
        })
        .collect()
}

/// Drop albums credited to someone other than the requested artist
///
/// Artist pages list appearances and compilations alongside the artist's own
/// releases.
pub fn matching_artist(groups: Vec<AlbumGroup>, artist: &str) -> Vec<AlbumGroup> {
    let wanted = artist.trim().to_lowercase();
    groups
        .into_iter()
        .filter(|g| {
            let keep = g.artist.trim().to_lowercase() == wanted;
            if !keep {
                tracing::debug!(album = %g.title, artist = %g.artist, "Dropping album by another artist");
            }
            keep
        })
        .collect()
}

/// Apply the configured filters to one URL's items
///
/// Only artist and label expansions are filtered; anything else passes
/// through untouched.
pub fn apply(items: Vec<ItemDescriptor>, collection: Option<&Collection>, options: &FilterOptions) -> Filtered {
    let Some(collection) = collection.filter(|c| c.kind.is_collection_of_albums()) else {
        return Filtered { items, removed: 0 };
    };
    if !options.smart && !options.albums_only {
        return Filtered { items, removed: 0 };
    }

    let before = items.len();
    let mut groups = group_albums(items);

    if options.smart {
        if collection.kind == UrlKind::Artist {
            groups = matching_artist(groups, &collection.name);
        }
        groups = smart::smart_filter(groups, options.quality, options.skip_extras);
    }
    if options.albums_only {
        groups = albums_only(groups, options.min_album_tracks);
    }

    let items: Vec<ItemDescriptor> = groups.into_iter().flat_map(|g| g.items).collect();
    let removed = before - items.len();
    if removed > 0 {
        tracing::info!(
            collection = %collection.name,
            kept = items.len(),
            removed,
            "Filtered discography"
        );
    }
    Filtered { items, removed }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::item;

    fn album_items(album: &str, title: &str, artist: &str, count: u32) -> Vec<ItemDescriptor> {
        (1..=count)
            .map(|n| {
                let mut i = item(&format!("{album}-{n}"), album, n);
                i.album_title = title.into();
                i.album_artist = artist.into();
                i.album_track_count = count;
                i.max_quality = Quality::HiRes;
                i
            })
            .collect()
    }

    fn artist(name: &str) -> Collection {
        Collection {
            kind: UrlKind::Artist,
            id: "1".into(),
            name: name.into(),
        }
    }

    fn options(smart: bool, albums_only: bool) -> FilterOptions {
        FilterOptions {
            smart,
            albums_only,
            min_album_tracks: 5,
            skip_extras: true,
            quality: Quality::HiRes,
        }
    }

    #[test]
    fn grouping_preserves_first_seen_order() {
        let mut items = album_items("b", "B", "X", 2);
        items.extend(album_items("a", "A", "X", 1));
        items.push(item("late-b", "b", 3));

        let groups = group_albums(items);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].album_id, "b");
        assert_eq!(groups[0].items.len(), 3);
        assert_eq!(groups[1].album_id, "a");
    }

    #[test]
    fn albums_only_drops_short_groups() {
        let mut items = album_items("single", "Single", "X", 1);
        items.extend(album_items("ep", "EP", "X", 4));
        items.extend(album_items("lp", "LP", "X", 5));

        let kept = albums_only(group_albums(items), 5);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].album_id, "lp");
    }

    #[test]
    fn non_collection_items_pass_through() {
        let items = album_items("lp", "LP", "X", 1);
        let out = apply(items.clone(), None, &options(true, true));
        assert_eq!(out.items, items);
        assert_eq!(out.removed, 0);

        let playlist = Collection {
            kind: UrlKind::Playlist,
            id: "p".into(),
            name: "Mix".into(),
        };
        let out = apply(items.clone(), Some(&playlist), &options(true, true));
        assert_eq!(out.items, items);
    }

    #[test]
    fn smart_filter_on_artist_drops_editions_and_other_artists() {
        let mut items = album_items("std", "Abbey Road", "The Beatles", 17);
        items.extend(album_items("rem", "Abbey Road (Remastered)", "The Beatles", 17));
        items.extend(album_items("live", "Abbey Road (Live)", "The Beatles", 16));
        items.extend(album_items("comp", "Tribute to Abbey Road", "Various Artists", 12));

        let out = apply(items, Some(&artist("The Beatles")), &options(true, false));

        let mut albums: Vec<&str> = out.items.iter().map(|i| i.album_id.as_str()).collect();
        albums.dedup();
        assert_eq!(albums, ["std", "live"]);
        assert_eq!(out.removed, 17 + 12);
    }

    #[test]
    fn filters_are_independent() {
        let mut items = album_items("lp", "Loveless", "My Bloody Valentine", 11);
        items.extend(album_items("lp2", "Loveless (Remastered)", "My Bloody Valentine", 11));
        items.extend(album_items("ep", "Tremolo", "My Bloody Valentine", 4));
        let who = artist("My Bloody Valentine");

        let only_albums = apply(items.clone(), Some(&who), &options(false, true));
        assert_eq!(only_albums.items.len(), 22);

        let only_smart = apply(items.clone(), Some(&who), &options(true, false));
        assert_eq!(only_smart.items.len(), 15);

        let both = apply(items, Some(&who), &options(true, true));
        assert_eq!(both.items.len(), 11);
        assert_eq!(both.removed, 15);
    }
}
