//! Closed set of metadata fields a template can reference

use crate::types::ItemDescriptor;

/// A `{placeholder}` field
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    /// Zero-padded track number and display title: "01. Speak to Me"
    Track,
    /// Zero-padded track number
    TrackNumber,
    /// Track title (with version)
    TrackTitle,
    /// Performing artist
    Artist,
    /// Album artist
    AlbumArtist,
    /// Album title (with version)
    Album,
    /// Release year
    Year,
    /// Disc number
    MediaNumber,
    /// File extension
    Ext,
    /// Record label
    Label,
    /// Composer
    Composer,
    /// Producers, comma-separated
    Producer,
    /// Performing artist with featured artists: "Artist (feat. A, B)"
    ArtistFeaturing,
    /// Quality label ("16-44.1")
    Quality,
    /// Track version
    Version,
    /// Item ID
    Id,
    /// Album ID
    AlbumId,
}

impl Field {
    /// Look up a field by its placeholder name
    pub fn from_name(name: &str) -> Option<Self> {
        let field = match name {
            "track" => Field::Track,
            "tracknumber" => Field::TrackNumber,
            "tracktitle" => Field::TrackTitle,
            "artist" => Field::Artist,
            "albumartist" => Field::AlbumArtist,
            "album" => Field::Album,
            "year" => Field::Year,
            "media_number" => Field::MediaNumber,
            "ext" => Field::Ext,
            "label" => Field::Label,
            "composer" => Field::Composer,
            "producer" => Field::Producer,
            "artist_featuring" => Field::ArtistFeaturing,
            "quality" => Field::Quality,
            "version" => Field::Version,
            "id" => Field::Id,
            "album_id" => Field::AlbumId,
            _ => return None,
        };
        Some(field)
    }

    /// Raw (unsanitized) value of this field for an item
    pub fn value(self, item: &ItemDescriptor) -> String {
        match self {
            Field::Track => format!("{:02}. {}", item.track_number, item.display_title()),
            Field::TrackNumber => format!("{:02}", item.track_number),
            Field::TrackTitle => item.display_title(),
            Field::Artist => item.artist.clone(),
            Field::AlbumArtist => item.album_artist.clone(),
            Field::Album => item.display_album(),
            Field::Year => item.year.map(|y| y.to_string()).unwrap_or_default(),
            Field::MediaNumber => item.disc_number.to_string(),
            Field::Ext => item.ext().to_string(),
            Field::Label => item.label.clone().unwrap_or_default(),
            Field::Composer => item.composer.clone().unwrap_or_default(),
            Field::Producer => item.producers.join(", "),
            Field::ArtistFeaturing => item.artist_featuring(),
            Field::Quality => item.quality.short().to_string(),
            Field::Version => item.version.clone().unwrap_or_default(),
            Field::Id => item.id.to_string(),
            Field::AlbumId => item.album_id.clone(),
        }
    }
}

/// A boolean field usable as a `%{?condition,...}` condition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoolField {
    /// Album spans more than one disc
    IsMultidisc,
    /// Parental advisory
    Explicit,
    /// Effective quality is a hi-res tier
    HiRes,
}

impl BoolField {
    /// Look up a boolean field by name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "is_multidisc" => Some(BoolField::IsMultidisc),
            "explicit" => Some(BoolField::Explicit),
            "hires" => Some(BoolField::HiRes),
            _ => None,
        }
    }

    /// Evaluate this condition for an item
    pub fn eval(self, item: &ItemDescriptor) -> bool {
        match self {
            BoolField::IsMultidisc => item.is_multidisc(),
            BoolField::Explicit => item.explicit,
            BoolField::HiRes => item.quality.is_hires(),
        }
    }
}

/// Condition of a `%{?condition,then|else}` block
///
/// Boolean flags evaluate directly. Any other known field holds when its
/// value is non-empty and not zero, so `%{?composer,...}` picks the first
/// branch exactly when `{composer}` would render something.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Condition {
    /// A boolean flag
    Flag(BoolField),
    /// A placeholder field tested for a value
    Field(Field),
}

impl Condition {
    /// Look up a condition by name; flags win over fields
    pub fn from_name(name: &str) -> Option<Self> {
        BoolField::from_name(name)
            .map(Condition::Flag)
            .or_else(|| Field::from_name(name).map(Condition::Field))
    }

    /// Evaluate this condition for an item
    pub fn eval(self, item: &ItemDescriptor) -> bool {
        match self {
            Condition::Flag(flag) => flag.eval(item),
            Condition::Field(field) => is_truthy(&field.value(item)),
        }
    }
}

fn is_truthy(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && value.parse::<f64>() != Ok(0.0)
}
