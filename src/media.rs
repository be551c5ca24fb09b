//! Album assets and header checks for written audio files.

use crate::catalog::CatalogService;
use crate::error::{Error, Result};
use crate::types::Quality;
use futures::StreamExt;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

/// File name of the cover image saved next to an album's tracks
pub const COVER_FILE: &str = "cover.jpg";

/// Size of an ID3v2 header (and of its optional footer)
const ID3V2_HEADER_LEN: u64 = 10;

/// Cover URL at the size asked for
///
/// The catalog serves 600px covers under `_600.`; the original upload lives
/// at the same path under `_org.`.
///
/// ```
/// use qobuz_dl::media::cover_url;
///
/// let url = "https://static.qobuz.com/images/covers/ab/cd/abcd_600.jpg";
/// assert_eq!(cover_url(url, true), "https://static.qobuz.com/images/covers/ab/cd/abcd_org.jpg");
/// assert_eq!(cover_url(url, false), url);
/// ```
pub fn cover_url(url: &str, original: bool) -> String {
    if original {
        url.replace("_600.", "_org.")
    } else {
        url.to_string()
    }
}

/// Download an asset to `dest` through a temporary sibling file
///
/// Returns the number of bytes written. `dest` only ever appears complete.
pub async fn save_asset(catalog: &dyn CatalogService, url: &str, dest: &Path) -> Result<u64> {
    let tmp = temp_sibling(dest);
    let result = write_asset(catalog, url, &tmp).await;
    let bytes = match result {
        Ok(bytes) => bytes,
        Err(e) => {
            tokio::fs::remove_file(&tmp).await.ok();
            return Err(e);
        }
    };
    if let Err(source) = tokio::fs::rename(&tmp, dest).await {
        tokio::fs::remove_file(&tmp).await.ok();
        return Err(Error::Write {
            path: dest.to_path_buf(),
            source,
        });
    }
    Ok(bytes)
}

async fn write_asset(catalog: &dyn CatalogService, url: &str, tmp: &Path) -> Result<u64> {
    let mut stream = catalog.get_asset(url).await?;
    let write_err = |source| Error::Write {
        path: tmp.to_path_buf(),
        source,
    };
    let mut file = tokio::fs::File::create(tmp).await.map_err(write_err)?;
    let mut bytes = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await.map_err(write_err)?;
        bytes += chunk.len() as u64;
    }
    file.flush().await.map_err(write_err)?;
    Ok(bytes)
}

fn temp_sibling(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

/// Check that a written file starts like audio of the delivered tier
///
/// FLAC files must carry the `fLaC` stream marker and MP3 files an MPEG
/// frame sync, in both cases after an optional ID3v2 tag. This catches
/// truncated bodies, HTML error pages and the like; it does not decode.
pub async fn verify_audio(path: &Path, quality: Quality) -> Result<()> {
    let fail = |reason: String| Error::Integrity {
        path: path.to_path_buf(),
        reason,
    };

    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| fail(e.to_string()))?;
    let mut head = [0u8; ID3V2_HEADER_LEN as usize];
    file.read_exact(&mut head)
        .await
        .map_err(|e| fail(format!("file too short: {e}")))?;

    let mut magic = [0u8; 4];
    match id3v2_len(&head) {
        Some(skip) => {
            file.seek(SeekFrom::Start(skip))
                .await
                .map_err(|e| fail(e.to_string()))?;
            file.read_exact(&mut magic)
                .await
                .map_err(|_| fail("ID3 tag is not followed by audio data".into()))?;
        }
        None => magic.copy_from_slice(&head[..4]),
    }

    match quality.ext() {
        "flac" if &magic != b"fLaC" => Err(fail("missing FLAC stream marker".into())),
        "mp3" if !is_mpeg_sync(&magic) => Err(fail("missing MPEG frame header".into())),
        _ => Ok(()),
    }
}

/// Total length of a leading ID3v2 tag, header and footer included
fn id3v2_len(head: &[u8; 10]) -> Option<u64> {
    if &head[..3] != b"ID3" {
        return None;
    }
    // sizes are syncsafe: 7 bits per byte
    let size = head[6..10]
        .iter()
        .fold(0u64, |acc, b| (acc << 7) | u64::from(b & 0x7f));
    let footer = if head[5] & 0x10 != 0 { ID3V2_HEADER_LEN } else { 0 };
    Some(ID3V2_HEADER_LEN + size + footer)
}

fn is_mpeg_sync(bytes: &[u8; 4]) -> bool {
    bytes[0] == 0xff && bytes[1] & 0xe0 == 0xe0
}
