//! Archive detection and unpacking.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tracing::debug;

use crate::error::{Error, Result};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const USTAR_MAGIC: &[u8] = b"ustar";
const USTAR_OFFSET: usize = 257;

/// Payload format recognized from its leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    /// gzip stream, assumed to wrap a tar archive.
    TarGz,
    /// Uncompressed POSIX tar.
    Tar,
    /// Anything else; kept as-is.
    Plain,
}

impl PayloadFormat {
    /// Classify a payload from its first bytes.
    pub fn detect(head: &[u8]) -> Self {
        if head.starts_with(&GZIP_MAGIC) {
            return Self::TarGz;
        }
        let magic_end = USTAR_OFFSET + USTAR_MAGIC.len();
        if head.get(USTAR_OFFSET..magic_end) == Some(USTAR_MAGIC) {
            return Self::Tar;
        }
        Self::Plain
    }
}

/// Unpack `archive` into `dest` when it is a tar or tar.gz.
///
/// Returns whether anything was extracted. The archive file is removed after
/// a successful extraction; plain payloads stay where they are.
///
/// Blocking; callers on the async runtime go through `spawn_blocking`.
///
/// # Errors
///
/// Returns `Error::Extract` when the archive is malformed and `Error::Write`
/// when the archive file cannot be read or removed.
pub fn extract_in_place(archive: &Path, dest: &Path) -> Result<bool> {
    let mut file = File::open(archive).map_err(|e| Error::write(archive, e))?;

    let mut head = Vec::with_capacity(512);
    (&mut file)
        .take(512)
        .read_to_end(&mut head)
        .map_err(|e| Error::write(archive, e))?;
    file.seek(SeekFrom::Start(0))
        .map_err(|e| Error::write(archive, e))?;

    let format = PayloadFormat::detect(&head);
    debug!(path = %archive.display(), ?format, "Detected payload format");

    let reader = BufReader::new(file);
    let unpacked = match format {
        PayloadFormat::Plain => return Ok(false),
        PayloadFormat::TarGz => tar::Archive::new(GzDecoder::new(reader)).unpack(dest),
        PayloadFormat::Tar => tar::Archive::new(reader).unpack(dest),
    };
    unpacked.map_err(|e| Error::extract(archive, e.to_string()))?;

    std::fs::remove_file(archive).map_err(|e| Error::write(archive, e))?;
    Ok(true)
}

/// File name the payload is written under: the last URL path segment, or
/// `download` when the path has none.
pub fn download_filename(url: &url::Url) -> PathBuf {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .map_or_else(|| PathBuf::from("download"), PathBuf::from)
}
