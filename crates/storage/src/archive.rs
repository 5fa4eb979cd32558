//! Deterministic tar.gz writer.
//!
//! Two runs over the same tree produce byte-identical archives: entries are
//! sorted by path, timestamps and ownership are zeroed, and modes are reduced
//! to `0o755` (directories and executables) or `0o644`.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::GzBuilder;
use tracing::debug;

use crate::error::{Error, Result};

/// Predicate deciding whether a workspace-relative path goes into the archive.
pub type ArchiveFilter<'a> = &'a dyn Fn(&Path) -> bool;

const DIR_MODE: u32 = 0o755;
const FILE_MODE: u32 = 0o644;
const EXEC_MODE: u32 = 0o755;

/// One entry to archive, relative to the archived directory.
#[derive(Debug)]
enum Entry {
    Dir(PathBuf),
    File { rel: PathBuf, executable: bool },
}

/// Walk `dir` and return its entries in sorted order. Anything that is
/// neither a directory nor a regular file is skipped.
fn collect_entries(dir: &Path, filter: Option<ArchiveFilter<'_>>) -> Result<Vec<Entry>> {
    let mut entries = Vec::new();
    let mut pending = vec![PathBuf::new()];

    while let Some(rel_dir) = pending.pop() {
        let abs_dir = dir.join(&rel_dir);
        let read = std::fs::read_dir(&abs_dir).map_err(|e| Error::io("read_dir", &abs_dir, e))?;

        let mut children = Vec::new();
        for child in read {
            let child = child.map_err(|e| Error::io("read_dir", &abs_dir, e))?;
            children.push(child.file_name());
        }
        children.sort();

        for name in children {
            let rel = rel_dir.join(&name);
            if filter.is_some_and(|keep| !keep(&rel)) {
                continue;
            }

            let abs = dir.join(&rel);
            let meta = std::fs::symlink_metadata(&abs).map_err(|e| Error::io("stat", &abs, e))?;
            if meta.is_dir() {
                entries.push(Entry::Dir(rel.clone()));
                pending.push(rel);
            } else if meta.is_file() {
                entries.push(Entry::File {
                    rel,
                    executable: is_executable(&meta),
                });
            } else {
                debug!(path = %abs.display(), "Skipping non-regular file");
            }
        }
    }

    entries.sort_by(|a, b| entry_path(a).cmp(entry_path(b)));
    Ok(entries)
}

fn entry_path(entry: &Entry) -> &Path {
    match entry {
        Entry::Dir(rel) | Entry::File { rel, .. } => rel,
    }
}

#[cfg(unix)]
fn is_executable(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
const fn is_executable(_meta: &std::fs::Metadata) -> bool {
    false
}

fn normalized_header(mode: u32, size: u64, kind: tar::EntryType) -> tar::Header {
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(kind);
    header.set_mode(mode);
    header.set_size(size);
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    header
}

/// Write a deterministic tar.gz of `dir` into `out`.
///
/// # Errors
///
/// Returns `Error::Io` when the tree cannot be read and
/// `Error::ArchiveFailed` when the archive cannot be written.
pub fn write_tar_gz<W: Write>(dir: &Path, filter: Option<ArchiveFilter<'_>>, out: W) -> Result<W> {
    let entries = collect_entries(dir, filter)?;
    let failed = |e: io::Error| Error::archive_failed(dir, e.to_string());

    let encoder = GzBuilder::new().mtime(0).write(out, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.mode(tar::HeaderMode::Deterministic);

    for entry in &entries {
        match entry {
            Entry::Dir(rel) => {
                let mut header = normalized_header(DIR_MODE, 0, tar::EntryType::Directory);
                builder
                    .append_data(&mut header, rel, io::empty())
                    .map_err(failed)?;
            }
            Entry::File { rel, executable } => {
                let abs = dir.join(rel);
                let file = File::open(&abs).map_err(|e| Error::io("open", &abs, e))?;
                let size = file
                    .metadata()
                    .map_err(|e| Error::io("stat", &abs, e))?
                    .len();
                let mode = if *executable { EXEC_MODE } else { FILE_MODE };
                let mut header = normalized_header(mode, size, tar::EntryType::Regular);
                builder.append_data(&mut header, rel, file).map_err(failed)?;
            }
        }
    }

    let encoder = builder.into_inner().map_err(failed)?;
    encoder.finish().map_err(failed)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::io::Read;

    use flate2::read::GzDecoder;

    use super::*;

    fn populate(dir: &Path) {
        std::fs::create_dir_all(dir.join("b/nested")).unwrap();
        std::fs::write(dir.join("b/nested/z.txt"), "z").unwrap();
        std::fs::write(dir.join("a.txt"), "a").unwrap();
        std::fs::write(dir.join("c.yaml"), "kind: C").unwrap();
    }

    fn listing(archive: &[u8]) -> Vec<(String, u64, u32)> {
        let mut reader = tar::Archive::new(GzDecoder::new(archive));
        reader
            .entries()
            .unwrap()
            .map(|entry| {
                let entry = entry.unwrap();
                let header = entry.header();
                (
                    entry.path().unwrap().to_string_lossy().into_owned(),
                    header.mtime().unwrap(),
                    header.mode().unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn test_entries_sorted_and_normalized() {
        let dir = tempfile::tempdir().unwrap();
        populate(dir.path());

        let bytes = write_tar_gz(dir.path(), None, Vec::new()).unwrap();
        let entries = listing(&bytes);
        let paths: Vec<&str> = entries.iter().map(|(p, _, _)| p.as_str()).collect();
        assert_eq!(paths, vec!["a.txt", "b", "b/nested", "b/nested/z.txt", "c.yaml"]);
        assert!(entries.iter().all(|(_, mtime, _)| *mtime == 0));
        assert!(
            entries
                .iter()
                .all(|(_, _, mode)| *mode == FILE_MODE || *mode == DIR_MODE)
        );
    }

    #[test]
    fn test_same_tree_same_bytes() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        populate(first.path());
        populate(second.path());

        let a = write_tar_gz(first.path(), None, Vec::new()).unwrap();
        let b = write_tar_gz(second.path(), None, Vec::new()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_filter_excludes_paths() {
        let dir = tempfile::tempdir().unwrap();
        populate(dir.path());

        let skip_yaml = |path: &Path| path.extension().is_none_or(|ext| ext != "yaml");
        let bytes = write_tar_gz(dir.path(), Some(&skip_yaml), Vec::new()).unwrap();
        let paths: Vec<String> = listing(&bytes).into_iter().map(|(p, _, _)| p).collect();
        assert!(!paths.contains(&"c.yaml".to_string()));
        assert!(paths.contains(&"a.txt".to_string()));
    }

    #[test]
    fn test_file_contents_preserved() {
        let dir = tempfile::tempdir().unwrap();
        populate(dir.path());

        let bytes = write_tar_gz(dir.path(), None, Vec::new()).unwrap();
        let mut reader = tar::Archive::new(GzDecoder::new(bytes.as_slice()));
        let mut found = String::new();
        for entry in reader.entries().unwrap() {
            let mut entry = entry.unwrap();
            if entry.path().unwrap().ends_with("z.txt") {
                entry.read_to_string(&mut found).unwrap();
            }
        }
        assert_eq!(found, "z");
    }
}
