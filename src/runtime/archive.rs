//! Unpacking runtime packages.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use tar::Archive;
use walkdir::WalkDir;
use xz2::read::XzDecoder;

use crate::runtime::cancel::CancelToken;
use crate::util::fs;

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const XZ_MAGIC: &[u8] = &[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00];

/// Names the runtime binary is looked up under, in preference order.
pub const RUNTIME_BINARIES: &[&str] = &["wine", "wine64"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compression {
    None,
    Gzip,
    Xz,
}

impl Compression {
    fn sniff(header: &[u8]) -> Self {
        if header.starts_with(XZ_MAGIC) {
            Compression::Xz
        } else if header.starts_with(GZIP_MAGIC) {
            Compression::Gzip
        } else {
            Compression::None
        }
    }
}

/// Extract a tar archive (xz, gzip or uncompressed) into `dest`.
///
/// The compression is detected from the file's magic bytes rather than its
/// name. Entries that would land outside `dest` abort the extraction.
pub fn extract_archive(archive: &Path, dest: &Path, cancel: &CancelToken) -> Result<()> {
    let mut file = File::open(archive)
        .with_context(|| format!("failed to open archive: {}", archive.display()))?;

    let mut header = Vec::with_capacity(XZ_MAGIC.len());
    (&mut file)
        .take(XZ_MAGIC.len() as u64)
        .read_to_end(&mut header)
        .with_context(|| format!("failed to read archive: {}", archive.display()))?;
    file.seek(SeekFrom::Start(0))?;

    let compression = Compression::sniff(&header);
    tracing::debug!("extracting {} ({:?})", archive.display(), compression);

    let reader = BufReader::new(file);
    match compression {
        Compression::Xz => unpack(Archive::new(XzDecoder::new(reader)), dest, cancel),
        Compression::Gzip => unpack(Archive::new(GzDecoder::new(reader)), dest, cancel),
        Compression::None => unpack(Archive::new(reader), dest, cancel),
    }
}

fn unpack<R: Read>(mut archive: Archive<R>, dest: &Path, cancel: &CancelToken) -> Result<()> {
    std::fs::create_dir_all(dest)
        .with_context(|| format!("failed to create destination directory: {}", dest.display()))?;

    let mut count = 0usize;
    for entry in archive.entries().context("failed to read archive entries")? {
        cancel.check("runtime extraction")?;

        let mut entry = entry.context("failed to read archive entry")?;
        let entry_path = entry.path().context("failed to get entry path")?.into_owned();

        if escapes_root(&entry_path) {
            bail!(
                "archive entry escapes destination directory: {}",
                entry_path.display()
            );
        }
        let entry_type = entry.header().entry_type();
        match entry_type {
            tar::EntryType::Directory
            | tar::EntryType::Regular
            | tar::EntryType::Continuous
            | tar::EntryType::Link
            | tar::EntryType::Symlink => {
                entry.unpack_in(dest).with_context(|| {
                    format!("failed to extract {}", entry_path.display())
                })?;
            }
            _ => {
                tracing::debug!(
                    "Skipping unsupported entry type {:?}: {}",
                    entry_type,
                    entry_path.display()
                );
                continue;
            }
        }
        count += 1;
    }

    if count == 0 {
        bail!("archive contains no entries");
    }
    tracing::debug!("Extracted {} entries to {}", count, dest.display());
    Ok(())
}

fn escapes_root(path: &Path) -> bool {
    path.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}

/// Find the runtime binary inside an unpacked package.
///
/// Only files with an execute bit count. Prefers a binary inside a `bin/`
/// directory, then the shallowest match, then `wine` over `wine64`.
pub fn locate_runtime_binary(root: &Path) -> Option<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| !e.file_type().is_dir() && fs::is_executable(e.path()))
        .filter_map(|e| {
            let name = e.file_name().to_str()?;
            let rank = RUNTIME_BINARIES.iter().position(|b| *b == name)?;
            let in_bin = e
                .path()
                .parent()
                .and_then(Path::file_name)
                .is_some_and(|dir| dir == "bin");
            Some(((!in_bin, e.depth(), rank), e.into_path()))
        })
        .min_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, path)| path)
}
