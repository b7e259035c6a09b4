//! Native archive extraction
//!
//! Supports zip and tar (plain, gzip, xz, bzip2, zstd) without external tools.
//! The format comes from the file's leading bytes, not its name, so a
//! mislabelled download still extracts and a plain binary is left alone.
//! Tar entries are checked for path traversal and link escapes before they
//! are unpacked; zip entries with unsafe names are skipped.

use crate::core::error::{DependError, Result};
use crate::core::output;
use crate::helpers::internal::progress::with_spinner;
use filetime::FileTime;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};

/// Archive formats the extractor understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    TarXz,
    TarBz2,
    TarZst,
    Tar,
    Zip,
}

/// Result of handing a file to the extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractOutcome {
    Extracted,
    /// The file's content is not a known archive format; nothing was touched
    NotAnArchive,
}

// ============================================================================
// Native archive extraction
// ============================================================================

fn normalize_lexical(path: &Path) -> PathBuf {
    // Lexically normalize a path (no filesystem access). This is used to
    // validate link targets without following symlinks.
    let mut out = PathBuf::new();
    let mut has_root = false;

    for c in path.components() {
        match c {
            Component::Prefix(p) => {
                out.clear();
                out.push(p.as_os_str());
                has_root = true;
            }
            Component::RootDir => {
                out.push(Component::RootDir.as_os_str());
                has_root = true;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = out
                    .components()
                    .next_back()
                    .is_some_and(|last| matches!(last, Component::Normal(_)));
                if popped {
                    out.pop();
                } else if !has_root {
                    out.push("..");
                }
            }
            Component::Normal(seg) => out.push(seg),
        }
    }

    out
}

fn ensure_no_symlink_components(dest: &Path, full_path: &Path) -> Result<()> {
    let rel = full_path.strip_prefix(dest).map_err(|_| {
        DependError::Archive(format!(
            "tar contains path outside destination: {}",
            full_path.display()
        ))
    })?;

    // Reject if any existing path component (including leaf) is a symlink.
    let mut cur = dest.to_path_buf();
    for comp in rel.components() {
        cur.push(comp);
        if let Ok(md) = std::fs::symlink_metadata(&cur)
            && md.file_type().is_symlink()
        {
            return Err(DependError::Archive(format!(
                "tar extraction blocked: symlink in path component: {}",
                cur.display()
            )));
        }
    }

    Ok(())
}

fn ensure_link_target_within_dest(dest: &Path, link_parent: &Path, link_name: &Path) -> Result<()> {
    if link_name.is_absolute()
        || link_name
            .components()
            .any(|c| matches!(c, Component::Prefix(_) | Component::RootDir))
    {
        return Err(DependError::Archive(format!(
            "tar contains unsafe link target (absolute): {}",
            link_name.display()
        )));
    }

    let candidate = normalize_lexical(&link_parent.join(link_name));
    let norm_dest = normalize_lexical(dest);
    if candidate.strip_prefix(&norm_dest).is_err() {
        return Err(DependError::Archive(format!(
            "tar contains unsafe link target (escapes dest): {} -> {}",
            link_parent.display(),
            link_name.display()
        )));
    }

    Ok(())
}

/// Extract a tar stream, preserving permissions and modification times.
fn extract_tar<R: Read>(reader: R, dest: &Path) -> Result<()> {
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_mtime(true);
    archive.set_preserve_permissions(true);

    let entries = archive
        .entries()
        .map_err(|e| DependError::Archive(format!("tar read error: {}", e)))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| DependError::Archive(format!("tar entry error: {}", e)))?;

        let path = entry
            .path()
            .map_err(|e| DependError::Archive(format!("tar path error: {}", e)))?
            .into_owned();

        if path.is_absolute() || path.components().any(|c| c == Component::ParentDir) {
            return Err(DependError::Archive(format!(
                "tar contains unsafe path: {}",
                path.display()
            )));
        }

        // GitHub tarballs carry a pax_global_header; "." entries are no-ops too.
        if path.as_os_str().is_empty() || path == Path::new(".") {
            continue;
        }

        let full_path = dest.join(&path);
        ensure_no_symlink_components(dest, &full_path)?;

        let entry_type = entry.header().entry_type();
        if entry_type == tar::EntryType::XGlobalHeader {
            continue;
        }
        if entry_type == tar::EntryType::Symlink || entry_type == tar::EntryType::Link {
            let link_name = entry
                .link_name()
                .map_err(|e| DependError::Archive(format!("tar link_name error: {}", e)))?;
            match link_name {
                Some(link_name) => {
                    let link_parent = full_path.parent().unwrap_or(dest);
                    ensure_link_target_within_dest(dest, link_parent, &link_name)?;
                }
                None => {
                    return Err(DependError::Archive(format!(
                        "tar contains link without target: {}",
                        path.display()
                    )));
                }
            }
        }

        if let Some(parent) = full_path.parent() {
            if parent.starts_with(dest) {
                ensure_no_symlink_components(dest, parent)?;
            }
            std::fs::create_dir_all(parent).map_err(|e| DependError::fs(parent, e))?;
        }

        entry
            .unpack(&full_path)
            .map_err(|e| DependError::Archive(format!("unpack error for {}: {}", path.display(), e)))?;
    }

    Ok(())
}

fn open_buffered(archive_path: &Path) -> Result<BufReader<File>> {
    let file = File::open(archive_path).map_err(|e| DependError::fs(archive_path, e))?;
    Ok(BufReader::new(file))
}

/// Zip stores wall-clock time without a zone; it is read as UTC.
fn zip_mtime(dt: zip::DateTime) -> FileTime {
    let (month, day) = (i64::from(dt.month()), i64::from(dt.day()));
    let year = i64::from(dt.year()) - i64::from(month <= 2);

    // Days since 1970-01-01 in the proleptic Gregorian calendar.
    let era = year.div_euclid(400);
    let year_of_era = year - era * 400;
    let day_of_year = (153 * ((month + 9) % 12) + 2) / 5 + day - 1;
    let day_of_era = year_of_era * 365 + year_of_era / 4 - year_of_era / 100 + day_of_year;
    let days = era * 146_097 + day_of_era - 719_468;

    let seconds = days * 86_400
        + i64::from(dt.hour()) * 3_600
        + i64::from(dt.minute()) * 60
        + i64::from(dt.second());
    FileTime::from_unix_time(seconds, 0)
}

fn extract_zip(archive_path: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive_path).map_err(|e| DependError::fs(archive_path, e))?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| DependError::Archive(format!("zip read error: {}", e)))?;

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| DependError::Archive(format!("zip entry error: {}", e)))?;

        let outpath = match file.enclosed_name() {
            Some(path) => dest.join(path),
            None => continue,
        };

        if file.is_dir() {
            std::fs::create_dir_all(&outpath).map_err(|e| DependError::fs(&outpath, e))?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DependError::fs(parent, e))?;
        }

        let mut outfile = File::create(&outpath).map_err(|e| DependError::fs(&outpath, e))?;
        std::io::copy(&mut file, &mut outfile).map_err(|e| DependError::fs(&outpath, e))?;
        drop(outfile);

        if let Some(modified) = file.last_modified() {
            filetime::set_file_mtime(&outpath, zip_mtime(modified)).ok();
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = file.unix_mode() {
                std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode)).ok();
            }
        }
    }

    Ok(())
}

// ============================================================================
// Public API
// ============================================================================

/// Detect archive format from filename extension
pub fn detect_format(name: &str) -> Option<ArchiveFormat> {
    let name = name.to_lowercase();
    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        Some(ArchiveFormat::TarGz)
    } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
        Some(ArchiveFormat::TarXz)
    } else if name.ends_with(".tar.bz2") || name.ends_with(".tbz2") {
        Some(ArchiveFormat::TarBz2)
    } else if name.ends_with(".tar.zst") || name.ends_with(".tzst") {
        Some(ArchiveFormat::TarZst)
    } else if name.ends_with(".zip") {
        Some(ArchiveFormat::Zip)
    } else if name.ends_with(".tar") {
        Some(ArchiveFormat::Tar)
    } else {
        None
    }
}

/// Identify an archive from its leading bytes.
///
/// Compressed streams are assumed to hold a tar. Plain tar is only
/// recognized by its `ustar` marker.
pub fn sniff_format(path: &Path) -> Result<Option<ArchiveFormat>> {
    let file = File::open(path).map_err(|e| DependError::fs(path, e))?;
    let mut head = Vec::with_capacity(262);
    file.take(262)
        .read_to_end(&mut head)
        .map_err(|e| DependError::fs(path, e))?;

    let format = if head.starts_with(b"PK\x03\x04") || head.starts_with(b"PK\x05\x06") {
        Some(ArchiveFormat::Zip)
    } else if head.starts_with(&[0x1f, 0x8b]) {
        Some(ArchiveFormat::TarGz)
    } else if head.starts_with(&[0xfd, b'7', b'z', b'X', b'Z', 0x00]) {
        Some(ArchiveFormat::TarXz)
    } else if head.starts_with(b"BZh") {
        Some(ArchiveFormat::TarBz2)
    } else if head.starts_with(&[0x28, 0xb5, 0x2f, 0xfd]) {
        Some(ArchiveFormat::TarZst)
    } else if head.get(257..262) == Some(b"ustar".as_slice()) {
        Some(ArchiveFormat::Tar)
    } else {
        None
    };
    Ok(format)
}

/// Strip a recognized archive extension: `sscanf-2.13.8.tar.gz` -> `sscanf-2.13.8`.
pub fn archive_stem(name: &str) -> &str {
    const SUFFIXES: &[&str] = &[
        ".tar.gz", ".tar.xz", ".tar.bz2", ".tar.zst", ".tgz", ".txz", ".tbz2", ".tzst", ".zip",
        ".tar",
    ];
    let lower = name.to_lowercase();
    SUFFIXES
        .iter()
        .find(|s| lower.ends_with(*s))
        .map(|s| &name[..name.len() - s.len()])
        .unwrap_or(name)
}

/// Extract `archive` into `dest`, detecting the format from its content.
///
/// Content that is not an archive is not an error: the file is left alone
/// and [`ExtractOutcome::NotAnArchive`] is returned. An archive with a
/// valid header but a damaged body fails with [`DependError::Archive`].
pub fn extract(archive: &Path, dest: &Path) -> Result<ExtractOutcome> {
    let filename = archive
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "archive".to_string());

    let format = match (sniff_format(archive)?, detect_format(&filename)) {
        (Some(format), _) => format,
        // Pre-POSIX tars carry no marker; trust the name.
        (None, Some(ArchiveFormat::Tar)) => ArchiveFormat::Tar,
        (None, _) => return Ok(ExtractOutcome::NotAnArchive),
    };

    std::fs::create_dir_all(dest).map_err(|e| DependError::fs(dest, e))?;

    with_spinner(&format!("extracting {}", filename), || match format {
        ArchiveFormat::TarGz => extract_tar(flate2::read::GzDecoder::new(open_buffered(archive)?), dest),
        ArchiveFormat::TarXz => extract_tar(xz2::read::XzDecoder::new(open_buffered(archive)?), dest),
        ArchiveFormat::TarBz2 => {
            extract_tar(bzip2::read::BzDecoder::new(open_buffered(archive)?), dest)
        }
        ArchiveFormat::TarZst => {
            let decoder = zstd::stream::read::Decoder::new(open_buffered(archive)?)
                .map_err(|e| DependError::Archive(format!("zstd init error: {}", e)))?;
            extract_tar(decoder, dest)
        }
        ArchiveFormat::Tar => extract_tar(open_buffered(archive)?, dest),
        ArchiveFormat::Zip => extract_zip(archive, dest),
    })?;

    output::detail(&format!("extracted {} to {}", filename, dest.display()));
    Ok(ExtractOutcome::Extracted)
}
