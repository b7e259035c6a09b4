//! Shared fixtures for integration tests: project trees and in-memory archives.

#![allow(dead_code)]

use pawn_deps::{InstallTarget, ServerKind, TargetOs};
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

/// A SA-MP project with a server.cfg and an entry source.
pub fn create_test_env() -> (TempDir, InstallTarget) {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "server.cfg", "echo Executing Server Config...\nhostname test\n");
    write(dir.path(), "gamemodes/main.pwn", "#include <a_samp>\n\nmain() {}\n");
    write(
        dir.path(),
        "watchdogs.toml",
        "[general]\nos = \"linux\"\nconfig = \"server.cfg\"\n\n[compiler]\ninput = \"gamemodes/main.pwn\"\n",
    );
    std::fs::create_dir_all(dir.path().join("pawno/include")).unwrap();

    let target = InstallTarget::new(dir.path(), ServerKind::Samp, TargetOs::Linux)
        .with_entry_source("gamemodes/main.pwn");
    (dir, target)
}

pub fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

pub fn read(root: &Path, rel: &str) -> String {
    std::fs::read_to_string(root.join(rel)).unwrap()
}

pub fn tar_gz_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(1_700_000_000);
        header.set_cksum();
        builder.append_data(&mut header, name, *content).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

pub fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut buf = std::io::Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buf);
        let opts = zip::write::SimpleFileOptions::default();
        for (name, content) in files {
            zip.start_file(*name, opts).unwrap();
            zip.write_all(content).unwrap();
        }
        zip.finish().unwrap();
    }
    buf.into_inner()
}
