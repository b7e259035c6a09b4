//! Placement of an extracted dependency into the project tree
//!
//! Order of work inside one extracted archive:
//!
//! 1. descend through a lone wrapper directory (`repo-main/`)
//! 2. loose headers in the conventional include folders, then at the root
//! 3. platform binaries under `plugins/`, then loose at the root
//! 4. `components/` binaries (open.mp targets only)
//! 5. a depth-first walk that relocates every folder holding headers as a unit
//!
//! A file that fails to move is logged and recorded; the rest of the
//! dependency keeps installing. The extraction directory is removed at the end.

use crate::core::config::{ConfigKind, InstallTarget, ServerKind, TargetOs};
use crate::core::error::{DependError, Result};
use crate::core::output;
use crate::depends::fingerprint::{Fingerprint, FingerprintRecorder};
use crate::depends::mutate::{self, Mutation};
use crate::helpers::internal::fs_utils::{ensure_dir, move_path};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const HEADER_EXTENSION: &str = "inc";

/// Directory names the tree walk never descends into; they are handled by
/// the dedicated passes.
const RESERVED_DIRS: &[&str] = &["pawno", "qawno", "include", "components", "plugins"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    PluginBinary,
    IncludeHeader,
    RootArtifact,
    Ignored,
}

/// What happened to one file from the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedFile {
    pub source: PathBuf,
    /// `None` for ignored files
    pub destination: Option<PathBuf>,
    pub classification: Classification,
}

#[derive(Debug, Default)]
pub struct InstallReport {
    pub placed: Vec<PlacedFile>,
    pub fingerprints: Vec<Fingerprint>,
    pub failures: Vec<DependError>,
}

impl InstallReport {
    pub fn count(&self, classification: Classification) -> usize {
        self.placed
            .iter()
            .filter(|p| p.classification == classification)
            .count()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct Installer<'a> {
    target: &'a InstallTarget,
    recorder: FingerprintRecorder,
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Sorted entries of `dir` split into (files, directories). Unreadable
/// directories read as empty.
fn list_dir(dir: &Path) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return (Vec::new(), Vec::new());
    };
    let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok()).map(|e| e.path()).collect();
    paths.sort();
    paths.into_iter().partition(|p| !p.is_dir())
}

fn is_reserved(dir: &Path) -> bool {
    let name = file_name(dir).to_ascii_lowercase();
    RESERVED_DIRS.contains(&name.as_str())
}

/// GitHub source archives wrap everything in `repo-ref/`.
pub fn descend_wrapper(extracted: &Path) -> PathBuf {
    let mut current = extracted.to_path_buf();
    loop {
        let (files, dirs) = list_dir(&current);
        match dirs.as_slice() {
            [only] if files.is_empty() && !is_reserved(only) => current = only.clone(),
            _ => return current,
        }
    }
}

impl<'a> Installer<'a> {
    pub fn new(target: &'a InstallTarget, recorder: FingerprintRecorder) -> Self {
        Self { target, recorder }
    }

    /// Install everything under `extracted` and remove it afterwards.
    pub fn install(&self, extracted: &Path) -> InstallReport {
        let mut report = InstallReport::default();

        if let Err(e) = self.prepare_dirs() {
            output::error(&format!("cannot prepare project layout: {}", e));
            report.failures.push(e);
            return report;
        }

        let root = descend_wrapper(extracted);
        let mut walk_seeds = Vec::new();

        for folder in self.include_folders(&root) {
            let (files, dirs) = list_dir(&folder);
            self.place_headers(&files, &mut report);
            walk_seeds.extend(dirs);
        }

        let (root_files, root_dirs) = list_dir(&root);
        self.place_headers(&root_files, &mut report);

        self.place_plugins(&root.join("plugins"), &mut report);
        self.place_root_binaries(&root_files, &mut report);

        if let Some(components_dir) = &self.target.components_dir {
            self.place_components(&root.join("components"), components_dir, &mut report);
        }

        walk_seeds.extend(root_dirs.into_iter().filter(|d| !is_reserved(d)));
        self.relocate_header_folders(walk_seeds, &mut report);

        self.record_leftovers(&root, &mut report);

        if let Err(e) = std::fs::remove_dir_all(extracted) {
            output::warning(&format!("cannot remove {}: {}", extracted.display(), e));
        }

        report
    }

    fn prepare_dirs(&self) -> Result<()> {
        ensure_dir(&self.target.include_dir)?;
        ensure_dir(&self.target.plugins_dir)?;
        if let Some(components) = &self.target.components_dir {
            ensure_dir(components)?;
        }
        Ok(())
    }

    /// Conventional include folders inside the archive, the target's own first.
    fn include_folders(&self, root: &Path) -> Vec<PathBuf> {
        let own = self.target.server_kind;
        let other = match own {
            ServerKind::Samp => ServerKind::OpenMp,
            ServerKind::OpenMp => ServerKind::Samp,
        };
        [
            root.join(own.compiler_dir()).join("include"),
            root.join(other.compiler_dir()).join("include"),
            root.join("include"),
        ]
        .into_iter()
        .filter(|p| p.is_dir())
        .collect()
    }

    /// Move one file and fingerprint it at its destination.
    fn relocate(
        &self,
        source: &Path,
        dest_dir: &Path,
        classification: Classification,
        report: &mut InstallReport,
    ) -> bool {
        let dest = dest_dir.join(file_name(source));
        match move_path(source, &dest) {
            Ok(()) => {
                output::detail(&format!("{} -> {}", file_name(source), dest_dir.display()));
                if let Some(fp) = self.recorder.record(&dest) {
                    report.fingerprints.push(fp);
                }
                report.placed.push(PlacedFile {
                    source: source.to_path_buf(),
                    destination: Some(dest),
                    classification,
                });
                true
            }
            Err(e) => {
                output::error(&format!("cannot place {}: {}", source.display(), e));
                report.failures.push(e);
                false
            }
        }
    }

    fn place_headers(&self, files: &[PathBuf], report: &mut InstallReport) {
        for file in files.iter().filter(|f| has_extension(f, HEADER_EXTENSION)) {
            if self.relocate(file, &self.target.include_dir, Classification::IncludeHeader, report) {
                self.add_include(&file_stem(file), report);
            }
        }
    }

    fn place_plugins(&self, plugins: &Path, report: &mut InstallReport) {
        let (files, _) = list_dir(plugins);
        let ext = self.target.os.plugin_extension();
        for file in files.iter().filter(|f| has_extension(f, ext)) {
            if self.relocate(file, &self.target.plugins_dir, Classification::PluginBinary, report) {
                self.register_plugin(file, report);
            }
        }
    }

    fn is_root_artifact(&self, file: &Path) -> bool {
        let name = file_name(file).to_ascii_lowercase();
        self.target
            .root_patterns
            .iter()
            .any(|p| name.starts_with(p.as_str()))
    }

    fn place_root_binaries(&self, files: &[PathBuf], report: &mut InstallReport) {
        let ext = self.target.os.plugin_extension();
        for file in files.iter().filter(|f| has_extension(f, ext)) {
            if self.is_root_artifact(file) {
                self.relocate(file, &self.target.root, Classification::RootArtifact, report);
            } else if self.relocate(
                file,
                &self.target.plugins_dir,
                Classification::PluginBinary,
                report,
            ) {
                self.register_plugin(file, report);
            }
        }
    }

    fn place_components(&self, components: &Path, dest: &Path, report: &mut InstallReport) {
        let (files, _) = list_dir(components);
        let ext = self.target.os.plugin_extension();
        for file in files.iter().filter(|f| has_extension(f, ext)) {
            self.relocate(file, dest, Classification::PluginBinary, report);
        }
    }

    /// Depth-first walk over an explicit stack. A directory that directly
    /// holds a header moves into the include dir whole; otherwise its
    /// children are pushed.
    fn relocate_header_folders(&self, seeds: Vec<PathBuf>, report: &mut InstallReport) {
        let mut stack = seeds;
        stack.reverse();

        while let Some(dir) = stack.pop() {
            let (files, dirs) = list_dir(&dir);

            if !files.iter().any(|f| has_extension(f, HEADER_EXTENSION)) {
                stack.extend(dirs.into_iter().rev().filter(|d| !is_reserved(d)));
                continue;
            }

            let dest = self.target.include_dir.join(file_name(&dir));
            let headers = headers_under(&dir);
            match move_path(&dir, &dest) {
                Ok(()) => {
                    output::detail(&format!("{}/ -> {}", file_name(&dir), dest.display()));
                    for header in headers {
                        let Ok(rel) = header.strip_prefix(&dir) else {
                            continue;
                        };
                        let placed = dest.join(rel);
                        if let Some(fp) = self.recorder.record(&placed) {
                            report.fingerprints.push(fp);
                        }
                        report.placed.push(PlacedFile {
                            source: header,
                            destination: Some(placed),
                            classification: Classification::IncludeHeader,
                        });
                    }
                }
                Err(e) => {
                    output::error(&format!("cannot place {}: {}", dir.display(), e));
                    report.failures.push(e);
                }
            }
        }
    }

    fn record_leftovers(&self, root: &Path, report: &mut InstallReport) {
        for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
            if entry.file_type().is_file() {
                report.placed.push(PlacedFile {
                    source: entry.path().to_path_buf(),
                    destination: None,
                    classification: Classification::Ignored,
                });
            }
        }
    }

    fn add_include(&self, name: &str, report: &mut InstallReport) {
        let Some(source) = &self.target.entry_source else {
            output::warning(&format!(
                "no entry source configured; add #include <{}> yourself",
                name
            ));
            return;
        };
        match mutate::insert_include(source, name, self.target.server_kind.anchor_include()) {
            Ok(Mutation::Unchanged) => {}
            Ok(_) => output::detail(&format!("#include <{}> -> {}", name, source.display())),
            Err(e) => {
                output::error(&format!("cannot update {}: {}", source.display(), e));
                report.failures.push(e);
            }
        }
    }

    /// Name written to the server config. The Linux SA-MP server loads
    /// `plugins` entries verbatim; Windows and open.mp append the suffix.
    fn plugin_entry(&self, file: &Path) -> String {
        match (self.target.os, self.target.config_kind) {
            (TargetOs::Linux, ConfigKind::CfgLines) => file_name(file),
            _ => file_stem(file),
        }
    }

    fn register_plugin(&self, file: &Path, report: &mut InstallReport) {
        let config = &self.target.config_path;
        let name = self.plugin_entry(file);
        match mutate::register_plugin(config, self.target.config_kind, &name) {
            Ok(Mutation::Unchanged) => {}
            Ok(_) => output::detail(&format!("registered {} in {}", name, config.display())),
            Err(e) => {
                output::error(&format!("cannot update {}: {}", config.display(), e));
                report.failures.push(e);
            }
        }
    }
}

fn headers_under(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && has_extension(e.path(), HEADER_EXTENSION))
        .map(|e| e.into_path())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn samp_project(dir: &TempDir) -> InstallTarget {
        let root = dir.path().join("project");
        touch(&root.join("server.cfg"), "hostname test\n");
        touch(&root.join("gamemodes/main.pwn"), "#include <a_samp>\n\nmain() {}\n");
        InstallTarget::new(&root, ServerKind::Samp, TargetOs::Linux)
            .with_entry_source("gamemodes/main.pwn")
    }

    fn read(path: &Path) -> String {
        std::fs::read_to_string(path).unwrap()
    }

    #[test]
    fn test_descend_wrapper() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("sscanf-main/inner/sscanf.inc"), "");
        assert_eq!(descend_wrapper(dir.path()), dir.path().join("sscanf-main/inner"));

        touch(&dir.path().join("README.md"), "");
        assert_eq!(descend_wrapper(dir.path()), dir.path());
    }

    #[test]
    fn test_descend_stops_at_reserved_folder() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("plugins/sscanf.so"), "");
        assert_eq!(descend_wrapper(dir.path()), dir.path());
    }

    #[test]
    fn test_full_samp_package() {
        let dir = TempDir::new().unwrap();
        let target = samp_project(&dir);
        let extracted = dir.path().join("extract");
        touch(&extracted.join("sscanf-2.13/pawno/include/sscanf2.inc"), "native sscanf();");
        touch(&extracted.join("sscanf-2.13/plugins/sscanf.so"), "ELF");
        touch(&extracted.join("sscanf-2.13/plugins/sscanf.dll"), "MZ");
        touch(&extracted.join("sscanf-2.13/libsscanf_helper.so"), "ELF");
        touch(&extracted.join("sscanf-2.13/README.md"), "# sscanf");

        let report = Installer::new(&target, FingerprintRecorder::default()).install(&extracted);

        assert!(report.is_clean(), "{:?}", report.failures);
        assert!(target.include_dir.join("sscanf2.inc").is_file());
        assert!(target.plugins_dir.join("sscanf.so").is_file());
        assert!(!target.plugins_dir.join("sscanf.dll").exists());
        assert!(target.root.join("libsscanf_helper.so").is_file());
        assert!(!extracted.exists());

        assert_eq!(read(&target.config_path), "hostname test\nplugins sscanf.so\n");
        assert!(read(&target.entry_source.clone().unwrap()).contains("#include <a_samp>\n#include <sscanf2>\n"));

        assert_eq!(report.count(Classification::IncludeHeader), 1);
        assert_eq!(report.count(Classification::PluginBinary), 1);
        assert_eq!(report.count(Classification::RootArtifact), 1);
        assert_eq!(report.count(Classification::Ignored), 2);
        assert_eq!(report.fingerprints.len(), 3);
    }

    #[test]
    fn test_loose_root_plugin_registered_once() {
        let dir = TempDir::new().unwrap();
        let target = samp_project(&dir);
        let extracted = dir.path().join("extract");
        touch(&extracted.join("streamer.so"), "ELF");
        touch(&extracted.join("plugins/streamer.so"), "ELF");

        let report = Installer::new(&target, FingerprintRecorder::default()).install(&extracted);

        assert!(report.is_clean());
        assert_eq!(read(&target.config_path), "hostname test\nplugins streamer.so\n");
    }

    #[test]
    fn test_windows_plugin_registered_by_stem() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("project");
        touch(&root.join("server.cfg"), "plugins streamer.dll\n");
        let target = InstallTarget::new(&root, ServerKind::Samp, TargetOs::Windows);
        let extracted = dir.path().join("extract");
        touch(&extracted.join("plugins/streamer.dll"), "MZ");
        touch(&extracted.join("plugins/sscanf.dll"), "MZ");

        let report = Installer::new(&target, FingerprintRecorder::default()).install(&extracted);

        assert!(report.is_clean());
        assert_eq!(read(&target.config_path), "plugins streamer.dll sscanf\n");
    }

    #[test]
    fn test_linux_entry_matches_existing_stem() {
        let dir = TempDir::new().unwrap();
        let target = samp_project(&dir);
        std::fs::write(&target.config_path, "plugins sscanf\n").unwrap();
        let extracted = dir.path().join("extract");
        touch(&extracted.join("plugins/sscanf.so"), "ELF");

        Installer::new(&target, FingerprintRecorder::default()).install(&extracted);

        assert_eq!(read(&target.config_path), "plugins sscanf\n");
    }

    #[test]
    fn test_nested_include_folders_move_as_units() {
        let dir = TempDir::new().unwrap();
        let target = samp_project(&dir);
        let extracted = dir.path().join("extract");
        touch(&extracted.join("YSI-Includes/YSI_Coding/y_hooks.inc"), "");
        touch(&extracted.join("YSI-Includes/YSI_Coding/y_hooks/impl.inc"), "");
        touch(&extracted.join("YSI-Includes/deep/er/YSI_Data/y_iterate.inc"), "");
        touch(&extracted.join("YSI-Includes/docs/readme.txt"), "");

        let report = Installer::new(&target, FingerprintRecorder::default()).install(&extracted);

        assert!(report.is_clean());
        assert!(target.include_dir.join("YSI_Coding/y_hooks.inc").is_file());
        assert!(target.include_dir.join("YSI_Coding/y_hooks/impl.inc").is_file());
        assert!(target.include_dir.join("YSI_Data/y_iterate.inc").is_file());
        assert_eq!(report.count(Classification::IncludeHeader), 3);
        // Folder relocation does not touch the entry source.
        assert_eq!(read(&target.entry_source.clone().unwrap()), "#include <a_samp>\n\nmain() {}\n");
    }

    #[test]
    fn test_include_subfolder_of_conventional_dir() {
        let dir = TempDir::new().unwrap();
        let target = samp_project(&dir);
        let extracted = dir.path().join("extract");
        touch(&extracted.join("pkg/qawno/include/mylib/core.inc"), "");
        touch(&extracted.join("pkg/qawno/include/mylib.inc"), "");

        Installer::new(&target, FingerprintRecorder::default()).install(&extracted);

        assert!(target.include_dir.join("mylib.inc").is_file());
        assert!(target.include_dir.join("mylib/core.inc").is_file());
    }

    #[test]
    fn test_open_mp_components_and_json() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("project");
        touch(&root.join("config.json"), r#"{"pawn": {"legacy_plugins": []}}"#);
        let target = InstallTarget::new(&root, ServerKind::OpenMp, TargetOs::Windows);

        let extracted = dir.path().join("extract");
        touch(&extracted.join("components/Pawn.RakNet.dll"), "MZ");
        touch(&extracted.join("plugins/crashdetect.dll"), "MZ");
        touch(&extracted.join("vcruntime140.dll"), "MZ");

        let report = Installer::new(&target, FingerprintRecorder::default()).install(&extracted);

        assert!(report.is_clean());
        assert!(root.join("components/Pawn.RakNet.dll").is_file());
        assert!(root.join("plugins/crashdetect.dll").is_file());
        assert!(root.join("vcruntime140.dll").is_file());

        let doc: serde_json::Value = serde_json::from_str(&read(&root.join("config.json"))).unwrap();
        assert_eq!(doc["pawn"]["legacy_plugins"], serde_json::json!(["crashdetect"]));
    }

    #[test]
    fn test_missing_entry_source_is_not_a_failure() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("project");
        let target = InstallTarget::new(&root, ServerKind::Samp, TargetOs::Linux);
        let extracted = dir.path().join("extract");
        touch(&extracted.join("foo.inc"), "");

        let report = Installer::new(&target, FingerprintRecorder::default()).install(&extracted);

        assert!(report.is_clean());
        assert!(target.include_dir.join("foo.inc").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn test_unwritable_destination_recorded_and_install_continues() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let target = samp_project(&dir);
        let extracted = dir.path().join("extract");
        touch(&extracted.join("plugins/a.so"), "ELF");
        touch(&extracted.join("b.inc"), "");

        std::fs::create_dir_all(&target.plugins_dir).unwrap();
        std::fs::set_permissions(&target.plugins_dir, std::fs::Permissions::from_mode(0o555)).unwrap();
        // Root ignores permission bits; nothing to observe there.
        let writable = std::fs::write(target.plugins_dir.join(".writable"), "").is_ok();

        let report = Installer::new(&target, FingerprintRecorder::default()).install(&extracted);

        std::fs::set_permissions(&target.plugins_dir, std::fs::Permissions::from_mode(0o755)).unwrap();
        if !writable {
            assert_eq!(report.failures.len(), 1);
        }
        assert!(target.include_dir.join("b.inc").is_file());
    }
}
