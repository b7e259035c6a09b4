//! Idempotent edits to the server config and the entry source file
//!
//! - `server.cfg`: the plugin name is appended to the `plugins` line (or a new
//!   `plugins` line is added) unless a `plugins` line already lists it.
//! - `config.json`: the name is pushed onto `pawn.legacy_plugins` unless present.
//!   A malformed document is replaced by a fresh object.
//! - entry source: `#include <name>` goes after the anchor include, else after
//!   the last `#include`, else at the top.
//!
//! Missing files are created. Unchanged content is never rewritten.

use crate::core::config::ConfigKind;
use crate::core::error::{DependError, Result};
use crate::core::output;
use crate::helpers::internal::fs_utils::write_atomic;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;

/// Directive keyword in line-oriented server configs
const PLUGIN_DIRECTIVE: &str = "plugins";

/// What a mutation did to the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Unchanged,
    Updated,
    Created,
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(DependError::fs(path, e)),
    }
}

fn line_ending(content: &str) -> &'static str {
    if content.contains("\r\n") { "\r\n" } else { "\n" }
}

fn join_lines(lines: &[String], eol: &str) -> String {
    let mut out = lines.join(eol);
    out.push_str(eol);
    out
}

/// `sscanf.so` and `sscanf` name the same plugin.
fn plugin_stem(name: &str) -> &str {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(".dll") || lower.ends_with(".so") {
        name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(name)
    } else {
        name
    }
}

fn same_plugin(a: &str, b: &str) -> bool {
    plugin_stem(a).eq_ignore_ascii_case(plugin_stem(b))
}

fn commit(path: &Path, original: Option<&str>, updated: Option<String>) -> Result<Mutation> {
    match (original, updated) {
        (_, None) => Ok(Mutation::Unchanged),
        (None, Some(content)) => {
            write_atomic(path, &content)?;
            Ok(Mutation::Created)
        }
        (Some(_), Some(content)) => {
            write_atomic(path, &content)?;
            Ok(Mutation::Updated)
        }
    }
}

/// Register `name` in the server config, picking the format from `kind`.
pub fn register_plugin(path: &Path, kind: ConfigKind, name: &str) -> Result<Mutation> {
    match kind {
        ConfigKind::CfgLines => register_plugin_cfg(path, name),
        ConfigKind::Json => register_plugin_json(path, name),
    }
}

pub fn register_plugin_cfg(path: &Path, name: &str) -> Result<Mutation> {
    let original = read_optional(path)?;
    let updated = cfg_with_plugin(original.as_deref().unwrap_or_default(), name);
    commit(path, original.as_deref(), updated)
}

fn is_plugin_directive(line: &str) -> bool {
    line.split_whitespace()
        .next()
        .is_some_and(|key| key.eq_ignore_ascii_case(PLUGIN_DIRECTIVE))
}

fn cfg_with_plugin(content: &str, name: &str) -> Option<String> {
    let mut lines: Vec<String> = content.lines().map(str::to_string).collect();

    let listed = lines
        .iter()
        .filter(|l| is_plugin_directive(l))
        .flat_map(|l| l.split_whitespace().skip(1))
        .any(|existing| same_plugin(existing, name));
    if listed {
        return None;
    }

    match lines.iter_mut().find(|l| is_plugin_directive(l)) {
        Some(line) => {
            let trimmed = line.trim_end().to_string();
            *line = format!("{} {}", trimmed, name);
        }
        None => lines.push(format!("{} {}", PLUGIN_DIRECTIVE, name)),
    }

    Some(join_lines(&lines, line_ending(content)))
}

pub fn register_plugin_json(path: &Path, name: &str) -> Result<Mutation> {
    let original = read_optional(path)?;

    let mut doc = match original.as_deref().map(serde_json::from_str::<Value>) {
        Some(Ok(Value::Object(map))) => map,
        Some(Ok(_)) => {
            output::warning(&format!(
                "{} is not a JSON object; starting from an empty one",
                path.display()
            ));
            Map::new()
        }
        Some(Err(e)) => {
            output::warning(&format!(
                "cannot parse {} ({}); starting from an empty object",
                path.display(),
                e
            ));
            Map::new()
        }
        None => Map::new(),
    };

    if !doc.get("pawn").is_some_and(Value::is_object) {
        doc.insert("pawn".to_string(), Value::Object(Map::new()));
    }
    let pawn = doc
        .get_mut("pawn")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| malformed(path, "pawn"))?;

    if !pawn.get("legacy_plugins").is_some_and(Value::is_array) {
        pawn.insert("legacy_plugins".to_string(), Value::Array(Vec::new()));
    }
    let plugins = pawn
        .get_mut("legacy_plugins")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| malformed(path, "pawn.legacy_plugins"))?;

    if plugins
        .iter()
        .filter_map(Value::as_str)
        .any(|existing| same_plugin(existing, name))
    {
        return Ok(Mutation::Unchanged);
    }
    plugins.push(Value::String(name.to_string()));

    let content = to_pretty_json(&Value::Object(doc)).map_err(|e| DependError::ConfigParse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    commit(path, original.as_deref(), Some(content))
}

fn malformed(path: &Path, key: &str) -> DependError {
    DependError::ConfigParse {
        path: path.to_path_buf(),
        message: format!("cannot set up `{}`", key),
    }
}

fn to_pretty_json(value: &Value) -> std::result::Result<String, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    let mut out = String::from_utf8_lossy(&buf).into_owned();
    out.push('\n');
    Ok(out)
}

/// Target of an `#include` line: `<a_samp>`, `"foo.inc"` or a bare word.
fn include_target(line: &str) -> Option<&str> {
    let rest = line.trim_start().strip_prefix("#include")?.trim();
    let inner = if let Some(r) = rest.strip_prefix('<') {
        r.split_once('>').map(|(t, _)| t)?
    } else if let Some(r) = rest.strip_prefix('"') {
        r.split_once('"').map(|(t, _)| t)?
    } else {
        rest.split_whitespace().next()?
    };
    Some(inner.trim())
}

fn same_include(a: &str, b: &str) -> bool {
    let norm = |s: &str| {
        let s = s.replace('\\', "/");
        let lower = s.to_ascii_lowercase();
        match lower.strip_suffix(".inc") {
            Some(stem) => stem.to_string(),
            None => lower,
        }
    };
    norm(a) == norm(b)
}

/// Add `#include <name>` to the entry source unless it is already there.
pub fn insert_include(path: &Path, name: &str, anchor: &str) -> Result<Mutation> {
    let original = read_optional(path)?;
    let updated = source_with_include(original.as_deref().unwrap_or_default(), name, anchor);
    commit(path, original.as_deref(), updated)
}

fn source_with_include(content: &str, name: &str, anchor: &str) -> Option<String> {
    let mut lines: Vec<String> = content.lines().map(str::to_string).collect();

    if lines
        .iter()
        .filter_map(|l| include_target(l))
        .any(|t| same_include(t, name))
    {
        return None;
    }

    let anchor_at = lines
        .iter()
        .position(|l| include_target(l).is_some_and(|t| same_include(t, anchor)));
    let last_include_at = lines.iter().rposition(|l| include_target(l).is_some());

    let directive = format!("#include <{}>", name);
    match anchor_at.or(last_include_at) {
        Some(idx) => lines.insert(idx + 1, directive),
        None => lines.insert(0, directive),
    }

    Some(join_lines(&lines, line_ending(content)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // ----- server.cfg -----

    #[test]
    fn test_cfg_appends_to_existing_directive() {
        let out = cfg_with_plugin("hostname Test\nplugins streamer\nport 7777\n", "sscanf").unwrap();
        assert_eq!(out, "hostname Test\nplugins streamer sscanf\nport 7777\n");
    }

    #[test]
    fn test_cfg_adds_directive_when_missing() {
        let out = cfg_with_plugin("hostname Test\n", "sscanf").unwrap();
        assert_eq!(out, "hostname Test\nplugins sscanf\n");
    }

    #[test]
    fn test_cfg_already_listed_with_extension() {
        assert!(cfg_with_plugin("plugins sscanf.so streamer\n", "sscanf").is_none());
    }

    #[test]
    fn test_cfg_other_keys_do_not_count() {
        let out = cfg_with_plugin("hostname sscanf server\n", "sscanf").unwrap();
        assert!(out.ends_with("plugins sscanf\n"));
    }

    #[test]
    fn test_cfg_keeps_crlf() {
        let out = cfg_with_plugin("hostname x\r\nplugins a\r\n", "b").unwrap();
        assert_eq!(out, "hostname x\r\nplugins a b\r\n");
    }

    #[test]
    fn test_register_cfg_idempotent() {
        let dir = TempDir::new().unwrap();
        let cfg = dir.path().join("server.cfg");
        std::fs::write(&cfg, "echo Executing\nplugins crashdetect\n").unwrap();

        assert_eq!(register_plugin_cfg(&cfg, "sscanf").unwrap(), Mutation::Updated);
        let once = std::fs::read_to_string(&cfg).unwrap();
        assert_eq!(register_plugin_cfg(&cfg, "sscanf").unwrap(), Mutation::Unchanged);
        assert_eq!(std::fs::read_to_string(&cfg).unwrap(), once);
        assert_eq!(once, "echo Executing\nplugins crashdetect sscanf\n");
    }

    #[test]
    fn test_register_cfg_creates_missing_file() {
        let dir = TempDir::new().unwrap();
        let cfg = dir.path().join("server.cfg");

        assert_eq!(
            register_plugin(&cfg, ConfigKind::CfgLines, "streamer").unwrap(),
            Mutation::Created
        );
        assert_eq!(std::fs::read_to_string(&cfg).unwrap(), "plugins streamer\n");
    }

    // ----- config.json -----

    #[test]
    fn test_json_adds_to_existing_array_and_keeps_order() {
        let dir = TempDir::new().unwrap();
        let json = dir.path().join("config.json");
        std::fs::write(
            &json,
            r#"{"name": "srv", "pawn": {"main_scripts": ["main"], "legacy_plugins": ["crashdetect"]}, "zeta": 1}"#,
        )
        .unwrap();

        assert_eq!(register_plugin_json(&json, "sscanf").unwrap(), Mutation::Updated);

        let content = std::fs::read_to_string(&json).unwrap();
        let doc: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(
            doc["pawn"]["legacy_plugins"],
            serde_json::json!(["crashdetect", "sscanf"])
        );
        assert_eq!(doc["pawn"]["main_scripts"], serde_json::json!(["main"]));
        assert!(content.find("\"name\"").unwrap() < content.find("\"zeta\"").unwrap());
        assert!(content.contains("\n    \"name\""));
    }

    #[test]
    fn test_json_idempotent() {
        let dir = TempDir::new().unwrap();
        let json = dir.path().join("config.json");
        std::fs::write(&json, "{}").unwrap();

        register_plugin_json(&json, "sscanf").unwrap();
        let once = std::fs::read_to_string(&json).unwrap();
        assert_eq!(register_plugin_json(&json, "sscanf").unwrap(), Mutation::Unchanged);
        assert_eq!(std::fs::read_to_string(&json).unwrap(), once);
    }

    #[test]
    fn test_json_malformed_recovers() {
        let dir = TempDir::new().unwrap();
        let json = dir.path().join("config.json");
        std::fs::write(&json, "{ this is not json").unwrap();

        assert_eq!(register_plugin_json(&json, "streamer").unwrap(), Mutation::Updated);
        let doc: Value = serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
        assert_eq!(doc["pawn"]["legacy_plugins"], serde_json::json!(["streamer"]));
    }

    #[test]
    fn test_json_replaces_non_array_plugins() {
        let dir = TempDir::new().unwrap();
        let json = dir.path().join("config.json");
        std::fs::write(&json, r#"{"pawn": {"legacy_plugins": "oops"}}"#).unwrap();

        register_plugin_json(&json, "streamer").unwrap();
        let doc: Value = serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
        assert_eq!(doc["pawn"]["legacy_plugins"], serde_json::json!(["streamer"]));
    }

    #[test]
    fn test_json_creates_missing_file() {
        let dir = TempDir::new().unwrap();
        let json = dir.path().join("config.json");

        assert_eq!(
            register_plugin(&json, ConfigKind::Json, "sscanf").unwrap(),
            Mutation::Created
        );
        let doc: Value = serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
        assert_eq!(doc["pawn"]["legacy_plugins"], serde_json::json!(["sscanf"]));
    }

    // ----- #include -----

    #[test]
    fn test_include_after_anchor() {
        let src = "#include <a_samp>\n#include <zcmd>\n\nmain() {}\n";
        let out = source_with_include(src, "sscanf2", "a_samp").unwrap();
        assert_eq!(out, "#include <a_samp>\n#include <sscanf2>\n#include <zcmd>\n\nmain() {}\n");
    }

    #[test]
    fn test_include_after_last_include_without_anchor() {
        let src = "// header\n#include <foo>\n#include \"bar.inc\"\n\nmain() {}\n";
        let out = source_with_include(src, "sscanf2", "open.mp").unwrap();
        assert_eq!(
            out,
            "// header\n#include <foo>\n#include \"bar.inc\"\n#include <sscanf2>\n\nmain() {}\n"
        );
    }

    #[test]
    fn test_include_prepended_when_no_includes() {
        let out = source_with_include("main() {}\n", "sscanf2", "a_samp").unwrap();
        assert_eq!(out, "#include <sscanf2>\nmain() {}\n");
    }

    #[test]
    fn test_include_already_present_variants() {
        assert!(source_with_include("#include <sscanf2>\n", "sscanf2", "a_samp").is_none());
        assert!(source_with_include("  #include \"sscanf2.inc\"\n", "sscanf2", "a_samp").is_none());
        assert!(source_with_include("#include <SSCANF2>\n", "sscanf2", "a_samp").is_none());
    }

    #[test]
    fn test_include_anchor_open_mp() {
        let src = "#define X\n#include <open.mp>\n";
        let out = source_with_include(src, "streamer", "open.mp").unwrap();
        assert_eq!(out, "#define X\n#include <open.mp>\n#include <streamer>\n");
    }

    #[test]
    fn test_insert_include_idempotent_on_disk() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("gamemodes/main.pwn");
        std::fs::create_dir_all(src.parent().unwrap()).unwrap();
        std::fs::write(&src, "#include <a_samp>\n\nmain() {}\n").unwrap();

        assert_eq!(insert_include(&src, "sscanf2", "a_samp").unwrap(), Mutation::Updated);
        let once = std::fs::read_to_string(&src).unwrap();
        assert_eq!(insert_include(&src, "sscanf2", "a_samp").unwrap(), Mutation::Unchanged);
        assert_eq!(std::fs::read_to_string(&src).unwrap(), once);
    }

    #[test]
    fn test_insert_include_creates_missing_source() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("gamemodes/new.pwn");

        assert_eq!(insert_include(&src, "sscanf2", "a_samp").unwrap(), Mutation::Created);
        assert_eq!(std::fs::read_to_string(&src).unwrap(), "#include <sscanf2>\n");
    }
}
