use ignore::WalkBuilder;
use ignore::overrides::Override;
use std::path::{Component, Path, PathBuf};
use std::sync::mpsc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

pub const CLASS_SUFFIX: &str = ".class";
pub const SOURCE_SUFFIX: &str = ".java";

/// `org.example.Foo` -> `org/example/Foo`. Already internal names pass through.
pub fn to_internal_name(class_name: &str) -> String {
    class_name.trim().replace('.', "/")
}

pub fn to_dotted_name(internal: &str) -> String {
    internal.replace('/', ".")
}

pub fn class_name_to_class_path(class_name: &str) -> String {
    format!("{}{CLASS_SUFFIX}", to_internal_name(class_name))
}

/// Inverse of [`class_name_to_class_path`]; `None` for anything that is not a
/// class file path.
pub fn class_path_to_class_name(rel_path: &str) -> Option<String> {
    let normalized = rel_path.replace('\\', "/");
    let stem = normalized.strip_suffix(CLASS_SUFFIX)?;
    if stem.is_empty() || stem.ends_with('/') {
        return None;
    }
    Some(stem.trim_start_matches("./").to_string())
}

/// `a/b/Outer$Inner$Deep` -> `a/b/Outer`.
pub fn top_level_name(name: &str) -> &str {
    match name.find('$') {
        Some(idx) => &name[..idx],
        None => name,
    }
}

/// Modification time in nanoseconds since the epoch; 0 when unavailable.
pub fn modified_nanos(path: &Path) -> u64 {
    let mtime = path
        .metadata()
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH);
    let nanos = mtime
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    u64::try_from(nanos).unwrap_or(u64::MAX)
}

/// Path of `path` below `base` with `/` separators.
pub fn relative_slash_path(base: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(base).ok()?;
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().to_string()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// All regular files below `base`, optionally narrowed by glob overrides.
/// Output is sorted so callers see a stable order.
pub fn walk_files(base: &Path, overrides: Option<Override>) -> Vec<PathBuf> {
    let (tx, rx) = mpsc::channel();

    let mut builder = WalkBuilder::new(base);
    builder.standard_filters(false);
    if let Some(ov) = overrides {
        builder.overrides(ov);
    }
    let walker = builder.build_parallel();

    walker.run(|| {
        let tx = tx.clone();
        Box::new(move |entry| {
            match entry {
                Ok(entry) if entry.file_type().is_some_and(|t| t.is_file()) => {
                    let _ = tx.send(entry.path().to_path_buf());
                }
                Ok(_) => {}
                Err(err) => warn!(error = %err, "skipping unreadable entry"),
            }
            ignore::WalkState::Continue
        })
    });

    drop(tx);
    let mut files: Vec<PathBuf> = rx.iter().collect();
    files.sort();
    files
}

/// Every class file under `base` as `(internal class name, absolute path)`.
pub fn scan_class_files(base: &Path) -> Vec<(String, PathBuf)> {
    walk_files(base, None)
        .into_iter()
        .filter_map(|path| {
            let rel = relative_slash_path(base, &path)?;
            let name = class_path_to_class_name(&rel)?;
            Some((name, path))
        })
        .collect()
}

/// Every `.java` file under `base` as `(internal class name, absolute path)`.
pub fn scan_source_files(base: &Path, overrides: Option<Override>) -> Vec<(String, PathBuf)> {
    walk_files(base, overrides)
        .into_iter()
        .filter_map(|path| {
            let rel = relative_slash_path(base, &path)?;
            let stem = rel.strip_suffix(SOURCE_SUFFIX)?;
            Some((stem.to_string(), path))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn class_name_maps_to_relative_path() {
        assert_eq!(
            class_name_to_class_path("org.apache.tools.Main"),
            "org/apache/tools/Main.class"
        );
        assert_eq!(class_name_to_class_path("a/b/C$D"), "a/b/C$D.class");
    }

    #[test]
    fn class_path_round_trips_through_name() {
        assert_eq!(
            class_path_to_class_name("org\\example\\A$1.class").as_deref(),
            Some("org/example/A$1")
        );
        assert_eq!(class_path_to_class_name("org/example/A.java"), None);
        assert_eq!(class_path_to_class_name(".class"), None);
    }

    #[test]
    fn top_level_name_strips_inner_suffix() {
        assert_eq!(top_level_name("a/Outer$Inner$Deep"), "a/Outer");
        assert_eq!(top_level_name("a/Plain"), "a/Plain");
    }

    #[test]
    fn walk_of_missing_base_yields_nothing() {
        let base = tempfile::tempdir().unwrap();
        assert!(walk_files(&base.path().join("absent"), None).is_empty());
    }

    #[test]
    fn scan_class_files_finds_nested_classes() {
        let base = tempfile::tempdir().unwrap();
        fs::create_dir_all(base.path().join("org/example")).unwrap();
        fs::write(base.path().join("org/example/A.class"), b"").unwrap();
        fs::write(base.path().join("org/example/A$In.class"), b"").unwrap();
        fs::write(base.path().join("org/example/notes.txt"), b"").unwrap();

        let found: Vec<String> = scan_class_files(base.path())
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(found, vec!["org/example/A$In", "org/example/A"]);
    }
}
