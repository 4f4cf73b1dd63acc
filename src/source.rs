//! Where class artifacts come from.
//!
//! The closure engine only sees [`ArtifactSource`]: a lookup from internal
//! class name to the bytes of its class file. Directories and jar archives
//! are the two concrete sources; a [`ClassPath`] chains several of them.

use memmap2::Mmap;
use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use zip::ZipArchive;
use zip::result::ZipError;

use crate::error::{DependError, DependResult};
use crate::scan::class_name_to_class_path;

/// Bytes of one compiled class, read once and dropped after extraction.
#[derive(Debug, Clone)]
pub struct ClassArtifact {
    pub name: String,
    pub origin: PathBuf,
    pub bytes: Vec<u8>,
}

pub trait ArtifactSource: Send + Sync {
    /// `Ok(None)` when nothing provides `name`. An `Err` means something was
    /// there but could not be read.
    fn load(&self, name: &str) -> io::Result<Option<ClassArtifact>>;

    /// File that provides `name`: the class file itself or the containing jar.
    fn locate(&self, name: &str) -> Option<PathBuf>;
}

#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(class_name_to_class_path(name))
    }
}

impl ArtifactSource for DirectorySource {
    fn load(&self, name: &str) -> io::Result<Option<ClassArtifact>> {
        let path = self.path_of(name);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(ClassArtifact {
                name: name.to_string(),
                origin: path,
                bytes,
            })),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn locate(&self, name: &str) -> Option<PathBuf> {
        let path = self.path_of(name);
        path.is_file().then_some(path)
    }
}

pub struct JarSource {
    path: PathBuf,
    archive: Mutex<ZipArchive<Cursor<Mmap>>>,
}

impl JarSource {
    pub fn open(path: impl Into<PathBuf>) -> DependResult<Self> {
        let path = path.into();
        let file = File::open(&path).map_err(|e| DependError::io(&path, e))?;
        // SAFETY: The file is opened read-only and the map lives as long as the archive.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| DependError::io(&path, e))?;
        let archive = ZipArchive::new(Cursor::new(mmap))
            .map_err(|e| DependError::io(&path, io::Error::new(io::ErrorKind::InvalidData, e)))?;
        Ok(Self {
            path,
            archive: Mutex::new(archive),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Internal names of every class stored in the jar.
    pub fn class_names(&self) -> io::Result<Vec<String>> {
        let archive = self.lock()?;
        let mut names: Vec<String> = archive
            .file_names()
            .filter_map(crate::scan::class_path_to_class_name)
            .collect();
        names.sort();
        Ok(names)
    }

    fn lock(&self) -> io::Result<std::sync::MutexGuard<'_, ZipArchive<Cursor<Mmap>>>> {
        self.archive
            .lock()
            .map_err(|_| io::Error::other(format!("jar lock poisoned: {}", self.path.display())))
    }
}

impl std::fmt::Debug for JarSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JarSource").field("path", &self.path).finish()
    }
}

impl ArtifactSource for JarSource {
    fn load(&self, name: &str) -> io::Result<Option<ClassArtifact>> {
        let entry_name = class_name_to_class_path(name);
        let mut archive = self.lock()?;
        let mut entry = match archive.by_name(&entry_name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(io::Error::new(io::ErrorKind::InvalidData, e)),
        };
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes)?;
        Ok(Some(ClassArtifact {
            name: name.to_string(),
            origin: PathBuf::from(format!("{}!/{entry_name}", self.path.display())),
            bytes,
        }))
    }

    fn locate(&self, name: &str) -> Option<PathBuf> {
        let entry_name = class_name_to_class_path(name);
        let mut archive = self.lock().ok()?;
        let found = archive.by_name(&entry_name).is_ok();
        found.then(|| self.path.clone())
    }
}

/// Ordered list of sources; the first one that knows a class wins.
#[derive(Default)]
pub struct ClassPath {
    sources: Vec<Box<dyn ArtifactSource>>,
}

impl ClassPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, source: impl ArtifactSource + 'static) {
        self.sources.push(Box::new(source));
    }

    /// Directories become [`DirectorySource`]s, anything else is opened as a
    /// jar. Entries that do not exist are skipped.
    pub fn from_paths<P: AsRef<Path>>(paths: &[P]) -> DependResult<Self> {
        let mut cp = Self::new();
        for p in paths {
            let p = p.as_ref();
            if p.is_dir() {
                cp.push(DirectorySource::new(p));
            } else if p.is_file() {
                cp.push(JarSource::open(p)?);
            } else {
                tracing::debug!(path = %p.display(), "skipping missing class path entry");
            }
        }
        Ok(cp)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl ArtifactSource for ClassPath {
    /// First source that provides `name`. A read failure only surfaces when no
    /// later source provides it either.
    fn load(&self, name: &str) -> io::Result<Option<ClassArtifact>> {
        let mut failure = None;
        for source in &self.sources {
            match source.load(name) {
                Ok(Some(artifact)) => return Ok(Some(artifact)),
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(class = name, error = %e, "class path entry unreadable, trying next");
                    failure.get_or_insert(e);
                }
            }
        }
        match failure {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }

    fn locate(&self, name: &str) -> Option<PathBuf> {
        self.sources.iter().find_map(|s| s.locate(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::{FileOptions, ZipWriter};

    fn write_jar(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut zip = ZipWriter::new(file);
        for (name, content) in entries {
            zip.start_file(*name, FileOptions::default()).unwrap();
            zip.write_all(content).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn directory_source_reports_missing_as_none() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("a")).unwrap();
        std::fs::write(dir.path().join("a/B.class"), b"bytes").unwrap();

        let src = DirectorySource::new(dir.path());
        let found = src.load("a.B").unwrap().unwrap();
        assert_eq!(found.bytes, b"bytes");
        assert_eq!(found.origin, dir.path().join("a/B.class"));
        assert!(src.load("a/Missing").unwrap().is_none());
        assert!(src.locate("a/B").is_some());
        assert!(src.locate("a/Missing").is_none());
    }

    #[test]
    fn jar_source_reads_entries() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("lib.jar");
        write_jar(
            &jar,
            &[("org/lib/Util.class", b"util"), ("META-INF/MANIFEST.MF", b"")],
        );

        let src = JarSource::open(&jar).unwrap();
        let artifact = src.load("org/lib/Util").unwrap().unwrap();
        assert_eq!(artifact.bytes, b"util");
        assert!(artifact.origin.to_string_lossy().ends_with("!/org/lib/Util.class"));
        assert!(src.load("org/lib/Other").unwrap().is_none());
        assert_eq!(src.locate("org/lib/Util"), Some(jar.clone()));
        assert_eq!(src.class_names().unwrap(), vec!["org/lib/Util".to_string()]);
    }

    #[test]
    fn class_path_prefers_first_source() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::write(first.path().join("X.class"), b"first").unwrap();
        std::fs::write(second.path().join("X.class"), b"second").unwrap();
        std::fs::write(second.path().join("Y.class"), b"y").unwrap();

        let cp = ClassPath::from_paths(&[
            first.path().to_path_buf(),
            first.path().join("does-not-exist"),
            second.path().to_path_buf(),
        ])
        .unwrap();
        assert_eq!(cp.len(), 2);
        assert_eq!(cp.load("X").unwrap().unwrap().bytes, b"first");
        assert_eq!(cp.load("Y").unwrap().unwrap().bytes, b"y");
        assert!(cp.load("Z").unwrap().is_none());
    }

    struct Broken;

    impl ArtifactSource for Broken {
        fn load(&self, _name: &str) -> io::Result<Option<ClassArtifact>> {
            Err(io::Error::new(io::ErrorKind::InvalidData, "corrupt archive"))
        }

        fn locate(&self, _name: &str) -> Option<PathBuf> {
            None
        }
    }

    #[test]
    fn unreadable_entry_does_not_hide_later_sources() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("X.class"), b"x").unwrap();

        let mut cp = ClassPath::new();
        cp.push(Broken);
        cp.push(DirectorySource::new(dir.path()));

        assert_eq!(cp.load("X").unwrap().unwrap().bytes, b"x");
        let err = cp.load("Y").unwrap_err();
        assert!(err.to_string().contains("corrupt archive"));
    }
}
