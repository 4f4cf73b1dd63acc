#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Writes minimal but well-formed class files.
#[derive(Debug, Clone)]
pub struct ClassBuilder {
    name: String,
    super_class: Option<String>,
    interfaces: Vec<String>,
    fields: Vec<(String, String)>,
    methods: Vec<(String, String)>,
    class_refs: Vec<String>,
    calls: Vec<(String, String, String)>,
}

impl ClassBuilder {
    /// `name` in internal form (`org/example/A`).
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            super_class: Some("java/lang/Object".to_string()),
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            class_refs: Vec::new(),
            calls: Vec::new(),
        }
    }

    pub fn no_super(mut self) -> Self {
        self.super_class = None;
        self
    }

    pub fn extends(mut self, name: &str) -> Self {
        self.super_class = Some(name.to_string());
        self
    }

    pub fn implements(mut self, name: &str) -> Self {
        self.interfaces.push(name.to_string());
        self
    }

    /// Field whose type is the object type `class`.
    pub fn field_of(self, field: &str, class: &str) -> Self {
        self.field(field, &format!("L{class};"))
    }

    pub fn field(mut self, name: &str, descriptor: &str) -> Self {
        self.fields.push((name.to_string(), descriptor.to_string()));
        self
    }

    pub fn method(mut self, name: &str, descriptor: &str) -> Self {
        self.methods.push((name.to_string(), descriptor.to_string()));
        self
    }

    /// Bare `CONSTANT_Class` entry, as produced by a class literal or a cast.
    pub fn class_ref(mut self, name: &str) -> Self {
        self.class_refs.push(name.to_string());
        self
    }

    /// Method call through a `Methodref`.
    pub fn calls(mut self, owner: &str, name: &str, descriptor: &str) -> Self {
        self.calls
            .push((owner.to_string(), name.to_string(), descriptor.to_string()));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut pool = Pool::default();
        let this_idx = pool.class(&self.name);
        let super_idx = self.super_class.as_deref().map(|s| pool.class(s)).unwrap_or(0);
        let iface_idx: Vec<u16> = self.interfaces.iter().map(|i| pool.class(i)).collect();
        let field_idx: Vec<(u16, u16)> = self
            .fields
            .iter()
            .map(|(n, d)| (pool.utf8(n), pool.utf8(d)))
            .collect();
        let method_idx: Vec<(u16, u16)> = self
            .methods
            .iter()
            .map(|(n, d)| (pool.utf8(n), pool.utf8(d)))
            .collect();
        for r in &self.class_refs {
            pool.class(r);
        }
        for (owner, name, desc) in &self.calls {
            pool.method_ref(owner, name, desc);
        }
        pool.long(0x0102_0304_0506_0708);
        let code = pool.utf8("Code");

        let mut out = Vec::new();
        out.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&52u16.to_be_bytes());
        out.extend_from_slice(&pool.next.to_be_bytes());
        out.extend_from_slice(&pool.bytes);
        out.extend_from_slice(&0x0021u16.to_be_bytes());
        out.extend_from_slice(&this_idx.to_be_bytes());
        out.extend_from_slice(&super_idx.to_be_bytes());
        out.extend_from_slice(&(iface_idx.len() as u16).to_be_bytes());
        for i in iface_idx {
            out.extend_from_slice(&i.to_be_bytes());
        }
        out.extend_from_slice(&(field_idx.len() as u16).to_be_bytes());
        for (n, d) in field_idx {
            out.extend_from_slice(&0x0002u16.to_be_bytes());
            out.extend_from_slice(&n.to_be_bytes());
            out.extend_from_slice(&d.to_be_bytes());
            out.extend_from_slice(&0u16.to_be_bytes());
        }
        out.extend_from_slice(&(method_idx.len() as u16).to_be_bytes());
        for (n, d) in method_idx {
            out.extend_from_slice(&0x0001u16.to_be_bytes());
            out.extend_from_slice(&n.to_be_bytes());
            out.extend_from_slice(&d.to_be_bytes());
            // Code: max_stack 1, max_locals 1, a lone `return`
            out.extend_from_slice(&1u16.to_be_bytes());
            out.extend_from_slice(&code.to_be_bytes());
            out.extend_from_slice(&13u32.to_be_bytes());
            out.extend_from_slice(&1u16.to_be_bytes());
            out.extend_from_slice(&1u16.to_be_bytes());
            out.extend_from_slice(&1u32.to_be_bytes());
            out.push(0xB1);
            out.extend_from_slice(&0u16.to_be_bytes());
            out.extend_from_slice(&0u16.to_be_bytes());
        }
        out.extend_from_slice(&0u16.to_be_bytes());
        out
    }

    /// Write under `base` at the path the class name maps to.
    pub fn write_to(&self, base: &Path) -> PathBuf {
        let path = base.join(format!("{}.class", self.name));
        write_bytes(&path, &self.build());
        path
    }
}

#[derive(Default)]
struct Pool {
    bytes: Vec<u8>,
    next: u16,
    utf8: HashMap<String, u16>,
    classes: HashMap<String, u16>,
}

impl Pool {
    fn slot(&mut self, width: u16) -> u16 {
        if self.next == 0 {
            self.next = 1;
        }
        let idx = self.next;
        self.next += width;
        idx
    }

    fn utf8(&mut self, s: &str) -> u16 {
        if let Some(i) = self.utf8.get(s) {
            return *i;
        }
        let idx = self.slot(1);
        self.bytes.push(1);
        self.bytes.extend_from_slice(&(s.len() as u16).to_be_bytes());
        self.bytes.extend_from_slice(s.as_bytes());
        self.utf8.insert(s.to_string(), idx);
        idx
    }

    fn class(&mut self, name: &str) -> u16 {
        if let Some(i) = self.classes.get(name) {
            return *i;
        }
        let name_idx = self.utf8(name);
        let idx = self.slot(1);
        self.bytes.push(7);
        self.bytes.extend_from_slice(&name_idx.to_be_bytes());
        self.classes.insert(name.to_string(), idx);
        idx
    }

    fn method_ref(&mut self, owner: &str, name: &str, desc: &str) -> u16 {
        let class_idx = self.class(owner);
        let name_idx = self.utf8(name);
        let desc_idx = self.utf8(desc);
        let nat = self.slot(1);
        self.bytes.push(12);
        self.bytes.extend_from_slice(&name_idx.to_be_bytes());
        self.bytes.extend_from_slice(&desc_idx.to_be_bytes());
        let idx = self.slot(1);
        self.bytes.push(10);
        self.bytes.extend_from_slice(&class_idx.to_be_bytes());
        self.bytes.extend_from_slice(&nat.to_be_bytes());
        idx
    }

    fn long(&mut self, value: u64) -> u16 {
        let idx = self.slot(2);
        self.bytes.push(5);
        self.bytes.extend_from_slice(&value.to_be_bytes());
        idx
    }
}

pub fn write_bytes(path: &Path, bytes: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, bytes).unwrap();
}

pub fn write_file(path: &Path, content: &str) {
    write_bytes(path, content.as_bytes());
}

/// Force a file's modification time to `secs` seconds after the epoch.
pub fn set_mtime(path: &Path, secs: u64) {
    let file = std::fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
        .unwrap();
}

pub fn write_jar(path: &Path, entries: &[(&str, Vec<u8>)]) {
    use std::io::Write;
    use zip::write::FileOptions;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, content) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(content).unwrap();
    }
    zip.finish().unwrap();
}
