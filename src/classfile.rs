//! Structural reading of compiled class files.
//!
//! `jclassfile` does the parsing. This module resolves the constant pool
//! indices that reference analysis needs into plain names and descriptors,
//! and decodes descriptors with `jdescriptor`.

use jclassfile::class_file;
use jclassfile::constant_pool::ConstantPool;
use jdescriptor::{MethodDescriptor, TypeDescriptor};
use std::str::FromStr;

use crate::error::ParseError;

pub const MAGIC: u32 = 0xCAFE_BABE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub name: String,
    pub descriptor: String,
}

/// The parts of a class file that can name other classes. Names are in
/// internal slash form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassFile {
    pub this_class: String,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<Member>,
    pub methods: Vec<Member>,
    /// Raw name of every `CONSTANT_Class` entry. Array classes keep their
    /// descriptor form (`[Ljava/lang/String;`).
    pub class_constants: Vec<String>,
    /// Descriptor of every `CONSTANT_NameAndType` entry.
    pub member_descriptors: Vec<String>,
}

impl ClassFile {
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        check_magic(bytes)?;
        let parsed = class_file::parse(bytes).map_err(|err| ParseError::Malformed {
            reason: err.to_string(),
        })?;
        let pool = parsed.constant_pool();

        let this_class = class_name(pool, parsed.this_class())?;
        let super_class = match parsed.super_class() {
            0 => None,
            index => Some(class_name(pool, index)?),
        };
        let mut interfaces = Vec::new();
        for interface in parsed.interfaces() {
            interfaces.push(class_name(pool, *interface)?);
        }

        let mut fields = Vec::new();
        for field in parsed.fields() {
            fields.push(Member {
                name: utf8(pool, field.name_index())?,
                descriptor: utf8(pool, field.descriptor_index())?,
            });
        }
        let mut methods = Vec::new();
        for method in parsed.methods() {
            methods.push(Member {
                name: utf8(pool, method.name_index())?,
                descriptor: utf8(pool, method.descriptor_index())?,
            });
        }

        let mut class_constants = Vec::new();
        let mut member_descriptors = Vec::new();
        for constant in pool {
            match constant {
                ConstantPool::Class { name_index } => class_constants.push(utf8(pool, *name_index)?),
                ConstantPool::NameAndType {
                    descriptor_index, ..
                } => member_descriptors.push(utf8(pool, *descriptor_index)?),
                _ => {}
            }
        }

        Ok(Self {
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            class_constants,
            member_descriptors,
        })
    }
}

/// Cheap rejection of files that are not class files at all.
fn check_magic(bytes: &[u8]) -> Result<(), ParseError> {
    let Some(head) = bytes.get(..4) else {
        return Err(ParseError::Truncated {
            offset: 0,
            needed: 4 - bytes.len(),
        });
    };
    let found = u32::from_be_bytes([head[0], head[1], head[2], head[3]]);
    if found != MAGIC {
        return Err(ParseError::BadMagic { found });
    }
    Ok(())
}

fn entry(pool: &[ConstantPool], index: u16) -> Result<&ConstantPool, ParseError> {
    pool.get(index as usize).ok_or(ParseError::BadIndex {
        index,
        size: pool.len(),
    })
}

fn utf8(pool: &[ConstantPool], index: u16) -> Result<String, ParseError> {
    match entry(pool, index)? {
        ConstantPool::Utf8 { value } => Ok(value.to_string()),
        _ => Err(ParseError::WrongKind {
            index,
            expected: "Utf8",
        }),
    }
}

fn class_name(pool: &[ConstantPool], index: u16) -> Result<String, ParseError> {
    match entry(pool, index)? {
        ConstantPool::Class { name_index } => utf8(pool, *name_index),
        _ => Err(ParseError::WrongKind {
            index,
            expected: "Class",
        }),
    }
}

/// Class names in a field or method descriptor, in order of appearance.
pub fn descriptor_class_names(descriptor: &str) -> Result<Vec<String>, ParseError> {
    let bad = || ParseError::BadDescriptor {
        descriptor: descriptor.to_string(),
    };

    let mut names = Vec::new();
    if descriptor.starts_with('(') {
        let method = MethodDescriptor::from_str(descriptor).map_err(|_| bad())?;
        for param in method.parameter_types().iter() {
            collect_object_names(param, &mut names);
        }
        collect_object_names(method.return_type(), &mut names);
    } else {
        // A field descriptor is read as the only parameter of a void method.
        let wrapped = MethodDescriptor::from_str(&format!("({descriptor})V")).map_err(|_| bad())?;
        let params = wrapped.parameter_types();
        if params.len() != 1 {
            return Err(bad());
        }
        for param in params.iter() {
            collect_object_names(param, &mut names);
        }
    }
    Ok(names)
}

fn collect_object_names(ty: &TypeDescriptor, out: &mut Vec<String>) {
    match ty {
        TypeDescriptor::Object(name) => out.push(name.to_string()),
        TypeDescriptor::Array(element, _) => collect_object_names(element, out),
        _ => {}
    }
}

/// Class names a raw `CONSTANT_Class` name stands for: itself for ordinary
/// classes, the element type for object arrays, nothing for primitive arrays.
pub fn class_constant_names(raw: &str) -> Result<Vec<String>, ParseError> {
    if raw.starts_with('[') {
        descriptor_class_names(raw)
    } else {
        Ok(vec![raw.to_string()])
    }
}
