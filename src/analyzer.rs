//! Reference extraction strategies.
//!
//! An [`Analyzer`] turns one parsed class file into the set of class names it
//! references. Names are kept in internal slash form so they map directly to
//! on-disk locations.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::classfile::{ClassFile, class_constant_names, descriptor_class_names};
use crate::error::ParseError;

pub type ReferenceSet = BTreeSet<String>;

pub trait Analyzer: Send + Sync {
    /// References of an already parsed class. The class's own name is
    /// always part of the result.
    fn references(&self, class: &ClassFile) -> Result<ReferenceSet, ParseError>;

    fn extract(&self, bytes: &[u8]) -> Result<ReferenceSet, ParseError> {
        let class = ClassFile::parse(bytes)?;
        self.references(&class)
    }
}

/// Every class mentioned by the constant pool and by field and method
/// descriptors.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullAnalyzer;

impl Analyzer for FullAnalyzer {
    fn references(&self, class: &ClassFile) -> Result<ReferenceSet, ParseError> {
        let mut refs = ReferenceSet::new();
        refs.insert(class.this_class.clone());
        refs.extend(class.super_class.iter().cloned());
        refs.extend(class.interfaces.iter().cloned());

        for raw in &class.class_constants {
            refs.extend(class_constant_names(raw)?);
        }
        for descriptor in &class.member_descriptors {
            refs.extend(descriptor_class_names(descriptor)?);
        }
        for member in class.fields.iter().chain(class.methods.iter()) {
            refs.extend(descriptor_class_names(&member.descriptor)?);
        }

        Ok(refs)
    }
}

/// Only the class itself, its superclass and its direct interfaces.
/// Closing over this gives the full inheritance hierarchy.
#[derive(Debug, Clone, Copy, Default)]
pub struct AncestorAnalyzer;

impl Analyzer for AncestorAnalyzer {
    fn references(&self, class: &ClassFile) -> Result<ReferenceSet, ParseError> {
        let mut refs = ReferenceSet::new();
        refs.insert(class.this_class.clone());
        if let Some(sup) = &class.super_class {
            refs.insert(sup.clone());
        }
        refs.extend(class.interfaces.iter().cloned());
        Ok(refs)
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzerKind {
    #[default]
    Full,
    Ancestors,
}

impl AnalyzerKind {
    pub fn analyzer(self) -> &'static dyn Analyzer {
        match self {
            AnalyzerKind::Full => &FullAnalyzer,
            AnalyzerKind::Ancestors => &AncestorAnalyzer,
        }
    }
}

/// Reference set of one class file using the full strategy.
pub fn extract_references(bytes: &[u8]) -> Result<ReferenceSet, ParseError> {
    FullAnalyzer.extract(bytes)
}
