//! Compile-time values destined for the data image.
//!
//! Descriptors are produced upstream and are read-only here. Their identity
//! is their `DescriptorId`; two structurally equal descriptors with different
//! ids still become two globals.

use std::fmt;

use indexmap::IndexMap;

use crate::env::{FieldId, TypeId};

/// Identity of a value descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptorId(pub u32);

impl DescriptorId {
    pub fn index(self) -> u32 {
        self.0
    }
}

/// Opaque identifier of a code pointer, resolved through the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodePointerId(pub u32);

/// Content of one field or array element. An absent field has no entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    Null,
    /// Raw bit pattern of a scalar.
    Scalar(u64),
    /// Another value, inlined if it is nested, referenced otherwise.
    Descriptor(DescriptorId),
    CodePointer(CodePointerId),
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Null => write!(f, "null"),
            Payload::Scalar(v) => write!(f, "scalar {v:#x}"),
            Payload::Descriptor(d) => write!(f, "descriptor #{}", d.0),
            Payload::CodePointer(c) => write!(f, "code pointer #{}", c.0),
        }
    }
}

/// An object instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDescriptor {
    pub context: TypeId,
    /// Container this value is embedded in; such values have no global.
    pub nesting: Option<DescriptorId>,
    pub is_mutable: bool,
    pub values: IndexMap<FieldId, Payload>,
    /// Character data of string instances.
    pub source: Option<String>,
}

impl ObjectDescriptor {
    pub fn new(context: TypeId, is_mutable: bool) -> Self {
        Self {
            context,
            nesting: None,
            is_mutable,
            values: IndexMap::new(),
            source: None,
        }
    }

    pub fn with_value(mut self, field: FieldId, payload: Payload) -> Self {
        self.values.insert(field, payload);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn nested_in(mut self, container: DescriptorId) -> Self {
        self.nesting = Some(container);
        self
    }
}

/// An array instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayDescriptor {
    /// The array type; its element type comes from the type definition.
    pub context: TypeId,
    pub nesting: Option<DescriptorId>,
    pub is_mutable: bool,
    pub length: u32,
    /// Explicit element payloads, in order.
    pub values: Option<Vec<Payload>>,
    /// Raw scalar elements, used when `values` is absent.
    pub source: Option<Vec<u64>>,
}

impl ArrayDescriptor {
    pub fn new(context: TypeId, length: u32, is_mutable: bool) -> Self {
        Self {
            context,
            nesting: None,
            is_mutable,
            length,
            values: None,
            source: None,
        }
    }

    pub fn with_values(mut self, values: Vec<Payload>) -> Self {
        self.values = Some(values);
        self
    }

    pub fn with_source(mut self, source: Vec<u64>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn nested_in(mut self, container: DescriptorId) -> Self {
        self.nesting = Some(container);
        self
    }
}

/// A compile-time value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataDescriptor {
    Object(ObjectDescriptor),
    Array(ArrayDescriptor),
}

impl DataDescriptor {
    /// Declared type used for layout.
    pub fn context(&self) -> TypeId {
        match self {
            DataDescriptor::Object(o) => o.context,
            DataDescriptor::Array(a) => a.context,
        }
    }

    pub fn nesting(&self) -> Option<DescriptorId> {
        match self {
            DataDescriptor::Object(o) => o.nesting,
            DataDescriptor::Array(a) => a.nesting,
        }
    }

    pub fn is_mutable(&self) -> bool {
        match self {
            DataDescriptor::Object(o) => o.is_mutable,
            DataDescriptor::Array(a) => a.is_mutable,
        }
    }
}

impl From<ObjectDescriptor> for DataDescriptor {
    fn from(o: ObjectDescriptor) -> Self {
        DataDescriptor::Object(o)
    }
}

impl From<ArrayDescriptor> for DataDescriptor {
    fn from(a: ArrayDescriptor) -> Self {
        DataDescriptor::Array(a)
    }
}
