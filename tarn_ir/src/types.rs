//! Storage types for module-level data.
//!
//! Types:
//! - `Int(bits)`: fixed-width integer bit pattern
//! - `Ptr`: opaque pointer, width decided by the module's data layout
//! - `Struct(id)`: named aggregate whose body lives in the module
//! - `Anon(fields)`: literal aggregate, identified only by its field types
//! - `Array(elem, n)`: `n` consecutive elements

/// Index of a named struct type registered in a `Module`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StructId(pub(crate) u32);

impl StructId {
    /// Raw index into the module's struct table.
    pub fn index(self) -> u32 {
        self.0
    }
}

/// A storage type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// Integer of the given bit width. Signedness lives on constants, not types.
    Int(u32),
    /// Opaque data or code pointer.
    Ptr,
    /// Named struct type.
    Struct(StructId),
    /// Anonymous struct type, structurally typed by its fields.
    Anon(Vec<Type>),
    /// Fixed-length array.
    Array(Box<Type>, u32),
}

impl Type {
    /// Shorthand for `Type::Array`.
    pub fn array(elem: Type, len: u32) -> Self {
        Type::Array(Box::new(elem), len)
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, Type::Struct(_) | Type::Anon(_) | Type::Array(..))
    }
}

/// Body of a named struct type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructType {
    pub name: crate::module::SymbolId,
    pub fields: Vec<Type>,
}
