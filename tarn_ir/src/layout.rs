//! Byte sizes of storage types.
//!
//! Aggregates are packed: the front end already places explicit padding
//! slots, so no implicit alignment padding is inserted here.

use crate::module::Module;
use crate::types::Type;

/// Target data layout: pointer width and byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataLayout {
    pub pointer_bytes: u32,
    pub little_endian: bool,
}

impl DataLayout {
    /// Little-endian layout with pointers of `native_int_size` bits.
    pub fn new(native_int_size: u32) -> Self {
        Self {
            pointer_bytes: native_int_size / 8,
            little_endian: true,
        }
    }

    /// Layout matching a module's pointer width.
    pub fn for_module(module: &Module) -> Self {
        Self::new(module.native_int_size)
    }

    /// Size in bytes of a value of `ty`.
    pub fn size_of(&self, ty: &Type, module: &Module) -> u64 {
        match ty {
            Type::Int(bits) => u64::from(bits.div_ceil(8)),
            Type::Ptr => u64::from(self.pointer_bytes),
            Type::Struct(id) => module
                .struct_type(*id)
                .fields
                .iter()
                .map(|f| self.size_of(f, module))
                .sum(),
            Type::Anon(fields) => fields.iter().map(|f| self.size_of(f, module)).sum(),
            Type::Array(elem, n) => self.size_of(elem, module) * u64::from(*n),
        }
    }
}
