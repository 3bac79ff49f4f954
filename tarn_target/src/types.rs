//! Common types shared between target backends and the image builder.

use crate::reloc::Relocation;

/// A compiled function ready for object file emission.
///
/// Function bodies come from the instruction selection phases; the image
/// builder only forwards them.
#[derive(Debug, Clone)]
pub struct CompiledFunction {
    pub name: String,
    pub code: Vec<u8>,
    pub relocations: Vec<Relocation>,
}

/// A static data blob to be placed in a data section.
#[derive(Debug, Clone)]
pub struct StaticData {
    pub name: String,
    pub data: Vec<u8>,
    /// Relocations within the data (object pointers, vtables, code pointers).
    pub relocations: Vec<Relocation>,
    /// If true, place in a writable section (.data) instead of read-only data.
    pub writable: bool,
}

/// An extra symbol bound to the address of a function, e.g. `main` for the
/// bootstrap routine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolAlias {
    pub name: String,
    pub target: String,
}
