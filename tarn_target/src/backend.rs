//! Backend trait for target-specific object emission.

use thiserror::Error;

use crate::reloc::RelocKind;
use crate::types::{CompiledFunction, StaticData, SymbolAlias};

/// Failure while writing an object file.
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("alias `{alias}` targets `{target}`, which has no body in this object")]
    UndefinedAliasTarget { alias: String, target: String },
    #[error("{kind:?} relocation against `{symbol}` is not supported by this target")]
    UnsupportedRelocation { symbol: String, kind: RelocKind },
    #[error("object writer: {0}")]
    Object(String),
}

/// Target-specific object file writer.
///
/// Implementations decide section placement, symbol binding, and relocation
/// encoding for a specific architecture.
pub trait Backend {
    /// Short target name used in logs.
    fn name(&self) -> &'static str;

    /// Pointer width in bits.
    fn pointer_width(&self) -> u32;

    /// Emit compiled functions, static data, and aliases as an object file.
    fn emit_object(
        &self,
        functions: &[CompiledFunction],
        statics: &[StaticData],
        aliases: &[SymbolAlias],
    ) -> Result<Vec<u8>, EmitError>;
}
