//! ARM backend implementation.

use tarn_target::backend::{Backend, EmitError};
use tarn_target::types::{CompiledFunction, StaticData, SymbolAlias};

use crate::emit::emit_elf_with_data;

/// 32-bit little-endian ARM target.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArmBackend;

impl Backend for ArmBackend {
    fn name(&self) -> &'static str {
        "arm"
    }

    fn pointer_width(&self) -> u32 {
        32
    }

    fn emit_object(
        &self,
        functions: &[CompiledFunction],
        statics: &[StaticData],
        aliases: &[SymbolAlias],
    ) -> Result<Vec<u8>, EmitError> {
        emit_elf_with_data(functions, statics, aliases)
    }
}
