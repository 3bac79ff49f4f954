//! Lower initialized globals to byte blobs plus relocations.
//!
//! Integers are written in the layout's byte order at their full width,
//! zeroed constants become zero bytes, and every global or function address
//! becomes a zero-filled pointer slot with an absolute relocation.

use thiserror::Error;

use tarn_ir::constant::Constant;
use tarn_ir::layout::DataLayout;
use tarn_ir::module::Module;

use crate::reloc::{RelocKind, Relocation};
use crate::types::StaticData;

/// Failure while lowering a module's globals.
#[derive(Debug, Error)]
pub enum LowerError {
    #[error("global @{0} is still a placeholder")]
    Uninitialized(String),
    #[error("no byte encoding for {0}-bit integers")]
    IntegerWidth(u32),
    #[error("no absolute relocation for {0}-byte pointers")]
    PointerWidth(u32),
    #[error("global @{name}: initializer is {actual} bytes, type needs {expected}")]
    SizeMismatch {
        name: String,
        expected: u64,
        actual: u64,
    },
}

struct Lowerer<'a> {
    module: &'a Module,
    layout: &'a DataLayout,
    pointer_reloc: RelocKind,
    data: Vec<u8>,
    relocations: Vec<Relocation>,
}

impl Lowerer<'_> {
    fn write(&mut self, c: &Constant) -> Result<(), LowerError> {
        match c {
            Constant::Int { bits, value, .. } => {
                let bytes = value.to_le_bytes();
                let n = bits.div_ceil(8) as usize;
                if n == 0 || n > bytes.len() {
                    return Err(LowerError::IntegerWidth(*bits));
                }
                if self.layout.little_endian {
                    self.data.extend_from_slice(&bytes[..n]);
                } else {
                    self.data.extend(bytes[..n].iter().rev());
                }
            }
            Constant::Zeroed(ty) => {
                let size = self.layout.size_of(ty, self.module) as usize;
                self.data.resize(self.data.len() + size, 0);
            }
            Constant::Struct { fields: elems, .. } | Constant::Array { elems, .. } => {
                for e in elems {
                    self.write(e)?;
                }
            }
            Constant::GlobalAddr(g) => {
                let live = self.module.resolve_global(*g);
                let symbol = self.module.resolve(self.module.global(live).name).to_string();
                self.pointer(symbol);
            }
            Constant::FuncAddr(f) => {
                let symbol = self.module.resolve(self.module.function(*f).name).to_string();
                self.pointer(symbol);
            }
        }
        Ok(())
    }

    fn pointer(&mut self, symbol: String) {
        self.relocations.push(Relocation {
            offset: self.data.len(),
            symbol,
            kind: self.pointer_reloc,
        });
        let size = self.layout.pointer_bytes as usize;
        self.data.resize(self.data.len() + size, 0);
    }
}

/// Lower every live global of `module` into a `StaticData` blob.
///
/// Globals flagged constant are read-only; all others are writable.
pub fn lower_globals(module: &Module, layout: &DataLayout) -> Result<Vec<StaticData>, LowerError> {
    let pointer_reloc =
        RelocKind::absolute(layout.pointer_bytes).ok_or(LowerError::PointerWidth(layout.pointer_bytes))?;

    let mut out = Vec::new();
    for (_, global) in module.globals() {
        let name = module.resolve(global.name).to_string();
        let Some(init) = &global.initializer else {
            return Err(LowerError::Uninitialized(name));
        };

        let mut lowerer = Lowerer {
            module,
            layout,
            pointer_reloc,
            data: Vec::new(),
            relocations: Vec::new(),
        };
        lowerer.write(init)?;

        let expected = layout.size_of(&global.ty, module);
        let actual = lowerer.data.len() as u64;
        if expected != actual {
            return Err(LowerError::SizeMismatch {
                name,
                expected,
                actual,
            });
        }

        out.push(StaticData {
            name,
            data: lowerer.data,
            relocations: lowerer.relocations,
            writable: !global.constant,
        });
    }
    Ok(out)
}
