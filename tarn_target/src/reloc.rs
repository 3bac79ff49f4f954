//! Relocation types shared between target backends and the lowering layer.

/// Kind of relocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocKind {
    /// 32-bit absolute address (e.g., R_ARM_ABS32).
    Abs32,
    /// 64-bit absolute address (e.g., R_X86_64_64).
    Abs64,
}

impl RelocKind {
    /// Absolute pointer relocation for a pointer of `bytes` bytes.
    pub fn absolute(bytes: u32) -> Option<Self> {
        match bytes {
            4 => Some(RelocKind::Abs32),
            8 => Some(RelocKind::Abs64),
            _ => None,
        }
    }

    /// Width of the patched field in bits.
    pub fn bits(self) -> u8 {
        match self {
            RelocKind::Abs32 => 32,
            RelocKind::Abs64 => 64,
        }
    }
}

/// A relocation against a named symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocation {
    /// Byte offset in the owning blob where the address is written.
    pub offset: usize,
    /// The symbol name this relocation targets.
    pub symbol: String,
    /// Kind of relocation.
    pub kind: RelocKind,
}
