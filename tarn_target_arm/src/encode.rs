//! A32 instruction encoding for the few stubs the image builder needs.

use tarn_target::types::CompiledFunction;

/// Condition field value for "always".
const COND_AL: u32 = 0xe;

/// Link register.
pub const LR: u8 = 14;

/// Encode `bx rm`.
pub fn bx(rm: u8) -> u32 {
    (COND_AL << 28) | 0x012f_ff10 | (rm as u32 & 0xf)
}

/// Encode `mov rd, #imm` for an 8-bit immediate without rotation.
pub fn mov_imm(rd: u8, imm: u8) -> u32 {
    (COND_AL << 28) | 0x03a0_0000 | ((rd as u32 & 0xf) << 12) | imm as u32
}

/// Little-endian byte stream for a sequence of A32 words.
pub fn words_to_bytes(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

/// A function body that immediately returns to its caller.
///
/// Used when an image must export an entry point whose real body is linked
/// in from elsewhere, or for tests.
pub fn return_stub(name: &str) -> CompiledFunction {
    CompiledFunction {
        name: name.to_string(),
        code: words_to_bytes(&[bx(LR)]),
        relocations: Vec::new(),
    }
}
