//! tarn_target_arm: 32-bit ARM (A32, little-endian) ELF backend.

pub mod backend;
pub mod emit;
pub mod encode;

#[cfg(test)]
mod tests;
