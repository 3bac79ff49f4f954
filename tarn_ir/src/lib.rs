//! tarn_ir: Target-side module IR for the tarn image builder.

pub mod constant;
pub mod display;
pub mod layout;
pub mod module;
pub mod types;
pub mod verifier;
