//! tarn_target: Backend boundary shared by all object-file writers.
//!
//! The image builder produces a `tarn_ir::module::Module`; this crate turns
//! its initialized globals into byte blobs with relocations and defines the
//! `Backend` trait that concrete targets implement.

pub mod backend;
pub mod lower;
pub mod reloc;
pub mod types;
