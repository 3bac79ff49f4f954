//! tarn_image: turn a graph of compile-time object and array values into the
//! initialized data of a native image.
//!
//! [`ModuleManager`] drives a build: callers materialize root values, the
//! [`ImageBuilder`] encodes each value into a constant and requests globals
//! for the values it references, the fixpoint sweep fills the placeholders
//! left behind, and the finished module is handed to a
//! [`tarn_target::backend::Backend`].

pub mod builder;
pub mod config;
pub mod descriptor;
pub mod env;
pub mod error;
pub mod fixpoint;
pub mod manager;
pub mod registry;
pub mod scalar;
pub mod translate;
pub mod typesystem;

pub use builder::ImageBuilder;
pub use config::ImageConfig;
pub use error::{ImageError, ImageErrorKind, ImageResult};
pub use manager::{DebugInfo, ModuleManager};
pub use typesystem::TypeSystem;
