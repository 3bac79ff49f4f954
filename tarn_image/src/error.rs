//! Image construction errors.
//!
//! Every error aborts the current run: a partially built data image is never
//! usable, so nothing here is recovered locally.

use std::error::Error as _;
use std::fmt;
use std::path::PathBuf;

use tarn_target::backend::EmitError;
use tarn_target::lower::LowerError;
use thiserror::Error;

use crate::descriptor::DescriptorId;

/// The kind of image construction error.
#[derive(Debug, Error)]
pub enum ImageErrorKind {
    /// A payload cannot be encoded for the slot it fills.
    #[error("don't know how to encode {payload} in {context}")]
    TypeConsistency { payload: String, context: String },

    /// The input needs something the builder does not implement.
    #[error("unsupported: {feature}{}", context_suffix(.context))]
    UnsupportedFeature {
        feature: &'static str,
        context: Option<String>,
    },

    /// An upstream contract was broken (unknown descriptor, malformed type).
    #[error("invariant violation: {message}")]
    InvariantViolation { message: String },

    /// The bootstrap method named by the configuration does not exist.
    #[error("bootstrap method `{name}` not found")]
    MissingBootstrap { name: String },

    /// The assembled module failed verification.
    #[error("module verification failed:\n{report}")]
    Verification { report: String },

    /// Inconsistent or unreadable configuration.
    #[error("configuration: {message}")]
    Config { message: String },

    /// Globals could not be lowered to bytes.
    #[error("lowering: {0}")]
    Lower(#[from] LowerError),

    /// The backend could not write the object file.
    #[error("emission: {0}")]
    Emit(#[from] EmitError),

    /// Reading or writing a file failed.
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn context_suffix(context: &Option<String>) -> String {
    match context {
        Some(ctx) => format!(" ({ctx})"),
        None => String::new(),
    }
}

/// Image construction error, optionally tied to the descriptor being built.
#[derive(Debug)]
pub struct ImageError {
    pub kind: ImageErrorKind,
    pub descriptor: Option<DescriptorId>,
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(id) = self.descriptor {
            write!(f, " (descriptor #{})", id.index())?;
        }
        Ok(())
    }
}

// The kind is the message; its cause is the source.
impl std::error::Error for ImageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.kind.source()
    }
}

impl ImageError {
    /// Create a type-consistency error for an unencodable payload.
    pub fn type_consistency(payload: impl fmt::Display, context: impl Into<String>) -> Self {
        ImageErrorKind::TypeConsistency {
            payload: payload.to_string(),
            context: context.into(),
        }
        .into()
    }

    /// Create an unsupported feature error with context.
    pub fn unsupported(feature: &'static str, context: impl Into<String>) -> Self {
        ImageErrorKind::UnsupportedFeature {
            feature,
            context: Some(context.into()),
        }
        .into()
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        ImageErrorKind::InvariantViolation {
            message: message.into(),
        }
        .into()
    }

    pub fn missing_bootstrap(name: impl Into<String>) -> Self {
        ImageErrorKind::MissingBootstrap { name: name.into() }.into()
    }

    pub fn verification(report: impl fmt::Display) -> Self {
        ImageErrorKind::Verification {
            report: report.to_string(),
        }
        .into()
    }

    pub fn config(message: impl Into<String>) -> Self {
        ImageErrorKind::Config {
            message: message.into(),
        }
        .into()
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ImageErrorKind::Io {
            path: path.into(),
            source,
        }
        .into()
    }

    /// Attach the descriptor being built, keeping the innermost one.
    pub fn with_descriptor(mut self, id: DescriptorId) -> Self {
        self.descriptor.get_or_insert(id);
        self
    }
}

impl From<ImageErrorKind> for ImageError {
    fn from(kind: ImageErrorKind) -> Self {
        ImageError {
            kind,
            descriptor: None,
        }
    }
}

impl From<LowerError> for ImageError {
    fn from(e: LowerError) -> Self {
        ImageErrorKind::from(e).into()
    }
}

impl From<EmitError> for ImageError {
    fn from(e: EmitError) -> Self {
        ImageErrorKind::from(e).into()
    }
}

pub type ImageResult<T> = Result<T, ImageError>;
