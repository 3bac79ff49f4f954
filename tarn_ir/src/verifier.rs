//! Module verifier: structural integrity and type-consistency checks.
//!
//! Collects all errors rather than stopping at the first one.
//! Entry point: `verify_module()`.

use std::fmt;

use crate::constant::{Constant, truncate};
use crate::module::{GlobalId, Module};
use crate::types::Type;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Location context for a verification error.
#[derive(Debug, Clone)]
pub enum Location {
    Module,
    Global(String),
    Alias(String),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Module => write!(f, "module"),
            Location::Global(name) => write!(f, "@{name}"),
            Location::Alias(name) => write!(f, "alias @{name}"),
        }
    }
}

/// A single verification error.
#[derive(Debug, Clone)]
pub struct VerifyError {
    pub location: Location,
    pub message: String,
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.location, self.message)
    }
}

/// Collected verification results.
#[derive(Debug, Default)]
pub struct VerifyResult {
    pub errors: Vec<VerifyError>,
}

impl VerifyResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, location: Location, message: impl Into<String>) {
        self.errors.push(VerifyError {
            location,
            message: message.into(),
        });
    }
}

impl fmt::Display for VerifyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            return write!(f, "verification passed");
        }
        writeln!(
            f,
            "verification failed with {} error(s):",
            self.errors.len()
        )?;
        for e in &self.errors {
            writeln!(f, "  {e}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Constant checking
// ---------------------------------------------------------------------------

struct ConstVerifier<'a> {
    module: &'a Module,
    loc: Location,
    result: &'a mut VerifyResult,
}

impl ConstVerifier<'_> {
    /// Pointer-valued constants may fill a native-int slot (code pointers are
    /// stored in `IntPtr`-shaped fields).
    fn compatible(&self, expected: &Type, actual: &Type) -> bool {
        if expected == actual {
            return true;
        }
        match (expected, actual) {
            (Type::Int(bits), Type::Ptr) => *bits == self.module.native_int_size,
            (Type::Struct(id), Type::Anon(fields)) | (Type::Anon(fields), Type::Struct(id)) => {
                let body = &self.module.struct_type(*id).fields;
                body.len() == fields.len()
                    && body
                        .iter()
                        .zip(fields)
                        .all(|(e, a)| self.compatible(e, a))
            }
            (Type::Anon(e), Type::Anon(a)) => {
                e.len() == a.len() && e.iter().zip(a).all(|(e, a)| self.compatible(e, a))
            }
            (Type::Array(e, n), Type::Array(a, m)) => n == m && self.compatible(e, a),
            _ => false,
        }
    }

    fn expect(&mut self, expected: &Type, c: &Constant, ctx: &str) {
        let actual = c.ty();
        if !self.compatible(expected, &actual) {
            self.result.error(
                self.loc.clone(),
                format!("{ctx}: expected {expected:?}, got {actual:?}"),
            );
        }
    }

    fn check(&mut self, c: &Constant) {
        match c {
            Constant::Int { bits, value, .. } => {
                if *bits == 0 || *bits > 64 {
                    self.result
                        .error(self.loc.clone(), format!("invalid integer width {bits}"));
                } else if truncate(*value, *bits) != *value {
                    self.result.error(
                        self.loc.clone(),
                        format!("integer {value:#x} does not fit in {bits} bits"),
                    );
                }
            }
            Constant::Zeroed(_) => {}
            Constant::Struct { ty, fields } => {
                if let Some(id) = ty {
                    if id.index() as usize >= self.module.struct_count() {
                        self.result.error(
                            self.loc.clone(),
                            format!("unknown struct type #{}", id.index()),
                        );
                        return;
                    }
                    let st = self.module.struct_type(*id);
                    let name = self.module.resolve(st.name).to_string();
                    if st.fields.len() != fields.len() {
                        self.result.error(
                            self.loc.clone(),
                            format!(
                                "%{name} has {} fields, constant has {}",
                                st.fields.len(),
                                fields.len()
                            ),
                        );
                    } else {
                        for (i, (expected, field)) in st.fields.iter().zip(fields).enumerate() {
                            self.expect(expected, field, &format!("%{name} field {i}"));
                        }
                    }
                }
                for field in fields {
                    self.check(field);
                }
            }
            Constant::Array { elem, elems } => {
                for (i, e) in elems.iter().enumerate() {
                    self.expect(elem, e, &format!("array element {i}"));
                    self.check(e);
                }
            }
            Constant::GlobalAddr(g) => self.check_global_ref(*g),
            Constant::FuncAddr(f) => {
                if f.index() as usize >= self.module.function_count() {
                    self.result.error(
                        self.loc.clone(),
                        format!("dangling function reference #{}", f.index()),
                    );
                }
            }
        }
    }

    fn check_global_ref(&mut self, g: GlobalId) {
        if g.index() as usize >= self.module.global_slots() {
            self.result.error(
                self.loc.clone(),
                format!("dangling global reference #{}", g.index()),
            );
            return;
        }
        if self.module.global(g).is_removed() {
            self.result.error(
                self.loc.clone(),
                format!(
                    "reference to merged global @{}",
                    self.module.resolve(self.module.global(g).name)
                ),
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Verify an entire module.
pub fn verify_module(module: &Module) -> VerifyResult {
    let mut result = VerifyResult::default();

    for (_, global) in module.globals() {
        let name = module.resolve(global.name).to_string();
        let loc = Location::Global(name);
        let Some(init) = &global.initializer else {
            result.error(loc, "global has no initializer");
            continue;
        };
        let mut v = ConstVerifier {
            module,
            loc,
            result: &mut result,
        };
        v.expect(&global.ty, init, "initializer");
        v.check(init);
    }

    for alias in module.aliases() {
        if alias.target.index() as usize >= module.function_count() {
            result.error(
                Location::Alias(module.resolve(alias.name).to_string()),
                format!("alias target #{} is not a function", alias.target.index()),
            );
        }
    }

    if module.native_int_size % 8 != 0 || module.native_int_size == 0 {
        result.error(
            Location::Module,
            format!("invalid pointer width {}", module.native_int_size),
        );
    }

    result
}
