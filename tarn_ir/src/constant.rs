//! Constant initializers for module globals.

use crate::module::{FuncId, GlobalId};
use crate::types::{StructId, Type};

/// A constant value placed in the data image.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constant {
    /// Integer bit pattern. `value` holds the low `bits` bits; `signed` only
    /// affects how the constant is printed.
    Int { bits: u32, value: u64, signed: bool },
    /// All-zero value of the given type. Distinct from an explicit zero
    /// integer so that zero scalars need no wrapper struct.
    Zeroed(Type),
    /// Aggregate. `ty` is `None` for anonymous aggregates whose type is
    /// derived from the field constants.
    Struct {
        ty: Option<StructId>,
        fields: Vec<Constant>,
    },
    /// Array of constants sharing the element type `elem`.
    Array { elem: Type, elems: Vec<Constant> },
    /// Address of a global.
    GlobalAddr(GlobalId),
    /// Address of a function.
    FuncAddr(FuncId),
}

impl Constant {
    /// Integer constant truncated to `bits`.
    pub fn int(bits: u32, value: u64, signed: bool) -> Self {
        Constant::Int {
            bits,
            value: truncate(value, bits),
            signed,
        }
    }

    /// Named aggregate.
    pub fn named(ty: StructId, fields: Vec<Constant>) -> Self {
        Constant::Struct {
            ty: Some(ty),
            fields,
        }
    }

    /// Anonymous aggregate.
    pub fn anon(fields: Vec<Constant>) -> Self {
        Constant::Struct { ty: None, fields }
    }

    /// Storage type of this constant.
    pub fn ty(&self) -> Type {
        match self {
            Constant::Int { bits, .. } => Type::Int(*bits),
            Constant::Zeroed(ty) => ty.clone(),
            Constant::Struct { ty: Some(id), .. } => Type::Struct(*id),
            Constant::Struct { ty: None, fields } => {
                Type::Anon(fields.iter().map(Constant::ty).collect())
            }
            Constant::Array { elem, elems } => Type::array(elem.clone(), elems.len() as u32),
            Constant::GlobalAddr(_) | Constant::FuncAddr(_) => Type::Ptr,
        }
    }

    pub fn is_zeroed(&self) -> bool {
        matches!(self, Constant::Zeroed(_))
    }

    /// Visit every global referenced from this constant.
    pub fn for_each_global(&self, f: &mut impl FnMut(GlobalId)) {
        match self {
            Constant::GlobalAddr(g) => f(*g),
            Constant::Struct { fields: elems, .. } | Constant::Array { elems, .. } => {
                for c in elems {
                    c.for_each_global(f);
                }
            }
            Constant::Int { .. } | Constant::Zeroed(_) | Constant::FuncAddr(_) => {}
        }
    }

    /// Rewrite every `GlobalAddr(from)` into `GlobalAddr(to)`.
    /// Returns the number of rewritten references.
    pub fn replace_global(&mut self, from: GlobalId, to: GlobalId) -> usize {
        match self {
            Constant::GlobalAddr(g) if *g == from => {
                *g = to;
                1
            }
            Constant::Struct { fields: elems, .. } | Constant::Array { elems, .. } => elems
                .iter_mut()
                .map(|c| c.replace_global(from, to))
                .sum(),
            _ => 0,
        }
    }
}

/// Keep the low `bits` bits of `value`.
pub fn truncate(value: u64, bits: u32) -> u64 {
    if bits >= 64 {
        value
    } else {
        value & ((1u64 << bits) - 1)
    }
}

/// Interpret the low `bits` bits of `value` as a two's complement integer.
pub fn sign_extend(value: u64, bits: u32) -> i64 {
    if bits == 0 || bits >= 64 {
        return value as i64;
    }
    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}
