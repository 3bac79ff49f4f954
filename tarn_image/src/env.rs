//! Front-end boundary: what the builder needs to know about declared types,
//! fields, methods and values.

use crate::descriptor::{CodePointerId, DataDescriptor, DescriptorId};

/// Identity of a declared type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

/// Identity of a declared field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(pub u32);

/// Identity of a declared method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId(pub u32);

/// Shape of a declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// Integer-like primitive.
    Scalar { signed: bool },
    /// Class instance, always held by reference.
    Reference,
    /// Struct held inline.
    ValueType,
    /// Array class with the given element type, held by reference.
    Array { element: TypeId },
}

/// A declared type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDef {
    pub name: String,
    pub kind: TypeKind,
    /// Base class. Ignored for value types and scalars.
    pub extends: Option<TypeId>,
    /// Instance size in bytes, base class region included.
    pub size: u32,
    /// Fields declared by this type itself.
    pub fields: Vec<FieldId>,
}

impl TypeDef {
    pub fn is_scalar(&self) -> bool {
        matches!(self.kind, TypeKind::Scalar { .. })
    }

    pub fn is_signed(&self) -> bool {
        matches!(self.kind, TypeKind::Scalar { signed: true })
    }

    pub fn is_value_type(&self) -> bool {
        matches!(self.kind, TypeKind::Scalar { .. } | TypeKind::ValueType)
    }

    /// Held through a pointer when stored in a field or array slot.
    pub fn is_held_by_reference(&self) -> bool {
        matches!(self.kind, TypeKind::Reference | TypeKind::Array { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub owner: TypeId,
    /// Byte offset from the start of the instance.
    pub offset: u32,
    pub field_type: TypeId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDef {
    pub name: String,
    pub owner: TypeId,
    pub params: Vec<TypeId>,
    pub ret: Option<TypeId>,
    /// Platform-invoke methods keep their bare name as symbol.
    pub pinvoke: bool,
}

/// What a code pointer stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodePointerTarget {
    Method(MethodId),
    /// Entry of an exception handler block, named for diagnostics.
    ExceptionHandler(String),
}

/// Runtime types and fields the builder treats specially.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WellKnown {
    pub object: TypeId,
    pub object_header: TypeId,
    pub multi_use_word: FieldId,
    pub header_vtable: FieldId,
    pub vtable: TypeId,
    pub array: TypeId,
    pub array_length: FieldId,
    pub string: TypeId,
    pub string_length: FieldId,
    pub first_char: FieldId,
    pub byte: TypeId,
    pub int32: TypeId,
    pub uint32: TypeId,
    pub int_ptr: TypeId,
    pub code_pointer: TypeId,
    pub code_pointer_target: FieldId,
}

/// Source of type, method and value information for one image build.
///
/// Every descriptor handed to the builder is owned by the environment the
/// builder was created with.
pub trait Environment {
    fn well_known(&self) -> &WellKnown;

    /// Pointer size in bytes.
    fn pointer_size(&self) -> u32;

    fn type_def(&self, ty: TypeId) -> &TypeDef;

    fn field(&self, field: FieldId) -> &FieldDef;

    /// Field declared by `ty` itself at `offset`, if any.
    fn field_at_offset(&self, ty: TypeId, offset: u32) -> Option<FieldId>;

    /// Bytes a field or element of type `ty` occupies.
    fn size_of_holding_variable(&self, ty: TypeId) -> u32 {
        let def = self.type_def(ty);
        if def.is_held_by_reference() {
            self.pointer_size()
        } else {
            def.size
        }
    }

    fn method(&self, method: MethodId) -> &MethodDef;

    fn find_method(&self, name: &str) -> Option<MethodId>;

    fn descriptor(&self, id: DescriptorId) -> Option<&DataDescriptor>;

    /// Virtual-table value of instances of `ty`.
    fn vtable_descriptor(&self, ty: TypeId) -> Option<DescriptorId>;

    fn code_pointer(&self, id: CodePointerId) -> Option<&CodePointerTarget>;
}
