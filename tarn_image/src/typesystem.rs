//! In-memory `Environment` with the runtime's well-known types.
//!
//! `TypeSystem::new` lays out the core runtime types for the requested
//! pointer size:
//!
//! ```text
//! ObjectHeader (value)  { MultiUseWord: UInt32 @0, VTable: VTable @4 }
//! Object                { header }                       size H = 4 + ptr
//! VTable : Object       { BaseSize: UInt32 @H, ElementSize: UInt32 @H+4 }
//! Array : Object        { Length: Int32 @H }
//! String : Object       { StringLength: Int32 @H }, FirstChar: Char @H+4
//! CodePointer (value)   { Target: IntPtr @0 }
//! ```
//!
//! `FirstChar` sits at the end of the string's fixed region: character data
//! is appended per instance. The virtual table of `VTable` is itself.

use rustc_hash::FxHashMap;

use crate::descriptor::{CodePointerId, DataDescriptor, DescriptorId, ObjectDescriptor, Payload};
use crate::env::{
    CodePointerTarget, Environment, FieldDef, FieldId, MethodDef, MethodId, TypeDef, TypeId,
    TypeKind, WellKnown,
};

/// Values written into an object header's multi-use word.
pub struct GcFlags;

impl GcFlags {
    pub const MARKED: u32 = 0x1;
    pub const PINNED: u32 = 0x2;
    pub const READ_ONLY_OBJECT: u32 = 0x6;
    pub const UNRECLAIMABLE_OBJECT: u32 = 0x8;
    pub const ALLOCATED_RAW_BYTES: u32 = 0xa;
}

pub struct TypeSystem {
    pointer_size: u32,
    types: Vec<TypeDef>,
    type_names: FxHashMap<String, TypeId>,
    fields: Vec<FieldDef>,
    field_offsets: FxHashMap<(TypeId, u32), FieldId>,
    methods: Vec<MethodDef>,
    method_names: FxHashMap<String, MethodId>,
    descriptors: Vec<DataDescriptor>,
    vtables: FxHashMap<TypeId, DescriptorId>,
    array_types: FxHashMap<TypeId, TypeId>,
    code_pointers: Vec<CodePointerTarget>,
    well_known: WellKnown,
}

impl TypeSystem {
    /// Create a type system with the runtime types laid out for
    /// `pointer_size`-byte pointers.
    pub fn new(pointer_size: u32) -> Self {
        let mut ts = Self {
            pointer_size,
            types: Vec::new(),
            type_names: FxHashMap::default(),
            fields: Vec::new(),
            field_offsets: FxHashMap::default(),
            methods: Vec::new(),
            method_names: FxHashMap::default(),
            descriptors: Vec::new(),
            vtables: FxHashMap::default(),
            array_types: FxHashMap::default(),
            code_pointers: Vec::new(),
            well_known: WellKnown::default(),
        };

        ts.add_scalar("System.Boolean", 1, false);
        let byte = ts.add_scalar("System.Byte", 1, false);
        ts.add_scalar("System.SByte", 1, true);
        let char_ty = ts.add_scalar("System.Char", 2, false);
        ts.add_scalar("System.Int16", 2, true);
        ts.add_scalar("System.UInt16", 2, false);
        let int32 = ts.add_scalar("System.Int32", 4, true);
        let uint32 = ts.add_scalar("System.UInt32", 4, false);
        ts.add_scalar("System.Int64", 8, true);
        ts.add_scalar("System.UInt64", 8, false);
        let int_ptr = ts.add_scalar("System.IntPtr", pointer_size, true);
        ts.add_scalar("System.UIntPtr", pointer_size, false);

        let header_size = 4 + pointer_size;
        let object_header = ts.add_value_type("Microsoft.Zelig.Runtime.ObjectHeader", header_size);
        let object = ts.push_type("System.Object", TypeKind::Reference, None, header_size);
        let vtable = ts.push_type(
            "Microsoft.Zelig.Runtime.VTable",
            TypeKind::Reference,
            Some(object),
            header_size + 8,
        );
        let array = ts.push_type("System.Array", TypeKind::Reference, Some(object), header_size + 4);
        let string = ts.push_type("System.String", TypeKind::Reference, Some(object), header_size + 4);
        let code_pointer = ts.add_value_type("Microsoft.Zelig.Runtime.CodePointer", pointer_size);

        let multi_use_word = ts.add_field(object_header, "MultiUseWord", 0, uint32);
        let header_vtable = ts.add_field(object_header, "VTable", 4, vtable);
        ts.add_field(vtable, "BaseSize", header_size, uint32);
        ts.add_field(vtable, "ElementSize", header_size + 4, uint32);
        let array_length = ts.add_field(array, "Length", header_size, int32);
        let string_length = ts.add_field(string, "StringLength", header_size, int32);
        let first_char = ts.add_field(string, "FirstChar", header_size + 4, char_ty);
        let code_pointer_target = ts.add_field(code_pointer, "Target", 0, int_ptr);

        ts.well_known = WellKnown {
            object,
            object_header,
            multi_use_word,
            header_vtable,
            vtable,
            array,
            array_length,
            string,
            string_length,
            first_char,
            byte,
            int32,
            uint32,
            int_ptr,
            code_pointer,
            code_pointer_target,
        };

        for ty in [object, vtable, array, string] {
            ts.add_vtable(ty);
        }
        ts
    }

    fn push_type(&mut self, name: &str, kind: TypeKind, extends: Option<TypeId>, size: u32) -> TypeId {
        if let Some(&id) = self.type_names.get(name) {
            return id;
        }
        let id = TypeId(self.types.len() as u32);
        self.types.push(TypeDef {
            name: name.to_string(),
            kind,
            extends,
            size,
            fields: Vec::new(),
        });
        self.type_names.insert(name.to_string(), id);
        id
    }

    /// Add an integer-like primitive of `size` bytes.
    pub fn add_scalar(&mut self, name: &str, size: u32, signed: bool) -> TypeId {
        self.push_type(name, TypeKind::Scalar { signed }, None, size)
    }

    /// Add a class deriving from `base` whose instances are `size` bytes,
    /// base region included. The class gets a virtual table.
    pub fn add_class(&mut self, name: &str, base: TypeId, size: u32) -> TypeId {
        let id = self.push_type(name, TypeKind::Reference, Some(base), size);
        self.add_vtable(id);
        id
    }

    pub fn add_value_type(&mut self, name: &str, size: u32) -> TypeId {
        self.push_type(name, TypeKind::ValueType, None, size)
    }

    /// The array type with elements of `element`, created on first use.
    pub fn add_array_type(&mut self, element: TypeId) -> TypeId {
        if let Some(&id) = self.array_types.get(&element) {
            return id;
        }
        let name = format!("{}[]", self.types[element.0 as usize].name);
        let array = self.well_known.array;
        let size = self.types[array.0 as usize].size;
        let id = self.push_type(&name, TypeKind::Array { element }, Some(array), size);
        self.array_types.insert(element, id);
        self.add_vtable(id);
        id
    }

    /// Declare a field of `owner` at `offset`. A second field at the same
    /// offset is recorded but never found by offset lookup.
    pub fn add_field(&mut self, owner: TypeId, name: &str, offset: u32, field_type: TypeId) -> FieldId {
        let id = FieldId(self.fields.len() as u32);
        self.fields.push(FieldDef {
            name: name.to_string(),
            owner,
            offset,
            field_type,
        });
        self.types[owner.0 as usize].fields.push(id);
        self.field_offsets.entry((owner, offset)).or_insert(id);
        id
    }

    pub fn add_method(
        &mut self,
        owner: TypeId,
        name: &str,
        params: Vec<TypeId>,
        ret: Option<TypeId>,
        pinvoke: bool,
    ) -> MethodId {
        let id = MethodId(self.methods.len() as u32);
        self.methods.push(MethodDef {
            name: name.to_string(),
            owner,
            params,
            ret,
            pinvoke,
        });
        self.method_names.entry(name.to_string()).or_insert(id);
        id
    }

    pub fn add_descriptor(&mut self, descriptor: impl Into<DataDescriptor>) -> DescriptorId {
        let id = DescriptorId(self.descriptors.len() as u32);
        self.descriptors.push(descriptor.into());
        id
    }

    /// Mutable access for wiring up reference cycles after allocation.
    pub fn descriptor_mut(&mut self, id: DescriptorId) -> &mut DataDescriptor {
        &mut self.descriptors[id.0 as usize]
    }

    /// Set one field payload of an object descriptor.
    pub fn set_payload(&mut self, id: DescriptorId, field: FieldId, payload: Payload) {
        if let DataDescriptor::Object(obj) = self.descriptor_mut(id) {
            obj.values.insert(field, payload);
        }
    }

    /// Add an immutable string instance.
    pub fn add_string(&mut self, text: &str) -> DescriptorId {
        let len = text.encode_utf16().count() as u64;
        let obj = ObjectDescriptor::new(self.well_known.string, false)
            .with_value(self.well_known.string_length, Payload::Scalar(len))
            .with_source(text);
        self.add_descriptor(obj)
    }

    pub fn set_vtable(&mut self, ty: TypeId, vtable: DescriptorId) {
        self.vtables.insert(ty, vtable);
    }

    /// Create the virtual table value for `ty`, unless it already has one.
    pub fn add_vtable(&mut self, ty: TypeId) -> DescriptorId {
        if let Some(&existing) = self.vtables.get(&ty) {
            return existing;
        }
        let def = &self.types[ty.0 as usize];
        let element_size = match def.kind {
            TypeKind::Array { element } => self.size_of_holding_variable(element),
            _ => 0,
        };
        let base_size = def.size;

        let vtable_ty = self.well_known.vtable;
        let mut obj = ObjectDescriptor::new(vtable_ty, false);
        if let Some(f) = self.find_field(vtable_ty, "BaseSize") {
            obj.values.insert(f, Payload::Scalar(u64::from(base_size)));
        }
        if element_size != 0
            && let Some(f) = self.find_field(vtable_ty, "ElementSize")
        {
            obj.values.insert(f, Payload::Scalar(u64::from(element_size)));
        }
        let id = self.add_descriptor(obj);
        self.vtables.insert(ty, id);
        id
    }

    pub fn add_code_pointer(&mut self, target: CodePointerTarget) -> CodePointerId {
        let id = CodePointerId(self.code_pointers.len() as u32);
        self.code_pointers.push(target);
        id
    }

    pub fn find_type(&self, name: &str) -> Option<TypeId> {
        self.type_names.get(name).copied()
    }

    /// Find a field declared by `owner` or one of its base classes.
    pub fn find_field(&self, owner: TypeId, name: &str) -> Option<FieldId> {
        let mut current = Some(owner);
        while let Some(ty) = current {
            let def = &self.types[ty.0 as usize];
            if let Some(&f) = def.fields.iter().find(|f| self.fields[f.0 as usize].name == name) {
                return Some(f);
            }
            current = if def.is_value_type() { None } else { def.extends };
        }
        None
    }

    pub fn header_size(&self) -> u32 {
        4 + self.pointer_size
    }

    pub fn descriptor_count(&self) -> usize {
        self.descriptors.len()
    }
}

impl Environment for TypeSystem {
    fn well_known(&self) -> &WellKnown {
        &self.well_known
    }

    fn pointer_size(&self) -> u32 {
        self.pointer_size
    }

    fn type_def(&self, ty: TypeId) -> &TypeDef {
        &self.types[ty.0 as usize]
    }

    fn field(&self, field: FieldId) -> &FieldDef {
        &self.fields[field.0 as usize]
    }

    fn field_at_offset(&self, ty: TypeId, offset: u32) -> Option<FieldId> {
        self.field_offsets.get(&(ty, offset)).copied()
    }

    fn method(&self, method: MethodId) -> &MethodDef {
        &self.methods[method.0 as usize]
    }

    fn find_method(&self, name: &str) -> Option<MethodId> {
        self.method_names.get(name).copied()
    }

    fn descriptor(&self, id: DescriptorId) -> Option<&DataDescriptor> {
        self.descriptors.get(id.0 as usize)
    }

    fn vtable_descriptor(&self, ty: TypeId) -> Option<DescriptorId> {
        self.vtables.get(&ty).copied()
    }

    fn code_pointer(&self, id: CodePointerId) -> Option<&CodePointerTarget> {
        self.code_pointers.get(id.0 as usize)
    }
}
