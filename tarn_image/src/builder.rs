//! Constant graph builder: descriptor → constant content.
//!
//! Objects are built root-outward along their ancestor chain: the object
//! header first, then each class's own region wrapped around the previous
//! aggregate. Arrays are `{ { object, length }, [elements] }`. Strings and
//! arrays are anonymous aggregates since their size depends on the value.

use tarn_ir::constant::Constant;
use tarn_ir::module::{FuncId, Module};
use tarn_ir::types::{StructId, Type};

use crate::descriptor::{
    ArrayDescriptor, CodePointerId, DataDescriptor, DescriptorId, ObjectDescriptor, Payload,
};
use crate::env::{CodePointerTarget, Environment, FieldDef, FieldId, MethodId, TypeId, TypeKind};
use crate::error::{ImageError, ImageResult};
use crate::registry::GlobalRegistry;
use crate::translate::{Translator, field_size};
use crate::typesystem::GcFlags;

/// Filler for bytes of an instance that no field covers.
pub const PADDING_BYTE: u64 = 0xab;

/// Builds the data image of one environment into one module.
pub struct ImageBuilder<'e, E: Environment> {
    pub(crate) env: &'e E,
    pub(crate) module: Module,
    pub(crate) translator: Translator,
    pub(crate) registry: GlobalRegistry,
}

impl<'e, E: Environment> ImageBuilder<'e, E> {
    /// Create a builder with an empty module whose pointer width follows
    /// the environment.
    pub fn new(env: &'e E, module_name: &str) -> Self {
        Self {
            env,
            module: Module::new(module_name, env.pointer_size() * 8),
            translator: Translator::default(),
            registry: GlobalRegistry::default(),
        }
    }

    pub fn env(&self) -> &'e E {
        self.env
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn registry(&self) -> &GlobalRegistry {
        &self.registry
    }

    pub fn layout_of(&mut self, ty: TypeId) -> ImageResult<StructId> {
        self.translator.layout_of(self.env, &mut self.module, ty)
    }

    pub fn storage_of(&mut self, ty: TypeId) -> ImageResult<Type> {
        self.translator.storage_of(self.env, &mut self.module, ty)
    }

    pub fn declaration_of(&mut self, method: MethodId) -> ImageResult<FuncId> {
        self.translator
            .declaration_of(self.env, &mut self.module, method)
    }

    pub(crate) fn descriptor(&self, id: DescriptorId) -> ImageResult<&'e DataDescriptor> {
        let env = self.env;
        env.descriptor(id)
            .ok_or_else(|| ImageError::invariant(format!("unknown descriptor #{}", id.0)))
    }

    /// Full content of `id`, laid out as its declared type.
    pub fn build_constant(&mut self, id: DescriptorId) -> ImageResult<Constant> {
        let treat_as = self.descriptor(id)?.context();
        self.build_constant_as(id, treat_as)
    }

    /// Full content of `id` laid out as `treat_as`. Arrays ignore `treat_as`.
    pub fn build_constant_as(&mut self, id: DescriptorId, treat_as: TypeId) -> ImageResult<Constant> {
        let result = match self.descriptor(id)? {
            DataDescriptor::Object(obj) => self.build_object(obj, treat_as),
            DataDescriptor::Array(arr) => self.build_array(arr),
        };
        result.map_err(|e| e.with_descriptor(id))
    }

    /// `treat_as` and its bases up to the root object, most derived first.
    /// Value types have no bases.
    fn ancestor_chain(&self, treat_as: TypeId) -> ImageResult<Vec<TypeId>> {
        let env = self.env;
        let root = env.well_known().object;
        let mut chain = Vec::new();
        let mut current = treat_as;
        loop {
            let def = env.type_def(current);
            match def.kind {
                TypeKind::Scalar { .. } | TypeKind::Array { .. } => {
                    return Err(ImageError::invariant(format!(
                        "object value laid out as {}",
                        def.name
                    )));
                }
                TypeKind::ValueType => {
                    chain.push(current);
                    return Ok(chain);
                }
                TypeKind::Reference => chain.push(current),
            }
            if current == root {
                return Ok(chain);
            }
            current = def.extends.ok_or_else(|| {
                ImageError::invariant(format!("{} does not derive from the root object", def.name))
            })?;
            if chain.contains(&current) {
                return Err(ImageError::invariant(format!(
                    "inheritance cycle through {}",
                    def.name
                )));
            }
        }
    }

    fn build_object(&mut self, obj: &'e ObjectDescriptor, treat_as: TypeId) -> ImageResult<Constant> {
        let env = self.env;
        let wk = env.well_known();
        let chain = self.ancestor_chain(treat_as)?;

        let mut current: Option<Constant> = None;
        for &ty in chain.iter().rev() {
            if ty == wk.object {
                current = Some(self.object_aggregate(obj.context, obj.is_mutable)?);
                continue;
            }
            let def = env.type_def(ty);
            let mut fields = Vec::new();
            let start = if def.is_value_type() {
                0
            } else {
                fields.extend(current.take());
                def.extends.map_or(0, |base| env.type_def(base).size)
            };
            self.encode_region(obj, ty, start, &mut fields)?;

            current = Some(if ty == wk.string {
                fields.push(self.string_chars(obj)?);
                Constant::anon(fields)
            } else {
                Constant::named(self.layout_of(ty)?, fields)
            });
        }
        current.ok_or_else(|| ImageError::invariant("empty ancestor chain"))
    }

    /// `{ header }` of the root object type for an instance of `context`.
    fn object_aggregate(&mut self, context: TypeId, is_mutable: bool) -> ImageResult<Constant> {
        let env = self.env;
        let wk = env.well_known();
        let vtable = env.vtable_descriptor(context).ok_or_else(|| {
            ImageError::invariant(format!("{} has no virtual table", env.type_def(context).name))
        })?;
        let flags = if is_mutable {
            GcFlags::UNRECLAIMABLE_OBJECT
        } else {
            GcFlags::READ_ONLY_OBJECT
        };
        let word = self.encode_scalar(env.field(wk.multi_use_word).field_type, u64::from(flags))?;
        let vtable = self.request_pointer(vtable)?;
        let header = Constant::named(
            self.layout_of(wk.object_header)?,
            vec![word, Constant::GlobalAddr(vtable)],
        );
        Ok(Constant::named(self.layout_of(wk.object)?, vec![header]))
    }

    /// Encode the bytes of `ty`'s own region from `start` to its size.
    fn encode_region(
        &mut self,
        obj: &'e ObjectDescriptor,
        ty: TypeId,
        start: u32,
        fields: &mut Vec<Constant>,
    ) -> ImageResult<()> {
        let env = self.env;
        let end = env.type_def(ty).size;
        let mut offset = start;
        while offset < end {
            let Some(field) = env.field_at_offset(ty, offset) else {
                fields.push(self.encode_scalar(env.well_known().byte, PADDING_BYTE)?);
                offset += 1;
                continue;
            };
            let def = env.field(field);
            offset += field_size(env, def.field_type, ty, offset)?;
            fields.push(self.encode_field(obj, field, def)?);
        }
        Ok(())
    }

    fn encode_field(
        &mut self,
        obj: &'e ObjectDescriptor,
        field: FieldId,
        def: &'e FieldDef,
    ) -> ImageResult<Constant> {
        let env = self.env;
        let Some(&payload) = obj.values.get(&field) else {
            return Ok(Constant::Zeroed(self.storage_of(def.field_type)?));
        };
        let context = || format!("field {} of {}", def.name, env.type_def(def.owner).name);
        let wk = env.well_known();
        if let Payload::CodePointer(id) = payload {
            if field == wk.code_pointer_target {
                return self.encode_code_target(id, def, context);
            }
            // A code pointer id stored straight into a `CodePointer` field
            // stands for `{ Target: id }`.
            if def.field_type == wk.code_pointer {
                let target_def = env.field(wk.code_pointer_target);
                let target = self.encode_code_target(id, target_def, context)?;
                return Ok(Constant::named(self.layout_of(def.field_type)?, vec![target]));
            }
        }
        self.encode_payload(def.field_type, payload, context)
    }

    /// Encode one field or element payload of declared type `ty`.
    fn encode_payload(
        &mut self,
        ty: TypeId,
        payload: Payload,
        context: impl FnOnce() -> String,
    ) -> ImageResult<Constant> {
        match payload {
            Payload::Null => self.encode_scalar(ty, 0),
            Payload::Scalar(raw) if self.env.type_def(ty).is_scalar() => self.encode_scalar(ty, raw),
            Payload::Descriptor(d) => {
                if self.descriptor(d)?.nesting().is_some() {
                    self.build_constant(d)
                } else {
                    Ok(Constant::GlobalAddr(self.request_pointer(d)?))
                }
            }
            Payload::Scalar(_) | Payload::CodePointer(_) => {
                Err(ImageError::type_consistency(payload, context()))
            }
        }
    }

    /// Resolve code pointer `id` into the target field `def`: the method's
    /// function address wrapped in the field's aggregate.
    fn encode_code_target(
        &mut self,
        id: CodePointerId,
        def: &'e FieldDef,
        context: impl FnOnce() -> String,
    ) -> ImageResult<Constant> {
        let env = self.env;
        match env.code_pointer(id) {
            None => Err(ImageError::invariant(format!("unknown code pointer #{}", id.0))),
            Some(CodePointerTarget::Method(method)) => {
                let func = self.declaration_of(*method)?;
                Ok(Constant::named(
                    self.layout_of(def.field_type)?,
                    vec![Constant::FuncAddr(func)],
                ))
            }
            Some(CodePointerTarget::ExceptionHandler(block)) => Err(ImageError::unsupported(
                "exception handler code pointers",
                format!("handler {block} in {}", context()),
            )),
        }
    }

    /// Inline character data of a string instance.
    fn string_chars(&mut self, obj: &'e ObjectDescriptor) -> ImageResult<Constant> {
        let env = self.env;
        let char_ty = env.field(env.well_known().first_char).field_type;
        let elem = self.storage_of(char_ty)?;
        let text = obj.source.as_deref().unwrap_or_default();
        let elems = text
            .encode_utf16()
            .map(|unit| self.encode_scalar(char_ty, u64::from(unit)))
            .collect::<ImageResult<Vec<_>>>()?;
        Ok(Constant::Array { elem, elems })
    }

    fn build_array(&mut self, arr: &'e ArrayDescriptor) -> ImageResult<Constant> {
        let env = self.env;
        let wk = env.well_known();
        let def = env.type_def(arr.context);
        let TypeKind::Array { element } = def.kind else {
            return Err(ImageError::invariant(format!(
                "array value laid out as {}",
                def.name
            )));
        };

        let object = self.object_aggregate(arr.context, arr.is_mutable)?;
        let length_ty = env.field(wk.array_length).field_type;
        let length = self.encode_scalar(length_ty, u64::from(arr.length))?;
        let base = Constant::named(self.layout_of(wk.array)?, vec![object, length]);

        let count_mismatch = |found: usize| {
            ImageError::invariant(format!(
                "{} of length {} has {found} elements",
                def.name, arr.length
            ))
        };
        let elems = match &arr.values {
            Some(values) => {
                if values.len() != arr.length as usize {
                    return Err(count_mismatch(values.len()));
                }
                values
                    .iter()
                    .enumerate()
                    .map(|(i, &p)| {
                        self.encode_payload(element, p, || format!("element {i} of {}", def.name))
                    })
                    .collect::<ImageResult<Vec<_>>>()?
            }
            None => {
                let source = arr.source.as_deref().unwrap_or_default();
                if source.len() != arr.length as usize {
                    return Err(count_mismatch(source.len()));
                }
                if let Some(&raw) = source.first()
                    && !env.type_def(element).is_scalar()
                {
                    return Err(ImageError::type_consistency(
                        Payload::Scalar(raw),
                        format!("element 0 of {}", def.name),
                    ));
                }
                source
                    .iter()
                    .map(|&raw| self.encode_scalar(element, raw))
                    .collect::<ImageResult<Vec<_>>>()?
            }
        };

        let elem = self.storage_of(element)?;
        Ok(Constant::anon(vec![base, Constant::Array { elem, elems }]))
    }
}
