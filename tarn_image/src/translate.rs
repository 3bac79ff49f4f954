//! Declared types and methods → target storage types and declarations.
//!
//! Layouts mirror what the constant builder emits: a class is `{ base, own
//! slots }`, a value type is its own slots, a scalar is a one-field struct
//! around its integer. Own slots come from the same byte walk the builder
//! uses, so gaps become `Byte` slots here exactly where the builder places
//! padding bytes.

use rustc_hash::FxHashMap;

use tarn_ir::module::{FuncId, Module};
use tarn_ir::types::{StructId, Type};

use crate::env::{Environment, MethodId, TypeId, TypeKind};
use crate::error::{ImageError, ImageResult};

/// Memoized type and function translation, keyed by identity.
#[derive(Debug, Default)]
pub struct Translator {
    layouts: FxHashMap<TypeId, StructId>,
    functions: FxHashMap<MethodId, FuncId>,
}

/// Symbol of a method: the bare name for platform-invoke methods, otherwise
/// `Owner::Name_<id>`.
pub fn full_method_name<E: Environment>(env: &E, method: MethodId) -> String {
    let def = env.method(method);
    if def.pinvoke {
        def.name.clone()
    } else {
        format!("{}::{}_{}", env.type_def(def.owner).name, def.name, method.0)
    }
}

impl Translator {
    /// Named instance layout of `ty`.
    pub fn layout_of<E: Environment>(
        &mut self,
        env: &E,
        module: &mut Module,
        ty: TypeId,
    ) -> ImageResult<StructId> {
        if let Some(&id) = self.layouts.get(&ty) {
            return Ok(id);
        }
        let wk = env.well_known();
        let def = env.type_def(ty);
        let fields = match def.kind {
            TypeKind::Scalar { .. } => vec![Type::Int(def.size * 8)],
            TypeKind::ValueType => self.own_slots(env, module, ty, 0)?,
            TypeKind::Reference if ty == wk.object => {
                vec![Type::Struct(self.layout_of(env, module, wk.object_header)?)]
            }
            TypeKind::Reference => {
                let base = def.extends.ok_or_else(|| {
                    ImageError::invariant(format!("class {} has no base class", def.name))
                })?;
                let mut fields = vec![Type::Struct(self.layout_of(env, module, base)?)];
                let start = env.type_def(base).size;
                fields.extend(self.own_slots(env, module, ty, start)?);
                fields
            }
            // Element count is only known per instance; instances are laid
            // out as anonymous aggregates.
            TypeKind::Array { element } => vec![
                Type::Struct(self.layout_of(env, module, wk.array)?),
                Type::array(self.storage_of(env, module, element)?, 0),
            ],
        };
        let id = module.declare_struct(&env.type_def(ty).name, fields);
        self.layouts.insert(ty, id);
        Ok(id)
    }

    /// Storage type of a field or element of type `ty`.
    pub fn storage_of<E: Environment>(
        &mut self,
        env: &E,
        module: &mut Module,
        ty: TypeId,
    ) -> ImageResult<Type> {
        if env.type_def(ty).is_held_by_reference() {
            Ok(Type::Ptr)
        } else {
            Ok(Type::Struct(self.layout_of(env, module, ty)?))
        }
    }

    /// Slots of the region of `ty` from `start` to its size.
    fn own_slots<E: Environment>(
        &mut self,
        env: &E,
        module: &mut Module,
        ty: TypeId,
        start: u32,
    ) -> ImageResult<Vec<Type>> {
        let end = env.type_def(ty).size;
        let mut slots = Vec::new();
        let mut offset = start;
        while offset < end {
            match env.field_at_offset(ty, offset) {
                None => {
                    slots.push(self.storage_of(env, module, env.well_known().byte)?);
                    offset += 1;
                }
                Some(field) => {
                    let field_type = env.field(field).field_type;
                    offset += field_size(env, field_type, ty, offset)?;
                    slots.push(self.storage_of(env, module, field_type)?);
                }
            }
        }
        Ok(slots)
    }

    /// Declaration of `method`, added to the module on first use.
    pub fn declaration_of<E: Environment>(
        &mut self,
        env: &E,
        module: &mut Module,
        method: MethodId,
    ) -> ImageResult<FuncId> {
        if let Some(&id) = self.functions.get(&method) {
            return Ok(id);
        }
        let def = env.method(method);
        let params = def
            .params
            .iter()
            .map(|&p| self.storage_of(env, module, p))
            .collect::<ImageResult<Vec<_>>>()?;
        let ret = def
            .ret
            .map(|r| self.storage_of(env, module, r))
            .transpose()?;
        let id = module.get_or_insert_function(&full_method_name(env, method), params, ret);
        self.functions.insert(method, id);
        Ok(id)
    }
}

/// Bytes covered by a field of `field_type` declared in `owner` at `offset`.
pub(crate) fn field_size<E: Environment>(
    env: &E,
    field_type: TypeId,
    owner: TypeId,
    offset: u32,
) -> ImageResult<u32> {
    match env.size_of_holding_variable(field_type) {
        0 => Err(ImageError::invariant(format!(
            "zero-sized field at offset {offset} of {}",
            env.type_def(owner).name
        ))),
        n => Ok(n),
    }
}
