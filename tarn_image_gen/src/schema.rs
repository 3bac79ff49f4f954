//! JSON image description.
//!
//! ```json
//! {
//!   "types": [
//!     { "name": "Point", "kind": "class", "base": "System.Object", "size": 12,
//!       "fields": [{ "name": "X", "offset": 8, "type": "System.Int32" }] }
//!   ],
//!   "methods": [{ "owner": "Kernel", "name": "Bootstrap_Initialization" }],
//!   "values": [
//!     { "name": "origin", "kind": "object", "type": "Point",
//!       "fields": { "X": { "scalar": 7 } } },
//!     { "name": "banner", "kind": "string", "text": "tarn" },
//!     { "name": "table", "kind": "array", "type": "System.Int32[]", "source": [1, 2] }
//!   ],
//!   "roots": ["origin"]
//! }
//! ```
//!
//! Types may refer to `Elem[]` array types, which are created on use. Base
//! classes must be declared before the classes deriving from them.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use thiserror::Error;

use tarn_image::TypeSystem;
use tarn_image::descriptor::{ArrayDescriptor, DataDescriptor, DescriptorId, ObjectDescriptor, Payload};
use tarn_image::env::{CodePointerTarget, Environment, TypeId};

#[derive(Debug, Error)]
pub enum DescriptionError {
    #[error("invalid description: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown type `{0}`")]
    UnknownType(String),
    #[error("type `{ty}` has no field `{field}`")]
    UnknownField { ty: String, field: String },
    #[error("scalar `{ty}` is {size} bytes wide, encodable widths are 1 to 8")]
    ScalarWidth { ty: String, size: u32 },
    #[error("unknown method `{0}`")]
    UnknownMethod(String),
    #[error("unknown value `{0}`")]
    UnknownValue(String),
    #[error("value `{0}` is defined twice")]
    DuplicateValue(String),
    #[error("value `{value}`: {message}")]
    Malformed { value: String, message: String },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Description {
    #[serde(default)]
    pub types: Vec<TypeSpec>,
    #[serde(default)]
    pub methods: Vec<MethodSpec>,
    #[serde(default)]
    pub values: Vec<ValueSpec>,
    #[serde(default)]
    pub roots: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKindSpec {
    Class,
    ValueType,
    Scalar,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeSpec {
    pub name: String,
    pub kind: TypeKindSpec,
    /// Base class; defaults to the root object type.
    #[serde(default)]
    pub base: Option<String>,
    pub size: u32,
    #[serde(default)]
    pub signed: bool,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSpec {
    pub name: String,
    pub offset: u32,
    #[serde(rename = "type")]
    pub ty: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MethodSpec {
    pub owner: String,
    pub name: String,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default)]
    pub ret: Option<String>,
    #[serde(default)]
    pub pinvoke: bool,
}

/// Raw scalar, given as a signed or unsigned JSON integer.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum RawScalar {
    Unsigned(u64),
    Signed(i64),
}

impl RawScalar {
    fn bits(self) -> u64 {
        match self {
            RawScalar::Unsigned(v) => v,
            RawScalar::Signed(v) => v as u64,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadSpec {
    Null,
    Scalar(RawScalar),
    /// Another value, by name.
    Value(String),
    /// Code pointer to a method, by name.
    Method(String),
    /// Code pointer to an exception handler block.
    Handler(String),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValueBody {
    Object {
        #[serde(rename = "type")]
        ty: String,
        #[serde(default)]
        fields: IndexMap<String, PayloadSpec>,
    },
    String {
        text: String,
    },
    Array {
        #[serde(rename = "type")]
        ty: String,
        #[serde(default)]
        values: Option<Vec<PayloadSpec>>,
        #[serde(default)]
        source: Option<Vec<RawScalar>>,
        /// Defaults to the number of values or source elements.
        #[serde(default)]
        length: Option<u32>,
    },
}

#[derive(Debug, Deserialize)]
pub struct ValueSpec {
    pub name: String,
    #[serde(default)]
    pub mutable: bool,
    /// Embed inline in this containing value instead of getting a global.
    #[serde(default)]
    pub nested_in: Option<String>,
    #[serde(flatten)]
    pub body: ValueBody,
}

/// A type system populated from a description, plus the values to
/// materialize.
pub struct Image {
    pub types: TypeSystem,
    pub roots: Vec<DescriptorId>,
}

impl Description {
    pub fn from_json(text: &str) -> Result<Self, DescriptionError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn build(&self, pointer_size: u32) -> Result<Image, DescriptionError> {
        let mut ts = TypeSystem::new(pointer_size);
        self.declare_types(&mut ts)?;
        for m in &self.methods {
            let owner = resolve_type(&mut ts, &m.owner)?;
            let params = m
                .params
                .iter()
                .map(|p| resolve_type(&mut ts, p))
                .collect::<Result<Vec<_>, _>>()?;
            let ret = m.ret.as_deref().map(|r| resolve_type(&mut ts, r)).transpose()?;
            ts.add_method(owner, &m.name, params, ret, m.pinvoke);
        }
        let values = self.declare_values(&mut ts)?;
        for spec in &self.values {
            fill_value(&mut ts, &values, spec)?;
        }
        let roots = self
            .roots
            .iter()
            .map(|r| lookup(&values, r))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Image { types: ts, roots })
    }

    fn declare_types(&self, ts: &mut TypeSystem) -> Result<(), DescriptionError> {
        let object = ts.well_known().object;
        let mut declared = Vec::with_capacity(self.types.len());
        for spec in &self.types {
            let id = match spec.kind {
                TypeKindSpec::Scalar => {
                    if !(1..=8).contains(&spec.size) {
                        return Err(DescriptionError::ScalarWidth {
                            ty: spec.name.clone(),
                            size: spec.size,
                        });
                    }
                    ts.add_scalar(&spec.name, spec.size, spec.signed)
                }
                TypeKindSpec::ValueType => ts.add_value_type(&spec.name, spec.size),
                TypeKindSpec::Class => {
                    let base = match &spec.base {
                        Some(b) => resolve_type(ts, b)?,
                        None => object,
                    };
                    ts.add_class(&spec.name, base, spec.size)
                }
            };
            declared.push(id);
        }
        // Fields last, so they may name any declared type.
        for (spec, &id) in self.types.iter().zip(&declared) {
            for f in &spec.fields {
                let field_type = resolve_type(ts, &f.ty)?;
                ts.add_field(id, &f.name, f.offset, field_type);
            }
        }
        Ok(())
    }

    /// Allocate a descriptor per value so payloads can refer to any of them.
    fn declare_values(
        &self,
        ts: &mut TypeSystem,
    ) -> Result<FxHashMap<String, DescriptorId>, DescriptionError> {
        let mut values = FxHashMap::default();
        for spec in &self.values {
            let id = match &spec.body {
                ValueBody::String { text } => ts.add_string(text),
                ValueBody::Object { ty, .. } => {
                    let ty = resolve_type(ts, ty)?;
                    ts.add_descriptor(ObjectDescriptor::new(ty, spec.mutable))
                }
                ValueBody::Array { ty, .. } => {
                    let ty = resolve_type(ts, ty)?;
                    ts.add_descriptor(ArrayDescriptor::new(ty, 0, spec.mutable))
                }
            };
            if values.insert(spec.name.clone(), id).is_some() {
                return Err(DescriptionError::DuplicateValue(spec.name.clone()));
            }
        }
        Ok(values)
    }
}

fn lookup(values: &FxHashMap<String, DescriptorId>, name: &str) -> Result<DescriptorId, DescriptionError> {
    values
        .get(name)
        .copied()
        .ok_or_else(|| DescriptionError::UnknownValue(name.to_string()))
}

/// Find a type by name, creating `Elem[]` array types on demand.
fn resolve_type(ts: &mut TypeSystem, name: &str) -> Result<TypeId, DescriptionError> {
    if let Some(id) = ts.find_type(name) {
        return Ok(id);
    }
    match name.strip_suffix("[]") {
        Some(element) => {
            let element = resolve_type(ts, element)?;
            Ok(ts.add_array_type(element))
        }
        None => Err(DescriptionError::UnknownType(name.to_string())),
    }
}

fn payload(
    ts: &mut TypeSystem,
    values: &FxHashMap<String, DescriptorId>,
    spec: &PayloadSpec,
) -> Result<Payload, DescriptionError> {
    Ok(match spec {
        PayloadSpec::Null => Payload::Null,
        PayloadSpec::Scalar(raw) => Payload::Scalar(raw.bits()),
        PayloadSpec::Value(name) => Payload::Descriptor(lookup(values, name)?),
        PayloadSpec::Method(name) => {
            let method = ts
                .find_method(name)
                .ok_or_else(|| DescriptionError::UnknownMethod(name.clone()))?;
            Payload::CodePointer(ts.add_code_pointer(CodePointerTarget::Method(method)))
        }
        PayloadSpec::Handler(block) => {
            Payload::CodePointer(ts.add_code_pointer(CodePointerTarget::ExceptionHandler(block.clone())))
        }
    })
}

fn fill_value(
    ts: &mut TypeSystem,
    values: &FxHashMap<String, DescriptorId>,
    spec: &ValueSpec,
) -> Result<(), DescriptionError> {
    let id = lookup(values, &spec.name)?;
    let nesting = spec
        .nested_in
        .as_deref()
        .map(|container| lookup(values, container))
        .transpose()?;

    match &spec.body {
        ValueBody::String { .. } => {}
        ValueBody::Object { fields, .. } => {
            let context = ts.descriptor_mut(id).context();
            for (name, p) in fields {
                let field = ts.find_field(context, name).ok_or_else(|| DescriptionError::UnknownField {
                    ty: ts.type_def(context).name.clone(),
                    field: name.clone(),
                })?;
                let p = payload(ts, values, p)?;
                ts.set_payload(id, field, p);
            }
        }
        ValueBody::Array {
            values: elements,
            source,
            length,
            ..
        } => {
            let elements = elements
                .as_ref()
                .map(|e| e.iter().map(|p| payload(ts, values, p)).collect::<Result<Vec<_>, _>>())
                .transpose()?;
            let source: Option<Vec<u64>> = source.as_ref().map(|s| s.iter().map(|r| r.bits()).collect());
            let count = elements
                .as_ref()
                .map(Vec::len)
                .or(source.as_ref().map(Vec::len))
                .unwrap_or(0);
            let length = match length {
                Some(n) => *n,
                None => u32::try_from(count).map_err(|_| DescriptionError::Malformed {
                    value: spec.name.clone(),
                    message: format!("{count} elements do not fit an array length"),
                })?,
            };
            if let DataDescriptor::Array(arr) = ts.descriptor_mut(id) {
                arr.length = length;
                arr.values = elements;
                arr.source = source;
            }
        }
    }

    if let Some(container) = nesting {
        match ts.descriptor_mut(id) {
            DataDescriptor::Object(obj) => obj.nesting = Some(container),
            DataDescriptor::Array(arr) => arr.nesting = Some(container),
        }
    }
    Ok(())
}
