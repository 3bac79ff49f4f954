//! Module assembler: resolve the data image, wire the entry point, emit.

use std::fs;
use std::path::Path;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use tarn_ir::layout::DataLayout;
use tarn_ir::module::{GlobalId, Module};
use tarn_ir::verifier::verify_module;
use tarn_target::backend::Backend;
use tarn_target::lower::lower_globals;
use tarn_target::types::{CompiledFunction, SymbolAlias};

use crate::builder::ImageBuilder;
use crate::config::ImageConfig;
use crate::descriptor::DescriptorId;
use crate::env::{Environment, MethodId};
use crate::error::{ImageError, ImageResult};
use crate::translate::full_method_name;

/// Source position of a method, supplied by the front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugInfo {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

/// Owns one image build from root requests to the emitted object.
pub struct ModuleManager<'e, E: Environment, B: Backend> {
    builder: ImageBuilder<'e, E>,
    config: ImageConfig,
    backend: B,
    functions: Vec<CompiledFunction>,
    debug_info: FxHashMap<MethodId, DebugInfo>,
    object_code: Option<Vec<u8>>,
}

impl<'e, E: Environment, B: Backend> ModuleManager<'e, E, B> {
    pub fn new(env: &'e E, config: ImageConfig, backend: B) -> ImageResult<Self> {
        let env_bits = env.pointer_size() * 8;
        if config.native_int_size != env_bits {
            return Err(ImageError::config(format!(
                "native_int_size is {} bits but the environment uses {env_bits}-bit pointers",
                config.native_int_size
            )));
        }
        if backend.pointer_width() != env_bits {
            return Err(ImageError::config(format!(
                "backend `{}` emits {}-bit pointers, environment uses {env_bits}",
                backend.name(),
                backend.pointer_width()
            )));
        }
        Ok(Self {
            builder: ImageBuilder::new(env, &config.image_name),
            config,
            backend,
            functions: Vec::new(),
            debug_info: FxHashMap::default(),
            object_code: None,
        })
    }

    /// Request a value directly; its content is complete on return.
    pub fn materialize_root(&mut self, id: DescriptorId) -> ImageResult<GlobalId> {
        self.builder.materialize_root(id)
    }

    /// Global already assigned to `id`, if any.
    pub fn global_for(&self, id: DescriptorId) -> Option<GlobalId> {
        self.builder.registry().get(id)
    }

    /// Add a function body produced by instruction selection.
    pub fn add_compiled_function(&mut self, function: CompiledFunction) {
        self.functions.push(function);
    }

    /// Symbol a method's body must be emitted under.
    pub fn function_symbol(&self, method: MethodId) -> String {
        full_method_name(self.builder.env(), method)
    }

    pub fn set_debug_info(&mut self, method: MethodId, info: DebugInfo) {
        self.debug_info.insert(method, info);
    }

    pub fn debug_info_for_methods(&self) -> &FxHashMap<MethodId, DebugInfo> {
        &self.debug_info
    }

    /// Resolve only; skip verification, entry wiring and emission.
    pub fn set_validation_disabled(&mut self) {
        self.config.validate = false;
    }

    pub fn config(&self) -> &ImageConfig {
        &self.config
    }

    pub fn native_int_size(&self) -> u32 {
        self.builder.module().native_int_size
    }

    pub fn module(&self) -> &Module {
        self.builder.module()
    }

    pub fn builder(&mut self) -> &mut ImageBuilder<'e, E> {
        &mut self.builder
    }

    /// Object file produced by the last successful `compile`.
    pub fn object_code(&self) -> Option<&[u8]> {
        self.object_code.as_deref()
    }

    #[instrument(skip(self), fields(image = %self.config.image_name))]
    pub fn compile(&mut self) -> ImageResult<()> {
        let filled = self.builder.resolve_all()?;
        if !self.config.validate {
            info!(filled, "resolved without validation");
            return Ok(());
        }

        let report = verify_module(self.builder.module());
        if !report.is_ok() {
            return Err(ImageError::verification(report));
        }

        let env = self.builder.env();
        let bootstrap = env
            .find_method(&self.config.bootstrap_method)
            .ok_or_else(|| ImageError::missing_bootstrap(&self.config.bootstrap_method))?;
        let entry = self.builder.declaration_of(bootstrap)?;
        self.builder
            .module
            .create_alias(&self.config.entry_symbol, entry);

        let object = self.emit()?;
        info!(
            globals = self.builder.module().global_count(),
            bytes = object.len(),
            backend = self.backend.name(),
            "image compiled"
        );
        self.object_code = Some(object);
        Ok(())
    }

    fn emit(&self) -> ImageResult<Vec<u8>> {
        let module = self.builder.module();
        let statics = lower_globals(module, &DataLayout::for_module(module))?;
        let aliases: Vec<SymbolAlias> = module
            .aliases()
            .iter()
            .map(|a| SymbolAlias {
                name: module.resolve(a.name).to_string(),
                target: module.resolve(module.function(a.target).name).to_string(),
            })
            .collect();
        Ok(self
            .backend
            .emit_object(&self.functions, &statics, &aliases)?)
    }

    /// Write the module as text, or as the backend's object file. The object
    /// is emitted on demand when `compile` did not produce one.
    #[instrument(skip(self))]
    pub fn dump_to_file(&self, path: &Path, as_text: bool) -> ImageResult<()> {
        let bytes = if as_text {
            self.builder.module().to_string().into_bytes()
        } else {
            match &self.object_code {
                Some(code) => code.clone(),
                None => self.emit()?,
            }
        };
        fs::write(path, &bytes).map_err(|e| ImageError::io(path, e))?;
        info!(bytes = bytes.len(), "dumped");
        Ok(())
    }
}
