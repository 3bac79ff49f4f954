//! Global registry: one global per descriptor identity.
//!
//! Objects get a placeholder of their declared layout on first request and
//! are filled later. Arrays and strings are built first and their global is
//! created from the content, since their type depends on it. A re-entrant
//! request for an array or string still being built gets a placeholder; the
//! finished global is then merged into it.

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use tracing::trace;

use tarn_ir::module::GlobalId;
use tarn_ir::types::Type;

use crate::builder::ImageBuilder;
use crate::descriptor::{DataDescriptor, DescriptorId};
use crate::env::Environment;
use crate::error::{ImageError, ImageResult};

/// Descriptor identity → global, in registration order.
#[derive(Debug, Default)]
pub struct GlobalRegistry {
    entries: IndexMap<DescriptorId, GlobalId>,
    in_progress: FxHashSet<DescriptorId>,
}

impl GlobalRegistry {
    pub fn get(&self, id: DescriptorId) -> Option<GlobalId> {
        self.entries.get(&id).copied()
    }

    /// Entry at registration position `index`.
    pub fn get_index(&self, index: usize) -> Option<(DescriptorId, GlobalId)> {
        self.entries.get_index(index).map(|(&d, &g)| (d, g))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DescriptorId, GlobalId)> + '_ {
        self.entries.iter().map(|(&d, &g)| (d, g))
    }
}

impl<E: Environment> ImageBuilder<'_, E> {
    /// Global holding `id`, created on first request.
    pub fn request_pointer(&mut self, id: DescriptorId) -> ImageResult<GlobalId> {
        if let Some(global) = self.registry.get(id) {
            return Ok(self.module.resolve_global(global));
        }
        let desc = self.descriptor(id)?;
        if desc.nesting().is_some() {
            return Err(
                ImageError::invariant("nested value has no global of its own").with_descriptor(id),
            );
        }
        let name = self.global_name(id, desc);

        if self.changes_type(desc) {
            if !self.registry.in_progress.insert(id) {
                let layout = self.layout_of(desc.context())?;
                let global = self.module.add_uninitialized_global(&name, Type::Struct(layout));
                trace!(descriptor = id.0, global = %name, "re-entrant request, placeholder");
                return Ok(self.register_or_merge(id, global));
            }
            let built = self.build_constant(id);
            self.registry.in_progress.remove(&id);
            let global = self.module.add_global_from_constant(&name, built?);
            trace!(descriptor = id.0, global = %name, "created from content");
            return Ok(self.register_or_merge(id, global));
        }

        let layout = self.layout_of(desc.context())?;
        let global = self.module.add_uninitialized_global(&name, Type::Struct(layout));
        trace!(descriptor = id.0, global = %name, "placeholder");
        Ok(self.register_or_merge(id, global))
    }

    /// Like `request_pointer`, but the content of `id` is complete on return.
    pub fn materialize_root(&mut self, id: DescriptorId) -> ImageResult<GlobalId> {
        let global = self.request_pointer(id)?;
        if self.module.is_uninitialized(global) {
            self.fill_placeholder(id, global)?;
        }
        Ok(global)
    }

    /// Record `global` for `id`, or merge it into the global already
    /// recorded. Returns the surviving global.
    pub(crate) fn register_or_merge(&mut self, id: DescriptorId, global: GlobalId) -> GlobalId {
        if let Some(existing) = self.registry.get(id) {
            let existing = self.module.resolve_global(existing);
            self.module.merge_global(global, existing);
            trace!(descriptor = id.0, "merged into existing global");
            return existing;
        }
        self.registry.entries.insert(id, global);
        if self.env.descriptor(id).is_some_and(|d| !d.is_mutable()) {
            self.module.flag_as_constant(global);
        }
        global
    }

    /// Compute and set the content of a placeholder.
    pub(crate) fn fill_placeholder(&mut self, id: DescriptorId, global: GlobalId) -> ImageResult<()> {
        let constant = self.build_constant(id)?;
        let desc = self.descriptor(id)?;
        if self.changes_type(desc) {
            let name = self.global_name(id, desc);
            let fresh = self.module.add_global_from_constant(&name, constant);
            self.module.merge_global(fresh, global);
        } else {
            self.module.set_initializer(global, constant);
        }
        trace!(descriptor = id.0, "filled");
        Ok(())
    }

    /// Arrays and strings only have a concrete type once built.
    fn changes_type(&self, desc: &DataDescriptor) -> bool {
        match desc {
            DataDescriptor::Array(_) => true,
            DataDescriptor::Object(obj) => obj.context == self.env.well_known().string,
        }
    }

    fn global_name(&self, id: DescriptorId, desc: &DataDescriptor) -> String {
        format!("{}_{}", self.env.type_def(desc.context()).name, id.0)
    }
}
