//! Fixpoint sweep over placeholders.

use tracing::debug;

use tarn_ir::module::GlobalId;

use crate::builder::ImageBuilder;
use crate::descriptor::DescriptorId;
use crate::env::Environment;
use crate::error::ImageResult;

impl<E: Environment> ImageBuilder<'_, E> {
    /// Fill placeholders until none is left. Returns how many were filled.
    ///
    /// Placeholders are visited in registration order. Filling one may
    /// register new ones; those land after the cursor and are picked up by
    /// the same scan, and a filled global never becomes a placeholder again,
    /// so entries behind the cursor need no second look.
    pub fn resolve_all(&mut self) -> ImageResult<usize> {
        let mut filled = 0;
        let mut cursor = 0;
        while let Some((index, id, global)) = self.next_placeholder(cursor) {
            self.fill_placeholder(id, global)?;
            filled += 1;
            cursor = index + 1;
        }
        debug!(
            filled,
            globals = self.module.global_count(),
            "placeholders resolved"
        );
        Ok(filled)
    }

    fn next_placeholder(&self, from: usize) -> Option<(usize, DescriptorId, GlobalId)> {
        let mut index = from;
        while let Some((id, global)) = self.registry.get_index(index) {
            let global = self.module.resolve_global(global);
            if self.module.is_uninitialized(global) {
                return Some((index, id, global));
            }
            index += 1;
        }
        None
    }

    /// Registered globals still waiting for content.
    pub fn pending_placeholders(&self) -> usize {
        self.registry
            .iter()
            .filter(|&(_, g)| self.module.is_uninitialized(self.module.resolve_global(g)))
            .count()
    }
}
