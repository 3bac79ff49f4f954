//! Scalar encoding.

use tarn_ir::constant::Constant;

use crate::builder::ImageBuilder;
use crate::env::{Environment, TypeId};
use crate::error::{ImageError, ImageResult};

impl<E: Environment> ImageBuilder<'_, E> {
    /// Encode `raw` as a value of the declared type `ty`.
    ///
    /// Zero becomes a zeroed constant of the type's storage; anything else
    /// becomes an integer of the type's width wrapped in the type's
    /// one-field struct. Reference-held types only ever see zero here (null).
    pub fn encode_scalar(&mut self, ty: TypeId, raw: u64) -> ImageResult<Constant> {
        let env = self.env;
        let def = env.type_def(ty);
        if def.is_scalar() && !(1..=8).contains(&def.size) {
            return Err(ImageError::invariant(format!(
                "scalar {} is {} bytes wide, encodable widths are 1 to 8",
                def.name, def.size
            )));
        }
        if raw == 0 {
            let storage = self.storage_of(ty)?;
            return Ok(Constant::Zeroed(storage));
        }
        let bits = def.size * 8;
        let signed = def.is_signed();
        let layout = self.layout_of(ty)?;
        Ok(Constant::named(layout, vec![Constant::int(bits, raw, signed)]))
    }
}
