use std::collections::HashSet;

use strum::{Display, EnumString, IntoStaticStr};
use tracing::trace;

use crate::Error;

#[derive(Debug, Eq, PartialEq, Copy, Clone, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
/// The two kinds of physical block
pub enum BlockKind {
    /// A color-model block
    ColorModel,
    /// A raster block
    Raster,
}

/// One physical block of a collection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Block {
    /// A color-model block
    ColorModel,
    /// A raster block and the block indices of the color models it is decoded with, in image order
    Raster(Vec<usize>),
}

impl Block {
    /// Kind of the block
    #[must_use]
    pub const fn kind(&self) -> BlockKind {
        match self {
            Self::ColorModel => BlockKind::ColorModel,
            Self::Raster(_) => BlockKind::Raster,
        }
    }
}

/// A logical image: one raster decoded with one of its color models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageRef {
    /// Block index of the raster
    pub raster: usize,
    /// Block index of the color model
    pub color_model: usize,
    /// Position of the color model within the raster's references
    pub ref_index: usize,
}

/// Block structure of a collection and the logical images it defines.
///
/// Blocks are append-only. Rasters reference color models by block index;
/// every raster/color-model pair is one logical image, numbered in raster
/// order then reference order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionDescriptor {
    blocks: Vec<Block>,
    color_models: Vec<usize>,
    rasters: Vec<usize>,
}

impl CollectionDescriptor {
    /// An empty descriptor
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a color-model block, returning its block index
    pub fn append_color_model(&mut self) -> usize {
        let index = self.blocks.len();
        self.blocks.push(Block::ColorModel);
        self.color_models.push(index);
        trace!("appended color model block {index}");
        index
    }

    fn check_ref(&self, color_model: usize) -> Result<(), Error> {
        if self.is_color_model_block(color_model) {
            Ok(())
        } else {
            Err(Error::invalid_argument(format!(
                "block {color_model} is not a color model of this collection"
            )))
        }
    }

    /// Appends a raster block decoded with each of `color_models`, returning its block index
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if the list is empty, holds a duplicate, or
    /// names a block that is not an already appended color model
    pub fn append_raster(&mut self, color_models: &[usize]) -> Result<usize, Error> {
        if color_models.is_empty() {
            return Err(Error::invalid_argument(
                "a raster needs at least one color model",
            ));
        }
        let mut seen = HashSet::with_capacity(color_models.len());
        for &cm in color_models {
            self.check_ref(cm)?;
            if !seen.insert(cm) {
                return Err(Error::invalid_argument(format!(
                    "color model {cm} referenced twice by the same raster"
                )));
            }
        }
        let index = self.blocks.len();
        self.blocks.push(Block::Raster(color_models.to_vec()));
        self.rasters.push(index);
        trace!("appended raster block {index} -> {color_models:?}");
        Ok(index)
    }

    /// Appends a color model and a raster that uses it, returning `(color_model, raster)` block indices
    pub fn append_image(&mut self) -> (usize, usize) {
        let cm = self.append_color_model();
        let raster = self.blocks.len();
        self.blocks.push(Block::Raster(vec![cm]));
        self.rasters.push(raster);
        (cm, raster)
    }

    /// Adds one more color model to an existing raster, creating a new logical image
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if `raster` is not a raster block, `color_model` is
    /// not a color-model block preceding it, or the raster already references it
    pub fn add_color_model_to_raster(
        &mut self,
        raster: usize,
        color_model: usize,
    ) -> Result<(), Error> {
        self.check_ref(color_model)?;
        if color_model > raster {
            return Err(Error::invalid_argument(format!(
                "color model {color_model} follows raster {raster}"
            )));
        }
        match self.blocks.get_mut(raster) {
            Some(Block::Raster(refs)) => {
                if refs.contains(&color_model) {
                    return Err(Error::invalid_argument(format!(
                        "raster {raster} already references color model {color_model}"
                    )));
                }
                refs.push(color_model);
                Ok(())
            }
            _ => Err(Error::invalid_argument(format!(
                "block {raster} is not a raster"
            ))),
        }
    }

    /// Number of blocks
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Block at `index`
    #[must_use]
    pub fn block(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    /// All blocks in physical order
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Whether block `index` is a color model
    #[must_use]
    pub fn is_color_model_block(&self, index: usize) -> bool {
        matches!(self.blocks.get(index), Some(Block::ColorModel))
    }

    /// Whether block `index` is a raster
    #[must_use]
    pub fn is_raster_block(&self, index: usize) -> bool {
        matches!(self.blocks.get(index), Some(Block::Raster(_)))
    }

    /// Block indices of all color models, in order
    #[must_use]
    pub fn color_model_blocks(&self) -> &[usize] {
        &self.color_models
    }

    /// Block indices of all rasters, in order
    #[must_use]
    pub fn raster_blocks(&self) -> &[usize] {
        &self.rasters
    }

    /// Color models referenced by raster block `raster`
    #[must_use]
    pub fn color_model_refs(&self, raster: usize) -> Option<&[usize]> {
        match self.blocks.get(raster) {
            Some(Block::Raster(refs)) => Some(refs),
            _ => None,
        }
    }

    /// Number of logical images
    #[must_use]
    pub fn image_count(&self) -> usize {
        self.raster_refs().map(|(_, refs)| refs.len()).sum()
    }

    fn raster_refs(&self) -> impl Iterator<Item = (usize, &[usize])> + '_ {
        self.rasters
            .iter()
            .filter_map(|&r| self.color_model_refs(r).map(|refs| (r, refs)))
    }

    /// Resolves a logical image to `(raster block index, position within its color-model refs)`
    ///
    /// # Errors
    ///
    /// [`Error::IndexOutOfRange`] if `image >= self.image_count()`
    pub fn image_to_raster_and_color_model(&self, image: usize) -> Result<(usize, usize), Error> {
        let mut first = 0;
        for (raster, refs) in self.raster_refs() {
            if image < first + refs.len() {
                return Ok((raster, image - first));
            }
            first += refs.len();
        }
        Err(Error::IndexOutOfRange {
            index: image,
            len: first,
        })
    }

    /// Resolves a logical image to its raster and color-model blocks
    ///
    /// # Errors
    ///
    /// [`Error::IndexOutOfRange`] if `image >= self.image_count()`
    pub fn image(&self, image: usize) -> Result<ImageRef, Error> {
        let (raster, ref_index) = self.image_to_raster_and_color_model(image)?;
        let color_model = self
            .color_model_refs(raster)
            .and_then(|refs| refs.get(ref_index))
            .copied()
            .ok_or_else(|| Error::malformed(format!("raster {raster} lost its references")))?;
        Ok(ImageRef {
            raster,
            color_model,
            ref_index,
        })
    }

    /// All logical images in order
    pub fn images(&self) -> impl Iterator<Item = ImageRef> + '_ {
        self.raster_refs().flat_map(|(raster, refs)| {
            refs.iter()
                .enumerate()
                .map(move |(ref_index, &color_model)| ImageRef {
                    raster,
                    color_model,
                    ref_index,
                })
        })
    }

    /// Index of the first logical image backed by raster block `raster`
    #[must_use]
    pub fn first_image_of_raster(&self, raster: usize) -> Option<usize> {
        let mut first = 0;
        for (r, refs) in self.raster_refs() {
            if r == raster {
                return Some(first);
            }
            first += refs.len();
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_image_pairs_blocks() {
        let mut d = CollectionDescriptor::new();
        assert_eq!(d.append_image(), (0, 1));
        assert_eq!(d.append_image(), (2, 3));
        assert_eq!(d.block_count(), 4);
        assert!(d.is_color_model_block(2));
        assert!(d.is_raster_block(3));
        assert!(!d.is_raster_block(4));
        assert_eq!(d.image_count(), 2);
        assert_eq!(d.color_model_blocks(), &[0, 2]);
        assert_eq!(d.raster_blocks(), &[1, 3]);
    }

    #[test]
    fn shared_raster_yields_one_image_per_reference() {
        let mut d = CollectionDescriptor::new();
        let a = d.append_color_model();
        let b = d.append_color_model();
        let r = d.append_raster(&[a, b]).unwrap();
        let (c, r2) = d.append_image();
        d.append_raster(&[b]).unwrap();

        assert_eq!(d.image_count(), 4);
        assert_eq!(d.image_to_raster_and_color_model(0).unwrap(), (r, 0));
        assert_eq!(d.image_to_raster_and_color_model(1).unwrap(), (r, 1));
        assert_eq!(d.image_to_raster_and_color_model(2).unwrap(), (r2, 0));
        assert_eq!(d.image(3).unwrap().color_model, b);
        assert_eq!(d.image(2).unwrap().color_model, c);
        assert!(matches!(
            d.image_to_raster_and_color_model(4),
            Err(Error::IndexOutOfRange { index: 4, len: 4 })
        ));

        let images: Vec<_> = d.images().collect();
        assert_eq!(images.len(), 4);
        for (i, img) in images.iter().enumerate() {
            assert_eq!(&d.image(i).unwrap(), img);
        }
        assert_eq!(d.first_image_of_raster(r2), Some(2));
        assert_eq!(d.first_image_of_raster(a), None);
    }

    #[test]
    fn bad_references_are_rejected() {
        let mut d = CollectionDescriptor::new();
        let cm = d.append_color_model();
        let r = d.append_raster(&[cm]).unwrap();
        assert!(matches!(d.append_raster(&[]), Err(Error::InvalidArgument(_))));
        assert!(matches!(d.append_raster(&[r]), Err(Error::InvalidArgument(_))));
        assert!(matches!(d.append_raster(&[7]), Err(Error::InvalidArgument(_))));
        assert!(matches!(
            d.append_raster(&[cm, cm]),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(d.block_count(), 2);

        assert!(d.add_color_model_to_raster(r, cm).is_err());
        assert!(d.add_color_model_to_raster(cm, cm).is_err());
        let late = d.append_color_model();
        assert!(d.add_color_model_to_raster(r, late).is_err());
        let r2 = d.append_raster(&[late]).unwrap();
        d.add_color_model_to_raster(r2, cm).unwrap();
        assert_eq!(d.color_model_refs(r2), Some(&[late, cm][..]));
        assert_eq!(d.image_count(), 3);
    }

    #[test]
    fn block_kind_names() {
        assert_eq!(BlockKind::ColorModel.to_string(), "colormodel");
        assert_eq!("raster".parse::<BlockKind>().unwrap(), BlockKind::Raster);
        assert_eq!(Block::Raster(vec![0]).kind(), BlockKind::Raster);
    }
}
