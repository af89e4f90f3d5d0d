//! Text form of [`CollectionDescriptor`]: a small XML document listing the blocks.
//!
//! ```text
//! <?xml version="1.0"?>
//! <collection>
//!   <colormodel/>
//!   <raster colormodels="0"/>
//! </collection>
//! ```

pub(crate) mod error;
mod utils;

use std::{
    ffi::OsString,
    fmt::{self, Display},
    fs::File,
    io::{BufWriter, Read, Write},
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{Context, Result};
use itertools::Itertools;
use tracing::{debug, trace};

use crate::collection::{Block, BlockKind, CollectionDescriptor};

const ROOT: &str = "collection";
const REFS_ATTRIBUTE: &str = "colormodels";
/// Suffix appended to a BPI file name to locate its descriptor
pub const DESCRIPTOR_SUFFIX: &str = ".definition";

fn snippet(input: &str) -> String {
    input.chars().take(24).collect()
}

impl Display for CollectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "<?xml version=\"1.0\"?>")?;
        writeln!(f, "<{ROOT}>")?;
        for block in self.blocks() {
            let kind: &'static str = block.kind().into();
            match block {
                Block::ColorModel => writeln!(f, "  <{kind}/>")?,
                Block::Raster(refs) => writeln!(
                    f,
                    "  <{kind} {REFS_ATTRIBUTE}=\"{}\"/>",
                    refs.iter().join(" ")
                )?,
            }
        }
        write!(f, "</{ROOT}>")
    }
}

fn parse_refs(value: &str) -> Result<Vec<usize>, crate::Error> {
    value
        .split_whitespace()
        .map(|index| {
            index
                .parse::<usize>()
                .map_err(|_| error::Error::BadIndex(index.to_owned()).into())
        })
        .collect()
}

impl FromStr for CollectionDescriptor {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (_, root) = utils::document(s).map_err(|e| {
            let at = match &e {
                nom::Err::Error(inner) | nom::Err::Failure(inner) => snippet(inner.input),
                nom::Err::Incomplete(_) => String::new(),
            };
            error::Error::Syntax(at)
        })?;
        if root.name != ROOT {
            return Err(error::Error::UnexpectedRoot(root.name.to_owned()).into());
        }

        let mut descriptor = Self::new();
        for (index, child) in root.children.iter().enumerate() {
            let kind = child
                .name
                .parse::<BlockKind>()
                .map_err(|_| error::Error::UnknownElement(child.name.to_owned()))?;
            match kind {
                BlockKind::ColorModel => {
                    descriptor.append_color_model();
                }
                BlockKind::Raster => {
                    let refs = parse_refs(child.attribute(REFS_ATTRIBUTE).unwrap_or_default())?;
                    trace!("raster block {index} -> {refs:?}");
                    if let Some(late) = refs.iter().find(|&&cm| cm >= index) {
                        return Err(crate::Error::malformed(format!(
                            "raster {index} references block {late}, which does not precede it"
                        )));
                    }
                    descriptor.append_raster(&refs).map_err(|e| match e {
                        crate::Error::InvalidArgument(msg) => crate::Error::MalformedDescriptor(msg),
                        other => other,
                    })?;
                }
            }
        }
        debug!(
            "parsed descriptor: {} blocks, {} images",
            descriptor.block_count(),
            descriptor.image_count()
        );
        Ok(descriptor)
    }
}

/// Location of the descriptor belonging to the BPI file `bpi` (`foo.bpi` -> `foo.bpi.definition`)
pub fn descriptor_path(bpi: impl AsRef<Path>) -> PathBuf {
    let mut path = OsString::from(bpi.as_ref().as_os_str());
    path.push(DESCRIPTOR_SUFFIX);
    PathBuf::from(path)
}

impl CollectionDescriptor {
    /// Reads a descriptor document
    ///
    /// # Errors
    ///
    /// This function errors if the file cannot be read or does not hold a valid descriptor
    pub fn from_file<P: AsRef<Path>>(filename: P) -> Result<Self> {
        let filename = filename.as_ref();
        let mut text = String::new();
        File::open(filename)
            .and_then(|mut f| f.read_to_string(&mut text))
            .with_context(|| format!("read descriptor {}", filename.display()))?;
        let descriptor = text
            .parse::<Self>()
            .with_context(|| format!("parse descriptor {}", filename.display()))?;
        Ok(descriptor)
    }

    /// Writes the descriptor document to `filename`, replacing any existing file
    ///
    /// # Errors
    ///
    /// This will error if unable to open and/or write to the provided filename
    pub fn into_file(&self, filename: impl AsRef<Path>) -> Result<()> {
        let f = File::options()
            .create(true)
            .write(true)
            .truncate(true)
            .open(filename.as_ref())?;
        let mut f = BufWriter::new(f);
        writeln!(f, "{self}").context("Write descriptor to file")?;
        f.flush()?;
        Ok(())
    }
}
