use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
/// Errors raised while parsing a descriptor document
pub enum Error {
    /// The document is not a well-formed element tree
    #[error("unexpected input at `{0}`")]
    Syntax(String),
    /// The root element is not `collection`
    #[error("root element is `{0}`, expected `collection`")]
    UnexpectedRoot(String),
    /// A child of the root is neither `colormodel` nor `raster`
    #[error("unknown element `{0}`")]
    UnknownElement(String),
    /// A `colormodels` attribute holds something other than block indices
    #[error("`{0}` is not a block index")]
    BadIndex(String),
}
