use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("buffer too small: need {needed}, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    /// Every correlation window had zero variance
    #[error("no window had non-zero variance")]
    NumericDegeneracy,
}

pub type Result<T> = core::result::Result<T, Error>;

/// Returns `InvalidArgument` when `data` is empty
pub(crate) fn require_nonempty<T>(data: &[T], what: &'static str) -> Result<()> {
    if data.is_empty() {
        Err(Error::InvalidArgument(what))
    } else {
        Ok(())
    }
}

pub(crate) fn require_len(needed: usize, available: usize) -> Result<()> {
    if available < needed {
        Err(Error::BufferTooSmall { needed, available })
    } else {
        Ok(())
    }
}
