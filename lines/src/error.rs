use crate::LineBasedHeight;
use thiserror::Error;

/// Errors produced while building or updating a [`LinesCache`](crate::LinesCache).
///
/// Invariant violations ([`NegativeInterlineHeight`](Self::NegativeInterlineHeight),
/// [`LengthMismatch`](Self::LengthMismatch), [`OperationLength`](Self::OperationLength))
/// mean the caller handed in annotations or edits that disagree with the document. They
/// are detected before anything is written into a snapshot, so the previous snapshot
/// stays valid, but the update itself cannot be retried as-is.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LayoutError {
    /// An interline annotation resolved to a negative height.
    #[error("negative interline height {height:?} at offset {offset}")]
    NegativeInterlineHeight {
        offset: usize,
        height: LineBasedHeight,
    },

    /// Total line length after an edit disagrees with the edited document.
    #[error("layout covers {actual} chars but the document has {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Operation does not span the document it is applied to.
    #[error("operation spans {actual} chars but the document has {expected}")]
    OperationLength { expected: usize, actual: usize },

    /// Cold layout was cancelled through its [`Cancellation`](crate::Cancellation).
    #[error("layout cancelled")]
    Cancelled,

    /// Layout configuration could not be parsed.
    #[error("invalid layout config: {0}")]
    Config(String),
}
