//! Error type for conditions that are implementation bugs rather than
//! recoverable formatting outcomes.
//!
//! Every other condition in the taxonomy (search-budget exceeded, alignment
//! declined, empty `Wrap`/`Choice`) is handled locally and never reaches
//! here; see `wrap_search`, `layout`, and `align` for how each is absorbed.

/// The one class of failure this crate surfaces: a layout-solver invariant
/// was violated, which indicates a bug in the core rather than malformed
/// input.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A `Choice` or `Wrap` layout node survived to materialization instead
    /// of being resolved by the solver.
    #[error("unresolved {0} layout node reached materialization")]
    UnresolvedLayoutNode(&'static str),

    /// The block tree passed to the solver or materializer was malformed,
    /// e.g. a `Horizontal` node without exactly two children.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

pub type Result<T> = std::result::Result<T, Error>;
