use thiserror::Error;

/// The reason an allocation request could not be satisfied.
///
/// [`Pool::allocate`](crate::Pool::allocate) collapses all of these into
/// `None`; [`Pool::try_allocate`](crate::Pool::try_allocate) reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    /// The pool's strategy is [`Strategy::NotSet`](crate::Strategy::NotSet).
    #[error("no placement strategy is configured")]
    StrategyNotSet,
    /// The request is larger than the largest hole. No strategy is consulted.
    #[error("{requested} bytes requested but the largest hole is {largest_free} bytes")]
    ExceedsLargestFree {
        requested: usize,
        largest_free: usize,
    },
    /// The strategy's search did not select a hole.
    #[error("no hole of at least {requested} bytes was selected")]
    NoFit { requested: usize },
}

/// The reason [`Pool::try_free`](crate::Pool::try_free) did not release
/// anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FreeError {
    #[error("no block starts at offset {offset}")]
    UnknownOffset { offset: usize },
    #[error("the block at offset {offset} is not allocated")]
    NotAllocated { offset: usize },
}

/// A broken structural invariant of a [`Pool`](crate::Pool), as detected by
/// [`Pool::check_invariants`](crate::Pool::check_invariants).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("the pool is not initialized")]
    Uninitialized,
    #[error("block at offset {offset} is empty")]
    EmptyBlock { offset: usize },
    #[error("discontinuity: expected a block at {expected}, found one at {found}")]
    Discontinuity { expected: usize, found: usize },
    #[error("blocks cover {covered} bytes of a {total}-byte pool")]
    Coverage { covered: usize, total: usize },
    #[error("adjacent holes at offsets {first} and {second}")]
    AdjacentHoles { first: usize, second: usize },
    #[error("the back link of the block at offset {offset} is wrong")]
    BrokenLink { offset: usize },
    #[error("{count} blocks are not reachable from the head")]
    Unreachable { count: usize },
    #[error("the next-fit cursor does not refer to a live block")]
    DanglingCursor,
}

/// Returned by `Strategy::from_str` for a name other than `best`, `worst`,
/// `first`, or `next`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown placement strategy")]
pub struct UnknownStrategy;
