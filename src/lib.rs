//! This crate simulates a user-space memory allocator managing a single
//! fixed-size byte pool with one of four textbook placement strategies.
//!
//!  - **Offsets, not pointers.** Allocations are identified by their offset
//!    into the pool. The pool storage itself is reserved up front and never
//!    touched by the allocator.
//!
//!  - **Four strategies.** First-fit, best-fit, worst-fit, and next-fit,
//!    selectable per pool and switchable at runtime.
//!
//!  - **Checkable.** Introspection queries (hole count, largest free block,
//!    allocated bytes, ...) and [`Pool::check_invariants`] make the allocator's
//!    invariants independently verifiable.
//!
//!  - **This crate supports `#![no_std]`.** The core only needs `alloc`. The
//!    randomized stress driver requires the `std` feature (enabled by
//!    default).
//!
//! # Examples
//!
//! ```rust
//! use fitpool::{Pool, Strategy};
//!
//! let mut pool = Pool::new(Strategy::First, 100);
//!
//! let a = pool.allocate(10).unwrap();
//! let b = pool.allocate(1).unwrap();
//! assert_eq!((a, b), (0, 10));
//!
//! pool.free(a);
//! assert_eq!(pool.holes(), 2);
//! assert_eq!(pool.largest_free(), 89);
//!
//! // First-fit reuses the hole at the start of the pool
//! assert_eq!(pool.allocate(1), Some(0));
//! ```
//!
//! # Details
//!
//! ## Fail-fast Allocation
//!
//! A request strictly larger than [`Pool::largest_free`] fails before the
//! strategy is even consulted. This is observable: no strategy can ever
//! satisfy such a request, even if [`Pool::free_bytes`] would suffice.
//!
#![no_std]
#![cfg_attr(feature = "doc_cfg", feature(doc_cfg))]

extern crate alloc;

#[cfg(any(test, feature = "std"))]
extern crate std;

mod error;
mod pool;
mod status;
mod strategy;
pub use self::{
    error::*,
    pool::{BlockInfo, Blocks, Pool},
    status::{MemoryMap, PoolStatus},
    strategy::Strategy,
};

#[cfg(feature = "std")]
#[cfg_attr(feature = "doc_cfg", doc(cfg(feature = "std")))]
pub mod stress;

#[cfg(test)]
mod tests;
