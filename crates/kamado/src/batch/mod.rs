//! # Micro-batching
//!
//! Collects items from concurrent callers into epochs and runs each epoch as
//! one call to a [`BatchHandler`].
//!
//! ## Epoch lifecycle
//!
//! ```text
//! OPEN ──(size reached | deadline, not stale)──▶ SEALED ──(job done)──▶ RESOLVED
//! ```
//!
//! * **OPEN** - accepts items; exactly one epoch is open at any time.
//! * **SEALED** - happens once, by whichever trigger wins. The successor epoch
//!   is opened in the same critical section, so later callers always have
//!   somewhere to go. A deadline that fires for an already sealed epoch does
//!   nothing.
//! * **RESOLVED** - the shared result slot is set once with the batch outcome
//!   or its error, and every contributor reads its own index from it.
//!
//! The check-then-append step and the seal happen under one short,
//! synchronous lock that is never held across an `.await`.

mod coordinator;
mod epoch;
mod handler;

pub use coordinator::BatchCoordinator;
pub use handler::BatchHandler;
