//! Buffer pool bookkeeping for ZyronDB.
//!
//! This crate provides the page-side collaborators of the adaptive hash index:
//! - Buffer blocks with page identity and a hash pointer counter
//! - A directory of resident pages for liveness checks

mod block;
mod directory;

pub use block::{BufferBlock, FrameId};
pub use directory::{BlockDirectory, PageResidency};
