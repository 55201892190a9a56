//! Memory bookkeeping for the dispatch core.
//!
//! Only the pieces the dispatcher touches live here: address arithmetic for
//! thread stacks, the thin user-mode address-space collaborator, and the
//! kernel heap handle for the freestanding target.

pub mod address;
pub mod address_space;
#[cfg(target_os = "none")]
pub mod heap;

pub use address::VirtualAddress;
pub use address_space::AddressSpace;
