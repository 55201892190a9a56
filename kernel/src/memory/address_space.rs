//! User-mode address-space state.
//!
//! Present only on user threads. The dispatcher needs exactly two things
//! from an address space across a handoff: a place to park the user-visible
//! register file while the thread is switched out, and save/restore of the
//! mapping state. The MMU side of the mapping is the boot crate's concern.

use crate::scheduler::thread::ThreadContext;

/// Number of user-visible general-purpose registers in a snapshot.
pub const USER_REG_COUNT: usize = 15;

pub struct AddressSpace {
    /// Snapshot of the user register file, valid while the owning thread is
    /// switched out.
    user_regs: [u64; USER_REG_COUNT],
    /// Whether the mapping state is live on the CPU.
    resident: bool,
}

impl AddressSpace {
    pub fn new() -> Self {
        Self {
            user_regs: [0; USER_REG_COUNT],
            resident: true,
        }
    }

    /// Snapshot the user-visible register file from a saved context.
    pub fn save_user_state(&mut self, ctx: &ThreadContext) {
        self.user_regs = ctx.general_regs();
    }

    /// Write the snapshot back into a saved context.
    pub fn restore_user_state(&self, ctx: &mut ThreadContext) {
        ctx.set_general_regs(&self.user_regs);
    }

    /// Persist mapping state before the CPU leaves this space.
    pub fn save_state(&mut self) {
        log::trace!("address space saved");
        self.resident = false;
    }

    /// Reactivate mapping state after the CPU returns to this space.
    pub fn restore_state(&mut self) {
        log::trace!("address space restored");
        self.resident = true;
    }

    pub fn is_resident(&self) -> bool {
        self.resident
    }

    pub fn user_regs(&self) -> &[u64; USER_REG_COUNT] {
        &self.user_regs
    }
}

impl Default for AddressSpace {
    fn default() -> Self {
        Self::new()
    }
}
