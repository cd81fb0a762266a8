//! Mutation Flags

use bitflags::bitflags;

bitflags! {
    /// Pending work recorded on a node during a build pass.
    ///
    /// Everything except [`Flags::INTERRUPTED`] and [`Flags::DID_CAPTURE`] is a
    /// commit flag: a node carrying one is collected into its parent's dirty
    /// list and visited by the submit passes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Flags: u16 {
        /// Insert (or move) the node's host nodes.
        const ADDITION = 1 << 0;
        /// Apply prop changes, run layout effect cleanup, or toggle visibility.
        const UPDATE = 1 << 1;
        /// Unmount the subtree and remove its host nodes.
        const DELETION = 1 << 2;
        /// Drop direct text content before children are inserted.
        const RESET_TEXT = 1 << 3;
        /// Run queued callbacks after commit.
        const CALLBACK = 1 << 4;
        /// An error boundary already captured an error this pass.
        const DID_CAPTURE = 1 << 5;
        /// Detach the old ref and attach the new one.
        const REF = 1 << 6;
        /// Read a snapshot before host mutation.
        const SNAPSHOT = 1 << 7;
        /// Rendering threw; render again even if nothing else changed.
        const INTERRUPTED = 1 << 8;
        /// Remove every host child at once.
        const CLEAR = 1 << 9;
    }
}

impl Flags {
    /// Flags that put a node on the dirty list.
    pub const COMMIT: Flags = Flags::ADDITION
        .union(Flags::UPDATE)
        .union(Flags::DELETION)
        .union(Flags::RESET_TEXT)
        .union(Flags::CALLBACK)
        .union(Flags::REF)
        .union(Flags::SNAPSHOT)
        .union(Flags::CLEAR);

    pub fn needs_commit(self) -> bool {
        self.intersects(Flags::COMMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bookkeeping_flags_do_not_need_commit() {
        assert!(!(Flags::INTERRUPTED | Flags::DID_CAPTURE).needs_commit());
        assert!(Flags::REF.needs_commit());
        assert!((Flags::DID_CAPTURE | Flags::CALLBACK).needs_commit());
    }
}
