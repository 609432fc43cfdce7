use std::fmt::Debug;

pub type SlotId = usize;

/// Replacement policy over a fixed set of slots `0..capacity`.
///
/// Every slot is always tracked, occupied or not.
pub trait Replacer: Send + Debug {
    /// Mark a slot as most recently used.
    fn touch(&mut self, slot_id: SlotId);

    /// Mark a slot as the next one to hand out.
    fn demote(&mut self, slot_id: SlotId);

    /// The slot that should be reused next. None only when capacity is zero.
    fn victim(&self) -> Option<SlotId>;

    /// Number of slots tracked.
    fn capacity(&self) -> usize;
}
