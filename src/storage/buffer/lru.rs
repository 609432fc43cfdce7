use super::replacer::{Replacer, SlotId};

/// LRU order kept as a doubly-linked list threaded through two arrays.
///
/// `head` is the most recently used slot, `tail` the eviction candidate.
/// Promotion and demotion are O(1).
#[derive(Debug)]
pub struct LruReplacer {
    prev: Vec<Option<SlotId>>,
    next: Vec<Option<SlotId>>,
    head: Option<SlotId>,
    tail: Option<SlotId>,
}

impl LruReplacer {
    /// Build the list with slot 0 hottest and slot `capacity - 1` coldest.
    pub fn new(capacity: usize) -> Self {
        let prev = (0..capacity).map(|i| i.checked_sub(1)).collect();
        let next = (0..capacity)
            .map(|i| if i + 1 < capacity { Some(i + 1) } else { None })
            .collect();

        Self {
            prev,
            next,
            head: if capacity > 0 { Some(0) } else { None },
            tail: capacity.checked_sub(1),
        }
    }

    /// Slots from most to least recently used.
    pub fn order(&self) -> Vec<SlotId> {
        let mut order = Vec::with_capacity(self.prev.len());
        let mut cursor = self.head;
        while let Some(slot_id) = cursor {
            order.push(slot_id);
            cursor = self.next[slot_id];
        }
        order
    }

    fn unlink(&mut self, slot_id: SlotId) {
        let (prev, next) = (self.prev[slot_id], self.next[slot_id]);
        match prev {
            Some(p) => self.next[p] = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.prev[n] = prev,
            None => self.tail = prev,
        }
        self.prev[slot_id] = None;
        self.next[slot_id] = None;
    }

    fn push_front(&mut self, slot_id: SlotId) {
        self.next[slot_id] = self.head;
        match self.head {
            Some(h) => self.prev[h] = Some(slot_id),
            None => self.tail = Some(slot_id),
        }
        self.head = Some(slot_id);
    }

    fn push_back(&mut self, slot_id: SlotId) {
        self.prev[slot_id] = self.tail;
        match self.tail {
            Some(t) => self.next[t] = Some(slot_id),
            None => self.head = Some(slot_id),
        }
        self.tail = Some(slot_id);
    }
}

impl Replacer for LruReplacer {
    fn touch(&mut self, slot_id: SlotId) {
        if self.head == Some(slot_id) {
            return;
        }
        self.unlink(slot_id);
        self.push_front(slot_id);
    }

    fn demote(&mut self, slot_id: SlotId) {
        if self.tail == Some(slot_id) {
            return;
        }
        self.unlink(slot_id);
        self.push_back(slot_id);
    }

    fn victim(&self) -> Option<SlotId> {
        self.tail
    }

    fn capacity(&self) -> usize {
        self.prev.len()
    }
}
