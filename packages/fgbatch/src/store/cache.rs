//! Bounded cache with strict insertion-order eviction.
//!
//! Entries live in a slot arena threaded by a linked list (oldest at
//! `head`, newest at `tail`); a `HashMap` maps keys to slots. Insert, lookup
//! and eviction are O(1). Lookups never reorder the list: eviction order is
//! insertion order, not recency.
//!
//! Single-writer access assumed -- callers sharing a cache across threads
//! wrap it in a `Mutex`.

use std::collections::HashMap;

struct Slot<V> {
    key: usize,
    value: V,
    next: Option<usize>,
}

pub struct InsertionOrderCache<V> {
    slots: Vec<Option<Slot<V>>>,
    free: Vec<usize>,
    index: HashMap<usize, usize>,
    head: Option<usize>,
    tail: Option<usize>,
    capacity: usize,
}

impl<V> InsertionOrderCache<V> {
    /// Create a cache holding at most `capacity` entries. A capacity of zero
    /// evicts every entry immediately after insertion.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            head: None,
            tail: None,
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Look up an entry without touching its position.
    pub fn get(&self, key: usize) -> Option<&V> {
        let slot = *self.index.get(&key)?;
        self.slots[slot].as_ref().map(|s| &s.value)
    }

    /// Insert a new entry at the newest end. If the cache now exceeds its
    /// capacity, the oldest-inserted entry is evicted and returned.
    ///
    /// Inserting an existing key replaces its value but keeps its original
    /// insertion position.
    pub fn insert(&mut self, key: usize, value: V) -> Option<(usize, V)> {
        if let Some(&slot) = self.index.get(&key) {
            if let Some(existing) = self.slots[slot].as_mut() {
                existing.value = value;
            }
            return None;
        }

        let entry = Slot {
            key,
            value,
            next: None,
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(entry);
                slot
            }
            None => {
                self.slots.push(Some(entry));
                self.slots.len() - 1
            }
        };

        match self.tail {
            Some(tail) => {
                if let Some(t) = self.slots[tail].as_mut() {
                    t.next = Some(slot);
                }
            }
            None => self.head = Some(slot),
        }
        self.tail = Some(slot);
        self.index.insert(key, slot);

        if self.index.len() > self.capacity {
            self.pop_oldest()
        } else {
            None
        }
    }

    /// Remove and return the oldest-inserted entry.
    pub fn pop_oldest(&mut self) -> Option<(usize, V)> {
        let slot = self.head?;
        let entry = self.slots[slot].take()?;

        self.head = entry.next;
        if entry.next.is_none() {
            self.tail = None;
        }

        self.index.remove(&entry.key);
        self.free.push(slot);
        Some((entry.key, entry.value))
    }
}
