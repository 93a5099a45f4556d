// Rylox hash table
// Changelog:
// 2026-07-10: Open-addressing table with linear probing and tombstones, keyed by
//            interned string objects so key comparison is a single pointer compare;
//            find_string is the one lookup that still compares by content, because
//            it runs while interning is deciding whether a canonical object exists.

use crate::common::object::{GcObject, ObjString, Value};

const TABLE_MAX_LOAD_NUM: usize = 3;
const TABLE_MAX_LOAD_DEN: usize = 4;

/// Slot states: empty (key null, value Nil), tombstone (key null, value
/// Bool(true)), or live.
#[derive(Clone, Copy)]
pub struct Entry {
    pub key: *mut GcObject<ObjString>,
    pub value: Value,
}

impl Entry {
    fn empty() -> Self {
        Self {
            key: std::ptr::null_mut(),
            value: Value::Nil,
        }
    }
}

/// `count` includes tombstones; only growth recomputes it down to live
/// entries.
pub struct Table {
    pub count: usize,
    pub entries: Vec<Entry>,
}

fn grow_capacity(capacity: usize) -> usize {
    if capacity < 8 { 8 } else { capacity * 2 }
}

impl Table {
    pub fn new() -> Self {
        Self {
            count: 0,
            entries: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    // 线性探测：命中空槽(非墓碑)则结束；途中记住第一个墓碑供插入复用
    fn find_entry(entries: &[Entry], key: *mut GcObject<ObjString>) -> usize {
        let capacity = entries.len();
        let mut index = unsafe { (*key).data.hash } as usize % capacity;
        let mut tombstone: Option<usize> = None;

        loop {
            let entry = &entries[index];
            if entry.key.is_null() {
                if matches!(entry.value, Value::Nil) {
                    return tombstone.unwrap_or(index);
                }
                if tombstone.is_none() {
                    tombstone = Some(index);
                }
            } else if entry.key == key {
                return index;
            }

            index = (index + 1) % capacity;
        }
    }

    fn adjust_capacity(&mut self, capacity: usize) {
        let mut entries = vec![Entry::empty(); capacity];

        // tombstones are dropped here, so count is rebuilt from live entries
        self.count = 0;
        for entry in &self.entries {
            if entry.key.is_null() {
                continue;
            }
            let dest = Self::find_entry(&entries, entry.key);
            entries[dest] = *entry;
            self.count += 1;
        }

        self.entries = entries;
    }

    pub fn get(&self, key: *mut GcObject<ObjString>) -> Option<Value> {
        if self.count == 0 {
            return None;
        }

        let index = Self::find_entry(&self.entries, key);
        let entry = &self.entries[index];
        if entry.key.is_null() {
            None
        } else {
            Some(entry.value)
        }
    }

    /// Returns true when `key` was not previously present.
    pub fn set(&mut self, key: *mut GcObject<ObjString>, value: Value) -> bool {
        if TABLE_MAX_LOAD_DEN * (self.count + 1) > TABLE_MAX_LOAD_NUM * self.capacity() {
            self.adjust_capacity(grow_capacity(self.capacity()));
        }

        let index = Self::find_entry(&self.entries, key);
        let entry = &mut self.entries[index];
        let is_new_key = entry.key.is_null();
        // reusing a tombstone does not grow the count
        if is_new_key && matches!(entry.value, Value::Nil) {
            self.count += 1;
        }

        entry.key = key;
        entry.value = value;
        is_new_key
    }

    /// Replaces the slot with a tombstone so probe chains stay intact.
    pub fn delete(&mut self, key: *mut GcObject<ObjString>) -> bool {
        if self.count == 0 {
            return false;
        }

        let index = Self::find_entry(&self.entries, key);
        let entry = &mut self.entries[index];
        if entry.key.is_null() {
            return false;
        }

        entry.key = std::ptr::null_mut();
        entry.value = Value::Bool(true);
        true
    }

    /// Interning lookup: probes like `find_entry` but compares length, hash
    /// and bytes, since the canonical object for these chars may not exist
    /// yet.
    pub fn find_string(&self, chars: &str, hash: u32) -> Option<*mut GcObject<ObjString>> {
        if self.count == 0 {
            return None;
        }

        let capacity = self.capacity();
        let mut index = hash as usize % capacity;
        loop {
            let entry = &self.entries[index];
            if entry.key.is_null() {
                if matches!(entry.value, Value::Nil) {
                    return None;
                }
            } else {
                let existing = unsafe { &(*entry.key).data };
                if existing.chars.len() == chars.len()
                    && existing.hash == hash
                    && existing.chars == chars
                {
                    return Some(entry.key);
                }
            }

            index = (index + 1) % capacity;
        }
    }

    /// Weak-table sweep support: drop every entry whose key object did not
    /// survive the mark phase.
    pub fn remove_unmarked(&mut self) {
        for i in 0..self.entries.len() {
            let key = self.entries[i].key;
            if !key.is_null() && !unsafe { (*key).mark } {
                self.entries[i].key = std::ptr::null_mut();
                self.entries[i].value = Value::Bool(true);
            }
        }
    }
}

impl Default for Table {
    fn default() -> Self {
        Self::new()
    }
}
