//! Constant pool for literals that do not fit an inline immediate.
//!
//! Entries are 16-byte aligned boxes, so their addresses stay fixed for the
//! lifetime of the pool and can be baked into generated code. The pool is
//! owned by the compiled filter that references it.

use std::collections::HashMap;

#[repr(C, align(16))]
struct Slot([u8; 16]);

/// Per-compilation pool of 16-byte constant slots.
#[derive(Default)]
pub struct ConstPool {
    slots: Vec<Box<Slot>>,
    index: HashMap<[u8; 16], usize>,
}

impl ConstPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `bytes` and returns the address of its slot.
    ///
    /// Identical constants share one slot.
    pub fn insert(&mut self, bytes: [u8; 16]) -> *const u8 {
        if let Some(&at) = self.index.get(&bytes) {
            return self.slots[at].0.as_ptr();
        }
        let slot = Box::new(Slot(bytes));
        let addr = slot.0.as_ptr();
        self.index.insert(bytes, self.slots.len());
        self.slots.push(slot);
        addr
    }

    pub fn insert_i128(&mut self, value: i128) -> *const u8 {
        self.insert(value.to_le_bytes())
    }

    pub fn insert_f32(&mut self, value: f32) -> *const u8 {
        let mut bytes = [0u8; 16];
        bytes[..4].copy_from_slice(&value.to_le_bytes());
        self.insert(bytes)
    }

    pub fn insert_f64(&mut self, value: f64) -> *const u8 {
        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(&value.to_le_bytes());
        self.insert(bytes)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl std::fmt::Debug for ConstPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstPool")
            .field("slots", &self.slots.len())
            .finish()
    }
}
