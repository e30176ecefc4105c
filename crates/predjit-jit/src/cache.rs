//! Compiled filter cache: a concurrent map of compiled filters keyed by a
//! structural hash of the instruction stream. Backed by `DashMap` for
//! lock-free reads.

use std::collections::VecDeque;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use predjit_common::{JitConfig, JitResult};
use predjit_types::{Instruction, Opcode, Payload};

use crate::filter::{compile_filter, CompiledFilter};

/// Concurrent cache for compiled filters.
///
/// Insertion order is tracked in a separate `Mutex<VecDeque>` for eviction
/// when the cache is full. Each entry keeps the stream it was compiled from,
/// so a hash collision misses instead of returning the wrong filter.
pub struct FilterCache {
    filters: DashMap<u64, CacheEntry>,
    order: Mutex<VecDeque<u64>>,
    capacity: usize,
}

struct CacheEntry {
    key: StreamKey,
    filter: Arc<CompiledFilter>,
}

/// The instructions that reach code generation, plus the null-check flag.
#[derive(Debug)]
struct StreamKey {
    null_check: bool,
    stream: Vec<Instruction>,
}

impl StreamKey {
    fn new(stream: &[Instruction], null_check: bool) -> Self {
        Self {
            null_check,
            stream: emitted(stream).to_vec(),
        }
    }

    fn matches(&self, stream: &[Instruction], null_check: bool) -> bool {
        let stream = emitted(stream);
        self.null_check == null_check
            && self.stream.len() == stream.len()
            && self.stream.iter().zip(stream).all(|(a, b)| same_instruction(a, b))
    }
}

/// Prefix of `stream` up to and including the first `Ret`.
fn emitted(stream: &[Instruction]) -> &[Instruction] {
    match stream.iter().position(|i| i.opcode == Opcode::Ret) {
        Some(p) => &stream[..=p],
        None => stream,
    }
}

impl FilterCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            filters: DashMap::with_capacity(capacity),
            order: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
        }
    }

    pub fn from_config(config: &JitConfig) -> Self {
        Self::new(config.cache_capacity)
    }

    /// Cached filter for `stream`, if one was compiled with the same flag.
    pub fn get(&self, stream: &[Instruction], null_check: bool) -> Option<Arc<CompiledFilter>> {
        self.lookup(stream_hash(stream, null_check), stream, null_check)
    }

    fn lookup(&self, hash: u64, stream: &[Instruction], null_check: bool) -> Option<Arc<CompiledFilter>> {
        let entry = self.filters.get(&hash)?;
        if entry.key.matches(stream, null_check) {
            Some(Arc::clone(&entry.filter))
        } else {
            tracing::debug!("filter cache collision for hash {hash}");
            None
        }
    }

    pub fn insert(&self, stream: &[Instruction], null_check: bool, compiled: Arc<CompiledFilter>) {
        let hash = stream_hash(stream, null_check);
        self.insert_entry(
            hash,
            CacheEntry {
                key: StreamKey::new(stream, null_check),
                filter: compiled,
            },
        );
    }

    fn insert_entry(&self, hash: u64, entry: CacheEntry) {
        if self.filters.contains_key(&hash) {
            self.filters.insert(hash, entry);
            return;
        }
        self.evict_if_full();
        self.filters.insert(hash, entry);
        if let Ok(mut order) = self.order.lock() {
            order.push_back(hash);
        }
    }

    /// Returns the cached filter for `stream`, compiling it on a miss.
    ///
    /// On a collision the newly compiled filter replaces the older entry.
    pub fn get_or_compile(
        &self,
        stream: &[Instruction],
        config: &JitConfig,
    ) -> JitResult<Arc<CompiledFilter>> {
        let hash = stream_hash(stream, config.null_check);
        if let Some(hit) = self.lookup(hash, stream, config.null_check) {
            tracing::trace!("filter cache hit for hash {hash}");
            return Ok(hit);
        }
        let compiled = match compile_filter(stream, config) {
            Ok(c) => Arc::new(c),
            Err(e) => {
                tracing::warn!("filter compilation failed for hash {hash}: {e}");
                return Err(e);
            }
        };
        self.insert_entry(
            hash,
            CacheEntry {
                key: StreamKey::new(stream, config.null_check),
                filter: Arc::clone(&compiled),
            },
        );
        Ok(compiled)
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    fn evict_if_full(&self) {
        if self.filters.len() < self.capacity {
            return;
        }
        if let Ok(mut order) = self.order.lock() {
            // Evict oldest entries until under capacity.
            while self.filters.len() >= self.capacity {
                match order.pop_front() {
                    Some(hash) => {
                        self.filters.remove(&hash);
                    }
                    None => break,
                }
            }
        }
    }
}

/// Structural hash of an instruction stream.
///
/// Instructions after the first `Ret` never reach code generation and do not
/// contribute. The null-check flag changes the emitted code, so it does.
pub fn stream_hash(stream: &[Instruction], null_check: bool) -> u64 {
    let mut hasher = DefaultHasher::new();
    null_check.hash(&mut hasher);
    for instr in emitted(stream) {
        hash_instruction(instr, &mut hasher);
    }
    hasher.finish()
}

fn hash_instruction(instr: &Instruction, h: &mut DefaultHasher) {
    instr.opcode.hash(h);
    instr.options.hash(h);
    std::mem::discriminant(&instr.payload).hash(h);
    match instr.payload {
        Payload::Int(v) => v.hash(h),
        Payload::Float(f) => f.to_bits().hash(h),
    }
}

/// Bitwise equality, consistent with `hash_instruction` (a NaN literal
/// matches itself).
fn same_instruction(a: &Instruction, b: &Instruction) -> bool {
    a.opcode == b.opcode
        && a.options == b.options
        && match (a.payload, b.payload) {
            (Payload::Int(x), Payload::Int(y)) => x == y,
            (Payload::Float(x), Payload::Float(y)) => x.to_bits() == y.to_bits(),
            _ => false,
        }
}
