//! In-process reference runtime for execution tests.
//!
//! Implements the five runtime entry points over plain Rust data so JIT'd
//! lowering output can be checked end to end. The map keeps insertion order
//! in a vector of slots; deletion leaves a hole so cursors (slot indices)
//! stay valid while iterating. The channel is an unbuffered rendezvous.
//!
//! The `ref_*` functions use an all-`u64` C ABI; IR trampolines adapt the
//! real runtime signatures to them (see `common::install_reference_runtime`).

#![allow(dead_code)]

use std::sync::{Condvar, Mutex};

/// Mirror of the descriptor record emitted by the lowering.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawDescriptor {
    pub kind: u64,
    pub key_size: u64,
    pub key_align: u64,
    pub key_strategy: u64,
    pub elem_size: u64,
    pub elem_align: u64,
}

struct Entry {
    key: Box<[u8]>,
    // u64 words keep element storage 8-byte aligned
    value: Box<[u64]>,
}

#[derive(Default)]
pub struct RefMap {
    slots: Vec<Option<Entry>>,
    len: usize,
    /// Every distinct descriptor address the lowering passed in
    pub descriptor_addrs: Vec<u64>,
    pub last_descriptor: Option<RawDescriptor>,
}

impl RefMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn as_handle(&mut self) -> *mut RefMap {
        self as *mut RefMap
    }

    fn note_descriptor(&mut self, desc: u64) -> RawDescriptor {
        // SAFETY: the lowering passes the address of a live descriptor global
        let raw = unsafe { *(desc as *const RawDescriptor) };
        if !self.descriptor_addrs.contains(&desc) {
            self.descriptor_addrs.push(desc);
        }
        self.last_descriptor = Some(raw);
        raw
    }

    fn find(&self, key: &[u8]) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|e| &*e.key == key))
    }

    /// Insert-or-get for host-side setup, with an `i64` key and element.
    pub fn insert_i64(&mut self, key: i64, value: i64) {
        let key_bytes = key.to_ne_bytes();
        let idx = match self.find(&key_bytes) {
            Some(i) => i,
            None => {
                self.slots.push(Some(Entry {
                    key: Box::new(key_bytes),
                    value: vec![0u64; 1].into_boxed_slice(),
                }));
                self.len += 1;
                self.slots.len() - 1
            }
        };
        if let Some(entry) = self.slots[idx].as_mut() {
            entry.value[0] = value as u64;
        }
    }

    pub fn get_i64(&self, key: i64) -> Option<i64> {
        let idx = self.find(&key.to_ne_bytes())?;
        self.slots[idx].as_ref().map(|e| e.value[0] as i64)
    }
}

unsafe fn map_mut<'m>(map: u64) -> &'m mut RefMap {
    // SAFETY: tests pass a live `RefMap` as the map handle
    unsafe { &mut *(map as *mut RefMap) }
}

unsafe fn key_bytes<'k>(key: u64, size: u64) -> &'k [u8] {
    // SAFETY: the lowering passes a materialized key of `key_size` bytes
    unsafe { std::slice::from_raw_parts(key as *const u8, size as usize) }
}

pub extern "C" fn ref_map_lookup(desc: u64, map: u64, key: u64, insert: u64) -> u64 {
    let map = unsafe { map_mut(map) };
    let d = map.note_descriptor(desc);
    let key = unsafe { key_bytes(key, d.key_size) };
    if let Some(idx) = map.find(key) {
        return map.slots[idx]
            .as_mut()
            .map_or(0, |e| e.value.as_mut_ptr() as u64);
    }
    if insert & 1 == 0 {
        return 0;
    }
    let words = (d.elem_size as usize).div_ceil(8).max(1);
    let mut entry = Entry {
        key: key.to_vec().into_boxed_slice(),
        value: vec![0u64; words].into_boxed_slice(),
    };
    let slot = entry.value.as_mut_ptr() as u64;
    map.slots.push(Some(entry));
    map.len += 1;
    slot
}

pub extern "C" fn ref_map_delete(desc: u64, map: u64, key: u64) {
    let map = unsafe { map_mut(map) };
    let d = map.note_descriptor(desc);
    let key = unsafe { key_bytes(key, d.key_size) };
    if let Some(idx) = map.find(key) {
        map.slots[idx] = None;
        map.len -= 1;
    }
}

/// Writes `{next_cursor, key_addr, value_addr}` to `out`; all zero at the end.
pub extern "C" fn ref_map_next(desc: u64, map: u64, cursor: u64, out: u64) {
    let map = unsafe { map_mut(map) };
    map.note_descriptor(desc);
    let out = out as *mut [u64; 3];
    let start = cursor as usize;
    let mut result = [0u64; 3];
    for idx in start..map.slots.len() {
        if let Some(entry) = map.slots[idx].as_mut() {
            result = [
                idx as u64 + 1,
                entry.key.as_ptr() as u64,
                entry.value.as_mut_ptr() as u64,
            ];
            break;
        }
    }
    // SAFETY: the trampoline passes a stack slot of three words
    unsafe { *out = result };
}

#[derive(Default)]
struct ChanState {
    slot: Option<Vec<u8>>,
    sent: u64,
    received: u64,
}

/// Unbuffered channel: a send returns only after a receive took its value.
pub struct RefChan {
    elem_size: usize,
    state: Mutex<ChanState>,
    cond: Condvar,
}

impl RefChan {
    pub fn new(elem_size: usize) -> Self {
        RefChan {
            elem_size,
            state: Mutex::new(ChanState::default()),
            cond: Condvar::new(),
        }
    }

    pub fn as_handle(&self) -> *const RefChan {
        self as *const RefChan
    }

    pub fn received(&self) -> u64 {
        self.state.lock().map(|s| s.received).unwrap_or(0)
    }

    fn send(&self, value: &[u8]) {
        let mut st = self.state.lock().expect("channel lock");
        while st.slot.is_some() {
            st = self.cond.wait(st).expect("channel wait");
        }
        st.slot = Some(value.to_vec());
        st.sent += 1;
        let ticket = st.sent;
        self.cond.notify_all();
        while st.received < ticket {
            st = self.cond.wait(st).expect("channel wait");
        }
    }

    fn recv(&self, dest: &mut [u8]) {
        let mut st = self.state.lock().expect("channel lock");
        loop {
            if let Some(bytes) = st.slot.take() {
                dest.copy_from_slice(&bytes);
                st.received += 1;
                self.cond.notify_all();
                return;
            }
            st = self.cond.wait(st).expect("channel wait");
        }
    }
}

pub extern "C" fn ref_chan_send(chan: u64, value: u64) {
    // SAFETY: tests pass a live `RefChan` and a materialized element
    let chan = unsafe { &*(chan as *const RefChan) };
    let bytes = unsafe { std::slice::from_raw_parts(value as *const u8, chan.elem_size) };
    chan.send(bytes);
}

pub extern "C" fn ref_chan_recv(chan: u64, dest: u64) {
    // SAFETY: tests pass a live `RefChan` and a stack slot of `elem_size` bytes
    let chan = unsafe { &*(chan as *const RefChan) };
    let dest = unsafe { std::slice::from_raw_parts_mut(dest as *mut u8, chan.elem_size) };
    chan.recv(dest);
}
