//! Fixed pool of event buffers
//!
//! Stages inbound payloads for the engine without allocating per message.
//! Buffers are taken in the network callback context and given back from the
//! engine's task, so every access goes through one blocking mutex whose
//! critical sections are bounded by a slot lookup and one payload copy.

use crate::error::{BridgeError, Result};
use crate::traits::PayloadSource;
use core::cell::RefCell;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use heapless::Vec;
use log::error;

/// Reference to an acquired event buffer
///
/// The generation changes every time the slot is released, so a handle kept
/// past its release never reaches the slot's next owner.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct BufferHandle {
    slot: usize,
    generation: u32,
}

impl BufferHandle {
    pub const fn slot(&self) -> usize {
        self.slot
    }

    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

impl core::fmt::Display for BufferHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "buffer {}#{}", self.slot, self.generation)
    }
}

#[derive(Debug)]
struct EventBuffer<const BUFFER_SIZE: usize> {
    data: [u8; BUFFER_SIZE],
    len: usize,
    in_use: bool,
    generation: u32,
}

impl<const BUFFER_SIZE: usize> EventBuffer<BUFFER_SIZE> {
    const fn new() -> Self {
        Self {
            data: [0; BUFFER_SIZE],
            len: 0,
            in_use: false,
            generation: 0,
        }
    }

    fn is_held_by(&self, handle: BufferHandle) -> bool {
        self.in_use && self.generation == handle.generation
    }
}

#[derive(Debug)]
struct Slots<const NUM_BUFFERS: usize, const BUFFER_SIZE: usize> {
    buffers: [EventBuffer<BUFFER_SIZE>; NUM_BUFFERS],
    /// Free slot indices; the top of the stack is handed out next
    free: Vec<usize, NUM_BUFFERS>,
}

impl<const NUM_BUFFERS: usize, const BUFFER_SIZE: usize> Slots<NUM_BUFFERS, BUFFER_SIZE> {
    fn held(&mut self, handle: BufferHandle) -> Result<&mut EventBuffer<BUFFER_SIZE>> {
        match self.buffers.get_mut(handle.slot) {
            Some(buffer) if buffer.is_held_by(handle) => Ok(buffer),
            _ => Err(BridgeError::StaleHandle { slot: handle.slot }),
        }
    }
}

/// Pool of `NUM_BUFFERS` event buffers of `BUFFER_SIZE` bytes each
///
/// # Generic Parameters
///
/// - `M`: raw mutex guarding the pool; must be usable from every context that
///   acquires or releases (e.g. `CriticalSectionRawMutex`)
/// - `NUM_BUFFERS`: number of events that can be in flight at once
/// - `BUFFER_SIZE`: largest payload a buffer can stage
pub struct EventBufferArena<M: RawMutex, const NUM_BUFFERS: usize, const BUFFER_SIZE: usize> {
    inner: Mutex<M, RefCell<Slots<NUM_BUFFERS, BUFFER_SIZE>>>,
}

impl<M: RawMutex, const NUM_BUFFERS: usize, const BUFFER_SIZE: usize>
    EventBufferArena<M, NUM_BUFFERS, BUFFER_SIZE>
{
    /// Create a pool with every buffer free
    pub fn new() -> Self {
        // Reversed so slot 0 is handed out first
        let free = (0..NUM_BUFFERS).rev().collect();
        Self {
            inner: Mutex::new(RefCell::new(Slots {
                buffers: core::array::from_fn(|_| EventBuffer::new()),
                free,
            })),
        }
    }

    /// Take a free buffer
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::ResourceExhausted` if every buffer is in flight.
    pub fn acquire(&self) -> Result<BufferHandle> {
        self.inner.lock(|slots| {
            let mut slots = slots.borrow_mut();
            let slot = slots.free.pop().ok_or(BridgeError::ResourceExhausted {
                capacity: NUM_BUFFERS,
            })?;
            let buffer = &mut slots.buffers[slot];
            buffer.in_use = true;
            buffer.len = 0;
            Ok(BufferHandle {
                slot,
                generation: buffer.generation,
            })
        })
    }

    /// Copy `payload` into an acquired buffer, replacing its contents
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::PayloadTooLarge` if the payload exceeds
    /// `BUFFER_SIZE`, `BridgeError::StaleHandle` if the handle was released.
    pub fn fill(&self, handle: BufferHandle, payload: &[u8]) -> Result<usize> {
        if payload.len() > BUFFER_SIZE {
            return Err(BridgeError::PayloadTooLarge {
                max_size: BUFFER_SIZE,
                actual_size: payload.len(),
            });
        }
        self.inner.lock(|slots| {
            let mut slots = slots.borrow_mut();
            let buffer = slots.held(handle)?;
            buffer.data[..payload.len()].copy_from_slice(payload);
            buffer.len = payload.len();
            Ok(buffer.len)
        })
    }

    /// Run `f` over the payload staged in an acquired buffer
    pub fn with_payload<R>(&self, handle: BufferHandle, f: impl FnOnce(&[u8]) -> R) -> Result<R> {
        self.inner.lock(|slots| {
            let mut slots = slots.borrow_mut();
            let buffer = slots.held(handle)?;
            Ok(f(&buffer.data[..buffer.len]))
        })
    }

    pub fn payload_len(&self, handle: BufferHandle) -> Result<usize> {
        self.with_payload(handle, <[u8]>::len)
    }

    /// Return a buffer to the pool
    ///
    /// Releasing a buffer that is already free (or was re-acquired under a
    /// newer handle) leaves the pool untouched and is reported as
    /// `BridgeError::DoubleRelease`.
    pub fn release(&self, handle: BufferHandle) -> Result<()> {
        let result = self.inner.lock(|slots| {
            let mut slots = slots.borrow_mut();
            let buffer = slots
                .held(handle)
                .map_err(|_| BridgeError::DoubleRelease { slot: handle.slot })?;
            buffer.in_use = false;
            buffer.len = 0;
            buffer.generation = buffer.generation.wrapping_add(1);
            slots
                .free
                .push(handle.slot)
                .map_err(|_| BridgeError::DoubleRelease { slot: handle.slot })
        });
        if let Err(e) = result {
            error!("Failed to release {}: {}", handle, e);
        }
        result
    }

    pub fn free_count(&self) -> usize {
        self.inner.lock(|slots| slots.borrow().free.len())
    }

    /// Buffers currently handed out, counted from the slots themselves
    pub fn in_use_count(&self) -> usize {
        self.inner
            .lock(|slots| slots.borrow().buffers.iter().filter(|b| b.in_use).count())
    }

    pub const fn capacity(&self) -> usize {
        NUM_BUFFERS
    }

    pub const fn buffer_size(&self) -> usize {
        BUFFER_SIZE
    }
}

impl<M: RawMutex, const NUM_BUFFERS: usize, const BUFFER_SIZE: usize> Default
    for EventBufferArena<M, NUM_BUFFERS, BUFFER_SIZE>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RawMutex, const NUM_BUFFERS: usize, const BUFFER_SIZE: usize> PayloadSource
    for EventBufferArena<M, NUM_BUFFERS, BUFFER_SIZE>
{
    fn copy_payload(&self, handle: BufferHandle, out: &mut [u8]) -> Result<usize> {
        self.with_payload(handle, |payload| {
            if payload.len() > out.len() {
                return Err(BridgeError::PayloadTooLarge {
                    max_size: out.len(),
                    actual_size: payload.len(),
                });
            }
            out[..payload.len()].copy_from_slice(payload);
            Ok(payload.len())
        })?
    }
}
