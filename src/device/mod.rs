//! Device-resident memory.
//!
//! A [`Device`] is an accounted arena: every allocation gets a fresh
//! [`AllocationId`] and is owned by exactly one [`DeviceBuffer`]. Dropping the
//! buffer returns its bytes to the arena, so kernel failures and panics never
//! leak device memory.
//!
//! Memory layout is plain host memory; only ownership and accounting are modelled.

use core::mem;
use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use thiserror::Error;

/// Identifier of one live allocation on a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AllocationId(u64);

impl AllocationId {
    /// Raw identifier value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Allocation failure.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    /// The device capacity would be exceeded.
    #[error("device {ordinal} out of memory: requested {requested} bytes, {available} available")]
    OutOfMemory {
        /// Device ordinal.
        ordinal: usize,
        /// Bytes requested.
        requested: usize,
        /// Bytes still available.
        available: usize,
    },
}

#[derive(Debug)]
struct DeviceState {
    ordinal: usize,
    capacity: Option<usize>,
    next_id: AtomicU64,
    live: AtomicUsize,
    bytes: AtomicUsize,
}

impl DeviceState {
    fn reserve(&self, requested: usize) -> Result<AllocationId, DeviceError> {
        match self.capacity {
            None => {
                self.bytes.fetch_add(requested, Ordering::AcqRel);
            }
            Some(capacity) => {
                let mut current = self.bytes.load(Ordering::Acquire);
                loop {
                    let available = capacity.saturating_sub(current);
                    if requested > available {
                        return Err(DeviceError::OutOfMemory {
                            ordinal: self.ordinal,
                            requested,
                            available,
                        });
                    }
                    match self.bytes.compare_exchange_weak(
                        current,
                        current + requested,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    ) {
                        Ok(_) => break,
                        Err(observed) => current = observed,
                    }
                }
            }
        }
        self.live.fetch_add(1, Ordering::AcqRel);
        Ok(AllocationId(self.next_id.fetch_add(1, Ordering::Relaxed)))
    }

    fn release(&self, bytes: usize) {
        self.bytes.fetch_sub(bytes, Ordering::AcqRel);
        self.live.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A compute device owned by one worker.
///
/// Cloning yields another handle to the same arena.
#[derive(Debug, Clone)]
pub struct Device {
    state: Arc<DeviceState>,
}

impl Device {
    /// Creates an unbounded device.
    pub fn new(ordinal: usize) -> Self {
        Self::build(ordinal, None)
    }

    /// Creates a device that refuses allocations beyond `capacity_bytes` in total.
    pub fn with_capacity(ordinal: usize, capacity_bytes: usize) -> Self {
        Self::build(ordinal, Some(capacity_bytes))
    }

    fn build(ordinal: usize, capacity: Option<usize>) -> Self {
        Self {
            state: Arc::new(DeviceState {
                ordinal,
                capacity,
                next_id: AtomicU64::new(0),
                live: AtomicUsize::new(0),
                bytes: AtomicUsize::new(0),
            }),
        }
    }

    /// Device ordinal.
    pub fn ordinal(&self) -> usize {
        self.state.ordinal
    }

    /// Number of buffers currently alive on this device.
    pub fn live_allocations(&self) -> usize {
        self.state.live.load(Ordering::Acquire)
    }

    /// Bytes currently held by live buffers.
    pub fn bytes_in_use(&self) -> usize {
        self.state.bytes.load(Ordering::Acquire)
    }

    /// Allocates a zero-filled buffer of `len` elements.
    ///
    /// # Errors
    /// Returns [`DeviceError::OutOfMemory`] if the device capacity would be exceeded.
    pub fn alloc_zeroed<T: Copy + Default>(&self, len: usize) -> Result<DeviceBuffer<T>, DeviceError> {
        self.adopt(vec![T::default(); len])
    }

    /// Copies a host slice onto the device.
    ///
    /// # Errors
    /// Returns [`DeviceError::OutOfMemory`] if the device capacity would be exceeded.
    pub fn upload<T: Copy>(&self, host: &[T]) -> Result<DeviceBuffer<T>, DeviceError> {
        self.adopt(host.to_vec())
    }

    /// Moves a host vector onto the device without copying.
    ///
    /// # Errors
    /// Returns [`DeviceError::OutOfMemory`] if the device capacity would be exceeded.
    pub fn adopt<T>(&self, data: Vec<T>) -> Result<DeviceBuffer<T>, DeviceError> {
        let bytes = data.len().saturating_mul(mem::size_of::<T>());
        let id = self.state.reserve(bytes)?;
        tracing::trace!(device = self.state.ordinal, id = id.0, bytes, "device allocation");
        Ok(DeviceBuffer {
            id,
            data,
            bytes,
            state: Arc::clone(&self.state),
        })
    }
}

/// An owning handle to one device allocation.
pub struct DeviceBuffer<T> {
    id: AllocationId,
    data: Vec<T>,
    bytes: usize,
    state: Arc<DeviceState>,
}

impl<T> DeviceBuffer<T> {
    /// Allocation identifier.
    pub fn id(&self) -> AllocationId {
        self.id
    }

    /// Ordinal of the owning device.
    pub fn device_ordinal(&self) -> usize {
        self.state.ordinal
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the buffer holds no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Read-only view of the contents.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Mutable view of the contents.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Copies the contents back to the host.
    pub fn to_host(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.data.clone()
    }
}

impl<T> Drop for DeviceBuffer<T> {
    fn drop(&mut self) {
        self.state.release(self.bytes);
        tracing::trace!(device = self.state.ordinal, id = self.id.0, bytes = self.bytes, "device release");
    }
}

impl<T> core::fmt::Debug for DeviceBuffer<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DeviceBuffer")
            .field("device", &self.state.ordinal)
            .field("id", &self.id)
            .field("len", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_are_accounted_until_dropped() {
        let device = Device::new(0);
        let a = device.alloc_zeroed::<f64>(8).unwrap();
        let b = device.upload(&[1u32, 2, 3]).unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(device.live_allocations(), 2);
        assert_eq!(device.bytes_in_use(), 8 * 8 + 3 * 4);
        assert!(a.as_slice().iter().all(|&x| x == 0.0));

        drop(a);
        assert_eq!(device.live_allocations(), 1);
        assert_eq!(device.bytes_in_use(), 12);
        drop(b);
        assert_eq!(device.live_allocations(), 0);
        assert_eq!(device.bytes_in_use(), 0);
    }

    #[test]
    fn capacity_is_enforced() {
        let device = Device::with_capacity(3, 16);
        let held = device.alloc_zeroed::<u64>(2).unwrap();
        let err = device.alloc_zeroed::<u8>(1).unwrap_err();
        assert_eq!(
            err,
            DeviceError::OutOfMemory {
                ordinal: 3,
                requested: 1,
                available: 0
            }
        );
        assert_eq!(device.live_allocations(), 1);
        drop(held);
        assert!(device.alloc_zeroed::<u8>(16).is_ok());
    }

    #[test]
    fn release_happens_on_unwind() {
        let device = Device::new(0);
        let d = device.clone();
        let result = std::panic::catch_unwind(move || {
            let _buf = d.alloc_zeroed::<f32>(4).unwrap();
            panic!("kernel blew up");
        });
        assert!(result.is_err());
        assert_eq!(device.live_allocations(), 0);
    }
}
