//! In-process communicator shared by the workers of one session.
//!
//! Provides the three collectives the centrality kernel contract relies on:
//! `barrier`, `broadcast` (root → every rank) and `reduce_sum` (every rank →
//! root, summed in rank order). Each rank owns one cache-padded mailbox slot.
//! All collectives are abortable: a rank that fails calls [`Communicator::abort`]
//! and every blocked peer returns [`CommError::Aborted`].

use std::any::Any;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crossbeam_utils::CachePadded;
use num_traits::Float;

use crate::concurrency::barrier::AbortableBarrier;
use crate::error::CommError;

type Mailbox = Option<Box<dyn Any + Send>>;

/// Collective operations over a fixed set of ranks `0..size`.
pub struct Communicator {
    size: usize,
    barrier: AbortableBarrier,
    slots: Vec<CachePadded<Mutex<Mailbox>>>,
}

impl Communicator {
    /// Creates a communicator for `size` ranks.
    ///
    /// # Panics
    /// Panics if `size == 0`.
    pub fn new(size: usize) -> Self {
        assert!(size != 0, "communicator size must be > 0");
        Self {
            size,
            barrier: AbortableBarrier::new(size),
            slots: (0..size).map(|_| CachePadded::new(Mutex::new(None))).collect(),
        }
    }

    /// Number of ranks.
    pub fn size(&self) -> usize {
        self.size
    }

    fn check_rank(&self, rank: usize) -> Result<(), CommError> {
        if rank < self.size {
            Ok(())
        } else {
            Err(CommError::InvalidRank { rank, size: self.size })
        }
    }

    fn slot(&self, rank: usize) -> MutexGuard<'_, Mailbox> {
        self.slots[rank].lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until every rank has reached the barrier.
    ///
    /// # Errors
    /// Returns [`CommError::Aborted`] if the communicator is aborted.
    pub fn barrier(&self) -> Result<(), CommError> {
        self.barrier.wait().map(|_| ())
    }

    /// Aborts every current and future collective.
    pub fn abort(&self) {
        if !self.barrier.is_aborted() {
            tracing::debug!(size = self.size, "communicator aborted");
        }
        self.barrier.abort();
    }

    /// Returns `true` once the communicator has been aborted.
    pub fn is_aborted(&self) -> bool {
        self.barrier.is_aborted()
    }

    /// Distributes `value` from `root` to every rank.
    ///
    /// The root passes `Some(value)`, every other rank passes `None`; all ranks
    /// receive the root's value.
    ///
    /// # Errors
    /// - [`CommError::MissingPayload`] if the root passes `None`
    /// - [`CommError::PayloadMismatch`] if a rank expects a different type
    /// - [`CommError::Aborted`] if a peer aborted
    pub fn broadcast<V>(&self, rank: usize, root: usize, value: Option<V>) -> Result<V, CommError>
    where
        V: Clone + Send + 'static,
    {
        self.check_rank(rank)?;
        self.check_rank(root)?;

        if rank == root {
            let value = value.ok_or(CommError::MissingPayload)?;
            *self.slot(root) = Some(Box::new(value.clone()));
            self.barrier()?;
            // peers copy out between the two barriers
            self.barrier()?;
            self.slot(root).take();
            return Ok(value);
        }

        self.barrier()?;
        let received = self
            .slot(root)
            .as_ref()
            .and_then(|payload| payload.downcast_ref::<V>())
            .cloned()
            .ok_or(CommError::PayloadMismatch { rank });
        self.barrier()?;
        received
    }

    /// Sums equal-length vectors elementwise onto `root`.
    ///
    /// The root receives `Some(sum)`; other ranks receive `None`. Contributions
    /// are added in rank order, so the result is deterministic.
    ///
    /// # Errors
    /// - [`CommError::PayloadMismatch`] on the root if a contribution has another length or type
    /// - [`CommError::Aborted`] if a peer aborted
    pub fn reduce_sum<T>(&self, rank: usize, root: usize, local: Vec<T>) -> Result<Option<Vec<T>>, CommError>
    where
        T: Float + Send + 'static,
    {
        self.check_rank(rank)?;
        self.check_rank(root)?;

        if rank != root {
            *self.slot(rank) = Some(Box::new(local));
            self.barrier()?;
            self.barrier()?;
            return Ok(None);
        }

        self.barrier()?;
        let mut acc = local;
        let mut outcome = Ok(());
        for peer in (0..self.size).filter(|&p| p != root) {
            let contribution = self.slot(peer).take().and_then(|b| b.downcast::<Vec<T>>().ok());
            match contribution {
                Some(c) if c.len() == acc.len() => {
                    for (a, x) in acc.iter_mut().zip(c.iter()) {
                        *a = *a + *x;
                    }
                }
                _ => outcome = Err(CommError::PayloadMismatch { rank }),
            }
        }
        self.barrier()?;
        outcome.map(|()| Some(acc))
    }
}

impl core::fmt::Debug for Communicator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Communicator")
            .field("size", &self.size)
            .field("aborted", &self.is_aborted())
            .finish_non_exhaustive()
    }
}

/// Aborts a communicator if the owning thread unwinds.
///
/// Held by every worker task so that a panicking rank cannot leave its peers
/// blocked in a collective.
#[must_use = "the guard aborts only while it is alive"]
pub struct AbortOnPanic<'a> {
    comm: &'a Communicator,
}

impl<'a> AbortOnPanic<'a> {
    /// Arms the guard.
    pub fn new(comm: &'a Communicator) -> Self {
        Self { comm }
    }
}

impl Drop for AbortOnPanic<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.comm.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn broadcast_reaches_every_rank() {
        let comm = Communicator::new(3);
        let got: Vec<Vec<u32>> = thread::scope(|s| {
            let hs: Vec<_> = (0..3)
                .map(|rank| {
                    let comm = &comm;
                    s.spawn(move || {
                        let payload = (rank == 0).then(|| vec![7u32, 8, 9]);
                        comm.broadcast(rank, 0, payload).unwrap()
                    })
                })
                .collect();
            hs.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(got.iter().all(|v| v == &[7, 8, 9]));
    }

    #[test]
    fn reduce_sum_lands_on_root_only() {
        let comm = Communicator::new(4);
        let results: Vec<Option<Vec<f64>>> = thread::scope(|s| {
            let hs: Vec<_> = (0..4)
                .map(|rank| {
                    let comm = &comm;
                    s.spawn(move || comm.reduce_sum(rank, 0, vec![rank as f64, 1.0]).unwrap())
                })
                .collect();
            hs.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(results[0], Some(vec![6.0, 4.0]));
        assert!(results[1..].iter().all(Option::is_none));
    }

    #[test]
    fn single_rank_collectives_are_local() {
        let comm = Communicator::new(1);
        assert_eq!(comm.broadcast(0, 0, Some(5usize)), Ok(5));
        assert_eq!(comm.reduce_sum(0, 0, vec![1.5f32]), Ok(Some(vec![1.5])));
        assert_eq!(comm.broadcast::<u8>(0, 0, None), Err(CommError::MissingPayload));
        assert_eq!(comm.barrier(), Ok(()));
    }

    #[test]
    fn mismatched_lengths_are_reported_on_root() {
        let comm = Communicator::new(2);
        let (root, peer) = thread::scope(|s| {
            let root = s.spawn(|| comm.reduce_sum(0, 0, vec![1.0f64, 2.0]));
            let peer = s.spawn(|| comm.reduce_sum(1, 0, vec![1.0f64]));
            (root.join().unwrap(), peer.join().unwrap())
        });
        assert_eq!(root, Err(CommError::PayloadMismatch { rank: 0 }));
        assert_eq!(peer, Ok(None));
    }

    #[test]
    fn invalid_rank_is_rejected() {
        let comm = Communicator::new(2);
        assert_eq!(comm.barrier.parties(), 2);
        assert_eq!(
            comm.broadcast(2, 0, Some(1u8)),
            Err(CommError::InvalidRank { rank: 2, size: 2 })
        );
    }

    #[test]
    fn panicking_rank_aborts_peers() {
        let comm = Communicator::new(2);
        thread::scope(|s| {
            let peer = s.spawn(|| comm.broadcast::<u32>(1, 0, None));
            let root = s.spawn(|| {
                let _guard = AbortOnPanic::new(&comm);
                panic!("organizer failed before broadcasting");
            });
            assert!(root.join().is_err());
            assert_eq!(peer.join().unwrap(), Err(CommError::Aborted));
        });
    }
}
