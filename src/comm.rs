//! Communicators and the cross-process reduction protocol.
//!
//! A [`Communicator`] is one rank's handle on a world of `size` ranks. It
//! only needs to move opaque byte buffers between ranks; the reduction is a
//! provided method built on top:
//!
//! 1. every rank packs its process-local accumulator with [`wire::pack`],
//! 2. non-root ranks send their buffer to the root,
//! 3. the root unpacks the buffers in increasing rank order and folds them
//!    with the [`ReduceOp`].
//!
//! The fold order is fixed, so a given world and input always reduce to the
//! same bits.
//!
//! Worlds provided here:
//!
//! - [`SelfComm`]: a world of one.
//! - [`ChannelComm`]: ranks as threads of one process with independent
//!   state, talking through `crossbeam-channel`.
//!
//! Ranks as OS processes live in [`crate::process`].

use std::cell::RefCell;
use std::collections::VecDeque;

use crossbeam_channel::{Receiver, Sender, unbounded};
use log::debug;

use crate::ReduceOp;
use crate::big::BigValue;
use crate::error::{Error, Result};
use crate::precision::Precision;
use crate::wire;

/// Rank that receives reduction results.
pub const ROOT: usize = 0;

/// One rank's view of a world of cooperating ranks.
///
/// # Example
///
/// ```
/// use pidecimals::{BigValue, ChannelComm, Communicator, Precision, ReduceOp};
///
/// let p = Precision::new(128).unwrap();
/// let results = ChannelComm::run(3, |comm| {
///     let local = BigValue::from_u64(p, comm.rank() as u64 + 1);
///     comm.reduce(&local, p, ReduceOp::Sum, 0)
/// })
/// .unwrap();
///
/// assert_eq!(results[0], Some(BigValue::from_u64(p, 6)));
/// assert_eq!(results[1], None);
/// ```
pub trait Communicator {
    /// Rank of the calling process, in `0..size()`.
    fn rank(&self) -> usize;

    /// Number of ranks in the world.
    fn size(&self) -> usize;

    /// Send one buffer to `dest`.
    fn send_bytes(&self, data: &[u8], dest: usize) -> Result<()>;

    /// Receive the next buffer sent by `source`.
    fn recv_bytes(&self, source: usize) -> Result<Vec<u8>>;

    /// Whether this is the rank reductions land on.
    fn is_root(&self) -> bool {
        self.rank() == ROOT
    }

    /// Reduce one value per rank to `root`.
    ///
    /// All ranks must call this with the same `precision`, `op` and `root`.
    /// Only `root` receives `Some(result)`; every other rank gets `None`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRank`] when `root` is outside the world, the wire
    /// errors of [`wire::pack`] / [`wire::unpack`], and transport errors.
    fn reduce(
        &self,
        value: &BigValue,
        precision: Precision,
        op: ReduceOp,
        root: usize,
    ) -> Result<Option<BigValue>> {
        let size = self.size();
        if root >= size {
            return Err(Error::InvalidRank { rank: root, size });
        }
        let packed = wire::pack(value, precision)?;
        if self.rank() != root {
            debug!("rank {}: sending {} bytes to {root}", self.rank(), packed.len());
            self.send_bytes(&packed, root)?;
            return Ok(None);
        }

        let mut result: Option<BigValue> = None;
        for source in 0..size {
            let contribution = if source == root {
                wire::unpack(&packed, precision)?
            } else {
                let buf = self.recv_bytes(source)?;
                debug!("rank {root}: received {} bytes from {source}", buf.len());
                wire::unpack(&buf, precision)?
            };
            result = Some(match result {
                None => contribution,
                Some(acc) => op.combine(&acc, &contribution),
            });
        }
        Ok(result)
    }
}

impl ReduceOp {
    /// Combine two values. Every operation is commutative and, up to
    /// rounding for `Sum` and `Prod`, associative.
    pub fn combine(self, a: &BigValue, b: &BigValue) -> BigValue {
        match self {
            ReduceOp::Sum => a.sum(b),
            ReduceOp::Prod => a.product(b),
            ReduceOp::Max => {
                if b > a {
                    b.clone()
                } else {
                    a.clone()
                }
            }
            ReduceOp::Min => {
                if b < a {
                    b.clone()
                } else {
                    a.clone()
                }
            }
        }
    }
}

// ============================================================================
// Single-rank world
// ============================================================================

/// The world of a single process.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelfComm;

impl Communicator for SelfComm {
    fn rank(&self) -> usize {
        ROOT
    }

    fn size(&self) -> usize {
        1
    }

    fn send_bytes(&self, _data: &[u8], dest: usize) -> Result<()> {
        Err(Error::InvalidRank { rank: dest, size: 1 })
    }

    fn recv_bytes(&self, source: usize) -> Result<Vec<u8>> {
        Err(Error::InvalidRank {
            rank: source,
            size: 1,
        })
    }
}

// ============================================================================
// In-process world over channels
// ============================================================================

type Envelope = (usize, Vec<u8>);

/// A rank of an in-process world whose ranks talk through channels.
///
/// Each rank has its own inbox. Messages from a source other than the one
/// being waited for are parked until asked for, so receives can be issued in
/// any order.
pub struct ChannelComm {
    rank: usize,
    size: usize,
    /// `None` at this rank's own slot
    peers: Vec<Option<Sender<Envelope>>>,
    inbox: Receiver<Envelope>,
    parked: RefCell<Vec<VecDeque<Vec<u8>>>>,
}

impl ChannelComm {
    /// Create every rank of a world of `size`.
    pub fn world(size: usize) -> Result<Vec<ChannelComm>> {
        if size == 0 {
            return Err(Error::NoProcesses);
        }
        let (senders, receivers): (Vec<_>, Vec<_>) = (0..size).map(|_| unbounded()).unzip();
        Ok(receivers
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| ChannelComm {
                rank,
                size,
                peers: senders
                    .iter()
                    .enumerate()
                    .map(|(peer, tx)| (peer != rank).then(|| tx.clone()))
                    .collect(),
                inbox,
                parked: RefCell::new(vec![VecDeque::new(); size]),
            })
            .collect())
    }

    /// Run `f` once per rank, each on its own thread, and collect the
    /// results in rank order.
    pub fn run<T, F>(size: usize, f: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(ChannelComm) -> Result<T> + Sync,
    {
        let ranks = Self::world(size)?;
        std::thread::scope(|scope| {
            let f = &f;
            let handles: Vec<_> = ranks
                .into_iter()
                .map(|comm| scope.spawn(move || f(comm)))
                .collect();
            handles
                .into_iter()
                .enumerate()
                .map(|(rank, handle)| {
                    handle
                        .join()
                        .map_err(|_| Error::Transport(format!("rank {rank} panicked")))?
                })
                .collect()
        })
    }

    fn check_peer(&self, peer: usize) -> Result<()> {
        if peer >= self.size {
            return Err(Error::InvalidRank {
                rank: peer,
                size: self.size,
            });
        }
        Ok(())
    }
}

impl Communicator for ChannelComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send_bytes(&self, data: &[u8], dest: usize) -> Result<()> {
        self.check_peer(dest)?;
        match &self.peers[dest] {
            Some(tx) => tx
                .send((self.rank, data.to_vec()))
                .map_err(|_| Error::Transport(format!("rank {dest} hung up"))),
            None => {
                self.parked.borrow_mut()[dest].push_back(data.to_vec());
                Ok(())
            }
        }
    }

    fn recv_bytes(&self, source: usize) -> Result<Vec<u8>> {
        self.check_peer(source)?;
        if let Some(buf) = self.parked.borrow_mut()[source].pop_front() {
            return Ok(buf);
        }
        if source == self.rank {
            return Err(Error::Transport(format!(
                "rank {source} waits on a message to itself that was never sent"
            )));
        }
        loop {
            let (from, buf) = self.inbox.recv().map_err(|_| {
                Error::Transport(format!("every peer hung up before rank {source} sent"))
            })?;
            if from == source {
                return Ok(buf);
            }
            self.parked.borrow_mut()[from].push_back(buf);
        }
    }
}

impl std::fmt::Debug for ChannelComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelComm")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .finish()
    }
}
