//! # Communicator module
//!
//! Synchronization and distribution primitives over a group of lock-step
//! processes. Two scopes matter to the exporter: the *world* (all ranks,
//! used only around output-directory creation) and the *group* (the ranks
//! sharing one observation's distribution grid, used for all per-observation
//! barriers, broadcasts and gathers).
//!
//! [`Comm::Solo`] is the single-process case. [`Comm::Threaded`] runs a
//! group of ranks as threads of one process, with crossbeam mailboxes and a
//! shared barrier; it exists so the collective control flow can be exercised
//! by real concurrent ranks without an MPI runtime. Payloads are encoded
//! with `serde_json`, which keeps the primitives usable for any
//! serializable value.

use std::sync::{Arc, Barrier};

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Errors from collective operations
#[derive(Debug, thiserror::Error)]
pub enum CommError {
    /// Payload (de)serialization failed
    #[error("collective payload codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// A peer rank's channel endpoint is gone
    #[error("communicator channel closed (peer rank gone)")]
    Disconnected,

    /// The broadcast root did not supply a value
    #[error("broadcast root {root} supplied no value")]
    MissingRoot {
        /// The root rank of the collective
        root: usize,
    },

    /// A message arrived from an unexpected rank
    #[error("unexpected message from rank {0}")]
    Unexpected(usize),
}

/// One rank's endpoint of a process group.
#[derive(Debug, Clone)]
pub enum Comm {
    /// A group of exactly one rank; all collectives are trivial
    Solo,
    /// A thread-backed group of ranks within one process
    Threaded(ThreadedComm),
}

impl Comm {
    /// This rank's index within the group
    pub fn rank(&self) -> usize {
        match self {
            Comm::Solo => 0,
            Comm::Threaded(c) => c.rank,
        }
    }

    /// Number of ranks in the group
    pub fn size(&self) -> usize {
        match self {
            Comm::Solo => 1,
            Comm::Threaded(c) => c.size,
        }
    }

    /// Block until every rank in the group has arrived
    pub fn barrier(&self) {
        if let Comm::Threaded(c) = self {
            c.barrier.wait();
        }
    }

    /// Distribute `root`'s value to every rank.
    ///
    /// Only `root` needs to supply `Some(value)`; the supplied values of
    /// other ranks are ignored. Every rank returns the root's value.
    pub fn broadcast<T>(&self, root: usize, value: Option<T>) -> Result<T, CommError>
    where
        T: Serialize + DeserializeOwned,
    {
        match self {
            Comm::Solo => value.ok_or(CommError::MissingRoot { root }),
            Comm::Threaded(c) => c.broadcast(root, value),
        }
    }

    /// Collect one value from every rank at `root`.
    ///
    /// Returns `Some(values)` in rank order on the root and `None`
    /// elsewhere.
    pub fn gather<T>(&self, root: usize, value: T) -> Result<Option<Vec<T>>, CommError>
    where
        T: Serialize + DeserializeOwned,
    {
        match self {
            Comm::Solo => Ok(Some(vec![value])),
            Comm::Threaded(c) => c.gather(root, value),
        }
    }
}

type Envelope = (usize, Vec<u8>);

/// Thread-backed rank endpoint: a mailbox per rank plus a shared barrier.
///
/// Every collective ends with a barrier, so a rank can never race ahead and
/// push messages for the next collective into a mailbox that still holds
/// traffic for the current one.
#[derive(Debug, Clone)]
pub struct ThreadedComm {
    rank: usize,
    size: usize,
    barrier: Arc<Barrier>,
    senders: Vec<Sender<Envelope>>,
    receiver: Receiver<Envelope>,
}

impl ThreadedComm {
    /// Create the endpoints for a group of `size` ranks, one per thread
    pub fn group(size: usize) -> Vec<ThreadedComm> {
        let barrier = Arc::new(Barrier::new(size));
        let mut senders = Vec::with_capacity(size);
        let mut receivers = Vec::with_capacity(size);
        for _ in 0..size {
            let (tx, rx) = unbounded();
            senders.push(tx);
            receivers.push(rx);
        }
        receivers
            .into_iter()
            .enumerate()
            .map(|(rank, receiver)| ThreadedComm {
                rank,
                size,
                barrier: Arc::clone(&barrier),
                senders: senders.clone(),
                receiver,
            })
            .collect()
    }

    fn send_to(&self, dest: usize, payload: Vec<u8>) -> Result<(), CommError> {
        self.senders[dest]
            .send((self.rank, payload))
            .map_err(|_| CommError::Disconnected)
    }

    fn recv(&self) -> Result<Envelope, CommError> {
        self.receiver.recv().map_err(|_| CommError::Disconnected)
    }

    fn broadcast<T>(&self, root: usize, value: Option<T>) -> Result<T, CommError>
    where
        T: Serialize + DeserializeOwned,
    {
        let result = if self.rank == root {
            let value = value.ok_or(CommError::MissingRoot { root })?;
            let bytes = serde_json::to_vec(&value)?;
            for dest in 0..self.size {
                if dest != root {
                    self.send_to(dest, bytes.clone())?;
                }
            }
            Ok(value)
        } else {
            let (from, bytes) = self.recv()?;
            if from != root {
                return Err(CommError::Unexpected(from));
            }
            Ok(serde_json::from_slice(&bytes)?)
        };
        self.barrier.wait();
        result
    }

    fn gather<T>(&self, root: usize, value: T) -> Result<Option<Vec<T>>, CommError>
    where
        T: Serialize + DeserializeOwned,
    {
        let result = if self.rank == root {
            let mut parts: Vec<Option<Vec<u8>>> = vec![None; self.size];
            parts[root] = Some(serde_json::to_vec(&value)?);
            for _ in 0..self.size - 1 {
                let (from, bytes) = self.recv()?;
                if parts[from].replace(bytes).is_some() {
                    return Err(CommError::Unexpected(from));
                }
            }
            let mut values = Vec::with_capacity(self.size);
            for part in parts.into_iter().flatten() {
                values.push(serde_json::from_slice(&part)?);
            }
            Ok(Some(values))
        } else {
            let bytes = serde_json::to_vec(&value)?;
            self.send_to(root, bytes)?;
            Ok(None)
        };
        self.barrier.wait();
        result
    }
}

/// Two-level communicator hierarchy for the export pipeline.
///
/// `world` spans every rank of the job; `group` spans the ranks holding one
/// observation's distribution grid. In a single-process job both are
/// [`Comm::Solo`].
#[derive(Debug, Clone)]
pub struct PipelineComm {
    /// All ranks in the job
    pub world: Comm,
    /// The ranks sharing this process's observation group
    pub group: Comm,
}

impl PipelineComm {
    /// Build a hierarchy from explicit world and group endpoints
    pub fn new(world: Comm, group: Comm) -> Self {
        Self { world, group }
    }

    /// The single-process hierarchy
    pub fn solo() -> Self {
        Self {
            world: Comm::Solo,
            group: Comm::Solo,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_solo_collectives() {
        let comm = Comm::Solo;
        assert_eq!(comm.rank(), 0);
        assert_eq!(comm.size(), 1);
        comm.barrier();
        assert_eq!(comm.broadcast(0, Some(7usize)).unwrap(), 7);
        assert_eq!(comm.gather(0, 7usize).unwrap(), Some(vec![7]));
    }

    #[test]
    fn test_solo_broadcast_without_value_is_an_error() {
        let err = Comm::Solo.broadcast::<usize>(0, None).unwrap_err();
        assert!(matches!(err, CommError::MissingRoot { root: 0 }));
    }

    #[test]
    fn test_threaded_broadcast_and_gather() {
        let endpoints = ThreadedComm::group(3);
        let handles: Vec<_> = endpoints
            .into_iter()
            .map(|endpoint| {
                thread::spawn(move || {
                    let comm = Comm::Threaded(endpoint);
                    let rank = comm.rank();
                    let value = if rank == 0 { Some(vec![10usize, 20]) } else { None };
                    let got = comm.broadcast(0, value).unwrap();
                    assert_eq!(got, vec![10, 20]);

                    let gathered = comm.gather(0, rank * 100).unwrap();
                    if rank == 0 {
                        assert_eq!(gathered, Some(vec![0, 100, 200]));
                    } else {
                        assert_eq!(gathered, None);
                    }

                    // A second round reuses the same mailboxes cleanly.
                    let gathered = comm.gather(0, rank + 1).unwrap();
                    if rank == 0 {
                        assert_eq!(gathered, Some(vec![1, 2, 3]));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
