//! Message passing between basis partitions.
//!
//! The distributed layer only needs variable-size all-to-all exchanges and an
//! all-gather. [`LocalComm`] is the single-rank loopback; [`ThreadComm`]
//! runs several ranks as threads of one process.

use crate::error::{EdError, Result};
use std::any::Any;
use std::sync::{Arc, Barrier, Mutex, PoisonError};

/// Collective operations over a fixed group of ranks.
///
/// Every rank must call the same collectives in the same order.
pub trait Communicator: Send + Sync {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    fn barrier(&self);

    /// Send `outgoing[dst]` to every rank `dst`; returns what each source
    /// rank sent here, indexed by source.
    fn exchange<T: Send + 'static>(&self, outgoing: Vec<Vec<T>>) -> Result<Vec<Vec<T>>>;

    /// `send` holds consecutive segments of `send_counts[dst]` items; the
    /// segment from each `src` lands in `recv` at the running offset of
    /// `recv_counts`.
    fn all_to_all_v<T: Copy + Send + 'static>(
        &self,
        send: &[T],
        send_counts: &[usize],
        recv: &mut [T],
        recv_counts: &[usize],
    ) -> Result<()> {
        let size = self.size();
        if send_counts.len() != size || recv_counts.len() != size {
            return Err(EdError::Communication(format!(
                "count vectors must have {size} entries"
            )));
        }
        let mut outgoing = Vec::with_capacity(size);
        let mut offset = 0;
        for &count in send_counts {
            let end = offset + count;
            let segment = send.get(offset..end).ok_or_else(|| {
                EdError::Communication(format!("send buffer shorter than {end}"))
            })?;
            outgoing.push(segment.to_vec());
            offset = end;
        }

        let incoming = self.exchange(outgoing)?;

        let mut offset = 0;
        for (src, (data, &count)) in incoming.iter().zip(recv_counts).enumerate() {
            if data.len() != count {
                return Err(EdError::Communication(format!(
                    "rank {} expected {count} items from rank {src}, got {}",
                    self.rank(),
                    data.len()
                )));
            }
            let end = offset + count;
            let slot = recv.get_mut(offset..end).ok_or_else(|| {
                EdError::Communication(format!("receive buffer shorter than {end}"))
            })?;
            slot.copy_from_slice(data);
            offset = end;
        }
        Ok(())
    }

    /// `value` from every rank, in rank order.
    fn all_gather<T: Clone + Send + 'static>(&self, value: T) -> Result<Vec<T>> {
        let outgoing = vec![vec![value]; self.size()];
        Ok(self.exchange(outgoing)?.into_iter().flatten().collect())
    }

    fn all_reduce_max(&self, value: usize) -> Result<usize> {
        Ok(self.all_gather(value)?.into_iter().fold(value, usize::max))
    }

    fn all_reduce_sum(&self, value: usize) -> Result<usize> {
        Ok(self.all_gather(value)?.into_iter().sum())
    }

    /// Counts each rank will receive, given what this rank sends.
    fn exchange_counts(&self, send_counts: &[usize]) -> Result<Vec<usize>> {
        let outgoing = send_counts.iter().map(|&c| vec![c]).collect();
        Ok(self.exchange(outgoing)?.into_iter().flatten().collect())
    }
}

/// Single-process communicator: rank 0 of 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalComm;

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn barrier(&self) {}

    fn exchange<T: Send + 'static>(&self, outgoing: Vec<Vec<T>>) -> Result<Vec<Vec<T>>> {
        if outgoing.len() != 1 {
            return Err(EdError::Communication(format!(
                "expected 1 outgoing segment, got {}",
                outgoing.len()
            )));
        }
        Ok(outgoing)
    }
}

type Slot = Option<Box<dyn Any + Send>>;

struct Shared {
    size: usize,
    barrier: Barrier,
    /// `slots[src * size + dst]`.
    slots: Mutex<Vec<Slot>>,
}

/// In-process communicator; each rank is meant to run on its own thread.
#[derive(Clone)]
pub struct ThreadComm {
    rank: usize,
    shared: Arc<Shared>,
}

impl std::fmt::Debug for ThreadComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadComm")
            .field("rank", &self.rank)
            .field("size", &self.shared.size)
            .finish()
    }
}

impl ThreadComm {
    /// One communicator per rank, ranks `0..size`.
    pub fn create(size: usize) -> Vec<ThreadComm> {
        let size = size.max(1);
        let shared = Arc::new(Shared {
            size,
            barrier: Barrier::new(size),
            slots: Mutex::new((0..size * size).map(|_| None).collect()),
        });
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                shared: Arc::clone(&shared),
            })
            .collect()
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    fn barrier(&self) {
        self.shared.barrier.wait();
    }

    fn exchange<T: Send + 'static>(&self, outgoing: Vec<Vec<T>>) -> Result<Vec<Vec<T>>> {
        let size = self.shared.size;
        let valid = outgoing.len() == size;

        if valid {
            let mut slots = self.shared.slots.lock().unwrap_or_else(PoisonError::into_inner);
            for (dst, data) in outgoing.into_iter().enumerate() {
                slots[self.rank * size + dst] = Some(Box::new(data));
            }
        }
        self.barrier();

        let mut incoming = Vec::with_capacity(size);
        let mut failure = None;
        {
            let mut slots = self.shared.slots.lock().unwrap_or_else(PoisonError::into_inner);
            for src in 0..size {
                match slots[src * size + self.rank].take().map(|b| b.downcast::<Vec<T>>()) {
                    Some(Ok(data)) => incoming.push(*data),
                    Some(Err(_)) => {
                        failure.get_or_insert_with(|| {
                            format!("rank {src} sent a payload of a different type")
                        });
                    }
                    None => {
                        failure.get_or_insert_with(|| format!("rank {src} sent nothing"));
                    }
                }
            }
        }
        // Nobody writes the next round before everyone has read this one.
        self.barrier();

        if !valid {
            return Err(EdError::Communication(format!(
                "rank {} passed the wrong number of segments",
                self.rank
            )));
        }
        match failure {
            Some(msg) => Err(EdError::Communication(msg)),
            None => Ok(incoming),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_local_loopback() {
        let comm = LocalComm;
        let mut recv = [0u32; 3];
        comm.all_to_all_v(&[1, 2, 3], &[3], &mut recv, &[3]).unwrap();
        assert_eq!(recv, [1, 2, 3]);
        assert_eq!(comm.all_gather(7u8).unwrap(), vec![7]);
        assert!(matches!(
            comm.all_to_all_v(&[1u32], &[1], &mut recv, &[2]),
            Err(EdError::Communication(_))
        ));
    }

    #[test]
    fn test_thread_all_to_all() {
        let comms = ThreadComm::create(3);
        let results: Vec<Vec<usize>> = thread::scope(|s| {
            let handles: Vec<_> = comms
                .into_iter()
                .map(|comm| {
                    s.spawn(move || {
                        let rank = comm.rank();
                        // Rank r sends r+1 copies of 10*r + dst to every dst.
                        let send_counts = vec![rank + 1; 3];
                        let send: Vec<usize> = (0..3)
                            .flat_map(|dst| std::iter::repeat(10 * rank + dst).take(rank + 1))
                            .collect();
                        let recv_counts = comm.exchange_counts(&send_counts).unwrap();
                        assert_eq!(recv_counts, vec![1, 2, 3]);
                        let mut recv = vec![0; 6];
                        comm.all_to_all_v(&send, &send_counts, &mut recv, &recv_counts)
                            .unwrap();
                        assert_eq!(comm.all_reduce_max(rank).unwrap(), 2);
                        assert_eq!(comm.all_reduce_sum(rank).unwrap(), 3);
                        recv
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(results[0], vec![0, 10, 10, 20, 20, 20]);
        assert_eq!(results[2], vec![2, 12, 12, 22, 22, 22]);
    }
}
