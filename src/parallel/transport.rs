//! Rank-to-rank message transport.
//!
//! The engine is generic over a [`Transport`]: non-blocking sends, blocking
//! receives, reliable and in-order between any two ranks. Three
//! implementations exist:
//! - [`SerialTransport`] for single-rank runs (no messages ever move),
//! - [`LocalRank`] / [`LocalCluster`] for in-process multi-rank runs, one
//!   OS thread per rank with per-pair channels — the reference transport
//!   used by the domain-decomposition tests,
//! - `MpiTransport` (feature `mpi`) backed by rsmpi.

use std::sync::mpsc::{channel, Receiver, Sender};

use thiserror::Error;

/// Transport failure. All variants are fatal for the run.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer rank does not exist for this transport.
    #[error("rank {rank} has no peer {peer}")]
    NoSuchPeer { rank: usize, peer: usize },

    /// The peer disappeared mid-run.
    #[error("peer {peer} disconnected")]
    Disconnected { peer: usize },

    /// A message did not have the expected length.
    #[error("message from rank {peer}: expected {expected} values, got {actual}")]
    SizeMismatch {
        peer: usize,
        expected: usize,
        actual: usize,
    },

    /// Halo channel descriptors disagree between paired ranks.
    #[error(
        "halo channel with rank {peer} is asymmetric: \
         local (send {local_send}, recv {local_recv}) vs \
         peer (send {peer_send}, recv {peer_recv})"
    )]
    ChannelMismatch {
        peer: usize,
        local_send: usize,
        local_recv: usize,
        peer_send: usize,
        peer_recv: usize,
    },

    /// The message-passing environment could not be initialized.
    #[error("transport initialization failed")]
    InitFailed,
}

/// Reliable, in-order message passing between ranks.
pub trait Transport {
    /// This process's rank.
    fn rank(&self) -> usize;

    /// Total number of ranks.
    fn size(&self) -> usize;

    /// Queue `data` for delivery to `peer` without blocking. The data is
    /// copied out (or the send completed) before the call returns, so the
    /// caller may reuse its buffer immediately.
    fn send(&mut self, peer: usize, data: &[f64]) -> Result<(), TransportError>;

    /// Blocking receive of exactly `buf.len()` values from `peer`.
    fn recv(&mut self, peer: usize, buf: &mut [f64]) -> Result<(), TransportError>;

    /// Post every send, then complete every receive.
    ///
    /// Backends with true non-blocking sends override this to overlap the
    /// two phases; the default issues them in order, which is correct for
    /// transports whose `send` never blocks.
    fn exchange(
        &mut self,
        sends: &[(usize, &[f64])],
        recvs: &mut [(usize, &mut [f64])],
    ) -> Result<(), TransportError> {
        for (peer, data) in sends {
            self.send(*peer, data)?;
        }
        for (peer, buf) in recvs.iter_mut() {
            self.recv(*peer, buf)?;
        }
        Ok(())
    }
}

// =============================================================================
// Serial transport
// =============================================================================

/// The one-rank transport: rank 0 of 1, no peers.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialTransport;

impl Transport for SerialTransport {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn send(&mut self, peer: usize, _data: &[f64]) -> Result<(), TransportError> {
        Err(TransportError::NoSuchPeer { rank: 0, peer })
    }

    fn recv(&mut self, peer: usize, _buf: &mut [f64]) -> Result<(), TransportError> {
        Err(TransportError::NoSuchPeer { rank: 0, peer })
    }
}

// =============================================================================
// In-process cluster
// =============================================================================

/// One rank of an in-process cluster.
///
/// Every ordered rank pair owns a dedicated channel, so receives can filter
/// by source and messages between two ranks arrive in send order. Channel
/// sends never block, which makes them a faithful stand-in for buffered
/// non-blocking sends.
pub struct LocalRank {
    rank: usize,
    size: usize,
    senders: Vec<Option<Sender<Vec<f64>>>>,
    receivers: Vec<Option<Receiver<Vec<f64>>>>,
}

impl Transport for LocalRank {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send(&mut self, peer: usize, data: &[f64]) -> Result<(), TransportError> {
        let sender = self
            .senders
            .get(peer)
            .and_then(|s| s.as_ref())
            .ok_or(TransportError::NoSuchPeer {
                rank: self.rank,
                peer,
            })?;
        sender
            .send(data.to_vec())
            .map_err(|_| TransportError::Disconnected { peer })
    }

    fn recv(&mut self, peer: usize, buf: &mut [f64]) -> Result<(), TransportError> {
        let receiver = self
            .receivers
            .get(peer)
            .and_then(|r| r.as_ref())
            .ok_or(TransportError::NoSuchPeer {
                rank: self.rank,
                peer,
            })?;
        let message = receiver
            .recv()
            .map_err(|_| TransportError::Disconnected { peer })?;
        if message.len() != buf.len() {
            return Err(TransportError::SizeMismatch {
                peer,
                expected: buf.len(),
                actual: message.len(),
            });
        }
        buf.copy_from_slice(&message);
        Ok(())
    }
}

/// Builder for in-process rank groups.
pub struct LocalCluster;

impl LocalCluster {
    /// Build the transports of an `n_ranks` cluster.
    pub fn ranks(n_ranks: usize) -> Vec<LocalRank> {
        assert!(n_ranks >= 1, "need at least one rank");
        let mut senders: Vec<Vec<Option<Sender<Vec<f64>>>>> = (0..n_ranks)
            .map(|_| (0..n_ranks).map(|_| None).collect())
            .collect();
        let mut receivers: Vec<Vec<Option<Receiver<Vec<f64>>>>> = (0..n_ranks)
            .map(|_| (0..n_ranks).map(|_| None).collect())
            .collect();

        for from in 0..n_ranks {
            for to in 0..n_ranks {
                if from != to {
                    let (tx, rx) = channel();
                    senders[from][to] = Some(tx);
                    receivers[to][from] = Some(rx);
                }
            }
        }

        senders
            .into_iter()
            .zip(receivers)
            .enumerate()
            .map(|(rank, (senders, receivers))| LocalRank {
                rank,
                size: n_ranks,
                senders,
                receivers,
            })
            .collect()
    }

    /// Run `f` once per rank, each on its own OS thread, and collect the
    /// results in rank order.
    pub fn run<R, F>(n_ranks: usize, f: F) -> Vec<R>
    where
        R: Send,
        F: Fn(LocalRank) -> R + Send + Sync,
    {
        let ranks = Self::ranks(n_ranks);
        std::thread::scope(|scope| {
            let handles: Vec<_> = ranks
                .into_iter()
                .map(|rank| {
                    let f = &f;
                    scope.spawn(move || f(rank))
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().expect("rank thread panicked"))
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_transport_shape() {
        let mut transport = SerialTransport;
        assert_eq!(transport.rank(), 0);
        assert_eq!(transport.size(), 1);
        assert!(matches!(
            transport.send(1, &[1.0]),
            Err(TransportError::NoSuchPeer { .. })
        ));
    }

    #[test]
    fn test_local_cluster_pairwise_messages() {
        let results = LocalCluster::run(3, |mut transport| {
            let rank = transport.rank();
            // Everyone sends its rank to everyone else, then receives.
            for peer in 0..transport.size() {
                if peer != rank {
                    transport.send(peer, &[rank as f64]).unwrap();
                }
            }
            let mut sum = 0.0;
            let mut buf = [0.0];
            for peer in 0..transport.size() {
                if peer != rank {
                    transport.recv(peer, &mut buf).unwrap();
                    assert_eq!(buf[0], peer as f64, "message source must match");
                    sum += buf[0];
                }
            }
            sum
        });
        assert_eq!(results, vec![3.0, 2.0, 1.0]);
    }

    #[test]
    fn test_local_cluster_in_order_delivery() {
        let results = LocalCluster::run(2, |mut transport| {
            if transport.rank() == 0 {
                for value in 0..10 {
                    transport.send(1, &[value as f64]).unwrap();
                }
                0.0
            } else {
                let mut buf = [0.0];
                for expected in 0..10 {
                    transport.recv(0, &mut buf).unwrap();
                    assert_eq!(buf[0], expected as f64);
                }
                buf[0]
            }
        });
        assert_eq!(results[1], 9.0);
    }

    #[test]
    fn test_size_mismatch_detected() {
        LocalCluster::run(2, |mut transport| {
            if transport.rank() == 0 {
                transport.send(1, &[1.0, 2.0, 3.0]).unwrap();
            } else {
                let mut buf = [0.0; 2];
                assert!(matches!(
                    transport.recv(0, &mut buf),
                    Err(TransportError::SizeMismatch {
                        expected: 2,
                        actual: 3,
                        ..
                    })
                ));
            }
        });
    }
}
