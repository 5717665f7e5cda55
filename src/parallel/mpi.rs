//! MPI-backed transport (rsmpi).
//!
//! Maps the [`Transport`] contract onto `MPI_COMM_WORLD`. The exchange
//! path posts immediate sends inside a request scope, completes the
//! blocking receives, then waits on every send request before returning;
//! send buffers are therefore never reused while a transfer is in flight.

use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

use super::transport::{Transport, TransportError};

/// Transport over `MPI_COMM_WORLD`.
///
/// Holds the MPI universe for the lifetime of the transport; dropping it
/// finalizes the environment.
pub struct MpiTransport {
    _universe: mpi::environment::Universe,
    world: SimpleCommunicator,
    rank: usize,
    size: usize,
}

impl MpiTransport {
    /// Initialize the MPI environment and bind to the world communicator.
    ///
    /// Fails if MPI was already initialized in this process.
    pub fn initialize() -> Result<Self, TransportError> {
        let universe = mpi::initialize().ok_or(TransportError::InitFailed)?;
        let world = universe.world();
        let rank = world.rank() as usize;
        let size = world.size() as usize;
        Ok(Self {
            _universe: universe,
            world,
            rank,
            size,
        })
    }
}

impl Transport for MpiTransport {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send(&mut self, peer: usize, data: &[f64]) -> Result<(), TransportError> {
        if peer >= self.size {
            return Err(TransportError::NoSuchPeer {
                rank: self.rank,
                peer,
            });
        }
        self.world.process_at_rank(peer as i32).send(data);
        Ok(())
    }

    fn recv(&mut self, peer: usize, buf: &mut [f64]) -> Result<(), TransportError> {
        if peer >= self.size {
            return Err(TransportError::NoSuchPeer {
                rank: self.rank,
                peer,
            });
        }
        let status = self.world.process_at_rank(peer as i32).receive_into(buf);
        let received = status.count(f64::equivalent_datatype()) as usize;
        if received != buf.len() {
            return Err(TransportError::SizeMismatch {
                peer,
                expected: buf.len(),
                actual: received,
            });
        }
        Ok(())
    }

    fn exchange(
        &mut self,
        sends: &[(usize, &[f64])],
        recvs: &mut [(usize, &mut [f64])],
    ) -> Result<(), TransportError> {
        for &(peer, _) in sends.iter() {
            if peer >= self.size {
                return Err(TransportError::NoSuchPeer {
                    rank: self.rank,
                    peer,
                });
            }
        }
        mpi::request::scope(|scope| {
            let requests: Vec<_> = sends
                .iter()
                .map(|(peer, data)| {
                    self.world
                        .process_at_rank(*peer as i32)
                        .immediate_send(scope, *data)
                })
                .collect();
            for (peer, buf) in recvs.iter_mut() {
                self.world.process_at_rank(*peer as i32).receive_into(*buf);
            }
            for request in requests {
                request.wait();
            }
        });
        Ok(())
    }
}
