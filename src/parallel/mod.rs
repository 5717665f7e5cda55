//! Message passing: transports, halo exchange and reductions.

mod exchange;
#[cfg(feature = "mpi")]
mod mpi;
mod reduce;
mod transport;

pub use exchange::HaloExchanger;
#[cfg(feature = "mpi")]
pub use mpi::MpiTransport;
pub use reduce::{reduce_min, reduce_sum};
pub use transport::{LocalCluster, LocalRank, SerialTransport, Transport, TransportError};
