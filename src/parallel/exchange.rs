//! Halo exchange.
//!
//! Refreshes neighbour-rank ghost cells of a per-cell field: pack the send
//! list of every channel, post all sends, then complete the receives in
//! channel order and unpack. On return every reachable ghost entry equals
//! the peer's owned value at the moment the peer packed its buffer.
//!
//! Buffers are sized once at construction and reused every step.

use crate::mesh::Mesh2D;
use crate::state::CellField;

use super::transport::{Transport, TransportError};

struct HaloChannel {
    peer: usize,
    send_cells: Vec<usize>,
    recv_cells: Vec<usize>,
    send_buf: Vec<f64>,
    recv_buf: Vec<f64>,
}

/// Bidirectional ghost-cell synchronizer for one mesh and variable count.
pub struct HaloExchanger {
    n_vars: usize,
    channels: Vec<HaloChannel>,
}

impl HaloExchanger {
    /// Build the exchanger, allocating one fixed send and receive buffer
    /// per channel.
    pub fn new(mesh: &Mesh2D, n_vars: usize) -> Self {
        let channels = mesh
            .channels
            .iter()
            .map(|spec| HaloChannel {
                peer: spec.peer,
                send_cells: spec.send_cells.clone(),
                recv_cells: spec.recv_cells.clone(),
                send_buf: vec![0.0; n_vars * spec.send_cells.len()],
                recv_buf: vec![0.0; n_vars * spec.recv_cells.len()],
            })
            .collect();
        Self { n_vars, channels }
    }

    /// Number of neighbour ranks.
    pub fn n_channels(&self) -> usize {
        self.channels.len()
    }

    /// Cross-check channel sizes against every peer.
    ///
    /// Mismatched send/receive lists are a partitioning bug; they are
    /// detected here, at startup, instead of corrupting fields mid-run.
    pub fn validate<T: Transport>(&self, transport: &mut T) -> Result<(), TransportError> {
        if self.channels.is_empty() {
            return Ok(());
        }
        let local: Vec<[f64; 2]> = self
            .channels
            .iter()
            .map(|c| [c.send_cells.len() as f64, c.recv_cells.len() as f64])
            .collect();
        let mut remote = vec![[0.0f64; 2]; self.channels.len()];

        let sends: Vec<(usize, &[f64])> = self
            .channels
            .iter()
            .zip(&local)
            .map(|(c, counts)| (c.peer, &counts[..]))
            .collect();
        let mut recvs: Vec<(usize, &mut [f64])> = self
            .channels
            .iter()
            .zip(remote.iter_mut())
            .map(|(c, counts)| (c.peer, &mut counts[..]))
            .collect();
        transport.exchange(&sends, &mut recvs)?;

        for (channel, peer_counts) in self.channels.iter().zip(&remote) {
            let peer_send = peer_counts[0] as usize;
            let peer_recv = peer_counts[1] as usize;
            if peer_send != channel.recv_cells.len() || peer_recv != channel.send_cells.len() {
                return Err(TransportError::ChannelMismatch {
                    peer: channel.peer,
                    local_send: channel.send_cells.len(),
                    local_recv: channel.recv_cells.len(),
                    peer_send,
                    peer_recv,
                });
            }
        }
        Ok(())
    }

    /// Synchronize ghost entries of `field` with every neighbour rank.
    pub fn exchange<T: Transport>(
        &mut self,
        field: &mut CellField,
        transport: &mut T,
    ) -> Result<(), TransportError> {
        if self.channels.is_empty() {
            return Ok(());
        }
        let n_vars = self.n_vars;
        debug_assert_eq!(field.n_vars(), n_vars);

        for channel in &mut self.channels {
            for (slot, &cell) in channel.send_cells.iter().enumerate() {
                channel.send_buf[n_vars * slot..n_vars * (slot + 1)]
                    .copy_from_slice(field.at(cell));
            }
        }

        let mut sends = Vec::with_capacity(self.channels.len());
        let mut recvs = Vec::with_capacity(self.channels.len());
        for channel in &mut self.channels {
            let HaloChannel {
                peer,
                send_buf,
                recv_buf,
                ..
            } = channel;
            sends.push((*peer, send_buf.as_slice()));
            recvs.push((*peer, recv_buf.as_mut_slice()));
        }
        transport.exchange(&sends, &mut recvs)?;

        for channel in &self.channels {
            for (slot, &cell) in channel.recv_cells.iter().enumerate() {
                field
                    .at_mut(cell)
                    .copy_from_slice(&channel.recv_buf[n_vars * slot..n_vars * (slot + 1)]);
            }
        }
        Ok(())
    }
}
