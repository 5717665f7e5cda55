//! Cross-rank reductions.
//!
//! Gather-to-root, combine, scatter-back: rank 0 is the reduction root.
//! This pattern only needs point-to-point sends and receives, so it works
//! on every transport; backends with native collectives may substitute
//! them without changing observable results.

use super::transport::{Transport, TransportError};

/// Component-wise sum of `local` across all ranks.
///
/// Every rank returns the same totals.
pub fn reduce_sum<T: Transport>(
    local: &[f64],
    transport: &mut T,
) -> Result<Vec<f64>, TransportError> {
    let mut result = local.to_vec();
    if transport.size() == 1 {
        return Ok(result);
    }
    if transport.rank() == 0 {
        let mut incoming = vec![0.0; local.len()];
        for peer in 1..transport.size() {
            transport.recv(peer, &mut incoming)?;
            for (total, value) in result.iter_mut().zip(&incoming) {
                *total += value;
            }
        }
        for peer in 1..transport.size() {
            transport.send(peer, &result)?;
        }
    } else {
        transport.send(0, local)?;
        transport.recv(0, &mut result)?;
    }
    Ok(result)
}

/// Global minimum of a scalar across all ranks.
///
/// Every rank returns the same minimum, which is less than or equal to its
/// own contribution.
pub fn reduce_min<T: Transport>(local: f64, transport: &mut T) -> Result<f64, TransportError> {
    let mut result = [local];
    if transport.size() == 1 {
        return Ok(local);
    }
    if transport.rank() == 0 {
        let mut incoming = [0.0];
        for peer in 1..transport.size() {
            transport.recv(peer, &mut incoming)?;
            result[0] = result[0].min(incoming[0]);
        }
        for peer in 1..transport.size() {
            transport.send(peer, &result)?;
        }
    } else {
        transport.send(0, &result)?;
        transport.recv(0, &mut result)?;
    }
    Ok(result[0])
}
