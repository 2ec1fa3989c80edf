//! Precomputed all-to-all routes.
//!
//! A plan is agreed on once: every rank sends the target states it will
//! contribute to, and receivers resolve them to local indices. Afterwards
//! only amplitudes travel, in the same order.

use crate::bits::BitState;
use crate::comm::Communicator;
use crate::error::{EdError, Result};
use num_complex::Complex64;

/// One contribution: `coeff * x[source]` lands on `target` at its owner.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Route<B> {
    pub source: usize,
    pub target: B,
    pub coeff: Complex64,
}

/// Send/receive scratch shared by every plan of one application.
pub(crate) struct Buffers {
    send: Vec<Complex64>,
    recv: Vec<Complex64>,
}

impl Buffers {
    pub(crate) fn new(len: usize) -> Self {
        let zero = Complex64::new(0.0, 0.0);
        Self {
            send: vec![zero; len],
            recv: vec![zero; len],
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ExchangePlan {
    send_counts: Vec<usize>,
    /// Source indices grouped by destination rank.
    send_idx: Vec<usize>,
    scale: Vec<Complex64>,
    recv_counts: Vec<usize>,
    /// Local index of every received item, grouped by source rank.
    recv_idx: Vec<usize>,
}

impl ExchangePlan {
    /// Collective. `routes[dst]` lists what this rank sends to `dst`;
    /// `resolve` maps a received target state to its local index.
    pub(crate) fn build<B, C, R>(comm: &C, routes: Vec<Vec<Route<B>>>, resolve: R) -> Result<Self>
    where
        B: BitState,
        C: Communicator,
        R: Fn(B) -> Option<usize>,
    {
        if routes.len() != comm.size() {
            return Err(EdError::Communication(format!(
                "routes for {} ranks, communicator has {}",
                routes.len(),
                comm.size()
            )));
        }
        let send_counts: Vec<usize> = routes.iter().map(Vec::len).collect();
        let recv_counts = comm.exchange_counts(&send_counts)?;

        let total: usize = send_counts.iter().sum();
        let mut send_idx = Vec::with_capacity(total);
        let mut scale = Vec::with_capacity(total);
        let mut targets = Vec::with_capacity(total);
        for route in routes.into_iter().flatten() {
            send_idx.push(route.source);
            scale.push(route.coeff);
            targets.push(route.target);
        }

        let mut received = vec![B::ZERO; recv_counts.iter().sum()];
        comm.all_to_all_v(&targets, &send_counts, &mut received, &recv_counts)?;

        let recv_idx = received
            .iter()
            .map(|&s| {
                resolve(s).ok_or_else(|| {
                    EdError::Communication(format!(
                        "rank {} received state {s:b} it does not own",
                        comm.rank()
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        log::debug!(
            "rank {}: exchange plan sends {} and receives {} amplitudes",
            comm.rank(),
            send_idx.len(),
            recv_idx.len()
        );
        Ok(Self {
            send_counts,
            send_idx,
            scale,
            recv_counts,
            recv_idx,
        })
    }

    /// Scratch length this plan needs on this rank.
    pub(crate) fn capacity(&self) -> usize {
        self.send_idx.len().max(self.recv_idx.len())
    }

    /// Collective. `dst[target] += coeff * src[source]` for every route.
    pub(crate) fn forward<C: Communicator>(
        &self,
        comm: &C,
        src: &[Complex64],
        dst: &mut [Complex64],
        buffers: &mut Buffers,
    ) -> Result<()> {
        let send = &mut buffers.send[..self.send_idx.len()];
        for ((slot, &i), &c) in send.iter_mut().zip(&self.send_idx).zip(&self.scale) {
            *slot = c * src[i];
        }
        let recv = &mut buffers.recv[..self.recv_idx.len()];
        comm.all_to_all_v(send, &self.send_counts, recv, &self.recv_counts)?;
        for (&v, &i) in recv.iter().zip(&self.recv_idx) {
            dst[i] += v;
        }
        Ok(())
    }

    /// Collective adjoint of [`forward`](Self::forward):
    /// `dst[source] += conj(coeff) * src[target]`.
    pub(crate) fn backward<C: Communicator>(
        &self,
        comm: &C,
        src: &[Complex64],
        dst: &mut [Complex64],
        buffers: &mut Buffers,
    ) -> Result<()> {
        let send = &mut buffers.send[..self.recv_idx.len()];
        for (slot, &i) in send.iter_mut().zip(&self.recv_idx) {
            *slot = src[i];
        }
        let recv = &mut buffers.recv[..self.send_idx.len()];
        comm.all_to_all_v(send, &self.recv_counts, recv, &self.send_counts)?;
        for ((&v, &i), &c) in recv.iter().zip(&self.send_idx).zip(&self.scale) {
            dst[i] += c.conj() * v;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::LocalComm;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    #[test]
    fn test_local_plan_roundtrip() {
        // Route x[i] to the slot of state 3 - i with weight i.
        let routes = vec![(0..4usize)
            .map(|i| Route {
                source: i,
                target: (3 - i) as u16,
                coeff: c(i as f64, 1.0),
            })
            .collect()];
        let plan = ExchangePlan::build(&LocalComm, routes, |s: u16| Some(s as usize)).unwrap();
        assert_eq!(plan.capacity(), 4);

        let mut buffers = Buffers::new(plan.capacity());
        let x = vec![c(1.0, 0.0), c(2.0, 0.0), c(3.0, 0.0), c(4.0, 0.0)];
        let mut y = vec![c(0.0, 0.0); 4];
        plan.forward(&LocalComm, &x, &mut y, &mut buffers).unwrap();
        assert_eq!(y[3], c(0.0, 1.0));
        assert_eq!(y[0], c(12.0, 4.0));

        // <y, P x> == <P† y, x>
        let mut back = vec![c(0.0, 0.0); 4];
        plan.backward(&LocalComm, &y, &mut back, &mut buffers).unwrap();
        let lhs: Complex64 = y.iter().zip(&y).map(|(a, b)| a.conj() * b).sum();
        let rhs: Complex64 = back.iter().zip(&x).map(|(a, b)| a.conj() * b).sum();
        assert!((lhs - rhs).norm() < 1e-12);
    }

    #[test]
    fn test_unowned_target_is_rejected() {
        let routes = vec![vec![Route {
            source: 0,
            target: 9u16,
            coeff: c(1.0, 0.0),
        }]];
        let result = ExchangePlan::build(&LocalComm, routes, |_| None);
        assert!(matches!(result, Err(EdError::Communication(_))));
    }
}
