//! Passive-port allocator over a fixed range `[min, max)`.
//!
//! `assign` scans for the first free slot and probe-binds the port before
//! committing it, so a port squatted by another process is skipped. The
//! probe runs inside the serialized section: check-and-reserve must be
//! atomic with respect to concurrent callers.

use std::net::TcpListener;
use std::sync::Mutex;

use log::{debug, trace};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PortPoolError {
    #[error("no more ports available")]
    Exhausted,
}

#[derive(Debug)]
struct PoolState {
    assigned: Vec<bool>,
    free: usize,
    closed: bool,
}

#[derive(Debug)]
pub struct PortPool {
    min_port: u16,
    max_port: u16,
    state: Mutex<PoolState>,
}

impl PortPool {
    pub fn new(min_port: u16, max_port: u16) -> Self {
        debug!("port pool created over [{}, {})", min_port, max_port);
        let slots = (max_port - min_port) as usize;
        Self {
            min_port,
            max_port,
            state: Mutex::new(PoolState {
                assigned: vec![false; slots],
                free: slots,
                closed: false,
            }),
        }
    }

    /// Non-blocking: a caller that cannot be served gets `Exhausted`
    /// rather than waiting for a release.
    pub fn assign(&self) -> Result<u16, PortPoolError> {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            panic!("assign called on a closed port pool");
        }

        for slot in 0..state.assigned.len() {
            if state.assigned[slot] {
                continue;
            }
            let port = self.min_port + slot as u16;
            // Confirm the port is actually free to listen on.
            match TcpListener::bind(("0.0.0.0", port)) {
                Ok(probe) => {
                    drop(probe);
                    state.assigned[slot] = true;
                    state.free -= 1;
                    trace!("assigned passive port {}", port);
                    return Ok(port);
                }
                Err(_) => continue,
            }
        }

        trace!(
            "no assignable passive port ({} of {} slots in use)",
            state.assigned.len() - state.free,
            state.assigned.len()
        );
        Err(PortPoolError::Exhausted)
    }

    pub fn release(&self, port: u16) {
        assert!(
            port >= self.min_port && port < self.max_port,
            "released port {} is outside the pool range",
            port
        );

        let mut state = self.state.lock().unwrap();
        if state.closed {
            panic!("release called on a closed port pool");
        }

        let slot = (port - self.min_port) as usize;
        if state.assigned[slot] {
            state.assigned[slot] = false;
            state.free += 1;
            trace!("released passive port {}", port);
        }
    }

    pub fn close(&self) {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            panic!("close called on a closed port pool");
        }
        state.closed = true;
        debug!("port pool over [{}, {}) closed", self.min_port, self.max_port);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creation_and_close() {
        let pool = PortPool::new(47100, 47110);
        pool.close();
    }

    #[test]
    #[should_panic(expected = "assign called on a closed port pool")]
    fn assign_after_close_panics() {
        let pool = PortPool::new(47110, 47120);
        pool.close();
        let _ = pool.assign();
    }

    #[test]
    #[should_panic(expected = "release called on a closed port pool")]
    fn release_after_close_panics() {
        let pool = PortPool::new(47120, 47130);
        pool.close();
        pool.release(47120);
    }

    #[test]
    #[should_panic(expected = "close called on a closed port pool")]
    fn double_close_panics() {
        let pool = PortPool::new(47130, 47140);
        pool.close();
        pool.close();
    }

    #[test]
    fn assigns_ascending_ports() {
        let pool = PortPool::new(47140, 47150);

        assert_eq!(pool.assign().unwrap(), 47140);
        assert_eq!(pool.assign().unwrap(), 47141);
        assert_eq!(pool.assign().unwrap(), 47142);

        pool.close();
    }

    #[test]
    fn released_port_is_reused_first() {
        let pool = PortPool::new(47150, 47160);

        assert_eq!(pool.assign().unwrap(), 47150);
        assert_eq!(pool.assign().unwrap(), 47151);

        pool.release(47150);
        assert_eq!(pool.assign().unwrap(), 47150);

        pool.close();
    }

    #[test]
    fn exhausted_pool_errors() {
        let pool = PortPool::new(47160, 47162);

        pool.assign().unwrap();
        pool.assign().unwrap();
        assert!(matches!(pool.assign(), Err(PortPoolError::Exhausted)));

        pool.close();
    }

    #[test]
    fn probe_skips_ports_bound_elsewhere() {
        let squatter = TcpListener::bind(("0.0.0.0", 47170)).unwrap();
        let pool = PortPool::new(47170, 47180);

        assert_eq!(pool.assign().unwrap(), 47171);

        drop(squatter);
        pool.close();
    }
}
