//! Per-process connection pool: a free list of live connections,
//! lazily opened, handed out as RAII guards. Releasing past the
//! retention cap closes the connection instead of queueing it.

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};

use parking_lot::Mutex;

use crate::backend::{BackendError, Connection};

pub type Connector = Box<dyn Fn() -> Result<Box<dyn Connection>, BackendError> + Send + Sync>;

pub struct ConnectionPool {
    connector: Connector,
    free: Mutex<VecDeque<Box<dyn Connection>>>,
    /// Soft cap on idle connections kept alive
    retain: usize,
}

impl ConnectionPool {
    pub fn new(connector: Connector, retain: usize) -> ConnectionPool {
        ConnectionPool {
            connector,
            free: Mutex::new(VecDeque::new()),
            retain: retain.max(1),
        }
    }

    /// Pop a free connection or open a fresh one.
    pub fn acquire(&self) -> Result<PooledConnection<'_>, BackendError> {
        let reused = self.free.lock().pop_front();
        let connection = match reused {
            Some(connection) => connection,
            None => (self.connector)()?,
        };
        Ok(PooledConnection {
            pool: self,
            connection: Some(connection),
        })
    }

    fn release(&self, connection: Box<dyn Connection>) {
        let mut free = self.free.lock();
        if free.len() < self.retain {
            free.push_back(connection);
        }
        // beyond the cap the connection drops here and closes
    }

    pub fn idle_count(&self) -> usize {
        self.free.lock().len()
    }
}

/// Guard handed out by [`ConnectionPool::acquire`]; returns the
/// connection on drop.
pub struct PooledConnection<'a> {
    pool: &'a ConnectionPool,
    connection: Option<Box<dyn Connection>>,
}

impl Deref for PooledConnection<'_> {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        self.connection
            .as_deref()
            .expect("connection taken before drop")
    }
}

impl DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.connection
            .as_deref_mut()
            .expect("connection taken before drop")
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.pool.release(connection);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::Recorder;

    fn pool(retain: usize) -> (Recorder, ConnectionPool) {
        let recorder = Recorder::new();
        let for_connector = recorder.clone();
        let connector: Connector =
            Box::new(move || Ok(Box::new(for_connector.connection()) as Box<dyn Connection>));
        (recorder, ConnectionPool::new(connector, retain))
    }

    #[test]
    fn released_connections_are_reused() {
        let (_, pool) = pool(4);
        {
            let _guard = pool.acquire().unwrap();
            assert_eq!(pool.idle_count(), 0);
        }
        assert_eq!(pool.idle_count(), 1);
        {
            let _guard = pool.acquire().unwrap();
            assert_eq!(pool.idle_count(), 0);
        }
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn retention_cap_closes_surplus_connections() {
        let (_, pool) = pool(1);
        let first = pool.acquire().unwrap();
        let second = pool.acquire().unwrap();
        drop(first);
        drop(second);
        assert_eq!(pool.idle_count(), 1);
    }
}
