use crate::server::database::connection::{connect, Connection};
use crate::server::database::pool_config::PoolConfig;
use anyhow::Error;
use log::{error, info};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time;
use tokio_postgres::Client;

pub(crate) struct CommonPool<C> {
    /// pool name
    name: String,
    /// idle connections, handed out in a FIFO manner
    connections: Mutex<VecDeque<C>>,
    /// one permit per idle connection
    permits: Semaphore,
}

pub(crate) struct Pool<C>(Arc<CommonPool<C>>);

impl<C> Clone for Pool<C> {
    fn clone(&self) -> Pool<C> {
        Pool(self.0.clone())
    }
}

impl Pool<Client> {
    /// open `config.size` connections concurrently
    pub async fn connect(config: &PoolConfig) -> Result<Self, Error> {
        let pool = Self::empty(config.name);
        let mut set = JoinSet::new();
        for _ in 0..config.size {
            let conn_str = config.conn_str.clone();
            set.spawn(async move { connect(conn_str.as_str()).await });
        }
        while let Some(res) = set.join_next().await {
            let client = res??;
            pool.add(client);
        }
        info!("pool={} ready with {} connections", config.name, pool.idle());
        Ok(pool)
    }
}

impl<C> Pool<C> {
    pub fn empty(name: &str) -> Self {
        Self(Arc::new(CommonPool {
            name: name.to_string(),
            connections: Mutex::new(VecDeque::new()),
            permits: Semaphore::new(0),
        }))
    }

    pub fn add(&self, client: C) {
        match self.0.connections.lock() {
            Ok(mut connections) => connections.push_back(client),
            Err(poisoned) => poisoned.into_inner().push_back(client),
        }
        self.0.permits.add_permits(1);
    }

    pub fn idle(&self) -> usize {
        self.0.permits.available_permits()
    }

    /// acquire a connection, bail out with `None` once `timeout` passes
    pub async fn acquire(&self, timeout: Duration) -> Option<Connection<C>> {
        match time::timeout(timeout, self.0.permits.acquire()).await {
            Ok(Ok(permit)) => permit.forget(),
            Ok(Err(_)) => return None,
            Err(_) => {
                error!(
                    "pool={} timed out to acquire a connection after {}ms",
                    self.0.name,
                    timeout.as_millis()
                );
                return None;
            }
        }
        let client = match self.0.connections.lock() {
            Ok(mut connections) => connections.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        };
        client.map(|client| Connection::new(client, self.clone()))
    }

    /// give a connection back, called when a `Connection` drops
    pub(crate) fn release(&self, client: C) {
        self.add(client);
    }
}
