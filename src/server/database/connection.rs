use crate::server::database::pool::Pool;
use anyhow::{Context, Error};
use log::error;
use std::ops::{Deref, DerefMut};
use tokio_postgres::{Client, NoTls};

/// A pooled client, goes back to its pool on drop
pub(crate) struct Connection<C> {
    client: Option<C>,
    pool: Pool<C>,
}

impl<C> Connection<C> {
    pub fn new(client: C, pool: Pool<C>) -> Self {
        Self {
            client: Some(client),
            pool,
        }
    }
}

impl<C> Deref for Connection<C> {
    type Target = C;

    fn deref(&self) -> &C {
        match self.client.as_ref() {
            Some(client) => client,
            None => unreachable!("client is only taken on drop"),
        }
    }
}

impl<C> DerefMut for Connection<C> {
    fn deref_mut(&mut self) -> &mut C {
        match self.client.as_mut() {
            Some(client) => client,
            None => unreachable!("client is only taken on drop"),
        }
    }
}

impl<C> Drop for Connection<C> {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            self.pool.release(client);
        }
    }
}

pub(crate) async fn connect(conn_str: &str) -> Result<Client, Error> {
    let (client, conn) = tokio_postgres::connect(conn_str, NoTls)
        .await
        .context("failed to create connection")?;
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            error!("connection returned error and aborted, {}", e);
        }
    });
    Ok(client)
}
