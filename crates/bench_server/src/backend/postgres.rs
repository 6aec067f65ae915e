//! Postgres backend over a fixed set of pipelined connections.
//!
//! Reads share their connections between concurrent requests. Update
//! batches run inside a transaction, which needs a connection of its own
//! for the duration, so writes go through a separate set of clients that
//! are checked out one batch at a time.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::future::try_join_all;
use tokio::sync::Mutex;
use tokio_postgres::{Client, NoTls, Row, Statement};
use tracing::{debug, error, info};

use super::{Backend, BackendError};
use crate::batch::UpdateBatch;
use crate::model::{Fortune, World};

const SELECT_WORLD: &str = "SELECT id, randomNumber FROM World WHERE id = $1";
const SELECT_WORLDS: &str = "SELECT id, randomNumber FROM World LIMIT $1";
const SELECT_FORTUNES: &str = "SELECT id, message FROM Fortune";
const UPDATE_WORLD: &str = "UPDATE World SET randomNumber = $1 WHERE id = $2";

struct PgConn {
    client: Client,
    select_world: Statement,
    select_worlds: Statement,
    select_fortunes: Statement,
    update_world: Statement,
}

impl PgConn {
    async fn connect(dsn: &str) -> Result<Self, BackendError> {
        let (client, connection) = tokio_postgres::connect(dsn, NoTls).await?;
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                error!("Postgres connection error: {err}");
            }
        });

        let select_world = client.prepare(SELECT_WORLD).await?;
        let select_worlds = client.prepare(SELECT_WORLDS).await?;
        let select_fortunes = client.prepare(SELECT_FORTUNES).await?;
        let update_world = client.prepare(UPDATE_WORLD).await?;

        Ok(Self {
            client,
            select_world,
            select_worlds,
            select_fortunes,
            update_world,
        })
    }
}

/// Round-robins reads over `connections` shared clients. Each client
/// pipelines concurrent queries, so a small number of connections goes a
/// long way. Another `connections` clients carry the update transactions.
pub struct PgBackend {
    conns: Box<[PgConn]>,
    writers: Box<[Mutex<PgConn>]>,
    next: AtomicUsize,
    next_writer: AtomicUsize,
}

impl PgBackend {
    pub async fn connect(dsn: &str, connections: usize) -> Result<Self, BackendError> {
        let connections = connections.max(1);
        let mut conns = Vec::with_capacity(connections);
        let mut writers = Vec::with_capacity(connections);
        for _ in 0..connections {
            conns.push(PgConn::connect(dsn).await?);
            writers.push(Mutex::new(PgConn::connect(dsn).await?));
        }
        info!(
            "🐘 Connected {} Postgres reader(s) and {} writer(s)",
            conns.len(),
            writers.len()
        );
        Ok(Self {
            conns: conns.into_boxed_slice(),
            writers: writers.into_boxed_slice(),
            next: AtomicUsize::new(0),
            next_writer: AtomicUsize::new(0),
        })
    }

    fn conn(&self) -> &PgConn {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.conns.len();
        &self.conns[index]
    }

    fn writer(&self) -> &Mutex<PgConn> {
        let index = self.next_writer.fetch_add(1, Ordering::Relaxed) % self.writers.len();
        &self.writers[index]
    }
}

fn world_from_row(row: &Row) -> Result<World, BackendError> {
    Ok(World {
        id: row.try_get(0)?,
        random_number: row.try_get(1)?,
    })
}

#[async_trait]
impl Backend for PgBackend {
    async fn fetch_world(&self, id: i32) -> Result<World, BackendError> {
        let conn = self.conn();
        let row = conn.client.query_one(&conn.select_world, &[&id]).await?;
        world_from_row(&row)
    }

    async fn fetch_worlds(&self, limit: usize) -> Result<Vec<World>, BackendError> {
        let conn = self.conn();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = conn.client.query(&conn.select_worlds, &[&limit]).await?;
        rows.iter().map(world_from_row).collect()
    }

    async fn fetch_fortunes(&self, out: &mut Vec<Fortune>) -> Result<(), BackendError> {
        let conn = self.conn();
        let rows = conn.client.query(&conn.select_fortunes, &[]).await?;
        out.reserve(rows.len());
        for row in &rows {
            let message: String = row.try_get(1)?;
            out.push(Fortune::new(row.try_get(0)?, message));
        }
        Ok(())
    }

    async fn submit_updates(&self, batch: &UpdateBatch<'_>) -> Result<(), BackendError> {
        let mut writer = self.writer().lock().await;
        let PgConn {
            client,
            update_world,
            ..
        } = &mut *writer;

        // Statements are pipelined in batch order and the server runs them
        // in that order, so row locks are taken by ascending id and held
        // until commit. Dropping the transaction on error rolls it back.
        let transaction = client.transaction().await?;
        let statement = &*update_world;
        let tx = &transaction;
        try_join_all(batch.updates().map(|(random_number, id)| async move {
            match tx.execute(statement, &[&random_number, &id]).await? {
                0 => Err(BackendError::WorldNotFound(id)),
                _ => Ok(()),
            }
        }))
        .await?;
        transaction.commit().await?;

        debug!(updates = batch.len(), "committed update batch");
        Ok(())
    }
}
