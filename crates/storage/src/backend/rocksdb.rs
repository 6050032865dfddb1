//! RocksDB storage backend. One column family per [`Table`].

use std::{path::Path, sync::Arc};

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, MultiThreaded, Options,
    WriteBatch, WriteOptions,
};

use crate::api::{
    ALL_TABLES, Error, PrefixResult, StorageBackend, StorageReadView, StorageWriteBatch, Table,
};

type Db = DBWithThreadMode<MultiThreaded>;

fn cf_name(table: Table) -> &'static str {
    match table {
        Table::SlotHeaders => "slot_headers",
        Table::EpochSlots => "epoch_slots",
    }
}

fn column_family(db: &Db, table: Table) -> Result<Arc<BoundColumnFamily<'_>>, Error> {
    db.cf_handle(cf_name(table))
        .ok_or_else(|| format!("missing column family {}", cf_name(table)).into())
}

/// Persistent header storage.
#[derive(Clone)]
pub struct RocksDBBackend {
    db: Arc<Db>,
}

impl RocksDBBackend {
    /// Open or create the database at `path`, creating missing column families.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = ALL_TABLES
            .into_iter()
            .map(|table| ColumnFamilyDescriptor::new(cf_name(table), Options::default()));
        let db = Db::open_cf_descriptors(&opts, path, families)?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl StorageBackend for RocksDBBackend {
    fn begin_read(&self) -> Result<Box<dyn StorageReadView + '_>, Error> {
        Ok(Box::new(ReadView { db: &self.db }))
    }

    fn begin_write(&self) -> Result<Box<dyn StorageWriteBatch + 'static>, Error> {
        Ok(Box::new(PendingWrite {
            db: Arc::clone(&self.db),
            batch: WriteBatch::default(),
        }))
    }
}

struct ReadView<'a> {
    db: &'a Db,
}

impl StorageReadView for ReadView<'_> {
    fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        let cf = column_family(self.db, table)?;
        Ok(self.db.get_cf(&cf, key)?)
    }

    fn prefix_iterator(
        &self,
        table: Table,
        prefix: &[u8],
    ) -> Result<Box<dyn Iterator<Item = PrefixResult> + '_>, Error> {
        let cf = column_family(self.db, table)?;
        let prefix = prefix.to_vec();
        let entries = self
            .db
            .prefix_iterator_cf(&cf, &prefix)
            .map(|entry| entry.map_err(Error::from))
            // No prefix extractor is configured, so the iterator runs past the
            // prefix; errors are passed through.
            .take_while(move |entry| {
                entry
                    .as_ref()
                    .map_or(true, |(key, _)| key.starts_with(&prefix))
            });
        Ok(Box::new(entries))
    }
}

struct PendingWrite {
    db: Arc<Db>,
    batch: WriteBatch,
}

impl StorageWriteBatch for PendingWrite {
    fn put_batch(&mut self, table: Table, batch: Vec<(Vec<u8>, Vec<u8>)>) -> Result<(), Error> {
        let cf = column_family(&self.db, table)?;
        for (key, value) in batch {
            self.batch.put_cf(&cf, key, value);
        }
        Ok(())
    }

    fn delete_batch(&mut self, table: Table, keys: Vec<Vec<u8>>) -> Result<(), Error> {
        let cf = column_family(&self.db, table)?;
        for key in keys {
            self.batch.delete_cf(&cf, key);
        }
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), Error> {
        // Unsynced: a lost window is rebuilt by the next backfill.
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(false);
        let Self { db, batch } = *self;
        db.write_opt(batch, &write_opts)?;
        Ok(())
    }
}
