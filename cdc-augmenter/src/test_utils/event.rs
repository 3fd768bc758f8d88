use cdc_mysql::types::BinlogPosition;

use crate::types::{EventHeader, RawChangeEvent, RawEvent, RawEventData};

/// Commit second used by [`EventBuilder`] unless changed with [`EventBuilder::at`].
pub const DEFAULT_TIMESTAMP: i64 = 1_700_000_000;

/// Builds consecutive binlog events of one server.
///
/// Every built event advances the position by one, so each event carries the
/// position right after itself like the binlog reports it.
#[derive(Debug, Clone)]
pub struct EventBuilder {
    filename: String,
    position: u64,
    timestamp: i64,
    server_id: i64,
}

impl EventBuilder {
    pub fn new(filename: impl Into<String>, position: u64) -> Self {
        Self {
            filename: filename.into(),
            position,
            timestamp: DEFAULT_TIMESTAMP,
            server_id: 1,
        }
    }

    /// Sets the timestamp of the following events.
    pub fn at(&mut self, timestamp: i64) -> &mut Self {
        self.timestamp = timestamp;
        self
    }

    /// Position of the last built event.
    pub fn position(&self) -> BinlogPosition {
        BinlogPosition::new(self.filename.clone(), self.position)
    }

    pub fn gtid(&mut self, gtid: &str) -> RawEvent {
        self.event(RawEventData::Gtid {
            gtid: gtid.to_string(),
        })
    }

    pub fn begin(&mut self, database: &str) -> RawEvent {
        self.query(database, "BEGIN")
    }

    pub fn commit(&mut self, database: &str) -> RawEvent {
        self.query(database, "COMMIT")
    }

    pub fn query(&mut self, database: &str, sql: &str) -> RawEvent {
        self.event(RawEventData::Query {
            database: database.to_string(),
            sql: sql.to_string(),
        })
    }

    pub fn xid(&mut self, xid: i64) -> RawEvent {
        self.event(RawEventData::Xid { xid })
    }

    pub fn rows(&mut self, change: RawChangeEvent) -> RawEvent {
        self.event(RawEventData::Rows(change))
    }

    /// A GTID transaction holding `changes`, committed with `xid`.
    pub fn transaction(&mut self, gtid: &str, xid: i64, changes: Vec<RawChangeEvent>) -> Vec<RawEvent> {
        let database = changes
            .first()
            .map(|change| change.table.schema.clone())
            .unwrap_or_default();

        let mut events = vec![self.gtid(gtid), self.begin(&database)];
        events.extend(changes.into_iter().map(|change| self.rows(change)));
        events.push(self.xid(xid));

        events
    }

    fn event(&mut self, data: RawEventData) -> RawEvent {
        self.position += 1;

        RawEvent {
            header: EventHeader {
                timestamp: self.timestamp,
                server_id: self.server_id,
                position: self.position(),
            },
            data,
        }
    }
}
