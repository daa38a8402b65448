//! Channel row operations.

use log::info;
use rusqlite::params;

use tvsource_protocol::ServiceType;

use super::{ChannelInfo, ChannelRecord, Database, Result};
use crate::device::{ChannelStore, DeviceResult};

impl Database {
    /// Insert a channel, replacing an existing row with the same key.
    pub fn insert_channel(&self, info: &ChannelInfo) -> Result<i64> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO channels (service_type, frequency_hz, service_id, name, major, minor)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(service_type, frequency_hz, service_id) DO UPDATE SET
                 name = excluded.name, major = excluded.major, minor = excluded.minor",
            params![
                info.service_type.code(),
                info.frequency_hz,
                info.service_id,
                info.name,
                info.major,
                info.minor,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// All channels ordered by frequency then service id.
    pub fn get_channels(&self) -> Result<Vec<ChannelRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, service_type, frequency_hz, service_id, name, major, minor, skipped, created_at
             FROM channels ORDER BY frequency_hz, service_id",
        )?;
        let records = stmt
            .query_map([], Self::row_to_channel_record)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(records)
    }

    pub fn count_channels(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM channels", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn set_channel_skipped(&self, channel_id: i64, skipped: bool) -> Result<()> {
        self.conn.lock().execute(
            "UPDATE channels SET skipped = ?1 WHERE id = ?2",
            params![skipped, channel_id],
        )?;
        Ok(())
    }

    /// Delete every channel of the given service types.
    pub fn delete_channels_by_service_type(&self, types: &[ServiceType]) -> Result<usize> {
        let conn = self.conn.lock();
        let mut removed = 0;
        for service_type in types {
            removed += conn.execute(
                "DELETE FROM channels WHERE service_type = ?1",
                params![service_type.code()],
            )?;
        }
        Ok(removed)
    }

    /// Delete every channel whose frequency falls in `[min_hz, max_hz]`.
    pub fn delete_channels_in_range(&self, min_hz: u32, max_hz: u32) -> Result<usize> {
        let removed = self.conn.lock().execute(
            "DELETE FROM channels WHERE frequency_hz BETWEEN ?1 AND ?2",
            params![min_hz, max_hz],
        )?;
        Ok(removed)
    }

    fn row_to_channel_record(row: &rusqlite::Row) -> rusqlite::Result<ChannelRecord> {
        let code: u8 = row.get(1)?;
        let service_type = ServiceType::from_code(code).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                1,
                rusqlite::types::Type::Integer,
                format!("unknown service type {}", code).into(),
            )
        })?;
        Ok(ChannelRecord {
            id: row.get(0)?,
            service_type,
            frequency_hz: row.get(2)?,
            service_id: row.get(3)?,
            name: row.get(4)?,
            major: row.get(5)?,
            minor: row.get(6)?,
            skipped: row.get::<_, Option<bool>>(7)?.unwrap_or(false),
            created_at: row.get::<_, Option<i64>>(8)?.unwrap_or(0),
        })
    }
}

impl ChannelStore for Database {
    fn clear_service_types(&self, types: &[ServiceType]) -> DeviceResult<usize> {
        let removed = self.delete_channels_by_service_type(types)?;
        info!("[Database] Cleared {} channel(s) of {:?}", removed, types);
        Ok(removed)
    }

    fn clear_frequency_range(&self, min_hz: u32, max_hz: u32) -> DeviceResult<usize> {
        let removed = self.delete_channels_in_range(min_hz, max_hz)?;
        info!(
            "[Database] Cleared {} channel(s) in {}..={} Hz",
            removed, min_hz, max_hz
        );
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(db: &Database) {
        let rows = [
            (ServiceType::Atv, 55_250_000, 0),
            (ServiceType::Atv, 61_250_000, 0),
            (ServiceType::Dtv, 177_000_000, 1),
            (ServiceType::Radio, 177_000_000, 2),
            (ServiceType::Dtv, 473_000_000, 1),
            (ServiceType::Data, 473_000_000, 9),
        ];
        for (service_type, freq, sid) in rows {
            db.insert_channel(&ChannelInfo::new(service_type, freq, sid)).unwrap();
        }
    }

    #[test]
    fn test_insert_and_list() {
        let db = Database::open_in_memory().unwrap();
        seed(&db);
        let channels = db.get_channels().unwrap();
        assert_eq!(channels.len(), 6);
        assert_eq!(channels[0].frequency_hz, 55_250_000);
        assert!(!channels[0].skipped);

        // Same key updates in place.
        let mut renamed = ChannelInfo::new(ServiceType::Dtv, 177_000_000, 1);
        renamed.name = Some("KABC".to_string());
        db.insert_channel(&renamed).unwrap();
        assert_eq!(db.count_channels().unwrap(), 6);
    }

    #[test]
    fn test_skip_flag() {
        let db = Database::open_in_memory().unwrap();
        let id = db
            .insert_channel(&ChannelInfo::new(ServiceType::Atv, 55_250_000, 0))
            .unwrap();
        db.set_channel_skipped(id, true).unwrap();
        assert!(db.get_channels().unwrap()[0].skipped);
    }

    #[test]
    fn test_clear_by_service_type() {
        let db = Database::open_in_memory().unwrap();
        seed(&db);
        let removed = db
            .clear_service_types(&[ServiceType::Dtv, ServiceType::Radio, ServiceType::Data])
            .unwrap();
        assert_eq!(removed, 4);
        let left = db.get_channels().unwrap();
        assert!(left.iter().all(|c| c.service_type == ServiceType::Atv));
    }

    #[test]
    fn test_clear_frequency_range() {
        let db = Database::open_in_memory().unwrap();
        seed(&db);
        assert_eq!(db.clear_frequency_range(170_000_000, 180_000_000).unwrap(), 2);
        assert_eq!(db.count_channels().unwrap(), 4);
        assert_eq!(db.clear_frequency_range(900_000_000, 950_000_000).unwrap(), 0);
    }
}
