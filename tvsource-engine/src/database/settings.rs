//! Persisted engine settings.

use rusqlite::{params, OptionalExtension};

use tvsource_protocol::{OwnershipClass, ProgramIds, SignalInfo, SourceInput};

use super::{Database, DatabaseError, Result};
use crate::device::{DeviceResult, EdidRecord, SettingsStore};

const KEY_CURRENT_SOURCE: &str = "current_source";
const KEY_CHANNEL_LOCK: &str = "channel_lock_enabled";
const KEY_DLG: &str = "dlg_enabled";

impl Database {
    /// Get a raw setting value.
    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let value = conn
            .query_row("SELECT value FROM settings WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Insert or replace a raw setting value.
    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.conn.lock().execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                 updated_at = strftime('%s', 'now')",
            params![key, value],
        )?;
        Ok(())
    }

    fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.get_setting(key)? {
            None => Ok(None),
            Some(v) if v == "1" => Ok(Some(true)),
            Some(v) if v == "0" => Ok(Some(false)),
            Some(value) => Err(DatabaseError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        }
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.set_setting(key, if value { "1" } else { "0" })
    }

    /// Last selected source, if one was ever saved.
    pub fn get_current_source(&self) -> Result<Option<SourceInput>> {
        let Some(value) = self.get_setting(KEY_CURRENT_SOURCE)? else {
            return Ok(None);
        };
        let source = value
            .parse::<i32>()
            .ok()
            .map(SourceInput::from)
            .filter(|s| s.is_valid());
        match source {
            Some(source) => Ok(Some(source)),
            None => Err(DatabaseError::InvalidValue {
                key: KEY_CURRENT_SOURCE.to_string(),
                value,
            }),
        }
    }

    pub fn set_current_source(&self, source: SourceInput) -> Result<()> {
        self.set_setting(KEY_CURRENT_SOURCE, &i32::from(source).to_string())
    }

    /// Channel-lock enable flag. Off unless explicitly turned on.
    pub fn get_channel_lock_enabled(&self) -> Result<bool> {
        Ok(self.get_bool(KEY_CHANNEL_LOCK)?.unwrap_or(false))
    }

    pub fn set_channel_lock(&self, enabled: bool) -> Result<()> {
        self.set_bool(KEY_CHANNEL_LOCK, enabled)
    }

    pub fn get_dlg_enabled(&self) -> Result<bool> {
        Ok(self.get_bool(KEY_DLG)?.unwrap_or(false))
    }

    pub fn set_dlg(&self, enabled: bool) -> Result<()> {
        self.set_bool(KEY_DLG, enabled)
    }

    /// Last program played on a source class.
    pub fn get_program(&self, class: OwnershipClass) -> Result<Option<ProgramIds>> {
        let conn = self.conn.lock();
        let program = conn
            .query_row(
                "SELECT frequency_hz, service_id, video_pid, audio_pid, pcr_pid
                 FROM programs WHERE class = ?1",
                params![class.name()],
                |row| {
                    Ok(ProgramIds {
                        frequency_hz: row.get::<_, u32>(0)?,
                        service_id: row.get::<_, u16>(1)?,
                        video_pid: row.get::<_, u16>(2)?,
                        audio_pid: row.get::<_, u16>(3)?,
                        pcr_pid: row.get::<_, u16>(4)?,
                    })
                },
            )
            .optional()?;
        Ok(program)
    }

    pub fn upsert_program(&self, class: OwnershipClass, program: &ProgramIds) -> Result<()> {
        self.conn.lock().execute(
            "INSERT INTO programs (class, frequency_hz, service_id, video_pid, audio_pid, pcr_pid)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(class) DO UPDATE SET
                 frequency_hz = excluded.frequency_hz,
                 service_id = excluded.service_id,
                 video_pid = excluded.video_pid,
                 audio_pid = excluded.audio_pid,
                 pcr_pid = excluded.pcr_pid,
                 updated_at = strftime('%s', 'now')",
            params![
                class.name(),
                program.frequency_hz,
                program.service_id,
                program.video_pid,
                program.audio_pid,
                program.pcr_pid,
            ],
        )?;
        Ok(())
    }

    pub fn get_edid(&self, port: u8) -> Result<Option<EdidRecord>> {
        let conn = self.conn.lock();
        let edid = conn
            .query_row(
                "SELECT port, version, data FROM edid WHERE port = ?1",
                params![port],
                |row| {
                    Ok(EdidRecord {
                        port: row.get(0)?,
                        version: row.get(1)?,
                        data: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(edid)
    }

    pub fn upsert_edid(&self, edid: &EdidRecord) -> Result<()> {
        self.conn.lock().execute(
            "INSERT INTO edid (port, version, data) VALUES (?1, ?2, ?3)
             ON CONFLICT(port) DO UPDATE SET version = excluded.version,
                 data = excluded.data, updated_at = strftime('%s', 'now')",
            params![edid.port, edid.version, edid.data],
        )?;
        Ok(())
    }

    /// Last signal snapshot stored for a source.
    pub fn get_source_info(&self, source: SourceInput) -> Result<Option<SignalInfo>> {
        let json = {
            let conn = self.conn.lock();
            conn.query_row(
                "SELECT info FROM source_info WHERE source = ?1",
                params![i32::from(source)],
                |row| row.get::<_, String>(0),
            )
            .optional()?
        };
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub fn upsert_source_info(&self, source: SourceInput, info: &SignalInfo) -> Result<()> {
        let json = serde_json::to_string(info)?;
        self.conn.lock().execute(
            "INSERT INTO source_info (source, info) VALUES (?1, ?2)
             ON CONFLICT(source) DO UPDATE SET info = excluded.info,
                 updated_at = strftime('%s', 'now')",
            params![i32::from(source), json],
        )?;
        Ok(())
    }
}

impl SettingsStore for Database {
    fn load_source(&self) -> DeviceResult<Option<SourceInput>> {
        Ok(self.get_current_source()?)
    }

    fn save_source(&self, source: SourceInput) -> DeviceResult<()> {
        Ok(self.set_current_source(source)?)
    }

    fn load_program(&self, class: OwnershipClass) -> DeviceResult<Option<ProgramIds>> {
        Ok(self.get_program(class)?)
    }

    fn save_program(&self, class: OwnershipClass, program: &ProgramIds) -> DeviceResult<()> {
        Ok(self.upsert_program(class, program)?)
    }

    fn load_edid(&self, port: u8) -> DeviceResult<Option<EdidRecord>> {
        Ok(self.get_edid(port)?)
    }

    fn save_edid(&self, edid: &EdidRecord) -> DeviceResult<()> {
        Ok(self.upsert_edid(edid)?)
    }

    fn channel_lock_enabled(&self) -> DeviceResult<bool> {
        Ok(self.get_channel_lock_enabled()?)
    }

    fn set_channel_lock_enabled(&self, enabled: bool) -> DeviceResult<()> {
        Ok(self.set_channel_lock(enabled)?)
    }

    fn save_source_info(&self, source: SourceInput, info: &SignalInfo) -> DeviceResult<()> {
        Ok(self.upsert_source_info(source, info)?)
    }

    fn set_dlg_enabled(&self, enabled: bool) -> DeviceResult<()> {
        Ok(self.set_dlg(enabled)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tvsource_protocol::{HdrType, SignalFormat, SignalStatus};

    #[test]
    fn test_current_source() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.get_current_source().unwrap(), None);

        db.set_current_source(SourceInput::Hdmi3).unwrap();
        assert_eq!(db.get_current_source().unwrap(), Some(SourceInput::Hdmi3));

        db.set_current_source(SourceInput::Dtv).unwrap();
        assert_eq!(db.load_source().unwrap(), Some(SourceInput::Dtv));
    }

    #[test]
    fn test_corrupt_source_is_reported() {
        let db = Database::open_in_memory().unwrap();
        db.set_setting(KEY_CURRENT_SOURCE, "banana").unwrap();
        assert!(matches!(
            db.get_current_source(),
            Err(DatabaseError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_channel_lock_defaults_off() {
        let db = Database::open_in_memory().unwrap();
        assert!(!db.get_channel_lock_enabled().unwrap());
        db.set_channel_lock(true).unwrap();
        assert!(db.channel_lock_enabled().unwrap());
    }

    #[test]
    fn test_dlg_flag() {
        let db = Database::open_in_memory().unwrap();
        db.set_dlg_enabled(true).unwrap();
        assert!(db.get_dlg_enabled().unwrap());
        db.set_dlg_enabled(false).unwrap();
        assert!(!db.get_dlg_enabled().unwrap());
    }

    #[test]
    fn test_program_per_class() {
        let db = Database::open_in_memory().unwrap();
        let program = ProgramIds {
            frequency_hz: 557_000_000,
            service_id: 1024,
            video_pid: 0x111,
            audio_pid: 0x112,
            pcr_pid: 0x1FF,
        };
        db.save_program(OwnershipClass::Tuner, &program).unwrap();
        assert_eq!(db.load_program(OwnershipClass::Tuner).unwrap(), Some(program));
        assert_eq!(db.load_program(OwnershipClass::External).unwrap(), None);

        let retuned = ProgramIds {
            service_id: 1032,
            ..program
        };
        db.save_program(OwnershipClass::Tuner, &retuned).unwrap();
        assert_eq!(db.get_program(OwnershipClass::Tuner).unwrap(), Some(retuned));
    }

    #[test]
    fn test_edid_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        let edid = EdidRecord {
            port: 2,
            version: 20,
            data: vec![0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00],
        };
        db.save_edid(&edid).unwrap();
        assert_eq!(db.load_edid(2).unwrap(), Some(edid));
        assert_eq!(db.load_edid(0).unwrap(), None);
    }

    #[test]
    fn test_source_info_stored_as_json() {
        let db = Database::open_in_memory().unwrap();
        let info = SignalInfo {
            format: SignalFormat::Format(17),
            status: SignalStatus::Stable,
            hdr: HdrType::Hdr10,
            fps: 60,
            ..SignalInfo::null()
        };
        db.save_source_info(SourceInput::Hdmi1, &info).unwrap();
        assert_eq!(db.get_source_info(SourceInput::Hdmi1).unwrap(), Some(info));
        assert_eq!(db.get_source_info(SourceInput::Hdmi2).unwrap(), None);
    }
}
