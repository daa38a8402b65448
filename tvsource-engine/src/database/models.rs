//! Database row types.

use tvsource_protocol::ServiceType;

/// Channel found by a scan, before it is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub service_type: ServiceType,
    pub frequency_hz: u32,
    pub service_id: u16,
    pub name: Option<String>,
    pub major: u16,
    pub minor: u16,
}

impl ChannelInfo {
    pub fn new(service_type: ServiceType, frequency_hz: u32, service_id: u16) -> Self {
        Self {
            service_type,
            frequency_hz,
            service_id,
            name: None,
            major: 0,
            minor: 0,
        }
    }
}

/// Stored channel row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRecord {
    pub id: i64,
    pub service_type: ServiceType,
    pub frequency_hz: u32,
    pub service_id: u16,
    pub name: Option<String>,
    pub major: u16,
    pub minor: u16,
    /// Hidden from channel up/down.
    pub skipped: bool,
    pub created_at: i64,
}
