//! Advertising controller interface
//!
//! The same [`AdvertisingConfig`] is used at boot and every time the link
//! drops back to idle.

use crate::config::advertising::{DEVICE_NAME, INTERVAL_MS};
use crate::gatt::uuids::{self, ServiceUuid};

/// How long an advertising session lasts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvertisingDuration {
    /// Advertise until a central connects
    Forever,
    /// Stop after the given number of milliseconds
    Limited(u32),
}

/// PDU properties of the advertisement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvertisingFlags {
    pub connectable: bool,
    pub scannable: bool,
    /// Legacy (non-extended) advertising PDUs
    pub legacy: bool,
}

/// Legacy advertising PDU types the radio can send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvertisingKind {
    /// ADV_IND
    ConnectableScannable,
    /// ADV_SCAN_IND
    NonconnectableScannable,
    /// ADV_NONCONN_IND
    NonconnectableNonscannable,
}

/// Errors raised while preparing an advertisement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvertisingError {
    /// The flags ask for a PDU type legacy advertising does not have
    UnsupportedFlags,
    /// The payload does not fit in one legacy advertising PDU
    PayloadTooLarge,
}

impl AdvertisingFlags {
    /// PDU type matching these flags.
    ///
    /// Legacy undirected advertising has no connectable, non-scannable PDU,
    /// and extended advertising is not driven by this node.
    pub fn kind(&self) -> Result<AdvertisingKind, AdvertisingError> {
        match (self.legacy, self.connectable, self.scannable) {
            (true, true, true) => Ok(AdvertisingKind::ConnectableScannable),
            (true, false, true) => Ok(AdvertisingKind::NonconnectableScannable),
            (true, false, false) => Ok(AdvertisingKind::NonconnectableNonscannable),
            _ => Err(AdvertisingError::UnsupportedFlags),
        }
    }
}

/// Largest legacy advertising payload
pub const MAX_PAYLOAD_LEN: usize = 31;

/// AD type: flags
const AD_FLAGS: u8 = 0x01;
/// AD type: incomplete list of 16-bit service UUIDs
const AD_INCOMPLETE_16BIT_UUIDS: u8 = 0x02;
/// AD type: complete local name
const AD_COMPLETE_LOCAL_NAME: u8 = 0x09;

/// LE General Discoverable | BR/EDR Not Supported
const FLAGS_GENERAL_DISCOVERABLE_LE_ONLY: u8 = 0x06;

/// Advertising parameters and payload contents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvertisingConfig {
    pub duration: AdvertisingDuration,
    pub interval_ms: u16,
    pub flags: AdvertisingFlags,
    /// Carried as an incomplete list of 16-bit service UUIDs
    pub service_uuids: &'static [ServiceUuid],
    pub device_name: &'static str,
}

impl AdvertisingConfig {
    /// Service UUIDs in advertising-payload byte order
    pub fn service_uuid_bytes(&self, buf: &mut [u8]) -> usize {
        let mut len = 0;
        for uuid in self.service_uuids {
            if len + 2 > buf.len() {
                break;
            }
            buf[len..len + 2].copy_from_slice(&uuid.to_le_bytes());
            len += 2;
        }
        len
    }

    /// Encode the advertising payload into `buf`.
    ///
    /// Layout: flags, incomplete list of 16-bit service UUIDs, complete local
    /// name. Each AD structure is `length, type, data`.
    pub fn encode_payload(&self, buf: &mut [u8; MAX_PAYLOAD_LEN]) -> Result<usize, AdvertisingError> {
        let mut uuids = [0u8; MAX_PAYLOAD_LEN];
        let uuid_len = self.service_uuid_bytes(&mut uuids);
        if uuid_len < self.service_uuids.len() * 2 {
            return Err(AdvertisingError::PayloadTooLarge);
        }

        let mut len = 0;
        for (ty, data) in [
            (AD_FLAGS, &[FLAGS_GENERAL_DISCOVERABLE_LE_ONLY][..]),
            (AD_INCOMPLETE_16BIT_UUIDS, &uuids[..uuid_len]),
            (AD_COMPLETE_LOCAL_NAME, self.device_name.as_bytes()),
        ] {
            if data.is_empty() {
                continue;
            }
            let end = len + 2 + data.len();
            if end > buf.len() {
                return Err(AdvertisingError::PayloadTooLarge);
            }
            // Length covers the type byte plus data
            buf[len] = (data.len() + 1) as u8;
            buf[len + 1] = ty;
            buf[len + 2..end].copy_from_slice(data);
            len = end;
        }
        Ok(len)
    }
}

impl Default for AdvertisingConfig {
    fn default() -> Self {
        Self {
            duration: AdvertisingDuration::Forever,
            interval_ms: INTERVAL_MS,
            flags: AdvertisingFlags {
                connectable: true,
                scannable: true,
                legacy: true,
            },
            service_uuids: &[uuids::ENVIRONMENTAL_SENSING],
            device_name: DEVICE_NAME,
        }
    }
}

/// Radio primitive that makes the node discoverable
pub trait Advertiser {
    /// Start advertising with `config`.
    ///
    /// Safe to call while already advertising.
    fn start(&mut self, config: &AdvertisingConfig);
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AdvertisingConfig::default();
        assert_eq!(config.duration, AdvertisingDuration::Forever);
        assert_eq!(config.interval_ms, 100);
        assert!(config.flags.connectable);
        assert!(config.flags.scannable);
        assert!(config.flags.legacy);
        assert_eq!(config.service_uuids, &[ServiceUuid(0x181A)]);
    }

    #[test]
    fn test_service_uuid_bytes() {
        let config = AdvertisingConfig::default();
        let mut buf = [0u8; 4];
        let len = config.service_uuid_bytes(&mut buf);
        assert_eq!(&buf[..len], &[0x1A, 0x18]);
    }

    #[test]
    fn test_service_uuid_bytes_truncates() {
        let config = AdvertisingConfig {
            service_uuids: &[uuids::ENVIRONMENTAL_SENSING, uuids::BATTERY],
            ..AdvertisingConfig::default()
        };
        let mut buf = [0u8; 3];
        assert_eq!(config.service_uuid_bytes(&mut buf), 2);
    }

    #[test]
    fn test_default_payload_layout() {
        let config = AdvertisingConfig::default();
        let mut buf = [0u8; MAX_PAYLOAD_LEN];
        let len = config.encode_payload(&mut buf).unwrap();

        let mut expected: heapless::Vec<u8, MAX_PAYLOAD_LEN> = heapless::Vec::new();
        expected.extend_from_slice(&[0x02, 0x01, 0x06]).unwrap();
        expected.extend_from_slice(&[0x03, 0x02, 0x1A, 0x18]).unwrap();
        expected.extend_from_slice(&[0x0B, 0x09]).unwrap();
        expected.extend_from_slice(b"SensorNode").unwrap();

        assert_eq!(&buf[..len], expected.as_slice());
        assert_eq!(len, 19);
        assert!(len <= MAX_PAYLOAD_LEN);
    }

    #[test]
    fn test_payload_with_several_services() {
        let config = AdvertisingConfig {
            service_uuids: &[uuids::ENVIRONMENTAL_SENSING, uuids::BATTERY],
            device_name: "N",
            ..AdvertisingConfig::default()
        };
        let mut buf = [0u8; MAX_PAYLOAD_LEN];
        let len = config.encode_payload(&mut buf).unwrap();
        assert_eq!(
            &buf[..len],
            &[0x02, 0x01, 0x06, 0x05, 0x02, 0x1A, 0x18, 0x0F, 0x18, 0x02, 0x09, b'N']
        );
    }

    #[test]
    fn test_payload_name_too_long() {
        let config = AdvertisingConfig {
            device_name: "AVeryLongSensorNodeNameThatOverflows",
            ..AdvertisingConfig::default()
        };
        let mut buf = [0u8; MAX_PAYLOAD_LEN];
        assert_eq!(config.encode_payload(&mut buf), Err(AdvertisingError::PayloadTooLarge));
    }

    #[test]
    fn test_default_flags_kind() {
        let config = AdvertisingConfig::default();
        assert_eq!(config.flags.kind(), Ok(AdvertisingKind::ConnectableScannable));
    }

    #[test]
    fn test_flags_select_kind() {
        let flags = |connectable, scannable, legacy| AdvertisingFlags {
            connectable,
            scannable,
            legacy,
        };
        assert_eq!(
            flags(false, true, true).kind(),
            Ok(AdvertisingKind::NonconnectableScannable)
        );
        assert_eq!(
            flags(false, false, true).kind(),
            Ok(AdvertisingKind::NonconnectableNonscannable)
        );
        assert_eq!(flags(true, false, true).kind(), Err(AdvertisingError::UnsupportedFlags));
        assert_eq!(flags(true, true, false).kind(), Err(AdvertisingError::UnsupportedFlags));
    }
}
