//! BLE advertising-data parsing.
//!
//! Walks the AD structures of a raw advertisement payload and collects the
//! fields the classifier cares about: 16-bit service UUIDs, manufacturer
//! data, and the local name. Borrowed, allocation-free — safe to run in the
//! scan callback.

use crate::classify::{self, Advertisement};
use crate::types::{MacAddr, Observation};

// AD types per the Bluetooth Core Specification Supplement.
const AD_UUID16_INCOMPLETE: u8 = 0x02;
const AD_UUID16_COMPLETE: u8 = 0x03;
const AD_NAME_SHORT: u8 = 0x08;
const AD_NAME_COMPLETE: u8 = 0x09;
const AD_SERVICE_DATA_UUID16: u8 = 0x16;
const AD_MANUFACTURER_DATA: u8 = 0xFF;

/// Parse raw advertising data into an [`Advertisement`] view.
///
/// Tolerates hostile input: a zero length byte or a structure overrunning
/// the buffer ends the walk with whatever was collected so far. Trackers
/// advertise their identifying service both in UUID lists and as service
/// data, so the leading UUID of an 0x16 structure counts as advertised.
pub fn parse_advertising_data(data: &[u8]) -> Advertisement<'_> {
    let mut adv = Advertisement::new();
    let mut i = 0;

    while i < data.len() {
        let len = data[i] as usize;
        if len == 0 || i + 1 + len > data.len() {
            break;
        }
        let ad_type = data[i + 1];
        let payload = &data[i + 2..i + 1 + len];

        match ad_type {
            AD_UUID16_INCOMPLETE | AD_UUID16_COMPLETE => {
                for pair in payload.chunks_exact(2) {
                    adv.push_service(u16::from_le_bytes([pair[0], pair[1]]));
                }
            }
            AD_SERVICE_DATA_UUID16 => {
                if payload.len() >= 2 {
                    adv.push_service(u16::from_le_bytes([payload[0], payload[1]]));
                }
            }
            AD_MANUFACTURER_DATA => {
                adv.manufacturer_data = Some(payload);
            }
            AD_NAME_SHORT | AD_NAME_COMPLETE => {
                adv.local_name = Some(payload);
            }
            _ => {}
        }

        i += 1 + len;
    }

    adv
}

/// Classify an advertisement and wrap it as a BLE observation.
pub fn observation_from_advertisement(
    addr: MacAddr,
    rssi_dbm: i8,
    adv: &Advertisement,
    ts_s: u32,
) -> Observation {
    Observation::ble(addr, rssi_dbm, classify::inspect(adv), ts_s)
}
