//! Vendor identification from MAC OUI prefixes.
//!
//! A curated subset of the IEEE OUI registry covering the vendors the UI can
//! display. Lookup is a binary search over a sorted 3-byte prefix table.
//! Addresses with the locally-administered bit set are almost always
//! randomized and resolve to Unknown.

use crate::types::MacAddr;
use serde::{Deserialize, Serialize};

/// Radio hardware vendors recognised by the OUI table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Vendor {
    #[default]
    Unknown,
    Apple,
    Asus,
    Broadcom,
    Chipolo,
    Cisco,
    Csr,
    DLink,
    Espressif,
    Google,
    Huawei,
    Innway,
    Intel,
    Intelbras,
    Mercury,
    Mercusys,
    Microsoft,
    Mikrotik,
    Motorola,
    Netgear,
    Pebblebee,
    RaspberryPi,
    Qualcomm,
    Samsung,
    Sony,
    Ti,
    Tile,
    TpLink,
    Tracki,
    Ubiquiti,
}

impl Vendor {
    /// Human-readable vendor name for UI display.
    pub fn display_name(self) -> &'static str {
        match self {
            Vendor::Unknown => "Unknown",
            Vendor::Apple => "Apple",
            Vendor::Asus => "Asus",
            Vendor::Broadcom => "Broadcom",
            Vendor::Chipolo => "Chipolo",
            Vendor::Cisco => "Cisco",
            Vendor::Csr => "Cambridge Silicon Radio",
            Vendor::DLink => "D-Link",
            Vendor::Espressif => "Espressif",
            Vendor::Google => "Google",
            Vendor::Huawei => "Huawei",
            Vendor::Innway => "Innway",
            Vendor::Intel => "Intel",
            Vendor::Intelbras => "Intelbras",
            Vendor::Mercury => "Mercury",
            Vendor::Mercusys => "Mercusys",
            Vendor::Microsoft => "Microsoft",
            Vendor::Mikrotik => "Mikrotik",
            Vendor::Motorola => "Motorola",
            Vendor::Netgear => "Netgear",
            Vendor::Pebblebee => "Pebblebee",
            Vendor::RaspberryPi => "Raspberry Pi",
            Vendor::Qualcomm => "Qualcomm",
            Vendor::Samsung => "Samsung",
            Vendor::Sony => "Sony",
            Vendor::Ti => "Texas Instruments",
            Vendor::Tile => "Tile",
            Vendor::TpLink => "TP-Link",
            Vendor::Tracki => "Tracki",
            Vendor::Ubiquiti => "Ubiquiti",
        }
    }
}

/// One sorted table row: 3-byte OUI prefix to vendor.
struct OuiEntry {
    prefix: [u8; 3],
    vendor: Vendor,
}

const fn e(prefix: [u8; 3], vendor: Vendor) -> OuiEntry {
    OuiEntry { prefix, vendor }
}

/// Sorted ascending by prefix bytes; `lookup` binary-searches it.
#[rustfmt::skip]
static OUI_TABLE: &[OuiEntry] = &[
    e([0x00, 0x00, 0x0C], Vendor::Cisco),
    e([0x00, 0x01, 0x4A], Vendor::Sony),
    e([0x00, 0x02, 0x5B], Vendor::Csr),
    e([0x00, 0x02, 0xB3], Vendor::Intel),
    e([0x00, 0x03, 0x7F], Vendor::Qualcomm),
    e([0x00, 0x03, 0x93], Vendor::Apple),
    e([0x00, 0x03, 0xFF], Vendor::Microsoft),
    e([0x00, 0x05, 0x5D], Vendor::DLink),
    e([0x00, 0x0A, 0x95], Vendor::Apple),
    e([0x00, 0x0A, 0xF7], Vendor::Broadcom),
    e([0x00, 0x10, 0x18], Vendor::Broadcom),
    e([0x00, 0x12, 0x47], Vendor::Samsung),
    e([0x00, 0x13, 0x02], Vendor::Intel),
    e([0x00, 0x13, 0xA9], Vendor::Sony),
    e([0x00, 0x15, 0x5D], Vendor::Microsoft),
    e([0x00, 0x15, 0x6D], Vendor::Ubiquiti),
    e([0x00, 0x17, 0x9A], Vendor::DLink),
    e([0x00, 0x17, 0xEA], Vendor::Ti),
    e([0x00, 0x17, 0xF2], Vendor::Apple),
    e([0x00, 0x18, 0x30], Vendor::Ti),
    e([0x00, 0x19, 0xC5], Vendor::Sony),
    e([0x00, 0x1A, 0x11], Vendor::Google),
    e([0x00, 0x1A, 0x3F], Vendor::Intelbras),
    e([0x00, 0x1B, 0x11], Vendor::DLink),
    e([0x00, 0x1B, 0x54], Vendor::Cisco),
    e([0x00, 0x1B, 0xDC], Vendor::Csr),
    e([0x00, 0x1C, 0xB3], Vendor::Apple),
    e([0x00, 0x1E, 0xC2], Vendor::Apple),
    e([0x00, 0x21, 0xE9], Vendor::Apple),
    e([0x00, 0x24, 0xBE], Vendor::Sony),
    e([0x00, 0x25, 0x9E], Vendor::Huawei),
    e([0x00, 0x50, 0xF2], Vendor::Microsoft),
    e([0x00, 0xA0, 0xC6], Vendor::Qualcomm),
    e([0x00, 0xE0, 0xFC], Vendor::Huawei),
    e([0x04, 0x18, 0xD6], Vendor::Ubiquiti),
    e([0x04, 0x5D, 0x4B], Vendor::Sony),
    e([0x04, 0xD4, 0xC4], Vendor::Asus),
    e([0x08, 0x60, 0x6E], Vendor::Asus),
    e([0x10, 0x0D, 0x7F], Vendor::Netgear),
    e([0x14, 0xCC, 0x20], Vendor::TpLink),
    e([0x14, 0xD6, 0x4D], Vendor::DLink),
    e([0x18, 0xD6, 0xC7], Vendor::TpLink),
    e([0x18, 0xFE, 0x34], Vendor::Espressif),
    e([0x1C, 0x7E, 0xE5], Vendor::DLink),
    e([0x1C, 0xB7, 0x2C], Vendor::Asus),
    e([0x20, 0x4E, 0x7F], Vendor::Netgear),
    e([0x24, 0x0A, 0xC4], Vendor::Espressif),
    e([0x24, 0x6F, 0x28], Vendor::Espressif),
    e([0x24, 0xA4, 0x3C], Vendor::Ubiquiti),
    e([0x28, 0x0D, 0xFC], Vendor::Sony),
    e([0x28, 0x10, 0x7B], Vendor::DLink),
    e([0x28, 0x18, 0x78], Vendor::Microsoft),
    e([0x28, 0x6E, 0xD4], Vendor::Huawei),
    e([0x28, 0xCD, 0xC1], Vendor::RaspberryPi),
    e([0x28, 0xCF, 0xDA], Vendor::Apple),
    e([0x2C, 0x56, 0xDC], Vendor::Asus),
    e([0x2C, 0xC8, 0x1B], Vendor::Mikrotik),
    e([0x30, 0x46, 0x9A], Vendor::Netgear),
    e([0x30, 0x85, 0xA9], Vendor::Asus),
    e([0x30, 0xAE, 0xA4], Vendor::Espressif),
    e([0x30, 0xFD, 0x38], Vendor::Google),
    e([0x34, 0x03, 0xDE], Vendor::Ti),
    e([0x34, 0x23, 0xBA], Vendor::Samsung),
    e([0x3C, 0x07, 0x54], Vendor::Apple),
    e([0x3C, 0x5A, 0xB4], Vendor::Google),
    e([0x3C, 0xA9, 0xF4], Vendor::Intel),
    e([0x40, 0x16, 0x7E], Vendor::Asus),
    e([0x48, 0x8F, 0x5A], Vendor::Mikrotik),
    e([0x4C, 0x5E, 0x0C], Vendor::Mikrotik),
    e([0x50, 0x46, 0x5D], Vendor::Asus),
    e([0x50, 0xC7, 0xBF], Vendor::TpLink),
    e([0x58, 0x10, 0x8C], Vendor::Intelbras),
    e([0x58, 0x97, 0x1E], Vendor::Cisco),
    e([0x5C, 0x0A, 0x5B], Vendor::Samsung),
    e([0x5C, 0xCF, 0x7F], Vendor::Espressif),
    e([0x60, 0x01, 0x94], Vendor::Espressif),
    e([0x60, 0x33, 0x4B], Vendor::Apple),
    e([0x64, 0xD1, 0x54], Vendor::Mikrotik),
    e([0x68, 0x72, 0x51], Vendor::Ubiquiti),
    e([0x68, 0xC4, 0x4D], Vendor::Motorola),
    e([0x6C, 0x3B, 0x6B], Vendor::Mikrotik),
    e([0x70, 0x72, 0x3C], Vendor::Huawei),
    e([0x74, 0x83, 0xC2], Vendor::Ubiquiti),
    e([0x78, 0x1F, 0xDB], Vendor::Samsung),
    e([0x78, 0x8A, 0x20], Vendor::Ubiquiti),
    e([0x7C, 0x1E, 0x52], Vendor::Microsoft),
    e([0x7C, 0x6D, 0x62], Vendor::Apple),
    e([0x80, 0x2A, 0xA8], Vendor::Ubiquiti),
    e([0x84, 0x1B, 0x5E], Vendor::Netgear),
    e([0x84, 0xA8, 0xE4], Vendor::Huawei),
    e([0x84, 0xC9, 0xB2], Vendor::DLink),
    e([0x8C, 0x77, 0x12], Vendor::Samsung),
    e([0x8C, 0xFD, 0xF0], Vendor::Qualcomm),
    e([0x94, 0xEB, 0x2C], Vendor::Google),
    e([0x98, 0x01, 0xA7], Vendor::Apple),
    e([0x98, 0x5D, 0xAD], Vendor::Ti),
    e([0x98, 0x5F, 0xD3], Vendor::Microsoft),
    e([0x9C, 0x3D, 0xCF], Vendor::Netgear),
    e([0xA0, 0x20, 0xA6], Vendor::Espressif),
    e([0xA0, 0x40, 0xA0], Vendor::Netgear),
    e([0xA0, 0xA8, 0xCD], Vendor::Intel),
    e([0xA4, 0x77, 0x33], Vendor::Google),
    e([0xA4, 0xCF, 0x12], Vendor::Espressif),
    e([0xA8, 0x66, 0x7F], Vendor::Apple),
    e([0xAC, 0x22, 0x0B], Vendor::Asus),
    e([0xAC, 0x87, 0xA3], Vendor::Apple),
    e([0xB0, 0xB4, 0x48], Vendor::Ti),
    e([0xB4, 0xE6, 0x2D], Vendor::Espressif),
    e([0xB4, 0xFB, 0xE4], Vendor::Ubiquiti),
    e([0xB8, 0x09, 0x8A], Vendor::Apple),
    e([0xB8, 0x27, 0xEB], Vendor::RaspberryPi),
    e([0xB8, 0x69, 0xF4], Vendor::Mikrotik),
    e([0xB8, 0xA3, 0x86], Vendor::DLink),
    e([0xC0, 0x3F, 0x0E], Vendor::Netgear),
    e([0xC0, 0xA0, 0xBB], Vendor::DLink),
    e([0xC4, 0x6E, 0x1F], Vendor::TpLink),
    e([0xCC, 0x2D, 0xE0], Vendor::Mikrotik),
    e([0xCC, 0x50, 0xE3], Vendor::Espressif),
    e([0xCC, 0x78, 0xAB], Vendor::Ti),
    e([0xCC, 0xB2, 0x55], Vendor::DLink),
    e([0xCC, 0xC3, 0xEA], Vendor::Motorola),
    e([0xD0, 0x39, 0x72], Vendor::Ti),
    e([0xD4, 0xCA, 0x6D], Vendor::Mikrotik),
    e([0xD8, 0x3A, 0xDD], Vendor::RaspberryPi),
    e([0xD8, 0x50, 0xE6], Vendor::Asus),
    e([0xDC, 0x9F, 0xDB], Vendor::Ubiquiti),
    e([0xDC, 0xA6, 0x32], Vendor::RaspberryPi),
    e([0xE0, 0x46, 0x9A], Vendor::Netgear),
    e([0xE0, 0x75, 0x7D], Vendor::Motorola),
    e([0xE4, 0x5F, 0x01], Vendor::RaspberryPi),
    e([0xE4, 0x8D, 0x8C], Vendor::Mikrotik),
    e([0xE8, 0x50, 0x8B], Vendor::Samsung),
    e([0xEC, 0x08, 0x6B], Vendor::TpLink),
    e([0xEC, 0xFA, 0xBC], Vendor::Espressif),
    e([0xF0, 0x18, 0x98], Vendor::Apple),
    e([0xF0, 0x9F, 0xC2], Vendor::Ubiquiti),
    e([0xF4, 0x5C, 0x89], Vendor::Apple),
    e([0xF4, 0xEC, 0x38], Vendor::TpLink),
    e([0xF4, 0xF5, 0xD8], Vendor::Google),
    e([0xF8, 0x8F, 0xCA], Vendor::Google),
    e([0xF8, 0xD0, 0xAC], Vendor::Sony),
    e([0xF8, 0xE0, 0x79], Vendor::Motorola),
    e([0xFC, 0x0F, 0xE6], Vendor::Sony),
];

/// Map a MAC address to its hardware vendor via the OUI prefix.
pub fn lookup(addr: &MacAddr) -> Vendor {
    let key = addr.oui();
    OUI_TABLE
        .binary_search_by(|entry| entry.prefix.cmp(&key))
        .map(|i| OUI_TABLE[i].vendor)
        .unwrap_or(Vendor::Unknown)
}
