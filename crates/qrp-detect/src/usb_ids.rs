//! USB Vendor/Product ID tables for known serial adapters
//!
//! The QRP transceivers this crate targets expose CAT over an onboard
//! USB-to-serial bridge. The boards ship with a WCH CH340 almost
//! exclusively, but homebrew builds substitute other common bridges,
//! so all of them are treated as probe candidates.

/// A vendor/product ID pair as read from the USB descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsbId {
    pub vid: u16,
    pub pid: u16,
}

/// WCH CH340/CH341, the bridge on stock boards
pub mod ch340 {
    use super::UsbId;

    pub const VID: u16 = 0x1A86;

    pub const CH340: UsbId = UsbId { vid: VID, pid: 0x7523 };
    pub const CH341: UsbId = UsbId { vid: VID, pid: 0x5523 };

    /// Product IDs the CH340 family enumerates with
    pub const ALL_PIDS: &[u16] = &[0x7523, 0x5523];
}

/// Silicon Labs CP210x family
pub mod cp210x {
    use super::UsbId;

    pub const VID: u16 = 0x10C4;

    pub const CP2102: UsbId = UsbId { vid: VID, pid: 0xEA60 };
    pub const CP2105: UsbId = UsbId { vid: VID, pid: 0xEA70 };

    /// CP210x product IDs
    pub const ALL_PIDS: &[u16] = &[0xEA60, 0xEA70, 0xEA71];
}

/// FTDI FT232 family
pub mod ftdi {
    use super::UsbId;

    pub const VID: u16 = 0x0403;

    pub const FT232R: UsbId = UsbId { vid: VID, pid: 0x6001 };
    pub const FT231X: UsbId = UsbId { vid: VID, pid: 0x6015 };

    /// FT232-family product IDs
    pub const ALL_PIDS: &[u16] = &[0x6001, 0x6010, 0x6011, 0x6014, 0x6015];
}

/// Prolific PL2303 family
pub mod prolific {
    use super::UsbId;

    pub const VID: u16 = 0x067B;

    pub const PL2303: UsbId = UsbId { vid: VID, pid: 0x2303 };

    /// PL2303 product IDs
    pub const ALL_PIDS: &[u16] = &[0x2303];
}

/// True if the VID/PID pair belongs to a known USB-serial bridge
pub fn is_known_serial_adapter(vid: u16, pid: u16) -> bool {
    match vid {
        ch340::VID => ch340::ALL_PIDS.contains(&pid),
        cp210x::VID => cp210x::ALL_PIDS.contains(&pid),
        ftdi::VID => ftdi::ALL_PIDS.contains(&pid),
        prolific::VID => prolific::ALL_PIDS.contains(&pid),
        _ => false,
    }
}

/// Check if an adapter VID is the bridge the stock boards ship with
///
/// Candidate ports with this VID are probed before the generic adapters.
pub fn is_stock_bridge(vid: u16) -> bool {
    vid == ch340::VID
}

/// Short chip-family name for a known vendor ID
pub fn adapter_name(vid: u16) -> Option<&'static str> {
    match vid {
        ch340::VID => Some("CH340"),
        cp210x::VID => Some("CP210x"),
        ftdi::VID => Some("FTDI"),
        prolific::VID => Some("PL2303"),
        _ => None,
    }
}
