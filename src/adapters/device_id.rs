//! Device identity derived from the ESP32 factory MAC address.
//!
//! The last 3 bytes of the 6-byte MAC give:
//! - the hostname `snuffelaar-xxyyzz`, used for DHCP, as the portal AP
//!   SSID and as the MQTT client id
//! - the short id `SN-XXYYZZ` printed in the boot banner

use core::fmt::Write;

/// Short device ID string: "SN-XXYYZZ".
pub type DeviceIdString = heapless::String<16>;

/// Hostname string: "snuffelaar-xxyyzz".
pub type HostnameString = heapless::String<24>;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(all(target_os = "espidf", feature = "espidf"))]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    unsafe {
        esp_idf_sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(all(target_os = "espidf", feature = "espidf")))]
pub fn read_mac() -> MacAddress {
    [0x24, 0x0A, 0xC4, 0x5E, 0x1F, 0x07]
}

pub fn device_id(mac: &MacAddress) -> DeviceIdString {
    let mut id = DeviceIdString::new();
    let _ = write!(id, "SN-{:02X}{:02X}{:02X}", mac[3], mac[4], mac[5]);
    id
}

pub fn hostname(mac: &MacAddress) -> HostnameString {
    let mut name = HostnameString::new();
    let _ = write!(name, "snuffelaar-{:02x}{:02x}{:02x}", mac[3], mac[4], mac[5]);
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_id_format() {
        let mac = [0x00, 0x11, 0x22, 0xAA, 0xBB, 0xCC];
        assert_eq!(device_id(&mac).as_str(), "SN-AABBCC");
    }

    #[test]
    fn hostname_format() {
        let mac = [0x00, 0x11, 0x22, 0xAA, 0xBB, 0xCC];
        assert_eq!(hostname(&mac).as_str(), "snuffelaar-aabbcc");
    }

    #[test]
    fn sim_mac_is_stable() {
        assert_eq!(read_mac(), read_mac());
        assert_eq!(hostname(&read_mac()).as_str(), "snuffelaar-5e1f07");
    }
}
