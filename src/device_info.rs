/// Read the factory MAC address burned into eFuse
fn factory_mac() -> [u8; 6] {
    let mut mac = [0u8; 6];
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// MQTT client id, unique per board
pub fn mqtt_client_id() -> String {
    let mac = factory_mac();
    format!(
        "climate-node-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    )
}

/// Get the device MAC address in standard format
pub fn device_mac_address() -> String {
    let mac = factory_mac();
    format!(
        "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    )
}
