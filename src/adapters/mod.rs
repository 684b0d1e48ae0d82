//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements         | Connects to                  |
//! |-------------|--------------------|------------------------------|
//! | `log_sink`  | EventSink          | Serial log output            |
//! | `mqtt`      | BrokerPort         | ESP-IDF MQTT client          |
//! | `nvs`       | ConfigPort         | NVS / in-memory store        |
//! | `ota`       | UpdatePort         | ESP-IDF OTA partitions       |
//! | `time`      | Clock              | ESP32 system timer           |
//! | `wifi`      | ConnectivityPort   | ESP-IDF WiFi STA             |
//! |             | ProvisioningPort   | WiFi AP + HTTP form (`portal`)|
//!
//! `device_id` and `portal` are helpers with no port of their own.

pub mod device_id;
pub mod log_sink;
pub mod mqtt;
pub mod nvs;
pub mod ota;
pub mod portal;
pub mod time;
pub mod wifi;
