//! Adapters: concrete implementations of the transport and discovery ports.
//!
//! | Adapter          | Implements        | Connects to                   |
//! |------------------|-------------------|-------------------------------|
//! | `ble`            | GattCentral       | btleplug central (or null)    |
//! |                  | GattLink          | GATT write / notify           |
//! | `ble_transport`  | Transport         | BLE RPC characteristics       |
//! | `http_transport` | Transport         | `/rpc`, `/check`, `/ota/upload` |
//! | `mdns`           | ServiceResolver   | mdns-sd browser (or null)     |

pub mod ble;
pub mod ble_transport;
pub mod http_transport;
pub mod mdns;
