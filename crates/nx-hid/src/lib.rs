//! HID input report decoding for pads connected through the frontend's generic HID transport.
//!
//! The transport layer owns the USB/Bluetooth connection and hands every input report to a
//! [`PadConnection`]. The connection decodes the report into its own state, which the frontend
//! polls as a [`JoypadButtons`] mask.
//!
//! Only the Wii U Pro Controller ([`WiiUPro`]) is implemented.

mod error;
pub mod joypad;
pub mod pad;
pub mod wiiupro;

pub use error::ReportError;
pub use joypad::JoypadButtons;
pub use pad::{PadConnection, RumbleEffect, SendControl};
pub use wiiupro::{WiiUPro, WiiUProButtons};
