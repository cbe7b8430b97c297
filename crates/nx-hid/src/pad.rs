use crate::joypad::JoypadButtons;

/// Back-channel to the device, used to send HID output reports.
pub trait SendControl {
    fn send_control(&mut self, report: &[u8]);
}

impl<F: FnMut(&[u8])> SendControl for F {
    fn send_control(&mut self, report: &[u8]) {
        self(report)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RumbleEffect {
    Strong,
    Weak,
}

/// A connected pad as driven by the HID transport.
pub trait PadConnection {
    /// Decode one input report into the pad's state.
    fn packet_handler(&mut self, packet: &[u8]);

    fn set_rumble(&mut self, effect: RumbleEffect, strength: u16);

    fn buttons(&self) -> JoypadButtons;

    fn axis(&self, axis: u32) -> i16;
}
