//! Wii U Pro Controller.
//!
//! The pad reports its buttons active-low in three bytes of every input report. Sticks and
//! rumble are not decoded yet; axes always read as centered.

use bitflags::bitflags;
use tracing::debug;

use crate::error::ReportError;
use crate::joypad::JoypadButtons;
use crate::pad::{PadConnection, RumbleEffect, SendControl};

/// Output report that asks the pad for a status report, sent once on connect.
pub const STATUS_REQUEST: [u8; 4] = [0xA2, 0x15, 0x00, 0x00];

const BUTTONS_HI: usize = 0x0C;
const BUTTONS_LO: usize = 0x0D;
const BUTTONS_EXT: usize = 0x0E;

/// Shortest input report that carries all three button bytes.
pub const MIN_REPORT_LEN: usize = BUTTONS_EXT + 1;

bitflags! {
    #[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
    pub struct WiiUProButtons: u32 {
        const A = 1 << 0;
        const B = 1 << 1;
        const X = 1 << 2;
        const Y = 1 << 3;
        const L = 1 << 4;
        const R = 1 << 5;
        const ZL = 1 << 6;
        const ZR = 1 << 7;
        const MINUS = 1 << 8;
        const PLUS = 1 << 9;
        const HOME = 1 << 10;
        const L3 = 1 << 11;
        const R3 = 1 << 12;
        const UP = 1 << 13;
        const DOWN = 1 << 14;
        const LEFT = 1 << 15;
        const RIGHT = 1 << 16;
    }
}

// (report byte, mask, button)
const BUTTON_MAP: [(usize, u8, WiiUProButtons); 17] = [
    (BUTTONS_LO, 0x40, WiiUProButtons::B),
    (BUTTONS_LO, 0x10, WiiUProButtons::A),
    (BUTTONS_LO, 0x20, WiiUProButtons::Y),
    (BUTTONS_LO, 0x08, WiiUProButtons::X),
    (BUTTONS_LO, 0x80, WiiUProButtons::ZL),
    (BUTTONS_LO, 0x04, WiiUProButtons::ZR),
    (BUTTONS_LO, 0x02, WiiUProButtons::LEFT),
    (BUTTONS_LO, 0x01, WiiUProButtons::UP),
    (BUTTONS_HI, 0x20, WiiUProButtons::L),
    (BUTTONS_HI, 0x02, WiiUProButtons::R),
    (BUTTONS_HI, 0x10, WiiUProButtons::MINUS),
    (BUTTONS_HI, 0x04, WiiUProButtons::PLUS),
    (BUTTONS_HI, 0x80, WiiUProButtons::RIGHT),
    (BUTTONS_HI, 0x40, WiiUProButtons::DOWN),
    (BUTTONS_HI, 0x08, WiiUProButtons::HOME),
    (BUTTONS_EXT, 0x02, WiiUProButtons::L3),
    (BUTTONS_EXT, 0x01, WiiUProButtons::R3),
];

impl WiiUProButtons {
    /// Decode the pressed buttons from a raw input report.
    pub fn decode(report: &[u8]) -> Result<Self, ReportError> {
        if report.len() < MIN_REPORT_LEN {
            return Err(ReportError::TooShort {
                len: report.len(),
                min: MIN_REPORT_LEN,
            });
        }

        let mut buttons = WiiUProButtons::empty();
        for &(byte, mask, button) in BUTTON_MAP.iter() {
            // Active-low.
            if !report[byte] & mask != 0 {
                buttons |= button;
            }
        }
        Ok(buttons)
    }

    pub fn to_joypad(self) -> JoypadButtons {
        const MAP: [(WiiUProButtons, JoypadButtons); 17] = [
            (WiiUProButtons::A, JoypadButtons::A),
            (WiiUProButtons::B, JoypadButtons::B),
            (WiiUProButtons::X, JoypadButtons::X),
            (WiiUProButtons::Y, JoypadButtons::Y),
            (WiiUProButtons::L, JoypadButtons::L),
            (WiiUProButtons::R, JoypadButtons::R),
            (WiiUProButtons::ZL, JoypadButtons::L2),
            (WiiUProButtons::ZR, JoypadButtons::R2),
            (WiiUProButtons::MINUS, JoypadButtons::SELECT),
            (WiiUProButtons::PLUS, JoypadButtons::START),
            (WiiUProButtons::HOME, JoypadButtons::MENU_TOGGLE),
            (WiiUProButtons::L3, JoypadButtons::L3),
            (WiiUProButtons::R3, JoypadButtons::R3),
            (WiiUProButtons::UP, JoypadButtons::UP),
            (WiiUProButtons::DOWN, JoypadButtons::DOWN),
            (WiiUProButtons::LEFT, JoypadButtons::LEFT),
            (WiiUProButtons::RIGHT, JoypadButtons::RIGHT),
        ];

        MAP.iter()
            .filter(|(pad, _)| self.contains(*pad))
            .fold(JoypadButtons::empty(), |acc, (_, joy)| acc | *joy)
    }
}

/// Connection state for one Wii U Pro Controller.
#[derive(Debug)]
pub struct WiiUPro<C: SendControl> {
    slot: u32,
    control: C,
    buttons: WiiUProButtons,
    rumble: [u16; 2],
}

impl<C: SendControl> WiiUPro<C> {
    /// Attach to a freshly connected pad and request its status.
    pub fn new(slot: u32, mut control: C) -> Self {
        control.send_control(&STATUS_REQUEST);
        debug!(slot, "wii u pro connected");
        Self {
            slot,
            control,
            buttons: WiiUProButtons::empty(),
            rumble: [0; 2],
        }
    }

    pub fn slot(&self) -> u32 {
        self.slot
    }

    pub fn pad_buttons(&self) -> WiiUProButtons {
        self.buttons
    }

    /// Last strength requested for `effect`. Nothing is sent to the pad.
    pub fn rumble(&self, effect: RumbleEffect) -> u16 {
        match effect {
            RumbleEffect::Strong => self.rumble[0],
            RumbleEffect::Weak => self.rumble[1],
        }
    }

    pub fn control(&self) -> &C {
        &self.control
    }
}

impl<C: SendControl> PadConnection for WiiUPro<C> {
    fn packet_handler(&mut self, packet: &[u8]) {
        match WiiUProButtons::decode(packet) {
            Ok(buttons) => self.buttons = buttons,
            Err(err) => debug!(slot = self.slot, %err, "dropping wii u pro report"),
        }
    }

    fn set_rumble(&mut self, effect: RumbleEffect, strength: u16) {
        // TODO: send the rumble output report once its layout is known.
        match effect {
            RumbleEffect::Strong => self.rumble[0] = strength,
            RumbleEffect::Weak => self.rumble[1] = strength,
        }
    }

    fn buttons(&self) -> JoypadButtons {
        self.buttons.to_joypad()
    }

    fn axis(&self, _axis: u32) -> i16 {
        0
    }
}
