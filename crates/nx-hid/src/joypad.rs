//! Frontend joypad button ids.

use bitflags::bitflags;

/// Bit index of the menu toggle hotkey in the frontend's combined button/meta-key mask.
pub const MENU_TOGGLE_ID: u32 = 42;

bitflags! {
    /// Pressed buttons as reported to the frontend, one bit per button id.
    #[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
    pub struct JoypadButtons: u64 {
        const B = 1 << 0;
        const Y = 1 << 1;
        const SELECT = 1 << 2;
        const START = 1 << 3;
        const UP = 1 << 4;
        const DOWN = 1 << 5;
        const LEFT = 1 << 6;
        const RIGHT = 1 << 7;
        const A = 1 << 8;
        const X = 1 << 9;
        const L = 1 << 10;
        const R = 1 << 11;
        const L2 = 1 << 12;
        const R2 = 1 << 13;
        const L3 = 1 << 14;
        const R3 = 1 << 15;
        const MENU_TOGGLE = 1 << MENU_TOGGLE_ID;
    }
}
