//! HID keyboard usage IDs for the keys on this keyboard, from the USB HID
//! Usage Tables, Keyboard/Keypad page (0x07).

/// Reported in every keycode slot when more keys are held than the boot
/// protocol can carry.
pub const ERROR_ROLLOVER: u8 = 0x01;

pub const A: u8 = 0x04;
pub const B: u8 = 0x05;
pub const C: u8 = 0x06;
pub const D: u8 = 0x07;
pub const E: u8 = 0x08;
pub const F: u8 = 0x09;
pub const G: u8 = 0x0A;
pub const H: u8 = 0x0B;
pub const I: u8 = 0x0C;
pub const J: u8 = 0x0D;
pub const K: u8 = 0x0E;
pub const L: u8 = 0x0F;
pub const M: u8 = 0x10;
pub const N: u8 = 0x11;
pub const O: u8 = 0x12;
pub const P: u8 = 0x13;
pub const Q: u8 = 0x14;
pub const R: u8 = 0x15;
pub const S: u8 = 0x16;
pub const T: u8 = 0x17;
pub const U: u8 = 0x18;
pub const V: u8 = 0x19;
pub const W: u8 = 0x1A;
pub const X: u8 = 0x1B;
pub const Y: u8 = 0x1C;
pub const Z: u8 = 0x1D;

pub const KB1: u8 = 0x1E;
pub const KB2: u8 = 0x1F;
pub const KB3: u8 = 0x20;
pub const KB4: u8 = 0x21;
pub const KB5: u8 = 0x22;
pub const KB6: u8 = 0x23;
pub const KB7: u8 = 0x24;
pub const KB8: u8 = 0x25;
pub const KB9: u8 = 0x26;
pub const KB0: u8 = 0x27;

pub const ENTER: u8 = 0x28;
pub const ESCAPE: u8 = 0x29;
pub const BACKSPACE: u8 = 0x2A;
pub const TAB: u8 = 0x2B;
pub const SPACE: u8 = 0x2C;
pub const MINUS: u8 = 0x2D;
pub const EQUAL: u8 = 0x2E;
pub const OPEN_BRACKET: u8 = 0x2F;
pub const CLOSE_BRACKET: u8 = 0x30;
pub const BACKSLASH: u8 = 0x31;
pub const SEMICOLON: u8 = 0x33;
pub const APOSTROPHE: u8 = 0x34;
pub const GRAVE: u8 = 0x35;
pub const COMMA: u8 = 0x36;
pub const DOT: u8 = 0x37;
pub const SLASH: u8 = 0x38;
pub const CAPS_LOCK: u8 = 0x39;

pub const RIGHT_ARROW: u8 = 0x4F;
pub const LEFT_ARROW: u8 = 0x50;
pub const DOWN_ARROW: u8 = 0x51;
pub const UP_ARROW: u8 = 0x52;

/// The dedicated "Return" usage; distinct from [`ENTER`].
pub const RETURN: u8 = 0x9E;

pub const LEFT_CONTROL: u8 = 0xE0;
pub const LEFT_SHIFT: u8 = 0xE1;
pub const LEFT_ALT: u8 = 0xE2;
pub const LEFT_GUI: u8 = 0xE3;
pub const RIGHT_CONTROL: u8 = 0xE4;
pub const RIGHT_SHIFT: u8 = 0xE5;
pub const RIGHT_ALT: u8 = 0xE6;
pub const RIGHT_GUI: u8 = 0xE7;

/// Bit for `code` in byte 0 of the boot keyboard report, if `code` is one
/// of the eight modifier usages (0xE0..=0xE7).
pub fn modifier_bitmask(code: u8) -> Option<u8> {
    if (LEFT_CONTROL..=RIGHT_GUI).contains(&code) {
        Some(1 << (code - LEFT_CONTROL))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modifier_bits_follow_report_layout() {
        assert_eq!(modifier_bitmask(LEFT_CONTROL), Some(0x01));
        assert_eq!(modifier_bitmask(LEFT_SHIFT), Some(0x02));
        assert_eq!(modifier_bitmask(LEFT_ALT), Some(0x04));
        assert_eq!(modifier_bitmask(LEFT_GUI), Some(0x08));
        assert_eq!(modifier_bitmask(RIGHT_CONTROL), Some(0x10));
        assert_eq!(modifier_bitmask(RIGHT_SHIFT), Some(0x20));
        assert_eq!(modifier_bitmask(RIGHT_ALT), Some(0x40));
        assert_eq!(modifier_bitmask(RIGHT_GUI), Some(0x80));
        assert_eq!(modifier_bitmask(A), None);
        assert_eq!(modifier_bitmask(CAPS_LOCK), None);
    }
}
