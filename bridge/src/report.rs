//! USB HID boot report construction.

use crate::key_codes::{self, ERROR_ROLLOVER};

/// A boot-protocol keyboard report: modifier bitmask, reserved byte, six
/// keycode slots.
#[derive(Default, Debug, Copy, Clone, Eq, PartialEq)]
pub struct KbHidReport([u8; 8]);

impl core::ops::Deref for KbHidReport {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl KbHidReport {
    pub const fn empty() -> Self {
        Self([0u8; 8])
    }

    /// Add the given usage to the report. Modifiers set their bit in byte
    /// 0 and are immune to rollover; anything else takes the next free
    /// keycode slot. A seventh non-modifier floods all six slots with
    /// `ErrorRollOver` as the HID spec requires, and the flood is sticky:
    /// later non-modifiers find no free slot and flood again.
    pub fn pressed(&mut self, code: u8) {
        if let Some(bit) = key_codes::modifier_bitmask(code) {
            self.0[0] |= bit;
            return;
        }
        match self.0[2..].iter_mut().find(|slot| **slot == 0) {
            Some(slot) => *slot = code,
            None => self.set_all(ERROR_ROLLOVER),
        }
    }

    fn set_all(&mut self, code: u8) {
        for slot in &mut self.0[2..] {
            *slot = code;
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Build the keyboard report from the cooked key vector, walking usages in
/// ascending order.
pub fn keyboard_report(key_pressed: &[bool; 256]) -> KbHidReport {
    let mut report = KbHidReport::empty();
    for code in 1..=255u8 {
        if key_pressed[code as usize] {
            report.pressed(code);
        }
    }
    report
}

/// A boot-protocol mouse report: button bitmask, X delta, Y delta.
#[derive(Default, Debug, Copy, Clone, Eq, PartialEq)]
pub struct MouseHidReport([u8; 3]);

impl MouseHidReport {
    pub fn new(buttons: u8, x: i8, y: i8) -> Self {
        Self([buttons, x as u8, y as u8])
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_codes::*;

    fn keys(codes: &[u8]) -> [bool; 256] {
        let mut pressed = [false; 256];
        for &code in codes {
            pressed[code as usize] = true;
        }
        pressed
    }

    #[test]
    fn empty_report_is_all_zero() {
        let report = keyboard_report(&keys(&[]));
        assert_eq!(report.as_bytes(), &[0; 8]);
    }

    #[test]
    fn six_keys_fill_the_slots_in_usage_order() {
        let report = keyboard_report(&keys(&[B, A, Z, Q, KB1, SPACE]));
        assert_eq!(report.as_bytes(), &[0, 0, A, B, Q, Z, KB1, SPACE]);
    }

    #[test]
    fn modifiers_use_the_bitmask_not_the_slots() {
        let report = keyboard_report(&keys(&[LEFT_CONTROL, RIGHT_SHIFT, A]));
        assert_eq!(report.as_bytes(), &[0x01 | 0x20, 0, A, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn seventh_key_floods_error_rollover() {
        let report = keyboard_report(&keys(&[A, B, C, D, E, F, G]));
        let e = ERROR_ROLLOVER;
        assert_eq!(report.as_bytes(), &[0, 0, e, e, e, e, e, e]);
    }

    #[test]
    fn rollover_spares_the_modifier_bits() {
        // Shift plus seven letters: the slots flood but Shift still
        // reaches the host.
        let report = keyboard_report(&keys(&[LEFT_SHIFT, A, B, C, D, E, F, G]));
        let e = ERROR_ROLLOVER;
        assert_eq!(report.as_bytes(), &[0x02, 0, e, e, e, e, e, e]);
    }

    #[test]
    fn mouse_report_packs_buttons_and_deltas() {
        let report = MouseHidReport::new(0x3, -5, 127);
        assert_eq!(report.as_bytes(), &[0x3, 0xFB, 0x7F]);
    }
}
