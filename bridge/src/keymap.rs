//! Switch matrix geometry and the matrix → HID usage table.
//!
//! Matrix rows and columns are electrical, not physical: the keyboard is a
//! grid of row and column lines with a switch at each wired crossing, and
//! the modifier keys (GUI, Caps Lock, Shift, Alt, Control) each occupy a
//! whole column so they can be sensed alongside any primary key.

use crate::key_codes::*;

/// Number of row lines in the switch matrix.
pub const ROWS: usize = 8;
/// Number of column lines in the switch matrix.
pub const COLS: usize = 16;

const GUI: u8 = LEFT_GUI;
const CAPS: u8 = CAPS_LOCK;
const SHIFT: u8 = LEFT_SHIFT;
const ALT: u8 = LEFT_ALT;
const CTRL: u8 = LEFT_CONTROL;

/// HID usage for each row/column crossing; 0 means no switch is wired
/// there.
#[rustfmt::skip]
pub static MATRIX: [[u8; COLS]; ROWS] = [
    /* cols 0..8, then 8..16 */
    [0, EQUAL, KB5, KB4, 0, 0, 0, 0,
     0, GUI, CAPS, ESCAPE, SHIFT, ALT, CTRL, KB6],
    [U, RETURN, SEMICOLON, L, RIGHT_ARROW, D, UP_ARROW, 0,
     LEFT_ARROW, GUI, CAPS, BACKSPACE, SHIFT, ALT, CTRL, APOSTROPHE],
    [0, O, OPEN_BRACKET, BACKSLASH, 0, 0, 0, 0,
     0, GUI, CAPS, KB3, SHIFT, ALT, CTRL, KB9],
    [B, DOT, COMMA, J, F, 0, DOWN_ARROW, S,
     A, GUI, CAPS, H, SHIFT, ALT, CTRL, SLASH],
    [ENTER, 0, P, K, R, E, W, Q,
     TAB, GUI, CAPS, I, SHIFT, ALT, CTRL, CLOSE_BRACKET],
    [0, KB0, Y, G, 0, 0, 0, 0,
     0, GUI, CAPS, KB2, SHIFT, ALT, CTRL, KB8],
    [0, MINUS, T, GRAVE, 0, 0, 0, 0,
     0, GUI, CAPS, KB1, SHIFT, ALT, CTRL, KB7],
    [SPACE, 0, M, N, V, C, X, Z,
     0, GUI, CAPS, 0, SHIFT, ALT, CTRL, 0],
];

/// Columns whose switches have series diodes and therefore cannot take
/// part in a ghost. These are the full-column modifier keys (GUI, Caps
/// Lock, Shift, Alt, Control); without the exemption, holding one of them
/// with any other key would always look like a ghost.
pub const GHOST_FREE_COLUMNS: u16 =
    (1 << 9) | (1 << 10) | (1 << 12) | (1 << 13) | (1 << 14);

/// Whether `col` is exempt from ghost detection.
pub const fn is_ghost_free(col: usize) -> bool {
    GHOST_FREE_COLUMNS & (1 << col) != 0
}
