//! Hardware sweep of the keyboard switch matrix.

use adb_bridge::keymap::{COLS, ROWS};
use adb_bridge::matrix::{MatrixState, ROWS_PER_SCAN};
use cortex_m::delay::Delay;
use embedded_hal::digital::v2::{InputPin, OutputPin};
use rp2040_hal::gpio::DynPin;

pub struct MatrixPins {
    rows: [DynPin; ROWS],
    cols: [DynPin; COLS],
}

impl MatrixPins {
    /// Takes ownership of the matrix pins. Everything starts released:
    /// idle rows must only ever be pulled up, never driven high, so that
    /// two presses in one column cannot short two driven outputs together.
    pub fn new(mut rows: [DynPin; ROWS], mut cols: [DynPin; COLS]) -> Self {
        for pin in rows.iter_mut() {
            pin.into_pull_up_input();
        }
        for pin in cols.iter_mut() {
            pin.into_pull_up_input();
        }
        Self { rows, cols }
    }

    /// Sweep [`ROWS_PER_SCAN`] rows and fold the samples into `state`.
    /// Incremental on purpose: a full-matrix sweep in one call would sit
    /// on the settle delays for too long between USB services.
    pub fn scan(&mut self, state: &mut MatrixState, delay: &mut Delay) {
        for _ in 0..ROWS_PER_SCAN {
            let row = state.current_row();
            let pin = &mut self.rows[row];

            pin.into_push_pull_output();
            pin.set_low().unwrap();
            delay.delay_us(100); // let voltages settle

            let mut sampled: u16 = 0;
            for (col, col_pin) in self.cols.iter().enumerate() {
                if col_pin.is_low().unwrap() {
                    sampled |= 1 << col;
                }
            }
            state.apply_row(row, sampled);

            // Drive the row high briefly so it settles quickly, then hand
            // it back to the pull-up.
            pin.set_high().unwrap();
            delay.delay_us(20);
            pin.into_pull_up_input();

            state.advance_row();
        }
    }
}
