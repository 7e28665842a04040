//! The ADB data line, bound to a GPIO and the system timer.

use adb_bridge::port::{AdbPort, TICKS_PER_US};
use embedded_hal::digital::v2::{InputPin, OutputPin};
use rp2040_hal::gpio::DynPin;
use rp2040_hal::Timer;

/// One open-drain wire, made from a direction-switched pin: output to pull
/// the bus low, input-with-pull-up to release it.
pub struct AdbLine<'a> {
    pin: DynPin,
    timer: &'a Timer,
}

impl<'a> AdbLine<'a> {
    /// Takes ownership of the data-line pin and leaves it driving idle
    /// high.
    pub fn new(mut pin: DynPin, timer: &'a Timer) -> Self {
        pin.into_push_pull_output();
        let mut line = Self { pin, timer };
        line.write(true);
        line
    }
}

impl AdbPort for AdbLine<'_> {
    fn set_output(&mut self) {
        self.pin.into_push_pull_output();
    }

    fn set_input(&mut self) {
        self.pin.into_pull_up_input();
    }

    fn write(&mut self, level: bool) {
        if level {
            self.pin.set_high().unwrap();
        } else {
            self.pin.set_low().unwrap();
        }
    }

    fn read(&mut self) -> bool {
        self.pin.is_high().unwrap()
    }

    fn now_ticks(&mut self) -> u16 {
        // The RP2040 timer ticks once per µs; scale its low word onto the
        // 2-ticks-per-µs contract. Wrapping is part of the contract.
        (self.timer.get_counter_low() as u16).wrapping_mul(TICKS_PER_US)
    }
}
