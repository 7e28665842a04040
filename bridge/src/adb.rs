//! ADB (Apple Desktop Bus) host engine and mouse poller.
//!
//! ADB is a single-wire, open-drain serial bus. The host bit-bangs command
//! frames onto the line, then releases it and measures the device's reply
//! as a train of low pulses: the width of each pulse encodes the bit. All
//! timing is in microseconds, so the whole exchange runs with interrupts
//! off (attested by the [`CriticalSection`] token); ISR latency beyond
//! ~25 µs would corrupt the pulse-width measurements.
//!
//! Timing reference: Microchip AN591, plus the Apple technote on the
//! Classic Apple Mouse Protocol for the register-0 layout.

use critical_section::CriticalSection;

use crate::port::{AdbPort, TICKS_PER_US};

/// Talk command for register 0 of the device at address 3: `0011` address,
/// `11` Talk, `00` register. Register 0 is where a mouse publishes buttons
/// and motion.
pub const TALK_MOUSE_REG0: u8 = 0x3C;

/// Hard cap on any single wait-for-edge, in microseconds.
const EDGE_TIMEOUT_US: u16 = 255;

/// Low pulses shorter than this are 1 bits; longer ones are 0 bits.
const LOW_ONE_THRESHOLD_US: u16 = 50;

/// Stop-to-Start wait (Tlt in AN591) between our command's stop bit and
/// the first edge of the reply. The app note specifies 160 µs minimum;
/// this waits only 100 µs so the wait-for-edge loop (and its timeout, the
/// only thing that detects an idle bus) engages promptly. Tunable if a
/// device turns out to need the full interval.
const STOP_TO_START_US: u16 = 100;

/// The device did not drive an expected edge in time. An idle bus (the
/// mouse has nothing to report, or no device is attached) surfaces as
/// this; it is not a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeout;

/// Accumulated state of the ADB mouse, owned as one value and folded into
/// a HID report by the caller.
pub struct Mouse {
    acc_x: i16,
    acc_y: i16,
    button1: bool,
    button2: bool,
}

impl Default for Mouse {
    fn default() -> Self {
        Self::new()
    }
}

impl Mouse {
    pub const fn new() -> Self {
        Self {
            acc_x: 0,
            acc_y: 0,
            button1: false,
            button2: false,
        }
    }

    /// Reset the bus and give the device controller time to start up:
    /// idle high, then hold the line low for over 3 ms, then release.
    pub fn init(port: &mut impl AdbPort) {
        port.set_output();
        port.write(true);
        port.delay_us(10_000);
        port.write(false);
        port.delay_us(4_000);
        port.write(true);
    }

    /// One Talk-register-0 exchange with the mouse.
    ///
    /// Returns `true` if the mouse reported a state change, which has been
    /// folded into the accumulators and button state. A timeout means the
    /// mouse had nothing to say (or is absent) and leaves every output
    /// untouched; it is expected on nearly every quiet poll and is not
    /// logged or retried.
    pub fn poll<P: AdbPort>(&mut self, port: &mut P, _cs: CriticalSection<'_>) -> bool {
        write_command(port, TALK_MOUSE_REG0);
        match read16(port) {
            Ok(register) => {
                self.apply_register(register);
                true
            }
            Err(Timeout) => false,
        }
    }

    /// Fold one register-0 value into the accumulated state.
    ///
    /// Layout per the Classic Apple Mouse Protocol: bit 15 = button 1
    /// (active low), bits 14..8 = Y delta, bit 7 = button 2 (active low,
    /// always 1 on one-button mice), bits 6..0 = X delta.
    pub fn apply_register(&mut self, register: u16) {
        // Buttons are replaced, not OR-ed: each report carries the current
        // instantaneous state.
        self.button1 = register & 0x8000 == 0;
        self.button2 = register & 0x0080 == 0;
        let dx = decode_delta((register & 0x007F) as u8);
        let dy = decode_delta(((register >> 8) & 0x007F) as u8);
        self.acc_x = saturate(self.acc_x + dx);
        self.acc_y = saturate(self.acc_y + dy);
    }

    /// Button bitmask in boot-report layout: bit 0 = button 1, bit 1 =
    /// button 2.
    pub fn buttons(&self) -> u8 {
        u8::from(self.button1) | u8::from(self.button2) << 1
    }

    /// Accumulated X motion; always within `[-127, 127]`.
    pub fn delta_x(&self) -> i8 {
        self.acc_x as i8
    }

    pub fn delta_y(&self) -> i8 {
        self.acc_y as i8
    }

    /// Restart accumulation from zero. Call once a report has actually
    /// reached the host, and only then; motion sampled while the endpoint
    /// was busy must keep accumulating.
    pub fn clear_motion(&mut self) {
        self.acc_x = 0;
        self.acc_y = 0;
    }
}

/// 7-bit delta field: values below 0x40 are positive, the rest wrap
/// negative (0x7F = −1, 0x40 = −64).
fn decode_delta(field: u8) -> i16 {
    if field < 0x40 {
        i16::from(field)
    } else {
        i16::from(field) - 0x80
    }
}

fn saturate(value: i16) -> i16 {
    value.clamp(-127, 127)
}

/// True if a low pulse of the given width encodes a 1 bit.
fn is_one(low_us: u16) -> bool {
    low_us < LOW_ONE_THRESHOLD_US
}

/// Write one bit cell. Cells are nominally 100 µs: a 0 is 65 µs low +
/// 35 µs high, a 1 is 35 µs low + 65 µs high.
fn write_bit(port: &mut impl AdbPort, low_us: u16, high_us: u16) {
    port.write(false);
    port.delay_us(low_us);
    port.write(true);
    port.delay_us(high_us);
}

fn write_zero(port: &mut impl AdbPort) {
    write_bit(port, 65, 35);
}

fn write_one(port: &mut impl AdbPort) {
    write_bit(port, 35, 65);
}

/// Write a command frame: attention, sync, eight bit cells MSB first, and
/// a 0 stop bit. The line must be a high output on entry and is left that
/// way.
fn write_command(port: &mut impl AdbPort, mut command: u8) {
    // Attention: low for 800 µs, then sync: high for 70 µs.
    port.write(false);
    port.delay_us(800);
    port.write(true);
    port.delay_us(70);
    for _ in 0..8 {
        if command & 0x80 != 0 {
            write_one(port);
        } else {
            write_zero(port);
        }
        command <<= 1;
    }
    write_zero(port);
}

/// Releases the line for reception and guarantees it is back to a driven,
/// idle-high output on every exit path, including timeouts.
struct ReceiveGuard<'a, P: AdbPort> {
    port: &'a mut P,
}

impl<'a, P: AdbPort> ReceiveGuard<'a, P> {
    fn new(port: &'a mut P) -> Self {
        port.set_input();
        Self { port }
    }
}

impl<P: AdbPort> core::ops::Deref for ReceiveGuard<'_, P> {
    type Target = P;

    fn deref(&self) -> &P {
        self.port
    }
}

impl<P: AdbPort> core::ops::DerefMut for ReceiveGuard<'_, P> {
    fn deref_mut(&mut self) -> &mut P {
        self.port
    }
}

impl<P: AdbPort> Drop for ReceiveGuard<'_, P> {
    fn drop(&mut self) {
        self.port.set_output();
        self.port.write(true);
    }
}

/// Wait until the line reads `level`, returning the microseconds it took.
fn wait_for(port: &mut impl AdbPort, level: bool) -> Result<u16, Timeout> {
    let start = port.now_ticks();
    loop {
        if port.read() == level {
            return Ok(port.now_ticks().wrapping_sub(start) / TICKS_PER_US);
        }
        if port.now_ticks().wrapping_sub(start) / TICKS_PER_US >= EDGE_TIMEOUT_US {
            return Err(Timeout);
        }
    }
}

/// Read the 16-bit register reply: 18 low pulses (start bit, 16 data bits,
/// stop bit), each bounded by [`EDGE_TIMEOUT_US`] per edge.
fn read16(port: &mut impl AdbPort) -> Result<u16, Timeout> {
    let mut line = ReceiveGuard::new(port);
    line.delay_us(STOP_TO_START_US);

    let mut low_duration = [0u16; 18];
    for slot in low_duration.iter_mut() {
        wait_for(&mut *line, false)?;
        *slot = wait_for(&mut *line, true)?;
    }

    // The start bit is dropped; data is MSB first.
    let mut register = 0u16;
    for &low_us in &low_duration[1..17] {
        register = register << 1 | u16::from(is_one(low_us));
    }
    Ok(register)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A scripted ADB wire. Time is virtual: every port operation advances
    /// the clock by one tick, and `delay_us` (the trait's spin-wait
    /// default) advances it by the full delay, so the engine's timing
    /// behavior runs unmodified against it.
    struct FakeWire {
        now: u64,
        output: bool,
        driven: bool,
        /// Register the device will answer with on the next reception.
        pending: Option<u16>,
        /// Intervals (in absolute ticks) when the device holds the line
        /// low.
        response: [(u64, u64); 18],
        response_len: usize,
        /// Host write events, for frame inspection.
        writes: [(u64, bool); 64],
        writes_len: usize,
    }

    /// Ticks between the host releasing the line and the device's start
    /// bit.
    const DEVICE_TLT: u64 = 150 * TICKS_PER_US as u64;

    impl FakeWire {
        fn idle() -> Self {
            Self {
                now: 0,
                output: false,
                driven: true,
                pending: None,
                response: [(0, 0); 18],
                response_len: 0,
                writes: [(0, false); 64],
                writes_len: 0,
            }
        }

        fn with_response(register: u16) -> Self {
            let mut wire = Self::idle();
            wire.pending = Some(register);
            wire
        }

        fn device_level_at(&self, t: u64) -> bool {
            for &(low, high) in &self.response[..self.response_len] {
                if t >= low && t < high {
                    return false;
                }
            }
            true
        }

        /// Low-pulse widths of everything the host drove, in µs.
        fn host_low_pulses(&self) -> std::vec::Vec<u16> {
            let mut pulses = std::vec::Vec::new();
            let mut low_at = None;
            for &(t, level) in &self.writes[..self.writes_len] {
                match (level, low_at) {
                    (false, None) => low_at = Some(t),
                    (true, Some(start)) => {
                        pulses.push(((t - start) / TICKS_PER_US as u64) as u16);
                        low_at = None;
                    }
                    _ => {}
                }
            }
            pulses
        }
    }

    impl AdbPort for FakeWire {
        fn set_output(&mut self) {
            self.output = true;
        }

        fn set_input(&mut self) {
            self.output = false;
            if let Some(register) = self.pending.take() {
                let mut bits = [false; 18];
                bits[0] = true; // start bit
                for i in 0..16 {
                    bits[1 + i] = register & 1 << (15 - i) != 0;
                }
                // bits[17] is the 0 stop bit
                let cell = 100 * TICKS_PER_US as u64;
                let mut t = self.now + DEVICE_TLT;
                for (slot, bit) in self.response.iter_mut().zip(bits) {
                    let low_us: u64 = if bit { 35 } else { 65 };
                    *slot = (t, t + low_us * TICKS_PER_US as u64);
                    t += cell;
                }
                self.response_len = 18;
            }
        }

        fn write(&mut self, level: bool) {
            self.driven = level;
            if self.writes_len < self.writes.len() {
                self.writes[self.writes_len] = (self.now, level);
                self.writes_len += 1;
            }
            self.now += 1;
        }

        fn read(&mut self) -> bool {
            self.now += 1;
            if self.output {
                self.driven
            } else {
                self.device_level_at(self.now)
            }
        }

        fn now_ticks(&mut self) -> u16 {
            self.now += 1;
            (self.now & 0xFFFF) as u16
        }
    }

    fn close(actual: u16, nominal: u16) -> bool {
        actual.abs_diff(nominal) <= 2
    }

    #[test]
    fn delta_field_round_trips() {
        for delta in -64i16..=63 {
            let field = (delta as u8) & 0x7F;
            assert_eq!(decode_delta(field), delta, "field {field:#04x}");
        }
    }

    #[test]
    fn low_pulse_classification_threshold() {
        for low_us in 0..50u16 {
            assert!(is_one(low_us), "{low_us} µs");
        }
        for low_us in 50..=255u16 {
            assert!(!is_one(low_us), "{low_us} µs");
        }
    }

    #[test]
    fn all_buttons_no_motion() {
        let mut mouse = Mouse::new();
        mouse.apply_register(0x0000);
        assert_eq!(mouse.buttons(), 0x3);
        assert_eq!((mouse.delta_x(), mouse.delta_y()), (0, 0));
    }

    #[test]
    fn no_buttons_no_motion() {
        let mut mouse = Mouse::new();
        mouse.apply_register(0x0000);
        mouse.apply_register(0x8080);
        // Buttons are replaced, not OR-ed.
        assert_eq!(mouse.buttons(), 0);
        assert_eq!((mouse.delta_x(), mouse.delta_y()), (0, 0));
    }

    #[test]
    fn motion_accumulates_across_polls() {
        let mut mouse = Mouse::new();
        mouse.apply_register(0x8003);
        mouse.apply_register(0x8003);
        assert_eq!(mouse.delta_x(), 6);
        assert_eq!(mouse.delta_y(), 0);
    }

    #[test]
    fn accumulators_saturate() {
        let mut mouse = Mouse::new();
        // Drive acc_x to -126 with -63 steps (0x41 = -63), then -2 more.
        mouse.apply_register(0x8041);
        mouse.apply_register(0x8041);
        assert_eq!(mouse.delta_x(), -126);
        mouse.apply_register(0x807E);
        assert_eq!(mouse.delta_x(), -127);
        // And the positive rail.
        for _ in 0..10 {
            mouse.apply_register(0x803F);
        }
        assert_eq!(mouse.delta_x(), 127);
        assert!(mouse.delta_y() == 0);
    }

    #[test]
    fn clear_motion_keeps_buttons() {
        let mut mouse = Mouse::new();
        mouse.apply_register(0x0005);
        mouse.clear_motion();
        assert_eq!((mouse.delta_x(), mouse.delta_y()), (0, 0));
        assert_eq!(mouse.buttons(), 0x3);
    }

    #[test]
    fn command_frame_on_the_wire() {
        let mut wire = FakeWire::idle();
        wire.set_output();
        wire.write(true);
        wire.writes_len = 0; // keep only the frame itself
        write_command(&mut wire, TALK_MOUSE_REG0);

        let pulses = wire.host_low_pulses();
        // Attention, eight command bits, stop bit.
        assert_eq!(pulses.len(), 10);
        assert!(close(pulses[0], 800), "attention {} µs", pulses[0]);
        // 0x3C MSB first: 0 0 1 1 1 1 0 0, then the 0 stop bit.
        let nominal = [65, 65, 35, 35, 35, 35, 65, 65, 65];
        for (bit, (&actual, &expected)) in pulses[1..].iter().zip(&nominal).enumerate() {
            assert!(close(actual, expected), "bit {bit}: {actual} µs");
        }
    }

    #[test]
    fn read16_decodes_a_response() {
        let mut wire = FakeWire::with_response(0xA5C3);
        wire.set_output();
        wire.write(true);
        assert_eq!(read16(&mut wire), Ok(0xA5C3));
        // Direction restored for the next command.
        assert!(wire.output);
        assert!(wire.driven);
    }

    #[test]
    fn poll_folds_a_report_into_state() {
        // Bit 7 set: button 2 (active low) is released.
        let mut wire = FakeWire::with_response(0x8083);
        let mut mouse = Mouse::new();
        Mouse::init(&mut wire);
        let reported = critical_section::with(|cs| mouse.poll(&mut wire, cs));
        assert!(reported);
        assert_eq!(mouse.delta_x(), 3);
        assert_eq!(mouse.delta_y(), 0);
        assert_eq!(mouse.buttons(), 0);
    }

    #[test]
    fn wire_polls_replace_buttons() {
        // 0x0000: both buttons down (active low), no motion; then 0x8080:
        // both released, still no motion.
        let mut wire = FakeWire::with_response(0x0000);
        let mut mouse = Mouse::new();
        Mouse::init(&mut wire);
        assert!(critical_section::with(|cs| mouse.poll(&mut wire, cs)));
        assert_eq!(mouse.buttons(), 0x3);
        assert_eq!((mouse.delta_x(), mouse.delta_y()), (0, 0));
        wire.pending = Some(0x8080);
        assert!(critical_section::with(|cs| mouse.poll(&mut wire, cs)));
        assert_eq!(mouse.buttons(), 0);
        assert_eq!((mouse.delta_x(), mouse.delta_y()), (0, 0));
    }

    #[test]
    fn wire_polls_accumulate_motion() {
        // Two successive reports of X = +3.
        let mut wire = FakeWire::with_response(0x8003);
        let mut mouse = Mouse::new();
        Mouse::init(&mut wire);
        assert!(critical_section::with(|cs| mouse.poll(&mut wire, cs)));
        wire.pending = Some(0x8003);
        assert!(critical_section::with(|cs| mouse.poll(&mut wire, cs)));
        assert_eq!(mouse.delta_x(), 6);
        assert_eq!(mouse.delta_y(), 0);
    }

    #[test]
    fn wire_poll_saturates_at_the_negative_rail() {
        // X field 0x7E is -2; from -126 the accumulator pins at -127.
        let mut wire = FakeWire::with_response(0x807E);
        let mut mouse = Mouse::new();
        Mouse::init(&mut wire);
        mouse.apply_register(0x8041);
        mouse.apply_register(0x8041);
        assert_eq!(mouse.delta_x(), -126);
        assert!(critical_section::with(|cs| mouse.poll(&mut wire, cs)));
        assert_eq!(mouse.delta_x(), -127);
    }

    #[test]
    fn idle_bus_times_out_benignly() {
        let mut wire = FakeWire::idle();
        let mut mouse = Mouse::new();
        Mouse::init(&mut wire);
        mouse.apply_register(0x8085); // pre-existing motion to protect
        let reported = critical_section::with(|cs| mouse.poll(&mut wire, cs));
        assert!(!reported);
        assert_eq!(mouse.delta_x(), 5);
        assert_eq!(mouse.buttons(), 0);
        // The line is back to a driven, idle-high output.
        assert!(wire.output);
        assert!(wire.driven);
    }

    #[test]
    fn init_holds_a_reset_pulse() {
        let mut wire = FakeWire::idle();
        Mouse::init(&mut wire);
        let pulses = wire.host_low_pulses();
        assert_eq!(pulses.len(), 1);
        // u16 µs readout of a 4 ms pulse: 4000 µs fits comfortably.
        assert!(pulses[0] >= 3000, "reset pulse {} µs", pulses[0]);
    }
}
