// Firmware for a composite USB HID bridge: a matrix-scanned PowerBook
// keyboard plus an ADB trackball, presented to the host as a boot-protocol
// keyboard and a boot-protocol mouse.

#![no_main]
#![no_std]

use adb_bridge::adb::Mouse;
use adb_bridge::key_codes;
use adb_bridge::keymap::{COLS, ROWS};
use adb_bridge::matrix::{MatrixState, ROWS_PER_SCAN};
use adb_bridge::report::{keyboard_report, KbHidReport, MouseHidReport};
use defmt::{error, info, warn};
use defmt_rtt as _;
use panic_probe as _;
use rp2040_hal::gpio::DynPin;
use rp2040_hal::pac::{self, interrupt};
use rp2040_hal::usb::UsbBus;
use rp2040_hal::{Clock, Sio, Timer, Watchdog};
use usb_device::bus::UsbBusAllocator;
use usb_device::prelude::*;
use usb_device::UsbError;
use usbd_hid::hid_class::{
    HIDClass, HidClassSettings, HidCountryCode, HidProtocol, HidSubClass, ProtocolModeConfig,
};

/// The linker will place this boot block at the start of our program image. We
/// need this to help the ROM bootloader get our code up and running.
#[link_section = ".boot2"]
#[used]
pub static BOOT2: [u8; 256] = rp2040_boot2::BOOT_LOADER_W25Q080;

mod bus;
mod hid_descriptor;
mod scan;

const EXTERNAL_CRYSTAL_FREQUENCY_HZ: u32 = 12_000_000;

/// The USB Device Driver (shared with the interrupt).
static mut USB_DEVICE: Option<UsbDevice<'static, UsbBus>> = None;

/// The USB Bus Driver (shared with the interrupt).
static mut USB_BUS: Option<UsbBusAllocator<UsbBus>> = None;

/// The two HID interfaces (shared with the interrupt).
static mut USB_KEYBOARD: Option<HIDClass<'static, UsbBus>> = None;
static mut USB_MOUSE: Option<HIDClass<'static, UsbBus>> = None;

#[defmt::panic_handler]
fn panic() -> ! {
    cortex_m::asm::udf()
}

#[cortex_m_rt::entry]
fn main() -> ! {
    info!("Start of main()");
    let mut pac = pac::Peripherals::take().unwrap();
    let core = pac::CorePeripherals::take().unwrap();

    let mut watchdog = Watchdog::new(pac.WATCHDOG);

    let clocks = rp2040_hal::clocks::init_clocks_and_plls(
        EXTERNAL_CRYSTAL_FREQUENCY_HZ,
        pac.XOSC,
        pac.CLOCKS,
        pac.PLL_SYS,
        pac.PLL_USB,
        &mut pac.RESETS,
        &mut watchdog,
    )
    .ok()
    .unwrap();

    // Setup USB
    let force_vbus_detect_bit = true;
    let usb_bus = UsbBus::new(
        pac.USBCTRL_REGS,
        pac.USBCTRL_DPRAM,
        clocks.usb_clock,
        force_vbus_detect_bit,
        &mut pac.RESETS,
    );

    let bus_allocator = UsbBusAllocator::new(usb_bus);
    unsafe {
        // Note (safety): This is safe as interrupts haven't been started yet
        USB_BUS = Some(bus_allocator);
    }
    // Grab a reference to the USB Bus allocator. We are promising to the
    // compiler not to take mutable access to this global variable whilst this
    // reference exists!
    let bus_ref = unsafe { USB_BUS.as_ref().unwrap() };

    // The endpoint poll rate also paces the keyboard: the matrix sweep runs
    // once per accepted report, two rows at a time.
    let poll_ms = 10;
    let keyboard_endpoint = HIDClass::new_with_settings(
        bus_ref,
        hid_descriptor::KEYBOARD_REPORT_DESCRIPTOR,
        poll_ms,
        HidClassSettings {
            subclass: HidSubClass::Boot,
            protocol: HidProtocol::Keyboard,
            config: ProtocolModeConfig::DefaultBehavior,
            locale: HidCountryCode::US,
        },
    );
    let mouse_endpoint = HIDClass::new_with_settings(
        bus_ref,
        hid_descriptor::MOUSE_REPORT_DESCRIPTOR,
        poll_ms,
        HidClassSettings {
            subclass: HidSubClass::Boot,
            protocol: HidProtocol::Mouse,
            config: ProtocolModeConfig::DefaultBehavior,
            locale: HidCountryCode::NotSupported,
        },
    );
    unsafe {
        // Note (safety): This is safe as interrupts haven't been started yet.
        USB_KEYBOARD = Some(keyboard_endpoint);
        USB_MOUSE = Some(mouse_endpoint);
    }

    info!("USB initialized");

    // https://github.com/obdev/v-usb/blob/7a28fdc685952412dad2b8842429127bc1cf9fa7/usbdrv/USB-IDs-for-free.txt#L128
    let composite_usb_device = UsbDeviceBuilder::new(bus_ref, UsbVidPid(0x16c0, 0x27db))
        .manufacturer("adb-bridge")
        .product("PowerBook keyboard + ADB trackball")
        .build();
    unsafe {
        // Note (safety): This is safe as interrupts haven't been started yet
        USB_DEVICE = Some(composite_usb_device);
    }

    // Get the GPIO peripherals.
    let sio = Sio::new(pac.SIO);
    let pins =
        rp2040_hal::gpio::Pins::new(pac.IO_BANK0, pac.PADS_BANK0, sio.gpio_bank0, &mut pac.RESETS);

    // Matrix rows 0..7.
    let rows: [DynPin; ROWS] = [
        pins.gpio2.into(),
        pins.gpio3.into(),
        pins.gpio4.into(),
        pins.gpio5.into(),
        pins.gpio6.into(),
        pins.gpio7.into(),
        pins.gpio8.into(),
        pins.gpio9.into(),
    ];

    // Matrix columns 0..15.
    let cols: [DynPin; COLS] = [
        pins.gpio10.into(),
        pins.gpio11.into(),
        pins.gpio12.into(),
        pins.gpio13.into(),
        pins.gpio14.into(),
        pins.gpio15.into(),
        pins.gpio16.into(),
        pins.gpio17.into(),
        pins.gpio18.into(),
        pins.gpio19.into(),
        pins.gpio20.into(),
        pins.gpio21.into(),
        pins.gpio26.into(),
        pins.gpio27.into(),
        pins.gpio28.into(),
        pins.gpio29.into(),
    ];

    // Timer-based resources.
    let mut delay = cortex_m::delay::Delay::new(core.SYST, clocks.system_clock.freq().to_Hz());
    let timer = Timer::new(pac.TIMER, &mut pac.RESETS);

    // The ADB trackball's data line.
    let mut adb = bus::AdbLine::new(pins.gpio1.into(), &timer);
    Mouse::init(&mut adb);
    let mut mouse = Mouse::new();

    let mut matrix = MatrixState::new();
    let mut matrix_pins = scan::MatrixPins::new(rows, cols);

    // One full sweep so every key has been sampled at least once.
    for _ in 0..ROWS / ROWS_PER_SCAN {
        matrix_pins.scan(&mut matrix, &mut delay);
    }

    // If the Escape key is held during power-on, we should go into bootloader
    // mode.
    if matrix.key_pressed(key_codes::ESCAPE) {
        let gpio_activity_pin_mask = 0;
        let disable_interface_mask = 0;
        rp2040_hal::rom_data::reset_to_usb_boot(gpio_activity_pin_mask, disable_interface_mask);
    }

    info!("setting interrupt");
    unsafe {
        pac::NVIC::unmask(pac::Interrupt::USBCTRL_IRQ);
    }
    info!("Start main loop");

    // One physical sweep per emitted keyboard report.
    let mut suppress_polling = false;
    let mut kbd_report = KbHidReport::empty();

    loop {
        // Keyboard task.
        if !suppress_polling {
            matrix_pins.scan(&mut matrix, &mut delay);
            kbd_report = keyboard_report(matrix.keys());
            suppress_polling = true;
        }
        match push_keyboard_report(&kbd_report) {
            Ok(_) => suppress_polling = false,
            Err(err) => log_usb_error(err),
        }

        // Mouse task. The trackball responds most smoothly when it is polled
        // at full rate; only the report emission is gated on the endpoint.
        critical_section::with(|cs| mouse.poll(&mut adb, cs));
        let mouse_report = MouseHidReport::new(mouse.buttons(), mouse.delta_x(), mouse.delta_y());
        match push_mouse_report(&mouse_report) {
            // The host has the motion now; accumulate the next batch from
            // zero.
            Ok(_) => mouse.clear_motion(),
            Err(err) => log_usb_error(err),
        }
    }
}

fn push_keyboard_report(report: &KbHidReport) -> Result<usize, UsbError> {
    critical_section::with(|_| unsafe {
        // Now interrupts are disabled, grab the global variable and, if
        // available, send it a HID report
        let endpoint = match USB_KEYBOARD.as_mut() {
            Some(endpoint) => endpoint,
            None => return Err(UsbError::InvalidState),
        };
        let written = endpoint.push_raw_input(report.as_bytes())?;
        // Drain one report of lock-LED state, should the host have sent
        // any. This keyboard has no LEDs.
        let _ = endpoint.pull_raw_output(&mut [0; 64]);
        Ok(written)
    })
}

fn push_mouse_report(report: &MouseHidReport) -> Result<usize, UsbError> {
    critical_section::with(|_| unsafe {
        match USB_MOUSE.as_mut() {
            Some(endpoint) => endpoint.push_raw_input(report.as_bytes()),
            None => Err(UsbError::InvalidState),
        }
    })
}

fn log_usb_error(err: UsbError) {
    match err {
        UsbError::WouldBlock => warn!("UsbError::WouldBlock"),
        UsbError::ParseError => error!("UsbError::ParseError"),
        UsbError::BufferOverflow => error!("UsbError::BufferOverflow"),
        UsbError::EndpointOverflow => error!("UsbError::EndpointOverflow"),
        UsbError::EndpointMemoryOverflow => error!("UsbError::EndpointMemoryOverflow"),
        UsbError::InvalidEndpoint => error!("UsbError::InvalidEndpoint"),
        UsbError::Unsupported => error!("UsbError::Unsupported"),
        UsbError::InvalidState => error!("UsbError::InvalidState"),
    }
}

#[allow(non_snake_case)]
#[interrupt]
unsafe fn USBCTRL_IRQ() {
    // Handle USB request
    let usb_dev = USB_DEVICE.as_mut().unwrap();
    let keyboard = USB_KEYBOARD.as_mut().unwrap();
    let mouse = USB_MOUSE.as_mut().unwrap();
    usb_dev.poll(&mut [keyboard, mouse]);
}
