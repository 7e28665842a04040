//! Device-independent logic for a composite keyboard/mouse bridge: an ADB
//! (Apple Desktop Bus) host engine that polls a single mouse or trackball,
//! and a switch-matrix scanner with ghost suppression. The firmware crate
//! binds these to real pins and a real timer; everything here runs against
//! the [`port::AdbPort`] seam and plain state values, so it is unit tested
//! on the host.

#![no_std]

#[cfg(test)]
extern crate std;

pub mod adb;
pub mod key_codes;
pub mod keymap;
pub mod matrix;
pub mod port;
pub mod report;
