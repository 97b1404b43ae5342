//! HAL for the BCM2835 PWM controller
//!
//! This is an implementation of the [`embedded-hal`](https://crates.io/crates/embedded-hal)
//! PWM traits for the dual-channel PWM controller found in the BCM2835
//! family of SoCs.
//!
//! The crate only covers the controller itself. Mapping the register
//! window and resolving the PWM reference clock are platform concerns;
//! whatever integration layer owns the device hands the driver a base
//! pointer and a clock rate and keeps both valid for the driver's
//! lifetime.
//!
//! # Crate features
//!
//! * **defmt** -
//!   Implement `defmt::Format` for several types.

#![warn(missing_docs)]
#![no_std]

pub mod pwm;
