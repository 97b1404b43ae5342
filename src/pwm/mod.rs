//! Pulse Width Modulation (PWM)
//!
//! Driver for the BCM2835's dual-channel PWM controller. The two
//! channels share a single 32-bit control register, one byte lane per
//! channel; period and duty sit in dedicated per-channel registers and
//! are programmed in ticks of the PWM reference clock.
//!
//! The platform layer maps the register window and resolves the
//! reference clock; the driver is built from those two values and owns
//! the window from then on.
//!
//! ```no_run
//! use bcm2835_pwm_hal::pwm::{Channel, Polarity, Pwm};
//! use fugit::{ExtU32, RateExtU32};
//!
//! // Bus address 0x7e20c000, as the ARM sees it.
//! const PWM_BASE: usize = 0x2020_c000;
//!
//! let mut pwm = unsafe {
//!     Pwm::new(PWM_BASE as *const _, 9_200_000.Hz()).unwrap()
//! };
//!
//! pwm.request(Channel::Pwm0);
//! pwm.configure(Channel::Pwm0, 5_400.nanos(), 10_800.nanos()).unwrap();
//! pwm.set_polarity(Channel::Pwm0, Polarity::Inversed);
//! pwm.enable(Channel::Pwm0);
//! ```
//!
//! Once configured, the controller can be split into one handle per
//! channel, which implement the [embedded-hal](embedded_hal::pwm) PWM
//! traits:
//!
//! ```no_run
//! # use bcm2835_pwm_hal::pwm::{Channel, Pwm};
//! # use fugit::{ExtU32, RateExtU32};
//! use embedded_hal::pwm::SetDutyCycle;
//!
//! # let mut pwm = unsafe { Pwm::new(0x2020_c000 as *const _, 9_200_000.Hz()).unwrap() };
//! # pwm.request(Channel::Pwm0);
//! pwm.configure(Channel::Pwm0, 0.nanos(), 20_000.nanos()).unwrap();
//! let (mut ch0, _ch1) = pwm.split();
//! let half = ch0.max_duty_cycle() / 2;
//! ch0.set_duty_cycle(half).unwrap();
//! ```

use core::convert::Infallible;

use embedded_hal::pwm::{ErrorType, SetDutyCycle};
use fugit::{HertzU32, NanosDurationU32};

mod reg;

pub use reg::RegisterBlock;

use reg::{CTL_ENABLE, CTL_LANE_MASK, CTL_MODE_PWM, CTL_POLARITY, Registers};

const NANOS_PER_SEC: u32 = 1_000_000_000;

/// Shortest period the controller can generate.
///
/// The PWM clock tops out at 9.2 MHz, i.e. one 108 ns tick; only
/// strictly longer periods are accepted by [`Pwm::configure`].
pub const MIN_PERIOD: NanosDurationU32 = NanosDurationU32::from_ticks(108);

/// Channel ids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    /// Channel 0, byte lane `[0, 8)` of CTL
    Pwm0,
    /// Channel 1, byte lane `[8, 16)` of CTL
    Pwm1,
}

impl Channel {
    fn index(self) -> usize {
        match self {
            Channel::Pwm0 => 0,
            Channel::Pwm1 => 1,
        }
    }

    /// Bit position of this channel's CTL byte lane.
    fn lane_shift(self) -> u32 {
        8 * self.index() as u32
    }
}

impl TryFrom<u8> for Channel {
    type Error = Error;

    fn try_from(index: u8) -> Result<Self, Error> {
        match index {
            0 => Ok(Channel::Pwm0),
            1 => Ok(Channel::Pwm1),
            _ => Err(Error::InvalidChannel),
        }
    }
}

/// Active level of the output waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    /// Output is high during the duty portion of the period.
    Normal,
    /// Output is low during the duty portion of the period.
    Inversed,
}

/// Error type for PWM operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Requested period is at or below the hardware floor ([`MIN_PERIOD`]).
    UnsupportedPeriod,
    /// Reference clock is zero or above 1 GHz, so no whole-nanosecond
    /// tick scale can be derived from it.
    FrequencyOutOfRange,
    /// Channel index beyond the two hardware channels.
    InvalidChannel,
}

/// The dual-channel PWM controller.
///
/// All channel state lives in the hardware registers; the driver only
/// holds the register window and the tick scale derived from the
/// reference clock at construction.
pub struct Pwm {
    regs: Registers,
    /// Nanoseconds per tick of the reference clock.
    scaler: u32,
}

// The register window is only ever accessed through the one controller
// value, so moving it to another thread is fine. No `Sync`: sharing
// would let two threads interleave read-modify-writes on CTL.
unsafe impl Send for Pwm {}

impl Pwm {
    /// Number of hardware channels.
    pub const CHANNEL_COUNT: usize = 2;

    /// Create a driver for the controller behind `base`.
    ///
    /// `clock_freq` is the PWM reference clock as configured by the
    /// platform; the tick scale is derived from it once, truncating to
    /// whole nanoseconds. Frequencies of zero or above 1 GHz have no
    /// such scale and are rejected.
    ///
    /// # Safety
    ///
    /// `base` must point to the controller's mapped register window and
    /// remain valid, and not be accessed through any other path, for as
    /// long as the returned driver lives.
    pub unsafe fn new(base: *const RegisterBlock, clock_freq: HertzU32) -> Result<Self, Error> {
        let hz = clock_freq.to_Hz();
        if hz == 0 || hz > NANOS_PER_SEC {
            return Err(Error::FrequencyOutOfRange);
        }
        Ok(Pwm {
            regs: Registers::new(base),
            scaler: NANOS_PER_SEC / hz,
        })
    }

    /// Put the channel's output into PWM mode.
    ///
    /// The channel's whole control lane is reset in the same write, so
    /// any earlier enable or polarity setting is gone afterwards. The
    /// hardware never refuses this; callers wanting exclusive channel
    /// ownership track it themselves.
    pub fn request(&mut self, channel: Channel) {
        let value = self.regs.read_ctl() & !(CTL_LANE_MASK << channel.lane_shift());
        self.regs.write_ctl(value | (CTL_MODE_PWM << channel.lane_shift()));
    }

    /// Hand the channel back, clearing its control lane.
    ///
    /// Counterpart of [`request`](Self::request). Callers should
    /// [`disable`](Self::disable) the channel first rather than rely on
    /// the lane reset to stop the output.
    pub fn release(&mut self, channel: Channel) {
        let value = self.regs.read_ctl() & !(CTL_LANE_MASK << channel.lane_shift());
        self.regs.write_ctl(value);
    }

    /// Program duty and period for a channel.
    ///
    /// Both durations are converted to ticks by truncating division
    /// with the scale derived at construction; remainders are dropped,
    /// never rounded. Fails with [`Error::UnsupportedPeriod`], leaving
    /// the registers untouched, unless `period` is strictly longer than
    /// [`MIN_PERIOD`].
    ///
    /// The controller does not check `duty` against `period`; what the
    /// output does when duty exceeds the period is undefined. Callers
    /// must keep `duty <= period`.
    pub fn configure(
        &mut self,
        channel: Channel,
        duty: NanosDurationU32,
        period: NanosDurationU32,
    ) -> Result<(), Error> {
        if period <= MIN_PERIOD {
            return Err(Error::UnsupportedPeriod);
        }
        self.regs.write_duty(channel.index(), duty.ticks() / self.scaler);
        self.regs
            .write_period(channel.index(), period.ticks() / self.scaler);
        Ok(())
    }

    /// Start the channel's output. Idempotent.
    pub fn enable(&mut self, channel: Channel) {
        let value = self.regs.read_ctl() | (CTL_ENABLE << channel.lane_shift());
        self.regs.write_ctl(value);
    }

    /// Stop the channel's output. Idempotent.
    pub fn disable(&mut self, channel: Channel) {
        let value = self.regs.read_ctl() & !(CTL_ENABLE << channel.lane_shift());
        self.regs.write_ctl(value);
    }

    /// Select the active level of the channel's output.
    pub fn set_polarity(&mut self, channel: Channel, polarity: Polarity) {
        let bit = CTL_POLARITY << channel.lane_shift();
        let value = match polarity {
            Polarity::Normal => self.regs.read_ctl() & !bit,
            Polarity::Inversed => self.regs.read_ctl() | bit,
        };
        self.regs.write_ctl(value);
    }

    /// Is the channel's output currently enabled?
    pub fn is_enabled(&self, channel: Channel) -> bool {
        self.regs.read_ctl() & (CTL_ENABLE << channel.lane_shift()) != 0
    }

    /// Duration of one hardware tick.
    pub fn tick_period(&self) -> NanosDurationU32 {
        NanosDurationU32::from_ticks(self.scaler)
    }

    /// Get the channel's period register value, in ticks.
    pub fn period_ticks(&self, channel: Channel) -> u32 {
        self.regs.read_period(channel.index())
    }

    /// Get the channel's duty register value, in ticks.
    pub fn duty_ticks(&self, channel: Channel) -> u32 {
        self.regs.read_duty(channel.index())
    }

    /// Split the controller into its two channels.
    ///
    /// The handles share the controller borrow, so the controller
    /// methods are unavailable while they live. The controller is not
    /// `Sync`, which keeps both handles on the thread that split them;
    /// their register read-modify-writes cannot interleave.
    pub fn split(&mut self) -> (PwmChannel<'_>, PwmChannel<'_>) {
        let pwm: &Pwm = self;
        (
            PwmChannel {
                pwm,
                channel: Channel::Pwm0,
            },
            PwmChannel {
                pwm,
                channel: Channel::Pwm1,
            },
        )
    }

    /// Consume the driver and give the register window back.
    pub fn into_base(self) -> *const RegisterBlock {
        self.regs.into_base()
    }
}

/// A single channel of the [`Pwm`] controller.
///
/// Obtained from [`Pwm::split`]; implements the embedded-hal PWM
/// traits so each channel can be handed to an independent consumer.
pub struct PwmChannel<'a> {
    pwm: &'a Pwm,
    channel: Channel,
}

impl PwmChannel<'_> {
    /// The channel this handle drives.
    pub fn id(&self) -> Channel {
        self.channel
    }

    /// Enable or disable the channel's output.
    pub fn set_enabled(&mut self, enable: bool) {
        let bit = CTL_ENABLE << self.channel.lane_shift();
        let value = self.pwm.regs.read_ctl();
        self.pwm
            .regs
            .write_ctl(if enable { value | bit } else { value & !bit });
    }
}

impl ErrorType for PwmChannel<'_> {
    type Error = Infallible;
}

impl SetDutyCycle for PwmChannel<'_> {
    /// The channel's current period, in ticks.
    ///
    /// PERIOD is a 32-bit register but the trait expresses duty as
    /// `u16`; periods longer than `u16::MAX` ticks are reported as
    /// `u16::MAX` and the upper part of the range is unreachable
    /// through this trait.
    fn max_duty_cycle(&self) -> u16 {
        self.pwm
            .regs
            .read_period(self.channel.index())
            .min(u16::MAX as u32) as u16
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        self.pwm.regs.write_duty(self.channel.index(), duty as u32);
        Ok(())
    }
}

impl embedded_hal_0_2::PwmPin for PwmChannel<'_> {
    type Duty = u16;

    fn disable(&mut self) {
        self.set_enabled(false);
    }

    fn enable(&mut self) {
        self.set_enabled(true);
    }

    fn get_duty(&self) -> Self::Duty {
        self.pwm
            .regs
            .read_duty(self.channel.index())
            .min(u16::MAX as u32) as u16
    }

    fn get_max_duty(&self) -> Self::Duty {
        SetDutyCycle::max_duty_cycle(self)
    }

    fn set_duty(&mut self, duty: Self::Duty) {
        let _ = SetDutyCycle::set_duty_cycle(self, duty);
    }
}
