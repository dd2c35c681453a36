//! Timing and analog settings for a reader session.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How long to wait for a status bit before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PollBudget {
    /// Read the status register at most `n` times, back to back. The real
    /// duration depends on the bus clock.
    Iterations(u32),
    /// Sleep `interval_us` between reads and stop once `timeout_us` worth of
    /// sleeps have elapsed.
    Deadline { timeout_us: u32, interval_us: u32 },
}

/// Chip timer used to time out a silent card.
///
/// `f_timer = 13.56 MHz / (2 * prescaler + 1)`; the timer fires `reload`
/// ticks after the end of transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimerConfig {
    /// 12-bit prescaler, high nibble lands in TModeReg.
    pub prescaler: u16,
    pub reload: u16,
}

impl TimerConfig {
    pub fn period_us(&self) -> u32 {
        let ticks = u64::from(self.reload) * (2 * u64::from(self.prescaler & 0x0FFF) + 1);
        (ticks * 1_000_000 / 13_560_000) as u32
    }
}

impl Default for TimerConfig {
    /// 40 kHz timer, 1000 ticks: 25 ms.
    fn default() -> Self {
        Self {
            prescaler: 0x0A9,
            reload: 0x03E8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Config {
    pub crc_poll: PollBudget,
    pub transceive_poll: PollBudget,
    /// Settle time after driving the reset line and after a soft reset.
    pub reset_delay_ms: u32,
    pub timer: TimerConfig,
    /// RxGain field of RFCfgReg, 0..=7 (7 = 48 dB).
    pub rx_gain: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crc_poll: PollBudget::Deadline {
                timeout_us: 90_000,
                interval_us: 20,
            },
            // Must outlast the chip timer so a silent card is reported as a
            // timeout rather than as a missing reader.
            transceive_poll: PollBudget::Deadline {
                timeout_us: 40_000,
                interval_us: 20,
            },
            reset_delay_ms: 50,
            timer: TimerConfig::default(),
            rx_gain: 0x07,
        }
    }
}

impl Config {
    /// Fixed iteration ceilings (5000 for CRC, 2000 for commands) with no
    /// sleeping between reads.
    pub fn legacy() -> Self {
        Self {
            crc_poll: PollBudget::Iterations(5000),
            transceive_poll: PollBudget::Iterations(2000),
            ..Self::default()
        }
    }
}
