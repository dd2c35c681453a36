//! Collaborators of a reader terminal: character display, real-time clock
//! and byte-addressable non-volatile storage.
//!
//! The driver never calls these; the application layer ([`crate::access_log`],
//! [`crate::screen`]) does.

use super::{Error, Result};

/// A character LCD addressed by row and column.
pub trait CharacterDisplay {
    fn clear(&mut self);
    fn put_cursor(&mut self, row: u8, col: u8);
    fn send_string(&mut self, text: &str);
}

pub trait RealTimeClock {
    fn date_time(&mut self) -> Result<DateTime>;
}

/// Byte-addressable storage such as an I2C EEPROM.
///
/// Writes need time to settle; [`crate::access_log::AccessLog`] waits
/// [`crate::access_log::WRITE_SETTLE_MS`] after each one.
pub trait Storage {
    fn read_bytes(&mut self, offset: u16, buf: &mut [u8]) -> Result<()>;
    fn write_bytes(&mut self, offset: u16, data: &[u8]) -> Result<()>;
}

/// Wall-clock time with a two-digit year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateTime {
    pub year: u8,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

pub fn bcd_to_dec(b: u8) -> u8 {
    (b >> 4) * 10 + (b & 0x0F)
}

pub fn dec_to_bcd(d: u8) -> u8 {
    ((d / 10) << 4) | (d % 10)
}

impl DateTime {
    /// Decodes the seven time registers of a DS3231-style clock
    /// (seconds, minutes, hours, weekday, date, month, year).
    pub fn from_registers(regs: &[u8; 7]) -> Result<Self> {
        let dt = DateTime {
            second: bcd_to_dec(regs[0] & 0x7F),
            minute: bcd_to_dec(regs[1] & 0x7F),
            hour: bcd_to_dec(regs[2] & 0x3F),
            day: bcd_to_dec(regs[4] & 0x3F),
            month: bcd_to_dec(regs[5] & 0x1F),
            year: bcd_to_dec(regs[6]),
        };
        if dt.is_valid() {
            Ok(dt)
        } else {
            Err(Error::Clock)
        }
    }

    /// Encodes for the same register layout, 24 hour mode.
    pub fn to_registers(&self, weekday: u8) -> [u8; 7] {
        [
            dec_to_bcd(self.second),
            dec_to_bcd(self.minute),
            dec_to_bcd(self.hour),
            dec_to_bcd(weekday),
            dec_to_bcd(self.day),
            dec_to_bcd(self.month),
            dec_to_bcd(self.year),
        ]
    }

    pub fn is_valid(&self) -> bool {
        self.year < 100
            && (1..=12).contains(&self.month)
            && (1..=31).contains(&self.day)
            && self.hour < 24
            && self.minute < 60
            && self.second < 60
    }
}
