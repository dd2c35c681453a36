//! Card access log kept in byte-addressable storage.
//!
//! Layout: a little-endian `u16` record count at offset 0 (`0xFFFF` on
//! erased memory means empty), followed by fixed-size [`LogRecord`]s.

use embedded_hal::blocking::delay::DelayMs;
use log::{debug, info};

use super::peripherals::{DateTime, Storage};
use super::{Error, Result};

pub const RECORD_SIZE: usize = 12;
const COUNT_OFFSET: u16 = 0;
const RECORDS_OFFSET: u16 = 2;
/// AT24C256.
pub const DEFAULT_CAPACITY: u32 = 32_768;
/// Largest capacity [`Storage`]'s 16-bit offsets can address.
pub const MAX_CAPACITY: u32 = 1 << 16;
/// EEPROM write cycle time.
pub const WRITE_SETTLE_MS: u32 = 10;
const ERASED: u16 = 0xFFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRecord {
    pub date_time: DateTime,
    pub uid: [u8; 5],
    pub status: u8,
}

impl LogRecord {
    /// Keeps the first five UID bytes; shorter UIDs are zero padded.
    pub fn new(date_time: DateTime, uid: &[u8], status: u8) -> Self {
        Self {
            date_time,
            uid: pad_uid(uid),
            status,
        }
    }

    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        let dt = &self.date_time;
        let mut raw = [0u8; RECORD_SIZE];
        raw[..6].copy_from_slice(&[dt.year, dt.month, dt.day, dt.hour, dt.minute, dt.second]);
        raw[6..11].copy_from_slice(&self.uid);
        raw[11] = self.status;
        raw
    }

    pub fn decode(raw: &[u8; RECORD_SIZE]) -> Self {
        let mut uid = [0u8; 5];
        uid.copy_from_slice(&raw[6..11]);
        Self {
            date_time: DateTime {
                year: raw[0],
                month: raw[1],
                day: raw[2],
                hour: raw[3],
                minute: raw[4],
                second: raw[5],
            },
            uid,
            status: raw[11],
        }
    }
}

fn pad_uid(uid: &[u8]) -> [u8; 5] {
    let mut padded = [0u8; 5];
    let n = uid.len().min(5);
    padded[..n].copy_from_slice(&uid[..n]);
    padded
}

pub struct AccessLog<S, D> {
    storage: S,
    delay: D,
    capacity: u32,
}

impl<S, D> AccessLog<S, D>
where
    S: Storage,
    D: DelayMs<u32>,
{
    pub fn new(storage: S, delay: D) -> Self {
        Self {
            storage,
            delay,
            capacity: DEFAULT_CAPACITY,
        }
    }

    /// Fails with [`Error::Invalid`] above [`MAX_CAPACITY`].
    pub fn with_capacity(storage: S, delay: D, capacity: u32) -> Result<Self> {
        if capacity > MAX_CAPACITY {
            return Err(Error::Invalid);
        }
        Ok(Self {
            storage,
            delay,
            capacity,
        })
    }

    pub fn release(self) -> (S, D) {
        (self.storage, self.delay)
    }

    fn slot_start(index: u16) -> u32 {
        u32::from(RECORDS_OFFSET) + u32::from(index) * RECORD_SIZE as u32
    }

    fn slot_offset(index: u16) -> Result<u16> {
        u16::try_from(Self::slot_start(index)).map_err(|_| Error::Invalid)
    }

    fn write_settled(&mut self, offset: u16, data: &[u8]) -> Result<()> {
        self.storage.write_bytes(offset, data)?;
        self.delay.delay_ms(WRITE_SETTLE_MS);
        Ok(())
    }

    pub fn len(&mut self) -> Result<u16> {
        let mut raw = [0u8; 2];
        self.storage.read_bytes(COUNT_OFFSET, &mut raw)?;
        match u16::from_le_bytes(raw) {
            ERASED => Ok(0),
            n => Ok(n),
        }
    }

    pub fn is_empty(&mut self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn get(&mut self, index: u16) -> Result<LogRecord> {
        if index >= self.len()? {
            return Err(Error::Invalid);
        }
        let mut raw = [0u8; RECORD_SIZE];
        self.storage.read_bytes(Self::slot_offset(index)?, &mut raw)?;
        Ok(LogRecord::decode(&raw))
    }

    /// Whether any stored record carries `uid` (compared on five bytes).
    pub fn contains(&mut self, uid: &[u8]) -> Result<bool> {
        let wanted = pad_uid(uid);
        for index in 0..self.len()? {
            if self.get(index)?.uid == wanted {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Stores `record` and returns its slot. When the next slot would reach
    /// the end of storage, logging restarts at the first slot.
    pub fn append(&mut self, record: &LogRecord) -> Result<u16> {
        let mut index = self.len()?;
        if Self::slot_start(index) + RECORD_SIZE as u32 >= self.capacity {
            info!("access log full after {} records, wrapping", index);
            index = 0;
        }
        self.write_settled(Self::slot_offset(index)?, &record.encode())?;
        self.write_settled(COUNT_OFFSET, &(index + 1).to_le_bytes())?;
        debug!("logged {:02x?} in slot {}", record.uid, index);
        Ok(index)
    }

    /// Sets the count to zero and zeroes the first `clear_slots` records.
    pub fn reset(&mut self, clear_slots: u16) -> Result<()> {
        self.write_settled(COUNT_OFFSET, &0u16.to_le_bytes())?;
        let blank = [0u8; RECORD_SIZE];
        for index in 0..clear_slots {
            if Self::slot_start(index) + RECORD_SIZE as u32 > self.capacity {
                break;
            }
            self.write_settled(Self::slot_offset(index)?, &blank)?;
        }
        Ok(())
    }
}
