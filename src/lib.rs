//! Driver for the NXP MFRC522 contactless reader and MIFARE Classic cards.
//!
//! The reader is reached through the [`Com`] trait, which frames single
//! register accesses over SPI ([`com_spi::ComSpi`]) or I2C
//! ([`com_i2c::ComI2c`]). On top of that, [`Mfrc522`] drives the chip's CRC
//! coprocessor and command engine and implements card discovery,
//! authentication and 16-byte block access.
//!
//! ```ignore
//! let com = ComSpi::new(spi, nss);
//! let mut reader = Mfrc522::new(com, reset, delay);
//! reader.init()?;
//!
//! if reader.probe_presence()? {
//!     let uid = reader.read_serial()?;
//!     reader.authenticate(sector_trailer(2)?, &Key::DEFAULT, &uid)?;
//!     let block = reader.read_block(block_address(2, 0)?)?;
//!     reader.halt()?;
//!     reader.stop_crypto()?;
//! }
//! ```
//!
//! The display, clock and storage collaborators of a complete access-logging
//! terminal are described by the traits in [`peripherals`]; [`access_log`]
//! and [`screen`] build the application logic on top of them.
#![cfg_attr(not(test), no_std)]

pub mod access_log;
pub mod com;
pub mod com_i2c;
pub mod com_spi;
pub mod config;
mod discovery;
pub mod mfrc522;
mod mifare;
pub mod peripherals;
pub mod picc;
pub mod screen;
pub mod util;

pub use com::Com;
pub use config::{Config, PollBudget, TimerConfig};
pub use mfrc522::{Command, Fault, Mfrc522, Outcome, Register, Status};
pub use mifare::{block_address, sector_trailer, BLOCK_SIZE, SECTORS_1K};
pub use picc::{Key, KeyType, Uid, UidBytes};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The SPI/I2C transaction or chip-select line failed.
    #[error("bus transaction failed")]
    Bus,
    #[error("reset line could not be driven")]
    ResetPin,
    /// ErrorReg reported BufferOvfl, CollErr, CRCErr, ParityErr or ProtocolErr.
    #[error("communication error, ErrorReg = {0:#04x}")]
    Communication(u8),
    /// No interrupt was observed before the poll budget ran out.
    #[error("reader did not settle within the poll budget")]
    NoResponse,
    /// The card stayed silent until the chip's timer fired.
    #[error("card did not answer in time")]
    Timeout,
    #[error("CRC coprocessor did not finish within the poll budget")]
    CrcTimeout,
    #[error("unexpected response length: expected {expected} bits, got {actual}")]
    BitLength { expected: u16, actual: u16 },
    #[error("block check character mismatch")]
    Bcc,
    /// The card answered with a 4-bit NAK instead of an ACK.
    #[error("card refused the command, NAK {0:#03x}")]
    Nak(u8),
    #[error("authentication failed")]
    AuthFailed,
    /// The UID was produced by an earlier discovery cycle.
    #[error("UID belongs to an earlier discovery cycle")]
    StaleUid,
    #[error("no card selected")]
    NoCard,
    #[error("invalid argument")]
    Invalid,
    #[error("storage access failed")]
    Storage,
    #[error("clock access failed")]
    Clock,
}

impl Error {
    /// `true` when the card was silent but no transport error occurred.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout)
    }
}

pub type Result<T> = core::result::Result<T, Error>;
