//! REQA/WUPA, anticollision and SELECT for single size UIDs.

use embedded_hal::blocking::delay::{DelayMs, DelayUs};
use embedded_hal::digital::v2::OutputPin;
use log::{debug, warn};

use super::com::Com;
use super::mfrc522::{Command, Mfrc522, Register};
use super::picc::{self, Uid, UidBytes};
use super::{Error, Result};

/// SAK plus CRC_A.
const SELECT_RESPONSE_BITS: u16 = 24;
const SERIAL_BITS: u16 = 32;

impl<COM, RST, D> Mfrc522<COM, RST, D>
where
    COM: Com,
    RST: OutputPin,
    D: DelayMs<u32> + DelayUs<u32>,
{
    /// Sends REQA and reports whether an idle card answered.
    ///
    /// Leaves BitFramingReg in 7-bit short frame mode; [`read_serial`]
    /// switches it back.
    ///
    /// [`read_serial`]: Mfrc522::read_serial
    pub fn probe_presence(&mut self) -> Result<bool> {
        self.short_frame(picc::Command::REQA)
    }

    /// Like [`probe_presence`] but sends WUPA, which also wakes halted cards.
    ///
    /// [`probe_presence`]: Mfrc522::probe_presence
    pub fn wake_up(&mut self) -> Result<bool> {
        self.short_frame(picc::Command::WUPA)
    }

    fn short_frame(&mut self, command: picc::Command) -> Result<bool> {
        // A new card cycle must never inherit a Crypto1 session.
        self.stop_crypto()?;
        self.write_register(Register::TxModeReg, 0x00)?;
        self.write_register(Register::RxModeReg, 0x00)?;
        // For REQA and WUPA we need the short frame format - transmit only 7 bits of the last (and only) byte.
        self.write_register(Register::BitFramingReg, 0x07)?;

        let outcome = self.execute_command(Command::Transceive, &[command as u8])?;
        Ok(outcome.is_ok())
    }

    /// Runs anticollision at cascade level 1 and selects the card found.
    pub fn read_serial(&mut self) -> Result<Uid> {
        self.write_register(Register::BitFramingReg, 0x00)?;
        let outcome = self
            .execute_command(
                Command::Transceive,
                &[picc::Command::SelCl1 as u8, picc::NVB_ANTICOLLISION],
            )?
            .into_result()?;
        if outcome.bits < SERIAL_BITS {
            return Err(Error::BitLength {
                expected: SERIAL_BITS + 8,
                actual: outcome.bits,
            });
        }

        let data = outcome.data();
        let serial = [data[0], data[1], data[2], data[3]];
        if let Some(&check) = data.get(4) {
            if check != picc::bcc(&serial) {
                warn!("anticollision BCC mismatch for {:02x?}", serial);
                return Err(Error::Bcc);
            }
        }
        self.select_tag(serial)
    }

    /// Sends SELECT for `serial` and, on a valid SAK, makes it the session's card.
    pub fn select_tag(&mut self, serial: [u8; 4]) -> Result<Uid> {
        let mut frame = [0u8; 9];
        frame[0] = picc::Command::SelCl1 as u8;
        frame[1] = picc::NVB_SELECT;
        frame[2..6].copy_from_slice(&serial);
        frame[6] = picc::bcc(&serial);
        let crc = self.calculate_crc(&frame[..7])?;
        frame[7..].copy_from_slice(&crc);

        let outcome = self.execute_command(Command::Transceive, &frame)?.into_result()?;
        if outcome.bits != SELECT_RESPONSE_BITS {
            return Err(Error::BitLength {
                expected: SELECT_RESPONSE_BITS,
                actual: outcome.bits,
            });
        }

        self.generation = self.generation.wrapping_add(1);
        let uid = Uid::new(UidBytes::Single(serial), outcome.data()[0], self.generation);
        self.uid = Some(uid);
        debug!(
            "selected {:02x?}, SAK {:#04x} ({:?})",
            serial,
            uid.sak(),
            uid.picc_type()
        );
        Ok(uid)
    }
}
