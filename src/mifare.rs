//! MIFARE Classic authentication, block access and session teardown.

use embedded_hal::blocking::delay::{DelayMs, DelayUs};
use embedded_hal::digital::v2::OutputPin;
use log::{debug, warn};

use super::com::Com;
use super::mfrc522::{Command, Mfrc522, Outcome, Register, Status, MF_CRYPTO1_ON};
use super::picc::{self, Key, KeyType, Uid};
use super::{Error, Result};

pub const BLOCK_SIZE: usize = 16;
/// Sectors on a MIFARE Classic 1K card.
pub const SECTORS_1K: u8 = 16;
const BLOCKS_PER_SECTOR: u8 = 4;
/// 16 data bytes plus CRC_A.
const READ_RESPONSE_BITS: u16 = 144;
const ACK_BITS: u16 = 4;

/// Absolute address of the trailer block holding `sector`'s keys.
pub fn sector_trailer(sector: u8) -> Result<u8> {
    block_address(sector, BLOCKS_PER_SECTOR - 1)
}

/// Absolute address of block `offset` (0..=3) in `sector`.
pub fn block_address(sector: u8, offset: u8) -> Result<u8> {
    if offset >= BLOCKS_PER_SECTOR {
        return Err(Error::Invalid);
    }
    sector
        .checked_mul(BLOCKS_PER_SECTOR)
        .and_then(|first| first.checked_add(offset))
        .ok_or(Error::Invalid)
}

fn check_ack(outcome: &Outcome) -> Result<()> {
    if outcome.bits == ACK_BITS {
        let nibble = outcome.data()[0] & 0x0F;
        if nibble != picc::MIFARE_ACK {
            return Err(Error::Nak(nibble));
        }
    }
    Ok(())
}

impl<COM, RST, D> Mfrc522<COM, RST, D>
where
    COM: Com,
    RST: OutputPin,
    D: DelayMs<u32> + DelayUs<u32>,
{
    /// Authenticates with key A; see [`authenticate_with`].
    ///
    /// [`authenticate_with`]: Mfrc522::authenticate_with
    pub fn authenticate(&mut self, block_addr: u8, key: &Key, uid: &Uid) -> Result<()> {
        self.authenticate_with(KeyType::A, block_addr, key, uid)
    }

    /// Runs MFAuthent for the sector containing `block_addr`.
    ///
    /// `uid` must come from the latest discovery cycle. Success is read from
    /// the MFCrypto1On bit of Status2Reg; a transport fault during the
    /// handshake fails the call even if that bit is still set.
    pub fn authenticate_with(
        &mut self,
        key_type: KeyType,
        block_addr: u8,
        key: &Key,
        uid: &Uid,
    ) -> Result<()> {
        if uid.generation() != self.generation {
            warn!(
                "refusing UID from discovery cycle {} (current {})",
                uid.generation(),
                self.generation
            );
            return Err(Error::StaleUid);
        }

        let mut frame = [0u8; 12];
        frame[0] = key_type.command() as u8;
        frame[1] = block_addr;
        frame[2..8].copy_from_slice(key.as_bytes());
        frame[8..].copy_from_slice(&uid.serial());

        let outcome = self.execute_command(Command::MFAuthent, &frame)?;
        debug!("MFAuthent block {} settled with {:?}", block_addr, outcome.status);
        if let Status::Err(_) = outcome.status {
            return outcome.into_result().map(|_| ());
        }

        // Status2Reg[7..0] bits are: TempSensClear I2CForceHS reserved reserved MFCrypto1On ModemState[2:0]
        if self.read_register(Register::Status2Reg)? & MF_CRYPTO1_ON == 0 {
            warn!("authentication for block {} rejected", block_addr);
            return Err(Error::AuthFailed);
        }
        Ok(())
    }

    /// Leaves the authenticated state. Required before talking to another card.
    pub fn stop_crypto(&mut self) -> Result<()> {
        self.write_register(Register::Status2Reg, 0x00)
    }

    /// Appends CRC_A to `payload` (at most 16 bytes) and transceives it.
    fn transceive_with_crc(&mut self, payload: &[u8]) -> Result<Outcome> {
        let len = payload.len();
        debug_assert!(len <= BLOCK_SIZE);
        let mut frame = [0u8; BLOCK_SIZE + 2];
        frame[..len].copy_from_slice(payload);
        let crc = self.calculate_crc(payload)?;
        frame[len..len + 2].copy_from_slice(&crc);
        self.execute_command(Command::Transceive, &frame[..len + 2])
    }

    pub fn read_block(&mut self, block_addr: u8) -> Result<[u8; BLOCK_SIZE]> {
        let outcome = self
            .transceive_with_crc(&[picc::Command::MfRead as u8, block_addr])?
            .into_result()?;
        if outcome.bits != READ_RESPONSE_BITS {
            return Err(Error::BitLength {
                expected: READ_RESPONSE_BITS,
                actual: outcome.bits,
            });
        }
        let mut block = [0u8; BLOCK_SIZE];
        block.copy_from_slice(&outcome.data()[..BLOCK_SIZE]);
        Ok(block)
    }

    /// Two-phase MIFARE WRITE. Once the data phase has started the card
    /// may have committed the block even if an error is returned.
    pub fn write_block(&mut self, block_addr: u8, data: &[u8; BLOCK_SIZE]) -> Result<()> {
        let ack = self
            .transceive_with_crc(&[picc::Command::MfWrite as u8, block_addr])?
            .into_result()?;
        check_ack(&ack)?;

        let ack = self.transceive_with_crc(data)?.into_result()?;
        check_ack(&ack)
    }

    /// Sends HLTA. The card does not answer, so the outcome is ignored.
    pub fn halt(&mut self) -> Result<()> {
        let outcome = self.transceive_with_crc(&[picc::Command::HLTA as u8, 0x00])?;
        debug!("HLTA sent, {:?}", outcome.status);
        Ok(())
    }

    /// Authenticates against `sector`'s trailer using the selected card and
    /// writes block `offset` of that sector.
    pub fn write_sector_block(
        &mut self,
        sector: u8,
        offset: u8,
        data: &[u8; BLOCK_SIZE],
        key: &Key,
    ) -> Result<()> {
        let block = block_address(sector, offset)?;
        let trailer = sector_trailer(sector)?;
        let uid = self.uid.ok_or(Error::NoCard)?;
        self.authenticate(trailer, key, &uid)?;
        self.write_block(block, data)
    }

    /// Authenticates against `sector`'s trailer and reads its four blocks.
    pub fn read_sector(&mut self, sector: u8, key: &Key) -> Result<[[u8; BLOCK_SIZE]; 4]> {
        let trailer = sector_trailer(sector)?;
        let uid = self.uid.ok_or(Error::NoCard)?;
        self.authenticate(trailer, key, &uid)?;

        let mut blocks = [[0u8; BLOCK_SIZE]; 4];
        for (offset, block) in blocks.iter_mut().enumerate() {
            *block = self.read_block(block_address(sector, offset as u8)?)?;
        }
        Ok(blocks)
    }
}
