//! Register-level MFRC522 simulator with one MIFARE Classic 1K card in the
//! field. Cards do not encrypt; everything else follows the chip's register
//! interface closely enough for the driver not to notice.
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::rc::Rc;

use crc::{Crc, CRC_16_ISO_IEC_14443_3_A};
use embedded_hal::blocking::delay::{DelayMs, DelayUs};
use embedded_hal::blocking::spi;
use embedded_hal::digital::v2::OutputPin;
use rfid_reader::com_spi::ComSpi;
use rfid_reader::{Config, Mfrc522, Register, Uid};

const CRC_A: Crc<u16> = Crc::<u16>::new(&CRC_16_ISO_IEC_14443_3_A);

pub fn crc_a(data: &[u8]) -> [u8; 2] {
    CRC_A.checksum(data).to_le_bytes()
}

fn crc_ok(frame: &[u8]) -> bool {
    let n = frame.len();
    n >= 2 && crc_a(&frame[..n - 2]) == [frame[n - 2], frame[n - 1]]
}

pub const UID: [u8; 4] = [0xDE, 0xAD, 0xBE, 0xEF];
pub const SAK_1K: u8 = 0x08;
const ATQA: [u8; 2] = [0x04, 0x00];
const ACK: u8 = 0x0A;
const NAK: u8 = 0x04;

const CMD_IDLE: u8 = 0x00;
const CMD_CALC_CRC: u8 = 0x03;
const CMD_TRANSCEIVE: u8 = 0x0C;
const CMD_MF_AUTHENT: u8 = 0x0E;
const CMD_SOFT_RESET: u8 = 0x0F;

const TIMER_IRQ: u8 = 0x01;
const ERR_IRQ: u8 = 0x02;
const IDLE_IRQ: u8 = 0x10;
const RX_IRQ: u8 = 0x20;
const TX_IRQ: u8 = 0x40;
const CRC_IRQ: u8 = 0x04;
const CRYPTO1_ON: u8 = 0x08;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardState {
    Idle,
    Ready,
    Active,
    Halt,
}

pub struct Card {
    pub present: bool,
    pub uid: [u8; 4],
    pub sak: u8,
    pub state: CardState,
    pub blocks: [[u8; 16]; 64],
    authenticated: Option<u8>,
    pending_write: Option<u8>,
}

impl Card {
    fn new() -> Self {
        let mut blocks = [[0u8; 16]; 64];
        blocks[0][..4].copy_from_slice(&UID);
        blocks[0][4] = UID.iter().fold(0, |acc, b| acc ^ b);
        blocks[0][5] = SAK_1K;
        for sector in 0..16 {
            blocks[sector * 4 + 3] = [
                0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x07, 0x80, 0x69, 0xFF, 0xFF, 0xFF, 0xFF,
                0xFF, 0xFF,
            ];
        }
        Self {
            present: true,
            uid: UID,
            sak: SAK_1K,
            state: CardState::Idle,
            blocks,
            authenticated: None,
            pending_write: None,
        }
    }

    pub fn set_key_a(&mut self, sector: usize, key: [u8; 6]) {
        self.blocks[sector * 4 + 3][..6].copy_from_slice(&key);
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.is_some()
    }

    fn drop_to_idle(&mut self) {
        self.state = CardState::Idle;
        self.authenticated = None;
        self.pending_write = None;
    }

    fn nak(&mut self) -> Option<(Vec<u8>, u8)> {
        self.drop_to_idle();
        Some((vec![NAK], 4))
    }

    /// Answers one frame; `None` means the card stays silent.
    fn handle(&mut self, frame: &[u8], tx_last_bits: u8) -> Option<(Vec<u8>, u8)> {
        if !self.present {
            return None;
        }
        let wupa = frame == [0x52];
        if (frame == [0x26] || wupa) && tx_last_bits == 7 {
            if self.state == CardState::Halt && !wupa {
                return None;
            }
            self.drop_to_idle();
            self.state = CardState::Ready;
            return Some((ATQA.to_vec(), 0));
        }

        match self.state {
            CardState::Ready => {
                if frame == [0x93, 0x20] {
                    let bcc = self.uid.iter().fold(0, |acc, b| acc ^ b);
                    let mut resp = self.uid.to_vec();
                    resp.push(bcc);
                    return Some((resp, 0));
                }
                if frame.len() == 9 && frame[..2] == [0x93, 0x70] && crc_ok(frame) && frame[2..6] == self.uid {
                    self.state = CardState::Active;
                    let mut resp = vec![self.sak];
                    resp.extend_from_slice(&crc_a(&[self.sak]));
                    return Some((resp, 0));
                }
                self.drop_to_idle();
                None
            }
            CardState::Active => self.handle_active(frame),
            _ => None,
        }
    }

    fn handle_active(&mut self, frame: &[u8]) -> Option<(Vec<u8>, u8)> {
        if !crc_ok(frame) {
            self.drop_to_idle();
            return None;
        }
        if let Some(block) = self.pending_write.take() {
            if frame.len() != 18 {
                return self.nak();
            }
            self.blocks[block as usize].copy_from_slice(&frame[..16]);
            return Some((vec![ACK], 4));
        }

        let block = frame.get(1).copied().unwrap_or(0);
        let authorized = frame.len() == 4 && block < 64 && self.authenticated == Some(block / 4);
        match frame[0] {
            0x50 => {
                self.state = CardState::Halt;
                self.authenticated = None;
                None
            }
            0x30 if authorized => {
                let mut resp = self.blocks[block as usize].to_vec();
                let crc = crc_a(&resp);
                resp.extend_from_slice(&crc);
                Some((resp, 0))
            }
            0xA0 if authorized && block != 0 => {
                self.pending_write = Some(block);
                Some((vec![ACK], 4))
            }
            _ => self.nak(),
        }
    }

    /// MFAuthent payload: command, block, key, four serial bytes.
    fn authenticate(&mut self, frame: &[u8]) -> bool {
        let ok = self.present
            && self.state == CardState::Active
            && frame.len() == 12
            && frame[1] < 64
            && frame[8..12] == self.uid
            && {
                let trailer = &self.blocks[(frame[1] / 4 * 4 + 3) as usize];
                match frame[0] {
                    0x60 => frame[2..8] == trailer[..6],
                    0x61 => frame[2..8] == trailer[10..16],
                    _ => false,
                }
            };
        if ok {
            self.authenticated = Some(frame[1] / 4);
        } else {
            self.drop_to_idle();
        }
        ok
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read(u8),
    Write(u8, u8),
}

pub struct Chip {
    pub regs: [u8; 64],
    pub fifo: VecDeque<u8>,
    pub card: Card,
    pub log: Vec<Access>,
    pub sent: Vec<Vec<u8>>,
    pub cs_low: bool,
    pub cs_violations: usize,
    pub transactions: usize,
    pub reset_high: bool,
    pub delay_us: u64,
    /// Value returned by FIFOLevelReg instead of the real level.
    pub fifo_level_override: Option<u8>,
    /// ErrorReg value raised by the next Transceive or MFAuthent.
    pub inject_error: Option<u8>,
    /// Answer (bytes, RxLastBits) for the next Transceive, bypassing the card.
    pub response_override: Option<(Vec<u8>, u8)>,
    pub crc_stuck: bool,
    pub irq_stuck: bool,
    pub tx_control_after_reset: u8,
    pending_read: Option<u8>,
}

impl Chip {
    fn new() -> Self {
        let mut chip = Self {
            regs: [0; 64],
            fifo: VecDeque::new(),
            card: Card::new(),
            log: Vec::new(),
            sent: Vec::new(),
            cs_low: false,
            cs_violations: 0,
            transactions: 0,
            reset_high: false,
            delay_us: 0,
            fifo_level_override: None,
            inject_error: None,
            response_override: None,
            crc_stuck: false,
            irq_stuck: false,
            tx_control_after_reset: 0x80,
            pending_read: None,
        };
        chip.power_on_defaults();
        chip
    }

    fn power_on_defaults(&mut self) {
        self.regs = [0; 64];
        self.regs[0x01] = 0x20;
        self.regs[0x02] = 0x80;
        self.regs[0x11] = 0x3F;
        self.regs[0x14] = self.tx_control_after_reset;
        self.regs[0x26] = 0x48;
        self.regs[0x37] = 0x92;
        self.fifo.clear();
    }

    pub fn reg(&self, reg: Register) -> u8 {
        self.regs[reg as usize]
    }

    pub fn set_reg(&mut self, reg: Register, value: u8) {
        self.regs[reg as usize] = value;
    }

    pub fn reads_of(&self, reg: Register) -> usize {
        self.log.iter().filter(|a| **a == Access::Read(reg as u8)).count()
    }

    pub fn writes_to(&self, reg: Register) -> Vec<u8> {
        self.log
            .iter()
            .filter_map(|a| match *a {
                Access::Write(r, v) if r == reg as u8 => Some(v),
                _ => None,
            })
            .collect()
    }

    fn read(&mut self, reg: u8) -> u8 {
        self.log.push(Access::Read(reg));
        match reg {
            0x04 if self.irq_stuck => 0,
            0x05 if self.crc_stuck => 0,
            0x09 => self.fifo.pop_front().unwrap_or(0),
            0x0A => self.fifo_level_override.unwrap_or(self.fifo.len() as u8) & 0x7F,
            _ => self.regs[reg as usize],
        }
    }

    fn write(&mut self, reg: u8, value: u8) {
        self.log.push(Access::Write(reg, value));
        match reg {
            0x01 => self.command(value),
            0x04 | 0x05 => {
                if value & 0x80 != 0 {
                    self.regs[reg as usize] |= value & 0x7F;
                } else {
                    self.regs[reg as usize] &= !value;
                }
            }
            0x06 | 0x37 => {}
            0x09 => self.fifo.push_back(value),
            0x0A => {
                if value & 0x80 != 0 {
                    self.fifo.clear();
                }
            }
            0x0D => {
                self.regs[0x0D] = value;
                if value & 0x80 != 0 && self.regs[0x01] & 0x0F == CMD_TRANSCEIVE {
                    self.transceive(value & 0x07);
                }
            }
            _ => self.regs[reg as usize] = value,
        }
    }

    fn command(&mut self, value: u8) {
        self.regs[0x01] = value;
        match value & 0x0F {
            CMD_SOFT_RESET => self.power_on_defaults(),
            CMD_CALC_CRC => {
                let data: Vec<u8> = self.fifo.drain(..).collect();
                let [low, high] = crc_a(&data);
                self.regs[0x22] = low;
                self.regs[0x21] = high;
                self.regs[0x05] |= CRC_IRQ;
            }
            CMD_MF_AUTHENT => {
                let frame: Vec<u8> = self.fifo.drain(..).collect();
                self.regs[0x06] = 0;
                if let Some(error) = self.inject_error.take() {
                    self.regs[0x06] = error;
                    self.regs[0x04] |= ERR_IRQ | IDLE_IRQ;
                } else if self.card.authenticate(&frame) {
                    self.regs[0x08] |= CRYPTO1_ON;
                    self.regs[0x04] |= IDLE_IRQ;
                } else {
                    self.regs[0x08] &= !CRYPTO1_ON;
                    self.regs[0x04] |= TIMER_IRQ;
                }
                self.regs[0x01] = CMD_IDLE;
            }
            _ => {}
        }
    }

    fn transceive(&mut self, tx_last_bits: u8) {
        let frame: Vec<u8> = self.fifo.drain(..).collect();
        self.sent.push(frame.clone());
        self.regs[0x06] = 0;
        self.regs[0x04] |= TX_IRQ;

        if let Some(error) = self.inject_error.take() {
            self.regs[0x06] = error;
            self.regs[0x04] |= ERR_IRQ | IDLE_IRQ;
            return;
        }
        let response = match self.response_override.take() {
            Some(forced) => Some(forced),
            None => self.card.handle(&frame, tx_last_bits),
        };
        match response {
            Some((bytes, last_bits)) => {
                self.fifo.extend(bytes);
                self.regs[0x0C] = (self.regs[0x0C] & !0x07) | (last_bits & 0x07);
                self.regs[0x04] |= RX_IRQ | IDLE_IRQ;
            }
            None => self.regs[0x04] |= TIMER_IRQ,
        }
    }
}

pub type SharedChip = Rc<RefCell<Chip>>;

pub struct SimSpi(SharedChip);

impl spi::Write<u8> for SimSpi {
    type Error = Infallible;

    fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        let mut chip = self.0.borrow_mut();
        if !chip.cs_low {
            chip.cs_violations += 1;
        }
        match *words {
            [address] if address & 0x80 != 0 => chip.pending_read = Some((address >> 1) & 0x3F),
            [address, value] if address & 0x80 == 0 => chip.write((address >> 1) & 0x3F, value),
            _ => chip.cs_violations += 1,
        }
        Ok(())
    }
}

impl spi::Transfer<u8> for SimSpi {
    type Error = Infallible;

    fn transfer<'w>(&mut self, words: &'w mut [u8]) -> Result<&'w [u8], Self::Error> {
        let mut chip = self.0.borrow_mut();
        if !chip.cs_low {
            chip.cs_violations += 1;
        }
        match chip.pending_read.take() {
            Some(reg) => {
                for word in words.iter_mut() {
                    *word = chip.read(reg);
                }
            }
            None => chip.cs_violations += 1,
        }
        Ok(words)
    }
}

pub struct SimCs(SharedChip);

impl OutputPin for SimCs {
    type Error = Infallible;

    fn set_low(&mut self) -> Result<(), Self::Error> {
        let mut chip = self.0.borrow_mut();
        if chip.cs_low {
            chip.cs_violations += 1;
        }
        chip.cs_low = true;
        chip.transactions += 1;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        let mut chip = self.0.borrow_mut();
        if chip.pending_read.is_some() {
            chip.cs_violations += 1;
        }
        chip.cs_low = false;
        Ok(())
    }
}

pub struct SimReset(SharedChip);

impl OutputPin for SimReset {
    type Error = Infallible;

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().reset_high = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().reset_high = true;
        Ok(())
    }
}

pub struct SimDelay(SharedChip);

impl DelayMs<u32> for SimDelay {
    fn delay_ms(&mut self, ms: u32) {
        self.0.borrow_mut().delay_us += u64::from(ms) * 1_000;
    }
}

impl DelayUs<u32> for SimDelay {
    fn delay_us(&mut self, us: u32) {
        self.0.borrow_mut().delay_us += u64::from(us);
    }
}

pub type Reader = Mfrc522<ComSpi<SimSpi, SimCs>, SimReset, SimDelay>;

/// A reader that has not been initialised yet.
pub fn build(config: Config) -> (Reader, SharedChip) {
    let chip = Rc::new(RefCell::new(Chip::new()));
    let com = ComSpi::new(SimSpi(chip.clone()), SimCs(chip.clone()));
    let reader = Mfrc522::with_config(com, SimReset(chip.clone()), SimDelay(chip.clone()), config);
    (reader, chip)
}

pub fn reader_with_config(config: Config) -> (Reader, SharedChip) {
    let _ = env_logger::builder().is_test(true).try_init();
    let (mut reader, chip) = build(config);
    reader.init().unwrap();
    chip.borrow_mut().log.clear();
    (reader, chip)
}

pub fn reader() -> (Reader, SharedChip) {
    reader_with_config(Config::default())
}

/// REQA, anticollision and SELECT.
pub fn discover(reader: &mut Reader) -> Uid {
    assert!(reader.probe_presence().unwrap(), "card did not answer REQA");
    reader.read_serial().unwrap()
}
