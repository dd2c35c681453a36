use embedded_hal::blocking::delay::{DelayMs, DelayUs};
use embedded_hal::digital::v2::OutputPin;
use log::{debug, trace, warn};

use super::com::Com;
use super::config::{Config, PollBudget};
use super::picc::Uid;
use super::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    // Reserved         = 0x00,
    CommandReg = 0x01,
    ComIEnReg = 0x02,
    DivIEnReg = 0x03,
    ComIrqReg = 0x04,
    DivIrqReg = 0x05,
    ErrorReg = 0x06,
    Status1Reg = 0x07,
    Status2Reg = 0x08,
    FIFODataReg = 0x09,
    FIFOLevelReg = 0x0A,
    WaterLevelReg = 0x0B,
    ControlReg = 0x0C,
    BitFramingReg = 0x0D,
    CollReg = 0x0E,
    // Reserved         = 0x0F,
    // Reserved         = 0x10,
    ModeReg = 0x11,
    TxModeReg = 0x12,
    RxModeReg = 0x13,
    TxControlReg = 0x14,
    TxASKReg = 0x15,
    TxSelReg = 0x16,
    RxSelReg = 0x17,
    RxThresholdReg = 0x18,
    DemodReg = 0x19,
    // Reserved         = 0x1A,
    // Reserved         = 0x1B,
    MfTxReg = 0x1C,
    MfRxReg = 0x1D,
    // Reserved         = 0x1E,
    SerialSpeedReg = 0x1F,
    // Reserved         = 0x20,
    CRCResultRegHigh = 0x21,
    CRCResultRegLow = 0x22,
    // Reserved         = 0x23,
    ModWidthReg = 0x24,
    // Reserved         = 0x25,
    RFCfgReg = 0x26,
    GsNReg = 0x27,
    CWGsPReg = 0x28,
    ModGsPReg = 0x29,
    TModeReg = 0x2A,
    TPrescalerReg = 0x2B,
    TReloadRegHigh = 0x2C,
    TReloadRegLow = 0x2D,
    TCounterValRegHigh = 0x2E,
    TCounterValRegLow = 0x2F,
    VersionReg = 0x37,
}

impl Register {
    /// Every documented register, in address order.
    pub const ALL: [Register; 40] = [
        Register::CommandReg,
        Register::ComIEnReg,
        Register::DivIEnReg,
        Register::ComIrqReg,
        Register::DivIrqReg,
        Register::ErrorReg,
        Register::Status1Reg,
        Register::Status2Reg,
        Register::FIFODataReg,
        Register::FIFOLevelReg,
        Register::WaterLevelReg,
        Register::ControlReg,
        Register::BitFramingReg,
        Register::CollReg,
        Register::ModeReg,
        Register::TxModeReg,
        Register::RxModeReg,
        Register::TxControlReg,
        Register::TxASKReg,
        Register::TxSelReg,
        Register::RxSelReg,
        Register::RxThresholdReg,
        Register::DemodReg,
        Register::MfTxReg,
        Register::MfRxReg,
        Register::SerialSpeedReg,
        Register::CRCResultRegHigh,
        Register::CRCResultRegLow,
        Register::ModWidthReg,
        Register::RFCfgReg,
        Register::GsNReg,
        Register::CWGsPReg,
        Register::ModGsPReg,
        Register::TModeReg,
        Register::TPrescalerReg,
        Register::TReloadRegHigh,
        Register::TReloadRegLow,
        Register::TCounterValRegHigh,
        Register::TCounterValRegLow,
        Register::VersionReg,
    ];
}

/// PCD commands, written to CommandReg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Idle = 0b0000,
    Mem = 0b0001,
    GenerateRandomId = 0b0010,
    CalcCRC = 0b0011,
    Transmit = 0b0100,
    NoCmdChange = 0b0111,
    Receive = 0b1000,
    Transceive = 0b1100,
    MFAuthent = 0b1110,
    SoftReset = 0b1111,
}

// ComIrqReg / ComIEnReg bits
pub(crate) const TIMER_IRQ: u8 = 1 << 0;
pub(crate) const ERR_IRQ: u8 = 1 << 1;
pub(crate) const LO_ALERT_IRQ: u8 = 1 << 2;
pub(crate) const IDLE_IRQ: u8 = 1 << 4;
pub(crate) const RX_IRQ: u8 = 1 << 5;
pub(crate) const TX_IRQ: u8 = 1 << 6;
/// Written with ComIEnReg: IRQ pin is inverted.
const IRQ_INV: u8 = 1 << 7;
/// DivIrqReg: CalcCRC finished.
pub(crate) const CRC_IRQ: u8 = 1 << 2;

// ErrorReg bits
const PROTOCOL_ERR: u8 = 1 << 0;
const PARITY_ERR: u8 = 1 << 1;
const CRC_ERR: u8 = 1 << 2;
const COLL_ERR: u8 = 1 << 3;
const BUFFER_OVFL: u8 = 1 << 4;
const FATAL_ERRORS: u8 = BUFFER_OVFL | COLL_ERR | CRC_ERR | PARITY_ERR | PROTOCOL_ERR;

const FLUSH_BUFFER: u8 = 1 << 7;
const START_SEND: u8 = 1 << 7;
const POWER_DOWN: u8 = 1 << 4;
/// Status2Reg: MIFARE Crypto1 unit is on.
pub(crate) const MF_CRYPTO1_ON: u8 = 1 << 3;
const T_AUTO: u8 = 1 << 7;

/// Most bytes pulled from the FIFO for one response.
pub const FIFO_READ_MAX: usize = 16;

/// Why a command did not settle cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// No completion or timer interrupt within the poll budget.
    NoResponse,
    /// ErrorReg value with at least one fatal bit set.
    Flags(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Err(Fault),
    Timeout,
}

/// Result of one [`Mfrc522::execute_command`] call.
///
/// For Transceive the received bytes are available through [`Outcome::data`];
/// the byte following them is always 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub status: Status,
    /// Number of valid bits received.
    pub bits: u16,
    len: usize,
    buf: [u8; FIFO_READ_MAX + 1],
}

impl Outcome {
    fn with_status(status: Status) -> Self {
        Self {
            status,
            bits: 0,
            len: 0,
            buf: [0; FIFO_READ_MAX + 1],
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    pub fn data(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Received bytes followed by the 0 terminator.
    pub fn data_with_terminator(&self) -> &[u8] {
        &self.buf[..=self.len]
    }

    pub fn into_result(self) -> Result<Self> {
        match self.status {
            Status::Ok => Ok(self),
            Status::Timeout => Err(Error::Timeout),
            Status::Err(Fault::NoResponse) => Err(Error::NoResponse),
            Status::Err(Fault::Flags(flags)) => Err(Error::Communication(flags)),
        }
    }
}

/// A reader session.
///
/// Owns the bus, the reset line and the delay provider, and remembers the
/// card selected by the most recent discovery cycle. Every operation takes
/// `&mut self`, so only one command can be in flight.
pub struct Mfrc522<COM, RST, D> {
    pub(crate) com: COM,
    rst: RST,
    delay: D,
    pub(crate) config: Config,
    pub(crate) uid: Option<Uid>,
    pub(crate) generation: u32,
}

impl<COM, RST, D> Mfrc522<COM, RST, D>
where
    COM: Com,
    RST: OutputPin,
    D: DelayMs<u32> + DelayUs<u32>,
{
    pub fn new(com: COM, reset: RST, delay: D) -> Self {
        Self::with_config(com, reset, delay, Config::default())
    }

    pub fn with_config(com: COM, reset: RST, delay: D, config: Config) -> Self {
        Self {
            com,
            rst: reset,
            delay,
            config,
            uid: None,
            generation: 0,
        }
    }

    pub fn release(self) -> (COM, RST, D) {
        (self.com, self.rst, self.delay)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Card selected by the last successful discovery cycle.
    pub fn uid(&self) -> Option<&Uid> {
        self.uid.as_ref()
    }

    /// Number of successful selects so far.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn read_register(&mut self, reg: Register) -> Result<u8> {
        self.com.read_register(reg)
    }

    pub fn write_register(&mut self, reg: Register, value: u8) -> Result<()> {
        self.com.write_register(reg, value)
    }

    pub fn init(&mut self) -> Result<()> {
        self.rst.set_high().map_err(|_| Error::ResetPin)?;
        self.delay.delay_ms(self.config.reset_delay_ms);
        self.reset()?;

        self.write_register(Register::TxModeReg, 0x00)?;
        self.write_register(Register::RxModeReg, 0x00)?;
        // When communicating with a PICC we need a timeout if something goes wrong.
        // f_timer = 13.56 MHz / (2*TPreScaler+1) where TPreScaler = [TPrescaler_Hi:TPrescaler_Lo].
        // TPrescaler_Hi are the four low bits in TModeReg. TPrescaler_Lo is TPrescalerReg.
        let timer = self.config.timer;
        self.write_register(Register::TModeReg, T_AUTO | ((timer.prescaler >> 8) as u8 & 0x0F))?;
        self.write_register(Register::TPrescalerReg, timer.prescaler as u8)?;
        self.write_register(Register::TReloadRegHigh, (timer.reload >> 8) as u8)?;
        self.write_register(Register::TReloadRegLow, timer.reload as u8)?;
        self.write_register(Register::TxASKReg, 0x40)?; // Force a 100 % ASK modulation independent of the ModGsPReg register setting
        self.write_register(Register::ModeReg, 0x3D)?; // CRC preset 0x6363 (ISO 14443-3 part 6.2.4)
        self.write_register(Register::RFCfgReg, (self.config.rx_gain & 0x07) << 4)?;
        self.enable_antenna()?;
        debug!("reader initialised, timeout {} us", timer.period_us());
        Ok(())
    }

    pub fn reset(&mut self) -> Result<()> {
        self.write_register(Register::CommandReg, Command::SoftReset as u8)?;
        let mut count = 0;
        loop {
            self.delay.delay_ms(self.config.reset_delay_ms);
            let cmd_val = self.read_register(Register::CommandReg)?;
            if cmd_val & POWER_DOWN == 0 || count >= 3 {
                break;
            }
            count += 1;
        }
        Ok(())
    }

    /// Turns both antenna drivers on unless they already are.
    pub fn enable_antenna(&mut self) -> Result<()> {
        let control_reg = self.read_register(Register::TxControlReg)?;
        if (control_reg & 0x03) != 0x03 {
            self.write_register(Register::TxControlReg, control_reg | 0x03)?;
        }
        Ok(())
    }

    /// Chip version: 0x91 (v1.0) or 0x92 (v2.0) for genuine parts.
    pub fn version(&mut self) -> Result<u8> {
        self.read_register(Register::VersionReg)
    }

    /// Reads `reg` until `done` accepts the value or the budget runs out.
    fn poll_register<F>(&mut self, reg: Register, budget: PollBudget, mut done: F) -> Result<Option<u8>>
    where
        F: FnMut(u8) -> bool,
    {
        match budget {
            PollBudget::Iterations(n) => {
                for _ in 0..n {
                    let value = self.read_register(reg)?;
                    if done(value) {
                        return Ok(Some(value));
                    }
                }
                Ok(None)
            }
            PollBudget::Deadline {
                timeout_us,
                interval_us,
            } => {
                let mut elapsed: u32 = 0;
                loop {
                    let value = self.read_register(reg)?;
                    if done(value) {
                        return Ok(Some(value));
                    }
                    if elapsed >= timeout_us {
                        return Ok(None);
                    }
                    self.delay.delay_us(interval_us);
                    elapsed = elapsed.saturating_add(interval_us.max(1));
                }
            }
        }
    }

    /// Runs the chip's CRC_A coprocessor over `data`; returns `[low, high]`.
    pub fn calculate_crc(&mut self, data: &[u8]) -> Result<[u8; 2]> {
        self.write_register(Register::CommandReg, Command::Idle as u8)?;
        self.write_register(Register::DivIrqReg, CRC_IRQ)?;
        self.write_register(Register::FIFOLevelReg, FLUSH_BUFFER)?;
        for &byte in data {
            self.write_register(Register::FIFODataReg, byte)?;
        }
        self.write_register(Register::CommandReg, Command::CalcCRC as u8)?;

        let budget = self.config.crc_poll;
        match self.poll_register(Register::DivIrqReg, budget, |n| n & CRC_IRQ != 0)? {
            Some(_) => {
                self.write_register(Register::CommandReg, Command::Idle as u8)?;
                let res_low = self.read_register(Register::CRCResultRegLow)?;
                let res_high = self.read_register(Register::CRCResultRegHigh)?;
                Ok([res_low, res_high])
            }
            None => {
                warn!("CRC coprocessor did not finish ({:?})", budget);
                Err(Error::CrcTimeout)
            }
        }
    }

    /// Loads `send` into the FIFO, runs `command` and waits for it to settle.
    ///
    /// Only bus failures are returned as `Err`; everything the chip reports
    /// ends up in [`Outcome::status`]. Received bytes are only collected for
    /// [`Command::Transceive`].
    pub fn execute_command(&mut self, command: Command, send: &[u8]) -> Result<Outcome> {
        let (irq_en, wait_irq) = match command {
            Command::MFAuthent => (IDLE_IRQ | ERR_IRQ, IDLE_IRQ),
            Command::Transceive => (
                TX_IRQ | RX_IRQ | IDLE_IRQ | LO_ALERT_IRQ | ERR_IRQ | TIMER_IRQ,
                RX_IRQ | IDLE_IRQ,
            ),
            _ => (0x00, 0x00),
        };

        self.write_register(Register::ComIEnReg, irq_en | IRQ_INV)?;
        self.write_register(Register::ComIrqReg, 0x7F)?; // Clear all seven interrupt request bits.
        self.write_register(Register::FIFOLevelReg, FLUSH_BUFFER)?;
        self.write_register(Register::CommandReg, Command::Idle as u8)?; // Stop any active command.
        for &byte in send {
            self.write_register(Register::FIFODataReg, byte)?;
        }
        self.write_register(Register::CommandReg, command as u8)?;
        if command == Command::Transceive {
            self.com.set_register_bitmask(Register::BitFramingReg, START_SEND)?;
        }

        let budget = self.config.transceive_poll;
        let irq = self.poll_register(Register::ComIrqReg, budget, |n| n & (TIMER_IRQ | wait_irq) != 0);
        self.com.clear_register_bitmask(Register::BitFramingReg, START_SEND)?;

        let irq = match irq? {
            Some(irq) => irq,
            None => {
                trace!("{:?} never settled ({:?})", command, budget);
                return Ok(Outcome::with_status(Status::Err(Fault::NoResponse)));
            }
        };

        // ErrorReg[7..0] bits are: WrErr TempErr reserved BufferOvfl CollErr CRCErr ParityErr ProtocolErr
        let error = self.read_register(Register::ErrorReg)?;
        if error & FATAL_ERRORS != 0 {
            debug!("{:?} failed, ErrorReg = {:#04x}", command, error);
            return Ok(Outcome::with_status(Status::Err(Fault::Flags(error))));
        }
        if irq & irq_en & TIMER_IRQ != 0 {
            return Ok(Outcome::with_status(Status::Timeout));
        }

        let mut outcome = Outcome::with_status(Status::Ok);
        if command == Command::Transceive {
            let level = self.read_register(Register::FIFOLevelReg)? & 0x7F;
            // RxLastBits[2:0] indicates the number of valid bits in the last received byte.
            // If this value is 0b000, the whole byte is valid.
            let last_bits = self.read_register(Register::ControlReg)? & 0x07;
            outcome.bits = if last_bits != 0 {
                u16::from(level).saturating_sub(1) * 8 + u16::from(last_bits)
            } else {
                u16::from(level) * 8
            };

            let count = usize::from(level).clamp(1, FIFO_READ_MAX);
            for i in 0..count {
                outcome.buf[i] = self.read_register(Register::FIFODataReg)?;
            }
            outcome.len = count;
            outcome.buf[count] = 0;
        }
        Ok(outcome)
    }
}
