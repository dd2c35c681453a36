use core::fmt::Write;

use embedded_hal::blocking::delay::{DelayMs, DelayUs};
use embedded_hal::digital::v2::OutputPin;
use heapless::String;
use log::debug;

use super::com::Com;
use super::mfrc522::{Mfrc522, Register};
use super::mifare::BLOCK_SIZE;
use super::Result;

/// Logs every documented register at debug level.
///
/// FIFODataReg is skipped: reading it would consume a byte.
pub fn dump_registers<COM, RST, D>(mfrc: &mut Mfrc522<COM, RST, D>) -> Result<()>
where
    COM: Com,
    RST: OutputPin,
    D: DelayMs<u32> + DelayUs<u32>,
{
    for &reg in Register::ALL.iter() {
        if reg == Register::FIFODataReg {
            continue;
        }
        debug!("{:?}: {:02x?}", reg, mfrc.read_register(reg)?);
    }
    Ok(())
}

/// One line of a card dump: `Block 08: 41 42 .. | AB..`.
pub fn format_block(block_addr: u8, data: &[u8; BLOCK_SIZE]) -> String<80> {
    let mut line = String::new();
    // At most 11 + 48 + 2 + 16 = 77 characters.
    let fits = write!(line, "Block {:02}: ", block_addr).is_ok()
        && data.iter().all(|byte| write!(line, "{:02X} ", byte).is_ok())
        && line.push_str("| ").is_ok()
        && data.iter().all(|&byte| line.push(printable(byte)).is_ok());
    debug_assert!(fits, "dump line for block {} overflowed", block_addr);
    line
}

fn printable(byte: u8) -> char {
    if byte.is_ascii_graphic() || byte == b' ' {
        byte as char
    } else {
        '.'
    }
}
