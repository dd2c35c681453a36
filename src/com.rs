use super::mfrc522::Register;
use super::Result;

/// Single-register access to the reader.
///
/// Implementors frame exactly one register per transaction; multi-register
/// sequences are built by the caller out of these primitives.
pub trait Com {
    fn read_register(&mut self, reg: Register) -> Result<u8>;
    fn write_register(&mut self, reg: Register, value: u8) -> Result<()>;

    fn set_register_bitmask(&mut self, reg: Register, mask: u8) -> Result<()> {
        let tmp = self.read_register(reg)?;
        self.write_register(reg, tmp | mask)
    }

    fn clear_register_bitmask(&mut self, reg: Register, mask: u8) -> Result<()> {
        let tmp = self.read_register(reg)?;
        self.write_register(reg, tmp & !mask)
    }
}
