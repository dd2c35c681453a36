use super::com::Com;
use super::mfrc522::Register;
use super::{Error, Result};
use embedded_hal::blocking::i2c;

/// Default 7-bit address with both address pins low.
pub const DEFAULT_ADDRESS: u8 = 0x28;

pub struct ComI2c<I2C> {
    com: I2C,
    addr: u8,
}
impl<I2C> ComI2c<I2C> {
    pub fn new(i2c: I2C, addr: u8) -> Self {
        Self { com: i2c, addr }
    }
    pub fn release(self) -> I2C {
        self.com
    }
}
impl<I2C> Com for ComI2c<I2C>
where
    I2C: i2c::Read + i2c::Write,
{
    fn read_register(&mut self, reg: Register) -> Result<u8> {
        let mut value = [0u8];
        self.com
            .write(self.addr, &[reg as u8])
            .map_err(|_| Error::Bus)?;
        self.com
            .read(self.addr, &mut value)
            .map_err(|_| Error::Bus)?;
        Ok(value[0])
    }
    fn write_register(&mut self, reg: Register, value: u8) -> Result<()> {
        self.com
            .write(self.addr, &[reg as u8, value])
            .map_err(|_| Error::Bus)
    }
}
