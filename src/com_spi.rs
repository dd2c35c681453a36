use super::com::Com;
use super::mfrc522::Register;
use super::{Error, Result};
use embedded_hal::blocking::spi;
use embedded_hal::digital::v2::OutputPin;

/// SPI access with a software-driven chip-select (NSS) line.
///
/// Every register access is one transaction: NSS goes low, the address byte
/// and the value are clocked, NSS goes high again. NSS is never held across
/// two accesses.
pub struct ComSpi<SPI, NSS> {
    spi: SPI,
    nss: NSS,
}

impl<SPI, NSS> ComSpi<SPI, NSS> {
    pub fn new(spi: SPI, nss: NSS) -> Self {
        Self { spi, nss }
    }

    pub fn release(self) -> (SPI, NSS) {
        (self.spi, self.nss)
    }

    /// Address byte for a read: `0b1aaa_aaa0`.
    pub fn register_to_readvalue(reg: Register) -> u8 {
        (((reg as u8) << 1) | 0b1000_0000) & 0b1111_1110
    }

    /// Address byte for a write: `0b0aaa_aaa0`.
    pub fn register_to_writevalue(reg: Register) -> u8 {
        ((reg as u8) << 1) & 0b0111_1110
    }
}

impl<SPI, NSS> ComSpi<SPI, NSS>
where
    NSS: OutputPin,
{
    fn transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut SPI) -> Result<T>,
    {
        self.nss.set_low().map_err(|_| Error::Bus)?;
        let res = f(&mut self.spi);
        self.nss.set_high().map_err(|_| Error::Bus)?;
        res
    }
}

impl<SPI, NSS> Com for ComSpi<SPI, NSS>
where
    SPI: spi::Transfer<u8> + spi::Write<u8>,
    NSS: OutputPin,
{
    fn read_register(&mut self, reg: Register) -> Result<u8> {
        let address = Self::register_to_readvalue(reg);
        self.transaction(|spi| {
            spi.write(&[address]).map_err(|_| Error::Bus)?;
            let mut buf = [0u8];
            let rx = spi.transfer(&mut buf).map_err(|_| Error::Bus)?;
            Ok(rx[0])
        })
    }

    fn write_register(&mut self, reg: Register, value: u8) -> Result<()> {
        let address = Self::register_to_writevalue(reg);
        self.transaction(|spi| spi.write(&[address, value]).map_err(|_| Error::Bus))
    }
}
