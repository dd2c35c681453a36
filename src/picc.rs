//! Card-side (PICC) commands and types.

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    REQA = 0x26, // REQuest command, Type A. Invites PICCs in state IDLE to go to READY and prepare for anticollision or selection. 7 bit frame.
    WUPA = 0x52, // Wake-UP command, Type A. Invites PICCs in state IDLE and HALT to go to READY(*) and prepare for anticollision or selection. 7 bit frame.
    SelCl1 = 0x93, // Anti collision/Select, Cascade Level 1
    HLTA = 0x50, // HaLT command, Type A. Instructs an ACTIVE PICC to go to state HALT.
    // The commands used for MIFARE Classic (from http://www.mouser.com/ds/2/302/MF1S503x-89574.pdf, Section 9)
    MfAuthKeyA = 0x60, // Perform authentication with Key A
    MfAuthKeyB = 0x61, // Perform authentication with Key B
    MfRead = 0x30,     // Reads one 16 byte block from the authenticated sector of the PICC.
    MfWrite = 0xA0,    // Writes one 16 byte block to the authenticated sector of the PICC.
}

/// NVB for ANTICOLLISION at cascade level 1: two whole bytes, no UID bits.
pub const NVB_ANTICOLLISION: u8 = 0x20;
/// NVB for SELECT: seven whole bytes.
pub const NVB_SELECT: u8 = 0x70;
/// 4-bit acknowledge sent by MIFARE cards.
pub const MIFARE_ACK: u8 = 0x0A;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Unknown,
    Iso14443_4,    // PICC compliant with ISO/IEC 14443-4
    Iso18092,      // PICC compliant with ISO/IEC 18092 (NFC)
    MifareMini,    // MIFARE Classic protocol, 320 bytes
    Mifare1k,      // MIFARE Classic protocol, 1KB
    Mifare4k,      // MIFARE Classic protocol, 4KB
    MifareUL,      // MIFARE Ultralight or Ultralight C
    MifarePlus,    // MIFARE Plus
    TNP3XXX,       // Only mentioned in NXP AN 10833 MIFARE Type Identification Procedure
    NotComplete,   // SAK indicates UID is not complete.
}

impl Type {
    pub fn from_sak(sak: u8) -> Type {
        // http://www.nxp.com/documents/application_note/AN10833.pdf
        // 3.2 Coding of Select Acknowledge (SAK)
        // ignore 8-bit (iso14443 starts with LSBit = bit 1)
        match sak & 0x7F {
            0x04 => Type::NotComplete,
            0x09 => Type::MifareMini,
            0x08 => Type::Mifare1k,
            0x18 => Type::Mifare4k,
            0x00 => Type::MifareUL,
            0x10 | 0x11 => Type::MifarePlus,
            0x01 => Type::TNP3XXX,
            0x20 => Type::Iso14443_4,
            0x40 => Type::Iso18092,
            _ => Type::Unknown,
        }
    }
}

/// Block check character: XOR of the four UID bytes of a cascade level.
pub fn bcc(serial: &[u8; 4]) -> u8 {
    serial.iter().fold(0, |acc, b| acc ^ b)
}

/// UID bytes; single, double or triple size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UidBytes {
    Single([u8; 4]),
    Double([u8; 7]),
    Triple([u8; 10]),
}

impl UidBytes {
    pub fn as_slice(&self) -> &[u8] {
        match self {
            UidBytes::Single(b) => b,
            UidBytes::Double(b) => b,
            UidBytes::Triple(b) => b,
        }
    }
}

/// A card identifier obtained from a successful SELECT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Uid {
    bytes: UidBytes,
    sak: u8,
    generation: u32,
}

impl Uid {
    pub(crate) fn new(bytes: UidBytes, sak: u8, generation: u32) -> Self {
        Self {
            bytes,
            sak,
            generation,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        self.bytes.as_slice()
    }

    pub fn uid_bytes(&self) -> UidBytes {
        self.bytes
    }

    /// The SAK (Select acknowledge) byte returned from the PICC after successful selection.
    pub fn sak(&self) -> u8 {
        self.sak
    }

    /// Discovery cycle that produced this UID.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn picc_type(&self) -> Type {
        Type::from_sak(self.sak)
    }

    /// Serial number fed to MIFARE authentication: the last four UID bytes
    /// (AN10927 section 3.2.5).
    pub fn serial(&self) -> [u8; 4] {
        let bytes = self.bytes();
        let mut serial = [0u8; 4];
        serial.copy_from_slice(&bytes[bytes.len() - 4..]);
        serial
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    A,
    B,
}

impl KeyType {
    pub fn command(self) -> Command {
        match self {
            KeyType::A => Command::MfAuthKeyA,
            KeyType::B => Command::MfAuthKeyB,
        }
    }
}

/// A six byte MIFARE sector key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Key([u8; 6]);

impl Key {
    /// Factory default transport key.
    pub const DEFAULT: Key = Key([0xFF; 6]);

    pub const fn new(bytes: [u8; 6]) -> Self {
        Key(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

impl From<[u8; 6]> for Key {
    fn from(bytes: [u8; 6]) -> Self {
        Key(bytes)
    }
}
