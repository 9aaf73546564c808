//! TON account addresses.
//!
//! An [`Address`] is the `addr_std` form: a signed 8-bit workchain and a
//! 256-bit account hash. It has two textual encodings:
//!
//! - raw: `workchain:hex64`, e.g. `0:83df...31a8`
//! - user-friendly: 36 bytes in base64 (48 characters), carrying a tag byte
//!   with the bounceable and test-only flags, the workchain byte, the hash,
//!   and a big-endian CRC16-XMODEM over the first 34 bytes.
//!
//! Flags only affect the text form. Parsing any encoding of an account and
//! re-encoding it with the same flags reproduces the same string.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};

use crate::{CellError, CellResult};

const TAG_BOUNCEABLE: u8 = 0x11;
const TAG_NON_BOUNCEABLE: u8 = 0x51;
const TAG_TEST_ONLY: u8 = 0x80;

/// Length of a decoded user-friendly address.
const FRIENDLY_BYTES: usize = 36;

/// Length of a user-friendly address in base64.
const FRIENDLY_CHARS: usize = 48;

/// Flags carried by the user-friendly encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AddressFlags {
    /// Messages to this address bounce back if the destination fails.
    pub bounceable: bool,
    /// The address is meant for the test network only.
    pub test_only: bool,
}

impl AddressFlags {
    pub const BOUNCEABLE: AddressFlags = AddressFlags {
        bounceable: true,
        test_only: false,
    };
    pub const NON_BOUNCEABLE: AddressFlags = AddressFlags {
        bounceable: false,
        test_only: false,
    };

    pub fn new(bounceable: bool, test_only: bool) -> Self {
        Self {
            bounceable,
            test_only,
        }
    }

    fn tag(self) -> u8 {
        let tag = if self.bounceable {
            TAG_BOUNCEABLE
        } else {
            TAG_NON_BOUNCEABLE
        };
        if self.test_only { tag | TAG_TEST_ONLY } else { tag }
    }

    fn from_tag(tag: u8) -> CellResult<Self> {
        let test_only = tag & TAG_TEST_ONLY != 0;
        let bounceable = match tag & !TAG_TEST_ONLY {
            TAG_BOUNCEABLE => true,
            TAG_NON_BOUNCEABLE => false,
            other => {
                return Err(CellError::InvalidAddress(format!(
                    "unknown tag byte 0x{other:02x}"
                )));
            }
        };
        Ok(Self {
            bounceable,
            test_only,
        })
    }
}

/// Standard internal address (`addr_std` without anycast).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    pub workchain: i8,
    pub hash: [u8; 32],
}

impl Address {
    pub fn new(workchain: i8, hash: [u8; 32]) -> Self {
        Self { workchain, hash }
    }

    /// Parse raw or user-friendly text, discarding the flags.
    pub fn parse(text: &str) -> CellResult<Self> {
        Self::parse_with_flags(text).map(|(address, _)| address)
    }

    /// Parse raw or user-friendly text.
    ///
    /// Raw addresses carry no flags and report bounceable mainnet, which is
    /// how the node treats a raw destination.
    pub fn parse_with_flags(text: &str) -> CellResult<(Self, AddressFlags)> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CellError::InvalidAddress("empty address".to_string()));
        }

        if text.contains(':') {
            return Self::parse_raw(text).map(|address| (address, AddressFlags::BOUNCEABLE));
        }

        Self::parse_friendly(text)
    }

    fn parse_raw(text: &str) -> CellResult<Self> {
        let (workchain, hash_hex) = text
            .split_once(':')
            .ok_or_else(|| CellError::InvalidAddress(text.to_string()))?;

        let workchain: i8 = workchain
            .parse()
            .map_err(|_| CellError::InvalidAddress(format!("invalid workchain: {workchain}")))?;

        if hash_hex.len() != 64 {
            return Err(CellError::InvalidAddress(format!(
                "address hex must be 64 characters, got {}",
                hash_hex.len()
            )));
        }

        let mut hash = [0u8; 32];
        hex::decode_to_slice(hash_hex, &mut hash)
            .map_err(|e| CellError::InvalidAddress(format!("invalid hex: {e}")))?;

        Ok(Self { workchain, hash })
    }

    /// Parse a 48-character user-friendly address in either base64 alphabet.
    pub fn parse_friendly(text: &str) -> CellResult<(Self, AddressFlags)> {
        if text.len() != FRIENDLY_CHARS {
            return Err(CellError::InvalidAddress(format!(
                "user-friendly address must be {FRIENDLY_CHARS} characters, got {}",
                text.len()
            )));
        }

        let bytes = if text.contains(['-', '_']) {
            URL_SAFE.decode(text)
        } else {
            STANDARD.decode(text)
        }
        .map_err(|e| CellError::InvalidAddress(format!("invalid base64: {e}")))?;

        if bytes.len() != FRIENDLY_BYTES {
            return Err(CellError::InvalidAddress(format!(
                "user-friendly address must be {FRIENDLY_BYTES} bytes, got {}",
                bytes.len()
            )));
        }

        let expected_crc = u16::from_be_bytes([bytes[34], bytes[35]]);
        let actual_crc = crc16_xmodem(&bytes[..34]);
        if expected_crc != actual_crc {
            return Err(CellError::InvalidAddress(format!(
                "CRC16 mismatch: expected {expected_crc:04x}, got {actual_crc:04x}"
            )));
        }

        let flags = AddressFlags::from_tag(bytes[0])?;
        let workchain = bytes[1] as i8;
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes[2..34]);

        Ok((Self { workchain, hash }, flags))
    }

    /// User-friendly form in the URL-safe alphabet.
    pub fn to_friendly(&self, flags: AddressFlags) -> String {
        let mut data = Vec::with_capacity(FRIENDLY_BYTES);
        data.push(flags.tag());
        data.push(self.workchain as u8);
        data.extend_from_slice(&self.hash);
        let crc = crc16_xmodem(&data);
        data.extend_from_slice(&crc.to_be_bytes());
        URL_SAFE.encode(&data)
    }

    /// Raw form `workchain:hex64`.
    pub fn to_raw(&self) -> String {
        format!("{}:{}", self.workchain, hex::encode(self.hash))
    }
}

impl FromStr for Address {
    type Err = CellError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_friendly(AddressFlags::BOUNCEABLE))
    }
}

/// CRC16-XMODEM checksum.
fn crc16_xmodem(data: &[u8]) -> u16 {
    const XMODEM: crc::Crc<u16> = crc::Crc::<u16>::new(&crc::CRC_16_XMODEM);
    XMODEM.checksum(data)
}
