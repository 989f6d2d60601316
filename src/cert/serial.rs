//! Certificate serial numbers.
//!
//! Serial numbers are handled as unsigned big-endian magnitudes; the DER
//! encoder adds the sign octet where needed.

use x509_cert::serial_number::SerialNumber;

use crate::error::{Result, SelfCertError};

/// Builds a serial number from a configured integer. Zero is rejected, serial
/// numbers must be positive.
pub fn from_u64(value: u64) -> Result<SerialNumber> {
    if value == 0 {
        return Err(SelfCertError::InvalidInput(
            "serial number must be positive".to_string(),
        ));
    }
    from_magnitude(&value.to_be_bytes())
}

/// Builds a serial number from big-endian magnitude bytes.
pub fn from_magnitude(bytes: &[u8]) -> Result<SerialNumber> {
    let trimmed = strip_leading_zeros(bytes);
    if trimmed.is_empty() {
        return Err(SelfCertError::InvalidInput(
            "serial number must be positive".to_string(),
        ));
    }
    // Keep the INTEGER positive when the top bit is set.
    let mut encoded = Vec::with_capacity(trimmed.len() + 1);
    if trimmed[0] & 0x80 != 0 {
        encoded.push(0);
    }
    encoded.extend_from_slice(trimmed);
    SerialNumber::new(&encoded).map_err(|e| SelfCertError::EncodingError(e.to_string()))
}

/// Big-endian magnitude of a serial number, without sign octet.
pub fn magnitude(serial: &SerialNumber) -> Vec<u8> {
    strip_leading_zeros(serial.as_bytes()).to_vec()
}

/// Returns `serial + 1`.
pub fn increment(serial: &SerialNumber) -> Result<SerialNumber> {
    let mut bytes = magnitude(serial);
    let mut carry = true;
    for byte in bytes.iter_mut().rev() {
        let (sum, overflow) = byte.overflowing_add(1);
        *byte = sum;
        if !overflow {
            carry = false;
            break;
        }
    }
    if carry {
        bytes.insert(0, 1);
    }
    from_magnitude(&bytes)
}

/// Lower-case hex rendering, e.g. `01:a0`.
pub fn to_hex(serial: &SerialNumber) -> String {
    magnitude(serial)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}
