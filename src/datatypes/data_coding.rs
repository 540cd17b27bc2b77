// ABOUTME: SMPP data_coding scheme covering the alphabets the gateway emits and receives
// ABOUTME: Maps wire bytes to typed schemes and reports per-scheme single-message capacity

use std::fmt;

/// Data coding scheme of a short message
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DataCoding {
    /// SMSC Default Alphabet (GSM 03.38 7-bit)
    #[default]
    SmscDefault,
    /// IA5 (CCITT T.50)/ASCII encoding
    Ascii,
    /// 8-bit binary data (no encoding)
    Binary,
    /// Latin-1 (ISO-8859-1) character set
    Latin1,
    /// UCS-2 (ISO/IEC-10646), sent as big-endian UTF-16
    Ucs2,
    /// Any other value, preserved as received
    Custom(u8),
}

impl DataCoding {
    /// Creates a DataCoding from a raw u8 value
    pub fn from_byte(value: u8) -> Self {
        match value {
            0x00 => DataCoding::SmscDefault,
            0x01 => DataCoding::Ascii,
            0x02 => DataCoding::Binary,
            0x03 => DataCoding::Latin1,
            0x08 => DataCoding::Ucs2,
            _ => DataCoding::Custom(value),
        }
    }

    /// Returns the raw u8 value for wire protocol
    pub fn to_byte(&self) -> u8 {
        match self {
            DataCoding::SmscDefault => 0x00,
            DataCoding::Ascii => 0x01,
            DataCoding::Binary => 0x02,
            DataCoding::Latin1 => 0x03,
            DataCoding::Ucs2 => 0x08,
            DataCoding::Custom(value) => *value,
        }
    }

    /// Returns true if this encoding uses 7-bit character encoding
    pub fn is_7bit(&self) -> bool {
        matches!(self, DataCoding::SmscDefault | DataCoding::Ascii)
    }

    /// Returns true if this is a UCS-2 encoding
    pub fn is_ucs2(&self) -> bool {
        matches!(self, DataCoding::Ucs2)
    }

    /// Maximum characters in a single, unsegmented message
    pub fn max_single_sms_length(&self) -> usize {
        match self {
            DataCoding::SmscDefault | DataCoding::Ascii => 160,
            DataCoding::Ucs2 => 70,
            _ => 140,
        }
    }
}

impl fmt::Debug for DataCoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataCoding::SmscDefault => write!(f, "SmscDefault"),
            DataCoding::Ascii => write!(f, "Ascii"),
            DataCoding::Binary => write!(f, "Binary"),
            DataCoding::Latin1 => write!(f, "Latin1"),
            DataCoding::Ucs2 => write!(f, "Ucs2"),
            DataCoding::Custom(value) => write!(f, "Custom({:#04x})", value),
        }
    }
}

impl From<u8> for DataCoding {
    fn from(value: u8) -> Self {
        DataCoding::from_byte(value)
    }
}

impl From<DataCoding> for u8 {
    fn from(coding: DataCoding) -> Self {
        coding.to_byte()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_mapping() {
        assert_eq!(DataCoding::from_byte(0x00), DataCoding::SmscDefault);
        assert_eq!(DataCoding::from_byte(0x08), DataCoding::Ucs2);
        assert_eq!(DataCoding::from_byte(0xF1), DataCoding::Custom(0xF1));
        assert_eq!(DataCoding::Custom(0xF1).to_byte(), 0xF1);
        assert_eq!(u8::from(DataCoding::Ucs2), 8);
    }

    #[test]
    fn single_message_capacity() {
        assert_eq!(DataCoding::SmscDefault.max_single_sms_length(), 160);
        assert_eq!(DataCoding::Ucs2.max_single_sms_length(), 70);
        assert_eq!(DataCoding::Binary.max_single_sms_length(), 140);
        assert!(DataCoding::SmscDefault.is_7bit());
        assert!(DataCoding::Ucs2.is_ucs2());
    }
}
