// ABOUTME: SMPP address triple (TON, NPI, address digits) shared by submit_sm and deliver_sm
// ABOUTME: Handles the wire layout and lenient decoding of unrecognised TON/NPI values

use crate::codec::{CodecError, decode_cstring, decode_u8, encode_cstring, encode_u8};
use crate::datatypes::{NumericPlanIndicator, TypeOfNumber};
use bytes::BytesMut;
use std::fmt;
use std::io::Cursor;

/// Maximum address length for source/destination, terminator included
pub const MAX_ADDRESS_LENGTH: usize = 21;

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Address {
    pub ton: TypeOfNumber,
    pub npi: NumericPlanIndicator,
    pub addr: String,
}

impl Address {
    pub fn new(ton: TypeOfNumber, npi: NumericPlanIndicator, addr: impl Into<String>) -> Self {
        Self {
            ton,
            npi,
            addr: addr.into(),
        }
    }

    /// International number on the ISDN plan
    pub fn international(addr: impl Into<String>) -> Self {
        Self::new(TypeOfNumber::International, NumericPlanIndicator::Isdn, addr)
    }

    pub(crate) fn encode(&self, buf: &mut BytesMut, field: &'static str) -> Result<(), CodecError> {
        encode_u8(buf, self.ton as u8);
        encode_u8(buf, self.npi as u8);
        encode_cstring(buf, &self.addr, MAX_ADDRESS_LENGTH, field)
    }

    pub(crate) fn decode(buf: &mut Cursor<&[u8]>, field: &'static str) -> Result<Self, CodecError> {
        let ton_raw = decode_u8(buf)?;
        let npi_raw = decode_u8(buf)?;
        let addr = decode_cstring(buf, MAX_ADDRESS_LENGTH, field)?;

        let ton = TypeOfNumber::try_from(ton_raw).unwrap_or_else(|_| {
            tracing::debug!(field, ton = ton_raw, "unrecognised TON, treating as unknown");
            TypeOfNumber::Unknown
        });
        let npi = NumericPlanIndicator::try_from(npi_raw).unwrap_or_else(|_| {
            tracing::debug!(field, npi = npi_raw, "unrecognised NPI, treating as unknown");
            NumericPlanIndicator::Unknown
        });

        Ok(Self { ton, npi, addr })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_wire_layout() {
        let mut buf = BytesMut::new();
        Address::international("4477")
            .encode(&mut buf, "destination_addr")
            .unwrap();
        assert_eq!(buf.as_ref(), &[0x01, 0x01, b'4', b'4', b'7', b'7', 0x00]);
    }

    #[test]
    fn overlong_address_is_rejected() {
        let mut buf = BytesMut::new();
        let address = Address::international("1".repeat(21));
        assert!(matches!(
            address.encode(&mut buf, "destination_addr"),
            Err(CodecError::FieldValidation {
                field: "destination_addr",
                ..
            })
        ));
    }

    #[test]
    fn unknown_ton_decodes_leniently() {
        let data = [0x07, 0x01, b'1', 0x00];
        let mut cursor = Cursor::new(&data[..]);
        let address = Address::decode(&mut cursor, "source_addr").unwrap();
        assert_eq!(address.ton, TypeOfNumber::Unknown);
        assert_eq!(address.npi, NumericPlanIndicator::Isdn);
        assert_eq!(address.addr, "1");
    }
}
