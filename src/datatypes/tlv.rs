use crate::codec::{CodecError, decode_u16};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::Cursor;

/// Tags of the optional parameters the gateway reads or writes
pub mod tags {
    /// Message id of the submit a delivery receipt refers to
    pub const RECEIPTED_MESSAGE_ID: u16 = 0x001E;
    /// SMSC interface version in bind responses
    pub const SC_INTERFACE_VERSION: u16 = 0x0210;
    /// Final message state of a delivery receipt
    pub const MESSAGE_STATE: u16 = 0x0427;
    /// Network-specific error code of a delivery receipt
    pub const NETWORK_ERROR_CODE: u16 = 0x0423;
    pub const SAR_MSG_REF_NUM: u16 = 0x020C;
    pub const SAR_TOTAL_SEGMENTS: u16 = 0x020E;
    pub const SAR_SEGMENT_SEQNUM: u16 = 0x020F;
    pub const MESSAGE_PAYLOAD: u16 = 0x0424;
}

#[derive(Clone, Debug, PartialEq)]
pub struct Tlv {
    /// The Tag field is used to uniquely identify the particular optional parameter in question.
    pub tag: u16,

    /// The Value field contains the actual data for the optional parameter in question.
    /// Its length is written on the wire as a 16-bit prefix.
    pub value: Bytes,
}

impl Tlv {
    pub fn new(tag: u16, value: impl Into<Bytes>) -> Self {
        Self {
            tag,
            value: value.into(),
        }
    }

    pub fn from_u8(tag: u16, value: u8) -> Self {
        Self::new(tag, vec![value])
    }

    /// A C-octet string value, terminator included
    pub fn from_cstring(tag: u16, value: &str) -> Self {
        let mut bytes = Vec::with_capacity(value.len() + 1);
        bytes.extend_from_slice(value.as_bytes());
        bytes.push(0);
        Self::new(tag, bytes)
    }

    pub fn as_u8(&self) -> Option<u8> {
        match self.value.as_ref() {
            [value] => Some(*value),
            _ => None,
        }
    }

    /// Lenient string view: some SMSCs omit the terminator
    pub fn as_cstring(&self) -> Option<String> {
        let end = self
            .value
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.value.len());
        String::from_utf8(self.value[..end].to_vec()).ok()
    }

    pub fn encoded_size(&self) -> usize {
        4 + self.value.len()
    }

    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        let length = u16::try_from(self.value.len())
            .map_err(|_| CodecError::TlvError(format!("tag {:#06x} value too long", self.tag)))?;
        buf.put_u16(self.tag);
        buf.put_u16(length);
        buf.put_slice(&self.value);
        Ok(())
    }

    pub fn decode(buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        if buf.remaining() < 4 {
            return Err(CodecError::TlvError(format!(
                "{} stray bytes after mandatory fields",
                buf.remaining()
            )));
        }
        let tag = decode_u16(buf)?;
        let length = decode_u16(buf)? as usize;
        if buf.remaining() < length {
            return Err(CodecError::TlvError(format!(
                "tag {:#06x} declares {} bytes, {} available",
                tag,
                length,
                buf.remaining()
            )));
        }
        let value = buf.copy_to_bytes(length);
        Ok(Self { tag, value })
    }

    /// Decode TLVs until the end of the PDU body
    pub fn decode_all(buf: &mut Cursor<&[u8]>) -> Result<Vec<Tlv>, CodecError> {
        let mut tlvs = Vec::new();
        while buf.has_remaining() {
            tlvs.push(Tlv::decode(buf)?);
        }
        Ok(tlvs)
    }
}

/// First TLV with the given tag
pub fn find_tlv(tlvs: &[Tlv], tag: u16) -> Option<&Tlv> {
    tlvs.iter().find(|tlv| tlv.tag == tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tlv_wire_format() {
        let mut buf = BytesMut::new();
        Tlv::from_u8(tags::MESSAGE_STATE, 2).encode(&mut buf).unwrap();
        assert_eq!(buf.as_ref(), &[0x04, 0x27, 0x00, 0x01, 0x02]);
    }

    #[test]
    fn decode_all_reads_sequence() {
        let data = [
            0x00, 0x1E, 0x00, 0x04, b'a', b'b', b'c', 0x00, // receipted_message_id
            0x04, 0x27, 0x00, 0x01, 0x02, // message_state
        ];
        let mut cursor = Cursor::new(&data[..]);
        let tlvs = Tlv::decode_all(&mut cursor).unwrap();
        assert_eq!(tlvs.len(), 2);
        assert_eq!(
            find_tlv(&tlvs, tags::RECEIPTED_MESSAGE_ID).and_then(Tlv::as_cstring),
            Some("abc".to_string())
        );
        assert_eq!(find_tlv(&tlvs, tags::MESSAGE_STATE).and_then(Tlv::as_u8), Some(2));
    }

    #[test]
    fn truncated_value_is_an_error() {
        let data = [0x04, 0x27, 0x00, 0x05, 0x02];
        let mut cursor = Cursor::new(&data[..]);
        assert!(matches!(Tlv::decode(&mut cursor), Err(CodecError::TlvError(_))));
    }
}
