// ABOUTME: Mandatory and optional fields shared by submit_sm and deliver_sm
// ABOUTME: Both PDUs have an identical body layout on the wire, so it is encoded in one place

use crate::codec::{CodecError, decode_cstring, decode_u8, encode_cstring, encode_u8};
use crate::datatypes::tlv::{Tlv, find_tlv};
use crate::datatypes::{Address, DataCoding, EsmClass};
use bytes::{Buf, Bytes, BytesMut};
use std::io::Cursor;

pub const MAX_SERVICE_TYPE_LENGTH: usize = 6;
pub const MAX_TIME_LENGTH: usize = 17;
pub const MAX_SHORT_MESSAGE_LENGTH: usize = 254;

#[derive(Clone, Debug, PartialEq, Default)]
pub struct MessageBody {
    /// Type of SMS application service; empty means SMSC default
    pub service_type: String,
    pub source: Address,
    pub destination: Address,
    pub esm_class: EsmClass,
    pub protocol_id: u8,
    pub priority_flag: u8,
    /// Absolute or relative time, empty for immediate delivery
    pub schedule_delivery_time: String,
    pub validity_period: String,
    /// Bit 0 requests an SMSC delivery receipt
    pub registered_delivery: u8,
    pub replace_if_present_flag: u8,
    pub data_coding: DataCoding,
    pub sm_default_msg_id: u8,
    /// User data, UDH included when esm_class carries UDHI
    pub short_message: Bytes,
    pub tlvs: Vec<Tlv>,
}

impl MessageBody {
    pub fn tlv(&self, tag: u16) -> Option<&Tlv> {
        find_tlv(&self.tlvs, tag)
    }

    pub(crate) fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        if self.short_message.len() > MAX_SHORT_MESSAGE_LENGTH {
            return Err(CodecError::FieldValidation {
                field: "short_message",
                reason: format!(
                    "{} bytes exceeds maximum of {}",
                    self.short_message.len(),
                    MAX_SHORT_MESSAGE_LENGTH
                ),
            });
        }

        encode_cstring(buf, &self.service_type, MAX_SERVICE_TYPE_LENGTH, "service_type")?;
        self.source.encode(buf, "source_addr")?;
        self.destination.encode(buf, "destination_addr")?;
        encode_u8(buf, self.esm_class.0);
        encode_u8(buf, self.protocol_id);
        encode_u8(buf, self.priority_flag);
        encode_cstring(
            buf,
            &self.schedule_delivery_time,
            MAX_TIME_LENGTH,
            "schedule_delivery_time",
        )?;
        encode_cstring(buf, &self.validity_period, MAX_TIME_LENGTH, "validity_period")?;
        encode_u8(buf, self.registered_delivery);
        encode_u8(buf, self.replace_if_present_flag);
        encode_u8(buf, self.data_coding.to_byte());
        encode_u8(buf, self.sm_default_msg_id);
        encode_u8(buf, self.short_message.len() as u8);
        buf.extend_from_slice(&self.short_message);

        for tlv in &self.tlvs {
            tlv.encode(buf)?;
        }
        Ok(())
    }

    pub(crate) fn decode(buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        let service_type = decode_cstring(buf, MAX_SERVICE_TYPE_LENGTH, "service_type")?;
        let source = Address::decode(buf, "source_addr")?;
        let destination = Address::decode(buf, "destination_addr")?;
        let esm_class = EsmClass(decode_u8(buf)?);
        let protocol_id = decode_u8(buf)?;
        let priority_flag = decode_u8(buf)?;
        let schedule_delivery_time =
            decode_cstring(buf, MAX_TIME_LENGTH, "schedule_delivery_time")?;
        let validity_period = decode_cstring(buf, MAX_TIME_LENGTH, "validity_period")?;
        let registered_delivery = decode_u8(buf)?;
        let replace_if_present_flag = decode_u8(buf)?;
        let data_coding = DataCoding::from_byte(decode_u8(buf)?);
        let sm_default_msg_id = decode_u8(buf)?;

        let sm_length = decode_u8(buf)? as usize;
        if buf.remaining() < sm_length {
            return Err(CodecError::FieldValidation {
                field: "short_message",
                reason: format!(
                    "sm_length {} exceeds {} remaining bytes",
                    sm_length,
                    buf.remaining()
                ),
            });
        }
        let short_message = buf.copy_to_bytes(sm_length);
        let tlvs = Tlv::decode_all(buf)?;

        Ok(Self {
            service_type,
            source,
            destination,
            esm_class,
            protocol_id,
            priority_flag,
            schedule_delivery_time,
            validity_period,
            registered_delivery,
            replace_if_present_flag,
            data_coding,
            sm_default_msg_id,
            short_message,
            tlvs,
        })
    }
}
