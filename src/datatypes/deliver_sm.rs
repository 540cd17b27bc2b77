use crate::codec::{CodecError, Decodable, Encodable, PduHeader, decode_cstring, encode_cstring};
use crate::datatypes::message_body::MessageBody;
use crate::datatypes::submit_sm::MAX_MESSAGE_ID_LENGTH;
use crate::datatypes::{CommandId, CommandStatus};
use bytes::{Buf, BytesMut};
use std::io::Cursor;
use std::ops::Deref;

/// This operation is used by the SMSC to deliver a short message to an ESME.
/// The deliver_sm PDU carries both mobile originated messages and delivery
/// receipts; esm_class tells them apart.
#[derive(Clone, Debug, PartialEq)]
pub struct DeliverSm {
    pub sequence_number: u32,
    pub body: MessageBody,
}

impl DeliverSm {
    pub fn new(sequence_number: u32, body: MessageBody) -> Self {
        Self {
            sequence_number,
            body,
        }
    }
}

impl Deref for DeliverSm {
    type Target = MessageBody;

    fn deref(&self) -> &MessageBody {
        &self.body
    }
}

impl Encodable for DeliverSm {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        PduHeader::new(CommandId::DeliverSm, CommandStatus::OK, self.sequence_number)
            .encode(buf)?;
        self.body.encode(buf)
    }
}

impl Decodable for DeliverSm {
    fn command_ids() -> &'static [CommandId] {
        &[CommandId::DeliverSm]
    }

    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;
        Ok(Self {
            sequence_number: header.sequence_number,
            body: MessageBody::decode(buf)?,
        })
    }
}

/// deliver_sm_resp; message_id is unused and always sent empty
#[derive(Clone, Debug, PartialEq)]
pub struct DeliverSmResponse {
    pub command_status: CommandStatus,
    pub sequence_number: u32,
}

impl DeliverSmResponse {
    pub fn new(sequence_number: u32, command_status: CommandStatus) -> Self {
        Self {
            command_status,
            sequence_number,
        }
    }
}

impl Encodable for DeliverSmResponse {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        PduHeader::new(
            CommandId::DeliverSmResp,
            self.command_status,
            self.sequence_number,
        )
        .encode(buf)?;
        encode_cstring(buf, "", MAX_MESSAGE_ID_LENGTH, "message_id")
    }
}

impl Decodable for DeliverSmResponse {
    fn command_ids() -> &'static [CommandId] {
        &[CommandId::DeliverSmResp]
    }

    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;
        if buf.has_remaining() {
            decode_cstring(buf, MAX_MESSAGE_ID_LENGTH, "message_id")?;
        }
        Ok(Self {
            command_status: header.command_status,
            sequence_number: header.sequence_number,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Pdu;
    use crate::datatypes::tlv::{Tlv, tags};
    use crate::datatypes::{Address, EsmClass};
    use bytes::Bytes;

    #[test]
    fn receipt_with_tlvs_decodes() {
        let body = MessageBody {
            source: Address::international("06304988888"),
            destination: Address::international("ACME"),
            esm_class: EsmClass(0x04),
            short_message: Bytes::from_static(b"id:abc stat:DELIVRD err:000"),
            tlvs: vec![
                Tlv::from_cstring(tags::RECEIPTED_MESSAGE_ID, "abc"),
                Tlv::from_u8(tags::MESSAGE_STATE, 2),
            ],
            ..Default::default()
        };
        let bytes = DeliverSm::new(77, body).to_bytes().unwrap();

        match Pdu::decode(&bytes).unwrap() {
            Pdu::DeliverSm(deliver) => {
                assert_eq!(deliver.sequence_number, 77);
                assert!(deliver.esm_class.is_delivery_receipt());
                assert_eq!(deliver.tlvs.len(), 2);
                assert_eq!(
                    deliver.tlv(tags::MESSAGE_STATE).and_then(Tlv::as_u8),
                    Some(2)
                );
            }
            other => panic!("expected DeliverSm, got {:?}", other),
        }
    }

    #[test]
    fn deliver_sm_resp_has_empty_message_id() {
        let bytes = DeliverSmResponse::new(5, CommandStatus::OK).to_bytes().unwrap();
        assert_eq!(bytes.len(), PduHeader::SIZE + 1);
        assert_eq!(bytes[PduHeader::SIZE], 0);
    }
}
