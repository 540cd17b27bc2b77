use crate::codec::{CodecError, Decodable, Encodable, PduHeader, decode_cstring, encode_cstring};
use crate::datatypes::message_body::MessageBody;
use crate::datatypes::{CommandId, CommandStatus};
use bytes::{Buf, BytesMut};
use std::io::Cursor;
use std::ops::{Deref, DerefMut};

/// Maximum message_id length, terminator included
pub const MAX_MESSAGE_ID_LENGTH: usize = 65;

/// submit_sm: one short message (or one segment of a long message) from the
/// ESME to the SMSC for onward delivery.
#[derive(Clone, Debug, PartialEq)]
pub struct SubmitSm {
    pub sequence_number: u32,
    pub body: MessageBody,
}

impl SubmitSm {
    pub fn new(sequence_number: u32, body: MessageBody) -> Self {
        Self {
            sequence_number,
            body,
        }
    }
}

impl Deref for SubmitSm {
    type Target = MessageBody;

    fn deref(&self) -> &MessageBody {
        &self.body
    }
}

impl DerefMut for SubmitSm {
    fn deref_mut(&mut self) -> &mut MessageBody {
        &mut self.body
    }
}

impl Encodable for SubmitSm {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        PduHeader::new(CommandId::SubmitSm, CommandStatus::OK, self.sequence_number).encode(buf)?;
        self.body.encode(buf)
    }
}

impl Decodable for SubmitSm {
    fn command_ids() -> &'static [CommandId] {
        &[CommandId::SubmitSm]
    }

    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;
        Ok(Self {
            sequence_number: header.sequence_number,
            body: MessageBody::decode(buf)?,
        })
    }
}

/// submit_sm_resp carries the SMSC-assigned message id used later by
/// delivery receipts.
#[derive(Clone, Debug, PartialEq)]
pub struct SubmitSmResponse {
    pub command_status: CommandStatus,
    pub sequence_number: u32,
    pub message_id: String,
}

impl SubmitSmResponse {
    pub fn new(sequence_number: u32, message_id: impl Into<String>) -> Self {
        Self {
            command_status: CommandStatus::OK,
            sequence_number,
            message_id: message_id.into(),
        }
    }

    pub fn error(sequence_number: u32, status: CommandStatus) -> Self {
        Self {
            command_status: status,
            sequence_number,
            message_id: String::new(),
        }
    }
}

impl Encodable for SubmitSmResponse {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        PduHeader::new(
            CommandId::SubmitSmResp,
            self.command_status,
            self.sequence_number,
        )
        .encode(buf)?;

        // The body is omitted on error
        if self.command_status.is_ok() {
            encode_cstring(buf, &self.message_id, MAX_MESSAGE_ID_LENGTH, "message_id")?;
        }
        Ok(())
    }
}

impl Decodable for SubmitSmResponse {
    fn command_ids() -> &'static [CommandId] {
        &[CommandId::SubmitSmResp]
    }

    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;
        let message_id = if buf.has_remaining() {
            decode_cstring(buf, MAX_MESSAGE_ID_LENGTH, "message_id")?
        } else {
            String::new()
        };

        Ok(Self {
            command_status: header.command_status,
            sequence_number: header.sequence_number,
            message_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Pdu;
    use crate::datatypes::{Address, DataCoding, EsmClass, NumericPlanIndicator, TypeOfNumber};
    use bytes::Bytes;

    fn sample_body() -> MessageBody {
        MessageBody {
            source: Address::new(TypeOfNumber::Alphanumeric, NumericPlanIndicator::Isdn, "ACME"),
            destination: Address::international("06304988888"),
            registered_delivery: 1,
            short_message: Bytes::from_static(b"Hello World!"),
            ..Default::default()
        }
    }

    #[test]
    fn submit_sm_mandatory_field_layout() {
        let bytes = SubmitSm::new(2, sample_body()).to_bytes().unwrap();
        let body = &bytes[PduHeader::SIZE..];

        let mut expected = vec![0x00]; // service_type
        expected.extend_from_slice(&[0x05, 0x01]);
        expected.extend_from_slice(b"ACME\0");
        expected.extend_from_slice(&[0x01, 0x01]);
        expected.extend_from_slice(b"06304988888\0");
        expected.extend_from_slice(&[
            0x00, // esm_class
            0x00, // protocol_id
            0x00, // priority_flag
            0x00, // schedule_delivery_time
            0x00, // validity_period
            0x01, // registered_delivery
            0x00, // replace_if_present_flag
            0x00, // data_coding
            0x00, // sm_default_msg_id
            0x0C, // sm_length
        ]);
        expected.extend_from_slice(b"Hello World!");

        assert_eq!(body, expected.as_slice());
        assert_eq!(&bytes[0..4], &(bytes.len() as u32).to_be_bytes());
    }

    #[test]
    fn submit_sm_with_udh_decodes() {
        let mut body = sample_body();
        body.esm_class = EsmClass::default().with_udhi();
        body.data_coding = DataCoding::Ucs2;
        body.short_message = Bytes::from_static(&[0x05, 0x00, 0x03, 0x2A, 0x02, 0x01, 0x00, 0x41]);

        let original = SubmitSm::new(10, body);
        let bytes = original.to_bytes().unwrap();
        match Pdu::decode(&bytes).unwrap() {
            Pdu::SubmitSm(decoded) => {
                assert_eq!(*decoded, original);
                assert!(decoded.esm_class.has_udhi());
            }
            other => panic!("expected SubmitSm, got {:?}", other),
        }
    }

    #[test]
    fn short_message_over_254_bytes_is_rejected() {
        let mut body = sample_body();
        body.short_message = Bytes::from(vec![b'a'; 255]);
        assert!(matches!(
            SubmitSm::new(1, body).to_bytes(),
            Err(CodecError::FieldValidation {
                field: "short_message",
                ..
            })
        ));
    }

    #[test]
    fn error_response_has_no_body() {
        let bytes = SubmitSmResponse::error(4, CommandStatus::THROTTLED)
            .to_bytes()
            .unwrap();
        assert_eq!(bytes.len(), PduHeader::SIZE);

        match Pdu::decode(&bytes).unwrap() {
            Pdu::SubmitSmResp(response) => {
                assert_eq!(response.command_status, CommandStatus::THROTTLED);
                assert!(response.message_id.is_empty());
            }
            other => panic!("expected SubmitSmResp, got {:?}", other),
        }
    }

    #[test]
    fn sm_length_beyond_frame_is_malformed() {
        let mut bytes = SubmitSm::new(2, sample_body()).to_bytes().unwrap().to_vec();
        // drop the last byte of the message and fix up the length
        bytes.pop();
        let length = bytes.len() as u32;
        bytes[0..4].copy_from_slice(&length.to_be_bytes());

        assert!(matches!(
            Pdu::decode(&bytes),
            Err(CodecError::FieldValidation {
                field: "short_message",
                ..
            })
        ));
    }
}
