// SMPP v3.4 Codec - Separates parsing/encoding logic from domain models
//
// Each PDU implements Encodable/Decodable; the `Pdu` enum and the registry
// tie them together so the connection only ever deals with whole frames.

use crate::datatypes::{
    Bind, BindResponse, CommandId, CommandStatus, DeliverSm, DeliverSmResponse, EnquireLink,
    EnquireLinkResponse, GenericNack, SubmitSm, SubmitSmResponse, Unbind, UnbindResponse,
};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::LazyLock;
use thiserror::Error;

/// Maximum allowed PDU size to prevent memory exhaustion attacks
pub const MAX_PDU_SIZE: u32 = 65536; // 64KB

/// SMPP v3.4 PDU Header (16 bytes, common to all PDUs)
#[derive(Debug, Clone, PartialEq)]
pub struct PduHeader {
    pub command_length: u32,
    pub command_id: CommandId,
    pub command_status: CommandStatus,
    pub sequence_number: u32,
}

impl PduHeader {
    pub const SIZE: usize = 16;

    /// Decode PDU header from buffer with validation
    pub fn decode(buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        if buf.remaining() < Self::SIZE {
            return Err(CodecError::Incomplete);
        }

        let command_length = buf.get_u32();
        let command_id_raw = buf.get_u32();
        let command_status = CommandStatus::from(buf.get_u32());
        let sequence_number = buf.get_u32();

        if !(Self::SIZE as u32..=MAX_PDU_SIZE).contains(&command_length) {
            return Err(CodecError::InvalidPduLength {
                length: command_length,
                min: Self::SIZE as u32,
                max: MAX_PDU_SIZE,
            });
        }

        let command_id =
            CommandId::try_from(command_id_raw).map_err(|_| CodecError::UnknownCommand {
                command_id: command_id_raw,
                sequence_number,
            })?;

        if !command_id.is_response() {
            // SMPP v3.4 rule: requests must have command_status = 0
            if !command_status.is_ok() {
                return Err(CodecError::InvalidRequestStatus {
                    command_id,
                    command_status,
                });
            }
            // generic_nack may legitimately echo 0, requests may not
            if sequence_number == 0 || sequence_number == 0xFFFF_FFFF {
                return Err(CodecError::ReservedSequenceNumber(sequence_number));
            }
        }

        Ok(PduHeader {
            command_length,
            command_id,
            command_status,
            sequence_number,
        })
    }

    /// Encode PDU header to buffer
    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        buf.put_u32(self.command_length);
        buf.put_u32(self.command_id as u32);
        buf.put_u32(self.command_status.into());
        buf.put_u32(self.sequence_number);
        Ok(())
    }

    /// Header for a PDU about to be encoded; the length is patched by `to_bytes`
    pub fn new(command_id: CommandId, command_status: CommandStatus, sequence_number: u32) -> Self {
        Self {
            command_length: 0,
            command_id,
            command_status,
            sequence_number,
        }
    }

    /// Best-effort sequence number of a raw frame, used to address generic_nack
    pub fn peek_sequence_number(frame: &[u8]) -> u32 {
        match frame.get(12..16) {
            Some(bytes) => u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            None => 0,
        }
    }
}

/// Trait for types that can be encoded to bytes
pub trait Encodable {
    /// Encode this PDU, header included, to the buffer
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError>;

    /// Calculate the encoded size without keeping the bytes
    fn encoded_size(&self) -> usize {
        let mut buf = BytesMut::new();
        self.encode(&mut buf).map(|_| buf.len()).unwrap_or(0)
    }

    /// Encode into a fresh buffer and fix the command_length field
    fn to_bytes(&self) -> Result<Bytes, CodecError> {
        let mut buf = BytesMut::with_capacity(64);
        self.encode(&mut buf)?;

        if buf.len() < PduHeader::SIZE || buf.len() > MAX_PDU_SIZE as usize {
            return Err(CodecError::InvalidPduLength {
                length: buf.len() as u32,
                min: PduHeader::SIZE as u32,
                max: MAX_PDU_SIZE,
            });
        }

        let length = buf.len() as u32;
        buf[0..4].copy_from_slice(&length.to_be_bytes());

        Ok(buf.freeze())
    }
}

/// Trait for types that can be decoded from bytes
pub trait Decodable: Sized {
    /// Decode this PDU from the buffer after header
    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError>;

    /// The command_ids this type decodes; bind PDUs share one layout across three ids
    fn command_ids() -> &'static [CommandId];

    /// Validate the header is appropriate for this PDU type
    fn validate_header(header: &PduHeader) -> Result<(), CodecError> {
        if !Self::command_ids().contains(&header.command_id) {
            return Err(CodecError::UnexpectedCommandId {
                expected: Self::command_ids()[0],
                actual: header.command_id,
            });
        }
        Ok(())
    }
}

/// Codec errors with detailed context for debugging
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Incomplete PDU: need more data")]
    Incomplete,

    #[error("Unknown command_id {command_id:#010x} (sequence {sequence_number})")]
    UnknownCommand {
        command_id: u32,
        sequence_number: u32,
    },

    #[error("Invalid PDU length: {length}, must be {min}-{max}")]
    InvalidPduLength { length: u32, min: u32, max: u32 },

    #[error("Declared PDU length {declared} does not match {actual} bytes available")]
    LengthMismatch { declared: u32, actual: usize },

    #[error("Request PDU {command_id:?} has non-zero status: {command_status:?}")]
    InvalidRequestStatus {
        command_id: CommandId,
        command_status: CommandStatus,
    },

    #[error("Reserved sequence number: {0} (0 and 0xFFFFFFFF are reserved)")]
    ReservedSequenceNumber(u32),

    #[error("Unexpected command_id: expected {expected:?}, got {actual:?}")]
    UnexpectedCommandId {
        expected: CommandId,
        actual: CommandId,
    },

    #[error("Field '{field}' validation failed: {reason}")]
    FieldValidation { field: &'static str, reason: String },

    #[error("TLV parsing error: {0}")]
    TlvError(String),

    #[error("UTF-8 decoding error in field '{field}': {source}")]
    Utf8Error {
        field: &'static str,
        #[source]
        source: std::string::FromUtf8Error,
    },
}

/// Convert codec errors to appropriate SMPP command_status codes
impl CodecError {
    pub fn to_command_status(&self) -> CommandStatus {
        match self {
            CodecError::InvalidPduLength { .. } | CodecError::LengthMismatch { .. } => {
                CommandStatus::INVALID_COMMAND_LENGTH
            }
            CodecError::UnknownCommand { .. } | CodecError::UnexpectedCommandId { .. } => {
                CommandStatus::INVALID_COMMAND_ID
            }
            CodecError::FieldValidation { field, .. } => match *field {
                "source_addr" => CommandStatus::INVALID_SOURCE_ADDRESS,
                "destination_addr" => CommandStatus::INVALID_DESTINATION_ADDRESS,
                "short_message" => CommandStatus::INVALID_MSG_LENGTH,
                _ => CommandStatus::SYSTEM_ERROR,
            },
            CodecError::TlvError(_) => CommandStatus::INVALID_OPTIONAL_PART,
            _ => CommandStatus::SYSTEM_ERROR,
        }
    }
}

/// Decode a NUL-terminated C-octet string of at most `max_len` bytes
/// (terminator included).
pub fn decode_cstring(
    buf: &mut Cursor<&[u8]>,
    max_len: usize,
    field_name: &'static str,
) -> Result<String, CodecError> {
    let chunk = buf.chunk();
    let terminator = match chunk.iter().take(max_len).position(|&b| b == 0) {
        Some(position) => position,
        None if chunk.len() < max_len => return Err(CodecError::Incomplete),
        None => {
            return Err(CodecError::FieldValidation {
                field: field_name,
                reason: format!("missing NUL terminator within {} bytes", max_len),
            });
        }
    };

    let value = chunk[..terminator].to_vec();
    buf.advance(terminator + 1);

    String::from_utf8(value).map_err(|e| CodecError::Utf8Error {
        field: field_name,
        source: e,
    })
}

/// Decode a single byte
pub fn decode_u8(buf: &mut Cursor<&[u8]>) -> Result<u8, CodecError> {
    if buf.remaining() < 1 {
        return Err(CodecError::Incomplete);
    }
    Ok(buf.get_u8())
}

/// Decode a 16-bit big-endian integer
pub fn decode_u16(buf: &mut Cursor<&[u8]>) -> Result<u16, CodecError> {
    if buf.remaining() < 2 {
        return Err(CodecError::Incomplete);
    }
    Ok(buf.get_u16())
}

/// Decode a 32-bit big-endian integer
pub fn decode_u32(buf: &mut Cursor<&[u8]>) -> Result<u32, CodecError> {
    if buf.remaining() < 4 {
        return Err(CodecError::Incomplete);
    }
    Ok(buf.get_u32())
}

/// Encode a C-octet string; `max_len` includes the terminator.
pub fn encode_cstring(
    buf: &mut BytesMut,
    value: &str,
    max_len: usize,
    field_name: &'static str,
) -> Result<(), CodecError> {
    let bytes = value.as_bytes();
    if bytes.len() >= max_len {
        return Err(CodecError::FieldValidation {
            field: field_name,
            reason: format!("{} bytes exceeds maximum of {}", bytes.len(), max_len - 1),
        });
    }
    if bytes.contains(&0) {
        return Err(CodecError::FieldValidation {
            field: field_name,
            reason: "embedded NUL".to_string(),
        });
    }

    buf.put_slice(bytes);
    buf.put_u8(0);
    Ok(())
}

/// Encode a single byte
pub fn encode_u8(buf: &mut BytesMut, value: u8) {
    buf.put_u8(value);
}

/// Encode a 16-bit big-endian integer
pub fn encode_u16(buf: &mut BytesMut, value: u16) {
    buf.put_u16(value);
}

/// Encode a 32-bit big-endian integer
pub fn encode_u32(buf: &mut BytesMut, value: u32) {
    buf.put_u32(value);
}

/// Every PDU the gateway sends or understands
#[derive(Debug, Clone, PartialEq)]
pub enum Pdu {
    Bind(Bind),
    BindResp(BindResponse),
    SubmitSm(Box<SubmitSm>),
    SubmitSmResp(SubmitSmResponse),
    DeliverSm(Box<DeliverSm>),
    DeliverSmResp(DeliverSmResponse),
    EnquireLink(EnquireLink),
    EnquireLinkResp(EnquireLinkResponse),
    Unbind(Unbind),
    UnbindResp(UnbindResponse),
    GenericNack(GenericNack),
}

/// Registry of PDU decoders for extensible parsing
type DecoderFn =
    Box<dyn Fn(PduHeader, &mut Cursor<&[u8]>) -> Result<Pdu, CodecError> + Send + Sync>;

pub struct PduRegistry {
    decoders: HashMap<CommandId, DecoderFn>,
}

static REGISTRY: LazyLock<PduRegistry> = LazyLock::new(PduRegistry::new);

impl PduRegistry {
    /// Create a new registry with the supported SMPP v3.4 PDUs registered
    pub fn new() -> Self {
        let mut registry = Self {
            decoders: HashMap::new(),
        };

        registry.register_pdu::<Bind, _>(Pdu::Bind);
        registry.register_pdu::<BindResponse, _>(Pdu::BindResp);
        registry.register_pdu::<SubmitSm, _>(|pdu| Pdu::SubmitSm(Box::new(pdu)));
        registry.register_pdu::<SubmitSmResponse, _>(Pdu::SubmitSmResp);
        registry.register_pdu::<DeliverSm, _>(|pdu| Pdu::DeliverSm(Box::new(pdu)));
        registry.register_pdu::<DeliverSmResponse, _>(Pdu::DeliverSmResp);
        registry.register_pdu::<EnquireLink, _>(Pdu::EnquireLink);
        registry.register_pdu::<EnquireLinkResponse, _>(Pdu::EnquireLinkResp);
        registry.register_pdu::<Unbind, _>(Pdu::Unbind);
        registry.register_pdu::<UnbindResponse, _>(Pdu::UnbindResp);
        registry.register_pdu::<GenericNack, _>(Pdu::GenericNack);

        registry
    }

    fn register_pdu<T, F>(&mut self, constructor: F)
    where
        T: Decodable + 'static,
        F: Fn(T) -> Pdu + Send + Sync + Clone + 'static,
    {
        for &command_id in T::command_ids() {
            let constructor = constructor.clone();
            let decoder = Box::new(move |header: PduHeader, buf: &mut Cursor<&[u8]>| {
                let pdu = T::decode(header, buf)?;
                Ok(constructor(pdu))
            });
            self.decoders.insert(command_id, decoder);
        }
    }

    /// Decode a PDU given its header and body
    pub fn decode_pdu(
        &self,
        header: PduHeader,
        buf: &mut Cursor<&[u8]>,
    ) -> Result<Pdu, CodecError> {
        match self.decoders.get(&header.command_id) {
            Some(decoder) => decoder(header, buf),
            None => Err(CodecError::UnknownCommand {
                command_id: header.command_id as u32,
                sequence_number: header.sequence_number,
            }),
        }
    }
}

impl Default for PduRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Pdu {
    /// Decode exactly one PDU occupying the whole of `frame`.
    pub fn decode(frame: &[u8]) -> Result<Pdu, CodecError> {
        if frame.len() < PduHeader::SIZE {
            return Err(CodecError::InvalidPduLength {
                length: frame.len() as u32,
                min: PduHeader::SIZE as u32,
                max: MAX_PDU_SIZE,
            });
        }

        let mut cursor = Cursor::new(frame);
        let header = PduHeader::decode(&mut cursor)?;
        if header.command_length as usize != frame.len() {
            return Err(CodecError::LengthMismatch {
                declared: header.command_length,
                actual: frame.len(),
            });
        }

        let command_id = header.command_id;
        let pdu = REGISTRY.decode_pdu(header, &mut cursor).map_err(|e| match e {
            // a field running past the frame end means the declared length lied
            CodecError::Incomplete => CodecError::FieldValidation {
                field: "body",
                reason: format!("{:?} body truncated", command_id),
            },
            other => other,
        })?;

        if cursor.has_remaining() {
            return Err(CodecError::FieldValidation {
                field: "body",
                reason: format!("{} trailing bytes", cursor.remaining()),
            });
        }

        Ok(pdu)
    }

    /// Encode to a complete frame
    pub fn to_bytes(&self) -> Result<Bytes, CodecError> {
        match self {
            Pdu::Bind(pdu) => pdu.to_bytes(),
            Pdu::BindResp(pdu) => pdu.to_bytes(),
            Pdu::SubmitSm(pdu) => pdu.to_bytes(),
            Pdu::SubmitSmResp(pdu) => pdu.to_bytes(),
            Pdu::DeliverSm(pdu) => pdu.to_bytes(),
            Pdu::DeliverSmResp(pdu) => pdu.to_bytes(),
            Pdu::EnquireLink(pdu) => pdu.to_bytes(),
            Pdu::EnquireLinkResp(pdu) => pdu.to_bytes(),
            Pdu::Unbind(pdu) => pdu.to_bytes(),
            Pdu::UnbindResp(pdu) => pdu.to_bytes(),
            Pdu::GenericNack(pdu) => pdu.to_bytes(),
        }
    }

    /// Get the command_id for this PDU
    pub fn command_id(&self) -> CommandId {
        match self {
            Pdu::Bind(pdu) => pdu.bind_type.command_id(),
            Pdu::BindResp(pdu) => pdu.bind_type.response_id(),
            Pdu::SubmitSm(_) => CommandId::SubmitSm,
            Pdu::SubmitSmResp(_) => CommandId::SubmitSmResp,
            Pdu::DeliverSm(_) => CommandId::DeliverSm,
            Pdu::DeliverSmResp(_) => CommandId::DeliverSmResp,
            Pdu::EnquireLink(_) => CommandId::EnquireLink,
            Pdu::EnquireLinkResp(_) => CommandId::EnquireLinkResp,
            Pdu::Unbind(_) => CommandId::Unbind,
            Pdu::UnbindResp(_) => CommandId::UnbindResp,
            Pdu::GenericNack(_) => CommandId::GenericNack,
        }
    }

    /// Get the sequence number for this PDU
    pub fn sequence_number(&self) -> u32 {
        match self {
            Pdu::Bind(pdu) => pdu.sequence_number,
            Pdu::BindResp(pdu) => pdu.sequence_number,
            Pdu::SubmitSm(pdu) => pdu.sequence_number,
            Pdu::SubmitSmResp(pdu) => pdu.sequence_number,
            Pdu::DeliverSm(pdu) => pdu.sequence_number,
            Pdu::DeliverSmResp(pdu) => pdu.sequence_number,
            Pdu::EnquireLink(pdu) => pdu.sequence_number,
            Pdu::EnquireLinkResp(pdu) => pdu.sequence_number,
            Pdu::Unbind(pdu) => pdu.sequence_number,
            Pdu::UnbindResp(pdu) => pdu.sequence_number,
            Pdu::GenericNack(pdu) => pdu.sequence_number,
        }
    }

    /// Command status from the header; always OK for requests
    pub fn command_status(&self) -> CommandStatus {
        match self {
            Pdu::BindResp(pdu) => pdu.command_status,
            Pdu::SubmitSmResp(pdu) => pdu.command_status,
            Pdu::DeliverSmResp(pdu) => pdu.command_status,
            Pdu::EnquireLinkResp(pdu) => pdu.command_status,
            Pdu::UnbindResp(pdu) => pdu.command_status,
            Pdu::GenericNack(pdu) => pdu.command_status,
            _ => CommandStatus::OK,
        }
    }

    /// Check if this PDU is a response
    pub fn is_response(&self) -> bool {
        self.command_id().is_response()
    }
}
