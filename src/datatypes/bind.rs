use crate::codec::{
    CodecError, Decodable, Encodable, PduHeader, decode_cstring, decode_u8, encode_cstring,
    encode_u8,
};
use crate::datatypes::tlv::{Tlv, find_tlv, tags};
use crate::datatypes::{
    CommandId, CommandStatus, InterfaceVersion, NumericPlanIndicator, TypeOfNumber,
};
use bytes::{Buf, BytesMut};
use std::io::Cursor;

pub const MAX_SYSTEM_ID_LENGTH: usize = 16;
pub const MAX_PASSWORD_LENGTH: usize = 9;
pub const MAX_SYSTEM_TYPE_LENGTH: usize = 13;
pub const MAX_ADDRESS_RANGE_LENGTH: usize = 41;

/// Capability requested at bind time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BindType {
    /// Can send messages only
    Transmitter,
    /// Can receive messages only
    Receiver,
    /// Can both send and receive messages
    #[default]
    Transceiver,
}

impl BindType {
    pub fn command_id(&self) -> CommandId {
        match self {
            BindType::Transmitter => CommandId::BindTransmitter,
            BindType::Receiver => CommandId::BindReceiver,
            BindType::Transceiver => CommandId::BindTransceiver,
        }
    }

    pub fn response_id(&self) -> CommandId {
        self.command_id().response_id()
    }

    pub fn can_transmit(&self) -> bool {
        matches!(self, BindType::Transmitter | BindType::Transceiver)
    }

    fn from_command_id(command_id: CommandId) -> Option<Self> {
        match command_id {
            CommandId::BindTransmitter | CommandId::BindTransmitterResp => {
                Some(BindType::Transmitter)
            }
            CommandId::BindReceiver | CommandId::BindReceiverResp => Some(BindType::Receiver),
            CommandId::BindTransceiver | CommandId::BindTransceiverResp => {
                Some(BindType::Transceiver)
            }
            _ => None,
        }
    }
}

/// bind_transmitter / bind_receiver / bind_transceiver request.
///
/// The three bind operations share one body layout and differ only in
/// command_id, which is carried here as `bind_type`.
#[derive(Clone, Debug, PartialEq)]
pub struct Bind {
    pub sequence_number: u32,
    pub bind_type: BindType,

    /// Identification of the ESME requesting to bind (up to 15 characters)
    pub system_id: String,

    /// Password for authentication (up to 8 characters)
    pub password: String,

    /// Categorizes the type of ESME, e.g. "VMS" or "OTA"
    pub system_type: String,

    pub interface_version: InterfaceVersion,
    pub addr_ton: TypeOfNumber,
    pub addr_npi: NumericPlanIndicator,

    /// Range of SME addresses serviced by the ESME
    pub address_range: String,
}

impl Bind {
    pub fn new(
        sequence_number: u32,
        bind_type: BindType,
        system_id: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            sequence_number,
            bind_type,
            system_id: system_id.into(),
            password: password.into(),
            system_type: String::new(),
            interface_version: InterfaceVersion::SmppV34,
            addr_ton: TypeOfNumber::Unknown,
            addr_npi: NumericPlanIndicator::Unknown,
            address_range: String::new(),
        }
    }

    pub fn with_system_type(mut self, system_type: impl Into<String>) -> Self {
        self.system_type = system_type.into();
        self
    }

    pub fn with_interface_version(mut self, version: InterfaceVersion) -> Self {
        self.interface_version = version;
        self
    }
}

impl Encodable for Bind {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        PduHeader::new(self.bind_type.command_id(), CommandStatus::OK, self.sequence_number)
            .encode(buf)?;

        encode_cstring(buf, &self.system_id, MAX_SYSTEM_ID_LENGTH, "system_id")?;
        encode_cstring(buf, &self.password, MAX_PASSWORD_LENGTH, "password")?;
        encode_cstring(buf, &self.system_type, MAX_SYSTEM_TYPE_LENGTH, "system_type")?;
        encode_u8(buf, self.interface_version as u8);
        encode_u8(buf, self.addr_ton as u8);
        encode_u8(buf, self.addr_npi as u8);
        encode_cstring(buf, &self.address_range, MAX_ADDRESS_RANGE_LENGTH, "address_range")?;
        Ok(())
    }
}

impl Decodable for Bind {
    fn command_ids() -> &'static [CommandId] {
        &[
            CommandId::BindTransceiver,
            CommandId::BindTransmitter,
            CommandId::BindReceiver,
        ]
    }

    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;
        let bind_type = BindType::from_command_id(header.command_id).unwrap_or_default();

        let system_id = decode_cstring(buf, MAX_SYSTEM_ID_LENGTH, "system_id")?;
        let password = decode_cstring(buf, MAX_PASSWORD_LENGTH, "password")?;
        let system_type = decode_cstring(buf, MAX_SYSTEM_TYPE_LENGTH, "system_type")?;
        let version_raw = decode_u8(buf)?;
        let interface_version =
            InterfaceVersion::try_from(version_raw).map_err(|_| CodecError::FieldValidation {
                field: "interface_version",
                reason: format!("unsupported version {:#04x}", version_raw),
            })?;
        let addr_ton = TypeOfNumber::try_from(decode_u8(buf)?).unwrap_or_default();
        let addr_npi = NumericPlanIndicator::try_from(decode_u8(buf)?).unwrap_or_default();
        let address_range = decode_cstring(buf, MAX_ADDRESS_RANGE_LENGTH, "address_range")?;

        Ok(Self {
            sequence_number: header.sequence_number,
            bind_type,
            system_id,
            password,
            system_type,
            interface_version,
            addr_ton,
            addr_npi,
            address_range,
        })
    }
}

/// Response to any of the bind requests
#[derive(Clone, Debug, PartialEq)]
pub struct BindResponse {
    pub command_status: CommandStatus,
    pub sequence_number: u32,
    pub bind_type: BindType,

    /// SMSC identifier; may be absent when the bind failed
    pub system_id: String,

    /// Version advertised through the sc_interface_version TLV
    pub sc_interface_version: Option<u8>,
}

impl BindResponse {
    pub fn new(sequence_number: u32, bind_type: BindType, system_id: impl Into<String>) -> Self {
        Self {
            command_status: CommandStatus::OK,
            sequence_number,
            bind_type,
            system_id: system_id.into(),
            sc_interface_version: Some(InterfaceVersion::SmppV34 as u8),
        }
    }

    pub fn error(sequence_number: u32, bind_type: BindType, status: CommandStatus) -> Self {
        Self {
            command_status: status,
            sequence_number,
            bind_type,
            system_id: String::new(),
            sc_interface_version: None,
        }
    }
}

impl Encodable for BindResponse {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        PduHeader::new(
            self.bind_type.response_id(),
            self.command_status,
            self.sequence_number,
        )
        .encode(buf)?;

        encode_cstring(buf, &self.system_id, MAX_SYSTEM_ID_LENGTH, "system_id")?;
        if let Some(version) = self.sc_interface_version {
            Tlv::from_u8(tags::SC_INTERFACE_VERSION, version).encode(buf)?;
        }
        Ok(())
    }
}

impl Decodable for BindResponse {
    fn command_ids() -> &'static [CommandId] {
        &[
            CommandId::BindTransceiverResp,
            CommandId::BindTransmitterResp,
            CommandId::BindReceiverResp,
        ]
    }

    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;
        let bind_type = BindType::from_command_id(header.command_id).unwrap_or_default();

        // A failed bind usually carries no body at all
        let system_id = if buf.has_remaining() {
            decode_cstring(buf, MAX_SYSTEM_ID_LENGTH, "system_id")?
        } else {
            String::new()
        };
        let tlvs = Tlv::decode_all(buf)?;
        let sc_interface_version =
            find_tlv(&tlvs, tags::SC_INTERFACE_VERSION).and_then(Tlv::as_u8);

        Ok(Self {
            command_status: header.command_status,
            sequence_number: header.sequence_number,
            bind_type,
            system_id,
            sc_interface_version,
        })
    }
}
