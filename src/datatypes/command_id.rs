use num_enum::TryFromPrimitive;

/// Command identifiers for the PDUs this gateway speaks.
///
/// Anything outside this table (query_sm, replace_sm, submit_multi, ...) is
/// rejected by the codec as an unknown command and answered with generic_nack.
#[derive(TryFromPrimitive)]
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CommandId {
    GenericNack = 0x8000_0000,
    BindReceiver = 0x0000_0001,
    BindReceiverResp = 0x8000_0001,
    BindTransmitter = 0x0000_0002,
    BindTransmitterResp = 0x8000_0002,
    SubmitSm = 0x0000_0004,
    SubmitSmResp = 0x8000_0004,
    DeliverSm = 0x0000_0005,
    DeliverSmResp = 0x8000_0005,
    Unbind = 0x0000_0006,
    UnbindResp = 0x8000_0006,
    BindTransceiver = 0x0000_0009,
    BindTransceiverResp = 0x8000_0009,
    EnquireLink = 0x0000_0015,
    EnquireLinkResp = 0x8000_0015,
}

impl CommandId {
    /// Check if this command_id represents a response PDU
    pub fn is_response(&self) -> bool {
        (*self as u32) & 0x8000_0000 != 0
    }

    /// The response id paired with this request id (identity for responses)
    pub fn response_id(&self) -> CommandId {
        match self {
            CommandId::BindReceiver => CommandId::BindReceiverResp,
            CommandId::BindTransmitter => CommandId::BindTransmitterResp,
            CommandId::BindTransceiver => CommandId::BindTransceiverResp,
            CommandId::SubmitSm => CommandId::SubmitSmResp,
            CommandId::DeliverSm => CommandId::DeliverSmResp,
            CommandId::Unbind => CommandId::UnbindResp,
            CommandId::EnquireLink => CommandId::EnquireLinkResp,
            response => *response,
        }
    }
}
