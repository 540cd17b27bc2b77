use crate::datatypes::{CommandId, CommandStatus};
use crate::macros::header_only_pdu;

/// Link-level keep-alive request; either side may send it at any time.
#[derive(Clone, Debug, PartialEq)]
pub struct EnquireLink {
    // Requests always carry ESME_ROK
    pub command_status: CommandStatus,
    pub sequence_number: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EnquireLinkResponse {
    pub command_status: CommandStatus,
    pub sequence_number: u32,
}

header_only_pdu! {
    EnquireLink => CommandId::EnquireLink,
    EnquireLinkResponse => CommandId::EnquireLinkResp,
}
