use crate::datatypes::{CommandId, CommandStatus};
use crate::macros::header_only_pdu;

/// Ends the bound session; the peer answers with unbind_resp and then the
/// transport is closed.
#[derive(Clone, Debug, PartialEq)]
pub struct Unbind {
    pub command_status: CommandStatus,
    pub sequence_number: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UnbindResponse {
    pub command_status: CommandStatus,
    pub sequence_number: u32,
}

header_only_pdu! {
    Unbind => CommandId::Unbind,
    UnbindResponse => CommandId::UnbindResp,
}
