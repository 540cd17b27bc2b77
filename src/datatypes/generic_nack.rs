use crate::datatypes::{CommandId, CommandStatus};
use crate::macros::header_only_codec;

/// GenericNack is used to acknowledge the receipt of a PDU when the receiving
/// entity cannot process it, for example an unknown command_id or a body that
/// does not parse.
///
/// The generic_nack PDU has no body. Its sequence_number echoes the offending
/// PDU, or 0 when that could not be read.
#[derive(Clone, Debug, PartialEq)]
pub struct GenericNack {
    /// The reason for the generic_nack
    pub command_status: CommandStatus,
    pub sequence_number: u32,
}

impl GenericNack {
    pub fn new(command_status: CommandStatus, sequence_number: u32) -> Self {
        Self {
            command_status,
            sequence_number,
        }
    }

    /// Creates a GenericNack for an invalid command ID error
    pub fn invalid_command_id(sequence_number: u32) -> Self {
        Self::new(CommandStatus::INVALID_COMMAND_ID, sequence_number)
    }

    /// Creates a GenericNack for an invalid command length error
    pub fn invalid_command_length(sequence_number: u32) -> Self {
        Self::new(CommandStatus::INVALID_COMMAND_LENGTH, sequence_number)
    }

    /// Creates a GenericNack for a system error
    pub fn system_error(sequence_number: u32) -> Self {
        Self::new(CommandStatus::SYSTEM_ERROR, sequence_number)
    }
}

header_only_codec!(GenericNack => CommandId::GenericNack);
