use std::fmt;

/// The command_status field of an SMPP response indicates the success or
/// failure of the request it answers. Requests always carry 0.
///
/// Carriers routinely return vendor-specific codes (0x0400-0x04FF), so the
/// status is a transparent wrapper over the wire value rather than a closed
/// enum. The well-known SMPP v3.4 codes are provided as constants.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct CommandStatus(pub u32);

impl CommandStatus {
    /// No Error
    pub const OK: CommandStatus = CommandStatus(0x0000_0000);
    /// Message Length is invalid
    pub const INVALID_MSG_LENGTH: CommandStatus = CommandStatus(0x0000_0001);
    /// Command Length is invalid
    pub const INVALID_COMMAND_LENGTH: CommandStatus = CommandStatus(0x0000_0002);
    /// Invalid Command ID
    pub const INVALID_COMMAND_ID: CommandStatus = CommandStatus(0x0000_0003);
    /// Incorrect BIND Status for given command
    pub const INCORRECT_BIND_STATUS: CommandStatus = CommandStatus(0x0000_0004);
    /// ESME Already in Bound State
    pub const ALREADY_BOUND: CommandStatus = CommandStatus(0x0000_0005);
    /// Invalid Registered Delivery Flag
    pub const INVALID_REGISTERED_DELIVERY: CommandStatus = CommandStatus(0x0000_0007);
    /// System Error
    pub const SYSTEM_ERROR: CommandStatus = CommandStatus(0x0000_0008);
    /// Invalid Source Address
    pub const INVALID_SOURCE_ADDRESS: CommandStatus = CommandStatus(0x0000_000A);
    /// Invalid Dest Addr
    pub const INVALID_DESTINATION_ADDRESS: CommandStatus = CommandStatus(0x0000_000B);
    /// Bind Failed
    pub const BIND_FAILED: CommandStatus = CommandStatus(0x0000_000D);
    /// Invalid Password
    pub const INVALID_PASSWORD: CommandStatus = CommandStatus(0x0000_000E);
    /// Invalid System ID
    pub const INVALID_SYSTEM_ID: CommandStatus = CommandStatus(0x0000_000F);
    /// Message Queue Full
    pub const MESSAGE_QUEUE_FULL: CommandStatus = CommandStatus(0x0000_0014);
    /// Invalid Service Type
    pub const INVALID_SERVICE_TYPE: CommandStatus = CommandStatus(0x0000_0015);
    /// Invalid esm_class field data
    pub const INVALID_ESM_CLASS: CommandStatus = CommandStatus(0x0000_0043);
    /// submit_sm or submit_multi failed
    pub const SUBMIT_FAILED: CommandStatus = CommandStatus(0x0000_0045);
    /// Invalid Source address TON
    pub const INVALID_SOURCE_TON: CommandStatus = CommandStatus(0x0000_0048);
    /// Invalid Source address NPI
    pub const INVALID_SOURCE_NPI: CommandStatus = CommandStatus(0x0000_0049);
    /// Invalid Destination address TON
    pub const INVALID_DESTINATION_TON: CommandStatus = CommandStatus(0x0000_0050);
    /// Invalid Destination address NPI
    pub const INVALID_DESTINATION_NPI: CommandStatus = CommandStatus(0x0000_0051);
    /// Throttling error (ESME has exceeded allowed message limits)
    pub const THROTTLED: CommandStatus = CommandStatus(0x0000_0058);
    /// Invalid Scheduled Delivery Time
    pub const INVALID_SCHEDULED_DELIVERY_TIME: CommandStatus = CommandStatus(0x0000_0061);
    /// Invalid message validity period
    pub const INVALID_EXPIRY_TIME: CommandStatus = CommandStatus(0x0000_0062);
    /// ESME Receiver Temporary App Error Code
    pub const RECEIVER_TEMPORARY_ERROR: CommandStatus = CommandStatus(0x0000_0064);
    /// ESME Receiver Permanent App Error Code
    pub const RECEIVER_PERMANENT_ERROR: CommandStatus = CommandStatus(0x0000_0065);
    /// ESME Receiver Reject Message Error Code
    pub const RECEIVER_REJECT: CommandStatus = CommandStatus(0x0000_0066);
    /// Error in the optional part of the PDU Body
    pub const INVALID_OPTIONAL_PART: CommandStatus = CommandStatus(0x0000_00C0);
    /// Invalid Parameter Length
    pub const INVALID_PARAMETER_LENGTH: CommandStatus = CommandStatus(0x0000_00C2);
    /// Delivery Failure
    pub const DELIVERY_FAILURE: CommandStatus = CommandStatus(0x0000_00FE);
    /// Unknown Error
    pub const UNKNOWN_ERROR: CommandStatus = CommandStatus(0x0000_00FF);

    pub fn is_ok(&self) -> bool {
        self.0 == 0
    }

    /// Vendor-specific range reserved for SMSC implementations
    pub fn is_vendor_specific(&self) -> bool {
        (0x0400..=0x04FF).contains(&self.0)
    }

    /// SMPP mnemonic for the status, if it is a well-known code
    pub fn name(&self) -> Option<&'static str> {
        let name = match *self {
            Self::OK => "ESME_ROK",
            Self::INVALID_MSG_LENGTH => "ESME_RINVMSGLEN",
            Self::INVALID_COMMAND_LENGTH => "ESME_RINVCMDLEN",
            Self::INVALID_COMMAND_ID => "ESME_RINVCMDID",
            Self::INCORRECT_BIND_STATUS => "ESME_RINVBNDSTS",
            Self::ALREADY_BOUND => "ESME_RALYBND",
            Self::INVALID_REGISTERED_DELIVERY => "ESME_RINVREGDLVFLG",
            Self::SYSTEM_ERROR => "ESME_RSYSERR",
            Self::INVALID_SOURCE_ADDRESS => "ESME_RINVSRCADR",
            Self::INVALID_DESTINATION_ADDRESS => "ESME_RINVDSTADR",
            Self::BIND_FAILED => "ESME_RBINDFAIL",
            Self::INVALID_PASSWORD => "ESME_RINVPASWD",
            Self::INVALID_SYSTEM_ID => "ESME_RINVSYSID",
            Self::MESSAGE_QUEUE_FULL => "ESME_RMSGQFUL",
            Self::INVALID_SERVICE_TYPE => "ESME_RINVSERTYP",
            Self::INVALID_ESM_CLASS => "ESME_RINVESMCLASS",
            Self::SUBMIT_FAILED => "ESME_RSUBMITFAIL",
            Self::INVALID_SOURCE_TON => "ESME_RINVSRCTON",
            Self::INVALID_SOURCE_NPI => "ESME_RINVSRCNPI",
            Self::INVALID_DESTINATION_TON => "ESME_RINVDSTTON",
            Self::INVALID_DESTINATION_NPI => "ESME_RINVDSTNPI",
            Self::THROTTLED => "ESME_RTHROTTLED",
            Self::INVALID_SCHEDULED_DELIVERY_TIME => "ESME_RINVSCHED",
            Self::INVALID_EXPIRY_TIME => "ESME_RINVEXPIRY",
            Self::RECEIVER_TEMPORARY_ERROR => "ESME_RX_T_APPN",
            Self::RECEIVER_PERMANENT_ERROR => "ESME_RX_P_APPN",
            Self::RECEIVER_REJECT => "ESME_RX_R_APPN",
            Self::INVALID_OPTIONAL_PART => "ESME_RINVOPTPARSTREAM",
            Self::INVALID_PARAMETER_LENGTH => "ESME_RINVPARLEN",
            Self::DELIVERY_FAILURE => "ESME_RDELIVERYFAILURE",
            Self::UNKNOWN_ERROR => "ESME_RUNKNOWNERR",
            _ => return None,
        };
        Some(name)
    }
}

impl From<u32> for CommandStatus {
    fn from(value: u32) -> Self {
        CommandStatus(value)
    }
}

impl From<CommandStatus> for u32 {
    fn from(status: CommandStatus) -> Self {
        status.0
    }
}

impl fmt::Debug for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}({:#010x})", name, self.0),
            None => write!(f, "CommandStatus({:#010x})", self.0),
        }
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({:#010x})", name, self.0),
            None if self.is_vendor_specific() => write!(f, "vendor error {:#010x}", self.0),
            None => write!(f, "{:#010x}", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_codes_survive() {
        let status = CommandStatus::from(0x0000_0401);
        assert!(!status.is_ok());
        assert!(status.is_vendor_specific());
        assert_eq!(status.name(), None);
        assert_eq!(u32::from(status), 0x0401);
        assert_eq!(status.to_string(), "vendor error 0x00000401");
    }

    #[test]
    fn well_known_codes_have_names() {
        assert!(CommandStatus::OK.is_ok());
        assert_eq!(CommandStatus::THROTTLED.name(), Some("ESME_RTHROTTLED"));
        assert_eq!(
            CommandStatus::INVALID_COMMAND_ID.to_string(),
            "ESME_RINVCMDID (0x00000003)"
        );
    }
}
