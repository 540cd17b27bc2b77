/// The esm_class field of submit_sm/deliver_sm: messaging mode, message type
/// and GSM network features packed into one octet.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct EsmClass(pub u8);

impl EsmClass {
    /// UDH Indicator: short_message starts with a user data header
    pub const UDHI: u8 = 0x40;
    /// Message type bits (2-5)
    const MESSAGE_TYPE_MASK: u8 = 0x3C;
    /// Message type: SMSC delivery receipt
    const DELIVERY_RECEIPT: u8 = 0x04;
    /// Message type: intermediate delivery notification
    const INTERMEDIATE_NOTIFICATION: u8 = 0x20;

    pub fn with_udhi(self) -> Self {
        EsmClass(self.0 | Self::UDHI)
    }

    pub fn has_udhi(&self) -> bool {
        self.0 & Self::UDHI != 0
    }

    /// True for SMSC delivery receipts and intermediate notifications
    pub fn is_delivery_receipt(&self) -> bool {
        matches!(
            self.0 & Self::MESSAGE_TYPE_MASK,
            Self::DELIVERY_RECEIPT | Self::INTERMEDIATE_NOTIFICATION
        )
    }
}

impl From<u8> for EsmClass {
    fn from(value: u8) -> Self {
        EsmClass(value)
    }
}
