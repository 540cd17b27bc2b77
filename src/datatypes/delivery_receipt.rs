// ABOUTME: Delivery receipt extraction from deliver_sm PDUs
// ABOUTME: Reads the receipted_message_id/message_state TLVs and falls back to the receipt text

use crate::datatypes::tlv::{Tlv, tags};
use crate::datatypes::DeliverSm;
use std::fmt;

/// Final (or intermediate) state of a submitted message
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MessageState {
    Enroute,
    Delivered,
    Expired,
    Deleted,
    Undeliverable,
    Accepted,
    Unknown,
    Rejected,
}

impl MessageState {
    /// From the message_state TLV value
    pub fn from_tlv_value(value: u8) -> Option<Self> {
        match value {
            1 => Some(MessageState::Enroute),
            2 => Some(MessageState::Delivered),
            3 => Some(MessageState::Expired),
            4 => Some(MessageState::Deleted),
            5 => Some(MessageState::Undeliverable),
            6 => Some(MessageState::Accepted),
            7 => Some(MessageState::Unknown),
            8 => Some(MessageState::Rejected),
            _ => None,
        }
    }

    pub fn tlv_value(&self) -> u8 {
        match self {
            MessageState::Enroute => 1,
            MessageState::Delivered => 2,
            MessageState::Expired => 3,
            MessageState::Deleted => 4,
            MessageState::Undeliverable => 5,
            MessageState::Accepted => 6,
            MessageState::Unknown => 7,
            MessageState::Rejected => 8,
        }
    }

    /// From the `stat:` field of the receipt text
    pub fn from_stat(stat: &str) -> Option<Self> {
        match stat.to_ascii_uppercase().as_str() {
            "ENROUTE" => Some(MessageState::Enroute),
            "DELIVRD" => Some(MessageState::Delivered),
            "EXPIRED" => Some(MessageState::Expired),
            "DELETED" => Some(MessageState::Deleted),
            "UNDELIV" => Some(MessageState::Undeliverable),
            "ACCEPTD" => Some(MessageState::Accepted),
            "UNKNOWN" => Some(MessageState::Unknown),
            "REJECTD" => Some(MessageState::Rejected),
            _ => None,
        }
    }

    pub fn stat(&self) -> &'static str {
        match self {
            MessageState::Enroute => "ENROUTE",
            MessageState::Delivered => "DELIVRD",
            MessageState::Expired => "EXPIRED",
            MessageState::Deleted => "DELETED",
            MessageState::Undeliverable => "UNDELIV",
            MessageState::Accepted => "ACCEPTD",
            MessageState::Unknown => "UNKNOWN",
            MessageState::Rejected => "REJECTD",
        }
    }

    /// Whether no further receipts are expected for the message
    pub fn is_final(&self) -> bool {
        !matches!(self, MessageState::Enroute | MessageState::Accepted)
    }
}

impl fmt::Display for MessageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stat())
    }
}

/// What the gateway needs to know from a delivery receipt
#[derive(Clone, Debug, PartialEq)]
pub struct DeliveryReceipt {
    /// SMSC message id of the receipted submit
    pub message_id: Option<String>,
    pub state: Option<MessageState>,
    pub error_code: Option<String>,
    /// Handset the original message was addressed to
    pub recipient: String,
}

impl DeliveryReceipt {
    /// None when the deliver_sm is a mobile originated message rather than a receipt.
    pub fn from_deliver_sm(deliver: &DeliverSm) -> Option<Self> {
        let text = String::from_utf8_lossy(&deliver.short_message);
        let looks_like_receipt = receipt_field(&text, "id:").is_some()
            && receipt_field(&text, "stat:").is_some();
        if !deliver.esm_class.is_delivery_receipt() && !looks_like_receipt {
            return None;
        }

        let message_id = deliver
            .tlv(tags::RECEIPTED_MESSAGE_ID)
            .and_then(Tlv::as_cstring)
            .or_else(|| receipt_field(&text, "id:").map(str::to_string));
        let state = deliver
            .tlv(tags::MESSAGE_STATE)
            .and_then(Tlv::as_u8)
            .and_then(MessageState::from_tlv_value)
            .or_else(|| receipt_field(&text, "stat:").and_then(MessageState::from_stat));
        let error_code = receipt_field(&text, "err:").map(str::to_string);

        Some(Self {
            message_id,
            state,
            error_code,
            recipient: deliver.source.addr.clone(),
        })
    }

    /// Receipts without a readable state are taken as delivered
    pub fn is_delivered(&self) -> bool {
        matches!(self.state, None | Some(MessageState::Delivered))
    }

    /// A final state other than delivered
    pub fn is_failed(&self) -> bool {
        matches!(self.state, Some(state) if state.is_final() && state != MessageState::Delivered)
    }

    /// Standard receipt text, as sent by an SMSC
    pub fn format_text(message_id: &str, state: MessageState, error_code: &str) -> String {
        format!(
            "id:{} sub:001 dlvrd:{} submit date:2401010000 done date:2401010000 \
             stat:{} err:{} text:",
            message_id,
            if state == MessageState::Delivered { "001" } else { "000" },
            state.stat(),
            error_code
        )
    }
}

fn receipt_field<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    text.split_whitespace().find_map(|token| {
        let (name, value) = token.split_at_checked(key.len())?;
        name.eq_ignore_ascii_case(key).then_some(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::{Address, EsmClass, MessageBody};
    use bytes::Bytes;

    fn deliver(esm_class: u8, text: &str, tlvs: Vec<Tlv>) -> DeliverSm {
        DeliverSm::new(
            1,
            MessageBody {
                source: Address::international("06304988888"),
                destination: Address::international("ACME"),
                esm_class: EsmClass(esm_class),
                short_message: Bytes::from(text.to_string()),
                tlvs,
                ..Default::default()
            },
        )
    }

    #[test]
    fn parses_receipt_text() {
        let text = DeliveryReceipt::format_text("0a1b2c", MessageState::Delivered, "000");
        let receipt = DeliveryReceipt::from_deliver_sm(&deliver(0x04, &text, vec![])).unwrap();

        assert_eq!(receipt.message_id.as_deref(), Some("0a1b2c"));
        assert_eq!(receipt.state, Some(MessageState::Delivered));
        assert_eq!(receipt.error_code.as_deref(), Some("000"));
        assert_eq!(receipt.recipient, "06304988888");
        assert!(receipt.is_delivered());
        assert!(!receipt.is_failed());
    }

    #[test]
    fn tlvs_take_precedence_over_text() {
        let receipt = DeliveryReceipt::from_deliver_sm(&deliver(
            0x04,
            "id:text-id stat:DELIVRD",
            vec![
                Tlv::from_cstring(tags::RECEIPTED_MESSAGE_ID, "tlv-id"),
                Tlv::from_u8(tags::MESSAGE_STATE, 5),
            ],
        ))
        .unwrap();

        assert_eq!(receipt.message_id.as_deref(), Some("tlv-id"));
        assert_eq!(receipt.state, Some(MessageState::Undeliverable));
        assert!(receipt.is_failed());
    }

    #[test]
    fn mobile_originated_message_is_not_a_receipt() {
        assert!(DeliveryReceipt::from_deliver_sm(&deliver(0x00, "hi there", vec![])).is_none());
    }

    #[test]
    fn receipt_text_without_esm_flag_is_accepted() {
        let receipt =
            DeliveryReceipt::from_deliver_sm(&deliver(0x00, "id:77 stat:EXPIRED err:001", vec![]))
                .unwrap();
        assert_eq!(receipt.state, Some(MessageState::Expired));
        assert!(receipt.is_failed());
    }

    #[test]
    fn intermediate_states_are_not_final() {
        assert!(!MessageState::Enroute.is_final());
        assert!(!MessageState::Accepted.is_final());
        assert!(MessageState::Rejected.is_final());
        assert_eq!(MessageState::from_stat("delivrd"), Some(MessageState::Delivered));
    }
}
