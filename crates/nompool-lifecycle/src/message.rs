//! Inbound message envelope.

use nompool_types::{Address, Coins, Timestamp};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::wire::{Operation, WireError};

/// One message delivered to the pool.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Source account.
    #[serde_as(as = "serde_with::hex::Hex")]
    pub sender: Address,
    /// Attached value in nano-units.
    #[serde(default)]
    pub value: Coins,
    /// Message timestamp; all time-gated checks use it.
    pub now: Timestamp,
    /// Raw body as described in [`crate::wire`].
    #[serde_as(as = "serde_with::hex::Hex")]
    pub body: Vec<u8>,
}

impl InboundMessage {
    /// Build a message from a typed operation.
    pub fn new(sender: Address, value: Coins, now: Timestamp, operation: &Operation) -> Self {
        Self {
            sender,
            value,
            now,
            body: operation.encode(),
        }
    }

    /// Decode the body.
    pub fn operation(&self) -> Result<Operation, WireError> {
        Operation::decode(&self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shape() {
        let msg = InboundMessage::new([1; 32], 5, 100, &Operation::Deposit);
        let json = serde_json::to_value(&msg).expect("serialize");
        assert_eq!(json["body"], "00000064");
        assert_eq!(json["sender"], hex::encode([1u8; 32]));

        let back: InboundMessage = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back.operation(), Ok(Operation::Deposit));
    }

    #[test]
    fn test_value_defaults_to_zero() {
        let line = format!(
            r#"{{"sender":"{}","now":7,"body":"00000077"}}"#,
            hex::encode([2u8; 32])
        );
        let msg: InboundMessage = serde_json::from_str(&line).expect("parse");
        assert_eq!(msg.value, 0);
        assert_eq!(msg.operation(), Ok(Operation::Withdraw));
    }
}
