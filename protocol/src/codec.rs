//! Message codec: bincode bodies, bounded in size.

use drawtree_messages::WireMessage;

use crate::ProtocolError;

/// Maximum message body size in bytes.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024; // 16 MiB

/// Serialize a message body. The length prefix is added by
/// [`write_frame`](crate::write_frame).
pub fn encode(message: &impl serde::Serialize) -> Result<Vec<u8>, ProtocolError> {
    let bytes = bincode::serialize(message).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    if bytes.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: bytes.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(bytes)
}

/// Decode a message body.
pub fn decode<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T, ProtocolError> {
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: data.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    bincode::deserialize(data).map_err(|e| ProtocolError::Malformed(e.to_string()))
}

pub fn encode_message(message: &WireMessage) -> Result<Vec<u8>, ProtocolError> {
    encode(message)
}

pub fn decode_message(data: &[u8]) -> Result<WireMessage, ProtocolError> {
    decode(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keepalive_roundtrip() {
        let bytes = encode_message(&WireMessage::Keepalive).unwrap();
        assert_eq!(decode_message(&bytes).unwrap(), WireMessage::Keepalive);
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            decode_message(&[0xFF, 0xFF, 0xFF, 0xFF, 0x01]),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(decode_message(&[]), Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn oversized_body_rejected() {
        let data = vec![0u8; MAX_MESSAGE_SIZE + 1];
        assert!(matches!(
            decode_message(&data),
            Err(ProtocolError::MessageTooLarge { .. })
        ));
    }
}
