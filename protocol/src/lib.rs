//! Wire protocol: message framing and encoding/decoding.

pub mod codec;
pub mod error;
pub mod frame;

pub use codec::{decode, decode_message, encode, encode_message, MAX_MESSAGE_SIZE};
pub use error::ProtocolError;
pub use frame::{read_frame, write_frame};
