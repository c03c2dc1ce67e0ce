//! ranctl-xran - xRAN southbound control protocol
//!
//! This crate implements the binary control protocol spoken between
//! the controller and its cells:
//!
//! - `tlv`: tag-length-value encoding primitives (context-specific
//!   tags, definite lengths, nested composites)
//! - `protocol`: the message-type table and typed message bodies
//! - `codec`: envelope encode/decode, including choice resolution by
//!   tag table and byte-exact re-encoding of unmodified PDUs
//!
//! Every message is an envelope `{ version, message-type, body }`
//! where the body is exactly one of the protocol's message kinds,
//! selected at decode time by matching the leading TLV tag.

pub mod codec;
pub mod protocol;
pub mod tlv;

pub use codec::{decode, encode, XranCodecError};
pub use protocol::{
    AdmissionStatus, Bearer, CellConfig, MessageType, RadioRepPerServCell, RrmConfig,
    RxSigReport, SchedMeasRepPerServCell, XranBody, XranPdu, PROTOCOL_VERSION,
};
pub use tlv::{Tag, TagClass, TlvError, TlvReader, TlvWriter};
