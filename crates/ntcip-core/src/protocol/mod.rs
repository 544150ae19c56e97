//! Protocol module: frame types, checksum, binary codec, and stream framing.

pub mod assembler;
pub mod checksum;
pub mod codec;
pub mod frame;
pub mod sequence;
pub mod transport;

pub use assembler::FrameAssembler;
pub use codec::{
    decode_frame, encode_ack, encode_data, encode_frame, encode_nak, DecodeError, EncodeError,
};
pub use frame::*;
pub use sequence::SequenceCounter;
pub use transport::{write_frame, FrameReader, ReadOutcome, TransportError};
