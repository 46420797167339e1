pub mod codec;
pub mod framed;
pub mod memory;
pub mod transport;

pub use codec::{CodecError, NewlineDelimitedCodec};
pub use framed::FramedTransport;
pub use memory::MemoryTransport;
pub use transport::{Transport, TransportError};
