//! Wire primitives shared by the Brine Wire compiler and runtime.
//!
//! Everything here works on caller-owned memory through absolute offsets:
//! [`ByteBuffer`] reads, [`ByteBufferMut`] writes, and both refuse to step
//! past their limit. Multi-byte integers honour a [`ByteOrder`], varints use
//! zigzag rotation followed by LEB128, and strings/octets carry a length
//! prefix whose all-ones value marks an absent value.
//!
//! ```
//! use brine_wire_schema::*;
//!
//! let mut bytes = [0u8; 8];
//! let mut out = ByteBufferMut::new(&mut bytes);
//! let limit = out.write_int(0, 16, ByteOrder::Network, 513).unwrap();
//! let limit = out.write_string(limit, 8, ByteOrder::Native, Some("hi")).unwrap();
//! assert_eq!(limit, 5);
//!
//! let bb = ByteBuffer::with_limit(&bytes, limit);
//! assert_eq!(bb.read_int(0, 16, ByteOrder::Network), Ok(513));
//! assert_eq!(bb.read_string(2, 8, ByteOrder::Native), Ok((Some("hi"), 5)));
//! ```

pub mod bb;
pub mod error;
pub mod order;

pub use bb::*;
pub use error::WireError;
pub use order::ByteOrder;
