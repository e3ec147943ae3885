use std::io;


/// Everything that can go wrong while decoding a record header or a handshake
/// signature off the wire.
///
/// This is the `FramingError` family from the design: a bad varint tag byte,
/// a handshake signature that doesn't match, or a short/garbled record.
//
#[ derive( thiserror::Error, Debug ) ]
//
pub enum FramingError
{
	#[ error( "unknown varint tag byte: {tag:#04x}" ) ]
	//
	UnknownVarintTag{ tag: u8 },

	#[ error( "handshake signature mismatch: expected {expected:02x?}, got {got:02x?}" ) ]
	//
	BadSignature{ expected: [u8; 3], got: [u8; 3] },

	#[ error( "buffer too short to decode: needed {needed} bytes, had {had}" ) ]
	//
	ShortBuffer{ needed: usize, had: usize },
}


/// Transport-level failure: anything the underlying byte stream reported to us.
//
#[ derive( thiserror::Error, Debug ) ]
//
pub enum TransportError
{
	#[ error( "io error: {0}" ) ]
	//
	Io( io::Error ),

	#[ error( "peer closed the connection" ) ]
	//
	Eof,
}


impl From<io::Error> for TransportError
{
	/// A clean close mid-read surfaces from `tokio`'s `AsyncReadExt` helpers
	/// as `ErrorKind::UnexpectedEof` - report that as [`TransportError::Eof`]
	/// rather than the less informative generic `Io` wrapper.
	//
	fn from( e: io::Error ) -> Self
	{
		match e.kind()
		{
			io::ErrorKind::UnexpectedEof => Self::Eof,
			_                            => Self::Io( e ),
		}
	}
}


/// Failure while pulling a typed value out of a decoded argument buffer -
/// tuple/field arity mismatch, a string that isn't valid UTF-8, or a buffer
/// that ran out before the value it describes did.
///
/// Treated as a handler exception: caught at the dispatch boundary and
/// swallowed, never torn down as a connection error.
//
#[ derive( thiserror::Error, Debug ) ]
//
pub enum DecodeError
{
	#[ error( "buffer too short: needed {needed} bytes, had {had}" ) ]
	//
	ShortBuffer{ needed: usize, had: usize },

	#[ error( "string is not valid utf-8: {0}" ) ]
	//
	InvalidUtf8( #[from] std::string::FromUtf8Error ),
}


/// The error sink receives one of these, exactly once, when a connection dies.
///
/// Transport failures and framing failures get the same treatment: report
/// once via the sink, connection goes dead.
//
#[ derive( thiserror::Error, Debug ) ]
//
pub enum ConnectionError
{
	#[ error( "transport failure" ) ]
	//
	Transport( #[from] TransportError ),

	#[ error( "framing failure" ) ]
	//
	Framing( #[from] FramingError ),
}
