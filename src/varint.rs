//! The variable-length unsigned integer codec used to frame every record on
//! the wire (record `id` and `size`). This is the *only* place varints are
//! used - strings and scalars inside a serialized argument tuple use a
//! separate fixed-width little-endian encoding, see [`crate::codec`].
//
use
{
	crate::error::{ ConnectionError, FramingError, TransportError } ,
	tokio::io::{ AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt } ,
};


const TAG_U8 : u8 = 0xCC;
const TAG_U16: u8 = 0xCD;
const TAG_U32: u8 = 0xCE;
const TAG_U64: u8 = 0xCF;

/// Sentinel record size meaning "this record carries no payload, it's a
/// release notification for `id`".
//
pub const RELEASE_SENTINEL: u64 = u64::MAX;


/// Append the varint encoding of `value` to `out`. Always produces the
/// minimal form - the smallest tag that fits the value.
//
pub fn encode( value: u64, out: &mut Vec<u8> )
{
	match value
	{
		0x00..=0x7F =>
		{
			out.push( value as u8 );
		}

		0x80..=0xFF =>
		{
			out.push( TAG_U8 );
			out.push( value as u8 );
		}

		0x100..=0xFFFF =>
		{
			out.push( TAG_U16 );
			out.extend_from_slice( &(value as u16).to_be_bytes() );
		}

		0x1_0000..=0xFFFF_FFFF =>
		{
			out.push( TAG_U32 );
			out.extend_from_slice( &(value as u32).to_be_bytes() );
		}

		_ =>
		{
			out.push( TAG_U64 );
			out.extend_from_slice( &value.to_be_bytes() );
		}
	}
}


/// Read one varint off an async byte stream. Accepts non-minimal encodings -
/// the tag alone decides how many following bytes to read; the value they
/// encode is not checked against the tag's "natural" range.
//
pub async fn read<R>( stream: &mut R ) -> Result<u64, ConnectionError>

	where R: AsyncRead + Unpin,

{
	let tag = stream.read_u8().await.map_err( TransportError::from )?;

	if tag < 0x80
	{
		return Ok( tag as u64 );
	}

	let value = match tag
	{
		TAG_U8 =>
		{
			stream.read_u8().await.map_err( TransportError::from )? as u64
		}

		TAG_U16 =>
		{
			let mut buf = [0u8; 2];
			stream.read_exact( &mut buf ).await.map_err( TransportError::from )?;
			u16::from_be_bytes( buf ) as u64
		}

		TAG_U32 =>
		{
			let mut buf = [0u8; 4];
			stream.read_exact( &mut buf ).await.map_err( TransportError::from )?;
			u32::from_be_bytes( buf ) as u64
		}

		TAG_U64 =>
		{
			let mut buf = [0u8; 8];
			stream.read_exact( &mut buf ).await.map_err( TransportError::from )?;
			u64::from_be_bytes( buf )
		}

		other => return Err( FramingError::UnknownVarintTag{ tag: other }.into() ),
	};

	Ok( value )
}


/// Write one varint to an async byte sink. Does not flush - callers batch
/// several writes (id, size, payload) before flushing once.
//
pub async fn write<W>( stream: &mut W, value: u64 ) -> Result<(), TransportError>

	where W: AsyncWrite + Unpin,

{
	let mut buf = Vec::with_capacity( 9 );
	encode( value, &mut buf );

	stream.write_all( &buf ).await?;

	Ok(())
}


#[ cfg( test ) ]
//
mod tests
{
	use super::*;
	use pretty_assertions::assert_eq;

	fn roundtrip_value() -> Vec<u64>
	{
		vec!
		[
			0, 1, 0x7F, 0x80, 0xFF, 0x100, 0xFFFF, 0x10000,
			0xFFFFFFFF, 0x1_0000_0000, u64::MAX - 1, u64::MAX,
		]
	}

	#[ tokio::test ]
	//
	async fn varint_roundtrip()
	{
		for v in roundtrip_value()
		{
			let mut buf = Vec::new();
			encode( v, &mut buf );

			let mut cursor = std::io::Cursor::new( buf );
			let decoded = read( &mut cursor ).await.expect( "decode varint" );

			assert_eq!( decoded, v );
		}
	}

	#[ tokio::test ]
	//
	async fn minimal_encoding()
	{
		let mut buf = Vec::new();
		encode( 5, &mut buf );

		assert_eq!( buf, vec![5] );

		buf.clear();
		encode( 0x80, &mut buf );

		assert_eq!( buf, vec![TAG_U8, 0x80] );
	}

	#[ tokio::test ]
	//
	async fn accepts_non_minimal_encoding()
	{
		// 5 encoded the long way, as 0xCC 0x05 - a legal, if non-minimal, input.
		//
		let buf = vec![ TAG_U8, 0x05 ];
		let mut cursor = std::io::Cursor::new( buf );

		let decoded = read( &mut cursor ).await.expect( "decode non-minimal varint" );

		assert_eq!( decoded, 5 );
	}

	#[ tokio::test ]
	//
	async fn unknown_tag_is_a_framing_error()
	{
		let buf = vec![ 0x81 ];
		let mut cursor = std::io::Cursor::new( buf );

		let err = read( &mut cursor ).await.unwrap_err();

		assert_matches::assert_matches!( err, ConnectionError::Framing( FramingError::UnknownVarintTag{ tag: 0x81 } ) );
	}
}
