use
{
	crate     ::{ connection::Connection, error::DecodeError } ,
	byteorder :: { LittleEndian, ReadBytesExt                } ,
	bytes     ::{ Buf, Bytes                                 } ,
	std       ::sync::Arc                                      ,
};


/// The inverse of [`super::Encoder`]: walks a decoded argument buffer field
/// by field. Bound to the same connection as the encoder that produced the
/// buffer so that decoding a callback field can allocate a [`super::Proxy`]
/// against it.
//
pub struct Decoder
{
	payload: Bytes,
	conn   : Arc<Connection>,
}


impl Decoder
{
	pub fn new( payload: Bytes, conn: Arc<Connection> ) -> Self
	{
		Self{ payload, conn }
	}

	pub fn conn( &self ) -> &Arc<Connection>
	{
		&self.conn
	}

	fn need( &self, n: usize ) -> Result<(), DecodeError>
	{
		if self.payload.remaining() < n
		{
			return Err( DecodeError::ShortBuffer{ needed: n, had: self.payload.remaining() } );
		}

		Ok(())
	}

	pub fn read_bool( &mut self ) -> Result<bool, DecodeError>
	{
		Ok( self.read_u8()? != 0 )
	}

	pub fn read_u8( &mut self )  -> Result<u8, DecodeError>  { self.need( 1 )?; Ok( self.payload.get_u8()  ) }
	pub fn read_i8( &mut self )  -> Result<i8, DecodeError>  { self.need( 1 )?; Ok( self.payload.get_i8()  ) }

	pub fn read_u16( &mut self ) -> Result<u16, DecodeError>
	{
		self.need( 2 )?;
		let v = ( &self.payload[..] ).read_u16::<LittleEndian>().expect( "checked by need()" );
		self.payload.advance( 2 );
		Ok( v )
	}

	pub fn read_i16( &mut self ) -> Result<i16, DecodeError>
	{
		self.need( 2 )?;
		let v = ( &self.payload[..] ).read_i16::<LittleEndian>().expect( "checked by need()" );
		self.payload.advance( 2 );
		Ok( v )
	}

	pub fn read_u32( &mut self ) -> Result<u32, DecodeError>
	{
		self.need( 4 )?;
		let v = ( &self.payload[..] ).read_u32::<LittleEndian>().expect( "checked by need()" );
		self.payload.advance( 4 );
		Ok( v )
	}

	pub fn read_i32( &mut self ) -> Result<i32, DecodeError>
	{
		self.need( 4 )?;
		let v = ( &self.payload[..] ).read_i32::<LittleEndian>().expect( "checked by need()" );
		self.payload.advance( 4 );
		Ok( v )
	}

	pub fn read_u64( &mut self ) -> Result<u64, DecodeError>
	{
		self.need( 8 )?;
		let v = ( &self.payload[..] ).read_u64::<LittleEndian>().expect( "checked by need()" );
		self.payload.advance( 8 );
		Ok( v )
	}

	pub fn read_i64( &mut self ) -> Result<i64, DecodeError>
	{
		self.need( 8 )?;
		let v = ( &self.payload[..] ).read_i64::<LittleEndian>().expect( "checked by need()" );
		self.payload.advance( 8 );
		Ok( v )
	}

	/// Read a `u64` little-endian length prefix, then that many raw bytes.
	//
	pub fn read_bytes_sized( &mut self ) -> Result<Vec<u8>, DecodeError>
	{
		let len = self.read_u64()? as usize;
		self.need( len )?;

		Ok( self.payload.split_to( len ).to_vec() )
	}
}
