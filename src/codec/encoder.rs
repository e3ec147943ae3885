use
{
	crate     ::connection::Connection            ,
	byteorder :: { LittleEndian, WriteBytesExt }   ,
	bytes     ::Bytes                              ,
	std       ::sync::Arc                          ,
};


/// Serializes a single argument tuple (or, at the top level, the façade's
/// one-shot receiver invocation) into a flat byte buffer, registering any
/// callback it encounters along the way in `conn`'s registry.
///
/// Scalars and strings use fixed-width little-endian encoding - not the
/// varint codec from [`crate::varint`], which is only ever used for record
/// framing.
//
pub struct Encoder
{
	buf : Vec<u8>     ,
	conn: Arc<Connection>,
}


impl Encoder
{
	pub fn new( conn: Arc<Connection> ) -> Self
	{
		Self{ buf: Vec::new(), conn }
	}

	pub fn conn( &self ) -> &Arc<Connection>
	{
		&self.conn
	}

	pub fn into_bytes( self ) -> Bytes
	{
		Bytes::from( self.buf )
	}

	pub fn write_bool( &mut self, v: bool )
	{
		self.buf.push( v as u8 );
	}

	pub fn write_u8( &mut self, v: u8 )
	{
		self.buf.push( v );
	}

	pub fn write_i8( &mut self, v: i8 )
	{
		self.buf.push( v as u8 );
	}

	pub fn write_u16( &mut self, v: u16 ) { self.buf.write_u16::<LittleEndian>( v ).expect( "Vec<u8> write is infallible" ); }
	pub fn write_i16( &mut self, v: i16 ) { self.buf.write_i16::<LittleEndian>( v ).expect( "Vec<u8> write is infallible" ); }
	pub fn write_u32( &mut self, v: u32 ) { self.buf.write_u32::<LittleEndian>( v ).expect( "Vec<u8> write is infallible" ); }
	pub fn write_i32( &mut self, v: i32 ) { self.buf.write_i32::<LittleEndian>( v ).expect( "Vec<u8> write is infallible" ); }
	pub fn write_u64( &mut self, v: u64 ) { self.buf.write_u64::<LittleEndian>( v ).expect( "Vec<u8> write is infallible" ); }
	pub fn write_i64( &mut self, v: i64 ) { self.buf.write_i64::<LittleEndian>( v ).expect( "Vec<u8> write is infallible" ); }

	/// `u64` little-endian length prefix followed by the raw bytes - used
	/// both for strings and for any other dynamically sized aggregate
	/// (`Vec<T>`). Distinct from the varint-encoded record `size` field.
	//
	pub fn write_bytes_sized( &mut self, bytes: &[u8] )
	{
		self.write_u64( bytes.len() as u64 );
		self.buf.extend_from_slice( bytes );
	}
}
