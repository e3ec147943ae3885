//! The serialization adapter: [`Encode`]/[`Decode`] plus the concrete
//! [`Encoder`]/[`Decoder`] that carry a connection handle through
//! serialization so that callback fields can register/proxy against it.
//
mod encoder;
mod decoder;
mod callback;

pub use encoder ::Encoder;
pub use decoder ::Decoder;
pub use callback::{ Callback, Proxy };

use crate::error::DecodeError;


/// Anything that can be written into an argument buffer. Implemented for
/// arithmetic scalars, `String`, `Vec<T>`, tuples (a user-defined aggregate
/// implements this the same way - calling `field.encode(enc)` for each
/// field in declaration order, exactly as the tuple impls below do) and
/// [`Callback`].
//
pub trait Encode
{
	fn encode( &self, enc: &mut Encoder );
}


/// The inverse of [`Encode`].
//
pub trait Decode: Sized
{
	fn decode( dec: &mut Decoder ) -> Result<Self, DecodeError>;
}


macro_rules! impl_scalar
{
	( $ty:ty, $write:ident, $read:ident ) =>
	{
		impl Encode for $ty
		{
			fn encode( &self, enc: &mut Encoder ) { enc.$write( *self ); }
		}

		impl Decode for $ty
		{
			fn decode( dec: &mut Decoder ) -> Result<Self, DecodeError> { dec.$read() }
		}
	};
}

impl_scalar!( bool, write_bool, read_bool );
impl_scalar!( u8  , write_u8  , read_u8   );
impl_scalar!( i8  , write_i8  , read_i8   );
impl_scalar!( u16 , write_u16 , read_u16  );
impl_scalar!( i16 , write_i16 , read_i16  );
impl_scalar!( u32 , write_u32 , read_u32  );
impl_scalar!( i32 , write_i32 , read_i32  );
impl_scalar!( u64 , write_u64 , read_u64  );
impl_scalar!( i64 , write_i64 , read_i64  );


impl Encode for String
{
	fn encode( &self, enc: &mut Encoder )
	{
		enc.write_bytes_sized( self.as_bytes() );
	}
}

impl Decode for String
{
	fn decode( dec: &mut Decoder ) -> Result<Self, DecodeError>
	{
		Ok( String::from_utf8( dec.read_bytes_sized()? )? )
	}
}

impl Encode for &str
{
	fn encode( &self, enc: &mut Encoder )
	{
		enc.write_bytes_sized( self.as_bytes() );
	}
}


impl<T: Encode> Encode for Vec<T>
{
	fn encode( &self, enc: &mut Encoder )
	{
		enc.write_u64( self.len() as u64 );

		for item in self
		{
			item.encode( enc );
		}
	}
}

impl<T: Decode> Decode for Vec<T>
{
	fn decode( dec: &mut Decoder ) -> Result<Self, DecodeError>
	{
		let len = dec.read_u64()?;
		let mut out = Vec::with_capacity( len as usize );

		for _ in 0..len
		{
			out.push( T::decode( dec )? );
		}

		Ok( out )
	}
}


macro_rules! impl_tuple
{
	() =>
	{
		impl Encode for ()
		{
			fn encode( &self, _enc: &mut Encoder ) {}
		}

		impl Decode for ()
		{
			fn decode( _dec: &mut Decoder ) -> Result<Self, DecodeError> { Ok(()) }
		}
	};

	( $( $name:ident ),+ ) =>
	{
		impl<$( $name: Encode ),+> Encode for ( $( $name, )+ )
		{
			#[ allow( non_snake_case ) ]
			//
			fn encode( &self, enc: &mut Encoder )
			{
				let ( $( $name, )+ ) = self;

				$( $name.encode( enc ); )+
			}
		}

		impl<$( $name: Decode ),+> Decode for ( $( $name, )+ )
		{
			fn decode( dec: &mut Decoder ) -> Result<Self, DecodeError>
			{
				Ok(( $( $name::decode( dec )?, )+ ))
			}
		}
	};
}

impl_tuple!();
impl_tuple!( A );
impl_tuple!( A, B );
impl_tuple!( A, B, C );
impl_tuple!( A, B, C, D );
impl_tuple!( A, B, C, D, E );


#[ cfg( test ) ]
//
mod tests
{
	use
	{
		super::*,
		crate :: { connection::{ Connection, ErrorSink }, codec::Callback } ,
		pretty_assertions::assert_eq,
		std::sync::{ atomic::{ AtomicI32, Ordering::SeqCst }, Arc },
		tokio::io::duplex,
	};

	fn test_conn() -> Arc<Connection>
	{
		let ( a, _b ) = duplex( 4096 );
		let ( conn, recv_loop ) = Connection::new( a, ErrorSink::new( |_| {} ) );

		tokio::spawn( recv_loop.start_receive_loop() );

		conn
	}

	#[ tokio::test ]
	//
	async fn scalars_roundtrip_through_encoder_decoder()
	{
		let conn = test_conn();

		let mut enc = Encoder::new( conn.clone() );
		( 7u8, -3i32, 42u64, true, "hi".to_string() ).encode( &mut enc );

		let mut dec = Decoder::new( enc.into_bytes(), conn );

		let ( a, b, c, d, e ) = <( u8, i32, u64, bool, String )>::decode( &mut dec ).unwrap();

		assert_eq!( ( a, b, c, d, e ), ( 7, -3, 42, true, "hi".to_string() ) );
	}

	#[ tokio::test ]
	//
	async fn vec_of_scalars_roundtrips()
	{
		let conn = test_conn();

		let mut enc = Encoder::new( conn.clone() );
		vec![ 1i32, 2, 3 ].encode( &mut enc );

		let mut dec = Decoder::new( enc.into_bytes(), conn );
		let out: Vec<i32> = Decode::decode( &mut dec ).unwrap();

		assert_eq!( out, vec![ 1, 2, 3 ] );
	}

	#[ tokio::test ]
	//
	async fn callback_roundtrips_across_an_encode_decode_pair()
	{
		// Two real connections over the two ends of one duplex stream, the
		// same shape a real client/server pair would have - the identifier
		// a callback is registered under on one side is only meaningful to
		// a proxy that sends invocations back to *that* side.
		//
		let ( a, b ) = duplex( 4096 );

		let ( conn_a, recv_a ) = Connection::new( a, ErrorSink::new( |_| {} ) );
		let ( conn_b, recv_b ) = Connection::new( b, ErrorSink::new( |_| {} ) );

		tokio::spawn( recv_a.start_receive_loop() );
		tokio::spawn( recv_b.start_receive_loop() );

		let got = Arc::new( AtomicI32::new( 0 ) );
		let got_clone = got.clone();

		let cb: Callback<( i32, )> = Callback::new( move |( v, )| { got_clone.store( v, SeqCst ); } );

		// encode registers the closure in conn_a's registry and writes its id.
		//
		let mut enc = Encoder::new( conn_a.clone() );
		cb.encode( &mut enc );
		let wire_id = enc.into_bytes();

		// decode, bound to conn_b, builds a proxy that will send invocations
		// out over conn_b - exactly as if `wire_id` had arrived from peer A.
		//
		let mut dec = Decoder::new( wire_id, conn_b );
		let proxy: Callback<( i32, )> = Decode::decode( &mut dec ).unwrap();

		proxy.call( ( 9, ) );

		// give the write -> read loop a moment to run.
		//
		tokio::time::sleep( std::time::Duration::from_millis( 20 ) ).await;

		assert_eq!( got.load( SeqCst ), 9 );
	}
}
