//! Callbacks (remote references) are the one case where encoding and
//! decoding aren't simple field access: encoding a callable registers a
//! handler and emits its identifier, decoding one allocates a [`Proxy`]
//! that sends an invocation record when called and a release record when
//! the last copy of it is dropped.
//
use
{
	crate ::
	{
		codec      :: { Decode, Encode, Decoder, Encoder } ,
		connection :: Connection                           ,
		registry   :: Handler                              ,
	},

	bytes::Bytes,
	std  ::sync::Arc,
};


/// Sent a `send_release` exactly once, when the last clone of the owning
/// [`Proxy`] is dropped.
//
struct ReleaseToken
{
	conn: Arc<Connection>,
	id  : u64             ,
}


impl Drop for ReleaseToken
{
	fn drop( &mut self )
	{
		self.conn.send_release( self.id );
	}
}


/// A locally constructed callable standing in for a remote closure: calling
/// it encodes the arguments and sends them to the peer under `id`.
///
/// Cheap to clone - all clones share the same [`ReleaseToken`], so the
/// release record is sent exactly once regardless of how many clones exist
/// or in what order they're dropped.
//
#[ derive( Clone ) ]
//
pub struct Proxy
{
	conn : Arc<Connection>  ,
	id   : u64              ,
	_token: Arc<ReleaseToken>,
}


impl Proxy
{
	pub fn new( conn: Arc<Connection>, id: u64 ) -> Self
	{
		let token = Arc::new( ReleaseToken{ conn: conn.clone(), id } );

		Self{ conn, id, _token: token }
	}

	/// Encode `args` through a fresh encoder bound to the same connection
	/// and enqueue the resulting invocation record.
	//
	pub fn call<Args: Encode>( &self, args: Args )
	{
		let mut enc = Encoder::new( self.conn.clone() );
		args.encode( &mut enc );

		self.conn.send_invocation( self.id, enc.into_bytes() );
	}
}


/// A callable field: either a local closure about to be registered and sent
/// (encoding), or a proxy standing in for a closure the peer owns
/// (decoding). `Args` is the tuple of argument types the closure takes - use
/// `()` for a nullary callback, `(T,)` for unary, etc.
//
pub struct Callback<Args>
{
	inner: Arc< dyn Fn( Args ) + Send + Sync >,
}


// Hand-written rather than derived - `derive(Clone)` would add a spurious
// `Args: Clone` bound (Args only ever appears under the `Arc`, never stored
// by value), which would needlessly reject callbacks over non-`Clone`
// argument types.
//
impl<Args> Clone for Callback<Args>
{
	fn clone( &self ) -> Self
	{
		Self{ inner: self.inner.clone() }
	}
}


impl<Args> Callback<Args>
{
	/// Wrap a plain Rust closure as a callback that can be encoded and sent
	/// to a peer.
	//
	pub fn new( f: impl Fn( Args ) + Send + Sync + 'static ) -> Self
	{
		Self{ inner: Arc::new( f ) }
	}

	/// Invoke the callback - locally if it wraps a plain closure, or over
	/// the wire (via the underlying [`Proxy`]) if it was decoded from a
	/// peer.
	//
	pub fn call( &self, args: Args )
	{
		(self.inner)( args )
	}
}


impl<Args> Encode for Callback<Args>

	where Args: Decode + Send + Sync + 'static,

{
	fn encode( &self, enc: &mut Encoder )
	{
		let inner = self.inner.clone();
		let conn  = enc.conn().clone();

		let handler: Handler = Arc::new( move | payload: Bytes |
		{
			let mut dec = Decoder::new( payload, conn.clone() );

			match Args::decode( &mut dec )
			{
				Ok( args ) => (inner)( args ),
				Err( e )   => log::warn!( "discarding malformed callback invocation: {e}" ),
			}
		});

		let id = enc.conn().register_local( handler );

		enc.write_u64( id );
	}
}


impl<Args> Decode for Callback<Args>

	where Args: Encode + Send + Sync + 'static,

{
	fn decode( dec: &mut Decoder ) -> Result<Self, crate::error::DecodeError>
	{
		let id    = dec.read_u64()?;
		let proxy = Proxy::new( dec.conn().clone(), id );

		Ok( Self{ inner: Arc::new( move | args: Args | proxy.call( args ) ) } )
	}
}
