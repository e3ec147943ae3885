//! The typed server façade: listens on a port, accepts connections,
//! performs the server handshake, and registers a single root callback
//! (id 0, installed before the handshake completes) that invokes the
//! user-provided handler.
//
use
{
	crate ::
	{
		codec      :: { Callback, Decoder, Encode, Decode } ,
		connection :: { handshake_as_server, Connection, ErrorSink, DEFAULT_PORT } ,
		error      :: ConnectionError                        ,
		registry   :: Handler                                ,
	},

	bytes::Bytes,
	std  ::sync::Arc,
	tokio::{ io::{ AsyncRead, AsyncWrite }, net::TcpListener },
};


/// Hosts one handler of call signature `Args` on a port, dual-stack
/// any-address.
//
pub struct Server<Args>
{
	port   : u16             ,
	handler: Callback<Args>,
}


impl<Args> Server<Args>

	where Args: Encode + Decode + Send + Sync + 'static,

{
	pub fn new( handler: impl Fn( Args ) + Send + Sync + 'static ) -> Self
	{
		Self::with_port( handler, DEFAULT_PORT )
	}

	pub fn with_port( handler: impl Fn( Args ) + Send + Sync + 'static, port: u16 ) -> Self
	{
		Self{ port, handler: Callback::new( handler ) }
	}

	/// Bind and accept connections forever. `on_error` is cloned once per
	/// accepted connection and fires at most once per connection - a
	/// failure on one peer never affects any other.
	//
	pub async fn listen( &self, on_error: impl Fn( ConnectionError ) + Send + Sync + Clone + 'static )

		-> std::io::Result<()>

	{
		let listener = TcpListener::bind( ( "::", self.port ) ).await?;

		loop
		{
			let ( stream, peer ) = listener.accept().await?;

			log::debug!( "accepted connection from {peer}" );

			let handler  = self.handler.clone();
			let err_sink = ErrorSink::new( on_error.clone() );

			tokio::spawn( serve_over( stream, handler, err_sink ) );
		}
	}
}


/// The actual server-side protocol for one accepted connection, generic
/// over any duplex byte stream. [`Server::listen`] is a thin wrapper that
/// supplies a real `TcpStream` per accepted peer; tests drive it directly
/// over `tokio::io::duplex`.
//
pub async fn serve_over<S, Args>( mut stream: S, handler: Callback<Args>, err_sink: ErrorSink )

	where S   : AsyncRead + AsyncWrite + Unpin + Send + 'static,
	      Args: Encode + Decode + Send + Sync + 'static,

{
	if let Err( e ) = handshake_as_server( &mut stream ).await
	{
		err_sink.fire( e );
		return;
	}

	let ( conn, recv_loop ) = Connection::new( stream, err_sink );

	let conn_for_root = conn.clone();

	let root: Handler = Arc::new( move | payload: Bytes |
	{
		let mut dec = Decoder::new( payload, conn_for_root.clone() );

		match Callback::< ( Callback<Args>, ) >::decode( &mut dec )
		{
			Ok( receiver ) => receiver.call( ( handler.clone(), ) ),
			Err( e )       => log::warn!( "root handler: failed to decode receiver: {e}" ),
		}
	});

	let id = conn.register_local( root );
	debug_assert_eq!( id, 0, "root handler must be the first registration on a server connection" );

	recv_loop.start_receive_loop().await;
}
