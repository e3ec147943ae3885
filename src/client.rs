//! The typed client façade: resolves a host/port, connects, performs the
//! client handshake, and reduces a statically typed call `client(a1,…,an)`
//! into the transmission of a single arity-one callback that takes the
//! server's own handler. From there on the connection layer is uniformly
//! untyped - this is the only place in the façade where that reduction
//! happens.
//
use
{
	crate ::
	{
		codec      :: { Callback, Decode, Encode, Encoder } ,
		connection :: { handshake_as_client, Connection, ErrorSink, DEFAULT_PORT } ,
		error      :: { ConnectionError, TransportError }    ,
	},

	parking_lot::Mutex,
	std        ::{ marker::PhantomData, sync::Arc },
	tokio      ::{ io::{ AsyncRead, AsyncWrite }, net::TcpStream },
};


/// A client bound to one remote host/port and one call signature `Args`
/// (the tuple of argument types the remote handler takes).
//
pub struct Client<Args>
{
	host: String,
	port: u16,
	_args: PhantomData<Args>,
}


impl<Args> Client<Args>

	where Args: Encode + Decode + Send + Sync + 'static,

{
	pub fn new( host: impl Into<String> ) -> Self
	{
		Self::with_port( host, DEFAULT_PORT )
	}

	pub fn with_port( host: impl Into<String>, port: u16 ) -> Self
	{
		Self{ host: host.into(), port, _args: PhantomData }
	}

	/// Connect, handshake, and invoke the remote root handler with `args`.
	///
	/// Returns once the invocation has been sent; the connection's receive
	/// loop keeps running in the background to service whatever callback
	/// traffic `args` (or values derived from it on the peer) triggers.
	/// `on_error` fires exactly once, for a connect/handshake failure or
	/// any later transport/framing error on this connection - there is no
	/// retry or reconnect.
	//
	pub async fn call( &self, args: Args, on_error: impl Fn( ConnectionError ) + Send + Sync + 'static )
	{
		let err_sink = ErrorSink::new( on_error );
		let addr     = format!( "{}:{}", self.host, self.port );

		let stream = match TcpStream::connect( &addr ).await
		{
			Ok( s )  => s,
			Err( e ) => { err_sink.fire( TransportError::from( e ).into() ); return; }
		};

		call_over( stream, args, err_sink ).await;
	}
}


/// The actual client-side protocol, generic over any duplex byte stream.
/// [`Client::call`] is a thin wrapper around this that supplies a real
/// `TcpStream`; tests drive it directly over `tokio::io::duplex` to exercise
/// the protocol without a socket.
//
pub async fn call_over<S, Args>( mut stream: S, args: Args, err_sink: ErrorSink )

	where S   : AsyncRead + AsyncWrite + Unpin + Send + 'static,
	      Args: Encode + Decode + Send + Sync + 'static,

{
	if let Err( e ) = handshake_as_client( &mut stream ).await
	{
		err_sink.fire( e );
		return;
	}

	let ( conn, recv_loop ) = Connection::new( stream, err_sink );

	// A one-shot cell: the receiver closure is declared `Fn`, not `FnOnce`,
	// because a [`Callback`] may in principle be invoked more than once,
	// but this particular one is only ever meant to run once - the server
	// calls it with its own handler exactly once.
	//
	let args_cell = Arc::new( Mutex::new( Some( args ) ) );

	let receiver: Callback<( Callback<Args>, )> = Callback::new( move |( server_handler, )|
	{
		if let Some( args ) = args_cell.lock().take()
		{
			server_handler.call( args );
		}
	});

	let mut enc = Encoder::new( conn.clone() );
	receiver.encode( &mut enc );

	// record id 0 is, by convention, the server's root handler.
	//
	conn.send_invocation( 0, enc.into_bytes() );

	tokio::spawn( recv_loop.start_receive_loop() );
}
