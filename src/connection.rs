//! The connection engine: handshake, ordered write pipeline and the
//! perpetual receive-dispatch loop, built over anything that looks like a
//! duplex byte stream (a real `TcpStream` in the façades, `tokio::io::duplex`
//! in tests).
//
use
{
	crate ::
	{
		error    :: { ConnectionError, FramingError, TransportError } ,
		registry :: { Handler, Registry                             } ,
		varint                                                        ,
	},

	bytes::Bytes,

	std::
	{
		panic :: { catch_unwind, AssertUnwindSafe } ,
		sync  :: { atomic::{ AtomicBool, Ordering::SeqCst }, Arc } ,
	},

	tokio::
	{
		io   :: { self, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf } ,
		sync :: { mpsc                                                                          } ,
	},
};


/// The default port both ends of the typed façade listen on / connect to.
//
pub const DEFAULT_PORT: u16 = 21872;

const SIGNATURE: [u8; 3] = [ 0x6F, 0x78, 0x00 ];


/// A closure invoked exactly once, the first time this connection fails.
/// Clone and share it freely - only the first caller of [`ErrorSink::fire`]
/// actually runs the inner closure.
//
#[ derive( Clone ) ]
//
pub struct ErrorSink
{
	inner: Arc< dyn Fn( ConnectionError ) + Send + Sync >,
	fired: Arc<AtomicBool>,
}


impl ErrorSink
{
	pub fn new( f: impl Fn( ConnectionError ) + Send + Sync + 'static ) -> Self
	{
		Self{ inner: Arc::new( f ), fired: Arc::new( AtomicBool::new( false ) ) }
	}

	pub fn fire( &self, err: ConnectionError )
	{
		if !self.fired.swap( true, SeqCst )
		{
			(self.inner)( err );
		}
	}
}


enum WriteCmd
{
	Invocation{ id: u64, payload: Bytes },
	Release   { id: u64                },
}


/// Exchange the three-byte handshake signature, client side: send then
/// receive. Any mismatch on the bytes we read back is a framing error and
/// the caller should abort the connection.
//
pub async fn handshake_as_client<S>( stream: &mut S ) -> Result<(), ConnectionError>

	where S: AsyncRead + AsyncWrite + Unpin,

{
	stream.write_all( &SIGNATURE ).await.map_err( TransportError::from )?;
	stream.flush().await.map_err( TransportError::from )?;

	receive_signature( stream ).await
}


/// Exchange the three-byte handshake signature, server side: receive then
/// send.
//
pub async fn handshake_as_server<S>( stream: &mut S ) -> Result<(), ConnectionError>

	where S: AsyncRead + AsyncWrite + Unpin,

{
	receive_signature( stream ).await?;

	stream.write_all( &SIGNATURE ).await.map_err( TransportError::from )?;
	stream.flush().await.map_err( TransportError::from )?;

	Ok(())
}


async fn receive_signature<S>( stream: &mut S ) -> Result<(), ConnectionError>

	where S: AsyncRead + Unpin,

{
	let mut got = [0u8; 3];

	stream.read_exact( &mut got ).await.map_err( TransportError::from )?;

	if got != SIGNATURE
	{
		return Err( FramingError::BadSignature{ expected: SIGNATURE, got }.into() );
	}

	Ok(())
}


/// One live peer: the callback registry, the identifier counter (folded
/// into [`Registry`]) and the sending end of the ordered write pipeline.
///
/// Construct with [`Connection::new`] *after* the handshake has completed
/// on the raw stream - the handshake doesn't touch the registry, so there is
/// no ordering hazard in doing it first on the unsplit stream.
//
pub struct Connection
{
	registry  : Arc<Registry>,
	writer_tx : mpsc::UnboundedSender<WriteCmd>,
	err_sink  : ErrorSink,
}


impl Connection
{
	/// Split `stream` into its read/write halves, spawn the task that owns
	/// the write half and drains the ordered write queue, and hand back the
	/// connection handle plus the still-unstarted receive loop.
	//
	pub fn new<S>( stream: S, err_sink: ErrorSink ) -> ( Arc<Self>, ReceiveLoop<S> )

		where S: AsyncRead + AsyncWrite + Unpin + Send + 'static,

	{
		let ( read_half, write_half ) = io::split( stream );
		let ( writer_tx, writer_rx )  = mpsc::unbounded_channel();
		let registry                  = Arc::new( Registry::new() );

		tokio::spawn( write_loop( write_half, writer_rx, err_sink.clone() ) );

		let conn = Arc::new( Self
		{
			registry : registry.clone() ,
			writer_tx                   ,
			err_sink : err_sink.clone() ,
		});

		let recv_loop = ReceiveLoop{ read_half, registry, err_sink };

		( conn, recv_loop )
	}


	/// Insert `handler` under a freshly allocated identifier. Thread-safe,
	/// never blocks on I/O - safe to call from inside a handler's own
	/// dispatch.
	//
	pub fn register_local( &self, handler: Handler ) -> u64
	{
		self.registry.register( handler )
	}


	/// Enqueue one invocation record. Records enqueued by this connection
	/// are delivered to the peer in the order they were enqueued.
	//
	pub fn send_invocation( &self, id: u64, payload: Bytes )
	{
		// The channel only errors if the write task has already died, in
		// which case the error sink has already fired; nothing further to
		// report here.
		//
		let _ = self.writer_tx.send( WriteCmd::Invocation{ id, payload } );
	}


	/// Enqueue one release record for `id`.
	//
	pub fn send_release( &self, id: u64 )
	{
		let _ = self.writer_tx.send( WriteCmd::Release{ id } );
	}


	/// Drop every registered handler, breaking the reference cycle between
	/// handlers (which hold a connection handle to enqueue writes) and the
	/// connection itself.
	//
	pub fn clear_registry( &self )
	{
		self.registry.clear();
	}
}


async fn write_loop<W>( mut write_half: WriteHalf<W>, mut rx: mpsc::UnboundedReceiver<WriteCmd>, err_sink: ErrorSink )

	where W: AsyncWrite + Send + 'static,

{
	while let Some( cmd ) = rx.recv().await
	{
		let mut buf = Vec::new();

		match cmd
		{
			WriteCmd::Invocation{ id, payload } =>
			{
				varint::encode( id, &mut buf );
				varint::encode( payload.len() as u64, &mut buf );
				buf.extend_from_slice( &payload );
			}

			WriteCmd::Release{ id } =>
			{
				varint::encode( id, &mut buf );
				varint::encode( varint::RELEASE_SENTINEL, &mut buf );
			}
		}

		if let Err( e ) = write_half.write_all( &buf ).await
		{
			err_sink.fire( TransportError::from( e ).into() );
			return;
		}
	}
}


/// The receive half of a connection, not yet started. Split out from
/// [`Connection`] so the façade can register a root handler (id 0) between
/// constructing the connection and starting the loop that will dispatch
/// traffic to it.
//
pub struct ReceiveLoop<S>
{
	read_half: ReadHalf<S>,
	registry : Arc<Registry>,
	err_sink : ErrorSink,
}


impl<S> ReceiveLoop<S>

	where S: AsyncRead + Unpin,

{
	/// Repeatedly deframe one record and dispatch it, until the stream
	/// fails or the peer closes it. Completes only through the error sink -
	/// it never returns `Ok`.
	//
	pub async fn start_receive_loop( mut self )
	{
		loop
		{
			let id = match varint::read( &mut self.read_half ).await
			{
				Ok( id )  => id,
				Err( e )  => { self.err_sink.fire( e ); break; }
			};

			let size = match varint::read( &mut self.read_half ).await
			{
				Ok( size ) => size,
				Err( e )   => { self.err_sink.fire( e ); break; }
			};

			if size == varint::RELEASE_SENTINEL
			{
				self.registry.release( id );
				continue;
			}

			let mut payload = vec![ 0u8; size as usize ];

			if let Err( e ) = self.read_half.read_exact( &mut payload ).await
			{
				self.err_sink.fire( TransportError::from( e ).into() );
				break;
			}

			dispatch_guarded( &self.registry, id, Bytes::from( payload ) );
		}

		// Break the handler <-> connection reference cycle: handlers hold a
		// connection handle to enqueue writes, so as long as one is alive the
		// connection can never be dropped on its own.
		//
		self.registry.clear();
	}
}


/// Run one dispatch, catching a panicking handler so a single misbehaving
/// remote closure can't take the whole connection down.
//
fn dispatch_guarded( registry: &Registry, id: u64, payload: Bytes )
{
	if catch_unwind( AssertUnwindSafe( || registry.dispatch( id, payload ) ) ).is_err()
	{
		log::warn!( "handler for id {id} panicked during dispatch; connection continues" );
	}
}


#[ cfg( test ) ]
//
mod tests
{
	use super::*;
	use pretty_assertions::assert_eq;
	use std::sync::atomic::{ AtomicUsize, Ordering::SeqCst };
	use tokio::io::duplex;

	#[ tokio::test ]
	//
	async fn handshake_succeeds_over_matching_signatures()
	{
		let ( mut a, mut b ) = duplex( 64 );

		let ( client_res, server_res ) = tokio::join!
		(
			handshake_as_client( &mut a ) ,
			handshake_as_server( &mut b ) ,
		);

		client_res.expect( "client handshake" );
		server_res.expect( "server handshake" );
	}

	#[ tokio::test ]
	//
	async fn handshake_rejects_bad_signature()
	{
		let ( mut a, mut b ) = duplex( 64 );

		let writer = async move
		{
			use tokio::io::AsyncWriteExt;

			a.write_all( &[ 0x6F, 0x78, 0x01 ] ).await.unwrap();
		};

		let ( _, server_res ) = tokio::join!( writer, handshake_as_server( &mut b ) );

		let err = server_res.unwrap_err();

		assert_matches::assert_matches!( err, ConnectionError::Framing( FramingError::BadSignature{ .. } ) );
	}

	#[ tokio::test ]
	//
	async fn invocation_and_release_are_observed_in_order()
	{
		let ( a, b ) = duplex( 4096 );

		let fired = Arc::new( AtomicUsize::new( 0 ) );
		let sink  = ErrorSink::new( { let f = fired.clone(); move |_| { f.fetch_add( 1, SeqCst ); } } );

		let ( conn, recv_loop ) = Connection::new( a, sink.clone() );

		let seen: Arc<parking_lot::Mutex<Vec<u8>>> = Arc::new( parking_lot::Mutex::new( Vec::new() ) );
		let seen_clone = seen.clone();

		let id = conn.register_local( Arc::new( move |p: Bytes| { seen_clone.lock().push( p[0] ); } ) );

		tokio::spawn( recv_loop.start_receive_loop() );

		// drive the *other* end manually as "the peer": send two invocation
		// records then a release, read them back with our own codec.
		//
		let ( _b_read, mut b_write ) = io::split( b );

		varint::write( &mut b_write, id ).await.unwrap();
		varint::write( &mut b_write, 1 ).await.unwrap();
		b_write.write_all( &[ 7u8 ] ).await.unwrap();

		varint::write( &mut b_write, id ).await.unwrap();
		varint::write( &mut b_write, 1 ).await.unwrap();
		b_write.write_all( &[ 9u8 ] ).await.unwrap();

		varint::write( &mut b_write, id ).await.unwrap();
		varint::write( &mut b_write, varint::RELEASE_SENTINEL ).await.unwrap();

		tokio::time::sleep( std::time::Duration::from_millis( 20 ) ).await;

		assert_eq!( &*seen.lock(), &vec![ 7, 9 ] );
	}

	#[ tokio::test ]
	//
	async fn dispatch_on_unknown_id_does_not_kill_connection()
	{
		let ( a, b ) = duplex( 4096 );
		let sink = ErrorSink::new( |_| {} );

		let ( conn, recv_loop ) = Connection::new( a, sink );

		let calls = Arc::new( AtomicUsize::new( 0 ) );
		let c     = calls.clone();

		let id = conn.register_local( Arc::new( move |_| { c.fetch_add( 1, SeqCst ); } ) );

		tokio::spawn( recv_loop.start_receive_loop() );

		let ( _b_read, mut b_write ) = io::split( b );

		// send for an id that isn't registered - should be discarded.
		//
		varint::write( &mut b_write, id + 1000 ).await.unwrap();
		varint::write( &mut b_write, 0 ).await.unwrap();

		// followed by a genuine record for our id - should still dispatch.
		//
		varint::write( &mut b_write, id ).await.unwrap();
		varint::write( &mut b_write, 0 ).await.unwrap();

		tokio::time::sleep( std::time::Duration::from_millis( 20 ) ).await;

		assert_eq!( calls.load( SeqCst ), 1 );
	}

	#[ tokio::test ]
	//
	async fn panicking_handler_does_not_kill_the_loop()
	{
		let ( a, b ) = duplex( 4096 );
		let sink = ErrorSink::new( |_| {} );

		let ( conn, recv_loop ) = Connection::new( a, sink );

		let calls = Arc::new( AtomicUsize::new( 0 ) );
		let c     = calls.clone();

		let bad_id = conn.register_local( Arc::new( |_| panic!( "misbehaving remote closure" ) ) );
		let good_id = conn.register_local( Arc::new( move |_| { c.fetch_add( 1, SeqCst ); } ) );

		tokio::spawn( recv_loop.start_receive_loop() );

		let ( _b_read, mut b_write ) = io::split( b );

		varint::write( &mut b_write, bad_id ).await.unwrap();
		varint::write( &mut b_write, 0 ).await.unwrap();

		varint::write( &mut b_write, good_id ).await.unwrap();
		varint::write( &mut b_write, 0 ).await.unwrap();

		tokio::time::sleep( std::time::Duration::from_millis( 20 ) ).await;

		assert_eq!( calls.load( SeqCst ), 1 );
	}
}
