//! End-to-end scenarios exercising the connection engine through the typed
//! client/server façade, driven over in-memory duplex streams
//! (`tokio::io::duplex`) rather than real sockets.
//
use
{
	ox_remote ::
	{
		client::call_over ,
		server::serve_over ,
		codec::Callback    ,
		connection::ErrorSink ,
	},

	std::
	{
		sync::{ atomic::{ AtomicI32, AtomicUsize, Ordering::SeqCst }, Arc, Once } ,
		time::Duration ,
	},

	parking_lot::Mutex,
	simple_logger::SimpleLogger,
	tokio::io::duplex,
};


/// `SimpleLogger::init` panics if called more than once per process, and
/// every `#[tokio::test]` function in this file runs in the same process -
/// guard it with a `Once` so each scenario can call this unconditionally.
//
fn init_logging()
{
	static ONCE: Once = Once::new();

	ONCE.call_once( || { SimpleLogger::new().init().expect( "init logger" ); } );
}


async fn settle()
{
	tokio::time::sleep( Duration::from_millis( 30 ) ).await;
}


/// Echo with continuation: `void(i32, Callback<(String,)>)`.
//
#[ tokio::test ]
//
async fn echo_with_continuation()
{
	init_logging();

	let ( client_stream, server_stream ) = duplex( 8192 );

	let result      = Arc::new( Mutex::new( None ) );
	let result_clone = result.clone();

	let server_handler = move |( x, cont ): ( i32, Callback<( String, )> )|
	{
		cont.call( ( x.to_string(), ) );
	};

	tokio::spawn( serve_over( server_stream, Callback::new( server_handler ), ErrorSink::new( |_| {} ) ) );

	let cont: Callback<( String, )> = Callback::new( move |( s, )| { *result_clone.lock() = Some( s ); } );

	call_over( client_stream, ( 123i32, cont ), ErrorSink::new( |_| {} ) ).await;

	settle().await;

	assert_eq!( result.lock().as_deref(), Some( "123" ) );
}


/// Container argument: `void(Vec<i32>)`, server sums it.
//
#[ tokio::test ]
//
async fn container_sum()
{
	init_logging();

	let ( client_stream, server_stream ) = duplex( 8192 );

	let sum       = Arc::new( AtomicI32::new( 0 ) );
	let sum_clone = sum.clone();

	let server_handler = move |( v, ): ( Vec<i32>, )|
	{
		sum_clone.store( v.iter().sum(), SeqCst );
	};

	tokio::spawn( serve_over( server_stream, Callback::new( server_handler ), ErrorSink::new( |_| {} ) ) );

	call_over( client_stream, ( vec![ 1, 2, 3 ], ), ErrorSink::new( |_| {} ) ).await;

	settle().await;

	assert_eq!( sum.load( SeqCst ), 6 );
}


/// Capability object: server hands the client a little aggregate of
/// three callbacks (`inc`, `dec`, `get`), each itself taking a continuation.
/// There's no derive for user aggregates - they're implemented field by
/// field, same as tuples - so the capability object here is just a 3-tuple
/// of callbacks.
//
type Capability = ( Callback<( Callback<()>, )>, Callback<( Callback<()>, )>, Callback<( Callback<( i32, )>, )> );

#[ tokio::test ]
//
async fn capability_object()
{
	init_logging();

	let ( client_stream, server_stream ) = duplex( 8192 );

	let counter = Arc::new( std::sync::atomic::AtomicI32::new( 0 ) );

	let server_handler = move |( setup, ): ( Callback<( Capability, )>, )|
	{
		let inc_counter = counter.clone();
		let dec_counter = counter.clone();
		let get_counter = counter.clone();

		let inc: Callback<( Callback<()>, )> = Callback::new( move |( cont, )|
		{
			inc_counter.fetch_add( 1, SeqCst );
			cont.call(());
		});

		let dec: Callback<( Callback<()>, )> = Callback::new( move |( cont, )|
		{
			dec_counter.fetch_sub( 1, SeqCst );
			cont.call(());
		});

		let get: Callback<( Callback<( i32, )>, )> = Callback::new( move |( cont, )|
		{
			cont.call( ( get_counter.load( SeqCst ), ) );
		});

		setup.call( ( ( inc, dec, get ), ) );
	};

	tokio::spawn( serve_over( server_stream, Callback::new( server_handler ), ErrorSink::new( |_| {} ) ) );

	let recorded       = Arc::new( Mutex::new( None ) );
	let recorded_clone = recorded.clone();

	let setup: Callback<( Capability, )> = Callback::new( move |( cap, )|
	{
		let ( inc, dec, get ) = cap;
		let recorded_clone2   = recorded_clone.clone();

		let get2 = get.clone();

		let after_dec: Callback<()> = Callback::new( move |()|
		{
			get2.call( ( Callback::new( { let rc = recorded_clone2.clone(); move |( x, )| *rc.lock() = Some( x ) } ), ) );
		});

		let dec2 = dec.clone();

		let after_second_inc: Callback<()> = Callback::new( move |()|
		{
			dec2.call( ( after_dec.clone(), ) );
		});

		let inc2 = inc.clone();

		let after_first_inc: Callback<()> = Callback::new( move |()|
		{
			inc2.call( ( after_second_inc.clone(), ) );
		});

		inc.call( ( after_first_inc, ) );
	});

	call_over( client_stream, ( setup, ), ErrorSink::new( |_| {} ) ).await;

	settle().await;
	settle().await;

	assert_eq!( *recorded.lock(), Some( 1 ) );
}


/// Connect failure: nothing is listening on the target address, the
/// completion callback should fire quickly with a transport error.
//
#[ tokio::test ]
//
async fn connect_failure_surfaces_through_error_sink()
{
	init_logging();

	use ox_remote::Client;

	let fired = Arc::new( AtomicUsize::new( 0 ) );
	let fired_clone = fired.clone();

	let client: Client<()> = Client::with_port( "127.0.0.1", 1 );

	let call = client.call( (), move |err|
	{
		fired_clone.fetch_add( 1, SeqCst );
		assert_matches::assert_matches!( err, ox_remote::ConnectionError::Transport( _ ) );
	});

	tokio::time::timeout( Duration::from_secs( 1 ), call ).await.expect( "call completed within 1s" );

	assert_eq!( fired.load( SeqCst ), 1 );
}


/// Release propagation: client sends a one-shot continuation, server
/// calls it once and drops its copy; exactly one release record crosses
/// the wire server -> client.
//
#[ tokio::test ]
//
async fn release_propagation()
{
	init_logging();

	let ( client_stream, server_stream ) = duplex( 8192 );

	let server_handler = move |( cont, ): ( Callback<()>, )|
	{
		cont.call(());
		// `cont` (and its one Proxy) drops here, at the end of this closure.
	};

	tokio::spawn( serve_over( server_stream, Callback::new( server_handler ), ErrorSink::new( |_| {} ) ) );

	let called = Arc::new( AtomicUsize::new( 0 ) );
	let called_clone = called.clone();

	let cont: Callback<()> = Callback::new( move |()| { called_clone.fetch_add( 1, SeqCst ); } );

	call_over( client_stream, ( cont, ), ErrorSink::new( |_| {} ) ).await;

	settle().await;

	assert_eq!( called.load( SeqCst ), 1 );

	// We don't assert on wire bytes directly here (the façade doesn't expose
	// the raw stream once split) - registry::tests::release_is_idempotent_for_unknown_ids
	// and the connection-level release test cover the release record's shape
	// and the exactly-once token refcounting directly.
}


/// Deep nesting: a callback chain five levels deep, the innermost
/// invocation recording a value that must propagate back to the outermost
/// observer.
//
#[ tokio::test ]
//
async fn deep_callback_nesting()
{
	init_logging();

	let ( client_stream, server_stream ) = duplex( 8192 );

	// level 5 (innermost): takes a continuation, calls it with 42.
	//
	let server_handler = move |( l1, ): ( Callback<( Callback<( Callback<( Callback<( Callback<( i32, )>, )>, )>, )>, )> )|
	{
		let l2: Callback<( Callback<( Callback<( Callback<( i32, )>, )>, )>, )> = Callback::new( move |( l3, )|
		{
			let l4: Callback<( Callback<( i32, )>, )> = Callback::new( move |( record, )|
			{
				record.call( ( 42, ) );
			});

			l3.call( ( l4, ) );
		});

		l1.call( ( l2, ) );
	};

	tokio::spawn( serve_over( server_stream, Callback::new( server_handler ), ErrorSink::new( |_| {} ) ) );

	let recorded       = Arc::new( Mutex::new( None ) );
	let recorded_clone = recorded.clone();

	let record: Callback<( i32, )> = Callback::new( move |( v, )| { *recorded_clone.lock() = Some( v ); } );

	let l1: Callback<( Callback<( Callback<( Callback<( Callback<( i32, )>, )>, )>, )>, )> = Callback::new( move |( l2, )|
	{
		let record = record.clone();

		let l3: Callback<( Callback<( Callback<( i32, )>, )>, )> = Callback::new( move |( l4, )|
		{
			l4.call( ( record.clone(), ) );
		});

		l2.call( ( l3, ) );
	});

	call_over( client_stream, ( l1, ), ErrorSink::new( |_| {} ) ).await;

	settle().await;
	settle().await;

	assert_eq!( *recorded.lock(), Some( 42 ) );
}
