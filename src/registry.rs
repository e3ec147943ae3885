//! The per-connection callback registry: a map from `u64` identifier to the
//! local handler that should run when a record carrying that identifier
//! arrives.
//
use
{
	bytes::Bytes,
	std::
	{
		collections::HashMap ,
		sync::atomic::{ AtomicU64, Ordering::Relaxed } ,
		sync::Arc ,
	},
	parking_lot::Mutex,
};


/// A registered local handler. Takes the opaque, still-serialized argument
/// tuple and returns nothing - callables in this system never have a return
/// value.
///
/// Reference counted rather than boxed so [`Registry::dispatch`] can clone
/// the handler out of the map and drop the lock before running it: running
/// a handler while holding the registry lock would deadlock as soon as the
/// handler itself registers a new callback (a very common thing for it to
/// do, see S3/S6 in the design).
//
pub type Handler = Arc< dyn Fn( Bytes ) + Send + Sync >;


/// Maps `u64` identifiers to [`Handler`]s for one connection. Identifiers
/// are allocated from a single monotonic, post-incremented counter and are
/// never reused over the connection's lifetime.
//
#[ derive( Default ) ]
//
pub struct Registry
{
	next    : AtomicU64                    ,
	handlers: Mutex< HashMap<u64, Handler> >,
}


impl Registry
{
	pub fn new() -> Self
	{
		Self::default()
	}


	/// Insert `handler` under a freshly allocated identifier. Never blocks
	/// on anything but the registry mutex - safe to call from inside a
	/// handler's own dispatch.
	//
	pub fn register( &self, handler: Handler ) -> u64
	{
		let id = self.next.fetch_add( 1, Relaxed );

		self.handlers.lock().insert( id, handler );

		id
	}


	/// Look up `id` and run its handler with `payload`, if still present.
	/// An absent id is not an error - the peer may have raced a release.
	//
	pub fn dispatch( &self, id: u64, payload: Bytes )
	{
		let handler = self.handlers.lock().get( &id ).cloned();

		match handler
		{
			Some( h ) => h( payload ),
			None      => log::warn!( "dispatch: no handler registered for id {id}, discarding record" ),
		}
	}


	/// Forget `id`. Absent is not an error.
	//
	pub fn release( &self, id: u64 )
	{
		self.handlers.lock().remove( &id );
	}


	/// Drop every registered handler. Called on teardown to break the
	/// reference cycle between handlers and their connection: handlers
	/// close over a handle to the connection so they can enqueue outbound
	/// writes, so as long as a handler is alive the connection can never
	/// reach a refcount of zero on its own.
	//
	pub fn clear( &self )
	{
		self.handlers.lock().clear();
	}
}


#[ cfg( test ) ]
//
mod tests
{
	use super::*;
	use pretty_assertions::assert_eq;
	use std::sync::atomic::{ AtomicUsize, Ordering::SeqCst };

	#[ test ]
	//
	fn identifiers_are_pairwise_distinct()
	{
		let reg = Registry::new();
		let mut ids = Vec::new();

		for _ in 0..100
		{
			ids.push( reg.register( Arc::new( |_| {} ) ) );
		}

		let mut sorted = ids.clone();
		sorted.sort_unstable();
		sorted.dedup();

		assert_eq!( sorted.len(), ids.len() );
	}

	#[ test ]
	//
	fn dispatch_runs_the_registered_handler()
	{
		let reg   = Registry::new();
		let calls = Arc::new( AtomicUsize::new( 0 ) );
		let c     = calls.clone();

		let id = reg.register( Arc::new( move |_| { c.fetch_add( 1, SeqCst ); } ) );

		reg.dispatch( id, Bytes::new() );
		reg.dispatch( id, Bytes::new() );

		assert_eq!( calls.load( SeqCst ), 2 );
	}

	#[ test ]
	//
	fn dispatch_on_unknown_id_is_silently_discarded()
	{
		let reg = Registry::new();

		// Should not panic.
		//
		reg.dispatch( 9999, Bytes::new() );
	}

	#[ test ]
	//
	fn release_is_idempotent_for_unknown_ids()
	{
		let reg = Registry::new();

		reg.release( 42 );
		reg.release( 42 );
	}

	#[ test ]
	//
	fn handler_can_reregister_during_its_own_dispatch()
	{
		let reg = Arc::new( Registry::new() );
		let inner = reg.clone();

		let id = reg.register( Arc::new( move |_| { inner.register( Arc::new( |_| {} ) ); } ) );

		// Would deadlock if dispatch held the lock across the handler call.
		//
		reg.dispatch( id, Bytes::new() );
	}
}
