//! Reference counted capability handles.
//!
//! Objects expose their functionality through capabilities, which are
//! discovered at runtime by querying the object. Every object implements the
//! identity capability [`IUnknown`], which manages its lifetime through a
//! reference count and answers capability queries.
//!
//! A [`Handle<C>`] owns one reference to an object and grants access to the
//! capability `C`. Conversions between capabilities which are not statically
//! known are expressed as cast requests, constructed with [`request_cast`]
//! or [`request_checked_cast`], and resolved by the receiving handle. The
//! [`IdentityHandle`] always holds the canonical identity of an object and
//! is therefore suited as a key in ordered and hashed collections.
//!
//! # Examples
//!
//! ```
//! use fimo_ptr::object::{Coclass, SimpleObject};
//! use fimo_ptr::query::Query;
//! use fimo_ptr::{capability, new_id, request_cast, CapabilityId, Handle, IdentityHandle};
//!
//! capability! {
//!     /// A counter.
//!     #![uuid(0x1c3e5a7b, 0x9d2f, 0x4e61, 0x8a0c, 0xb2d4f6081a3c)]
//!     pub capability ICounter {
//!         /// Returns the current count.
//!         fn count(&self) -> usize;
//!     }
//! }
//!
//! struct Counter(usize);
//!
//! impl Coclass for Counter {
//!     const CLASS_ID: CapabilityId = new_id(0x7b0e3d55, 0x2c1a, 0x4f93, 0x9e08, 0x51c6ad2f4e17);
//!     const NAME: &'static str = "Counter";
//!
//!     fn provide(object: &SimpleObject<Self>, query: &mut Query<'_>) {
//!         query.provide::<dyn ICounter>(object);
//!     }
//! }
//!
//! impl ICounter for SimpleObject<Counter> {
//!     fn count(&self) -> usize {
//!         self.0
//!     }
//! }
//!
//! let object = SimpleObject::create(Counter(5));
//! let counter = Handle::<dyn ICounter>::from_cast(request_cast(&object));
//! assert_eq!(counter.get().unwrap().count(), 5);
//!
//! let lhs = IdentityHandle::from_cast(request_cast(&object));
//! let rhs = IdentityHandle::from_cast(request_cast(&counter));
//! assert_eq!(lhs, rhs);
//! ```
//!
//! # Features
//!
//! - `variant` (default): enables the [`variant`] module and variants as cast sources.
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    rustdoc::broken_intra_doc_links
)]

#[doc(hidden)]
pub use paste;

pub mod capability;
pub mod cast;
pub mod error;
pub mod ffi;
pub mod handle;
pub mod identity;
pub mod object;
pub mod query;
pub mod route;
#[cfg(feature = "variant")]
pub mod variant;

pub use capability::{
    new_id, Capability, CapabilityId, CapabilityView, Destructor, IUnknown, UnknownView, Upcast,
    Uuid,
};
pub use cast::{
    request_cast, request_checked_cast, try_cast_ptr, CastSource, CheckedCastRequest,
    FallibleCastRequest, IntoCastSource,
};
pub use error::{Error, ErrorKind, Result};
pub use ffi::{auto_attach, Attach, Borrowed, FFISharable, FFITransferable};
pub use handle::{Handle, Null};
pub use identity::{IdentityHandle, IdentityKey};
pub use route::{Direct, OwningIdentity, Route, ViaOwningIdentity};
