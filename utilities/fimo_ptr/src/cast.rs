//! Cast requests.
//!
//! A cast request wraps a borrowed source and is consumed by the construction
//! or assignment of a handle, which resolves it by querying the source for the
//! capability of the handle. Fallible requests resolve to a null handle if the
//! capability is not supported, while checked requests report an error.
//!
//! # Examples
//!
//! ```
//! use fimo_ptr::object::{Coclass, SimpleObject};
//! use fimo_ptr::{
//!     new_id, request_cast, request_checked_cast, CapabilityId, ErrorKind, Handle, IUnknown,
//! };
//!
//! struct Counter;
//!
//! impl Coclass for Counter {
//!     const CLASS_ID: CapabilityId = new_id(0x2e8cbd57, 0x1f44, 0x4c2b, 0xa3b1, 0x6f1f0d0e9a21);
//!     const NAME: &'static str = "Counter";
//! }
//!
//! let object = SimpleObject::create(Counter);
//! let unknown = Handle::<dyn IUnknown>::from_cast(request_cast(&object));
//! assert!(unknown.is_some());
//!
//! let null = Handle::<dyn IUnknown>::null();
//! let err = Handle::<SimpleObject<Counter>>::try_from_checked(request_checked_cast(&null))
//!     .unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::NullPointerAccess);
//! ```
use crate::capability::{Capability, IUnknown};
use crate::error::{Error, ErrorKind, Result};
use crate::ffi::Borrowed;
use crate::handle::Handle;
use crate::identity::IdentityHandle;
use crate::route;
use std::fmt::{Debug, Formatter};
use std::ptr::NonNull;

#[cfg(feature = "variant")]
use crate::variant::Variant;

/// Borrowed source of a cast request.
pub enum CastSource<'a, S: ?Sized> {
    /// A reference to an object, `None` if null.
    Object(Option<&'a S>),
    /// A variant value.
    #[cfg(feature = "variant")]
    Variant(&'a Variant<'a>),
}

impl<'a, S: Capability + ?Sized> CastSource<'a, S> {
    /// Checks whether the source references no object.
    pub fn is_null(&self) -> bool {
        match self {
            CastSource::Object(view) => view.is_none(),
            #[cfg(feature = "variant")]
            CastSource::Variant(value) => value.reference().is_none(),
        }
    }
}

impl<S: Capability + ?Sized> Debug for CastSource<'_, S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CastSource::Object(view) => f
                .debug_tuple("Object")
                .field(&S::NAME)
                .field(&view.map(|view| NonNull::from(view).cast::<()>()))
                .finish(),
            #[cfg(feature = "variant")]
            CastSource::Variant(value) => f.debug_tuple("Variant").field(value).finish(),
        }
    }
}

/// Conversion into a [`CastSource`].
pub trait IntoCastSource<'a> {
    /// Capability of the source.
    type Capability: Capability + ?Sized;

    /// Borrows the source.
    fn into_cast_source(self) -> CastSource<'a, Self::Capability>;
}

impl<'a, C: Capability + ?Sized> IntoCastSource<'a> for &'a Handle<C> {
    type Capability = C;

    #[inline]
    fn into_cast_source(self) -> CastSource<'a, C> {
        CastSource::Object(self.view())
    }
}

impl<'a> IntoCastSource<'a> for &'a IdentityHandle {
    type Capability = dyn IUnknown;

    #[inline]
    fn into_cast_source(self) -> CastSource<'a, dyn IUnknown> {
        CastSource::Object(self.view())
    }
}

impl<'a, C: Capability + ?Sized> IntoCastSource<'a> for Borrowed<'a, C> {
    type Capability = C;

    #[inline]
    fn into_cast_source(self) -> CastSource<'a, C> {
        CastSource::Object(self.view())
    }
}

#[cfg(feature = "variant")]
impl<'a, 'b: 'a> IntoCastSource<'a> for &'a Variant<'b> {
    type Capability = dyn IUnknown;

    #[inline]
    fn into_cast_source(self) -> CastSource<'a, dyn IUnknown> {
        CastSource::Variant(self)
    }
}

/// A single use request for a cast which yields null on failure.
///
/// Constructed with [`request_cast`].
#[must_use = "cast requests do nothing unless consumed by a handle"]
pub struct FallibleCastRequest<'a, S: ?Sized> {
    source: CastSource<'a, S>,
}

/// A single use request for a cast which reports failures.
///
/// Constructed with [`request_checked_cast`].
#[must_use = "cast requests do nothing unless consumed by a handle"]
pub struct CheckedCastRequest<'a, S: ?Sized> {
    source: CastSource<'a, S>,
}

/// Wraps a source into a fallible cast request.
///
/// # Examples
///
/// ```
/// use fimo_ptr::{request_cast, Handle, IUnknown};
///
/// let null = Handle::<dyn IUnknown>::null();
/// let handle: Handle<dyn IUnknown> = request_cast(&null).into();
/// assert!(handle.is_null());
/// ```
#[inline]
pub fn request_cast<'a, T: IntoCastSource<'a>>(
    source: T,
) -> FallibleCastRequest<'a, T::Capability> {
    FallibleCastRequest {
        source: source.into_cast_source(),
    }
}

/// Wraps a source into a checked cast request.
#[inline]
pub fn request_checked_cast<'a, T: IntoCastSource<'a>>(
    source: T,
) -> CheckedCastRequest<'a, T::Capability> {
    CheckedCastRequest {
        source: source.into_cast_source(),
    }
}

/// Performs a checked cast of `source` to the capability `C`.
///
/// Equivalent to `Handle::try_from_checked(request_checked_cast(source))`.
#[inline]
pub fn try_cast_ptr<'a, C, T>(source: T) -> Result<Handle<C>>
where
    C: Capability + ?Sized,
    T: IntoCastSource<'a>,
{
    Handle::try_from_checked(request_checked_cast(source))
}

impl<'a, S: Capability + ?Sized> FallibleCastRequest<'a, S> {
    /// Returns the source of the request.
    pub fn source(&self) -> &CastSource<'a, S> {
        &self.source
    }

    /// Resolves the request to an owned reference of `T`.
    pub(crate) fn resolve<T: Capability + ?Sized>(self) -> Option<NonNull<T>> {
        let result = match self.source {
            CastSource::Object(None) => return None,
            CastSource::Object(Some(view)) => route::query::<S, T>(view),
            #[cfg(feature = "variant")]
            CastSource::Variant(value) => match value.reference() {
                Some(unknown) => route::query::<dyn IUnknown, T>(unknown),
                None => return None,
            },
        };

        result.unwrap_or_else(|err| {
            log::warn!("query for `{}` failed, yielding null: {err}", T::NAME);
            None
        })
    }
}

impl<'a, S: Capability + ?Sized> CheckedCastRequest<'a, S> {
    /// Returns the source of the request.
    pub fn source(&self) -> &CastSource<'a, S> {
        &self.source
    }

    /// Resolves the request to an owned reference of `T`.
    ///
    /// Yields `None` only for variants holding no reference.
    pub(crate) fn resolve<T: Capability + ?Sized>(self) -> Result<Option<NonNull<T>>> {
        let result = match self.source {
            CastSource::Object(None) => {
                log::debug!("checked cast of a null `{}` to `{}`", S::NAME, T::NAME);
                return Err(Error::new(
                    ErrorKind::NullPointerAccess,
                    format!("cannot cast a null `{}` to `{}`", S::NAME, T::NAME),
                ));
            }
            CastSource::Object(Some(view)) => route::query::<S, T>(view)?,
            #[cfg(feature = "variant")]
            CastSource::Variant(value) => match value.try_reference()? {
                Some(unknown) => route::query::<dyn IUnknown, T>(unknown)?,
                None => return Ok(None),
            },
        };

        match result {
            Some(ptr) => Ok(Some(ptr)),
            None => {
                log::debug!("`{}` does not support `{}`", S::NAME, T::NAME);
                Err(Error::new(
                    ErrorKind::MissingCapability,
                    format!("`{}` does not support `{}`", S::NAME, T::NAME),
                ))
            }
        }
    }
}

impl<S: Capability + ?Sized> Debug for FallibleCastRequest<'_, S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallibleCastRequest")
            .field("source", &self.source)
            .finish()
    }
}

impl<S: Capability + ?Sized> Debug for CheckedCastRequest<'_, S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckedCastRequest")
            .field("source", &self.source)
            .finish()
    }
}
