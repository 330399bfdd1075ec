//! Routing of the lifetime protocol.
//!
//! An object may expose several implementations of [`IUnknown`], e.g. when an
//! inner object is aggregated into an outer object. In that case only the
//! implementation of the outer object is authoritative, and every reference
//! count operation and query must be routed to it. The route of a capability
//! is selected statically through [`Capability::Route`].
use crate::capability::{Capability, IUnknown};
use crate::error::{Error, ErrorKind, Result};
use crate::query::Query;
use std::ptr::NonNull;

/// Access to the authoritative `IUnknown` of an aggregated object.
pub trait OwningIdentity {
    /// Returns the `IUnknown` of the object owning `self`.
    fn owning_identity(&self) -> &(dyn IUnknown + 'static);
}

/// Strategy for locating the authoritative `IUnknown` of a capability.
pub trait Route<C: ?Sized> {
    /// Whether the route redirects away from the `IUnknown` of the capability.
    const REDIRECTED: bool;

    /// Returns the authoritative `IUnknown`.
    fn unknown(view: &C) -> &(dyn IUnknown + 'static);
}

/// Uses the `IUnknown` implemented by the capability itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct Direct;

impl<C: Capability + ?Sized> Route<C> for Direct {
    const REDIRECTED: bool = false;

    #[inline]
    fn unknown(view: &C) -> &(dyn IUnknown + 'static) {
        view.as_unknown()
    }
}

/// Uses the `IUnknown` of the owning object, see [`OwningIdentity`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ViaOwningIdentity;

impl<C: Capability + OwningIdentity + ?Sized> Route<C> for ViaOwningIdentity {
    const REDIRECTED: bool = true;

    #[inline]
    fn unknown(view: &C) -> &(dyn IUnknown + 'static) {
        view.owning_identity()
    }
}

/// Returns the authoritative `IUnknown` of `view`.
#[inline]
pub(crate) fn unknown<C: Capability + ?Sized>(view: &C) -> &(dyn IUnknown + 'static) {
    <C::Route as Route<C>>::unknown(view)
}

pub(crate) fn add_ref<C: Capability + ?Sized>(view: &C) -> u32 {
    let count = unknown(view).add_ref();
    log::trace!("add_ref `{}`, count: {count}", C::NAME);
    count
}

/// # Safety
///
/// The caller must own a reference to `view`, which is consumed.
pub(crate) unsafe fn release<C: Capability + ?Sized>(view: NonNull<C>) -> u32 {
    // Safety: the owned reference keeps the object alive until the release.
    let unknown = unknown(unsafe { view.as_ref() });

    // Safety: ownership of the reference is transferred to the call.
    let count = unsafe { unknown.release() };
    log::trace!("release `{}`, count: {count}", C::NAME);
    if count == 0 {
        let destructor = unknown.destructor();
        log::trace!("destroying `{}`", C::NAME);

        // Safety: the last reference was released and `unknown` is not used anymore.
        unsafe { destructor.destroy() };
    }
    count
}

/// Queries `source` for the capability `T`.
///
/// Returns `Ok(None)` if the capability is not supported, and an error if the
/// query itself failed. A reference answered before the failure is released.
pub(crate) fn query<S, T>(source: &S) -> Result<Option<NonNull<T>>>
where
    S: Capability + ?Sized,
    T: Capability + ?Sized,
{
    let mut slot: Option<NonNull<T>> = None;
    let result = {
        let mut query = Query::new(&mut slot);
        unknown(source).query_capability(&mut query)
    };
    log::trace!(
        "query `{}` for `{}`, answered: {}",
        S::NAME,
        T::NAME,
        slot.is_some()
    );

    match result {
        Ok(()) => Ok(slot),
        Err(err) => {
            if let Some(answer) = slot.take() {
                // Safety: the answer owns the reference taken by the query.
                unsafe { release(answer) };
            }

            if err.kind() == ErrorKind::MissingCapability {
                Ok(None)
            } else {
                Err(err)
            }
        }
    }
}

/// Returns the identity address of the object referenced by `view`.
pub(crate) fn identity<C: Capability + ?Sized>(view: &C) -> Result<NonNull<()>> {
    let Some(identity) = query::<C, dyn IUnknown>(view)? else {
        return Err(Error::new(
            ErrorKind::MissingCapability,
            format!("`{}` did not answer the identity query", C::NAME),
        ));
    };

    let address = identity.cast::<()>();
    // Safety: the identity owns the reference taken by the query.
    unsafe { release(identity) };
    Ok(address)
}
