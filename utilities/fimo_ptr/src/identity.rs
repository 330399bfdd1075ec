//! Identity handles.
use crate::capability::{Capability, CapabilityView, IUnknown, UnknownView};
use crate::cast::{CheckedCastRequest, FallibleCastRequest};
use crate::error::{Error, ErrorKind, Result};
use crate::ffi::Attach;
use crate::handle::Null;
use crate::route;
use std::cmp::Ordering;
use std::fmt::{Debug, Formatter, Pointer};
use std::hash::{Hash, Hasher};
use std::ptr::NonNull;

/// Types that can take part in identity comparisons.
pub trait IdentityKey {
    /// Address of the raw pointer held, without performing any query.
    fn raw_address(&self) -> Option<NonNull<()>>;

    /// Address of the identity capability of the referenced object.
    ///
    /// # Errors
    ///
    /// Forwards errors of the identity query.
    fn identity_address(&self) -> Result<Option<NonNull<()>>>;
}

/// A handle to the identity capability of an object.
///
/// Unlike a `Handle<dyn IUnknown>`, which may hold any of the `IUnknown`
/// implementations of an object, the identity handle always holds the
/// canonical one. Every construction from a cast request performs a query,
/// so comparisons between identity handles are plain address comparisons.
///
/// The handle does not expose raw output slots, as a callee could store a
/// non canonical pointer into them.
pub struct IdentityHandle {
    ptr: Option<NonNull<dyn IUnknown>>,
}

impl IdentityHandle {
    /// Constructs a null handle.
    #[inline]
    pub const fn null() -> Self {
        Self { ptr: None }
    }

    /// Converts a null literal to a null handle.
    ///
    /// Fails with [`ErrorKind::NullPointerAccess`] if `literal` is not `0`.
    pub fn try_from_literal(literal: i64) -> Result<Self> {
        Null::try_from(literal).map(Self::from)
    }

    /// Constructs the handle from a fallible cast request.
    ///
    /// The handle is null if the source is null or the query fails.
    pub fn from_cast<S>(request: FallibleCastRequest<'_, S>) -> Self
    where
        S: Capability + ?Sized,
    {
        Self {
            ptr: request.resolve::<dyn IUnknown>(),
        }
    }

    /// Constructs the handle from a checked cast request.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::NullPointerAccess`] if the source is null.
    /// - [`ErrorKind::MissingCapability`] if the object did not answer the query.
    /// - [`ErrorKind::QueryFailed`] if the query itself failed.
    pub fn try_from_checked<S>(request: CheckedCastRequest<'_, S>) -> Result<Self>
    where
        S: Capability + ?Sized,
    {
        request
            .resolve::<dyn IUnknown>()
            .map(|ptr| Self { ptr })
    }

    /// Adopts a reference without increasing the reference count.
    ///
    /// The adopted pointer must be the canonical identity of the object.
    #[inline]
    pub fn attach(attach: Attach<dyn IUnknown>) -> Self {
        Self {
            ptr: attach.into_raw(),
        }
    }

    /// Replaces the held reference with a copy of `other`.
    pub fn assign(&mut self, other: &Self) {
        let mut tmp = other.clone();
        self.swap(&mut tmp);
    }

    /// Replaces the held reference with the result of a fallible cast.
    pub fn assign_cast<S>(&mut self, request: FallibleCastRequest<'_, S>)
    where
        S: Capability + ?Sized,
    {
        let mut tmp = Self::from_cast(request);
        self.swap(&mut tmp);
    }

    /// Replaces the held reference with the result of a checked cast.
    ///
    /// The handle is left unchanged on failure.
    pub fn try_assign_checked<S>(&mut self, request: CheckedCastRequest<'_, S>) -> Result<()>
    where
        S: Capability + ?Sized,
    {
        let mut tmp = Self::try_from_checked(request)?;
        self.swap(&mut tmp);
        Ok(())
    }

    /// Replaces the held reference with an adopted reference.
    pub fn assign_attach(&mut self, attach: Attach<dyn IUnknown>) {
        let mut tmp = Self::attach(attach);
        self.swap(&mut tmp);
    }

    /// Releases the held reference and leaves the handle null.
    pub fn reset(&mut self) {
        let mut tmp = Self::null();
        self.swap(&mut tmp);
    }

    /// Assigns a null literal.
    ///
    /// Fails with [`ErrorKind::NullPointerAccess`] if `literal` is not `0`,
    /// leaving the handle unchanged.
    pub fn try_assign_literal(&mut self, literal: i64) -> Result<()> {
        Null::try_from(literal)?;
        self.reset();
        Ok(())
    }

    /// Exchanges the references of two handles.
    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(&mut self.ptr, &mut other.ptr);
    }

    /// Relinquishes ownership of the held reference, leaving the handle null.
    #[inline]
    #[must_use = "the detached reference must be released"]
    pub fn detach(&mut self) -> Option<NonNull<dyn IUnknown>> {
        self.ptr.take()
    }

    /// Returns the raw pointer without transferring ownership.
    #[inline]
    pub fn as_ptr(&self) -> Option<NonNull<dyn IUnknown>> {
        self.ptr
    }

    /// Checks whether the handle is null.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.ptr.is_none()
    }

    /// Checks whether the handle is not null.
    #[inline]
    pub fn is_some(&self) -> bool {
        self.ptr.is_some()
    }

    /// Accesses the restricted view of the identity capability.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::NullPointerAccess`] if the handle is null.
    pub fn get(&self) -> Result<UnknownView<'_>> {
        match self.view() {
            Some(view) => Ok(CapabilityView::from_capability(view)),
            None => Err(Error::new(
                ErrorKind::NullPointerAccess,
                "dereferenced a null identity handle",
            )),
        }
    }

    #[inline]
    pub(crate) fn view(&self) -> Option<&(dyn IUnknown + 'static)> {
        // Safety: the handle owns a reference, so the object is alive.
        self.ptr.map(|ptr| unsafe { &*ptr.as_ptr() })
    }

    /// Orders the referenced object against the object referenced by `other`.
    ///
    /// Only the side of `other` may require a query. The null handle orders
    /// before every object.
    pub fn compare<K: IdentityKey + ?Sized>(&self, other: &K) -> Result<Ordering> {
        let lhs = self.raw_address();
        if lhs == other.raw_address() {
            return Ok(Ordering::Equal);
        }

        let rhs = other.identity_address()?;
        Ok(lhs.cmp(&rhs))
    }

    /// Checks whether both handles reference the same object.
    pub fn same_object<K: IdentityKey + ?Sized>(&self, other: &K) -> Result<bool> {
        self.compare(other).map(Ordering::is_eq)
    }

    /// Compares the handle with an integer literal.
    ///
    /// Fails with [`ErrorKind::NullPointerAccess`] if `literal` is not `0`.
    pub fn is_null_literal(&self, literal: i64) -> Result<bool> {
        Null::try_from(literal).map(|_| self.is_null())
    }
}

impl IdentityKey for IdentityHandle {
    #[inline]
    fn raw_address(&self) -> Option<NonNull<()>> {
        self.ptr.map(NonNull::cast)
    }

    #[inline]
    fn identity_address(&self) -> Result<Option<NonNull<()>>> {
        Ok(self.raw_address())
    }
}

impl Clone for IdentityHandle {
    fn clone(&self) -> Self {
        if let Some(view) = self.view() {
            route::add_ref(view);
        }
        Self { ptr: self.ptr }
    }

    fn clone_from(&mut self, source: &Self) {
        self.assign(source);
    }
}

impl Drop for IdentityHandle {
    fn drop(&mut self) {
        if let Some(ptr) = self.ptr.take() {
            // Safety: the handle owns the reference.
            unsafe { route::release(ptr) };
        }
    }
}

impl Default for IdentityHandle {
    #[inline]
    fn default() -> Self {
        Self::null()
    }
}

impl From<Null> for IdentityHandle {
    #[inline]
    fn from(_: Null) -> Self {
        Self::null()
    }
}

impl<S: Capability + ?Sized> From<FallibleCastRequest<'_, S>> for IdentityHandle {
    #[inline]
    fn from(request: FallibleCastRequest<'_, S>) -> Self {
        Self::from_cast(request)
    }
}

impl PartialEq for IdentityHandle {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.raw_address() == other.raw_address()
    }
}

impl Eq for IdentityHandle {}

impl PartialOrd for IdentityHandle {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IdentityHandle {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw_address().cmp(&other.raw_address())
    }
}

impl Hash for IdentityHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw_address().hash(state);
    }
}

impl PartialEq<Null> for IdentityHandle {
    #[inline]
    fn eq(&self, _: &Null) -> bool {
        self.is_null()
    }
}

impl PartialEq<IdentityHandle> for Null {
    #[inline]
    fn eq(&self, other: &IdentityHandle) -> bool {
        other.is_null()
    }
}

impl Debug for IdentityHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("IdentityHandle")
            .field(&self.raw_address())
            .finish()
    }
}

impl Pointer for IdentityHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let ptr = self
            .raw_address()
            .map_or(std::ptr::null(), |ptr| ptr.as_ptr().cast_const());
        Pointer::fmt(&ptr, f)
    }
}
