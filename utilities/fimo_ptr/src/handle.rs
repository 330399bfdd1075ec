//! Reference counted capability handles.
use crate::capability::{Capability, CapabilityId, CapabilityView, IUnknown, Upcast};
use crate::cast::{request_cast, request_checked_cast, CheckedCastRequest, FallibleCastRequest};
use crate::error::{Error, ErrorKind, Result};
use crate::ffi::Attach;
use crate::identity::{IdentityHandle, IdentityKey};
use crate::route;
use std::cmp::Ordering;
use std::fmt::{Debug, Formatter, Pointer};
use std::marker::PhantomData;
use std::ptr::NonNull;

#[cfg(test)]
mod test;

static_assertions::assert_eq_size!(Handle<dyn IUnknown>, Option<NonNull<dyn IUnknown>>);
static_assertions::assert_eq_size!(Handle<dyn IUnknown>, *const dyn IUnknown);

/// The null literal.
///
/// Handles compare equal to `Null` if and only if they are null. Integer
/// literals convert to `Null` only if they are `0`.
///
/// # Examples
///
/// ```
/// use fimo_ptr::{ErrorKind, Handle, IUnknown, Null};
///
/// let handle = Handle::<dyn IUnknown>::null();
/// assert!(handle == Null);
///
/// assert!(Null::try_from(0_i64).is_ok());
/// assert_eq!(Null::try_from(1_i64).unwrap_err().kind(), ErrorKind::NullPointerAccess);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Null;

impl TryFrom<i64> for Null {
    type Error = Error;

    fn try_from(literal: i64) -> Result<Self> {
        if literal == 0 {
            Ok(Null)
        } else {
            Err(Error::new(
                ErrorKind::NullPointerAccess,
                format!("`{literal}` is not a null literal"),
            ))
        }
    }
}

/// An owning handle to a capability.
///
/// A non-null handle owns exactly one reference to the object it points to,
/// which is released when the handle is dropped. Every operation that
/// replaces the held reference first constructs the new value, so the handle
/// is left unchanged if the construction fails.
///
/// The handle only implements `Send` and `Sync` if the capability does.
pub struct Handle<C: Capability + ?Sized> {
    ptr: Option<NonNull<C>>,
    _phantom: PhantomData<C>,
}

// Safety: the capability is shareable across threads.
unsafe impl<C: Capability + Send + Sync + ?Sized> Send for Handle<C> {}

// Safety: the capability is shareable across threads.
unsafe impl<C: Capability + Send + Sync + ?Sized> Sync for Handle<C> {}

impl<C: Capability + ?Sized> Handle<C> {
    /// Constructs a null handle.
    #[inline]
    pub const fn null() -> Self {
        Self {
            ptr: None,
            _phantom: PhantomData,
        }
    }

    #[inline]
    const fn from_owned(ptr: Option<NonNull<C>>) -> Self {
        Self {
            ptr,
            _phantom: PhantomData,
        }
    }

    /// Id of the capability referenced by the handle.
    #[inline]
    pub const fn capability_id() -> CapabilityId {
        C::ID
    }

    /// Name of the capability referenced by the handle.
    #[inline]
    pub const fn capability_name() -> &'static str {
        C::NAME
    }

    /// Converts a null literal to a null handle.
    ///
    /// Fails with [`ErrorKind::NullPointerAccess`] if `literal` is not `0`.
    pub fn try_from_literal(literal: i64) -> Result<Self> {
        Null::try_from(literal).map(Self::from)
    }

    /// Constructs a handle from a raw pointer, taking a new reference.
    ///
    /// # Safety
    ///
    /// `ptr` must either be null or point to a live object.
    pub unsafe fn from_raw(ptr: *const C) -> Self {
        let ptr = NonNull::new(ptr.cast_mut());
        if let Some(ptr) = ptr {
            // Safety: the object is alive by contract.
            route::add_ref(unsafe { ptr.as_ref() });
        }
        Self::from_owned(ptr)
    }

    /// Adopts a reference without increasing the reference count.
    #[inline]
    pub fn attach(attach: Attach<C>) -> Self {
        Self::from_owned(attach.into_raw())
    }

    /// Constructs a handle from a handle to a derived capability.
    ///
    /// The conversion is statically known, so no query is performed.
    pub fn upcast_from<S>(source: &Handle<S>) -> Self
    where
        S: Upcast<C> + ?Sized,
    {
        match source.view() {
            Some(view) => {
                let view = view.upcast();
                route::add_ref(view);
                Self::from_owned(Some(NonNull::from(view)))
            }
            None => Self::null(),
        }
    }

    /// Converts the handle to a handle of a base capability.
    #[inline]
    pub fn upcast<T>(&self) -> Handle<T>
    where
        T: Capability + ?Sized,
        C: Upcast<T>,
    {
        Handle::upcast_from(self)
    }

    /// Constructs a handle from a fallible cast request.
    ///
    /// The handle is null if the source is null or does not support the
    /// capability. A failing query is logged and yields a null handle as well.
    pub fn from_cast<S>(request: FallibleCastRequest<'_, S>) -> Self
    where
        S: Capability + ?Sized,
    {
        Self::from_owned(request.resolve::<C>())
    }

    /// Constructs a handle from a checked cast request.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::NullPointerAccess`] if the source is null.
    /// - [`ErrorKind::MissingCapability`] if the capability is not supported.
    /// - [`ErrorKind::QueryFailed`] if the query itself failed.
    pub fn try_from_checked<S>(request: CheckedCastRequest<'_, S>) -> Result<Self>
    where
        S: Capability + ?Sized,
    {
        request.resolve::<C>().map(Self::from_owned)
    }

    /// Queries the object for the capability `T`.
    ///
    /// Shorthand for `Handle::from_cast(request_cast(self))`.
    #[inline]
    pub fn cast<T: Capability + ?Sized>(&self) -> Handle<T> {
        Handle::from_cast(request_cast(self))
    }

    /// Queries the object for the capability `T`.
    ///
    /// Shorthand for `Handle::try_from_checked(request_checked_cast(self))`.
    #[inline]
    pub fn try_cast<T: Capability + ?Sized>(&self) -> Result<Handle<T>> {
        Handle::try_from_checked(request_checked_cast(self))
    }

    /// Replaces the held reference with a copy of `other`.
    pub fn assign(&mut self, other: &Self) {
        let mut tmp = other.clone();
        self.swap(&mut tmp);
    }

    /// Replaces the held reference with a new reference to `ptr`.
    ///
    /// # Safety
    ///
    /// See [`Handle::from_raw`].
    pub unsafe fn assign_raw(&mut self, ptr: *const C) {
        // Safety: forwarded to the caller.
        let mut tmp = unsafe { Self::from_raw(ptr) };
        self.swap(&mut tmp);
    }

    /// Replaces the held reference with a handle of a derived capability.
    pub fn assign_upcast<S>(&mut self, source: &Handle<S>)
    where
        S: Upcast<C> + ?Sized,
    {
        let mut tmp = Self::upcast_from(source);
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
    pub fn assign_attach(&mut self, attach: Attach<C>) {
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
    ///
    /// The caller becomes responsible for releasing the reference.
    #[inline]
    #[must_use = "the detached reference must be released"]
    pub fn detach(&mut self) -> Option<NonNull<C>> {
        self.ptr.take()
    }

    /// Returns the raw pointer without transferring ownership.
    #[inline]
    pub fn as_ptr(&self) -> Option<NonNull<C>> {
        self.ptr
    }

    /// Releases the held reference and returns the slot for a callee to fill.
    ///
    /// # Safety
    ///
    /// A pointer written into the slot must be null or own a reference to a
    /// live object.
    pub unsafe fn out(&mut self) -> &mut Option<NonNull<C>> {
        self.reset();
        &mut self.ptr
    }

    /// Returns the slot for a callee to read and replace.
    ///
    /// # Safety
    ///
    /// A callee replacing the pointer must release the previous reference,
    /// and the new pointer must be null or own a reference to a live object.
    #[inline]
    pub unsafe fn inout(&mut self) -> &mut Option<NonNull<C>> {
        &mut self.ptr
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

    /// Accesses the restricted view of the capability.
    ///
    /// The view only exposes the methods of the capability, the lifetime
    /// protocol stays under the control of the handle.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::NullPointerAccess`] if the handle is null.
    pub fn get(&self) -> Result<C::View<'_>> {
        match self.view() {
            Some(view) => Ok(CapabilityView::from_capability(view)),
            None => Err(Error::new(
                ErrorKind::NullPointerAccess,
                format!("dereferenced a null `{}` handle", C::NAME),
            )),
        }
    }

    #[inline]
    pub(crate) fn view(&self) -> Option<&C> {
        // Safety: the handle owns a reference, so the object is alive.
        self.ptr.map(|ptr| unsafe { &*ptr.as_ptr() })
    }

    /// Checks whether both handles hold the same raw pointer.
    ///
    /// Unlike the identity comparisons no query is performed, so different
    /// capabilities of the same object may compare unequal.
    #[inline]
    pub fn same_pointer<K: IdentityKey + ?Sized>(&self, other: &K) -> bool {
        self.raw_address() == other.raw_address()
    }

    /// Orders two handles by the identity of the objects they reference.
    ///
    /// Two handles holding the same raw pointer compare equal without
    /// performing a query. The null handle orders before every object.
    ///
    /// # Errors
    ///
    /// Forwards errors of the identity queries.
    pub fn compare_identity<K: IdentityKey + ?Sized>(&self, other: &K) -> Result<Ordering> {
        if self.same_pointer(other) {
            return Ok(Ordering::Equal);
        }

        let lhs = self.identity_address()?;
        let rhs = other.identity_address()?;
        Ok(lhs.cmp(&rhs))
    }

    /// Checks whether both handles reference the same object.
    pub fn same_object<K: IdentityKey + ?Sized>(&self, other: &K) -> Result<bool> {
        self.compare_identity(other).map(Ordering::is_eq)
    }

    /// Checks whether the handles reference different objects.
    pub fn different_object<K: IdentityKey + ?Sized>(&self, other: &K) -> Result<bool> {
        self.compare_identity(other).map(Ordering::is_ne)
    }

    /// Identity ordering `self < other`.
    pub fn identity_lt<K: IdentityKey + ?Sized>(&self, other: &K) -> Result<bool> {
        self.compare_identity(other).map(Ordering::is_lt)
    }

    /// Identity ordering `self <= other`.
    pub fn identity_le<K: IdentityKey + ?Sized>(&self, other: &K) -> Result<bool> {
        self.compare_identity(other).map(Ordering::is_le)
    }

    /// Identity ordering `self > other`.
    pub fn identity_gt<K: IdentityKey + ?Sized>(&self, other: &K) -> Result<bool> {
        self.compare_identity(other).map(Ordering::is_gt)
    }

    /// Identity ordering `self >= other`.
    pub fn identity_ge<K: IdentityKey + ?Sized>(&self, other: &K) -> Result<bool> {
        self.compare_identity(other).map(Ordering::is_ge)
    }

    /// Compares the handle with an integer literal.
    ///
    /// Fails with [`ErrorKind::NullPointerAccess`] if `literal` is not `0`.
    pub fn is_null_literal(&self, literal: i64) -> Result<bool> {
        Null::try_from(literal).map(|null| *self == null)
    }
}

impl Handle<dyn IUnknown> {
    /// Constructs an identity capability handle from an identity handle.
    ///
    /// Takes a new reference without performing a query.
    pub fn from_identity(identity: &IdentityHandle) -> Self {
        match identity.view() {
            Some(view) => {
                route::add_ref(view);
                Self::from_owned(Some(NonNull::from(view)))
            }
            None => Self::null(),
        }
    }
}

impl<C: Capability + ?Sized> IdentityKey for Handle<C> {
    #[inline]
    fn raw_address(&self) -> Option<NonNull<()>> {
        self.ptr.map(NonNull::cast)
    }

    fn identity_address(&self) -> Result<Option<NonNull<()>>> {
        self.view().map(route::identity).transpose()
    }
}

impl<C: Capability + ?Sized> Clone for Handle<C> {
    fn clone(&self) -> Self {
        if let Some(view) = self.view() {
            route::add_ref(view);
        }
        Self::from_owned(self.ptr)
    }

    fn clone_from(&mut self, source: &Self) {
        self.assign(source);
    }
}

impl<C: Capability + ?Sized> Drop for Handle<C> {
    fn drop(&mut self) {
        if let Some(ptr) = self.ptr.take() {
            // Safety: the handle owns the reference.
            unsafe { route::release(ptr) };
        }
    }
}

impl<C: Capability + ?Sized> Default for Handle<C> {
    #[inline]
    fn default() -> Self {
        Self::null()
    }
}

impl<C: Capability + ?Sized> From<Null> for Handle<C> {
    #[inline]
    fn from(_: Null) -> Self {
        Self::null()
    }
}

impl<C: Capability + ?Sized> From<Attach<C>> for Handle<C> {
    #[inline]
    fn from(attach: Attach<C>) -> Self {
        Self::attach(attach)
    }
}

impl<C, S> From<FallibleCastRequest<'_, S>> for Handle<C>
where
    C: Capability + ?Sized,
    S: Capability + ?Sized,
{
    #[inline]
    fn from(request: FallibleCastRequest<'_, S>) -> Self {
        Self::from_cast(request)
    }
}

impl From<&IdentityHandle> for Handle<dyn IUnknown> {
    #[inline]
    fn from(identity: &IdentityHandle) -> Self {
        Self::from_identity(identity)
    }
}

impl<C: Capability + ?Sized> PartialEq<Null> for Handle<C> {
    #[inline]
    fn eq(&self, _: &Null) -> bool {
        self.is_null()
    }
}

impl<C: Capability + ?Sized> PartialEq<Handle<C>> for Null {
    #[inline]
    fn eq(&self, other: &Handle<C>) -> bool {
        other.is_null()
    }
}

impl<C: Capability + ?Sized> Debug for Handle<C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("capability", &C::NAME)
            .field("ptr", &self.raw_address())
            .finish()
    }
}

impl<C: Capability + ?Sized> Pointer for Handle<C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let ptr = self
            .raw_address()
            .map_or(std::ptr::null(), |ptr| ptr.as_ptr().cast_const());
        Pointer::fmt(&ptr, f)
    }
}
