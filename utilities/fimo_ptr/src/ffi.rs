//! Raw pointer boundary.
//!
//! Handles cross into foreign code as plain pointers. An owned reference is
//! transferred with [`FFITransferable`] or adopted with [`Attach`], while a
//! borrowed pointer is wrapped into a [`Borrowed`] view.
use crate::capability::{Capability, IUnknown};
use crate::handle::Handle;
use crate::identity::IdentityHandle;
use crate::route;
use std::fmt::{Debug, Formatter, Pointer};
use std::marker::PhantomData;
use std::ptr::NonNull;

/// Used to transfer ownership to and from a ffi interface.
///
/// The ownership of a type is transferred by calling [`Self::into_ffi`] and
/// is reacquired by calling [`Self::from_ffi`].
pub trait FFITransferable<FfiType: Sized> {
    /// Transfers the ownership from a Rust type to a ffi type.
    fn into_ffi(self) -> FfiType;

    /// Assumes ownership of a ffi type.
    ///
    /// # Safety
    ///
    /// The caller must ensure to have the ownership of the ffi type.
    unsafe fn from_ffi(ffi: FfiType) -> Self;
}

/// Used to share ownership with and from a ffi interface.
///
/// The ownership of a type is shared by calling [`Self::share_to_ffi`] and
/// is borrowed by calling [`Self::borrow_from_ffi`].
pub trait FFISharable<FfiType: Sized> {
    /// Borrowed view of the ffi type.
    type BorrowedView<'a>: 'a;

    /// Shares the value of a Rust type with a ffi type.
    fn share_to_ffi(&self) -> FfiType;

    /// Borrows the ownership of a ffi type.
    ///
    /// # Safety
    ///
    /// The caller must ensure that all invariants of the type are conserved.
    unsafe fn borrow_from_ffi<'a>(ffi: FfiType) -> Self::BorrowedView<'a>;
}

/// A reference to be adopted by a handle.
///
/// Wraps a pointer which already owns a reference, so that the handle
/// constructed from it does not increase the reference count.
#[must_use = "dropping an `Attach` leaks the reference"]
pub struct Attach<C: ?Sized> {
    ptr: Option<NonNull<C>>,
}

/// Marks `ptr` for adoption by a handle.
///
/// # Safety
///
/// `ptr` must either be null or own a reference to a live object, which is
/// transferred to the handle constructed from the returned value.
///
/// # Examples
///
/// ```
/// use fimo_ptr::object::{Coclass, SimpleObject};
/// use fimo_ptr::{auto_attach, new_id, CapabilityId, Handle};
///
/// struct Counter;
///
/// impl Coclass for Counter {
///     const CLASS_ID: CapabilityId = new_id(0x41b7ad0e, 0x5d9c, 0x4d09, 0x8c0b, 0x3c9fd5c7ab6e);
///     const NAME: &'static str = "Counter";
/// }
///
/// let mut object = SimpleObject::create(Counter);
/// let raw = object.detach();
///
/// // Safety: `raw` owns the reference detached from `object`.
/// let object = Handle::attach(unsafe { auto_attach(raw.unwrap().as_ptr()) });
/// assert!(object.is_some());
/// ```
#[inline]
pub unsafe fn auto_attach<C: Capability + ?Sized>(ptr: *const C) -> Attach<C> {
    Attach {
        ptr: NonNull::new(ptr.cast_mut()),
    }
}

impl<C: Capability + ?Sized> Attach<C> {
    /// Checks whether the pointer is null.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.ptr.is_none()
    }

    #[inline]
    pub(crate) fn into_raw(self) -> Option<NonNull<C>> {
        self.ptr
    }
}

impl<C: Capability + ?Sized> Debug for Attach<C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Attach")
            .field(&self.ptr.map(NonNull::cast::<()>))
            .finish()
    }
}

/// A borrowed capability pointer.
///
/// Does not own a reference. The lifetime `'a` bounds the time during which
/// the lender keeps the object alive.
pub struct Borrowed<'a, C: ?Sized> {
    ptr: Option<NonNull<C>>,
    _phantom: PhantomData<&'a C>,
}

impl<'a, C: Capability + ?Sized> Borrowed<'a, C> {
    /// Constructs a null pointer.
    #[inline]
    pub const fn null() -> Self {
        Self {
            ptr: None,
            _phantom: PhantomData,
        }
    }

    /// Borrows a capability reference.
    #[inline]
    pub fn from_ref(view: &'a C) -> Self {
        Self {
            ptr: Some(NonNull::from(view)),
            _phantom: PhantomData,
        }
    }

    /// Wraps a raw pointer.
    ///
    /// # Safety
    ///
    /// `ptr` must either be null or point to an object which stays alive for
    /// the lifetime `'a`.
    #[inline]
    pub unsafe fn from_raw(ptr: *const C) -> Self {
        Self {
            ptr: NonNull::new(ptr.cast_mut()),
            _phantom: PhantomData,
        }
    }

    /// Returns the raw pointer.
    #[inline]
    pub fn as_ptr(&self) -> Option<NonNull<C>> {
        self.ptr
    }

    /// Checks whether the pointer is null.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.ptr.is_none()
    }

    /// Constructs a handle, taking a new reference.
    pub fn to_handle(&self) -> Handle<C> {
        match self.view() {
            Some(view) => {
                route::add_ref(view);
                let attach = Attach {
                    ptr: Some(NonNull::from(view)),
                };
                Handle::attach(attach)
            }
            None => Handle::null(),
        }
    }

    #[inline]
    pub(crate) fn view(&self) -> Option<&'a C> {
        // Safety: the lender keeps the object alive for `'a`.
        self.ptr.map(|ptr| unsafe { &*ptr.as_ptr() })
    }
}

impl<C: ?Sized> Copy for Borrowed<'_, C> {}

impl<C: ?Sized> Clone for Borrowed<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C: Capability + ?Sized> Debug for Borrowed<'_, C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Borrowed")
            .field("capability", &C::NAME)
            .field("ptr", &self.ptr.map(NonNull::cast::<()>))
            .finish()
    }
}

impl<C: ?Sized> Pointer for Borrowed<'_, C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let ptr = self
            .ptr
            .map_or(std::ptr::null(), |ptr| ptr.cast::<()>().as_ptr().cast_const());
        Pointer::fmt(&ptr, f)
    }
}

impl<C: Capability + ?Sized> FFITransferable<Option<NonNull<C>>> for Handle<C> {
    fn into_ffi(mut self) -> Option<NonNull<C>> {
        self.detach()
    }

    unsafe fn from_ffi(ffi: Option<NonNull<C>>) -> Self {
        Handle::attach(Attach { ptr: ffi })
    }
}

impl<C: Capability + ?Sized> FFISharable<Option<NonNull<C>>> for Handle<C> {
    type BorrowedView<'a> = Borrowed<'a, C>;

    fn share_to_ffi(&self) -> Option<NonNull<C>> {
        self.as_ptr()
    }

    unsafe fn borrow_from_ffi<'a>(ffi: Option<NonNull<C>>) -> Self::BorrowedView<'a> {
        Borrowed {
            ptr: ffi,
            _phantom: PhantomData,
        }
    }
}

impl FFITransferable<Option<NonNull<dyn IUnknown>>> for IdentityHandle {
    fn into_ffi(mut self) -> Option<NonNull<dyn IUnknown>> {
        self.detach()
    }

    unsafe fn from_ffi(ffi: Option<NonNull<dyn IUnknown>>) -> Self {
        IdentityHandle::attach(Attach { ptr: ffi })
    }
}

impl FFISharable<Option<NonNull<dyn IUnknown>>> for IdentityHandle {
    type BorrowedView<'a> = Borrowed<'a, dyn IUnknown>;

    fn share_to_ffi(&self) -> Option<NonNull<dyn IUnknown>> {
        self.as_ptr()
    }

    unsafe fn borrow_from_ffi<'a>(ffi: Option<NonNull<dyn IUnknown>>) -> Self::BorrowedView<'a> {
        Borrowed {
            ptr: ffi,
            _phantom: PhantomData,
        }
    }
}
