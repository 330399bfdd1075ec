//! Heap allocated reference counted objects.
use crate::capability::{Capability, CapabilityId, CapabilityView, Destructor, IUnknown};
use crate::error::Result;
use crate::ffi::auto_attach;
use crate::handle::Handle;
use crate::query::Query;
use crate::route::Direct;
use std::fmt::{Debug, Formatter};
use std::ops::Deref;
use std::process::abort;
use std::ptr::NonNull;
use std::sync::atomic;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering::{Acquire, Relaxed, Release};

/// A soft limit on the amount of references that may be made to an object.
///
/// Going above this limit will abort your program.
const MAX_REFCOUNT: u32 = i32::MAX as u32;

macro_rules! acquire {
    ($x:expr) => {
        atomic::fence(Acquire)
    };
}

/// Description of a class of objects hosted in a [`SimpleObject`].
pub trait Coclass: Sized + 'static {
    /// Unique id of the class.
    const CLASS_ID: CapabilityId;

    /// Name of the class.
    const NAME: &'static str;

    /// Answers queries for capabilities implemented by the class.
    ///
    /// Called after the identity and class capabilities have been checked.
    /// The default implementation supports no further capabilities.
    fn provide(object: &SimpleObject<Self>, query: &mut Query<'_>) {
        let _ = (object, query);
    }
}

/// A heap allocated object with an atomic reference count.
///
/// The object answers queries for the identity capability, for its own class,
/// and for the capabilities provided by [`Coclass::provide`]. It is freed when
/// the last reference is released.
pub struct SimpleObject<T: Coclass> {
    this: NonNull<Self>,
    refs: AtomicU32,
    value: T,
}

// Safety: `this` is only used to free the object after the last release,
// which requires the value to be `Send` and `Sync` like an `Arc`.
unsafe impl<T: Coclass + Send + Sync> Send for SimpleObject<T> {}

// Safety: see above.
unsafe impl<T: Coclass + Send + Sync> Sync for SimpleObject<T> {}

impl<T: Coclass> SimpleObject<T> {
    /// Allocates a new object with a reference count of `0`.
    ///
    /// The object is leaked unless it is adopted with
    /// [`Handle::from_raw`], which takes the first reference.
    pub fn new_raw(value: T) -> NonNull<Self> {
        Self::allocate(value, 0)
    }

    /// Allocates a new object and returns a handle owning the only reference.
    pub fn create(value: T) -> Handle<Self> {
        let object = Self::allocate(value, 1);

        // Safety: the new object starts with one reference, which is adopted.
        Handle::attach(unsafe { auto_attach(object.as_ptr()) })
    }

    fn allocate(value: T, refs: u32) -> NonNull<Self> {
        let object = Box::into_raw(Box::new(Self {
            this: NonNull::dangling(),
            refs: AtomicU32::new(refs),
            value,
        }));

        // Safety: `Box::into_raw` never returns null.
        let this = unsafe { NonNull::new_unchecked(object) };

        // Safety: the allocation is not shared yet.
        unsafe { (*object).this = this };
        this
    }

    /// Returns the current reference count.
    ///
    /// The count is only a snapshot, as other threads may modify it concurrently.
    pub fn ref_count(&self) -> u32 {
        self.refs.load(Relaxed)
    }
}

impl<T: Coclass> Deref for SimpleObject<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.value
    }
}

// Safety: the object is freed only after the last reference is released,
// and every answered view refers to `self`.
unsafe impl<T: Coclass> IUnknown for SimpleObject<T> {
    fn add_ref(&self) -> u32 {
        let old = self.refs.fetch_add(1, Relaxed);

        // Guard against overflows caused by leaked handles.
        if old > MAX_REFCOUNT {
            abort();
        }

        old + 1
    }

    unsafe fn release(&self) -> u32 {
        let old = self.refs.fetch_sub(1, Release);
        debug_assert_ne!(old, 0, "released an object without references");
        if old != 1 {
            return old - 1;
        }

        // Synchronizes with the `Release` of the other decrements, so that all
        // uses of the object happen before it is freed.
        acquire!(self.refs);
        0
    }

    fn destructor(&self) -> Destructor {
        // Safety: `this` was returned by `Box::into_raw`.
        unsafe { Destructor::boxed(self.this) }
    }

    fn query_capability(&self, query: &mut Query<'_>) -> Result<()> {
        if !query.provide::<dyn IUnknown>(self) && !query.provide::<Self>(self) {
            T::provide(self, query);
        }
        query.finish()
    }
}

// Safety: the class id is unique by the contract of `Coclass`.
unsafe impl<T: Coclass> Capability for SimpleObject<T> {
    const ID: CapabilityId = T::CLASS_ID;
    const NAME: &'static str = T::NAME;

    type Route = Direct;
    type View<'a> = &'a T;

    #[inline]
    fn as_unknown(&self) -> &(dyn IUnknown + 'static) {
        self
    }
}

impl<'a, T: Coclass> CapabilityView<'a, SimpleObject<T>> for &'a T {
    #[inline]
    fn from_capability(capability: &'a SimpleObject<T>) -> Self {
        &capability.value
    }
}

impl<T: Coclass + Debug> Debug for SimpleObject<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleObject")
            .field("refs", &self.ref_count())
            .field("value", &self.value)
            .finish()
    }
}
