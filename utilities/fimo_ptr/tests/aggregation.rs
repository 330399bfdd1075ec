mod common;

use common::{Counters, IA};
use fimo_ptr::query::Query;
use fimo_ptr::{
    auto_attach, new_id, request_cast, Capability, CapabilityId, CapabilityView, Destructor, Handle,
    IUnknown, IdentityHandle, OwningIdentity, Result, Route, ViaOwningIdentity,
};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// An object aggregating an [`Inner`] part.
#[repr(C)]
struct Outer {
    counters: Arc<Counters>,
    inner: Inner,
}

/// Part of an [`Outer`] object, with its own non delegating `IUnknown`.
struct Inner {
    outer: *const Outer,
    own_refs: AtomicUsize,
    value: u32,
}

impl Outer {
    fn create(value: u32) -> (Handle<dyn IA>, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        counters.refs.store(1, Ordering::SeqCst);
        let outer = Box::into_raw(Box::new(Outer {
            counters: counters.clone(),
            inner: Inner {
                outer: std::ptr::null(),
                own_refs: AtomicUsize::new(0),
                value,
            },
        }));

        // Safety: the allocation is not shared yet.
        unsafe { (*outer).inner.outer = outer };

        let outer: *const dyn IA = outer;
        // Safety: the outer object carries one reference, which is adopted.
        let handle = Handle::attach(unsafe { auto_attach(outer) });
        (handle, counters)
    }
}

// Safety: the outer object is freed only after its last reference is released.
unsafe impl IUnknown for Outer {
    fn add_ref(&self) -> u32 {
        self.counters.add_refs.fetch_add(1, Ordering::SeqCst);
        self.counters.refs.fetch_add(1, Ordering::SeqCst) + 1
    }

    unsafe fn release(&self) -> u32 {
        self.counters.releases.fetch_add(1, Ordering::SeqCst);
        self.counters.refs.fetch_sub(1, Ordering::SeqCst) - 1
    }

    fn destructor(&self) -> Destructor {
        let this = self.inner.outer.cast_mut();
        // Safety: `inner.outer` was returned by `Box::into_raw`, which never returns null.
        unsafe { Destructor::boxed(NonNull::new_unchecked(this)) }
    }

    fn query_capability(&self, query: &mut Query<'_>) -> Result<()> {
        self.counters.queries.fetch_add(1, Ordering::SeqCst);
        let _ = query.provide::<dyn IUnknown>(self)
            || query.provide::<dyn IA>(self)
            || query.provide::<Inner>(&self.inner);
        query.finish()
    }
}

impl Drop for Outer {
    fn drop(&mut self) {
        self.counters.destroyed.store(true, Ordering::SeqCst);
    }
}

impl IA for Outer {
    fn a(&self) -> u32 {
        self.inner.value
    }
}

// Safety: the inner part never frees itself, as it lives inside the outer object.
unsafe impl IUnknown for Inner {
    fn add_ref(&self) -> u32 {
        self.own_refs.fetch_add(1, Ordering::SeqCst) as u32 + 1
    }

    unsafe fn release(&self) -> u32 {
        self.own_refs.fetch_sub(1, Ordering::SeqCst) as u32 - 1
    }

    fn destructor(&self) -> Destructor {
        self.owning_identity().destructor()
    }

    fn query_capability(&self, query: &mut Query<'_>) -> Result<()> {
        self.owning_identity().query_capability(query)
    }
}

impl OwningIdentity for Inner {
    fn owning_identity(&self) -> &(dyn IUnknown + 'static) {
        // Safety: the inner part lives inside the outer object.
        unsafe { &*self.outer }
    }
}

// Safety: the id is unique to the inner part.
unsafe impl Capability for Inner {
    const ID: CapabilityId = new_id(0x61d0b8f2, 0x3c7e, 0x4a95, 0x8b14, 0xe2f9a6c3d708);
    const NAME: &'static str = "Inner";

    type Route = ViaOwningIdentity;
    type View<'a> = &'a Inner;

    fn as_unknown(&self) -> &(dyn IUnknown + 'static) {
        self
    }
}

impl<'a> CapabilityView<'a, Inner> for &'a Inner {
    fn from_capability(capability: &'a Inner) -> Self {
        capability
    }
}

fn own_refs(inner: &Handle<Inner>) -> usize {
    inner.get().unwrap().own_refs.load(Ordering::SeqCst)
}

#[test]
fn route_is_redirected() {
    assert!(<<Inner as Capability>::Route as Route<Inner>>::REDIRECTED);
    assert!(!<<dyn IA as Capability>::Route as Route<dyn IA>>::REDIRECTED);
}

#[test]
fn counts_routed_to_outer() {
    let (outer, counters) = Outer::create(11);
    let inner = Handle::<Inner>::from_cast(request_cast(&outer));
    assert!(inner.is_some());
    assert_eq!(counters.refs(), 2);
    assert_eq!(own_refs(&inner), 0);
    assert_eq!(inner.get().unwrap().value, 11);

    let copy = inner.clone();
    assert_eq!(counters.refs(), 3);
    assert_eq!(own_refs(&copy), 0);

    drop(outer);
    drop(copy);
    assert_eq!(counters.refs(), 1);
    assert!(!counters.destroyed());

    drop(inner);
    assert!(counters.destroyed());
}

#[test]
fn identity_of_aggregate() {
    let (outer, _counters) = Outer::create(3);
    let inner = Handle::<Inner>::from_cast(request_cast(&outer));
    assert!(!inner.same_pointer(&outer));
    assert_eq!(inner.same_object(&outer).ok(), Some(true));

    let identity = IdentityHandle::from_cast(request_cast(&inner));
    assert!(outer.same_pointer(&identity));

    let unknown: Handle<dyn IUnknown> = inner.upcast();
    assert!(unknown.same_pointer(&outer));
}

#[test]
fn queries_through_inner() {
    let (outer, counters) = Outer::create(5);
    let inner = Handle::<Inner>::from_cast(request_cast(&outer));
    let back = Handle::<dyn IA>::from_cast(request_cast(&inner));
    assert!(back.same_pointer(&outer));
    assert_eq!(back.get().unwrap().a(), 5);
    assert_eq!(counters.refs(), 3);
    assert_eq!(own_refs(&inner), 0);
}
