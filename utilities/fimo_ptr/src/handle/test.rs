use crate::error::ErrorKind;
use crate::object::{Coclass, SimpleObject};
use crate::query::Query;
use crate::{
    auto_attach, capability, new_id, request_cast, request_checked_cast, CapabilityId, Handle,
    IUnknown, Null,
};
use std::cmp::Ordering;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

capability! {
    #![uuid(0x3b8f61d4, 0x0e27, 0x4c59, 0xa1f3, 0x9d6b2e8c7a05)]
    pub capability IValue where Send, Sync {
        fn value(&self) -> usize;
    }
}

capability! {
    #![uuid(0x8e4c2a90, 0x7d13, 0x4b6f, 0xbf25, 0x0a9e3c5d1b72)]
    pub capability IMissing {
        fn missing(&self);
    }
}

struct Value(AtomicUsize);

impl Value {
    fn new(value: usize) -> Self {
        Self(AtomicUsize::new(value))
    }
}

impl Coclass for Value {
    const CLASS_ID: CapabilityId = new_id(0xd2a5f3c7, 0x4b81, 0x4e0a, 0x96d2, 0x1f7c8b3e5a40);
    const NAME: &'static str = "Value";

    fn provide(object: &SimpleObject<Self>, query: &mut Query<'_>) {
        query.provide::<dyn IValue>(object);
    }
}

impl IValue for SimpleObject<Value> {
    fn value(&self) -> usize {
        self.0.load(AtomicOrdering::Relaxed)
    }
}

fn value_handle(value: usize) -> Handle<dyn IValue> {
    let object = SimpleObject::create(Value::new(value));
    Handle::from_cast(request_cast(&object))
}

fn ref_count(handle: &Handle<dyn IValue>) -> u32 {
    let object = Handle::<SimpleObject<Value>>::from_cast(request_cast(handle));
    // Safety: `object` keeps the object alive.
    let count = unsafe { object.as_ptr().unwrap().as_ref() }.ref_count();
    count - 1
}

#[test]
fn null_handle() {
    let handle = Handle::<dyn IValue>::null();
    assert!(handle.is_null());
    assert!(!handle.is_some());
    assert!(handle == Null);
    assert!(Null == handle);
    assert_eq!(
        handle.get().map(|_| ()).unwrap_err().kind(),
        ErrorKind::NullPointerAccess
    );
    assert!(Handle::<dyn IValue>::default().is_null());
}

#[test]
fn clone_is_independent() {
    let a = value_handle(1);
    assert_eq!(ref_count(&a), 1);

    let b = a.clone();
    assert!(a.same_pointer(&b));
    assert_eq!(ref_count(&a), 2);

    drop(b);
    assert!(a.is_some());
    assert_eq!(ref_count(&a), 1);
    assert_eq!(a.get().unwrap().value(), 1);
}

#[test]
fn assign_releases_previous() {
    let mut a = value_handle(1);
    let b = value_handle(2);
    let keep = a.clone();

    a.assign(&b);
    assert_eq!(a.get().unwrap().value(), 2);
    assert_eq!(ref_count(&keep), 1);
    assert_eq!(ref_count(&b), 2);

    a.clone_from(&keep);
    assert_eq!(ref_count(&b), 1);
    assert_eq!(ref_count(&keep), 2);
}

#[test]
fn swap_exchanges() {
    let mut a = value_handle(1);
    let mut b = value_handle(2);
    a.swap(&mut b);
    assert_eq!(a.get().unwrap().value(), 2);
    assert_eq!(b.get().unwrap().value(), 1);
    assert_eq!(ref_count(&a), 1);
    assert_eq!(ref_count(&b), 1);
}

#[test]
fn detach_attach_round_trip() {
    let mut a = value_handle(7);
    let other = a.clone();
    let raw = a.detach();
    assert!(a.is_null());
    assert_eq!(ref_count(&other), 2);

    // Safety: `raw` owns the reference detached from `a`.
    let b = Handle::attach(unsafe { auto_attach(raw.unwrap().as_ptr()) });
    assert_eq!(ref_count(&other), 2);
    assert!(b.same_pointer(&other));
    assert_eq!(b.get().unwrap().value(), 7);
}

#[test]
fn reset_and_literals() {
    let mut a = value_handle(3);
    assert_eq!(a.is_null_literal(0).ok(), Some(false));
    assert_eq!(
        a.is_null_literal(1).unwrap_err().kind(),
        ErrorKind::NullPointerAccess
    );

    assert_eq!(
        a.try_assign_literal(5).unwrap_err().kind(),
        ErrorKind::NullPointerAccess
    );
    assert!(a.is_some());

    a.try_assign_literal(0).unwrap();
    assert!(a.is_null());
    assert_eq!(a.is_null_literal(0).ok(), Some(true));

    let b = Handle::<dyn IValue>::try_from_literal(0).unwrap();
    assert!(b.is_null());
    assert!(Handle::<dyn IValue>::try_from_literal(-1).is_err());
}

#[test]
fn casts() {
    let a = value_handle(4);
    let missing = a.cast::<dyn IMissing>();
    assert!(missing.is_null());
    assert_eq!(
        a.try_cast::<dyn IMissing>().unwrap_err().kind(),
        ErrorKind::MissingCapability
    );
    assert_eq!(ref_count(&a), 1);

    let mut target = value_handle(5);
    let err = target
        .try_assign_checked(request_checked_cast(&missing))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NullPointerAccess);
    assert_eq!(target.get().unwrap().value(), 5);

    target.assign_cast(request_cast(&missing));
    assert!(target.is_null());
}

#[test]
fn upcast_to_identity() {
    let a = value_handle(6);
    let unknown: Handle<dyn IUnknown> = a.upcast();
    assert!(unknown.same_pointer(&a));
    assert_eq!(ref_count(&a), 2);

    let mut other = Handle::<dyn IUnknown>::null();
    other.assign_upcast(&a);
    assert_eq!(ref_count(&a), 3);
}

#[test]
fn identity_ordering() {
    let a = value_handle(1);
    let b = value_handle(2);
    let null = Handle::<dyn IValue>::null();

    assert_eq!(a.compare_identity(&a).ok(), Some(Ordering::Equal));
    assert_eq!(a.same_object(&b).ok(), Some(false));
    assert_eq!(
        a.compare_identity(&b).ok(),
        b.compare_identity(&a).ok().map(Ordering::reverse)
    );
    assert_eq!(null.compare_identity(&a).ok(), Some(Ordering::Less));
    assert_eq!(a.identity_gt(&null).ok(), Some(true));
    assert_eq!(null.same_object(&null).ok(), Some(true));
}

#[test]
fn out_slot_releases_first() {
    let keep = value_handle(1);
    let mut a = keep.clone();
    assert_eq!(ref_count(&keep), 2);

    // Safety: the slot is left null.
    let slot = unsafe { a.out() };
    assert!(slot.is_none());
    assert_eq!(ref_count(&keep), 1);
}

#[test]
fn thread_safe_capability() {
    static_assertions::assert_impl_all!(Handle<dyn IValue>: Send, Sync);
    static_assertions::assert_not_impl_any!(Handle<dyn IMissing>: Send, Sync);

    let a = value_handle(9);
    let b = a.clone();
    let value = std::thread::spawn(move || b.get().unwrap().value())
        .join()
        .unwrap();
    assert_eq!(value, 9);
    assert_eq!(ref_count(&a), 1);
}
