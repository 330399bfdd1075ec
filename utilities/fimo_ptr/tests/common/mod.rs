#![allow(dead_code)]

use fimo_ptr::query::Query;
use fimo_ptr::{
    auto_attach, capability, Destructor, Error, ErrorKind, Handle, IUnknown, Result,
};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

capability! {
    /// First capability of the probe.
    #![uuid(0x546aefac, 0x6ecc, 0x44bf, 0x8d17, 0x13834624d415)]
    pub capability IA {
        fn a(&self) -> u32;
    }
}

capability! {
    /// Second capability of the probe, derived from `IA`.
    #![uuid(0x0f5d7a3e, 0x91c4, 0x4b28, 0x8e6a, 0xd3b2c1f0e987)]
    pub capability IB: IA {
        fn b(&self) -> u32;
    }
}

capability! {
    /// Capability the probe never supports.
    #![uuid(0xa47c9e12, 0x5b3d, 0x4f80, 0xb6e1, 0x2c8d0f9a3b54)]
    pub capability IC {
        fn c(&self) -> u32;
    }
}

/// Observations of a probe, outliving the probe itself.
#[derive(Debug, Default)]
pub struct Counters {
    pub refs: AtomicU32,
    pub add_refs: AtomicUsize,
    pub releases: AtomicUsize,
    pub queries: AtomicUsize,
    pub destroyed: AtomicBool,
}

impl Counters {
    pub fn refs(&self) -> u32 {
        self.refs.load(Ordering::SeqCst)
    }

    pub fn add_refs(&self) -> usize {
        self.add_refs.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

/// An instrumented object supporting `IA`, `IB` and `IDispatch` but not `IC`.
pub struct Probe {
    this: NonNull<Probe>,
    counters: Arc<Counters>,
    failing: bool,
}

impl Probe {
    /// Allocates a probe without references.
    pub fn new_raw(failing: bool) -> (*const Probe, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let probe = Box::into_raw(Box::new(Probe {
            this: NonNull::dangling(),
            counters: counters.clone(),
            failing,
        }));

        // Safety: the allocation is not shared yet.
        unsafe { (*probe).this = NonNull::new_unchecked(probe) };
        (probe, counters)
    }

    /// Allocates a probe and adopts its first reference.
    pub fn create() -> (Handle<dyn IA>, Arc<Counters>) {
        Self::create_with(false)
    }

    /// Allocates a probe whose queries fail with a transport error.
    pub fn create_failing() -> (Handle<dyn IA>, Arc<Counters>) {
        Self::create_with(true)
    }

    fn create_with(failing: bool) -> (Handle<dyn IA>, Arc<Counters>) {
        let (probe, counters) = Self::new_raw(failing);
        counters.refs.store(1, Ordering::SeqCst);
        let probe: *const dyn IA = probe;
        // Safety: the probe carries one reference, which is adopted.
        let handle = Handle::attach(unsafe { auto_attach(probe) });
        (handle, counters)
    }
}

// Safety: the probe is freed only after its last reference is released.
unsafe impl IUnknown for Probe {
    fn add_ref(&self) -> u32 {
        self.counters.add_refs.fetch_add(1, Ordering::SeqCst);
        self.counters.refs.fetch_add(1, Ordering::SeqCst) + 1
    }

    unsafe fn release(&self) -> u32 {
        self.counters.releases.fetch_add(1, Ordering::SeqCst);
        self.counters.refs.fetch_sub(1, Ordering::SeqCst) - 1
    }

    fn destructor(&self) -> Destructor {
        // Safety: `this` was returned by `Box::into_raw`.
        unsafe { Destructor::boxed(self.this) }
    }

    fn query_capability(&self, query: &mut Query<'_>) -> Result<()> {
        self.counters.queries.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(Error::new(ErrorKind::QueryFailed, "transport closed"));
        }

        let _ = query.provide::<dyn IUnknown>(self)
            || query.provide::<dyn IA>(self)
            || query.provide::<dyn IB>(self);

        #[cfg(feature = "variant")]
        query.provide::<dyn fimo_ptr::variant::IDispatch>(self);

        query.finish()
    }
}

impl Drop for Probe {
    fn drop(&mut self) {
        self.counters.destroyed.store(true, Ordering::SeqCst);
    }
}

impl IA for Probe {
    fn a(&self) -> u32 {
        1
    }
}

impl IB for Probe {
    fn b(&self) -> u32 {
        2
    }
}

#[cfg(feature = "variant")]
impl fimo_ptr::variant::IDispatch for Probe {
    fn type_info_count(&self) -> u32 {
        0
    }
}
