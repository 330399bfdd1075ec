//! Capability declarations.
//!
//! A capability is a trait object type (`dyn IFoo`) or a concrete object type
//! implementing [`Capability`]. Every capability is reachable through the
//! [`IUnknown`] protocol, which manages the lifetime of the underlying object
//! and answers capability queries.
use crate::error::Result;
use crate::query::Query;
use crate::route::{self, Route};
use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;
use std::ptr::NonNull;

pub use uuid::Uuid;

/// Unique id of a capability.
pub type CapabilityId = Uuid;

/// Constructs a new [`CapabilityId`] from its fields.
pub const fn new_id(d1: u32, d2: u16, d3: u16, d4: u16, d5: u64) -> CapabilityId {
    let d4 = ((d4 as u64) << 48) | (d5 & 0xffff_ffff_ffff);
    CapabilityId::from_fields(d1, d2, d3, &d4.to_be_bytes())
}

/// Lifetime and discovery protocol shared by every capability object.
///
/// # Safety
///
/// Implementors must guarantee that:
///
/// - the object stays alive until its [`Destructor`] runs,
/// - the destructor returned by [`IUnknown::destructor`] frees the object
///   through a pointer carrying the provenance of its allocation,
/// - every view stored into a [`Query`] refers to the same object,
/// - a query for `dyn IUnknown` always yields the same address, which
///   defines the identity of the object.
pub unsafe trait IUnknown {
    /// Increases the reference count and returns the new count.
    ///
    /// The count is informational only.
    fn add_ref(&self) -> u32;

    /// Decreases the reference count and returns the new count.
    ///
    /// The object must not free itself. Once the count reaches zero the
    /// caller runs the [`Destructor`] of the object, after `self` is no
    /// longer borrowed.
    ///
    /// # Safety
    ///
    /// The caller must own a reference to the object, which is consumed by
    /// the call. A caller observing a count of zero must run the destructor.
    unsafe fn release(&self) -> u32;

    /// Returns the destructor which frees the object.
    fn destructor(&self) -> Destructor;

    /// Queries the object for another capability.
    ///
    /// A supported capability is answered with [`Query::provide`], which takes a
    /// new reference on behalf of the caller. An unanswered query, or an error
    /// with the kind [`MissingCapability`](crate::ErrorKind::MissingCapability), signals
    /// that the capability is not supported. Any other error is treated as a
    /// failure of the query itself.
    fn query_capability(&self, query: &mut Query<'_>) -> Result<()>;
}

/// Frees an object whose last reference was released.
///
/// Holds the owning pointer of the allocation together with the function
/// dropping it, so that the object is never freed through a borrow of itself.
#[derive(Clone, Copy)]
pub struct Destructor {
    ptr: NonNull<()>,
    drop: unsafe fn(NonNull<()>),
}

impl Destructor {
    /// Constructs a new destructor from a type erased pointer and a drop function.
    ///
    /// # Safety
    ///
    /// Calling `drop` with `ptr` must be sound once the object has no
    /// references left.
    pub const unsafe fn new(ptr: NonNull<()>, drop: unsafe fn(NonNull<()>)) -> Self {
        Self { ptr, drop }
    }

    /// Destructor of an object allocated by a [`Box`].
    ///
    /// # Safety
    ///
    /// `ptr` must be the pointer returned by [`Box::into_raw`], or a copy of it.
    pub unsafe fn boxed<T>(ptr: NonNull<T>) -> Self {
        Self {
            ptr: ptr.cast(),
            drop: drop_boxed::<T>,
        }
    }

    /// Runs the destructor.
    ///
    /// # Safety
    ///
    /// The object must have no references left and must not be borrowed.
    pub unsafe fn destroy(self) {
        // Safety: forwarded to the caller.
        unsafe { (self.drop)(self.ptr) }
    }
}

impl Debug for Destructor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Destructor").field(&self.ptr).finish()
    }
}

unsafe fn drop_boxed<T>(ptr: NonNull<()>) {
    // Safety: the pointer originates from `Box::into_raw`.
    unsafe { drop(Box::from_raw(ptr.cast::<T>().as_ptr())) }
}

/// Descriptor of a capability type.
///
/// # Safety
///
/// [`Capability::ID`] must be unique to the capability type and
/// [`Capability::as_unknown`] must return a view of the same object.
pub unsafe trait Capability: IUnknown + 'static {
    /// Unique id of the capability.
    const ID: CapabilityId;

    /// Name of the capability.
    const NAME: &'static str;

    /// Selects the `IUnknown` implementation responsible for the lifetime
    /// of the object.
    type Route: Route<Self>;

    /// Restricted view returned when accessing a capability through a handle.
    type View<'a>: CapabilityView<'a, Self>
    where
        Self: 'a;

    /// Returns the `IUnknown` implemented by this view.
    fn as_unknown(&self) -> &(dyn IUnknown + 'static);
}

/// Construction of a restricted view from a capability reference.
pub trait CapabilityView<'a, C: ?Sized + 'a>: Sized {
    /// Constructs the view.
    fn from_capability(capability: &'a C) -> Self;
}

/// Statically known conversion between two capabilities of the same object.
///
/// Conversions must be declared explicitly and are not transitive.
///
/// # Safety
///
/// The returned reference must refer to the same object as `self`.
pub unsafe trait Upcast<C: Capability + ?Sized>: Capability {
    /// Casts the view to the capability `C`.
    fn upcast(&self) -> &C;
}

// Safety: the route always yields the owning `IUnknown` of the same object.
unsafe impl<C: Capability + ?Sized> Upcast<dyn IUnknown> for C {
    #[inline]
    fn upcast(&self) -> &(dyn IUnknown + 'static) {
        route::unknown(self)
    }
}

// Safety: the id is the well-known identity id.
unsafe impl Capability for dyn IUnknown {
    const ID: CapabilityId = new_id(0x00000000, 0x0000, 0x0000, 0xc000, 0x000000000046);
    const NAME: &'static str = "IUnknown";

    type Route = route::Direct;
    type View<'a> = UnknownView<'a>;

    #[inline]
    fn as_unknown(&self) -> &(dyn IUnknown + 'static) {
        self
    }
}

/// View of the identity capability.
///
/// Exposes no operations, as the identity capability only consists of
/// the lifetime management protocol.
#[derive(Clone, Copy)]
pub struct UnknownView<'a>(PhantomData<&'a dyn IUnknown>);

impl<'a> CapabilityView<'a, dyn IUnknown + 'static> for UnknownView<'a> {
    fn from_capability(_capability: &'a (dyn IUnknown + 'static)) -> Self {
        UnknownView(PhantomData)
    }
}

impl Debug for UnknownView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnknownView").finish_non_exhaustive()
    }
}

/// Declares a new capability.
///
/// The macro defines a trait with the [`IUnknown`] protocol as its supertrait,
/// implements [`Capability`] for the trait object, and implements [`Upcast`]
/// for every listed base capability. The base list must name every ancestor,
/// as upcasts are not transitive. Marker traits like `Send` and `Sync` follow
/// the `where` keyword.
///
/// The 'uuid' key holds the fields of the unique id of the capability. By
/// default a restricted view named `<Name>View` is generated, which forwards
/// exactly the declared methods. The optional 'view' key selects a hand-written
/// view type instead, which must take a single lifetime parameter and implement
/// [`CapabilityView`] for the `'static` trait object, i.e.
/// `CapabilityView<'a, dyn IFoo + 'static>`. No default view is generated in
/// that case.
///
/// # Example
///
/// ```
/// use fimo_ptr::capability;
///
/// capability! {
///     /// Something with a name.
///     #![uuid(0x9d1e0c5a, 0x24a4, 0x4f5e, 0x9a57, 0x1c0d3fb2a0b1)]
///     pub capability INamed {
///         /// Returns the name.
///         fn name(&self) -> String;
///     }
/// }
///
/// capability! {
///     /// A named thing that can be renamed.
///     #![uuid(0x6b3f3c1e, 0x2a55, 0x4c6f, 0x8d1c, 0x7e0f9d2c4b13)]
///     pub capability IRenamable: INamed where Send, Sync {
///         fn rename(&self, name: &str);
///     }
/// }
///
/// capability! {
///     /// A counter whose view only exposes reads.
///     #![uuid(0x2f7d9a14, 0x6c3b, 0x4e85, 0x91a0, 0x5b8e2d4c7f36)]
///     #![view(ReadOnlyCounter)]
///     pub capability ICounter {
///         fn get(&self) -> usize;
///         fn increment(&self);
///     }
/// }
///
/// pub struct ReadOnlyCounter<'a>(&'a (dyn ICounter + 'static));
///
/// impl<'a> fimo_ptr::CapabilityView<'a, dyn ICounter + 'static> for ReadOnlyCounter<'a> {
///     fn from_capability(capability: &'a (dyn ICounter + 'static)) -> Self {
///         Self(capability)
///     }
/// }
///
/// impl ReadOnlyCounter<'_> {
///     pub fn get(&self) -> usize {
///         self.0.get()
///     }
/// }
/// ```
#[macro_export]
macro_rules! capability {
    (
        $(#[$attr:meta])*
        #![uuid($d1:literal, $d2:literal, $d3:literal, $d4:literal, $d5:literal)]
        #![view($view:ident)]
        $vis:vis capability $name:ident $(: $($base:ident),+)? $(where $($marker:ident),+)? {
            $(
                $(#[$m_attr:meta])*
                fn $method:ident(&self $(, $arg:ident: $arg_ty:ty)* $(,)?) $(-> $ret:ty)?;
            )*
        }
    ) => {
        $crate::capability! {
            @core
            [$(#[$attr])*]
            [$vis]
            $name
            [$d1, $d2, $d3, $d4, $d5]
            $view
            [$($($base),+)?]
            [$($($marker),+)?]
            {
                $(
                    $(#[$m_attr])*
                    fn $method(&self $(, $arg: $arg_ty)*) $(-> $ret)?;
                )*
            }
        }
    };
    (
        $(#[$attr:meta])*
        #![uuid($d1:literal, $d2:literal, $d3:literal, $d4:literal, $d5:literal)]
        $vis:vis capability $name:ident $(: $($base:ident),+)? $(where $($marker:ident),+)? {
            $(
                $(#[$m_attr:meta])*
                fn $method:ident(&self $(, $arg:ident: $arg_ty:ty)* $(,)?) $(-> $ret:ty)?;
            )*
        }
    ) => {
        $crate::paste::paste! {
            $crate::capability! {
                @core
                [$(#[$attr])*]
                [$vis]
                $name
                [$d1, $d2, $d3, $d4, $d5]
                [<$name View>]
                [$($($base),+)?]
                [$($($marker),+)?]
                {
                    $(
                        $(#[$m_attr])*
                        fn $method(&self $(, $arg: $arg_ty)*) $(-> $ret)?;
                    )*
                }
            }

            $crate::capability! {
                @view
                [$vis]
                $name
                [<$name View>]
                {
                    $(
                        $(#[$m_attr])*
                        fn $method(&self $(, $arg: $arg_ty)*) $(-> $ret)?;
                    )*
                }
            }
        }
    };
    (
        @core
        [$($attr:tt)*]
        [$vis:vis]
        $name:ident
        [$d1:literal, $d2:literal, $d3:literal, $d4:literal, $d5:literal]
        $view:ident
        [$($base:ident),*]
        [$($marker:ident),*]
        { $($methods:tt)* }
    ) => {
        $($attr)*
        $vis trait $name: $crate::IUnknown $(+ $base)* $(+ $marker)* {
            $($methods)*
        }

        // Safety: the id is provided by the declaration and the view is `self`.
        unsafe impl $crate::Capability for dyn $name {
            const ID: $crate::CapabilityId = $crate::capability::new_id($d1, $d2, $d3, $d4, $d5);
            const NAME: &'static str = ::core::stringify!($name);

            type Route = $crate::route::Direct;
            type View<'a> = $view<'a>;

            #[inline]
            fn as_unknown(&self) -> &(dyn $crate::IUnknown + 'static) {
                self
            }
        }

        $(
            // Safety: a supertrait upcast keeps the data pointer.
            unsafe impl $crate::Upcast<dyn $base> for dyn $name {
                #[inline]
                fn upcast(&self) -> &(dyn $base + 'static) {
                    self
                }
            }
        )*
    };
    (
        @view
        [$vis:vis]
        $name:ident
        $view:ident
        {
            $(
                $(#[$m_attr:meta])*
                fn $method:ident(&self $(, $arg:ident: $arg_ty:ty)*) $(-> $ret:ty)?;
            )*
        }
    ) => {
        #[doc = ::core::concat!("Restricted view of the `", ::core::stringify!($name), "` capability.")]
        #[derive(Clone, Copy)]
        $vis struct $view<'a>(&'a (dyn $name + 'static));

        impl<'a> $crate::CapabilityView<'a, dyn $name + 'static> for $view<'a> {
            #[inline]
            fn from_capability(capability: &'a (dyn $name + 'static)) -> Self {
                Self(capability)
            }
        }

        #[allow(dead_code)]
        impl<'a> $view<'a> {
            $(
                $(#[$m_attr])*
                #[inline]
                pub fn $method(&self $(, $arg: $arg_ty)*) $(-> $ret)? {
                    <dyn $name as $name>::$method(self.0 $(, $arg)*)
                }
            )*

            /// Returns the restricted view of a base capability.
            pub fn base<B>(&self) -> <B as $crate::Capability>::View<'a>
            where
                B: $crate::Capability + ?Sized,
                dyn $name: $crate::Upcast<B>,
            {
                <<B as $crate::Capability>::View<'a> as $crate::CapabilityView<'a, B>>::from_capability(
                    <dyn $name as $crate::Upcast<B>>::upcast(self.0),
                )
            }
        }

        impl ::core::fmt::Debug for $view<'_> {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                let ptr: *const (dyn $name + 'static) = self.0;
                f.debug_tuple(::core::stringify!($view))
                    .field(&ptr.cast::<()>())
                    .finish()
            }
        }
    };
}
