//! Tagged automation values.
//!
//! A [`Variant`] can be used as the source of a cast request. Only the
//! reference carrying tags yield an object, see [`request_cast`](crate::request_cast)
//! and [`request_checked_cast`](crate::request_checked_cast) for the behavior
//! on the remaining tags.
use crate::capability::IUnknown;
use crate::error::{Error, ErrorKind, Result};
use crate::handle::Handle;
use crate::route;

crate::capability! {
    /// Late bound automation capability carried by dispatch variants.
    #![uuid(0x00020400, 0x0000, 0x0000, 0xc000, 0x000000000046)]
    pub capability IDispatch {
        /// Number of type descriptions provided by the object, either `0` or `1`.
        fn type_info_count(&self) -> u32;
    }
}

/// Type tag of a [`Variant`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VariantType {
    /// No value.
    Empty,
    /// SQL style null.
    Null,
    /// 32-bit signed integer.
    I4,
    /// 64-bit float.
    R8,
    /// Boolean.
    Bool,
    /// String.
    Bstr,
    /// Owned identity capability.
    Unknown,
    /// Owned dispatch capability.
    Dispatch,
    /// Reference to an identity capability.
    UnknownRef,
    /// Reference to a dispatch capability.
    DispatchRef,
}

/// A tagged automation value.
#[derive(Clone, Debug, Default)]
pub enum Variant<'a> {
    /// No value.
    #[default]
    Empty,
    /// SQL style null.
    Null,
    /// 32-bit signed integer.
    I4(i32),
    /// 64-bit float.
    R8(f64),
    /// Boolean.
    Bool(bool),
    /// String.
    Bstr(String),
    /// Owned identity capability.
    Unknown(Handle<dyn IUnknown>),
    /// Owned dispatch capability.
    Dispatch(Handle<dyn IDispatch>),
    /// Reference to an identity capability.
    UnknownRef(&'a Handle<dyn IUnknown>),
    /// Reference to a dispatch capability.
    DispatchRef(&'a Handle<dyn IDispatch>),
}

impl Variant<'_> {
    /// Returns the type tag of the value.
    pub fn vt(&self) -> VariantType {
        match self {
            Variant::Empty => VariantType::Empty,
            Variant::Null => VariantType::Null,
            Variant::I4(_) => VariantType::I4,
            Variant::R8(_) => VariantType::R8,
            Variant::Bool(_) => VariantType::Bool,
            Variant::Bstr(_) => VariantType::Bstr,
            Variant::Unknown(_) => VariantType::Unknown,
            Variant::Dispatch(_) => VariantType::Dispatch,
            Variant::UnknownRef(_) => VariantType::UnknownRef,
            Variant::DispatchRef(_) => VariantType::DispatchRef,
        }
    }

    /// Checks whether the tag carries a capability reference.
    pub fn is_reference(&self) -> bool {
        matches!(
            self.vt(),
            VariantType::Unknown
                | VariantType::Dispatch
                | VariantType::UnknownRef
                | VariantType::DispatchRef
        )
    }

    /// Returns the `IUnknown` carried by a reference tag.
    ///
    /// Yields `None` for tags without a reference and for null handles.
    pub(crate) fn reference(&self) -> Option<&(dyn IUnknown + 'static)> {
        match self {
            Variant::Unknown(handle) => handle.view().map(route::unknown),
            Variant::UnknownRef(handle) => handle.view().map(route::unknown),
            Variant::Dispatch(handle) => handle.view().map(route::unknown),
            Variant::DispatchRef(handle) => handle.view().map(route::unknown),
            _ => None,
        }
    }

    /// Returns the `IUnknown` carried by the value.
    ///
    /// Empty and null values yield `Ok(None)`, while any other tag without a
    /// reference is rejected with [`ErrorKind::InvalidArgument`].
    pub(crate) fn try_reference(&self) -> Result<Option<&(dyn IUnknown + 'static)>> {
        if self.is_reference() {
            return Ok(self.reference());
        }

        match self.vt() {
            VariantType::Empty | VariantType::Null => Ok(None),
            vt => Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("variants of type `{vt:?}` carry no capability"),
            )),
        }
    }
}

impl From<Handle<dyn IUnknown>> for Variant<'_> {
    fn from(handle: Handle<dyn IUnknown>) -> Self {
        Variant::Unknown(handle)
    }
}

impl From<Handle<dyn IDispatch>> for Variant<'_> {
    fn from(handle: Handle<dyn IDispatch>) -> Self {
        Variant::Dispatch(handle)
    }
}

impl<'a> From<&'a Handle<dyn IUnknown>> for Variant<'a> {
    fn from(handle: &'a Handle<dyn IUnknown>) -> Self {
        Variant::UnknownRef(handle)
    }
}

impl<'a> From<&'a Handle<dyn IDispatch>> for Variant<'a> {
    fn from(handle: &'a Handle<dyn IDispatch>) -> Self {
        Variant::DispatchRef(handle)
    }
}

impl From<i32> for Variant<'_> {
    fn from(value: i32) -> Self {
        Variant::I4(value)
    }
}

impl From<f64> for Variant<'_> {
    fn from(value: f64) -> Self {
        Variant::R8(value)
    }
}

impl From<bool> for Variant<'_> {
    fn from(value: bool) -> Self {
        Variant::Bool(value)
    }
}

impl From<String> for Variant<'_> {
    fn from(value: String) -> Self {
        Variant::Bstr(value)
    }
}

impl From<&str> for Variant<'_> {
    fn from(value: &str) -> Self {
        Variant::Bstr(value.to_owned())
    }
}
