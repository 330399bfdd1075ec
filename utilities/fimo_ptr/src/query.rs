//! Capability queries.
use crate::capability::{Capability, CapabilityId};
use crate::error::{ErrorKind, Result};
use crate::route;
use std::any::Any;
use std::fmt::{Debug, Formatter};
use std::ptr::NonNull;

/// A pending request for a capability.
///
/// The query is handed to [`IUnknown::query_capability`](crate::IUnknown::query_capability),
/// where the object answers it by providing a view of the requested capability.
/// The answer is stored into a slot typed with the requested capability, so an
/// object can never answer with a view of an unrelated type.
pub struct Query<'a> {
    id: CapabilityId,
    name: &'static str,
    answered: bool,
    slot: &'a mut dyn Any,
}

impl<'a> Query<'a> {
    /// Constructs a new query for the capability `C`, answered into `slot`.
    ///
    /// A slot that already contains a value is treated as answered.
    pub fn new<C: Capability + ?Sized>(slot: &'a mut Option<NonNull<C>>) -> Self {
        Self {
            id: C::ID,
            name: C::NAME,
            answered: slot.is_some(),
            slot,
        }
    }

    /// Id of the requested capability.
    pub fn id(&self) -> CapabilityId {
        self.id
    }

    /// Name of the requested capability.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Checks whether the query requests the capability `C`.
    pub fn is<C: Capability + ?Sized>(&self) -> bool {
        self.id == C::ID
    }

    /// Checks whether the query has been answered.
    pub fn is_answered(&self) -> bool {
        self.answered
    }

    /// Answers the query with a view of the capability `C`.
    ///
    /// On success the reference count of the object is increased on behalf
    /// of the querying party. Returns `false` if the query was already answered
    /// or if it requests another capability.
    pub fn provide<C: Capability + ?Sized>(&mut self, view: &C) -> bool {
        if self.answered || !self.is::<C>() {
            return false;
        }

        let Some(slot) = self.slot.downcast_mut::<Option<NonNull<C>>>() else {
            log::warn!(
                "capability `{}` shares its id with `{}`, refusing to answer",
                C::NAME,
                self.name
            );
            return false;
        };

        route::add_ref(view);
        *slot = Some(NonNull::from(view));
        self.answered = true;
        true
    }

    /// Finishes the query.
    ///
    /// Returns an error with the kind [`ErrorKind::MissingCapability`] if the
    /// query was not answered.
    pub fn finish(&self) -> Result<()> {
        if self.answered {
            Ok(())
        } else {
            Err(ErrorKind::MissingCapability.into())
        }
    }
}

impl Debug for Query<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("answered", &self.answered)
            .finish_non_exhaustive()
    }
}
