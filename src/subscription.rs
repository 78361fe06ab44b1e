//! Change notification types.
//!
//! Subscribers are plain callbacks held by a [`CacheEntry`](crate::CacheEntry).
//! Identity is the callback allocation: subscribing the same `Rc` twice
//! registers it twice, and unsubscribing removes the first registration.

use crate::entity::CacheEntity;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

/// What kind of mutation produced a notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    /// Confirmed update (`update`): version and age moved.
    Confirmed,
    /// Provisional local change (`update_optimistic`).
    Optimistic,
    /// Optimistic change rolled back (`revert_optimistic`).
    Reverted,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Confirmed => write!(f, "Confirmed"),
            ChangeKind::Optimistic => write!(f, "Optimistic"),
            ChangeKind::Reverted => write!(f, "Reverted"),
        }
    }
}

/// A single change notification.
///
/// `changed` is false only for a confirmed update whose data is deep-equal to
/// the previous value; optimistic and revert notifications are only emitted
/// when the value actually differs.
#[derive(Debug)]
pub struct Change<'a, E> {
    pub kind: ChangeKind,
    pub changed: bool,
    pub old: Option<&'a E>,
    pub new: Option<&'a E>,
}

/// Change-notification callback.
pub type Subscriber<E> = Rc<dyn Fn(&Change<'_, E>)>;

/// Wrap a closure as a [`Subscriber`].
pub fn subscriber<E, F>(f: F) -> Subscriber<E>
where
    F: Fn(&Change<'_, E>) + 'static,
{
    Rc::new(f)
}

pub(crate) fn same_subscriber<E>(a: &Subscriber<E>, b: &Subscriber<E>) -> bool {
    // Compare data pointers only; vtable pointers are not unique per type.
    std::ptr::eq(
        Rc::as_ptr(a) as *const (),
        Rc::as_ptr(b) as *const (),
    )
}

/// Ordered subscriber list shared between an entry and its unsubscribe handles.
pub(crate) type SubscriberList<E> = RefCell<Vec<Subscriber<E>>>;

/// Handle returned by `CacheEntry::subscribe`.
///
/// Calling [`unsubscribe`](Subscription::unsubscribe) removes exactly the
/// registration that produced this handle. Further calls are no-ops, even if
/// the same callback was subscribed more than once.
pub struct Subscription<E: CacheEntity> {
    subscribers: Weak<SubscriberList<E>>,
    callback: Subscriber<E>,
    active: Cell<bool>,
}

impl<E: CacheEntity> Subscription<E> {
    pub(crate) fn new(subscribers: Weak<SubscriberList<E>>, callback: Subscriber<E>) -> Self {
        Subscription {
            subscribers,
            callback,
            active: Cell::new(true),
        }
    }

    /// Remove the callback from the entry.
    pub fn unsubscribe(&self) {
        if !self.active.replace(false) {
            return;
        }
        if let Some(list) = self.subscribers.upgrade() {
            let mut list = list.borrow_mut();
            if let Some(pos) = list.iter().position(|s| same_subscriber(s, &self.callback)) {
                list.remove(pos);
            }
        }
    }

    /// Whether `unsubscribe` has not been called yet.
    pub fn is_active(&self) -> bool {
        self.active.get()
    }
}

impl<E: CacheEntity> fmt::Debug for Subscription<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.active.get())
            .finish()
    }
}
