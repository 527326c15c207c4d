// src/common/arbiter.rs

use portable_atomic::{AtomicU8, Ordering};

/// Who currently holds the shared byte-stream transport.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TransportOwner {
    Unowned,
    Particulate,
    Peer,
}

/// A party that may request the shared transport.
///
/// Kept separate from [`TransportOwner`] so that nobody can "acquire" on
/// behalf of `Unowned`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TransportUser {
    /// The particulate frame link.
    Particulate,
    /// The secondary peripheral on the same transport (e.g. a positioning receiver).
    Peer,
}

impl TransportUser {
    #[inline]
    const fn as_owner(self) -> TransportOwner {
        match self {
            TransportUser::Particulate => TransportOwner::Particulate,
            TransportUser::Peer => TransportOwner::Peer,
        }
    }
}

impl TransportOwner {
    #[inline]
    const fn to_raw(self) -> u8 {
        match self {
            TransportOwner::Unowned => 0,
            TransportOwner::Particulate => 1,
            TransportOwner::Peer => 2,
        }
    }

    #[inline]
    const fn from_raw(raw: u8) -> Self {
        match raw {
            1 => TransportOwner::Particulate,
            2 => TransportOwner::Peer,
            _ => TransportOwner::Unowned,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum ArbiterError {
    /// The request conflicts with the current owner.
    #[error("transport busy (owner: {owner:?})")]
    Busy { owner: TransportOwner },
}

/// Non-blocking single-owner token over a shared transport.
///
/// Both operations are a single compare-and-set: a denied request returns
/// immediately and must be retried by the caller on a later poll. There is no
/// queueing, priority or preemption. The token is `Sync` and can live in a
/// `static` shared by both transport users.
#[derive(Debug)]
pub struct TransportArbiter {
    owner: AtomicU8,
}

impl TransportArbiter {
    pub const fn new() -> Self {
        TransportArbiter {
            owner: AtomicU8::new(TransportOwner::Unowned.to_raw()),
        }
    }

    /// Takes the transport if nobody holds it.
    pub fn acquire(&self, requester: TransportUser) -> Result<(), ArbiterError> {
        self.owner
            .compare_exchange(
                TransportOwner::Unowned.to_raw(),
                requester.as_owner().to_raw(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(|current| ArbiterError::Busy {
                owner: TransportOwner::from_raw(current),
            })
    }

    /// Gives the transport back. Fails unless `requester` is the current owner.
    pub fn release(&self, requester: TransportUser) -> Result<(), ArbiterError> {
        self.owner
            .compare_exchange(
                requester.as_owner().to_raw(),
                TransportOwner::Unowned.to_raw(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(|current| ArbiterError::Busy {
                owner: TransportOwner::from_raw(current),
            })
    }

    #[inline]
    pub fn owner(&self) -> TransportOwner {
        TransportOwner::from_raw(self.owner.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_held_by(&self, user: TransportUser) -> bool {
        self.owner() == user.as_owner()
    }
}

impl Default for TransportArbiter {
    fn default() -> Self {
        Self::new()
    }
}
