//! Process-local identifiers for cached operator templates and provider
//! submissions.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

macro_rules! sequence_id {
    ($(#[$meta:meta])* $name:ident => $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub const fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            pub const fn raw(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

sequence_id! {
    /// Identity of one cached template inside a registry.
    TemplateId => "tpl"
}

sequence_id! {
    /// Order in which a provider accepted a call.
    SubmissionId => "sub"
}

/// Hands out ids in increasing order, starting at zero.
#[derive(Debug, Default)]
pub struct IdSequence(AtomicU64);

impl IdSequence {
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn next<I: From<u64>>(&self) -> I {
        I::from(self.0.fetch_add(1, Ordering::Relaxed))
    }

    /// How many ids were handed out so far.
    pub fn issued(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_shared_across_id_types() {
        let seq = IdSequence::new();
        let a: TemplateId = seq.next();
        let b: SubmissionId = seq.next();
        assert_eq!(a.raw(), 0);
        assert_eq!(b.raw(), 1);
        assert_eq!(seq.issued(), 2);
        assert_eq!(a.to_string(), "tpl#0");
        assert_eq!(b.to_string(), "sub#1");
    }

    #[test]
    fn ids_serialize_as_bare_numbers() {
        let id = SubmissionId::from_raw(7);
        assert_eq!(serde_json::to_string(&id).unwrap(), "7");
    }
}
