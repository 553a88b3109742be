//! Handles to distributed objects
//!
//! A handle names an object whose backing data lives inside the secure
//! unit (and, for partitioned data, inside each party's process). Handles
//! are move-only and carry no `Drop` finalizer: the only way to free the
//! remote object is an explicit release through the unit that created it,
//! performed before that unit shuts down.

use crate::ids::ObjectRef;
use std::fmt;

/// Common surface of every distributed handle type
pub trait DistributedHandle: fmt::Debug + Send + Sync {
    /// Kind label used in logs and errors
    const KIND: &'static str;

    /// Borrow the wire identity of the remote object
    fn object_ref(&self) -> ObjectRef;

    /// Give up the handle, yielding its identity for release
    fn into_ref(self) -> ObjectRef;
}

macro_rules! distributed_handle {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, PartialEq, Eq)]
        pub struct $name(ObjectRef);

        impl $name {
            /// Wrap a remote object created by a secure unit
            pub fn from_ref(object: ObjectRef) -> Self {
                Self(object)
            }
        }

        impl DistributedHandle for $name {
            const KIND: &'static str = $kind;

            fn object_ref(&self) -> ObjectRef {
                self.0
            }

            fn into_ref(self) -> ObjectRef {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $kind, self.0)
            }
        }
    };
}

distributed_handle!(
    /// A vertically partitioned dataset; each partition stays with its party
    DatasetHandle,
    "dataset"
);

distributed_handle!(
    /// Opaque distributed model state produced by training
    ModelHandle,
    "model"
);

distributed_handle!(
    /// Distributed score vector, materialized only at its designated party
    PredictionHandle,
    "prediction"
);
