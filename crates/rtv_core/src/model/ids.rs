use std::fmt;

use serde::{Deserialize, Serialize};

/// Simulation time in whole seconds.
pub type Seconds = u32;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }

        impl From<u32> for $name {
            fn from(value: u32) -> Self {
                Self(value)
            }
        }
    };
}

id_type!(
    /// Location in the road network, as understood by the distance oracle.
    NodeId,
    "N"
);
id_type!(
    /// Stable request identity supplied by the request feed.
    RequestId,
    "R"
);
id_type!(
    /// Stable vehicle identity supplied by the vehicle roster.
    VehicleId,
    "V"
);
id_type!(
    /// Index of a candidate visit inside one round's RTV arena.
    VisitId,
    "T"
);
