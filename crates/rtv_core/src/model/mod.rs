//! Round-scoped data model: stops, requests, vehicles and visits.
//!
//! Everything here is a plain value. Requests and vehicles are addressed by
//! integer ids and are only mutated at round boundaries (see
//! [`crate::round::apply_round`]); the parallel graph phases read snapshots.

pub mod ids;
pub mod request;
pub mod stop;
pub mod vehicle;
pub mod visit;

pub use ids::{NodeId, RequestId, Seconds, VehicleId, VisitId};
pub use request::{QosClass, Request};
pub use stop::{RequestStop, Stop, StopKind, TimeWindow};
pub use vehicle::{EnRoute, Vehicle};
pub use visit::{Visit, VisitKind};
