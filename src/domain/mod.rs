//! Domain layer: identifiers, ALGO amounts, and the event, payment and
//! membership rows the verifier reasons about.

pub mod amount;
pub mod ids;
pub mod models;

pub use amount::{MICRO_ALGOS_PER_ALGO, MicroAlgos};
pub use ids::{EventId, PaymentId, UserId};
pub use models::{
    Event, EventMembership, EventPayment, MembershipRole, PaymentRecord, PaymentStatus,
};
