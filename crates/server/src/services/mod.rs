//! Domain services: order fulfillment, persona resolution, chat turns.

pub mod chat;
pub mod fulfillment;
pub mod persona;

pub use chat::{ChatError, ChatService};
pub use fulfillment::{FulfillmentEngine, OrderError, OrderLineRequest, ProductRef};
pub use persona::{Persona, PersonaService};
