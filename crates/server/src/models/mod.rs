//! Domain models shared by repositories, services, and routes.

pub mod chat;
pub mod order;
pub mod persona;
pub mod product;
pub mod stats;

pub use chat::ChatTurnMessage;
pub use order::{Order, OrderLine};
pub use persona::{PersonaInput, PersonaSettings};
pub use product::{NewProduct, Product, ProductPatch};
pub use stats::{StatusCount, StoreStats};
