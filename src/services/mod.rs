pub mod chat;
pub mod gateway;
pub mod router;
pub mod store;

pub use chat::ChatService;
pub use gateway::GatewayService;
pub use router::{HttpRouter, Router};
pub use store::Store;
