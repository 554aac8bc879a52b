pub mod chat;
pub mod context;

pub use chat::{Message, Phase, Role, SessionSnapshot};
pub use context::HandshakeContext;
