pub mod memory;
pub mod remote;
pub mod session;
pub mod tokens;

pub use memory::MemoryRemote;
pub use remote::{RemoteStore, Subscription};
pub use session::{Applied, ListSession, SessionState};
pub use tokens::{FileStore, KeyValueStore, MemoryKv, TokenCache};
