// Service exports
pub mod directory;
pub mod memory;
pub mod postgres;
pub mod store;
pub mod transport;
pub mod vk;

pub use directory::{DirectoryClient, DirectoryError, SearchQuery};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::{PersistenceStore, StoreError};
pub use transport::{Keyboard, MessagingTransport, OutboundMessage};
pub use vk::VkClient;
