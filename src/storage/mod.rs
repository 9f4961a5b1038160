pub mod file;
pub mod history;
pub mod memory;
pub mod traits;

pub use file::FileStore;
pub use history::HistoryStore;
pub use memory::MemoryStore;
pub use traits::KeyValueStore;
