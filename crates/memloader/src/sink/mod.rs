//! Output side of the loader: stores, routing and the record writer.

mod memcache;
mod memory;
mod registry;
mod traits;
mod writer;

pub use memcache::MemcacheStore;
pub use memory::MemoryStore;
pub use registry::StoreRegistry;
pub use traits::Store;
pub use writer::StoreWriter;
