pub mod conformance;
mod error;
mod event;
mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use event::ChangeEvent;
pub use memory::MemoryStore;
pub use record::{
    AlertInsert, AlertKind, AlertRecord, NewAlert, ProductDocument, RecipientRecord,
};
pub use traits::StockStore;
