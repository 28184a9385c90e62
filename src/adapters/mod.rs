pub mod facts;
pub mod http;
pub mod storage;

pub use facts::{FileFactSheetProvider, InMemoryFactSheetProvider};
pub use http::HttpProbe;
pub use storage::LocalStorage;
