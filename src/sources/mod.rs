pub mod saga;
pub mod traits;
pub mod types;

pub use saga::SagaAdapter;
pub use traits::SourceAdapter;
pub use types::SourceConfig;
