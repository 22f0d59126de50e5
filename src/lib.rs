//! Multi-backend data access routing library.

pub mod accessor;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod load;
pub mod migration;
pub mod observability;
pub mod resolver;
pub mod routing;
pub mod sharding;

pub use accessor::{AccessMode, Accessor, DataAccess, DispatchingMode, MemoryAccessor, Query, Record};
pub use config::schema::RouterConfig;
pub use dispatch::{CompositeAccessor, Redundancy};
pub use error::{AccessError, AccessResult, RouterError, RouterResult};
pub use resolver::AccessorRegistry;
pub use routing::{AccessorContext, AccessorSpecification};
