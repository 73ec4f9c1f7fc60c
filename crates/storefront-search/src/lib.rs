pub mod builder;
pub mod catalog;
pub mod engine;
pub mod params;
pub mod registry;
pub mod relations;
pub mod schema;
pub mod whitelist;

pub use builder::{
    BuiltQuery, CountQuery, FilterPolicy, QueryBuilder, QueryConfig, QueryDescriptor, QueryError,
    SearchClause,
};
pub use catalog::storefront_catalog;
pub use engine::{EngineError, Page, SearchEngine};
pub use params::ListParams;
pub use registry::{RegistryError, SchemaRegistry, SchemaRegistryBuilder};
pub use relations::RelationExpander;
pub use schema::{RelationField, ResourceSchema};
pub use whitelist::resolve_field;
