pub mod codegen;
pub mod config;
pub mod convert;
pub mod entity;
pub mod error;
pub mod logging;
pub mod mapper;
pub mod mapping;
pub mod model;
pub mod source;

pub use codegen::{GeneratedClass, GeneratedEntity, InstanceGenerator};
pub use config::{ConversionOptions, GLOBAL_OPTIONS, GlobalOptions, MapperConfig};
pub use convert::{ConversionNote, GraphFilter, GraphReader, GraphWriter, ObjectGraph};
pub use entity::{
    Entity, EntityHandle, EntityType, IdStrategy, MethodDecl, Multiplicity, NamedGraphPolicy,
    PropertyDecl, TypeExpr, ValueType,
};
pub use error::{ERROR_METRICS, ErrorCode, ErrorMetrics, MapperError, Result};
pub use logging::{LogFormat, LogOutput, LoggingConfig, Rotation, init_logging};
pub use mapper::RdfMapper;
pub use mapping::{MappingMetadata, MetadataResolver, PropertyMapping};
pub use model::{EntityRef, Literal, Node, PrefixMapping, RdfKey, Statement, Value};
pub use source::{MemoryTripleSource, OxigraphTripleSource, TripleSource, in_transaction};
