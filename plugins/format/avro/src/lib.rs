//! Avro object container support for the sink: schema handling, strict
//! JSON → Avro conversion, the container encoder and a reader used to
//! verify produced files.

mod convert;
mod encoder;
mod reader;
mod schema;

pub use convert::{avro_to_json, json_to_avro};
pub use encoder::{ContainerCodec, RecordEncoder};
pub use reader::read_container;
pub use schema::SchemaDescriptor;
