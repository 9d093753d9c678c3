use std::sync::Arc;

use apache_avro::{Codec, Writer};
use avrosink_api::{SinkError, StorageClient, StorageWriter, StreamHandle};

use crate::convert::json_to_avro;
use crate::schema::SchemaDescriptor;

/// Compression codec named in the container header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerCodec {
    #[default]
    Null,
    Deflate,
}

impl ContainerCodec {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerCodec::Null => "null",
            ContainerCodec::Deflate => "deflate",
        }
    }

    fn to_avro(self) -> Codec {
        match self {
            ContainerCodec::Null => Codec::Null,
            ContainerCodec::Deflate => Codec::Deflate,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  RecordEncoder
// ═══════════════════════════════════════════════════════════════

/// Avro object container encoder bound to one open storage stream.
///
/// The container header (schema + codec + sync marker) is written on
/// `open`. Records accumulate in the writer's block buffer; a block and its
/// sync marker reach the stream when the buffer fills, on `force_durable`
/// and on `finalize`.
///
/// Sizes reported by `append` are uncompressed datum sizes, whatever the
/// codec.
pub struct RecordEncoder<'s> {
    desc: &'s SchemaDescriptor,
    writer: Writer<'s, StorageWriter>,
    client: Arc<dyn StorageClient>,
    handle: StreamHandle,
    records: u64,
}

impl<'s> RecordEncoder<'s> {
    /// Bind an encoder to a freshly created stream and write the header.
    pub fn open(
        client: Arc<dyn StorageClient>,
        handle: StreamHandle,
        desc: &'s SchemaDescriptor,
        codec: ContainerCodec,
    ) -> Result<Self, SinkError> {
        // The writer only emits its header lazily, so render it up front
        // with the same sync marker and continue the stream from there.
        let marker = *uuid::Uuid::new_v4().as_bytes();
        let header = Writer::builder()
            .schema(desc.schema())
            .writer(Vec::new())
            .codec(codec.to_avro())
            .marker(marker)
            .build()
            .into_inner()
            .map_err(|e| SinkError::encoding(format!("render container header: {e}")))?;
        client.write(handle, &header)?;

        let stream = StorageWriter::new(Arc::clone(&client), handle);
        let writer = Writer::append_to_with_codec(desc.schema(), stream, codec.to_avro(), marker);
        tracing::trace!(schema = %desc.name(), codec = codec.as_str(), "wrote container header");

        Ok(Self {
            desc,
            writer,
            client,
            handle,
            records: 0,
        })
    }

    /// Validate and append one record.
    ///
    /// Returns the size of the record's binary encoding. A record that fails
    /// validation is rejected before anything reaches the block buffer.
    pub fn append(&mut self, record: &serde_json::Value) -> Result<u64, SinkError> {
        let value = json_to_avro(record, self.desc)?;
        let encoded = apache_avro::to_avro_datum(self.desc.schema(), value.clone())
            .map_err(|e| SinkError::encoding(format!("avro encode: {e}")))?;

        self.writer
            .append(value)
            .map_err(|e| SinkError::storage(format!("append record: {e}")))?;
        self.records += 1;
        Ok(encoded.len() as u64)
    }

    /// Push the pending block to storage and make every written byte
    /// visible to independent readers, without finalizing the container.
    pub fn force_durable(&mut self) -> Result<(), SinkError> {
        self.writer
            .flush()
            .map_err(|e| SinkError::storage(format!("flush block: {e}")))?;
        self.client.force_durable(self.handle)
    }

    /// Flush the last block and close the stream. The file is complete
    /// afterwards and must not be written again.
    pub fn finalize(mut self) -> Result<(), SinkError> {
        self.writer
            .flush()
            .map_err(|e| SinkError::storage(format!("flush final block: {e}")))?;
        let stream = self
            .writer
            .into_inner()
            .map_err(|e| SinkError::storage(format!("finish container: {e}")))?;
        stream.close()
    }

    /// Records appended through this encoder.
    pub fn records(&self) -> u64 {
        self.records
    }
}
