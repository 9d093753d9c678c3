use std::io::Read;

use apache_avro::Reader;
use avrosink_api::SinkError;

use crate::convert::avro_to_json;

/// Decode every record of an Avro object container into JSON.
///
/// Works on finalized files and on files that were only force-durable
/// flushed. A torn tail after the header ends decoding at the last complete
/// block; a bad header is an error.
pub fn read_container<R: Read>(reader: R) -> Result<Vec<serde_json::Value>, SinkError> {
    let reader = Reader::new(reader)
        .map_err(|e| SinkError::encoding(format!("avro container header: {e}")))?;

    let mut records = Vec::new();
    for value in reader {
        match value {
            Ok(value) => records.push(avro_to_json(&value)),
            Err(e) => {
                tracing::debug!(records = records.len(), error = %e, "stopped at incomplete block");
                break;
            }
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use avrosink_api::StorageClient;
    use avrosink_storage_memory::MemoryStorage;
    use serde_json::json;

    use super::*;
    use crate::{ContainerCodec, RecordEncoder, SchemaDescriptor};

    const USER_SCHEMA: &str = r#"{"type":"record","name":"myrecord",
        "fields":[{"name":"foo1","type":"string"},{"name":"int1","type":"int"}]}"#;

    fn visible_bytes(storage: &MemoryStorage, path: &Path) -> Vec<u8> {
        let mut bytes = Vec::new();
        storage.open(path).unwrap().read_to_end(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn rejects_bytes_that_are_not_a_container() {
        let err = read_container(&b"definitely not avro"[..]).unwrap_err();
        assert!(err.message.contains("header"), "{}", err.message);
    }

    #[test]
    fn empty_input_is_not_a_container() {
        assert!(read_container(&b""[..]).is_err());
    }

    #[test]
    fn torn_tail_keeps_complete_blocks() {
        let path = Path::new("/out/a.avro");
        let storage = Arc::new(MemoryStorage::new());
        let desc = SchemaDescriptor::parse(USER_SCHEMA).unwrap();
        let handle = storage.create(path).unwrap();
        let mut encoder =
            RecordEncoder::open(storage.clone(), handle, &desc, ContainerCodec::Null).unwrap();

        encoder.append(&json!({"foo1": "bar1", "int1": 1})).unwrap();
        encoder.force_durable().unwrap();
        let first_block_end = visible_bytes(&storage, path).len();

        encoder.append(&json!({"foo1": "bar2", "int1": 2})).unwrap();
        encoder.force_durable().unwrap();
        let bytes = visible_bytes(&storage, path);
        assert!(bytes.len() > first_block_end + 3);

        let torn = &bytes[..first_block_end + 3];
        assert_eq!(read_container(torn).unwrap(), vec![json!({"foo1": "bar1", "int1": 1})]);
        assert_eq!(read_container(&bytes[..]).unwrap().len(), 2);
    }
}
