//! Protocol Tests
//!
//! Tests for command/response framing and for executing commands against a
//! store without a socket.

use std::io::Cursor;

use etagkv::engine::StorageEngine;
use etagkv::network::execute;
use etagkv::protocol::{
    decode_command, decode_entry, decode_keys, decode_response, decode_version_tag,
    encode_command, encode_response, read_command, read_response, write_command, write_response,
    Command, Response, Status, HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
use etagkv::store::version_of;
use etagkv::{KvError, MemoryEngine, StoreError, VersionedRecord, VersionedStore};

fn store() -> VersionedStore {
    let engine: Box<dyn StorageEngine> = Box::new(MemoryEngine::new());
    VersionedStore::new(engine)
}

// =============================================================================
// Command Encoding/Decoding Tests
// =============================================================================

#[test]
fn test_command_frames_decode_to_same_command() {
    let commands = [
        Command::Get {
            key: b"hello".to_vec(),
            if_none_match: 0,
        },
        Command::Get {
            key: b"hello".to_vec(),
            if_none_match: u64::MAX,
        },
        Command::Put {
            key: b"mykey".to_vec(),
            value: b"myvalue".to_vec(),
            if_match: 42,
        },
        Command::Put {
            key: b"empty".to_vec(),
            value: Vec::new(),
            if_match: 0,
        },
        Command::Delete {
            key: b"todelete".to_vec(),
        },
        Command::Ping,
        Command::Find {
            prefix: b"user:".to_vec(),
        },
        Command::Find { prefix: Vec::new() },
    ];

    for cmd in commands {
        let encoded = encode_command(&cmd);
        assert_eq!(encoded[0], cmd.command_type() as u8);
        assert_eq!(decode_command(&encoded).unwrap(), cmd);
    }
}

#[test]
fn test_get_wire_layout() {
    let encoded = encode_command(&Command::Get {
        key: b"ab".to_vec(),
        if_none_match: 0x0102030405060708,
    });

    assert_eq!(
        encoded,
        vec![
            0x01, // GET
            0, 0, 0, 14, // payload length
            1, 2, 3, 4, 5, 6, 7, 8, // if_none_match
            0, 0, 0, 2, // key length
            b'a', b'b',
        ]
    );
}

#[test]
fn test_decode_unknown_command() {
    let bytes = [0xFF, 0, 0, 0, 0];
    assert!(matches!(decode_command(&bytes), Err(KvError::Protocol(_))));
}

#[test]
fn test_decode_incomplete_frames() {
    let encoded = encode_command(&Command::Delete { key: b"key".to_vec() });

    assert!(decode_command(&encoded[..HEADER_SIZE - 1]).is_err());
    assert!(decode_command(&encoded[..encoded.len() - 1]).is_err());
}

#[test]
fn test_decode_rejects_bad_key_length() {
    // DELETE claiming a 100-byte key inside a 6-byte payload
    let bytes = [0x03, 0, 0, 0, 6, 0, 0, 0, 100, b'a', b'b'];
    assert!(matches!(decode_command(&bytes), Err(KvError::Protocol(_))));
}

#[test]
fn test_decode_rejects_trailing_bytes() {
    let mut payload = vec![0, 0, 0, 1, b'k'];
    payload.push(b'!');
    let mut bytes = vec![0x03, 0, 0, 0, payload.len() as u8];
    bytes.extend_from_slice(&payload);

    assert!(decode_command(&bytes).is_err());
}

#[test]
fn test_oversized_payload_rejected_before_reading() {
    let mut header = vec![0x02];
    header.extend_from_slice(&(MAX_PAYLOAD_SIZE + 1).to_be_bytes());

    let mut cursor = Cursor::new(header);
    assert!(matches!(read_command(&mut cursor), Err(KvError::Protocol(_))));
}

// =============================================================================
// Response Tests
// =============================================================================

#[test]
fn test_entry_response_payload() {
    let record = VersionedRecord::new(b"body".to_vec(), 77, 1_700_000_000_000_000_000);
    let response = decode_response(&encode_response(&Response::entry(&record))).unwrap();

    assert_eq!(response.status, Status::Ok);
    let (version, last_modified, value) = decode_entry(response.payload.as_deref().unwrap()).unwrap();
    assert_eq!(version, 77);
    assert_eq!(last_modified, 1_700_000_000_000_000_000);
    assert_eq!(value, b"body");
}

#[test]
fn test_no_content_response() {
    let tagged = decode_response(&encode_response(&Response::no_content(Some(9)))).unwrap();
    assert_eq!(tagged.status, Status::NoContent);
    assert_eq!(decode_version_tag(tagged.payload.as_deref().unwrap()).unwrap(), 9);

    let bare = decode_response(&encode_response(&Response::no_content(None))).unwrap();
    assert_eq!(bare, Response::no_content(None));
}

#[test]
fn test_keys_response() {
    let response = Response::keys(["a/1", "a/2", ""]);
    let keys = decode_keys(response.payload.as_deref().unwrap()).unwrap();

    assert_eq!(keys, vec!["a/1", "a/2", ""]);
    assert!(decode_keys(&[]).unwrap().is_empty());
}

#[test]
fn test_store_errors_map_to_statuses() {
    let cases = [
        (StoreError::NotFound, Status::NotFound, 404),
        (StoreError::Gone, Status::Gone, 410),
        (
            StoreError::VersionMismatch {
                expected: 1,
                actual: 2,
            },
            Status::Conflict,
            409,
        ),
        (
            StoreError::EngineUnavailable("closed".into()),
            Status::Error,
            500,
        ),
        (
            StoreError::TooLarge {
                size: 10,
                limit: 5,
            },
            Status::TooLarge,
            413,
        ),
        (StoreError::Corrupt("bad".into()), Status::Error, 500),
    ];

    for (err, status, code) in cases {
        let response = Response::from_store_error(&err);
        assert_eq!(response.status, status);
        assert_eq!(response.status.http_code(), code);
        assert_eq!(err.status_code(), code);
        assert_eq!(response.message(), err.to_string());
    }
}

#[test]
fn test_unknown_status_rejected() {
    assert!(decode_response(&[0x42, 0, 0, 0, 0]).is_err());
}

// =============================================================================
// Stream I/O Tests
// =============================================================================

#[test]
fn test_stream_command_sequence() {
    let mut buffer = Vec::new();
    write_command(&mut buffer, &Command::Ping).unwrap();
    write_command(
        &mut buffer,
        &Command::Put {
            key: b"k".to_vec(),
            value: b"v".to_vec(),
            if_match: 0,
        },
    )
    .unwrap();

    let mut cursor = Cursor::new(buffer);
    assert_eq!(read_command(&mut cursor).unwrap(), Command::Ping);
    assert!(matches!(read_command(&mut cursor).unwrap(), Command::Put { .. }));
    assert!(matches!(read_command(&mut cursor), Err(KvError::Io(_))));
}

#[test]
fn test_stream_response() {
    let mut buffer = Vec::new();
    write_response(&mut buffer, &Response::not_modified(5, 6)).unwrap();

    let response = read_response(&mut Cursor::new(buffer)).unwrap();
    assert_eq!(response.status, Status::NotModified);
    let (version, last_modified, value) = decode_entry(response.payload.as_deref().unwrap()).unwrap();
    assert_eq!((version, last_modified), (5, 6));
    assert!(value.is_empty());
}

// =============================================================================
// Command Execution Tests
// =============================================================================

#[test]
fn test_execute_conditional_flow() {
    let store = store();

    let created = execute(
        &store,
        Command::Put {
            key: b"doc".to_vec(),
            value: b"v1".to_vec(),
            if_match: 0,
        },
    );
    assert_eq!(created.status, Status::NoContent);
    let v1 = decode_version_tag(created.payload.as_deref().unwrap()).unwrap();
    assert_eq!(v1, version_of(b"v1"));

    let cached = execute(
        &store,
        Command::Get {
            key: b"doc".to_vec(),
            if_none_match: v1,
        },
    );
    assert_eq!(cached.status, Status::NotModified);

    let stale = execute(
        &store,
        Command::Put {
            key: b"doc".to_vec(),
            value: b"v2".to_vec(),
            if_match: v1 ^ 1,
        },
    );
    assert_eq!(stale.status, Status::Conflict);

    let deleted = execute(&store, Command::Delete { key: b"doc".to_vec() });
    assert_eq!(deleted, Response::no_content(None));

    let gone = execute(
        &store,
        Command::Put {
            key: b"doc".to_vec(),
            value: b"v3".to_vec(),
            if_match: v1,
        },
    );
    assert_eq!(gone.status, Status::Gone);

    let missing = execute(
        &store,
        Command::Get {
            key: b"doc".to_vec(),
            if_none_match: 0,
        },
    );
    assert_eq!(missing.status, Status::NotFound);
}

#[test]
fn test_execute_find_and_ping() {
    let store = store();
    for key in ["a/2", "b/1", "a/1"] {
        store.put(key, b"x", 0).unwrap();
    }

    let found = execute(&store, Command::Find { prefix: b"a/".to_vec() });
    assert_eq!(found.status, Status::Ok);
    assert_eq!(decode_keys(found.payload.as_deref().unwrap()).unwrap(), vec!["a/1", "a/2"]);

    let pong = execute(&store, Command::Ping);
    assert_eq!(pong.payload.as_deref(), Some(b"PONG".as_slice()));
}

#[test]
fn test_execute_rejects_non_utf8_key() {
    let store = store();
    let response = execute(
        &store,
        Command::Get {
            key: vec![0xFF, 0xFE],
            if_none_match: 0,
        },
    );
    assert_eq!(response.status, Status::BadRequest);
}
