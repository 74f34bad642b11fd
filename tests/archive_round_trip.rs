//! End-to-end container tests: write a chunked archive, inspect the raw tar
//! entries, and reassemble the logical files.

use dumptar::archive::{ArchiveError, ChunkReader, ChunkWriter, BUFFER_LIMIT, BUFFER_THRESHOLD};
use std::fs::File;
use std::io::Read;
use tempfile::tempdir;

/// Write each `(name, data)` pair as one logical file and close.
fn write_archive(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ChunkWriter::new(Vec::new());
    for (name, data) in files {
        writer.open_entry(name).unwrap();
        writer.write(data).unwrap();
    }
    writer.close().unwrap();
    writer.into_inner().unwrap()
}

/// Reassemble every logical file in archive order.
fn read_back(archive: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut reader = ChunkReader::new(archive);
    let mut files = Vec::new();
    while let Some(name) = reader.next_file().unwrap() {
        let mut data = Vec::new();
        reader.read_to_end(&mut data).unwrap();
        files.push((name, data));
    }
    files
}

/// List `(entry name, entry size)` for every raw tar entry.
fn list_entries(archive: &[u8]) -> Vec<(String, u64)> {
    let mut tar = tar::Archive::new(archive);
    tar.entries()
        .unwrap()
        .map(|entry| {
            let entry = entry.unwrap();
            (
                entry.path().unwrap().to_string_lossy().to_string(),
                entry.header().entry_size().unwrap(),
            )
        })
        .collect()
}

fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[test]
fn single_small_collection() {
    let archive = write_archive(&[("db1/users.bson", b"0123456789")]);

    assert_eq!(
        list_entries(&archive),
        vec![("db1/users.bson.000000000000".to_string(), 10)]
    );
    assert_eq!(
        read_back(&archive),
        vec![("db1/users.bson".to_string(), b"0123456789".to_vec())]
    );
}

#[test]
fn write_crossing_threshold() {
    let payload = patterned(BUFFER_THRESHOLD + 1);
    let archive = write_archive(&[("db1/orders.bson", &payload)]);

    let entries = list_entries(&archive);
    assert!(!entries.is_empty());
    assert_eq!(entries[0].0, "db1/orders.bson.000000000000");
    // Threshold law: no chunk exceeds the limit, and every chunk but the
    // last crossed the swap threshold when it was cut.
    for (_, size) in &entries {
        assert!(*size as usize <= BUFFER_LIMIT);
    }
    for (_, size) in &entries[..entries.len() - 1] {
        assert!(*size as usize > BUFFER_THRESHOLD);
    }

    let files = read_back(&archive);
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].0, "db1/orders.bson");
    assert_eq!(files[0].1, payload);
}

#[test]
fn oversized_single_write() {
    let payload = patterned(BUFFER_LIMIT * 3 + 17);
    let archive = write_archive(&[("db1/big.bson", &payload)]);

    let entries = list_entries(&archive);
    assert!(entries.len() >= 3);
    for (i, (name, size)) in entries.iter().enumerate() {
        assert_eq!(*name, format!("db1/big.bson.{:012}", i));
        assert!(*size as usize <= BUFFER_LIMIT);
    }

    let files = read_back(&archive);
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].1, payload);
}

#[test]
fn multiple_files_round_trip_in_order() {
    let big = patterned(BUFFER_THRESHOLD + 100);
    let files: Vec<(&str, &[u8])> = vec![
        ("db1/system.indexes.bson", b"index specs"),
        ("db1/users.metadata.json", b"{\"indexes\":[]}"),
        ("db1/users.bson", &big),
        ("db1/empty.bson", b""),
        ("db2/things.bson", b"things"),
    ];
    let archive = write_archive(&files);

    let expected: Vec<(String, Vec<u8>)> = files
        .iter()
        .map(|(name, data)| (name.to_string(), data.to_vec()))
        .collect();
    assert_eq!(read_back(&archive), expected);
}

#[test]
fn empty_logical_file_is_one_zero_size_chunk() {
    let mut writer = ChunkWriter::new(Vec::new());
    writer.open_entry("db1/empty.bson").unwrap();
    writer.close().unwrap();
    let archive = writer.into_inner().unwrap();

    assert_eq!(
        list_entries(&archive),
        vec![("db1/empty.bson.000000000000".to_string(), 0)]
    );
    assert_eq!(
        read_back(&archive),
        vec![("db1/empty.bson".to_string(), Vec::new())]
    );
}

#[test]
fn archives_do_not_depend_on_write_granularity() {
    // Identical producer streams written with different call chunking must
    // produce byte-identical archives when their flush boundaries align.
    let payload = patterned(64 * 1024);

    let one_call = write_archive(&[("db1/events.bson", &payload)]);

    let mut writer = ChunkWriter::new(Vec::new());
    writer.open_entry("db1/events.bson").unwrap();
    for byte in &payload {
        writer.write(std::slice::from_ref(byte)).unwrap();
    }
    writer.close().unwrap();
    let byte_at_a_time = writer.into_inner().unwrap();

    assert_eq!(one_call, byte_at_a_time);
}

#[test]
fn chunk_indices_are_contiguous_from_zero() {
    let payload = patterned(BUFFER_LIMIT * 2 + BUFFER_THRESHOLD);
    let archive = write_archive(&[("db1/a.bson", &payload), ("db1/b.bson", b"tail")]);

    let mut next_index = 0u64;
    for (name, _) in list_entries(&archive) {
        if let Some(index) = name.strip_prefix("db1/a.bson.") {
            assert_eq!(index.parse::<u64>().unwrap(), next_index);
            assert_eq!(index.len(), 12);
            next_index += 1;
        }
    }
    assert!(next_index >= 2);
}

#[test]
fn out_of_order_chunks_are_rejected() {
    let mut raw = Vec::new();
    {
        let mut builder = tar::Builder::new(&mut raw);
        append_entry(&mut builder, "db1/x.bson.000000000000", b"abc");
        append_entry(&mut builder, "db1/x.bson.000000000002", b"def");
        builder.finish().unwrap();
    }

    let mut reader = ChunkReader::new(&raw[..]);
    assert_eq!(reader.next_file().unwrap().as_deref(), Some("db1/x.bson"));

    let err = reader.read_to_end(&mut Vec::new()).unwrap_err();
    let inner = err.get_ref().and_then(|e| e.downcast_ref::<ArchiveError>());
    assert!(matches!(
        inner,
        Some(ArchiveError::ChunkOutOfOrder {
            expected: 1,
            actual: 2,
            ..
        })
    ));
}

#[test]
fn new_file_starting_past_zero_is_rejected() {
    let mut raw = Vec::new();
    {
        let mut builder = tar::Builder::new(&mut raw);
        append_entry(&mut builder, "db1/y.bson.000000000003", b"late");
        builder.finish().unwrap();
    }

    let mut reader = ChunkReader::new(&raw[..]);
    let err = reader.next_file().unwrap_err();
    assert!(matches!(
        err,
        ArchiveError::MissingFirstChunk { actual: 3, .. }
    ));
}

#[test]
fn unchunked_entries_pass_through() {
    let mut raw = Vec::new();
    {
        let mut builder = tar::Builder::new(&mut raw);
        append_entry(&mut builder, "dump-manifest.json", b"{}");
        append_entry(&mut builder, "db1/a.bson.000000000000", b"data");
        builder.finish().unwrap();
    }

    assert_eq!(
        read_back(&raw),
        vec![
            ("dump-manifest.json".to_string(), b"{}".to_vec()),
            ("db1/a.bson".to_string(), b"data".to_vec()),
        ]
    );
}

#[test]
fn round_trip_through_a_file_on_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dump.tar");

    let mut writer = ChunkWriter::new(File::create(&path).unwrap());
    writer.open_entry("db1/users.bson").unwrap();
    writer.write(b"persisted").unwrap();
    writer.close().unwrap();

    let mut reader = ChunkReader::new(File::open(&path).unwrap());
    assert_eq!(
        reader.next_file().unwrap().as_deref(),
        Some("db1/users.bson")
    );
    let mut data = Vec::new();
    reader.read_to_end(&mut data).unwrap();
    assert_eq!(data, b"persisted");
    assert_eq!(reader.next_file().unwrap(), None);
}

fn append_entry(builder: &mut tar::Builder<&mut Vec<u8>>, name: &str, data: &[u8]) {
    let mut header = tar::Header::new_gnu();
    header.set_path(name).unwrap();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    header.set_cksum();
    builder.append(&header, data).unwrap();
}
