mod common;

use common::{GzipBuilder, crc32};
use pretty_assertions::assert_eq;
use std::io::Read;
use zipmount::{
    ArchiveKind, ArchiveOptions, ByteSource, CompressionMethod, MemoryFile, ZipReader,
    open_archive,
};

fn gzip_reader(data: Vec<u8>, archive_name: &str) -> ZipReader<MemoryFile> {
    ZipReader::new(MemoryFile::new(data, archive_name), &ArchiveOptions::default()).unwrap()
}

fn read_all(mut file: Box<dyn ByteSource>) -> Vec<u8> {
    let mut out = Vec::new();
    file.read_to_end(&mut out).unwrap();
    out
}

#[test]
fn named_member_round_trips() {
    let data = GzipBuilder {
        name: Some("test.txt"),
        ..Default::default()
    }
    .build(b"test data");
    let gz = gzip_reader(data, "test.txt.gz");

    assert_eq!(gz.count(), 1);
    let entry = gz.entry(0);
    assert_eq!(entry.stored_name, "test.txt");
    assert_eq!(entry.compression_method, CompressionMethod::Deflate);
    assert_eq!(entry.uncompressed_size, 9);
    assert_eq!(entry.crc32, crc32(b"test data"));

    assert_eq!(read_all(gz.open("test.txt").unwrap()), b"test data");
}

#[test]
fn nameless_member_uses_archive_name() {
    let data = GzipBuilder::default().build(b"anonymous");
    let gz = gzip_reader(data, "logs/app.log.gz");

    assert_eq!(gz.entry(0).stored_name, "app.log");
    assert_eq!(read_all(gz.open("app.log").unwrap()), b"anonymous");
}

#[test]
fn optional_header_fields_are_skipped() {
    let plain = b"every optional gzip header field is present".repeat(8);
    let data = GzipBuilder {
        name: Some("full.bin"),
        comment: Some("a comment that is read and dropped"),
        extra: Some(&[b'A', b'P', 2, 0, 0xAB, 0xCD]),
        header_crc: true,
        mtime: 1_700_000_000,
    }
    .build(&plain);
    let gz = gzip_reader(data.clone(), "full.gz");

    let entry = gz.entry(0);
    assert_eq!(entry.unix_mtime, Some(1_700_000_000));
    assert_eq!(
        gz.list_entries()[0].modified.map(|t| t.to_string()).as_deref(),
        Some("2023-11-14 22:13:20")
    );
    assert_eq!(entry.uncompressed_size, plain.len() as u64);
    // payload runs up to the 8-byte trailer
    assert_eq!(entry.data_offset + entry.compressed_size, data.len() as u64 - 8);

    assert_eq!(read_all(gz.open("full.bin").unwrap()), plain);
}

#[test]
fn only_one_member_is_read() {
    let mut data = GzipBuilder {
        name: Some("first"),
        ..Default::default()
    }
    .build(b"one");
    data.extend(
        GzipBuilder {
            name: Some("second"),
            ..Default::default()
        }
        .build(b"two"),
    );
    let gz = gzip_reader(data, "multi.gz");

    assert_eq!(gz.count(), 1);
    assert!(gz.find_index("second").is_none());
}

#[test]
fn understated_trailer_size_is_absent() {
    let mut data = GzipBuilder {
        name: Some("log.txt"),
        ..Default::default()
    }
    .build(b"more bytes than the trailer admits");
    let len = data.len();
    data[len - 4..].copy_from_slice(&4u32.to_le_bytes());

    let gz = gzip_reader(data, "log.txt.gz");
    assert_eq!(gz.entry(0).uncompressed_size, 4);
    assert!(gz.open("log.txt").is_none());
}

#[test]
fn truncated_member_has_no_entries() {
    let data = vec![0x1f, 0x8b, 8, 0x08, 0, 0, 0, 0, 0, 3, b'x'];
    let gz = gzip_reader(data, "cut.gz");
    assert_eq!(gz.count(), 0);
}

#[test]
fn open_archive_sniffs_gzip_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt.gz");
    std::fs::write(&path, GzipBuilder::default().build(b"from disk")).unwrap();

    assert_eq!(ArchiveKind::from_extension(&path), Some(ArchiveKind::Gzip));
    let archive = open_archive(&path, &ArchiveOptions::default()).unwrap();
    let entries = archive.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "notes.txt");
    assert_eq!(read_all(archive.open("notes.txt").unwrap()), b"from disk");
}
