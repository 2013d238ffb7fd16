//! Archive fixtures assembled in memory.
#![allow(dead_code)]

use flate2::write::DeflateEncoder;
use flate2::{Compression, Crc};
use std::io::Write;

pub const STORED: u16 = 0;
pub const DEFLATED: u16 = 8;

pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = Crc::new();
    crc.update(data);
    crc.sum()
}

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Where a member's crc and sizes are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sizes {
    /// In the local header
    Header,
    /// In a data descriptor with the `PK\x07\x08` signature
    SignedDescriptor,
    /// In a data descriptor without signature
    BareDescriptor,
}

struct CentralRecord {
    name: String,
    method: u16,
    flags: u16,
    crc: u32,
    compressed: u32,
    uncompressed: u32,
    offset: u32,
}

/// Writes local headers, payloads and a central directory.
#[derive(Default)]
pub struct ZipBuilder {
    data: Vec<u8>,
    central: Vec<CentralRecord>,
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored(self, name: &str, content: &[u8]) -> Self {
        self.member(name, content, STORED, Sizes::Header, &[])
    }

    pub fn deflated(self, name: &str, content: &[u8]) -> Self {
        self.member(name, content, DEFLATED, Sizes::Header, &[])
    }

    /// Add a member. Methods other than 0 and 8 store `content` verbatim
    /// under that method code.
    pub fn member(
        mut self,
        name: &str,
        content: &[u8],
        method: u16,
        sizes: Sizes,
        extra: &[u8],
    ) -> Self {
        let payload = if method == DEFLATED {
            deflate(content)
        } else {
            content.to_vec()
        };
        let crc = crc32(content);
        let compressed = payload.len() as u32;
        let uncompressed = content.len() as u32;
        let flags: u16 = if sizes == Sizes::Header { 0 } else { 0x0008 };
        let offset = self.data.len() as u32;

        let (h_crc, h_comp, h_uncomp) = match sizes {
            Sizes::Header => (crc, compressed, uncompressed),
            _ => (0, 0, 0),
        };

        let d = &mut self.data;
        d.extend_from_slice(b"PK\x03\x04");
        d.extend_from_slice(&20u16.to_le_bytes());
        d.extend_from_slice(&flags.to_le_bytes());
        d.extend_from_slice(&method.to_le_bytes());
        d.extend_from_slice(&0x6000u16.to_le_bytes());
        d.extend_from_slice(&0x5A21u16.to_le_bytes());
        d.extend_from_slice(&h_crc.to_le_bytes());
        d.extend_from_slice(&h_comp.to_le_bytes());
        d.extend_from_slice(&h_uncomp.to_le_bytes());
        d.extend_from_slice(&(name.len() as u16).to_le_bytes());
        d.extend_from_slice(&(extra.len() as u16).to_le_bytes());
        d.extend_from_slice(name.as_bytes());
        d.extend_from_slice(extra);
        d.extend_from_slice(&payload);

        match sizes {
            Sizes::Header => {}
            Sizes::SignedDescriptor | Sizes::BareDescriptor => {
                if sizes == Sizes::SignedDescriptor {
                    d.extend_from_slice(b"PK\x07\x08");
                }
                d.extend_from_slice(&crc.to_le_bytes());
                d.extend_from_slice(&compressed.to_le_bytes());
                d.extend_from_slice(&uncompressed.to_le_bytes());
            }
        }

        self.central.push(CentralRecord {
            name: name.to_string(),
            method,
            flags,
            crc,
            compressed,
            uncompressed,
            offset,
        });
        self
    }

    /// Append raw bytes after the members written so far.
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.data.extend_from_slice(bytes);
        self
    }

    /// Local records only, without central directory.
    pub fn local_only(self) -> Vec<u8> {
        self.data
    }

    /// Complete archive with central directory and end record.
    pub fn finish(self) -> Vec<u8> {
        let mut d = self.data;
        let cd_offset = d.len() as u32;

        for r in &self.central {
            d.extend_from_slice(b"PK\x01\x02");
            d.extend_from_slice(&20u16.to_le_bytes());
            d.extend_from_slice(&20u16.to_le_bytes());
            d.extend_from_slice(&r.flags.to_le_bytes());
            d.extend_from_slice(&r.method.to_le_bytes());
            d.extend_from_slice(&0x6000u16.to_le_bytes());
            d.extend_from_slice(&0x5A21u16.to_le_bytes());
            d.extend_from_slice(&r.crc.to_le_bytes());
            d.extend_from_slice(&r.compressed.to_le_bytes());
            d.extend_from_slice(&r.uncompressed.to_le_bytes());
            d.extend_from_slice(&(r.name.len() as u16).to_le_bytes());
            d.extend_from_slice(&0u16.to_le_bytes()); // extra
            d.extend_from_slice(&0u16.to_le_bytes()); // comment
            d.extend_from_slice(&0u16.to_le_bytes()); // disk
            d.extend_from_slice(&0u16.to_le_bytes()); // internal attrs
            d.extend_from_slice(&0u32.to_le_bytes()); // external attrs
            d.extend_from_slice(&r.offset.to_le_bytes());
            d.extend_from_slice(r.name.as_bytes());
        }

        let cd_size = d.len() as u32 - cd_offset;
        let count = self.central.len() as u16;
        d.extend_from_slice(b"PK\x05\x06");
        d.extend_from_slice(&0u16.to_le_bytes());
        d.extend_from_slice(&0u16.to_le_bytes());
        d.extend_from_slice(&count.to_le_bytes());
        d.extend_from_slice(&count.to_le_bytes());
        d.extend_from_slice(&cd_size.to_le_bytes());
        d.extend_from_slice(&cd_offset.to_le_bytes());
        d.extend_from_slice(&0u16.to_le_bytes());
        d
    }
}

/// Single-member GZIP file.
#[derive(Default)]
pub struct GzipBuilder<'a> {
    pub name: Option<&'a str>,
    pub comment: Option<&'a str>,
    pub extra: Option<&'a [u8]>,
    pub header_crc: bool,
    pub mtime: u32,
}

impl GzipBuilder<'_> {
    pub fn build(&self, content: &[u8]) -> Vec<u8> {
        let mut flags = 0u8;
        if self.header_crc {
            flags |= 0x02;
        }
        if self.extra.is_some() {
            flags |= 0x04;
        }
        if self.name.is_some() {
            flags |= 0x08;
        }
        if self.comment.is_some() {
            flags |= 0x10;
        }

        let mut d = vec![0x1f, 0x8b, 8, flags];
        d.extend_from_slice(&self.mtime.to_le_bytes());
        d.extend_from_slice(&[0, 3]);

        if let Some(extra) = self.extra {
            d.extend_from_slice(&(extra.len() as u16).to_le_bytes());
            d.extend_from_slice(extra);
        }
        if let Some(name) = self.name {
            d.extend_from_slice(name.as_bytes());
            d.push(0);
        }
        if let Some(comment) = self.comment {
            d.extend_from_slice(comment.as_bytes());
            d.push(0);
        }
        if self.header_crc {
            let crc = crc32(&d) as u16;
            d.extend_from_slice(&crc.to_le_bytes());
        }

        d.extend_from_slice(&deflate(content));
        d.extend_from_slice(&crc32(content).to_le_bytes());
        d.extend_from_slice(&(content.len() as u32).to_le_bytes());
        d
    }
}
