// Copyright 2025 KohakuHub Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! PACK file synthesis (C6, spec §4.6).
//!
//! We always emit fully-undeltified packs: every object is stored whole,
//! zlib-compressed. Git accepts this happily (it's exactly what
//! `pack-objects --window=0` produces) and it keeps the bridge from having
//! to implement delta encoding to serve a clone.

use super::objects::ObjectKind;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use sha1::{Digest, Sha1};
use std::io::Write;

pub struct PackObject {
    pub kind: ObjectKind,
    pub data: Vec<u8>,
}

/// Builds a PACK file (header + entries + trailing SHA-1 of everything
/// before it) containing exactly the given objects, in the given order.
pub struct PackWriter {
    objects: Vec<PackObject>,
}

impl PackWriter {
    pub fn new() -> Self {
        Self { objects: Vec::new() }
    }

    pub fn add(&mut self, kind: ObjectKind, data: Vec<u8>) {
        self.objects.push(PackObject { kind, data });
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"PACK");
        out.extend_from_slice(&2u32.to_be_bytes()); // version
        out.extend_from_slice(&(self.objects.len() as u32).to_be_bytes());

        for object in &self.objects {
            write_object_header(&mut out, object.kind, object.data.len());
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&object.data).expect("writing to an in-memory encoder cannot fail");
            out.extend(encoder.finish().expect("flushing an in-memory encoder cannot fail"));
        }

        let mut hasher = Sha1::new();
        hasher.update(&out);
        out.extend_from_slice(&hasher.finalize());
        out
    }
}

impl Default for PackWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn pack_type_bits(kind: ObjectKind) -> u8 {
    match kind {
        ObjectKind::Commit => 1,
        ObjectKind::Tree => 2,
        ObjectKind::Blob => 3,
    }
}

/// Variable-length object header: top bit of each byte is a continuation
/// flag, first byte packs the 3-bit type and low 4 size bits, each
/// following byte contributes 7 more size bits.
fn write_object_header(out: &mut Vec<u8>, kind: ObjectKind, size: usize) {
    let mut size = size as u64;
    let mut first = (pack_type_bits(kind) << 4) | (size & 0x0f) as u8;
    size >>= 4;
    if size > 0 {
        first |= 0x80;
    }
    out.push(first);
    while size > 0 {
        let mut byte = (size & 0x7f) as u8;
        size >>= 7;
        if size > 0 {
            byte |= 0x80;
        }
        out.push(byte);
    }
}

/// Empty-pack sentinel for the "no new objects, only ref updates" case,
/// which Smart HTTP clients still expect as a well-formed (zero-object)
/// PACK stream.
pub fn empty_pack() -> Vec<u8> {
    PackWriter::new().build()
}

pub fn object_count(pack: &[u8]) -> Option<u32> {
    if pack.len() < 12 || &pack[0..4] != b"PACK" {
        return None;
    }
    Some(u32::from_be_bytes([pack[8], pack[9], pack[10], pack[11]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pack_has_correct_header_and_zero_objects() {
        let pack = empty_pack();
        assert_eq!(&pack[0..4], b"PACK");
        assert_eq!(object_count(&pack), Some(0));
        assert_eq!(pack.len(), 12 + 20); // header + trailer, no objects
    }

    #[test]
    fn pack_with_objects_reports_correct_count() {
        let mut writer = PackWriter::new();
        writer.add(ObjectKind::Blob, b"hello".to_vec());
        writer.add(ObjectKind::Blob, b"world".to_vec());
        let pack = writer.build();
        assert_eq!(object_count(&pack), Some(2));
    }

    #[test]
    fn pack_trailer_is_sha1_of_preceding_bytes() {
        let mut writer = PackWriter::new();
        writer.add(ObjectKind::Blob, b"x".to_vec());
        let pack = writer.build();
        let (body, trailer) = pack.split_at(pack.len() - 20);
        let mut hasher = Sha1::new();
        hasher.update(body);
        assert_eq!(&hasher.finalize()[..], trailer);
    }

    #[test]
    fn object_header_continuation_bit_set_for_large_objects() {
        let mut out = Vec::new();
        write_object_header(&mut out, ObjectKind::Blob, 1000);
        assert_eq!(out[0] & 0x80, 0x80);
    }
}
