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

//! Git Bridge (C6, spec §4.6): real Git object model, pkt-line/side-band
//! framing, PACK synthesis, and the Smart HTTP service advertisement that
//! sits on top of them.

pub mod bridge;
pub mod objects;
pub mod pack;
pub mod pktline;

pub use bridge::{GitBridge, ServiceAdvertisement};
pub use objects::{Blob, Commit, FileMode, ObjectId, ObjectKind, Signature, Tree, TreeEntry};
pub use pack::{PackWriter, empty_pack};
pub use pktline::{decode_pkt_lines, encode_pkt_line, encode_pkt_line_str, encode_side_band, PktLine, SideBandChannel};
