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

//! Commit log rows (spec §3): `(repo, revision, authorUser, timestamp,
//! message, parent)`. Created by C4; never mutated; deleted only with the
//! owning repository.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitLogEntry {
    pub repo: String,
    pub revision: String,
    pub author: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub message: String,
    pub parent: Option<String>,
}
