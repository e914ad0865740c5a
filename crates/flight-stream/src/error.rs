// Copyright 2025 Chris Custine
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

//! Client-level errors.

use std::path::PathBuf;

use thiserror::Error;
use tokio_tungstenite::tungstenite;

use crate::protocol::ProtocolError;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("session lock I/O error: {0}")]
    Lock(#[from] std::io::Error),

    #[error("a session for '{user_id}' is already active (lock file {})", .path.display())]
    SessionActive { user_id: String, path: PathBuf },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
}
