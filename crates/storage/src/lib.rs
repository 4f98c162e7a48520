// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! warden-storage: artifact archives, blob sync, and lifecycle records

pub mod archive;
pub mod blob;
pub mod records;
pub mod sync;

pub use archive::{pack, unpack, ArchiveError};
#[cfg(any(test, feature = "test-support"))]
pub use blob::MemoryBlobStore;
pub use blob::{BlobError, BlobStore, FsBlobStore};
#[cfg(any(test, feature = "test-support"))]
pub use records::MemoryRecordStore;
pub use records::{RecordError, RecordStore, SqliteRecordStore};
pub use sync::{RestoreOutcome, SyncEngine, SyncError};
