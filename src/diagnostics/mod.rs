// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 tinybms-gateway contributors

//! Diagnostic trail: a bounded in-memory ring, RLE compression for its
//! payloads, and a batched/retried persister.

pub mod persister;
pub mod ring;
pub mod rle;

pub use persister::{FileBackend, FlushManager, PersistenceBackend};
pub use ring::DiagnosticRing;
