// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 tinybms-gateway contributors

//! Serial link layer: the byte-stream reassembler and the port driver that
//! turns it into request/response calls.

pub mod driver;
pub mod reassembler;

pub use driver::{CollectionMode, LinkDriver};
pub use reassembler::Reassembler;
