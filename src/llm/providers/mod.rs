// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Completion backend implementations

mod common;
pub mod http;

pub use http::HttpBackend;
