// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Test utilities for SpanLite integration tests
//!
//! - TestFixture: a connection over an in-memory store with recorded events

pub mod test_fixture;
