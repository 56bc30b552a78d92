// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Common test utilities, fixtures and mocks for integration tests

#![allow(dead_code)]

pub mod fixtures;
pub mod mocks;
