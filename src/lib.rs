// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
pub mod access;
pub mod applier;
pub mod component;
pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod kubernetes;
pub mod managedresources;
pub mod registry;
pub mod retry;
pub mod types;

#[cfg(test)]
pub mod test_utils;
