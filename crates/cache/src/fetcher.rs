// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Fetch abstraction for blob downloads.
//!
//! The cache engine never talks to the network directly; it asks a
//! [`Fetcher`] for bytes. The host application supplies the real HTTP
//! implementation; tests substitute a mock.

use std::future::Future;
use std::pin::Pin;

use rq_core::error::Result;

/// Trait for downloading blob bytes from a source URL.
pub trait Fetcher: Send + Sync {
    /// Fetches the full byte payload at `url`.
    ///
    /// Implementations should return [`rq_core::Error::Network`] for
    /// transport failures and [`rq_core::Error::NotFound`] for missing
    /// remote resources.
    fn fetch(&mut self, url: &str) -> Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send + '_>>;
}
