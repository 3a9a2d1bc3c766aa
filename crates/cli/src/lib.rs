// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod backend;
pub mod command;
pub mod config;
pub mod push;
pub mod test_support;

use std::sync::Once;

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
/// Safe to call multiple times; only the first call has effect.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
