//! Cryptographic subsystem bring-up.
//!
//! Transports draw key material and padding from the operating system RNG.
//! Initialization checks that the RNG actually produces output before any
//! listener opens.

use rand::rngs::OsRng;
use rand::RngCore;

/// Proof that the crypto subsystem came up; consumed by [`Crypto::cleanup`].
#[derive(Debug)]
pub struct Crypto {
    _private: (),
}

impl Crypto {
    pub fn initialize() -> Result<Self, rand::Error> {
        let mut sample = [0u8; 32];
        OsRng.try_fill_bytes(&mut sample)?;
        tracing::debug!("Cryptographic subsystem initialized");
        Ok(Self { _private: () })
    }

    pub fn cleanup(self) {
        tracing::debug!("Cryptographic subsystem cleaned up");
    }
}
