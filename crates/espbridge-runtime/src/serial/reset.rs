//! ESP reset sequences over the modem control lines.
//!
//! Development boards wire RTS to the chip's EN (reset) pin and DTR to
//! GPIO0 through an inverting transistor pair: asserting RTS holds the chip
//! in reset, asserting DTR pulls GPIO0 low.

use espbridge_core::SerialError;
use std::time::Duration;
use tokio::time::sleep;
use tracing::info;

use super::session::SerialSession;

/// How long EN is held low.
const RESET_PULSE: Duration = Duration::from_millis(100);

/// How long GPIO0 stays low after EN is released.
const BOOT_STRAP_HOLD: Duration = Duration::from_millis(50);

/// Pulse EN to restart the firmware normally.
pub async fn hard_reset(session: &SerialSession) -> Result<(), SerialError> {
    info!("Hard resetting via RTS");
    session.set_signals(true, false).await?;
    sleep(RESET_PULSE).await;
    session.set_signals(false, false).await
}

/// Restart into the ROM serial bootloader: hold GPIO0 low while EN is
/// released, then let GPIO0 go.
pub async fn enter_bootloader(session: &SerialSession) -> Result<(), SerialError> {
    info!("Entering ROM bootloader via RTS/DTR");
    session.set_signals(true, false).await?;
    sleep(RESET_PULSE).await;
    session.set_signals(false, true).await?;
    sleep(BOOT_STRAP_HOLD).await;
    session.set_signals(false, false).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcaster::EventBus;
    use crate::serial::MemorySerialBackend;
    use espbridge_core::SerialOpenOptions;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_bootloader_sequence() {
        let backend = MemorySerialBackend::new();
        let control = backend.add_port("COM-TEST");
        let session = SerialSession::new(Arc::new(backend), Arc::new(EventBus::new()));
        session
            .open(SerialOpenOptions::new("COM-TEST", 115_200))
            .await
            .unwrap();

        enter_bootloader(&session).await.unwrap();
        assert_eq!(
            control.signals(),
            [(true, false), (false, true), (false, false)]
        );
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_hard_reset_requires_open_port() {
        let backend = MemorySerialBackend::new();
        let session = SerialSession::new(Arc::new(backend), Arc::new(EventBus::new()));
        assert_eq!(hard_reset(&session).await, Err(SerialError::NotOpen));
    }
}
