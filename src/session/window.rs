//! Send-side flow control windows.

/// Credit available for sending DATA, at connection or stream level.
///
/// The window is signed: a SETTINGS-driven shrink can push an
/// in-flight window below zero, and sending must stall until peer
/// WINDOW_UPDATEs bring it positive again.
#[derive(Debug, Clone, Copy)]
pub struct SendWindow {
    window: i32,
}

impl SendWindow {
    pub fn new(initial: u32) -> Self {
        Self {
            window: initial as i32,
        }
    }

    /// Credit currently available, zero if the window is negative.
    pub fn available(&self) -> u32 {
        self.window.max(0) as u32
    }

    pub fn is_exhausted(&self) -> bool {
        self.window <= 0
    }

    /// Debit sent bytes.
    pub fn consume(&mut self, amount: u32) {
        self.window -= amount as i32;
    }

    /// Credit from a WINDOW_UPDATE.
    pub fn grant(&mut self, increment: u32) {
        self.window = self.window.saturating_add(increment as i32);
    }

    /// Signed adjustment from an initial-window-size settings change.
    pub fn adjust(&mut self, delta: i32) {
        self.window = self.window.saturating_add(delta);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consume_and_grant() {
        let mut window = SendWindow::new(65535);
        assert_eq!(window.available(), 65535);

        window.consume(30000);
        assert_eq!(window.available(), 35535);
        assert!(!window.is_exhausted());

        window.grant(20000);
        assert_eq!(window.available(), 55535);
    }

    #[test]
    fn test_exhaustion() {
        let mut window = SendWindow::new(10);
        window.consume(10);
        assert!(window.is_exhausted());
        assert_eq!(window.available(), 0);

        window.grant(1);
        assert!(!window.is_exhausted());
    }

    #[test]
    fn test_settings_shrink_goes_negative() {
        let mut window = SendWindow::new(65535);
        window.consume(60000);

        // Peer lowers initial window size below what is in flight
        window.adjust(-30000);
        assert!(window.is_exhausted());
        assert_eq!(window.available(), 0);

        window.grant(30000);
        assert_eq!(window.available(), 5535);
    }
}
