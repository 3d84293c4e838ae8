//! Server detection.
//!
//! Servers differ in which extensions they implement faithfully; knowing
//! who is on the other end feeds the Gmail extension gate and the ID
//! command defaults.

use crate::types::Capability;

/// Known IMAP server families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerType {
    /// Unknown or generic IMAP server.
    #[default]
    Unknown,
    /// Gmail IMAP (imap.gmail.com).
    Gmail,
    /// Microsoft Outlook/Office 365.
    Outlook,
    /// Yahoo Mail.
    Yahoo,
    /// Apple iCloud Mail.
    ICloud,
    /// Fastmail.
    Fastmail,
    /// Dovecot (common open-source server).
    Dovecot,
    /// Courier IMAP.
    Courier,
    /// Cyrus IMAP.
    Cyrus,
}

impl ServerType {
    /// Detects the server family from capabilities and the greeting text.
    #[must_use]
    pub fn detect(capabilities: &[Capability], greeting: Option<&str>) -> Self {
        if capabilities.contains(&Capability::GmailExt1) {
            return Self::Gmail;
        }
        for cap in capabilities {
            if let Capability::Unknown(s) = cap {
                let upper = s.to_uppercase();
                if upper.starts_with("X-GM-") {
                    return Self::Gmail;
                }
                if upper.contains("XYMHIGHESTMODSEQ") {
                    return Self::Yahoo;
                }
            }
        }

        if let Some(greeting) = greeting {
            let lower = greeting.to_lowercase();
            if lower.contains("gimap") || lower.contains("gmail") {
                return Self::Gmail;
            }
            if lower.contains("outlook") || lower.contains("microsoft") {
                return Self::Outlook;
            }
            if lower.contains("yahoo") {
                return Self::Yahoo;
            }
            if lower.contains("icloud") || lower.contains("me.com") {
                return Self::ICloud;
            }
            if lower.contains("fastmail") {
                return Self::Fastmail;
            }
            if lower.contains("dovecot") {
                return Self::Dovecot;
            }
            if lower.contains("courier") {
                return Self::Courier;
            }
            if lower.contains("cyrus") {
                return Self::Cyrus;
            }
        }

        Self::Unknown
    }

    /// True when the server speaks the Gmail extensions.
    #[must_use]
    pub const fn is_gmail(self) -> bool {
        matches!(self, Self::Gmail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gmail_by_capability() {
        let caps = vec![Capability::Imap4Rev1, Capability::GmailExt1];
        assert_eq!(ServerType::detect(&caps, None), ServerType::Gmail);
    }

    #[test]
    fn gmail_by_greeting() {
        assert_eq!(
            ServerType::detect(&[], Some("Gimap ready for requests")),
            ServerType::Gmail
        );
    }

    #[test]
    fn dovecot_by_greeting() {
        assert_eq!(
            ServerType::detect(&[], Some("Dovecot ready.")),
            ServerType::Dovecot
        );
    }

    #[test]
    fn yahoo_by_vendor_capability() {
        let caps = vec![Capability::Unknown("XYMHIGHESTMODSEQ".to_string())];
        assert_eq!(ServerType::detect(&caps, None), ServerType::Yahoo);
    }

    #[test]
    fn unknown_by_default() {
        assert_eq!(
            ServerType::detect(&[Capability::Imap4Rev1], Some("IMAP server ready")),
            ServerType::Unknown
        );
    }
}
