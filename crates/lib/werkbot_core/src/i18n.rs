//! User-facing message catalog.
//!
//! Every string a client can see is keyed by [`Message`] and rendered for the
//! process-wide [`Locale`]. German is the default.

use std::fmt;
use std::str::FromStr;

/// Supported response locales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    De,
    En,
}

impl Locale {
    pub fn as_str(self) -> &'static str {
        match self {
            Locale::De => "de",
            Locale::En => "en",
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Accept full tags such as `de-DE` or `en_US`.
        let lang = s
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match lang.as_str() {
            "de" => Ok(Locale::De),
            "en" => Ok(Locale::En),
            _ => Err(format!("unsupported locale '{s}'")),
        }
    }
}

/// Catalog keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    Unauthenticated,
    InvalidCredentials,
    Forbidden,
    InvalidRequest,
    PasswordTooShort,
    InvalidEmail,
    EmailTaken,
    RateLimited,
    PersistenceFailure,
    InternalError,
    SessionsInvalidated,
    LoggedOut,
}

impl Message {
    /// Render this message in `locale`.
    pub fn text(self, locale: Locale) -> &'static str {
        match locale {
            Locale::De => self.de(),
            Locale::En => self.en(),
        }
    }

    fn de(self) -> &'static str {
        match self {
            Message::Unauthenticated => "Nicht authentifiziert. Bitte melden Sie sich erneut an.",
            Message::InvalidCredentials => "E-Mail-Adresse oder Passwort ist falsch.",
            Message::Forbidden => "Für diese Aktion fehlt die Berechtigung.",
            Message::InvalidRequest => "Ungültige Anfrage.",
            Message::PasswordTooShort => "Das Passwort muss mindestens 8 Zeichen lang sein.",
            Message::InvalidEmail => "Bitte geben Sie eine gültige E-Mail-Adresse ein.",
            Message::EmailTaken => "Diese E-Mail-Adresse ist bereits registriert.",
            Message::RateLimited => {
                "Zu viele Anmeldeversuche. Bitte versuchen Sie es später erneut."
            }
            Message::PersistenceFailure => {
                "Ein interner Fehler ist aufgetreten. Bitte versuchen Sie es später erneut."
            }
            Message::InternalError => "Interner Serverfehler.",
            Message::SessionsInvalidated => "Alle Sitzungen wurden beendet.",
            Message::LoggedOut => "Sie wurden abgemeldet.",
        }
    }

    fn en(self) -> &'static str {
        match self {
            Message::Unauthenticated => "Not authenticated. Please sign in again.",
            Message::InvalidCredentials => "Email address or password is incorrect.",
            Message::Forbidden => "You are not allowed to perform this action.",
            Message::InvalidRequest => "Invalid request.",
            Message::PasswordTooShort => "The password must be at least 8 characters long.",
            Message::InvalidEmail => "Please enter a valid email address.",
            Message::EmailTaken => "This email address is already registered.",
            Message::RateLimited => "Too many sign-in attempts. Please try again later.",
            Message::PersistenceFailure => "An internal error occurred. Please try again later.",
            Message::InternalError => "Internal server error.",
            Message::SessionsInvalidated => "All sessions have been ended.",
            Message::LoggedOut => "You have been signed out.",
        }
    }
}
