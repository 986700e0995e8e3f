//! Track – ein Eintrag der Warteschlange

use std::fmt;

/// Ein abspielbarer Titel
///
/// Unveraenderlich nach der Erstellung. Zwei Tracks gelten als gleich, wenn
/// ihr Locator gleich ist (nur fuer Diagnose relevant).
#[derive(Debug, Clone, Eq)]
pub struct Track {
    locator: String,
    title: String,
    author: String,
}

impl Track {
    pub fn neu(
        locator: impl Into<String>,
        title: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            locator: locator.into(),
            title: title.into(),
            author: author.into(),
        }
    }

    /// Quelle (URL oder anderer Locator fuer den Fetcher)
    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn author(&self) -> &str {
        &self.author
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.locator == other.locator
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.author.is_empty() {
            write!(f, "{}", self.title)
        } else {
            write!(f, "{} - {}", self.title, self.author)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gleichheit_nur_ueber_locator() {
        let a = Track::neu("https://x/1", "Titel A", "Alice");
        let b = Track::neu("https://x/1", "Anderer Titel", "Bob");
        let c = Track::neu("https://x/2", "Titel A", "Alice");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn anzeige_mit_und_ohne_autor() {
        assert_eq!(Track::neu("u", "Lied", "Band").to_string(), "Lied - Band");
        assert_eq!(Track::neu("u", "Lied", "").to_string(), "Lied");
    }
}
