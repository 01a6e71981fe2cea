use unicode_segmentation::UnicodeSegmentation;

const MAX_GRAPHEMES: usize = 250;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionName(String);

impl ConnectionName {
    pub fn parse(s: String) -> Result<ConnectionName, String> {
        let is_empty_or_whitespace = s.trim().is_empty();
        let is_too_long = s.graphemes(true).count() > MAX_GRAPHEMES;
        let contains_control_characters = s.chars().any(char::is_control);

        if is_empty_or_whitespace || is_too_long || contains_control_characters {
            Err(format!("{:?} is not a valid connection name.", s))
        } else {
            Ok(Self(s))
        }
    }
}

impl AsRef<str> for ConnectionName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConnectionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
