//! Column separator detection from the header line.

/// Field separator of a scan table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Comma,
    Tab,
    Semicolon,
    Pipe,
    /// Runs of spaces or tabs.
    Whitespace,
}

impl Delimiter {
    /// Explicit separators, in tie-break order.
    const EXPLICIT: [Delimiter; 4] = [Self::Comma, Self::Tab, Self::Semicolon, Self::Pipe];

    /// Guess the separator from a header line.
    ///
    /// The explicit separator occurring most often wins; a header without
    /// any of them is split on whitespace.
    pub fn sniff(header: &str) -> Self {
        let mut best = (Self::Whitespace, 0);
        for delimiter in Self::EXPLICIT {
            let Some(ch) = delimiter.as_char() else {
                continue;
            };
            let count = header.matches(ch).count();
            if count > best.1 {
                best = (delimiter, count);
            }
        }
        best.0
    }

    pub fn as_char(&self) -> Option<char> {
        match self {
            Self::Comma => Some(','),
            Self::Tab => Some('\t'),
            Self::Semicolon => Some(';'),
            Self::Pipe => Some('|'),
            Self::Whitespace => None,
        }
    }

    /// Split a line into trimmed fields.
    pub fn split<'a>(&self, line: &'a str) -> Vec<&'a str> {
        match self.as_char() {
            Some(ch) => line.split(ch).map(str::trim).collect(),
            None => line.split_whitespace().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_common_separators() {
        assert_eq!(Delimiter::sniff("Angle,DE"), Delimiter::Comma);
        assert_eq!(Delimiter::sniff("Angle\tDE"), Delimiter::Tab);
        assert_eq!(Delimiter::sniff("Angle;DE;Note"), Delimiter::Semicolon);
        assert_eq!(Delimiter::sniff("Angle | DE"), Delimiter::Pipe);
        assert_eq!(Delimiter::sniff("Angle   DE"), Delimiter::Whitespace);
    }

    #[test]
    fn test_semicolon_beats_decimal_commas() {
        // European exports: ';' between fields, no commas in the header.
        assert_eq!(Delimiter::sniff("Angle;DE"), Delimiter::Semicolon);
    }

    #[test]
    fn test_split_trims_fields() {
        assert_eq!(Delimiter::Comma.split(" 1.5 , 20 "), vec!["1.5", "20"]);
        assert_eq!(Delimiter::Whitespace.split("  1.5\t 20 "), vec!["1.5", "20"]);
    }
}
