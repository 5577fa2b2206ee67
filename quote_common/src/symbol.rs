//! Instrument symbols and symbol-list parsing.
//!
//! A `Symbol` is the subscription key used by the feed (`AAPL`, `BINANCE:BTCUSDT`,
//! `OANDA:EUR_USD`, ...). Input is trimmed and upper-cased so that `aapl` and
//! ` AAPL ` name the same subscription.

use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;
use std::io::BufRead;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::QuoteError;

/// Validated, normalized instrument symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Normalizes and validates a raw symbol.
    pub fn parse(raw: &str) -> Result<Self, QuoteError> {
        let trimmed = raw.trim();
        if trimmed.is_empty()
            || trimmed
                .chars()
                .any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(QuoteError::InvalidSymbol(raw.to_string()));
        }
        Ok(Symbol(trimmed.to_uppercase()))
    }

    /// The symbol as sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Symbol {
    type Err = QuoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Symbol::parse(s)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Symbol {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Trait providing file parsing for symbols.
pub trait SymbolParser {
    /// Parses symbols from a buffered reader.
    ///
    /// Symbols may be separated by commas, spaces, or new lines. Lines starting
    /// with `#` are comments. Duplicates are dropped, keeping the first occurrence.
    fn parse_from_file<R: BufRead>(reader: R) -> Result<Vec<Symbol>, QuoteError>;
}

impl SymbolParser for Symbol {
    fn parse_from_file<R: BufRead>(reader: R) -> Result<Vec<Self>, QuoteError> {
        let mut symbols = Vec::new();
        let mut seen = HashSet::new();

        for (index, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            let trimmed_line = line.trim();
            if trimmed_line.is_empty() || trimmed_line.starts_with('#') {
                continue;
            }

            for token in trimmed_line
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|t| !t.is_empty())
            {
                match token.parse::<Self>() {
                    Ok(symbol) => {
                        if seen.insert(symbol.clone()) {
                            symbols.push(symbol);
                        }
                    }
                    Err(e) => {
                        return Err(QuoteError::ParseSymbolsFile(format!(
                            "line {}: {}",
                            index + 1,
                            e
                        )));
                    }
                }
            }
        }
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Cursor;

    #[rstest]
    #[case("AAPL", "AAPL")]
    #[case("  msft ", "MSFT")]
    #[case("binance:btcusdt", "BINANCE:BTCUSDT")]
    #[case("OANDA:EUR_USD", "OANDA:EUR_USD")]
    fn normalizes(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(Symbol::parse(raw).unwrap().as_str(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("BRK B")]
    #[case("AA\u{0}PL")]
    fn rejects(#[case] raw: &str) {
        assert!(matches!(Symbol::parse(raw), Err(QuoteError::InvalidSymbol(_))));
    }

    #[test]
    fn parses_mixed_separators() {
        let input = "aapl, msft\n# watchlist\n\nNVDA TSLA,aapl\n";
        let symbols = Symbol::parse_from_file(Cursor::new(input)).unwrap();
        let names: Vec<&str> = symbols.iter().map(Symbol::as_str).collect();
        assert_eq!(names, vec!["AAPL", "MSFT", "NVDA", "TSLA"]);
    }

    #[test]
    fn borrows_as_str_for_lookups() {
        let mut set = HashSet::new();
        set.insert(Symbol::parse("AAPL").unwrap());
        assert!(set.contains("AAPL"));
    }
}
