//! Forex pair encoding.
//!
//! Stored form `"GBP/USD"`, provider form `"GBPUSD=X"`. Only well-formed
//! pairs of two three-letter codes are accepted in either direction, which
//! keeps the mapping a lossless bijection.

use std::fmt;

const PROVIDER_SUFFIX: &str = "=X";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolError {
    MalformedPair(String),
    MalformedProviderSymbol(String),
}

impl fmt::Display for SymbolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolError::MalformedPair(s) => {
                write!(f, "currency pair '{s}' is not of the form 'AAA/BBB'")
            }
            SymbolError::MalformedProviderSymbol(s) => {
                write!(f, "provider symbol '{s}' is not of the form 'AAABBB=X'")
            }
        }
    }
}

impl std::error::Error for SymbolError {}

fn is_code(s: &str) -> bool {
    s.len() == 3 && s.chars().all(|c| c.is_ascii_alphabetic())
}

/// `"GBP/USD"` -> `"GBPUSD=X"`.
pub fn pair_to_provider_symbol(pair: &str) -> Result<String, SymbolError> {
    match pair.split_once('/') {
        Some((base, quote)) if is_code(base) && is_code(quote) => {
            Ok(format!("{base}{quote}{PROVIDER_SUFFIX}"))
        }
        _ => Err(SymbolError::MalformedPair(pair.to_string())),
    }
}

/// `"GBPUSD=X"` -> `"GBP/USD"`.
pub fn provider_symbol_to_pair(symbol: &str) -> Result<String, SymbolError> {
    let malformed = || SymbolError::MalformedProviderSymbol(symbol.to_string());
    let body = symbol.strip_suffix(PROVIDER_SUFFIX).ok_or_else(malformed)?;
    if body.len() != 6 || !body.is_ascii() {
        return Err(malformed());
    }
    let (base, quote) = body.split_at(3);
    if !is_code(base) || !is_code(quote) {
        return Err(malformed());
    }
    Ok(format!("{base}/{quote}"))
}
