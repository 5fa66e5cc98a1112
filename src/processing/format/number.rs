//! Decimal number patterns (`#,##0.00`, `0.#%`, `#;(#)`, ...).
//!
//! A [`NumberPattern`] is parsed once and is immutable, so it can be shared freely.
//! [`DecimalFormatter`] pairs a pattern with a reusable output buffer; formatting through it
//! needs `&mut self`, so sharing one between threads requires a lock.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use thiserror::Error;

/// A number pattern could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid number pattern '{pattern}': {reason}")]
pub struct PatternError {
    pub pattern: String,
    pub reason: String,
}

/// Characters used when rendering a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecimalSymbols {
    pub decimal_separator: char,
    pub grouping_separator: char,
    pub minus_sign: char,
}

impl Default for DecimalSymbols {
    fn default() -> Self {
        Self {
            decimal_separator: '.',
            grouping_separator: ',',
            minus_sign: '-',
        }
    }
}

/// A parsed decimal format pattern.
///
/// Syntax: `prefix number suffix [; negative-prefix number negative-suffix]` where the number
/// part uses `#` (optional digit), `0` (required digit), `,` (grouping) and `.` (decimal
/// separator). `%` and `‰` in an affix scale the value by 100 and 1000. Text in single quotes
/// is literal, `''` is a quote. Only the affixes of the negative subpattern are used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberPattern {
    source: String,
    prefix: String,
    suffix: String,
    negative: Option<(String, String)>,
    min_integer_digits: usize,
    min_fraction_digits: usize,
    max_fraction_digits: usize,
    grouping_size: Option<usize>,
    multiplier: u32,
    decimal_always_shown: bool,
    symbols: DecimalSymbols,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Prefix,
    Number,
    Suffix,
}

#[derive(Debug, Default)]
struct SubPattern {
    prefix: String,
    suffix: String,
    int_optional: usize,
    int_required: usize,
    frac_required: usize,
    frac_optional: usize,
    grouping: Option<usize>,
    has_decimal: bool,
    multiplier: u32,
}

struct Parser<'a> {
    pattern: &'a str,
    chars: Peekable<Chars<'a>>,
}

impl<'a> Parser<'a> {
    fn error(&self, reason: impl Into<String>) -> PatternError {
        PatternError {
            pattern: self.pattern.to_owned(),
            reason: reason.into(),
        }
    }

    /// Parse one subpattern. Returns it and whether a `;` followed.
    fn subpattern(&mut self) -> Result<(SubPattern, bool), PatternError> {
        let mut sub = SubPattern {
            multiplier: 1,
            ..SubPattern::default()
        };
        let mut phase = Phase::Prefix;
        let mut in_quote = false;
        let mut more = false;

        while let Some(ch) = self.chars.next() {
            if ch == '\'' {
                if self.chars.peek() == Some(&'\'') {
                    self.chars.next();
                    phase = after_literal(phase);
                    affix(&mut sub, phase).push('\'');
                } else {
                    in_quote = !in_quote;
                    phase = after_literal(phase);
                }
                continue;
            }
            if in_quote {
                affix(&mut sub, phase).push(ch);
                continue;
            }
            if ch == ';' {
                more = true;
                break;
            }

            let number_char = matches!(ch, '#' | '0' | ',' | '.');
            match phase {
                Phase::Prefix | Phase::Number if number_char => {
                    phase = Phase::Number;
                    self.number_char(&mut sub, ch)?;
                }
                Phase::Number if ch == 'E' => {
                    return Err(self.error("scientific notation is not supported"));
                }
                Phase::Number if ch.is_ascii_digit() => {
                    return Err(self.error(format!("unsupported digit '{ch}' in number part")));
                }
                Phase::Suffix if number_char => {
                    return Err(self.error(format!("unquoted '{ch}' in suffix")));
                }
                _ => {
                    phase = after_literal(phase);
                    self.affix_char(&mut sub, phase, ch)?;
                }
            }
        }

        if in_quote {
            return Err(self.error("unterminated quote"));
        }
        if sub.int_optional + sub.int_required + sub.frac_required + sub.frac_optional == 0 {
            return Err(self.error("no digit placeholders"));
        }
        if sub.grouping == Some(0) {
            return Err(self.error("grouping separator at the end of the integer part"));
        }
        Ok((sub, more))
    }

    fn number_char(&self, sub: &mut SubPattern, ch: char) -> Result<(), PatternError> {
        match ch {
            '#' if sub.has_decimal => sub.frac_optional += 1,
            '#' => {
                if sub.int_required > 0 {
                    return Err(self.error("'#' after '0' in the integer part"));
                }
                sub.int_optional += 1;
                if let Some(g) = sub.grouping.as_mut() {
                    *g += 1;
                }
            }
            '0' if sub.has_decimal => {
                if sub.frac_optional > 0 {
                    return Err(self.error("'0' after '#' in the fraction part"));
                }
                sub.frac_required += 1;
            }
            '0' => {
                sub.int_required += 1;
                if let Some(g) = sub.grouping.as_mut() {
                    *g += 1;
                }
            }
            ',' => {
                if sub.has_decimal {
                    return Err(self.error("grouping separator in the fraction part"));
                }
                sub.grouping = Some(0);
            }
            _ => {
                if sub.has_decimal {
                    return Err(self.error("multiple decimal separators"));
                }
                if sub.grouping == Some(0) {
                    return Err(self.error("grouping separator directly before the decimal separator"));
                }
                sub.has_decimal = true;
            }
        }
        Ok(())
    }

    fn affix_char(&self, sub: &mut SubPattern, phase: Phase, ch: char) -> Result<(), PatternError> {
        let scale = match ch {
            '%' => 100,
            '\u{2030}' => 1000,
            _ => 1,
        };
        if scale != 1 {
            if sub.multiplier != 1 {
                return Err(self.error("more than one percent or per-mille sign"));
            }
            sub.multiplier = scale;
        }
        affix(sub, phase).push(ch);
        Ok(())
    }
}

fn after_literal(phase: Phase) -> Phase {
    match phase {
        Phase::Prefix => Phase::Prefix,
        Phase::Number | Phase::Suffix => Phase::Suffix,
    }
}

fn affix(sub: &mut SubPattern, phase: Phase) -> &mut String {
    match phase {
        Phase::Prefix => &mut sub.prefix,
        Phase::Number | Phase::Suffix => &mut sub.suffix,
    }
}

impl NumberPattern {
    /// Parse a pattern, rejecting malformed input.
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let mut parser = Parser {
            pattern,
            chars: pattern.chars().peekable(),
        };
        if pattern.is_empty() {
            return Err(parser.error("pattern is empty"));
        }

        let (positive, more) = parser.subpattern()?;
        let negative = if more {
            let (negative, again) = parser.subpattern()?;
            if again {
                return Err(parser.error("more than one ';'"));
            }
            Some((negative.prefix, negative.suffix))
        } else {
            None
        };

        let mut min_integer_digits = positive.int_required;
        let mut min_fraction_digits = positive.frac_required;
        // "#.##" behaves like "0.##" and ".##" like ".0#".
        if positive.has_decimal && positive.int_required == 0 && positive.frac_required == 0 {
            if positive.int_optional > 0 {
                min_integer_digits = 1;
            } else {
                min_fraction_digits = 1;
            }
        }
        let max_fraction_digits = positive.frac_required + positive.frac_optional;

        Ok(Self {
            source: pattern.to_owned(),
            prefix: positive.prefix,
            suffix: positive.suffix,
            negative,
            min_integer_digits,
            min_fraction_digits,
            max_fraction_digits,
            grouping_size: positive.grouping,
            multiplier: positive.multiplier,
            decimal_always_shown: positive.has_decimal && max_fraction_digits == 0,
            symbols: DecimalSymbols::default(),
        })
    }

    /// Use different separator/sign characters.
    pub fn with_symbols(mut self, symbols: DecimalSymbols) -> Self {
        self.symbols = symbols;
        self
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn min_integer_digits(&self) -> usize {
        self.min_integer_digits
    }

    pub fn min_fraction_digits(&self) -> usize {
        self.min_fraction_digits
    }

    pub fn max_fraction_digits(&self) -> usize {
        self.max_fraction_digits
    }

    pub fn grouping_size(&self) -> Option<usize> {
        self.grouping_size
    }

    pub fn format_f64(&self, value: f64) -> String {
        let mut out = String::new();
        self.write_f64(value, &mut out);
        out
    }

    pub fn format_i64(&self, value: i64) -> String {
        let mut out = String::new();
        self.write_i64(value, &mut out);
        out
    }

    /// Append the formatted float to `out`.
    ///
    /// Rounds the exact binary value to the maximum fraction digits.
    pub fn write_f64(&self, value: f64, out: &mut String) {
        if value.is_nan() {
            out.push_str("NaN");
            return;
        }
        let negative = value.is_sign_negative();
        if value.is_infinite() {
            self.write_affixed(negative, "\u{221e}", "", false, out);
            return;
        }
        let scaled = value.abs() * f64::from(self.multiplier);
        let digits = format!("{:.*}", self.max_fraction_digits, scaled);
        let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits.as_str(), ""));
        self.write_digits(negative, int_part, frac_part, out);
    }

    /// Append the formatted integer to `out`.
    pub fn write_i64(&self, value: i64, out: &mut String) {
        let magnitude = u128::from(value.unsigned_abs()) * u128::from(self.multiplier);
        self.write_digits(value < 0, &magnitude.to_string(), "", out);
    }

    fn write_digits(&self, negative: bool, int_part: &str, frac_part: &str, out: &mut String) {
        let mut frac = frac_part.to_owned();
        while frac.len() > self.min_fraction_digits && frac.ends_with('0') {
            frac.pop();
        }
        while frac.len() < self.min_fraction_digits {
            frac.push('0');
        }

        let significant = int_part.trim_start_matches('0');
        let mut int_digits = "0".repeat(self.min_integer_digits.saturating_sub(significant.len()));
        int_digits.push_str(significant);
        if int_digits.is_empty() && frac.is_empty() {
            int_digits.push('0');
        }

        let mut body = String::with_capacity(int_digits.len() * 2 + frac.len() + 1);
        match self.grouping_size {
            Some(size) if size > 0 => {
                let len = int_digits.len();
                for (i, d) in int_digits.chars().enumerate() {
                    if i > 0 && (len - i) % size == 0 {
                        body.push(self.symbols.grouping_separator);
                    }
                    body.push(d);
                }
            }
            _ => body.push_str(&int_digits),
        }
        self.write_affixed(negative, &body, &frac, self.decimal_always_shown, out);
    }

    fn write_affixed(&self, negative: bool, int_body: &str, frac: &str, force_decimal: bool, out: &mut String) {
        let (prefix, suffix) = match (&self.negative, negative) {
            (Some((p, s)), true) => (p.as_str(), s.as_str()),
            (None, true) => {
                out.push(self.symbols.minus_sign);
                (self.prefix.as_str(), self.suffix.as_str())
            }
            (_, false) => (self.prefix.as_str(), self.suffix.as_str()),
        };
        out.push_str(prefix);
        out.push_str(int_body);
        if !frac.is_empty() || force_decimal {
            out.push(self.symbols.decimal_separator);
            out.push_str(frac);
        }
        out.push_str(suffix);
    }
}

impl fmt::Display for NumberPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// A pattern plus a reusable output buffer.
///
/// Formatting borrows the formatter mutably; share one across threads only behind a lock,
/// e.g. `Arc<Mutex<DecimalFormatter>>` as accepted by
/// [`FmtNumber::with_formatter`](super::FmtNumber::with_formatter).
#[derive(Debug, Clone)]
pub struct DecimalFormatter {
    pattern: NumberPattern,
    buffer: String,
}

impl DecimalFormatter {
    pub fn new(pattern: NumberPattern) -> Self {
        Self {
            pattern,
            buffer: String::new(),
        }
    }

    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        NumberPattern::parse(pattern).map(Self::new)
    }

    pub fn pattern(&self) -> &NumberPattern {
        &self.pattern
    }

    pub fn format_f64(&mut self, value: f64) -> &str {
        self.buffer.clear();
        self.pattern.write_f64(value, &mut self.buffer);
        &self.buffer
    }

    pub fn format_i64(&mut self, value: i64) -> &str {
        self.buffer.clear();
        self.pattern.write_i64(value, &mut self.buffer);
        &self.buffer
    }
}
