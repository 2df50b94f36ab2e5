//! 🗓️ Index formats: `"logstash-{0:yyyy.MM.dd}"` and friends.
//!
//! An index format is a composite format string with exactly one placeholder, `{0:...}`,
//! whose spec is a .NET-style custom date pattern. Log pipelines have been writing index
//! names this way for a decade, so we speak the dialect instead of inventing a new one.
//!
//! 🧠 Knowledge graph:
//! - `IndexFormat::parse` compiles once, at construction. Bad formats never reach the hot path.
//! - `format(ts)` renders the index name for a timestamp, in the timestamp's own offset.
//! - `wildcard()` swaps the placeholder for `*`. That's the template match pattern.
//! - `{{` and `}}` outside the placeholder are literal braces, same as the dialect we borrowed.

use chrono::{DateTime, Datelike, FixedOffset, Timelike};

use crate::error::ConfigurationError;

const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

const DAY_NAMES: [&str; 7] = [
    "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday",
];

/// 🧩 One compiled piece of the date spec.
#[derive(Debug, Clone, PartialEq, Eq)]
enum DateToken {
    Literal(String),
    /// `y`, `yy`, `yyy`, `yyyy`... the count is the minimum digit width. 1 and 2 are mod 100.
    Year(usize),
    /// `M`, `MM`, `MMM`, `MMMM`
    Month(usize),
    /// `d`, `dd`, `ddd`, `dddd`. Three or more means the weekday name, because of course it does.
    Day(usize),
    Hour24(usize),
    Hour12(usize),
    Minute(usize),
    Second(usize),
    /// `f` through `fffffff`: truncated fractional seconds
    Fraction(usize),
    /// `t` → "A"/"P", `tt` → "AM"/"PM"
    AmPm(usize),
    /// `z` → "+5", `zz` → "+05", `zzz` → "+05:00"
    Offset(usize),
}

/// 📦 A compiled index format. Immutable after `parse`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexFormat {
    raw: String,
    prefix: String,
    suffix: String,
    date: Vec<DateToken>,
}

impl IndexFormat {
    /// 🔧 Compile `raw`. `field` is only used to name the culprit in the error.
    pub fn parse(field: &'static str, raw: &str) -> Result<Self, ConfigurationError> {
        let invalid = |reason: &str| ConfigurationError::InvalidIndexFormat {
            field,
            value: raw.to_string(),
            reason: reason.to_string(),
        };

        let mut prefix = String::new();
        let mut suffix = String::new();
        let mut date: Option<Vec<DateToken>> = None;
        let mut chars = raw.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal_target(&date, &mut prefix, &mut suffix).push('{');
                }
                '{' => {
                    let mut placeholder = String::new();
                    let mut closed = false;
                    for inner in chars.by_ref() {
                        match inner {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => return Err(invalid("'{' inside the placeholder")),
                            other => placeholder.push(other),
                        }
                    }
                    if !closed {
                        return Err(invalid("the placeholder is never closed"));
                    }
                    if date.is_some() {
                        return Err(invalid("more than one timestamp placeholder"));
                    }
                    let spec = match placeholder.split_once(':') {
                        Some((index, spec)) if index.trim() == "0" => spec,
                        Some(_) => return Err(invalid("the placeholder must be argument 0")),
                        None => {
                            return Err(invalid("the placeholder needs a date pattern after '0:'"));
                        }
                    };
                    if spec.is_empty() {
                        return Err(invalid("the date pattern after '0:' is empty"));
                    }
                    date = Some(compile_date_spec(spec).map_err(|reason| invalid(&reason))?);
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal_target(&date, &mut prefix, &mut suffix).push('}');
                }
                '}' => return Err(invalid("unmatched '}' (write '}}' for a literal brace)")),
                other => literal_target(&date, &mut prefix, &mut suffix).push(other),
            }
        }

        let date = date.ok_or_else(|| invalid("no {0:...} timestamp placeholder"))?;
        Ok(Self {
            raw: raw.to_string(),
            prefix,
            suffix,
            date,
        })
    }

    /// 📡 Render the index name for `timestamp`.
    pub fn format(&self, timestamp: &DateTime<FixedOffset>) -> String {
        let mut out = String::with_capacity(self.raw.len() + 16);
        out.push_str(&self.prefix);
        for token in &self.date {
            render_token(token, timestamp, &mut out);
        }
        out.push_str(&self.suffix);
        out
    }

    /// 🎯 The placeholder swapped for `*`, prefix and suffix untouched.
    pub fn wildcard(&self) -> String {
        format!("{}*{}", self.prefix, self.suffix)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

// Text before the placeholder is prefix, text after it is suffix.
fn literal_target<'a>(
    date: &Option<Vec<DateToken>>,
    prefix: &'a mut String,
    suffix: &'a mut String,
) -> &'a mut String {
    if date.is_some() { suffix } else { prefix }
}

fn compile_date_spec(spec: &str) -> Result<Vec<DateToken>, String> {
    let chars: Vec<char> = spec.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let run = chars[i..].iter().take_while(|&&x| x == c).count();
        let token = match c {
            'y' => DateToken::Year(run),
            'M' => DateToken::Month(run),
            'd' => DateToken::Day(run),
            'H' => DateToken::Hour24(run),
            'h' => DateToken::Hour12(run),
            'm' => DateToken::Minute(run),
            's' => DateToken::Second(run),
            'f' if run > 7 => return Err(format!("'{}' has more than 7 fraction digits", "f".repeat(run))),
            'f' => DateToken::Fraction(run),
            't' => DateToken::AmPm(run),
            'z' => DateToken::Offset(run),
            '\'' | '"' => {
                let close = chars[i + 1..]
                    .iter()
                    .position(|&x| x == c)
                    .ok_or_else(|| format!("unterminated {c} quote in the date pattern"))?;
                let quoted: String = chars[i + 1..i + 1 + close].iter().collect();
                push_literal(&mut tokens, &quoted);
                i += close + 2;
                continue;
            }
            '\\' => {
                let escaped = chars
                    .get(i + 1)
                    .ok_or_else(|| "trailing '\\' in the date pattern".to_string())?;
                push_literal(&mut tokens, &escaped.to_string());
                i += 2;
                continue;
            }
            // '%' only marks a single-letter pattern; it renders nothing
            '%' => {
                i += 1;
                continue;
            }
            other => {
                push_literal(&mut tokens, &other.to_string());
                i += 1;
                continue;
            }
        };
        tokens.push(token);
        i += run;
    }

    Ok(tokens)
}

fn push_literal(tokens: &mut Vec<DateToken>, text: &str) {
    if let Some(DateToken::Literal(existing)) = tokens.last_mut() {
        existing.push_str(text);
    } else {
        tokens.push(DateToken::Literal(text.to_string()));
    }
}

fn render_token(token: &DateToken, ts: &DateTime<FixedOffset>, out: &mut String) {
    use std::fmt::Write;

    // 🔧 write! into a String can't fail; the Result is noise
    let _ = match token {
        DateToken::Literal(text) => {
            out.push_str(text);
            Ok(())
        }
        DateToken::Year(n) if *n <= 2 => write!(out, "{:0n$}", ts.year().rem_euclid(100), n = *n),
        DateToken::Year(n) => write!(out, "{:0n$}", ts.year(), n = *n),
        DateToken::Month(n) if *n >= 4 => write!(out, "{}", MONTH_NAMES[ts.month0() as usize]),
        DateToken::Month(3) => write!(out, "{}", &MONTH_NAMES[ts.month0() as usize][..3]),
        DateToken::Month(n) => write!(out, "{:0n$}", ts.month(), n = *n),
        DateToken::Day(n) if *n >= 4 => write!(
            out,
            "{}",
            DAY_NAMES[ts.weekday().num_days_from_monday() as usize]
        ),
        DateToken::Day(3) => write!(
            out,
            "{}",
            &DAY_NAMES[ts.weekday().num_days_from_monday() as usize][..3]
        ),
        DateToken::Day(n) => write!(out, "{:0n$}", ts.day(), n = *n),
        DateToken::Hour24(n) => write!(out, "{:0n$}", ts.hour(), n = (*n).min(2)),
        DateToken::Hour12(n) => write!(out, "{:0n$}", ts.hour12().1, n = (*n).min(2)),
        DateToken::Minute(n) => write!(out, "{:0n$}", ts.minute(), n = (*n).min(2)),
        DateToken::Second(n) => write!(out, "{:0n$}", ts.second(), n = (*n).min(2)),
        DateToken::Fraction(n) => {
            // leap seconds push nanosecond() past 1e9; fold them back
            let nanos = ts.nanosecond() % 1_000_000_000;
            let digits = nanos / 10u32.pow(9 - *n as u32);
            write!(out, "{:0n$}", digits, n = *n)
        }
        DateToken::AmPm(n) => {
            let marker = if ts.hour12().0 { "PM" } else { "AM" };
            out.push_str(if *n == 1 { &marker[..1] } else { marker });
            Ok(())
        }
        DateToken::Offset(n) => {
            let seconds = ts.offset().local_minus_utc();
            let sign = if seconds < 0 { '-' } else { '+' };
            let hours = seconds.abs() / 3600;
            let minutes = (seconds.abs() % 3600) / 60;
            match n {
                1 => write!(out, "{sign}{hours}"),
                2 => write!(out, "{sign}{hours:02}"),
                _ => write!(out, "{sign}{hours:02}:{minutes:02}"),
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .expect("💀 UTC offset should exist")
            .with_ymd_and_hms(y, mo, d, h, mi, s)
            .single()
            .expect("💀 test timestamp should be unambiguous")
    }

    fn parse(raw: &str) -> IndexFormat {
        IndexFormat::parse("index_format", raw).expect("💀 test format should compile")
    }

    #[test]
    fn the_one_where_the_wildcard_keeps_prefix_and_suffix() {
        assert_eq!(parse("logs-{0:yyyy.MM}").wildcard(), "logs-*");
        assert_eq!(parse("app-{0:yyyy.MM.dd}-eu").wildcard(), "app-*-eu");
        assert_eq!(parse("{0:yyyy}").wildcard(), "*");
    }

    #[test]
    fn the_one_where_a_month_becomes_an_index() {
        let ts = at(2024, 1, 15, 8, 30, 0);
        assert_eq!(parse("logs-{0:yyyy.MM}").format(&ts), "logs-2024.01");
        assert_eq!(parse("deadletter-{0:yyyy.MM.dd}").format(&ts), "deadletter-2024.01.15");
    }

    #[test]
    fn the_one_where_every_token_shows_up_to_work() {
        let ts = FixedOffset::east_opt(5 * 3600 + 30 * 60)
            .expect("💀 +05:30 should exist")
            .with_ymd_and_hms(2024, 3, 7, 14, 5, 9)
            .single()
            .expect("💀 unambiguous")
            + chrono::Duration::milliseconds(123);

        let f = parse("x-{0:yyyy-MM-ddTHH:mm:ss.fff zzz}");
        assert_eq!(f.format(&ts), "x-2024-03-07T14:05:09.123 +05:30");

        let f = parse("x-{0:dddd, MMMM d yy}");
        assert_eq!(f.format(&ts), "x-Thursday, March 7 24");

        let f = parse("x-{0:ddd MMM h:m tt z}");
        assert_eq!(f.format(&ts), "x-Thu Mar 2:5 PM +5");
    }

    #[test]
    fn the_one_where_quotes_and_escapes_stay_literal() {
        let ts = at(2024, 1, 15, 0, 0, 0);
        assert_eq!(parse("l-{0:yyyy'week'MM}").format(&ts), "l-2024week01");
        assert_eq!(parse("l-{0:yyyy\\dMM}").format(&ts), "l-2024d01");
        assert_eq!(parse("{{l}}-{0:yyyy}").format(&ts), "{l}-2024");
        assert_eq!(parse("{{l}}-{0:yyyy}").wildcard(), "{l}-*");
    }

    #[test]
    fn the_one_where_bad_formats_get_bounced_at_the_door() {
        for raw in [
            "logs",
            "logs-{0}",
            "logs-{0:}",
            "logs-{1:yyyy}",
            "logs-{0:yyyy}-{0:MM}",
            "logs-{0:yyyy",
            "logs-}",
            "logs-{0:yyyy'oops}",
            "logs-{0:ffffffff}",
        ] {
            let err = IndexFormat::parse("index_format", raw)
                .expect_err("💀 a broken format compiled. The bouncer was asleep.");
            assert!(
                matches!(err, ConfigurationError::InvalidIndexFormat { field: "index_format", .. }),
                "unexpected error for {raw}: {err:?}"
            );
        }
    }
}
