//! Zone file parsing with bounds checking
//!
//! This module parses RFC 1035 master files (`$TTL`, `$ORIGIN`, `@`, relative
//! names, parenthesised continuations, comments and quoted strings) into
//! [`ResourceRecord`]s. Every name is checked against label and total length
//! limits; any syntax problem is reported as [`DnsError::ZoneParse`] with the
//! line on which the offending entry starts.

use crate::records::{RecordData, ResourceRecord};
use dns_core::{DnsClass, DnsError, DnsResult, RecordType, MAX_DOMAIN_NAME_LENGTH, MAX_LABEL_LENGTH};
use std::iter::Peekable;
use std::str::Chars;

/// A single lexical token; quoted tokens never act as names or keywords
#[derive(Debug, Clone, PartialEq)]
struct Token {
    text: String,
    quoted: bool,
}

/// One logical entry: a line, or several joined by parentheses
#[derive(Debug)]
struct Entry {
    line: usize,
    /// Entry began with whitespace, so it reuses the previous owner
    inherits_owner: bool,
    tokens: Vec<Token>,
}

/// Parser state carried from one entry to the next
#[derive(Debug, Default)]
struct ParseState {
    origin: Option<String>,
    default_ttl: Option<u32>,
    last_ttl: Option<u32>,
    last_owner: Option<String>,
}

/// Master file parser with configurable name limits
#[derive(Debug, Clone)]
pub struct ZoneFileParser {
    /// Maximum domain name length, excluding the root dot
    max_name_length: usize,
    /// Maximum label length
    max_label_length: usize,
    /// Maximum length of a single TXT character-string
    max_txt_string_length: usize,
    /// Origin in effect before any `$ORIGIN` directive
    origin: Option<String>,
}

impl Default for ZoneFileParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ZoneFileParser {
    /// Create a parser with RFC 1035 limits and no initial origin
    pub fn new() -> Self {
        Self {
            max_name_length: MAX_DOMAIN_NAME_LENGTH,
            max_label_length: MAX_LABEL_LENGTH,
            max_txt_string_length: 255,
            origin: None,
        }
    }

    /// Create a parser whose relative names are completed with `origin`
    pub fn with_origin(origin: &str) -> DnsResult<Self> {
        let mut parser = Self::new();
        let absolute = if is_absolute(origin) {
            origin.to_owned()
        } else {
            format!("{}.", origin)
        };
        parser.check_name(&absolute, 0)?;
        parser.origin = Some(absolute);
        Ok(parser)
    }

    /// Parse a complete zone file into its resource records
    pub fn parse(&self, text: &str) -> DnsResult<Vec<ResourceRecord>> {
        let entries = tokenize(text)?;
        let mut state = ParseState {
            origin: self.origin.clone(),
            ..ParseState::default()
        };

        let mut records = Vec::new();
        for entry in &entries {
            let first = &entry.tokens[0];
            if !entry.inherits_owner && !first.quoted && first.text.starts_with('$') {
                self.apply_directive(entry, &mut state)?;
            } else {
                records.push(self.parse_record(entry, &mut state)?);
            }
        }

        tracing::debug!(entries = entries.len(), records = records.len(), "Parsed zone file");
        Ok(records)
    }

    fn apply_directive(&self, entry: &Entry, state: &mut ParseState) -> DnsResult<()> {
        let directive = entry.tokens[0].text.to_ascii_uppercase();
        let args = &entry.tokens[1..];

        match directive.as_str() {
            "$TTL" => {
                let [value] = args else {
                    return Err(DnsError::zone_parse(entry.line, "$TTL takes exactly one value"));
                };
                let ttl = parse_ttl(&value.text).ok_or_else(|| {
                    DnsError::zone_parse(entry.line, format!("invalid TTL {:?}", value.text))
                })?;
                state.default_ttl = Some(ttl);
            }
            "$ORIGIN" => {
                let [value] = args else {
                    return Err(DnsError::zone_parse(entry.line, "$ORIGIN takes exactly one name"));
                };
                let origin = self.absolute_name(&value.text, state.origin.as_deref(), entry.line)?;
                state.origin = Some(origin);
            }
            "$INCLUDE" | "$GENERATE" => {
                return Err(DnsError::zone_parse(
                    entry.line,
                    format!("{} is not supported", directive),
                ));
            }
            _ => {
                return Err(DnsError::zone_parse(
                    entry.line,
                    format!("unknown directive {}", directive),
                ));
            }
        }

        Ok(())
    }

    fn parse_record(&self, entry: &Entry, state: &mut ParseState) -> DnsResult<ResourceRecord> {
        let line = entry.line;

        let (name, mut idx) = if entry.inherits_owner {
            let owner = state.last_owner.clone().ok_or_else(|| {
                DnsError::zone_parse(line, "record has no owner and there is no previous owner")
            })?;
            (owner, 0)
        } else {
            let owner = &entry.tokens[0];
            if owner.quoted {
                return Err(DnsError::zone_parse(line, "owner name cannot be quoted"));
            }
            (self.absolute_name(&owner.text, state.origin.as_deref(), line)?, 1)
        };

        // TTL and class may appear in either order, each at most once
        let mut ttl = None;
        let mut class = None;
        while let Some(token) = entry.tokens.get(idx) {
            if token.quoted {
                break;
            }
            if ttl.is_none() && token.text.starts_with(|c: char| c.is_ascii_digit()) {
                let value = parse_ttl(&token.text).ok_or_else(|| {
                    DnsError::zone_parse(line, format!("invalid TTL {:?}", token.text))
                })?;
                ttl = Some(value);
            } else if class.is_none() && parse_class(&token.text).is_some() {
                class = parse_class(&token.text);
            } else {
                break;
            }
            idx += 1;
        }

        let type_token = entry
            .tokens
            .get(idx)
            .filter(|token| !token.quoted)
            .ok_or_else(|| DnsError::zone_parse(line, "missing record type"))?;
        let type_code = parse_type(&type_token.text).ok_or_else(|| {
            DnsError::zone_parse(line, format!("unknown record type {:?}", type_token.text))
        })?;

        let ttl = ttl
            .or(state.default_ttl)
            .or(state.last_ttl)
            .ok_or_else(|| DnsError::zone_parse(line, "missing TTL with no previous value"))?;

        let data = self.parse_rdata(type_code, &entry.tokens[idx + 1..], state.origin.as_deref(), line)?;

        state.last_owner = Some(name.clone());
        state.last_ttl = Some(ttl);

        Ok(ResourceRecord {
            name,
            ttl,
            class: class.unwrap_or(DnsClass::IN),
            type_code,
            data,
            line,
        })
    }

    fn parse_rdata(
        &self,
        type_code: u16,
        tokens: &[Token],
        origin: Option<&str>,
        line: usize,
    ) -> DnsResult<RecordData> {
        let fields: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        let rtype = RecordType::from_u16(type_code);
        let type_name = rtype
            .map(|t| t.mnemonic().to_string())
            .unwrap_or_else(|| format!("TYPE{}", type_code));
        let expect = |count: usize| -> DnsResult<()> {
            if fields.len() == count {
                Ok(())
            } else {
                Err(DnsError::zone_parse(
                    line,
                    format!("{} expects {} RDATA fields, found {}", type_name, count, fields.len()),
                ))
            }
        };
        let number = |field: &str| -> DnsResult<u16> {
            field
                .parse()
                .map_err(|_| DnsError::zone_parse(line, format!("invalid number {:?}", field)))
        };
        let interval = |field: &str| -> DnsResult<u32> {
            parse_ttl(field)
                .ok_or_else(|| DnsError::zone_parse(line, format!("invalid time value {:?}", field)))
        };

        let data = match rtype {
            Some(RecordType::A) => {
                expect(1)?;
                RecordData::A(fields[0].parse().map_err(|_| {
                    DnsError::zone_parse(line, format!("invalid IPv4 address {:?}", fields[0]))
                })?)
            }
            Some(RecordType::AAAA) => {
                expect(1)?;
                RecordData::AAAA(fields[0].parse().map_err(|_| {
                    DnsError::zone_parse(line, format!("invalid IPv6 address {:?}", fields[0]))
                })?)
            }
            Some(RecordType::NS) => {
                expect(1)?;
                RecordData::NS(self.absolute_name(fields[0], origin, line)?)
            }
            Some(RecordType::CNAME) => {
                expect(1)?;
                RecordData::CNAME(self.absolute_name(fields[0], origin, line)?)
            }
            Some(RecordType::PTR) => {
                expect(1)?;
                RecordData::PTR(self.absolute_name(fields[0], origin, line)?)
            }
            Some(RecordType::MX) => {
                expect(2)?;
                RecordData::MX {
                    priority: number(fields[0])?,
                    exchange: self.absolute_name(fields[1], origin, line)?,
                }
            }
            Some(RecordType::TXT) => {
                if fields.is_empty() {
                    return Err(DnsError::zone_parse(line, "TXT record has no strings"));
                }
                if let Some(long) = fields.iter().find(|s| s.len() > self.max_txt_string_length) {
                    return Err(DnsError::zone_parse(
                        line,
                        format!("TXT string of {} bytes exceeds {}", long.len(), self.max_txt_string_length),
                    ));
                }
                RecordData::TXT(fields.iter().map(|s| s.to_string()).collect())
            }
            Some(RecordType::SOA) => {
                expect(7)?;
                RecordData::SOA {
                    mname: self.absolute_name(fields[0], origin, line)?,
                    rname: self.absolute_name(fields[1], origin, line)?,
                    serial: fields[2].parse().map_err(|_| {
                        DnsError::zone_parse(line, format!("invalid SOA serial {:?}", fields[2]))
                    })?,
                    refresh: interval(fields[3])?,
                    retry: interval(fields[4])?,
                    expire: interval(fields[5])?,
                    minimum: interval(fields[6])?,
                }
            }
            Some(RecordType::SRV) => {
                expect(4)?;
                RecordData::SRV {
                    priority: number(fields[0])?,
                    weight: number(fields[1])?,
                    port: number(fields[2])?,
                    target: self.absolute_name(fields[3], origin, line)?,
                }
            }
            Some(RecordType::CAA) => {
                expect(3)?;
                let flags = fields[0].parse().map_err(|_| {
                    DnsError::zone_parse(line, format!("invalid CAA flags {:?}", fields[0]))
                })?;
                if fields[1].is_empty() || !fields[1].chars().all(|c| c.is_ascii_alphanumeric()) {
                    return Err(DnsError::zone_parse(line, format!("invalid CAA tag {:?}", fields[1])));
                }
                RecordData::CAA {
                    flags,
                    tag: fields[1].to_string(),
                    value: fields[2].to_string(),
                }
            }
            _ => {
                if fields.is_empty() {
                    return Err(DnsError::zone_parse(line, format!("{} record has no RDATA", type_name)));
                }
                RecordData::Generic(fields.iter().map(|s| s.to_string()).collect())
            }
        };

        Ok(data)
    }

    /// Resolve `@` and relative names against the origin and check limits
    fn absolute_name(&self, token: &str, origin: Option<&str>, line: usize) -> DnsResult<String> {
        let name = if token == "@" {
            origin
                .map(str::to_owned)
                .ok_or_else(|| DnsError::zone_parse(line, "'@' used with no origin"))?
        } else if is_absolute(token) {
            token.to_owned()
        } else {
            match origin {
                Some(".") => format!("{}.", token),
                Some(origin) => format!("{}.{}", token, origin),
                None => {
                    return Err(DnsError::zone_parse(
                        line,
                        format!("relative name {:?} with no origin", token),
                    ))
                }
            }
        };

        self.check_name(&name, line)?;
        Ok(name)
    }

    fn check_name(&self, name: &str, line: usize) -> DnsResult<()> {
        if name == "." {
            return Ok(());
        }

        let bare = name.strip_suffix('.').unwrap_or(name);
        if bare.len() > self.max_name_length {
            return Err(DnsError::zone_parse(
                line,
                format!("name of {} bytes exceeds {}", bare.len(), self.max_name_length),
            ));
        }
        for label in bare.split('.') {
            if label.is_empty() {
                return Err(DnsError::zone_parse(line, format!("empty label in {:?}", name)));
            }
            if label.len() > self.max_label_length {
                return Err(DnsError::zone_parse(
                    line,
                    format!("label {:?} exceeds {} bytes", label, self.max_label_length),
                ));
            }
        }

        Ok(())
    }
}

/// Parse a TTL or SOA interval: plain seconds or unit-suffixed (`1h30m`, `1W`)
pub fn parse_ttl(token: &str) -> Option<u32> {
    if token.is_empty() {
        return None;
    }
    if token.bytes().all(|b| b.is_ascii_digit()) {
        return token.parse().ok();
    }

    let mut total: u32 = 0;
    let mut value: Option<u32> = None;
    for c in token.chars() {
        if let Some(digit) = c.to_digit(10) {
            value = Some(value.unwrap_or(0).checked_mul(10)?.checked_add(digit)?);
        } else {
            let multiplier = match c.to_ascii_lowercase() {
                's' => 1,
                'm' => 60,
                'h' => 3_600,
                'd' => 86_400,
                'w' => 604_800,
                _ => return None,
            };
            total = total.checked_add(value.take()?.checked_mul(multiplier)?)?;
        }
    }

    // A trailing number without a unit is ambiguous once units are in use
    if value.is_some() {
        return None;
    }
    Some(total)
}

fn parse_class(token: &str) -> Option<DnsClass> {
    DnsClass::from_mnemonic(token).or_else(|| {
        let digits = token.get(..5).filter(|p| p.eq_ignore_ascii_case("CLASS")).map(|_| &token[5..])?;
        DnsClass::from_u16(digits.parse().ok()?)
    })
}

fn parse_type(token: &str) -> Option<u16> {
    if let Some(rtype) = RecordType::from_mnemonic(token) {
        return Some(rtype.to_u16());
    }
    let digits = token.get(..4).filter(|p| p.eq_ignore_ascii_case("TYPE")).map(|_| &token[4..])?;
    digits.parse().ok()
}

fn is_absolute(name: &str) -> bool {
    name.ends_with('.') && !name.ends_with("\\.")
}

/// Split zone file text into logical entries
fn tokenize(text: &str) -> DnsResult<Vec<Entry>> {
    let mut entries = Vec::new();
    let mut current = Entry {
        line: 1,
        inherits_owner: false,
        tokens: Vec::new(),
    };
    let mut chars = text.chars().peekable();
    let mut line = 1;
    let mut depth = 0usize;
    let mut open_line = 0;
    let mut at_line_start = true;

    while let Some(&c) = chars.peek() {
        if at_line_start {
            at_line_start = false;
            if depth == 0 {
                let next = Entry {
                    line,
                    inherits_owner: c == ' ' || c == '\t',
                    tokens: Vec::new(),
                };
                let finished = std::mem::replace(&mut current, next);
                if !finished.tokens.is_empty() {
                    entries.push(finished);
                }
            }
        }

        match c {
            '\n' => {
                chars.next();
                line += 1;
                at_line_start = true;
            }
            ' ' | '\t' | '\r' => {
                chars.next();
            }
            ';' => {
                while chars.peek().is_some_and(|&c| c != '\n') {
                    chars.next();
                }
            }
            '(' => {
                chars.next();
                if depth == 0 {
                    open_line = line;
                }
                depth += 1;
            }
            ')' => {
                chars.next();
                if depth == 0 {
                    return Err(DnsError::zone_parse(line, "unbalanced ')'"));
                }
                depth -= 1;
            }
            '"' => {
                chars.next();
                let text = read_quoted(&mut chars, line)?;
                current.tokens.push(Token { text, quoted: true });
            }
            _ => {
                let text = read_bare(&mut chars);
                current.tokens.push(Token { text, quoted: false });
            }
        }
    }

    if depth > 0 {
        return Err(DnsError::zone_parse(open_line, "unbalanced '('"));
    }
    if !current.tokens.is_empty() {
        entries.push(current);
    }

    Ok(entries)
}

fn read_quoted(chars: &mut Peekable<Chars<'_>>, line: usize) -> DnsResult<String> {
    let mut text = String::new();
    loop {
        match chars.next() {
            None => return Err(DnsError::zone_parse(line, "unterminated quoted string")),
            Some('\n') => return Err(DnsError::zone_parse(line, "newline in quoted string")),
            Some('"') => return Ok(text),
            Some('\\') => text.push(read_escape(chars, line)?),
            Some(c) => text.push(c),
        }
    }
}

/// Decode `\X` or `\DDD` inside a quoted string
fn read_escape(chars: &mut Peekable<Chars<'_>>, line: usize) -> DnsResult<char> {
    let first = chars
        .next()
        .ok_or_else(|| DnsError::zone_parse(line, "dangling escape"))?;
    let Some(high) = first.to_digit(10) else {
        return Ok(first);
    };

    let mut value = high;
    for _ in 0..2 {
        let digit = chars
            .next()
            .and_then(|c| c.to_digit(10))
            .ok_or_else(|| DnsError::zone_parse(line, "escape must be \\DDD"))?;
        value = value * 10 + digit;
    }
    u8::try_from(value)
        .map(char::from)
        .map_err(|_| DnsError::zone_parse(line, format!("escape \\{} out of range", value)))
}

/// Read an unquoted token; escape sequences are kept verbatim
fn read_bare(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut text = String::new();
    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\r' | '\n' | ';' | '(' | ')' | '"' => break,
            '\\' => {
                text.push(c);
                chars.next();
                if let Some(escaped) = chars.next() {
                    text.push(escaped);
                }
            }
            _ => {
                text.push(c);
                chars.next();
            }
        }
    }
    text
}
