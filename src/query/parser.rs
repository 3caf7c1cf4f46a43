/// Parser for the connector's query sub-language
///
/// ```text
/// query      := "SELECT" fieldlist "FROM" fromclause [wherecause] [";"]
/// fieldlist  := field ("," field)*
/// field      := '"' text '"' | bareword
/// fromclause := '"' tablename "<" filename ">" '"'
/// wherecause := "WHERE" cond ("AND" cond)*
/// cond       := field "=" ( '"' text '"' | "'" text "'" )
/// ```
///
/// Single left-to-right scan over the text with an explicit cursor. Keywords are
/// case-insensitive, blanks before every token are skipped and a delimited token
/// may not span lines.
use crate::error::{ConnectorError, ConnectorResult};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;

pub const SELECT_SECTION: &str = "SELECT";
pub const FROM_SECTION: &str = "FROM";
pub const WHERE_SECTION: &str = "WHERE";

const BLANK_CHARS: [char; 4] = [' ', '\t', '\r', '\n'];
const LINE_BREAK_CHARS: [char; 2] = ['\r', '\n'];
const BAREWORD_TERMINATORS: [char; 6] = [' ', '\t', '\r', '\n', ',', '='];

/// A field referenced by name or by position (`@N`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum FieldRef {
    Name(String),
    Position(usize),
}

impl FieldRef {
    /// Classify a field token; `@N` with N a non-negative integer is a position
    pub fn parse(token: &str) -> Self {
        static POSITION: OnceLock<Regex> = OnceLock::new();
        let re = POSITION.get_or_init(|| Regex::new(r"^@([0-9]+)$").expect("valid position regex"));

        re.captures(token)
            .and_then(|caps| caps[1].parse::<usize>().ok())
            .map(FieldRef::Position)
            .unwrap_or_else(|| FieldRef::Name(token.to_string()))
    }

    /// The token as the user wrote it
    pub fn token(&self) -> String {
        match self {
            FieldRef::Name(name) => name.clone(),
            FieldRef::Position(position) => format!("@{}", position),
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token())
    }
}

/// Equality filter from the WHERE clause. An empty value is meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct WhereCondition {
    pub field: FieldRef,
    pub value: String,
}

impl WhereCondition {
    pub fn new(field: impl AsRef<str>, value: impl Into<String>) -> Self {
        Self {
            field: FieldRef::parse(field.as_ref()),
            value: value.into(),
        }
    }
}

/// Structured extraction request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedQuery {
    pub fields: Vec<FieldRef>,
    pub table: String,
    pub source_file: String,
    pub conditions: Vec<WhereCondition>,
}

/// Parse a SELECT/FROM/WHERE query
pub fn parse_query(query: &str) -> ConnectorResult<ParsedQuery> {
    let mut cursor = Cursor::new(query);
    let fields = collect_select(&mut cursor)?;
    let (table, source_file) = collect_from(&mut cursor)?;
    let conditions = collect_where(&mut cursor)?;

    Ok(ParsedQuery {
        fields,
        table,
        source_file,
        conditions,
    })
}

fn collect_select(cursor: &mut Cursor<'_>) -> ConnectorResult<Vec<FieldRef>> {
    cursor.expect_keyword("select", SELECT_SECTION)?;

    let mut fields = vec![read_field(cursor, SELECT_SECTION)?];
    while cursor.consume_literal(",") {
        fields.push(read_field(cursor, SELECT_SECTION)?);
    }
    Ok(fields)
}

fn collect_from(cursor: &mut Cursor<'_>) -> ConnectorResult<(String, String)> {
    cursor.expect_keyword("from", FROM_SECTION)?;
    let from = cursor.collect_between('"', FROM_SECTION)?;

    let mut inner = Cursor::new(from.trim());
    let table = inner.collect_until(&['<'], FROM_SECTION)?.trim().to_string();
    inner.expect_literal("<", FROM_SECTION)?;
    let file = inner.collect_until(&['>'], FROM_SECTION)?.trim().to_string();
    inner.expect_literal(">", FROM_SECTION)?;
    inner.consume_blank();
    if !inner.at_end() {
        return Err(ConnectorError::syntax(
            FROM_SECTION,
            format!("Unexpected text after the file name: {}", inner.rest()),
        ));
    }

    if table.is_empty() {
        return Err(ConnectorError::syntax(FROM_SECTION, "Missing table name"));
    }
    if file.is_empty() {
        return Err(ConnectorError::syntax(FROM_SECTION, "Missing file name"));
    }
    Ok((table, file))
}

fn collect_where(cursor: &mut Cursor<'_>) -> ConnectorResult<Vec<WhereCondition>> {
    let mut conditions = Vec::new();

    if cursor.consume_keyword("where") {
        conditions.push(collect_condition(cursor)?);
        while cursor.consume_keyword("and") {
            conditions.push(collect_condition(cursor)?);
        }
    }

    cursor.consume_literal(";");
    cursor.consume_blank();
    if !cursor.at_end() {
        return Err(ConnectorError::syntax(
            WHERE_SECTION,
            format!("Unexpected text at the end of the query: {}", cursor.rest()),
        ));
    }
    Ok(conditions)
}

fn collect_condition(cursor: &mut Cursor<'_>) -> ConnectorResult<WhereCondition> {
    let field = read_field(cursor, WHERE_SECTION)?;
    cursor.expect_literal("=", WHERE_SECTION)?;

    cursor.consume_blank();
    let value = match cursor.peek() {
        Some(quote @ ('"' | '\'')) => cursor.collect_between(quote, WHERE_SECTION)?,
        _ => {
            return Err(ConnectorError::syntax(
                WHERE_SECTION,
                "The value of a condition should be enclosed between quotes",
            ))
        }
    };
    Ok(WhereCondition { field, value })
}

fn read_field(cursor: &mut Cursor<'_>, section: &str) -> ConnectorResult<FieldRef> {
    cursor.consume_blank();
    let token = match cursor.peek() {
        Some('"') => cursor.collect_between('"', section)?,
        Some(_) => {
            let word = cursor.collect_until(&BAREWORD_TERMINATORS, section)?;
            if word.is_empty() {
                return Err(ConnectorError::syntax(section, "Missing field name"));
            }
            word
        }
        None => return Err(ConnectorError::syntax(section, "Unexpected end of query, expected a field")),
    };
    Ok(FieldRef::parse(&token))
}

/// Byte cursor over the query text
struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn consume_blank(&mut self) {
        let rest = self.rest();
        let skipped = rest.len() - rest.trim_start_matches(BLANK_CHARS).len();
        self.pos += skipped;
    }

    /// Consume `expected` (case-insensitive) after blanks, if present
    fn consume_literal(&mut self, expected: &str) -> bool {
        self.consume_blank();
        let matched = self
            .rest()
            .get(..expected.len())
            .map_or(false, |head| head.eq_ignore_ascii_case(expected));
        if matched {
            self.pos += expected.len();
        }
        matched
    }

    /// Like `consume_literal`, but the keyword must not run into a following word
    fn consume_keyword(&mut self, keyword: &str) -> bool {
        let start = self.pos;
        if !self.consume_literal(keyword) {
            return false;
        }
        let joined = self
            .peek()
            .map_or(false, |c| c.is_alphanumeric() || c == '_' || c == '@');
        if joined {
            self.pos = start;
            return false;
        }
        true
    }

    fn expect_literal(&mut self, expected: &str, section: &str) -> ConnectorResult<()> {
        if self.consume_literal(expected) {
            Ok(())
        } else {
            Err(ConnectorError::syntax(section, format!("Expected text not found: {}", expected)))
        }
    }

    fn expect_keyword(&mut self, keyword: &str, section: &str) -> ConnectorResult<()> {
        if self.consume_keyword(keyword) {
            Ok(())
        } else {
            Err(ConnectorError::syntax(
                section,
                format!("Expected text not found: {}", keyword.to_uppercase()),
            ))
        }
    }

    /// Collect characters up to (not including) one of `until`.
    /// Hitting a line break or the end of the text first is an error.
    fn collect_until(&mut self, until: &[char], section: &str) -> ConnectorResult<String> {
        let rest = self.rest();
        for (offset, c) in rest.char_indices() {
            if until.contains(&c) {
                self.pos += offset;
                return Ok(rest[..offset].to_string());
            }
            if LINE_BREAK_CHARS.contains(&c) {
                break;
            }
        }
        Err(ConnectorError::syntax(
            section,
            format!("Expected character not found: {}", describe_chars(until)),
        ))
    }

    fn collect_between(&mut self, delimiter: char, section: &str) -> ConnectorResult<String> {
        let delimiter_text = delimiter.to_string();
        self.expect_literal(&delimiter_text, section)?;
        let inner = self.collect_until(&[delimiter], section)?;
        self.expect_literal(&delimiter_text, section)?;
        Ok(inner)
    }
}

fn describe_chars(chars: &[char]) -> String {
    chars
        .iter()
        .map(|c| match c {
            ' ' => "<space>".to_string(),
            '\t' => "<tab>".to_string(),
            '\r' => "<cr>".to_string(),
            '\n' => "<lf>".to_string(),
            c => c.to_string(),
        })
        .collect::<Vec<_>>()
        .join(",")
}
