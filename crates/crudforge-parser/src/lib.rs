//! Parser for SQL DDL.
//!
//! Implements a recursive descent parser that turns `CREATE TABLE` and
//! `ALTER TABLE ... ADD` statements into a [`SqlSchema`]. Statements that do
//! not describe tables are skipped up to the next top-level `;`.

mod format;

use std::collections::HashMap;
use std::ops::Range;

use ariadne::{Color, Label, Report, ReportKind, Source};
use crudforge_lexer::{lex, LexerError, SpannedToken, Token};
use crudforge_schema::{ForeignKey, ReferentialAction, SqlColumn, SqlSchema, SqlTable, SqlType};
use thiserror::Error;
use tracing::{debug, trace};

pub use format::format_schema;

/// Parser error types.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("lexer error: {message}")]
    LexerError { span: Range<usize>, message: String },

    #[error("unexpected token: expected {expected}, found {found}")]
    UnexpectedToken {
        span: Range<usize>,
        expected: String,
        found: String,
    },

    #[error("unexpected end of input: expected {expected}")]
    UnexpectedEof { span: Range<usize>, expected: String },

    #[error("{message}")]
    Custom { span: Range<usize>, message: String },
}

impl From<LexerError> for ParseError {
    fn from(err: LexerError) -> Self {
        ParseError::LexerError {
            span: err.span,
            message: err.message,
        }
    }
}

impl ParseError {
    /// Returns the span of this error.
    pub fn span(&self) -> Range<usize> {
        match self {
            ParseError::LexerError { span, .. }
            | ParseError::UnexpectedToken { span, .. }
            | ParseError::UnexpectedEof { span, .. }
            | ParseError::Custom { span, .. } => span.clone(),
        }
    }

    fn label(&self) -> String {
        match self {
            ParseError::LexerError { message, .. } | ParseError::Custom { message, .. } => {
                message.clone()
            }
            ParseError::UnexpectedToken {
                expected, found, ..
            } => format!("expected {expected}, found {found}"),
            ParseError::UnexpectedEof { expected, .. } => format!("expected {expected}"),
        }
    }

    /// Writes a pretty error report using ariadne.
    pub fn write_report<W: std::io::Write>(
        &self,
        filename: &str,
        source: &str,
        out: W,
    ) -> std::io::Result<()> {
        let span = self.span();
        Report::build(ReportKind::Error, filename, span.start)
            .with_message(self.to_string())
            .with_label(
                Label::new((filename, span))
                    .with_message(self.label())
                    .with_color(Color::Red),
            )
            .finish()
            .write((filename, Source::from(source)), out)
    }

    /// Prints a pretty error report to stderr.
    pub fn report(&self, filename: &str, source: &str) -> std::io::Result<()> {
        self.write_report(filename, source, std::io::stderr())
    }
}

/// Parser for SQL DDL.
pub struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
    source: String,
    enum_types: HashMap<String, Vec<String>>,
}

impl Parser {
    /// Creates a new parser for the given source.
    pub fn new(source: &str) -> Result<Self, ParseError> {
        let tokens = lex(source)?;
        Ok(Self {
            tokens,
            pos: 0,
            source: source.to_string(),
            enum_types: HashMap::new(),
        })
    }

    /// Returns the current token, if any.
    fn current(&self) -> Option<&SpannedToken> {
        self.tokens.get(self.pos)
    }

    /// Returns the current token's token type, if any.
    fn current_token(&self) -> Option<&Token> {
        self.current().map(|st| &st.token)
    }

    /// Returns the token `n` positions ahead.
    fn peek_token(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n).map(|st| &st.token)
    }

    /// Advances to the next token.
    fn advance(&mut self) {
        self.pos += 1;
    }

    /// Checks if we've reached the end of input.
    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Returns the span of the current token, or an empty span at the end of input.
    fn current_span(&self) -> Range<usize> {
        match self.current() {
            Some(st) => st.span.clone(),
            None => self.source.len()..self.source.len(),
        }
    }

    /// Returns the end offset of the last consumed token.
    fn last_end(&self) -> usize {
        if self.pos > 0 {
            self.tokens[self.pos - 1].span.end
        } else {
            0
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        match self.current() {
            Some(st) => ParseError::UnexpectedToken {
                span: st.span.clone(),
                expected: expected.to_string(),
                found: format!("{:?}", st.token),
            },
            None => ParseError::UnexpectedEof {
                span: self.current_span(),
                expected: expected.to_string(),
            },
        }
    }

    /// Expects and consumes a specific token.
    fn expect(&mut self, expected: Token) -> Result<SpannedToken, ParseError> {
        match self.current() {
            Some(st) if std::mem::discriminant(&st.token) == std::mem::discriminant(&expected) => {
                let st = st.clone();
                self.advance();
                Ok(st)
            }
            _ => Err(self.unexpected(&format!("{expected:?}"))),
        }
    }

    /// Consumes the current token if it matches `token`.
    fn eat(&mut self, token: Token) -> bool {
        if self.current_token() == Some(&token) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consumes the current token if it is the bare word `word`.
    fn eat_word(&mut self, word: &str) -> bool {
        if self.current_token().is_some_and(|t| t.is_word(word)) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Expects and consumes an identifier, returning its name.
    ///
    /// Accepts bare, quoted and bracketed (`[name]`) identifiers as well as
    /// non-reserved keywords.
    fn expect_ident(&mut self) -> Result<(String, Range<usize>), ParseError> {
        if matches!(self.current_token(), Some(Token::LBracket)) {
            let start = self.current_span().start;
            self.advance();
            let (name, _) = self.expect_ident()?;
            let end = self.expect(Token::RBracket)?.span.end;
            return Ok((name, start..end));
        }

        match self.current() {
            Some(st) => match st.token.as_ident() {
                Some(name) => {
                    let result = (name.to_string(), st.span.clone());
                    self.advance();
                    Ok(result)
                }
                None => Err(self.unexpected("identifier")),
            },
            None => Err(self.unexpected("identifier")),
        }
    }

    /// Parses `[schema.]name`, returning the last component.
    fn parse_qualified_name(&mut self) -> Result<(String, Range<usize>), ParseError> {
        let (mut name, mut span) = self.expect_ident()?;
        while self.eat(Token::Dot) {
            (name, span) = self.expect_ident()?;
        }
        Ok((name, span))
    }

    /// Parses a parenthesized, comma-separated identifier list.
    fn parse_ident_list(&mut self) -> Result<Vec<String>, ParseError> {
        self.expect(Token::LParen)?;
        let mut names = Vec::new();
        loop {
            let (name, _) = self.expect_ident()?;
            names.push(name);
            // Index column options: `(name ASC)`, `(title(20))`
            while !matches!(self.current_token(), Some(Token::Comma | Token::RParen) | None) {
                self.skip_token_tree();
            }
            if !self.eat(Token::Comma) {
                break;
            }
        }
        self.expect(Token::RParen)?;
        Ok(names)
    }

    /// Skips one token, or a whole balanced group if it starts with `(`.
    fn skip_token_tree(&mut self) {
        if !matches!(self.current_token(), Some(Token::LParen)) {
            self.advance();
            return;
        }
        let mut depth = 0usize;
        while let Some(token) = self.current_token() {
            match token {
                Token::LParen => depth += 1,
                Token::RParen => depth -= 1,
                _ => {}
            }
            self.advance();
            if depth == 0 {
                break;
            }
        }
    }

    /// Skips tokens until the next top-level `;`, consuming it.
    fn skip_statement(&mut self) {
        let start = self.current_span().start;
        while let Some(token) = self.current_token() {
            if matches!(token, Token::Semicolon) {
                self.advance();
                break;
            }
            self.skip_token_tree();
        }
        trace!(start, end = self.last_end(), "skipped statement");
    }

    /// Skips tokens up to the `,`, `)` or `;` that ends a table element.
    fn skip_to_element_end(&mut self) {
        while !matches!(
            self.current_token(),
            Some(Token::Comma | Token::RParen | Token::Semicolon) | None
        ) {
            self.skip_token_tree();
        }
    }

    /// Parses the entire schema.
    pub fn parse(&mut self) -> Result<SqlSchema, ParseError> {
        let mut schema = SqlSchema::new();

        while !self.at_end() {
            match self.current_token() {
                Some(Token::Semicolon) => self.advance(),
                Some(Token::Create) if self.is_create_table() => {
                    if let Some(table) = self.parse_create_table()? {
                        debug!(table = %table.name, columns = table.columns.len(), "parsed table");
                        schema.tables.push(table);
                    }
                }
                Some(Token::Create) if self.is_create_enum_type() => self.parse_create_enum_type()?,
                Some(Token::Alter) if matches!(self.peek_token(1), Some(Token::Table)) => {
                    self.parse_alter_table(&mut schema)?;
                }
                Some(_) => self.skip_statement(),
                None => break,
            }
        }

        self.apply_enum_types(&mut schema);
        resolve_implicit_references(&mut schema);
        debug!(tables = schema.tables.len(), "parsed schema");
        Ok(schema)
    }

    /// `CREATE [TEMP|TEMPORARY|UNLOGGED] TABLE`
    fn is_create_table(&self) -> bool {
        match self.peek_token(1) {
            Some(Token::Table) => true,
            Some(t) if t.is_word("temporary") || t.is_word("temp") || t.is_word("unlogged") => {
                matches!(self.peek_token(2), Some(Token::Table))
            }
            _ => false,
        }
    }

    /// `CREATE TYPE name AS ENUM (...)`
    fn is_create_enum_type(&self) -> bool {
        self.peek_token(1).is_some_and(|t| t.is_word("type"))
            && matches!(self.peek_token(3), Some(Token::As) | Some(Token::Dot))
    }

    /// Parses a Postgres enum type so columns using it can be resolved.
    fn parse_create_enum_type(&mut self) -> Result<(), ParseError> {
        self.expect(Token::Create)?;
        self.advance(); // type
        let (name, _) = self.parse_qualified_name()?;
        if !(self.eat(Token::As) && self.eat_word("enum")) {
            self.skip_statement();
            return Ok(());
        }
        let values = self.parse_type_args()?.1;
        self.enum_types.insert(name.to_ascii_lowercase(), values);
        self.skip_statement();
        Ok(())
    }

    /// Parses a `CREATE TABLE` statement. Returns `None` for `CREATE TABLE ... AS`.
    fn parse_create_table(&mut self) -> Result<Option<SqlTable>, ParseError> {
        let start = self.expect(Token::Create)?.span.start;
        if !matches!(self.current_token(), Some(Token::Table)) {
            self.advance(); // TEMPORARY
        }
        self.expect(Token::Table)?;
        if self.eat(Token::If) {
            self.expect(Token::Not)?;
            self.expect(Token::Exists)?;
        }

        let (name, _) = self.parse_qualified_name()?;
        if !matches!(self.current_token(), Some(Token::LParen)) {
            self.skip_statement();
            return Ok(None);
        }

        let mut table = SqlTable::new(name);
        self.expect(Token::LParen)?;
        loop {
            self.parse_table_element(&mut table)?;
            if !self.eat(Token::Comma) {
                break;
            }
        }
        self.expect(Token::RParen)?;
        let end = self.last_end();

        // Table options: ENGINE=InnoDB, WITHOUT ROWID, ...
        self.skip_statement();

        table.span = Some((start, end));
        finish_table(&mut table);
        Ok(Some(table))
    }

    /// Parses one element of a `CREATE TABLE` body.
    fn parse_table_element(&mut self, table: &mut SqlTable) -> Result<(), ParseError> {
        match self.current_token() {
            Some(Token::Constraint) => {
                self.advance();
                let (name, _) = self.expect_ident()?;
                self.parse_table_constraint(table, Some(name))
            }
            Some(Token::Primary | Token::Foreign | Token::Unique | Token::Check) => {
                self.parse_table_constraint(table, None)
            }
            Some(Token::Key | Token::Index) if self.is_index_definition() => {
                self.skip_to_element_end();
                Ok(())
            }
            Some(t) if (t.is_word("fulltext") || t.is_word("spatial"))
                && matches!(self.peek_token(1), Some(Token::Key | Token::Index)) =>
            {
                self.skip_to_element_end();
                Ok(())
            }
            _ => {
                let column = self.parse_column(table)?;
                table.columns.push(column);
                Ok(())
            }
        }
    }

    /// Distinguishes MySQL `KEY name (cols)` from a column named `key`.
    fn is_index_definition(&self) -> bool {
        match (self.peek_token(1), self.peek_token(2)) {
            (Some(Token::LParen), _) => true,
            (Some(next), Some(Token::LParen)) => match next.as_ident() {
                Some(name) => !SqlType::is_known_name(name),
                None => false,
            },
            _ => false,
        }
    }

    /// Parses a table-level constraint.
    fn parse_table_constraint(
        &mut self,
        table: &mut SqlTable,
        name: Option<String>,
    ) -> Result<(), ParseError> {
        match self.current_token() {
            Some(Token::Primary) => {
                self.advance();
                self.expect(Token::Key)?;
                table.primary_key = self.parse_ident_list()?;
            }
            Some(Token::Unique) => {
                self.advance();
                if matches!(self.current_token(), Some(Token::Key | Token::Index)) {
                    self.advance();
                }
                if !matches!(self.current_token(), Some(Token::LParen)) {
                    self.expect_ident()?;
                }
                let columns = self.parse_ident_list()?;
                table.unique_constraints.push(columns);
            }
            Some(Token::Foreign) => {
                self.advance();
                self.expect(Token::Key)?;
                if !matches!(self.current_token(), Some(Token::LParen)) {
                    self.expect_ident()?;
                }
                let columns = self.parse_ident_list()?;
                let fk = self.parse_references(name, columns)?;
                table.foreign_keys.push(fk);
            }
            Some(Token::Check) => {
                self.advance();
                self.skip_token_tree();
            }
            _ => return Err(self.unexpected("table constraint")),
        }
        self.skip_to_element_end();
        Ok(())
    }

    /// Parses `REFERENCES table [(cols)] [ON DELETE action] [ON UPDATE action]`.
    fn parse_references(
        &mut self,
        name: Option<String>,
        columns: Vec<String>,
    ) -> Result<ForeignKey, ParseError> {
        self.expect(Token::References)?;
        let (ref_table, _) = self.parse_qualified_name()?;
        let ref_columns = if matches!(self.current_token(), Some(Token::LParen)) {
            self.parse_ident_list()?
        } else {
            Vec::new()
        };

        let mut fk = ForeignKey {
            name,
            columns,
            ref_table,
            ref_columns,
            on_delete: None,
            on_update: None,
        };

        loop {
            match self.current_token() {
                Some(Token::On) if matches!(self.peek_token(1), Some(Token::Delete)) => {
                    self.advance();
                    self.advance();
                    fk.on_delete = Some(self.parse_referential_action()?);
                }
                Some(Token::On) if matches!(self.peek_token(1), Some(Token::Update)) => {
                    self.advance();
                    self.advance();
                    fk.on_update = Some(self.parse_referential_action()?);
                }
                Some(t) if t.is_word("match") => {
                    self.advance();
                    self.advance();
                }
                Some(t) if t.is_word("deferrable") || t.is_word("initially") => {
                    self.advance();
                }
                Some(t) if t.is_word("deferred") || t.is_word("immediate") => {
                    self.advance();
                }
                Some(Token::Not) if self.peek_token(1).is_some_and(|t| t.is_word("deferrable")) => {
                    self.advance();
                    self.advance();
                }
                _ => break,
            }
        }

        Ok(fk)
    }

    fn parse_referential_action(&mut self) -> Result<ReferentialAction, ParseError> {
        let action = match self.current_token() {
            Some(Token::Cascade) => ReferentialAction::Cascade,
            Some(Token::Restrict) => ReferentialAction::Restrict,
            Some(Token::Set) => {
                self.advance();
                match self.current_token() {
                    Some(Token::Null) => ReferentialAction::SetNull,
                    Some(Token::Default) => ReferentialAction::SetDefault,
                    _ => return Err(self.unexpected("NULL or DEFAULT")),
                }
            }
            Some(Token::No) => {
                self.advance();
                if !matches!(self.current_token(), Some(Token::Action)) {
                    return Err(self.unexpected("ACTION"));
                }
                ReferentialAction::NoAction
            }
            _ => return Err(self.unexpected("referential action")),
        };
        self.advance();
        Ok(action)
    }

    /// Parses a column definition. Column-level keys are recorded on `table`.
    fn parse_column(&mut self, table: &mut SqlTable) -> Result<SqlColumn, ParseError> {
        let (name, name_span) = self.expect_ident()?;
        let (sql_type, serial) = self.parse_type()?;

        let mut column = SqlColumn::new(name, sql_type);
        column.auto_increment = serial;

        let mut constraint_name = None;
        loop {
            match self.current_token() {
                Some(Token::Comma | Token::RParen | Token::Semicolon) | None => break,
                Some(Token::Constraint) => {
                    self.advance();
                    constraint_name = Some(self.expect_ident()?.0);
                    continue;
                }
                Some(Token::Not) => {
                    self.advance();
                    self.expect(Token::Null)?;
                    column.nullable = false;
                }
                Some(Token::Null) => {
                    self.advance();
                    column.nullable = true;
                }
                Some(Token::Primary) => {
                    self.advance();
                    self.expect(Token::Key)?;
                    column.primary_key = true;
                    if !table.primary_key.iter().any(|c| c == &column.name) {
                        table.primary_key.push(column.name.clone());
                    }
                    if !self.eat_word("asc") {
                        self.eat_word("desc");
                    }
                }
                Some(Token::Unique) => {
                    self.advance();
                    self.eat(Token::Key);
                    column.unique = true;
                }
                Some(Token::Default) => {
                    self.advance();
                    column.default = self.parse_default()?;
                }
                Some(Token::AutoIncrement) => {
                    self.advance();
                    column.auto_increment = true;
                }
                Some(Token::Identity) => {
                    self.advance();
                    if matches!(self.current_token(), Some(Token::LParen)) {
                        self.skip_token_tree();
                    }
                    column.auto_increment = true;
                }
                Some(Token::Generated) => {
                    self.parse_generated()?;
                    column.auto_increment = true;
                }
                Some(Token::References) => {
                    let fk = self.parse_references(constraint_name.take(), vec![column.name.clone()])?;
                    table.foreign_keys.push(fk);
                }
                Some(Token::Check) => {
                    self.advance();
                    self.skip_token_tree();
                }
                Some(Token::Comment) => {
                    self.advance();
                    self.expect(Token::StringLiteral(String::new()))?;
                }
                Some(Token::On) if matches!(self.peek_token(1), Some(Token::Update)) => {
                    // MySQL `ON UPDATE CURRENT_TIMESTAMP`
                    self.advance();
                    self.advance();
                    self.parse_default()?;
                }
                // COLLATE, CHARACTER SET and other options that do not change the model.
                Some(_) => self.skip_token_tree(),
            }
            constraint_name = None;
        }

        column.span = Some((name_span.start, self.last_end()));
        Ok(column)
    }

    /// Parses `GENERATED {ALWAYS | BY DEFAULT} AS {IDENTITY [(...)] | (expr) [STORED]}`.
    fn parse_generated(&mut self) -> Result<(), ParseError> {
        self.expect(Token::Generated)?;
        if !self.eat(Token::Always) {
            if !self.eat_word("by") {
                return Err(self.unexpected("ALWAYS or BY DEFAULT"));
            }
            self.expect(Token::Default)?;
        }
        self.expect(Token::As)?;
        if self.eat(Token::Identity) {
            if matches!(self.current_token(), Some(Token::LParen)) {
                self.skip_token_tree();
            }
        } else {
            if !matches!(self.current_token(), Some(Token::LParen)) {
                return Err(self.unexpected("IDENTITY or expression"));
            }
            self.skip_token_tree();
            if !self.eat_word("stored") {
                self.eat_word("virtual");
            }
        }
        Ok(())
    }

    /// Parses a DEFAULT expression and returns its source text.
    ///
    /// `DEFAULT NULL` yields `None`.
    fn parse_default(&mut self) -> Result<Option<String>, ParseError> {
        let start = match self.current() {
            Some(st) => st.span.start,
            None => return Err(self.unexpected("default expression")),
        };
        let is_null = matches!(self.current_token(), Some(Token::Null));
        self.skip_token_tree();

        while let Some(token) = self.current_token() {
            let stop = matches!(
                token,
                Token::Comma
                    | Token::RParen
                    | Token::Semicolon
                    | Token::Not
                    | Token::Null
                    | Token::Primary
                    | Token::Unique
                    | Token::References
                    | Token::Check
                    | Token::Constraint
                    | Token::Comment
                    | Token::AutoIncrement
                    | Token::Generated
                    | Token::Default
                    | Token::On
            ) || token.is_word("collate");
            if stop {
                break;
            }
            self.skip_token_tree();
        }

        if is_null && self.source[start..self.last_end()].eq_ignore_ascii_case("null") {
            return Ok(None);
        }
        Ok(Some(self.source[start..self.last_end()].to_string()))
    }

    /// Parses a column type, returning it and whether it implies auto-increment.
    fn parse_type(&mut self) -> Result<(SqlType, bool), ParseError> {
        if self.current_token().and_then(|t| t.as_ident()).is_none()
            && !matches!(self.current_token(), Some(Token::LBracket))
        {
            return Err(self.unexpected("column type"));
        }
        let (mut name, _) = self.expect_ident()?;
        let serial = SqlType::is_serial_alias(&name);

        if name.eq_ignore_ascii_case("double") && self.eat_word("precision") {
            name.push_str(" precision");
        } else if (name.eq_ignore_ascii_case("character") || name.eq_ignore_ascii_case("char"))
            && self.eat_word("varying")
        {
            name = "character varying".to_string();
        }

        let (args, values) = if matches!(self.current_token(), Some(Token::LParen)) {
            self.parse_type_args()?
        } else {
            (Vec::new(), Vec::new())
        };

        if name.eq_ignore_ascii_case("timestamp") || name.eq_ignore_ascii_case("time") {
            let with = if self.current_token().is_some_and(|t| t.is_word("with")) {
                Some("with")
            } else if self.current_token().is_some_and(|t| t.is_word("without")) {
                Some("without")
            } else {
                None
            };
            if let Some(with) = with {
                self.advance();
                if !(self.eat_word("time") && self.eat_word("zone")) {
                    return Err(self.unexpected("TIME ZONE"));
                }
                name = format!("{} {with} time zone", name.to_ascii_lowercase());
            }
        }

        let mut sql_type = if name.eq_ignore_ascii_case("enum") || name.eq_ignore_ascii_case("set") {
            SqlType::Enum(values)
        } else {
            SqlType::from_sql(&name, &args)
        };

        if matches!(self.current_token(), Some(Token::LBracket))
            && matches!(self.peek_token(1), Some(Token::RBracket))
        {
            self.advance();
            self.advance();
            sql_type = SqlType::Other(format!("{}[]", name.to_ascii_lowercase()));
        }

        while self.eat(Token::Unsigned) || self.eat_word("zerofill") || self.eat_word("signed") {}

        Ok((sql_type, serial))
    }

    /// Parses `(n, m)` or `('a', 'b')` after a type name.
    fn parse_type_args(&mut self) -> Result<(Vec<u32>, Vec<String>), ParseError> {
        self.expect(Token::LParen)?;
        let mut numbers = Vec::new();
        let mut strings = Vec::new();
        loop {
            match self.current() {
                Some(SpannedToken {
                    token: Token::Integer(n),
                    span,
                }) => {
                    let value = n.parse::<u32>().map_err(|_| ParseError::Custom {
                        span: span.clone(),
                        message: format!("type argument {n} is out of range"),
                    })?;
                    numbers.push(value);
                    self.advance();
                }
                Some(SpannedToken {
                    token: Token::StringLiteral(s),
                    ..
                }) => {
                    strings.push(s.clone());
                    self.advance();
                }
                // VARCHAR(MAX), CHAR(10 BYTE)
                Some(SpannedToken {
                    token: Token::Ident(_),
                    ..
                }) => self.advance(),
                _ => return Err(self.unexpected("type argument")),
            }
            if !self.eat(Token::Comma) {
                break;
            }
        }
        self.expect(Token::RParen)?;
        Ok((numbers, strings))
    }

    /// Parses `ALTER TABLE t ADD ...`. Other alterations are skipped.
    fn parse_alter_table(&mut self, schema: &mut SqlSchema) -> Result<(), ParseError> {
        self.expect(Token::Alter)?;
        self.expect(Token::Table)?;
        if self.eat(Token::If) {
            self.expect(Token::Exists)?;
        }
        self.eat_word("only");
        let (name, span) = self.parse_qualified_name()?;

        // OWNER TO, ALTER COLUMN, DROP ... leave the model unchanged.
        if !matches!(self.current_token(), Some(Token::Add)) {
            self.skip_statement();
            return Ok(());
        }

        let Some(mut table) = schema.table(&name).cloned() else {
            return Err(ParseError::Custom {
                span,
                message: format!("ALTER TABLE references unknown table '{name}'"),
            });
        };

        loop {
            if !self.eat(Token::Add) {
                self.skip_statement();
                break;
            }
            match self.current_token() {
                Some(Token::Constraint) => {
                    self.advance();
                    let (constraint, _) = self.expect_ident()?;
                    self.parse_table_constraint(&mut table, Some(constraint))?;
                }
                Some(Token::Primary | Token::Foreign | Token::Unique | Token::Check) => {
                    self.parse_table_constraint(&mut table, None)?;
                }
                _ => {
                    self.eat_word("column");
                    if self.eat(Token::If) {
                        self.expect(Token::Not)?;
                        self.expect(Token::Exists)?;
                    }
                    let column = self.parse_column(&mut table)?;
                    table.columns.push(column);
                }
            }
            if !self.eat(Token::Comma) {
                self.skip_statement();
                break;
            }
        }

        finish_table(&mut table);
        debug!(table = %table.name, "applied ALTER TABLE");
        if let Some(slot) = schema.table_mut(&name) {
            *slot = table;
        }
        Ok(())
    }

    /// Replaces columns typed with a `CREATE TYPE ... AS ENUM` name by the enum.
    fn apply_enum_types(&self, schema: &mut SqlSchema) {
        if self.enum_types.is_empty() {
            return;
        }
        for column in schema.tables.iter_mut().flat_map(|t| t.columns.iter_mut()) {
            if let SqlType::Other(name) = &column.sql_type {
                if let Some(values) = self.enum_types.get(name) {
                    column.sql_type = SqlType::Enum(values.clone());
                }
            }
        }
    }
}

/// Applies key-derived column flags once a table body is complete.
fn finish_table(table: &mut SqlTable) {
    for name in table.primary_key.clone() {
        if let Some(column) = table.column_mut(&name) {
            column.primary_key = true;
            column.nullable = false;
        }
    }
    for unique in table.unique_constraints.clone() {
        if let [single] = unique.as_slice() {
            if let Some(column) = table.column_mut(single) {
                column.unique = true;
            }
        }
    }
}

/// Fills in the referenced columns of `REFERENCES t` clauses without a column list.
fn resolve_implicit_references(schema: &mut SqlSchema) {
    let primary_keys: HashMap<String, Vec<String>> = schema
        .tables
        .iter()
        .map(|t| (t.name.to_ascii_lowercase(), t.primary_key.clone()))
        .collect();

    for fk in schema.tables.iter_mut().flat_map(|t| t.foreign_keys.iter_mut()) {
        if !fk.ref_columns.is_empty() {
            continue;
        }
        fk.ref_columns = match primary_keys.get(&fk.ref_table.to_ascii_lowercase()) {
            Some(pk) if !pk.is_empty() => pk.clone(),
            _ => vec!["id".to_string()],
        };
    }
}

/// Convenience function to parse a source string.
pub fn parse(source: &str) -> Result<SqlSchema, ParseError> {
    Parser::new(source)?.parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crudforge_schema::RelationshipKind;

    #[test]
    fn test_parse_empty() {
        let schema = parse("").unwrap();
        assert!(schema.tables.is_empty());
    }

    #[test]
    fn test_parse_simple_table() {
        let schema = parse(
            r#"
            CREATE TABLE users (
                id BIGSERIAL PRIMARY KEY,
                email VARCHAR(255) NOT NULL UNIQUE,
                name TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        "#,
        )
        .unwrap();

        assert_eq!(schema.tables.len(), 1);
        let users = &schema.tables[0];
        assert_eq!(users.name, "users");
        assert_eq!(users.primary_key, vec!["id"]);

        let id = users.column("id").unwrap();
        assert_eq!(id.sql_type, SqlType::BigInt);
        assert!(id.auto_increment);
        assert!(!id.nullable);

        let email = users.column("email").unwrap();
        assert_eq!(email.sql_type, SqlType::Varchar(Some(255)));
        assert!(email.unique);
        assert!(!email.nullable);

        assert!(users.column("name").unwrap().nullable);

        let created = users.column("created_at").unwrap();
        assert_eq!(created.default.as_deref(), Some("CURRENT_TIMESTAMP"));
        assert!(created.is_generated());
    }

    #[test]
    fn test_parse_if_not_exists_and_schema_prefix() {
        let schema = parse("create table if not exists public.tags (id int primary key);").unwrap();
        assert_eq!(schema.tables[0].name, "tags");
    }

    #[test]
    fn test_parse_quoted_identifiers() {
        let schema = parse(
            r#"CREATE TABLE "Order" (`id` INT PRIMARY KEY, [total] DECIMAL(10, 2), "key" TEXT);"#,
        )
        .unwrap();
        let table = &schema.tables[0];
        assert_eq!(table.name, "Order");
        let names: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "total", "key"]);
        assert_eq!(
            table.columns[1].sql_type,
            SqlType::Decimal {
                precision: Some(10),
                scale: Some(2)
            }
        );
    }

    #[test]
    fn test_parse_multi_word_types() {
        let schema = parse(
            r#"
            CREATE TABLE t (
                id INTEGER PRIMARY KEY,
                a DOUBLE PRECISION,
                b CHARACTER VARYING(40),
                c TIMESTAMP WITH TIME ZONE,
                d TIMESTAMP(3) WITHOUT TIME ZONE,
                e TEXT[],
                f INT UNSIGNED,
                g TINYINT(1)
            );
        "#,
        )
        .unwrap();
        let t = &schema.tables[0];
        assert_eq!(t.column("a").unwrap().sql_type, SqlType::Double);
        assert_eq!(t.column("b").unwrap().sql_type, SqlType::Varchar(Some(40)));
        assert_eq!(t.column("c").unwrap().sql_type, SqlType::TimestampTz);
        assert_eq!(t.column("d").unwrap().sql_type, SqlType::Timestamp);
        assert_eq!(
            t.column("e").unwrap().sql_type,
            SqlType::Other("text[]".to_string())
        );
        assert_eq!(t.column("f").unwrap().sql_type, SqlType::Integer);
        assert_eq!(t.column("g").unwrap().sql_type, SqlType::Boolean);
    }

    #[test]
    fn test_parse_inline_references() {
        let schema = parse(
            r#"
            CREATE TABLE users (id SERIAL PRIMARY KEY);
            CREATE TABLE posts (
                id SERIAL PRIMARY KEY,
                author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                editor_id INTEGER REFERENCES users ON DELETE SET NULL ON UPDATE NO ACTION
            );
        "#,
        )
        .unwrap();

        let posts = schema.table("posts").unwrap();
        assert_eq!(posts.foreign_keys.len(), 2);

        let author = posts.foreign_key_for("author_id").unwrap();
        assert_eq!(author.ref_table, "users");
        assert_eq!(author.ref_columns, vec!["id"]);
        assert_eq!(author.on_delete, Some(ReferentialAction::Cascade));

        let editor = posts.foreign_key_for("editor_id").unwrap();
        assert_eq!(editor.ref_columns, vec!["id"]);
        assert_eq!(editor.on_delete, Some(ReferentialAction::SetNull));
        assert_eq!(editor.on_update, Some(ReferentialAction::NoAction));
    }

    #[test]
    fn test_implicit_reference_uses_primary_key() {
        let schema = parse(
            r#"
            CREATE TABLE posts (id INT PRIMARY KEY, owner_code TEXT REFERENCES accounts);
            CREATE TABLE accounts (code TEXT PRIMARY KEY);
        "#,
        )
        .unwrap();
        let fk = &schema.table("posts").unwrap().foreign_keys[0];
        assert_eq!(fk.ref_columns, vec!["code"]);
    }

    #[test]
    fn test_parse_table_constraints() {
        let schema = parse(
            r#"
            CREATE TABLE post_tags (
                post_id BIGINT,
                tag_id BIGINT,
                CONSTRAINT pk_post_tags PRIMARY KEY (post_id, tag_id),
                CONSTRAINT fk_post FOREIGN KEY (post_id) REFERENCES posts (id),
                FOREIGN KEY (tag_id) REFERENCES tags (id) ON DELETE RESTRICT,
                UNIQUE (tag_id, post_id),
                CHECK (post_id > 0)
            );
        "#,
        )
        .unwrap();
        let t = &schema.tables[0];
        assert_eq!(t.primary_key, vec!["post_id", "tag_id"]);
        assert!(!t.column("post_id").unwrap().nullable);
        assert_eq!(t.foreign_keys[0].name.as_deref(), Some("fk_post"));
        assert_eq!(
            t.foreign_keys[1].on_delete,
            Some(ReferentialAction::Restrict)
        );
        assert_eq!(t.unique_constraints, vec![vec!["tag_id", "post_id"]]);
    }

    #[test]
    fn test_parse_mysql_dialect() {
        let schema = parse(
            r#"
            CREATE TABLE `products` (
              `id` int(11) unsigned NOT NULL AUTO_INCREMENT,
              `sku` varchar(64) NOT NULL COMMENT 'stock keeping unit',
              `status` enum('draft','active') NOT NULL DEFAULT 'draft',
              `key` varchar(20) DEFAULT NULL,
              `updated_at` datetime DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
              PRIMARY KEY (`id`),
              UNIQUE KEY `uniq_sku` (`sku`),
              KEY `idx_status` (`status`),
              FULLTEXT KEY `ft_sku` (`sku`)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
        "#,
        )
        .unwrap();
        let t = &schema.tables[0];
        assert_eq!(t.columns.len(), 5);
        assert!(t.column("id").unwrap().auto_increment);
        assert!(t.column("sku").unwrap().unique);
        assert_eq!(
            t.column("status").unwrap().sql_type,
            SqlType::Enum(vec!["draft".to_string(), "active".to_string()])
        );
        assert_eq!(
            t.column("status").unwrap().default.as_deref(),
            Some("'draft'")
        );
        assert_eq!(t.column("key").unwrap().default, None);
        assert_eq!(
            t.column("updated_at").unwrap().default.as_deref(),
            Some("CURRENT_TIMESTAMP")
        );
    }

    #[test]
    fn test_parse_identity_columns() {
        let schema = parse(
            r#"
            CREATE TABLE a (id BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY);
            CREATE TABLE b (id BIGINT GENERATED BY DEFAULT AS IDENTITY (START WITH 10), PRIMARY KEY (id));
            CREATE TABLE c (id INT IDENTITY(1,1) PRIMARY KEY);
            CREATE TABLE d (id INTEGER PRIMARY KEY AUTOINCREMENT);
        "#,
        )
        .unwrap();
        for table in &schema.tables {
            let id = table.column("id").unwrap();
            assert!(id.auto_increment, "{} id should be generated", table.name);
            assert_eq!(table.primary_key, vec!["id"]);
        }
    }

    #[test]
    fn test_default_expressions() {
        let schema = parse(
            r#"
            CREATE TABLE t (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                n INT DEFAULT -1 NOT NULL,
                s TEXT DEFAULT 'a'::text,
                j JSONB DEFAULT '{}'
            );
        "#,
        )
        .unwrap();
        let t = &schema.tables[0];
        assert_eq!(t.column("id").unwrap().default.as_deref(), Some("gen_random_uuid()"));
        assert!(t.column("id").unwrap().is_generated());
        let n = t.column("n").unwrap();
        assert_eq!(n.default.as_deref(), Some("-1"));
        assert!(!n.nullable);
        assert_eq!(t.column("s").unwrap().default.as_deref(), Some("'a'::text"));
        assert_eq!(t.column("j").unwrap().default.as_deref(), Some("'{}'"));
    }

    #[test]
    fn test_skips_other_statements() {
        let schema = parse(
            r#"
            CREATE EXTENSION IF NOT EXISTS "uuid-ossp";
            SET client_encoding = 'UTF8';
            DROP TABLE IF EXISTS users;
            CREATE TABLE users (id INT PRIMARY KEY);
            CREATE INDEX idx_users ON users (id);
            INSERT INTO users (id) VALUES (1), (2);
            CREATE UNIQUE INDEX x ON users (id);
        "#,
        )
        .unwrap();
        assert_eq!(schema.tables.len(), 1);
    }

    #[test]
    fn test_create_enum_type() {
        let schema = parse(
            r#"
            CREATE TYPE mood AS ENUM ('sad', 'ok', 'happy');
            CREATE TABLE people (id INT PRIMARY KEY, mood mood NOT NULL);
        "#,
        )
        .unwrap();
        assert_eq!(
            schema.tables[0].column("mood").unwrap().sql_type,
            SqlType::Enum(vec!["sad".into(), "ok".into(), "happy".into()])
        );
    }

    #[test]
    fn test_alter_table_add_foreign_key() {
        let schema = parse(
            r#"
            CREATE TABLE users (id INT PRIMARY KEY);
            CREATE TABLE posts (id INT PRIMARY KEY, user_id INT NOT NULL);
            ALTER TABLE posts ADD CONSTRAINT fk_user FOREIGN KEY (user_id) REFERENCES users (id);
            ALTER TABLE ONLY posts ADD COLUMN title TEXT, ADD UNIQUE (title);
            ALTER TABLE posts DROP COLUMN nothing;
        "#,
        )
        .unwrap();
        let posts = schema.table("posts").unwrap();
        assert_eq!(posts.foreign_keys.len(), 1);
        assert_eq!(posts.foreign_keys[0].name.as_deref(), Some("fk_user"));
        assert!(posts.column("title").unwrap().unique);

        let rels = schema.relationships_for("posts");
        assert_eq!(rels[0].kind, RelationshipKind::ManyToOne);
        assert_eq!(rels[0].property, "user");
    }

    #[test]
    fn test_alter_unknown_table() {
        let err = parse("ALTER TABLE ghosts ADD COLUMN x INT;").unwrap_err();
        assert!(matches!(err, ParseError::Custom { .. }));
        assert_eq!(err.span(), 12..18);
    }

    #[test]
    fn test_alter_without_add_is_skipped() {
        let schema = parse(
            r#"
            CREATE TABLE users (id INT PRIMARY KEY);
            ALTER TABLE public.users_id_seq OWNER TO postgres;
            ALTER TABLE ONLY public.users ALTER COLUMN id SET DEFAULT nextval('users_id_seq'::regclass);
            ALTER TABLE users DROP COLUMN legacy;
        "#,
        )
        .unwrap();
        assert_eq!(schema.tables.len(), 1);
        assert_eq!(schema.tables[0].columns.len(), 1);
    }

    #[test]
    fn test_bracketed_type_names() {
        let schema = parse(
            "CREATE TABLE [dbo].[Users] ([Id] [int] IDENTITY(1,1) PRIMARY KEY, [Name] [nvarchar](50) NOT NULL);",
        )
        .unwrap();
        let users = &schema.tables[0];
        assert_eq!(users.name, "Users");
        let id = users.column("Id").unwrap();
        assert_eq!(id.sql_type, SqlType::Integer);
        assert!(id.auto_increment);
        let name = users.column("Name").unwrap();
        assert!(!name.nullable);
        assert_eq!(name.sql_type, SqlType::from_sql("nvarchar", &[50]));
    }

    #[test]
    fn test_check_with_comparison_operators() {
        let schema = parse(
            "CREATE TABLE items (id INT PRIMARY KEY, qty INT CHECK (qty >= 0 AND qty <> 7), CHECK (qty <= 100));",
        )
        .unwrap();
        assert_eq!(schema.tables[0].columns.len(), 2);
    }

    #[test]
    fn test_create_table_as_is_skipped() {
        let schema = parse("CREATE TABLE copy AS SELECT * FROM users;").unwrap();
        assert!(schema.tables.is_empty());
    }

    #[test]
    fn test_comments_are_ignored() {
        let schema = parse(
            r#"
            -- users
            CREATE TABLE users ( /* surrogate */ id INT PRIMARY KEY -- pk
            );
        "#,
        )
        .unwrap();
        assert_eq!(schema.tables[0].columns.len(), 1);
    }

    #[test]
    fn test_error_unexpected_token() {
        let err = parse("CREATE TABLE users (id INT PRIMARY 5);").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { .. }));
    }

    #[test]
    fn test_error_unexpected_eof() {
        let source = "CREATE TABLE users (id INT";
        let err = parse(source).unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedEof { .. }));
        assert_eq!(err.span(), source.len()..source.len());
    }

    #[test]
    fn test_error_lexer() {
        let err = parse("CREATE TABLE t (id INT) #").unwrap_err();
        assert!(matches!(err, ParseError::LexerError { .. }));
    }

    #[test]
    fn test_write_report() {
        let source = "CREATE TABLE users (id INT PRIMARY 5);";
        let err = parse(source).unwrap_err();
        let mut out = Vec::new();
        err.write_report("schema.sql", source, &mut out).unwrap();
        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("schema.sql"));
        assert!(text.contains("unexpected token"));
    }

    #[test]
    fn test_spans() {
        let source = "CREATE TABLE t (id INT);";
        let schema = parse(source).unwrap();
        assert_eq!(schema.tables[0].span, Some((0, 23)));
        assert_eq!(schema.tables[0].columns[0].span, Some((16, 22)));
    }
}
