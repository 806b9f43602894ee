//! CQL text constraints.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! or        := and ( OR and )*
//! and       := not ( AND not )*
//! not       := NOT not | primary
//! primary   := '(' or ')' | INCLUDE | EXCLUDE
//!            | operand comparison operand
//!            | operand [NOT] (LIKE | ILIKE) string
//!            | operand [NOT] BETWEEN operand AND operand
//!            | operand IS [NOT] NULL
//! operand   := identifier | "quoted identifier" | 'string' | number | date
//!            | TRUE | FALSE
//! ```

use super::{
    ComparisonOp, Expression, LikePattern, Literal, MAX_NESTING, Predicate, property_expression,
};
use crate::error::CswError;
use crate::namespace::NamespaceTable;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq)]
enum TokenKind {
    Word(String),
    QuotedIdent(String),
    Str(String),
    Number(String),
    Comparison(ComparisonOp),
    LParen,
    RParen,
    Eof,
}

#[derive(Clone, Debug)]
struct Token {
    kind: TokenKind,
    offset: usize,
    text: String,
}

impl Token {
    fn keyword(&self) -> Option<String> {
        match &self.kind {
            TokenKind::Word(word) => Some(word.to_ascii_uppercase()),
            _ => None,
        }
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        self.keyword().as_deref() == Some(keyword)
    }
}

const KEYWORDS: &[&str] = &[
    "AND", "OR", "NOT", "LIKE", "ILIKE", "IS", "NULL", "BETWEEN", "INCLUDE", "EXCLUDE",
];

/// Parses CQL text into a predicate.
pub fn parse(text: &str, namespaces: &Arc<NamespaceTable>) -> Result<Predicate, CswError> {
    if text.trim().is_empty() {
        return Err(CswError::syntax_at(0, "", "constraint is empty"));
    }
    let tokens = tokenize(text)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        namespaces,
    };
    let predicate = parser.parse_or()?;
    let trailing = parser.peek();
    if trailing.kind != TokenKind::Eof {
        return Err(CswError::syntax_at(
            trailing.offset,
            trailing.text.clone(),
            "unexpected input after the end of the predicate",
        ));
    }
    Ok(predicate)
}

fn tokenize(text: &str) -> Result<Vec<Token>, CswError> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        let kind = match c {
            b'(' => {
                i += 1;
                TokenKind::LParen
            }
            b')' => {
                i += 1;
                TokenKind::RParen
            }
            b'=' => {
                i += 1;
                TokenKind::Comparison(ComparisonOp::Equal)
            }
            b'<' | b'>' | b'!' => {
                let next = bytes.get(i + 1).copied();
                let (op, width) = match (c, next) {
                    (b'<', Some(b'=')) => (ComparisonOp::LessOrEqual, 2),
                    (b'<', Some(b'>')) => (ComparisonOp::NotEqual, 2),
                    (b'>', Some(b'=')) => (ComparisonOp::GreaterOrEqual, 2),
                    (b'!', Some(b'=')) => (ComparisonOp::NotEqual, 2),
                    (b'<', _) => (ComparisonOp::Less, 1),
                    (b'>', _) => (ComparisonOp::Greater, 1),
                    _ => return Err(CswError::syntax_at(start, "!", "unexpected character")),
                };
                i += width;
                TokenKind::Comparison(op)
            }
            b'\'' => {
                let (value, end) = scan_quoted(text, start, b'\'')?;
                i = end;
                TokenKind::Str(value)
            }
            b'"' => {
                let (value, end) = scan_quoted(text, start, b'"')?;
                i = end;
                TokenKind::QuotedIdent(value)
            }
            b'0'..=b'9' => {
                i = scan_number(bytes, i);
                TokenKind::Number(text[start..i].to_string())
            }
            b'-' | b'+' if bytes.get(i + 1).is_some_and(u8::is_ascii_digit) => {
                i = scan_number(bytes, i + 1);
                TokenKind::Number(text[start..i].to_string())
            }
            _ if c.is_ascii_alphabetic() || c == b'_' || !c.is_ascii() => {
                while i < bytes.len() && is_word_byte(bytes[i]) {
                    i += 1;
                }
                TokenKind::Word(text[start..i].to_string())
            }
            _ => {
                let token = text[start..].chars().next().map(String::from).unwrap_or_default();
                return Err(CswError::syntax_at(start, token, "unexpected character"));
            }
        };
        tokens.push(Token {
            kind,
            offset: start,
            text: text[start..i].to_string(),
        });
    }
    tokens.push(Token {
        kind: TokenKind::Eof,
        offset: text.len(),
        text: String::new(),
    });
    Ok(tokens)
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b':' | b'/' | b'-') || !b.is_ascii()
}

// Numbers, dates and timestamps share one lexeme; classification happens
// when the literal is built.
fn scan_number(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len()
        && (bytes[i].is_ascii_digit()
            || matches!(bytes[i], b'.' | b'-' | b':' | b'T' | b'Z' | b'+' | b'e' | b'E'))
    {
        i += 1;
    }
    i
}

/// Scans a quoted run starting at `start`; a doubled quote is an escaped
/// quote. Returns the unescaped value and the offset past the closing quote.
fn scan_quoted(text: &str, start: usize, quote: u8) -> Result<(String, usize), CswError> {
    let bytes = text.as_bytes();
    let mut value = String::new();
    let mut i = start + 1;
    let mut run_start = i;
    loop {
        match bytes.get(i) {
            None => {
                return Err(CswError::syntax_at(
                    start,
                    &text[start..],
                    "unterminated quoted text",
                ));
            }
            Some(b) if *b == quote => {
                value.push_str(&text[run_start..i]);
                if bytes.get(i + 1) == Some(&quote) {
                    value.push(quote as char);
                    i += 2;
                    run_start = i;
                } else {
                    return Ok((value, i + 1));
                }
            }
            Some(_) => i += 1,
        }
    }
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    namespaces: &'a Arc<NamespaceTable>,
}

impl Parser<'_> {
    fn peek(&self) -> &Token {
        // The token list always ends with Eof and the cursor never passes it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek().is_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, message: &str) -> CswError {
        let token = self.peek();
        let message = if token.kind == TokenKind::Eof {
            format!("{message}, found end of input")
        } else {
            message.to_string()
        };
        CswError::syntax_at(token.offset, token.text.clone(), message)
    }

    fn descend(&mut self) -> Result<(), CswError> {
        if self.depth >= MAX_NESTING {
            return Err(self.error("constraint nested too deeply"));
        }
        self.depth += 1;
        Ok(())
    }

    fn parse_or(&mut self) -> Result<Predicate, CswError> {
        let mut parts = vec![self.parse_and()?];
        while self.eat_keyword("OR") {
            parts.push(self.parse_and()?);
        }
        Ok(Predicate::or(parts))
    }

    fn parse_and(&mut self) -> Result<Predicate, CswError> {
        let mut parts = vec![self.parse_not()?];
        while self.eat_keyword("AND") {
            parts.push(self.parse_not()?);
        }
        Ok(Predicate::and(parts))
    }

    fn parse_not(&mut self) -> Result<Predicate, CswError> {
        if self.eat_keyword("NOT") {
            self.descend()?;
            let inner = self.parse_not();
            self.depth -= 1;
            return Ok(Predicate::negate(inner?));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Predicate, CswError> {
        if self.peek().kind == TokenKind::LParen {
            self.advance();
            self.descend()?;
            let inner = self.parse_or();
            self.depth -= 1;
            let inner = inner?;
            if self.peek().kind != TokenKind::RParen {
                return Err(self.error("expected ')'"));
            }
            self.advance();
            return Ok(inner);
        }
        if self.eat_keyword("INCLUDE") {
            return Ok(Predicate::Include);
        }
        if self.eat_keyword("EXCLUDE") {
            return Ok(Predicate::Exclude);
        }

        let left = self.parse_operand()?;

        if let TokenKind::Comparison(op) = self.peek().kind {
            self.advance();
            let right = self.parse_operand()?;
            return Ok(Predicate::Comparison {
                op,
                left,
                right,
                match_case: true,
            });
        }

        let negated = self.eat_keyword("NOT");
        let predicate = if self.eat_keyword("LIKE") {
            self.parse_like(left, true)?
        } else if self.eat_keyword("ILIKE") {
            self.parse_like(left, false)?
        } else if self.eat_keyword("BETWEEN") {
            let lower = self.parse_operand()?;
            if !self.eat_keyword("AND") {
                return Err(self.error("expected AND between the BETWEEN bounds"));
            }
            let upper = self.parse_operand()?;
            Predicate::Between {
                expression: left,
                lower,
                upper,
            }
        } else if !negated && self.eat_keyword("IS") {
            let not_null = self.eat_keyword("NOT");
            if !self.eat_keyword("NULL") {
                return Err(self.error("expected NULL"));
            }
            let predicate = Predicate::IsNull(left);
            return Ok(if not_null {
                Predicate::negate(predicate)
            } else {
                predicate
            });
        } else if negated {
            return Err(self.error("expected LIKE, ILIKE or BETWEEN after NOT"));
        } else {
            return Err(self.error("expected a comparison operator"));
        };

        Ok(if negated {
            Predicate::negate(predicate)
        } else {
            predicate
        })
    }

    fn parse_like(
        &mut self,
        expression: Expression,
        match_case: bool,
    ) -> Result<Predicate, CswError> {
        let token = self.peek().clone();
        let TokenKind::Str(raw) = &token.kind else {
            return Err(self.error("expected a quoted pattern"));
        };
        let pattern = LikePattern::parse_sql(raw)
            .map_err(|_| CswError::syntax_at(token.offset, token.text.clone(), "invalid pattern"))?;
        self.advance();
        Ok(Predicate::Like {
            expression,
            pattern,
            match_case,
        })
    }

    fn parse_operand(&mut self) -> Result<Expression, CswError> {
        let token = self.peek().clone();
        let expression = match &token.kind {
            TokenKind::Word(word) => {
                let upper = word.to_ascii_uppercase();
                match upper.as_str() {
                    "TRUE" => Expression::Literal(Literal::Boolean(true)),
                    "FALSE" => Expression::Literal(Literal::Boolean(false)),
                    _ if KEYWORDS.contains(&upper.as_str()) => {
                        return Err(self.error("expected a property name or literal"));
                    }
                    _ => property_expression(word, self.namespaces)?,
                }
            }
            TokenKind::QuotedIdent(name) => property_expression(name, self.namespaces)?,
            TokenKind::Str(value) => Expression::Literal(Literal::String(value.clone())),
            TokenKind::Number(raw) => Expression::Literal(number_literal(raw).ok_or_else(|| {
                CswError::syntax_at(token.offset, raw.clone(), "invalid numeric or date literal")
            })?),
            _ => return Err(self.error("expected a property name or literal")),
        };
        self.advance();
        Ok(expression)
    }
}

fn number_literal(raw: &str) -> Option<Literal> {
    if let Ok(value) = raw.parse::<i64>() {
        return Some(Literal::Integer(value));
    }
    if let Ok(value) = raw.parse::<f64>() {
        return Some(Literal::Float(value));
    }
    if let Ok(value) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(Literal::Date(value));
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|value| Literal::DateTime(value.with_timezone(&Utc)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FaultCode;
    use crate::filter::PropertyReference;
    use crate::namespace::{DC_NAMESPACE, DCT_NAMESPACE, QualifiedName};

    fn parse_default(text: &str) -> Result<Predicate, CswError> {
        parse(text, &Arc::new(NamespaceTable::with_defaults()))
    }

    fn dc_title() -> Expression {
        Expression::Property(PropertyReference::new(
            QualifiedName::new(DC_NAMESPACE, "title"),
            vec![QualifiedName::new(DC_NAMESPACE, "value")],
            Arc::new(NamespaceTable::new()),
        ))
    }

    #[test]
    fn parses_like_with_bare_and_prefixed_names() {
        let bare = parse_default("title like '%ipsum%'").unwrap();
        let prefixed = parse_default("dc:title LIKE '%ipsum%'").unwrap();
        assert_eq!(bare, prefixed);
        assert_eq!(
            bare,
            Predicate::Like {
                expression: dc_title(),
                pattern: LikePattern::parse_sql("%ipsum%").unwrap(),
                match_case: true,
            }
        );
    }

    #[test]
    fn precedence_binds_and_tighter_than_or() {
        let predicate = parse_default("title = 'a' or title = 'b' and not title = 'c'").unwrap();
        let Predicate::Or(parts) = predicate else {
            panic!("expected a disjunction");
        };
        assert_eq!(parts.len(), 2);
        let Predicate::And(conjuncts) = &parts[1] else {
            panic!("expected a conjunction");
        };
        assert!(matches!(conjuncts[1], Predicate::Not(_)));
    }

    #[test]
    fn literals_are_typed() {
        let predicate =
            parse_default("modified >= 2004-03-01 and format = 'image/png' and x <> -2.5").unwrap();
        let Predicate::And(parts) = predicate else {
            panic!("expected a conjunction");
        };
        let Predicate::Comparison { left, right, .. } = &parts[0] else {
            panic!("expected a comparison");
        };
        match left {
            Expression::Property(reference) => {
                assert_eq!(reference.name, QualifiedName::new(DCT_NAMESPACE, "modified"))
            }
            other => panic!("unexpected operand {other:?}"),
        }
        assert_eq!(
            right,
            &Expression::Literal(Literal::Date(NaiveDate::from_ymd_opt(2004, 3, 1).unwrap()))
        );
        let Predicate::Comparison { right, op, .. } = &parts[2] else {
            panic!("expected a comparison");
        };
        assert_eq!(*op, ComparisonOp::NotEqual);
        assert_eq!(right, &Expression::Literal(Literal::Float(-2.5)));
    }

    #[test]
    fn supports_null_between_and_ilike() {
        assert!(matches!(parse_default("abstract IS NULL").unwrap(), Predicate::IsNull(_)));
        assert!(matches!(
            parse_default("abstract is not null").unwrap(),
            Predicate::Not(inner) if matches!(*inner, Predicate::IsNull(_))
        ));
        assert!(matches!(
            parse_default("\"dc:date\" BETWEEN '2001' AND '2005'").unwrap(),
            Predicate::Between { .. }
        ));
        assert!(matches!(
            parse_default("title ILIKE 'IPSUM%'").unwrap(),
            Predicate::Like { match_case: false, .. }
        ));
        assert!(matches!(
            parse_default("title NOT LIKE 'x%'").unwrap(),
            Predicate::Not(_)
        ));
    }

    #[test]
    fn any_text_is_distinct_from_properties() {
        let predicate = parse_default("csw:AnyText like '%sed%'").unwrap();
        assert!(matches!(
            predicate,
            Predicate::Like { expression: Expression::AnyText, .. }
        ));
    }

    #[test]
    fn quoted_strings_unescape_doubled_quotes() {
        let predicate = parse_default("title = 'it''s'").unwrap();
        let Predicate::Comparison { right, .. } = predicate else {
            panic!("expected a comparison");
        };
        assert_eq!(right, Expression::Literal(Literal::String("it's".into())));
    }

    #[test]
    fn unbound_prefix_is_reported() {
        let err = parse_default("rim:Foo = 'x'").unwrap_err();
        assert_eq!(err, CswError::unresolved_prefix("rim"));
    }

    #[test]
    fn syntax_errors_carry_offset_and_token() {
        let err = parse_default("title lik '%x%'").unwrap_err();
        assert_eq!(err.code(), FaultCode::ConstraintSyntax);
        assert_eq!(err, CswError::syntax_at(6, "lik", "expected a comparison operator"));

        let err = parse_default("(title = 'a'").unwrap_err();
        assert!(matches!(err, CswError::ConstraintSyntax { offset: Some(12), .. }));

        let err = parse_default("title = 'open").unwrap_err();
        assert!(matches!(err, CswError::ConstraintSyntax { offset: Some(8), .. }));

        assert!(parse_default("   ").is_err());
        assert!(parse_default("title = 'a' title").is_err());
    }

    // Ensures long runs of NOT or parentheses fail as syntax errors instead
    // of exhausting the stack.
    #[test]
    fn deep_nesting_is_rejected() {
        let negations = format!("{}dc:title = 'a'", "NOT ".repeat(200_000));
        let err = parse_default(&negations).unwrap_err();
        assert_eq!(err.code(), FaultCode::ConstraintSyntax);
        assert!(err.to_string().contains("nested too deeply"), "{err}");

        let grouped = format!("{}title = 'a'{}", "(".repeat(200_000), ")".repeat(200_000));
        let err = parse_default(&grouped).unwrap_err();
        assert_eq!(err.code(), FaultCode::ConstraintSyntax);

        let at_limit = format!(
            "{}title = 'a'{}",
            "(".repeat(MAX_NESTING),
            ")".repeat(MAX_NESTING)
        );
        assert!(parse_default(&at_limit).is_ok());
        let negated = format!("{}title = 'a'", "not ".repeat(MAX_NESTING));
        assert!(parse_default(&negated).is_ok());
    }
}
