//! # CSS Selectors
//!
//! Parsing and right-to-left matching for the selector subset that page
//! editing needs:
//!
//! - selector lists (`a, b`)
//! - combinators: descendant, `>`, `+`, `~`
//! - type, universal, `#id`, `.class`
//! - attribute selectors with `=`, `~=`, `^=`, `$=`, `*=`, `|=`
//! - `:first-child`, `:last-child`, `:only-child`, `:nth-child()`,
//!   `:nth-of-type()`, `:not()`
//!
//! Identifiers accept CSS backslash escapes; [`escape_identifier`] produces
//! identifiers this parser reads back unchanged.

use crate::document::Document;
use crate::error::SelectorError;
use crate::node::NodeId;
use logos::Logos;
use std::fmt;
use std::ops::Range;

#[derive(Logos, Debug, Clone, Copy, PartialEq)]
enum Token<'src> {
    #[regex(r"[ \t\r\n\x0C]+")]
    Whitespace,

    #[regex(
        r"-?([a-zA-Z_]|[^\x00-\x7F]|\\[0-9a-fA-F]{1,6} ?|\\[^\r\n\x0C0-9a-fA-F])([a-zA-Z0-9_-]|[^\x00-\x7F]|\\[0-9a-fA-F]{1,6} ?|\\[^\r\n\x0C0-9a-fA-F])*",
        |lex| lex.slice()
    )]
    Ident(&'src str),

    #[regex(
        r"#([a-zA-Z0-9_-]|[^\x00-\x7F]|\\[0-9a-fA-F]{1,6} ?|\\[^\r\n\x0C0-9a-fA-F])+",
        |lex| lex.slice()
    )]
    Hash(&'src str),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| lex.slice())]
    #[regex(r#"'([^'\\]|\\.)*'"#, |lex| lex.slice())]
    Str(&'src str),

    #[regex(r"[+-]?[0-9]+", |lex| lex.slice())]
    Number(&'src str),

    #[token(".")]
    Dot,

    #[token(",")]
    Comma,

    #[token(">")]
    Greater,

    #[token("+")]
    Plus,

    #[token("~")]
    Tilde,

    #[token("*")]
    Star,

    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token(":")]
    Colon,

    #[token("=")]
    Equals,

    #[token("~=")]
    Includes,

    #[token("^=")]
    Prefix,

    #[token("$=")]
    Suffix,

    #[token("*=")]
    Substring,

    #[token("|=")]
    DashMatch,
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Whitespace => write!(f, "whitespace"),
            Token::Ident(s) => write!(f, "identifier '{}'", s),
            Token::Hash(s) => write!(f, "hash '{}'", s),
            Token::Str(s) => write!(f, "string {}", s),
            Token::Number(n) => write!(f, "number {}", n),
            Token::Dot => write!(f, "."),
            Token::Comma => write!(f, ","),
            Token::Greater => write!(f, ">"),
            Token::Plus => write!(f, "+"),
            Token::Tilde => write!(f, "~"),
            Token::Star => write!(f, "*"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Colon => write!(f, ":"),
            Token::Equals => write!(f, "="),
            Token::Includes => write!(f, "~="),
            Token::Prefix => write!(f, "^="),
            Token::Suffix => write!(f, "$="),
            Token::Substring => write!(f, "*="),
            Token::DashMatch => write!(f, "|="),
        }
    }
}

fn tokenize(source: &str) -> Result<Vec<(Token<'_>, Range<usize>)>, SelectorError> {
    Token::lexer(source)
        .spanned()
        .map(|(result, span)| match result {
            Ok(token) => Ok((token, span)),
            Err(()) => Err(SelectorError::Lexer { pos: span.start }),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    Descendant,
    Child,
    NextSibling,
    SubsequentSibling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrOperator {
    Exact,
    Includes,
    Prefix,
    Suffix,
    Substring,
    DashMatch,
}

impl AttrOperator {
    fn test(self, actual: &str, expected: &str) -> bool {
        match self {
            AttrOperator::Exact => actual == expected,
            AttrOperator::Includes => actual.split_whitespace().any(|word| word == expected),
            AttrOperator::Prefix => !expected.is_empty() && actual.starts_with(expected),
            AttrOperator::Suffix => !expected.is_empty() && actual.ends_with(expected),
            AttrOperator::Substring => !expected.is_empty() && actual.contains(expected),
            AttrOperator::DashMatch => {
                actual == expected
                    || (actual.starts_with(expected) && actual[expected.len()..].starts_with('-'))
            }
        }
    }
}

/// `an+b` position formula used by `:nth-child` and `:nth-of-type`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nth {
    pub a: i64,
    pub b: i64,
}

impl Nth {
    pub fn parse(text: &str) -> Option<Self> {
        let compact: String = text
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();

        match compact.as_str() {
            "odd" => return Some(Nth { a: 2, b: 1 }),
            "even" => return Some(Nth { a: 2, b: 0 }),
            _ => {}
        }

        match compact.split_once('n') {
            Some((a, b)) => {
                let a = match a {
                    "" | "+" => 1,
                    "-" => -1,
                    other => other.parse().ok()?,
                };
                let b = if b.is_empty() { 0 } else { b.parse().ok()? };
                Some(Nth { a, b })
            }
            None => Some(Nth {
                a: 0,
                b: compact.parse().ok()?,
            }),
        }
    }

    /// `index` is 1-based
    pub fn matches(&self, index: i64) -> bool {
        if self.a == 0 {
            return index == self.b;
        }
        let diff = index - self.b;
        diff % self.a == 0 && diff / self.a >= 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Id(String),
    Class(String),
    Attribute {
        name: String,
        matcher: Option<(AttrOperator, String)>,
    },
    FirstChild,
    LastChild,
    OnlyChild,
    NthChild(Nth),
    NthOfType(Nth),
    Not(Vec<Compound>),
}

/// A run of simple selectors with no combinator between them, e.g. `p.lead#intro`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Compound {
    pub tag: Option<String>,
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComplexSelector {
    compounds: Vec<Compound>,
    combinators: Vec<Combinator>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectorList {
    selectors: Vec<ComplexSelector>,
}

impl SelectorList {
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        if source.trim().is_empty() {
            return Err(SelectorError::Empty);
        }
        let tokens = tokenize(source)?;
        let mut parser = Parser {
            source,
            tokens,
            pos: 0,
        };
        parser.parse_list()
    }

    pub fn selectors(&self) -> &[ComplexSelector] {
        &self.selectors
    }

    pub fn matches(&self, doc: &Document, id: NodeId) -> bool {
        doc.is_element(id) && self.selectors.iter().any(|selector| selector.matches(doc, id))
    }
}

impl ComplexSelector {
    pub fn compounds(&self) -> &[Compound] {
        &self.compounds
    }

    pub fn combinators(&self) -> &[Combinator] {
        &self.combinators
    }

    pub fn matches(&self, doc: &Document, id: NodeId) -> bool {
        self.match_at(doc, id, self.compounds.len() - 1)
    }

    fn match_at(&self, doc: &Document, id: NodeId, index: usize) -> bool {
        if !self.compounds[index].matches(doc, id) {
            return false;
        }
        if index == 0 {
            return true;
        }

        match self.combinators[index - 1] {
            Combinator::Child => doc
                .parent_element(id)
                .is_some_and(|parent| self.match_at(doc, parent, index - 1)),
            Combinator::Descendant => doc
                .ancestors(id)
                .filter(|ancestor| doc.is_element(*ancestor))
                .any(|ancestor| self.match_at(doc, ancestor, index - 1)),
            Combinator::NextSibling => doc
                .previous_element_sibling(id)
                .is_some_and(|sibling| self.match_at(doc, sibling, index - 1)),
            Combinator::SubsequentSibling => {
                let mut current = doc.previous_element_sibling(id);
                while let Some(sibling) = current {
                    if self.match_at(doc, sibling, index - 1) {
                        return true;
                    }
                    current = doc.previous_element_sibling(sibling);
                }
                false
            }
        }
    }
}

impl Compound {
    pub fn matches(&self, doc: &Document, id: NodeId) -> bool {
        let Some(element) = doc.element(id) else {
            return false;
        };

        if let Some(tag) = &self.tag {
            if element.tag != *tag {
                return false;
            }
        }

        self.conditions
            .iter()
            .all(|condition| condition.matches(doc, id))
    }
}

impl Condition {
    fn matches(&self, doc: &Document, id: NodeId) -> bool {
        match self {
            Condition::Id(expected) => doc.attribute(id, "id") == Some(expected.as_str()),
            Condition::Class(class) => doc.has_class(id, class),
            Condition::Attribute { name, matcher } => match doc.attribute(id, name) {
                None => false,
                Some(actual) => match matcher {
                    None => true,
                    Some((operator, expected)) => operator.test(actual, expected),
                },
            },
            Condition::FirstChild => {
                doc.parent(id).is_some() && doc.previous_element_sibling(id).is_none()
            }
            Condition::LastChild => {
                doc.parent(id).is_some() && doc.next_element_sibling(id).is_none()
            }
            Condition::OnlyChild => {
                doc.parent(id).is_some()
                    && doc.previous_element_sibling(id).is_none()
                    && doc.next_element_sibling(id).is_none()
            }
            Condition::NthChild(nth) => {
                element_position(doc, id, false).is_some_and(|index| nth.matches(index))
            }
            Condition::NthOfType(nth) => {
                element_position(doc, id, true).is_some_and(|index| nth.matches(index))
            }
            Condition::Not(compounds) => !compounds.iter().any(|compound| compound.matches(doc, id)),
        }
    }
}

/// 1-based position among element siblings, optionally only those with the same tag
pub fn element_position(doc: &Document, id: NodeId, same_tag: bool) -> Option<i64> {
    let parent = doc.parent(id)?;
    let tag = doc.tag_name(id)?;
    let mut index = 0;
    for sibling in doc.element_children(parent) {
        if !same_tag || doc.tag_name(sibling) == Some(tag) {
            index += 1;
        }
        if sibling == id {
            return Some(index);
        }
    }
    None
}

struct Parser<'src> {
    source: &'src str,
    tokens: Vec<(Token<'src>, Range<usize>)>,
    pos: usize,
}

impl<'src> Parser<'src> {
    fn peek(&self) -> Option<Token<'src>> {
        self.tokens.get(self.pos).map(|(token, _)| *token)
    }

    fn peek_pos(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(_, span)| span.start)
            .unwrap_or(self.source.len())
    }

    fn advance(&mut self) -> Option<Token<'src>> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn skip_whitespace(&mut self) -> bool {
        let mut skipped = false;
        while self.peek() == Some(Token::Whitespace) {
            self.pos += 1;
            skipped = true;
        }
        skipped
    }

    fn unexpected(&self, expected: &str) -> SelectorError {
        match self.peek() {
            Some(token) => {
                SelectorError::unexpected_token(self.peek_pos(), expected, token.to_string())
            }
            None => SelectorError::unexpected_end(self.source.len()),
        }
    }

    fn expect(&mut self, expected: Token<'src>) -> Result<(), SelectorError> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected(&expected.to_string()))
        }
    }

    fn expect_ident(&mut self) -> Result<&'src str, SelectorError> {
        match self.peek() {
            Some(Token::Ident(name)) => {
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn parse_list(&mut self) -> Result<SelectorList, SelectorError> {
        let mut selectors = Vec::new();

        loop {
            self.skip_whitespace();
            selectors.push(self.parse_complex()?);
            self.skip_whitespace();

            match self.peek() {
                None => break,
                Some(Token::Comma) => {
                    self.pos += 1;
                }
                Some(_) => return Err(self.unexpected("',' or end of selector")),
            }
        }

        Ok(SelectorList { selectors })
    }

    fn parse_complex(&mut self) -> Result<ComplexSelector, SelectorError> {
        let mut compounds = vec![self.parse_compound()?];
        let mut combinators = Vec::new();

        loop {
            let had_space = self.skip_whitespace();
            let combinator = match self.peek() {
                Some(Token::Greater) => Combinator::Child,
                Some(Token::Plus) => Combinator::NextSibling,
                Some(Token::Tilde) => Combinator::SubsequentSibling,
                Some(token) if had_space && starts_compound(token) => Combinator::Descendant,
                _ => break,
            };

            if combinator != Combinator::Descendant {
                self.pos += 1;
                self.skip_whitespace();
            }

            combinators.push(combinator);
            compounds.push(self.parse_compound()?);
        }

        Ok(ComplexSelector {
            compounds,
            combinators,
        })
    }

    fn parse_compound(&mut self) -> Result<Compound, SelectorError> {
        let mut compound = Compound::default();
        let mut universal = false;

        match self.peek() {
            Some(Token::Ident(name)) => {
                self.pos += 1;
                compound.tag = Some(unescape(name).to_ascii_lowercase());
            }
            Some(Token::Star) => {
                self.pos += 1;
                universal = true;
            }
            _ => {}
        }

        loop {
            match self.peek() {
                Some(Token::Hash(hash)) => {
                    self.pos += 1;
                    compound.conditions.push(Condition::Id(unescape(&hash[1..])));
                }
                Some(Token::Dot) => {
                    self.pos += 1;
                    let class = self.expect_ident()?;
                    compound.conditions.push(Condition::Class(unescape(class)));
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    let condition = self.parse_attribute()?;
                    compound.conditions.push(condition);
                }
                Some(Token::Colon) => {
                    self.pos += 1;
                    let condition = self.parse_pseudo()?;
                    compound.conditions.push(condition);
                }
                _ => break,
            }
        }

        if compound.tag.is_none() && compound.conditions.is_empty() && !universal {
            return Err(self.unexpected("selector"));
        }

        Ok(compound)
    }

    fn parse_attribute(&mut self) -> Result<Condition, SelectorError> {
        self.skip_whitespace();
        let name = unescape(self.expect_ident()?).to_ascii_lowercase();
        self.skip_whitespace();

        let operator = match self.peek() {
            Some(Token::RBracket) => {
                self.pos += 1;
                return Ok(Condition::Attribute {
                    name,
                    matcher: None,
                });
            }
            Some(Token::Equals) => AttrOperator::Exact,
            Some(Token::Includes) => AttrOperator::Includes,
            Some(Token::Prefix) => AttrOperator::Prefix,
            Some(Token::Suffix) => AttrOperator::Suffix,
            Some(Token::Substring) => AttrOperator::Substring,
            Some(Token::DashMatch) => AttrOperator::DashMatch,
            _ => return Err(self.unexpected("attribute operator or ']'")),
        };
        self.pos += 1;
        self.skip_whitespace();

        let value = match self.peek() {
            Some(Token::Ident(value)) => unescape(value),
            Some(Token::Str(value)) => unescape(&value[1..value.len() - 1]),
            Some(Token::Number(value)) => value.to_string(),
            _ => return Err(self.unexpected("attribute value")),
        };
        self.pos += 1;
        self.skip_whitespace();
        self.expect(Token::RBracket)?;

        Ok(Condition::Attribute {
            name,
            matcher: Some((operator, value)),
        })
    }

    fn parse_pseudo(&mut self) -> Result<Condition, SelectorError> {
        let start = self.peek_pos();
        let name = self.expect_ident()?.to_ascii_lowercase();

        match name.as_str() {
            "first-child" => Ok(Condition::FirstChild),
            "last-child" => Ok(Condition::LastChild),
            "only-child" => Ok(Condition::OnlyChild),
            "nth-child" | "nth-of-type" => {
                self.expect(Token::LParen)?;
                let text_start = self.peek_pos();
                let text = self.raw_until_close()?;
                let nth =
                    Nth::parse(text).ok_or_else(|| SelectorError::invalid_nth(text_start, text))?;
                if name == "nth-child" {
                    Ok(Condition::NthChild(nth))
                } else {
                    Ok(Condition::NthOfType(nth))
                }
            }
            "not" => {
                self.expect(Token::LParen)?;
                self.skip_whitespace();
                let mut compounds = vec![self.parse_compound()?];
                loop {
                    self.skip_whitespace();
                    if self.peek() != Some(Token::Comma) {
                        break;
                    }
                    self.pos += 1;
                    self.skip_whitespace();
                    compounds.push(self.parse_compound()?);
                }
                self.expect(Token::RParen)?;
                Ok(Condition::Not(compounds))
            }
            _ => Err(SelectorError::unsupported(start, name)),
        }
    }

    /// Source text up to the matching `)`, which is consumed
    fn raw_until_close(&mut self) -> Result<&'src str, SelectorError> {
        let start = self.peek_pos();
        loop {
            match self.advance() {
                Some(Token::RParen) => {
                    let end = self.tokens[self.pos - 1].1.start;
                    return Ok(&self.source[start..end]);
                }
                Some(_) => {}
                None => return Err(SelectorError::unexpected_end(self.source.len())),
            }
        }
    }
}

fn starts_compound(token: Token<'_>) -> bool {
    matches!(
        token,
        Token::Ident(_) | Token::Star | Token::Hash(_) | Token::Dot | Token::LBracket | Token::Colon
    )
}

/// Resolve CSS backslash escapes in an identifier or string body
pub fn unescape(raw: &str) -> String {
    if !raw.contains('\\') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }

        let mut hex = String::new();
        while hex.len() < 6 {
            match chars.peek() {
                Some(c) if c.is_ascii_hexdigit() => {
                    hex.push(*c);
                    chars.next();
                }
                _ => break,
            }
        }

        if hex.is_empty() {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            if chars.peek() == Some(&' ') {
                chars.next();
            }
            let decoded = u32::from_str_radix(&hex, 16)
                .ok()
                .and_then(char::from_u32)
                .unwrap_or('\u{FFFD}');
            out.push(decoded);
        }
    }

    out
}

/// Escape a value so it can be used as a CSS identifier (id, class, tag).
pub fn escape_identifier(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let leading_dash = value.starts_with('-');

    for (index, ch) in value.chars().enumerate() {
        let leading_digit = ch.is_ascii_digit() && (index == 0 || (index == 1 && leading_dash));
        if leading_digit || ch.is_control() {
            out.push_str(&format!("\\{:x} ", ch as u32));
        } else if ch == '-' && index == 1 && leading_dash {
            out.push_str("\\-");
        } else if ch == '-' && index == 0 && value.len() == 1 {
            out.push_str("\\-");
        } else if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' || !ch.is_ascii() {
            out.push(ch);
        } else {
            out.push('\\');
            out.push(ch);
        }
    }

    out
}
