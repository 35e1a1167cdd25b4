//! Token kinds produced by the scanner (spec §4.1).

use std::fmt;

/// Keyword identity, used both by the parser (productions dispatch on this)
/// and by the scanner's keyword table.
///
/// Grounded on `examples/original_source/src/include/parser/cypher_tokens.h`
/// and `cypher_keywords.h` — the full keyword list the original grammar
/// recognizes, including ones only `CALL … YIELD` and `ANALYZE`/`EXPLAIN`
/// prefixes touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    All,
    Analyze,
    And,
    As,
    Asc,
    Ascending,
    By,
    Call,
    Case,
    Coalesce,
    Contains,
    Count,
    Create,
    Delete,
    Desc,
    Descending,
    Detach,
    Distinct,
    Else,
    End,
    Ends,
    Exists,
    Explain,
    False,
    In,
    Is,
    Limit,
    Match,
    Merge,
    Not,
    Null,
    Optional,
    Or,
    Order,
    Reduce,
    Remove,
    Return,
    Set,
    ShortestPath,
    Skip,
    Starts,
    Then,
    True,
    Union,
    Unwind,
    Verbose,
    When,
    Where,
    With,
    Xor,
    Yield,
}

/// Sorted (by lowercased text) keyword table, searched by binary search,
/// case-insensitively, per spec §4.1.
pub const KEYWORDS: &[(&str, Keyword)] = &[
    ("all", Keyword::All),
    ("analyze", Keyword::Analyze),
    ("and", Keyword::And),
    ("as", Keyword::As),
    ("asc", Keyword::Asc),
    ("ascending", Keyword::Ascending),
    ("by", Keyword::By),
    ("call", Keyword::Call),
    ("case", Keyword::Case),
    ("coalesce", Keyword::Coalesce),
    ("contains", Keyword::Contains),
    ("count", Keyword::Count),
    ("create", Keyword::Create),
    ("delete", Keyword::Delete),
    ("desc", Keyword::Desc),
    ("descending", Keyword::Descending),
    ("detach", Keyword::Detach),
    ("distinct", Keyword::Distinct),
    ("else", Keyword::Else),
    ("end", Keyword::End),
    ("ends", Keyword::Ends),
    ("exists", Keyword::Exists),
    ("explain", Keyword::Explain),
    ("false", Keyword::False),
    ("in", Keyword::In),
    ("is", Keyword::Is),
    ("limit", Keyword::Limit),
    ("match", Keyword::Match),
    ("merge", Keyword::Merge),
    ("not", Keyword::Not),
    ("null", Keyword::Null),
    ("optional", Keyword::Optional),
    ("or", Keyword::Or),
    ("order", Keyword::Order),
    ("reduce", Keyword::Reduce),
    ("remove", Keyword::Remove),
    ("return", Keyword::Return),
    ("set", Keyword::Set),
    ("shortestpath", Keyword::ShortestPath),
    ("skip", Keyword::Skip),
    ("starts", Keyword::Starts),
    ("then", Keyword::Then),
    ("true", Keyword::True),
    ("union", Keyword::Union),
    ("unwind", Keyword::Unwind),
    ("verbose", Keyword::Verbose),
    ("when", Keyword::When),
    ("where", Keyword::Where),
    ("with", Keyword::With),
    ("xor", Keyword::Xor),
    ("yield", Keyword::Yield),
];

/// Binary search over [`KEYWORDS`] (which is sorted at compile time by the
/// literal above); the table is small enough that this is a formality rather
/// than a performance necessity, but it matches the original's
/// `cypher_keyword_lookup` contract (spec §4.1).
pub fn lookup_keyword(text: &str) -> Option<Keyword> {
    let lower = text.to_ascii_lowercase();
    KEYWORDS
        .binary_search_by(|(k, _)| (*k).cmp(lower.as_str()))
        .ok()
        .map(|idx| KEYWORDS[idx].1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    NotEq,     // <> or !=
    LtEq,      // <=
    GtEq,      // >=
    DotDot,    // ..
    TypeCast,  // ::
    PlusEq,    // +=
    RegexEq,   // =~
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operator::NotEq => "<>",
            Operator::LtEq => "<=",
            Operator::GtEq => ">=",
            Operator::DotDot => "..",
            Operator::TypeCast => "::",
            Operator::PlusEq => "+=",
            Operator::RegexEq => "=~",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Eof,
    Integer(i64),
    Decimal(f64),
    String(String),
    Identifier(String),
    Parameter(String),
    BackquotedIdent(String),
    Operator(Operator),
    /// A single ASCII punctuation character: `( ) [ ] { } , . : ; + - * / % < > = | !`
    Char(char),
    Keyword(Keyword),
}

/// One lexical token, with its raw source text and location (spec §4.1).
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: u32,
    pub column: u32,
    /// The raw source slice the token was scanned from.
    pub text: String,
}

impl Token {
    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}
