use crate::diagnostics::SyntaxError;

/// Byte range within the original source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
}

impl SourceSpan {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    If,
    While,
    Function,
    Class,
    Call,
    Print,
    Return,
    Try,
    Catch,
    Finally,
    Throw,
    Import,
    Export,
    Heap,
    Stack,
    Vmem,
    Paging,
    Swap,
    Gc,
    Memory,
    Thread,
    Join,
    Lock,
    Unlock,
    Task,
    Process,
    Object,
    Debug,
    Breakpoint,
    Priority,
    After,
    In,
    Out,
    Alloc,
    Allocate,
    Free,
    Push,
    Pop,
    Read,
    Write,
    Run,
    Start,
    Create,
    Terminate,
    New,
    Set,
    Get,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Greater,
    Less,
    GreaterEqual,
    LessEqual,
    EqualEqual,
    BangEqual,
    AndAnd,
    OrOr,
    Bang,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delim {
    Colon,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Keyword(Keyword),
    Identifier,
    Number,
    String,
    Operator(Op),
    Delimiter(Delim),
    Comment,
    Indent,
    Newline,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: usize,
    pub span: SourceSpan,
}

pub fn tokenize(source: &str) -> (Vec<Token>, Vec<SyntaxError>) {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    let mut offset = 0;
    for (idx, raw_line) in source.split('\n').enumerate() {
        let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);
        LineLexer::new(line, idx + 1, offset).run(&mut tokens, &mut errors);
        offset += raw_line.len() + 1;
    }
    (tokens, errors)
}

struct LineLexer<'a> {
    line: &'a str,
    line_no: usize,
    offset: usize,
    chars: std::str::CharIndices<'a>,
    current: usize,
    peeked: Option<(usize, char)>,
}

impl<'a> LineLexer<'a> {
    fn new(line: &'a str, line_no: usize, offset: usize) -> Self {
        Self {
            line,
            line_no,
            offset,
            chars: line.char_indices(),
            current: 0,
            peeked: None,
        }
    }

    fn bump(&mut self) -> Option<(usize, char)> {
        let next = if let Some(pair) = self.peeked.take() {
            Some(pair)
        } else {
            self.chars.next()
        };
        if let Some((idx, ch)) = next {
            self.current = idx + ch.len_utf8();
            Some((idx, ch))
        } else {
            None
        }
    }

    fn peek(&mut self) -> Option<(usize, char)> {
        if self.peeked.is_none() {
            self.peeked = self.chars.next();
        }
        self.peeked
    }

    fn match_next(&mut self, expected: char) -> bool {
        if let Some((idx, ch)) = self.peek() {
            if ch == expected {
                self.peeked = None;
                self.current = idx + ch.len_utf8();
                return true;
            }
        }
        false
    }

    fn token(&self, kind: TokenKind, start: usize) -> Token {
        Token {
            kind,
            lexeme: self.line[start..self.current].to_string(),
            line: self.line_no,
            span: SourceSpan::new(self.offset + start, self.offset + self.current),
        }
    }

    fn run(mut self, tokens: &mut Vec<Token>, errors: &mut Vec<SyntaxError>) {
        self.indentation(tokens, errors);
        while let Some((start, ch)) = self.bump() {
            match ch {
                ' ' | '\t' => continue,
                '#' => {
                    while self.bump().is_some() {}
                    tokens.push(self.token(TokenKind::Comment, start));
                }
                '"' | '\'' => tokens.push(self.string_literal(start, ch, errors)),
                '=' => {
                    let op = if self.match_next('=') { Op::EqualEqual } else { Op::Assign };
                    tokens.push(self.token(TokenKind::Operator(op), start));
                }
                '>' => {
                    let op = if self.match_next('=') { Op::GreaterEqual } else { Op::Greater };
                    tokens.push(self.token(TokenKind::Operator(op), start));
                }
                '<' => {
                    let op = if self.match_next('=') { Op::LessEqual } else { Op::Less };
                    tokens.push(self.token(TokenKind::Operator(op), start));
                }
                '!' => {
                    let op = if self.match_next('=') { Op::BangEqual } else { Op::Bang };
                    tokens.push(self.token(TokenKind::Operator(op), start));
                }
                '&' => {
                    let token = if self.match_next('&') {
                        self.token(TokenKind::Operator(Op::AndAnd), start)
                    } else {
                        self.token(TokenKind::Unknown, start)
                    };
                    tokens.push(token);
                }
                '|' => {
                    let token = if self.match_next('|') {
                        self.token(TokenKind::Operator(Op::OrOr), start)
                    } else {
                        self.token(TokenKind::Unknown, start)
                    };
                    tokens.push(token);
                }
                '+' => tokens.push(self.token(TokenKind::Operator(Op::Plus), start)),
                '-' => tokens.push(self.token(TokenKind::Operator(Op::Minus), start)),
                '*' => tokens.push(self.token(TokenKind::Operator(Op::Star), start)),
                '/' => tokens.push(self.token(TokenKind::Operator(Op::Slash), start)),
                '%' => tokens.push(self.token(TokenKind::Operator(Op::Percent), start)),
                ':' => tokens.push(self.token(TokenKind::Delimiter(Delim::Colon), start)),
                ',' => tokens.push(self.token(TokenKind::Delimiter(Delim::Comma), start)),
                '(' => tokens.push(self.token(TokenKind::Delimiter(Delim::LParen), start)),
                ')' => tokens.push(self.token(TokenKind::Delimiter(Delim::RParen), start)),
                '[' => tokens.push(self.token(TokenKind::Delimiter(Delim::LBracket), start)),
                ']' => tokens.push(self.token(TokenKind::Delimiter(Delim::RBracket), start)),
                '{' => tokens.push(self.token(TokenKind::Delimiter(Delim::LBrace), start)),
                '}' => tokens.push(self.token(TokenKind::Delimiter(Delim::RBrace), start)),
                _ => tokens.push(self.word(start)),
            }
        }
        tokens.push(Token {
            kind: TokenKind::Newline,
            lexeme: String::new(),
            line: self.line_no,
            span: SourceSpan::new(self.offset + self.current, self.offset + self.current),
        });
    }

    fn indentation(&mut self, tokens: &mut Vec<Token>, errors: &mut Vec<SyntaxError>) {
        let start = 0;
        let mut saw_tab = false;
        while let Some((_, ch)) = self.peek() {
            match ch {
                ' ' => {
                    self.bump();
                }
                '\t' => {
                    saw_tab = true;
                    self.bump();
                }
                _ => break,
            }
        }
        if saw_tab {
            errors.push(SyntaxError::new(
                self.line_no,
                "indentation must use spaces, found a tab",
            ));
        }
        if self.current > start && self.peek().is_some() {
            tokens.push(self.token(TokenKind::Indent, start));
        }
    }

    /// No escape sequences; every character between the quotes is verbatim.
    fn string_literal(
        &mut self,
        start: usize,
        quote: char,
        errors: &mut Vec<SyntaxError>,
    ) -> Token {
        let mut value = String::new();
        let mut closed = false;
        while let Some((_, ch)) = self.bump() {
            if ch == quote {
                closed = true;
                break;
            }
            value.push(ch);
        }
        if !closed {
            errors.push(SyntaxError::new(
                self.line_no,
                format!("unterminated string literal starting with {quote}"),
            ));
        }
        Token {
            kind: TokenKind::String,
            lexeme: value,
            line: self.line_no,
            span: SourceSpan::new(self.offset + start, self.offset + self.current),
        }
    }

    /// Words like `5s` or `math.pi` stay in the stream as unknown tokens.
    fn word(&mut self, start: usize) -> Token {
        while let Some((_, ch)) = self.peek() {
            if is_word_char(ch) {
                self.bump();
            } else {
                break;
            }
        }
        let lexeme = &self.line[start..self.current];
        let kind = match keyword_for(lexeme) {
            Some(keyword) => TokenKind::Keyword(keyword),
            None if is_number(lexeme) => TokenKind::Number,
            None if is_identifier(lexeme) => TokenKind::Identifier,
            None => TokenKind::Unknown,
        };
        self.token(kind, start)
    }
}

fn is_word_char(ch: char) -> bool {
    !ch.is_whitespace()
        && !matches!(
            ch,
            '=' | '+'
                | '-'
                | '*'
                | '/'
                | '%'
                | '>'
                | '<'
                | '!'
                | '&'
                | '|'
                | ':'
                | ','
                | '('
                | ')'
                | '['
                | ']'
                | '{'
                | '}'
                | '"'
                | '\''
                | '#'
        )
}

fn is_number(word: &str) -> bool {
    let mut parts = word.splitn(2, '.');
    let whole = parts.next().unwrap_or("");
    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    match parts.next() {
        None => true,
        Some(frac) => !frac.is_empty() && frac.bytes().all(|b| b.is_ascii_digit()),
    }
}

fn is_identifier(word: &str) -> bool {
    let mut chars = word.chars();
    match chars.next() {
        Some(ch) if ch.is_ascii_alphabetic() || ch == '_' => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

fn keyword_for(word: &str) -> Option<Keyword> {
    use self::Keyword as Kw;
    let keyword = match word {
        "if" => Kw::If,
        "while" => Kw::While,
        "function" => Kw::Function,
        "class" => Kw::Class,
        "call" => Kw::Call,
        "print" => Kw::Print,
        "return" => Kw::Return,
        "try" => Kw::Try,
        "catch" => Kw::Catch,
        "finally" => Kw::Finally,
        "throw" => Kw::Throw,
        "import" => Kw::Import,
        "export" => Kw::Export,
        "heap" => Kw::Heap,
        "stack" => Kw::Stack,
        "vmem" => Kw::Vmem,
        "paging" => Kw::Paging,
        "swap" => Kw::Swap,
        "gc" => Kw::Gc,
        "memory" => Kw::Memory,
        "thread" => Kw::Thread,
        "join" => Kw::Join,
        "lock" => Kw::Lock,
        "unlock" => Kw::Unlock,
        "task" => Kw::Task,
        "process" => Kw::Process,
        "object" => Kw::Object,
        "debug" => Kw::Debug,
        "breakpoint" => Kw::Breakpoint,
        "priority" => Kw::Priority,
        "after" => Kw::After,
        "in" => Kw::In,
        "out" => Kw::Out,
        "alloc" => Kw::Alloc,
        "allocate" => Kw::Allocate,
        "free" => Kw::Free,
        "push" => Kw::Push,
        "pop" => Kw::Pop,
        "read" => Kw::Read,
        "write" => Kw::Write,
        "run" => Kw::Run,
        "start" => Kw::Start,
        "create" => Kw::Create,
        "terminate" => Kw::Terminate,
        "new" => Kw::New,
        "set" => Kw::Set,
        "get" => Kw::Get,
        _ => return None,
    };
    Some(keyword)
}
