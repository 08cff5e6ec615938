use crate::{
    ast::{
        BreakpointAction, CatchClause, DebugAction, ExprSrc, Operand, StdlibCall, Stmt, StmtKind,
    },
    diagnostics::SyntaxError,
    lexer::{self, Delim, Keyword, Op, Token, TokenKind},
    memory::Space,
    stdlib::Registry,
};

#[derive(Debug)]
pub struct Parsed {
    pub statements: Vec<Stmt>,
    pub errors: Vec<SyntaxError>,
}

pub fn parse(source: &str) -> Parsed {
    let (tokens, mut errors) = lexer::tokenize(source);
    let lines = group_lines(source, tokens, &mut errors);
    let mut parser = BlockParser {
        source,
        lines,
        pos: 0,
        errors,
    };
    let statements = parser.block(0);
    Parsed {
        statements,
        errors: parser.errors,
    }
}

#[derive(Debug, Clone)]
struct Line {
    indent: usize,
    number: usize,
    tokens: Vec<Token>,
    raw: String,
}

fn group_lines(source: &str, tokens: Vec<Token>, errors: &mut Vec<SyntaxError>) -> Vec<Line> {
    let texts: Vec<&str> = source.split('\n').collect();
    let mut lines = Vec::new();
    let mut indent = 0usize;
    let mut current: Vec<Token> = Vec::new();
    for token in tokens {
        match token.kind {
            TokenKind::Indent => indent = token.lexeme.len(),
            TokenKind::Comment => {}
            TokenKind::Newline => {
                if !current.is_empty() {
                    let number = current[0].line;
                    if indent % 4 != 0 {
                        errors.push(SyntaxError::new(
                            number,
                            "indentation must be a multiple of 4 spaces",
                        ));
                    }
                    let raw = texts
                        .get(number - 1)
                        .map(|text| text.trim().to_string())
                        .unwrap_or_default();
                    lines.push(Line {
                        indent,
                        number,
                        tokens: std::mem::take(&mut current),
                        raw,
                    });
                }
                current.clear();
                indent = 0;
            }
            _ => current.push(token),
        }
    }
    lines
}

struct BlockParser<'a> {
    source: &'a str,
    lines: Vec<Line>,
    pos: usize,
    errors: Vec<SyntaxError>,
}

impl BlockParser<'_> {
    fn block(&mut self, indent: usize) -> Vec<Stmt> {
        let mut statements = Vec::new();
        while let Some(line) = self.lines.get(self.pos) {
            if line.indent < indent {
                break;
            }
            if line.indent > indent {
                self.errors
                    .push(SyntaxError::new(line.number, "unexpected indentation"));
                self.pos += 1;
                continue;
            }
            statements.push(self.statement());
        }
        statements
    }

    fn advance_line(&mut self) -> Line {
        let line = self.lines[self.pos].clone();
        self.pos += 1;
        line
    }

    fn skip_deeper(&mut self, indent: usize) {
        while let Some(line) = self.lines.get(self.pos) {
            if line.indent <= indent {
                break;
            }
            self.pos += 1;
        }
    }

    /// The first deeper line fixes the body's indentation.
    fn body(&mut self, header: &Line, what: &str) -> Vec<Stmt> {
        match self.lines.get(self.pos) {
            Some(next) if next.indent > header.indent => {
                let indent = next.indent;
                self.block(indent)
            }
            _ => {
                self.errors.push(SyntaxError::new(
                    header.number,
                    format!("expected an indented block after `{what}`"),
                ));
                Vec::new()
            }
        }
    }

    fn error(&mut self, line: usize, message: impl Into<String>) -> StmtKind {
        self.errors.push(SyntaxError::new(line, message));
        StmtKind::Unknown
    }

    fn statement(&mut self) -> Stmt {
        let line = self.advance_line();
        let kind = self.statement_kind(&line);
        Stmt {
            kind,
            line: line.number,
            raw: line.raw,
        }
    }

    fn statement_kind(&mut self, line: &Line) -> StmtKind {
        let first = match line.tokens.first() {
            Some(token) => token,
            None => return StmtKind::Unknown,
        };
        match &first.kind {
            TokenKind::Keyword(Keyword::If) => self.parse_conditional(line, true),
            TokenKind::Keyword(Keyword::While) => self.parse_conditional(line, false),
            TokenKind::Keyword(Keyword::Function) => self.parse_function(line),
            TokenKind::Keyword(Keyword::Class) => self.parse_class(line),
            TokenKind::Keyword(Keyword::Call) => self.parse_call(line),
            TokenKind::Keyword(Keyword::Print) => self.parse_print(line),
            TokenKind::Keyword(Keyword::Return) => self.parse_return(line),
            TokenKind::Keyword(Keyword::Try) => self.parse_try(line),
            TokenKind::Keyword(Keyword::Throw) => self.parse_throw(line),
            TokenKind::Keyword(Keyword::Import) => self.parse_module_marker(line, true),
            TokenKind::Keyword(Keyword::Export) => self.parse_module_marker(line, false),
            TokenKind::Keyword(Keyword::Heap) => self.parse_space_op(line, Space::Heap),
            TokenKind::Keyword(Keyword::Vmem) => self.parse_space_op(line, Space::Vmem),
            TokenKind::Keyword(Keyword::Paging) => self.parse_space_op(line, Space::Page),
            TokenKind::Keyword(Keyword::Swap) => self.parse_swap(line),
            TokenKind::Keyword(Keyword::Memory) => self.parse_memory(line),
            TokenKind::Keyword(Keyword::Stack) => self.parse_stack(line),
            TokenKind::Keyword(Keyword::Gc) => self.parse_gc(line),
            TokenKind::Keyword(Keyword::Thread) => self.parse_named(line, "thread", |name| {
                StmtKind::ThreadCreate { name }
            }),
            TokenKind::Keyword(Keyword::Join) => {
                self.parse_named(line, "join", |name| StmtKind::ThreadJoin { name })
            }
            TokenKind::Keyword(Keyword::Lock) => {
                self.parse_named(line, "lock", |name| StmtKind::LockAcquire { name })
            }
            TokenKind::Keyword(Keyword::Unlock) => {
                self.parse_named(line, "unlock", |name| StmtKind::LockRelease { name })
            }
            TokenKind::Keyword(Keyword::Task) => self.parse_task(line),
            TokenKind::Keyword(Keyword::Process) => self.parse_process(line),
            TokenKind::Keyword(Keyword::Object) => self.parse_object(line),
            TokenKind::Keyword(Keyword::Debug) => self.parse_debug(line),
            TokenKind::Keyword(Keyword::Breakpoint) => self.parse_breakpoint(line),
            TokenKind::Keyword(Keyword::Catch) => {
                self.skip_deeper(line.indent);
                self.error(line.number, "`catch` without a preceding `try`")
            }
            TokenKind::Keyword(Keyword::Finally) => {
                self.skip_deeper(line.indent);
                self.error(line.number, "`finally` without a preceding `try`")
            }
            TokenKind::Identifier
                if matches!(
                    line.tokens.get(1).map(|t| &t.kind),
                    Some(TokenKind::Operator(Op::Assign))
                ) =>
            {
                self.parse_assignment(line)
            }
            TokenKind::Unknown
                if first.lexeme.contains('.')
                    && matches!(
                        line.tokens.get(1).map(|t| &t.kind),
                        Some(TokenKind::Delimiter(Delim::LParen))
                    ) =>
            {
                self.parse_dotted_call(line)
            }
            _ => {
                if ends_with_colon(&line.tokens) {
                    self.skip_deeper(line.indent);
                }
                StmtKind::Unknown
            }
        }
    }

    fn parse_assignment(&mut self, line: &Line) -> StmtKind {
        let name = line.tokens[0].lexeme.clone();
        let rhs = &line.tokens[2..];
        if rhs.is_empty() {
            return self.error(line.number, "expected a value after `=`");
        }
        StmtKind::Assign {
            name,
            value: self.operand(rhs),
        }
    }

    fn parse_print(&mut self, line: &Line) -> StmtKind {
        let rest = &line.tokens[1..];
        if rest.is_empty() {
            return self.error(line.number, "`print` needs at least one operand");
        }
        let mut operands = Vec::new();
        for piece in split_commas(rest) {
            if piece.is_empty() {
                return self.error(line.number, "empty `print` operand");
            }
            operands.push(self.operand(piece));
        }
        StmtKind::Print { operands }
    }

    fn parse_conditional(&mut self, line: &Line, is_if: bool) -> StmtKind {
        let what = if is_if { "if" } else { "while" };
        let rest = &line.tokens[1..];
        if !ends_with_colon(rest) {
            return self.error(line.number, format!("expected `:` to end the `{what}` header"));
        }
        let condition = &rest[..rest.len() - 1];
        if condition.is_empty() {
            return self.error(line.number, format!("expected a condition after `{what}`"));
        }
        let condition = self.expr_src(condition);
        let body = self.body(line, what);
        if is_if {
            StmtKind::If { condition, body }
        } else {
            StmtKind::While { condition, body }
        }
    }

    fn parse_function(&mut self, line: &Line) -> StmtKind {
        let mut cursor = LineCursor::new(&line.tokens[1..]);
        let name = match cursor.identifier() {
            Some(name) => name,
            None => return self.error(line.number, "expected a function name after `function`"),
        };
        let mut params = Vec::new();
        if cursor.eat_delim(Delim::LParen) {
            if !cursor.eat_delim(Delim::RParen) {
                loop {
                    match cursor.identifier() {
                        Some(param) => params.push(param),
                        None => {
                            return self.error(line.number, "expected a parameter name")
                        }
                    }
                    if cursor.eat_delim(Delim::Comma) {
                        continue;
                    }
                    if cursor.eat_delim(Delim::RParen) {
                        break;
                    }
                    return self.error(line.number, "expected `,` or `)` in the parameter list");
                }
            }
        }
        if !(cursor.eat_delim(Delim::Colon) && cursor.at_end()) {
            return self.error(line.number, "expected `:` to end the `function` header");
        }
        let body = self.body(line, "function");
        StmtKind::FunctionDef { name, params, body }
    }

    fn parse_class(&mut self, line: &Line) -> StmtKind {
        let mut cursor = LineCursor::new(&line.tokens[1..]);
        let name = match cursor.identifier() {
            Some(name) => name,
            None => return self.error(line.number, "expected a class name after `class`"),
        };
        if !(cursor.eat_delim(Delim::Colon) && cursor.at_end()) {
            return self.error(line.number, "expected `:` to end the `class` header");
        }
        let body = self.body(line, "class");
        StmtKind::ClassDef { name, body }
    }

    fn parse_call(&mut self, line: &Line) -> StmtKind {
        let mut cursor = LineCursor::new(&line.tokens[1..]);
        let name = match cursor.identifier() {
            Some(name) => name,
            None => return self.error(line.number, "expected a function name after `call`"),
        };
        let rest = cursor.rest();
        let args = if rest.is_empty() {
            Vec::new()
        } else {
            match paren_args(rest) {
                Some(pieces) => pieces.iter().map(|piece| self.expr_src(piece)).collect(),
                None => return self.error(line.number, "malformed `call` argument list"),
            }
        };
        StmtKind::Call { name, args }
    }

    fn parse_return(&mut self, line: &Line) -> StmtKind {
        let rest = &line.tokens[1..];
        let value = if rest.is_empty() {
            None
        } else {
            Some(self.operand(rest))
        };
        StmtKind::Return { value }
    }

    fn parse_try(&mut self, line: &Line) -> StmtKind {
        let rest = &line.tokens[1..];
        if !(rest.len() == 1 && ends_with_colon(rest)) {
            self.errors.push(SyntaxError::new(
                line.number,
                "expected `:` directly after `try`",
            ));
        }
        let body = self.body(line, "try");
        let mut catch = None;
        let mut finally: Option<Vec<Stmt>> = None;
        loop {
            match self.peek_clause(line.indent) {
                Some(Keyword::Catch) if catch.is_none() && finally.is_none() => {
                    let clause = self.advance_line();
                    let mut cursor = LineCursor::new(&clause.tokens[1..]);
                    let binding = cursor.identifier();
                    if !(cursor.eat_delim(Delim::Colon) && cursor.at_end()) {
                        self.errors.push(SyntaxError::new(
                            clause.number,
                            "expected `:` to end the `catch` header",
                        ));
                    }
                    let clause_body = self.body(&clause, "catch");
                    catch = Some(CatchClause {
                        binding,
                        body: clause_body,
                    });
                }
                Some(Keyword::Finally) if finally.is_none() => {
                    let clause = self.advance_line();
                    let mut cursor = LineCursor::new(&clause.tokens[1..]);
                    if !(cursor.eat_delim(Delim::Colon) && cursor.at_end()) {
                        self.errors.push(SyntaxError::new(
                            clause.number,
                            "expected `:` to end the `finally` header",
                        ));
                    }
                    finally = Some(self.body(&clause, "finally"));
                }
                _ => break,
            }
        }
        StmtKind::Try {
            body,
            catch,
            finally,
        }
    }

    fn peek_clause(&self, indent: usize) -> Option<Keyword> {
        let next = self.lines.get(self.pos)?;
        if next.indent != indent {
            return None;
        }
        match next.tokens.first().map(|t| &t.kind) {
            Some(TokenKind::Keyword(keyword @ (Keyword::Catch | Keyword::Finally))) => {
                Some(*keyword)
            }
            _ => None,
        }
    }

    fn parse_throw(&mut self, line: &Line) -> StmtKind {
        let rest = &line.tokens[1..];
        if rest.is_empty() {
            return self.error(line.number, "expected a value after `throw`");
        }
        StmtKind::Throw {
            value: self.operand(rest),
        }
    }

    fn parse_module_marker(&mut self, line: &Line, import: bool) -> StmtKind {
        let what = if import { "import" } else { "export" };
        let mut cursor = LineCursor::new(&line.tokens[1..]);
        let target = match cursor.bump() {
            Some(token)
                if matches!(
                    token.kind,
                    TokenKind::Identifier | TokenKind::Unknown | TokenKind::String
                ) =>
            {
                token.lexeme.clone()
            }
            _ => return self.error(line.number, format!("expected a module name after `{what}`")),
        };
        if !cursor.at_end() {
            return self.error(line.number, format!("unexpected tokens after `{what}`"));
        }
        if import {
            StmtKind::Import { target }
        } else {
            StmtKind::Export { target }
        }
    }

    fn parse_space_op(&mut self, line: &Line, space: Space) -> StmtKind {
        let mut cursor = LineCursor::new(&line.tokens[1..]);
        if cursor.eat_keyword(Keyword::Alloc) || cursor.eat_keyword(Keyword::Allocate) {
            let name = match cursor.identifier() {
                Some(name) => name,
                None => {
                    return self.error(line.number, format!("expected a variable after `{space} alloc`"))
                }
            };
            let size = cursor.rest();
            if size.is_empty() {
                return self.error(line.number, format!("expected a size after `{space} alloc`"));
            }
            return StmtKind::Alloc {
                space,
                name,
                size: self.expr_src(size),
            };
        }
        if cursor.eat_keyword(Keyword::Free) {
            let name = match cursor.identifier() {
                Some(name) => name,
                None => {
                    return self.error(line.number, format!("expected a variable after `{space} free`"))
                }
            };
            if !cursor.at_end() {
                return self.error(line.number, format!("unexpected tokens after `{space} free`"));
            }
            return StmtKind::Free {
                space: Some(space),
                name,
            };
        }
        self.error(line.number, format!("unknown `{space}` operation"))
    }

    fn parse_swap(&mut self, line: &Line) -> StmtKind {
        let mut cursor = LineCursor::new(&line.tokens[1..]);
        let out = if cursor.eat_keyword(Keyword::Out) {
            true
        } else if cursor.eat_keyword(Keyword::In) {
            false
        } else {
            return self.error(line.number, "expected `out` or `in` after `swap`");
        };
        let name = match cursor.identifier() {
            Some(name) => name,
            None => return self.error(line.number, "expected a variable after `swap`"),
        };
        if !cursor.at_end() {
            return self.error(line.number, "unexpected tokens after `swap`");
        }
        if out {
            StmtKind::SwapOut { name }
        } else {
            StmtKind::SwapIn { name }
        }
    }

    fn parse_memory(&mut self, line: &Line) -> StmtKind {
        let mut cursor = LineCursor::new(&line.tokens[1..]);
        if cursor.eat_keyword(Keyword::Allocate) || cursor.eat_keyword(Keyword::Alloc) {
            let name = match cursor.identifier() {
                Some(name) => name,
                None => {
                    return self.error(line.number, "expected a variable after `memory allocate`")
                }
            };
            let size = cursor.rest();
            if size.is_empty() {
                return self.error(line.number, "expected a size after `memory allocate`");
            }
            return StmtKind::Alloc {
                space: Space::Heap,
                name,
                size: self.expr_src(size),
            };
        }
        if cursor.eat_keyword(Keyword::Free) {
            let name = match cursor.identifier() {
                Some(name) => name,
                None => return self.error(line.number, "expected a variable after `memory free`"),
            };
            return StmtKind::Free { space: None, name };
        }
        if cursor.eat_keyword(Keyword::Read) {
            let name = match cursor.identifier() {
                Some(name) => name,
                None => return self.error(line.number, "expected a variable after `memory read`"),
            };
            let index = cursor.rest();
            if index.is_empty() {
                return self.error(line.number, "expected an index after `memory read`");
            }
            return StmtKind::MemoryRead {
                name,
                index: self.expr_src(index),
            };
        }
        if cursor.eat_keyword(Keyword::Write) {
            let name = match cursor.identifier() {
                Some(name) => name,
                None => return self.error(line.number, "expected a variable after `memory write`"),
            };
            let index = match cursor.bump() {
                Some(token) => self.expr_src(std::slice::from_ref(token)),
                None => return self.error(line.number, "expected an index after `memory write`"),
            };
            let value = cursor.rest();
            if value.is_empty() {
                return self.error(line.number, "expected a value after `memory write`");
            }
            return StmtKind::MemoryWrite {
                name,
                index,
                value: self.operand(value),
            };
        }
        self.error(line.number, "unknown `memory` operation")
    }

    fn parse_stack(&mut self, line: &Line) -> StmtKind {
        let mut cursor = LineCursor::new(&line.tokens[1..]);
        if cursor.eat_keyword(Keyword::Push) {
            let value = cursor.rest();
            if value.is_empty() {
                return self.error(line.number, "expected a value after `stack push`");
            }
            return StmtKind::StackPush {
                value: self.operand(value),
            };
        }
        if cursor.eat_keyword(Keyword::Pop) {
            if !cursor.at_end() {
                return self.error(line.number, "unexpected tokens after `stack pop`");
            }
            return StmtKind::StackPop;
        }
        self.error(line.number, "unknown `stack` operation")
    }

    fn parse_gc(&mut self, line: &Line) -> StmtKind {
        let mut cursor = LineCursor::new(&line.tokens[1..]);
        if cursor.eat_keyword(Keyword::Run) && cursor.at_end() {
            StmtKind::GcRun
        } else {
            self.error(line.number, "unknown `gc` operation")
        }
    }

    fn parse_named(
        &mut self,
        line: &Line,
        what: &str,
        build: impl FnOnce(String) -> StmtKind,
    ) -> StmtKind {
        let mut cursor = LineCursor::new(&line.tokens[1..]);
        let name = match cursor.identifier() {
            Some(name) => name,
            None => return self.error(line.number, format!("expected a name after `{what}`")),
        };
        if !cursor.at_end() {
            return self.error(line.number, format!("unexpected tokens after `{what}`"));
        }
        build(name)
    }

    fn parse_task(&mut self, line: &Line) -> StmtKind {
        let mut cursor = LineCursor::new(&line.tokens[1..]);
        if cursor.eat_keyword(Keyword::Start) {
            if !cursor.at_end() {
                return self.error(line.number, "unexpected tokens after `task start`");
            }
            return StmtKind::TaskStart;
        }
        let name = match cursor.identifier() {
            Some(name) => name,
            None => return self.error(line.number, "expected a task name after `task`"),
        };
        if !cursor.eat_keyword(Keyword::After) {
            return self.error(line.number, "expected `after` in the `task` statement");
        }
        let delay = match cursor.bump().and_then(|token| task_delay(&token.lexeme)) {
            Some(delay) => delay,
            None => return self.error(line.number, "invalid task delay"),
        };
        let priority = if cursor.eat_keyword(Keyword::Priority) {
            match cursor.signed_integer() {
                Some(priority) => priority,
                None => return self.error(line.number, "invalid task priority"),
            }
        } else {
            0
        };
        if !cursor.at_end() {
            return self.error(line.number, "unexpected tokens after the `task` statement");
        }
        StmtKind::TaskSchedule {
            name,
            delay,
            priority,
        }
    }

    fn parse_process(&mut self, line: &Line) -> StmtKind {
        let mut cursor = LineCursor::new(&line.tokens[1..]);
        if cursor.eat_keyword(Keyword::Create) {
            let name = match cursor.identifier() {
                Some(name) => name,
                None => return self.error(line.number, "expected a name after `process create`"),
            };
            let priority = match cursor.signed_integer() {
                Some(priority) => priority,
                None => {
                    return self.error(line.number, "expected a priority after `process create`")
                }
            };
            if !cursor.at_end() {
                return self.error(line.number, "unexpected tokens after `process create`");
            }
            return StmtKind::ProcessCreate { name, priority };
        }
        if cursor.eat_keyword(Keyword::Terminate) {
            let name = match cursor.identifier() {
                Some(name) => name,
                None => {
                    return self.error(line.number, "expected a name after `process terminate`")
                }
            };
            if !cursor.at_end() {
                return self.error(line.number, "unexpected tokens after `process terminate`");
            }
            return StmtKind::ProcessTerminate { name };
        }
        self.error(line.number, "unknown `process` operation")
    }

    fn parse_object(&mut self, line: &Line) -> StmtKind {
        let mut cursor = LineCursor::new(&line.tokens[1..]);
        if cursor.eat_keyword(Keyword::New) {
            let name = match cursor.identifier() {
                Some(name) => name,
                None => return self.error(line.number, "expected a variable after `object new`"),
            };
            let class = match cursor.identifier() {
                Some(class) => class,
                None => return self.error(line.number, "expected a class after `object new`"),
            };
            if !cursor.at_end() {
                return self.error(line.number, "unexpected tokens after `object new`");
            }
            return StmtKind::ObjectNew { name, class };
        }
        if cursor.eat_keyword(Keyword::Set) {
            let name = match cursor.identifier() {
                Some(name) => name,
                None => return self.error(line.number, "expected a variable after `object set`"),
            };
            let attribute = match cursor.identifier() {
                Some(attribute) => attribute,
                None => return self.error(line.number, "expected an attribute after `object set`"),
            };
            let value = cursor.rest();
            if value.is_empty() {
                return self.error(line.number, "expected a value after `object set`");
            }
            return StmtKind::ObjectSet {
                name,
                attribute,
                value: self.operand(value),
            };
        }
        if cursor.eat_keyword(Keyword::Get) {
            let name = match cursor.identifier() {
                Some(name) => name,
                None => return self.error(line.number, "expected a variable after `object get`"),
            };
            let attribute = match cursor.identifier() {
                Some(attribute) => attribute,
                None => return self.error(line.number, "expected an attribute after `object get`"),
            };
            if !cursor.at_end() {
                return self.error(line.number, "unexpected tokens after `object get`");
            }
            return StmtKind::ObjectGet { name, attribute };
        }
        self.error(line.number, "unknown `object` operation")
    }

    fn parse_debug(&mut self, line: &Line) -> StmtKind {
        let mut cursor = LineCursor::new(&line.tokens[1..]);
        let action = match cursor.bump() {
            Some(token) => match (&token.kind, token.lexeme.as_str()) {
                (TokenKind::Keyword(Keyword::Memory), _) => Some(DebugAction::Memory),
                (TokenKind::Identifier, "on") => Some(DebugAction::On),
                (TokenKind::Identifier, "off") => Some(DebugAction::Off),
                (TokenKind::Identifier, "step") => Some(DebugAction::Step),
                (TokenKind::Identifier, "continue") => Some(DebugAction::Continue),
                (TokenKind::Identifier, "variables") => Some(DebugAction::Variables),
                (TokenKind::Identifier, "callstack") => Some(DebugAction::CallStack),
                _ => None,
            },
            None => None,
        };
        match action {
            Some(action) if cursor.at_end() => StmtKind::DebugCmd(action),
            _ => self.error(line.number, "unknown `debug` command"),
        }
    }

    fn parse_breakpoint(&mut self, line: &Line) -> StmtKind {
        let mut cursor = LineCursor::new(&line.tokens[1..]);
        if cursor.eat_keyword(Keyword::Set) {
            return match cursor.line_number() {
                Some(n) if cursor.at_end() => StmtKind::BreakpointCmd(BreakpointAction::Set(n)),
                _ => self.error(line.number, "expected a line number after `breakpoint set`"),
            };
        }
        match cursor.bump() {
            Some(token) if token.kind == TokenKind::Identifier && token.lexeme == "clear" => {
                if cursor.eat_identifier("all") {
                    if cursor.at_end() {
                        return StmtKind::BreakpointCmd(BreakpointAction::ClearAll);
                    }
                    return self.error(line.number, "unexpected tokens after `breakpoint clear all`");
                }
                match cursor.line_number() {
                    Some(n) if cursor.at_end() => {
                        StmtKind::BreakpointCmd(BreakpointAction::Clear(n))
                    }
                    _ => {
                        self.error(line.number, "expected a line number after `breakpoint clear`")
                    }
                }
            }
            Some(token) if token.kind == TokenKind::Identifier && token.lexeme == "list" => {
                if cursor.at_end() {
                    StmtKind::BreakpointCmd(BreakpointAction::List)
                } else {
                    self.error(line.number, "unexpected tokens after `breakpoint list`")
                }
            }
            _ => self.error(line.number, "unknown `breakpoint` command"),
        }
    }

    fn parse_dotted_call(&mut self, line: &Line) -> StmtKind {
        let (target, method) = match dotted(&line.tokens[0].lexeme) {
            Some(parts) => parts,
            None => return StmtKind::Unknown,
        };
        let args = match paren_args(&line.tokens[1..]) {
            Some(pieces) => pieces.iter().map(|piece| self.expr_src(piece)).collect(),
            None => return self.error(line.number, "malformed argument list"),
        };
        if Registry::is_namespace(&target) {
            StmtKind::StdlibCall(StdlibCall {
                namespace: target,
                function: method,
                args,
            })
        } else {
            StmtKind::MethodCall {
                object: target,
                method,
                args,
            }
        }
    }

    fn operand(&mut self, tokens: &[Token]) -> Operand {
        if tokens.len() == 1 && tokens[0].kind == TokenKind::String {
            return Operand::StringLit(tokens[0].lexeme.clone());
        }
        if tokens.len() > 3
            && tokens[0].kind == TokenKind::Keyword(Keyword::Memory)
            && tokens[1].kind == TokenKind::Keyword(Keyword::Read)
            && tokens[2].kind == TokenKind::Identifier
        {
            return Operand::MemoryRead {
                name: tokens[2].lexeme.clone(),
                index: self.expr_src(&tokens[3..]),
            };
        }
        if tokens.len() == 4
            && tokens[0].kind == TokenKind::Keyword(Keyword::Object)
            && tokens[1].kind == TokenKind::Keyword(Keyword::Get)
            && tokens[2].kind == TokenKind::Identifier
            && tokens[3].kind == TokenKind::Identifier
        {
            return Operand::ObjectGet {
                name: tokens[2].lexeme.clone(),
                attribute: tokens[3].lexeme.clone(),
            };
        }
        if tokens[0].kind == TokenKind::Unknown && tokens[0].lexeme.contains('.') {
            if let Some((namespace, function)) = dotted(&tokens[0].lexeme) {
                if Registry::is_namespace(&namespace) {
                    if let Some(pieces) = paren_args(&tokens[1..]) {
                        let args = pieces.iter().map(|piece| self.expr_src(piece)).collect();
                        return Operand::StdlibCall(StdlibCall {
                            namespace,
                            function,
                            args,
                        });
                    }
                }
            }
        }
        Operand::Expr(self.expr_src(tokens))
    }

    fn expr_src(&self, tokens: &[Token]) -> ExprSrc {
        let raw = match (tokens.first(), tokens.last()) {
            (Some(first), Some(last)) => self.source[first.span.start..last.span.end].to_string(),
            _ => String::new(),
        };
        ExprSrc {
            tokens: tokens.to_vec(),
            raw,
        }
    }
}

struct LineCursor<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> LineCursor<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn rest(&mut self) -> &'a [Token] {
        let rest = &self.tokens[self.pos..];
        self.pos = self.tokens.len();
        rest
    }

    fn eat_keyword(&mut self, keyword: Keyword) -> bool {
        match self.peek() {
            Some(token) if token.kind == TokenKind::Keyword(keyword) => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn eat_delim(&mut self, delim: Delim) -> bool {
        match self.peek() {
            Some(token) if token.kind == TokenKind::Delimiter(delim) => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn eat_op(&mut self, op: Op) -> bool {
        match self.peek() {
            Some(token) if token.kind == TokenKind::Operator(op) => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn eat_identifier(&mut self, lexeme: &str) -> bool {
        match self.peek() {
            Some(token) if token.kind == TokenKind::Identifier && token.lexeme == lexeme => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn identifier(&mut self) -> Option<String> {
        match self.peek() {
            Some(token) if token.kind == TokenKind::Identifier => {
                self.pos += 1;
                Some(token.lexeme.clone())
            }
            _ => None,
        }
    }

    fn number(&mut self) -> Option<f64> {
        match self.peek() {
            Some(token) if token.kind == TokenKind::Number => {
                self.pos += 1;
                token.lexeme.parse().ok()
            }
            _ => None,
        }
    }

    fn signed_integer(&mut self) -> Option<i64> {
        let negative = self.eat_op(Op::Minus);
        let n = self.number()?.trunc() as i64;
        Some(if negative { -n } else { n })
    }

    fn line_number(&mut self) -> Option<usize> {
        let n = self.number()?;
        if n < 1.0 {
            return None;
        }
        Some(n.trunc() as usize)
    }
}

fn ends_with_colon(tokens: &[Token]) -> bool {
    matches!(
        tokens.last().map(|t| &t.kind),
        Some(TokenKind::Delimiter(Delim::Colon))
    )
}

fn dotted(lexeme: &str) -> Option<(String, String)> {
    let (head, tail) = lexeme.split_once('.')?;
    if head.is_empty() || tail.is_empty() || tail.contains('.') {
        return None;
    }
    Some((head.to_string(), tail.to_string()))
}

/// Splits at commas that sit outside any bracket pair.
fn split_commas(tokens: &[Token]) -> Vec<&[Token]> {
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (idx, token) in tokens.iter().enumerate() {
        match &token.kind {
            TokenKind::Delimiter(Delim::LParen | Delim::LBracket | Delim::LBrace) => depth += 1,
            TokenKind::Delimiter(Delim::RParen | Delim::RBracket | Delim::RBrace) => {
                depth = depth.saturating_sub(1)
            }
            TokenKind::Delimiter(Delim::Comma) if depth == 0 => {
                pieces.push(&tokens[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    pieces.push(&tokens[start..]);
    pieces
}

fn paren_args(tokens: &[Token]) -> Option<Vec<&[Token]>> {
    let (first, rest) = tokens.split_first()?;
    if first.kind != TokenKind::Delimiter(Delim::LParen) {
        return None;
    }
    let (last, inner) = rest.split_last()?;
    if last.kind != TokenKind::Delimiter(Delim::RParen) {
        return None;
    }
    let mut depth = 0i32;
    for token in inner {
        match &token.kind {
            TokenKind::Delimiter(Delim::LParen) => depth += 1,
            TokenKind::Delimiter(Delim::RParen) => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
            }
            _ => {}
        }
    }
    if depth != 0 {
        return None;
    }
    if inner.is_empty() {
        return Some(Vec::new());
    }
    let pieces = split_commas(inner);
    if pieces.iter().any(|piece| piece.is_empty()) {
        return None;
    }
    Some(pieces)
}

fn task_delay(lexeme: &str) -> Option<f64> {
    let trimmed = lexeme.strip_suffix('s').unwrap_or(lexeme);
    trimmed.parse::<f64>().ok().filter(|delay| *delay >= 0.0)
}
