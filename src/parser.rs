use indexmap::IndexMap;

use crate::{
    ast::{BinaryOp, Expr, ExprKind, Literal, LogicalOp, Program, Stmt, StmtKind, UnaryOp},
    diagnostics::{Diagnostic, DiagnosticKind, SourceSpan},
    lexer::{Keyword, Lexer, Token, TokenKind},
};

pub fn parse_program(source: &str) -> Result<Program, Diagnostic> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(tokens).parse_program()
}

struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, current: 0 }
    }

    fn parse_program(&mut self) -> Result<Program, Diagnostic> {
        let mut statements = Vec::new();
        while !self.check(TokenKind::Eof) {
            statements.push(self.parse_statement()?);
        }
        Ok(Program { statements })
    }

    fn parse_statement(&mut self) -> Result<Stmt, Diagnostic> {
        if let Some(token) = self.peek() {
            match &token.kind {
                TokenKind::Keyword(Keyword::Var) => return self.parse_var_decl(),
                TokenKind::Keyword(Keyword::If) => return self.parse_if(),
                TokenKind::Keyword(Keyword::While) => return self.parse_while(),
                TokenKind::Keyword(Keyword::For) => return self.parse_for(),
                TokenKind::Keyword(Keyword::Return) => return self.parse_return(),
                TokenKind::Keyword(Keyword::Emit) => return self.parse_emit(),
                TokenKind::LBrace => {
                    let (items, span) = self.parse_block()?;
                    return Ok(Stmt {
                        kind: StmtKind::Block(items),
                        span,
                    });
                }
                TokenKind::Identifier | TokenKind::String => {
                    // `event -> handler(...)` needs two tokens of lookahead.
                    if self.peek_next_kind() == Some(TokenKind::Arrow) {
                        return self.parse_binding();
                    }
                }
                _ => {}
            }
        }
        self.parse_expression_statement()
    }

    fn parse_block(&mut self) -> Result<(Vec<Stmt>, SourceSpan), Diagnostic> {
        let lbrace = self.consume(TokenKind::LBrace, "expected `{` to start block")?;
        let start = lbrace.span.start;
        let mut items = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            items.push(self.parse_statement()?);
        }
        let rbrace = self.consume(TokenKind::RBrace, "expected `}` to close block")?;
        Ok((
            items,
            SourceSpan {
                start,
                end: rbrace.span.end,
            },
        ))
    }

    fn parse_var_decl(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::Var)?.span.start;
        let name_token = self.consume_identifier("expected variable name")?;
        let initializer = if self.matches(TokenKind::Assign) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.consume_optional_semicolon();
        let end = initializer
            .as_ref()
            .map(|expr| expr.span.end)
            .unwrap_or(name_token.span.end);
        Ok(Stmt {
            kind: StmtKind::VarDecl {
                name: name_token.lexeme.clone(),
                initializer,
            },
            span: SourceSpan { start, end },
        })
    }

    fn parse_if(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::If)?.span.start;
        let condition = self.parse_expression()?;
        let (then_branch, then_span) = self.parse_block()?;
        let mut end = then_span.end;
        let else_branch = if self.matches_keyword(Keyword::Else) {
            if self.check(TokenKind::Keyword(Keyword::If)) {
                let else_stmt = self.parse_if()?;
                end = else_stmt.span.end;
                Some(vec![else_stmt])
            } else {
                let (branch, span) = self.parse_block()?;
                end = span.end;
                Some(branch)
            }
        } else {
            None
        };
        Ok(Stmt {
            span: SourceSpan { start, end },
            kind: StmtKind::If {
                condition,
                then_branch,
                else_branch,
            },
        })
    }

    fn parse_while(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::While)?.span.start;
        let condition = self.parse_expression()?;
        let (body, span) = self.parse_block()?;
        Ok(Stmt {
            span: SourceSpan {
                start,
                end: span.end,
            },
            kind: StmtKind::While { condition, body },
        })
    }

    fn parse_for(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::For)?.span.start;
        let binding = self.consume_identifier("expected loop binding")?;
        self.consume_keyword(Keyword::In)?;
        let iterable = self.parse_expression()?;
        let (body, span) = self.parse_block()?;
        Ok(Stmt {
            span: SourceSpan {
                start,
                end: span.end,
            },
            kind: StmtKind::For {
                binding: binding.lexeme.clone(),
                iterable,
                body,
            },
        })
    }

    fn parse_return(&mut self) -> Result<Stmt, Diagnostic> {
        let token = self.consume_keyword(Keyword::Return)?;
        let expr = if self.starts_expression() {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.consume_optional_semicolon();
        let end = expr.as_ref().map(|e| e.span.end).unwrap_or(token.span.end);
        Ok(Stmt {
            span: SourceSpan {
                start: token.span.start,
                end,
            },
            kind: StmtKind::Return(expr),
        })
    }

    fn parse_emit(&mut self) -> Result<Stmt, Diagnostic> {
        let token = self.consume_keyword(Keyword::Emit)?;
        let event = self.consume_event_name("expected event name after `emit`")?;
        let payload = if self.starts_expression() {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.consume_optional_semicolon();
        let end = payload
            .as_ref()
            .map(|e| e.span.end)
            .unwrap_or(event.span.end);
        Ok(Stmt {
            span: SourceSpan {
                start: token.span.start,
                end,
            },
            kind: StmtKind::Emit {
                event: event.lexeme.clone(),
                payload,
            },
        })
    }

    fn parse_binding(&mut self) -> Result<Stmt, Diagnostic> {
        let event = self.consume_event_name("expected event name")?;
        self.consume(TokenKind::Arrow, "expected `->` in binding")?;
        let name_token = self.consume_identifier("expected handler name or `_` after `->`")?;
        let name = if name_token.lexeme == "_" {
            None
        } else {
            Some(name_token.lexeme.clone())
        };
        self.consume(TokenKind::LParen, "expected `(` after handler name")?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                let param = self.consume_identifier("expected parameter name")?;
                params.push(param.lexeme.clone());
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RParen, "expected `)` after parameters")?;
        let (body, body_span) = self.parse_block()?;
        Ok(Stmt {
            span: SourceSpan {
                start: event.span.start,
                end: body_span.end,
            },
            kind: StmtKind::Binding {
                event: event.lexeme.clone(),
                name,
                params,
                body,
            },
        })
    }

    fn parse_expression_statement(&mut self) -> Result<Stmt, Diagnostic> {
        let expr = self.parse_expression()?;
        self.consume_optional_semicolon();
        Ok(Stmt {
            span: expr.span,
            kind: StmtKind::Expr(expr),
        })
    }

    fn parse_expression(&mut self) -> Result<Expr, Diagnostic> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expr, Diagnostic> {
        let expr = self.parse_or()?;
        if self.matches(TokenKind::Assign) {
            let equals = self.previous().span;
            let value = self.parse_assignment()?;
            return match expr.kind {
                ExprKind::Variable(name) => Ok(Expr {
                    span: SourceSpan {
                        start: expr.span.start,
                        end: value.span.end,
                    },
                    kind: ExprKind::Assign {
                        name,
                        value: Box::new(value),
                    },
                }),
                _ => Err(
                    Diagnostic::new(DiagnosticKind::Parser, "invalid assignment target")
                        .with_span(equals),
                ),
            };
        }
        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_and()?;
        while self.matches_keyword(Keyword::Or) {
            let right = self.parse_and()?;
            expr = logical(expr, LogicalOp::Or, right);
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_equality()?;
        while self.matches_keyword(Keyword::And) {
            let right = self.parse_equality()?;
            expr = logical(expr, LogicalOp::And, right);
        }
        Ok(expr)
    }

    fn parse_equality(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_comparison()?;
        loop {
            let op = if self.matches(TokenKind::EqualEqual) {
                BinaryOp::Equal
            } else if self.matches(TokenKind::BangEqual) {
                BinaryOp::NotEqual
            } else {
                break;
            };
            let right = self.parse_comparison()?;
            expr = binary(expr, op, right);
        }
        Ok(expr)
    }

    fn parse_comparison(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_range()?;
        loop {
            let op = if self.matches(TokenKind::LessEqual) {
                BinaryOp::LessEqual
            } else if self.matches(TokenKind::GreaterEqual) {
                BinaryOp::GreaterEqual
            } else if self.matches(TokenKind::Less) {
                BinaryOp::Less
            } else if self.matches(TokenKind::Greater) {
                BinaryOp::Greater
            } else {
                break;
            };
            let right = self.parse_range()?;
            expr = binary(expr, op, right);
        }
        Ok(expr)
    }

    fn parse_range(&mut self) -> Result<Expr, Diagnostic> {
        let expr = self.parse_term()?;
        if self.matches(TokenKind::DotDot) {
            let upper = self.parse_term()?;
            return Ok(Expr {
                span: SourceSpan {
                    start: expr.span.start,
                    end: upper.span.end,
                },
                kind: ExprKind::Range {
                    lower: Box::new(expr),
                    upper: Box::new(upper),
                },
            });
        }
        Ok(expr)
    }

    fn parse_term(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_factor()?;
        loop {
            let op = if self.matches(TokenKind::Plus) {
                BinaryOp::Add
            } else if self.matches(TokenKind::Minus) {
                BinaryOp::Sub
            } else {
                break;
            };
            let right = self.parse_factor()?;
            expr = binary(expr, op, right);
        }
        Ok(expr)
    }

    fn parse_factor(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_unary()?;
        loop {
            let op = if self.matches(TokenKind::Star) {
                BinaryOp::Mul
            } else if self.matches(TokenKind::Slash) {
                BinaryOp::Div
            } else {
                break;
            };
            let right = self.parse_unary()?;
            expr = binary(expr, op, right);
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expr, Diagnostic> {
        let op = if self.matches(TokenKind::Minus) {
            Some(UnaryOp::Negate)
        } else if self.matches(TokenKind::Bang) {
            Some(UnaryOp::Not)
        } else {
            None
        };
        if let Some(op) = op {
            let operator = self.previous().span;
            let right = self.parse_unary()?;
            return Ok(Expr {
                span: SourceSpan {
                    start: operator.start,
                    end: right.span.end,
                },
                kind: ExprKind::Unary {
                    op,
                    expr: Box::new(right),
                },
            });
        }
        self.parse_call()
    }

    fn parse_call(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_primary()?;
        while self.matches(TokenKind::LParen) {
            let mut args = Vec::new();
            if !self.check(TokenKind::RParen) {
                loop {
                    args.push(self.parse_expression()?);
                    if !self.matches(TokenKind::Comma) {
                        break;
                    }
                }
            }
            let paren = self.consume(TokenKind::RParen, "expected `)` after arguments")?;
            expr = Expr {
                span: SourceSpan {
                    start: expr.span.start,
                    end: paren.span.end,
                },
                kind: ExprKind::Call {
                    callee: Box::new(expr),
                    args,
                },
            };
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, Diagnostic> {
        if let Some(token) = self.peek() {
            match &token.kind {
                TokenKind::Keyword(Keyword::True) => {
                    let tok = self.advance();
                    Ok(literal(tok.span, Literal::Bool(true)))
                }
                TokenKind::Keyword(Keyword::False) => {
                    let tok = self.advance();
                    Ok(literal(tok.span, Literal::Bool(false)))
                }
                TokenKind::Keyword(Keyword::Null) => {
                    let tok = self.advance();
                    Ok(literal(tok.span, Literal::Null))
                }
                TokenKind::Number => {
                    let tok = self.advance();
                    let number = tok.lexeme.parse().unwrap_or(0.0);
                    Ok(literal(tok.span, Literal::Number(number)))
                }
                TokenKind::String => {
                    let tok = self.advance();
                    Ok(literal(tok.span, Literal::String(tok.lexeme.clone())))
                }
                TokenKind::Identifier => {
                    let tok = self.advance();
                    Ok(Expr {
                        span: tok.span,
                        kind: ExprKind::Variable(tok.lexeme.clone()),
                    })
                }
                TokenKind::LParen => {
                    let lparen = self.advance();
                    let inner = self.parse_expression()?;
                    let rparen = self.consume(TokenKind::RParen, "expected `)` after expression")?;
                    Ok(Expr {
                        span: SourceSpan {
                            start: lparen.span.start,
                            end: rparen.span.end,
                        },
                        kind: ExprKind::Grouping(Box::new(inner)),
                    })
                }
                TokenKind::LBracket => {
                    let lbracket = self.advance();
                    let mut elements = Vec::new();
                    if !self.check(TokenKind::RBracket) {
                        loop {
                            elements.push(self.parse_expression()?);
                            if !self.matches(TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    let rbracket =
                        self.consume(TokenKind::RBracket, "expected `]` after array literal")?;
                    Ok(Expr {
                        span: SourceSpan {
                            start: lbracket.span.start,
                            end: rbracket.span.end,
                        },
                        kind: ExprKind::ArrayLiteral(elements),
                    })
                }
                TokenKind::LBrace => self.parse_dict_literal(),
                _ => Err(self.error(token, "unexpected token in expression")),
            }
        } else {
            Err(self.error_eof("unexpected end of expression"))
        }
    }

    fn parse_dict_literal(&mut self) -> Result<Expr, Diagnostic> {
        let lbrace = self.advance();
        let mut entries = IndexMap::new();
        if !self.check(TokenKind::RBrace) {
            loop {
                let key = self.consume(TokenKind::String, "expected string key in dict literal")?;
                self.consume(TokenKind::Colon, "expected `:` in dict literal")?;
                let value = self.parse_expression()?;
                entries.insert(key.lexeme.clone(), value);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        let rbrace = self.consume(TokenKind::RBrace, "expected `}` after dict literal")?;
        Ok(Expr {
            span: SourceSpan {
                start: lbrace.span.start,
                end: rbrace.span.end,
            },
            kind: ExprKind::DictLiteral(entries),
        })
    }

    /// Whether the upcoming token can begin an expression; gates the
    /// optional operands of `return` and `emit`.
    fn starts_expression(&self) -> bool {
        matches!(
            self.peek().map(|t| &t.kind),
            Some(
                TokenKind::Number
                    | TokenKind::String
                    | TokenKind::Identifier
                    | TokenKind::Keyword(Keyword::True)
                    | TokenKind::Keyword(Keyword::False)
                    | TokenKind::Keyword(Keyword::Null)
                    | TokenKind::LParen
                    | TokenKind::LBracket
                    | TokenKind::LBrace
                    | TokenKind::Minus
                    | TokenKind::Bang
            )
        )
    }

    fn consume_event_name(&mut self, message: &str) -> Result<Token, Diagnostic> {
        if self.check(TokenKind::Identifier) || self.check(TokenKind::String) {
            Ok(self.advance())
        } else {
            Err(self
                .peek()
                .map(|tok| self.error(tok, message))
                .unwrap_or_else(|| self.error_eof(message)))
        }
    }

    fn consume_optional_semicolon(&mut self) {
        let _ = self.matches(TokenKind::Semicolon);
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn matches_keyword(&mut self, keyword: Keyword) -> bool {
        if let Some(Token {
            kind: TokenKind::Keyword(k),
            ..
        }) = self.peek()
        {
            if *k == keyword {
                self.advance();
                return true;
            }
        }
        false
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<Token, Diagnostic> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self
                .peek()
                .map(|tok| self.error(tok, message))
                .unwrap_or_else(|| self.error_eof(message)))
        }
    }

    fn consume_keyword(&mut self, keyword: Keyword) -> Result<Token, Diagnostic> {
        if let Some(token) = self.peek() {
            if token.kind == TokenKind::Keyword(keyword) {
                Ok(self.advance())
            } else {
                Err(self.error(token, &format!("expected keyword `{keyword:?}`")))
            }
        } else {
            Err(self.error_eof("unexpected end of input"))
        }
    }

    fn consume_identifier(&mut self, message: &str) -> Result<Token, Diagnostic> {
        if self.check(TokenKind::Identifier) {
            Ok(self.advance())
        } else {
            Err(self
                .peek()
                .map(|tok| self.error(tok, message))
                .unwrap_or_else(|| self.error_eof(message)))
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().map(|token| token.kind == kind).unwrap_or(false)
    }

    fn peek_next_kind(&self) -> Option<TokenKind> {
        self.tokens.get(self.current + 1).map(|t| t.kind.clone())
    }

    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous().clone()
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.current)
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Eof) | None)
    }

    fn error(&self, token: &Token, message: &str) -> Diagnostic {
        Diagnostic::new(DiagnosticKind::Parser, message.to_string()).with_span(token.span)
    }

    fn error_eof(&self, message: &str) -> Diagnostic {
        Diagnostic::new(DiagnosticKind::Parser, message.to_string())
    }
}

fn literal(span: SourceSpan, value: Literal) -> Expr {
    Expr {
        span,
        kind: ExprKind::Literal(value),
    }
}

fn binary(left: Expr, op: BinaryOp, right: Expr) -> Expr {
    Expr {
        span: SourceSpan {
            start: left.span.start,
            end: right.span.end,
        },
        kind: ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
    }
}

fn logical(left: Expr, op: LogicalOp, right: Expr) -> Expr {
    Expr {
        span: SourceSpan {
            start: left.span.start,
            end: right.span.end,
        },
        kind: ExprKind::Logical {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
    }
}
