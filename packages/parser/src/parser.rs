use crate::ast::*;
use crate::error::{ParseError, ParseResult};
use crate::tokenizer::{tokenize, Token};

/// Parser for computed-value expressions
pub struct Parser<'src> {
    tokens: Vec<(Token<'src>, std::ops::Range<usize>)>,
    pos: usize,
    source_len: usize,
    /// Byte offset added to every span (non-zero for template sub-expressions)
    offset: usize,
    /// Current nesting of the tree being built
    depth: usize,
}

/// Deepest expression tree the parser accepts
pub const MAX_NESTING: usize = 128;

impl<'src> Parser<'src> {
    pub fn new(source: &'src str) -> ParseResult<Self> {
        Self::with_offset(source, 0)
    }

    fn with_offset(source: &'src str, offset: usize) -> ParseResult<Self> {
        let tokens = tokenize(source).map_err(|err| shift_error(err, offset))?;
        Ok(Self {
            tokens,
            pos: 0,
            source_len: source.len(),
            offset,
            depth: 0,
        })
    }

    /// Parse a complete expression, requiring every token to be consumed
    pub fn parse_complete(&mut self) -> ParseResult<Expression> {
        let expr = self.parse_expression()?;

        if !self.is_at_end() {
            return Err(ParseError::unexpected_token_span(
                self.peek_span(),
                "end of expression",
                Self::format_token(self.peek()),
            ));
        }

        Ok(expr)
    }

    /// Parse an expression (lowest precedence: arrow functions)
    pub fn parse_expression(&mut self) -> ParseResult<Expression> {
        self.descend()?;
        let expr = match self.try_parse_arrow()? {
            Some(arrow) => arrow,
            None => self.parse_conditional_expression()?,
        };
        self.depth -= 1;
        Ok(expr)
    }

    fn descend(&mut self) -> ParseResult<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(ParseError::invalid_syntax_span(
                self.peek_span(),
                format!("Expression nests deeper than {} levels", MAX_NESTING),
            ));
        }
        Ok(())
    }

    /// Parse `x => body` or `(a, b) => body` when the lookahead says so
    fn try_parse_arrow(&mut self) -> ParseResult<Option<Expression>> {
        let start = self.peek_span().start;

        let params = match self.peek() {
            Some((Token::Ident(name), _))
                if matches!(self.peek_ahead(1), Some((Token::Arrow, _))) =>
            {
                let param = name.to_string();
                self.advance();
                vec![param]
            }
            Some((Token::LParen, _)) if self.is_parenthesized_arrow() => {
                self.advance();
                let mut params = Vec::new();
                while !self.check(Token::RParen) {
                    params.push(self.expect_ident()?);
                    if !self.match_token(Token::Comma) {
                        break;
                    }
                }
                self.expect(Token::RParen)?;
                params
            }
            _ => return Ok(None),
        };

        self.expect(Token::Arrow)?;

        if self.check(Token::LBrace) && self.is_block_body() {
            return Err(ParseError::invalid_syntax_span(
                self.peek_span(),
                "Arrow functions take an expression body; block bodies are not supported",
            ));
        }

        let body = self.parse_expression()?;
        let end = self.last_end();

        Ok(Some(Expression::Arrow {
            params,
            body: Box::new(body),
            span: Span::new(start, end),
        }))
    }

    /// Lookahead for `( ident, ... ) =>`
    fn is_parenthesized_arrow(&self) -> bool {
        let mut offset = 1;
        let mut expect_ident = true;
        loop {
            match self.peek_ahead(offset) {
                Some((Token::RParen, _)) => {
                    return matches!(self.peek_ahead(offset + 1), Some((Token::Arrow, _)));
                }
                Some((Token::Ident(_), _)) if expect_ident => expect_ident = false,
                Some((Token::Comma, _)) if !expect_ident => expect_ident = true,
                _ => return false,
            }
            offset += 1;
        }
    }

    /// `{` followed by something that cannot start an object literal entry
    fn is_block_body(&self) -> bool {
        match self.peek_ahead(1) {
            Some((Token::RBrace, _)) => false,
            Some((Token::Ident(_), _)) | Some((Token::String(_), _)) | Some((Token::Number(_), _)) => {
                !matches!(
                    self.peek_ahead(2),
                    Some((Token::Colon, _)) | Some((Token::Comma, _)) | Some((Token::RBrace, _))
                )
            }
            _ => true,
        }
    }

    /// Parse conditional expression (`test ? a : b`)
    fn parse_conditional_expression(&mut self) -> ParseResult<Expression> {
        let start = self.peek_span().start;
        let test = self.parse_coalesce_expression()?;

        if !self.match_token(Token::Question) {
            return Ok(test);
        }

        let consequent = self.parse_expression()?;
        self.expect(Token::Colon)?;
        let alternate = self.parse_expression()?;
        let end = self.last_end();

        Ok(Expression::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
            span: Span::new(start, end),
        })
    }

    /// Parse nullish coalescing (`??`)
    fn parse_coalesce_expression(&mut self) -> ParseResult<Expression> {
        self.parse_binary_chain(Self::parse_or_expression, |p| {
            p.match_token(Token::QuestionQuestion).then_some(BinaryOp::Coalesce)
        })
    }

    /// Parse OR expression
    fn parse_or_expression(&mut self) -> ParseResult<Expression> {
        self.parse_binary_chain(Self::parse_and_expression, |p| {
            p.match_token(Token::Or).then_some(BinaryOp::Or)
        })
    }

    /// Parse AND expression
    fn parse_and_expression(&mut self) -> ParseResult<Expression> {
        self.parse_binary_chain(Self::parse_equality_expression, |p| {
            p.match_token(Token::And).then_some(BinaryOp::And)
        })
    }

    /// Parse equality expression (== != === !==)
    fn parse_equality_expression(&mut self) -> ParseResult<Expression> {
        self.parse_binary_chain(Self::parse_comparison_expression, Self::match_equality_op)
    }

    /// Parse comparison expression (< > <= >=)
    fn parse_comparison_expression(&mut self) -> ParseResult<Expression> {
        self.parse_binary_chain(Self::parse_additive_expression, Self::match_comparison_op)
    }

    /// Parse additive expression (+ -)
    fn parse_additive_expression(&mut self) -> ParseResult<Expression> {
        self.parse_binary_chain(Self::parse_multiplicative_expression, Self::match_additive_op)
    }

    /// Parse multiplicative expression (* / %)
    fn parse_multiplicative_expression(&mut self) -> ParseResult<Expression> {
        self.parse_binary_chain(Self::parse_unary_expression, Self::match_multiplicative_op)
    }

    /// Left-associative chain of `operand (operator operand)*`; every link
    /// deepens the tree by one
    fn parse_binary_chain(
        &mut self,
        operand: fn(&mut Self) -> ParseResult<Expression>,
        operator: fn(&mut Self) -> Option<BinaryOp>,
    ) -> ParseResult<Expression> {
        let start = self.peek_span().start;
        let outer = self.depth;
        let mut left = operand(self)?;

        while let Some(op) = operator(self) {
            self.descend()?;
            let right = operand(self)?;
            left = self.binary(left, op, right, start);
        }

        self.depth = outer;
        Ok(left)
    }

    /// Parse unary expression (! - +)
    fn parse_unary_expression(&mut self) -> ParseResult<Expression> {
        let start = self.peek_span().start;

        let operator = if self.match_token(Token::Bang) {
            UnaryOp::Not
        } else if self.match_token(Token::Minus) {
            UnaryOp::Negate
        } else if self.match_token(Token::Plus) {
            UnaryOp::Plus
        } else {
            return self.parse_postfix_expression();
        };

        self.descend()?;
        let operand = self.parse_unary_expression()?;
        self.depth -= 1;
        Ok(Expression::Unary {
            operator,
            operand: Box::new(operand),
            span: Span::new(start, self.last_end()),
        })
    }

    /// Parse postfix operations: member access, indexing and calls
    /// Handles: obj.prop, obj?.prop, obj[key], obj.method(args), fn(args)
    fn parse_postfix_expression(&mut self) -> ParseResult<Expression> {
        let start = self.peek_span().start;
        let outer = self.depth;
        let mut expr = self.parse_primary_expression()?;

        loop {
            if self.check(Token::Dot)
                || self.check(Token::QuestionDot)
                || self.check(Token::LBracket)
                || self.check(Token::LParen)
            {
                self.descend()?;
            }
            if self.match_token(Token::Dot) {
                let property = self.expect_property_name()?;
                expr = Expression::Member {
                    object: Box::new(expr),
                    property,
                    optional: false,
                    span: Span::new(start, self.last_end()),
                };
            } else if self.match_token(Token::QuestionDot) {
                if self.match_token(Token::LBracket) {
                    let index = self.parse_expression()?;
                    self.expect(Token::RBracket)?;
                    expr = Expression::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                        optional: true,
                        span: Span::new(start, self.last_end()),
                    };
                } else if self.match_token(Token::LParen) {
                    let arguments = self.parse_arguments()?;
                    expr = Expression::Call {
                        callee: Box::new(expr),
                        arguments,
                        optional: true,
                        span: Span::new(start, self.last_end()),
                    };
                } else {
                    let property = self.expect_property_name()?;
                    expr = Expression::Member {
                        object: Box::new(expr),
                        property,
                        optional: true,
                        span: Span::new(start, self.last_end()),
                    };
                }
            } else if self.match_token(Token::LBracket) {
                let index = self.parse_expression()?;
                self.expect(Token::RBracket)?;
                expr = Expression::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                    optional: false,
                    span: Span::new(start, self.last_end()),
                };
            } else if self.match_token(Token::LParen) {
                let arguments = self.parse_arguments()?;
                expr = Expression::Call {
                    callee: Box::new(expr),
                    arguments,
                    optional: false,
                    span: Span::new(start, self.last_end()),
                };
            } else {
                break;
            }
        }

        self.depth = outer;
        Ok(expr)
    }

    /// Parse call arguments after the opening parenthesis
    fn parse_arguments(&mut self) -> ParseResult<Vec<Expression>> {
        let mut arguments = Vec::new();
        while !self.check(Token::RParen) && !self.is_at_end() {
            arguments.push(self.parse_expression()?);

            if !self.match_token(Token::Comma) {
                break;
            }
        }
        self.expect(Token::RParen)?;
        Ok(arguments)
    }

    /// Parse primary expression (literals, identifiers, groups, arrays, objects)
    fn parse_primary_expression(&mut self) -> ParseResult<Expression> {
        let span = self.peek_span();
        let start = span.start;

        match self.peek() {
            Some((Token::String(s), _)) => {
                let value = unescape(&s[1..s.len() - 1]);
                self.advance();
                Ok(Expression::String {
                    value,
                    span: Span::new(start, span.end),
                })
            }
            Some((Token::Template(s), _)) => {
                let content = s[1..s.len() - 1].to_string();
                self.advance();
                self.parse_template_string(&content, start + 1, Span::new(start, span.end))
            }
            Some((Token::Number(n), _)) => {
                let value = n.parse::<f64>().map_err(|_| {
                    ParseError::invalid_syntax_span(span.clone(), format!("Invalid number {}", n))
                })?;
                self.advance();
                Ok(Expression::Number {
                    value,
                    span: Span::new(start, span.end),
                })
            }
            Some((Token::True, _)) | Some((Token::False, _)) => {
                let value = self.check(Token::True);
                self.advance();
                Ok(Expression::Boolean {
                    value,
                    span: Span::new(start, span.end),
                })
            }
            Some((Token::Null, _)) | Some((Token::Undefined, _)) => {
                self.advance();
                Ok(Expression::Null {
                    span: Span::new(start, span.end),
                })
            }
            Some((Token::Ident(i), _)) => {
                let name = i.to_string();
                self.advance();
                Ok(Expression::Identifier {
                    name,
                    span: Span::new(start, span.end),
                })
            }
            Some((Token::LParen, _)) => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Some((Token::LBracket, _)) => {
                self.advance();
                let mut elements = Vec::new();
                while !self.check(Token::RBracket) && !self.is_at_end() {
                    elements.push(self.parse_expression()?);
                    if !self.match_token(Token::Comma) {
                        break;
                    }
                }
                self.expect(Token::RBracket)?;
                Ok(Expression::Array {
                    elements,
                    span: Span::new(start, self.last_end()),
                })
            }
            Some((Token::LBrace, _)) => {
                self.advance();
                self.parse_object_literal(start)
            }
            None => Err(ParseError::unexpected_eof(
                self.offset + self.source_len,
                "expression",
            )),
            _ => Err(ParseError::unexpected_token_span(
                span,
                "expression",
                Self::format_token(self.peek()),
            )),
        }
    }

    /// Parse object literal entries after the opening brace
    fn parse_object_literal(&mut self, start: usize) -> ParseResult<Expression> {
        let mut properties = Vec::new();

        while !self.check(Token::RBrace) && !self.is_at_end() {
            let key_span = self.peek_span();
            let key = match self.peek() {
                Some((Token::Ident(s), _)) => s.to_string(),
                Some((Token::String(s), _)) => unescape(&s[1..s.len() - 1]),
                Some((Token::Number(n), _)) => n.to_string(),
                _ => {
                    return Err(ParseError::unexpected_token_span(
                        key_span,
                        "property name",
                        Self::format_token(self.peek()),
                    ))
                }
            };
            let shorthand = matches!(self.peek(), Some((Token::Ident(_), _)));
            self.advance();

            let value = if self.match_token(Token::Colon) {
                self.parse_expression()?
            } else if shorthand {
                // `{ name }` is `{ name: name }`
                Expression::Identifier {
                    name: key.clone(),
                    span: Span::new(key_span.start, key_span.end),
                }
            } else {
                return Err(ParseError::unexpected_token_span(
                    self.peek_span(),
                    "':'",
                    Self::format_token(self.peek()),
                ));
            };

            properties.push((key, value));

            if !self.match_token(Token::Comma) {
                break;
            }
        }

        self.expect(Token::RBrace)?;
        Ok(Expression::Object {
            properties,
            span: Span::new(start, self.last_end()),
        })
    }

    /// Parse template string with ${...} interpolation
    fn parse_template_string(
        &mut self,
        content: &str,
        content_start: usize,
        span: Span,
    ) -> ParseResult<Expression> {
        let mut parts = Vec::new();
        let mut current = String::new();
        let mut chars = content.char_indices().peekable();

        while let Some((idx, ch)) = chars.next() {
            if ch == '$' && matches!(chars.peek(), Some((_, '{'))) {
                chars.next(); // consume '{'

                // Save literal part before interpolation
                if !current.is_empty() {
                    parts.push(TemplatePart::Literal(std::mem::take(&mut current)));
                }

                // Extract expression content
                let expr_start = idx + 2;
                let mut expr_end = None;
                let mut depth = 1;
                for (i, c) in chars.by_ref() {
                    match c {
                        '{' => depth += 1,
                        '}' => {
                            depth -= 1;
                            if depth == 0 {
                                expr_end = Some(i);
                                break;
                            }
                        }
                        _ => {}
                    }
                }

                let expr_end = expr_end.ok_or_else(|| {
                    ParseError::invalid_syntax_span(
                        span.start..span.end,
                        "Unterminated ${ in template string",
                    )
                })?;

                let mut sub_parser =
                    Parser::with_offset(&content[expr_start..expr_end], content_start + expr_start)?;
                sub_parser.depth = self.depth;
                let expr = sub_parser.parse_complete()?;
                parts.push(TemplatePart::Expression(expr));
            } else if ch == '\\' {
                if let Some((_, next)) = chars.next() {
                    push_escape(&mut current, next);
                }
            } else {
                current.push(ch);
            }
        }

        // Save remaining literal part
        if !current.is_empty() {
            parts.push(TemplatePart::Literal(current));
        }

        Ok(Expression::Template { parts, span })
    }

    // Helper methods for matching operators

    fn binary(&self, left: Expression, operator: BinaryOp, right: Expression, start: usize) -> Expression {
        Expression::Binary {
            left: Box::new(left),
            operator,
            right: Box::new(right),
            span: Span::new(start, self.last_end()),
        }
    }

    fn match_equality_op(&mut self) -> Option<BinaryOp> {
        if self.match_token(Token::EqualsEquals) {
            Some(BinaryOp::Equals)
        } else if self.match_token(Token::NotEquals) {
            Some(BinaryOp::NotEquals)
        } else {
            None
        }
    }

    fn match_comparison_op(&mut self) -> Option<BinaryOp> {
        if self.match_token(Token::LessThanEquals) {
            Some(BinaryOp::LessThanOrEqual)
        } else if self.match_token(Token::GreaterThanEquals) {
            Some(BinaryOp::GreaterThanOrEqual)
        } else if self.match_token(Token::LAngle) {
            Some(BinaryOp::LessThan)
        } else if self.match_token(Token::RAngle) {
            Some(BinaryOp::GreaterThan)
        } else {
            None
        }
    }

    fn match_additive_op(&mut self) -> Option<BinaryOp> {
        if self.match_token(Token::Plus) {
            Some(BinaryOp::Add)
        } else if self.match_token(Token::Minus) {
            Some(BinaryOp::Subtract)
        } else {
            None
        }
    }

    fn match_multiplicative_op(&mut self) -> Option<BinaryOp> {
        if self.match_token(Token::Star) {
            Some(BinaryOp::Multiply)
        } else if self.match_token(Token::Slash) {
            Some(BinaryOp::Divide)
        } else if self.match_token(Token::Percent) {
            Some(BinaryOp::Remainder)
        } else {
            None
        }
    }

    // Helper methods

    fn peek(&self) -> Option<&(Token<'src>, std::ops::Range<usize>)> {
        self.tokens.get(self.pos)
    }

    fn peek_ahead(&self, offset: usize) -> Option<&(Token<'src>, std::ops::Range<usize>)> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<&(Token<'src>, std::ops::Range<usize>)> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn check(&self, token: Token) -> bool {
        if let Some((t, _)) = self.peek() {
            std::mem::discriminant(t) == std::mem::discriminant(&token)
        } else {
            false
        }
    }

    fn match_token(&mut self, token: Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> ParseResult<()> {
        if self.check(token.clone()) {
            self.advance();
            Ok(())
        } else if self.is_at_end() {
            Err(ParseError::unexpected_eof(
                self.offset + self.source_len,
                token.to_string(),
            ))
        } else {
            Err(ParseError::unexpected_token_span(
                self.peek_span(),
                token.to_string(),
                Self::format_token(self.peek()),
            ))
        }
    }

    fn expect_ident(&mut self) -> ParseResult<String> {
        match self.peek() {
            Some((Token::Ident(s), _)) => {
                let val = s.to_string();
                self.advance();
                Ok(val)
            }
            None => Err(ParseError::unexpected_eof(
                self.offset + self.source_len,
                "identifier",
            )),
            _ => Err(ParseError::unexpected_token_span(
                self.peek_span(),
                "identifier",
                Self::format_token(self.peek()),
            )),
        }
    }

    /// Accept an identifier or a keyword after `.` (e.g. `settings.null`)
    fn expect_property_name(&mut self) -> ParseResult<String> {
        let name = match self.peek() {
            Some((Token::True, _)) => "true".to_string(),
            Some((Token::False, _)) => "false".to_string(),
            Some((Token::Null, _)) => "null".to_string(),
            Some((Token::Undefined, _)) => "undefined".to_string(),
            _ => {
                return self.expect_ident().map_err(|err| match err {
                    ParseError::UnexpectedEof { pos, .. } => {
                        ParseError::unexpected_eof(pos, "property name")
                    }
                    ParseError::UnexpectedToken {
                        start, end, found, ..
                    } => ParseError::unexpected_token_span(start..end, "property name", found),
                    other => other,
                })
            }
        };
        self.advance();
        Ok(name)
    }

    /// End of the most recently consumed token
    fn last_end(&self) -> usize {
        self.tokens
            .get(self.pos.saturating_sub(1))
            .map(|(_, span)| span.end + self.offset)
            .unwrap_or(self.offset)
    }

    /// Get the span of the next token (the one we're about to consume)
    fn peek_span(&self) -> std::ops::Range<usize> {
        self.tokens
            .get(self.pos)
            .map(|(_, span)| span.start + self.offset..span.end + self.offset)
            .unwrap_or_else(|| {
                // At end of input, point just past the last token
                let end = self.offset + self.source_len;
                end..end
            })
    }

    /// Format a token for display in error messages
    fn format_token(token: Option<&(Token, std::ops::Range<usize>)>) -> String {
        match token {
            None => "end of expression".to_string(),
            Some((token, _)) => token.to_string(),
        }
    }
}

fn shift_error(err: ParseError, offset: usize) -> ParseError {
    match err {
        ParseError::LexerError {
            start,
            end,
            fragment,
        } => ParseError::LexerError {
            start: start + offset,
            end: end + offset,
            fragment,
        },
        other => other,
    }
}

fn unescape(raw: &str) -> String {
    let mut result = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                push_escape(&mut result, next);
            }
        } else {
            result.push(ch);
        }
    }
    result
}

fn push_escape(out: &mut String, escaped: char) {
    match escaped {
        'n' => out.push('\n'),
        't' => out.push('\t'),
        'r' => out.push('\r'),
        '0' => out.push('\0'),
        other => out.push(other),
    }
}

/// Parse a computed-value expression
pub fn parse_expression(source: &str) -> ParseResult<Expression> {
    let mut parser = Parser::new(source)?;
    parser.parse_complete()
}
