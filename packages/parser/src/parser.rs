use crate::ast::*;
use crate::error::{ParseError, ParseResult};
use crate::tokenizer::{tokenize, Token};
use std::rc::Rc;

/// Recursive-descent parser for binding expressions
pub struct Parser<'src> {
    source: &'src str,
    tokens: Vec<(Token<'src>, std::ops::Range<usize>)>,
    pos: usize,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str) -> ParseResult<Self> {
        Ok(Self {
            source,
            tokens: tokenize(source)?,
            pos: 0,
        })
    }

    /// Parse a complete program (statements separated by `;` or line breaks)
    pub fn parse_program(&mut self) -> ParseResult<Program> {
        let mut body = Vec::new();

        while !self.is_at_end() {
            if self.match_token(Token::Semicolon) {
                continue;
            }
            body.push(self.parse_statement(true)?);
        }

        Ok(Program {
            body,
            span: Span::new(0, self.source.len()),
        })
    }

    /// Parse an iteration header: `item in items`, `(item, index) in items`
    pub fn parse_iteration_header(&mut self) -> ParseResult<IterationHeader> {
        let mut patterns = Vec::new();

        if self.match_token(Token::LParen) {
            while !self.check(Token::RParen) && !self.is_at_end() {
                patterns.push(self.parse_pattern()?);
                if !self.match_token(Token::Comma) {
                    break;
                }
            }
            self.expect(Token::RParen)?;
        } else {
            patterns.push(self.parse_pattern()?);
        }

        if patterns.is_empty() || patterns.len() > 3 {
            return Err(ParseError::invalid_syntax(
                self.current_pos(),
                "Iteration expects one to three bindings",
            ));
        }

        let is_of = matches!(self.peek(), Some((Token::Ident("of"), _)));
        if is_of {
            self.advance();
        } else {
            self.expect(Token::In)?;
        }

        let start = self.current_pos();
        let items = self.parse_expression()?;
        if !self.is_at_end() {
            return Err(self.unexpected("end of expression"));
        }

        let mut patterns = patterns.into_iter();
        let item = patterns
            .next()
            .ok_or_else(|| ParseError::invalid_syntax(start, "Missing iteration binding"))?;

        Ok(IterationHeader {
            item,
            index: patterns.next(),
            collection: patterns.next(),
            items: Program {
                body: vec![Statement::Expression(items)],
                span: Span::new(start, self.source.len()),
            },
        })
    }

    fn parse_statement(&mut self, top_level: bool) -> ParseResult<Statement> {
        let start = self.current_pos();

        match self.peek_token() {
            Some(Token::Let) | Some(Token::Const) | Some(Token::Var) => self.parse_declaration(),
            Some(Token::If) => self.parse_if(),
            Some(Token::Return) => {
                self.advance();
                let argument = if self.is_at_end()
                    || self.check(Token::Semicolon)
                    || self.check(Token::RBrace)
                {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.match_token(Token::Semicolon);
                Ok(Statement::Return {
                    argument,
                    span: Span::new(start, self.current_pos()),
                })
            }
            // A leading brace at the top level is an object literal (`{ open: false }`)
            Some(Token::LBrace) if !top_level => {
                let body = self.parse_block()?;
                Ok(Statement::Block {
                    body,
                    span: Span::new(start, self.current_pos()),
                })
            }
            _ => {
                let expr = self.parse_expression()?;
                self.match_token(Token::Semicolon);
                Ok(Statement::Expression(expr))
            }
        }
    }

    fn parse_declaration(&mut self) -> ParseResult<Statement> {
        let start = self.current_pos();
        let kind = match self.advance().map(|(t, _)| t.clone()) {
            Some(Token::Let) => DeclarationKind::Let,
            Some(Token::Const) => DeclarationKind::Const,
            _ => DeclarationKind::Var,
        };

        let pattern = self.parse_pattern()?;
        let init = if self.match_token(Token::Assign) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.match_token(Token::Semicolon);

        Ok(Statement::Declaration {
            kind,
            pattern,
            init,
            span: Span::new(start, self.current_pos()),
        })
    }

    fn parse_if(&mut self) -> ParseResult<Statement> {
        let start = self.current_pos();
        self.expect(Token::If)?;
        self.expect(Token::LParen)?;
        let test = self.parse_expression()?;
        self.expect(Token::RParen)?;

        let consequent = self.parse_block_or_statement()?;
        let alternate = if self.match_token(Token::Else) {
            if self.check(Token::If) {
                Some(vec![self.parse_if()?])
            } else {
                Some(self.parse_block_or_statement()?)
            }
        } else {
            None
        };

        Ok(Statement::If {
            test,
            consequent,
            alternate,
            span: Span::new(start, self.current_pos()),
        })
    }

    fn parse_block_or_statement(&mut self) -> ParseResult<Vec<Statement>> {
        if self.check(Token::LBrace) {
            self.parse_block()
        } else {
            Ok(vec![self.parse_statement(false)?])
        }
    }

    fn parse_block(&mut self) -> ParseResult<Vec<Statement>> {
        self.expect(Token::LBrace)?;
        let mut body = Vec::new();

        while !self.check(Token::RBrace) && !self.is_at_end() {
            if self.match_token(Token::Semicolon) {
                continue;
            }
            body.push(self.parse_statement(false)?);
        }

        self.expect(Token::RBrace)?;
        Ok(body)
    }

    /// Parse an expression with full operator precedence
    pub fn parse_expression(&mut self) -> ParseResult<Expression> {
        self.parse_assignment()
    }

    /// Parse assignment (lowest precedence, right associative) and arrow functions
    fn parse_assignment(&mut self) -> ParseResult<Expression> {
        if let Some(function) = self.try_parse_arrow()? {
            return Ok(Expression::Function(Rc::new(function)));
        }

        let start = self.current_pos();
        let target = self.parse_conditional()?;

        if let Some(operator) = self.match_assign_op() {
            if !target.is_assignable() {
                return Err(ParseError::invalid_syntax(start, "Invalid assignment target"));
            }
            let value = self.parse_assignment()?;
            return Ok(Expression::Assignment {
                target: Box::new(target),
                operator,
                value: Box::new(value),
                span: Span::new(start, self.current_pos()),
            });
        }

        Ok(target)
    }

    fn try_parse_arrow(&mut self) -> ParseResult<Option<FunctionExpr>> {
        let start = self.current_pos();

        let arrow_follows = matches!(self.peek_ahead(1), Some((Token::Arrow, _)));

        let params = match self.peek_token() {
            Some(Token::Ident(name)) if arrow_follows => {
                self.advance();
                self.advance();
                vec![Pattern::Identifier(name.to_string())]
            }
            Some(Token::LParen) => {
                let Some(close) = self.find_matching_paren(self.pos) else {
                    return Ok(None);
                };
                if !matches!(self.tokens.get(close + 1), Some((Token::Arrow, _))) {
                    return Ok(None);
                }

                self.advance();
                let mut params = Vec::new();
                while !self.check(Token::RParen) && !self.is_at_end() {
                    params.push(self.parse_pattern()?);
                    if !self.match_token(Token::Comma) {
                        break;
                    }
                }
                self.expect(Token::RParen)?;
                self.expect(Token::Arrow)?;
                params
            }
            _ => return Ok(None),
        };

        let body = if self.check(Token::LBrace) {
            FunctionBody::Block(self.parse_block()?)
        } else {
            FunctionBody::Expression(self.parse_assignment()?)
        };

        Ok(Some(FunctionExpr {
            name: None,
            params,
            body,
            is_arrow: true,
            span: Span::new(start, self.current_pos()),
        }))
    }

    /// Index of the `)` closing the `(` at `open`, tracking nested brackets
    fn find_matching_paren(&self, open: usize) -> Option<usize> {
        let mut depth = 0usize;
        for (index, (token, _)) in self.tokens.iter().enumerate().skip(open) {
            match token {
                Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
                Token::RParen | Token::RBracket | Token::RBrace => {
                    depth = depth.checked_sub(1)?;
                    if depth == 0 {
                        return matches!(token, Token::RParen).then_some(index);
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Parse conditional (`test ? a : b`)
    fn parse_conditional(&mut self) -> ParseResult<Expression> {
        let start = self.current_pos();
        let test = self.parse_logical_or()?;

        if self.match_token(Token::Question) {
            let consequent = self.parse_assignment()?;
            self.expect(Token::Colon)?;
            let alternate = self.parse_assignment()?;
            return Ok(Expression::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
                span: Span::new(start, self.current_pos()),
            });
        }

        Ok(test)
    }

    /// Parse OR / nullish coalescing
    fn parse_logical_or(&mut self) -> ParseResult<Expression> {
        let start = self.current_pos();
        let mut left = self.parse_logical_and()?;

        loop {
            let operator = if self.match_token(Token::Or) {
                LogicalOp::Or
            } else if self.match_token(Token::Nullish) {
                LogicalOp::Nullish
            } else {
                break;
            };
            let right = self.parse_logical_and()?;
            left = Expression::Logical {
                left: Box::new(left),
                operator,
                right: Box::new(right),
                span: Span::new(start, self.current_pos()),
            };
        }

        Ok(left)
    }

    /// Parse AND expression
    fn parse_logical_and(&mut self) -> ParseResult<Expression> {
        let start = self.current_pos();
        let mut left = self.parse_equality()?;

        while self.match_token(Token::And) {
            let right = self.parse_equality()?;
            left = Expression::Logical {
                left: Box::new(left),
                operator: LogicalOp::And,
                right: Box::new(right),
                span: Span::new(start, self.current_pos()),
            };
        }

        Ok(left)
    }

    /// Parse equality expression (== != === !==)
    fn parse_equality(&mut self) -> ParseResult<Expression> {
        let start = self.current_pos();
        let mut left = self.parse_relational()?;

        while let Some(operator) = self.match_equality_op() {
            let right = self.parse_relational()?;
            left = self.binary(left, operator, right, start);
        }

        Ok(left)
    }

    /// Parse comparison expression (< > <= >= in)
    fn parse_relational(&mut self) -> ParseResult<Expression> {
        let start = self.current_pos();
        let mut left = self.parse_additive()?;

        while let Some(operator) = self.match_relational_op() {
            let right = self.parse_additive()?;
            left = self.binary(left, operator, right, start);
        }

        Ok(left)
    }

    /// Parse additive expression (+ -)
    fn parse_additive(&mut self) -> ParseResult<Expression> {
        let start = self.current_pos();
        let mut left = self.parse_multiplicative()?;

        while let Some(operator) = self.match_additive_op() {
            let right = self.parse_multiplicative()?;
            left = self.binary(left, operator, right, start);
        }

        Ok(left)
    }

    /// Parse multiplicative expression (* / %)
    fn parse_multiplicative(&mut self) -> ParseResult<Expression> {
        let start = self.current_pos();
        let mut left = self.parse_unary()?;

        while let Some(operator) = self.match_multiplicative_op() {
            let right = self.parse_unary()?;
            left = self.binary(left, operator, right, start);
        }

        Ok(left)
    }

    fn binary(&self, left: Expression, operator: BinaryOp, right: Expression, start: usize) -> Expression {
        Expression::Binary {
            left: Box::new(left),
            operator,
            right: Box::new(right),
            span: Span::new(start, self.current_pos()),
        }
    }

    /// Parse prefix operators
    fn parse_unary(&mut self) -> ParseResult<Expression> {
        let start = self.current_pos();

        let operator = match self.peek_token() {
            Some(Token::Bang) => Some(UnaryOp::Not),
            Some(Token::Minus) => Some(UnaryOp::Negate),
            Some(Token::Plus) => Some(UnaryOp::Plus),
            Some(Token::Typeof) => Some(UnaryOp::Typeof),
            _ => None,
        };
        if let Some(operator) = operator {
            self.advance();
            let argument = self.parse_unary()?;
            return Ok(Expression::Unary {
                operator,
                argument: Box::new(argument),
                span: Span::new(start, self.current_pos()),
            });
        }

        let update = match self.peek_token() {
            Some(Token::PlusPlus) => Some(UpdateOp::Increment),
            Some(Token::MinusMinus) => Some(UpdateOp::Decrement),
            _ => None,
        };
        if let Some(operator) = update {
            self.advance();
            let target = self.parse_unary()?;
            if !target.is_assignable() {
                return Err(ParseError::invalid_syntax(start, "Invalid update target"));
            }
            return Ok(Expression::Update {
                operator,
                prefix: true,
                target: Box::new(target),
                span: Span::new(start, self.current_pos()),
            });
        }

        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> ParseResult<Expression> {
        let start = self.current_pos();
        let expr = self.parse_call_member()?;

        let update = match self.peek_token() {
            Some(Token::PlusPlus) => Some(UpdateOp::Increment),
            Some(Token::MinusMinus) => Some(UpdateOp::Decrement),
            _ => None,
        };
        match update {
            Some(operator) if expr.is_assignable() => {
                self.advance();
                Ok(Expression::Update {
                    operator,
                    prefix: false,
                    target: Box::new(expr),
                    span: Span::new(start, self.current_pos()),
                })
            }
            _ => Ok(expr),
        }
    }

    /// Parse member access, index access, calls and optional chains
    fn parse_call_member(&mut self) -> ParseResult<Expression> {
        let start = self.current_pos();
        let mut expr = self.parse_primary()?;

        loop {
            if self.match_token(Token::Dot) {
                let property = self.expect_property_name()?;
                expr = Expression::Member {
                    object: Box::new(expr),
                    property: MemberProperty::Named(property),
                    optional: false,
                    span: Span::new(start, self.current_pos()),
                };
            } else if self.match_token(Token::QuestionDot) {
                if self.match_token(Token::LParen) {
                    let arguments = self.parse_arguments()?;
                    expr = Expression::Call {
                        callee: Box::new(expr),
                        arguments,
                        optional: true,
                        span: Span::new(start, self.current_pos()),
                    };
                } else if self.match_token(Token::LBracket) {
                    let index = self.parse_expression()?;
                    self.expect(Token::RBracket)?;
                    expr = Expression::Member {
                        object: Box::new(expr),
                        property: MemberProperty::Computed(Box::new(index)),
                        optional: true,
                        span: Span::new(start, self.current_pos()),
                    };
                } else {
                    let property = self.expect_property_name()?;
                    expr = Expression::Member {
                        object: Box::new(expr),
                        property: MemberProperty::Named(property),
                        optional: true,
                        span: Span::new(start, self.current_pos()),
                    };
                }
            } else if self.match_token(Token::LBracket) {
                let index = self.parse_expression()?;
                self.expect(Token::RBracket)?;
                expr = Expression::Member {
                    object: Box::new(expr),
                    property: MemberProperty::Computed(Box::new(index)),
                    optional: false,
                    span: Span::new(start, self.current_pos()),
                };
            } else if self.match_token(Token::LParen) {
                let arguments = self.parse_arguments()?;
                expr = Expression::Call {
                    callee: Box::new(expr),
                    arguments,
                    optional: false,
                    span: Span::new(start, self.current_pos()),
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    /// Parse call arguments after the opening parenthesis
    fn parse_arguments(&mut self) -> ParseResult<Vec<Element>> {
        let mut arguments = Vec::new();

        while !self.check(Token::RParen) && !self.is_at_end() {
            if self.match_token(Token::Ellipsis) {
                arguments.push(Element::Spread(self.parse_assignment()?));
            } else {
                arguments.push(Element::Item(self.parse_assignment()?));
            }
            if !self.match_token(Token::Comma) {
                break;
            }
        }

        self.expect(Token::RParen)?;
        Ok(arguments)
    }

    /// Parse primary expression (literals, identifiers, groups, array/object literals)
    fn parse_primary(&mut self) -> ParseResult<Expression> {
        let start = self.current_pos();

        let Some(token) = self.peek_token() else {
            return Err(ParseError::unexpected_eof(self.current_pos(), "expression"));
        };

        match token {
            Token::Number(n) => {
                self.advance();
                let value = n
                    .parse::<f64>()
                    .map_err(|_| ParseError::invalid_syntax(start, format!("Invalid number {}", n)))?;
                Ok(self.literal(Literal::Number(value), start))
            }
            Token::String(s) => {
                self.advance();
                Ok(self.literal(Literal::String(unescape(&s[1..s.len() - 1])), start))
            }
            Token::Template(s) => {
                self.advance();
                self.parse_template(&s[1..s.len() - 1], start)
            }
            Token::True => {
                self.advance();
                Ok(self.literal(Literal::Boolean(true), start))
            }
            Token::False => {
                self.advance();
                Ok(self.literal(Literal::Boolean(false), start))
            }
            Token::Null => {
                self.advance();
                Ok(self.literal(Literal::Null, start))
            }
            Token::Undefined => {
                self.advance();
                Ok(self.literal(Literal::Undefined, start))
            }
            Token::This => {
                self.advance();
                Ok(Expression::This {
                    span: Span::new(start, self.current_pos()),
                })
            }
            Token::Ident(name) => {
                self.advance();
                Ok(Expression::Identifier {
                    name: name.to_string(),
                    span: Span::new(start, self.current_pos()),
                })
            }
            Token::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Token::LBracket => self.parse_array_literal(),
            Token::LBrace => self.parse_object_literal(),
            _ => Err(self.unexpected("expression")),
        }
    }

    fn literal(&self, value: Literal, start: usize) -> Expression {
        Expression::Literal {
            value,
            span: Span::new(start, self.current_pos()),
        }
    }

    fn parse_array_literal(&mut self) -> ParseResult<Expression> {
        let start = self.current_pos();
        self.expect(Token::LBracket)?;
        let mut elements = Vec::new();

        while !self.check(Token::RBracket) && !self.is_at_end() {
            if self.match_token(Token::Ellipsis) {
                elements.push(Element::Spread(self.parse_assignment()?));
            } else {
                elements.push(Element::Item(self.parse_assignment()?));
            }
            if !self.match_token(Token::Comma) {
                break;
            }
        }

        self.expect(Token::RBracket)?;
        Ok(Expression::Array {
            elements,
            span: Span::new(start, self.current_pos()),
        })
    }

    /// Parse object literal: key/value pairs, shorthand, methods, getters, spreads
    fn parse_object_literal(&mut self) -> ParseResult<Expression> {
        let start = self.current_pos();
        self.expect(Token::LBrace)?;
        let mut properties = Vec::new();

        while !self.check(Token::RBrace) && !self.is_at_end() {
            if self.match_token(Token::Ellipsis) {
                properties.push(Property::Spread(self.parse_assignment()?));
            } else if self.at_getter() {
                self.advance();
                let (key, _) = self.parse_property_key()?;
                let function = self.parse_method_rest(&key)?;
                properties.push(Property::Getter {
                    key,
                    function: Rc::new(function),
                });
            } else {
                let key_pos = self.current_pos();
                let (key, is_identifier) = self.parse_property_key()?;

                if self.match_token(Token::Colon) {
                    let value = self.parse_assignment()?;
                    properties.push(Property::KeyValue { key, value });
                } else if self.check(Token::LParen) {
                    let function = self.parse_method_rest(&key)?;
                    properties.push(Property::Method {
                        key,
                        function: Rc::new(function),
                    });
                } else {
                    match key {
                        PropertyKey::Named(name) if is_identifier => {
                            properties.push(Property::Shorthand(name));
                        }
                        _ => {
                            return Err(ParseError::invalid_syntax(
                                key_pos,
                                "Expected ':' after property key",
                            ))
                        }
                    }
                }
            }

            if !self.match_token(Token::Comma) {
                break;
            }
        }

        self.expect(Token::RBrace)?;
        Ok(Expression::Object {
            properties,
            span: Span::new(start, self.current_pos()),
        })
    }

    /// `get name() { ... }` inside an object literal
    fn at_getter(&self) -> bool {
        matches!(self.peek(), Some((Token::Ident("get"), _)))
            && self
                .peek_ahead(1)
                .is_some_and(|(t, _)| matches!(t, Token::Ident(_) | Token::String(_)) || t.keyword_text().is_some())
            && matches!(self.peek_ahead(2), Some((Token::LParen, _)))
    }

    /// Returns the key and whether it was written as a bare identifier
    fn parse_property_key(&mut self) -> ParseResult<(PropertyKey, bool)> {
        let Some(token) = self.peek_token() else {
            return Err(ParseError::unexpected_eof(self.current_pos(), "property key"));
        };

        match token {
            Token::Ident(name) => {
                self.advance();
                Ok((PropertyKey::Named(name.to_string()), true))
            }
            Token::String(s) => {
                self.advance();
                Ok((PropertyKey::Named(unescape(&s[1..s.len() - 1])), false))
            }
            Token::Number(n) => {
                self.advance();
                Ok((PropertyKey::Named(n.to_string()), false))
            }
            Token::LBracket => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(Token::RBracket)?;
                Ok((PropertyKey::Computed(expr), false))
            }
            other => match other.keyword_text() {
                Some(keyword) => {
                    self.advance();
                    Ok((PropertyKey::Named(keyword.to_string()), false))
                }
                None => Err(self.unexpected("property key")),
            },
        }
    }

    /// Parameter list and block body of a method
    fn parse_method_rest(&mut self, key: &PropertyKey) -> ParseResult<FunctionExpr> {
        let start = self.current_pos();
        self.expect(Token::LParen)?;

        let mut params = Vec::new();
        while !self.check(Token::RParen) && !self.is_at_end() {
            params.push(self.parse_pattern()?);
            if !self.match_token(Token::Comma) {
                break;
            }
        }
        self.expect(Token::RParen)?;

        let body = self.parse_block()?;
        Ok(FunctionExpr {
            name: match key {
                PropertyKey::Named(name) => Some(name.clone()),
                PropertyKey::Computed(_) => None,
            },
            params,
            body: FunctionBody::Block(body),
            is_arrow: false,
            span: Span::new(start, self.current_pos()),
        })
    }

    /// Parse a binding pattern (identifier, array or object destructuring)
    fn parse_pattern(&mut self) -> ParseResult<Pattern> {
        match self.peek_token() {
            Some(Token::Ident(name)) => {
                self.advance();
                Ok(Pattern::Identifier(name.to_string()))
            }
            Some(Token::LBracket) => {
                self.advance();
                let mut items = Vec::new();
                while !self.check(Token::RBracket) && !self.is_at_end() {
                    if self.check(Token::Comma) {
                        items.push(None);
                    } else {
                        items.push(Some(self.parse_pattern()?));
                    }
                    if !self.match_token(Token::Comma) {
                        break;
                    }
                }
                self.expect(Token::RBracket)?;
                Ok(Pattern::Array(items))
            }
            Some(Token::LBrace) => {
                self.advance();
                let mut entries = Vec::new();
                while !self.check(Token::RBrace) && !self.is_at_end() {
                    let key = self.expect_property_name()?;
                    let pattern = if self.match_token(Token::Colon) {
                        self.parse_pattern()?
                    } else {
                        Pattern::Identifier(key.clone())
                    };
                    entries.push((key, pattern));
                    if !self.match_token(Token::Comma) {
                        break;
                    }
                }
                self.expect(Token::RBrace)?;
                Ok(Pattern::Object(entries))
            }
            _ => Err(self.unexpected("binding pattern")),
        }
    }

    /// Parse template literal content with `${...}` interpolation
    fn parse_template(&mut self, content: &str, start: usize) -> ParseResult<Expression> {
        let mut parts = Vec::new();
        let mut current = String::new();
        let mut chars = content.chars().peekable();

        while let Some(ch) = chars.next() {
            if ch == '$' && chars.peek() == Some(&'{') {
                chars.next(); // consume '{'

                if !current.is_empty() {
                    parts.push(TemplatePart::Literal(unescape(&current)));
                    current.clear();
                }

                let mut expr_str = String::new();
                let mut depth = 1;
                while depth > 0 {
                    match chars.next() {
                        Some('{') => {
                            depth += 1;
                            expr_str.push('{');
                        }
                        Some('}') => {
                            depth -= 1;
                            if depth > 0 {
                                expr_str.push('}');
                            }
                        }
                        Some(c) => expr_str.push(c),
                        None => {
                            return Err(ParseError::unexpected_eof(start, "'}' closing interpolation"))
                        }
                    }
                }

                let mut sub_parser = Parser::new(&expr_str)?;
                let expr = sub_parser.parse_expression()?;
                if !sub_parser.is_at_end() {
                    return Err(ParseError::invalid_syntax(start, "Invalid template interpolation"));
                }
                parts.push(TemplatePart::Expression(expr));
            } else if ch == '\\' {
                current.push(ch);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            } else {
                current.push(ch);
            }
        }

        if !current.is_empty() {
            parts.push(TemplatePart::Literal(unescape(&current)));
        }

        Ok(Expression::Template {
            parts,
            span: Span::new(start, self.current_pos()),
        })
    }

    // Helper methods for matching operators

    fn match_assign_op(&mut self) -> Option<AssignOp> {
        let op = match self.peek_token()? {
            Token::Assign => AssignOp::Assign,
            Token::PlusAssign => AssignOp::Add,
            Token::MinusAssign => AssignOp::Subtract,
            Token::StarAssign => AssignOp::Multiply,
            Token::SlashAssign => AssignOp::Divide,
            Token::OrAssign => AssignOp::Or,
            Token::AndAssign => AssignOp::And,
            Token::NullishAssign => AssignOp::Nullish,
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    fn match_equality_op(&mut self) -> Option<BinaryOp> {
        let op = match self.peek_token()? {
            Token::EqualsEquals => BinaryOp::Equals,
            Token::NotEquals => BinaryOp::NotEquals,
            Token::StrictEquals => BinaryOp::StrictEquals,
            Token::StrictNotEquals => BinaryOp::StrictNotEquals,
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    fn match_relational_op(&mut self) -> Option<BinaryOp> {
        let op = match self.peek_token()? {
            Token::LessThanEquals => BinaryOp::LessThanOrEqual,
            Token::GreaterThanEquals => BinaryOp::GreaterThanOrEqual,
            Token::LAngle => BinaryOp::LessThan,
            Token::RAngle => BinaryOp::GreaterThan,
            Token::In => BinaryOp::In,
            _ => return None,
        };
        self.advance();
        Some(op)
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

    fn peek_token(&self) -> Option<Token<'src>> {
        self.peek().map(|(t, _)| t.clone())
    }

    fn peek_ahead(&self, offset: usize) -> Option<&(Token<'src>, std::ops::Range<usize>)> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<&(Token<'src>, std::ops::Range<usize>)> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    pub fn is_at_end(&self) -> bool {
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
        } else {
            Err(self.unexpected(format!("'{}'", token)))
        }
    }

    /// Identifier or keyword used as a property name (`obj.if`, `{ in: 1 }`)
    fn expect_property_name(&mut self) -> ParseResult<String> {
        match self.peek_token() {
            Some(Token::Ident(name)) => {
                self.advance();
                Ok(name.to_string())
            }
            Some(token) => match token.keyword_text() {
                Some(keyword) => {
                    self.advance();
                    Ok(keyword.to_string())
                }
                None => Err(self.unexpected("property name")),
            },
            None => Err(ParseError::unexpected_eof(self.current_pos(), "property name")),
        }
    }

    fn unexpected(&self, expected: impl Into<String>) -> ParseError {
        match self.peek() {
            Some((token, span)) => ParseError::unexpected_token(span.start, expected, token.to_string()),
            None => ParseError::unexpected_eof(self.current_pos(), expected),
        }
    }

    fn current_pos(&self) -> usize {
        match self.tokens.get(self.pos) {
            Some((_, span)) => span.start,
            None => self.source.len(),
        }
    }
}

/// Resolve backslash escapes in string and template literal content
fn unescape(raw: &str) -> String {
    let mut result = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('0') => result.push('\0'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => result.push(decoded),
                    None => {
                        result.push_str("\\u");
                        result.push_str(&hex);
                    }
                }
            }
            Some(other) => result.push(other),
            None => result.push('\\'),
        }
    }

    result
}

/// Parse a binding expression into a program
pub fn parse_program(source: &str) -> ParseResult<Program> {
    Parser::new(source)?.parse_program()
}

/// Parse exactly one expression, rejecting trailing tokens
pub fn parse_expression(source: &str) -> ParseResult<Expression> {
    let mut parser = Parser::new(source)?;
    let expr = parser.parse_expression()?;
    if !parser.is_at_end() {
        return Err(parser.unexpected("end of expression"));
    }
    Ok(expr)
}

/// Parse the header of a list directive: `(item, index) in items`
pub fn parse_iteration(source: &str) -> ParseResult<IterationHeader> {
    Parser::new(source)?.parse_iteration_header()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_object_literal_program() {
        let program = parse_program("{ open: false, count: 0 }").unwrap();
        match program.as_single_expression() {
            Some(Expression::Object { properties, .. }) => assert_eq!(properties.len(), 2),
            other => panic!("Expected object literal, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_precedence() {
        let expr = parse_expression("a + b * c").unwrap();
        match expr {
            Expression::Binary { operator: BinaryOp::Add, right, .. } => {
                assert!(matches!(*right, Expression::Binary { operator: BinaryOp::Multiply, .. }));
            }
            other => panic!("Expected addition, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_arrow_functions() {
        assert!(matches!(parse_expression("x => x * 2").unwrap(), Expression::Function(_)));
        assert!(matches!(parse_expression("(a, b) => { return a + b }").unwrap(), Expression::Function(_)));
        assert!(matches!(parse_expression("() => open = !open").unwrap(), Expression::Function(_)));
        // A parenthesized group is not an arrow
        assert!(matches!(parse_expression("(a + b) * 2").unwrap(), Expression::Binary { .. }));
    }

    #[test]
    fn test_parse_methods_and_getters() {
        let program = parse_program("{ toggle() { this.open = !this.open }, get label() { return 'x' } }").unwrap();
        let Some(Expression::Object { properties, .. }) = program.as_single_expression() else {
            panic!("Expected object literal");
        };
        assert!(matches!(properties[0], Property::Method { .. }));
        assert!(matches!(properties[1], Property::Getter { .. }));
    }

    #[test]
    fn test_parse_statements() {
        let program = parse_program("count++; open = true\nlet x = 1").unwrap();
        assert_eq!(program.body.len(), 3);
        assert!(matches!(program.body[2], Statement::Declaration { kind: DeclarationKind::Let, .. }));
    }

    #[test]
    fn test_parse_optional_chain_and_index() {
        let expr = parse_expression("user?.tags[0]").unwrap();
        match expr {
            Expression::Member { object, property: MemberProperty::Computed(_), .. } => {
                assert!(matches!(*object, Expression::Member { optional: true, .. }));
            }
            other => panic!("Expected computed member, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_template_literal() {
        let expr = parse_expression("`Hello ${user.name}!`").unwrap();
        match expr {
            Expression::Template { parts, .. } => {
                assert_eq!(parts.len(), 3);
                assert_eq!(parts[0], TemplatePart::Literal("Hello ".to_string()));
            }
            other => panic!("Expected template, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_assignment_target() {
        let err = parse_expression("1 = 2").unwrap_err();
        assert!(matches!(err, ParseError::InvalidSyntax { .. }));
    }

    #[test]
    fn test_parse_iteration_headers() {
        let header = parse_iteration("item in items").unwrap();
        assert_eq!(header.item, Pattern::Identifier("item".to_string()));
        assert!(header.index.is_none());

        let header = parse_iteration("(value, key, all) in record").unwrap();
        assert_eq!(header.index, Some(Pattern::Identifier("key".to_string())));
        assert_eq!(header.collection, Some(Pattern::Identifier("all".to_string())));

        let header = parse_iteration("({ id, name }, i) of rows").unwrap();
        assert_eq!(header.item.bound_names(), vec!["id", "name"]);

        let header = parse_iteration("i in 10").unwrap();
        assert!(matches!(
            header.items.as_single_expression(),
            Some(Expression::Literal { value: Literal::Number(n), .. }) if *n == 10.0
        ));
    }

    #[test]
    fn test_iteration_requires_in() {
        assert!(parse_iteration("item items").is_err());
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(r"a\nb\'cA"), "a\nb'cA");
    }
}
