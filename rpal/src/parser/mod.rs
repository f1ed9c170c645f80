//! Recursive-descent parser producing the raw AST
//!
//! All grammar productions are methods on [`Parser`], which owns the token
//! buffer, the cursor and the tree being built. Each production returns the
//! id of the (detached) subtree it built; the caller links it under its own
//! node.

use crate::error::{CompileError, Result};
use crate::lexer::Token;
use crate::tree::{NodeId, NodeKind, Operator, Payload, Span, Tree};


const STACK_RED_ZONE: usize = 64 * 1024;
const STACK_GROW_SIZE: usize = 1024 * 1024;

/// Parse tokens into an AST whose root is set
pub fn parse(tokens: Vec<(Token, Span)>) -> Result<Tree> {
    let mut parser = Parser::new(tokens);
    let root = parser.expr()?;
    if let Some((token, span)) = parser.tokens.get(parser.pos) {
        return Err(CompileError::parser(
            format!("expected end of input, found {}", token.describe()),
            *span,
        ));
    }
    parser.tree.set_root(root)?;
    Ok(parser.tree)
}

/// Explicit parser state threaded through every production
struct Parser {
    tokens: Vec<(Token, Span)>,
    pos: usize,
    tree: Tree,
    eof: Span,
}

impl Parser {
    fn new(tokens: Vec<(Token, Span)>) -> Self {
        let end = tokens.last().map_or(0, |(_, span)| span.end);
        Parser {
            tokens,
            pos: 0,
            tree: Tree::new(),
            eof: Span::new(end, end),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(token, _)| token)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|(token, _)| token)
    }

    fn current_span(&self) -> Span {
        self.tokens.get(self.pos).map_or(self.eof, |(_, span)| *span)
    }

    fn at(&self, token: &Token) -> bool {
        self.peek() == Some(token)
    }

    fn at_op(&self, symbol: &str) -> bool {
        self.peek().is_some_and(|t| t.is_op(symbol))
    }

    fn bump(&mut self) -> Span {
        let span = self.current_span();
        self.pos += 1;
        span
    }

    fn error<T>(&self, expected: &str) -> Result<T> {
        let found = self.peek().map_or_else(|| "end of input".to_string(), Token::describe);
        Err(CompileError::parser(
            format!("expected {expected}, found {found}"),
            self.current_span(),
        ))
    }

    fn expect(&mut self, token: Token) -> Result<Span> {
        if self.at(&token) {
            Ok(self.bump())
        } else {
            self.error(&token.describe())
        }
    }

    fn expect_op(&mut self, symbol: &str) -> Result<Span> {
        if self.at_op(symbol) {
            Ok(self.bump())
        } else {
            self.error(&format!("'{symbol}'"))
        }
    }

    fn grow<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || f(self))
    }

    /// Build `kind` over `children`, spanning from `start` to the last child
    fn node(&mut self, kind: NodeKind, payload: Option<Payload>, start: Span, children: &[NodeId]) -> Result<NodeId> {
        let span = children
            .last()
            .map_or(start, |&last| start.merge(self.tree.span(last)));
        Ok(self.tree.build(kind, payload, span, children)?)
    }

    fn binary(&mut self, op: Operator, left: NodeId, right: NodeId) -> Result<NodeId> {
        let start = self.tree.span(left);
        self.node(NodeKind::Binary, Some(Payload::Op(op)), start, &[left, right])
    }

    fn unary(&mut self, op: Operator, start: Span, operand: NodeId) -> Result<NodeId> {
        self.node(NodeKind::Unary, Some(Payload::Op(op)), start, &[operand])
    }

    // ============================================================
    // Expressions
    // ============================================================

    /// E -> 'let' D 'in' E | 'fn' Vb+ '.' E | Ew
    fn expr(&mut self) -> Result<NodeId> {
        self.grow(|p| match p.peek() {
            Some(Token::Let) => {
                let start = p.bump();
                let def = p.definition()?;
                p.expect(Token::In)?;
                let body = p.expr()?;
                p.node(NodeKind::Let, None, start, &[def, body])
            }
            Some(Token::Fn) => {
                let start = p.bump();
                let mut children = vec![p.binder()?];
                while !p.at_op(".") {
                    children.push(p.binder()?);
                }
                p.expect_op(".")?;
                children.push(p.expr()?);
                p.node(NodeKind::Lambda, None, start, &children)
            }
            _ => p.where_expr(),
        })
    }

    /// Ew -> T 'where' Dr | T
    fn where_expr(&mut self) -> Result<NodeId> {
        let body = self.tuple()?;
        if !self.at(&Token::Where) {
            return Ok(body);
        }
        self.bump();
        let def = self.rec_definition()?;
        let start = self.tree.span(body);
        self.node(NodeKind::Where, None, start, &[body, def])
    }

    /// T -> Ta (',' Ta)*
    fn tuple(&mut self) -> Result<NodeId> {
        let first = self.augmented()?;
        if !self.at(&Token::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.at(&Token::Comma) {
            self.bump();
            items.push(self.augmented()?);
        }
        let start = self.tree.span(first);
        self.node(NodeKind::Tau, None, start, &items)
    }

    /// Ta -> Ta 'aug' Tc | Tc
    fn augmented(&mut self) -> Result<NodeId> {
        let mut left = self.conditional()?;
        while self.at(&Token::Aug) {
            self.bump();
            let right = self.conditional()?;
            left = self.binary(Operator::Aug, left, right)?;
        }
        Ok(left)
    }

    /// Tc -> B '->' Tc '|' Tc | B
    fn conditional(&mut self) -> Result<NodeId> {
        self.grow(|p| {
            let cond = p.disjunction()?;
            if !p.at_op("->") {
                return Ok(cond);
            }
            p.bump();
            let then = p.conditional()?;
            p.expect_op("|")?;
            let otherwise = p.conditional()?;
            let start = p.tree.span(cond);
            p.node(NodeKind::Cond, None, start, &[cond, then, otherwise])
        })
    }

    /// B -> B 'or' Bt | Bt
    fn disjunction(&mut self) -> Result<NodeId> {
        let mut left = self.conjunction()?;
        while self.at(&Token::Or) {
            self.bump();
            let right = self.conjunction()?;
            left = self.binary(Operator::Or, left, right)?;
        }
        Ok(left)
    }

    /// Bt -> Bt '&' Bs | Bs
    fn conjunction(&mut self) -> Result<NodeId> {
        let mut left = self.negation()?;
        while self.at_op("&") {
            self.bump();
            let right = self.negation()?;
            left = self.binary(Operator::Amp, left, right)?;
        }
        Ok(left)
    }

    /// Bs -> 'not' Bp | Bp
    fn negation(&mut self) -> Result<NodeId> {
        if self.at(&Token::Not) {
            let start = self.bump();
            let operand = self.comparison()?;
            return self.unary(Operator::Not, start, operand);
        }
        self.comparison()
    }

    /// Bp -> A (gr | ge | ls | le | eq | ne) A | A
    fn comparison(&mut self) -> Result<NodeId> {
        let left = self.arithmetic()?;
        let op = match self.peek() {
            Some(Token::Gr) => Operator::Gr,
            Some(Token::Ge) => Operator::Ge,
            Some(Token::Ls) => Operator::Ls,
            Some(Token::Le) => Operator::Le,
            Some(Token::Eq) => Operator::Eq,
            Some(Token::Ne) => Operator::Ne,
            Some(Token::Op(s)) => match s.as_str() {
                ">" => Operator::Gr,
                ">=" => Operator::Ge,
                "<" => Operator::Ls,
                "<=" => Operator::Le,
                _ => return Ok(left),
            },
            _ => return Ok(left),
        };
        self.bump();
        let right = self.arithmetic()?;
        self.binary(op, left, right)
    }

    /// A -> A ('+' | '-') At | ('+' | '-') At | At
    fn arithmetic(&mut self) -> Result<NodeId> {
        let mut left = if self.at_op("+") {
            self.bump();
            self.term()?
        } else if self.at_op("-") {
            let start = self.bump();
            let operand = self.term()?;
            self.unary(Operator::Neg, start, operand)?
        } else {
            self.term()?
        };
        loop {
            let op = if self.at_op("+") {
                Operator::Plus
            } else if self.at_op("-") {
                Operator::Minus
            } else {
                return Ok(left);
            };
            self.bump();
            let right = self.term()?;
            left = self.binary(op, left, right)?;
        }
    }

    /// At -> At ('*' | '/') Af | Af
    fn term(&mut self) -> Result<NodeId> {
        let mut left = self.power()?;
        loop {
            let op = if self.at_op("*") {
                Operator::Mul
            } else if self.at_op("/") {
                Operator::Div
            } else {
                return Ok(left);
            };
            self.bump();
            let right = self.power()?;
            left = self.binary(op, left, right)?;
        }
    }

    /// Af -> Ap '**' Af | Ap
    fn power(&mut self) -> Result<NodeId> {
        self.grow(|p| {
            let base = p.infix()?;
            if !p.at_op("**") {
                return Ok(base);
            }
            p.bump();
            let exponent = p.power()?;
            p.binary(Operator::Pow, base, exponent)
        })
    }

    /// Ap -> Ap '@' IDENT R | R
    fn infix(&mut self) -> Result<NodeId> {
        let mut left = self.application()?;
        while self.at_op("@") {
            self.bump();
            let func = match self.peek() {
                Some(Token::Ident(name)) => {
                    let name = name.clone();
                    let span = self.bump();
                    self.tree.create_ident(name, span)?
                }
                _ => return self.error("identifier after '@'"),
            };
            let right = self.application()?;
            let start = self.tree.span(left);
            left = self.node(NodeKind::At, None, start, &[left, func, right])?;
        }
        Ok(left)
    }

    /// R -> R Rn | Rn
    fn application(&mut self) -> Result<NodeId> {
        let mut left = self.operand()?;
        while self.starts_operand() {
            let right = self.operand()?;
            let start = self.tree.span(left);
            left = self.node(NodeKind::Gamma, None, start, &[left, right])?;
        }
        Ok(left)
    }

    fn starts_operand(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                Token::Ident(_)
                    | Token::Int(_)
                    | Token::Str(_)
                    | Token::True
                    | Token::False
                    | Token::Nil
                    | Token::Dummy
                    | Token::LParen
            )
        )
    }

    /// Rn -> IDENT | INT | STR | true | false | nil | dummy | '(' E ')'
    fn operand(&mut self) -> Result<NodeId> {
        let span = self.current_span();
        let (kind, payload) = match self.peek() {
            Some(Token::Ident(name)) => (NodeKind::Identifier, Some(Payload::Ident(name.clone()))),
            Some(Token::Int(n)) => (NodeKind::Integer, Some(Payload::Int(*n))),
            Some(Token::Str(s)) => (NodeKind::Str, Some(Payload::Str(s.clone()))),
            Some(Token::True) => (NodeKind::True, None),
            Some(Token::False) => (NodeKind::False, None),
            Some(Token::Nil) => (NodeKind::Nil, None),
            Some(Token::Dummy) => (NodeKind::Dummy, None),
            Some(Token::LParen) => {
                self.bump();
                let inner = self.expr()?;
                self.expect(Token::RParen)?;
                return Ok(inner);
            }
            _ => return self.error("expression"),
        };
        self.bump();
        Ok(self.tree.create(kind, payload, span)?)
    }

    // ============================================================
    // Definitions
    // ============================================================

    /// D -> Da 'within' D | Da
    fn definition(&mut self) -> Result<NodeId> {
        self.grow(|p| {
            let inner = p.simultaneous()?;
            if !p.at(&Token::Within) {
                return Ok(inner);
            }
            p.bump();
            let outer = p.definition()?;
            let start = p.tree.span(inner);
            p.node(NodeKind::Within, None, start, &[inner, outer])
        })
    }

    /// Da -> Dr ('and' Dr)*
    fn simultaneous(&mut self) -> Result<NodeId> {
        let first = self.rec_definition()?;
        if !self.at(&Token::And) {
            return Ok(first);
        }
        let mut defs = vec![first];
        while self.at(&Token::And) {
            self.bump();
            defs.push(self.rec_definition()?);
        }
        let start = self.tree.span(first);
        self.node(NodeKind::And, None, start, &defs)
    }

    /// Dr -> 'rec' Db | Db
    fn rec_definition(&mut self) -> Result<NodeId> {
        if self.at(&Token::Rec) {
            let start = self.bump();
            let def = self.basic_definition()?;
            return self.node(NodeKind::Rec, None, start, &[def]);
        }
        self.basic_definition()
    }

    /// Db -> Vl '=' E | IDENT Vb+ '=' E | '(' D ')'
    fn basic_definition(&mut self) -> Result<NodeId> {
        match self.peek() {
            Some(Token::LParen) => {
                self.bump();
                let def = self.definition()?;
                self.expect(Token::RParen)?;
                Ok(def)
            }
            Some(Token::Ident(_)) => {
                let is_simple = matches!(self.peek_at(1), Some(Token::Comma))
                    || self.peek_at(1).is_some_and(|t| t.is_op("="));
                if is_simple {
                    let binder = self.variable_list()?;
                    self.expect_op("=")?;
                    let value = self.expr()?;
                    let start = self.tree.span(binder);
                    return self.node(NodeKind::Equal, None, start, &[binder, value]);
                }
                let name = self.variable()?;
                let mut children = vec![name];
                while !self.at_op("=") {
                    children.push(self.binder()?);
                }
                self.bump();
                children.push(self.expr()?);
                let start = self.tree.span(name);
                self.node(NodeKind::FunctionForm, None, start, &children)
            }
            _ => self.error("definition"),
        }
    }

    // ============================================================
    // Variables
    // ============================================================

    fn variable(&mut self) -> Result<NodeId> {
        match self.peek() {
            Some(Token::Ident(name)) => {
                let name = name.clone();
                let span = self.bump();
                Ok(self.tree.create_ident(name, span)?)
            }
            _ => self.error("identifier"),
        }
    }

    /// Vb -> IDENT | '(' Vl ')' | '(' ')'
    fn binder(&mut self) -> Result<NodeId> {
        if self.at(&Token::LParen) {
            let start = self.bump();
            if self.at(&Token::RParen) {
                let end = self.bump();
                return Ok(self.tree.create(NodeKind::Empty, None, start.merge(end))?);
            }
            let list = self.variable_list()?;
            self.expect(Token::RParen)?;
            return Ok(list);
        }
        self.variable()
    }

    /// Vl -> IDENT (',' IDENT)*
    fn variable_list(&mut self) -> Result<NodeId> {
        let first = self.variable()?;
        if !self.at(&Token::Comma) {
            return Ok(first);
        }
        let mut names = vec![first];
        while self.at(&Token::Comma) {
            self.bump();
            names.push(self.variable()?);
        }
        let start = self.tree.span(first);
        self.node(NodeKind::Comma, None, start, &names)
    }
}
