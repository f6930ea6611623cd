//! Recursive-descent parser for policy documents.
//!
//! Grammar, weakest binding first:
//!
//! ```text
//! expr     := 'if' expr 'then' expr 'else' expr | or
//! or       := and ('||' and)*
//! and      := relation ('&&' relation)*
//! relation := add [relop add | 'has' attr | 'like' STR | 'is' path ['in' add]]
//! add      := mult (('+' | '-') mult)*
//! mult     := unary ('*' unary)*
//! unary    := ('!' | '-')* member
//! member   := primary ('.' IDENT ['(' args ')'] | '[' STR ']')*
//! primary  := INT | STR | 'true' | 'false' | entity | call | var
//!           | '(' expr ')' | '[' args ']' | '{' fields '}'
//! ```
//!
//! An identifier followed by `::` or `(` starts an entity literal or an
//! extension call; otherwise it must name a request variable. One token of
//! lookahead decides this, with no backtracking.

pub mod lexer;

pub use lexer::{Position, Token, TokenKind, tokenize};

use crate::ast::{
    Annotations, BinaryOp, Condition, ConditionKind, Effect, Node, Policy, Scope, UnaryOp, Var,
};
use crate::error::ParseError;
use crate::extensions;
use crate::types::{EntityType, EntityUid, Pattern};
use lexer::{string_contents, unescape};

type ParseResult<T> = Result<T, ParseError>;

/// Parse a document holding exactly one policy.
pub fn parse_policy(src: &str) -> ParseResult<Policy> {
    let mut parser = Parser::new(tokenize(src.as_bytes())?);
    let policy = parser.policy()?;
    parser.expect_eof()?;
    Ok(policy)
}

/// Parse a document of zero or more `;`-terminated policies.
pub fn parse_policies(src: &str) -> ParseResult<Vec<Policy>> {
    Parser::new(tokenize(src.as_bytes())?).policies()
}

/// Parse a standalone expression such as a condition body.
pub fn parse_expression(src: &str) -> ParseResult<Node> {
    let mut parser = Parser::new(tokenize(src.as_bytes())?);
    let node = parser.expr()?;
    parser.expect_eof()?;
    Ok(node)
}

/// Parse an entity literal such as `App::User::"alice"`.
pub fn parse_entity_uid(src: &str) -> ParseResult<EntityUid> {
    let mut parser = Parser::new(tokenize(src.as_bytes())?);
    let uid = parser.entity()?;
    parser.expect_eof()?;
    Ok(uid)
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    /// Wrap a token stream from [`tokenize`]. A missing EOF token is added.
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if !tokens.last().is_some_and(Token::is_eof) {
            let position = tokens.last().map(|t| t.position).unwrap_or_default();
            tokens.push(Token {
                kind: TokenKind::Eof,
                text: String::new(),
                position,
            });
        }
        Parser { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_n(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    /// True when the next token is the operator or keyword `text`.
    fn at(&self, text: &str) -> bool {
        let token = self.peek();
        matches!(token.kind, TokenKind::Operator | TokenKind::Reserved) && token.text == text
    }

    fn at_ident(&self, text: &str) -> bool {
        let token = self.peek();
        token.is_ident() && token.text == text
    }

    fn eat(&mut self, text: &str) -> bool {
        if self.at(text) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error_at(token: &Token, message: impl Into<String>) -> ParseError {
        ParseError::new(token.position, message)
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let token = self.peek();
        Parser::error_at(token, format!("expected {expected}, got {}", token.describe()))
    }

    fn expect(&mut self, text: &str) -> ParseResult<Token> {
        if self.at(text) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&format!("`{text}`")))
        }
    }

    fn expect_ident(&mut self) -> ParseResult<Token> {
        if self.peek().is_ident() {
            Ok(self.advance())
        } else {
            Err(self.unexpected("identifier"))
        }
    }

    fn expect_string(&mut self) -> ParseResult<String> {
        if !self.peek().is_string() {
            return Err(self.unexpected("string literal"));
        }
        let token = self.advance();
        string_contents(&token).map_err(|m| Parser::error_at(&token, m))
    }

    pub fn expect_eof(&self) -> ParseResult<()> {
        if self.peek().is_eof() {
            Ok(())
        } else {
            Err(self.unexpected("end of input"))
        }
    }

    pub fn policies(&mut self) -> ParseResult<Vec<Policy>> {
        let mut policies = Vec::new();
        while !self.peek().is_eof() {
            policies.push(self.policy()?);
        }
        Ok(policies)
    }

    pub fn policy(&mut self) -> ParseResult<Policy> {
        let position = self.peek().position;
        let annotations = self.annotations()?;

        let effect = match self.peek() {
            t if t.is_ident() && t.text == "permit" => Effect::Permit,
            t if t.is_ident() && t.text == "forbid" => Effect::Forbid,
            _ => return Err(self.unexpected("`permit` or `forbid`")),
        };
        self.advance();

        self.expect("(")?;
        let principal = self.scope(Var::Principal)?;
        self.expect(",")?;
        let action = self.scope(Var::Action)?;
        self.expect(",")?;
        let resource = self.scope(Var::Resource)?;
        self.expect(")")?;

        let mut conditions = Vec::new();
        loop {
            let kind = if self.at_ident("when") {
                ConditionKind::When
            } else if self.at_ident("unless") {
                ConditionKind::Unless
            } else {
                break;
            };
            self.advance();
            self.expect("{")?;
            let body = self.expr()?;
            self.expect("}")?;
            conditions.push(Condition { kind, body });
        }
        self.expect(";")?;

        Ok(Policy {
            effect,
            annotations,
            principal,
            action,
            resource,
            conditions,
            position,
        })
    }

    fn annotations(&mut self) -> ParseResult<Annotations> {
        let mut annotations = Annotations::default();
        while self.eat("@") {
            let key = match self.peek().kind {
                TokenKind::Ident | TokenKind::Reserved => self.advance(),
                _ => return Err(self.unexpected("annotation key")),
            };
            self.expect("(")?;
            let value = self.expect_string()?;
            self.expect(")")?;
            annotations
                .insert(key.text.as_str(), value)
                .map_err(|m| Parser::error_at(&key, m))?;
        }
        Ok(annotations)
    }

    fn scope(&mut self, var: Var) -> ParseResult<Scope> {
        let name = var.to_string();
        if !self.at_ident(&name) {
            return Err(self.unexpected(&format!("`{name}`")));
        }
        self.advance();

        if self.eat("==") {
            return Ok(Scope::Eq(self.entity()?));
        }
        if self.eat("in") {
            if self.at("[") {
                if var != Var::Action {
                    return Err(self.unexpected("entity literal"));
                }
                return Ok(Scope::InSet(self.entity_list()?));
            }
            return Ok(Scope::In(self.entity()?));
        }
        if self.at("is") {
            if var == Var::Action {
                return Err(Parser::error_at(
                    self.peek(),
                    "`is` is not allowed in the action scope",
                ));
            }
            self.advance();
            let ty = self.path()?;
            if self.eat("in") {
                return Ok(Scope::IsIn(ty, self.entity()?));
            }
            return Ok(Scope::Is(ty));
        }
        Ok(Scope::All)
    }

    fn entity_list(&mut self) -> ParseResult<Vec<EntityUid>> {
        self.expect("[")?;
        let mut uids = Vec::new();
        if !self.at("]") {
            loop {
                uids.push(self.entity()?);
                if !self.eat(",") {
                    break;
                }
            }
        }
        self.expect("]")?;
        Ok(uids)
    }

    /// `Ident ('::' Ident)*`
    fn path(&mut self) -> ParseResult<EntityType> {
        let mut segments = vec![self.expect_ident()?.text];
        while self.at("::") && self.peek_n(1).is_some_and(Token::is_ident) {
            self.advance();
            segments.push(self.advance().text);
        }
        Ok(EntityType::new(segments.join("::")))
    }

    /// `Ident ('::' Ident)* '::' STR`
    fn entity(&mut self) -> ParseResult<EntityUid> {
        let ty = self.path()?;
        self.expect("::")?;
        let id = self.expect_string()?;
        Ok(EntityUid::new(ty, id))
    }

    pub fn expr(&mut self) -> ParseResult<Node> {
        if self.eat("if") {
            let cond = self.expr()?;
            self.expect("then")?;
            let then = self.expr()?;
            self.expect("else")?;
            let otherwise = self.expr()?;
            return Ok(Node::IfThenElse {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            });
        }
        self.or()
    }

    fn or(&mut self) -> ParseResult<Node> {
        let mut left = self.and()?;
        while self.eat("||") {
            left = left.or(self.and()?);
        }
        Ok(left)
    }

    fn and(&mut self) -> ParseResult<Node> {
        let mut left = self.relation()?;
        while self.eat("&&") {
            left = left.and(self.relation()?);
        }
        Ok(left)
    }

    fn relation(&mut self) -> ParseResult<Node> {
        let left = self.add()?;

        const RELOPS: [(&str, BinaryOp); 7] = [
            ("<", BinaryOp::Less),
            ("<=", BinaryOp::LessEq),
            (">=", BinaryOp::GreaterEq),
            (">", BinaryOp::Greater),
            ("!=", BinaryOp::NotEq),
            ("==", BinaryOp::Eq),
            ("in", BinaryOp::In),
        ];
        if let Some((_, op)) = RELOPS.iter().find(|(text, _)| self.at(text)) {
            self.advance();
            return Ok(Node::binary(*op, left, self.add()?));
        }

        if self.eat("has") {
            let token = self.peek().clone();
            let attr = match token.kind {
                TokenKind::Ident | TokenKind::Reserved => {
                    self.advance();
                    token.text
                }
                TokenKind::String => self.expect_string()?,
                _ => return Err(self.unexpected("attribute name")),
            };
            return Ok(left.has(attr));
        }

        if self.eat("like") {
            if !self.peek().is_string() {
                return Err(self.unexpected("pattern string"));
            }
            let token = self.advance();
            let raw = &token.text[1..token.text.len() - 1];
            let chars = unescape(raw, true).map_err(|m| Parser::error_at(&token, m))?;
            return Ok(Node::Like {
                arg: Box::new(left),
                pattern: Pattern::from_decoded(&chars),
            });
        }

        if self.eat("is") {
            let ty = self.path()?;
            if self.eat("in") {
                return Ok(left.is_in(ty, self.add()?));
            }
            return Ok(left.is(ty));
        }

        Ok(left)
    }

    fn add(&mut self) -> ParseResult<Node> {
        let mut left = self.mult()?;
        loop {
            let op = if self.eat("+") {
                BinaryOp::Add
            } else if self.eat("-") {
                BinaryOp::Sub
            } else {
                return Ok(left);
            };
            left = Node::binary(op, left, self.mult()?);
        }
    }

    fn mult(&mut self) -> ParseResult<Node> {
        let mut left = self.unary()?;
        while self.eat("*") {
            left = Node::binary(BinaryOp::Mul, left, self.unary()?);
        }
        Ok(left)
    }

    fn unary(&mut self) -> ParseResult<Node> {
        let mut ops = Vec::new();
        loop {
            if self.eat("!") {
                ops.push(UnaryOp::Not);
            } else if self.eat("-") {
                ops.push(UnaryOp::Negate);
            } else {
                break;
            }
        }

        // Fold `-` into an integer literal so that i64::MIN is expressible.
        let mut node = if ops.last() == Some(&UnaryOp::Negate) && self.peek().is_int() {
            ops.pop();
            let token = self.advance();
            let literal = format!("-{}", token.text);
            let n: i64 = literal.parse().map_err(|_| {
                Parser::error_at(&token, format!("integer literal `{literal}` is out of range"))
            })?;
            Node::value(n)
        } else {
            self.member()?
        };

        for op in ops.into_iter().rev() {
            node = Node::unary(op, node);
        }
        Ok(node)
    }

    fn member(&mut self) -> ParseResult<Node> {
        let mut node = self.primary()?;
        loop {
            if self.eat(".") {
                let name = self.expect_ident()?;
                if self.at("(") {
                    let args = self.call_args()?;
                    node = self.method_call(node, &name, args)?;
                } else {
                    node = node.access(name.text);
                }
            } else if self.eat("[") {
                let attr = self.expect_string()?;
                self.expect("]")?;
                node = node.access(attr);
            } else {
                return Ok(node);
            }
        }
    }

    fn method_call(&self, receiver: Node, name: &Token, mut args: Vec<Node>) -> ParseResult<Node> {
        let method = name.text.as_str();
        if method == "isEmpty" {
            if !args.is_empty() {
                return Err(arity_error(name, 0, args.len()));
            }
            return Ok(Node::unary(UnaryOp::IsEmpty, receiver));
        }
        if let Some(op) = BinaryOp::from_method(method) {
            if args.len() != 1 {
                return Err(arity_error(name, 1, args.len()));
            }
            let arg = args.remove(0);
            return Ok(Node::binary(op, receiver, arg));
        }
        match extensions::lookup(method) {
            Some(ext) if ext.is_method => {
                if args.len() + 1 != ext.arity {
                    return Err(arity_error(name, ext.arity - 1, args.len()));
                }
                args.insert(0, receiver);
                Ok(Node::ExtensionCall {
                    name: method.to_string(),
                    args,
                })
            }
            _ => Err(Parser::error_at(name, format!("`{method}` is not a method"))),
        }
    }

    fn call_args(&mut self) -> ParseResult<Vec<Node>> {
        self.expect("(")?;
        let args = self.expr_list(")")?;
        self.expect(")")?;
        Ok(args)
    }

    /// Comma-separated expressions up to (not including) `close`.
    fn expr_list(&mut self, close: &str) -> ParseResult<Vec<Node>> {
        let mut items = Vec::new();
        if self.at(close) {
            return Ok(items);
        }
        loop {
            items.push(self.expr()?);
            if !self.eat(",") {
                return Ok(items);
            }
        }
    }

    fn primary(&mut self) -> ParseResult<Node> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Int => {
                self.advance();
                let n: i64 = token.text.parse().map_err(|_| {
                    Parser::error_at(
                        &token,
                        format!("integer literal `{}` is out of range", token.text),
                    )
                })?;
                Ok(Node::value(n))
            }
            TokenKind::String => Ok(Node::value(self.expect_string()?)),
            TokenKind::Reserved if token.text == "true" || token.text == "false" => {
                self.advance();
                Ok(Node::value(token.text == "true"))
            }
            TokenKind::Ident => {
                let next = self.peek_n(1);
                let qualified = next.is_some_and(|t| {
                    t.kind == TokenKind::Operator && (t.text == "::" || t.text == "(")
                });
                if qualified {
                    self.entity_or_call()
                } else {
                    self.advance();
                    token.text.parse::<Var>().map(Node::var).map_err(|_| {
                        Parser::error_at(&token, format!("unknown variable `{}`", token.text))
                    })
                }
            }
            TokenKind::Operator if token.text == "(" => {
                self.advance();
                let node = self.expr()?;
                self.expect(")")?;
                Ok(node)
            }
            TokenKind::Operator if token.text == "[" => {
                self.advance();
                let items = self.expr_list("]")?;
                self.expect("]")?;
                Ok(Node::Set(items))
            }
            TokenKind::Operator if token.text == "{" => {
                self.advance();
                let fields = self.record_fields()?;
                self.expect("}")?;
                Ok(Node::Record(fields))
            }
            _ => Err(self.unexpected("expression")),
        }
    }

    /// Consume `Ident ('::' Ident)*` and then either `'::' STR` (an entity
    /// literal) or an argument list (an extension function call).
    fn entity_or_call(&mut self) -> ParseResult<Node> {
        let start = self.peek().clone();
        let ty = self.path()?;
        if self.at("::") {
            self.advance();
            let id = self.expect_string()?;
            return Ok(Node::value(EntityUid::new(ty, id)));
        }
        if !self.at("(") {
            return Err(self.unexpected("`::` or `(`"));
        }

        let name = ty.as_str();
        let args = self.call_args()?;
        match extensions::lookup(name) {
            Some(ext) if !ext.is_method => {
                if args.len() != ext.arity {
                    return Err(arity_error(&start, ext.arity, args.len()));
                }
                Ok(Node::ExtensionCall {
                    name: name.to_string(),
                    args,
                })
            }
            Some(_) => Err(Parser::error_at(
                &start,
                format!("`{name}` is a method, not a function"),
            )),
            None => Err(Parser::error_at(&start, format!("`{name}` is not a function"))),
        }
    }

    fn record_fields(&mut self) -> ParseResult<Vec<(String, Node)>> {
        let mut fields = Vec::new();
        if self.at("}") {
            return Ok(fields);
        }
        loop {
            let key = match self.peek().kind {
                TokenKind::Ident | TokenKind::Reserved => self.advance().text,
                TokenKind::String => self.expect_string()?,
                _ => return Err(self.unexpected("record key")),
            };
            self.expect(":")?;
            fields.push((key, self.expr()?));
            if !self.eat(",") {
                return Ok(fields);
            }
        }
    }
}

fn arity_error(name: &Token, expected: usize, got: usize) -> ParseError {
    let plural = if expected == 1 { "" } else { "s" };
    Parser::error_at(
        name,
        format!(
            "`{}` expects {expected} argument{plural}, got {got}",
            name.text
        ),
    )
}

impl std::str::FromStr for Policy {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_policy(s)
    }
}
