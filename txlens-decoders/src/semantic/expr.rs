//! The transformation expression language.
//!
//! Expressions are short arithmetic and formatting snippets attached to
//! decoded parameters, e.g. `wad / 10**18` or
//! `decode_call(__contract__, data)`. They are parsed with a hand-written
//! lexer and evaluated against an explicit variable context plus a fixed set
//! of helpers. Nothing else resolves: no assignments, no free function
//! calls, no ambient state.

use crate::{
    proxies::ProxyMap,
    semantic::context::{get_badge, transform_parameter, TransformationContext},
};
use futures_util::future::BoxFuture;
use thiserror::Error;
use txlens_core::{
    abi::decode_function_parameters,
    decoded::{AddressInfo, Argument, DecodedTransactionMetadata, InlineCall, Value},
    semantics::FunctionSemantics,
    types::U256,
    utils::{parse_address, strip_0x, u256_to_f64},
};
use txlens_semantics::SemanticsRepository;

#[derive(Debug, Error)]
pub enum ExprError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("unknown identifier `{0}`")]
    UnknownIdentifier(String),
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
    #[error("type error: {0}")]
    Type(String),
    #[error("division by zero")]
    DivisionByZero,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

#[derive(Clone, Debug, PartialEq)]
enum Expr {
    Number(f64),
    Str(String),
    Ident(String),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
    Attr(Box<Expr>, String),
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Percent,
    LParen,
    RParen,
    Comma,
    Dot,
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = vec![];
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                if chars.peek() == Some(&'*') {
                    chars.next();
                    tokens.push(Token::StarStar);
                } else {
                    tokens.push(Token::Star);
                }
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '%' => {
                chars.next();
                tokens.push(Token::Percent);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '.' => {
                chars.next();
                tokens.push(Token::Dot);
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut literal = String::new();
                loop {
                    match chars.next() {
                        Some(c) if c == quote => break,
                        Some(c) => literal.push(c),
                        None => return Err(ExprError::Parse("unterminated string".to_string())),
                    }
                }
                tokens.push(Token::Str(literal));
            }
            '0'..='9' => {
                let mut literal = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() || c == '.' {
                        // `1.foo` is not a thing here; dots after digits are
                        // always decimal points
                        literal.push(c);
                        chars.next();
                    } else {
                        break
                    }
                }
                let number = literal
                    .parse::<f64>()
                    .map_err(|_| ExprError::Parse(format!("bad number `{literal}`")))?;
                tokens.push(Token::Number(number));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut identifier = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        identifier.push(c);
                        chars.next();
                    } else {
                        break
                    }
                }
                tokens.push(Token::Ident(identifier));
            }
            other => return Err(ExprError::Parse(format!("unexpected character `{other}`"))),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn expect(&mut self, token: Token) -> Result<(), ExprError> {
        match self.next() {
            Some(found) if found == token => Ok(()),
            found => Err(ExprError::Parse(format!("expected {token:?}, found {found:?}"))),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_term()?;
        while let Some(op) = match self.peek() {
            Some(Token::Plus) => Some(BinOp::Add),
            Some(Token::Minus) => Some(BinOp::Sub),
            _ => None,
        } {
            self.next();
            let right = self.parse_term()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_power()?;
        while let Some(op) = match self.peek() {
            Some(Token::Star) => Some(BinOp::Mul),
            Some(Token::Slash) => Some(BinOp::Div),
            Some(Token::Percent) => Some(BinOp::Mod),
            _ => None,
        } {
            self.next();
            let right = self.parse_power()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_power(&mut self) -> Result<Expr, ExprError> {
        let base = self.parse_unary()?;
        if self.peek() == Some(&Token::StarStar) {
            self.next();
            // exponentiation is right associative
            let exponent = self.parse_power()?;
            return Ok(Expr::Binary(BinOp::Pow, Box::new(base), Box::new(exponent)))
        }
        Ok(base)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        if self.peek() == Some(&Token::Minus) {
            self.next();
            return Ok(Expr::Neg(Box::new(self.parse_unary()?)))
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ExprError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.next();
                    match self.next() {
                        Some(Token::Ident(attribute)) => {
                            expr = Expr::Attr(Box::new(expr), attribute);
                        }
                        found => {
                            return Err(ExprError::Parse(format!(
                                "expected attribute name, found {found:?}"
                            )))
                        }
                    }
                }
                Some(Token::LParen) => {
                    // only bare identifiers are callable, and only the
                    // registered helpers resolve
                    let Expr::Ident(name) = expr else {
                        return Err(ExprError::Parse("only helpers are callable".to_string()))
                    };
                    self.next();
                    let mut args = vec![];
                    if self.peek() != Some(&Token::RParen) {
                        loop {
                            args.push(self.parse_expr()?);
                            if self.peek() == Some(&Token::Comma) {
                                self.next();
                            } else {
                                break
                            }
                        }
                    }
                    self.expect(Token::RParen)?;
                    expr = Expr::Call(name, args);
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        match self.next() {
            Some(Token::Number(number)) => Ok(Expr::Number(number)),
            Some(Token::Str(literal)) => Ok(Expr::Str(literal)),
            Some(Token::Ident(identifier)) => Ok(Expr::Ident(identifier)),
            Some(Token::LParen) => {
                let expr = self.parse_expr()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            found => Err(ExprError::Parse(format!("unexpected token {found:?}"))),
        }
    }
}

fn parse(input: &str) -> Result<Expr, ExprError> {
    let mut parser = Parser { tokens: tokenize(input)?, position: 0 };
    let expr = parser.parse_expr()?;
    if parser.peek().is_some() {
        return Err(ExprError::Parse("trailing input".to_string()))
    }
    Ok(expr)
}

fn to_number(value: &Value) -> Result<f64, ExprError> {
    match value {
        Value::Uint(number) => Ok(u256_to_f64(*number)),
        Value::Int(number) => Ok(number.to_f64()),
        Value::Float(number) => Ok(*number),
        Value::Bool(flag) => Ok(*flag as u8 as f64),
        Value::Hex(raw) | Value::String(raw) => txlens_core::utils::parse_u256(raw)
            .map(u256_to_f64)
            .ok_or_else(|| ExprError::Type(format!("`{raw}` is not numeric"))),
        other => Err(ExprError::Type(format!("{other:?} is not numeric"))),
    }
}

/// Evaluates transformation expressions against one call's context.
pub struct Evaluator<'a> {
    pub repository: &'a SemanticsRepository,
    pub proxies: Option<&'a ProxyMap>,
    pub chain_id: &'a str,
    pub transaction: &'a DecodedTransactionMetadata,
}

impl<'a> Evaluator<'a> {
    pub async fn evaluate(
        &self,
        expression: &str,
        ctx: &TransformationContext,
    ) -> Result<Value, ExprError> {
        let expr = parse(expression)?;
        self.eval(&expr, ctx).await
    }

    fn eval<'b>(
        &'b self,
        expr: &'b Expr,
        ctx: &'b TransformationContext,
    ) -> BoxFuture<'b, Result<Value, ExprError>> {
        Box::pin(async move {
            match expr {
                Expr::Number(number) => Ok(Value::Float(*number)),
                Expr::Str(literal) => Ok(Value::String(literal.clone())),
                Expr::Ident(identifier) => ctx
                    .get(identifier)
                    .cloned()
                    .ok_or_else(|| ExprError::UnknownIdentifier(identifier.clone())),
                Expr::Neg(inner) => {
                    let value = self.eval(inner, ctx).await?;
                    Ok(Value::Float(-to_number(&value)?))
                }
                Expr::Binary(op, left, right) => {
                    let left = self.eval(left, ctx).await?;
                    let right = self.eval(right, ctx).await?;
                    self.eval_binary(*op, left, right)
                }
                Expr::Attr(target, attribute) => {
                    let target = self.eval(target, ctx).await?;
                    eval_attribute(&target, attribute)
                }
                Expr::Call(name, args) => {
                    let mut values = Vec::with_capacity(args.len());
                    for arg in args {
                        values.push(self.eval(arg, ctx).await?);
                    }
                    self.call_helper(name, values, ctx).await
                }
            }
        })
    }

    fn eval_binary(&self, op: BinOp, left: Value, right: Value) -> Result<Value, ExprError> {
        // `+` doubles as string concatenation, as transformations use it for
        // labels
        if op == BinOp::Add {
            if let (Value::String(left), Value::String(right)) = (&left, &right) {
                return Ok(Value::String(format!("{left}{right}")))
            }
        }

        let left = to_number(&left)?;
        let right = to_number(&right)?;
        let result = match op {
            BinOp::Add => left + right,
            BinOp::Sub => left - right,
            BinOp::Mul => left * right,
            BinOp::Div => {
                if right == 0.0 {
                    return Err(ExprError::DivisionByZero)
                }
                left / right
            }
            BinOp::Mod => {
                if right == 0.0 {
                    return Err(ExprError::DivisionByZero)
                }
                left % right
            }
            // integer exponents stay exact; 10**18 must not pick up float fuzz
            BinOp::Pow if right.fract() == 0.0 && right.abs() <= i32::MAX as f64 => {
                left.powi(right as i32)
            }
            BinOp::Pow => left.powf(right),
        };
        Ok(Value::Float(result))
    }

    async fn call_helper(
        &self,
        name: &str,
        mut args: Vec<Value>,
        ctx: &TransformationContext,
    ) -> Result<Value, ExprError> {
        match (name, args.len()) {
            ("token_decimals", 1) => {
                let address = args[0]
                    .as_address_string()
                    .and_then(|address| parse_address(&address))
                    .ok_or_else(|| ExprError::Type("token_decimals expects an address".into()))?;
                let token =
                    self.repository.get_token_data(self.chain_id, address, self.proxies).await;
                Ok(Value::Uint(U256::from(token.decimals)))
            }
            ("decode_nft", 1) => Ok(decode_nft(&ctx.contract, &args.remove(0))),
            ("string_from_bytes", 1) => Ok(Value::String(string_from_bytes(&args.remove(0)))),
            ("decode_call", 2) => {
                let data = args.pop().expect("two arguments");
                let contract = args.pop().expect("two arguments");
                self.decode_call(contract, data).await
            }
            (other, _) => Err(ExprError::UnknownFunction(other.to_string())),
        }
    }

    /// Decodes a `bytes` parameter that itself encodes a function call, one
    /// level of nested transformations included.
    async fn decode_call(&self, contract: Value, data: Value) -> Result<Value, ExprError> {
        let data = match &data {
            Value::Hex(raw) | Value::String(raw) => raw.clone(),
            other => return Err(ExprError::Type(format!("{other:?} is not call data"))),
        };
        if data.len() <= 2 {
            return Ok(Value::None)
        }

        let contract_hex = contract
            .as_address_string()
            .ok_or_else(|| ExprError::Type("decode_call expects an address".into()))?;
        let contract_address = parse_address(&contract_hex)
            .ok_or_else(|| ExprError::Type("decode_call expects an address".into()))?;

        let function_signature: String = data.chars().take(10).collect();

        let contract_name =
            self.repository.get_address_label(self.chain_id, Some(contract_address), self.proxies).await;
        let contract_info = AddressInfo::new(contract_hex.clone(), contract_name)
            .with_badge(get_badge(Some(&contract_hex), self.transaction));

        let function_abi = if self
            .repository
            .check_is_contract(self.chain_id, contract_address)
            .await
        {
            self.repository
                .get_function_abi(self.chain_id, contract_address, &function_signature)
                .await
        } else {
            None
        };

        let Some(function_abi) = function_abi else {
            return Ok(Value::Call(Box::new(InlineCall {
                contract: contract_info,
                function_name: function_signature,
                arguments: vec![Argument::new(
                    "call_data",
                    "bytes",
                    Value::Hex(format!("0x{}", &strip_0x(&data)[8.min(strip_0x(&data).len())..])),
                )],
            })))
        };

        // decode inputs only; embedded calls carry no return data
        let stripped = FunctionSemantics {
            signature: function_abi.signature.clone(),
            name: function_abi.name.clone(),
            inputs: function_abi.inputs.clone(),
            outputs: vec![],
        };
        let (mut arguments, _) =
            decode_function_parameters(&data, "0x", Some(&stripped), true, true);

        let transformations = self
            .repository
            .get_transformations(self.chain_id, contract_address, &function_signature)
            .await
            .unwrap_or_default();
        let nested_ctx = TransformationContext::new(contract_hex, &arguments, &[]);
        for (i, argument) in arguments.iter_mut().enumerate() {
            transform_parameter(self, argument, format!("__input{i}__"), &transformations, &nested_ctx)
                .await;
        }

        Ok(Value::Call(Box::new(InlineCall {
            contract: contract_info,
            function_name: stripped.name,
            arguments,
        })))
    }
}

fn eval_attribute(target: &Value, attribute: &str) -> Result<Value, ExprError> {
    match (target, attribute) {
        (Value::Address(info), "address") => {
            Ok(Value::Hex(info.address.clone().unwrap_or_default()))
        }
        (Value::Address(info), "name") => Ok(Value::String(info.name.clone())),
        (Value::Address(info), "badge") => Ok(info
            .badge
            .map(|badge| Value::String(format!("{badge:?}").to_lowercase()))
            .unwrap_or(Value::None)),
        (Value::Nft { address, .. }, "address") => Ok(Value::Hex(address.clone())),
        (Value::Nft { name, .. }, "name") => Ok(Value::String(name.clone())),
        (other, attribute) => {
            Err(ExprError::Type(format!("{other:?} has no attribute `{attribute}`")))
        }
    }
}

/// Formats an NFT reference the way block explorers link them.
pub fn decode_nft(contract: &str, token_id: &Value) -> Value {
    let id = token_id.display_string();
    let name = if id.len() > 8 {
        format!("NFT {}...{}", &id[..6], &id[id.len() - 2..])
    } else {
        format!("NFT {id}")
    };
    Value::Nft { address: format!("{contract}?a={id}#inventory"), name }
}

/// Best-effort UTF-8 reading of a hex payload; NULs are stripped and
/// undecodable input becomes `???`.
pub fn string_from_bytes(value: &Value) -> String {
    let raw = match value {
        Value::Hex(raw) | Value::String(raw) => raw,
        _ => return "???".to_string(),
    };
    match hex::decode(strip_0x(raw)) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).replace('\0', ""),
        Err(_) => "???".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_corpus_shapes() {
        assert!(parse("wad / 10**18").is_ok());
        assert!(parse("__input2__ / 10**token_decimals(__contract__)").is_ok());
        assert!(parse("decode_call(__contract__, data)").is_ok());
        assert!(parse("decode_nft(__input2__)").is_ok());
        assert!(parse("-wad * (2 + 3.5)").is_ok());
        assert!(parse("__input0__.name").is_ok());
    }

    #[test]
    fn rejects_everything_else() {
        assert!(parse("import os").is_err());
        assert!(parse("wad; wad").is_err());
        assert!(parse("(lambda: 1)()").is_err());
        assert!(parse("a[0]").is_err());
        assert!(parse("x = 1").is_err());
    }

    #[test]
    fn exponentiation_is_right_associative() {
        let expr = parse("2**3**2").unwrap();
        match expr {
            Expr::Binary(BinOp::Pow, base, exponent) => {
                assert_eq!(*base, Expr::Number(2.0));
                assert!(matches!(*exponent, Expr::Binary(BinOp::Pow, _, _)));
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn numbers_read_from_every_value_shape() {
        assert_eq!(to_number(&Value::Uint(U256::from(5u64))).unwrap(), 5.0);
        assert_eq!(to_number(&Value::Float(2.5)).unwrap(), 2.5);
        assert_eq!(to_number(&Value::Hex("0x0a".to_string())).unwrap(), 10.0);
        assert!(to_number(&Value::None).is_err());
    }

    #[test]
    fn nft_references_shorten_long_ids() {
        let value = decode_nft("0xc0ffee", &Value::Uint(U256::from(123456789u64)));
        match value {
            Value::Nft { address, name } => {
                assert_eq!(name, "NFT 123456...89");
                assert_eq!(address, "0xc0ffee?a=123456789#inventory");
            }
            other => panic!("expected nft, got {other:?}"),
        }

        match decode_nft("0xc0ffee", &Value::Uint(U256::from(42u64))) {
            Value::Nft { name, .. } => assert_eq!(name, "NFT 42"),
            other => panic!("expected nft, got {other:?}"),
        }
    }

    #[test]
    fn strings_from_bytes_strip_nuls() {
        let value = Value::Hex(format!("0x{}00", hex::encode("DAI")));
        assert_eq!(string_from_bytes(&value), "DAI");
        assert_eq!(string_from_bytes(&Value::Hex("0xzz".to_string())), "???");
    }
}
