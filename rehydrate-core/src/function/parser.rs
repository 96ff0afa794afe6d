//! Recursive-descent parser for function expressions.
//!
//! Accepted forms:
//!
//! ```text
//! (a, b) => expr        a => expr        () => { return expr; }
//! function (a) { ... }  function name(a) { ... }
//! ```
//!
//! Block bodies hold `const`/`let`/`var` bindings, expression statements and
//! `return`.

use super::ast::{BinaryOp, Body, Expr, FunctionExpr, Literal, LogicalOp, Statement, UnaryOp};
use super::lexer::{tokenize, Token};
use crate::error::{Error, Result};

const BINDING_KEYWORDS: [&str; 3] = ["const", "let", "var"];

/// Tallest expression tree a function may contain. Parser recursion is held
/// to the same limit, so deeply nested source fails to compile instead of
/// exhausting the stack.
const MAX_NESTING: usize = 128;

/// Parse `source` as a single function expression.
pub fn parse_function(source: &str) -> Result<FunctionExpr> {
    let mut parser = Parser {
        tokens: tokenize(source)?,
        position: 0,
        nesting: 0,
    };

    // A wrapping pair of parentheses is allowed: `(function () { ... })`.
    let function = if parser.peek_punct("(") && !parser.looks_like_arrow() {
        parser.advance();
        let function = parser.function()?;
        parser.expect_punct(")")?;
        function
    } else {
        parser.function()?
    };

    parser.eat_punct(";");
    if let Some(token) = parser.peek() {
        return Err(Error::Compilation(format!(
            "unexpected {} after the function body",
            token.describe()
        )));
    }
    Ok(function)
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
    nesting: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.position + offset)
    }

    fn peek_punct(&self, punct: &str) -> bool {
        self.peek().is_some_and(|token| token.is_punct(punct))
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        self.peek().is_some_and(|token| token.is_keyword(keyword))
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn eat_punct(&mut self, punct: &str) -> bool {
        if self.peek_punct(punct) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, punct: &str) -> Result<()> {
        if self.eat_punct(punct) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{punct}'")))
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.peek() {
            Some(Token::Ident(name)) => {
                let name = name.clone();
                self.position += 1;
                Ok(name)
            }
            _ => Err(self.unexpected("an identifier")),
        }
    }

    fn unexpected(&self, expected: &str) -> Error {
        let found = self
            .peek()
            .map_or_else(|| "end of input".to_string(), Token::describe);
        Error::Compilation(format!("expected {expected}, found {found}"))
    }

    /// Whether the tokens at the cursor open a parenthesized arrow parameter
    /// list: `(` ident (`,` ident)* `)` `=>`.
    fn looks_like_arrow(&self) -> bool {
        let mut offset = 1;
        loop {
            match self.peek_at(offset) {
                Some(Token::Punct(")")) => {
                    return self.peek_at(offset + 1).is_some_and(|t| t.is_punct("=>"));
                }
                Some(Token::Ident(_)) | Some(Token::Punct(",")) => offset += 1,
                _ => return false,
            }
        }
    }

    fn function(&mut self) -> Result<FunctionExpr> {
        if self.peek_keyword("function") {
            self.advance();
            let name = match self.peek() {
                Some(Token::Ident(_)) => Some(self.expect_ident()?),
                _ => None,
            };
            let params = self.parameters()?;
            let body = Body::Block(self.block()?);
            return Ok(FunctionExpr { name, params, body });
        }

        let params = if self.peek_punct("(") {
            self.parameters()?
        } else {
            vec![self.expect_ident()?]
        };
        self.expect_punct("=>")?;

        let body = if self.peek_punct("{") {
            Body::Block(self.block()?)
        } else {
            Body::Expression(self.expression()?.expr)
        };
        Ok(FunctionExpr {
            name: None,
            params,
            body,
        })
    }

    fn parameters(&mut self) -> Result<Vec<String>> {
        self.expect_punct("(")?;
        let mut params = Vec::new();
        while !self.eat_punct(")") {
            if !params.is_empty() {
                self.expect_punct(",")?;
            }
            params.push(self.expect_ident()?);
        }
        Ok(params)
    }

    fn block(&mut self) -> Result<Vec<Statement>> {
        self.expect_punct("{")?;
        let mut statements = Vec::new();
        while !self.eat_punct("}") {
            if self.peek().is_none() {
                return Err(self.unexpected("'}'"));
            }
            if self.eat_punct(";") {
                continue;
            }
            statements.push(self.statement()?);
        }
        Ok(statements)
    }

    fn statement(&mut self) -> Result<Statement> {
        let statement = if self.peek_keyword("return") {
            self.advance();
            if self.peek_punct(";") || self.peek_punct("}") {
                Statement::Return(None)
            } else {
                Statement::Return(Some(self.expression()?.expr))
            }
        } else if BINDING_KEYWORDS.iter().any(|keyword| self.peek_keyword(keyword)) {
            self.advance();
            let name = self.expect_ident()?;
            let value = if self.eat_punct("=") {
                self.expression()?.expr
            } else {
                Expr::Literal(Literal::Undefined)
            };
            Statement::Binding { name, value }
        } else {
            Statement::Expression(self.expression()?.expr)
        };
        self.eat_punct(";");
        Ok(statement)
    }

    /// Run `parse` one recursion level deeper.
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.nesting >= MAX_NESTING {
            return Err(nested_too_deeply());
        }
        self.nesting += 1;
        let result = parse(self);
        self.nesting -= 1;
        result
    }

    fn expression(&mut self) -> Result<Parsed> {
        self.nested(Self::conditional)
    }

    fn conditional(&mut self) -> Result<Parsed> {
        let test = self.coalesce()?;
        if !self.eat_punct("?") {
            return Ok(test);
        }
        let consequent = self.expression()?;
        self.expect_punct(":")?;
        let alternate = self.expression()?;
        let height = height_over([test.height, consequent.height, alternate.height])?;
        Ok(Parsed {
            expr: Expr::Conditional {
                test: Box::new(test.expr),
                consequent: Box::new(consequent.expr),
                alternate: Box::new(alternate.expr),
            },
            height,
        })
    }

    fn coalesce(&mut self) -> Result<Parsed> {
        let mut left = self.logical_or()?;
        while self.eat_punct("??") {
            let right = self.logical_or()?;
            left = logical(LogicalOp::Coalesce, left, right)?;
        }
        Ok(left)
    }

    fn logical_or(&mut self) -> Result<Parsed> {
        let mut left = self.logical_and()?;
        while self.eat_punct("||") {
            let right = self.logical_and()?;
            left = logical(LogicalOp::Or, left, right)?;
        }
        Ok(left)
    }

    fn logical_and(&mut self) -> Result<Parsed> {
        let mut left = self.binary(0)?;
        while self.eat_punct("&&") {
            let right = self.binary(0)?;
            left = logical(LogicalOp::And, left, right)?;
        }
        Ok(left)
    }

    /// Left-associative binary operators, loosest level first.
    fn binary(&mut self, level: usize) -> Result<Parsed> {
        const LEVELS: [&[&str]; 4] = [
            &["===", "!==", "==", "!="],
            &["<", "<=", ">", ">="],
            &["+", "-"],
            &["*", "/", "%"],
        ];

        let Some(operators) = LEVELS.get(level) else {
            return self.unary();
        };

        let mut left = self.binary(level + 1)?;
        loop {
            let op = match self.peek() {
                Some(Token::Punct(punct)) if operators.contains(punct) => BinaryOp::from_punct(punct),
                _ => None,
            };
            let Some(op) = op else {
                return Ok(left);
            };
            self.advance();
            let right = self.binary(level + 1)?;
            let height = height_over([left.height, right.height])?;
            left = Parsed {
                expr: Expr::Binary {
                    op,
                    left: Box::new(left.expr),
                    right: Box::new(right.expr),
                },
                height,
            };
        }
    }

    fn unary(&mut self) -> Result<Parsed> {
        let op = if self.eat_punct("!") {
            UnaryOp::Not
        } else if self.eat_punct("-") {
            UnaryOp::Neg
        } else if self.eat_punct("+") {
            UnaryOp::Plus
        } else if self.peek_keyword("typeof") {
            self.advance();
            UnaryOp::TypeOf
        } else {
            return self.postfix();
        };

        let operand = self.nested(Self::unary)?;
        Ok(Parsed {
            height: height_over([operand.height])?,
            expr: Expr::Unary {
                op,
                operand: Box::new(operand.expr),
            },
        })
    }

    fn postfix(&mut self) -> Result<Parsed> {
        let mut parsed = self.primary()?;
        loop {
            parsed = if self.eat_punct(".") {
                let property = self.expect_ident()?;
                Parsed {
                    height: height_over([parsed.height])?,
                    expr: Expr::Member {
                        object: Box::new(parsed.expr),
                        property,
                    },
                }
            } else if self.eat_punct("[") {
                let index = self.expression()?;
                self.expect_punct("]")?;
                Parsed {
                    height: height_over([parsed.height, index.height])?,
                    expr: Expr::Index {
                        object: Box::new(parsed.expr),
                        index: Box::new(index.expr),
                    },
                }
            } else if self.eat_punct("(") {
                let (arguments, arguments_height) = self.list(")")?;
                Parsed {
                    height: height_over([parsed.height, arguments_height])?,
                    expr: Expr::Call {
                        callee: Box::new(parsed.expr),
                        arguments,
                    },
                }
            } else {
                return Ok(parsed);
            };
        }
    }

    /// Comma-separated expressions up to `close`, with the tallest item's
    /// height. Trailing commas are allowed.
    fn list(&mut self, close: &str) -> Result<(Vec<Expr>, usize)> {
        let mut items = Vec::new();
        let mut height = 0;
        while !self.eat_punct(close) {
            let item = self.expression()?;
            height = height.max(item.height);
            items.push(item.expr);
            if !self.eat_punct(",") {
                self.expect_punct(close)?;
                break;
            }
        }
        Ok((items, height))
    }

    fn primary(&mut self) -> Result<Parsed> {
        let Some(token) = self.advance() else {
            return Err(self.unexpected("an expression"));
        };

        let expr = match token {
            Token::Number(n) => Expr::Literal(Literal::Number(n)),
            Token::Str(s) => Expr::Literal(Literal::String(s)),
            Token::Ident(name) => match name.as_str() {
                "true" => Expr::Literal(Literal::Bool(true)),
                "false" => Expr::Literal(Literal::Bool(false)),
                "null" => Expr::Literal(Literal::Null),
                "undefined" => Expr::Literal(Literal::Undefined),
                "NaN" => Expr::Literal(Literal::Number(f64::NAN)),
                "Infinity" => Expr::Literal(Literal::Number(f64::INFINITY)),
                _ => Expr::Identifier(name),
            },
            Token::Punct("(") => {
                let parsed = self.expression()?;
                self.expect_punct(")")?;
                return Ok(parsed);
            }
            Token::Punct("[") => {
                let (items, height) = self.list("]")?;
                return Ok(Parsed {
                    expr: Expr::Array(items),
                    height: height_over([height])?,
                });
            }
            Token::Punct("{") => return self.object(),
            other => {
                self.position -= 1;
                return Err(Error::Compilation(format!(
                    "expected an expression, found {}",
                    other.describe()
                )));
            }
        };
        Ok(Parsed { expr, height: 1 })
    }

    fn object(&mut self) -> Result<Parsed> {
        let mut entries = Vec::new();
        let mut height = 0;
        while !self.eat_punct("}") {
            let key = match self.advance() {
                Some(Token::Ident(name)) | Some(Token::Str(name)) => name,
                Some(Token::Number(n)) => n.to_string(),
                _ => return Err(Error::Compilation("expected a property name".to_string())),
            };
            let value = if self.eat_punct(":") {
                let value = self.expression()?;
                height = height.max(value.height);
                value.expr
            } else {
                height = height.max(1);
                Expr::Identifier(key.clone())
            };
            entries.push((key, value));
            if !self.eat_punct(",") {
                self.expect_punct("}")?;
                break;
            }
        }
        Ok(Parsed {
            expr: Expr::Object(entries),
            height: height_over([height])?,
        })
    }
}

/// An expression with the height of its tree.
struct Parsed {
    expr: Expr,
    height: usize,
}

/// Height of a node over subtrees of the given heights.
fn height_over<const N: usize>(children: [usize; N]) -> Result<usize> {
    let height = children.into_iter().max().unwrap_or(0) + 1;
    if height > MAX_NESTING {
        return Err(nested_too_deeply());
    }
    Ok(height)
}

fn nested_too_deeply() -> Error {
    Error::Compilation("expression nested too deeply".to_string())
}

fn logical(op: LogicalOp, left: Parsed, right: Parsed) -> Result<Parsed> {
    Ok(Parsed {
        height: height_over([left.height, right.height])?,
        expr: Expr::Logical {
            op,
            left: Box::new(left.expr),
            right: Box::new(right.expr),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_arrow_forms() {
        let function = parse_function("(x, y) => x + y").unwrap();
        assert_eq!(function.params, vec!["x", "y"]);
        assert!(matches!(function.body, Body::Expression(Expr::Binary { op: BinaryOp::Add, .. })));

        let function = parse_function("x => x").unwrap();
        assert_eq!(function.params, vec!["x"]);

        let function = parse_function("() => { return 1; }").unwrap();
        assert!(function.params.is_empty());
        assert_eq!(
            function.body,
            Body::Block(vec![Statement::Return(Some(Expr::Literal(Literal::Number(1.0))))])
        );
    }

    #[test]
    fn parse_function_keyword() {
        let function = parse_function("function greet(name) { const greeting = 'hi'; return greeting + name }").unwrap();
        assert_eq!(function.name.as_deref(), Some("greet"));
        assert_eq!(function.params, vec!["name"]);
        let Body::Block(statements) = function.body else {
            panic!("expected a block body");
        };
        assert_eq!(statements.len(), 2);

        let function = parse_function("(function () { return 1 })").unwrap();
        assert!(function.name.is_none());
    }

    #[test]
    fn precedence() {
        let function = parse_function("() => 1 + 2 * 3 === 7 && !false").unwrap();
        let Body::Expression(Expr::Logical { op: LogicalOp::And, left, .. }) = function.body else {
            panic!("expected && at the root");
        };
        assert!(matches!(*left, Expr::Binary { op: BinaryOp::StrictEq, .. }));
    }

    #[test]
    fn postfix_chains() {
        let function = parse_function("(movie) => movie.cast[0].name.length").unwrap();
        let Body::Expression(Expr::Member { property, .. }) = function.body else {
            panic!("expected a member access");
        };
        assert_eq!(property, "length");
    }

    #[test]
    fn nesting_is_bounded() {
        let too_deep = |source: String| {
            matches!(
                parse_function(&source),
                Err(Error::Compilation(message)) if message == "expression nested too deeply"
            )
        };

        assert!(too_deep(format!("() => {}1{}", "(".repeat(50_000), ")".repeat(50_000))));
        assert!(too_deep(format!("() => {}true", "!".repeat(50_000))));
        assert!(too_deep(format!("() => 1{}", " + 1".repeat(50_000))));
        assert!(too_deep(format!("(a) => a{}", ".b".repeat(50_000))));

        // Parentheses alone do not add height, so this stays within bounds.
        let nested_sums = format!("() => {}1{}", "(1 + ".repeat(100), ")".repeat(100));
        assert!(parse_function(&nested_sums).is_ok());
    }

    #[test]
    fn rejects_non_functions() {
        assert!(matches!(parse_function("1 + 1"), Err(Error::Compilation(_))));
        assert!(matches!(parse_function("(x) =>"), Err(Error::Compilation(_))));
        assert!(matches!(parse_function("(x) => x )"), Err(Error::Compilation(_))));
        assert!(matches!(parse_function("function () { return 1"), Err(Error::Compilation(_))));
    }
}
