use crate::error::{Diagnostics, Error};
use crate::syntax::{next_id, Expr, LiteralValue, Stmt};
use crate::token::{Literal, Token, TokenType};

const MAX_ARGS: usize = 255;

/// Recursive-descent parser. Consumes a borrowed token slice produced by the
/// scanner and yields a list of top-level statements, reporting through
/// `Diagnostics` rather than panicking or using process-wide state.
pub struct Parser<'t, 'd> {
    tokens: &'t [Token],
    current: usize,
    diagnostics: &'d mut Diagnostics,
}

macro_rules! matches_any {
    ( $sel:ident, $( $x:expr ),+ ) => {
        {
            if $( $sel.check($x) )||+ {
                $sel.advance();
                true
            } else {
                false
            }
        }
    };
}

impl<'t, 'd> Parser<'t, 'd> {
    pub fn new(tokens: &'t [Token], diagnostics: &'d mut Diagnostics) -> Self {
        Self { tokens, current: 0, diagnostics }
    }

    // program → declaration* EOF ;
    pub fn parse(&mut self) -> Vec<Stmt> {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }
        statements
    }

    // declaration → classDecl | funDecl | varDecl | statement ;
    // A failed declaration synchronizes to the next statement boundary and
    // contributes no AST node, matching the panic-mode recovery in §4.2.
    fn declaration(&mut self) -> Option<Stmt> {
        let result = if matches_any!(self, TokenType::Class) {
            self.class_declaration()
        } else if matches_any!(self, TokenType::Fun) {
            self.function("function")
        } else if matches_any!(self, TokenType::Var) {
            self.var_declaration()
        } else {
            self.statement()
        };

        match result {
            Ok(stmt) => Some(stmt),
            Err(Error::Parse) => {
                self.synchronize();
                None
            }
            Err(_) => unreachable!("parser only ever raises Error::Parse"),
        }
    }

    // classDecl → "class" IDENTIFIER ( "<" IDENTIFIER )? "{" function* "}" ;
    fn class_declaration(&mut self) -> Result<Stmt, Error> {
        let name = self.consume(TokenType::Identifier, "Expect class name.")?;

        let superclass = if matches_any!(self, TokenType::Less) {
            self.consume(TokenType::Identifier, "Expect superclass name.")?;
            let superclass_name = self.previous().clone();
            Some(Expr::Variable { id: next_id(), name: superclass_name })
        } else {
            None
        };

        self.consume(TokenType::LeftBrace, "Expect '{' before class body.")?;

        let mut methods = Vec::new();
        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            methods.push(self.function("method")?);
        }

        self.consume(TokenType::RightBrace, "Expect '}' after class body.")?;

        Ok(Stmt::Class { name, superclass, methods })
    }

    // funDecl    → "fun" function ;
    // function   → IDENTIFIER "(" parameters? ")" block ;
    // parameters → IDENTIFIER ( "," IDENTIFIER )* ;
    // Reused for methods inside a class body, where there is no `fun` keyword.
    fn function(&mut self, kind: &str) -> Result<Stmt, Error> {
        let name = self.consume(TokenType::Identifier, &format!("Expect {kind} name."))?;

        self.consume(TokenType::LeftParen, &format!("Expect '(' after {kind} name."))?;
        let mut params = Vec::new();
        if !self.check(TokenType::RightParen) {
            loop {
                if params.len() >= MAX_ARGS {
                    self.error(self.peek().clone(), "Can't have more than 255 parameters.");
                }
                params.push(self.consume(TokenType::Identifier, "Expect parameter name.")?);
                if !matches_any!(self, TokenType::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenType::RightParen, "Expect ')' after parameters.")?;

        self.consume(TokenType::LeftBrace, &format!("Expect '{{' before {kind} body."))?;
        let body = self.block()?;
        Ok(Stmt::Function { name, params, body })
    }

    // varDecl → "var" IDENTIFIER ( "=" expression )? ";" ;
    fn var_declaration(&mut self) -> Result<Stmt, Error> {
        let name = self.consume(TokenType::Identifier, "Expect variable name.")?;
        let initializer = if matches_any!(self, TokenType::Equal) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::Semicolon, "Expect ';' after variable declaration.")?;
        Ok(Stmt::Var { name, initializer })
    }

    // statement → exprStmt | printStmt | block | ifStmt | whileStmt | returnStmt | forStmt ;
    fn statement(&mut self) -> Result<Stmt, Error> {
        if matches_any!(self, TokenType::For) {
            self.for_statement()
        } else if matches_any!(self, TokenType::If) {
            self.if_statement()
        } else if matches_any!(self, TokenType::Print) {
            self.print_statement()
        } else if matches_any!(self, TokenType::Return) {
            self.return_statement()
        } else if matches_any!(self, TokenType::While) {
            self.while_statement()
        } else if matches_any!(self, TokenType::LeftBrace) {
            Ok(Stmt::Block { statements: self.block()? })
        } else {
            self.expression_statement()
        }
    }

    // returnStmt → "return" expression? ";" ;
    fn return_statement(&mut self) -> Result<Stmt, Error> {
        let keyword = self.previous().clone();
        let value = if !self.check(TokenType::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::Semicolon, "Expect ';' after return value.")?;
        Ok(Stmt::Return { keyword, value })
    }

    // ifStmt → "if" "(" expression ")" statement ( "else" statement )? ;
    // The trailing `else` is consumed eagerly, so it always binds to the
    // nearest enclosing `if`.
    fn if_statement(&mut self) -> Result<Stmt, Error> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after if condition.")?;

        let then_branch = Box::new(self.statement()?);
        let else_branch = if matches_any!(self, TokenType::Else) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If { condition, then_branch, else_branch })
    }

    // block → "{" declaration* "}" ;
    fn block(&mut self) -> Result<Vec<Stmt>, Error> {
        let mut statements = Vec::new();
        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }
        self.consume(TokenType::RightBrace, "Expect '}' after block.")?;
        Ok(statements)
    }

    // whileStmt → "while" "(" expression ")" statement ;
    fn while_statement(&mut self) -> Result<Stmt, Error> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after condition.")?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::While { condition, body })
    }

    // forStmt → "for" "(" ( varDecl | exprStmt | ";" ) expression? ";" expression? ")" statement ;
    // Desugared into a `while` wrapped in block(s), per §4.2.
    fn for_statement(&mut self) -> Result<Stmt, Error> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'for'.")?;

        let initializer = if matches_any!(self, TokenType::Semicolon) {
            None
        } else if matches_any!(self, TokenType::Var) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if !self.check(TokenType::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::Semicolon, "Expect ';' after loop condition.")?;

        let increment = if !self.check(TokenType::RightParen) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::RightParen, "Expect ')' after for clauses.")?;

        let mut body = self.statement()?;

        if let Some(increment) = increment {
            body = Stmt::Block {
                statements: vec![body, Stmt::Expression { expression: increment }],
            };
        }

        let condition = condition.unwrap_or(Expr::Literal { id: next_id(), value: LiteralValue::Boolean(true) });
        body = Stmt::While { condition, body: Box::new(body) };

        if let Some(initializer) = initializer {
            body = Stmt::Block { statements: vec![initializer, body] };
        }

        Ok(body)
    }

    // printStmt → "print" expression ";" ;
    fn print_statement(&mut self) -> Result<Stmt, Error> {
        let value = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after value.")?;
        Ok(Stmt::Print { expression: value })
    }

    // exprStmt → expression ";" ;
    fn expression_statement(&mut self) -> Result<Stmt, Error> {
        let value = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after expression.")?;
        Ok(Stmt::Expression { expression: value })
    }

    // expression → assignment ;
    fn expression(&mut self) -> Result<Expr, Error> {
        self.assignment()
    }

    // assignment → ( call "." )? IDENTIFIER "=" assignment | logic_or ;
    //
    // The left-hand side is parsed as an ordinary r-value expression; only if
    // an `=` follows do we reinterpret it as an assignment target. Anything
    // other than a `Variable` or `Get` is reported but not thrown — the
    // parser isn't confused about where it is in the grammar, so there is no
    // need to synchronize, and the already-parsed left expression is
    // returned as-is.
    fn assignment(&mut self) -> Result<Expr, Error> {
        let expr = self.logic_or()?;

        if matches_any!(self, TokenType::Equal) {
            let equals = self.previous().clone();
            let value = Box::new(self.assignment()?);

            return match expr {
                Expr::Variable { name, .. } => Ok(Expr::Assign { id: next_id(), name, value }),
                Expr::Get { object, name, .. } => Ok(Expr::Set { id: next_id(), object, name, value }),
                other => {
                    self.error(equals, "Invalid assignment target.");
                    Ok(other)
                }
            };
        }

        Ok(expr)
    }

    // logic_or → logic_and ( "or" logic_and )* ;
    fn logic_or(&mut self) -> Result<Expr, Error> {
        let mut expr = self.logic_and()?;
        while matches_any!(self, TokenType::Or) {
            let operator = self.previous().clone();
            let right = self.logic_and()?;
            expr = Expr::Logical { id: next_id(), left: Box::new(expr), operator, right: Box::new(right) };
        }
        Ok(expr)
    }

    // logic_and → equality ( "and" equality )* ;
    fn logic_and(&mut self) -> Result<Expr, Error> {
        let mut expr = self.equality()?;
        while matches_any!(self, TokenType::And) {
            let operator = self.previous().clone();
            let right = self.equality()?;
            expr = Expr::Logical { id: next_id(), left: Box::new(expr), operator, right: Box::new(right) };
        }
        Ok(expr)
    }

    // equality → comparison ( ( "!=" | "==" ) comparison )* ;
    fn equality(&mut self) -> Result<Expr, Error> {
        let mut expr = self.comparison()?;
        while matches_any!(self, TokenType::BangEqual, TokenType::EqualEqual) {
            let operator = self.previous().clone();
            let right = self.comparison()?;
            expr = Expr::Binary { id: next_id(), left: Box::new(expr), operator, right: Box::new(right) };
        }
        Ok(expr)
    }

    // comparison → term ( ( ">" | ">=" | "<" | "<=" ) term )* ;
    fn comparison(&mut self) -> Result<Expr, Error> {
        let mut expr = self.term()?;
        while matches_any!(
            self,
            TokenType::Greater,
            TokenType::GreaterEqual,
            TokenType::Less,
            TokenType::LessEqual
        ) {
            let operator = self.previous().clone();
            let right = self.term()?;
            expr = Expr::Binary { id: next_id(), left: Box::new(expr), operator, right: Box::new(right) };
        }
        Ok(expr)
    }

    // term → factor ( ( "-" | "+" ) factor )* ;
    fn term(&mut self) -> Result<Expr, Error> {
        let mut expr = self.factor()?;
        while matches_any!(self, TokenType::Minus, TokenType::Plus) {
            let operator = self.previous().clone();
            let right = self.factor()?;
            expr = Expr::Binary { id: next_id(), left: Box::new(expr), operator, right: Box::new(right) };
        }
        Ok(expr)
    }

    // factor → unary ( ( "/" | "*" ) unary )* ;
    fn factor(&mut self) -> Result<Expr, Error> {
        let mut expr = self.unary()?;
        while matches_any!(self, TokenType::Slash, TokenType::Star) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            expr = Expr::Binary { id: next_id(), left: Box::new(expr), operator, right: Box::new(right) };
        }
        Ok(expr)
    }

    // unary → ( "!" | "-" ) unary | call ;
    fn unary(&mut self) -> Result<Expr, Error> {
        if matches_any!(self, TokenType::Bang, TokenType::Minus) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            return Ok(Expr::Unary { id: next_id(), operator, right: Box::new(right) });
        }
        self.call()
    }

    // call → primary ( "(" arguments? ")" | "." IDENTIFIER )* ;
    fn call(&mut self) -> Result<Expr, Error> {
        let mut expr = self.primary()?;

        loop {
            if matches_any!(self, TokenType::LeftParen) {
                expr = self.finish_call(expr)?;
            } else if matches_any!(self, TokenType::Dot) {
                let name = self.consume(TokenType::Identifier, "Expect property name after '.'.")?;
                expr = Expr::Get { id: next_id(), object: Box::new(expr), name };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    // arguments → expression ( "," expression )* ;
    fn finish_call(&mut self, callee: Expr) -> Result<Expr, Error> {
        let mut arguments = Vec::new();
        if !self.check(TokenType::RightParen) {
            loop {
                if arguments.len() >= MAX_ARGS {
                    self.error(self.peek().clone(), "Can't have more than 255 arguments.");
                }
                arguments.push(self.expression()?);
                if !matches_any!(self, TokenType::Comma) {
                    break;
                }
            }
        }

        let paren = self.consume(TokenType::RightParen, "Expect ')' after arguments.")?;
        Ok(Expr::Call { id: next_id(), callee: Box::new(callee), paren, arguments })
    }

    // primary → NUMBER | STRING | "true" | "false" | "nil" | "this"
    //         | "(" expression ")" | IDENTIFIER | "super" "." IDENTIFIER ;
    fn primary(&mut self) -> Result<Expr, Error> {
        if matches_any!(self, TokenType::False) {
            return Ok(Expr::Literal { id: next_id(), value: LiteralValue::Boolean(false) });
        }
        if matches_any!(self, TokenType::True) {
            return Ok(Expr::Literal { id: next_id(), value: LiteralValue::Boolean(true) });
        }
        if matches_any!(self, TokenType::Nil) {
            return Ok(Expr::Literal { id: next_id(), value: LiteralValue::Null });
        }
        if self.check(TokenType::Number) {
            let literal = match &self.peek().literal {
                Literal::Number(n) => *n,
                _ => unreachable!("scanner always attaches a Number literal to a NUMBER token"),
            };
            self.advance();
            return Ok(Expr::Literal { id: next_id(), value: LiteralValue::Number(literal) });
        }
        if self.check(TokenType::String) {
            let literal = match &self.peek().literal {
                Literal::Str(s) => s.clone(),
                _ => unreachable!("scanner always attaches a Str literal to a STRING token"),
            };
            self.advance();
            return Ok(Expr::Literal { id: next_id(), value: LiteralValue::String(literal) });
        }
        if matches_any!(self, TokenType::Super) {
            let keyword = self.previous().clone();
            self.consume(TokenType::Dot, "Expect '.' after 'super'.")?;
            let method = self.consume(TokenType::Identifier, "Expect superclass method name.")?;
            return Ok(Expr::Super { id: next_id(), keyword, method });
        }
        if matches_any!(self, TokenType::This) {
            return Ok(Expr::This { id: next_id(), keyword: self.previous().clone() });
        }
        if self.check(TokenType::Identifier) {
            let name = self.peek().clone();
            self.advance();
            return Ok(Expr::Variable { id: next_id(), name });
        }
        if matches_any!(self, TokenType::LeftParen) {
            let expression = self.expression()?;
            self.consume(TokenType::RightParen, "Expect ')' after expression.")?;
            return Ok(Expr::Grouping { id: next_id(), expression: Box::new(expression) });
        }

        Err(self.error(self.peek().clone(), "Expect expression."))
    }

    // Discards tokens until we're likely back at the start of a statement, so
    // one syntax error doesn't cascade into a wall of spurious follow-on
    // errors.
    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            if self.previous().token_type == TokenType::Semicolon {
                return;
            }

            match self.peek().token_type {
                TokenType::Class
                | TokenType::Fun
                | TokenType::Var
                | TokenType::For
                | TokenType::If
                | TokenType::While
                | TokenType::Print
                | TokenType::Return => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn check(&self, token_type: TokenType) -> bool {
        !self.is_at_end() && self.peek().token_type == token_type
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::Eof
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn consume(&mut self, token_type: TokenType, message: &str) -> Result<Token, Error> {
        if self.check(token_type) {
            Ok(self.advance().clone())
        } else {
            let token = self.peek().clone();
            Err(self.error(token, message))
        }
    }

    fn error(&mut self, token: Token, message: &str) -> Error {
        self.diagnostics.error_at_token(&token, message);
        Error::Parse
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::Scanner;

    fn parse(source: &str) -> (Vec<Stmt>, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let tokens = Scanner::new(source, &mut diagnostics).scan_tokens();
        let statements = Parser::new(&tokens, &mut diagnostics).parse();
        (statements, diagnostics)
    }

    #[test]
    fn parses_arithmetic_with_precedence() {
        let (statements, diagnostics) = parse("1 + 2 * 3;");
        assert!(!diagnostics.had_error());
        assert_eq!(statements.len(), 1);
    }

    #[test]
    fn for_loop_desugars_into_a_block_and_while() {
        let (statements, diagnostics) = parse("for (var i = 0; i < 3; i = i + 1) print i;");
        assert!(!diagnostics.had_error());
        match &statements[0] {
            Stmt::Block { statements } => {
                assert_eq!(statements.len(), 2);
                assert!(matches!(statements[0], Stmt::Var { .. }));
                assert!(matches!(statements[1], Stmt::While { .. }));
            }
            other => panic!("expected desugared block, got {other:?}"),
        }
    }

    #[test]
    fn class_with_superclass_parses_variable_expr() {
        let (statements, diagnostics) = parse("class B < A {}");
        assert!(!diagnostics.had_error());
        match &statements[0] {
            Stmt::Class { superclass: Some(Expr::Variable { name, .. }), .. } => {
                assert_eq!(name.lexeme, "A");
            }
            other => panic!("expected class with superclass variable, got {other:?}"),
        }
    }

    #[test]
    fn invalid_assignment_target_is_reported_but_does_not_abort_the_statement() {
        let (statements, diagnostics) = parse("1 = 2;");
        assert!(diagnostics.had_error());
        assert_eq!(statements.len(), 1);
    }

    #[test]
    fn missing_initializer_expression_triggers_panic_mode_recovery() {
        let (statements, diagnostics) = parse("var a = ;\nprint 2;");
        assert!(diagnostics.had_error());
        // the malformed `var a = ;` declaration yields no node, but parsing
        // resynchronizes at the semicolon in time to pick up the next line.
        assert_eq!(statements.len(), 1);
    }
}
