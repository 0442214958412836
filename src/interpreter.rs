use std::cell::RefCell;
use std::collections::HashMap;
use std::mem;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::class::LoxClass;
use crate::environment::Environment;
use crate::error::{runtime_error, Diagnostics, Error};
use crate::function::Function;
use crate::object::Object;
use crate::syntax::{expr, stmt, Expr, LiteralValue, NodeId, Stmt};
use crate::token::{Token, TokenType};

/// Evaluates the AST produced by the parser (and annotated by the resolver)
/// against a chain of lexical environments rooted at `globals`. Holds the
/// resolver's side-table directly, mirroring the reference implementation's
/// `interpreter.resolve(expr, depth)` / `self._locals` pairing instead of
/// threading a separate table object through both passes.
pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    locals: HashMap<NodeId, usize>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        let globals = Rc::new(RefCell::new(Environment::new()));
        globals.borrow_mut().define(
            "clock".to_string(),
            Object::Callable(Function::Native { name: "time", arity: 0, body: native_clock }),
        );
        Self { environment: Rc::clone(&globals), globals, locals: HashMap::new() }
    }

    pub fn resolve(&mut self, id: NodeId, depth: usize) {
        self.locals.insert(id, depth);
    }

    /// Runs a whole program. Stops at the first runtime error, reporting it
    /// through `diagnostics` rather than propagating it to the caller —
    /// matching the top-level `interpret` entry point in §4.4/§7.
    pub fn interpret(&mut self, statements: &[Stmt], diagnostics: &mut Diagnostics) {
        for statement in statements {
            if let Err(error) = self.execute(statement) {
                if let Error::Runtime { token, message } = error {
                    diagnostics.report_runtime_error(&token, &message);
                }
                return;
            }
        }
    }

    fn execute(&mut self, statement: &Stmt) -> Result<(), Error> {
        statement.accept(self)
    }

    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Rc<RefCell<Environment>>,
    ) -> Result<(), Error> {
        let previous = mem::replace(&mut self.environment, environment);
        let mut result = Ok(());
        for statement in statements {
            if let Err(error) = self.execute(statement) {
                result = Err(error);
                break;
            }
        }
        self.environment = previous;
        result
    }

    fn evaluate(&mut self, expression: &Expr) -> Result<Object, Error> {
        expression.accept(self)
    }

    fn look_up_variable(&self, name: &Token, id: NodeId) -> Result<Object, Error> {
        match self.locals.get(&id) {
            Some(&distance) => Ok(Environment::get_at(&self.environment, distance, &name.lexeme)),
            None => self.globals.borrow().get(name),
        }
    }

    fn is_truthy(&self, value: &Object) -> bool {
        value.is_truthy()
    }

    fn is_equal(&self, left: &Object, right: &Object) -> bool {
        left.equals(right)
    }

    fn check_number_operand(&self, operator: &Token, operand: &Object) -> Result<f64, Error> {
        match operand {
            Object::Number(n) => Ok(*n),
            _ => Err(runtime_error(operator, "Operands must be numbers.")),
        }
    }

    fn check_number_operands(&self, operator: &Token, left: &Object, right: &Object) -> Result<(f64, f64), Error> {
        match (left, right) {
            (Object::Number(l), Object::Number(r)) => Ok((*l, *r)),
            _ => Err(runtime_error(operator, "Operands must be numbers.")),
        }
    }
}

fn native_clock(_arguments: &[Object]) -> Object {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis())
        .unwrap_or(0);
    Object::Number(millis as f64)
}

impl expr::Visitor<Result<Object, Error>> for Interpreter {
    fn visit_assign_expr(&mut self, id: NodeId, name: &Token, value: &Expr) -> Result<Object, Error> {
        let value = self.evaluate(value)?;
        match self.locals.get(&id) {
            Some(&distance) => Environment::assign_at(&self.environment, distance, name, value.clone()),
            None => self.globals.borrow_mut().assign(name, value.clone())?,
        }
        Ok(value)
    }

    fn visit_binary_expr(&mut self, left: &Expr, operator: &Token, right: &Expr) -> Result<Object, Error> {
        let left = self.evaluate(left)?;
        let right = self.evaluate(right)?;

        match operator.token_type {
            TokenType::Minus => {
                let (l, r) = self.check_number_operands(operator, &left, &right)?;
                Ok(Object::Number(l - r))
            }
            TokenType::Slash => {
                let (l, r) = self.check_number_operands(operator, &left, &right)?;
                Ok(Object::Number(l / r))
            }
            TokenType::Star => {
                let (l, r) = self.check_number_operands(operator, &left, &right)?;
                Ok(Object::Number(l * r))
            }
            TokenType::Plus => match (&left, &right) {
                (Object::Number(l), Object::Number(r)) => Ok(Object::Number(l + r)),
                (Object::String(l), Object::String(r)) => Ok(Object::String(format!("{l}{r}"))),
                _ => Err(runtime_error(operator, "Operands must be two numbers or two strings.")),
            },
            TokenType::Greater => {
                let (l, r) = self.check_number_operands(operator, &left, &right)?;
                Ok(Object::Boolean(l > r))
            }
            TokenType::GreaterEqual => {
                let (l, r) = self.check_number_operands(operator, &left, &right)?;
                Ok(Object::Boolean(l >= r))
            }
            TokenType::Less => {
                let (l, r) = self.check_number_operands(operator, &left, &right)?;
                Ok(Object::Boolean(l < r))
            }
            TokenType::LessEqual => {
                let (l, r) = self.check_number_operands(operator, &left, &right)?;
                Ok(Object::Boolean(l <= r))
            }
            TokenType::BangEqual => Ok(Object::Boolean(!self.is_equal(&left, &right))),
            TokenType::EqualEqual => Ok(Object::Boolean(self.is_equal(&left, &right))),
            _ => unreachable!("parser never produces a Binary node with this operator"),
        }
    }

    fn visit_call_expr(&mut self, callee: &Expr, paren: &Token, arguments: &[Expr]) -> Result<Object, Error> {
        let callee = self.evaluate(callee)?;

        let mut evaluated_arguments = Vec::with_capacity(arguments.len());
        for argument in arguments {
            evaluated_arguments.push(self.evaluate(argument)?);
        }

        let arity = match &callee {
            Object::Callable(function) => function.arity(),
            Object::Class(class) => class.borrow().arity(),
            _ => return Err(runtime_error(paren, "Can only call functions and classes.")),
        };

        if evaluated_arguments.len() != arity {
            return Err(runtime_error(
                paren,
                format!("Expected {} arguments but got {}.", arity, evaluated_arguments.len()),
            ));
        }

        match callee {
            Object::Callable(function) => function.call(self, &evaluated_arguments),
            Object::Class(class) => LoxClass::instantiate(&class, self, &evaluated_arguments),
            _ => unreachable!("checked above"),
        }
    }

    fn visit_get_expr(&mut self, object: &Expr, name: &Token) -> Result<Object, Error> {
        let object = self.evaluate(object)?;
        match &object {
            Object::Instance(instance) => instance.borrow().get(name, &object),
            _ => Err(runtime_error(name, "Only instances have properties.")),
        }
    }

    fn visit_grouping_expr(&mut self, expression: &Expr) -> Result<Object, Error> {
        self.evaluate(expression)
    }

    fn visit_literal_expr(&mut self, value: &LiteralValue) -> Result<Object, Error> {
        Ok(match value {
            LiteralValue::Boolean(b) => Object::Boolean(*b),
            LiteralValue::Null => Object::Null,
            LiteralValue::Number(n) => Object::Number(*n),
            LiteralValue::String(s) => Object::String(s.clone()),
        })
    }

    fn visit_logical_expr(&mut self, left: &Expr, operator: &Token, right: &Expr) -> Result<Object, Error> {
        let left = self.evaluate(left)?;

        if operator.token_type == TokenType::Or {
            if self.is_truthy(&left) {
                return Ok(left);
            }
        } else if !self.is_truthy(&left) {
            return Ok(left);
        }

        self.evaluate(right)
    }

    fn visit_set_expr(&mut self, object: &Expr, name: &Token, value: &Expr) -> Result<Object, Error> {
        let object = self.evaluate(object)?;
        let instance = match &object {
            Object::Instance(instance) => instance,
            _ => return Err(runtime_error(name, "Only instances have fields.")),
        };

        let value = self.evaluate(value)?;
        instance.borrow_mut().set(name, value.clone());
        Ok(value)
    }

    fn visit_super_expr(&mut self, id: NodeId, keyword: &Token, method: &Token) -> Result<Object, Error> {
        let distance = *self
            .locals
            .get(&id)
            .expect("resolver always records a distance for 'super'");

        let superclass = match Environment::get_at(&self.environment, distance, "super") {
            Object::Class(class) => class,
            _ => unreachable!("'super' always binds to a class value"),
        };
        let instance = Environment::get_at(&self.environment, distance - 1, "this");

        let method = superclass
            .borrow()
            .find_method(&method.lexeme)
            .ok_or_else(|| runtime_error(keyword, format!("Undefined property '{}'.", method.lexeme)))?;

        Ok(Object::Callable(method.bind(instance)))
    }

    fn visit_this_expr(&mut self, id: NodeId, keyword: &Token) -> Result<Object, Error> {
        self.look_up_variable(keyword, id)
    }

    fn visit_unary_expr(&mut self, operator: &Token, right: &Expr) -> Result<Object, Error> {
        let right = self.evaluate(right)?;

        match operator.token_type {
            TokenType::Minus => {
                let n = self.check_number_operand(operator, &right)?;
                Ok(Object::Number(-n))
            }
            TokenType::Bang => Ok(Object::Boolean(!self.is_truthy(&right))),
            _ => unreachable!("parser never produces a Unary node with this operator"),
        }
    }

    fn visit_variable_expr(&mut self, id: NodeId, name: &Token) -> Result<Object, Error> {
        self.look_up_variable(name, id)
    }
}

impl stmt::Visitor<Result<(), Error>> for Interpreter {
    fn visit_block_stmt(&mut self, statements: &[Stmt]) -> Result<(), Error> {
        let environment = Rc::new(RefCell::new(Environment::from(&self.environment)));
        self.execute_block(statements, environment)
    }

    fn visit_class_stmt(&mut self, name: &Token, superclass: &Option<Expr>, methods: &[Stmt]) -> Result<(), Error> {
        let superclass_class = match superclass {
            Some(superclass_expr) => {
                let value = self.evaluate(superclass_expr)?;
                match value {
                    Object::Class(class) => Some(class),
                    _ => {
                        let token = match superclass_expr {
                            Expr::Variable { name, .. } => name,
                            _ => unreachable!("parser only ever produces a Variable superclass expression"),
                        };
                        return Err(runtime_error(token, "Superclass must be a class."));
                    }
                }
            }
            None => None,
        };

        self.environment.borrow_mut().define(name.lexeme.clone(), Object::Null);

        let enclosing_environment = superclass_class.as_ref().map(|superclass_class| {
            let super_scope = Rc::new(RefCell::new(Environment::from(&self.environment)));
            super_scope
                .borrow_mut()
                .define("super".to_string(), Object::Class(Rc::clone(superclass_class)));
            mem::replace(&mut self.environment, super_scope)
        });

        let mut method_table = HashMap::new();
        for method in methods {
            let (method_name, params, body) = match method {
                Stmt::Function { name, params, body } => (name, params, body),
                _ => unreachable!("class bodies only ever contain Stmt::Function methods"),
            };
            let is_initializer = method_name.lexeme == "init";
            let function = Function::new_user(
                method_name.clone(),
                params.clone(),
                Rc::new(body.clone()),
                &self.environment,
                is_initializer,
            );
            method_table.insert(method_name.lexeme.clone(), function);
        }

        let class = Rc::new(RefCell::new(LoxClass {
            name: name.lexeme.clone(),
            superclass: superclass_class,
            methods: method_table,
        }));

        if let Some(enclosing_environment) = enclosing_environment {
            self.environment = enclosing_environment;
        }

        self.environment.borrow_mut().assign(name, Object::Class(class))?;
        Ok(())
    }

    fn visit_expression_stmt(&mut self, expression: &Expr) -> Result<(), Error> {
        self.evaluate(expression)?;
        Ok(())
    }

    fn visit_function_stmt(&mut self, name: &Token, params: &[Token], body: &[Stmt]) -> Result<(), Error> {
        let function = Function::new_user(
            name.clone(),
            params.to_vec(),
            Rc::new(body.to_vec()),
            &self.environment,
            false,
        );
        self.environment.borrow_mut().define(name.lexeme.clone(), Object::Callable(function));
        Ok(())
    }

    fn visit_if_stmt(&mut self, condition: &Expr, then_branch: &Stmt, else_branch: &Option<Box<Stmt>>) -> Result<(), Error> {
        let condition = self.evaluate(condition)?;
        if self.is_truthy(&condition) {
            self.execute(then_branch)
        } else if let Some(else_branch) = else_branch {
            self.execute(else_branch)
        } else {
            Ok(())
        }
    }

    fn visit_print_stmt(&mut self, expression: &Expr) -> Result<(), Error> {
        let value = self.evaluate(expression)?;
        println!("{value}");
        Ok(())
    }

    fn visit_return_stmt(&mut self, _keyword: &Token, value: &Option<Expr>) -> Result<(), Error> {
        let value = match value {
            Some(value) => self.evaluate(value)?,
            None => Object::Null,
        };
        Err(Error::Return { value })
    }

    fn visit_var_stmt(&mut self, name: &Token, initializer: &Option<Expr>) -> Result<(), Error> {
        let value = match initializer {
            Some(initializer) => self.evaluate(initializer)?,
            None => Object::Null,
        };
        self.environment.borrow_mut().define(name.lexeme.clone(), value);
        Ok(())
    }

    fn visit_while_stmt(&mut self, condition: &Expr, body: &Stmt) -> Result<(), Error> {
        loop {
            let value = self.evaluate(condition)?;
            if !self.is_truthy(&value) {
                break;
            }
            self.execute(body)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::resolver::Resolver;
    use crate::scanner::Scanner;

    fn run(source: &str) -> Diagnostics {
        let mut diagnostics = Diagnostics::new();
        let tokens = Scanner::new(source, &mut diagnostics).scan_tokens();
        let statements = Parser::new(&tokens, &mut diagnostics).parse();
        let mut interpreter = Interpreter::new();
        Resolver::new(&mut interpreter, &mut diagnostics).resolve_stmts(&statements);
        if !diagnostics.had_error() {
            interpreter.interpret(&statements, &mut diagnostics);
        }
        diagnostics
    }

    #[test]
    fn adding_number_to_string_is_a_runtime_error() {
        let diagnostics = run("\"a\" + 1;");
        assert!(diagnostics.had_runtime_error());
    }

    #[test]
    fn well_formed_program_runs_without_error() {
        let diagnostics = run("print 1 + 2;");
        assert!(!diagnostics.had_error());
        assert!(!diagnostics.had_runtime_error());
    }

    #[test]
    fn undefined_global_is_a_runtime_error() {
        let diagnostics = run("print undefined_name;");
        assert!(diagnostics.had_runtime_error());
    }

    #[test]
    fn calling_a_non_callable_is_a_runtime_error() {
        let diagnostics = run("var a = 1; a();");
        assert!(diagnostics.had_runtime_error());
    }

    #[test]
    fn clock_returns_a_non_negative_number() {
        let diagnostics = run("if (clock() < 0) { \"unreachable\" + 1; }");
        assert!(!diagnostics.had_runtime_error());
    }

    #[test]
    fn negating_a_non_number_is_a_runtime_error() {
        let diagnostics = run("-\"a\";");
        assert!(diagnostics.had_runtime_error());
    }
}
