use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::environment::Environment;
use crate::error::Error;
use crate::interpreter::Interpreter;
use crate::object::Object;
use crate::syntax::Stmt;
use crate::token::Token;

/// A callable value: either a host-provided native (currently just `clock`)
/// or a user-defined Lox function/method carrying its declaration and the
/// closure environment captured at definition time.
#[derive(Clone)]
pub enum Function {
    Native {
        name: &'static str,
        arity: usize,
        body: fn(&[Object]) -> Object,
    },

    User {
        name: Token,
        params: Vec<Token>,
        body: Rc<Vec<Stmt>>,
        closure: Rc<RefCell<Environment>>,
        is_initializer: bool,
    },
}

impl Function {
    pub fn new_user(
        name: Token,
        params: Vec<Token>,
        body: Rc<Vec<Stmt>>,
        closure: &Rc<RefCell<Environment>>,
        is_initializer: bool,
    ) -> Self {
        Function::User { name, params, body, closure: Rc::clone(closure), is_initializer }
    }

    pub fn arity(&self) -> usize {
        match self {
            Function::Native { arity, .. } => *arity,
            Function::User { params, .. } => params.len(),
        }
    }

    pub fn call(&self, interpreter: &mut Interpreter, arguments: &[Object]) -> Result<Object, Error> {
        match self {
            Function::Native { body, .. } => Ok(body(arguments)),

            Function::User { params, body, closure, is_initializer, .. } => {
                // Every call gets a fresh frame enclosed by the closure captured
                // at declaration time, so recursive and concurrent calls to the
                // same function never share parameter bindings.
                let environment = Rc::new(RefCell::new(Environment::from(closure)));
                for (param, argument) in params.iter().zip(arguments.iter()) {
                    environment.borrow_mut().define(param.lexeme.clone(), argument.clone());
                }

                let result = interpreter.execute_block(body, environment);

                // An `init` method always hands back the instance it just
                // built, regardless of whether (or what) it returned — but
                // only on normal completion or an explicit `return`. A
                // runtime error inside the body still propagates.
                match result {
                    Err(Error::Return { .. }) | Ok(()) if *is_initializer => {
                        Ok(Environment::get_at(closure, 0, "this"))
                    }
                    Err(Error::Return { value }) => Ok(value),
                    Err(other) => Err(other),
                    Ok(()) => Ok(Object::Null),
                }
            }
        }
    }

    /// Produces a bound method: a new closure-within-a-closure frame that
    /// defines `this`, enclosing the method's original closure. Binding
    /// never mutates the method's own declaration, so a class's methods are
    /// shared across all of its instances.
    pub fn bind(&self, instance: Object) -> Self {
        match self {
            Function::Native { .. } => unreachable!("native functions are never methods"),
            Function::User { name, params, body, closure, is_initializer } => {
                let environment = Rc::new(RefCell::new(Environment::from(closure)));
                environment.borrow_mut().define("this".to_string(), instance);
                Function::User {
                    name: name.clone(),
                    params: params.clone(),
                    body: Rc::clone(body),
                    closure: environment,
                    is_initializer: *is_initializer,
                }
            }
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Function::Native { name, .. } => write!(f, "<native function> {name}"),
            Function::User { name, .. } => write!(f, "<fn {}>", name.lexeme),
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenType;

    #[test]
    fn native_function_display_matches_clock_format() {
        fn noop(_: &[Object]) -> Object {
            Object::Null
        }
        let clock = Function::Native { name: "time", arity: 0, body: noop };
        assert_eq!(format!("{clock}"), "<native function> time");
    }

    #[test]
    fn user_function_display_includes_name() {
        let globals = Rc::new(RefCell::new(Environment::new()));
        let name = Token::new(TokenType::Identifier, "greet", 1);
        let function = Function::new_user(name, Vec::new(), Rc::new(Vec::new()), &globals, false);
        assert_eq!(format!("{function}"), "<fn greet>");
    }
}
