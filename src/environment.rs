use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::{error::Error, object::Object, token::Token};

pub struct Environment {
    values: HashMap<String, Object>,
    enclosing: Option<Rc<RefCell<Environment>>>, // Parent-pointer
}

impl Environment {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn from(enclosing: &Rc<RefCell<Environment>>) -> Self {
        Self {
            values: HashMap::new(),
            enclosing: Some(Rc::clone(enclosing)),
        }
    }

    pub fn define(&mut self, name: String, value: Object) {
        self.values.insert(name, value);
    }

    pub fn get(&self, name: &Token) -> Result<Object, Error> {
        let key = &*name.lexeme;
        if let Some(value) = self.values.get(key) {
            Ok((*value).clone())
        } else if let Some(ref enclosing) = self.enclosing {
            // it is probably faster to iteratively walk the chain but recursion here is prettier
            enclosing.borrow().get(name)
        } else {
            Err(Error::Runtime {
                token: name.clone(),
                message: format!("Undefined variable '{}'.", key),
            })
        }
    }

    pub fn assign(&mut self, name: &Token, value: Object) -> Result<(), Error> {
        let key = &*name.lexeme;
        if self.values.contains_key(key) {
            self.values.insert(name.lexeme.clone(), value);
            Ok(())
        } else if let Some(ref enclosing) = self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(Error::Runtime {
                token: name.clone(),
                message: format!("Undefined variable '{}'.", key),
            })
        }
    }

    /// Walks exactly `distance` parent pointers, never touching a map along
    /// the way. The resolver guarantees `distance` never overruns the chain
    /// for any expression it recorded, so this and `get_at`/`assign_at`
    /// below only ever see distances the static pass already validated.
    fn ancestor(env: &Rc<RefCell<Environment>>, distance: usize) -> Rc<RefCell<Environment>> {
        let mut current = Rc::clone(env);
        for _ in 0..distance {
            let parent = current
                .borrow()
                .enclosing
                .as_ref()
                .expect("resolver-recorded distance exceeds environment chain")
                .clone();
            current = parent;
        }
        current
    }

    pub fn get_at(env: &Rc<RefCell<Environment>>, distance: usize, name: &str) -> Object {
        Environment::ancestor(env, distance)
            .borrow()
            .values
            .get(name)
            .cloned()
            .expect("resolver-recorded binding missing from its scope")
    }

    pub fn assign_at(env: &Rc<RefCell<Environment>>, distance: usize, name: &Token, value: Object) {
        Environment::ancestor(env, distance)
            .borrow_mut()
            .values
            .insert(name.lexeme.clone(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(name: &str) -> Token {
        Token::new(crate::token::TokenType::Identifier, name, 1)
    }

    #[test]
    fn get_falls_through_to_enclosing_frame() {
        let globals = Rc::new(RefCell::new(Environment::new()));
        globals
            .borrow_mut()
            .define("a".to_string(), Object::Number(1.0));

        let inner = Rc::new(RefCell::new(Environment::from(&globals)));

        let value = inner.borrow().get(&token("a")).unwrap();
        assert_eq!(value, Object::Number(1.0));
    }

    #[test]
    fn get_at_skips_straight_to_the_recorded_ancestor() {
        let globals = Rc::new(RefCell::new(Environment::new()));
        globals
            .borrow_mut()
            .define("shadowed".to_string(), Object::Number(1.0));

        let inner = Rc::new(RefCell::new(Environment::from(&globals)));
        inner
            .borrow_mut()
            .define("shadowed".to_string(), Object::Number(2.0));

        assert_eq!(Environment::get_at(&inner, 0, "shadowed"), Object::Number(2.0));
        assert_eq!(Environment::get_at(&inner, 1, "shadowed"), Object::Number(1.0));
    }

    #[test]
    fn assign_to_undeclared_global_is_a_runtime_error() {
        let globals = Rc::new(RefCell::new(Environment::new()));
        let result = globals
            .borrow_mut()
            .assign(&token("missing"), Object::Null);
        assert!(result.is_err());
    }
}
