use std::collections::HashMap;
use std::mem;

use crate::error::Diagnostics;
use crate::interpreter::Interpreter;
use crate::syntax::{expr, stmt, Expr, LiteralValue, NodeId, Stmt};
use crate::token::Token;

/// Tracks whether the code currently being resolved is inside a function
/// body, and if so what kind — `init` methods get special return-value
/// treatment that ordinary methods and functions don't.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Method,
    Initializer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

/// Second pass over the AST: walks lexical scopes and, for every
/// variable/`this`/`super` reference, records the number of enclosing
/// scopes between the reference and its binding into the interpreter's
/// side-table (keyed by `NodeId`, not by name — two occurrences of the same
/// name at different call sites never collide). Continues linearly on
/// error rather than unwinding; errors go through the same `Diagnostics`
/// sink the parser uses.
pub struct Resolver<'i, 'd> {
    interpreter: &'i mut Interpreter,
    diagnostics: &'d mut Diagnostics,
    scopes: Vec<HashMap<String, bool>>,
    current_function: FunctionType,
    current_class: ClassType,
}

impl<'i, 'd> Resolver<'i, 'd> {
    pub fn new(interpreter: &'i mut Interpreter, diagnostics: &'d mut Diagnostics) -> Self {
        Self {
            interpreter,
            diagnostics,
            scopes: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
        }
    }

    pub fn resolve_stmts(&mut self, statements: &[Stmt]) {
        for statement in statements {
            self.resolve_stmt(statement);
        }
    }

    fn resolve_stmt(&mut self, statement: &Stmt) {
        statement.accept(self);
    }

    fn resolve_expr(&mut self, expression: &Expr) {
        expression.accept(self);
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    // Adds the name to the innermost scope, marked "not ready yet" (`false`)
    // so `var a = a;` is caught: the initializer sees `a` declared but not
    // yet defined.
    fn declare(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(&name.lexeme) {
                self.diagnostics
                    .error_at_token(name, "Already a variable with this name in scope.");
            }
            scope.insert(name.lexeme.clone(), false);
        }
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }

    // Innermost scope outward; the distance recorded is how many scopes away
    // from the *current* innermost scope the binding lives. Absence from
    // every scope leaves the reference unresolved, which the interpreter
    // treats as global.
    fn resolve_local(&mut self, id: NodeId, name: &Token) {
        for (i, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&name.lexeme) {
                self.interpreter.resolve(id, i);
                return;
            }
        }
    }

    fn resolve_function(&mut self, params: &[Token], body: &[Stmt], kind: FunctionType) {
        let enclosing_function = mem::replace(&mut self.current_function, kind);
        self.begin_scope();
        for param in params {
            self.declare(param);
            self.define(param);
        }
        self.resolve_stmts(body);
        self.end_scope();
        self.current_function = enclosing_function;
    }
}

impl<'i, 'd> expr::Visitor<()> for Resolver<'i, 'd> {
    fn visit_assign_expr(&mut self, id: NodeId, name: &Token, value: &Expr) {
        self.resolve_expr(value);
        self.resolve_local(id, name);
    }

    fn visit_binary_expr(&mut self, left: &Expr, _operator: &Token, right: &Expr) {
        self.resolve_expr(left);
        self.resolve_expr(right);
    }

    fn visit_call_expr(&mut self, callee: &Expr, _paren: &Token, arguments: &[Expr]) {
        self.resolve_expr(callee);
        for argument in arguments {
            self.resolve_expr(argument);
        }
    }

    // Property dispatch is dynamic: only the object expression is resolved,
    // the property name is looked up at runtime.
    fn visit_get_expr(&mut self, object: &Expr, _name: &Token) {
        self.resolve_expr(object);
    }

    fn visit_grouping_expr(&mut self, expression: &Expr) {
        self.resolve_expr(expression);
    }

    fn visit_literal_expr(&mut self, _value: &LiteralValue) {}

    fn visit_logical_expr(&mut self, left: &Expr, _operator: &Token, right: &Expr) {
        self.resolve_expr(left);
        self.resolve_expr(right);
    }

    fn visit_set_expr(&mut self, object: &Expr, _name: &Token, value: &Expr) {
        self.resolve_expr(value);
        self.resolve_expr(object);
    }

    fn visit_super_expr(&mut self, id: NodeId, keyword: &Token, _method: &Token) {
        match self.current_class {
            ClassType::None => self
                .diagnostics
                .error_at_token(keyword, "Can't use 'super' outside of a class."),
            ClassType::Class => self
                .diagnostics
                .error_at_token(keyword, "Can't use 'super' in a class with no superclass."),
            ClassType::Subclass => self.resolve_local(id, keyword),
        }
    }

    fn visit_this_expr(&mut self, id: NodeId, keyword: &Token) {
        if self.current_class == ClassType::None {
            self.diagnostics
                .error_at_token(keyword, "Can't use 'this' outside of a class.");
            return;
        }
        self.resolve_local(id, keyword);
    }

    fn visit_unary_expr(&mut self, _operator: &Token, right: &Expr) {
        self.resolve_expr(right);
    }

    fn visit_variable_expr(&mut self, id: NodeId, name: &Token) {
        if let Some(false) = self.scopes.last().and_then(|scope| scope.get(&name.lexeme)).copied() {
            self.diagnostics
                .error_at_token(name, "Can't read local variable in its own initializer.");
        }
        self.resolve_local(id, name);
    }
}

impl<'i, 'd> stmt::Visitor<()> for Resolver<'i, 'd> {
    fn visit_block_stmt(&mut self, statements: &[Stmt]) {
        self.begin_scope();
        self.resolve_stmts(statements);
        self.end_scope();
    }

    // A class body opens a scope for `this`, and — when there's a
    // superclass — an outer scope for `super` wrapping that one. Methods
    // named `init` resolve as `Initializer`, everything else as `Method`.
    fn visit_class_stmt(&mut self, name: &Token, superclass: &Option<Expr>, methods: &[Stmt]) {
        let enclosing_class = mem::replace(&mut self.current_class, ClassType::Class);

        self.declare(name);
        self.define(name);

        if let Some(Expr::Variable { name: superclass_name, .. }) = superclass {
            if superclass_name.lexeme == name.lexeme {
                self.diagnostics
                    .error_at_token(superclass_name, "A class can't inherit from itself.");
            }
            self.current_class = ClassType::Subclass;
            self.resolve_expr(superclass.as_ref().unwrap());
        }

        if superclass.is_some() {
            self.begin_scope();
            self.scopes.last_mut().unwrap().insert("super".to_string(), true);
        }

        self.begin_scope();
        self.scopes.last_mut().unwrap().insert("this".to_string(), true);

        for method in methods {
            if let Stmt::Function { name, params, body } = method {
                let kind = if name.lexeme == "init" { FunctionType::Initializer } else { FunctionType::Method };
                self.resolve_function(params, body, kind);
            } else {
                unreachable!("class bodies only ever contain Stmt::Function methods");
            }
        }

        self.end_scope();
        if superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;
    }

    fn visit_expression_stmt(&mut self, expression: &Expr) {
        self.resolve_expr(expression);
    }

    fn visit_function_stmt(&mut self, name: &Token, params: &[Token], body: &[Stmt]) {
        // Defined eagerly, before resolving the body, so a function can
        // recursively refer to itself.
        self.declare(name);
        self.define(name);
        self.resolve_function(params, body, FunctionType::Function);
    }

    fn visit_if_stmt(&mut self, condition: &Expr, then_branch: &Stmt, else_branch: &Option<Box<Stmt>>) {
        self.resolve_expr(condition);
        self.resolve_stmt(then_branch);
        if let Some(else_branch) = else_branch {
            self.resolve_stmt(else_branch);
        }
    }

    fn visit_print_stmt(&mut self, expression: &Expr) {
        self.resolve_expr(expression);
    }

    fn visit_return_stmt(&mut self, keyword: &Token, value: &Option<Expr>) {
        if self.current_function == FunctionType::None {
            self.diagnostics.error_at_token(keyword, "Can't return from top-level code.");
        }

        if let Some(value) = value {
            if self.current_function == FunctionType::Initializer {
                self.diagnostics
                    .error_at_token(keyword, "Can't return a value from an initializer.");
            }
            self.resolve_expr(value);
        }
    }

    // Split into declare-then-define so `var a = a;` sees its own name
    // declared but unresolved while the initializer is walked.
    fn visit_var_stmt(&mut self, name: &Token, initializer: &Option<Expr>) {
        self.declare(name);
        if let Some(initializer) = initializer {
            self.resolve_expr(initializer);
        }
        self.define(name);
    }

    fn visit_while_stmt(&mut self, condition: &Expr, body: &Stmt) {
        self.resolve_expr(condition);
        self.resolve_stmt(body);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::scanner::Scanner;

    fn resolve(source: &str) -> (Interpreter, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let tokens = Scanner::new(source, &mut diagnostics).scan_tokens();
        let statements = Parser::new(&tokens, &mut diagnostics).parse();
        let mut interpreter = Interpreter::new();
        Resolver::new(&mut interpreter, &mut diagnostics).resolve_stmts(&statements);
        (interpreter, diagnostics)
    }

    #[test]
    fn reading_local_in_its_own_initializer_is_an_error() {
        let (_, diagnostics) = resolve("{ var a = a; }");
        assert!(diagnostics.had_error());
    }

    #[test]
    fn redeclaring_a_name_in_the_same_scope_is_an_error() {
        let (_, diagnostics) = resolve("{ var a = 1; var a = 2; }");
        assert!(diagnostics.had_error());
    }

    #[test]
    fn return_outside_function_is_an_error() {
        let (_, diagnostics) = resolve("return 1;");
        assert!(diagnostics.had_error());
    }

    #[test]
    fn returning_a_value_from_init_is_an_error() {
        let (_, diagnostics) = resolve("class A { init() { return 1; } }");
        assert!(diagnostics.had_error());
    }

    #[test]
    fn bare_return_from_init_is_allowed() {
        let (_, diagnostics) = resolve("class A { init() { return; } }");
        assert!(!diagnostics.had_error());
    }

    #[test]
    fn this_outside_class_is_an_error() {
        let (_, diagnostics) = resolve("print this;");
        assert!(diagnostics.had_error());
    }

    #[test]
    fn super_without_superclass_is_an_error() {
        let (_, diagnostics) = resolve("class A { m() { super.m(); } }");
        assert!(diagnostics.had_error());
    }

    #[test]
    fn class_inheriting_from_itself_is_an_error() {
        let (_, diagnostics) = resolve("class A < A {}");
        assert!(diagnostics.had_error());
    }

    #[test]
    fn well_scoped_program_resolves_without_error() {
        let (_, diagnostics) =
            resolve("class A { m() { print \"A\"; } } class B < A { m() { super.m(); } } B().m();");
        assert!(!diagnostics.had_error());
    }
}
