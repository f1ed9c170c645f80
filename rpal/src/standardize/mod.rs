//! Standardization: lowering the raw AST into the core calculus
//!
//! The pass is a single bottom-up copy of the input tree. Every child is
//! lowered before the rule for its parent runs, and every rule builds fresh
//! nodes in the output arena, so the result never shares structure with the
//! AST. Definitions never appear in the output: they lower to a
//! [`Definition`] (bound-variable pattern plus value) that the enclosing
//! `let`/`where` turns into `gamma(lambda(X, P), E)`.
//!
//! Only five kinds of node survive: name references (identifiers, literals,
//! operators, `Y*`), `lambda`, `gamma`, `tau` and `->`. Binder kinds (`,` and
//! `()`) may additionally appear as the first child of a `lambda`.

use crate::error::{CompileError, Result};
use crate::tree::{NodeId, NodeKind, Payload, Span, Tree};
use std::collections::HashSet;
use tracing::{debug, trace};

const STACK_RED_ZONE: usize = 64 * 1024;
const STACK_GROW_SIZE: usize = 1024 * 1024;

/// Standardize an AST into a new, disjoint tree
pub fn standardize(ast: &Tree) -> Result<Tree> {
    let root = ast
        .root()
        .ok_or_else(|| CompileError::standardize("tree has no root", Span::SYNTHETIC))?;

    let mut standardizer = Standardizer {
        ast,
        out: Tree::new(),
        rewrites: 0,
    };
    let lowered = standardizer.expr(root)?;
    standardizer.out.set_root(lowered)?;

    debug!(
        ast_nodes = ast.len(),
        st_nodes = standardizer.out.len(),
        rewrites = standardizer.rewrites,
        "standardized tree"
    );

    validate(&standardizer.out)?;
    Ok(standardizer.out)
}

/// Check that every node reachable from the root is a core kind with its
/// fixed arity, that lambdas bind well-formed patterns, and that patterns
/// occur nowhere else
pub fn validate(tree: &Tree) -> Result<()> {
    let root = tree
        .root()
        .ok_or_else(|| CompileError::standardize("tree has no root", Span::SYNTHETIC))?;

    // First children of the lambdas seen so far; preorder visits a lambda
    // before its binder
    let mut binders = HashSet::new();
    for (id, _) in tree.preorder(root) {
        let kind = tree.kind(id);
        let span = tree.span(id);
        let Some(arity) = kind.core_arity() else {
            return Err(CompileError::standardize(
                format!("'{kind}' survived standardization"),
                span,
            ));
        };
        let count = tree.child_count(id);
        if !arity.accepts(count) {
            return Err(CompileError::standardize(
                format!("'{kind}' expects {arity} children, found {count}"),
                span,
            ));
        }
        match kind {
            NodeKind::Lambda => {
                let binder = tree.first_child(id).map(|b| tree.kind(b));
                if !binder.is_some_and(NodeKind::is_binder) {
                    return Err(CompileError::standardize("lambda must bind a name, a tuple of names or ()", span));
                }
                binders.extend(tree.first_child(id));
            }
            NodeKind::Comma | NodeKind::Empty if !binders.contains(&id) => {
                return Err(CompileError::unsupported(
                    format!("bound-variable pattern '{kind}' in expression position"),
                    span,
                ));
            }
            NodeKind::Comma => {
                if tree.children(id).any(|c| tree.kind(c) != NodeKind::Identifier) {
                    return Err(CompileError::standardize("tuple pattern may only contain names", span));
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// A lowered definition: `binder` is bound to `value`
#[derive(Debug, Clone, Copy)]
struct Definition {
    binder: NodeId,
    value: NodeId,
}

struct Standardizer<'a> {
    ast: &'a Tree,
    out: Tree,
    rewrites: usize,
}

impl Standardizer<'_> {
    fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.ast.children(id).collect()
    }

    /// Children of a known construct, checked against its arity
    fn checked_children(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let kind = self.ast.kind(id);
        let children = self.children(id);
        let arity = kind.arity();
        if !arity.accepts(children.len()) {
            return Err(CompileError::standardize(
                format!("'{kind}' expects {arity} children, found {}", children.len()),
                self.ast.span(id),
            ));
        }
        Ok(children)
    }

    /// Children of a fixed-arity construct
    fn exact<const N: usize>(&self, id: NodeId) -> Result<[NodeId; N]> {
        self.checked_children(id)?.try_into().map_err(|children: Vec<NodeId>| {
            let kind = self.ast.kind(id);
            CompileError::standardize(
                format!("'{kind}' expects {N} children, found {}", children.len()),
                self.ast.span(id),
            )
        })
    }

    fn build(&mut self, kind: NodeKind, span: Span, children: &[NodeId]) -> Result<NodeId> {
        Ok(self.out.build(kind, None, span, children)?)
    }

    fn gamma(&mut self, span: Span, rator: NodeId, rand: NodeId) -> Result<NodeId> {
        self.build(NodeKind::Gamma, span, &[rator, rand])
    }

    fn lambda(&mut self, span: Span, binder: NodeId, body: NodeId) -> Result<NodeId> {
        self.build(NodeKind::Lambda, span, &[binder, body])
    }

    fn copy_leaf(&mut self, id: NodeId) -> Result<NodeId> {
        let node = self.ast.node(id);
        Ok(self.out.create(node.kind, node.payload.clone(), node.span)?)
    }

    fn rewrite(&mut self, rule: &'static str, span: Span) {
        self.rewrites += 1;
        trace!(rule, %span, "rewrite");
    }

    /// Nest `lambda(V1, lambda(V2, ... body))` over the given binders
    fn curry(&mut self, span: Span, binders: &[NodeId], body: NodeId) -> Result<NodeId> {
        let mut lowered = Vec::with_capacity(binders.len());
        for &binder in binders {
            lowered.push(self.binder(binder)?);
        }
        let mut body = body;
        for binder in lowered.into_iter().rev() {
            body = self.lambda(span, binder, body)?;
        }
        Ok(body)
    }

    fn expr(&mut self, id: NodeId) -> Result<NodeId> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.expr_inner(id))
    }

    fn expr_inner(&mut self, id: NodeId) -> Result<NodeId> {
        let kind = self.ast.kind(id);
        let span = self.ast.span(id);
        match kind {
            // let X = E in P  =>  gamma(lambda(X, P), E)
            NodeKind::Let => {
                let [def, body] = self.exact::<2>(id)?;
                let def = self.definition(def)?;
                let body = self.expr(body)?;
                self.rewrite("let", span);
                let lambda = self.lambda(span, def.binder, body)?;
                self.gamma(span, lambda, def.value)
            }

            // P where X = E  =>  gamma(lambda(X, P), E)
            NodeKind::Where => {
                let [body, def] = self.exact::<2>(id)?;
                let body = self.expr(body)?;
                let def = self.definition(def)?;
                self.rewrite("where", span);
                let lambda = self.lambda(span, def.binder, body)?;
                self.gamma(span, lambda, def.value)
            }

            // fn V1 ... Vn . E  =>  lambda(V1, ... lambda(Vn, E))
            NodeKind::Lambda => {
                let children = self.checked_children(id)?;
                let (body, binders) = children.split_last().ok_or_else(|| {
                    CompileError::standardize("'lambda' has no body", span)
                })?;
                let body = self.expr(*body)?;
                if binders.len() > 1 {
                    self.rewrite("lambda", span);
                }
                self.curry(span, binders, body)
            }

            NodeKind::Tau | NodeKind::Cond | NodeKind::Gamma => {
                let children = self.checked_children(id)?;
                let mut lowered = Vec::with_capacity(children.len());
                for child in children {
                    lowered.push(self.expr(child)?);
                }
                self.build(kind, span, &lowered)
            }

            // A op B  =>  gamma(gamma(op, A), B)
            NodeKind::Binary => {
                let [left, right] = self.exact::<2>(id)?;
                let op = self.operator(id)?;
                let left = self.expr(left)?;
                let right = self.expr(right)?;
                self.rewrite("binop", span);
                let op = self.out.create(NodeKind::Operator, Some(Payload::Op(op)), span)?;
                let partial = self.gamma(span, op, left)?;
                self.gamma(span, partial, right)
            }

            // op A  =>  gamma(op, A)
            NodeKind::Unary => {
                let [operand] = self.exact::<1>(id)?;
                let op = self.operator(id)?;
                let operand = self.expr(operand)?;
                self.rewrite("unop", span);
                let op = self.out.create(NodeKind::Operator, Some(Payload::Op(op)), span)?;
                self.gamma(span, op, operand)
            }

            // E1 @ N E2  =>  gamma(gamma(N, E1), E2)
            NodeKind::At => {
                let [left, func, right] = self.exact::<3>(id)?;
                let left = self.expr(left)?;
                let func = self.expr(func)?;
                let right = self.expr(right)?;
                self.rewrite("@", span);
                let partial = self.gamma(span, func, left)?;
                self.gamma(span, partial, right)
            }

            NodeKind::Identifier
            | NodeKind::Integer
            | NodeKind::Str
            | NodeKind::True
            | NodeKind::False
            | NodeKind::Nil
            | NodeKind::Dummy
            | NodeKind::YStar
            | NodeKind::Operator => {
                self.checked_children(id)?;
                self.copy_leaf(id)
            }

            NodeKind::Within | NodeKind::And | NodeKind::Rec | NodeKind::Equal | NodeKind::FunctionForm => {
                Err(CompileError::standardize(
                    format!("definition '{kind}' used where an expression is expected"),
                    span,
                ))
            }

            NodeKind::Comma | NodeKind::Empty => Err(CompileError::unsupported(
                format!("bound-variable pattern '{kind}' in expression position"),
                span,
            )),
        }
    }

    fn operator(&self, id: NodeId) -> Result<crate::tree::Operator> {
        self.ast
            .payload(id)
            .and_then(Payload::as_op)
            .ok_or_else(|| {
                let kind = self.ast.kind(id);
                CompileError::standardize(format!("'{kind}' node carries no operator"), self.ast.span(id))
            })
    }

    fn definition(&mut self, id: NodeId) -> Result<Definition> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.definition_inner(id))
    }

    fn definition_inner(&mut self, id: NodeId) -> Result<Definition> {
        let kind = self.ast.kind(id);
        let span = self.ast.span(id);
        match kind {
            NodeKind::Equal => {
                let [binder, value] = self.exact::<2>(id)?;
                let binder = self.binder(binder)?;
                let value = self.expr(value)?;
                Ok(Definition { binder, value })
            }

            // f V1 ... Vn = E  =>  f = lambda(V1, ... lambda(Vn, E))
            NodeKind::FunctionForm => {
                let children = self.checked_children(id)?;
                let (name, rest) = children
                    .split_first()
                    .ok_or_else(|| CompileError::standardize("'function_form' has no name", span))?;
                let (body, params) = rest
                    .split_last()
                    .ok_or_else(|| CompileError::standardize("'function_form' has no body", span))?;
                if self.ast.kind(*name) != NodeKind::Identifier {
                    return Err(CompileError::standardize("function name must be an identifier", self.ast.span(*name)));
                }
                let name = self.copy_leaf(*name)?;
                let body = self.expr(*body)?;
                self.rewrite("function_form", span);
                let value = self.curry(span, params, body)?;
                Ok(Definition { binder: name, value })
            }

            // X1 = E1 within X2 = E2  =>  X2 = gamma(lambda(X1, E2), E1)
            NodeKind::Within => {
                let [inner, outer] = self.exact::<2>(id)?;
                let inner = self.definition(inner)?;
                let outer = self.definition(outer)?;
                self.rewrite("within", span);
                let lambda = self.lambda(span, inner.binder, outer.value)?;
                let value = self.gamma(span, lambda, inner.value)?;
                Ok(Definition { binder: outer.binder, value })
            }

            // X1 = E1 and ... and Xn = En  =>  (X1, ..., Xn) = tau(E1, ..., En)
            NodeKind::And => {
                let children = self.checked_children(id)?;
                let mut binders = Vec::with_capacity(children.len());
                let mut values = Vec::with_capacity(children.len());
                for child in children {
                    let def = self.definition(child)?;
                    if self.out.kind(def.binder) != NodeKind::Identifier {
                        return Err(CompileError::standardize(
                            "simultaneous definitions must each bind a single name",
                            self.ast.span(child),
                        ));
                    }
                    binders.push(def.binder);
                    values.push(def.value);
                }
                self.rewrite("and", span);
                let binder = self.build(NodeKind::Comma, span, &binders)?;
                let value = self.build(NodeKind::Tau, span, &values)?;
                Ok(Definition { binder, value })
            }

            // rec X = E  =>  X = gamma(Y*, lambda(X, E))
            NodeKind::Rec => {
                let [inner] = self.exact::<1>(id)?;
                let inner = self.definition(inner)?;
                self.rewrite("rec", span);
                let inner_binder = self.out.duplicate(inner.binder)?;
                let ystar = self.out.create(NodeKind::YStar, None, span)?;
                let lambda = self.lambda(span, inner_binder, inner.value)?;
                let value = self.gamma(span, ystar, lambda)?;
                Ok(Definition { binder: inner.binder, value })
            }

            _ => Err(CompileError::standardize(
                format!("expected a definition, found '{kind}'"),
                span,
            )),
        }
    }

    /// Copy a bound-variable pattern
    fn binder(&mut self, id: NodeId) -> Result<NodeId> {
        let kind = self.ast.kind(id);
        let span = self.ast.span(id);
        match kind {
            NodeKind::Identifier | NodeKind::Empty => {
                self.checked_children(id)?;
                self.copy_leaf(id)
            }
            NodeKind::Comma => {
                let children = self.checked_children(id)?;
                let mut names = Vec::with_capacity(children.len());
                for child in children {
                    if self.ast.kind(child) != NodeKind::Identifier {
                        return Err(CompileError::standardize(
                            "tuple pattern may only contain names",
                            self.ast.span(child),
                        ));
                    }
                    names.push(self.copy_leaf(child)?);
                }
                self.build(NodeKind::Comma, span, &names)
            }
            _ => Err(CompileError::unsupported(
                format!("'{kind}' as a bound-variable pattern"),
                span,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    fn st(source: &str) -> Tree {
        let ast = parse(tokenize(source).unwrap()).unwrap();
        standardize(&ast).unwrap()
    }

    fn st_sexpr(source: &str) -> String {
        let tree = st(source);
        tree.view(tree.root().unwrap()).sexpr()
    }

    #[test]
    fn test_let() {
        assert_eq!(st_sexpr("let x = 3 in x + 4"), "gamma(lambda(x, gamma(gamma(+, x), 4)), 3)");
    }

    #[test]
    fn test_where_matches_let() {
        assert_eq!(st_sexpr("x + 4 where x = 3"), st_sexpr("let x = 3 in x + 4"));
    }

    #[test]
    fn test_function_form() {
        assert_eq!(st_sexpr("let f x y = x in f"), "gamma(lambda(f, f), lambda(x, lambda(y, x)))");
    }

    #[test]
    fn test_multi_binder_lambda() {
        assert_eq!(st_sexpr("fn x y. x"), "lambda(x, lambda(y, x))");
    }

    #[test]
    fn test_within() {
        assert_eq!(
            st_sexpr("let a = 1 within b = a in b"),
            "gamma(lambda(b, b), gamma(lambda(a, a), 1))"
        );
    }

    #[test]
    fn test_and() {
        assert_eq!(
            st_sexpr("let a = 1 and b = 2 in a"),
            "gamma(lambda(,(a, b), a), tau(1, 2))"
        );
    }

    #[test]
    fn test_rec() {
        assert_eq!(
            st_sexpr("let rec f n = f n in f"),
            "gamma(lambda(f, f), gamma(Y*, lambda(f, lambda(n, gamma(f, n)))))"
        );
    }

    #[test]
    fn test_mutual_rec() {
        assert_eq!(
            st_sexpr("let rec (f x = g x and g x = x) in f"),
            "gamma(lambda(,(f, g), f), gamma(Y*, lambda(,(f, g), tau(lambda(x, gamma(g, x)), lambda(x, x)))))"
        );
    }

    #[test]
    fn test_rec_binder_is_cloned_not_shared() {
        let tree = st("let rec f n = n in f");
        let root = tree.root().unwrap();
        let idents: Vec<NodeId> = tree
            .preorder(root)
            .filter(|(id, _)| tree.ident(*id) == Some("f"))
            .map(|(id, _)| id)
            .collect();
        assert_eq!(idents.len(), 3);
        let mut unique = idents.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn test_at() {
        assert_eq!(st_sexpr("a @f b"), "gamma(gamma(f, a), b)");
    }

    #[test]
    fn test_unary_operators() {
        assert_eq!(st_sexpr("not true"), "gamma(not, true)");
        assert_eq!(st_sexpr("-3"), "gamma(neg, 3)");
    }

    #[test]
    fn test_conditional_and_tuple_are_kept() {
        assert_eq!(st_sexpr("x -> (1, 2) | nil"), "->(x, tau(1, 2), nil)");
    }

    #[test]
    fn test_standardization_is_idempotent() {
        let sources = [
            "let x = 3 in x + 4",
            "let rec f n = n eq 0 -> 1 | n * f (n - 1) in f 5",
            "let rec (f x = g x and g x = x) in f",
            "(fn (a, b) (). a) (1, 2) nil",
            "x @Conc 'y' where x = 'z'",
        ];
        for source in sources {
            let once = st(source);
            let twice = standardize(&once).unwrap();
            assert!(
                once.same_shape(once.root().unwrap(), &twice, twice.root().unwrap()),
                "not idempotent: {source}"
            );
        }
    }

    #[test]
    fn test_output_is_disjoint_from_input() {
        let ast = parse(tokenize("let x = 1 in x").unwrap()).unwrap();
        let before = ast.view(ast.root().unwrap()).dump();
        let tree = standardize(&ast).unwrap();
        assert_eq!(ast.view(ast.root().unwrap()).dump(), before);
        assert_ne!(tree.len(), 0);
    }

    #[test]
    fn test_conditional_arity_error() {
        let mut ast = Tree::new();
        let s = Span::new(0, 5);
        let c = ast.create(NodeKind::True, None, s).unwrap();
        let t = ast.create(NodeKind::Integer, Some(Payload::Int(1)), s).unwrap();
        let cond = ast.build(NodeKind::Cond, None, s, &[c, t]).unwrap();
        ast.set_root(cond).unwrap();

        let err = standardize(&ast).unwrap_err();
        assert_eq!(err.kind(), "StandardizationError");
        assert!(err.message().contains("'->' expects 3 children, found 2"), "{}", err.message());
    }

    #[test]
    fn test_binder_in_expression_is_unsupported() {
        let mut ast = Tree::new();
        let empty = ast.create(NodeKind::Empty, None, Span::new(0, 2)).unwrap();
        ast.set_root(empty).unwrap();
        let err = standardize(&ast).unwrap_err();
        assert_eq!(err.kind(), "UnsupportedConstruct");
    }

    #[test]
    fn test_definition_as_expression_is_rejected() {
        let mut ast = Tree::new();
        let s = Span::new(0, 5);
        let x = ast.create_ident("x", s).unwrap();
        let one = ast.create(NodeKind::Integer, Some(Payload::Int(1)), s).unwrap();
        let eq = ast.build(NodeKind::Equal, None, s, &[x, one]).unwrap();
        ast.set_root(eq).unwrap();
        let err = standardize(&ast).unwrap_err();
        assert_eq!(err.kind(), "StandardizationError");
    }

    #[test]
    fn test_and_with_tuple_binder_is_rejected() {
        let ast = parse(tokenize("let a, b = 1, 2 and c = 3 in c").unwrap()).unwrap();
        let err = standardize(&ast).unwrap_err();
        assert!(err.message().contains("single name"));
    }

    #[test]
    fn test_missing_root() {
        let err = standardize(&Tree::new()).unwrap_err();
        assert!(err.message().contains("no root"));
    }

    #[test]
    fn test_validate_rejects_sugar() {
        let ast = parse(tokenize("let x = 1 in x").unwrap()).unwrap();
        let err = validate(&ast).unwrap_err();
        assert!(err.message().contains("'let' survived"));
    }

    #[test]
    fn test_validate_rejects_pattern_outside_lambda() {
        // gamma(lambda(x, x), ())
        let mut tree = Tree::new();
        let s = Span::new(0, 3);
        let x = tree.create_ident("x", s).unwrap();
        let body = tree.create_ident("x", s).unwrap();
        let lambda = tree.build(NodeKind::Lambda, None, s, &[x, body]).unwrap();
        let empty = tree.create(NodeKind::Empty, None, s).unwrap();
        let gamma = tree.build(NodeKind::Gamma, None, s, &[lambda, empty]).unwrap();
        tree.set_root(gamma).unwrap();

        let err = validate(&tree).unwrap_err();
        assert_eq!(err.kind(), "UnsupportedConstruct");
        assert_eq!(standardize(&tree).unwrap_err().kind(), err.kind());
    }

    #[test]
    fn test_validate_rejects_tuple_pattern_as_lambda_body() {
        // lambda(x, ,(a, b))
        let mut tree = Tree::new();
        let s = Span::SYNTHETIC;
        let x = tree.create_ident("x", s).unwrap();
        let a = tree.create_ident("a", s).unwrap();
        let b = tree.create_ident("b", s).unwrap();
        let comma = tree.build(NodeKind::Comma, None, s, &[a, b]).unwrap();
        let lambda = tree.build(NodeKind::Lambda, None, s, &[x, comma]).unwrap();
        tree.set_root(lambda).unwrap();

        assert_eq!(validate(&tree).unwrap_err().kind(), "UnsupportedConstruct");
    }

    #[test]
    fn test_validate_accepts_patterns_in_binder_position() {
        let tree = st("(fn (a, b). a + b) (1, 2), (fn (). 3) nil");
        validate(&tree).unwrap();
    }

    #[test]
    fn test_arity_invariant_holds() {
        let tree = st("let rec f (a, b) = a -> f (b, a) | b in f (true, false) where c = 1, 2");
        for (id, _) in tree.preorder(tree.root().unwrap()) {
            let arity = tree.kind(id).core_arity().unwrap();
            assert!(arity.accepts(tree.child_count(id)));
        }
    }
}
