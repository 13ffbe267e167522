use std::fmt::Display;
use std::mem;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// A name in the proof term language.
///
/// `User` names come from source text and are interned verbatim; `Machine`
/// names are generated by the engine from a base string and a counter drawn
/// from the proof state's own supply, so two machine names are equal exactly
/// when both components are.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Name {
    User(Arc<str>),
    Machine(Arc<str>, u32),
}

#[derive(Error, Debug, Clone)]
#[error("invalid name")]
pub struct InvalidNameError;

impl Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Name::User(s) => write!(f, "{}", s),
            Name::Machine(s, k) => write!(f, "{}{}", s, k),
        }
    }
}

impl TryFrom<&str> for Name {
    type Error = InvalidNameError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Name::intern(value)
    }
}

impl Name {
    pub fn intern(value: &str) -> Result<Name, InvalidNameError> {
        static RE: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r"^[\p{Cased_Letter}_][\p{Cased_Letter}\p{Number}_]*$").unwrap()
        });
        if !RE.is_match(value) {
            return Err(InvalidNameError);
        }
        Ok(Name::User(value.into()))
    }

    pub fn machine(base: &str, counter: u32) -> Name {
        Name::Machine(base.into(), counter)
    }

    /// The base string a derived fresh name is built from.
    pub fn base(&self) -> &str {
        match self {
            Name::User(s) => s,
            Name::Machine(s, _) => s,
        }
    }

    pub fn is_machine(&self) -> bool {
        matches!(self, Name::Machine(..))
    }
}

/// The canonical equality head, recognised by `Rewrite`.
pub fn eq_name() -> Name {
    static EQ: Lazy<Name> = Lazy::new(|| Name::User("=".into()));
    EQ.clone()
}

/// The canonical rewriting constant `replace`.
pub fn replace_name() -> Name {
    static REPLACE: Lazy<Name> = Lazy::new(|| Name::User("replace".into()));
    REPLACE.clone()
}

/// What a reference stands for. Constructors carry their tag so the unifier
/// can decompose applications headed by them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Bound,
    Global,
    DataCon(u32),
    TypeCon(u32),
}

impl RefKind {
    pub fn is_constructor(self) -> bool {
        matches!(self, RefKind::DataCon(_) | RefKind::TypeCon(_))
    }
}

/// A binder annotation. The payload type is generic so elaborated terms
/// (`Binder<Term>`) and raw terms (`Binder<Raw>`) share one shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Binder<T> {
    Lam { ty: T },
    Pi { ty: T },
    Let { ty: T, val: T },
    Hole { ty: T },
    Guess { ty: T, val: T },
    PVar { ty: T },
    PVTy { ty: T },
    GHole { ty: T },
}

impl<T> Binder<T> {
    pub fn ty(&self) -> &T {
        match self {
            Binder::Lam { ty }
            | Binder::Pi { ty }
            | Binder::Let { ty, .. }
            | Binder::Hole { ty }
            | Binder::Guess { ty, .. }
            | Binder::PVar { ty }
            | Binder::PVTy { ty }
            | Binder::GHole { ty } => ty,
        }
    }

    pub fn val(&self) -> Option<&T> {
        match self {
            Binder::Let { val, .. } | Binder::Guess { val, .. } => Some(val),
            _ => None,
        }
    }

    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> Binder<U> {
        match self {
            Binder::Lam { ty } => Binder::Lam { ty: f(ty) },
            Binder::Pi { ty } => Binder::Pi { ty: f(ty) },
            Binder::Let { ty, val } => Binder::Let {
                ty: f(ty),
                val: f(val),
            },
            Binder::Hole { ty } => Binder::Hole { ty: f(ty) },
            Binder::Guess { ty, val } => Binder::Guess {
                ty: f(ty),
                val: f(val),
            },
            Binder::PVar { ty } => Binder::PVar { ty: f(ty) },
            Binder::PVTy { ty } => Binder::PVTy { ty: f(ty) },
            Binder::GHole { ty } => Binder::GHole { ty: f(ty) },
        }
    }

    pub fn is_hole(&self) -> bool {
        matches!(self, Binder::Hole { .. } | Binder::Guess { .. })
    }

    fn tag(&self) -> u8 {
        match self {
            Binder::Lam { .. } => 0,
            Binder::Pi { .. } => 1,
            Binder::Let { .. } => 2,
            Binder::Hole { .. } => 3,
            Binder::Guess { .. } => 4,
            Binder::PVar { .. } => 5,
            Binder::PVTy { .. } => 6,
            Binder::GHole { .. } => 7,
        }
    }
}

impl Binder<Term> {
    pub fn for_each_term(&self, mut f: impl FnMut(&Term)) {
        f(self.ty());
        if let Some(v) = self.val() {
            f(v);
        }
    }

    pub fn for_each_term_mut(&mut self, mut f: impl FnMut(&mut Term)) {
        match self {
            Binder::Lam { ty }
            | Binder::Pi { ty }
            | Binder::Hole { ty }
            | Binder::PVar { ty }
            | Binder::PVTy { ty }
            | Binder::GHole { ty } => f(ty),
            Binder::Let { ty, val } | Binder::Guess { ty, val } => {
                f(ty);
                f(val);
            }
        }
    }

    pub fn forget(&self) -> Binder<Raw> {
        self.map(|t| t.forget())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    #[non_exhaustive]
    Ref(Arc<TermRef>),
    #[non_exhaustive]
    App(Arc<TermApp>),
    #[non_exhaustive]
    Bind(Arc<TermBind>),
    #[non_exhaustive]
    Sort(Arc<TermSort>),
    Erased,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TermRef {
    pub kind: RefKind,
    pub name: Name,
    pub ty: Term,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TermApp {
    pub fun: Term,
    pub arg: Term,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TermBind {
    pub name: Name,
    pub binder: Binder<Term>,
    pub scope: Term,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermSort {
    pub level: u32,
}

impl Default for Term {
    fn default() -> Self {
        Term::Erased
    }
}

#[inline]
pub fn mk_ref(kind: RefKind, name: Name, ty: Term) -> Term {
    Term::Ref(Arc::new(TermRef { kind, name, ty }))
}

#[inline]
pub fn mk_bound(name: Name, ty: Term) -> Term {
    mk_ref(RefKind::Bound, name, ty)
}

#[inline]
pub fn mk_global(name: Name, ty: Term) -> Term {
    mk_ref(RefKind::Global, name, ty)
}

#[inline]
pub fn mk_app(fun: Term, arg: Term) -> Term {
    Term::App(Arc::new(TermApp { fun, arg }))
}

pub fn mk_app_spine(fun: Term, args: impl IntoIterator<Item = Term>) -> Term {
    let mut t = fun;
    for arg in args {
        t = mk_app(t, arg);
    }
    t
}

#[inline]
pub fn mk_bind(name: Name, binder: Binder<Term>, scope: Term) -> Term {
    Term::Bind(Arc::new(TermBind {
        name,
        binder,
        scope,
    }))
}

#[inline]
pub fn mk_sort(level: u32) -> Term {
    Term::Sort(Arc::new(TermSort { level }))
}

impl Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const TERM_PREC_BIND: u8 = 0;
        const TERM_PREC_APP: u8 = 1;
        const TERM_PREC_ATOM: u8 = 2;

        fn fmt_binder(
            name: &Name,
            binder: &Binder<Term>,
            scope: &Term,
            f: &mut std::fmt::Formatter<'_>,
        ) -> std::fmt::Result {
            match binder {
                Binder::Lam { ty } => write!(f, "λ{}:{}. ", name, ty)?,
                Binder::Pi { ty } => write!(f, "Π{}:{}. ", name, ty)?,
                Binder::Let { ty, val } => write!(f, "let {}:{} := {} in ", name, ty, val)?,
                Binder::Hole { ty } => write!(f, "?{}:{}. ", name, ty)?,
                Binder::Guess { ty, val } => write!(f, "?{}:{} ≈ {} in ", name, ty, val)?,
                Binder::PVar { ty } => write!(f, "pat {}:{}. ", name, ty)?,
                Binder::PVTy { ty } => write!(f, "patTy {}:{}. ", name, ty)?,
                Binder::GHole { ty } => write!(f, "?!{}:{}. ", name, ty)?,
            }
            fmt_term(scope, f, TERM_PREC_BIND)
        }

        fn fmt_term(term: &Term, f: &mut std::fmt::Formatter<'_>, prec: u8) -> std::fmt::Result {
            match term {
                Term::Ref(inner) => write!(f, "{}", inner.name),
                Term::App(inner) => {
                    let needs_paren = prec > TERM_PREC_APP;
                    if needs_paren {
                        write!(f, "(")?;
                    }
                    fmt_term(&inner.fun, f, TERM_PREC_APP)?;
                    write!(f, " ")?;
                    fmt_term(&inner.arg, f, TERM_PREC_ATOM)?;
                    if needs_paren {
                        write!(f, ")")?;
                    }
                    Ok(())
                }
                Term::Bind(inner) => {
                    let needs_paren = prec > TERM_PREC_BIND;
                    if needs_paren {
                        write!(f, "(")?;
                    }
                    fmt_binder(&inner.name, &inner.binder, &inner.scope, f)?;
                    if needs_paren {
                        write!(f, ")")?;
                    }
                    Ok(())
                }
                Term::Sort(inner) => {
                    if inner.level == 0 {
                        write!(f, "Type")
                    } else {
                        write!(f, "Type{}", inner.level)
                    }
                }
                Term::Erased => write!(f, "_"),
            }
        }

        fmt_term(self, f, TERM_PREC_BIND)
    }
}

impl Term {
    /// Substitute `value` for free references to `name`, renaming binders
    /// that would capture a free name of `value`.
    pub fn subst(&mut self, name: &Name, value: &Term) {
        match self {
            Term::Ref(inner) => {
                if inner.name == *name {
                    *self = value.clone();
                } else {
                    Arc::make_mut(inner).ty.subst(name, value);
                }
            }
            Term::App(inner) => {
                let inner = Arc::make_mut(inner);
                inner.fun.subst(name, value);
                inner.arg.subst(name, value);
            }
            Term::Bind(inner) => {
                let inner = Arc::make_mut(inner);
                inner.binder.for_each_term_mut(|t| t.subst(name, value));
                if inner.name == *name {
                    return;
                }
                if value.occurs_free(&inner.name) && inner.scope.occurs_free(name) {
                    let fresh = rename_avoiding(&inner.name, &[value, &inner.scope], name);
                    let fresh_ref = mk_bound(fresh.clone(), inner.binder.ty().clone());
                    let old = mem::replace(&mut inner.name, fresh);
                    inner.scope.subst(&old, &fresh_ref);
                }
                inner.scope.subst(name, value);
            }
            Term::Sort(_) | Term::Erased => {}
        }
    }

    /// Binder elimination for a solved hole: substitution of the solution
    /// into the scope. With named scopes this coincides with [`Term::subst`].
    pub fn psubst(&mut self, name: &Name, value: &Term) {
        self.subst(name, value);
    }

    /// Does `name` occur free anywhere in the term (annotations included)?
    pub fn occurs_free(&self, name: &Name) -> bool {
        match self {
            Term::Ref(inner) => inner.name == *name || inner.ty.occurs_free(name),
            Term::App(inner) => inner.fun.occurs_free(name) || inner.arg.occurs_free(name),
            Term::Bind(inner) => {
                let mut found = false;
                inner
                    .binder
                    .for_each_term(|t| found = found || t.occurs_free(name));
                found || (inner.name != *name && inner.scope.occurs_free(name))
            }
            Term::Sort(_) | Term::Erased => false,
        }
    }

    pub fn no_occurrence(&self, name: &Name) -> bool {
        !self.occurs_free(name)
    }

    /// Free names of the term, in first-occurrence order.
    pub fn free_names(&self) -> Vec<Name> {
        fn go(t: &Term, bound: &mut Vec<Name>, acc: &mut Vec<Name>) {
            match t {
                Term::Ref(inner) => {
                    if !bound.contains(&inner.name) && !acc.contains(&inner.name) {
                        acc.push(inner.name.clone());
                    }
                    go(&inner.ty, bound, acc);
                }
                Term::App(inner) => {
                    go(&inner.fun, bound, acc);
                    go(&inner.arg, bound, acc);
                }
                Term::Bind(inner) => {
                    inner.binder.for_each_term(|t| go(t, bound, acc));
                    bound.push(inner.name.clone());
                    go(&inner.scope, bound, acc);
                    bound.pop();
                }
                Term::Sort(_) | Term::Erased => {}
            }
        }
        let mut acc = vec![];
        go(self, &mut vec![], &mut acc);
        acc
    }

    pub fn head(&self) -> &Term {
        let mut t = self;
        while let Term::App(inner) = t {
            t = &inner.fun;
        }
        t
    }

    pub fn args(&self) -> Vec<&Term> {
        let mut t = self;
        let mut args = vec![];
        while let Term::App(inner) = t {
            args.push(&inner.arg);
            t = &inner.fun;
        }
        args.reverse();
        args
    }

    /// Deconstruct an application spine into head and arguments.
    pub fn unapply(&self) -> (&Term, Vec<&Term>) {
        (self.head(), self.args())
    }

    pub fn apply(&mut self, args: impl IntoIterator<Item = Term>) {
        for arg in args {
            let fun = mem::take(self);
            *self = mk_app(fun, arg);
        }
    }

    pub fn is_sort(&self) -> bool {
        matches!(self, Term::Sort(_))
    }

    pub fn sort_level(&self) -> Option<u32> {
        match self {
            Term::Sort(inner) => Some(inner.level),
            _ => None,
        }
    }

    /// Does the term contain a `Hole` or `Guess` binder?
    pub fn has_hole_binder(&self) -> bool {
        match self {
            Term::Ref(inner) => inner.ty.has_hole_binder(),
            Term::App(inner) => inner.fun.has_hole_binder() || inner.arg.has_hole_binder(),
            Term::Bind(inner) => {
                if inner.binder.is_hole() {
                    return true;
                }
                let mut found = false;
                inner
                    .binder
                    .for_each_term(|t| found = found || t.has_hole_binder());
                found || inner.scope.has_hole_binder()
            }
            Term::Sort(_) | Term::Erased => false,
        }
    }

    /// α-equivalence. Reference kinds and type annotations on references are
    /// not compared.
    pub fn alpha_eq(&self, other: &Term) -> bool {
        fn go(l: &Term, r: &Term, pairs: &mut Vec<(Name, Name)>) -> bool {
            match (l, r) {
                (Term::Ref(a), Term::Ref(b)) => {
                    for (x, y) in pairs.iter().rev() {
                        if *x == a.name || *y == b.name {
                            return *x == a.name && *y == b.name;
                        }
                    }
                    a.name == b.name
                }
                (Term::App(a), Term::App(b)) => {
                    go(&a.fun, &b.fun, pairs) && go(&a.arg, &b.arg, pairs)
                }
                (Term::Bind(a), Term::Bind(b)) => {
                    if a.binder.tag() != b.binder.tag() {
                        return false;
                    }
                    if !go(a.binder.ty(), b.binder.ty(), pairs) {
                        return false;
                    }
                    match (a.binder.val(), b.binder.val()) {
                        (Some(va), Some(vb)) => {
                            if !go(va, vb, pairs) {
                                return false;
                            }
                        }
                        (None, None) => {}
                        _ => return false,
                    }
                    pairs.push((a.name.clone(), b.name.clone()));
                    let ok = go(&a.scope, &b.scope, pairs);
                    pairs.pop();
                    ok
                }
                (Term::Sort(a), Term::Sort(b)) => a.level == b.level,
                (Term::Erased, Term::Erased) => true,
                _ => false,
            }
        }
        go(self, other, &mut vec![])
    }

    /// Replace syntactic occurrences of `from` (up to α) by `to`. Subterms
    /// α-equal to `skip` are left untouched and not descended into.
    pub fn replace_term(&mut self, from: &Term, to: &Term, skip: Option<&Term>) {
        if self.alpha_eq(from) {
            *self = to.clone();
            return;
        }
        if let Some(s) = skip {
            if self.alpha_eq(s) {
                return;
            }
        }
        match self {
            Term::Ref(inner) => Arc::make_mut(inner).ty.replace_term(from, to, skip),
            Term::App(inner) => {
                let inner = Arc::make_mut(inner);
                inner.fun.replace_term(from, to, skip);
                inner.arg.replace_term(from, to, skip);
            }
            Term::Bind(inner) => {
                let inner = Arc::make_mut(inner);
                inner
                    .binder
                    .for_each_term_mut(|t| t.replace_term(from, to, skip));
                inner.scope.replace_term(from, to, skip);
            }
            Term::Sort(_) | Term::Erased => {}
        }
    }

    /// Apply a solution set: `Hole` binders whose name is solved are
    /// eliminated with their solution substituted through the scope, and
    /// machine-name references standing for solved holes are replaced.
    pub fn update_solved(&mut self, sub: &[(Name, Term)]) {
        match self {
            Term::Ref(inner) => {
                if inner.name.is_machine() {
                    if let Some((_, v)) = sub.iter().find(|(n, _)| *n == inner.name) {
                        *self = v.clone();
                        return;
                    }
                }
                Arc::make_mut(inner).ty.update_solved(sub);
            }
            Term::App(inner) => {
                let inner = Arc::make_mut(inner);
                inner.fun.update_solved(sub);
                inner.arg.update_solved(sub);
            }
            Term::Bind(inner) => {
                if matches!(inner.binder, Binder::Hole { .. }) {
                    if let Some((_, v)) = sub.iter().find(|(n, _)| *n == inner.name) {
                        let name = inner.name.clone();
                        let mut sc = inner.scope.clone();
                        sc.update_solved(sub);
                        sc.psubst(&name, v);
                        *self = sc;
                        return;
                    }
                }
                let inner = Arc::make_mut(inner);
                inner.binder.for_each_term_mut(|t| t.update_solved(sub));
                inner.scope.update_solved(sub);
            }
            Term::Sort(_) | Term::Erased => {}
        }
    }

    /// Drop elaboration decoration, producing a raw term for re-checking.
    pub fn forget(&self) -> Raw {
        match self {
            Term::Ref(inner) => Raw::Var(inner.name.clone()),
            Term::App(inner) => {
                Raw::App(Box::new(inner.fun.forget()), Box::new(inner.arg.forget()))
            }
            Term::Bind(inner) => Raw::Bind(
                inner.name.clone(),
                Box::new(inner.binder.forget()),
                Box::new(inner.scope.forget()),
            ),
            Term::Sort(inner) => Raw::Sort(inner.level),
            Term::Erased => Raw::Erased,
        }
    }
}

fn rename_avoiding(base: &Name, terms: &[&Term], also: &Name) -> Name {
    let mut k = 0;
    loop {
        let cand = Name::Machine(base.base().into(), k);
        if cand != *also && terms.iter().all(|t| t.no_occurrence(&cand)) {
            return cand;
        }
        k += 1;
    }
}

/// An un-elaborated term, the input shape of every tactic payload that is
/// type-checked before use.
#[derive(Debug, Clone, PartialEq)]
pub enum Raw {
    Var(Name),
    App(Box<Raw>, Box<Raw>),
    Bind(Name, Box<Binder<Raw>>, Box<Raw>),
    Sort(u32),
    Erased,
}

impl Display for Raw {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Raw::Var(n) => write!(f, "{}", n),
            Raw::App(fun, arg) => write!(f, "({} {})", fun, arg),
            Raw::Bind(n, b, sc) => write!(f, "(bind {} : {} in {})", n, b.ty(), sc),
            Raw::Sort(0) => write!(f, "Type"),
            Raw::Sort(l) => write!(f, "Type{}", l),
            Raw::Erased => write!(f, "_"),
        }
    }
}

pub fn raw_var(name: Name) -> Raw {
    Raw::Var(name)
}

pub fn raw_app(fun: Raw, arg: Raw) -> Raw {
    Raw::App(Box::new(fun), Box::new(arg))
}

pub fn raw_app_spine(fun: Raw, args: impl IntoIterator<Item = Raw>) -> Raw {
    let mut t = fun;
    for arg in args {
        t = raw_app(t, arg);
    }
    t
}

/// The binders enclosing a focused subterm, outermost first. Lookups scan
/// from the inside out so shadowing resolves to the innermost binder.
pub type Env = Vec<(Name, Binder<Term>)>;

pub fn lookup_env<'a>(env: &'a Env, name: &Name) -> Option<&'a Binder<Term>> {
    env.iter().rev().find(|(n, _)| n == name).map(|(_, b)| b)
}

/// Π-abstract a term over every binder of the environment.
pub fn bind_env(env: &Env, mut t: Term) -> Term {
    for (n, b) in env.iter().rev() {
        t = mk_bind(n.clone(), Binder::Pi { ty: b.ty().clone() }, t);
    }
    t
}

/// References to every environment binder, in binding order.
pub fn env_refs(env: &Env) -> Vec<Term> {
    env.iter()
        .map(|(n, b)| mk_bound(n.clone(), b.ty().clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Name {
        Name::intern(s).unwrap()
    }

    #[test]
    fn intern_rejects_operators() {
        assert!(Name::intern("=").is_err());
        assert!(Name::intern("x y").is_err());
        assert!(Name::intern("x1").is_ok());
    }

    #[test]
    fn subst_replaces_free_reference() {
        let mut t = mk_app(
            mk_bound(v("f"), Term::Erased),
            mk_bound(v("x"), Term::Erased),
        );
        t.subst(&v("x"), &mk_bound(v("y"), Term::Erased));
        assert!(t.no_occurrence(&v("x")));
        assert!(t.occurs_free(&v("y")));
    }

    #[test]
    fn subst_respects_shadowing() {
        // λx. x is untouched by [y/x]
        let t0 = mk_bind(
            v("x"),
            Binder::Lam { ty: Term::Erased },
            mk_bound(v("x"), Term::Erased),
        );
        let mut t = t0.clone();
        t.subst(&v("x"), &mk_bound(v("y"), Term::Erased));
        assert!(t.alpha_eq(&t0));
    }

    #[test]
    fn subst_avoids_capture() {
        // [y ↦ x](λx. y) must rename the binder, not capture
        let t = mk_bind(
            v("x"),
            Binder::Lam { ty: Term::Erased },
            mk_bound(v("y"), Term::Erased),
        );
        let mut got = t.clone();
        got.subst(&v("y"), &mk_bound(v("x"), Term::Erased));
        let expected = mk_bind(
            v("z"),
            Binder::Lam { ty: Term::Erased },
            mk_bound(v("x"), Term::Erased),
        );
        assert!(got.alpha_eq(&expected));
    }

    #[test]
    fn alpha_eq_ignores_binder_names() {
        let l = mk_bind(
            v("x"),
            Binder::Lam { ty: Term::Erased },
            mk_bound(v("x"), Term::Erased),
        );
        let r = mk_bind(
            v("y"),
            Binder::Lam { ty: Term::Erased },
            mk_bound(v("y"), Term::Erased),
        );
        assert!(l.alpha_eq(&r));
        let free = mk_bind(
            v("x"),
            Binder::Lam { ty: Term::Erased },
            mk_bound(v("z"), Term::Erased),
        );
        assert!(!l.alpha_eq(&free));
    }

    #[test]
    fn update_solved_eliminates_hole_binder() {
        let h = Name::machine("hole", 0);
        let t0 = mk_bind(
            h.clone(),
            Binder::Hole { ty: Term::Erased },
            mk_app(
                mk_bound(v("f"), Term::Erased),
                mk_bound(h.clone(), Term::Erased),
            ),
        );
        let sol = vec![(h.clone(), mk_bound(v("a"), Term::Erased))];
        let mut t = t0;
        t.update_solved(&sol);
        let expected = mk_app(
            mk_bound(v("f"), Term::Erased),
            mk_bound(v("a"), Term::Erased),
        );
        assert!(t.alpha_eq(&expected));
    }

    #[test]
    fn update_solved_is_idempotent() {
        let h = Name::machine("hole", 1);
        let t0 = mk_bind(
            h.clone(),
            Binder::Hole { ty: Term::Erased },
            mk_app(
                mk_bound(v("f"), Term::Erased),
                mk_bound(h.clone(), Term::Erased),
            ),
        );
        let sol = vec![(h.clone(), mk_bound(v("a"), Term::Erased))];
        let mut once = t0.clone();
        once.update_solved(&sol);
        let mut twice = once.clone();
        twice.update_solved(&sol);
        assert!(once.alpha_eq(&twice));
    }

    #[test]
    fn unapply_returns_spine_in_order() {
        let t = mk_app_spine(
            mk_bound(v("f"), Term::Erased),
            [
                mk_bound(v("a"), Term::Erased),
                mk_bound(v("b"), Term::Erased),
            ],
        );
        let (head, args) = t.unapply();
        assert!(head.alpha_eq(&mk_bound(v("f"), Term::Erased)));
        assert_eq!(args.len(), 2);
        assert!(args[0].alpha_eq(&mk_bound(v("a"), Term::Erased)));
        assert!(args[1].alpha_eq(&mk_bound(v("b"), Term::Erased)));
    }

    #[test]
    fn replace_term_skips_protected_subterm() {
        // replacing a by w in (g a b), skipping b
        let a = mk_bound(v("a"), Term::Erased);
        let b = mk_bound(v("b"), Term::Erased);
        let mut t = mk_app_spine(mk_bound(v("g"), Term::Erased), [a.clone(), b.clone()]);
        t.replace_term(&a, &mk_bound(v("w"), Term::Erased), Some(&b));
        assert!(t.no_occurrence(&v("a")));
        assert!(t.occurs_free(&v("b")));
        assert!(t.occurs_free(&v("w")));
    }

    #[test]
    fn forget_round_trips_shape() {
        let t = mk_bind(
            v("x"),
            Binder::Lam { ty: mk_sort(0) },
            mk_bound(v("x"), mk_sort(0)),
        );
        match t.forget() {
            Raw::Bind(n, b, sc) => {
                assert_eq!(n, v("x"));
                assert!(matches!(*b, Binder::Lam { .. }));
                assert!(matches!(*sc, Raw::Var(_)));
            }
            other => panic!("unexpected raw shape: {other:?}"),
        }
    }
}
