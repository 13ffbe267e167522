use crate::context::Context;
use crate::error::{Error, Result};
use crate::eval::hnf;
use crate::tt::{mk_bound, Binder, Env, Name, RefKind, Term};

/// Unification mode: full two-sided unification, or one-sided matching
/// where only left-hand holes may be bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnifyMode {
    Unify,
    Match,
}

/// The oracle's answer: a substitution for hole names, plus equations it
/// could not decide yet. Impossible equations are not collected here; they
/// raise a hard [`Error::CantUnify`].
#[derive(Debug, Clone, Default)]
pub struct Unification {
    pub subst: Vec<(Name, Term)>,
    pub fails: Vec<(Term, Term)>,
}

/// Full unification of `left` and `right`.
pub fn unify(
    ctxt: &Context,
    env: &Env,
    left: &Term,
    right: &Term,
    injective: &[Name],
    holes: &[Name],
) -> Result<Unification> {
    let mut st = Solver {
        ctxt,
        env,
        injective,
        holes,
        mode: UnifyMode::Unify,
        out: Unification::default(),
    };
    st.un(left, right)?;
    Ok(st.out)
}

/// One-sided matching: holes on the left bind, the right-hand side is
/// rigid. Failures are collected instead of raised.
pub fn match_unify(
    ctxt: &Context,
    env: &Env,
    left: &Term,
    right: &Term,
    injective: &[Name],
    holes: &[Name],
) -> Unification {
    let mut st = Solver {
        ctxt,
        env,
        injective,
        holes,
        mode: UnifyMode::Match,
        out: Unification::default(),
    };
    // in match mode `un` never returns a hard error
    let _ = st.un(left, right);
    st.out
}

struct Solver<'a> {
    ctxt: &'a Context,
    env: &'a Env,
    injective: &'a [Name],
    holes: &'a [Name],
    mode: UnifyMode,
    out: Unification,
}

impl<'a> Solver<'a> {
    fn resolved(&self, t: &Term) -> Term {
        let mut t = t.clone();
        for (n, v) in &self.out.subst {
            t.subst(n, v);
        }
        t
    }

    fn is_hole_ref(&self, t: &Term) -> Option<Name> {
        match t {
            Term::Ref(r) if self.holes.contains(&r.name) => Some(r.name.clone()),
            _ => None,
        }
    }

    fn bind(&mut self, n: Name, t: &Term) -> Result<()> {
        if t.occurs_free(&n) {
            return self.fail(&mk_bound(n, Term::Erased), t);
        }
        self.out.subst.push((n, t.clone()));
        Ok(())
    }

    fn defer(&mut self, l: &Term, r: &Term) {
        self.out.fails.push((l.clone(), r.clone()));
    }

    // In match mode a hard clash is downgraded to a deferred failure.
    fn fail(&mut self, l: &Term, r: &Term) -> Result<()> {
        if self.mode == UnifyMode::Match {
            self.defer(l, r);
            Ok(())
        } else {
            Err(Error::CantUnify {
                left: l.clone(),
                right: r.clone(),
            })
        }
    }

    fn un(&mut self, l0: &Term, r0: &Term) -> Result<()> {
        let l = self.resolved(l0);
        let r = self.resolved(r0);
        if l.alpha_eq(&r) {
            return Ok(());
        }
        if matches!(l, Term::Erased) || matches!(r, Term::Erased) {
            return Ok(());
        }
        // plain hole references bind before any evaluation
        if let Some(n) = self.is_hole_ref(&l) {
            return self.bind(n, &r);
        }
        if self.mode == UnifyMode::Unify {
            if let Some(n) = self.is_hole_ref(&r) {
                return self.bind(n, &l);
            }
        }
        let lw = hnf(self.ctxt, self.env, &l);
        let rw = hnf(self.ctxt, self.env, &r);
        if lw.alpha_eq(&rw) {
            return Ok(());
        }
        if let Some(n) = self.is_hole_ref(&lw) {
            return self.bind(n, &rw);
        }
        if self.mode == UnifyMode::Unify {
            if let Some(n) = self.is_hole_ref(&rw) {
                return self.bind(n, &lw);
            }
        }
        match (&lw, &rw) {
            (Term::Sort(a), Term::Sort(b)) => {
                if a.level == b.level {
                    Ok(())
                } else {
                    self.fail(&lw, &rw)
                }
            }
            (Term::Bind(a), Term::Bind(b)) => {
                let same = matches!(
                    (&a.binder, &b.binder),
                    (Binder::Lam { .. }, Binder::Lam { .. })
                        | (Binder::Pi { .. }, Binder::Pi { .. })
                        | (Binder::PVTy { .. }, Binder::PVTy { .. })
                );
                if !same {
                    return self.fail(&lw, &rw);
                }
                self.un(a.binder.ty(), b.binder.ty())?;
                // rename the right binder to the left's before comparing scopes
                let mut rsc = b.scope.clone();
                rsc.subst(&b.name, &mk_bound(a.name.clone(), a.binder.ty().clone()));
                self.un(&a.scope, &rsc)
            }
            _ => self.un_spines(&lw, &rw),
        }
    }

    fn un_spines(&mut self, lw: &Term, rw: &Term) -> Result<()> {
        let (lh, largs) = lw.unapply();
        let (rh, rargs) = rw.unapply();
        match (lh, rh) {
            (Term::Ref(a), Term::Ref(b)) => {
                let flex_l = self.holes.contains(&a.name);
                let flex_r = self.holes.contains(&b.name);
                if flex_l || flex_r {
                    // an applied hole: pattern unification is out of scope
                    self.defer(lw, rw);
                    return Ok(());
                }
                if a.name == b.name {
                    let decomposable = a.kind.is_constructor()
                        || self.injective.contains(&a.name)
                        || matches!(a.kind, RefKind::Bound);
                    if decomposable && largs.len() == rargs.len() {
                        for (x, y) in largs.iter().zip(rargs.iter()) {
                            self.un(x, y)?;
                        }
                        return Ok(());
                    }
                    // equal heads but nothing forces argument-wise equality
                    self.defer(lw, rw);
                    return Ok(());
                }
                if a.kind.is_constructor() && b.kind.is_constructor() {
                    return self.fail(lw, rw);
                }
                if contains_any_hole(lw, self.holes) || contains_any_hole(rw, self.holes) {
                    self.defer(lw, rw);
                    Ok(())
                } else {
                    self.fail(lw, rw)
                }
            }
            _ => {
                if contains_any_hole(lw, self.holes) || contains_any_hole(rw, self.holes) {
                    self.defer(lw, rw);
                    Ok(())
                } else {
                    self.fail(lw, rw)
                }
            }
        }
    }
}

fn contains_any_hole(t: &Term, holes: &[Name]) -> bool {
    holes.iter().any(|h| t.occurs_free(h))
}
