use crate::context::Context;
use crate::error::{Error, Result};
use crate::eval::{hnf, normalise};
use crate::tt::{
    lookup_env, mk_app, mk_bind, mk_bound, mk_ref, mk_sort, Binder, Env, Raw, Term,
};

/// Type-check a raw term, producing the elaborated term and its type.
pub fn check(ctxt: &Context, env: &Env, raw: &Raw) -> Result<(Term, Term)> {
    match raw {
        Raw::Var(n) => {
            if let Some(b) = lookup_env(env, n) {
                let ty = b.ty().clone();
                return Ok((mk_bound(n.clone(), ty.clone()), ty));
            }
            if let Some(def) = ctxt.lookup_def(n) {
                let ty = def.ty().clone();
                return Ok((mk_ref(def.ref_kind(), n.clone(), ty.clone()), ty));
            }
            Err(Error::NoSuchVariable(n.clone()))
        }
        Raw::App(fun, arg) => {
            let (fv, ft) = check(ctxt, env, fun)?;
            let ft = hnf(ctxt, env, &ft);
            let Term::Bind(pi) = &ft else {
                return Err(Error::NotAFunction(ft));
            };
            let Binder::Pi { ty: dom } = &pi.binder else {
                return Err(Error::NotAFunction(ft.clone()));
            };
            let (av, at) = check(ctxt, env, arg)?;
            converts(ctxt, env, &at, dom)?;
            let mut rty = pi.scope.clone();
            rty.subst(&pi.name, &av);
            Ok((mk_app(fv, av), rty))
        }
        Raw::Bind(n, binder, scope) => check_binder(ctxt, env, n, binder, scope),
        Raw::Sort(l) => Ok((mk_sort(*l), mk_sort(l + 1))),
        Raw::Erased => Ok((Term::Erased, Term::Erased)),
    }
}

fn check_binder(
    ctxt: &Context,
    env: &Env,
    name: &crate::tt::Name,
    binder: &Binder<Raw>,
    scope: &Raw,
) -> Result<(Term, Term)> {
    let (tyv, tyt) = check(ctxt, env, binder.ty())?;
    let under = |b: Binder<Term>, env: &Env| {
        let mut env2 = env.clone();
        env2.push((name.clone(), b));
        env2
    };
    match binder {
        Binder::Lam { .. } => {
            is_type_val(ctxt, env, &tyt)?;
            let env2 = under(Binder::Lam { ty: tyv.clone() }, env);
            let (sv, st) = check(ctxt, &env2, scope)?;
            Ok((
                mk_bind(name.clone(), Binder::Lam { ty: tyv.clone() }, sv),
                mk_bind(name.clone(), Binder::Pi { ty: tyv }, st),
            ))
        }
        Binder::Pi { .. } | Binder::PVTy { .. } => {
            let dom_level = sort_level_of(ctxt, env, &tyt)?;
            let env2 = under(Binder::Pi { ty: tyv.clone() }, env);
            let (sv, st) = check(ctxt, &env2, scope)?;
            let cod_level = sort_level_of(ctxt, &env2, &st)?;
            let b = match binder {
                Binder::PVTy { .. } => Binder::PVTy { ty: tyv },
                _ => Binder::Pi { ty: tyv },
            };
            Ok((
                mk_bind(name.clone(), b, sv),
                mk_sort(dom_level.max(cod_level)),
            ))
        }
        Binder::Let { val, .. } => {
            is_type_val(ctxt, env, &tyt)?;
            let (vv, vt) = check(ctxt, env, val)?;
            converts(ctxt, env, &vt, &tyv)?;
            let env2 = under(
                Binder::Let {
                    ty: tyv.clone(),
                    val: vv.clone(),
                },
                env,
            );
            let (sv, mut st) = check(ctxt, &env2, scope)?;
            st.subst(name, &vv);
            Ok((
                mk_bind(name.clone(), Binder::Let { ty: tyv, val: vv }, sv),
                st,
            ))
        }
        Binder::Hole { .. } | Binder::GHole { .. } => {
            // partial terms: the binder types its scope
            let env2 = under(Binder::Hole { ty: tyv.clone() }, env);
            let (sv, st) = check(ctxt, &env2, scope)?;
            let b = match binder {
                Binder::GHole { .. } => Binder::GHole { ty: tyv },
                _ => Binder::Hole { ty: tyv },
            };
            Ok((mk_bind(name.clone(), b, sv), st))
        }
        Binder::Guess { val, .. } => {
            let (vv, vt) = check(ctxt, env, val)?;
            converts(ctxt, env, &vt, &tyv)?;
            let env2 = under(
                Binder::Guess {
                    ty: tyv.clone(),
                    val: vv.clone(),
                },
                env,
            );
            let (sv, st) = check(ctxt, &env2, scope)?;
            Ok((
                mk_bind(name.clone(), Binder::Guess { ty: tyv, val: vv }, sv),
                st,
            ))
        }
        Binder::PVar { .. } => {
            is_type_val(ctxt, env, &tyt)?;
            let env2 = under(Binder::PVar { ty: tyv.clone() }, env);
            let (sv, st) = check(ctxt, &env2, scope)?;
            Ok((
                mk_bind(name.clone(), Binder::PVar { ty: tyv.clone() }, sv),
                mk_bind(name.clone(), Binder::PVTy { ty: tyv }, st),
            ))
        }
    }
}

/// Definitional equality: α first, then normalise both sides.
pub fn converts(ctxt: &Context, env: &Env, a: &Term, b: &Term) -> Result<()> {
    if a.alpha_eq(b) {
        return Ok(());
    }
    if matches!(a, Term::Erased) || matches!(b, Term::Erased) {
        return Ok(());
    }
    let na = normalise(ctxt, env, a);
    let nb = normalise(ctxt, env, b);
    if na.alpha_eq(&nb) {
        return Ok(());
    }
    Err(Error::CantConvert {
        left: a.clone(),
        right: b.clone(),
    })
}

/// Is the (already elaborated) term a type?
pub fn is_type(ctxt: &Context, env: &Env, t: &Term) -> Result<()> {
    let (_, ty) = check(ctxt, env, &t.forget())?;
    is_type_val(ctxt, env, &ty)
}

fn is_type_val(ctxt: &Context, env: &Env, ty: &Term) -> Result<()> {
    if matches!(ty, Term::Erased) {
        return Ok(());
    }
    let h = hnf(ctxt, env, ty);
    if h.is_sort() {
        Ok(())
    } else {
        Err(Error::NotAType(ty.clone()))
    }
}

fn sort_level_of(ctxt: &Context, env: &Env, ty: &Term) -> Result<u32> {
    if matches!(ty, Term::Erased) {
        return Ok(0);
    }
    let h = hnf(ctxt, env, ty);
    h.sort_level().ok_or_else(|| Error::NotAType(ty.clone()))
}

/// Re-check an elaborated term from its forgotten form.
pub fn recheck(ctxt: &Context, env: &Env, tm: &Term) -> Result<(Term, Term)> {
    check(ctxt, env, &tm.forget())
}
