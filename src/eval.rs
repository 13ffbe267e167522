use crate::context::{Context, Def};
use crate::tt::{lookup_env, mk_app_spine, mk_bind, Binder, Env, Term};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Delta {
    Unfold,
    Keep,
}

/// Full normalisation: β, let, and δ for global definitions and `Let`
/// binders of the environment.
pub fn normalise(ctxt: &Context, env: &Env, t: &Term) -> Term {
    norm(ctxt, env, t, Delta::Unfold)
}

/// Weak-head normal form only.
pub fn hnf(ctxt: &Context, env: &Env, t: &Term) -> Term {
    whnf(ctxt, env, t, Delta::Unfold)
}

/// β and let reduction without unfolding global definitions.
pub fn specialise(ctxt: &Context, env: &Env, t: &Term) -> Term {
    norm(ctxt, env, t, Delta::Keep)
}

fn whnf(ctxt: &Context, env: &Env, t: &Term, delta: Delta) -> Term {
    let (head, args) = t.unapply();
    let mut head = head.clone();
    let mut args: Vec<Term> = args.into_iter().cloned().collect();
    loop {
        match &head {
            Term::App(_) => {
                // a reduct exposed a nested spine: re-split it
                let (h, a) = head.unapply();
                let h = h.clone();
                let mut a: Vec<Term> = a.into_iter().cloned().collect();
                a.append(&mut args);
                head = h;
                args = a;
            }
            Term::Ref(r) => {
                let unfolded = match delta {
                    Delta::Unfold => match ctxt.lookup_def(&r.name) {
                        Some(Def::Function { val, .. }) => Some(val.clone()),
                        _ => match lookup_env(env, &r.name) {
                            Some(Binder::Let { val, .. }) => Some(val.clone()),
                            _ => None,
                        },
                    },
                    Delta::Keep => None,
                };
                match unfolded {
                    Some(v) => head = v,
                    None => break,
                }
            }
            Term::Bind(b) => match &b.binder {
                Binder::Lam { .. } if !args.is_empty() => {
                    let arg = args.remove(0);
                    let mut sc = b.scope.clone();
                    sc.subst(&b.name, &arg);
                    head = sc;
                }
                Binder::Let { val, .. } => {
                    let mut sc = b.scope.clone();
                    sc.subst(&b.name, val);
                    head = sc;
                }
                _ => break,
            },
            _ => break,
        }
    }
    mk_app_spine(head, args)
}

fn norm(ctxt: &Context, env: &Env, t: &Term, delta: Delta) -> Term {
    let t = whnf(ctxt, env, t, delta);
    match &t {
        Term::App(_) => {
            let (head, args) = t.unapply();
            let head = head.clone();
            let args: Vec<Term> = args.into_iter().map(|a| norm(ctxt, env, a, delta)).collect();
            // the head is rigid after whnf; only its annotations remain
            mk_app_spine(head, args)
        }
        Term::Bind(b) => {
            let binder = b.binder.map(|x| norm(ctxt, env, x, delta));
            let mut env2 = env.clone();
            env2.push((b.name.clone(), b.binder.clone()));
            let sc = norm(ctxt, &env2, &b.scope, delta);
            mk_bind(b.name.clone(), binder, sc)
        }
        _ => t,
    }
}
