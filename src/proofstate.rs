use std::fmt::Display;
use std::mem;

use crate::context::{Context, MetaInformation};
use crate::error::{Error, Result};
use crate::eval::{hnf, normalise, specialise};
use crate::tt::{
    bind_env, env_refs, eq_name, lookup_env, mk_app_spine, mk_bind, mk_bound, mk_global,
    replace_name, Binder, Env, Name, Raw, Term,
};
use crate::typecheck::{check, converts, recheck};
use crate::unify::{match_unify, unify, Unification, UnifyMode};

/// A deferred unification equation, kept with the environment it arose in
/// and the error it would report if it never succeeds.
#[derive(Debug, Clone)]
pub struct Problem {
    pub left: Term,
    pub right: Term,
    pub env: Env,
    pub error: Error,
    pub mode: UnifyMode,
}

/// The tactic language. One variant per operation; `process_tactic`
/// interprets them against the focused hole.
#[derive(Debug, Clone)]
pub enum Tactic {
    Attack,
    Claim(Name, Raw),
    Reorder(Name),
    Exact(Raw),
    Fill(Raw),
    MatchFill(Raw),
    PrepFill(Name, Vec<Name>),
    CompleteFill,
    Regret,
    Solve,
    StartUnify(Name),
    EndUnify,
    Compute,
    HnfCompute,
    Simplify,
    ComputeLet(Name),
    EvalIn(Raw),
    CheckIn(Raw),
    Intro(Option<Name>),
    IntroTy(Raw, Option<Name>),
    Forall(Name, Raw),
    LetBind(Name, Raw, Raw),
    ExpandLet(Name, Term),
    Rewrite(Raw),
    Induction(Name),
    Equiv(Raw),
    PatVar(Name),
    PatBind(Name),
    Focus(Name),
    MoveLast(Name),
    Defer(Name),
    DeferType(Name, Raw, Vec<Name>),
    Instance(Name),
    SetInjective(Name),
    MatchProblems(bool),
    UnifyProblems,
    ProofState,
    Undo,
    Qed,
}

/// The whole state of an interactive proof. Every successful tactic
/// produces a new state whose `previous` holds a snapshot of the prior one
/// (exactly one step; the snapshot's own `previous` is cleared).
#[derive(Debug, Clone)]
pub struct ProofState {
    thname: Name,
    holes: Vec<Name>,
    usedns: Vec<Name>,
    nextname: u32,
    pterm: Term,
    ptype: Term,
    dontunify: Vec<Name>,
    unified: (Name, Vec<(Name, Term)>),
    notunified: Vec<(Name, Term)>,
    solved: Option<(Name, Term)>,
    problems: Vec<Problem>,
    injective: Vec<Name>,
    deferred: Vec<Name>,
    instances: Vec<Name>,
    previous: Option<Box<ProofState>>,
    context: Context,
    plog: String,
    unifylog: bool,
    done: bool,
}

/// Begin a proof of `ty`, named `thname`, over the given context.
pub fn new_proof(thname: Name, context: Context, ty: Term) -> ProofState {
    let mut ps = ProofState {
        thname,
        holes: vec![],
        usedns: vec![],
        nextname: 0,
        pterm: Term::Erased,
        ptype: ty.clone(),
        dontunify: vec![],
        unified: (Name::machine("unify", 0), vec![]),
        notunified: vec![],
        solved: None,
        problems: vec![],
        injective: vec![],
        deferred: vec![],
        instances: vec![],
        previous: None,
        context,
        plog: String::new(),
        unifylog: false,
        done: false,
    };
    let h = ps.get_name("hole");
    ps.unified = (h.clone(), vec![]);
    ps.pterm = mk_bind(
        h.clone(),
        Binder::Hole { ty: ty.clone() },
        mk_bound(h.clone(), ty),
    );
    ps.holes = vec![h];
    ps
}

impl ProofState {
    pub fn holes(&self) -> &[Name] {
        &self.holes
    }

    pub fn focus(&self) -> Option<&Name> {
        self.holes.first()
    }

    pub fn term(&self) -> &Term {
        &self.pterm
    }

    pub fn goal_type(&self) -> &Term {
        &self.ptype
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    pub fn deferred(&self) -> &[Name] {
        &self.deferred
    }

    pub fn instances(&self) -> &[Name] {
        &self.instances
    }

    pub fn notunified(&self) -> &[(Name, Term)] {
        &self.notunified
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Mark a user-supplied name: unification must not rewrite it
    /// unilaterally.
    pub fn add_dont_unify(&mut self, name: Name) {
        if !self.dontunify.contains(&name) {
            self.dontunify.push(name);
        }
    }

    pub fn set_unify_log(&mut self, on: bool) {
        self.unifylog = on;
    }

    /// The environment enclosing the focused hole, outermost first.
    pub fn env_at_focus(&self) -> Result<Env> {
        self.goal_at_focus().map(|(env, _)| env)
    }

    /// The focused hole's environment and binder.
    pub fn goal_at_focus(&self) -> Result<(Env, Binder<Term>)> {
        let h = self
            .holes
            .first()
            .ok_or_else(|| Error::Tactic("Nothing to fill in.".to_string()))?;
        find_hole(&self.pterm, h, &mut Env::new()).ok_or_else(|| Error::CantFindHole(h.clone()))
    }

    /// Run one tactic. On success the state advances and the tactic log is
    /// returned; on failure the state is untouched.
    pub fn process_tactic(&mut self, t: Tactic) -> Result<String> {
        match t {
            Tactic::ProofState => Ok(self.to_string()),
            Tactic::Undo => {
                let prev = self
                    .previous
                    .take()
                    .ok_or_else(|| Error::Tactic("Nothing to undo.".to_string()))?;
                *self = *prev;
                Ok(String::new())
            }
            Tactic::Qed => {
                if !self.holes.is_empty() {
                    return Err(Error::Tactic("Still holes to fill.".to_string()));
                }
                let (tm, _ty) = recheck(&self.context, &Env::new(), &self.pterm)?;
                self.pterm = tm;
                self.done = true;
                self.previous = None;
                Ok(format!("Proof complete: {}", self.thname))
            }
            t => {
                let mut snapshot = self.clone();
                snapshot.previous = None;
                let mut work = self.clone();
                work.plog.clear();
                work.run_tactic(t)?;
                if let Some((n, v)) = work.solved.take() {
                    let ns = vec![(n, v)];
                    let probs = mem::take(&mut work.problems);
                    let (ns, probs) = update_problems(
                        &work.context,
                        ns,
                        probs,
                        &work.injective,
                        &work.holes,
                        None,
                    );
                    work.problems = probs;
                    work.pterm.update_solved(&ns);
                    update_notunified(&mut work.notunified, &ns);
                    // the first entry's hole was already removed by solve
                    work.holes
                        .retain(|h| !ns.iter().skip(1).any(|(m, _)| m == h));
                }
                work.previous = Some(Box::new(snapshot));
                let log = mem::take(&mut work.plog);
                *self = work;
                Ok(log)
            }
        }
    }

    fn run_tactic(&mut self, t: Tactic) -> Result<()> {
        match t {
            Tactic::Attack => self.with_focus(|ps, env, tm| ps.t_attack(env, tm)),
            Tactic::Claim(n, ty) => self.with_focus(move |ps, env, tm| ps.t_claim(&n, &ty, env, tm)),
            Tactic::Reorder(n) => {
                self.run_at(&n, &|ps: &mut ProofState, env: &Env, tm: &Term| {
                    ps.t_reorder(env, tm)
                })
            }
            Tactic::Exact(e) => self.with_focus(move |ps, env, tm| ps.t_exact(&e, env, tm)),
            Tactic::Fill(e) => self.with_focus(move |ps, env, tm| ps.t_fill(&e, env, tm)),
            Tactic::MatchFill(e) => {
                self.with_focus(move |ps, env, tm| ps.t_match_fill(&e, env, tm))
            }
            Tactic::PrepFill(f, args) => {
                self.with_focus(move |ps, env, tm| ps.t_prep_fill(&f, &args, env, tm))
            }
            Tactic::CompleteFill => self.with_focus(|ps, env, tm| ps.t_complete_fill(env, tm)),
            Tactic::Regret => self.with_focus(|ps, env, tm| ps.t_regret(env, tm)),
            Tactic::Solve => self.with_focus(|ps, env, tm| ps.t_solve(env, tm)),
            Tactic::StartUnify(n) => {
                self.unified = (n, vec![]);
                Ok(())
            }
            Tactic::EndUnify => self.end_unify(),
            Tactic::Compute => self.with_focus(|ps, env, tm| ps.t_compute(env, tm)),
            Tactic::HnfCompute => self.with_focus(|ps, env, tm| ps.t_hnf_compute(env, tm)),
            Tactic::Simplify => self.with_focus(|ps, env, tm| ps.t_simplify(env, tm)),
            Tactic::ComputeLet(n) => self.compute_let(&n),
            Tactic::EvalIn(e) => self.with_focus(move |ps, env, tm| ps.t_eval_in(&e, env, tm)),
            Tactic::CheckIn(e) => self.with_focus(move |ps, env, tm| ps.t_check_in(&e, env, tm)),
            Tactic::Intro(mn) => self.with_focus(move |ps, env, tm| ps.t_intro(mn.as_ref(), env, tm)),
            Tactic::IntroTy(ty, mn) => {
                self.with_focus(move |ps, env, tm| ps.t_intro_ty(&ty, mn.as_ref(), env, tm))
            }
            Tactic::Forall(n, ty) => {
                self.with_focus(move |ps, env, tm| ps.t_forall(&n, &ty, env, tm))
            }
            Tactic::LetBind(n, ty, val) => {
                self.with_focus(move |ps, env, tm| ps.t_let_bind(&n, &ty, &val, env, tm))
            }
            Tactic::ExpandLet(n, v) => self.expand_let(&n, &v),
            Tactic::Rewrite(e) => self.with_focus(move |ps, env, tm| ps.t_rewrite(&e, env, tm)),
            Tactic::Induction(n) => self.with_focus(move |ps, env, tm| ps.t_induction(&n, env, tm)),
            Tactic::Equiv(ty) => self.with_focus(move |ps, env, tm| ps.t_equiv(&ty, env, tm)),
            Tactic::PatVar(n) => self.with_focus(move |ps, env, tm| ps.t_patvar(&n, env, tm)),
            Tactic::PatBind(n) => self.with_focus(move |ps, env, tm| ps.t_patbind(&n, env, tm)),
            Tactic::Focus(n) => {
                if self.holes.contains(&n) {
                    self.holes.retain(|h| *h != n);
                    self.holes.insert(0, n);
                }
                Ok(())
            }
            Tactic::MoveLast(n) => {
                if self.holes.contains(&n) {
                    self.holes.retain(|h| *h != n);
                    self.holes.push(n);
                }
                Ok(())
            }
            Tactic::Defer(n) => self.with_focus(move |ps, env, tm| ps.t_defer(&n, env, tm)),
            Tactic::DeferType(n, ty, args) => {
                self.with_focus(move |ps, env, tm| ps.t_defer_type(&n, &ty, &args, env, tm))
            }
            Tactic::Instance(n) => {
                if !self.instances.contains(&n) {
                    self.instances.push(n.clone());
                }
                if self.holes.contains(&n) {
                    self.holes.retain(|h| *h != n);
                    self.holes.push(n);
                }
                Ok(())
            }
            Tactic::SetInjective(n) => {
                if !self.injective.contains(&n) {
                    self.injective.push(n);
                }
                Ok(())
            }
            Tactic::MatchProblems(all) => self.retry_problems(Some(UnifyMode::Match), all),
            Tactic::UnifyProblems => self.retry_problems(Some(UnifyMode::Unify), true),
            Tactic::ProofState | Tactic::Undo | Tactic::Qed => unreachable!("handled by process_tactic"),
        }
    }

    fn get_name(&mut self, base: &str) -> Name {
        loop {
            let n = Name::machine(base, self.nextname);
            self.nextname += 1;
            if !self.usedns.contains(&n) && !self.context.contains(&n) {
                self.usedns.push(n.clone());
                return n;
            }
        }
    }

    fn claim_user_name(&mut self, n: &Name) {
        if !self.usedns.contains(n) {
            self.usedns.push(n.clone());
        }
    }

    fn with_focus<F>(&mut self, f: F) -> Result<()>
    where
        F: Fn(&mut ProofState, &Env, &Term) -> Result<Term>,
    {
        let h = self
            .holes
            .first()
            .cloned()
            .ok_or_else(|| Error::Tactic("Nothing to fill in.".to_string()))?;
        self.run_at(&h, &f)
    }

    fn run_at<F>(&mut self, hole: &Name, f: &F) -> Result<()>
    where
        F: Fn(&mut ProofState, &Env, &Term) -> Result<Term>,
    {
        let tm = mem::take(&mut self.pterm);
        let mut env = Env::new();
        match self.at_h(f, hole, &mut env, &tm) {
            Ok(Some(tm2)) => {
                self.pterm = tm2;
                Ok(())
            }
            Ok(None) => {
                self.pterm = tm;
                Err(Error::CantFindHole(hole.clone()))
            }
            Err(e) => {
                self.pterm = tm;
                Err(e)
            }
        }
    }

    /// Descend to the first `Hole`/`Guess` binder named `hole` and apply
    /// `f` there. A guess's candidate value is searched before its
    /// annotation and scope; an ordinary binder's scope is searched before
    /// its annotation.
    fn at_h<F>(&mut self, f: &F, hole: &Name, env: &mut Env, t: &Term) -> Result<Option<Term>>
    where
        F: Fn(&mut ProofState, &Env, &Term) -> Result<Term>,
    {
        match t {
            Term::App(inner) => {
                if let Some(fun) = self.at_h(f, hole, env, &inner.fun)? {
                    return Ok(Some(crate::tt::mk_app(fun, inner.arg.clone())));
                }
                if let Some(arg) = self.at_h(f, hole, env, &inner.arg)? {
                    return Ok(Some(crate::tt::mk_app(inner.fun.clone(), arg)));
                }
                Ok(None)
            }
            Term::Bind(inner) => {
                if inner.name == *hole && inner.binder.is_hole() {
                    return f(self, env, t).map(Some);
                }
                match &inner.binder {
                    Binder::Guess { ty, val } => {
                        if let Some(val2) = self.at_h(f, hole, env, val)? {
                            return Ok(Some(mk_bind(
                                inner.name.clone(),
                                Binder::Guess {
                                    ty: ty.clone(),
                                    val: val2,
                                },
                                inner.scope.clone(),
                            )));
                        }
                        if let Some(ty2) = self.at_h(f, hole, env, ty)? {
                            return Ok(Some(mk_bind(
                                inner.name.clone(),
                                Binder::Guess {
                                    ty: ty2,
                                    val: val.clone(),
                                },
                                inner.scope.clone(),
                            )));
                        }
                        env.push((inner.name.clone(), inner.binder.clone()));
                        let r = self.at_h(f, hole, env, &inner.scope);
                        env.pop();
                        Ok(r?.map(|sc| mk_bind(inner.name.clone(), inner.binder.clone(), sc)))
                    }
                    b => {
                        env.push((inner.name.clone(), b.clone()));
                        let r = self.at_h(f, hole, env, &inner.scope);
                        env.pop();
                        if let Some(sc) = r? {
                            return Ok(Some(mk_bind(inner.name.clone(), b.clone(), sc)));
                        }
                        if let Some(ty2) = self.at_h(f, hole, env, b.ty())? {
                            return Ok(Some(mk_bind(
                                inner.name.clone(),
                                replace_binder_ty(b, ty2),
                                inner.scope.clone(),
                            )));
                        }
                        if let Binder::Let { ty, val } = b {
                            if let Some(val2) = self.at_h(f, hole, env, val)? {
                                return Ok(Some(mk_bind(
                                    inner.name.clone(),
                                    Binder::Let {
                                        ty: ty.clone(),
                                        val: val2,
                                    },
                                    inner.scope.clone(),
                                )));
                            }
                        }
                        Ok(None)
                    }
                }
            }
            _ => Ok(None),
        }
    }

    // ---- tactic interpreters -------------------------------------------

    fn t_attack(&mut self, _env: &Env, t: &Term) -> Result<Term> {
        let Term::Bind(inner) = t else {
            return Err(Error::Tactic("Not an attackable hole".to_string()));
        };
        let Binder::Hole { ty } = &inner.binder else {
            return Err(Error::Tactic("Not an attackable hole".to_string()));
        };
        let h = self.get_name("hole");
        self.holes.insert(0, h.clone());
        let newtm = mk_bind(
            h.clone(),
            Binder::Hole { ty: ty.clone() },
            mk_bound(h, ty.clone()),
        );
        Ok(mk_bind(
            inner.name.clone(),
            Binder::Guess {
                ty: ty.clone(),
                val: newtm,
            },
            inner.scope.clone(),
        ))
    }

    fn t_claim(&mut self, n: &Name, ty: &Raw, env: &Env, t: &Term) -> Result<Term> {
        let (tyv, tyt) = check(&self.context, env, ty)?;
        is_type_goal(&self.context, env, &tyt)?;
        // the new hole goes immediately after the focus
        self.holes.insert(1.min(self.holes.len()), n.clone());
        self.claim_user_name(n);
        Ok(mk_bind(n.clone(), Binder::Hole { ty: tyv }, t.clone()))
    }

    fn t_reorder(&mut self, _env: &Env, t: &Term) -> Result<Term> {
        let mut spine = Vec::new();
        let mut cur = t;
        while let Term::Bind(b) = cur {
            if matches!(b.binder, Binder::Hole { .. }) {
                spine.push((b.name.clone(), b.binder.clone()));
                cur = &b.scope;
            } else {
                break;
            }
        }
        let sc = cur.clone();
        let sorted = sort_claims(spine);
        let mut out = sc;
        for (n, b) in sorted.into_iter().rev() {
            out = mk_bind(n, b, out);
        }
        Ok(out)
    }

    fn t_exact(&mut self, e: &Raw, env: &Env, t: &Term) -> Result<Term> {
        let Term::Bind(inner) = t else {
            return Err(Error::Tactic("Can't fill here.".to_string()));
        };
        let Binder::Hole { ty } = &inner.binder else {
            return Err(Error::Tactic("Can't fill here.".to_string()));
        };
        let (val, valty) = check(&self.context, env, e)?;
        converts(&self.context, env, &valty, ty)?;
        Ok(mk_bind(
            inner.name.clone(),
            Binder::Guess {
                ty: ty.clone(),
                val,
            },
            inner.scope.clone(),
        ))
    }

    fn t_fill(&mut self, e: &Raw, env: &Env, t: &Term) -> Result<Term> {
        let Term::Bind(inner) = t else {
            return Err(Error::Tactic("Can't fill here.".to_string()));
        };
        let Binder::Hole { ty } = &inner.binder else {
            return Err(Error::Tactic("Can't fill here.".to_string()));
        };
        let (val, valty) = check(&self.context, env, e)?;
        self.unify_oracle(env, &valty, ty)?;
        Ok(mk_bind(
            inner.name.clone(),
            Binder::Guess {
                ty: ty.clone(),
                val,
            },
            inner.scope.clone(),
        ))
    }

    fn t_match_fill(&mut self, e: &Raw, env: &Env, t: &Term) -> Result<Term> {
        let Term::Bind(inner) = t else {
            return Err(Error::Tactic("Can't fill here.".to_string()));
        };
        let Binder::Hole { ty } = &inner.binder else {
            return Err(Error::Tactic("Can't fill here.".to_string()));
        };
        let (val, valty) = check(&self.context, env, e)?;
        self.match_unify_oracle(env, &valty, ty)?;
        Ok(mk_bind(
            inner.name.clone(),
            Binder::Guess {
                ty: ty.clone(),
                val,
            },
            inner.scope.clone(),
        ))
    }

    fn t_prep_fill(&mut self, f: &Name, args: &[Name], _env: &Env, t: &Term) -> Result<Term> {
        let Term::Bind(inner) = t else {
            return Err(Error::Tactic("Can't prepare fill here.".to_string()));
        };
        let Binder::Hole { ty } = &inner.binder else {
            return Err(Error::Tactic("Can't prepare fill here.".to_string()));
        };
        let val = mk_app_spine(
            mk_global(f.clone(), Term::Erased),
            args.iter().map(|a| mk_bound(a.clone(), Term::Erased)),
        );
        Ok(mk_bind(
            inner.name.clone(),
            Binder::Guess {
                ty: ty.clone(),
                val,
            },
            inner.scope.clone(),
        ))
    }

    fn t_complete_fill(&mut self, env: &Env, t: &Term) -> Result<Term> {
        let Term::Bind(inner) = t else {
            return Err(Error::Tactic("Can't complete fill here.".to_string()));
        };
        let Binder::Guess { ty, val } = &inner.binder else {
            return Err(Error::Tactic("Can't complete fill here.".to_string()));
        };
        let raw = val.forget();
        let (val2, valty) = check(&self.context, env, &raw)?;
        self.unify_oracle(env, &valty, ty)?;
        Ok(mk_bind(
            inner.name.clone(),
            Binder::Guess {
                ty: ty.clone(),
                val: val2,
            },
            inner.scope.clone(),
        ))
    }

    fn t_regret(&mut self, _env: &Env, t: &Term) -> Result<Term> {
        let Term::Bind(inner) = t else {
            return Err(Error::Tactic("Can't regret here.".to_string()));
        };
        let Binder::Hole { ty } = &inner.binder else {
            return Err(Error::Tactic("Can't regret here.".to_string()));
        };
        if inner.scope.occurs_free(&inner.name) {
            return Err(Error::Tactic(format!(
                "Can't regret {} : {}, it is used in the scope.",
                inner.name, ty
            )));
        }
        self.holes.retain(|h| *h != inner.name);
        Ok(inner.scope.clone())
    }

    fn t_solve(&mut self, env: &Env, t: &Term) -> Result<Term> {
        let Term::Bind(inner) = t else {
            return Err(Error::Tactic("Not a guess.".to_string()));
        };
        let Binder::Guess { ty: _, val } = &inner.binder else {
            return Err(Error::Tactic("Not a guess.".to_string()));
        };
        if val.has_hole_binder() {
            return Err(Error::Tactic("I see a hole in your solution.".to_string()));
        }
        let x = inner.name.clone();
        let recorded = self
            .notunified
            .iter()
            .find(|(n, _)| *n == x)
            .map(|(_, tm)| tm.clone());
        if let Some(tm) = recorded {
            self.match_unify_oracle(env, &tm, val)?;
        }
        self.holes.retain(|h| *h != x);
        self.instances.retain(|h| *h != x);
        self.notunified.retain(|(n, _)| *n != x);
        self.dontunify.retain(|n| *n != x);
        self.solved = Some((x.clone(), val.clone()));
        let mut sc = inner.scope.clone();
        sc.subst(&x, val);
        Ok(sc)
    }

    fn end_unify(&mut self) -> Result<()> {
        let (h, journal) = (self.unified.0.clone(), mem::take(&mut self.unified.1));
        let ns = drop_given(&self.dontunify, &journal, &self.holes);
        // rewrite each solution through the whole set before applying
        let ns: Vec<(Name, Term)> = ns
            .iter()
            .map(|(n, t)| {
                let mut t = t.clone();
                t.update_solved(&ns);
                (n.clone(), t)
            })
            .collect();
        let probs = mem::take(&mut self.problems);
        let (ns, probs) =
            update_problems(&self.context, ns, probs, &self.injective, &self.holes, None);
        self.problems = probs;
        self.pterm.update_solved(&ns);
        update_notunified(&mut self.notunified, &ns);
        self.holes.retain(|x| !ns.iter().any(|(n, _)| n == x));
        self.unified = (h, vec![]);
        Ok(())
    }

    fn t_compute(&mut self, env: &Env, t: &Term) -> Result<Term> {
        self.compute_goal(env, t, |ctxt, env, ty| normalise(ctxt, env, ty))
    }

    fn t_hnf_compute(&mut self, env: &Env, t: &Term) -> Result<Term> {
        self.compute_goal(env, t, |ctxt, env, ty| hnf(ctxt, env, ty))
    }

    fn t_simplify(&mut self, env: &Env, t: &Term) -> Result<Term> {
        self.compute_goal(env, t, |ctxt, env, ty| specialise(ctxt, env, ty))
    }

    fn compute_goal(
        &mut self,
        env: &Env,
        t: &Term,
        f: impl Fn(&Context, &Env, &Term) -> Term,
    ) -> Result<Term> {
        let Term::Bind(inner) = t else {
            return Err(Error::Tactic("Can't normalise here.".to_string()));
        };
        let Binder::Hole { ty } = &inner.binder else {
            return Err(Error::Tactic("Can't normalise here.".to_string()));
        };
        let ty2 = f(&self.context, env, ty);
        Ok(mk_bind(
            inner.name.clone(),
            Binder::Hole { ty: ty2 },
            inner.scope.clone(),
        ))
    }

    fn compute_let(&mut self, n: &Name) -> Result<()> {
        fn go(ctxt: &Context, env: &mut Env, n: &Name, t: &Term) -> Option<Term> {
            match t {
                Term::Bind(inner) => {
                    if inner.name == *n {
                        if let Binder::Let { ty, val } = &inner.binder {
                            let val2 = normalise(ctxt, env, val);
                            return Some(mk_bind(
                                n.clone(),
                                Binder::Let {
                                    ty: ty.clone(),
                                    val: val2,
                                },
                                inner.scope.clone(),
                            ));
                        }
                        return None;
                    }
                    env.push((inner.name.clone(), inner.binder.clone()));
                    let r = go(ctxt, env, n, &inner.scope);
                    env.pop();
                    if let Some(sc) = r {
                        return Some(mk_bind(inner.name.clone(), inner.binder.clone(), sc));
                    }
                    if let Binder::Guess { ty, val } = &inner.binder {
                        if let Some(val2) = go(ctxt, env, n, val) {
                            return Some(mk_bind(
                                inner.name.clone(),
                                Binder::Guess {
                                    ty: ty.clone(),
                                    val: val2,
                                },
                                inner.scope.clone(),
                            ));
                        }
                    }
                    None
                }
                Term::App(inner) => {
                    if let Some(fun) = go(ctxt, env, n, &inner.fun) {
                        return Some(crate::tt::mk_app(fun, inner.arg.clone()));
                    }
                    go(ctxt, env, n, &inner.arg)
                        .map(|arg| crate::tt::mk_app(inner.fun.clone(), arg))
                }
                _ => None,
            }
        }
        let tm = mem::take(&mut self.pterm);
        match go(&self.context, &mut Env::new(), n, &tm) {
            Some(tm2) => {
                self.pterm = tm2;
                Ok(())
            }
            None => {
                self.pterm = tm;
                Err(Error::Tactic(format!("No let binding {} found.", n)))
            }
        }
    }

    fn t_eval_in(&mut self, e: &Raw, env: &Env, t: &Term) -> Result<Term> {
        let (val, ty) = check(&self.context, env, e)?;
        let norm = normalise(&self.context, env, &val);
        self.plog
            .push_str(&format!("{} : {}\n", norm, ty));
        Ok(t.clone())
    }

    fn t_check_in(&mut self, e: &Raw, env: &Env, t: &Term) -> Result<Term> {
        let (val, ty) = check(&self.context, env, e)?;
        self.plog.push_str(&format!("{} : {}\n", val, ty));
        Ok(t.clone())
    }

    fn t_intro(&mut self, mn: Option<&Name>, env: &Env, t: &Term) -> Result<Term> {
        let (x, goal) = attackable(t)?;
        let goal2 = match &goal {
            Term::Bind(b) if matches!(b.binder, Binder::Pi { .. }) => goal.clone(),
            _ => hnf(&self.context, env, &goal),
        };
        let Term::Bind(pi) = &goal2 else {
            return Err(Error::CantIntroduce(goal2));
        };
        let Binder::Pi { ty: s } = &pi.binder else {
            return Err(Error::CantIntroduce(goal2.clone()));
        };
        let n = match mn {
            Some(n) => {
                self.claim_user_name(n);
                n.clone()
            }
            None => {
                let n = self.context.unique_name(&pi.name, &self.usedns);
                self.claim_user_name(&n);
                n
            }
        };
        let mut newty = pi.scope.clone();
        newty.subst(&pi.name, &mk_bound(n.clone(), s.clone()));
        Ok(mk_bind(
            n.clone(),
            Binder::Lam { ty: s.clone() },
            mk_bind(
                x.clone(),
                Binder::Hole { ty: newty.clone() },
                mk_bound(x, newty),
            ),
        ))
    }

    fn t_intro_ty(&mut self, ty: &Raw, mn: Option<&Name>, env: &Env, t: &Term) -> Result<Term> {
        let (x, goal) = attackable(t)?;
        let (tyv, _tyt) = check(&self.context, env, ty)?;
        let goal2 = match &goal {
            Term::Bind(b) if matches!(b.binder, Binder::Pi { .. }) => goal.clone(),
            _ => hnf(&self.context, env, &goal),
        };
        let Term::Bind(pi) = &goal2 else {
            return Err(Error::CantIntroduce(goal2));
        };
        let Binder::Pi { ty: s } = &pi.binder else {
            return Err(Error::CantIntroduce(goal2.clone()));
        };
        self.unify_oracle(env, s, &tyv)?;
        let n = match mn {
            Some(n) => {
                self.claim_user_name(n);
                n.clone()
            }
            None => {
                let n = self.context.unique_name(&pi.name, &self.usedns);
                self.claim_user_name(&n);
                n
            }
        };
        let mut newty = pi.scope.clone();
        newty.subst(&pi.name, &mk_bound(n.clone(), s.clone()));
        Ok(mk_bind(
            n.clone(),
            Binder::Lam { ty: s.clone() },
            mk_bind(
                x.clone(),
                Binder::Hole { ty: newty.clone() },
                mk_bound(x, newty),
            ),
        ))
    }

    fn t_forall(&mut self, n: &Name, ty: &Raw, env: &Env, t: &Term) -> Result<Term> {
        let (x, goal) = attackable(t)?;
        let (tyv, tyt) = check(&self.context, env, ty)?;
        let tyt_h = hnf(&self.context, env, &tyt);
        if !tyt_h.is_sort() {
            return Err(Error::CantUnify {
                left: tyt,
                right: crate::tt::mk_sort(0),
            });
        }
        let goal_h = hnf(&self.context, env, &goal);
        if !goal_h.is_sort() {
            return Err(Error::CantUnify {
                left: goal,
                right: crate::tt::mk_sort(0),
            });
        }
        self.claim_user_name(n);
        Ok(mk_bind(
            n.clone(),
            Binder::Pi { ty: tyv },
            mk_bind(
                x.clone(),
                Binder::Hole { ty: goal.clone() },
                mk_bound(x, goal),
            ),
        ))
    }

    fn t_let_bind(&mut self, n: &Name, ty: &Raw, val: &Raw, env: &Env, t: &Term) -> Result<Term> {
        let (x, goal) = attackable(t)?;
        let (tyv, tyt) = check(&self.context, env, ty)?;
        is_type_goal(&self.context, env, &tyt)?;
        let (vv, vt) = check(&self.context, env, val)?;
        converts(&self.context, env, &vt, &tyv)?;
        self.claim_user_name(n);
        Ok(mk_bind(
            n.clone(),
            Binder::Let { ty: tyv, val: vv },
            mk_bind(
                x.clone(),
                Binder::Hole { ty: goal.clone() },
                mk_bound(x, goal),
            ),
        ))
    }

    fn expand_let(&mut self, n: &Name, v: &Term) -> Result<()> {
        fn go(n: &Name, v: &Term, t: &Term) -> Option<Term> {
            match t {
                Term::Bind(inner) => {
                    if inner.name == *n && matches!(inner.binder, Binder::Let { .. }) {
                        let mut sc = inner.scope.clone();
                        sc.subst(n, v);
                        return Some(mk_bind(n.clone(), inner.binder.clone(), sc));
                    }
                    if let Some(sc) = go(n, v, &inner.scope) {
                        return Some(mk_bind(inner.name.clone(), inner.binder.clone(), sc));
                    }
                    if let Binder::Guess { ty, val } = &inner.binder {
                        if let Some(val2) = go(n, v, val) {
                            return Some(mk_bind(
                                inner.name.clone(),
                                Binder::Guess {
                                    ty: ty.clone(),
                                    val: val2,
                                },
                                inner.scope.clone(),
                            ));
                        }
                    }
                    None
                }
                Term::App(inner) => {
                    if let Some(fun) = go(n, v, &inner.fun) {
                        return Some(crate::tt::mk_app(fun, inner.arg.clone()));
                    }
                    go(n, v, &inner.arg).map(|arg| crate::tt::mk_app(inner.fun.clone(), arg))
                }
                _ => None,
            }
        }
        let tm = mem::take(&mut self.pterm);
        match go(n, v, &tm) {
            Some(tm2) => {
                self.pterm = tm2;
                Ok(())
            }
            None => {
                self.pterm = tm;
                Err(Error::Tactic(format!("No let binding {} found.", n)))
            }
        }
    }

    fn t_rewrite(&mut self, e: &Raw, env: &Env, t: &Term) -> Result<Term> {
        let (x, goal) = attackable(t)?;
        let (ev, et) = check(&self.context, env, e)?;
        let et = normalise(&self.context, env, &et);
        let (head, eargs) = et.unapply();
        let is_eq = matches!(head, Term::Ref(r) if r.name == eq_name());
        if !is_eq || eargs.len() != 4 {
            return Err(Error::NotEquality(et.clone()));
        }
        let lt = eargs[0].clone();
        let l = eargs[2].clone();
        let r = eargs[3].clone();
        let v = self.get_name("rw");
        // motive: abstract the left endpoint out of the goal
        let mut pbody = goal.clone();
        pbody.replace_term(&l, &mk_bound(v.clone(), lt.clone()), Some(&r));
        let mut newt = pbody.clone();
        newt.subst(&v, &r);
        let motive = mk_bind(v, Binder::Lam { ty: lt.clone() }, pbody);
        let hole_ref = mk_bound(x.clone(), newt.clone());
        let app = mk_app_spine(
            mk_global(replace_name(), Term::Erased),
            [lt, l, r, motive, ev, hole_ref],
        );
        Ok(mk_bind(x, Binder::Hole { ty: newt }, app))
    }

    fn t_induction(&mut self, nm: &Name, env: &Env, t: &Term) -> Result<Term> {
        let (x, goal) = attackable(t)?;
        let scr_binder =
            lookup_env(env, nm).ok_or_else(|| Error::NoSuchVariable(nm.clone()))?;
        let scr_ty = normalise(&self.context, env, scr_binder.ty());
        let (head, targs) = scr_ty.unapply();
        let Term::Ref(tyhead) = head else {
            return Err(Error::Tactic(format!("{} is not an inductive value.", nm)));
        };
        let tname = tyhead.name.clone();
        let elim = match self.context.eliminators_of(&tname) {
            [] => return Err(Error::NoEliminator(tname)),
            [e] => e.clone(),
            _ => return Err(Error::AmbiguousEliminator(tname)),
        };
        let elim_ty = self
            .context
            .lookup_ty(&elim)
            .ok_or_else(|| Error::NoSuchVariable(elim.clone()))?
            .clone();
        let param_positions = match self.context.lookup_meta(&tname) {
            Some(MetaInformation::Data(mi)) => mi.param_positions.clone(),
            None => vec![],
        };
        let params: Vec<Term> = param_positions
            .iter()
            .filter_map(|i| targs.get(*i).map(|t| (*t).clone()))
            .collect();
        let indices: Vec<Term> = targs
            .iter()
            .enumerate()
            .filter(|(i, _)| !param_positions.contains(i))
            .map(|(_, t)| (*t).clone())
            .collect();

        // instantiate the eliminator telescope with the parameters
        let mut tele = elim_ty.clone();
        for p in &params {
            let Term::Bind(b) = &tele else {
                return Err(Error::Tactic(format!(
                    "Eliminator {} has too few arguments.",
                    elim
                )));
            };
            let mut sc = b.scope.clone();
            sc.subst(&b.name, p);
            tele = sc;
        }
        // the motive binder comes next
        let Term::Bind(pb) = &tele else {
            return Err(Error::Tactic(format!(
                "Eliminator {} has no motive argument.",
                elim
            )));
        };
        let motive_ty = pb.binder.ty().clone();
        let motive_name = pb.name.clone();
        let after_motive = pb.scope.clone();

        // build the motive by abstracting the goal over the indices and the
        // scrutinee, following the motive type's own telescope
        let mut lam_binders: Vec<(Name, Term)> = Vec::new();
        let mut mty = motive_ty.clone();
        while let Term::Bind(b) = &mty {
            let Binder::Pi { ty } = &b.binder else { break };
            let fresh = self.get_name(b.name.base());
            let mut sc = b.scope.clone();
            sc.subst(&b.name, &mk_bound(fresh.clone(), ty.clone()));
            lam_binders.push((fresh, ty.clone()));
            mty = sc;
        }
        if lam_binders.len() != indices.len() + 1 {
            return Err(Error::Tactic(format!(
                "Eliminator {} does not match the shape of {}.",
                elim, tname
            )));
        }
        let mut mbody = goal.clone();
        for (i, idx) in indices.iter().enumerate() {
            let (iv, ity) = &lam_binders[i];
            mbody.replace_term(idx, &mk_bound(iv.clone(), ity.clone()), None);
        }
        let (scr_var, scr_var_ty) = lam_binders.last().cloned().unwrap();
        mbody.subst(nm, &mk_bound(scr_var, scr_var_ty));
        let mut motive = mbody;
        for (n, ty) in lam_binders.iter().rev() {
            motive = mk_bind(n.clone(), Binder::Lam { ty: ty.clone() }, motive);
        }

        let mut tele = after_motive;
        tele.subst(&motive_name, &motive);

        // methods are the remaining premises before the indices and the
        // scrutinee
        let mut n_pis = 0;
        {
            let mut probe = &tele;
            while let Term::Bind(b) = probe {
                if !matches!(b.binder, Binder::Pi { .. }) {
                    break;
                }
                n_pis += 1;
                probe = &b.scope;
            }
        }
        if n_pis < indices.len() + 1 {
            return Err(Error::Tactic(format!(
                "Eliminator {} does not match the shape of {}.",
                elim, tname
            )));
        }
        let n_methods = n_pis - indices.len() - 1;
        let mut method_holes: Vec<(Name, Term)> = Vec::new();
        for _ in 0..n_methods {
            let Term::Bind(b) = &tele else { unreachable!() };
            let mty = specialise(&self.context, env, b.binder.ty());
            let h = self.get_name(b.name.base());
            let mut sc = b.scope.clone();
            sc.subst(&b.name, &mk_bound(h.clone(), mty.clone()));
            method_holes.push((h, mty));
            tele = sc;
        }

        let scr_ref = mk_bound(nm.clone(), scr_binder.ty().clone());
        let mut app_args = params;
        app_args.push(motive);
        app_args.extend(
            method_holes
                .iter()
                .map(|(h, ty)| mk_bound(h.clone(), ty.clone())),
        );
        app_args.extend(indices);
        app_args.push(scr_ref);
        let app = mk_app_spine(mk_global(elim, elim_ty), app_args);

        // the original hole is gone; one new hole per method takes its place
        self.holes.retain(|h| *h != x);
        for (h, _) in method_holes.iter().rev() {
            self.holes.insert(0, h.clone());
        }
        let mut out = app;
        for (h, ty) in method_holes.into_iter().rev() {
            out = mk_bind(h, Binder::Hole { ty }, out);
        }
        Ok(out)
    }

    fn t_equiv(&mut self, ty: &Raw, env: &Env, t: &Term) -> Result<Term> {
        let Term::Bind(inner) = t else {
            return Err(Error::Tactic("Can't change the goal here.".to_string()));
        };
        let Binder::Hole { ty: goal } = &inner.binder else {
            return Err(Error::Tactic("Can't change the goal here.".to_string()));
        };
        let (tyv, _tyt) = check(&self.context, env, ty)?;
        converts(&self.context, env, &tyv, goal)?;
        Ok(mk_bind(
            inner.name.clone(),
            Binder::Hole { ty: tyv },
            inner.scope.clone(),
        ))
    }

    fn t_patvar(&mut self, n: &Name, _env: &Env, t: &Term) -> Result<Term> {
        let Term::Bind(inner) = t else {
            return Err(Error::Tactic("Can't bind a pattern variable here.".to_string()));
        };
        let Binder::Hole { ty } = &inner.binder else {
            return Err(Error::Tactic("Can't bind a pattern variable here.".to_string()));
        };
        let x = inner.name.clone();
        self.holes.retain(|h| *h != x);
        self.dontunify.retain(|h| *h != x);
        self.notunified.push((x.clone(), mk_bound(n.clone(), ty.clone())));
        if self.injective.contains(&x) && !self.injective.contains(n) {
            self.injective.push(n.clone());
        }
        self.claim_user_name(n);
        let mut sc = inner.scope.clone();
        sc.subst(&x, &mk_bound(n.clone(), ty.clone()));
        Ok(mk_bind(n.clone(), Binder::PVar { ty: ty.clone() }, sc))
    }

    fn t_patbind(&mut self, n: &Name, env: &Env, t: &Term) -> Result<Term> {
        let (x, goal) = attackable(t)?;
        let goal2 = match &goal {
            Term::Bind(b) if matches!(b.binder, Binder::PVTy { .. }) => goal.clone(),
            _ => hnf(&self.context, env, &goal),
        };
        let Term::Bind(pb) = &goal2 else {
            return Err(Error::CantIntroduce(goal2));
        };
        let Binder::PVTy { ty: s } = &pb.binder else {
            return Err(Error::CantIntroduce(goal2.clone()));
        };
        self.claim_user_name(n);
        let mut newty = pb.scope.clone();
        newty.subst(&pb.name, &mk_bound(n.clone(), s.clone()));
        Ok(mk_bind(
            n.clone(),
            Binder::PVar { ty: s.clone() },
            mk_bind(
                x.clone(),
                Binder::Hole { ty: newty.clone() },
                mk_bound(x, newty),
            ),
        ))
    }

    fn t_defer(&mut self, n: &Name, env: &Env, t: &Term) -> Result<Term> {
        let (x, goal) = attackable(t)?;
        self.holes.retain(|h| *h != x);
        self.claim_user_name(n);
        self.deferred.push(n.clone());
        let gty = bind_env(env, goal);
        let app = mk_app_spine(mk_global(n.clone(), gty.clone()), env_refs(env));
        Ok(mk_bind(n.clone(), Binder::GHole { ty: gty }, app))
    }

    fn t_defer_type(&mut self, n: &Name, ty: &Raw, args: &[Name], env: &Env, t: &Term) -> Result<Term> {
        let (x, _goal) = attackable(t)?;
        let (tyv, _) = check(&self.context, &Env::new(), ty)?;
        let mut app_args = Vec::new();
        for a in args {
            let b = lookup_env(env, a).ok_or_else(|| {
                Error::Tactic(format!(
                    "Can't defer {}: {} is not in the environment.",
                    n, a
                ))
            })?;
            app_args.push(mk_bound(a.clone(), b.ty().clone()));
        }
        self.holes.retain(|h| *h != x);
        self.claim_user_name(n);
        self.deferred.push(n.clone());
        let app = mk_app_spine(mk_global(n.clone(), tyv.clone()), app_args);
        Ok(mk_bind(n.clone(), Binder::GHole { ty: tyv }, app))
    }

    fn retry_problems(&mut self, flavor: Option<UnifyMode>, all: bool) -> Result<()> {
        let probs = mem::take(&mut self.problems);
        let (selected, kept): (Vec<Problem>, Vec<Problem>) = if all {
            (probs, vec![])
        } else {
            probs.into_iter().partition(|p| p.mode == UnifyMode::Match)
        };
        let (ns, mut remaining) = update_problems(
            &self.context,
            vec![],
            selected,
            &self.injective,
            &self.holes,
            flavor,
        );
        remaining.extend(kept);
        self.problems = remaining;
        if !ns.is_empty() {
            self.pterm.update_solved(&ns);
            update_notunified(&mut self.notunified, &ns);
            self.holes.retain(|x| !ns.iter().any(|(n, _)| n == x));
        }
        Ok(())
    }

    // ---- unifier bridge -------------------------------------------------

    fn unify_oracle(&mut self, env: &Env, a: &Term, b: &Term) -> Result<Vec<(Name, Term)>> {
        if self.unifylog && log::log_enabled!(log::Level::Debug) {
            println!("unify: {} =?= {}", a, b);
        }
        let u = unify(&self.context, env, a, b, &self.injective, &self.holes)?;
        self.absorb(env, u, UnifyMode::Unify)
    }

    fn match_unify_oracle(&mut self, env: &Env, a: &Term, b: &Term) -> Result<Vec<(Name, Term)>> {
        if self.unifylog && log::log_enabled!(log::Level::Debug) {
            println!("match: {} =?= {}", a, b);
        }
        let u = match_unify(&self.context, env, a, b, &self.injective, &self.holes);
        self.absorb(env, u, UnifyMode::Match)
    }

    fn absorb(&mut self, env: &Env, u: Unification, mode: UnifyMode) -> Result<Vec<(Name, Term)>> {
        let Unification { subst, fails } = u;
        for (l, r) in fails {
            let error = Error::CantUnify {
                left: l.clone(),
                right: r.clone(),
            };
            self.problems.push(Problem {
                left: l,
                right: r,
                env: env.clone(),
                error,
                mode,
            });
        }
        // protected names only move forward through the pending list
        let notu: Vec<(Name, Term)> = subst
            .iter()
            .filter(|(n, t)| self.dontunify.contains(n) && !matches!(t, Term::Ref(_)))
            .cloned()
            .collect();
        let mut ns = mem::take(&mut self.unified.1);
        ns.extend(subst.iter().cloned());
        let probs = mem::take(&mut self.problems);
        let (ns, probs) =
            update_problems(&self.context, ns, probs, &self.injective, &self.holes, None);
        self.problems = probs;
        update_notunified(&mut self.notunified, &ns);
        self.notunified.extend(notu);
        self.update_injective(&subst);
        self.unified.1 = ns;
        Ok(subst)
    }

    fn update_injective(&mut self, subst: &[(Name, Term)]) {
        for (n, t) in subst {
            if let Term::Ref(r) = t.head() {
                if self.injective.contains(n) && !self.injective.contains(&r.name) {
                    self.injective.push(r.name.clone());
                } else if self.injective.contains(&r.name) && !self.injective.contains(n) {
                    self.injective.push(n.clone());
                }
            }
        }
    }
}

impl Display for ProofState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}:", self.thname)?;
        for h in &self.holes {
            match find_hole(&self.pterm, h, &mut Env::new()) {
                Some((_, b)) => writeln!(f, "  ?{} : {}", h, b.ty())?,
                None => writeln!(f, "  ?{} : <missing>", h)?,
            }
        }
        write!(f, "{}", self.pterm)
    }
}

fn attackable(t: &Term) -> Result<(Name, Term)> {
    if let Term::Bind(inner) = t {
        if let Binder::Hole { ty } = &inner.binder {
            if let Term::Ref(r) = &inner.scope {
                if r.name == inner.name {
                    return Ok((inner.name.clone(), ty.clone()));
                }
            }
        }
    }
    Err(Error::Tactic("Not an attackable hole".to_string()))
}

fn replace_binder_ty(b: &Binder<Term>, ty: Term) -> Binder<Term> {
    match b {
        Binder::Lam { .. } => Binder::Lam { ty },
        Binder::Pi { .. } => Binder::Pi { ty },
        Binder::Let { val, .. } => Binder::Let {
            ty,
            val: val.clone(),
        },
        Binder::Hole { .. } => Binder::Hole { ty },
        Binder::Guess { val, .. } => Binder::Guess {
            ty,
            val: val.clone(),
        },
        Binder::PVar { .. } => Binder::PVar { ty },
        Binder::PVTy { .. } => Binder::PVTy { ty },
        Binder::GHole { .. } => Binder::GHole { ty },
    }
}

fn is_type_goal(ctxt: &Context, env: &Env, tyt: &Term) -> Result<()> {
    if matches!(tyt, Term::Erased) {
        return Ok(());
    }
    let h = hnf(ctxt, env, tyt);
    if h.is_sort() {
        Ok(())
    } else {
        Err(Error::NotAType(tyt.clone()))
    }
}

fn find_hole(t: &Term, hole: &Name, env: &mut Env) -> Option<(Env, Binder<Term>)> {
    match t {
        Term::App(inner) => {
            if let Some(r) = find_hole(&inner.fun, hole, env) {
                return Some(r);
            }
            find_hole(&inner.arg, hole, env)
        }
        Term::Bind(inner) => {
            if inner.name == *hole && inner.binder.is_hole() {
                return Some((env.clone(), inner.binder.clone()));
            }
            match &inner.binder {
                Binder::Guess { ty, val } => {
                    if let Some(r) = find_hole(val, hole, env) {
                        return Some(r);
                    }
                    if let Some(r) = find_hole(ty, hole, env) {
                        return Some(r);
                    }
                    env.push((inner.name.clone(), inner.binder.clone()));
                    let r = find_hole(&inner.scope, hole, env);
                    env.pop();
                    r
                }
                b => {
                    env.push((inner.name.clone(), b.clone()));
                    let r = find_hole(&inner.scope, hole, env);
                    env.pop();
                    if r.is_some() {
                        return r;
                    }
                    if let Some(r) = find_hole(b.ty(), hole, env) {
                        return Some(r);
                    }
                    if let Binder::Let { val, .. } = b {
                        return find_hole(val, hole, env);
                    }
                    None
                }
            }
        }
        _ => None,
    }
}

/// Stable dependency ordering of adjacent claims: a binder is emitted as
/// soon as its type mentions no remaining claim.
fn sort_claims(mut xs: Vec<(Name, Binder<Term>)>) -> Vec<(Name, Binder<Term>)> {
    let mut out = Vec::with_capacity(xs.len());
    while !xs.is_empty() {
        let mut pick = 0;
        'cand: for (i, (_, b)) in xs.iter().enumerate() {
            for (j, (m, _)) in xs.iter().enumerate() {
                if i != j && b.ty().occurs_free(m) {
                    continue 'cand;
                }
            }
            pick = i;
            break;
        }
        out.push(xs.remove(pick));
    }
    out
}

/// Split unifier solutions for the driver: solutions binding protected
/// (user-supplied) names are dropped, except that a protected hole solved
/// by a plain reference to another hole is flipped around.
pub fn drop_given(dont: &[Name], journal: &[(Name, Term)], holes: &[Name]) -> Vec<(Name, Term)> {
    let mut out = Vec::new();
    for (n, t) in journal {
        if dont.contains(n) {
            if let Term::Ref(r) = t {
                if matches!(r.kind, crate::tt::RefKind::Bound)
                    && !dont.contains(&r.name)
                    && holes.contains(n)
                    && holes.contains(&r.name)
                {
                    out.push((r.name.clone(), mk_bound(n.clone(), r.ty.clone())));
                }
            }
            continue;
        }
        out.push((n.clone(), t.clone()));
    }
    out
}

/// The complement of [`drop_given`]: just the solutions that bind
/// protected names.
pub fn keep_given(dont: &[Name], journal: &[(Name, Term)]) -> Vec<(Name, Term)> {
    journal
        .iter()
        .filter(|(n, _)| dont.contains(n))
        .cloned()
        .collect()
}

fn update_notunified(notunified: &mut [(Name, Term)], ns: &[(Name, Term)]) {
    for (_, t) in notunified.iter_mut() {
        t.update_solved(ns);
    }
}

/// Re-run the deferred queue under a substitution until it stops
/// shrinking. Equations that succeed extend the substitution; the rest are
/// kept with their terms and environments rewritten.
fn update_problems(
    ctxt: &Context,
    mut ns: Vec<(Name, Term)>,
    mut problems: Vec<Problem>,
    injective: &[Name],
    holes: &[Name],
    flavor: Option<UnifyMode>,
) -> (Vec<(Name, Term)>, Vec<Problem>) {
    loop {
        let before = problems.len();
        let mut remaining = Vec::new();
        for mut p in problems {
            p.left.update_solved(&ns);
            p.right.update_solved(&ns);
            for (_, b) in p.env.iter_mut() {
                b.for_each_term_mut(|t| t.update_solved(&ns));
            }
            let mode = flavor.unwrap_or(p.mode);
            let solved = match mode {
                UnifyMode::Unify => match unify(ctxt, &p.env, &p.left, &p.right, injective, holes)
                {
                    Ok(u) if u.fails.is_empty() => Some(u.subst),
                    _ => None,
                },
                UnifyMode::Match => {
                    let u = match_unify(ctxt, &p.env, &p.left, &p.right, injective, holes);
                    if u.fails.is_empty() {
                        Some(u.subst)
                    } else {
                        None
                    }
                }
            };
            match solved {
                Some(sub) => ns.extend(sub),
                None => remaining.push(p),
            }
        }
        problems = remaining;
        if problems.len() == before {
            break;
        }
    }
    (ns, problems)
}
