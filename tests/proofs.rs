use lacuna::tt::{
    eq_name, mk_app, mk_app_spine, mk_bind, mk_bound, mk_ref, mk_sort, raw_app, raw_var,
    replace_name,
};
use lacuna::{new_proof, Binder, Context, DataMI, MetaInformation, Name, Raw, RefKind, Tactic, Term};

fn v(s: &str) -> Name {
    Name::intern(s).unwrap()
}

fn nat() -> Term {
    mk_ref(RefKind::TypeCon(0), v("Nat"), mk_sort(0))
}

fn zero() -> Term {
    mk_ref(RefKind::DataCon(0), v("Z"), nat())
}

fn suc(t: Term) -> Term {
    mk_app(mk_ref(RefKind::DataCon(1), v("S"), Term::Erased), t)
}

fn pi(n: &str, ty: Term, sc: Term) -> Term {
    mk_bind(v(n), Binder::Pi { ty }, sc)
}

fn eq(a: Term, b: Term, l: Term, r: Term) -> Term {
    mk_app_spine(
        mk_ref(RefKind::TypeCon(4), eq_name(), Term::Erased),
        [a, b, l, r],
    )
}

/// Nat with its eliminator, propositional equality, and `replace`.
fn base_context() -> Context {
    let mut ctxt = Context::new();
    ctxt.add_ty_decl(v("Nat"), RefKind::TypeCon(0), mk_sort(0));
    ctxt.add_ty_decl(v("Z"), RefKind::DataCon(0), nat());
    ctxt.add_ty_decl(v("S"), RefKind::DataCon(1), pi("k", nat(), nat()));

    // natElim : Π P : (Π m:Nat. Type). P Z → (Π k. P k → P (S k)) → Π m:Nat. P m
    let p = |t: Term| mk_app(mk_bound(v("P"), Term::Erased), t);
    let elim_ty = pi(
        "P",
        pi("m", nat(), mk_sort(0)),
        pi(
            "pz",
            p(zero()),
            pi(
                "ps",
                pi(
                    "k",
                    nat(),
                    pi("ih", p(mk_bound(v("k"), nat())), p(suc(mk_bound(v("k"), nat())))),
                ),
                pi("m", nat(), p(mk_bound(v("m"), nat()))),
            ),
        ),
    );
    ctxt.add_ty_decl(v("natElim"), RefKind::Global, elim_ty);
    ctxt.set_meta(
        v("Nat"),
        MetaInformation::Data(DataMI {
            param_positions: vec![],
        }),
    );
    ctxt.add_eliminator(v("Nat"), v("natElim"));

    // = : Π a:Type. Π b:Type. a → b → Type
    let eq_ty = pi(
        "a",
        mk_sort(0),
        pi(
            "b",
            mk_sort(0),
            pi(
                "x",
                mk_bound(v("a"), mk_sort(0)),
                pi("y", mk_bound(v("b"), mk_sort(0)), mk_sort(0)),
            ),
        ),
    );
    ctxt.add_ty_decl(eq_name(), RefKind::TypeCon(4), eq_ty);

    // replace : Π a:Type. Π x:a. Π y:a. Π P:(a → Type). x = y → P y → P x
    let a_ref = || mk_bound(v("a"), mk_sort(0));
    let replace_ty = pi(
        "a",
        mk_sort(0),
        pi(
            "x",
            a_ref(),
            pi(
                "y",
                a_ref(),
                pi(
                    "P",
                    pi("z", a_ref(), mk_sort(0)),
                    pi(
                        "e",
                        eq(
                            a_ref(),
                            a_ref(),
                            mk_bound(v("x"), a_ref()),
                            mk_bound(v("y"), a_ref()),
                        ),
                        pi(
                            "py",
                            mk_app(mk_bound(v("P"), Term::Erased), mk_bound(v("y"), a_ref())),
                            mk_app(mk_bound(v("P"), Term::Erased), mk_bound(v("x"), a_ref())),
                        ),
                    ),
                ),
            ),
        ),
    );
    ctxt.add_ty_decl(replace_name(), RefKind::Global, replace_ty);
    ctxt
}

#[test]
fn identity_function_is_built_by_intro_fill_solve() -> anyhow::Result<()> {
    // Π A:Type. Π x:A. A
    let goal = pi(
        "A",
        mk_sort(0),
        pi(
            "x",
            mk_bound(v("A"), mk_sort(0)),
            mk_bound(v("A"), mk_sort(0)),
        ),
    );
    let mut ps = new_proof(v("id"), base_context(), goal);
    ps.process_tactic(Tactic::Attack)?;
    ps.process_tactic(Tactic::Intro(None))?;
    ps.process_tactic(Tactic::Intro(None))?;
    ps.process_tactic(Tactic::Fill(raw_var(v("x"))))?;
    ps.process_tactic(Tactic::Solve)?;
    ps.process_tactic(Tactic::Solve)?;
    assert!(ps.holes().is_empty());
    let log = ps.process_tactic(Tactic::Qed)?;
    assert!(ps.is_done());
    assert!(log.starts_with("Proof complete"));
    insta::assert_snapshot!(ps.term().to_string(), @"λA:Type. λx:A. x");
    assert!(ps.term().free_names().is_empty());
    Ok(())
}

#[test]
fn claimed_hole_stays_open_until_focused() {
    let mut ps = new_proof(v("two_step"), base_context(), nat());
    let h0 = ps.holes()[0].clone();
    ps.process_tactic(Tactic::Claim(v("n"), raw_var(v("Nat"))))
        .unwrap();
    // the claim goes after the focus, which stays on the original hole
    assert_eq!(ps.holes(), &[h0.clone(), v("n")]);
    ps.process_tactic(Tactic::Exact(raw_var(v("n")))).unwrap();
    // n is still open: it was not solved behind our back
    assert!(ps.holes().contains(&v("n")));
    ps.process_tactic(Tactic::Solve).unwrap();
    assert_eq!(ps.holes(), &[v("n")]);
    // focusing the departed hole is a no-op
    ps.process_tactic(Tactic::Focus(h0)).unwrap();
    assert_eq!(ps.focus(), Some(&v("n")));
    ps.process_tactic(Tactic::Exact(raw_var(v("Z")))).unwrap();
    ps.process_tactic(Tactic::Solve).unwrap();
    ps.process_tactic(Tactic::Qed).unwrap();
    assert!(ps.is_done());
    assert!(ps.term().alpha_eq(&zero()));
}

#[test]
fn induction_on_nat_opens_one_hole_per_method() {
    // Π n:Nat. n = n
    let goal = pi(
        "n",
        nat(),
        eq(nat(), nat(), mk_bound(v("n"), nat()), mk_bound(v("n"), nat())),
    );
    let mut ps = new_proof(v("refl_all"), base_context(), goal);
    ps.process_tactic(Tactic::Attack).unwrap();
    ps.process_tactic(Tactic::Intro(None)).unwrap();
    let before: Vec<Name> = ps.holes().to_vec();
    ps.process_tactic(Tactic::Induction(v("n"))).unwrap();
    // two method holes, and the original hole is gone
    assert_eq!(ps.holes().len(), 3);
    assert!(!ps.holes().contains(&before[0]));
    // the zero case is focused and its goal is Z = Z
    let (_, binder) = ps.goal_at_focus().unwrap();
    let expected = eq(nat(), nat(), zero(), zero());
    assert!(
        binder.ty().alpha_eq(&expected),
        "zero-case goal was {}",
        binder.ty()
    );
    // the successor case expects the induction hypothesis
    let step = ps.holes()[1].clone();
    ps.process_tactic(Tactic::Focus(step)).unwrap();
    let (_, binder) = ps.goal_at_focus().unwrap();
    let k = || mk_bound(v("k"), nat());
    let step_expected = pi(
        "k",
        nat(),
        pi(
            "ih",
            eq(nat(), nat(), k(), k()),
            eq(nat(), nat(), suc(k()), suc(k())),
        ),
    );
    assert!(
        binder.ty().alpha_eq(&step_expected),
        "successor-case goal was {}",
        binder.ty()
    );
}

#[test]
fn rewrite_transports_the_goal_along_an_equation() -> anyhow::Result<()> {
    let mut ctxt = base_context();
    let a_ty = || mk_bound(v("A"), mk_sort(0));
    ctxt.add_ty_decl(v("A"), RefKind::TypeCon(0), mk_sort(0));
    ctxt.add_ty_decl(v("a"), RefKind::Global, a_ty());
    ctxt.add_ty_decl(v("b"), RefKind::Global, a_ty());
    ctxt.add_ty_decl(
        v("e"),
        RefKind::Global,
        eq(a_ty(), a_ty(), mk_bound(v("a"), a_ty()), mk_bound(v("b"), a_ty())),
    );
    ctxt.add_ty_decl(v("P"), RefKind::Global, pi("z", a_ty(), mk_sort(0)));
    ctxt.add_ty_decl(
        v("p_b"),
        RefKind::Global,
        mk_app(mk_bound(v("P"), Term::Erased), mk_bound(v("b"), a_ty())),
    );

    // goal: P a
    let goal = mk_app(mk_bound(v("P"), Term::Erased), mk_bound(v("a"), a_ty()));
    let mut ps = new_proof(v("transport"), ctxt, goal);
    ps.process_tactic(Tactic::Attack)?;
    ps.process_tactic(Tactic::Rewrite(raw_var(v("e"))))?;
    // the open goal became P b
    let (_, binder) = ps.goal_at_focus()?;
    let expected = mk_app(mk_bound(v("P"), Term::Erased), mk_bound(v("b"), a_ty()));
    assert!(
        binder.ty().alpha_eq(&expected),
        "rewritten goal was {}",
        binder.ty()
    );
    ps.process_tactic(Tactic::Exact(raw_var(v("p_b"))))?;
    ps.process_tactic(Tactic::Solve)?;
    ps.process_tactic(Tactic::Solve)?;
    ps.process_tactic(Tactic::Qed)?;
    assert!(ps.is_done());
    Ok(())
}

#[test]
fn rewrite_rejects_a_non_equation() {
    let mut ps = new_proof(v("t"), base_context(), nat());
    ps.process_tactic(Tactic::Attack).unwrap();
    let err = ps.process_tactic(Tactic::Rewrite(raw_var(v("Z")))).unwrap_err();
    assert!(err.to_string().contains("not an equality type"));
}

#[test]
fn qed_with_open_holes_and_undo_after_qed_fail() {
    let mut ps = new_proof(v("t"), base_context(), nat());
    let err = ps.process_tactic(Tactic::Qed).unwrap_err();
    assert_eq!(err.to_string(), "Still holes to fill.");
    ps.process_tactic(Tactic::Exact(raw_var(v("Z")))).unwrap();
    ps.process_tactic(Tactic::Solve).unwrap();
    ps.process_tactic(Tactic::Qed).unwrap();
    let err = ps.process_tactic(Tactic::Undo).unwrap_err();
    assert_eq!(err.to_string(), "Nothing to undo.");
}

#[test]
fn undo_inverts_attack() {
    let mut ps = new_proof(v("t"), base_context(), nat());
    let term_before = ps.term().clone();
    let holes_before = ps.holes().to_vec();
    ps.process_tactic(Tactic::Attack).unwrap();
    // the fresh inner hole occurs in its own scope, so regret refuses it
    assert!(ps.process_tactic(Tactic::Regret).is_err());
    ps.process_tactic(Tactic::Undo).unwrap();
    assert!(ps.term().alpha_eq(&term_before));
    assert_eq!(ps.holes(), &holes_before[..]);
}

#[test]
fn deferred_problems_resolve_at_a_fixed_point() {
    let mut ps = new_proof(v("t"), base_context(), nat());
    ps.process_tactic(Tactic::Claim(v("T"), Raw::Sort(0))).unwrap();
    ps.process_tactic(Tactic::Claim(v("y"), raw_var(v("T"))))
        .unwrap();
    ps.process_tactic(Tactic::Focus(v("y"))).unwrap();
    // Nat against the opaque T cannot be matched one-sidedly, so the
    // equation is deferred
    ps.process_tactic(Tactic::MatchFill(raw_var(v("Z")))).unwrap();
    assert_eq!(ps.problems().len(), 1);
    // match retries leave it pending; full unification solves T
    ps.process_tactic(Tactic::MatchProblems(false)).unwrap();
    assert_eq!(ps.problems().len(), 1);
    ps.process_tactic(Tactic::UnifyProblems).unwrap();
    assert!(ps.problems().is_empty());
    assert!(!ps.holes().contains(&v("T")));
    // a second run is a no-op
    let term = ps.term().clone();
    let holes = ps.holes().to_vec();
    ps.process_tactic(Tactic::UnifyProblems).unwrap();
    assert!(ps.term().alpha_eq(&term));
    assert_eq!(ps.holes(), &holes[..]);
}

#[test]
fn protected_names_survive_end_unify() {
    let mut ps = new_proof(v("t"), base_context(), nat());
    ps.process_tactic(Tactic::Claim(v("T"), Raw::Sort(0))).unwrap();
    ps.process_tactic(Tactic::Claim(v("y"), raw_var(v("T"))))
        .unwrap();
    ps.add_dont_unify(v("T"));
    ps.process_tactic(Tactic::Focus(v("y"))).unwrap();
    // unification discovers T := Nat, but T is protected
    ps.process_tactic(Tactic::Fill(raw_var(v("Z")))).unwrap();
    ps.process_tactic(Tactic::EndUnify).unwrap();
    assert!(ps.holes().contains(&v("T")));
}

#[test]
fn eval_in_logs_the_normal_form() {
    let mut ps = new_proof(v("t"), base_context(), nat());
    let log = ps
        .process_tactic(Tactic::EvalIn(raw_app(raw_var(v("S")), raw_var(v("Z")))))
        .unwrap();
    assert_eq!(log, "S Z : Nat\n");
}

#[test]
fn let_bind_and_expand_let() {
    let mut ps = new_proof(v("t"), base_context(), nat());
    ps.process_tactic(Tactic::Attack).unwrap();
    ps.process_tactic(Tactic::LetBind(
        v("m"),
        raw_var(v("Nat")),
        raw_app(raw_var(v("S")), raw_var(v("Z"))),
    ))
    .unwrap();
    ps.process_tactic(Tactic::Fill(raw_var(v("m")))).unwrap();
    ps.process_tactic(Tactic::Solve).unwrap();
    ps.process_tactic(Tactic::ExpandLet(v("m"), suc(zero())))
        .unwrap();
    ps.process_tactic(Tactic::Solve).unwrap();
    ps.process_tactic(Tactic::Qed).unwrap();
    assert!(ps.is_done());
}

#[test]
fn defer_moves_the_obligation_to_a_global_hole() {
    // Π n:Nat. Nat, deferred under the name helper
    let goal = pi("n", nat(), nat());
    let mut ps = new_proof(v("t"), base_context(), goal);
    ps.process_tactic(Tactic::Attack).unwrap();
    ps.process_tactic(Tactic::Intro(None)).unwrap();
    ps.process_tactic(Tactic::Defer(v("helper"))).unwrap();
    assert_eq!(ps.deferred(), &[v("helper")]);
    // the focused obligation is gone; only the attack guess remains
    assert_eq!(ps.holes().len(), 1);
    // the term now applies the future definition to its environment
    assert!(ps.term().to_string().contains("?!helper"));
    assert!(ps.term().to_string().contains("helper n"));
}

#[test]
fn compute_normalises_the_goal_in_place() {
    // goal: (λx:Type. x) Nat, which computes to Nat
    let redex = mk_app(
        mk_bind(
            v("x"),
            Binder::Lam { ty: mk_sort(0) },
            mk_bound(v("x"), mk_sort(0)),
        ),
        nat(),
    );
    let mut ps = new_proof(v("t"), base_context(), redex);
    ps.process_tactic(Tactic::Compute).unwrap();
    let (_, binder) = ps.goal_at_focus().unwrap();
    assert!(binder.ty().alpha_eq(&nat()));
    ps.process_tactic(Tactic::Exact(raw_var(v("Z")))).unwrap();
    ps.process_tactic(Tactic::Solve).unwrap();
    ps.process_tactic(Tactic::Qed).unwrap();
    assert!(ps.is_done());
}

#[test]
fn intro_fails_on_a_non_function_goal() {
    let mut ps = new_proof(v("t"), base_context(), nat());
    ps.process_tactic(Tactic::Attack).unwrap();
    let err = ps.process_tactic(Tactic::Intro(None)).unwrap_err();
    assert!(err.to_string().contains("not a function type"));
}

#[test]
fn prep_fill_defers_checking_to_complete_fill() {
    // Π n:Nat. Nat, filled with S n built from bare references
    let goal = pi("n", nat(), nat());
    let mut ps = new_proof(v("t"), base_context(), goal);
    ps.process_tactic(Tactic::Attack).unwrap();
    ps.process_tactic(Tactic::Intro(None)).unwrap();
    ps.process_tactic(Tactic::PrepFill(v("S"), vec![v("n")]))
        .unwrap();
    ps.process_tactic(Tactic::CompleteFill).unwrap();
    ps.process_tactic(Tactic::Solve).unwrap();
    ps.process_tactic(Tactic::Solve).unwrap();
    ps.process_tactic(Tactic::Qed).unwrap();
    assert!(ps.is_done());
    let expected = mk_bind(
        v("n"),
        Binder::Lam { ty: nat() },
        suc(mk_bound(v("n"), nat())),
    );
    assert!(ps.term().alpha_eq(&expected));
}

#[test]
fn intro_ty_unifies_the_given_domain() {
    let goal = pi("x", nat(), nat());
    let mut ps = new_proof(v("t"), base_context(), goal);
    ps.process_tactic(Tactic::Attack).unwrap();
    ps.process_tactic(Tactic::IntroTy(raw_var(v("Nat")), Some(v("w"))))
        .unwrap();
    ps.process_tactic(Tactic::Fill(raw_var(v("w")))).unwrap();
    ps.process_tactic(Tactic::Solve).unwrap();
    ps.process_tactic(Tactic::Solve).unwrap();
    ps.process_tactic(Tactic::Qed).unwrap();
    assert!(ps.is_done());
}

#[test]
fn forall_binds_over_a_universe_goal() {
    let mut ps = new_proof(v("t"), base_context(), mk_sort(0));
    ps.process_tactic(Tactic::Attack).unwrap();
    ps.process_tactic(Tactic::Forall(v("w"), raw_var(v("Nat"))))
        .unwrap();
    ps.process_tactic(Tactic::Exact(raw_var(v("Nat")))).unwrap();
    ps.process_tactic(Tactic::Solve).unwrap();
    ps.process_tactic(Tactic::Solve).unwrap();
    ps.process_tactic(Tactic::Qed).unwrap();
    let expected = pi("w", nat(), nat());
    assert!(ps.term().alpha_eq(&expected));
}

#[test]
fn equiv_swaps_the_goal_for_a_convertible_one() {
    let redex = mk_app(
        mk_bind(
            v("x"),
            Binder::Lam { ty: mk_sort(0) },
            mk_bound(v("x"), mk_sort(0)),
        ),
        nat(),
    );
    let mut ps = new_proof(v("t"), base_context(), nat());
    ps.process_tactic(Tactic::Equiv(redex.forget())).unwrap();
    let (_, binder) = ps.goal_at_focus().unwrap();
    assert!(binder.ty().alpha_eq(&redex));
    ps.process_tactic(Tactic::Compute).unwrap();
    ps.process_tactic(Tactic::Exact(raw_var(v("Z")))).unwrap();
    ps.process_tactic(Tactic::Solve).unwrap();
    ps.process_tactic(Tactic::Qed).unwrap();
    assert!(ps.is_done());
}

#[test]
fn instance_holes_move_to_the_back_of_the_queue() {
    let mut ps = new_proof(v("t"), base_context(), nat());
    ps.process_tactic(Tactic::Claim(v("c"), raw_var(v("Nat"))))
        .unwrap();
    ps.process_tactic(Tactic::Focus(v("c"))).unwrap();
    assert_eq!(ps.focus(), Some(&v("c")));
    ps.process_tactic(Tactic::Instance(v("c"))).unwrap();
    assert_eq!(ps.instances(), &[v("c")]);
    assert_eq!(ps.holes().last(), Some(&v("c")));
    assert_ne!(ps.focus(), Some(&v("c")));
}

#[test]
fn patvar_records_the_pending_equation() {
    let mut ps = new_proof(v("t"), base_context(), nat());
    ps.process_tactic(Tactic::PatVar(v("pv"))).unwrap();
    assert!(ps.holes().is_empty());
    assert_eq!(ps.notunified().len(), 1);
    let Term::Bind(b) = ps.term() else {
        panic!("expected a pattern binder");
    };
    assert!(matches!(b.binder, Binder::PVar { .. }));
}
