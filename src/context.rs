use std::collections::HashMap;

use crate::tt::{Name, RefKind, Term};

/// A global definition.
#[derive(Debug, Clone)]
pub enum Def {
    /// A defined constant with a body the evaluator may unfold.
    Function { ty: Term, val: Term },
    /// A declared constant without a body: postulates, data constructors,
    /// type constructors.
    TyDecl { kind: RefKind, ty: Term },
}

impl Def {
    pub fn ty(&self) -> &Term {
        match self {
            Def::Function { ty, .. } => ty,
            Def::TyDecl { ty, .. } => ty,
        }
    }

    pub fn ref_kind(&self) -> RefKind {
        match self {
            Def::Function { .. } => RefKind::Global,
            Def::TyDecl { kind, .. } => *kind,
        }
    }
}

/// Metainformation attached to a global name.
#[derive(Debug, Clone)]
pub enum MetaInformation {
    Data(DataMI),
}

/// Which argument positions of an inductive family are parameters (the
/// rest are indices).
#[derive(Debug, Clone)]
pub struct DataMI {
    pub param_positions: Vec<usize>,
}

/// The global definition environment. Read-only from the engine's point of
/// view; drivers populate it and pass it by value into a proof state.
#[derive(Debug, Clone, Default)]
pub struct Context {
    defs: HashMap<Name, Def>,
    meta: HashMap<Name, MetaInformation>,
    eliminators: HashMap<Name, Vec<Name>>,
}

impl Context {
    pub fn new() -> Context {
        Context::default()
    }

    pub fn add_function(&mut self, name: Name, ty: Term, val: Term) {
        self.defs.insert(name, Def::Function { ty, val });
    }

    pub fn add_ty_decl(&mut self, name: Name, kind: RefKind, ty: Term) {
        self.defs.insert(name, Def::TyDecl { kind, ty });
    }

    pub fn set_meta(&mut self, name: Name, meta: MetaInformation) {
        self.meta.insert(name, meta);
    }

    /// Register `elim` as an eliminator for the inductive family `tycon`.
    pub fn add_eliminator(&mut self, tycon: Name, elim: Name) {
        self.eliminators.entry(tycon).or_default().push(elim);
    }

    pub fn lookup_def(&self, name: &Name) -> Option<&Def> {
        self.defs.get(name)
    }

    pub fn lookup_ty(&self, name: &Name) -> Option<&Term> {
        self.defs.get(name).map(Def::ty)
    }

    pub fn lookup_meta(&self, name: &Name) -> Option<&MetaInformation> {
        self.meta.get(name)
    }

    pub fn eliminators_of(&self, tycon: &Name) -> &[Name] {
        self.eliminators
            .get(tycon)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains(&self, name: &Name) -> bool {
        self.defs.contains_key(name)
    }

    /// A name based on `base` that collides neither with `used` nor with any
    /// global definition.
    pub fn unique_name(&self, base: &Name, used: &[Name]) -> Name {
        if !used.contains(base) && !self.contains(base) {
            return base.clone();
        }
        let mut k = 0;
        loop {
            let cand = Name::machine(base.base(), k);
            if !used.contains(&cand) && !self.contains(&cand) {
                return cand;
            }
            k += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tt::mk_sort;

    #[test]
    fn unique_name_prefers_the_base() {
        let ctxt = Context::new();
        let x = Name::intern("x").unwrap();
        assert_eq!(ctxt.unique_name(&x, &[]), x);
    }

    #[test]
    fn unique_name_steps_over_used_and_defined() {
        let mut ctxt = Context::new();
        let x = Name::intern("x").unwrap();
        ctxt.add_ty_decl(x.clone(), RefKind::Global, mk_sort(0));
        let fresh = ctxt.unique_name(&x, &[Name::machine("x", 0)]);
        assert_eq!(fresh, Name::machine("x", 1));
    }
}
