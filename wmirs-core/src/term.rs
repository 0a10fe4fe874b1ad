//! Hash-consed term arena.
//!
//! Terms are stored in a single arena owned by a [`TermManager`]; structural
//! keys are interned in a hash map so that equal structure implies equal
//! [`TermId`]. Every node caches its free atoms and free real variables,
//! computed once at construction from the (already interned) children.
//!
//! Two sorts coexist in one arena: Boolean-sorted formulas and real-sorted
//! arithmetic terms. Linear inequalities are canonicalized into
//! [`TermKind::LinearAtom`] at construction so that equivalent constraints
//! (`x >= 0`, `0 <= x`, `2x >= 0`) intern to the same node.

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::error::{CoreError, Result};

/// Identifier of an interned term; equality of ids is structural equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TermId(u32);

impl TermId {
    /// Raw index into the arena.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Structural payload of a term node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TermKind {
    /// Boolean constant true.
    True,
    /// Boolean constant false.
    False,
    /// Propositional variable.
    BoolVar(Box<str>),
    /// Negation.
    Not(TermId),
    /// N-ary conjunction (flattened, sorted, deduplicated).
    And(SmallVec<[TermId; 4]>),
    /// N-ary disjunction (flattened, sorted, deduplicated).
    Or(SmallVec<[TermId; 4]>),
    /// Implication `lhs -> rhs`.
    Implies(TermId, TermId),
    /// Biconditional (arguments sorted).
    Iff(TermId, TermId),
    /// Exclusive or (arguments sorted).
    Xor(TermId, TermId),
    /// Boolean-sorted if-then-else.
    Ite(TermId, TermId, TermId),

    /// Canonical linear inequality `sum coeff_i * var_i (<= | <) bound`.
    ///
    /// Coefficients are integers with gcd 1, variables sorted by id.
    LinearAtom {
        /// Pairs of real variable and integer coefficient.
        terms: Box<[(TermId, BigInt)]>,
        /// Right-hand side constant.
        bound: BigRational,
        /// True for `<`, false for `<=`.
        strict: bool,
    },
    /// Equality between two real terms (arguments sorted).
    Eq(TermId, TermId),

    /// Rational constant.
    RealConst(BigRational),
    /// Real-sorted variable.
    RealVar(Box<str>),
    /// N-ary sum (flattened).
    Add(SmallVec<[TermId; 4]>),
    /// Difference `lhs - rhs`.
    Sub(TermId, TermId),
    /// N-ary product (flattened).
    Mul(SmallVec<[TermId; 4]>),
    /// Integer power of a real term.
    Pow(TermId, u32),
    /// Division; kept symbolic only for non-constant divisors.
    Div(TermId, TermId),
    /// Real-sorted if-then-else.
    RealIte(TermId, TermId, TermId),
}

/// An interned term: its kind plus cached free-variable information.
#[derive(Debug, Clone)]
pub struct Term {
    /// Structural payload.
    pub kind: TermKind,
    /// Free atoms (propositional variables, inequalities, equalities), sorted.
    pub atoms: Box<[TermId]>,
    /// Free real variables, sorted.
    pub reals: Box<[TermId]>,
}

/// Outcome of linearizing a real term: `sum coeffs + constant`.
#[derive(Debug, Clone, Default)]
struct LinForm {
    coeffs: FxHashMap<TermId, BigRational>,
    constant: BigRational,
}

/// Arena, intern table and atom pool for terms.
///
/// All construction goes through the `mk_*` methods, which apply local
/// simplifications (constant folding, flattening, duplicate and complement
/// collapse, `ite(c, t, t) = t`) so that the structure-awareness checks of
/// the enumerator reduce to id comparison.
pub struct TermManager {
    terms: Vec<Term>,
    intern: FxHashMap<TermKind, TermId>,
    cond_labels: FxHashSet<TermId>,
    next_label: u32,
    true_id: TermId,
    false_id: TermId,
}

impl Default for TermManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TermManager {
    /// Create an empty manager with interned Boolean constants.
    #[must_use]
    pub fn new() -> Self {
        let mut tm = Self {
            terms: Vec::new(),
            intern: FxHashMap::default(),
            cond_labels: FxHashSet::default(),
            next_label: 0,
            true_id: TermId(0),
            false_id: TermId(0),
        };
        tm.true_id = tm.intern(TermKind::True);
        tm.false_id = tm.intern(TermKind::False);
        tm
    }

    /// Number of interned nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// True if only the Boolean constants are interned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.len() <= 2
    }

    /// Look up a term by id.
    #[must_use]
    pub fn term(&self, id: TermId) -> &Term {
        &self.terms[id.index()]
    }

    /// Kind of a term.
    #[must_use]
    pub fn kind(&self, id: TermId) -> &TermKind {
        &self.terms[id.index()].kind
    }

    /// Cached free atoms of a term.
    #[must_use]
    pub fn atoms(&self, id: TermId) -> &[TermId] {
        &self.terms[id.index()].atoms
    }

    /// Cached free real variables of a term.
    #[must_use]
    pub fn reals(&self, id: TermId) -> &[TermId] {
        &self.terms[id.index()].reals
    }

    /// The interned `true` constant.
    #[must_use]
    pub fn mk_true(&self) -> TermId {
        self.true_id
    }

    /// The interned `false` constant.
    #[must_use]
    pub fn mk_false(&self) -> TermId {
        self.false_id
    }

    /// Boolean constant from a native bool.
    #[must_use]
    pub fn mk_bool(&self, value: bool) -> TermId {
        if value { self.true_id } else { self.false_id }
    }

    /// True iff the node is one of the Boolean constants.
    #[must_use]
    pub fn is_bool_const(&self, id: TermId) -> bool {
        id == self.true_id || id == self.false_id
    }

    /// Propositional variable with the given name.
    pub fn mk_bool_var(&mut self, name: &str) -> TermId {
        self.intern(TermKind::BoolVar(name.into()))
    }

    /// Real-sorted variable with the given name.
    pub fn mk_real_var(&mut self, name: &str) -> TermId {
        self.intern(TermKind::RealVar(name.into()))
    }

    /// Rational constant.
    pub fn mk_real(&mut self, value: BigRational) -> TermId {
        self.intern(TermKind::RealConst(value))
    }

    /// Integer-valued rational constant.
    pub fn mk_real_int(&mut self, value: i64) -> TermId {
        self.mk_real(BigRational::from_integer(BigInt::from(value)))
    }

    /// Rational constant from a numerator/denominator pair.
    pub fn mk_real_frac(&mut self, numer: i64, denom: i64) -> TermId {
        self.mk_real(BigRational::new(BigInt::from(numer), BigInt::from(denom)))
    }

    /// Allocate a fresh condition label: a reserved propositional variable
    /// used by the weight decomposer. Labels are tracked in a registry so
    /// [`Self::is_cond_label`] can recognize them later.
    pub fn fresh_cond_label(&mut self) -> TermId {
        loop {
            let name = format!(".cnd{}", self.next_label);
            self.next_label += 1;
            let key = TermKind::BoolVar(name.into());
            if self.intern.contains_key(&key) {
                continue;
            }
            let id = self.intern(key);
            self.cond_labels.insert(id);
            return id;
        }
    }

    /// True iff the node is a condition label allocated by
    /// [`Self::fresh_cond_label`].
    #[must_use]
    pub fn is_cond_label(&self, id: TermId) -> bool {
        self.cond_labels.contains(&id)
    }

    /// True iff the node is an atom: a propositional variable, a linear
    /// inequality or a real equality.
    #[must_use]
    pub fn is_atom(&self, id: TermId) -> bool {
        matches!(
            self.kind(id),
            TermKind::BoolVar(_) | TermKind::LinearAtom { .. } | TermKind::Eq(_, _)
        )
    }

    /// True iff the node is an atom or a negated atom.
    #[must_use]
    pub fn is_literal(&self, id: TermId) -> bool {
        match self.kind(id) {
            TermKind::Not(inner) => self.is_atom(*inner),
            _ => self.is_atom(id),
        }
    }

    /// Negation, with double negation and constants folded away.
    pub fn mk_not(&mut self, arg: TermId) -> TermId {
        match self.kind(arg) {
            TermKind::True => self.false_id,
            TermKind::False => self.true_id,
            TermKind::Not(inner) => *inner,
            _ => self.intern(TermKind::Not(arg)),
        }
    }

    /// N-ary conjunction. Flattens nested conjunctions, drops `true`,
    /// collapses duplicates, and returns `false` on a complementary pair.
    pub fn mk_and(&mut self, args: impl IntoIterator<Item = TermId>) -> TermId {
        let Some(flat) = self.flatten_bool(args, /* and= */ true) else {
            return self.false_id;
        };
        match flat.len() {
            0 => self.true_id,
            1 => flat[0],
            _ => self.intern(TermKind::And(flat)),
        }
    }

    /// N-ary disjunction, dual to [`Self::mk_and`].
    pub fn mk_or(&mut self, args: impl IntoIterator<Item = TermId>) -> TermId {
        let Some(flat) = self.flatten_bool(args, /* and= */ false) else {
            return self.true_id;
        };
        match flat.len() {
            0 => self.false_id,
            1 => flat[0],
            _ => self.intern(TermKind::Or(flat)),
        }
    }

    /// Flatten, sort and deduplicate the arguments of an AND/OR.
    ///
    /// Returns `None` when the connective collapses to its annihilator
    /// (a `false` argument or complementary pair for AND, dually for OR).
    fn flatten_bool(
        &mut self,
        args: impl IntoIterator<Item = TermId>,
        is_and: bool,
    ) -> Option<SmallVec<[TermId; 4]>> {
        let neutral = if is_and { self.true_id } else { self.false_id };
        let annihilator = if is_and { self.false_id } else { self.true_id };

        let mut flat: SmallVec<[TermId; 4]> = SmallVec::new();
        let mut stack: Vec<TermId> = args.into_iter().collect();
        stack.reverse();
        while let Some(arg) = stack.pop() {
            if arg == annihilator {
                return None;
            }
            if arg == neutral {
                continue;
            }
            match (self.kind(arg), is_and) {
                (TermKind::And(inner), true) | (TermKind::Or(inner), false) => {
                    stack.extend(inner.iter().rev().copied());
                }
                _ => flat.push(arg),
            }
        }
        flat.sort_unstable();
        flat.dedup();

        let present: FxHashSet<TermId> = flat.iter().copied().collect();
        for &arg in &flat {
            if let TermKind::Not(inner) = self.kind(arg) {
                if present.contains(inner) {
                    return None;
                }
            }
        }
        Some(flat)
    }

    /// Implication `lhs -> rhs`.
    pub fn mk_implies(&mut self, lhs: TermId, rhs: TermId) -> TermId {
        if lhs == self.true_id {
            return rhs;
        }
        if lhs == self.false_id || rhs == self.true_id || lhs == rhs {
            return self.true_id;
        }
        if rhs == self.false_id {
            return self.mk_not(lhs);
        }
        self.intern(TermKind::Implies(lhs, rhs))
    }

    /// Biconditional `lhs <-> rhs`.
    pub fn mk_iff(&mut self, lhs: TermId, rhs: TermId) -> TermId {
        if lhs == rhs {
            return self.true_id;
        }
        if lhs == self.true_id {
            return rhs;
        }
        if rhs == self.true_id {
            return lhs;
        }
        if lhs == self.false_id {
            return self.mk_not(rhs);
        }
        if rhs == self.false_id {
            return self.mk_not(lhs);
        }
        if self.complementary(lhs, rhs) {
            return self.false_id;
        }
        let (a, b) = if lhs <= rhs { (lhs, rhs) } else { (rhs, lhs) };
        self.intern(TermKind::Iff(a, b))
    }

    /// Exclusive or.
    pub fn mk_xor(&mut self, lhs: TermId, rhs: TermId) -> TermId {
        if lhs == rhs {
            return self.false_id;
        }
        if lhs == self.false_id {
            return rhs;
        }
        if rhs == self.false_id {
            return lhs;
        }
        if lhs == self.true_id {
            return self.mk_not(rhs);
        }
        if rhs == self.true_id {
            return self.mk_not(lhs);
        }
        if self.complementary(lhs, rhs) {
            return self.true_id;
        }
        let (a, b) = if lhs <= rhs { (lhs, rhs) } else { (rhs, lhs) };
        self.intern(TermKind::Xor(a, b))
    }

    /// Boolean if-then-else.
    pub fn mk_ite(&mut self, cond: TermId, then: TermId, els: TermId) -> TermId {
        if cond == self.true_id {
            return then;
        }
        if cond == self.false_id {
            return els;
        }
        if then == els {
            return then;
        }
        if then == self.true_id && els == self.false_id {
            return cond;
        }
        if then == self.false_id && els == self.true_id {
            return self.mk_not(cond);
        }
        self.intern(TermKind::Ite(cond, then, els))
    }

    fn complementary(&self, lhs: TermId, rhs: TermId) -> bool {
        match (self.kind(lhs), self.kind(rhs)) {
            (TermKind::Not(a), _) => *a == rhs,
            (_, TermKind::Not(b)) => *b == lhs,
            _ => false,
        }
    }

    /// N-ary sum; nested sums are flattened and constants folded.
    pub fn mk_add(&mut self, args: impl IntoIterator<Item = TermId>) -> TermId {
        let mut constant = BigRational::zero();
        let mut rest: SmallVec<[TermId; 4]> = SmallVec::new();
        let mut stack: Vec<TermId> = args.into_iter().collect();
        stack.reverse();
        while let Some(arg) = stack.pop() {
            match self.kind(arg) {
                TermKind::Add(inner) => stack.extend(inner.iter().rev().copied()),
                TermKind::RealConst(c) => constant += c,
                _ => rest.push(arg),
            }
        }
        if !constant.is_zero() || rest.is_empty() {
            let c = self.mk_real(constant);
            rest.push(c);
        }
        match rest.len() {
            1 => rest[0],
            _ => self.intern(TermKind::Add(rest)),
        }
    }

    /// Difference `lhs - rhs`.
    pub fn mk_sub(&mut self, lhs: TermId, rhs: TermId) -> TermId {
        if let (TermKind::RealConst(a), TermKind::RealConst(b)) = (self.kind(lhs), self.kind(rhs)) {
            let v = a - b;
            return self.mk_real(v);
        }
        if let TermKind::RealConst(b) = self.kind(rhs) {
            if b.is_zero() {
                return lhs;
            }
        }
        self.intern(TermKind::Sub(lhs, rhs))
    }

    /// N-ary product; nested products are flattened and constants folded.
    pub fn mk_mul(&mut self, args: impl IntoIterator<Item = TermId>) -> TermId {
        let mut constant = BigRational::one();
        let mut rest: SmallVec<[TermId; 4]> = SmallVec::new();
        let mut stack: Vec<TermId> = args.into_iter().collect();
        stack.reverse();
        while let Some(arg) = stack.pop() {
            match self.kind(arg) {
                TermKind::Mul(inner) => stack.extend(inner.iter().rev().copied()),
                TermKind::RealConst(c) => constant *= c,
                _ => rest.push(arg),
            }
        }
        if constant.is_zero() || rest.is_empty() {
            return self.mk_real(constant);
        }
        if !constant.is_one() {
            let c = self.mk_real(constant);
            rest.insert(0, c);
        }
        match rest.len() {
            1 => rest[0],
            _ => self.intern(TermKind::Mul(rest)),
        }
    }

    /// Integer power.
    pub fn mk_pow(&mut self, base: TermId, exp: u32) -> TermId {
        if exp == 0 {
            return self.mk_real_int(1);
        }
        if exp == 1 {
            return base;
        }
        if let TermKind::RealConst(c) = self.kind(base) {
            let mut acc = BigRational::one();
            for _ in 0..exp {
                acc *= c;
            }
            return self.mk_real(acc);
        }
        self.intern(TermKind::Pow(base, exp))
    }

    /// Division. Constant divisors fold into a product with the reciprocal;
    /// a symbolic divisor is kept and rejected later by the weight checks.
    pub fn mk_div(&mut self, lhs: TermId, rhs: TermId) -> Result<TermId> {
        if let TermKind::RealConst(d) = self.kind(rhs) {
            if d.is_zero() {
                return Err(CoreError::DivisionByZero(self.display(lhs)));
            }
            let inv = self.mk_real(d.recip());
            return Ok(self.mk_mul(vec![inv, lhs]));
        }
        Ok(self.intern(TermKind::Div(lhs, rhs)))
    }

    /// Real-sorted if-then-else.
    pub fn mk_real_ite(&mut self, cond: TermId, then: TermId, els: TermId) -> TermId {
        if cond == self.true_id {
            return then;
        }
        if cond == self.false_id {
            return els;
        }
        if then == els {
            return then;
        }
        self.intern(TermKind::RealIte(cond, then, els))
    }

    /// Canonical inequality `lhs <= rhs`.
    pub fn mk_le(&mut self, lhs: TermId, rhs: TermId) -> Result<TermId> {
        self.mk_linear_atom(lhs, rhs, false)
    }

    /// Canonical inequality `lhs < rhs`.
    pub fn mk_lt(&mut self, lhs: TermId, rhs: TermId) -> Result<TermId> {
        self.mk_linear_atom(lhs, rhs, true)
    }

    /// `lhs >= rhs`, canonicalized as `rhs <= lhs`.
    pub fn mk_ge(&mut self, lhs: TermId, rhs: TermId) -> Result<TermId> {
        self.mk_linear_atom(rhs, lhs, false)
    }

    /// `lhs > rhs`, canonicalized as `rhs < lhs`.
    pub fn mk_gt(&mut self, lhs: TermId, rhs: TermId) -> Result<TermId> {
        self.mk_linear_atom(rhs, lhs, true)
    }

    /// Equality over real terms. Kept as an atom; the conversion layer
    /// decides between alias substitution and a half-space pair.
    pub fn mk_eq(&mut self, lhs: TermId, rhs: TermId) -> TermId {
        if lhs == rhs {
            return self.true_id;
        }
        if let (TermKind::RealConst(a), TermKind::RealConst(b)) = (self.kind(lhs), self.kind(rhs)) {
            return self.mk_bool(a == b);
        }
        let (a, b) = if lhs <= rhs { (lhs, rhs) } else { (rhs, lhs) };
        self.intern(TermKind::Eq(a, b))
    }

    /// Build the canonical form of `lhs (<= | <) rhs`.
    ///
    /// The difference `lhs - rhs` is linearized; coefficients are scaled to
    /// integers with gcd 1 so that structural interning identifies scaled
    /// variants of the same half-space. A constraint without variables folds
    /// to a Boolean constant.
    fn mk_linear_atom(&mut self, lhs: TermId, rhs: TermId, strict: bool) -> Result<TermId> {
        let left = self.linearize(lhs)?;
        let right = self.linearize(rhs)?;

        let mut coeffs = left.coeffs;
        for (var, c) in right.coeffs {
            let entry = coeffs.entry(var).or_insert_with(BigRational::zero);
            *entry -= c;
        }
        coeffs.retain(|_, c| !c.is_zero());
        let bound = right.constant - left.constant;

        if coeffs.is_empty() {
            let holds = if strict {
                BigRational::zero() < bound
            } else {
                BigRational::zero() <= bound
            };
            return Ok(self.mk_bool(holds));
        }

        // Scale to integer coefficients with gcd 1.
        let mut lcm = BigInt::one();
        for c in coeffs.values() {
            lcm = num_integer_lcm(&lcm, c.denom());
        }
        let scale = BigRational::from_integer(lcm);
        let mut terms: Vec<(TermId, BigInt)> = coeffs
            .into_iter()
            .map(|(var, c)| (var, (c * &scale).to_integer()))
            .collect();
        let mut gcd = BigInt::zero();
        for (_, c) in &terms {
            gcd = num_integer_gcd(&gcd, c);
        }
        let bound = bound * scale / BigRational::from_integer(gcd.clone());
        for (_, c) in &mut terms {
            *c = &*c / &gcd;
        }
        terms.sort_unstable_by_key(|(var, _)| *var);

        Ok(self.intern(TermKind::LinearAtom {
            terms: terms.into_boxed_slice(),
            bound,
            strict,
        }))
    }

    /// Linearize a real term into `sum coeffs + constant`.
    fn linearize(&self, id: TermId) -> Result<LinForm> {
        match self.kind(id).clone() {
            TermKind::RealConst(c) => Ok(LinForm {
                coeffs: FxHashMap::default(),
                constant: c,
            }),
            TermKind::RealVar(_) => {
                let mut coeffs = FxHashMap::default();
                coeffs.insert(id, BigRational::one());
                Ok(LinForm {
                    coeffs,
                    constant: BigRational::zero(),
                })
            }
            TermKind::Add(args) => {
                let mut acc = LinForm::default();
                for arg in args {
                    let form = self.linearize(arg)?;
                    acc.constant += form.constant;
                    for (var, c) in form.coeffs {
                        let entry = acc.coeffs.entry(var).or_insert_with(BigRational::zero);
                        *entry += c;
                    }
                }
                acc.coeffs.retain(|_, c| !c.is_zero());
                Ok(acc)
            }
            TermKind::Sub(lhs, rhs) => {
                let mut acc = self.linearize(lhs)?;
                let form = self.linearize(rhs)?;
                acc.constant -= form.constant;
                for (var, c) in form.coeffs {
                    let entry = acc.coeffs.entry(var).or_insert_with(BigRational::zero);
                    *entry -= c;
                }
                acc.coeffs.retain(|_, c| !c.is_zero());
                Ok(acc)
            }
            TermKind::Mul(args) => {
                let mut constant = BigRational::one();
                let mut linear: Option<LinForm> = None;
                for arg in args {
                    let form = self.linearize(arg)?;
                    if form.coeffs.is_empty() {
                        constant *= form.constant;
                    } else if linear.is_none() {
                        linear = Some(form);
                    } else {
                        return Err(CoreError::NonLinearAtom(self.display(id)));
                    }
                }
                match linear {
                    None => Ok(LinForm {
                        coeffs: FxHashMap::default(),
                        constant,
                    }),
                    Some(form) => Ok(LinForm {
                        coeffs: form
                            .coeffs
                            .into_iter()
                            .map(|(var, c)| (var, c * &constant))
                            .filter(|(_, c)| !c.is_zero())
                            .collect(),
                        constant: form.constant * constant,
                    }),
                }
            }
            TermKind::Pow(base, exp) => {
                let form = self.linearize(base)?;
                if !form.coeffs.is_empty() {
                    return Err(CoreError::NonLinearAtom(self.display(id)));
                }
                let mut acc = BigRational::one();
                for _ in 0..exp {
                    acc *= &form.constant;
                }
                Ok(LinForm {
                    coeffs: FxHashMap::default(),
                    constant: acc,
                })
            }
            _ => Err(CoreError::NonLinearAtom(self.display(id))),
        }
    }

    /// Intern a kind, computing the free-variable caches on first insertion.
    pub(crate) fn intern(&mut self, kind: TermKind) -> TermId {
        if let Some(&id) = self.intern.get(&kind) {
            return id;
        }
        let id = TermId(self.terms.len() as u32);
        let (atoms, reals) = self.caches_for(id, &kind);
        self.terms.push(Term { kind: kind.clone(), atoms, reals });
        self.intern.insert(kind, id);
        id
    }

    /// Compute the free-atom and free-real caches for a new node.
    fn caches_for(&self, own: TermId, kind: &TermKind) -> (Box<[TermId]>, Box<[TermId]>) {
        match kind {
            TermKind::True | TermKind::False | TermKind::RealConst(_) => {
                (Box::default(), Box::default())
            }
            TermKind::BoolVar(_) => (Box::from([own]), Box::default()),
            TermKind::RealVar(_) => (Box::default(), Box::from([own])),
            TermKind::LinearAtom { terms, .. } => {
                let mut reals: Vec<TermId> = terms.iter().map(|(var, _)| *var).collect();
                reals.sort_unstable();
                (Box::from([own]), reals.into_boxed_slice())
            }
            TermKind::Eq(lhs, rhs) => {
                let reals = self.union_of(&[*lhs, *rhs], |t| &t.reals);
                (Box::from([own]), reals)
            }
            _ => {
                let children = self.children(kind);
                let atoms = self.union_of(&children, |t| &t.atoms);
                let reals = self.union_of(&children, |t| &t.reals);
                (atoms, reals)
            }
        }
    }

    fn union_of(&self, children: &[TermId], select: fn(&Term) -> &Box<[TermId]>) -> Box<[TermId]> {
        let mut out: Vec<TermId> = Vec::new();
        for &child in children {
            out.extend_from_slice(select(&self.terms[child.index()]));
        }
        out.sort_unstable();
        out.dedup();
        out.into_boxed_slice()
    }

    /// Direct children of a kind.
    #[must_use]
    pub fn children(&self, kind: &TermKind) -> SmallVec<[TermId; 4]> {
        match kind {
            TermKind::True
            | TermKind::False
            | TermKind::BoolVar(_)
            | TermKind::RealVar(_)
            | TermKind::RealConst(_)
            | TermKind::LinearAtom { .. } => SmallVec::new(),
            TermKind::Not(a) | TermKind::Pow(a, _) => SmallVec::from_slice(&[*a]),
            TermKind::Implies(a, b)
            | TermKind::Iff(a, b)
            | TermKind::Xor(a, b)
            | TermKind::Eq(a, b)
            | TermKind::Sub(a, b)
            | TermKind::Div(a, b) => SmallVec::from_slice(&[*a, *b]),
            TermKind::Ite(a, b, c) | TermKind::RealIte(a, b, c) => {
                SmallVec::from_slice(&[*a, *b, *c])
            }
            TermKind::And(args) | TermKind::Or(args) | TermKind::Add(args) | TermKind::Mul(args) => {
                args.clone()
            }
        }
    }

    /// Render a term for diagnostics.
    #[must_use]
    pub fn display(&self, id: TermId) -> String {
        match self.kind(id) {
            TermKind::True => "true".into(),
            TermKind::False => "false".into(),
            TermKind::BoolVar(name) | TermKind::RealVar(name) => name.to_string(),
            TermKind::RealConst(c) => c.to_string(),
            TermKind::Not(a) => format!("(not {})", self.display(*a)),
            TermKind::And(args) => self.display_nary("and", args),
            TermKind::Or(args) => self.display_nary("or", args),
            TermKind::Add(args) => self.display_nary("+", args),
            TermKind::Mul(args) => self.display_nary("*", args),
            TermKind::Implies(a, b) => format!("(=> {} {})", self.display(*a), self.display(*b)),
            TermKind::Iff(a, b) => format!("(= {} {})", self.display(*a), self.display(*b)),
            TermKind::Xor(a, b) => format!("(xor {} {})", self.display(*a), self.display(*b)),
            TermKind::Eq(a, b) => format!("(= {} {})", self.display(*a), self.display(*b)),
            TermKind::Sub(a, b) => format!("(- {} {})", self.display(*a), self.display(*b)),
            TermKind::Div(a, b) => format!("(/ {} {})", self.display(*a), self.display(*b)),
            TermKind::Pow(a, e) => format!("(^ {} {e})", self.display(*a)),
            TermKind::Ite(c, t, e) | TermKind::RealIte(c, t, e) => format!(
                "(ite {} {} {})",
                self.display(*c),
                self.display(*t),
                self.display(*e)
            ),
            TermKind::LinearAtom { terms, bound, strict } => {
                let lhs = terms
                    .iter()
                    .map(|(var, c)| format!("{} {}", c, self.display(*var)))
                    .collect::<Vec<_>>()
                    .join(" + ");
                format!("({} {} {})", if *strict { "<" } else { "<=" }, lhs, bound)
            }
        }
    }

    fn display_nary(&self, op: &str, args: &[TermId]) -> String {
        let body = args
            .iter()
            .map(|a| self.display(*a))
            .collect::<Vec<_>>()
            .join(" ");
        format!("({op} {body})")
    }
}

fn num_integer_gcd(a: &BigInt, b: &BigInt) -> BigInt {
    let mut x = a.abs();
    let mut y = b.abs();
    while !y.is_zero() {
        let r = &x % &y;
        x = y;
        y = r;
    }
    x
}

fn num_integer_lcm(a: &BigInt, b: &BigInt) -> BigInt {
    if a.is_zero() || b.is_zero() {
        return BigInt::zero();
    }
    (a * b).abs() / num_integer_gcd(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_consing_shares_nodes() {
        let mut tm = TermManager::new();
        let x = tm.mk_real_var("x");
        let y = tm.mk_real_var("y");
        let a = tm.mk_add(vec![x, y]);
        let b = tm.mk_add(vec![x, y]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_and_simplifications() {
        let mut tm = TermManager::new();
        let p = tm.mk_bool_var("p");
        let q = tm.mk_bool_var("q");
        let t = tm.mk_true();

        assert_eq!(tm.mk_and(vec![p, t]), p);
        assert_eq!(tm.mk_and(vec![p, p, q]), tm.mk_and(vec![q, p]));
        let np = tm.mk_not(p);
        assert_eq!(tm.mk_and(vec![p, np]), tm.mk_false());
        assert_eq!(tm.mk_or(vec![p, np]), tm.mk_true());
    }

    #[test]
    fn test_scaled_inequalities_intern_together() {
        let mut tm = TermManager::new();
        let x = tm.mk_real_var("x");
        let one = tm.mk_real_int(1);
        let two = tm.mk_real_int(2);
        let two_x = tm.mk_mul(vec![two, x]);

        let a = tm.mk_le(x, one).unwrap();
        let b = tm.mk_le(two_x, two).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_ge_mirrors_le() {
        let mut tm = TermManager::new();
        let x = tm.mk_real_var("x");
        let zero = tm.mk_real_int(0);
        let ge = tm.mk_ge(x, zero).unwrap();
        let le = tm.mk_le(zero, x).unwrap();
        assert_eq!(ge, le);
        match tm.kind(ge) {
            TermKind::LinearAtom { terms, bound, strict } => {
                assert_eq!(terms.len(), 1);
                assert_eq!(terms[0].1, BigInt::from(-1));
                assert!(bound.is_zero());
                assert!(!strict);
            }
            other => panic!("expected linear atom, got {other:?}"),
        }
    }

    #[test]
    fn test_constant_inequality_folds() {
        let mut tm = TermManager::new();
        let one = tm.mk_real_int(1);
        let two = tm.mk_real_int(2);
        assert_eq!(tm.mk_le(one, two).unwrap(), tm.mk_true());
        assert_eq!(tm.mk_lt(two, one).unwrap(), tm.mk_false());
        assert_eq!(tm.mk_lt(one, one).unwrap(), tm.mk_false());
        assert_eq!(tm.mk_le(one, one).unwrap(), tm.mk_true());
    }

    #[test]
    fn test_nonlinear_atom_rejected() {
        let mut tm = TermManager::new();
        let x = tm.mk_real_var("x");
        let y = tm.mk_real_var("y");
        let xy = tm.mk_mul(vec![x, y]);
        let zero = tm.mk_real_int(0);
        assert!(matches!(tm.mk_le(xy, zero), Err(CoreError::NonLinearAtom(_))));
    }

    #[test]
    fn test_ite_branch_collapse() {
        let mut tm = TermManager::new();
        let p = tm.mk_bool_var("p");
        let x = tm.mk_real_var("x");
        assert_eq!(tm.mk_real_ite(p, x, x), x);

        let q = tm.mk_bool_var("q");
        assert_eq!(tm.mk_ite(p, q, q), q);
    }

    #[test]
    fn test_atom_caches() {
        let mut tm = TermManager::new();
        let p = tm.mk_bool_var("p");
        let x = tm.mk_real_var("x");
        let y = tm.mk_real_var("y");
        let sum = tm.mk_add(vec![x, y]);
        let zero = tm.mk_real_int(0);
        let atom = tm.mk_le(sum, zero).unwrap();
        let f = tm.mk_and(vec![p, atom]);

        assert_eq!(tm.atoms(f), &[p, atom]);
        assert_eq!(tm.reals(f), &[x, y]);
    }

    #[test]
    fn test_fresh_labels_are_registered() {
        let mut tm = TermManager::new();
        let user = tm.mk_bool_var("a");
        let l0 = tm.fresh_cond_label();
        let l1 = tm.fresh_cond_label();
        assert_ne!(l0, l1);
        assert!(tm.is_cond_label(l0));
        assert!(tm.is_cond_label(l1));
        assert!(!tm.is_cond_label(user));
    }

    #[test]
    fn test_div_by_constant_folds() {
        let mut tm = TermManager::new();
        let x = tm.mk_real_var("x");
        let two = tm.mk_real_int(2);
        let half_x = tm.mk_div(x, two).unwrap();
        let half = tm.mk_real_frac(1, 2);
        assert_eq!(half_x, tm.mk_mul(vec![half, x]));

        let zero = tm.mk_real_int(0);
        assert!(matches!(tm.mk_div(x, zero), Err(CoreError::DivisionByZero(_))));
    }
}
