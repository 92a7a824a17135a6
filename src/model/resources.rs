use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

pub const RESOURCE_COUNT: usize = 6;

/// The six resource kinds, in storage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ResourceKind {
    Actions,
    Gold,
    Cereal,
    Livestock,
    Stone,
    Wood,
}

string_enum!(ResourceKind {
    Actions => "actions",
    Gold => "gold",
    Cereal => "cereal",
    Livestock => "livestock",
    Stone => "stone",
    Wood => "wood",
});

impl ResourceKind {
    pub fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

/// Fixed-width vector of non-negative resource amounts.
///
/// Ordering is componentwise and therefore partial: see [`Resources::covers`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resources(pub [u64; RESOURCE_COUNT]);

impl Resources {
    pub const ZERO: Resources = Resources([0; RESOURCE_COUNT]);

    pub const fn new(values: [u64; RESOURCE_COUNT]) -> Self {
        Self(values)
    }

    /// Same amount of every resource.
    pub const fn splat(v: u64) -> Self {
        Self([v; RESOURCE_COUNT])
    }

    /// A single resource kind set to `amount`, the rest zero.
    pub fn of(kind: ResourceKind, amount: u64) -> Self {
        let mut r = Self::ZERO;
        r[kind] = amount;
        r
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|v| *v == 0)
    }

    /// Componentwise `self >= other`.
    pub fn covers(&self, other: &Resources) -> bool {
        self.0.iter().zip(other.0.iter()).all(|(a, b)| a >= b)
    }

    pub fn total(&self) -> u128 {
        self.0.iter().map(|v| u128::from(*v)).sum()
    }

    pub fn add(&mut self, other: &Resources) {
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            *a = a.saturating_add(*b);
        }
    }

    /// Componentwise sum, `None` if any component overflows.
    pub fn checked_sum(&self, other: &Resources) -> Option<Resources> {
        let mut out = Resources::ZERO;
        for i in 0..RESOURCE_COUNT {
            out.0[i] = self.0[i].checked_add(other.0[i])?;
        }
        Some(out)
    }

    /// Subtract `other`. Callers check [`Resources::covers`] first; components
    /// that would go negative stop at zero.
    pub fn remove(&mut self, other: &Resources) {
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            *a = a.saturating_sub(*b);
        }
    }

    /// Componentwise min with `limit`.
    pub fn trim_to(&mut self, limit: &Resources) {
        for (a, b) in self.0.iter_mut().zip(limit.0.iter()) {
            *a = (*a).min(*b);
        }
    }

    pub fn trimmed_to(mut self, limit: &Resources) -> Resources {
        self.trim_to(limit);
        self
    }

    pub fn multiply(&mut self, m: &Multiplier) {
        for (a, f) in self.0.iter_mut().zip(m.0.iter()) {
            *a = scale(*a, *f);
        }
    }

    pub fn increment(&mut self, inc: &Increment) {
        for (a, d) in self.0.iter_mut().zip(inc.0.iter()) {
            let v = i128::from(*a) + i128::from(*d);
            *a = v.clamp(0, i128::from(u64::MAX)) as u64;
        }
    }

    /// Scale then increment.
    pub fn apply(&mut self, m: &Modifier) {
        self.multiply(&m.mult);
        self.increment(&m.plus);
    }

    pub fn applied(mut self, m: &Modifier) -> Resources {
        self.apply(m);
        self
    }

    pub fn scaled(mut self, m: &Multiplier) -> Resources {
        self.multiply(m);
        self
    }
}

fn scale(v: u64, f: f64) -> u64 {
    let x = v as f64 * f;
    // `as` saturates at u64::MAX and maps NaN to 0
    if x <= 0.0 { 0 } else { x as u64 }
}

impl Index<ResourceKind> for Resources {
    type Output = u64;

    fn index(&self, kind: ResourceKind) -> &u64 {
        &self.0[kind.index()]
    }
}

impl IndexMut<ResourceKind> for Resources {
    fn index_mut(&mut self, kind: ResourceKind) -> &mut u64 {
        &mut self.0[kind.index()]
    }
}

// ---------------------------------------------------------------------------
// Modifiers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Multiplier(pub [f64; RESOURCE_COUNT]);

impl Multiplier {
    pub const ONE: Multiplier = Multiplier([1.0; RESOURCE_COUNT]);

    pub const fn splat(f: f64) -> Self {
        Self([f; RESOURCE_COUNT])
    }
}

impl Default for Multiplier {
    fn default() -> Self {
        Self::ONE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Increment(pub [i64; RESOURCE_COUNT]);

impl Increment {
    pub const ZERO: Increment = Increment([0; RESOURCE_COUNT]);
}

/// A multiplier and an increment, applied in that order.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifier {
    pub mult: Multiplier,
    pub plus: Increment,
}

impl Modifier {
    pub const IDENTITY: Modifier = Modifier {
        mult: Multiplier::ONE,
        plus: Increment::ZERO,
    };

    pub fn new(mult: Multiplier, plus: Increment) -> Self {
        Self { mult, plus }
    }

    pub fn scaling(mult: [f64; RESOURCE_COUNT]) -> Self {
        Self {
            mult: Multiplier(mult),
            plus: Increment::ZERO,
        }
    }

    pub fn adding(plus: [i64; RESOURCE_COUNT]) -> Self {
        Self {
            mult: Multiplier::ONE,
            plus: Increment(plus),
        }
    }

    /// Multiplies the multipliers and sums the increments.
    pub fn compose(&self, other: &Modifier) -> Modifier {
        let mut out = *self;
        for i in 0..RESOURCE_COUNT {
            out.mult.0[i] *= other.mult.0[i];
            out.plus.0[i] = out.plus.0[i].saturating_add(other.plus.0[i]);
        }
        out
    }

    /// Fold many modifiers, starting from the identity.
    pub fn compose_all<'a>(mods: impl IntoIterator<Item = &'a Modifier>) -> Modifier {
        mods.into_iter()
            .fold(Modifier::IDENTITY, |acc, m| acc.compose(m))
    }

    pub fn is_identity(&self) -> bool {
        *self == Modifier::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_index_in_storage_order() {
        let r = Resources::new([1, 2, 3, 4, 5, 6]);
        assert_eq!(r[ResourceKind::Actions], 1);
        assert_eq!(r[ResourceKind::Stone], 5);
        assert_eq!(r[ResourceKind::Wood], 6);
        assert_eq!(ResourceKind::ALL.len(), RESOURCE_COUNT);
        assert_eq!(Resources::of(ResourceKind::Cereal, 9), Resources::new([0, 0, 9, 0, 0, 0]));
    }

    #[test]
    fn covers_is_componentwise() {
        let a = Resources::new([2, 2, 2, 2, 2, 2]);
        let b = Resources::new([0, 3, 0, 0, 0, 0]);
        assert!(a.covers(&Resources::ZERO));
        assert!(!a.covers(&b));
        assert!(!b.covers(&a));
        assert!(a.covers(&a));
    }

    #[test]
    fn remove_saturates_at_zero() {
        let mut a = Resources::new([5, 1, 0, 0, 0, 0]);
        a.remove(&Resources::new([2, 3, 0, 0, 0, 0]));
        assert_eq!(a, Resources::new([3, 0, 0, 0, 0, 0]));
    }

    #[test]
    fn trim_takes_componentwise_min() {
        let mut a = Resources::new([5, 1, 7, 0, 9, 2]);
        a.trim_to(&Resources::splat(3));
        assert_eq!(a, Resources::new([3, 1, 3, 0, 3, 2]));
    }

    #[test]
    fn negative_multiplier_yields_zero() {
        let mut a = Resources::splat(10);
        a.multiply(&Multiplier([-1.0, 0.5, 1.0, 2.0, 0.0, 1.25]));
        assert_eq!(a, Resources::new([0, 5, 10, 20, 0, 12]));
    }

    #[test]
    fn increment_saturates_at_zero() {
        let mut a = Resources::splat(3);
        a.increment(&Increment([-5, -3, 0, 1, i64::MIN, i64::MAX]));
        assert_eq!(&a.0[..4], &[0u64, 0, 3, 4]);
        assert_eq!(a.0[4], 0);
        assert_eq!(a.0[5], 3 + i64::MAX as u64);
    }

    #[test]
    fn apply_scales_before_adding() {
        let m = Modifier::new(Multiplier::splat(2.0), Increment([1; RESOURCE_COUNT]));
        assert_eq!(Resources::splat(3).applied(&m), Resources::splat(7));
    }

    #[test]
    fn compose_multiplies_and_sums() {
        let a = Modifier::new(Multiplier::splat(2.0), Increment([1; RESOURCE_COUNT]));
        let b = Modifier::new(Multiplier::splat(3.0), Increment([-4; RESOURCE_COUNT]));
        let c = a.compose(&b);
        assert_eq!(c.mult, Multiplier::splat(6.0));
        assert_eq!(c.plus, Increment([-3; RESOURCE_COUNT]));
    }

    #[test]
    fn identity_is_neutral() {
        let m = Modifier::new(Multiplier::splat(1.5), Increment([2; RESOURCE_COUNT]));
        assert_eq!(m.compose(&Modifier::IDENTITY), m);
        assert_eq!(Modifier::IDENTITY.compose(&m), m);
        assert_eq!(Modifier::compose_all([]), Modifier::IDENTITY);
        assert!(Modifier::default().is_identity());
        let r = Resources::new([1, 2, 3, 4, 5, 6]);
        assert_eq!(r.applied(&Modifier::IDENTITY), r);
    }

    #[test]
    fn checked_sum_detects_overflow() {
        let a = Resources::new([u64::MAX, 0, 0, 0, 0, 0]);
        assert!(a.checked_sum(&Resources::new([1, 0, 0, 0, 0, 0])).is_none());
        assert_eq!(a.checked_sum(&Resources::ZERO), Some(a));
    }

    #[test]
    fn modifier_json_defaults_to_identity() {
        let m: Modifier = serde_json::from_str("{}").unwrap();
        assert!(m.is_identity());
        let m: Modifier = serde_json::from_str(r#"{"plus":[0,1,0,0,0,0]}"#).unwrap();
        assert_eq!(m.mult, Multiplier::ONE);
        assert_eq!(m.plus.0[1], 1);
    }
}
