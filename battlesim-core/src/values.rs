//! Layered, named attribute values.
//!
//! Every definition (cohort, terrain, tactic, general) carries an
//! [`AttributeContainer`]. For each attribute key the container keeps four
//! independent buckets of named contributions:
//!
//! | Bucket | Role |
//! |--------|------|
//! | [`Bucket::Base`] | additive base value |
//! | [`Bucket::Modifier`] | multiplies the base as `(1 + sum)` |
//! | [`Bucket::Loss`] | subtracted after modifiers |
//! | [`Bucket::LossModifier`] | multiplies the loss as `(1 + sum)` |
//!
//! A contribution key (e.g. `"tech_3"`, `"flank_ratio"`) names the source of
//! a value so it can later be retracted or replaced without touching the
//! contributions of other sources.
//!
//! ```text
//! value = round3(base × (1 + modifier) − loss × (1 + loss_modifier))
//! ```
//!
//! All calculations are pure functions of the container.

use rustc_hash::FxHashMap;
use std::fmt::Debug;
use std::hash::Hash;

/// Values are rounded to three decimals when calculated.
const VALUE_PRECISION: f64 = 1000.0;

/// Marker for types usable as attribute keys.
pub trait AttributeKey: Clone + Eq + Hash + Debug {}

impl<T: Clone + Eq + Hash + Debug> AttributeKey for T {}

/// One of the four layering roles a contribution can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Base,
    Modifier,
    Loss,
    LossModifier,
}

impl Bucket {
    pub const ALL: [Bucket; 4] = [
        Bucket::Base,
        Bucket::Modifier,
        Bucket::Loss,
        Bucket::LossModifier,
    ];
}

/// Insertion-ordered list of `(contribution key, value)` pairs.
///
/// Lists are short (a handful of sources per attribute), so a `Vec` keeps
/// insertion order for tooltips without an extra map type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Contributions {
    entries: Vec<(String, f64)>,
}

impl Contributions {
    /// Inserts or overwrites `key`. A zero value removes the key instead.
    fn set(&mut self, key: &str, value: f64) {
        if value == 0.0 {
            self.remove(key);
            return;
        }
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    fn remove(&mut self, key: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(k, _)| k != key);
        before != self.entries.len()
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, value)| *value)
    }

    pub fn sum(&self) -> f64 {
        self.entries.iter().map(|(_, value)| value).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The four buckets of a single attribute.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeLayers {
    base: Contributions,
    modifier: Contributions,
    loss: Contributions,
    loss_modifier: Contributions,
}

impl AttributeLayers {
    pub fn bucket(&self, bucket: Bucket) -> &Contributions {
        match bucket {
            Bucket::Base => &self.base,
            Bucket::Modifier => &self.modifier,
            Bucket::Loss => &self.loss,
            Bucket::LossModifier => &self.loss_modifier,
        }
    }

    fn bucket_mut(&mut self, bucket: Bucket) -> &mut Contributions {
        match bucket {
            Bucket::Base => &mut self.base,
            Bucket::Modifier => &mut self.modifier,
            Bucket::Loss => &mut self.loss,
            Bucket::LossModifier => &mut self.loss_modifier,
        }
    }

    fn is_empty(&self) -> bool {
        Bucket::ALL.iter().all(|&b| self.bucket(b).is_empty())
    }
}

/// Attribute key → layered contributions.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeContainer<K: AttributeKey> {
    layers: FxHashMap<K, AttributeLayers>,
}

impl<K: AttributeKey> Default for AttributeContainer<K> {
    fn default() -> Self {
        Self {
            layers: FxHashMap::default(),
        }
    }
}

impl<K: AttributeKey> AttributeContainer<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites the contribution `key` for each attribute.
    ///
    /// A value of exactly zero removes the contribution; an attribute left
    /// with no contributions at all is removed from the container.
    pub fn add_values<I>(&mut self, bucket: Bucket, key: &str, values: I)
    where
        I: IntoIterator<Item = (K, f64)>,
    {
        for (attribute, value) in values {
            if value == 0.0 {
                self.remove_contribution(&attribute, bucket, key);
                continue;
            }
            self.layers
                .entry(attribute)
                .or_default()
                .bucket_mut(bucket)
                .set(key, value);
        }
    }

    /// Removes the contribution `key` from every bucket of every attribute.
    pub fn clear_all_values(&mut self, key: &str) {
        for layers in self.layers.values_mut() {
            for bucket in Bucket::ALL {
                layers.bucket_mut(bucket).remove(key);
            }
        }
        self.layers.retain(|_, layers| !layers.is_empty());
    }

    /// Clears `key` from one bucket only, then inserts `values` under it.
    ///
    /// Used when a single source moves its contribution to a different set
    /// of attributes (e.g. a recomputed army-wide penalty).
    pub fn regenerate_values<I>(&mut self, bucket: Bucket, key: &str, values: I)
    where
        I: IntoIterator<Item = (K, f64)>,
    {
        for layers in self.layers.values_mut() {
            layers.bucket_mut(bucket).remove(key);
        }
        self.layers.retain(|_, layers| !layers.is_empty());
        self.add_values(bucket, key, values);
    }

    /// Deep merge of `other` into a copy of `self`.
    ///
    /// Contribution keys from both sides coexist. When the same key exists
    /// on the same attribute and bucket in both, `self` wins.
    pub fn merge(&self, other: &AttributeContainer<K>) -> AttributeContainer<K> {
        let mut merged = self.clone();
        for (attribute, other_layers) in &other.layers {
            let layers = merged.layers.entry(attribute.clone()).or_default();
            for bucket in Bucket::ALL {
                let target = layers.bucket_mut(bucket);
                for (key, value) in other_layers.bucket(bucket).iter() {
                    if target.get(key).is_none() {
                        target.set(key, value);
                    }
                }
            }
        }
        merged.layers.retain(|_, layers| !layers.is_empty());
        merged
    }

    fn remove_contribution(&mut self, attribute: &K, bucket: Bucket, key: &str) {
        if let Some(layers) = self.layers.get_mut(attribute) {
            layers.bucket_mut(bucket).remove(key);
            if layers.is_empty() {
                self.layers.remove(attribute);
            }
        }
    }

    fn bucket_sum(&self, attribute: &K, bucket: Bucket) -> f64 {
        self.layers
            .get(attribute)
            .map(|layers| layers.bucket(bucket).sum())
            .unwrap_or(0.0)
    }

    pub fn calculate_base(&self, attribute: &K) -> f64 {
        self.bucket_sum(attribute, Bucket::Base)
    }

    pub fn calculate_modifier(&self, attribute: &K) -> f64 {
        self.bucket_sum(attribute, Bucket::Modifier)
    }

    pub fn calculate_loss(&self, attribute: &K) -> f64 {
        self.bucket_sum(attribute, Bucket::Loss)
    }

    pub fn calculate_loss_modifier(&self, attribute: &K) -> f64 {
        self.bucket_sum(attribute, Bucket::LossModifier)
    }

    /// `base × (1 + modifier)`, unrounded.
    pub fn calculate_value_without_loss(&self, attribute: &K) -> f64 {
        self.calculate_base(attribute) * (1.0 + self.calculate_modifier(attribute))
    }

    /// Final value, rounded to three decimals.
    pub fn calculate_value(&self, attribute: &K) -> f64 {
        let loss =
            self.calculate_loss(attribute) * (1.0 + self.calculate_loss_modifier(attribute));
        round_value(self.calculate_value_without_loss(attribute) - loss)
    }

    /// Base contributions rendered as `"key: value, key2: value2"`.
    pub fn explain_short(&self, attribute: &K) -> String {
        self.contributions(attribute, Bucket::Base)
            .map(|(key, value)| format!("{}: {}", key, value))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn contributions(
        &self,
        attribute: &K,
        bucket: Bucket,
    ) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.layers
            .get(attribute)
            .into_iter()
            .flat_map(move |layers| layers.bucket(bucket).iter())
    }

    pub fn layers(&self, attribute: &K) -> Option<&AttributeLayers> {
        self.layers.get(attribute)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.layers.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

/// Rounds to the three-decimal precision used for every derived value.
pub fn round_value(value: f64) -> f64 {
    (value * VALUE_PRECISION).round() / VALUE_PRECISION
}

/// Anything that owns an [`AttributeContainer`].
pub trait HasValues<K: AttributeKey> {
    fn values(&self) -> &AttributeContainer<K>;
    fn values_mut(&mut self) -> &mut AttributeContainer<K>;
}

impl<K: AttributeKey> HasValues<K> for AttributeContainer<K> {
    fn values(&self) -> &AttributeContainer<K> {
        self
    }

    fn values_mut(&mut self) -> &mut AttributeContainer<K> {
        self
    }
}

pub fn add_values<K, E, I>(entity: &mut E, bucket: Bucket, key: &str, values: I)
where
    K: AttributeKey,
    E: HasValues<K>,
    I: IntoIterator<Item = (K, f64)>,
{
    entity.values_mut().add_values(bucket, key, values);
}

pub fn clear_all_values<K: AttributeKey, E: HasValues<K>>(entity: &mut E, key: &str) {
    entity.values_mut().clear_all_values(key);
}

pub fn regenerate_values<K, E, I>(entity: &mut E, bucket: Bucket, key: &str, values: I)
where
    K: AttributeKey,
    E: HasValues<K>,
    I: IntoIterator<Item = (K, f64)>,
{
    entity.values_mut().regenerate_values(bucket, key, values);
}

/// Left-biased merge: scalar fields come from `a`, buckets are deep-merged.
pub fn merge_values<K, A, B>(a: &A, b: &B) -> A
where
    K: AttributeKey,
    A: HasValues<K> + Clone,
    B: HasValues<K>,
{
    let mut merged = a.clone();
    *merged.values_mut() = a.values().merge(b.values());
    merged
}

pub fn calculate_value<K: AttributeKey, E: HasValues<K>>(entity: &E, attribute: &K) -> f64 {
    entity.values().calculate_value(attribute)
}

pub fn calculate_value_without_loss<K: AttributeKey, E: HasValues<K>>(
    entity: &E,
    attribute: &K,
) -> f64 {
    entity.values().calculate_value_without_loss(attribute)
}

pub fn calculate_base<K: AttributeKey, E: HasValues<K>>(entity: &E, attribute: &K) -> f64 {
    entity.values().calculate_base(attribute)
}

pub fn calculate_modifier<K: AttributeKey, E: HasValues<K>>(entity: &E, attribute: &K) -> f64 {
    entity.values().calculate_modifier(attribute)
}

pub fn calculate_loss<K: AttributeKey, E: HasValues<K>>(entity: &E, attribute: &K) -> f64 {
    entity.values().calculate_loss(attribute)
}

pub fn explain_short<K: AttributeKey, E: HasValues<K>>(entity: &E, attribute: &K) -> String {
    entity.values().explain_short(attribute)
}
