//! Fault activation.
//!
//! Each traversal run carries an [`Activation`]: the mode of every fault for
//! that run. Models never inspect fault sets themselves; whenever a fault could
//! occur, they ask the activation which [`Effect`]s are permitted and emit one
//! successor per permitted choice.

use serde::{Deserialize, Serialize};

use crate::fault::{ActivationMode, Fault, FaultId, FaultSet};

/// How the faults *outside* the checked candidate set behave.
///
/// The policy is fixed for a whole search: switching it halfway would compare
/// verdicts obtained under different semantics.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default, Serialize, Deserialize)]
pub enum ActivationPolicy {
    /// Candidate faults are forced, all other faults are suppressed.
    #[default]
    ForceOnly,
    /// Candidate faults are forced, all other faults may occur.
    Nondeterministic,
}

/// Behaviour selected for a fault at a single opportunity.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Effect {
    /// The nominal behaviour; the fault does not occur.
    Default,
    /// The faulty behaviour overriding the nominal one.
    Overridden,
}

impl Effect {
    pub fn is_overridden(self) -> bool {
        self == Effect::Overridden
    }
}

/// Activation modes of all faults for one traversal run.
#[derive(Debug, Clone, PartialEq)]
pub struct Activation {
    modes: Vec<ActivationMode>,
    probabilities: Vec<f64>,
    weighted: bool,
}

impl Activation {
    fn from_modes(faults: &[Fault], modes: Vec<ActivationMode>, weighted: bool) -> Self {
        Self {
            modes,
            probabilities: faults.iter().map(Fault::probability).collect(),
            weighted,
        }
    }

    /// Activation for checking whether `candidate` is critical.
    ///
    /// Faults declared [`ActivationMode::Suppressed`] stay suppressed and faults
    /// declared [`ActivationMode::Forced`] stay forced, regardless of the
    /// candidate.
    pub fn for_candidate(faults: &[Fault], candidate: &FaultSet, policy: ActivationPolicy) -> Self {
        let modes = faults
            .iter()
            .map(|fault| match fault.activation() {
                ActivationMode::Suppressed => ActivationMode::Suppressed,
                ActivationMode::Forced => ActivationMode::Forced,
                ActivationMode::Nondeterministic if candidate.contains(fault.id()) => {
                    ActivationMode::Forced
                }
                ActivationMode::Nondeterministic => match policy {
                    ActivationPolicy::ForceOnly => ActivationMode::Suppressed,
                    ActivationPolicy::Nondeterministic => ActivationMode::Nondeterministic,
                },
            })
            .collect();
        Self::from_modes(faults, modes, false)
    }

    /// Activation leaving every fault free to occur, except for the faults
    /// whose declared mode says otherwise.
    pub fn unrestricted(faults: &[Fault]) -> Self {
        let modes = faults.iter().map(Fault::activation).collect();
        Self::from_modes(faults, modes, false)
    }

    /// Like [`Activation::unrestricted`], but choices carry the fault
    /// probabilities as weights.
    pub fn probabilistic(faults: &[Fault]) -> Self {
        let modes = faults.iter().map(Fault::activation).collect();
        Self::from_modes(faults, modes, true)
    }

    pub fn fault_count(&self) -> usize {
        self.modes.len()
    }

    /// Whether effect weights are probabilities (otherwise they are all 1).
    pub fn is_weighted(&self) -> bool {
        self.weighted
    }

    pub fn mode(&self, fault: FaultId) -> ActivationMode {
        self.modes[fault.index()]
    }

    /// All forced faults.
    pub fn forced(&self) -> FaultSet {
        self.with_mode(ActivationMode::Forced)
    }

    /// All suppressed faults.
    pub fn suppressed(&self) -> FaultSet {
        self.with_mode(ActivationMode::Suppressed)
    }

    fn with_mode(&self, mode: ActivationMode) -> FaultSet {
        self.modes
            .iter()
            .enumerate()
            .filter(|(_, &m)| m == mode)
            .map(|(i, _)| FaultId::new(i as u32))
            .collect()
    }

    /// The permitted effects of `fault` at one opportunity, with their weights.
    pub fn effects(&self, fault: FaultId) -> Effects {
        let mut effects = Effects::default();
        match self.mode(fault) {
            ActivationMode::Forced => effects.push(Effect::Overridden, 1.0),
            ActivationMode::Suppressed => effects.push(Effect::Default, 1.0),
            ActivationMode::Nondeterministic if self.weighted => {
                let p = self.probabilities[fault.index()];
                if p < 1.0 {
                    effects.push(Effect::Default, 1.0 - p);
                }
                if p > 0.0 {
                    effects.push(Effect::Overridden, p);
                }
            }
            ActivationMode::Nondeterministic => {
                effects.push(Effect::Default, 1.0);
                effects.push(Effect::Overridden, 1.0);
            }
        }
        effects
    }

    /// All permitted combinations of effects of `faults` at one opportunity.
    ///
    /// Every combination is returned as the set of overridden faults together
    /// with the product of the effect weights.
    pub fn combinations(&self, faults: &[FaultId]) -> Vec<(FaultSet, f64)> {
        let mut result = vec![(FaultSet::empty(), 1.0)];
        for &fault in faults {
            let effects = self.effects(fault);
            result = result
                .into_iter()
                .flat_map(|(set, weight)| {
                    effects.clone().map(move |(effect, w)| {
                        let set = if effect.is_overridden() {
                            set.with(fault)
                        } else {
                            set.clone()
                        };
                        (set, weight * w)
                    })
                })
                .collect();
        }
        result
    }
}

/// Iterator over the permitted effects of a fault (at most two).
#[derive(Debug, Clone, Default)]
pub struct Effects {
    items: [Option<(Effect, f64)>; 2],
    pos: usize,
}

impl Effects {
    fn push(&mut self, effect: Effect, weight: f64) {
        let slot = self.items.iter_mut().find(|slot| slot.is_none());
        if let Some(slot) = slot {
            *slot = Some((effect, weight));
        }
    }
}

impl Iterator for Effects {
    type Item = (Effect, f64);

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.items.get(self.pos).copied().flatten()?;
        self.pos += 1;
        Some(item)
    }
}
