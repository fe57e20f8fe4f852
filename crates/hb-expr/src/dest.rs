//! Goal registration and slot delivery.
//!
//! A histogram registers the sub-expressions it needs ("goals") once, at
//! construction, and receives one destination slot per registered goal.
//! Each fill resolves every distinct goal exactly once, shares intermediate
//! results between goals that contain the same sub-expression, and only then
//! delivers values into the slots. A failed resolve leaves every slot empty.

use std::collections::HashMap;

use hb_core::{Result, Symbols};

use crate::calc::step;
use crate::expr::Expr;
use crate::value::Value;

/// Flat list of destination slots plus the goal → slots lookup.
#[derive(Debug, Clone, Default)]
pub struct Destinations {
    /// Distinct goals in order of first registration.
    goals: Vec<Expr>,
    lookup: HashMap<Expr, Vec<usize>>,
    slots: Vec<Option<Value>>,
}

impl Destinations {
    /// Empty slot list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one slot per goal; returns the slot indices, in order.
    pub fn register(&mut self, goals: &[Expr]) -> Vec<usize> {
        goals
            .iter()
            .map(|goal| {
                let slot = self.slots.len();
                self.slots.push(None);
                match self.lookup.get_mut(goal) {
                    Some(slots) => slots.push(slot),
                    None => {
                        self.goals.push(goal.clone());
                        self.lookup.insert(goal.clone(), vec![slot]);
                    }
                }
                slot
            })
            .collect()
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no slot was ever registered.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Distinct goals in order of first registration.
    pub fn goals(&self) -> &[Expr] {
        &self.goals
    }

    /// Slots that receive the value of `goal`.
    pub fn slots_for(&self, goal: &Expr) -> Option<&[usize]> {
        self.lookup.get(goal).map(Vec::as_slice)
    }

    /// Evaluate every distinct goal against `symbols` and deliver the
    /// results. Returns the number of distinct goals evaluated.
    pub fn resolve(&mut self, symbols: &Symbols) -> Result<usize> {
        self.clear();
        let mut memo: HashMap<&Expr, Value> = HashMap::new();
        let mut results = Vec::with_capacity(self.goals.len());
        for goal in &self.goals {
            results.push(evaluate(goal, symbols, &mut memo)?);
        }
        log::trace!("resolved {} goal(s) via {} distinct node(s)", results.len(), memo.len());

        for (goal, value) in self.goals.iter().zip(results) {
            if let Some(slots) = self.lookup.get(goal)
                && let Some((&last, rest)) = slots.split_last()
            {
                for &slot in rest {
                    self.slots[slot] = Some(value.clone());
                }
                self.slots[last] = Some(value);
            }
        }
        Ok(self.goals.len())
    }

    /// Move the value out of `slot`.
    pub fn take(&mut self, slot: usize) -> Option<Value> {
        self.slots.get_mut(slot).and_then(Option::take)
    }

    /// Whether every slot currently holds a value.
    pub fn is_resolved(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Drop every delivered value.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
    }
}

fn evaluate<'e>(expr: &'e Expr, symbols: &Symbols, memo: &mut HashMap<&'e Expr, Value>) -> Result<Value> {
    if let Some(v) = memo.get(expr) {
        return Ok(v.clone());
    }
    let value = step(expr, symbols, |arg| evaluate(arg, symbols, memo))?;
    memo.insert(expr, value.clone());
    Ok(value)
}
