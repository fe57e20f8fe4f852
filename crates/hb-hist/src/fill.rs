//! Single-pass filling from column data.
//!
//! A fill runs in two phases. First every goal is evaluated and every
//! result checked (lengths, types, bin ranges) into a [`Batch`]; nothing
//! is mutated if any of that fails. Then the batch is scattered into the
//! content tree.

use hb_core::{Column, Error, Result, Symbols};
use hb_expr::{Destinations, Groups, Value};

use crate::axis::AxisRole;
use crate::content::Content;
use crate::hist::{Hist, Weighting};

/// Per-event weights after NaN coercion.
enum EventWeights {
    Constant(f64),
    PerEvent { w: Vec<f64>, w2: Vec<f64> },
}

/// Checked results of one fill, ready to scatter.
struct Batch {
    len: usize,
    /// One per group axis, outermost first.
    groups: Vec<Groups>,
    /// Combined row index over all fixed axes; `None` drops the event.
    rows: Vec<Option<usize>>,
    /// Value and squared value per profile axis.
    profiles: Vec<(Vec<f64>, Vec<f64>)>,
    weights: EventWeights,
}

/// Trailing offsets inside a leaf row.
struct Layout {
    shape: Vec<usize>,
    width: usize,
    profiles: Vec<(usize, usize)>,
    sumw: usize,
    sumw2: Option<usize>,
}

impl Hist {
    /// Fill with one batch of events.
    ///
    /// Every column in `symbols` must have the same length. Events whose
    /// fixed-axis index is masked, or whose group key is invalid, are
    /// dropped. NaN weights count as zero.
    pub fn fill(&mut self, symbols: &Symbols) -> Result<()> {
        let columns = column_length(symbols)?;
        let goals = self.destinations.resolve(symbols)?;
        let batch = self.collect(columns);
        self.destinations.clear();
        let batch = batch?;

        let layout = self.layout();
        let content = self.content_mut();
        let events: Vec<usize> = (0..batch.len).collect();
        let filled = fill_level(content, &batch, 0, &events, &layout)?;

        let masked = batch.rows.iter().filter(|r| r.is_none()).count();
        let keyless = (0..batch.len)
            .filter(|&e| batch.groups.iter().any(|g| g.inverse[e].is_none()))
            .count();
        log::trace!("fill: dropped {masked} event(s) masked by fixed axes, {keyless} with an invalid group key");
        log::debug!(
            "fill: {} event(s), {} distinct goal(s) evaluated, {} leaf block(s) touched",
            batch.len,
            goals,
            filled
        );
        Ok(())
    }

    /// Fill a single-axis histogram whose expression references exactly
    /// one symbol, binding `column` to that symbol.
    pub fn fill_single(&mut self, column: impl Into<Column>) -> Result<()> {
        let name = {
            let mut axes = self.axes();
            let (Some(axis), None) = (axes.next(), axes.next()) else {
                return Err(Error::Config("fill_single needs exactly one axis".into()));
            };
            match axis.parsed().symbols().as_slice() {
                [name] => name.to_string(),
                other => {
                    return Err(Error::Config(format!(
                        "fill_single needs one symbol in {axis}, found {}",
                        other.len()
                    )));
                }
            }
        };
        let mut symbols = Symbols::new();
        symbols.insert(name, column.into());
        self.fill(&symbols)
    }

    fn layout(&self) -> Layout {
        Layout {
            shape: self.shape.clone(),
            width: self.shape.last().copied().unwrap_or(1),
            profiles: self
                .profile
                .iter()
                .filter_map(|a| match a.role() {
                    AxisRole::Profile { sumwx, sumwx2, .. } => Some((sumwx, sumwx2)),
                    _ => None,
                })
                .collect(),
            sumw: self.sumw_index(),
            sumw2: self.sumw2_index(),
        }
    }

    /// Move resolved values out of the destinations and check them.
    fn collect(&mut self, columns: Option<usize>) -> Result<Batch> {
        let dest = &mut self.destinations;

        let mut group_values = Vec::with_capacity(self.group.len());
        for axis in &self.group {
            if let AxisRole::Group { slot, .. } = axis.role() {
                group_values.push(take(dest, slot)?);
            }
        }
        let mut fixed_values = Vec::with_capacity(self.fixed.len());
        for axis in &self.fixed {
            if let AxisRole::Fixed { slot, totbins, .. } = axis.role() {
                fixed_values.push((take(dest, slot)?, totbins));
            }
        }
        let mut profile_values = Vec::with_capacity(self.profile.len());
        for axis in &self.profile {
            if let AxisRole::Profile { slots: [x, x2], .. } = axis.role() {
                profile_values.push((take(dest, x)?, take(dest, x2)?));
            }
        }
        let weight_values = match self.weighting {
            Weighting::Expr { slots: [w, w2], .. } => Some((take(dest, w)?, take(dest, w2)?)),
            _ => None,
        };

        // Per-event results must agree with the columns and each other.
        let mut len = columns;
        let per_event = group_values
            .iter()
            .chain(fixed_values.iter().map(|(v, _)| v))
            .chain(profile_values.iter().flat_map(|(a, b)| [a, b]))
            .chain(weight_values.iter().flat_map(|(a, b)| [a, b]));
        for value in per_event {
            if let Some(got) = value.len() {
                match len {
                    None => len = Some(got),
                    Some(n) if n != got => {
                        return Err(Error::Config(format!("expression yields {got} values for {n} events")));
                    }
                    Some(_) => {}
                }
            }
        }
        let len = len.unwrap_or(0);

        let groups = group_values.into_iter().map(Value::into_groups).collect::<Result<Vec<_>>>()?;

        let mut rows = vec![Some(0usize); len];
        for (axis, (value, totbins)) in self.fixed.iter().zip(fixed_values) {
            let index = value.into_index()?;
            for (row, i) in rows.iter_mut().zip(index) {
                *row = match (*row, i) {
                    (Some(r), Some(i)) if i < totbins => Some(r * totbins + i),
                    (Some(_), Some(i)) => {
                        return Err(Error::Type(format!("{axis}: bin index {i} outside {totbins} bins")));
                    }
                    _ => None,
                };
            }
        }

        let profiles = profile_values
            .into_iter()
            .map(|(x, x2)| -> Result<(Vec<f64>, Vec<f64>)> { Ok((x.into_reals(len)?, x2.into_reals(len)?)) })
            .collect::<Result<Vec<_>>>()?;

        let weights = match (weight_values, &self.weighting) {
            (Some((w, w2)), _) => {
                let mut w = w.into_reals(len)?;
                let mut w2 = w2.into_reals(len)?;
                for (a, b) in w.iter_mut().zip(w2.iter_mut()) {
                    if a.is_nan() {
                        *a = 0.0;
                        *b = 0.0;
                    }
                }
                EventWeights::PerEvent { w, w2 }
            }
            (None, Weighting::Constant { value, .. }) => {
                EventWeights::Constant(if value.is_nan() { 0.0 } else { *value })
            }
            (None, _) => EventWeights::Constant(1.0),
        };

        Ok(Batch { len, groups, rows, profiles, weights })
    }
}

fn take(dest: &mut Destinations, slot: usize) -> Result<Value> {
    dest.take(slot).ok_or_else(|| Error::Config(format!("destination slot {slot} was not resolved")))
}

fn column_length(symbols: &Symbols) -> Result<Option<usize>> {
    let mut lengths = symbols.iter().map(|(name, column)| (name, column.len()));
    let Some((first, n)) = lengths.next() else {
        return Ok(None);
    };
    for (name, len) in lengths {
        if len != n {
            return Err(Error::Config(format!("column {name:?} has {len} events but {first:?} has {n}")));
        }
    }
    Ok(Some(n))
}

/// Route `events` down one group level, creating a key for every valid
/// category seen in this branch. Returns the number of leaf blocks filled.
fn fill_level(content: &mut Content, batch: &Batch, level: usize, events: &[usize], layout: &Layout) -> Result<usize> {
    match content {
        Content::Leaf(block) if level == batch.groups.len() => {
            let data = block
                .as_slice_mut()
                .ok_or_else(|| Error::Config("leaf block is not contiguous".into()))?;
            for &e in events {
                let Some(row) = batch.rows[e] else { continue };
                let base = row * layout.width;
                let (w, w2) = match &batch.weights {
                    EventWeights::Constant(c) => (*c, c * c),
                    EventWeights::PerEvent { w, w2 } => (w[e], w2[e]),
                };
                for (&(sumwx, sumwx2), (x, x2)) in layout.profiles.iter().zip(&batch.profiles) {
                    data[base + sumwx] += w * x[e];
                    data[base + sumwx2] += w * x2[e];
                }
                data[base + layout.sumw] += w;
                if let Some(sumw2) = layout.sumw2 {
                    data[base + sumw2] += w2;
                }
            }
            Ok(1)
        }
        Content::Node(children) if level < batch.groups.len() => {
            let groups = &batch.groups[level];
            let mut buckets = vec![Vec::new(); groups.uniques.len()];
            for &e in events {
                if let Some(k) = groups.inverse[e] {
                    buckets[k].push(e);
                }
            }
            let below = batch.groups.len() - level - 1;
            let mut filled = 0;
            for (key, bucket) in groups.uniques.iter().zip(&buckets) {
                if bucket.is_empty() {
                    continue;
                }
                let child = children
                    .entry(key.clone())
                    .or_insert_with(|| Content::empty(below, &layout.shape));
                filled += fill_level(child, batch, level + 1, bucket, layout)?;
            }
            Ok(filled)
        }
        _ => Err(Error::Config(format!("content depth does not match {} group axis(es)", batch.groups.len()))),
    }
}
