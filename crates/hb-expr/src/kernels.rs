//! Kernel library: the named array transforms that [`Expr::Call`] nodes
//! resolve to.
//!
//! The binning kernels come in families that differ only in how they treat
//! values outside the binned range. Each family is one algorithm
//! parameterized by [`FlowFlags`]; every flag combination is monomorphized
//! once and registered under its own name (`binUONL`, `bin_O_H`, ...), so a
//! call tree names exactly the policy it wants and the table never changes
//! after start-up.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use hb_core::{Error, GroupKey, Result};

use crate::expr::Expr;
use crate::value::{Groups, Value, type_error};

/// Signature shared by every kernel: positional arguments in, one value out.
pub type Kernel = fn(&[Value]) -> Result<Value>;

/// Flow-handling policy of a binning kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowFlags {
    /// Reserve index 0 for values below range (otherwise drop them).
    pub underflow: bool,
    /// Reserve a slot after the last bin for values above range.
    pub overflow: bool,
    /// Reserve a final slot for NaN (otherwise drop it).
    pub nanflow: bool,
    /// Bins are `[lo, hi)` when true, `(lo, hi]` when false.
    pub closedlow: bool,
}

impl FlowFlags {
    /// Construct from the four policy switches.
    pub const fn new(underflow: bool, overflow: bool, nanflow: bool, closedlow: bool) -> Self {
        Self { underflow, overflow, nanflow, closedlow }
    }

    /// Name suffix: `U`/`_`, `O`/`_`, `N`/`_`, then `L` or `H`.
    pub fn suffix(&self) -> String {
        [
            if self.underflow { 'U' } else { '_' },
            if self.overflow { 'O' } else { '_' },
            if self.nanflow { 'N' } else { '_' },
            if self.closedlow { 'L' } else { 'H' },
        ]
        .iter()
        .collect()
    }

    /// Number of extra slots these flags add to an axis.
    pub fn extra_bins(&self) -> usize {
        usize::from(self.underflow) + usize::from(self.overflow) + usize::from(self.nanflow)
    }

    fn shift(&self) -> usize {
        usize::from(self.underflow)
    }
}

/// Kernel name of the fixed-width binner with the given policy.
pub fn bin_name(flags: FlowFlags) -> String {
    format!("bin{}", flags.suffix())
}

/// Kernel name of the edge-list partitioner with the given policy.
pub fn partition_name(flags: FlowFlags) -> String {
    format!("partition{}", flags.suffix())
}

/// Kernel name of the integer binner with the given policy.
pub fn intbin_name(underflow: bool, overflow: bool) -> String {
    format!("intbin{}{}", if underflow { 'U' } else { '_' }, if overflow { 'O' } else { '_' })
}

/// Kernel name of the unique-value classifier.
pub fn sparse_name(closedlow: bool) -> &'static str {
    if closedlow { "sparseL" } else { "sparseH" }
}

// ── Index algorithms ───────────────────────────────────────────

/// Bin index of `x` on `numbins` equal bins spanning `[low, high]`.
///
/// Layout: `[underflow] bins.. [overflow] [nan]`, each bracketed slot
/// present only if its flag is set. `None` means the value is dropped.
pub fn bin_index(x: f64, numbins: usize, low: f64, high: f64, flags: FlowFlags) -> Option<usize> {
    let shift = flags.shift();
    if x.is_nan() {
        return flags.nanflow.then(|| numbins + shift + usize::from(flags.overflow));
    }
    let scaled = (x - low) * (numbins as f64 / (high - low));
    let raw = if flags.closedlow { scaled.floor() } else { scaled.ceil() - 1.0 };
    let idx = raw + shift as f64;
    if idx < 0.0 {
        return flags.underflow.then_some(0);
    }
    if idx >= (numbins + shift) as f64 {
        return flags.overflow.then_some(numbins + shift);
    }
    Some(idx as usize)
}

/// Largest integer magnitude an `f64` argument represents exactly.
pub const MAX_EXACT_INT: u64 = 1 << 53;

/// Bin index of `x` on the unit-width integer range `[min, max]`.
pub fn intbin_index(x: f64, min: i64, max: i64, underflow: bool, overflow: bool) -> Option<usize> {
    if x.is_nan() {
        return None;
    }
    let shift = i64::from(underflow);
    let idx = (x + shift.checked_sub(min)? as f64).trunc();
    let top = max.checked_sub(min)?.checked_add(shift)?;
    if idx < 0.0 {
        return underflow.then_some(0);
    }
    if idx > top as f64 {
        return overflow.then_some(usize::try_from(top).ok()?.checked_add(1)?);
    }
    Some(idx as usize)
}

/// Interval index of `x` among ascending `edges`.
///
/// Same slot layout as [`bin_index`] with `edges.len() - 1` ordinary bins.
pub fn partition_index(x: f64, edges: &[f64], flags: FlowFlags) -> Option<usize> {
    let intervals = edges.len() - 1;
    let shift = flags.shift();
    if x.is_nan() {
        return flags.nanflow.then(|| intervals + shift + usize::from(flags.overflow));
    }
    let mut i = edges.partition_point(|&e| e <= x);
    if !flags.closedlow && i > 0 && edges[i - 1] == x {
        i -= 1;
    }
    if i == 0 {
        return flags.underflow.then_some(0);
    }
    if i == edges.len() {
        return flags.overflow.then_some(intervals + shift);
    }
    Some(i - 1 + shift)
}

/// Normalized sparse-bin coordinate of `x`.
pub fn sparse_coordinate(x: f64, binwidth: f64, origin: f64, closedlow: bool) -> f64 {
    let c = (x - origin) / binwidth;
    if closedlow { c.floor() } else { c.ceil() - 1.0 }
}

// ── Binning kernels ────────────────────────────────────────────

fn arity(name: &str, args: &[Value], n: usize) -> Result<()> {
    if args.len() != n {
        return Err(Error::Type(format!("{name} takes {n} argument(s), got {}", args.len())));
    }
    Ok(())
}

fn positive_count(v: &Value, what: &str) -> Result<usize> {
    let x = v.scalar()?;
    if x.is_finite() && x >= 1.0 && x.fract() == 0.0 {
        Ok(x as usize)
    } else {
        Err(Error::Config(format!("{what} must be a positive integer, got {x}")))
    }
}

fn integer(v: &Value, what: &str) -> Result<i64> {
    let x = v.scalar()?;
    if x.is_finite() && x.fract() == 0.0 && x.abs() <= MAX_EXACT_INT as f64 {
        Ok(x as i64)
    } else {
        Err(Error::Config(format!("{what} must be an integer, got {x}")))
    }
}

fn sparse<const L: bool>(args: &[Value]) -> Result<Value> {
    arity(sparse_name(L), args, 3)?;
    let values = args[0].reals()?;
    let binwidth = args[1].scalar()?;
    let origin = args[2].scalar()?;
    if !(binwidth > 0.0) {
        return Err(Error::Config(format!("binwidth must be positive, got {binwidth}")));
    }
    let keys = values
        .iter()
        .map(|&x| {
            let c = sparse_coordinate(x, binwidth, origin, L);
            (!c.is_nan()).then(|| GroupKey::real(c))
        })
        .collect();
    Ok(Value::Groups(Groups::from_keys(keys)))
}

fn bin<const U: bool, const O: bool, const N: bool, const L: bool>(
    args: &[Value],
) -> Result<Value> {
    let flags = FlowFlags::new(U, O, N, L);
    arity(&bin_name(flags), args, 4)?;
    let values = args[0].reals()?;
    let numbins = positive_count(&args[1], "numbins")?;
    let low = args[2].scalar()?;
    let high = args[3].scalar()?;
    if !(low < high) {
        return Err(Error::Config(format!("bin range must have low < high, got [{low}, {high}]")));
    }
    Ok(Value::Index(values.iter().map(|&x| bin_index(x, numbins, low, high, flags)).collect()))
}

fn intbin<const U: bool, const O: bool>(args: &[Value]) -> Result<Value> {
    arity(&intbin_name(U, O), args, 3)?;
    let values = args[0].reals()?;
    let min = integer(&args[1], "min")?;
    let max = integer(&args[2], "max")?;
    if min > max {
        return Err(Error::Config(format!("intbin range must have min <= max, got [{min}, {max}]")));
    }
    if max.checked_sub(min).and_then(|span| span.checked_add(2)).is_none() {
        return Err(Error::Config(format!("intbin range [{min}, {max}] has too many bins")));
    }
    Ok(Value::Index(values.iter().map(|&x| intbin_index(x, min, max, U, O)).collect()))
}

fn partition<const U: bool, const O: bool, const N: bool, const L: bool>(
    args: &[Value],
) -> Result<Value> {
    let flags = FlowFlags::new(U, O, N, L);
    arity(&partition_name(flags), args, 2)?;
    let values = args[0].reals()?;
    let edges = args[1].sequence()?;
    if edges.len() < 2 || edges.windows(2).any(|w| !(w[0] < w[1])) {
        return Err(Error::Config(format!(
            "partition edges must be at least two strictly ascending values, got {edges:?}"
        )));
    }
    Ok(Value::Index(values.iter().map(|&x| partition_index(x, edges, flags)).collect()))
}

fn cut(args: &[Value]) -> Result<Value> {
    arity("cut", args, 1)?;
    let index = match &args[0] {
        Value::Bool(v) => v.iter().map(|&b| Some(usize::from(b))).collect(),
        Value::Real(v) => {
            v.iter().map(|&x| (!x.is_nan()).then(|| usize::from(x != 0.0))).collect()
        }
        other => return Err(type_error("bool array", other)),
    };
    Ok(Value::Index(index))
}

fn unique(args: &[Value]) -> Result<Value> {
    arity("unique", args, 1)?;
    let keys = match &args[0] {
        Value::Real(v) => v.iter().map(|&x| (!x.is_nan()).then(|| GroupKey::real(x))).collect(),
        Value::Bool(v) => v.iter().map(|&b| Some(GroupKey::real(f64::from(u8::from(b))))).collect(),
        Value::Text(v) => v.iter().map(|s| Some(GroupKey::Text(s.clone()))).collect(),
        other => return Err(type_error("real, bool or text array", other)),
    };
    Ok(Value::Groups(Groups::from_keys(keys)))
}

// ── Arithmetic kernels ─────────────────────────────────────────

enum Operand<'a> {
    Scalar(f64),
    Vector(Cow<'a, [f64]>),
}

fn operand(v: &Value) -> Result<Operand<'_>> {
    match v {
        Value::Scalar(s) => Ok(Operand::Scalar(*s)),
        other => Ok(Operand::Vector(other.reals()?)),
    }
}

enum Broadcast<T> {
    Scalar(T),
    Vector(Vec<T>),
}

fn broadcast<T>(name: &str, args: &[Value], f: impl Fn(f64, f64) -> T) -> Result<Broadcast<T>> {
    arity(name, args, 2)?;
    Ok(match (operand(&args[0])?, operand(&args[1])?) {
        (Operand::Scalar(x), Operand::Scalar(y)) => Broadcast::Scalar(f(x, y)),
        (Operand::Scalar(x), Operand::Vector(ys)) => {
            Broadcast::Vector(ys.iter().map(|&y| f(x, y)).collect())
        }
        (Operand::Vector(xs), Operand::Scalar(y)) => {
            Broadcast::Vector(xs.iter().map(|&x| f(x, y)).collect())
        }
        (Operand::Vector(xs), Operand::Vector(ys)) => {
            if xs.len() != ys.len() {
                return Err(Error::Config(format!(
                    "{name}: arrays of different lengths ({} and {})",
                    xs.len(),
                    ys.len()
                )));
            }
            Broadcast::Vector(xs.iter().zip(ys.iter()).map(|(&x, &y)| f(x, y)).collect())
        }
    })
}

fn binary_real(name: &str, args: &[Value], f: impl Fn(f64, f64) -> f64) -> Result<Value> {
    Ok(match broadcast(name, args, f)? {
        Broadcast::Scalar(x) => Value::Scalar(x),
        Broadcast::Vector(v) => Value::Real(v),
    })
}

fn binary_bool(name: &str, args: &[Value], f: impl Fn(f64, f64) -> bool) -> Result<Value> {
    Ok(match broadcast(name, args, f)? {
        Broadcast::Scalar(b) => Value::Scalar(f64::from(u8::from(b))),
        Broadcast::Vector(v) => Value::Bool(v),
    })
}

fn unary_real(name: &str, args: &[Value], f: impl Fn(f64) -> f64) -> Result<Value> {
    arity(name, args, 1)?;
    Ok(match operand(&args[0])? {
        Operand::Scalar(x) => Value::Scalar(f(x)),
        Operand::Vector(xs) => Value::Real(xs.iter().map(|&x| f(x)).collect()),
    })
}

fn logical_not(args: &[Value]) -> Result<Value> {
    arity("logical_not", args, 1)?;
    Ok(match &args[0] {
        Value::Scalar(x) => Value::Scalar(f64::from(u8::from(*x == 0.0))),
        other => Value::Bool(other.bools()?.iter().map(|b| !b).collect()),
    })
}

fn truthy(x: f64) -> bool {
    x != 0.0
}

// ── Registry ───────────────────────────────────────────────────

/// Immutable name → kernel table.
pub struct Library {
    kernels: HashMap<String, Kernel>,
}

impl fmt::Debug for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Library").field("kernels", &self.names()).finish()
    }
}

static LIBRARY: LazyLock<Library> = LazyLock::new(Library::standard);

macro_rules! register_flagged {
    ($kernels:ident, $name:ident, $kernel:ident) => {
        register_flagged!(@one $kernels, $name, $kernel, true, true, true, true);
        register_flagged!(@one $kernels, $name, $kernel, true, true, true, false);
        register_flagged!(@one $kernels, $name, $kernel, true, true, false, true);
        register_flagged!(@one $kernels, $name, $kernel, true, true, false, false);
        register_flagged!(@one $kernels, $name, $kernel, true, false, true, true);
        register_flagged!(@one $kernels, $name, $kernel, true, false, true, false);
        register_flagged!(@one $kernels, $name, $kernel, true, false, false, true);
        register_flagged!(@one $kernels, $name, $kernel, true, false, false, false);
        register_flagged!(@one $kernels, $name, $kernel, false, true, true, true);
        register_flagged!(@one $kernels, $name, $kernel, false, true, true, false);
        register_flagged!(@one $kernels, $name, $kernel, false, true, false, true);
        register_flagged!(@one $kernels, $name, $kernel, false, true, false, false);
        register_flagged!(@one $kernels, $name, $kernel, false, false, true, true);
        register_flagged!(@one $kernels, $name, $kernel, false, false, true, false);
        register_flagged!(@one $kernels, $name, $kernel, false, false, false, true);
        register_flagged!(@one $kernels, $name, $kernel, false, false, false, false);
    };
    (@one $kernels:ident, $name:ident, $kernel:ident, $u:literal, $o:literal, $n:literal, $l:literal) => {
        $kernels.insert($name(FlowFlags::new($u, $o, $n, $l)), $kernel::<$u, $o, $n, $l> as Kernel);
    };
}

impl Library {
    /// The process-wide library, built on first use.
    pub fn global() -> &'static Library {
        &LIBRARY
    }

    fn standard() -> Self {
        let mut kernels: HashMap<String, Kernel> = HashMap::new();

        kernels.insert(sparse_name(true).into(), sparse::<true>);
        kernels.insert(sparse_name(false).into(), sparse::<false>);
        register_flagged!(kernels, bin_name, bin);
        for (u, o) in [(true, true), (true, false), (false, true), (false, false)] {
            let kernel: Kernel = match (u, o) {
                (true, true) => intbin::<true, true>,
                (true, false) => intbin::<true, false>,
                (false, true) => intbin::<false, true>,
                (false, false) => intbin::<false, false>,
            };
            kernels.insert(intbin_name(u, o), kernel);
        }
        register_flagged!(kernels, partition_name, partition);
        kernels.insert("cut".into(), cut);
        kernels.insert("unique".into(), unique);

        let arithmetic: [(&str, Kernel); 21] = [
            ("add", |a| binary_real("add", a, |x, y| x + y)),
            ("subtract", |a| binary_real("subtract", a, |x, y| x - y)),
            ("multiply", |a| binary_real("multiply", a, |x, y| x * y)),
            ("divide", |a| binary_real("divide", a, |x, y| x / y)),
            ("power", |a| binary_real("power", a, f64::powf)),
            ("minimum", |a| binary_real("minimum", a, f64::min)),
            ("maximum", |a| binary_real("maximum", a, f64::max)),
            ("negative", |a| unary_real("negative", a, |x| -x)),
            ("abs", |a| unary_real("abs", a, f64::abs)),
            ("sqrt", |a| unary_real("sqrt", a, f64::sqrt)),
            ("log", |a| unary_real("log", a, f64::ln)),
            ("exp", |a| unary_real("exp", a, f64::exp)),
            ("equal", |a| binary_bool("equal", a, |x, y| x == y)),
            ("not_equal", |a| binary_bool("not_equal", a, |x, y| x != y)),
            ("less", |a| binary_bool("less", a, |x, y| x < y)),
            ("less_equal", |a| binary_bool("less_equal", a, |x, y| x <= y)),
            ("greater", |a| binary_bool("greater", a, |x, y| x > y)),
            ("greater_equal", |a| binary_bool("greater_equal", a, |x, y| x >= y)),
            ("logical_and", |a| binary_bool("logical_and", a, |x, y| truthy(x) && truthy(y))),
            ("logical_or", |a| binary_bool("logical_or", a, |x, y| truthy(x) || truthy(y))),
            ("logical_not", logical_not),
        ];
        for (name, kernel) in arithmetic {
            kernels.insert(name.into(), kernel);
        }

        Self { kernels }
    }

    /// Look up a kernel by name.
    pub fn get(&self, name: &str) -> Option<Kernel> {
        self.kernels.get(name).copied()
    }

    /// Whether a kernel of this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.kernels.contains_key(name)
    }

    /// Number of registered kernels.
    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    /// Whether the library is empty.
    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.kernels.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Fail with [`Error::Unresolved`] if any call in `expr` names a kernel
    /// that does not exist.
    pub fn check(&self, expr: &Expr) -> Result<()> {
        match expr.calls().into_iter().find(|fcn| !self.contains(fcn)) {
            Some(fcn) => Err(Error::Unresolved(fcn.to_string())),
            None => Ok(()),
        }
    }
}
