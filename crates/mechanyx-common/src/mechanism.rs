//! Mechanism-of-action vectors.
//!
//! Axis order is fixed: DDR, MAPK, PI3K, VEGF, HER2, IO, Efflux. The 6D
//! layout drops IO. DDR is always index 0 in both layouts.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One pathway dimension of a mechanism vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Ddr,
    #[serde(alias = "ras_mapk")]
    Mapk,
    Pi3k,
    Vegf,
    Her2,
    Io,
    Efflux,
}

impl Axis {
    pub const ALL: [Axis; 7] = [
        Axis::Ddr,
        Axis::Mapk,
        Axis::Pi3k,
        Axis::Vegf,
        Axis::Her2,
        Axis::Io,
        Axis::Efflux,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Axis::Ddr => "ddr",
            Axis::Mapk => "mapk",
            Axis::Pi3k => "pi3k",
            Axis::Vegf => "vegf",
            Axis::Her2 => "her2",
            Axis::Io => "io",
            Axis::Efflux => "efflux",
        }
    }

    /// Parse a JSON/CSV axis key. `ras_mapk` is accepted for MAPK.
    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "ddr" => Some(Axis::Ddr),
            "mapk" | "ras_mapk" => Some(Axis::Mapk),
            "pi3k" => Some(Axis::Pi3k),
            "vegf" => Some(Axis::Vegf),
            "her2" => Some(Axis::Her2),
            "io" => Some(Axis::Io),
            "efflux" => Some(Axis::Efflux),
            _ => None,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

const SIX_AXES: [Axis; 6] = [
    Axis::Ddr,
    Axis::Mapk,
    Axis::Pi3k,
    Axis::Vegf,
    Axis::Her2,
    Axis::Efflux,
];

/// Vector layout used by a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimensionality {
    /// IO omitted; used for cell-line panels without immune context.
    Six,
    #[default]
    Seven,
}

impl Dimensionality {
    pub fn axes(&self) -> &'static [Axis] {
        match self {
            Dimensionality::Six => &SIX_AXES,
            Dimensionality::Seven => &Axis::ALL,
        }
    }

    pub fn len(&self) -> usize {
        self.axes().len()
    }

    pub fn index_of(&self, axis: Axis) -> Option<usize> {
        self.axes().iter().position(|a| *a == axis)
    }
}

/// Ordered, non-negative pathway intensities.
///
/// Construction replaces negative or non-finite components with `0.0`, so
/// every vector in the system is a valid input to the similarity scorer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<f64>", into = "Vec<f64>")]
pub struct MechanismVector {
    values: Vec<f64>,
}

impl From<Vec<f64>> for MechanismVector {
    fn from(values: Vec<f64>) -> Self {
        Self::new(values)
    }
}

impl From<MechanismVector> for Vec<f64> {
    fn from(v: MechanismVector) -> Self {
        v.values
    }
}

impl MechanismVector {
    pub fn new(values: Vec<f64>) -> Self {
        let values = values
            .into_iter()
            .map(|v| if v.is_finite() && v > 0.0 { v } else { 0.0 })
            .collect();
        Self { values }
    }

    pub fn zeros(dim: Dimensionality) -> Self {
        Self { values: vec![0.0; dim.len()] }
    }

    /// Build from `(axis_key, value)` pairs. Unknown keys and axes absent
    /// from the layout are ignored.
    pub fn from_axis_pairs<'a, I>(pairs: I, dim: Dimensionality) -> Self
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut values = vec![0.0; dim.len()];
        for (key, value) in pairs {
            if let Some(idx) = Axis::from_key(key).and_then(|a| dim.index_of(a)) {
                values[idx] = value;
            }
        }
        Self::new(values)
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Primary (DDR) dimension.
    pub fn ddr(&self) -> f64 {
        self.values.first().copied().unwrap_or(0.0)
    }

    pub fn get(&self, axis: Axis, dim: Dimensionality) -> f64 {
        dim.index_of(axis)
            .and_then(|i| self.values.get(i).copied())
            .unwrap_or(0.0)
    }

    pub fn set(&mut self, axis: Axis, dim: Dimensionality, value: f64) {
        if let Some(slot) = dim.index_of(axis).and_then(|i| self.values.get_mut(i)) {
            *slot = if value.is_finite() && value > 0.0 { value } else { 0.0 };
        }
    }

    pub fn norm(&self) -> f64 {
        self.values.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    pub fn is_zero(&self) -> bool {
        self.norm() == 0.0
    }

    /// Dot product over the shared prefix. Callers conform lengths first.
    pub fn dot(&self, other: &MechanismVector) -> f64 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| a * b)
            .sum()
    }

    /// Truncate or zero-pad to `len` components.
    pub fn conform_to(&self, len: usize) -> MechanismVector {
        let mut values = self.values.clone();
        values.resize(len, 0.0);
        Self { values }
    }

    pub fn clamp_unit(mut self) -> Self {
        for v in &mut self.values {
            *v = v.clamp(0.0, 1.0);
        }
        self
    }

    /// Re-express a vector from one layout in another, axis by axis.
    pub fn relayout(&self, from: Dimensionality, to: Dimensionality) -> MechanismVector {
        let values = to.axes().iter().map(|a| self.get(*a, from)).collect();
        Self { values }
    }
}
