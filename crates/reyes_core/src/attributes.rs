//! Per-object attribute snapshots.
//!
//! Attributes are immutable once stored. A surface keeps an
//! [`AttributesId`] and every surface split from it shares the same
//! handle, so splitting never copies shading state. Changing attributes
//! means deriving a new snapshot.

use reyes_math::Color;

use crate::options::RenderOptions;

/// Shading and dicing state attached to a surface.
#[derive(Clone, Debug, PartialEq)]
pub struct Attributes {
    /// Optional object name, used in diagnostics
    pub name: Option<String>,
    /// Surface colour (Cs)
    pub color: Color,
    /// Surface opacity (Os)
    pub opacity: Color,
    /// Overrides `RenderOptions::shading_rate` when set
    pub shading_rate: Option<f32>,
    /// Overrides `RenderOptions::binary_dicing` when set
    pub binary_dicing: Option<bool>,
    /// Surface shader name, resolved by the shading collaborator
    pub surface_shader: Option<String>,
    /// Largest distance (camera space) a displacement shader may move a point
    pub displacement_bound: f32,
    /// Matte objects hide what is behind them but contribute no colour
    pub matte: bool,
}

impl Default for Attributes {
    fn default() -> Self {
        Self {
            name: None,
            color: Color::ONE,
            opacity: Color::ONE,
            shading_rate: None,
            binary_dicing: None,
            surface_shader: None,
            displacement_bound: 0.0,
            matte: false,
        }
    }
}

impl Attributes {
    /// Create attributes with just a name and colour.
    pub fn new(name: impl Into<String>, color: Color) -> Self {
        Self {
            name: Some(name.into()),
            color,
            ..Default::default()
        }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn with_opacity(mut self, opacity: Color) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_shading_rate(mut self, rate: f32) -> Self {
        self.shading_rate = Some(rate);
        self
    }

    pub fn with_shader(mut self, name: impl Into<String>) -> Self {
        self.surface_shader = Some(name.into());
        self
    }

    pub fn with_displacement_bound(mut self, bound: f32) -> Self {
        self.displacement_bound = bound.max(0.0);
        self
    }

    pub fn with_matte(mut self, matte: bool) -> Self {
        self.matte = matte;
        self
    }

    pub fn with_binary_dicing(mut self, binary: bool) -> Self {
        self.binary_dicing = Some(binary);
        self
    }

    /// Shading rate in effect for these attributes.
    pub fn effective_shading_rate(&self, options: &RenderOptions) -> f32 {
        match self.shading_rate {
            Some(rate) if rate.is_finite() && rate > 0.0 => rate,
            _ => options.shading_rate,
        }
    }

    /// Binary dicing in effect for these attributes.
    pub fn effective_binary_dicing(&self, options: &RenderOptions) -> bool {
        self.binary_dicing.unwrap_or(options.binary_dicing)
    }
}

/// Handle to an attribute snapshot in an [`AttributeStore`].
/// The default handle resolves to slot 0.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttributesId(u32);

impl AttributesId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Arena of immutable attribute snapshots for one render.
///
/// Slot 0 always holds `Attributes::default()`.
#[derive(Clone, Debug)]
pub struct AttributeStore {
    snapshots: Vec<Attributes>,
}

impl AttributeStore {
    pub fn new() -> Self {
        Self {
            snapshots: vec![Attributes::default()],
        }
    }

    /// Handle of the default snapshot.
    pub fn default_id(&self) -> AttributesId {
        AttributesId(0)
    }

    /// Store a new snapshot and return its handle.
    pub fn insert(&mut self, attributes: Attributes) -> AttributesId {
        let id = AttributesId(self.snapshots.len() as u32);
        self.snapshots.push(attributes);
        id
    }

    /// Copy-on-write modification: clone the snapshot at `base`, apply
    /// `edit`, and store the result under a new handle. `base` is unchanged.
    pub fn derive(&mut self, base: AttributesId, edit: impl FnOnce(&mut Attributes)) -> AttributesId {
        let mut attributes = self.get(base).clone();
        edit(&mut attributes);
        self.insert(attributes)
    }

    /// Look up a snapshot. Unknown handles resolve to the default snapshot.
    pub fn get(&self, id: AttributesId) -> &Attributes {
        self.snapshots
            .get(id.index())
            .unwrap_or(&self.snapshots[0])
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

impl Default for AttributeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_insert_and_get() {
        let mut store = AttributeStore::new();
        let red = store.insert(Attributes::new("red", Color::new(1.0, 0.0, 0.0)));

        assert_eq!(store.get(red).color, Color::new(1.0, 0.0, 0.0));
        assert_eq!(store.get(store.default_id()), &Attributes::default());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_derive_is_copy_on_write() {
        let mut store = AttributeStore::new();
        let base = store.insert(Attributes::default().with_shading_rate(4.0));
        let derived = store.derive(base, |a| a.matte = true);

        assert_ne!(base, derived);
        assert!(!store.get(base).matte);
        assert!(store.get(derived).matte);
        assert_eq!(store.get(derived).shading_rate, Some(4.0));
    }

    #[test]
    fn test_effective_values_fall_back_to_options() {
        let options = RenderOptions {
            shading_rate: 0.5,
            binary_dicing: true,
            ..Default::default()
        };
        let plain = Attributes::default();
        assert_eq!(plain.effective_shading_rate(&options), 0.5);
        assert!(plain.effective_binary_dicing(&options));

        let tuned = Attributes::default()
            .with_shading_rate(2.0)
            .with_binary_dicing(false);
        assert_eq!(tuned.effective_shading_rate(&options), 2.0);
        assert!(!tuned.effective_binary_dicing(&options));
    }
}
