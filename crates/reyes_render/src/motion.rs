//! Motion keys: values sampled at increasing shutter times.

/// Where a time falls relative to a key list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeySpan {
    /// Exactly on key `i` (or clamped to the first/last key).
    At(usize),
    /// Between keys `i` and `i + 1`, at fraction `t` of the interval.
    Between(usize, f32),
}

/// An ordered (by time) list of keyed values.
///
/// Always holds at least one key. A single key means the value is static.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionKeys<T> {
    times: Vec<f32>,
    values: Vec<T>,
}

impl<T> MotionKeys<T> {
    /// A static value (single key at time 0).
    pub fn fixed(value: T) -> Self {
        Self {
            times: vec![0.0],
            values: vec![value],
        }
    }

    /// Build from `(time, value)` pairs. Keys are sorted by time; a key
    /// whose time repeats an earlier one is dropped. Returns `None` when
    /// no key is given.
    pub fn from_keys<I: IntoIterator<Item = (f32, T)>>(keys: I) -> Option<Self> {
        let mut keys: Vec<(f32, T)> = keys.into_iter().filter(|(t, _)| t.is_finite()).collect();
        keys.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        keys.dedup_by(|later, earlier| later.0 == earlier.0);
        if keys.is_empty() {
            return None;
        }
        let (times, values) = keys.into_iter().unzip();
        Some(Self { times, values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_moving(&self) -> bool {
        self.values.len() > 1
    }

    pub fn times(&self) -> &[f32] {
        &self.times
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [T] {
        &mut self.values
    }

    /// Value at the first (shutter-open) key.
    pub fn first(&self) -> &T {
        &self.values[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = (f32, &T)> {
        self.times.iter().copied().zip(self.values.iter())
    }

    /// Apply `f` to every key, keeping the key times.
    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> MotionKeys<U> {
        MotionKeys {
            times: self.times.clone(),
            values: self.values.iter().map(f).collect(),
        }
    }

    /// Locate `time` among the keys. Times outside the keyed range clamp
    /// to the nearest end key.
    pub fn span(&self, time: f32) -> KeySpan {
        let last = self.times.len() - 1;
        if last == 0 || time <= self.times[0] {
            return KeySpan::At(0);
        }
        if time >= self.times[last] {
            return KeySpan::At(last);
        }
        // First key strictly after `time`
        let upper = self.times.partition_point(|&t| t <= time);
        let lower = upper - 1;
        if self.times[lower] == time {
            return KeySpan::At(lower);
        }
        let t = (time - self.times[lower]) / (self.times[upper] - self.times[lower]);
        KeySpan::Between(lower, t)
    }
}

impl<T: Clone> MotionKeys<T> {
    /// Value at `time`, blending neighbouring keys with `blend`.
    pub fn sample(&self, time: f32, blend: impl Fn(&T, &T, f32) -> T) -> T {
        match self.span(time) {
            KeySpan::At(i) => self.values[i].clone(),
            KeySpan::Between(i, t) => blend(&self.values[i], &self.values[i + 1], t),
        }
    }
}
