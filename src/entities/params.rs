//! Effect parameters: rows of typed fields with optional keyframes.
//!
//! An effect owns a list of `EffectRow`s, each holding one or more
//! `ParamField`s. Fields carry a static `value` plus keyframes keyed by
//! clip-local time in seconds. Rendering evaluates `value_at(time)` directly;
//! `validate_keyframe_data` stores the evaluated value back so readers that
//! only look at `value` (UI, serializers) see the animated state.

use serde::{Deserialize, Serialize};

/// Typed parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Bool(bool),
    Float(f32),
    Vec2([f32; 2]),
    Color([f32; 4]),
    /// Index into a fixed list of options (blend mode, direction, ...)
    Choice(u32),
}

impl ParamValue {
    /// Interpolate towards `other`. Non-numeric values step at the end.
    fn lerp(&self, other: &ParamValue, t: f32) -> ParamValue {
        use ParamValue::*;
        match (self, other) {
            (Float(a), Float(b)) => Float(a + (b - a) * t),
            (Vec2(a), Vec2(b)) => Vec2([a[0] + (b[0] - a[0]) * t, a[1] + (b[1] - a[1]) * t]),
            (Color(a), Color(b)) => Color([
                a[0] + (b[0] - a[0]) * t,
                a[1] + (b[1] - a[1]) * t,
                a[2] + (b[2] - a[2]) * t,
                a[3] + (b[3] - a[3]) * t,
            ]),
            _ => {
                if t >= 1.0 {
                    other.clone()
                } else {
                    self.clone()
                }
            }
        }
    }
}

/// Keyframe at clip-local time (seconds)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub time: f64,
    pub value: ParamValue,
}

/// Named parameter field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamField {
    pub name: String,
    pub value: ParamValue,
    #[serde(default)]
    pub keyframes: Vec<Keyframe>,
}

impl ParamField {
    pub fn new(name: impl Into<String>, value: ParamValue) -> Self {
        Self {
            name: name.into(),
            value,
            keyframes: Vec::new(),
        }
    }

    /// Add a keyframe, keeping keys sorted by time. Replaces a key at the same time.
    pub fn set_keyframe(&mut self, time: f64, value: ParamValue) {
        match self.keyframes.iter().position(|k| k.time >= time) {
            Some(i) if self.keyframes[i].time == time => self.keyframes[i].value = value,
            Some(i) => self.keyframes.insert(i, Keyframe { time, value }),
            None => self.keyframes.push(Keyframe { time, value }),
        }
    }

    pub fn is_animated(&self) -> bool {
        !self.keyframes.is_empty()
    }

    /// Evaluate at clip-local time. Holds the first/last key outside the keyed range.
    pub fn value_at(&self, time: f64) -> ParamValue {
        let keys = &self.keyframes;
        let (Some(first), Some(last)) = (keys.first(), keys.last()) else {
            return self.value.clone();
        };
        if time <= first.time {
            return first.value.clone();
        }
        if time >= last.time {
            return last.value.clone();
        }
        for pair in keys.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if time >= a.time && time < b.time {
                let span = b.time - a.time;
                let t = if span > 0.0 { ((time - a.time) / span) as f32 } else { 1.0 };
                return a.value.lerp(&b.value, t);
            }
        }
        last.value.clone()
    }

    /// Store the value at `time` into `value`. No-op for static fields.
    pub fn validate_keyframe_data(&mut self, time: f64) {
        if self.is_animated() {
            self.value = self.value_at(time);
        }
    }
}

/// Row of fields as shown in an effect's parameter list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectRow {
    pub name: String,
    pub fields: Vec<ParamField>,
}

impl EffectRow {
    /// Row with one field named like the row
    pub fn single(name: &str, value: ParamValue) -> Self {
        Self {
            name: name.to_string(),
            fields: vec![ParamField::new(name, value)],
        }
    }
}

/// Typed lookups over a row list. Missing rows or mismatched types fall back to the default.
pub trait RowAccess {
    fn field(&self, name: &str) -> Option<&ParamField>;
    fn field_mut(&mut self, name: &str) -> Option<&mut ParamField>;

    fn float_at(&self, name: &str, time: f64, default: f32) -> f32 {
        match self.field(name).map(|f| f.value_at(time)) {
            Some(ParamValue::Float(v)) => v,
            _ => default,
        }
    }

    fn vec2_at(&self, name: &str, time: f64, default: [f32; 2]) -> [f32; 2] {
        match self.field(name).map(|f| f.value_at(time)) {
            Some(ParamValue::Vec2(v)) => v,
            _ => default,
        }
    }

    fn color_at(&self, name: &str, time: f64, default: [f32; 4]) -> [f32; 4] {
        match self.field(name).map(|f| f.value_at(time)) {
            Some(ParamValue::Color(v)) => v,
            _ => default,
        }
    }

    fn bool_at(&self, name: &str, time: f64, default: bool) -> bool {
        match self.field(name).map(|f| f.value_at(time)) {
            Some(ParamValue::Bool(v)) => v,
            _ => default,
        }
    }

    fn choice_at(&self, name: &str, time: f64, default: u32) -> u32 {
        match self.field(name).map(|f| f.value_at(time)) {
            Some(ParamValue::Choice(v)) => v,
            _ => default,
        }
    }
}

impl RowAccess for [EffectRow] {
    fn field(&self, name: &str) -> Option<&ParamField> {
        self.iter().flat_map(|r| r.fields.iter()).find(|f| f.name == name)
    }

    fn field_mut(&mut self, name: &str) -> Option<&mut ParamField> {
        self.iter_mut().flat_map(|r| r.fields.iter_mut()).find(|f| f.name == name)
    }
}

impl RowAccess for Vec<EffectRow> {
    fn field(&self, name: &str) -> Option<&ParamField> {
        self.as_slice().field(name)
    }

    fn field_mut(&mut self, name: &str) -> Option<&mut ParamField> {
        self.as_mut_slice().field_mut(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Linear interpolation between two float keys, hold outside
    #[test]
    fn test_value_at_float() {
        let mut field = ParamField::new("opacity", ParamValue::Float(100.0));
        field.set_keyframe(1.0, ParamValue::Float(0.0));
        field.set_keyframe(0.0, ParamValue::Float(100.0));
        assert_eq!(field.keyframes[0].time, 0.0);

        assert_eq!(field.value_at(-1.0), ParamValue::Float(100.0));
        assert_eq!(field.value_at(0.25), ParamValue::Float(75.0));
        assert_eq!(field.value_at(5.0), ParamValue::Float(0.0));
    }

    /// Bool keys step instead of blending
    #[test]
    fn test_value_at_step() {
        let mut field = ParamField::new("invert", ParamValue::Bool(false));
        field.set_keyframe(0.0, ParamValue::Bool(false));
        field.set_keyframe(2.0, ParamValue::Bool(true));
        assert_eq!(field.value_at(1.9), ParamValue::Bool(false));
        assert_eq!(field.value_at(2.0), ParamValue::Bool(true));
    }

    /// validate_keyframe_data writes the animated value, static fields stay put
    #[test]
    fn test_validate_keyframe_data() {
        let mut animated = ParamField::new("position", ParamValue::Vec2([0.0, 0.0]));
        animated.set_keyframe(0.0, ParamValue::Vec2([0.0, 0.0]));
        animated.set_keyframe(2.0, ParamValue::Vec2([10.0, -10.0]));
        animated.validate_keyframe_data(1.0);
        assert_eq!(animated.value, ParamValue::Vec2([5.0, -5.0]));

        let mut fixed = ParamField::new("scale", ParamValue::Float(50.0));
        fixed.validate_keyframe_data(1.0);
        assert_eq!(fixed.value, ParamValue::Float(50.0));
    }

    /// Typed row lookups fall back on missing or mistyped fields
    #[test]
    fn test_row_access() {
        let rows = vec![
            EffectRow::single("brightness", ParamValue::Float(0.2)),
            EffectRow::single("color", ParamValue::Color([1.0, 0.0, 0.0, 1.0])),
        ];
        assert_eq!(rows.float_at("brightness", 0.0, 0.0), 0.2);
        assert_eq!(rows.float_at("color", 0.0, 7.0), 7.0);
        assert_eq!(rows.float_at("missing", 0.0, 3.0), 3.0);
        assert_eq!(rows.color_at("color", 0.0, [0.0; 4]), [1.0, 0.0, 0.0, 1.0]);
    }
}
