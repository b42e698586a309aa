//! Effects system for clip processing.
//!
//! Effects run in chain order on every drawn clip, then the opening and
//! closing transitions. What an effect can do is declared by its
//! [`EffectCaps`]; the pipeline only calls the hooks a kind advertises.
//!
//! # Architecture
//!
//! ```text
//! Clip
//!   └── effects: Vec<Effect>
//!         ├── Effect { kind: Transform, rows: [position, scale, ...] }
//!         └── Effect { kind: BrightnessContrast, rows: [brightness, contrast] }
//!
//! apply_effect():
//!   coords     -> process_coords()   (warp the compositing frame)
//!   shader     -> shader_stage()     (one ping-pong pass)
//!   superimpose-> superimpose()      (generated content drawn on top)
//! ```
//!
//! # Effect Kinds
//!
//! | Kind | Caps | Parameters |
//! |------|------|------------|
//! | **Transform** | coords, gizmos | `position`, `scale` %, `rotation` deg, `opacity` %, `blend_mode` |
//! | **CornerPin** | coords, gizmos | `top_left`..`bottom_left` offsets, `subdivisions` |
//! | **BrightnessContrast** | shader | `brightness: -1..1`, `contrast: -1..1` |
//! | **AdjustHsv** | shader | `hue_shift: -180..180`, `saturation: 0..2`, `value: 0..2` |
//! | **Solid** | superimpose | `color`, `resolution` % |
//! | **CrossDissolve** | coords | transition only |
//! | **LinearWipe** | shader | `feather`, transition only |
//!
//! # Adding New Effects
//!
//! 1. Create a unit struct implementing [`EffectOps`]
//! 2. Add it as a variant of [`EffectKind`]

pub mod color;
pub mod corner_pin;
pub mod solid;
pub mod transform;
pub mod transitions;

use enum_dispatch::enum_dispatch;
use glam::Vec2;
use uuid::Uuid;

use crate::entities::frame::Frame;
use crate::entities::params::{EffectRow, ParamValue, RowAccess};
use crate::render::coords::TextureCoords;
use crate::render::gpu::{GraphicsContext, TextureId};
use crate::render::shader::ShaderStage;

pub use color::{AdjustHsv, BrightnessContrast};
pub use corner_pin::CornerPin;
pub use solid::Solid;
pub use transform::Transform;
pub use transitions::{CrossDissolve, LinearWipe};

// ============================================================================
// Capabilities
// ============================================================================

/// What an effect kind is allowed to do during a draw
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EffectCaps {
    pub coords: bool,
    pub shader: bool,
    pub superimpose: bool,
    pub gizmos: bool,
}

/// Which part of a clip an effect is being applied as
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransitionArg {
    /// Regular chain effect
    #[default]
    NoTransition,
    Opening,
    Closing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionEdge {
    Opening,
    Closing,
}

impl From<TransitionEdge> for TransitionArg {
    fn from(edge: TransitionEdge) -> Self {
        match edge {
            TransitionEdge::Opening => TransitionArg::Opening,
            TransitionEdge::Closing => TransitionArg::Closing,
        }
    }
}

// ============================================================================
// Gizmos
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GizmoKind {
    /// Drags a position field
    Move,
    /// Drags a single point (corner)
    Dot,
}

/// On-screen handle bound to one parameter field
#[derive(Clone, Debug, PartialEq)]
pub struct Gizmo {
    pub kind: GizmoKind,
    /// Field the handle edits
    pub field: String,
    /// Position in sequence space
    pub world: Vec2,
    /// Position in viewport pixels, filled by world-to-screen
    pub screen: Vec2,
}

impl Gizmo {
    pub fn new(kind: GizmoKind, field: &str, world: Vec2) -> Self {
        Self {
            kind,
            field: field.to_string(),
            world,
            screen: Vec2::ZERO,
        }
    }
}

// ============================================================================
// Effect Ops
// ============================================================================

/// Per-kind behaviour. `time` is the clip-local time in seconds for chain
/// effects and the normalized progress (0..1) for transitions.
#[enum_dispatch]
pub trait EffectOps {
    /// Display name
    fn name(&self) -> &'static str;

    fn caps(&self) -> EffectCaps;

    /// Parameter rows with default values
    fn default_rows(&self) -> Vec<EffectRow>;

    /// Warp the compositing frame in place
    fn process_coords(&self, _rows: &[EffectRow], _time: f64, _coords: &mut TextureCoords, _arg: TransitionArg) {}

    /// Fragment program for one ping-pong pass. None skips the pass.
    fn shader_stage(&self, _rows: &[EffectRow], _time: f64, _arg: TransitionArg) -> Option<ShaderStage> {
        None
    }

    /// Generated content for a superimpose pass, sized from the clip's
    /// native resolution. None means generation failed for this frame.
    fn superimpose(&self, _rows: &[EffectRow], _time: f64, _size: (u32, u32)) -> Option<Frame> {
        None
    }

    /// Opens the state scope for shader and superimpose passes
    fn begin(&self, gpu: &mut dyn GraphicsContext) {
        gpu.push_state();
    }

    fn end(&self, gpu: &mut dyn GraphicsContext) {
        gpu.pop_state();
    }

    /// Handles in sequence space for the final compositing frame
    fn gizmo_layout(&self, _rows: &[EffectRow], _time: f64, _coords: &TextureCoords) -> Vec<Gizmo> {
        Vec::new()
    }
}

/// Closed set of effect kinds
#[enum_dispatch(EffectOps)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EffectKind {
    Transform,
    CornerPin,
    BrightnessContrast,
    AdjustHsv,
    Solid,
    CrossDissolve,
    LinearWipe,
}

impl EffectKind {
    /// All kinds, in menu order
    pub fn all() -> [EffectKind; 7] {
        [
            Transform.into(),
            CornerPin.into(),
            BrightnessContrast.into(),
            AdjustHsv.into(),
            Solid.into(),
            CrossDissolve.into(),
            LinearWipe.into(),
        ]
    }

    pub fn from_name(name: &str) -> Option<EffectKind> {
        Self::all().into_iter().find(|k| k.name().eq_ignore_ascii_case(name))
    }
}

// ============================================================================
// Effect Struct
// ============================================================================

/// Effect instance attached to a clip or transition
#[derive(Clone, Debug)]
pub struct Effect {
    pub uuid: Uuid,
    pub kind: EffectKind,
    pub rows: Vec<EffectRow>,
    /// Disabled effects are skipped
    pub enabled: bool,
    /// Selected in the effect controls; wins gizmo selection
    pub selected: bool,
    /// Handles from the last layout, in screen space
    pub gizmos: Vec<Gizmo>,
    /// Texture holding the last superimpose output
    pub generated: Option<TextureId>,
}

impl Effect {
    pub fn new(kind: impl Into<EffectKind>) -> Self {
        let kind = kind.into();
        Self {
            uuid: Uuid::new_v4(),
            rows: kind.default_rows(),
            kind,
            enabled: true,
            selected: false,
            gizmos: Vec::new(),
            generated: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn caps(&self) -> EffectCaps {
        self.kind.caps()
    }

    pub fn has_gizmos(&self) -> bool {
        self.caps().gizmos
    }

    /// Set a field's static value. Unknown fields are ignored with a warning.
    pub fn set(&mut self, field: &str, value: ParamValue) -> &mut Self {
        match self.rows.field_mut(field) {
            Some(f) => f.value = value,
            None => log::warn!("{}: no field '{}'", self.name(), field),
        }
        self
    }

    pub fn set_keyframe(&mut self, field: &str, time: f64, value: ParamValue) -> &mut Self {
        match self.rows.field_mut(field) {
            Some(f) => f.set_keyframe(time, value),
            None => log::warn!("{}: no field '{}'", self.name(), field),
        }
        self
    }

    pub fn with(mut self, field: &str, value: ParamValue) -> Self {
        self.set(field, value);
        self
    }

    pub fn selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }

    /// Sync every field's displayed value to `time`
    pub fn validate_keyframe_data(&mut self, time: f64) {
        for row in self.rows.iter_mut() {
            for field in row.fields.iter_mut() {
                field.validate_keyframe_data(time);
            }
        }
    }
}
