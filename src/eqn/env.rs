use std::collections::HashMap;

use super::ast::VarId;

macro_rules! builtin_vars {
    ($($id:ident => $name:literal),* $(,)?) => {
        /// Well-known variable slots. Every symbol table registers these first,
        /// in this order, so the ids are identical in every namespace.
        pub mod var {
            builtin_vars!(@consts 0usize; $($id)*);
        }

        pub const BUILTIN_NAMES: &[&str] = &[$($name),*];
    };
    (@consts $n:expr; $head:ident $($tail:ident)*) => {
        pub const $head: usize = $n;
        builtin_vars!(@consts $n + 1usize; $($tail)*);
    };
    (@consts $n:expr;) => {
        pub const NAMED_COUNT: usize = $n;
    };
}

builtin_vars! {
    TIME => "time",
    FRAME => "frame",
    FPS => "fps",
    PROGRESS => "progress",
    BASS => "bass",
    MID => "mid",
    TREB => "treb",
    BASS_ATT => "bass_att",
    MID_ATT => "mid_att",
    TREB_ATT => "treb_att",
    VOL => "vol",
    VOL_ATT => "vol_att",
    X => "x",
    Y => "y",
    RAD => "rad",
    ANG => "ang",
    ASPECTX => "aspectx",
    ASPECTY => "aspecty",
    MESHX => "meshx",
    MESHY => "meshy",
    PIXELSX => "pixelsx",
    PIXELSY => "pixelsy",
    ZOOM => "zoom",
    ZOOMEXP => "zoomexp",
    ROT => "rot",
    WARP => "warp",
    CX => "cx",
    CY => "cy",
    DX => "dx",
    DY => "dy",
    SX => "sx",
    SY => "sy",
    DECAY => "decay",
    ECHO_ZOOM => "echo_zoom",
    ECHO_ALPHA => "echo_alpha",
    ECHO_ORIENT => "echo_orient",
    GAMMA => "gamma",
    BRIGHTEN => "brighten",
    DARKEN => "darken",
    SOLARIZE => "solarize",
    INVERT => "invert",
    WAVE_MODE => "wave_mode",
    WAVE_R => "wave_r",
    WAVE_G => "wave_g",
    WAVE_B => "wave_b",
    WAVE_A => "wave_a",
    WAVE_X => "wave_x",
    WAVE_Y => "wave_y",
    WAVE_SCALE => "wave_scale",
    OB_SIZE => "ob_size",
    OB_R => "ob_r",
    OB_G => "ob_g",
    OB_B => "ob_b",
    OB_A => "ob_a",
    IB_SIZE => "ib_size",
    IB_R => "ib_r",
    IB_G => "ib_g",
    IB_B => "ib_b",
    IB_A => "ib_a",
    R => "r",
    G => "g",
    B => "b",
    A => "a",
    R2 => "r2",
    G2 => "g2",
    B2 => "b2",
    A2 => "a2",
    BORDER_R => "border_r",
    BORDER_G => "border_g",
    BORDER_B => "border_b",
    BORDER_A => "border_a",
    SIDES => "sides",
    THICK => "thick",
    ADDITIVE => "additive",
    SAMPLES => "samples",
    SAMPLE => "sample",
    VALUE1 => "value1",
    VALUE2 => "value2",
}

pub const Q_COUNT: usize = 32;
pub const REG_COUNT: usize = 100;
pub const T_COUNT: usize = 8;

/// First slot of `q1..q32`.
pub const Q_BASE: VarId = var::NAMED_COUNT;
/// First slot of `reg00..reg99`.
pub const REG_BASE: VarId = Q_BASE + Q_COUNT;
/// First slot of `t1..t8`.
pub const T_BASE: VarId = REG_BASE + REG_COUNT;
pub const BUILTIN_SLOTS: usize = T_BASE + T_COUNT;

pub fn q_slot(n: usize) -> Option<VarId> {
    (1..=Q_COUNT).contains(&n).then(|| Q_BASE + n - 1)
}

pub fn t_slot(n: usize) -> Option<VarId> {
    (1..=T_COUNT).contains(&n).then(|| T_BASE + n - 1)
}

/// Maps case-folded variable names to slots for one namespace.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    names: Vec<String>,
    index: HashMap<String, VarId>,
}

impl SymbolTable {
    pub fn with_builtins() -> Self {
        let mut table = Self {
            names: Vec::with_capacity(BUILTIN_SLOTS + 16),
            index: HashMap::with_capacity(BUILTIN_SLOTS + 16),
        };
        for name in BUILTIN_NAMES {
            table.insert(name.to_string());
        }
        for n in 1..=Q_COUNT {
            table.insert(format!("q{n}"));
        }
        for n in 0..REG_COUNT {
            table.insert(format!("reg{n:02}"));
        }
        for n in 1..=T_COUNT {
            table.insert(format!("t{n}"));
        }
        table
    }

    fn insert(&mut self, name: String) -> VarId {
        let id = self.names.len();
        self.index.insert(name.clone(), id);
        self.names.push(name);
        id
    }

    /// Returns the slot for `name`, allocating one for names never seen before.
    pub fn resolve(&mut self, name: &str) -> VarId {
        let key = name.to_ascii_lowercase();
        match self.index.get(&key) {
            Some(&id) => id,
            None => self.insert(key),
        }
    }

    pub fn get(&self, name: &str) -> Option<VarId> {
        self.index.get(&name.to_ascii_lowercase()).copied()
    }

    pub fn name(&self, id: VarId) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Register file plus the random source for one namespace of one preset instance.
#[derive(Debug, Clone)]
pub struct VariableEnvironment {
    slots: Vec<f64>,
    rng: fastrand::Rng,
}

impl VariableEnvironment {
    pub fn new(len: usize, seed: u64) -> Self {
        Self {
            slots: vec![0.0; len],
            rng: fastrand::Rng::with_seed(seed),
        }
    }

    pub fn get(&self, id: VarId) -> f64 {
        self.slots.get(id).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, id: VarId, v: f64) {
        if let Some(slot) = self.slots.get_mut(id) {
            *slot = v;
        }
    }

    pub fn get_f32(&self, id: VarId) -> f32 {
        self.get(id) as f32
    }

    pub fn slots(&self) -> &[f64] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Grows the register file; never shrinks it.
    pub fn ensure_len(&mut self, len: usize) {
        if self.slots.len() < len {
            self.slots.resize(len, 0.0);
        }
    }

    pub fn split_mut(&mut self) -> (&mut [f64], &mut fastrand::Rng) {
        (&mut self.slots, &mut self.rng)
    }

    pub fn copy_slots_from(&mut self, ids: &[VarId], src: &[f64]) {
        for &id in ids {
            if let (Some(dst), Some(v)) = (self.slots.get_mut(id), src.get(id)) {
                *dst = *v;
            }
        }
    }

    pub fn snapshot_into(&self, out: &mut Vec<f64>) {
        out.clear();
        out.extend_from_slice(&self.slots);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_ids_match_their_names() {
        let t = SymbolTable::with_builtins();
        assert_eq!(t.get("zoom"), Some(var::ZOOM));
        assert_eq!(t.get("VALUE2"), Some(var::VALUE2));
        assert_eq!(t.get("q1"), q_slot(1));
        assert_eq!(t.get("q32"), q_slot(32));
        assert_eq!(t.get("reg00"), Some(REG_BASE));
        assert_eq!(t.get("reg99"), Some(REG_BASE + 99));
        assert_eq!(t.get("t8"), t_slot(8));
        assert_eq!(t.len(), BUILTIN_SLOTS);
    }

    #[test]
    fn unknown_names_are_allocated_once() {
        let mut t = SymbolTable::with_builtins();
        let a = t.resolve("MyVar");
        let b = t.resolve("myvar");
        assert_eq!(a, b);
        assert_eq!(a, BUILTIN_SLOTS);
    }
}
