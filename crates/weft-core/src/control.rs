//! Voice payloads and control-pattern application.
//!
//! A control pattern is a pattern of `VoiceData` with one field set;
//! applying it to a base pattern merges payloads wherever events
//! intersect, control fields winning over base fields.

use crate::pattern::Pattern;
use crate::{stack, Hap, State, Value};
use serde::{Deserialize, Serialize};

const DEFAULT_Q: f64 = 1.0;

/// Envelope applied to a filter cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterEnv {
    pub depth: f64,
    pub attack: f64,
    pub decay: f64,
    pub sustain: f64,
    pub release: f64,
}

impl Default for FilterEnv {
    fn default() -> Self {
        FilterEnv {
            depth: 0.0,
            attack: 0.01,
            decay: 0.2,
            sustain: 1.0,
            release: 0.2,
        }
    }
}

/// One band of a formant filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FormantBand {
    pub freq: f64,
    pub bandwidth: f64,
    pub gain: f64,
}

/// A declarative filter stage, consumed by whatever renders the voice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterDef {
    LowPass { cutoff: f64, q: f64, env: FilterEnv },
    HighPass { cutoff: f64, q: f64, env: FilterEnv },
    BandPass { cutoff: f64, q: f64, env: FilterEnv },
    Notch { cutoff: f64, q: f64, env: FilterEnv },
    Formant { bands: [FormantBand; 5] },
}

impl FilterDef {
    fn set_q(&mut self, new_q: f64) {
        match self {
            FilterDef::LowPass { q, .. }
            | FilterDef::HighPass { q, .. }
            | FilterDef::BandPass { q, .. }
            | FilterDef::Notch { q, .. } => *q = new_q,
            FilterDef::Formant { .. } => {}
        }
    }
}

/// Five formant bands per vowel: frequency, bandwidth, linear gain.
fn vowel_bands(vowel: &str) -> Option<[FormantBand; 5]> {
    let table: [(f64, f64, f64); 5] = match vowel {
        "a" => [
            (800.0, 80.0, 1.0),
            (1150.0, 90.0, 0.63),
            (2900.0, 120.0, 0.1),
            (3900.0, 130.0, 0.015),
            (4950.0, 140.0, 0.001),
        ],
        "e" => [
            (350.0, 60.0, 1.0),
            (2000.0, 100.0, 0.1),
            (2800.0, 120.0, 0.18),
            (3600.0, 150.0, 0.01),
            (4950.0, 200.0, 0.001),
        ],
        "i" => [
            (270.0, 60.0, 1.0),
            (2140.0, 90.0, 0.25),
            (2950.0, 100.0, 0.05),
            (3900.0, 120.0, 0.005),
            (4950.0, 120.0, 0.001),
        ],
        "o" => [
            (450.0, 70.0, 1.0),
            (800.0, 80.0, 0.28),
            (2830.0, 100.0, 0.08),
            (3800.0, 130.0, 0.01),
            (4950.0, 135.0, 0.0003),
        ],
        "u" => [
            (325.0, 50.0, 1.0),
            (700.0, 60.0, 0.16),
            (2700.0, 170.0, 0.018),
            (3800.0, 180.0, 0.01),
            (4950.0, 200.0, 0.001),
        ],
        _ => return None,
    };
    Some(table.map(|(freq, bandwidth, gain)| FormantBand {
        freq,
        bandwidth,
        gain,
    }))
}

/// The payload a voice sink consumes: every field optional, set only by
/// the control that mentions it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VoiceData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound_index: Option<i64>,
    /// The raw notation value, before any reinterpretation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freq_hz: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pan: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gain: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub velocity: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub attack: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decay: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sustain: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cutoff: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hcutoff: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bandf: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notchf: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resonance: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub lp_env: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lp_attack: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lp_decay: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lp_sustain: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lp_release: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hp_env: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hp_attack: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hp_decay: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hp_sustain: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hp_release: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bp_env: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bp_attack: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bp_decay: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bp_sustain: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bp_release: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub vowel: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_feedback: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub distort: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crush: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub vib: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vib_mod: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duck: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duck_attack: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chord: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voicing: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legato: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orbit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accelerate: Option<f64>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub filters: Vec<FilterDef>,
}

macro_rules! merge_fields {
    ($out:ident, $ctrl:ident, $($field:ident),* $(,)?) => {
        $( if $ctrl.$field.is_some() { $out.$field = $ctrl.$field.clone(); } )*
    };
}

impl VoiceData {
    /// Right-biased field merge: any field the control side sets wins;
    /// absent fields leave the base untouched. The filter-shaping fields
    /// additionally maintain the declarative `filters` list.
    pub fn merge(&self, ctrl: &VoiceData) -> VoiceData {
        let mut out = self.clone();
        merge_fields!(
            out, ctrl, note, sound, sound_index, value, freq_hz, pan, gain, velocity, attack,
            decay, sustain, release, lp_env, lp_attack, lp_decay, lp_sustain, lp_release, hp_env,
            hp_attack, hp_decay, hp_sustain, hp_release, bp_env, bp_attack, bp_decay, bp_sustain,
            bp_release, room, size, delay, delay_time, delay_feedback, distort, shape, crush, vib,
            vib_mod, duck, duck_attack, scale, chord, voicing, legato, orbit, bank, accelerate,
        );
        out.filters.extend(ctrl.filters.iter().cloned());

        let q = out.resonance.unwrap_or(DEFAULT_Q);
        if let Some(cutoff) = ctrl.cutoff {
            out.cutoff = Some(cutoff);
            out.filters.push(FilterDef::LowPass {
                cutoff,
                q,
                env: FilterEnv {
                    depth: out.lp_env.unwrap_or(0.0),
                    attack: out.lp_attack.unwrap_or(FilterEnv::default().attack),
                    decay: out.lp_decay.unwrap_or(FilterEnv::default().decay),
                    sustain: out.lp_sustain.unwrap_or(FilterEnv::default().sustain),
                    release: out.lp_release.unwrap_or(FilterEnv::default().release),
                },
            });
        }
        if let Some(cutoff) = ctrl.hcutoff {
            out.hcutoff = Some(cutoff);
            out.filters.push(FilterDef::HighPass {
                cutoff,
                q,
                env: FilterEnv {
                    depth: out.hp_env.unwrap_or(0.0),
                    attack: out.hp_attack.unwrap_or(FilterEnv::default().attack),
                    decay: out.hp_decay.unwrap_or(FilterEnv::default().decay),
                    sustain: out.hp_sustain.unwrap_or(FilterEnv::default().sustain),
                    release: out.hp_release.unwrap_or(FilterEnv::default().release),
                },
            });
        }
        if let Some(cutoff) = ctrl.bandf {
            out.bandf = Some(cutoff);
            out.filters.push(FilterDef::BandPass {
                cutoff,
                q,
                env: FilterEnv {
                    depth: out.bp_env.unwrap_or(0.0),
                    attack: out.bp_attack.unwrap_or(FilterEnv::default().attack),
                    decay: out.bp_decay.unwrap_or(FilterEnv::default().decay),
                    sustain: out.bp_sustain.unwrap_or(FilterEnv::default().sustain),
                    release: out.bp_release.unwrap_or(FilterEnv::default().release),
                },
            });
        }
        if let Some(cutoff) = ctrl.notchf {
            out.notchf = Some(cutoff);
            out.filters.push(FilterDef::Notch {
                cutoff,
                q,
                env: FilterEnv::default(),
            });
        }
        if let Some(resonance) = ctrl.resonance {
            out.resonance = Some(resonance);
            for def in &mut out.filters {
                def.set_q(resonance);
            }
        }
        if let Some(vowel) = &ctrl.vowel {
            out.vowel = Some(vowel.clone());
            match vowel_bands(vowel) {
                Some(bands) => out.filters.push(FilterDef::Formant { bands }),
                None => {
                    let err = crate::PatternError::lookup("vowel", vowel.clone());
                    tracing::warn!(%err, "no formant applied");
                }
            }
        }
        out
    }
}

/// Build a control pattern from a float pattern and a field setter.
pub fn ctrl_f64<F>(values: Pattern<f64>, set: F) -> Pattern<VoiceData>
where
    F: Fn(&mut VoiceData, f64) + Send + Sync + 'static,
{
    values.fmap(move |v| {
        let mut data = VoiceData::default();
        set(&mut data, v);
        data
    })
}

/// Build a control pattern from a raw value pattern.
pub fn ctrl_value<F>(values: Pattern<Value>, set: F) -> Pattern<VoiceData>
where
    F: Fn(&mut VoiceData, Value) + Send + Sync + 'static,
{
    values.fmap(move |v| {
        let mut data = VoiceData::default();
        set(&mut data, v);
        data
    })
}

/// Lift a raw value pattern into voices via the `sound` field, honouring
/// the `name:index` convention.
pub fn sound_of(values: Pattern<Value>) -> Pattern<VoiceData> {
    ctrl_value(values, |data, v| {
        let text = v.to_string();
        match text.split_once(':') {
            Some((name, index)) => {
                data.sound = Some(name.to_string());
                match index.parse::<i64>() {
                    Ok(i) => data.sound_index = Some(i),
                    Err(_) => {
                        tracing::warn!(sound = %text, "sound index is not an integer");
                    }
                }
            }
            None => data.sound = Some(text),
        }
        data.value = Some(v);
    })
}

/// Lift a raw value pattern into voices via the `note` field.
pub fn note_of(values: Pattern<Value>) -> Pattern<VoiceData> {
    ctrl_value(values, |data, v| {
        data.note = Some(v.clone());
        data.value = Some(v);
    })
}

/// Lift a raw value pattern into bare voices, keeping only `value`.
pub fn value_of(values: Pattern<Value>) -> Pattern<VoiceData> {
    ctrl_value(values, |data, v| data.value = Some(v))
}

impl Pattern<VoiceData> {
    /// Apply a control pattern: structure comes from the base; for every
    /// base/control intersection the payloads merge, control side
    /// winning. Continuous controls get sampled at the base part's begin.
    pub fn apply(self, ctrl: Pattern<VoiceData>) -> Pattern<VoiceData> {
        let base = self;
        Pattern::new(move |state: &State| {
            let mut out = Vec::new();
            for b in base.query(state) {
                for c in ctrl.query(&state.set_span(b.part)) {
                    let Some(part) = b.part.intersection(&c.part) else {
                        continue;
                    };
                    out.push(Hap::new(b.whole, part, b.value.merge(&c.value)));
                }
            }
            out
        })
    }

    /// Merge with a control pattern where both sides keep a say in the
    /// timing: parts and wholes intersect, unlike `apply`, which keeps
    /// the base's whole. Payloads merge the same way, control side
    /// winning.
    pub fn mix(self, ctrl: Pattern<VoiceData>) -> Pattern<VoiceData> {
        self.fmap(move |base| (base, ctrl.clone()))
            .mix_join(|base, ctrl| base.merge(ctrl))
    }

    fn set_f64<F>(self, values: impl Into<Pattern<f64>>, set: F) -> Pattern<VoiceData>
    where
        F: Fn(&mut VoiceData, f64) + Send + Sync + 'static,
    {
        self.apply(ctrl_f64(values.into(), set))
    }

    pub fn pan(self, v: impl Into<Pattern<f64>>) -> Pattern<VoiceData> {
        self.set_f64(v, |d, x| d.pan = Some(x))
    }

    pub fn gain(self, v: impl Into<Pattern<f64>>) -> Pattern<VoiceData> {
        self.set_f64(v, |d, x| d.gain = Some(x))
    }

    pub fn velocity(self, v: impl Into<Pattern<f64>>) -> Pattern<VoiceData> {
        self.set_f64(v, |d, x| d.velocity = Some(x))
    }

    pub fn freq_hz(self, v: impl Into<Pattern<f64>>) -> Pattern<VoiceData> {
        self.set_f64(v, |d, x| d.freq_hz = Some(x))
    }

    pub fn attack(self, v: impl Into<Pattern<f64>>) -> Pattern<VoiceData> {
        self.set_f64(v, |d, x| d.attack = Some(x))
    }

    pub fn decay(self, v: impl Into<Pattern<f64>>) -> Pattern<VoiceData> {
        self.set_f64(v, |d, x| d.decay = Some(x))
    }

    pub fn sustain(self, v: impl Into<Pattern<f64>>) -> Pattern<VoiceData> {
        self.set_f64(v, |d, x| d.sustain = Some(x))
    }

    pub fn release(self, v: impl Into<Pattern<f64>>) -> Pattern<VoiceData> {
        self.set_f64(v, |d, x| d.release = Some(x))
    }

    pub fn lpf(self, v: impl Into<Pattern<f64>>) -> Pattern<VoiceData> {
        self.set_f64(v, |d, x| d.cutoff = Some(x))
    }

    pub fn hpf(self, v: impl Into<Pattern<f64>>) -> Pattern<VoiceData> {
        self.set_f64(v, |d, x| d.hcutoff = Some(x))
    }

    pub fn bpf(self, v: impl Into<Pattern<f64>>) -> Pattern<VoiceData> {
        self.set_f64(v, |d, x| d.bandf = Some(x))
    }

    pub fn notchf(self, v: impl Into<Pattern<f64>>) -> Pattern<VoiceData> {
        self.set_f64(v, |d, x| d.notchf = Some(x))
    }

    pub fn resonance(self, v: impl Into<Pattern<f64>>) -> Pattern<VoiceData> {
        self.set_f64(v, |d, x| d.resonance = Some(x))
    }

    pub fn room(self, v: impl Into<Pattern<f64>>) -> Pattern<VoiceData> {
        self.set_f64(v, |d, x| d.room = Some(x))
    }

    pub fn size(self, v: impl Into<Pattern<f64>>) -> Pattern<VoiceData> {
        self.set_f64(v, |d, x| d.size = Some(x))
    }

    pub fn delay(self, v: impl Into<Pattern<f64>>) -> Pattern<VoiceData> {
        self.set_f64(v, |d, x| d.delay = Some(x))
    }

    pub fn delay_time(self, v: impl Into<Pattern<f64>>) -> Pattern<VoiceData> {
        self.set_f64(v, |d, x| d.delay_time = Some(x))
    }

    pub fn delay_feedback(self, v: impl Into<Pattern<f64>>) -> Pattern<VoiceData> {
        self.set_f64(v, |d, x| d.delay_feedback = Some(x))
    }

    pub fn distort(self, v: impl Into<Pattern<f64>>) -> Pattern<VoiceData> {
        self.set_f64(v, |d, x| d.distort = Some(x))
    }

    pub fn shape(self, v: impl Into<Pattern<f64>>) -> Pattern<VoiceData> {
        self.set_f64(v, |d, x| d.shape = Some(x))
    }

    pub fn crush(self, v: impl Into<Pattern<f64>>) -> Pattern<VoiceData> {
        self.set_f64(v, |d, x| d.crush = Some(x))
    }

    pub fn vib(self, v: impl Into<Pattern<f64>>) -> Pattern<VoiceData> {
        self.set_f64(v, |d, x| d.vib = Some(x))
    }

    pub fn vib_mod(self, v: impl Into<Pattern<f64>>) -> Pattern<VoiceData> {
        self.set_f64(v, |d, x| d.vib_mod = Some(x))
    }

    pub fn duck(self, v: impl Into<Pattern<f64>>) -> Pattern<VoiceData> {
        self.set_f64(v, |d, x| d.duck = Some(x))
    }

    pub fn duck_attack(self, v: impl Into<Pattern<f64>>) -> Pattern<VoiceData> {
        self.set_f64(v, |d, x| d.duck_attack = Some(x))
    }

    pub fn legato(self, v: impl Into<Pattern<f64>>) -> Pattern<VoiceData> {
        self.set_f64(v, |d, x| d.legato = Some(x))
    }

    pub fn accelerate(self, v: impl Into<Pattern<f64>>) -> Pattern<VoiceData> {
        self.set_f64(v, |d, x| d.accelerate = Some(x))
    }

    pub fn orbit(self, v: impl Into<Pattern<f64>>) -> Pattern<VoiceData> {
        self.set_f64(v, |d, x| d.orbit = Some(x.floor() as i64))
    }

    pub fn vowel_name(self, name: impl Into<String>) -> Pattern<VoiceData> {
        let name = name.into();
        self.apply(ctrl_value(crate::pattern::pure(Value::from(name)), |d, v| {
            d.vowel = Some(v.to_string())
        }))
    }

    pub fn scale_name(self, name: impl Into<String>) -> Pattern<VoiceData> {
        let name = name.into();
        self.apply(ctrl_value(crate::pattern::pure(Value::from(name)), |d, v| {
            d.scale = Some(v.to_string())
        }))
    }

    pub fn chord_name(self, name: impl Into<String>) -> Pattern<VoiceData> {
        let name = name.into();
        self.apply(ctrl_value(crate::pattern::pure(Value::from(name)), |d, v| {
            d.chord = Some(v.to_string())
        }))
    }

    pub fn bank(self, name: impl Into<String>) -> Pattern<VoiceData> {
        let name = name.into();
        self.apply(ctrl_value(crate::pattern::pure(Value::from(name)), |d, v| {
            d.bank = Some(v.to_string())
        }))
    }

    /// Stereo split: the plain pattern hard left, a transformed copy hard
    /// right.
    pub fn jux<F>(self, func: F) -> Pattern<VoiceData>
    where
        F: FnOnce(Pattern<VoiceData>) -> Pattern<VoiceData>,
    {
        let left = self.clone().pan(0.0);
        let right = func(self).pan(1.0);
        stack(vec![left, right])
    }

    /// `jux` narrowed to a width around the centre.
    pub fn jux_by<F>(self, width: f64, func: F) -> Pattern<VoiceData>
    where
        F: FnOnce(Pattern<VoiceData>) -> Pattern<VoiceData>,
    {
        let left = self.clone().pan(0.5 - width / 2.0);
        let right = func(self).pan(0.5 + width / 2.0);
        stack(vec![left, right])
    }
}
