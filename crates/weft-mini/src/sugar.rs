//! String-friendly pattern construction.
//!
//! Anywhere a pattern is expected, a notation string, a number, or an
//! existing pattern will do: `IntoPattern` converts all three. The named
//! control constructors lift notation strings straight into voice
//! patterns (`sound("bd sd")`, `note("c e g")`, `lpf("1000 500")`).

use crate::evaluator;
use weft_core::{ctrl_f64, ctrl_value, note_of, silence, sound_of, Pattern, Value, VoiceData};

/// Conversion into a raw value pattern: strings parse as notation,
/// numbers lift to one event per cycle, patterns pass through.
pub trait IntoPattern {
    fn into_pattern(self) -> Pattern<Value>;
}

impl IntoPattern for Pattern<Value> {
    fn into_pattern(self) -> Pattern<Value> {
        self
    }
}

impl IntoPattern for &str {
    fn into_pattern(self) -> Pattern<Value> {
        match evaluator::pattern(self) {
            Ok(pattern) => pattern,
            Err(err) => {
                tracing::warn!(%err, source = self, "notation failed to parse, yielding silence");
                silence()
            }
        }
    }
}

impl IntoPattern for String {
    fn into_pattern(self) -> Pattern<Value> {
        self.as_str().into_pattern()
    }
}

impl IntoPattern for f64 {
    fn into_pattern(self) -> Pattern<Value> {
        weft_core::pure(Value::Number(self))
    }
}

impl IntoPattern for i64 {
    fn into_pattern(self) -> Pattern<Value> {
        weft_core::pure(Value::Number(self as f64))
    }
}

impl IntoPattern for Value {
    fn into_pattern(self) -> Pattern<Value> {
        weft_core::pure(self)
    }
}

/// A numeric pattern from anything patternable; non-numeric events are
/// dropped with a diagnostic.
pub fn num(p: impl IntoPattern) -> Pattern<f64> {
    p.into_pattern().numbers()
}

/// A boolean mask pattern: `t`/`f`, ones and zeroes, rests. Feeds
/// `struct_with` and `mask`.
pub fn bools(p: impl IntoPattern) -> Pattern<bool> {
    p.into_pattern().fmap(|v| v.is_truthy())
}

/// Sounds, with `name:index` support.
pub fn sound(p: impl IntoPattern) -> Pattern<VoiceData> {
    sound_of(p.into_pattern())
}

/// Short alias for `sound`.
pub fn s(p: impl IntoPattern) -> Pattern<VoiceData> {
    sound(p)
}

/// Notes, kept verbatim for the music-theory layer to interpret.
pub fn note(p: impl IntoPattern) -> Pattern<VoiceData> {
    note_of(p.into_pattern())
}

/// Sample/voice index numbers.
pub fn n(p: impl IntoPattern) -> Pattern<VoiceData> {
    ctrl_f64(num(p), |d, x| d.sound_index = Some(x.floor() as i64))
}

/// The raw value field, no reinterpretation.
pub fn value(p: impl IntoPattern) -> Pattern<VoiceData> {
    weft_core::value_of(p.into_pattern())
}

fn string_ctrl(
    p: impl IntoPattern,
    set: impl Fn(&mut VoiceData, String) + Send + Sync + 'static,
) -> Pattern<VoiceData> {
    ctrl_value(p.into_pattern(), move |d, v| set(d, v.to_string()))
}

macro_rules! f64_controls {
    ($($(#[$doc:meta])* $name:ident => $field:ident),* $(,)?) => {
        $(
            $(#[$doc])*
            pub fn $name(p: impl IntoPattern) -> Pattern<VoiceData> {
                ctrl_f64(num(p), |d, x| d.$field = Some(x))
            }
        )*
    };
}

f64_controls! {
    /// Oscillator frequency in hertz.
    freq => freq_hz,
    /// Stereo position, 0 left to 1 right.
    pan => pan,
    gain => gain,
    velocity => velocity,
    attack => attack,
    decay => decay,
    sustain => sustain,
    release => release,
    /// Low-pass cutoff; also records a declarative filter stage.
    lpf => cutoff,
    hpf => hcutoff,
    bpf => bandf,
    notchf => notchf,
    resonance => resonance,
    lpenv => lp_env,
    lpattack => lp_attack,
    lpdecay => lp_decay,
    lpsustain => lp_sustain,
    lprelease => lp_release,
    hpenv => hp_env,
    hpattack => hp_attack,
    hpdecay => hp_decay,
    hpsustain => hp_sustain,
    hprelease => hp_release,
    bpenv => bp_env,
    bpattack => bp_attack,
    bpdecay => bp_decay,
    bpsustain => bp_sustain,
    bprelease => bp_release,
    room => room,
    size => size,
    delay => delay,
    delaytime => delay_time,
    delayfeedback => delay_feedback,
    distort => distort,
    shape => shape,
    crush => crush,
    vib => vib,
    vibmod => vib_mod,
    duck => duck,
    duckattack => duck_attack,
    legato => legato,
    accelerate => accelerate,
}

pub fn orbit(p: impl IntoPattern) -> Pattern<VoiceData> {
    ctrl_f64(num(p), |d, x| d.orbit = Some(x.floor() as i64))
}

pub fn vowel(p: impl IntoPattern) -> Pattern<VoiceData> {
    string_ctrl(p, |d, v| d.vowel = Some(v))
}

pub fn scale(p: impl IntoPattern) -> Pattern<VoiceData> {
    string_ctrl(p, |d, v| d.scale = Some(v))
}

pub fn chord(p: impl IntoPattern) -> Pattern<VoiceData> {
    string_ctrl(p, |d, v| d.chord = Some(v))
}

pub fn voicing(p: impl IntoPattern) -> Pattern<VoiceData> {
    string_ctrl(p, |d, v| d.voicing = Some(v))
}

pub fn bank(p: impl IntoPattern) -> Pattern<VoiceData> {
    string_ctrl(p, |d, v| d.bank = Some(v))
}

/// Look a control constructor up by its notation-level name. The script
/// evaluator resolves method names through this table.
pub fn control_by_name(name: &str, p: Pattern<Value>) -> Option<Pattern<VoiceData>> {
    let ctrl = match name {
        "sound" | "s" => sound(p),
        "note" => note(p),
        "n" => n(p),
        "value" => value(p),
        "freq" => freq(p),
        "pan" => pan(p),
        "gain" => gain(p),
        "velocity" => velocity(p),
        "attack" => attack(p),
        "decay" => decay(p),
        "sustain" => sustain(p),
        "release" => release(p),
        "lpf" | "cutoff" => lpf(p),
        "hpf" => hpf(p),
        "bpf" => bpf(p),
        "notchf" => notchf(p),
        "resonance" => resonance(p),
        "lpenv" => lpenv(p),
        "lpattack" => lpattack(p),
        "lpdecay" => lpdecay(p),
        "lpsustain" => lpsustain(p),
        "lprelease" => lprelease(p),
        "hpenv" => hpenv(p),
        "hpattack" => hpattack(p),
        "hpdecay" => hpdecay(p),
        "hpsustain" => hpsustain(p),
        "hprelease" => hprelease(p),
        "bpenv" => bpenv(p),
        "bpattack" => bpattack(p),
        "bpdecay" => bpdecay(p),
        "bpsustain" => bpsustain(p),
        "bprelease" => bprelease(p),
        "room" => room(p),
        "size" => size(p),
        "delay" => delay(p),
        "delaytime" => delaytime(p),
        "delayfeedback" => delayfeedback(p),
        "distort" => distort(p),
        "shape" => shape(p),
        "crush" => crush(p),
        "vib" => vib(p),
        "vibmod" => vibmod(p),
        "duck" => duck(p),
        "duckattack" => duckattack(p),
        "orbit" => orbit(p),
        "vowel" => vowel(p),
        "scale" => scale(p),
        "chord" => chord(p),
        "voicing" => voicing(p),
        "bank" => bank(p),
        "legato" => legato(p),
        "accelerate" => accelerate(p),
        _ => return None,
    };
    Some(ctrl)
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::Fraction;

    #[test]
    fn strings_parse_into_patterns() {
        let p = "bd sd".into_pattern();
        assert_eq!(p.first_cycle().len(), 2);
    }

    #[test]
    fn bad_strings_become_silence() {
        let p = "bd [sd".into_pattern();
        assert!(p.first_cycle().is_empty());
    }

    #[test]
    fn numbers_lift_to_pure() {
        let p = 3.5.into_pattern();
        let haps = p.first_cycle();
        assert_eq!(haps.len(), 1);
        assert_eq!(haps[0].value, Value::Number(3.5));
    }

    #[test]
    fn sound_parses_indices() {
        let haps = sound("bd:2 sd").first_cycle();
        assert_eq!(haps[0].value.sound, Some("bd".into()));
        assert_eq!(haps[0].value.sound_index, Some(2));
        assert_eq!(haps[1].value.sound, Some("sd".into()));
        assert_eq!(haps[1].value.sound_index, None);
    }

    #[test]
    fn numeric_controls_read_strings() {
        let haps = lpf("1000 500").first_cycle();
        assert_eq!(haps.len(), 2);
        assert_eq!(haps[0].value.cutoff, Some(1000.0));
        assert_eq!(haps[1].value.cutoff, Some(500.0));
        assert_eq!(haps[1].part.begin, Fraction::new(1, 2));
    }

    #[test]
    fn value_reinterpretation() {
        // A bare value pattern re-read as velocities.
        let haps = velocity("0 1").first_cycle();
        assert_eq!(haps[0].value.velocity, Some(0.0));
        assert_eq!(haps[1].value.velocity, Some(1.0));
    }

    #[test]
    fn control_table_resolves() {
        assert!(control_by_name("delay", "0.5".into_pattern()).is_some());
        assert!(control_by_name("nosuch", "0.5".into_pattern()).is_none());
    }

    #[test]
    fn bool_masks_structure_a_pattern() {
        let p = sound("bd*4").struct_with(bools("t f t t"));
        assert_eq!(p.first_cycle().len(), 3);
    }
}
