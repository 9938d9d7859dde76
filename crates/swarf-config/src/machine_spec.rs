//! The machine-spec file: axis limits, feeds, spindle power and holder
//! geometry. Angles are degrees in the file and radians in the envelope.

use std::path::Path;

use swarf_machine::MachineEnvelope;

use crate::lexer::LineLexer;
use crate::Result;

/// Parse a machine-spec file over a default envelope. Returns the
/// envelope and the number of skipped erroneous lines.
pub fn parse_machine_spec(path: &Path) -> Result<(MachineEnvelope, usize)> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse(&text))
}

/// Parse machine-spec text.
pub fn parse(text: &str) -> (MachineEnvelope, usize) {
    let mut env = MachineEnvelope::default();
    let mut errors = 0usize;
    for (lineno, line) in text.lines().enumerate() {
        let lex = LineLexer::new(line);
        if lex.is_empty() {
            continue;
        }
        let lineno = lineno + 1;
        let Some(word) = lex.token(0) else { continue };
        let value = lex.token_f64(1);
        let bad = || {
            log::warn!("machine spec: error at line {lineno}: {line}");
            1
        };
        match word {
            "MAX_X_LIMIT" => match value {
                Some(v) => env.max_x_limit = v,
                None => errors += bad(),
            },
            "MIN_X_LIMIT" => match value {
                Some(v) => env.min_x_limit = v,
                None => errors += bad(),
            },
            "MAX_Y_LIMIT" => match value {
                Some(v) => env.max_y_limit = v,
                None => errors += bad(),
            },
            "MIN_Y_LIMIT" => match value {
                Some(v) => env.min_y_limit = v,
                None => errors += bad(),
            },
            "MAX_Z_LIMIT" => match value {
                Some(v) => env.max_z_limit = v,
                None => errors += bad(),
            },
            "MIN_Z_LIMIT" => match value {
                Some(v) => env.min_z_limit = v,
                None => errors += bad(),
            },
            "MAX_A_LIMIT" => match value {
                Some(v) => env.max_a_limit = Some(v.to_radians()),
                None => errors += bad(),
            },
            "MIN_A_LIMIT" => match value {
                Some(v) => env.min_a_limit = Some(v.to_radians()),
                None => errors += bad(),
            },
            "MAX_B_LIMIT" => match value {
                Some(v) => env.max_b_limit = Some(v.to_radians()),
                None => errors += bad(),
            },
            "MIN_B_LIMIT" => match value {
                Some(v) => env.min_b_limit = Some(v.to_radians()),
                None => errors += bad(),
            },
            "MAX_C_LIMIT" => match value {
                Some(v) => env.max_c_limit = Some(v.to_radians()),
                None => errors += bad(),
            },
            "MIN_C_LIMIT" => match value {
                Some(v) => env.min_c_limit = Some(v.to_radians()),
                None => errors += bad(),
            },
            "MAX_FEED_RATE" => match value {
                Some(v) if v > 0.0 => env.max_feed_rate = v,
                _ => errors += bad(),
            },
            "TRAVERSE_FEED_RATE" => match value {
                Some(v) if v > 0.0 => env.traverse_feed_rate = v,
                _ => errors += bad(),
            },
            "MAX_SPINDLE_POWER" => match value {
                Some(v) if v > 0.0 => env.max_spindle_power = v,
                _ => errors += bad(),
            },
            "HOLDER_RADIUS" => match value {
                Some(v) if v > 0.0 => env.holder_radius = v,
                _ => errors += bad(),
            },
            "HOLDER_LENGTH" => match value {
                Some(v) if v > 0.0 => env.holder_length = v,
                _ => errors += bad(),
            },
            "SPINDLE_RADIUS" => match value {
                Some(v) if v > 0.0 => env.spindle_radius = v,
                _ => errors += bad(),
            },
            "SPINDLE_LENGTH" => match value {
                Some(v) if v > 0.0 => env.spindle_length = v,
                _ => errors += bad(),
            },
            "SCENE_RADIUS" => match value {
                Some(v) if v > 0.0 => env.scene_radius = v,
                _ => errors += bad(),
            },
            _ => log::debug!("machine spec: ignoring line {lineno}: {line}"),
        }
    }
    (env, errors)
}
