//! The tool table: one cutter per slot.
//!
//! Row format, whitespace separated:
//!
//! ```text
//! slot tool_id length diameter [flute_len neck_diam reach_len shank_diam]
//! ```
//!
//! `tool_id` is 1 for a cylindrical cutter, 2 for a ball-nose. Optional
//! columns may be absent or `NaN`. Out-of-range rows are skipped with a
//! warning; loading continues.

use std::path::Path;

use swarf_volume::Cutter;

use crate::lexer::LineLexer;
use crate::Result;

/// Highest accepted slot number.
const MAX_TOOL_SLOT: usize = 64;

const TOOL_ID_CYLINDER: i64 = 1;
const TOOL_ID_BALL: i64 = 2;

/// Cutters indexed by slot number.
#[derive(Debug, Clone, Default)]
pub struct ToolTable {
    slots: Vec<Option<Cutter>>,
}

impl ToolTable {
    /// Read a tool table file. Returns the table and the number of rows
    /// accepted.
    pub fn read_file(path: &Path) -> Result<(Self, usize)> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::parse(&text))
    }

    /// Parse tool table text.
    pub fn parse(text: &str) -> (Self, usize) {
        let mut table = Self::default();
        let mut accepted = 0usize;
        for (lineno, line) in text.lines().enumerate() {
            let lex = LineLexer::new(line);
            if lex.is_empty() {
                continue;
            }
            match parse_row(&lex) {
                Some((slot, cutter)) => {
                    if table.slots.len() <= slot {
                        table.slots.resize(slot + 1, None);
                    }
                    log::info!(
                        "tool slot {slot}: {:?} len {} diam {}",
                        cutter.kind,
                        cutter.overall_length(),
                        cutter.radius * 2.0
                    );
                    table.slots[slot] = Some(cutter);
                    accepted += 1;
                }
                None => {
                    log::warn!("tool table: skipping line {}: {line}", lineno + 1);
                }
            }
        }
        (table, accepted)
    }

    /// The cutter in a slot, if any.
    pub fn get(&self, slot: usize) -> Option<&Cutter> {
        self.slots.get(slot).and_then(|c| c.as_ref())
    }

    /// Number of filled slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|c| c.is_some()).count()
    }

    /// True if no slot is filled.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply the machine's holder geometry to every cutter.
    pub fn set_holder(&mut self, radius: f64, length: f64) {
        for cutter in self.slots.iter_mut().flatten() {
            cutter.set_holder(radius, length);
        }
    }
}

fn parse_row(lex: &LineLexer) -> Option<(usize, Cutter)> {
    let slot = lex.token_i64(0)?;
    if slot <= 0 || slot as usize >= MAX_TOOL_SLOT {
        return None;
    }
    let tool_id = lex.token_i64(1)?;
    let length = lex.token_f64(2)?;
    let diameter = lex.token_f64(3)?;
    if length <= 0.0 || diameter <= 0.0 {
        return None;
    }
    let mut cutter = match tool_id {
        TOOL_ID_CYLINDER => Cutter::cylinder(length, diameter),
        TOOL_ID_BALL => Cutter::ball(length, diameter),
        _ => return None,
    };
    // optional columns, NaN or missing meaning "use the default"
    let opt = |idx: usize| lex.token_f64(idx).filter(|v| v.is_finite());
    if let Some(flute) = opt(4).filter(|&v| v > 0.0 && v <= length) {
        cutter.set_flute_length(flute);
    }
    if let Some(neck) = opt(5).filter(|&v| v > 0.0 && v <= diameter) {
        cutter.set_neck_diameter(neck);
    }
    if let Some(reach) = opt(6).filter(|&v| v > 0.0 && v <= length) {
        cutter.set_reach_length(reach);
    }
    if let Some(shank) = opt(7).filter(|&v| v > 0.0) {
        cutter.set_shank_diameter(shank);
    }
    Some((slot as usize, cutter))
}
