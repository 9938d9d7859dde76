//! Parsing of the interpreter's canonical command stream.
//!
//! One canonical line looks like
//!
//! ```text
//! 231 N2250 ARC_FEED(3.5884, 1.9116, 3.5000, 2.0000, -1, 1.8437, 0.0000, 0.0000, 0.0000)
//! ```
//!
//! The first token is the interpreter's sequence number, the second the
//! source-program line word, then the command with its arguments. Angles
//! arrive in degrees and are converted to radians here, at the boundary.

use swarf_math::Vec3;

use crate::motion::{HelicalMotion, Motion, StraightMotion};
use crate::status::{MachineStatus, Plane, SpindleStatus};
use crate::{MotionError, Result};

/// One parsed canonical command with the machine status after executing
/// it.
#[derive(Debug, Clone)]
pub struct CanonicalLine {
    /// Interpreter sequence number.
    pub seq: usize,
    /// The verbatim canonical line, kept for warning attribution.
    pub tag: String,
    /// Machine status after this command.
    pub status: MachineStatus,
    /// The motion, for motion commands.
    pub motion: Option<Motion>,
    /// True for PROGRAM_END / PROGRAM_STOP.
    pub program_end: bool,
}

impl CanonicalLine {
    /// True if this line moves the tool.
    pub fn is_motion(&self) -> bool {
        self.motion.is_some()
    }
}

fn tokenize(text: &str) -> Vec<&str> {
    text.split(|c: char| c == '(' || c == ')' || c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect()
}

fn arg(tokens: &[&str], idx: usize, line: usize) -> Result<f64> {
    tokens
        .get(idx)
        .and_then(|t| t.parse::<f64>().ok())
        .ok_or_else(|| MotionError::Malformed {
            line,
            reason: format!("missing or non-numeric argument {}", idx - 2),
        })
}

fn opt_arg(tokens: &[&str], idx: usize) -> f64 {
    tokens
        .get(idx)
        .and_then(|t| t.parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// Parse one canonical line against the status left by the previous one.
pub fn parse_canon_line(
    text: &str,
    line_no: usize,
    prev: &MachineStatus,
) -> Result<CanonicalLine> {
    let tokens = tokenize(text);
    if tokens.len() < 3 {
        return Err(MotionError::Malformed {
            line: line_no,
            reason: "expected sequence number, line word and command".into(),
        });
    }
    let seq = tokens[0].parse::<usize>().map_err(|_| MotionError::Malformed {
        line: line_no,
        reason: format!("bad sequence number {:?}", tokens[0]),
    })?;
    let command = tokens[2];
    let mut status = prev.advance();
    let mut motion = None;
    let mut program_end = false;

    match command {
        "STRAIGHT_FEED" | "STRAIGHT_TRAVERSE" => {
            let x = arg(&tokens, 3, line_no)?;
            let y = arg(&tokens, 4, line_no)?;
            let z = arg(&tokens, 5, line_no)?;
            let a = opt_arg(&tokens, 6).to_radians();
            let b = opt_arg(&tokens, 7).to_radians();
            let c = opt_arg(&tokens, 8).to_radians();
            status.end_pose.loc = Vec3::new(x, y, z);
            status.end_pose.dir = Vec3::new(a, b, c);
            let traverse = command == "STRAIGHT_TRAVERSE";
            motion = Some(Motion::Straight(StraightMotion::from_status(
                &status, traverse,
            )));
        }
        "ARC_FEED" => {
            let x1 = arg(&tokens, 3, line_no)?;
            let y1 = arg(&tokens, 4, line_no)?;
            let cx = arg(&tokens, 5, line_no)?;
            let cy = arg(&tokens, 6, line_no)?;
            let rot = arg(&tokens, 7, line_no)? as i32;
            let z1 = arg(&tokens, 8, line_no)?;
            let a = opt_arg(&tokens, 9).to_radians();
            let b = opt_arg(&tokens, 10).to_radians();
            let c = opt_arg(&tokens, 11).to_radians();
            if rot == 0 {
                return Err(MotionError::Malformed {
                    line: line_no,
                    reason: "arc rotation count must be nonzero".into(),
                });
            }
            motion = Some(Motion::Helical(HelicalMotion::from_arc(
                x1,
                y1,
                cx,
                cy,
                rot,
                z1,
                Vec3::new(a, b, c),
                &mut status,
            )));
        }
        "STOP_SPINDLE_TURNING" => status.spindle = SpindleStatus::Off,
        "START_SPINDLE_CLOCKWISE" => status.spindle = SpindleStatus::Cw,
        "START_SPINDLE_COUNTERCLOCKWISE" => status.spindle = SpindleStatus::Ccw,
        "ORIENT_SPINDLE" | "SPINDLE_RETRACT" => status.spindle = SpindleStatus::Brake,
        "SET_SPINDLE_SPEED" => status.spindle_speed = arg(&tokens, 3, line_no)?,
        "SET_FEED_RATE" => status.feed = arg(&tokens, 3, line_no)?,
        "MIST_ON" => status.coolant.mist = true,
        "MIST_OFF" => status.coolant.mist = false,
        "FLOOD_ON" => status.coolant.flood = true,
        "FLOOD_OFF" => status.coolant.flood = false,
        "CHANGE_TOOL" => status.tool = arg(&tokens, 3, line_no)? as usize,
        "SELECT_PLANE" => {
            status.plane = match tokens.get(3).copied() {
                Some("CANON_PLANE_XY") => Plane::Xy,
                Some("CANON_PLANE_YZ") => Plane::Yz,
                Some("CANON_PLANE_XZ") => Plane::Xz,
                other => {
                    return Err(MotionError::Malformed {
                        line: line_no,
                        reason: format!("unknown plane {:?}", other),
                    })
                }
            };
        }
        "PROGRAM_END" | "PROGRAM_STOP" => program_end = true,
        // state we deliberately do not model
        "COMMENT" | "MESSAGE" | "DWELL" | "SELECT_TOOL" | "USE_TOOL_LENGTH_OFFSET"
        | "USE_LENGTH_UNITS" | "SET_FEED_MODE" | "SET_SPINDLE_MODE" | "SET_FEED_REFERENCE"
        | "ENABLE_FEED_OVERRIDE" | "ENABLE_SPEED_OVERRIDE" | "PALLET_SHUTTLE"
        | "SET_MOTION_CONTROL_MODE" | "SET_NAIVECAM_TOLERANCE" | "SET_XY_ROTATION"
        | "SET_ORIGIN_OFFSETS" | "SET_G5X_OFFSET" | "SET_G92_OFFSET" => {}
        other => {
            log::warn!("no match for canonical command {other:?} at line {line_no}");
        }
    }

    Ok(CanonicalLine {
        seq,
        tag: text.trim().to_string(),
        status,
        motion,
        program_end,
    })
}

/// Parse a whole canonical stream. The program must be terminated by
/// PROGRAM_END; lines after it are ignored.
pub fn parse_canon_lines<I, S>(lines: I, initial: MachineStatus) -> Result<Vec<CanonicalLine>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<CanonicalLine> = Vec::new();
    let mut status = initial;
    for (i, line) in lines.into_iter().enumerate() {
        let text = line.as_ref();
        if text.trim().is_empty() {
            continue;
        }
        let parsed = parse_canon_line(text, i + 1, &status)?;
        status = parsed.status.clone();
        let done = parsed.program_end;
        out.push(parsed);
        if done {
            return Ok(out);
        }
    }
    Err(MotionError::Unterminated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Pose;

    fn initial() -> MachineStatus {
        MachineStatus::default()
    }

    #[test]
    fn test_parse_straight_feed() {
        let line = parse_canon_line(
            "12 N100 STRAIGHT_FEED(1.0, 2.0, -0.5, 0.0, 0.0, 0.0)",
            1,
            &initial(),
        )
        .unwrap();
        assert_eq!(line.seq, 12);
        assert!(line.is_motion());
        assert_eq!(line.status.end_pose.loc, Vec3::new(1.0, 2.0, -0.5));
        let m = line.motion.unwrap();
        assert!((m.length() - (1.0f64 + 4.0 + 0.25).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_parse_traverse_flag() {
        let line = parse_canon_line("1 N1 STRAIGHT_TRAVERSE(5, 0, 0, 0, 0, 0)", 1, &initial())
            .unwrap();
        let m = line.motion.unwrap();
        assert!(m.kind_flag().intersects(crate::MotionFlags::TRAVERSE));
    }

    #[test]
    fn test_parse_arc_feed() {
        // quarter circle from (1,0) about the origin
        let mut prev = initial();
        prev.end_pose = Pose::new(Vec3::new(1.0, 0.0, 0.0), Vec3::zeros());
        let line = parse_canon_line(
            "7 N70 ARC_FEED(0.0, 1.0, 0.0, 0.0, 1, 0.0, 0.0, 0.0, 0.0)",
            1,
            &prev,
        )
        .unwrap();
        let m = line.motion.unwrap();
        assert!((m.length() - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
    }

    #[test]
    fn test_status_threads_through_motionless() {
        let mut status = initial();
        for (i, text) in [
            "1 N1 SET_FEED_RATE(300.0)",
            "2 N2 SET_SPINDLE_SPEED(8000.0)",
            "3 N3 START_SPINDLE_CLOCKWISE()",
            "4 N4 FLOOD_ON()",
            "5 N5 SELECT_PLANE(CANON_PLANE_XZ)",
        ]
        .iter()
        .enumerate()
        {
            let line = parse_canon_line(text, i + 1, &status).unwrap();
            assert!(!line.is_motion());
            status = line.status;
        }
        assert_eq!(status.feed, 300.0);
        assert_eq!(status.spindle_speed, 8000.0);
        assert_eq!(status.spindle, SpindleStatus::Cw);
        assert!(status.coolant.flood);
        assert_eq!(status.plane, Plane::Xz);
    }

    #[test]
    fn test_angles_converted_to_radians() {
        let line = parse_canon_line(
            "1 N1 STRAIGHT_FEED(0, 0, 0, 90.0, 0.0, -180.0)",
            1,
            &initial(),
        )
        .unwrap();
        let dir = line.status.end_pose.dir;
        assert!((dir.x - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert!((dir.z + std::f64::consts::PI).abs() < 1e-12);
    }

    #[test]
    fn test_malformed_lines_rejected() {
        assert!(parse_canon_line("junk", 1, &initial()).is_err());
        assert!(parse_canon_line("1 N1 STRAIGHT_FEED(1.0)", 1, &initial()).is_err());
        assert!(parse_canon_line("x N1 STRAIGHT_FEED(1,2,3)", 1, &initial()).is_err());
        assert!(
            parse_canon_line("1 N1 ARC_FEED(0, 1, 0, 0, 0, 0)", 1, &initial()).is_err(),
            "zero rotation"
        );
    }

    #[test]
    fn test_parse_program_requires_termination() {
        let ok = parse_canon_lines(
            [
                "1 N1 STRAIGHT_FEED(1, 0, 0, 0, 0, 0)",
                "2 N2 PROGRAM_END()",
            ],
            initial(),
        );
        assert_eq!(ok.unwrap().len(), 2);

        let missing = parse_canon_lines(["1 N1 STRAIGHT_FEED(1, 0, 0, 0, 0, 0)"], initial());
        assert!(matches!(missing, Err(MotionError::Unterminated)));
    }

    #[test]
    fn test_tool_change_updates_slot() {
        let line = parse_canon_line("4 N40 CHANGE_TOOL(3)", 1, &initial()).unwrap();
        assert_eq!(line.status.tool, 3);
    }

    #[test]
    fn test_consecutive_motions_chain_poses() {
        let lines = parse_canon_lines(
            [
                "1 N1 STRAIGHT_FEED(1, 0, 0, 0, 0, 0)",
                "2 N2 STRAIGHT_FEED(1, 1, 0, 0, 0, 0)",
                "3 N3 PROGRAM_END()",
            ],
            initial(),
        )
        .unwrap();
        let m = lines[1].motion.as_ref().unwrap();
        assert!((m.point(0.0) - Vec3::new(1.0, 0.0, 0.0)).norm() < 1e-12);
        assert!((m.point(m.length()) - Vec3::new(1.0, 1.0, 0.0)).norm() < 1e-12);
    }
}
