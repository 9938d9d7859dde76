//! The motion player: samples canonical moves into tool poses, one pose
//! per request.
//!
//! The simulation pulls poses with [`MotionPlayer::request_move`]; the
//! player never runs ahead, which is the back-pressure that keeps exactly
//! one cut in flight. A move of length `L` sampled at step `ds` yields
//! `max(2, ⌈L/ds⌉ + 1)` poses including both endpoints.

use crate::canon::CanonicalLine;
use crate::status::{MotionFlags, Pose};

const DEFAULT_STEP_SIZE: f64 = 1.0;
const DEFAULT_FEED_RATE: f64 = 120.0;
const DEFAULT_TRAVERSE_FEED_RATE: f64 = 1000.0;
const PLUNGE_TOLERANCE: f64 = 1e-6;

/// One sampled tool pose.
#[derive(Debug, Clone)]
pub struct Sample {
    /// World pose of the tool tip.
    pub pose: Pose,
    /// Index of the canonical line that produced this pose.
    pub line: usize,
    /// Interpreter sequence number of that line.
    pub seq: usize,
    /// Verbatim canonical line for warning attribution.
    pub tag: String,
    /// Motion kind, spindle state and plunge direction.
    pub flags: MotionFlags,
    /// Active feed rate.
    pub feed: f64,
}

/// Program progress for the UI surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Percent of canonical lines consumed.
    pub percent: u32,
    /// Current canonical line index.
    pub line: usize,
    /// Machining time estimate so far, seconds scaled by feed units.
    pub elapsed_s: f64,
}

/// What the player produced for one request.
#[derive(Debug, Clone)]
pub enum PlayerStep {
    /// The next sampled pose.
    Sample(Box<Sample>),
    /// The program selected a different tool slot.
    ToolChange(usize),
    /// Not playing (paused or stopped).
    Idle,
    /// The program is finished.
    Finished,
}

/// Steps through a canonical program, emitting poses on demand.
pub struct MotionPlayer {
    lines: Vec<CanonicalLine>,
    current: usize,
    /// Sample index within the current move.
    m: usize,
    n_samples: usize,
    interval: f64,
    move_len: f64,
    move_flags: MotionFlags,
    move_feed: f64,
    playing: bool,
    current_tool: usize,
    inv_ds: f64,
    traverse_feed: f64,
    total_time: f64,
}

impl MotionPlayer {
    /// Create a player over a parsed program.
    pub fn new(lines: Vec<CanonicalLine>) -> Self {
        Self {
            lines,
            current: 0,
            m: 0,
            n_samples: 0,
            interval: 0.0,
            move_len: 0.0,
            move_flags: MotionFlags::NONE,
            move_feed: DEFAULT_FEED_RATE,
            playing: false,
            current_tool: 0,
            inv_ds: 1.0 / DEFAULT_STEP_SIZE,
            traverse_feed: DEFAULT_TRAVERSE_FEED_RATE,
            total_time: 0.0,
        }
    }

    /// Set the sampling step size.
    pub fn set_step_size(&mut self, ds: f64) {
        if ds > 0.0 {
            self.inv_ds = 1.0 / ds;
        }
    }

    /// Set the feed rate assumed for traverse moves in the time estimate.
    pub fn set_traverse_feed_rate(&mut self, rate: f64) {
        if rate > 0.0 {
            self.traverse_feed = rate;
        }
    }

    /// Start or resume playback.
    pub fn play(&mut self) {
        if !self.playing {
            self.playing = true;
            log::debug!("player: play");
        }
    }

    /// Pause after the in-flight sample.
    pub fn pause(&mut self) {
        self.playing = false;
        log::debug!("player: pause");
    }

    /// Stop and rewind to the beginning.
    pub fn stop(&mut self) {
        self.playing = false;
        self.current = 0;
        self.m = 0;
        self.total_time = 0.0;
        log::debug!("player: stop");
    }

    /// True while playback is active.
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// The tool slot currently in the spindle.
    pub fn current_tool(&self) -> usize {
        self.current_tool
    }

    /// Number of canonical lines loaded.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Borrow a canonical line.
    pub fn line(&self, idx: usize) -> Option<&CanonicalLine> {
        self.lines.get(idx)
    }

    /// Current program progress.
    pub fn progress(&self) -> Progress {
        let percent = if self.lines.len() > 1 {
            (100 * self.current.min(self.lines.len() - 1) / (self.lines.len() - 1)) as u32
        } else {
            100
        };
        Progress {
            percent,
            line: self.current.min(self.lines.len().saturating_sub(1)),
            elapsed_s: self.total_time,
        }
    }

    /// Produce the next step: one sampled pose, a tool change, or the
    /// end of the program. Call again only after the previous pose has
    /// been fully processed.
    pub fn request_move(&mut self) -> PlayerStep {
        if !self.playing {
            return PlayerStep::Idle;
        }
        loop {
            let Some(line) = self.lines.get(self.current) else {
                self.playing = false;
                return PlayerStep::Finished;
            };
            if line.program_end {
                self.playing = false;
                return PlayerStep::Finished;
            }
            let Some(motion) = line.motion.as_ref() else {
                // motionless: surface tool changes, swallow the rest
                if line.status.tool != self.current_tool {
                    self.current_tool = line.status.tool;
                    self.current += 1;
                    return PlayerStep::ToolChange(self.current_tool);
                }
                self.current += 1;
                continue;
            };

            if self.m == 0 {
                self.move_len = motion.length();
                // the slack keeps an exact multiple of the step size from
                // rounding up to an extra sample
                let steps = (self.move_len * self.inv_ds - 1e-9).ceil().max(0.0) as usize;
                self.n_samples = (steps + 1).max(2);
                self.interval = self.move_len / (self.n_samples - 1) as f64;
                self.move_feed = if line.status.feed > 0.0 {
                    line.status.feed
                } else {
                    DEFAULT_FEED_RATE
                };
                let dz = motion.point(self.move_len).z - motion.point(0.0).z;
                let plunge = if dz > PLUNGE_TOLERANCE {
                    MotionFlags::PLUNGE_POS
                } else if dz < -PLUNGE_TOLERANCE {
                    MotionFlags::PLUNGE_NEG
                } else {
                    MotionFlags::NONE
                };
                self.move_flags = motion.kind_flag() | MotionFlags::from(line.status.spindle) | plunge;
            }

            let s = self.m as f64 * self.interval;
            let sample = Sample {
                pose: Pose::new(motion.point(s), motion.angles(s)),
                line: self.current,
                seq: line.seq,
                tag: line.tag.clone(),
                flags: self.move_flags,
                feed: self.move_feed,
            };
            self.m += 1;
            if self.m == self.n_samples {
                // move done: book the machining time and advance
                let feed = if self.move_flags.intersects(MotionFlags::TRAVERSE) {
                    self.traverse_feed
                } else {
                    self.move_feed
                };
                self.total_time += self.move_len / feed;
                self.current += 1;
                self.m = 0;
            }
            return PlayerStep::Sample(Box::new(sample));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canon::parse_canon_lines;
    use crate::status::MachineStatus;
    use swarf_math::Vec3;

    fn player(lines: &[&str]) -> MotionPlayer {
        let parsed = parse_canon_lines(lines.iter().copied(), MachineStatus::default()).unwrap();
        MotionPlayer::new(parsed)
    }

    fn drain_samples(p: &mut MotionPlayer) -> Vec<Sample> {
        let mut out = Vec::new();
        loop {
            match p.request_move() {
                PlayerStep::Sample(s) => out.push(*s),
                PlayerStep::ToolChange(_) => {}
                PlayerStep::Idle | PlayerStep::Finished => return out,
            }
        }
    }

    #[test]
    fn test_sample_count_rule() {
        // S3: a 10-unit move at ds = 3 gives ⌈10/3⌉ + 1 = 5 samples
        let mut p = player(&[
            "1 N1 STRAIGHT_FEED(10, 0, 0, 0, 0, 0)",
            "2 N2 PROGRAM_END()",
        ]);
        p.set_step_size(3.0);
        p.play();
        let samples = drain_samples(&mut p);
        assert_eq!(samples.len(), 5);
        assert!((samples[0].pose.loc - Vec3::zeros()).norm() < 1e-12);
        assert!((samples[4].pose.loc - Vec3::new(10.0, 0.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_short_move_still_two_samples() {
        let mut p = player(&[
            "1 N1 STRAIGHT_FEED(0.01, 0, 0, 0, 0, 0)",
            "2 N2 PROGRAM_END()",
        ]);
        p.set_step_size(5.0);
        p.play();
        assert_eq!(drain_samples(&mut p).len(), 2);
    }

    #[test]
    fn test_full_circle_sampling() {
        // spec §8 scenario 5: ds = 2π over a radius-10 circle gives 11
        // samples, last equal to first
        let mut p = player(&[
            "1 N1 STRAIGHT_TRAVERSE(10, 0, 0, 0, 0, 0)",
            "2 N2 ARC_FEED(10.0, 0.0, 0.0, 0.0, 1, 0.0, 0, 0, 0)",
            "3 N3 PROGRAM_END()",
        ]);
        p.set_step_size(2.0 * std::f64::consts::PI);
        p.play();
        let samples = drain_samples(&mut p);
        let circle: Vec<&Sample> = samples.iter().filter(|s| s.line == 1).collect();
        assert_eq!(circle.len(), 11);
        let first = circle.first().unwrap().pose.loc;
        let last = circle.last().unwrap().pose.loc;
        assert!((first - last).norm() < 1e-9);
    }

    #[test]
    fn test_pause_and_resume() {
        let mut p = player(&[
            "1 N1 STRAIGHT_FEED(10, 0, 0, 0, 0, 0)",
            "2 N2 PROGRAM_END()",
        ]);
        p.set_step_size(5.0);
        p.play();
        assert!(matches!(p.request_move(), PlayerStep::Sample(_)));
        p.pause();
        assert!(matches!(p.request_move(), PlayerStep::Idle));
        p.play();
        let rest = drain_samples(&mut p);
        // 3 samples total, one consumed before the pause
        assert_eq!(rest.len(), 2);
    }

    #[test]
    fn test_stop_rewinds() {
        let mut p = player(&[
            "1 N1 STRAIGHT_FEED(10, 0, 0, 0, 0, 0)",
            "2 N2 PROGRAM_END()",
        ]);
        p.set_step_size(5.0);
        p.play();
        let _ = p.request_move();
        let _ = p.request_move();
        p.stop();
        assert_eq!(p.progress().line, 0);
        p.play();
        assert_eq!(drain_samples(&mut p).len(), 3);
    }

    #[test]
    fn test_plunge_flags() {
        let mut p = player(&[
            "1 N1 STRAIGHT_FEED(0, 0, -5, 0, 0, 0)",
            "2 N2 STRAIGHT_FEED(0, 0, 5, 0, 0, 0)",
            "3 N3 PROGRAM_END()",
        ]);
        p.play();
        let samples = drain_samples(&mut p);
        assert!(samples
            .iter()
            .filter(|s| s.line == 0)
            .all(|s| s.flags.intersects(MotionFlags::PLUNGE_NEG)));
        assert!(samples
            .iter()
            .filter(|s| s.line == 1)
            .all(|s| s.flags.intersects(MotionFlags::PLUNGE_POS)));
    }

    #[test]
    fn test_advisory_flags_present() {
        // feed move with the spindle off
        let mut p = player(&[
            "1 N1 STRAIGHT_FEED(1, 0, 0, 0, 0, 0)",
            "2 N2 PROGRAM_END()",
        ]);
        p.play();
        let samples = drain_samples(&mut p);
        assert!(samples[0].flags.intersects(MotionFlags::ADVISORY));
        assert!(samples[0].flags.intersects(MotionFlags::SPINDLE_OFF));
    }

    #[test]
    fn test_tool_change_event() {
        let mut p = player(&[
            "1 N1 CHANGE_TOOL(2)",
            "2 N2 STRAIGHT_FEED(1, 0, 0, 0, 0, 0)",
            "3 N3 PROGRAM_END()",
        ]);
        p.play();
        match p.request_move() {
            PlayerStep::ToolChange(t) => assert_eq!(t, 2),
            other => panic!("expected tool change, got {other:?}"),
        }
        assert_eq!(p.current_tool(), 2);
        assert!(matches!(p.request_move(), PlayerStep::Sample(_)));
    }

    #[test]
    fn test_progress_and_time() {
        let mut p = player(&[
            "1 N1 SET_FEED_RATE(100.0)",
            "2 N2 STRAIGHT_FEED(10, 0, 0, 0, 0, 0)",
            "3 N3 PROGRAM_END()",
        ]);
        p.set_step_size(100.0);
        p.play();
        let _ = drain_samples(&mut p);
        let progress = p.progress();
        assert_eq!(progress.percent, 100);
        assert!((progress.elapsed_s - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_back_pressure_one_sample_per_request() {
        let mut p = player(&[
            "1 N1 STRAIGHT_FEED(10, 0, 0, 0, 0, 0)",
            "2 N2 PROGRAM_END()",
        ]);
        p.set_step_size(5.0);
        p.play();
        // each request yields exactly one sample; the player does not
        // advance on its own
        for expected_x in [0.0, 5.0, 10.0] {
            match p.request_move() {
                PlayerStep::Sample(s) => {
                    assert!((s.pose.loc.x - expected_x).abs() < 1e-12)
                }
                other => panic!("expected sample, got {other:?}"),
            }
        }
        assert!(matches!(p.request_move(), PlayerStep::Finished));
    }
}
