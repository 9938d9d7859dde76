//! The simulator: state machine and transaction loop.

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use swarf_config::{CsgOp, SetupConfig, ToolTable};
use swarf_isosurface::{IsoSurface, MarchingCubes};
use swarf_machine::{MachineEnvelope, SpindlePower};
use swarf_mesh::{GeometryBuffer, RenderHandle};
use swarf_motion::{MotionFlags, MotionPlayer, PlayerStep, Pose, Sample};
use swarf_octree::{CuttingStatus, Octree};
use swarf_volume::{CollisionFlags, Cutter};

use crate::events::{SimCommand, SimEvent, SimWarning, WarningKind};
use crate::Result;

/// Uniform subdivision applied to the fresh tree before any CSG.
const INITIAL_SUBDIVISION: u32 = 2;

/// Orchestrator states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimState {
    /// Loaded, not yet started.
    Idle,
    /// Dispatching transactions.
    Running,
    /// Between a subtract dispatch and its mesh-swap acknowledgement.
    CuttingOne,
    /// Halted by the user or a hard warning; resumable.
    Paused,
    /// Program finished or aborted; not resumable.
    Stopped,
}

/// Owns the octree, geometry buffer, extractor, player, envelope and
/// tools, and drives one cut transaction at a time.
pub struct Simulator {
    tree: Octree,
    buffer: GeometryBuffer,
    extractor: MarchingCubes,
    player: MotionPlayer,
    envelope: MachineEnvelope,
    tools: ToolTable,
    default_tool: Cutter,
    power: SpindlePower,
    state: SimState,
    current_tool: usize,
    step_size: f64,
    variable_step: bool,
    events: Sender<SimEvent>,
    commands: Receiver<SimCommand>,
    command_tx: Sender<SimCommand>,
    // one warning per program line and category
    warned_collision: Option<usize>,
    warned_limit: Option<usize>,
    warned_power: Option<usize>,
    warned_advisory: Option<usize>,
}

impl Simulator {
    /// Build a simulator: create and seed the octree from the setup's
    /// stock and parts blocks, fit the tools with the machine's holder,
    /// and mesh the initial stock. Returns the simulator and the event
    /// stream.
    pub fn new(
        setup: &SetupConfig,
        envelope: MachineEnvelope,
        mut tools: ToolTable,
        player: MotionPlayer,
    ) -> Result<(Self, Receiver<SimEvent>)> {
        let multi_axis = envelope.max_a_limit.is_some()
            || envelope.max_b_limit.is_some()
            || envelope.max_c_limit.is_some();
        let mut tree = Octree::new(
            setup.octree_center,
            setup.root_scale(),
            setup.octree_max_depth,
            multi_axis,
        )?;
        tree.init(INITIAL_SUBDIVISION);
        let mut buffer = GeometryBuffer::new();

        for stock in setup.stock.iter().chain(&setup.parts) {
            match stock.op {
                CsgOp::Sum => tree.union_with(&stock.volume, &mut buffer)?,
                CsgOp::Diff => tree.subtract(&stock.volume, &mut buffer)?,
                CsgOp::Intersect => tree.intersect(&stock.volume, &mut buffer)?,
            }
        }
        log::info!("stock applied: {} nodes", tree.node_count());

        tools.set_holder(envelope.holder_radius, envelope.holder_length);
        let mut default_tool = Cutter::cylinder(50.0, 6.0);
        default_tool.set_holder(envelope.holder_radius, envelope.holder_length);

        let power = SpindlePower::new(
            tree.cube_resolution(),
            setup.specific_cutting_force,
            envelope.max_spindle_power,
        );

        let (event_tx, event_rx) = unbounded();
        let (command_tx, command_rx) = unbounded();
        let mut sim = Self {
            tree,
            buffer,
            extractor: MarchingCubes::new(),
            player,
            envelope,
            tools,
            default_tool,
            power,
            state: SimState::Idle,
            current_tool: 0,
            step_size: setup.step_size,
            variable_step: setup.variable_step,
            events: event_tx,
            commands: command_rx,
            command_tx,
            warned_collision: None,
            warned_limit: None,
            warned_power: None,
            warned_advisory: None,
        };
        sim.player.set_step_size(sim.effective_step_size());
        sim.player
            .set_traverse_feed_rate(sim.envelope.traverse_feed_rate);

        // mesh the seeded stock so the renderer has something before play
        sim.extractor.update_mesh(&mut sim.tree, &mut sim.buffer);
        sim.buffer.swap();
        Ok((sim, event_rx))
    }

    /// Sender for remote control of the running simulation.
    pub fn command_sender(&self) -> Sender<SimCommand> {
        self.command_tx.clone()
    }

    /// Handle the renderer locks for one frame at a time.
    pub fn render_handle(&self) -> RenderHandle {
        self.buffer.render_handle()
    }

    /// Current orchestrator state.
    pub fn state(&self) -> SimState {
        self.state
    }

    /// The octree, for inspection.
    pub fn tree(&self) -> &Octree {
        &self.tree
    }

    /// Start or resume.
    pub fn play(&mut self) {
        if matches!(self.state, SimState::Idle | SimState::Paused) {
            self.state = SimState::Running;
            self.player.play();
            self.emit(SimEvent::Debug("play".into()));
        }
    }

    /// Pause after the in-flight transaction.
    pub fn pause(&mut self) {
        if matches!(self.state, SimState::Running | SimState::CuttingOne) {
            self.state = SimState::Paused;
            self.player.pause();
            self.emit(SimEvent::Debug("pause".into()));
        }
    }

    /// Stop and discard the remainder of the program.
    pub fn stop(&mut self) {
        if self.state != SimState::Stopped {
            self.state = SimState::Stopped;
            self.player.stop();
            self.emit(SimEvent::Debug("stop".into()));
        }
    }

    /// Drain pending commands, then run one transaction if running.
    /// Returns false when there is nothing left to do (paused, stopped
    /// or idle).
    pub fn step(&mut self) -> Result<bool> {
        self.drain_commands();
        if self.state != SimState::Running {
            return Ok(false);
        }
        self.transaction()
    }

    /// Run transactions until the program finishes or execution pauses.
    /// Returns the final state.
    pub fn run(&mut self) -> Result<SimState> {
        self.play();
        while self.step()? {}
        Ok(self.state)
    }

    fn drain_commands(&mut self) {
        loop {
            match self.commands.try_recv() {
                Ok(SimCommand::Play) => self.play(),
                Ok(SimCommand::Pause) => self.pause(),
                Ok(SimCommand::Stop) => self.stop(),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    fn emit(&self, event: SimEvent) {
        // a detached event stream is not an error
        let _ = self.events.send(event);
    }

    fn effective_step_size(&self) -> f64 {
        if self.variable_step {
            self.current_cutter().radius * 2.0 * self.step_size
        } else {
            self.step_size
        }
    }

    fn current_cutter(&self) -> &Cutter {
        self.tools.get(self.current_tool).unwrap_or(&self.default_tool)
    }

    /// One `(pose → subtract → extract → swap → next)` cycle.
    fn transaction(&mut self) -> Result<bool> {
        match self.player.request_move() {
            PlayerStep::Idle => Ok(false),
            PlayerStep::Finished => {
                self.state = SimState::Stopped;
                self.emit(SimEvent::Progress(self.player.progress()));
                self.emit(SimEvent::Finished);
                Ok(false)
            }
            PlayerStep::ToolChange(slot) => {
                self.handle_tool_change(slot);
                Ok(true)
            }
            PlayerStep::Sample(sample) => {
                self.state = SimState::CuttingOne;
                self.cut_one(&sample)?;
                // mesh-swap complete acknowledges the cut
                if self.state == SimState::CuttingOne {
                    self.state = SimState::Running;
                }
                Ok(self.state == SimState::Running)
            }
        }
    }

    fn handle_tool_change(&mut self, slot: usize) {
        if self.tools.get(slot).is_none() {
            self.emit(SimEvent::Debug(format!("no tool in slot {slot}")));
        }
        self.current_tool = slot;
        self.envelope.z_limit_offset = self.current_cutter().overall_length();
        self.player.set_step_size(self.effective_step_size());
        self.emit(SimEvent::ToolChange(slot));
        log::info!("tool change to slot {slot}");
    }

    fn cut_one(&mut self, sample: &Sample) -> Result<()> {
        self.emit(SimEvent::ToolPosition {
            pose: sample.pose,
            line: sample.line,
        });

        self.check_limits(sample);

        let mut cutter = self.current_cutter().clone();
        cutter.set_center(sample.pose.point());
        cutter.set_angle(sample.pose.dir.x, sample.pose.dir.z);

        let status = self.tree.subtract_cutter(&cutter, &mut self.buffer)?;
        log::debug!(
            "cut at line {}: {} corners removed, collision {}",
            sample.seq,
            status.cut_count,
            status.collision
        );

        self.check_cut(sample, &status);

        self.extractor.update_mesh(&mut self.tree, &mut self.buffer);
        self.buffer.swap();
        self.emit(SimEvent::Progress(self.player.progress()));
        Ok(())
    }

    fn check_limits(&mut self, sample: &Sample) {
        let limits = self.envelope.check_limits(&sample.pose);
        if limits.is_empty() || self.warned_limit == Some(sample.line) {
            return;
        }
        self.warned_limit = Some(sample.line);
        self.warn(sample, WarningKind::Limit(limits), true);
    }

    fn check_cut(&mut self, sample: &Sample, status: &CuttingStatus) {
        if !status.collision.is_empty() && self.warned_collision != Some(sample.line) {
            self.warned_collision = Some(sample.line);
            let hard = status.collision.intersects(CollisionFlags::HARD);
            self.warn(sample, WarningKind::Collision(status.collision), hard);
        }

        if status.cut_count == 0 {
            return;
        }
        // removing material with the spindle stopped or at rapid speed
        let advisory = sample.flags.intersection(MotionFlags::ADVISORY);
        if !advisory.is_empty() && self.warned_advisory != Some(sample.line) {
            self.warned_advisory = Some(sample.line);
            self.warn(sample, WarningKind::Advisory(advisory), false);
        }

        let required = self.power.required(status.cut_count, sample.feed);
        if required > self.power.max_power() && self.warned_power != Some(sample.line) {
            self.warned_power = Some(sample.line);
            self.warn(sample, WarningKind::PowerOver(required), true);
        }
    }

    fn warn(&mut self, sample: &Sample, kind: WarningKind, hard: bool) {
        let warning = SimWarning {
            kind,
            pose: sample.pose,
            line: sample.line,
            seq: sample.seq,
            tag: sample.tag.clone(),
            hard,
        };
        log::warn!("{warning}");
        self.emit(SimEvent::Warning(warning));
        if hard {
            self.pause();
        }
    }

    /// World pose of the tool on the most recent sample, for the UI.
    pub fn tool_pose(&self) -> Pose {
        Pose::new(
            self.current_cutter().center().coords,
            self.current_cutter().angle(),
        )
    }
}
