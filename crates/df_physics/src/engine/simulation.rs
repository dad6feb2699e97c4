// crates/df_physics/src/engine/simulation.rs

//! 时间推进驱动
//!
//! 每个分区持有一个 [`Simulation`]，独占自己的网格、场与通信器。
//! 单步顺序（所有分区一致）：
//!
//! 1. 以当前步长计算面 Courant 数（全局最大），调整步长
//! 2. 截短步长以落在输出/结束时刻，推进时间
//! 3. 更新入流边界，保存旧时刻值
//! 4. 耦合内迭代
//! 5. `he += deltahh`；启用地形修正时累计 deltah 并移动网格点，
//!    重算 gn、gs 与 deltac0；否则 `deltah0 = he - he0`
//! 6. 到达输出时刻时写快照
//!
//! 多分区运行时每个分区一个线程，经 [`ChannelComm`] 互联。

use std::thread;
use std::time::Instant;

use df_config::{CaseConfig, MeshSource, TimeControls};
use df_foundation::{DfError, DfResult};
use df_mesh::{decompose, load_mesh, DVec3, FaMesh, Partition, RectMeshGenerator};
use serde::Serialize;

use super::coupled::{exchange_state, CoupledStepSolver, StepInputs, StepReport};
use super::timestep::{reached, TimeStepController, TimeStepStats};
use crate::boundary::BoundaryConditions;
use crate::closure::ClosureSet;
use crate::init::initialise;
use crate::numerics::fam::{interpolate_scalar, interpolate_vector, surface_courant, BoundaryScalar, BoundaryVector};
use crate::output::SnapshotWriter;
use crate::parallel::{ChannelComm, Communicator, DistributedSync, SerialComm};
use crate::state::{FieldSnapshot, FlowState};
use crate::terrain::{TerrainModifier, TerrainReport};
use crate::types::MaterialParams;

// =============================================================================
// 统计
// =============================================================================

/// 单个时间步的统计
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepSummary {
    /// 步序号（从 1 计）
    pub index: usize,
    /// 步末时刻
    pub time: f64,
    /// 步长
    pub dt: f64,
    /// 步初的全局 Courant 数
    pub courant: f64,
    /// 内迭代结果
    pub coupled: StepReport,
    /// 地形修正结果
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terrain: Option<TerrainReport>,
    /// 全局总质量 Σ rhoh·A
    pub mass: f64,
}

/// 整个运行的统计
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// 总步数
    pub steps: usize,
    /// 结束时刻
    pub end_time: f64,
    /// 本分区写出的快照数
    pub snapshots: usize,
    /// 达到内迭代上限的步数
    pub unconverged_steps: usize,
    /// 地形修正达到迭代上限的步数
    pub terrain_capped_steps: usize,
    /// 初始全局质量
    pub initial_mass: f64,
    /// 结束时全局质量
    pub final_mass: f64,
    /// 时间步长统计
    pub time_step: TimeStepStats,
    /// 墙钟时间 [s]
    pub wall_seconds: f64,
}

// =============================================================================
// 网格与重力
// =============================================================================

/// 按配置构建整体网格
pub fn build_mesh(case: &CaseConfig) -> DfResult<FaMesh> {
    match &case.mesh {
        MeshSource::Rectangle {
            nx,
            ny,
            dx,
            dy,
            origin,
            slope_x,
            slope_y,
        } => RectMeshGenerator::new(*nx, *ny, *dx, *dy)
            .with_origin(*origin)
            .build_inclined(*slope_x, *slope_y),
        MeshSource::File { path } => load_mesh(path),
    }
}

/// 重力的法向分量 g·n 与切向分量 g - (g·n)n
pub fn gravity_components(mesh: &FaMesh, g: DVec3) -> (Vec<f64>, Vec<DVec3>) {
    mesh.normals()
        .iter()
        .map(|&n| {
            let gn = g.dot(n);
            (gn, g - gn * n)
        })
        .unzip()
}

// =============================================================================
// 单分区驱动
// =============================================================================

/// 单个分区上的时间推进
#[derive(Debug)]
pub struct Simulation {
    mesh: FaMesh,
    params: MaterialParams,
    closures: ClosureSet,
    bcs: BoundaryConditions,
    state: FlowState,
    sync: DistributedSync,
    solver: CoupledStepSolver,
    timestep: TimeStepController,
    terrain: Option<TerrainModifier>,
    writer: SnapshotWriter,
    write_initial: bool,
    time: TimeControls,
    gn: Vec<f64>,
    gs: Vec<DVec3>,
    t: f64,
    steps: usize,
    next_write: f64,
    unconverged_steps: usize,
    terrain_capped_steps: usize,
    last: Option<StepSummary>,
}

impl Simulation {
    /// 在一个分区上建立模拟
    ///
    /// 多分区时各分区必须同时调用（握手与入流边宽归约都是集体操作）。
    pub fn new(case: &CaseConfig, partition: Partition, comm: Box<dyn Communicator>) -> DfResult<Self> {
        let Partition {
            mesh,
            info,
            point_weights,
        } = partition;

        let params = MaterialParams::from_case(case);
        let closures = ClosureSet::from_config(&case.transport, &mesh)?;
        let mut bcs = BoundaryConditions::new(&mesh, &case.boundaries, &case.hydrographs)?;
        let mut sync = DistributedSync::new(comm, info, &mesh)?;

        for hb in bcs.hydrographs_mut() {
            let width = sync.all_reduce_sum(hb.local_width())?;
            hb.set_global_width(width);
        }

        let terrain = case
            .transport
            .terrain_coeffs()?
            .map(|coeffs| TerrainModifier::new(coeffs.clone(), point_weights));

        let mut state = initialise(&mesh, &case.initial, &params);
        let t = case.time.start_time;
        bcs.update_inflow(t, &mesh, &*closures.friction, &params, &mut state)?;
        bcs.correct(&mesh, &mut state);
        exchange_state(&mut sync, &mut state)?;
        initial_fluxes(&mesh, &bcs, &mut state);

        let (gn, gs) = gravity_components(&mesh, params.g);
        let solver = CoupledStepSolver::new(case.solution.clone(), &mesh)?;

        let mut timestep = TimeStepController::new(&case.time);
        let courant = sync.all_reduce_max(surface_courant(&mesh, &state.phis, timestep.current_dt()))?;
        timestep.initialise(courant);

        let writer = SnapshotWriter::new(&case.output.directory, sync.rank(), sync.size());

        tracing::info!(
            rank = sync.rank(),
            partitions = sync.size(),
            faces = mesh.n_faces(),
            terrain_modification = terrain.is_some(),
            start = t,
            end = case.time.end_time,
            "模拟已建立"
        );

        Ok(Self {
            mesh,
            params,
            closures,
            bcs,
            state,
            sync,
            solver,
            timestep,
            terrain,
            writer,
            write_initial: case.output.write_initial,
            time: case.time.clone(),
            gn,
            gs,
            t,
            steps: 0,
            next_write: t + case.time.write_interval,
            unconverged_steps: 0,
            terrain_capped_steps: 0,
            last: None,
        })
    }

    /// 当前时刻
    pub fn time(&self) -> f64 {
        self.t
    }

    /// 已完成步数
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// 网格
    pub fn mesh(&self) -> &FaMesh {
        &self.mesh
    }

    /// 流动状态
    pub fn state(&self) -> &FlowState {
        &self.state
    }

    /// 材料参数
    pub fn params(&self) -> &MaterialParams {
        &self.params
    }

    /// 分区同步
    pub fn sync(&self) -> &DistributedSync {
        &self.sync
    }

    /// 时间步长控制器
    pub fn timestep(&self) -> &TimeStepController {
        &self.timestep
    }

    /// 最近一步的统计
    pub fn last_step(&self) -> Option<&StepSummary> {
        self.last.as_ref()
    }

    /// 是否已到结束时刻
    pub fn finished(&self) -> bool {
        reached(self.t, self.time.end_time)
    }

    /// 推进一个时间步
    pub fn step(&mut self) -> DfResult<StepSummary> {
        let courant = self.sync.all_reduce_max(surface_courant(
            &self.mesh,
            &self.state.phis,
            self.timestep.current_dt(),
        ))?;
        self.timestep.adjust(courant);
        let dt = self.timestep.step_size(self.t, self.next_write, self.time.end_time);
        self.t += dt;
        self.steps += 1;

        self.bcs.update_inflow(
            self.t,
            &self.mesh,
            &*self.closures.friction,
            &self.params,
            &mut self.state,
        )?;
        self.state.store_old(&self.mesh);

        let inputs = StepInputs {
            mesh: &self.mesh,
            params: &self.params,
            closures: &self.closures,
            bcs: &self.bcs,
            gn: &self.gn,
            gs: &self.gs,
        };
        let coupled = self.solver.solve_step(&inputs, &mut self.state, &mut self.sync, dt)?;
        if !coupled.converged {
            self.unconverged_steps += 1;
        }

        let terrain = self.update_bed()?;
        if terrain.is_some_and(|r| !r.converged) {
            self.terrain_capped_steps += 1;
        }

        if let Some(violation) = self.state.check_bounds(&self.params) {
            tracing::warn!(time = self.t, %violation, "物理约束越界");
        }

        let mass = self.sync.all_reduce_sum(self.state.total_mass(self.mesh.areas()))?;
        let summary = StepSummary {
            index: self.steps,
            time: self.t,
            dt,
            courant,
            coupled,
            terrain,
            mass,
        };
        tracing::info!(
            step = summary.index,
            time = summary.time,
            dt,
            courant,
            passes = coupled.passes,
            mass,
            "时间步完成"
        );
        self.last = Some(summary);

        if reached(self.t, self.next_write) {
            self.write()?;
            while reached(self.t, self.next_write) {
                self.next_write += self.time.write_interval;
            }
        } else if self.finished() {
            self.write()?;
        }
        Ok(summary)
    }

    /// 运行到结束时刻
    pub fn run(&mut self) -> DfResult<RunSummary> {
        let wall = Instant::now();
        let initial_mass = self.sync.all_reduce_sum(self.state.total_mass(self.mesh.areas()))?;
        if self.write_initial && self.steps == 0 {
            self.write()?;
        }
        while !self.finished() {
            self.step()?;
        }
        let final_mass = self.sync.all_reduce_sum(self.state.total_mass(self.mesh.areas()))?;

        let summary = RunSummary {
            steps: self.steps,
            end_time: self.t,
            snapshots: self.writer.written(),
            unconverged_steps: self.unconverged_steps,
            terrain_capped_steps: self.terrain_capped_steps,
            initial_mass,
            final_mass,
            time_step: self.timestep.stats(),
            wall_seconds: wall.elapsed().as_secs_f64(),
        };
        tracing::info!(
            rank = self.sync.rank(),
            steps = summary.steps,
            end_time = summary.end_time,
            unconverged = summary.unconverged_steps,
            wall_seconds = summary.wall_seconds,
            "模拟结束"
        );
        Ok(summary)
    }

    /// 高程变化与地形修正
    fn update_bed(&mut self) -> DfResult<Option<TerrainReport>> {
        let state = &mut self.state;
        for (he, d) in state.he.iter_mut().zip(&state.deltahh) {
            *he += d;
        }

        let Some(modifier) = &self.terrain else {
            for ((d0, he), he0) in state.deltah0.iter_mut().zip(&state.he).zip(&state.he0) {
                *d0 = he - he0;
            }
            return Ok(None);
        };

        for (d, dd) in state.deltah.iter_mut().zip(&state.deltahh) {
            *d += dd;
        }
        let report = modifier.apply(&mut self.mesh, &mut self.sync, &state.h, &mut state.deltah)?;
        (self.gn, self.gs) = gravity_components(&self.mesh, self.params.g);
        for ((dc, c), c0) in state.deltac0.iter_mut().zip(self.mesh.centres()).zip(&state.c0z) {
            *dc = c.z - c0;
        }
        Ok(Some(report))
    }

    fn write(&mut self) -> DfResult<()> {
        let fields = FieldSnapshot::capture(&self.state, self.terrain.is_some());
        self.writer.write(
            self.t,
            &self.mesh,
            &self.sync.info().face_addressing,
            fields,
            self.last.as_ref(),
        )?;
        Ok(())
    }
}

/// 由初始场建立 phis 与 phi2s
fn initial_fluxes(mesh: &FaMesh, bcs: &BoundaryConditions, state: &mut FlowState) {
    let coupled = bcs.coupled();
    let us_e = interpolate_vector(
        mesh,
        &state.us,
        BoundaryVector {
            values: &state.boundary.us,
            coupled,
        },
    );
    let rhoh_e = interpolate_scalar(
        mesh,
        &state.rhoh,
        BoundaryScalar {
            values: &state.boundary.rhoh,
            coupled,
        },
    );
    for (e, le) in mesh.le().iter().enumerate() {
        state.phis[e] = us_e[e].dot(*le);
        state.phi2s[e] = rhoh_e[e] * state.phis[e];
    }
}

// =============================================================================
// 整个算例
// =============================================================================

/// 运行整个算例：单分区在当前线程，多分区每个分区一个线程
///
/// 多个分区失败时优先返回非通信类错误（通信错误通常是其他分区
/// 先行退出导致通道断开）。返回 0 号分区的统计。
pub fn run_case(case: &CaseConfig) -> DfResult<RunSummary> {
    let mesh = build_mesh(case)?;
    let n = case.decomposition.partitions;
    if n <= 1 {
        let mut sim = Simulation::new(case, Partition::serial(mesh), Box::new(SerialComm))?;
        return sim.run();
    }

    let partitions = decompose(&mesh, n)?;
    drop(mesh);
    let comms = ChannelComm::create(n);
    tracing::info!(partitions = n, "启动分区线程");

    let results: Vec<DfResult<RunSummary>> = thread::scope(|s| {
        let handles: Vec<_> = partitions
            .into_iter()
            .zip(comms)
            .map(|(partition, comm)| {
                s.spawn(move || -> DfResult<RunSummary> {
                    let mut sim = Simulation::new(case, partition, Box::new(comm))?;
                    sim.run()
                })
            })
            .collect();
        handles
            .into_iter()
            .enumerate()
            .map(|(rank, h)| {
                h.join()
                    .unwrap_or_else(|_| Err(DfError::internal(format!("分区 {rank} 线程异常退出"))))
            })
            .collect()
    });

    let mut first_error: Option<DfError> = None;
    let mut summaries = Vec::with_capacity(n);
    for result in results {
        match result {
            Ok(s) => summaries.push(s),
            Err(e) => {
                let replace = match &first_error {
                    None => true,
                    Some(DfError::Communication { .. }) => !matches!(e, DfError::Communication { .. }),
                    Some(_) => false,
                };
                if replace {
                    first_error = Some(e);
                }
            }
        }
    }
    if let Some(e) = first_error {
        return Err(e);
    }
    summaries
        .into_iter()
        .next()
        .ok_or_else(|| DfError::internal("没有分区返回结果"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closed_case(dir: &std::path::Path) -> CaseConfig {
        let mut case = CaseConfig::default();
        case.mesh = MeshSource::Rectangle {
            nx: 4,
            ny: 4,
            dx: 1.0,
            dy: 1.0,
            origin: [0.0; 3],
            slope_x: 0.0,
            slope_y: 0.0,
        };
        case.time.end_time = 0.05;
        case.time.delta_t = 0.01;
        case.time.write_interval = 0.05;
        case.time.adjust_time_step = false;
        case.solution = case.solution.clone().with_correctors(1, 3);
        case.output.directory = dir.to_path_buf();
        case
    }

    #[test]
    fn test_gravity_split_on_flat_mesh() {
        let mesh = RectMeshGenerator::square(2, 1.0).build_flat().unwrap();
        let (gn, gs) = gravity_components(&mesh, DVec3::new(0.0, 0.0, -9.81));
        for (n, s) in gn.iter().zip(&gs) {
            assert!((n.abs() - 9.81).abs() < 1e-12);
            assert!(s.length() < 1e-12);
        }
    }

    #[test]
    fn test_build_rectangle_mesh() {
        let dir = tempfile::tempdir().unwrap();
        let mesh = build_mesh(&closed_case(dir.path())).unwrap();
        assert_eq!(mesh.n_faces(), 16);
    }

    #[test]
    fn test_fixed_step_run_reaches_end_time() {
        let dir = tempfile::tempdir().unwrap();
        let case = closed_case(dir.path());
        let mesh = build_mesh(&case).unwrap();
        let mut sim = Simulation::new(&case, Partition::serial(mesh), Box::new(SerialComm)).unwrap();
        let summary = sim.run().unwrap();

        assert_eq!(summary.steps, 5);
        assert!((summary.end_time - 0.05).abs() < 1e-12);
        // 初始时刻与结束时刻各一次
        assert_eq!(summary.snapshots, 2);
        assert!(dir.path().join("0").join("fields.json").exists());
        assert!(dir.path().join("0.05").join("fields.json").exists());
    }
}
