// crates/df_physics/tests/partitioned.rs

//! 多分区与单分区结果一致性

mod common;

use std::path::Path;
use std::thread;

use df_config::TerrainModificationCoeffs;
use df_mesh::{decompose, FaMesh, Partition, RectMeshGenerator};
use df_physics::terrain::smooth_pass;
use df_physics::{run_case, ChannelComm, DistributedSync, TerrainModifier};
use serde_json::json;

/// 每个分区一个线程执行 f，结果按分区号排列
fn run_partitions<T, F>(mesh: &FaMesh, n: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(DistributedSync, Partition) -> T + Sync,
{
    let parts = decompose(mesh, n).unwrap();
    let comms = ChannelComm::create(n);
    thread::scope(|s| {
        let handles: Vec<_> = parts
            .into_iter()
            .zip(comms)
            .map(|(p, c)| {
                let f = &f;
                s.spawn(move || {
                    let sync = DistributedSync::new(Box::new(c), p.info.clone(), &p.mesh).unwrap();
                    f(sync, p)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

fn spike(n_faces: usize, face: usize) -> Vec<f64> {
    let mut d = vec![0.0; n_faces];
    d[face] = 10.0;
    d
}

#[test]
fn test_smoothing_across_partitions_matches_serial() {
    let mesh = RectMeshGenerator::square(4, 1.0).build_flat().unwrap();
    let coeffs = TerrainModificationCoeffs::new(0.01, 0.0);
    // 面 5 (i=1, j=1) 紧贴 x = 2 的分区交界
    let global = spike(16, 5);

    let mut serial = global.clone();
    let mut serial_vol = global.clone();
    let mut sync = DistributedSync::serial(&mesh);
    smooth_pass(&mesh, &mut sync, &mut serial, &mut serial_vol, &coeffs).unwrap();

    let results = run_partitions(&mesh, 2, |mut sync, p| {
        let mut d: Vec<f64> = p.info.face_addressing.iter().map(|&g| global[g]).collect();
        let mut vol = d.clone();
        smooth_pass(&p.mesh, &mut sync, &mut d, &mut vol, &coeffs).unwrap();
        let total = sync.all_reduce_sum(vol.iter().sum()).unwrap();
        (p.info.face_addressing, d, total)
    });

    let mut covered = 0;
    for (addressing, d, total) in results {
        assert!((total - 10.0).abs() < 1e-12);
        for (local, &g) in addressing.iter().enumerate() {
            assert!((d[local] - serial[g]).abs() < 1e-12, "face {g}: {} vs {}", d[local], serial[g]);
            covered += 1;
        }
    }
    assert_eq!(covered, 16);
}

#[test]
fn test_terrain_modification_across_partitions_matches_serial() {
    let mesh = RectMeshGenerator::square(4, 1.0).build_flat().unwrap();
    let coeffs = TerrainModificationCoeffs::new(0.01, 0.05).with_n_terrain_iter(5);
    let global = spike(16, 6);

    let serial_part = Partition::serial(mesh.clone());
    let modifier = TerrainModifier::new(coeffs.clone(), serial_part.point_weights.clone());
    let mut serial_mesh = serial_part.mesh;
    let mut serial = global.clone();
    let mut sync = DistributedSync::serial(&serial_mesh);
    let serial_report = modifier.apply(&mut serial_mesh, &mut sync, &[1.0; 16], &mut serial).unwrap();

    let results = run_partitions(&mesh, 2, |mut sync, p| {
        let modifier = TerrainModifier::new(coeffs.clone(), p.point_weights.clone());
        let mut local_mesh = p.mesh;
        let mut d: Vec<f64> = p.info.face_addressing.iter().map(|&g| global[g]).collect();
        let h = vec![1.0; d.len()];
        let report = modifier.apply(&mut local_mesh, &mut sync, &h, &mut d).unwrap();
        let z: Vec<f64> = local_mesh.points().iter().map(|p| p.z).collect();
        (p.info.face_addressing, p.info.point_addressing, d, z, report)
    });

    for (faces, points, d, z, report) in results {
        assert_eq!(report.iterations, serial_report.iterations);
        assert_eq!(report.converged, serial_report.converged);
        assert!((report.swept_volume - serial_report.swept_volume).abs() < 1e-9);
        for (local, &g) in faces.iter().enumerate() {
            assert!((d[local] - serial[g]).abs() < 1e-9);
        }
        for (local, &g) in points.iter().enumerate() {
            assert!((z[local] - serial_mesh.points()[g].z).abs() < 1e-9);
        }
    }
}

/// 读取某时刻全部分区的 h，按全局面号排列
fn read_h(dir: &Path, label: &str, n_faces: usize) -> Vec<f64> {
    let mut h = vec![f64::NAN; n_faces];
    for entry in std::fs::read_dir(dir.join(label)).unwrap() {
        let path = entry.unwrap().path();
        let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let addressing = value["faceAddressing"].as_array().unwrap();
        let local = value["fields"]["h"].as_array().unwrap();
        for (g, v) in addressing.iter().zip(local) {
            h[g.as_u64().unwrap() as usize] = v.as_f64().unwrap();
        }
    }
    h
}

#[test]
fn test_two_partition_run_matches_serial() {
    let serial_dir = tempfile::tempdir().unwrap();
    let parallel_dir = tempfile::tempdir().unwrap();

    // 释放区 [2,4]x[1,3] 跨越 x = 3 的分区交界
    let serial_case = common::parse(common::closed_release_case(6, 4, serial_dir.path()));
    let mut value = common::closed_release_case(6, 4, parallel_dir.path());
    value["decomposition"] = json!({ "numberOfSubdomains": 2 });
    let parallel_case = common::parse(value);

    let serial = run_case(&serial_case).unwrap();
    let parallel = run_case(&parallel_case).unwrap();

    assert_eq!(serial.steps, parallel.steps);
    assert!((serial.final_mass - parallel.final_mass).abs() < 1e-9 * serial.final_mass);
    assert!((parallel.final_mass - parallel.initial_mass).abs() < 1e-6 * parallel.initial_mass);

    let label = "0.03";
    assert!(serial_dir.path().join(label).join("fields.json").exists());
    assert!(parallel_dir.path().join(label).join("fields_proc0.json").exists());
    assert!(parallel_dir.path().join(label).join("fields_proc1.json").exists());

    let hs = read_h(serial_dir.path(), label, 24);
    let hp = read_h(parallel_dir.path(), label, 24);
    for (g, (a, b)) in hs.iter().zip(&hp).enumerate() {
        assert!((a - b).abs() < 1e-7, "face {g}: serial {a}, partitioned {b}");
    }
}
