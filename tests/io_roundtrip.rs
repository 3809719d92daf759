//! Integration tests for file ingest and export.
//!
//! Files are written under `std::env::temp_dir()` with per-test names so the
//! tests can run in parallel.

use std::fs;
use std::path::PathBuf;

use culture_kinetics::domain::{
    KineticParameters, Method, PhaseSearch, ProductSet, ProductSpec, SimulationConfig,
};
use culture_kinetics::fit::summarize_culture;
use culture_kinetics::io::{
    load_measurements, load_oxygen, read_trajectory_json, write_summaries_csv,
    write_trajectory_csv, write_trajectory_json,
};
use culture_kinetics::sim::simulate_config;
use culture_kinetics::solver::SolverOptions;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("culture_kinetics_{}_{name}", std::process::id()))
}

#[test]
fn measurement_csv_is_ingested_and_summarized() {
    let path = temp_path("batch.csv");
    fs::write(
        &path,
        "\u{feff}Time, Biomass ,SUBSTRATE,Product\n\
         0,0.1,20,0\n\
         1,0.2,19.6,0.05\n\
         2,0.4,18.8,0.15\n\
         2,0.5,18.0,0.2\n\
         3,0.8,17.2,0.35\n\
         4,oops,16,0.5\n\
         5,1.6,14.0,0.75\n\
         6,1.7,13.5,0.8\n",
    )
    .unwrap();

    let ingested = load_measurements(&path).unwrap();
    assert!(ingested.has_product);
    assert_eq!(ingested.rows_read, 8);
    // Repeated time 2 and the unparsable biomass are dropped.
    assert_eq!(ingested.row_errors.len(), 2);
    assert_eq!(ingested.row_errors[0].line, 5);
    assert_eq!(ingested.data.time, vec![0.0, 1.0, 2.0, 3.0, 5.0, 6.0]);
    assert!(ingested.data.label.ends_with("batch"));

    let summary = summarize_culture(&ingested.data, &PhaseSearch::default()).unwrap();
    assert!(summary.phase.detected);
    assert!((summary.substrate_consumed - 6.5).abs() < 1e-12);

    let out = temp_path("summaries.csv");
    write_summaries_csv(&out, &[summary]).unwrap();
    let text = fs::read_to_string(&out).unwrap();
    assert!(text.starts_with("label,phase_detected,mu_max"));
    assert_eq!(text.lines().count(), 2);

    let _ = fs::remove_file(&path);
    let _ = fs::remove_file(&out);
}

#[test]
fn missing_product_column_defaults_to_zero() {
    let path = temp_path("no_product.csv");
    fs::write(&path, "tiempo,biomasa,sustrato\n0,1,10\n1,2,9\n2,4,7\n").unwrap();
    let ingested = load_measurements(&path).unwrap();
    assert!(!ingested.has_product);
    assert_eq!(ingested.data.product, vec![0.0; 3]);
    let _ = fs::remove_file(&path);
}

#[test]
fn missing_required_column_exits_with_code_2() {
    let path = temp_path("bad_schema.csv");
    fs::write(&path, "time,biomass\n0,1\n").unwrap();
    let err = load_measurements(&path).unwrap_err();
    assert_eq!(err.exit_code(), 2);
    assert!(err.to_string().contains("substrate"));
    let _ = fs::remove_file(&path);

    let err = load_measurements(&temp_path("does_not_exist.csv")).unwrap_err();
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn oxygen_csv_is_ingested() {
    let path = temp_path("do.csv");
    fs::write(&path, "time,DO\n0,5\n1,30\n2,50\n3,\n4,75\n").unwrap();
    let ingested = load_oxygen(&path).unwrap();
    assert_eq!(ingested.time, vec![0.0, 1.0, 2.0, 4.0]);
    assert_eq!(ingested.dissolved_oxygen, vec![5.0, 30.0, 50.0, 75.0]);
    assert_eq!(ingested.row_errors.len(), 1);
    let _ = fs::remove_file(&path);
}

#[test]
fn trajectory_exports_round_trip() {
    let config = SimulationConfig {
        duration: 12.0,
        initial_biomass: 0.2,
        initial_substrate: 20.0,
        params: KineticParameters {
            mu_max: 0.347,
            ks: 21.1,
            yxs: 0.13,
            ms: 0.01,
        },
        products: ProductSet::try_from(vec![
            ProductSpec::new("AG", 0.5, 0.1, 0.0),
            ProductSpec::new("5CG", 0.1, 0.0, 0.2),
        ])
        .unwrap(),
    };
    let opts = SolverOptions {
        output_points: 25,
        ..SolverOptions::default()
    };
    let result = simulate_config(&config, &opts).unwrap();

    let json = temp_path("trajectory.json");
    write_trajectory_json(&json, &config, Method::DormandPrince, &result).unwrap();
    let doc = read_trajectory_json(&json).unwrap();
    assert_eq!(doc.tool, "kinetics");
    assert_eq!(doc.method, Method::DormandPrince);
    assert_eq!(doc.config, config);
    assert_eq!(doc.result.time, result.time);
    let keys: Vec<&str> = doc.result.products.iter().map(|p| p.key.as_str()).collect();
    assert_eq!(keys, ["AG", "5CG"]);

    let csv = temp_path("trajectory.csv");
    write_trajectory_csv(&csv, &result).unwrap();
    let text = fs::read_to_string(&csv).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("time,biomass,substrate,growth_rate,AG,5CG"));
    assert_eq!(lines.count(), 25);

    let _ = fs::remove_file(&json);
    let _ = fs::remove_file(&csv);
}

#[test]
fn trajectory_with_duplicate_product_keys_is_rejected() {
    let config = SimulationConfig {
        duration: 4.0,
        initial_biomass: 0.2,
        initial_substrate: 20.0,
        params: KineticParameters {
            mu_max: 0.347,
            ks: 21.1,
            yxs: 0.13,
            ms: 0.01,
        },
        products: ProductSet::try_from(vec![ProductSpec::new("AG", 0.5, 0.1, 0.0)]).unwrap(),
    };
    let opts = SolverOptions {
        output_points: 5,
        ..SolverOptions::default()
    };
    let result = simulate_config(&config, &opts).unwrap();

    let path = temp_path("duplicate_products.json");
    write_trajectory_json(&path, &config, Method::Auto, &result).unwrap();

    let mut doc: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    let products = doc["config"]["products"].as_array_mut().unwrap();
    let copy = products[0].clone();
    products.push(copy);
    fs::write(&path, serde_json::to_string(&doc).unwrap()).unwrap();

    let err = read_trajectory_json(&path).unwrap_err();
    assert_eq!(err.exit_code(), 2);
    assert!(err.to_string().contains("duplicate product key"), "{err}");

    let _ = fs::remove_file(&path);
}
