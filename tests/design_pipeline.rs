use std::fs;
use std::path::PathBuf;

use sensor_contracts::design::{
    DesignOptions, Processors, Stage, StageError, explore_combination,
};
use sensor_contracts::polyhedra::{ContractError, IoContract, Term, read_contracts_from_file};
use sensor_contracts::sensor::{EnvelopeVariant, SensorLibrary, SensorParams};

fn unique_dir(name: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!(
        "sensor_contracts_pipeline_{}_{}",
        name,
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    path
}

// ymax_lo = 0.75 * ymax: IPTG 0.9, aTc 1.5, Ara 2.25, Weak 0.0375
fn library() -> SensorLibrary {
    SensorLibrary::from_params(vec![
        SensorParams::new("IPTG", 0.002, 5.0, 110.0, 1.2, 0.25),
        SensorParams::new("aTc", 0.01, 2.0, 12.0, 2.0, 0.25),
        SensorParams::new("Ara", 0.0015, 10.0, 300.0, 3.0, 0.25),
        SensorParams::new("Weak", 0.001, 1.0, 50.0, 0.05, 0.25),
    ])
    .unwrap()
}

#[test]
fn strong_sensors_compose_into_system() {
    let lib = library();
    let processors = Processors::standard().unwrap();
    let outcome = explore_combination(
        3,
        &["Weak", "IPTG", "aTc", "Ara"],
        &lib,
        &processors,
        &DesignOptions::default(),
    );

    assert!(outcome.is_success(), "errors: {:?}", outcome.errors);
    assert!(outcome.errors.is_empty());
    assert_eq!(outcome.index, 3);
    let system = outcome.contract.as_ref().unwrap();
    for name in ["Weak", "IPTG", "aTc", "Ara"] {
        assert!(system.has_input(name), "missing input {name}");
    }
    assert_eq!(system.outputs().len(), 1);
    assert!(system.has_output("y"));
    assert!(system.guarantees().implies(&Term::lower("y", 2.05)));
    // saturation regime: every inducer at or above its K
    assert!(system.assumptions().implies(&Term::lower("Ara", 300.0)));
    assert!(!system.assumptions().implies(&Term::lower("Ara", 301.0)));

    assert_eq!(outcome.counters.compositions, 6);
    assert!(outcome.counters.abductions >= 3);
}

#[test]
fn weak_sensor_in_last_slot_fails_second_branch_only() {
    let lib = library();
    let processors = Processors::standard().unwrap();
    let outcome = explore_combination(
        0,
        &["IPTG", "aTc", "Ara", "Weak"],
        &lib,
        &processors,
        &DesignOptions::default(),
    );

    assert!(!outcome.is_success());
    assert_eq!(outcome.errors.len(), 2, "errors: {:?}", outcome.errors);
    match &outcome.errors[0] {
        StageError::Composition { stage, error } => {
            assert_eq!(*stage, Stage::Subsystem2);
            assert!(matches!(error, ContractError::Unsatisfiable { .. }), "{error}");
        }
        other => panic!("unexpected error {other}"),
    }
    assert_eq!(
        outcome.errors[1],
        StageError::UpstreamFailed {
            stage: Stage::Subsystems
        }
    );
    // first branch still ran: 2 pair compositions + 2 processor compositions
    assert_eq!(outcome.counters.compositions, 4);
}

#[test]
fn unknown_sensor_and_wrong_arity_are_recorded() {
    let lib = library();
    let processors = Processors::standard().unwrap();
    let options = DesignOptions::default();

    let outcome = explore_combination(1, &["IPTG", "Nope", "aTc", "Ara"], &lib, &processors, &options);
    assert!(!outcome.is_success());
    assert!(matches!(&outcome.errors[0], StageError::Sensor { sensor, .. } if sensor == "Nope"));
    assert!(outcome.errors.contains(&StageError::UpstreamFailed {
        stage: Stage::Sensors12
    }));
    assert!(outcome.errors.contains(&StageError::UpstreamFailed {
        stage: Stage::Subsystem1
    }));

    let outcome = explore_combination(2, &["IPTG", "aTc"], &lib, &processors, &options);
    assert!(!outcome.is_success());
    assert!(matches!(outcome.errors[0], StageError::Interface(_)));
}

#[test]
fn full_variant_needs_saturation_parameters() {
    let lib = library();
    let processors = Processors::standard().unwrap();
    let options = DesignOptions {
        variant: EnvelopeVariant::Full,
        ..DesignOptions::default()
    };
    let outcome = explore_combination(0, &["Weak", "IPTG", "aTc", "Ara"], &lib, &processors, &options);
    assert!(!outcome.is_success());
    let sensor_errors = outcome
        .errors
        .iter()
        .filter(|e| matches!(e, StageError::Sensor { .. }))
        .count();
    assert_eq!(sensor_errors, 4);
}

#[test]
fn full_variant_design_is_bounded_by_final_k() {
    let lib = SensorLibrary::from_params(vec![
        SensorParams::new("IPTG", 0.002, 5.0, 110.0, 1.2, 0.25).with_saturation(1.5, 1000.0),
        SensorParams::new("aTc", 0.01, 2.0, 12.0, 2.0, 0.25).with_saturation(2.2, 100.0),
        SensorParams::new("Ara", 0.0015, 10.0, 300.0, 3.0, 0.25).with_saturation(3.2, 5000.0),
        SensorParams::new("Van", 0.004, 3.0, 60.0, 2.0, 0.25).with_saturation(2.1, 500.0),
    ])
    .unwrap();
    let processors = Processors::standard().unwrap();
    let options = DesignOptions {
        variant: EnvelopeVariant::Full,
        ..DesignOptions::default()
    };
    let outcome = explore_combination(0, &["IPTG", "aTc", "Ara", "Van"], &lib, &processors, &options);

    assert!(outcome.is_success(), "errors: {:?}", outcome.errors);
    let system = outcome.contract.as_ref().unwrap();
    assert!(system.guarantees().implies(&Term::lower("y", 2.05)));
    // saturation domain is [K, final K] for every inducer
    assert!(system.assumptions().implies(&Term::lower("Ara", 300.0)));
    assert!(system.assumptions().implies(&Term::upper("Ara", 5000.0)));
    assert!(!system.assumptions().implies(&Term::upper("Ara", 4999.0)));
    assert!(system.assumptions().implies(&Term::upper("aTc", 100.0)));
    assert_eq!(outcome.counters.compositions, 6);
}

#[test]
fn sensor_consumed_inside_the_design_fails_interface_check() {
    // a sensor reading `y1` is fed by subsystem 1, so `y1` stops being a
    // system input once the combiner no longer reads it
    let lib = SensorLibrary::from_params(vec![
        SensorParams::new("IPTG", 0.002, 5.0, 110.0, 1.2, 0.25),
        SensorParams::new("aTc", 0.01, 2.0, 12.0, 2.0, 0.25),
        SensorParams::new("y1", 0.002, 0.5, 2.0, 1.2, 0.25),
        SensorParams::new("Ara", 0.0015, 10.0, 300.0, 3.0, 0.25),
    ])
    .unwrap();
    let standard = Processors::standard().unwrap();
    let processors = Processors {
        combiner: IoContract::from_strings(&["y2"], &["y"], &["y2 >= 0.5"], &["y >= 2.05"])
            .unwrap(),
        ..standard
    };
    let outcome = explore_combination(
        5,
        &["IPTG", "aTc", "y1", "Ara"],
        &lib,
        &processors,
        &DesignOptions::default(),
    );

    assert!(!outcome.is_success());
    assert_eq!(outcome.errors.len(), 1, "errors: {:?}", outcome.errors);
    match &outcome.errors[0] {
        StageError::Interface(msg) => assert!(msg.contains("y1"), "{msg}"),
        other => panic!("unexpected error {other}"),
    }
    // every composition still ran
    assert_eq!(outcome.counters.compositions, 6);
}

#[test]
fn saves_error_logs_and_contracts() {
    let dir = unique_dir("artifacts");
    let lib = library();
    let processors = Processors::standard().unwrap();
    let options = DesignOptions {
        save_contracts: true,
        save_errors: true,
        output_dir: dir.clone(),
        ..DesignOptions::default()
    };

    explore_combination(7, &["Weak", "IPTG", "aTc", "Ara"], &lib, &processors, &options);
    explore_combination(8, &["IPTG", "aTc", "Ara", "Weak"], &lib, &processors, &options);

    let saved = read_contracts_from_file(&dir.join("successful_design_7.json")).unwrap();
    let system = &saved["contract_7"];
    assert!(system.has_output("y"));
    assert!(!dir.join("successful_design_8.json").exists());

    let ok_log = fs::read_to_string(dir.join("design_error_log_7.txt")).unwrap();
    assert!(ok_log.is_empty());
    let failed_log = fs::read_to_string(dir.join("design_error_log_8.txt")).unwrap();
    assert_eq!(failed_log.lines().count(), 2);
    assert!(failed_log.contains("subsystem 2"), "{failed_log}");

    let _ = fs::remove_dir_all(&dir);
}
