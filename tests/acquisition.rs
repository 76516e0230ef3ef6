//! End-to-end tests: configuration to zero-corrected readings

use loadmon::{
    packet_addr, Calibration, LoadMonError, MeasurementSystem, Sensor, SensorType, SystemConfig,
    PACKET_ADDR_OFFSET,
};

const CRANE_CONFIG: &str = r#"
    [system]
    index = 0
    name = "Crane test rig"
    depth = 50

    [[sensor]]
    type = "rkm-w2-ch"
    node = 3
    name = "F1"
    calibration = { kind = "scaled-sum", factor = 10.0 }

    [[sensor]]
    type = "bkm-w2-ch-sum"
    node = 4
    name = "B1"
    calibration = { kind = "plain-sum" }
"#;

#[test]
fn zeroing_under_load_shows_the_delta() {
    let config = SystemConfig::from_toml(CRANE_CONFIG).unwrap();
    let mut system = config.build().unwrap();

    // tare weight on the wheel load sensor
    system.update_sensor([1, 3], &[10.0, 10.0]).unwrap();
    let outputs = system.sensors()[0].current_outputs(None).unwrap();
    assert_eq!(outputs[[0, 0]], 200.0);

    system.zero_all().unwrap();
    let outputs = system.sensors()[0].current_outputs(None).unwrap();
    assert_eq!(outputs[[0, 0]], 0.0);

    // loaded reading: (50+50)*10 minus the 200 tare
    system.update_sensor([1, 3], &[50.0, 50.0]).unwrap();
    let outputs = system.sensors()[0].current_outputs(None).unwrap();
    assert_eq!(outputs[[0, 0]], 800.0);
}

#[test]
fn sensors_share_one_store_without_crosstalk() {
    let config = SystemConfig::from_toml(CRANE_CONFIG).unwrap();
    let mut system = config.build().unwrap();

    system.update_sensor([1, 3], &[1.0, 2.0]).unwrap();
    system.update_sensor([1, 4], &[100.0, 100.0]).unwrap();
    system.update_sensor([1, 3], &[3.0, 4.0]).unwrap();

    let f1 = system.sensors()[0].current_inputs(Some(2)).unwrap();
    assert_eq!(f1[[0, 0]], 3.0);
    assert_eq!(f1[[1, 0]], 1.0);

    let b1 = system.sensors()[1].current_outputs(None).unwrap();
    assert_eq!(b1[[0, 0]], 200.0);
}

#[test]
fn packets_route_by_embedded_address() {
    let config = SystemConfig::from_toml(CRANE_CONFIG).unwrap();
    let mut system = config.build().unwrap();

    let mut packet = vec![0u8; 16];
    packet[PACKET_ADDR_OFFSET] = 1;
    packet[PACKET_ADDR_OFFSET + 1] = 4;
    assert_eq!(packet_addr(&packet), Some([1, 4]));
    assert_eq!(system.sensor_by_packet(&packet), Some(1));

    packet[PACKET_ADDR_OFFSET + 1] = 77;
    assert_eq!(system.sensor_by_packet(&packet), None);
    assert_eq!(system.unknown_sources().get(&[1, 77]), Some(&1));
}

#[test]
fn config_reload_builds_the_same_layout() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("crane.toml");

    let config = SystemConfig::from_toml(CRANE_CONFIG).unwrap();
    config.save(&path).unwrap();

    let system = SystemConfig::load(&path).unwrap().build().unwrap();
    assert_eq!(system.sensor_by_addr([1, 3]), Some(0));
    assert_eq!(system.sensor_by_addr([1, 4]), Some(1));
    assert_eq!(system.sensors()[0].devtype(), SensorType::RkmW2Ch);
}

#[test]
fn manual_setup_matches_config_build() {
    let mut system = MeasurementSystem::new(0, "manual").unwrap();
    system
        .add_sensor(
            Sensor::new(SensorType::RkmW2Ch, Calibration::ScaledSum { factor: 10.0 })
                .with_node_addr(3),
        )
        .unwrap();
    system.init().unwrap();

    system.update_sensor([1, 3], &[10.0, 10.0]).unwrap();
    assert_eq!(system.current_outputs(), vec![200.0]);
}

#[test]
fn update_to_unknown_address_is_an_error() {
    let config = SystemConfig::from_toml(CRANE_CONFIG).unwrap();
    let mut system = config.build().unwrap();

    assert!(matches!(
        system.update_sensor([9, 9], &[0.0]).unwrap_err(),
        LoadMonError::Config(_)
    ));
}
