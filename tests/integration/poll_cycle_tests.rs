//! Poll cycle behaviour against the full sensor catalog.

use snuffelaar::app::events::AppEvent;
use snuffelaar::config::{NodeConfig, SensorSettings};
use snuffelaar::drivers::PmFrame;
use snuffelaar::sensors::temperature::CONVERSION_TIMEOUT_MS;

use crate::mock_hw::{Rig, config_with_only};

#[test]
fn probe_reading_then_disconnected_probe_publishes_once() {
    let mut rig = Rig::new();
    rig.temperature.set_probes(&[21.5, -127.0]);
    let mut node = rig.polling_node(&config_with_only(&["DS18B20"]));

    let report = rig.cycle(&mut node);

    assert_eq!(
        rig.sink.publishes(),
        vec![(
            "snuffelaar/temperature/0".to_owned(),
            "temperature/0,room=study value=21.50 °C".to_owned()
        )]
    );
    assert_eq!(report.published, 1);
    assert_eq!(report.truncated, 1);
    assert_eq!(rig.broker.retained().len(), 1);
}

#[test]
fn co2_without_data_publishes_nothing_and_raises_nothing() {
    let mut rig = Rig::new();
    rig.co2.set_ppm(0);
    let mut node = rig.polling_node(&config_with_only(&["MH-Z19"]));

    let report = rig.cycle(&mut node);

    assert!(rig.sink.publishes().is_empty());
    assert_eq!(rig.sink.alarms(), 0);
    assert_eq!(report.no_data, 1);
    assert_eq!(report.published, 0);
}

#[test]
fn co2_reading_payload_with_units() {
    let mut rig = Rig::new();
    rig.co2.set_ppm(412);
    let mut node = rig.polling_node(&config_with_only(&["MH-Z19"]));

    rig.cycle(&mut node);

    assert_eq!(
        rig.broker.retained(),
        &[(
            "snuffelaar/co2".to_owned(),
            "co2,room=study value=412 PPM".to_owned()
        )]
    );
}

#[test]
fn units_can_be_left_out() {
    let mut rig = Rig::new();
    rig.co2.set_ppm(412);
    let config = NodeConfig {
        add_units: false,
        ..config_with_only(&["MH-Z19"])
    };
    let mut node = rig.polling_node(&config);

    rig.cycle(&mut node);

    assert_eq!(rig.sink.publishes()[0].1, "co2,room=study value=412");
}

#[test]
fn co2_alarm_is_local_only() {
    let mut rig = Rig::new();
    rig.co2.set_ppm(1500);
    let mut config = config_with_only(&["MH-Z19"]);
    config.tunables.insert("MH-Z19_alarm".into(), 1000);
    let mut node = rig.polling_node(&config);

    rig.cycle(&mut node);

    assert_eq!(rig.sink.alarms(), 1);
    assert_eq!(rig.broker.retained().len(), 1, "alarm is never published");
}

#[test]
fn co2_alarm_precedes_the_dust_fetch() {
    let mut rig = Rig::new();
    rig.co2.set_ppm(1500);
    rig.particulate.set_frame(Some(PmFrame {
        pm1_0: 3,
        pm2_5: 5,
        pm10_0: 8,
    }));
    let mut node = rig.polling_node(&config_with_only(&["MH-Z19", "PMS7003"]));

    rig.cycle(&mut node);

    let alarm_at = rig
        .sink
        .events
        .iter()
        .position(|e| matches!(e, AppEvent::Alarm { sensor: "MH-Z19", .. }))
        .expect("alarm raised");
    let first_dust_at = rig
        .sink
        .events
        .iter()
        .position(|e| matches!(e, AppEvent::Publishing { topic, .. } if topic.contains("dust")))
        .expect("dust published");
    assert!(alarm_at < first_dust_at);
}

#[test]
fn publish_order_follows_registration_and_enumeration() {
    let mut rig = Rig::new();
    rig.temperature.set_probes(&[20.0, 21.0]);
    rig.co2.set_ppm(600);
    rig.particulate.set_frame(Some(PmFrame {
        pm1_0: 3,
        pm2_5: 5,
        pm10_0: 8,
    }));
    rig.climate.set(48.3, 101_325.0);
    let mut node = rig.polling_node(&NodeConfig::default());

    rig.cycle(&mut node);

    let topics: Vec<String> = rig.sink.publishes().into_iter().map(|(t, _)| t).collect();
    assert_eq!(
        topics,
        vec![
            "snuffelaar/temperature/0",
            "snuffelaar/temperature/1",
            "snuffelaar/co2",
            "snuffelaar/dust-PM1.0",
            "snuffelaar/dust-PM2.5",
            "snuffelaar/dust-PM10.0",
            "snuffelaar/humidity",
            "snuffelaar/pressure",
        ]
    );
    let payloads = rig.sink.publishes();
    assert_eq!(payloads[7].1, "pressure,room=study value=1013.25 hPa");
}

#[test]
fn cycle_never_shorter_than_interval() {
    let mut rig = Rig::new();
    rig.co2.set_ppm(500);
    let mut node = rig.polling_node(&config_with_only(&["MH-Z19"]));

    for _ in 0..3 {
        let started = rig.clock.now();
        let report = rig.cycle(&mut node);
        assert!(report.elapsed_ms >= 5_000);
        assert!(rig.clock.now() - started >= 5_000);
    }
    assert_eq!(node.scheduler().cycles(), 3);
}

#[test]
fn slow_conversion_still_bounded() {
    let mut rig = Rig::new();
    rig.temperature.set_probes(&[19.25]);
    rig.temperature.set_conversion_polls(None);
    let config = NodeConfig {
        interval_secs: 1,
        ..config_with_only(&["DS18B20"])
    };
    let mut node = rig.polling_node(&config);

    let report = rig.cycle(&mut node);

    // The conversion never finished: the probe is read anyway, after at
    // most the conversion timeout.
    assert_eq!(report.published, 1);
    assert!(report.elapsed_ms >= 1_000);
    assert!(report.elapsed_ms < 1_000 + CONVERSION_TIMEOUT_MS + 100);
}

#[test]
fn disabled_sensor_is_never_touched() {
    let mut rig = Rig::new();
    rig.co2.set_ppm(700);
    let mut node = rig.polling_node(&config_with_only(&["DS18B20"]));

    rig.cycle(&mut node);
    rig.cycle(&mut node);

    assert_eq!(rig.co2.reads(), 0);
    assert_eq!(rig.particulate.requests(), 0);
    assert_eq!(rig.climate.begin_calls(), 0);
}

#[test]
fn prepare_runs_before_fetch_every_cycle() {
    let mut rig = Rig::new();
    rig.particulate.set_frame(Some(PmFrame {
        pm1_0: 1,
        pm2_5: 2,
        pm10_0: 3,
    }));
    let mut node = rig.polling_node(&config_with_only(&["PMS7003"]));

    // The sim only yields a frame after a read request, so three
    // readings per cycle prove the request came first.
    for cycle in 1..=2u32 {
        let report = rig.cycle(&mut node);
        assert_eq!(report.published, 3);
        assert_eq!(rig.particulate.requests(), cycle);
    }
}

#[test]
fn topic_override_and_prefix_apply() {
    let mut rig = Rig::new();
    rig.co2.set_ppm(450);
    let mut config = config_with_only(&[]);
    config.topic_prefix = "lab/".into();
    config.room = "attic".into();
    config.sensors.insert(
        "MH-Z19".into(),
        SensorSettings {
            enabled: true,
            topic: Some("air/co2".into()),
        },
    );
    let mut node = rig.polling_node(&config);

    rig.cycle(&mut node);

    assert_eq!(
        rig.sink.publishes(),
        vec![(
            "lab/air/co2".to_owned(),
            "air/co2,room=attic value=450 PPM".to_owned()
        )]
    );
}

#[test]
fn broker_outage_reconnects_once_per_cycle() {
    let mut rig = Rig::new();
    rig.co2.set_ppm(420);
    let mut node = rig.polling_node(&config_with_only(&["MH-Z19"]));

    rig.broker.set_reachable(false);
    let report = rig.cycle(&mut node);
    assert!(report.reconnect_attempted);
    assert_eq!(report.publish_failures, 1);
    // The attempt is still logged even though nothing was delivered.
    assert_eq!(rig.sink.publishes().len(), 1);
    assert!(
        rig.sink
            .events
            .contains(&AppEvent::BrokerReconnect { success: false })
    );

    rig.broker.set_reachable(true);
    let report = rig.cycle(&mut node);
    assert!(report.reconnect_attempted);
    assert_eq!(report.published, 1);
    assert_eq!(rig.broker.connect_attempts(), 2);

    let report = rig.cycle(&mut node);
    assert!(!report.reconnect_attempted);
}

#[test]
fn failed_init_excludes_sensor_from_polling() {
    let mut rig = Rig::new();
    rig.co2.fail_begin(true);
    rig.co2.set_ppm(500);
    let config = config_with_only(&["MH-Z19", "BME280_RH"]);
    rig.climate.set(40.0, 100_000.0);
    let mut node = rig.polling_node(&config);

    rig.cycle(&mut node);

    assert_eq!(rig.co2.reads(), 0);
    assert_eq!(
        rig.sink.publishes(),
        vec![(
            "snuffelaar/humidity".to_owned(),
            "humidity,room=study value=40.00 %".to_owned()
        )]
    );
}

#[test]
fn update_port_serviced_every_cycle() {
    let mut rig = Rig::new();
    rig.ota = snuffelaar::adapters::ota::OtaAdapter::new(true);
    let mut node = rig.polling_node(&config_with_only(&[]));

    rig.cycle(&mut node);
    rig.cycle(&mut node);

    assert_eq!(rig.ota.services(), 2);
    assert!(rig.ota.is_validated());
}
