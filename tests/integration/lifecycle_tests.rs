//! Node lifecycle: connecting, the portal, and re-entry into Polling.

use snuffelaar::adapters::nvs::NvsAdapter;
use snuffelaar::adapters::portal;
use snuffelaar::adapters::wifi::WifiAdapter;
use snuffelaar::app::events::AppEvent;
use snuffelaar::app::ports::{ConfigError, ConfigPort, ConnectivityPort};
use snuffelaar::app::service::NodeService;
use snuffelaar::config::NodeConfig;
use snuffelaar::error::{CommsError, Error};
use snuffelaar::lifecycle::NodeState;

use crate::mock_hw::{Rig, ScriptedTrigger, config_with_only};

fn states(events: &[AppEvent]) -> Vec<NodeState> {
    events
        .iter()
        .filter_map(|e| match e {
            AppEvent::StateChanged { to, .. } => Some(*to),
            _ => None,
        })
        .collect()
}

#[test]
fn boot_walks_through_to_polling() {
    let mut rig = Rig::new();
    let mut node = NodeService::new(rig.registry());
    let mut wifi = WifiAdapter::new("snuffelaar-test");
    wifi.set_credentials("HomeWiFi", "mysecret8");

    node.configure(&NodeConfig::default(), &mut rig.sink).unwrap();
    node.connect(&mut wifi, &mut rig.trigger, &rig.clock, &mut rig.sink)
        .unwrap();
    node.initialize(&rig.clock, &mut rig.sink).unwrap();

    assert_eq!(node.state(), NodeState::Polling);
    assert_eq!(
        states(&rig.sink.events),
        vec![
            NodeState::Configuring,
            NodeState::Connecting,
            NodeState::Initializing,
            NodeState::Polling,
        ]
    );
}

#[test]
fn missing_credentials_open_the_portal_first() {
    let mut rig = Rig::new();
    let mut node = NodeService::new(rig.registry());
    let mut wifi = WifiAdapter::new("snuffelaar-test");
    wifi.queue_form("ssid=HomeWiFi&password=mysecret8&room=attic");

    node.configure(&NodeConfig::default(), &mut rig.sink).unwrap();
    node.connect(&mut wifi, &mut rig.trigger, &rig.clock, &mut rig.sink)
        .unwrap();

    assert_eq!(wifi.portal_visits(), 1);
    assert!(wifi.is_connected());
    assert_eq!(
        states(&rig.sink.events),
        vec![
            NodeState::Configuring,
            NodeState::Connecting,
            NodeState::Portal,
            NodeState::Connecting,
        ]
    );
    let submission = wifi.take_submission().unwrap();
    assert_eq!(submission.ssid, "HomeWiFi");
}

#[test]
fn association_timeout_is_fatal() {
    let mut rig = Rig::new();
    let mut node = NodeService::new(rig.registry());
    let mut wifi = WifiAdapter::new("snuffelaar-test");
    wifi.set_credentials("HomeWiFi", "mysecret8");
    wifi.set_ap_in_range(false);
    let config = NodeConfig {
        connect_timeout_ms: 2_000,
        ..NodeConfig::default()
    };

    node.configure(&config, &mut rig.sink).unwrap();
    let err = node
        .connect(&mut wifi, &mut rig.trigger, &rig.clock, &mut rig.sink)
        .unwrap_err();

    assert_eq!(err, Error::Comms(CommsError::WifiConnectFailed));
    assert!(rig.clock.now() >= 2_000);
    assert_eq!(node.state(), NodeState::Connecting);
}

#[test]
fn button_while_connecting_diverts_to_portal() {
    let mut rig = Rig::new();
    rig.trigger = ScriptedTrigger::fire_on(3);
    let mut node = NodeService::new(rig.registry());
    let mut wifi = WifiAdapter::new("snuffelaar-test");
    wifi.set_credentials("Upstairs", "mysecret8");
    // The first network never associates; the form moves us to one
    // that does.
    wifi.set_networks_in_range(&["Downstairs"]);
    wifi.queue_form("ssid=Downstairs&password=othersecret");

    node.configure(&NodeConfig::default(), &mut rig.sink).unwrap();
    node.connect(&mut wifi, &mut rig.trigger, &rig.clock, &mut rig.sink)
        .unwrap();

    assert_eq!(wifi.portal_visits(), 1);
    assert_eq!(rig.trigger.checks, 3);
    assert!(wifi.is_connected());
    assert!(states(&rig.sink.events).contains(&NodeState::Portal));
}

#[test]
fn button_during_wait_enters_portal_and_returns_to_polling() {
    let mut rig = Rig::new();
    rig.co2.set_ppm(500);
    let mut node = rig.polling_node(&config_with_only(&["MH-Z19"]));
    let checks_so_far = rig.trigger.checks;
    rig.trigger.fire_on_check = Some(checks_so_far + 2);

    let report = rig.cycle(&mut node);

    assert!(report.portal_requested);
    assert!(report.elapsed_ms < 5_000, "wait cut short");
    assert_eq!(node.state(), NodeState::Portal);

    let mut wifi = WifiAdapter::new("snuffelaar-test");
    wifi.set_credentials("HomeWiFi", "mysecret8");
    wifi.queue_form("ssid=HomeWiFi&password=mysecret8");
    node.run_portal(&mut wifi, &mut rig.sink).unwrap();
    assert_eq!(node.state(), NodeState::Connecting);

    node.connect(&mut wifi, &mut rig.trigger, &rig.clock, &mut rig.sink)
        .unwrap();
    node.initialize(&rig.clock, &mut rig.sink).unwrap();
    assert_eq!(node.state(), NodeState::Polling);

    rig.sink.clear();
    let report = rig.cycle(&mut node);
    assert_eq!(report.published, 1);
}

#[test]
fn poll_outside_polling_is_rejected() {
    let mut rig = Rig::new();
    let mut node = NodeService::new(rig.registry());
    node.configure(&NodeConfig::default(), &mut rig.sink).unwrap();

    let mut io = snuffelaar::scheduler::CycleIo {
        clock: &rig.clock,
        broker: &mut rig.broker,
        updates: &mut rig.ota,
        trigger: &mut rig.trigger,
        sink: &mut rig.sink,
    };
    assert!(matches!(
        node.poll_once(&mut io),
        Err(Error::Lifecycle { .. })
    ));
}

#[test]
fn portal_submission_survives_restart() {
    let rig = Rig::new();
    let registry = rig.registry();
    let nvs = NvsAdapter::new().unwrap();
    let config = nvs.load_or_default();

    let body = "ssid=HomeWiFi&password=mysecret8&mqtt_host=broker.lan&mqtt_port=1883\
                &topic_prefix=home%2F&interval_secs=30&room=attic&add_units=on\
                &sensor.MH-Z19.enabled=on&sensor.DS18B20.enabled=on\
                &tunable.MH-Z19_alarm=1200";
    let submission = portal::parse_form(body);
    let updated = portal::merged_config(&submission, &config, &registry).unwrap();
    nvs.save(&updated).unwrap();

    // Next boot.
    let reloaded = nvs.load().unwrap();
    assert_eq!(reloaded.room, "attic");
    assert_eq!(reloaded.interval_secs, 30);
    assert!(!reloaded.sensor("PMS7003").enabled);

    let mut rig = Rig::new();
    rig.co2.set_ppm(1300);
    let mut node = rig.polling_node(&reloaded);
    rig.cycle(&mut node);
    assert_eq!(
        rig.sink.publishes(),
        vec![(
            "home/co2".to_owned(),
            "co2,room=attic value=1300 PPM".to_owned()
        )]
    );
    assert_eq!(rig.sink.alarms(), 1);
}

#[test]
fn out_of_range_alarm_from_portal_is_not_persisted() {
    let rig = Rig::new();
    let registry = rig.registry();
    let nvs = NvsAdapter::new().unwrap();
    let config = nvs.load_or_default();

    let submission = portal::parse_form("tunable.MH-Z19_alarm=9000");
    let updated = portal::merged_config(&submission, &config, &registry).unwrap();

    assert!(matches!(
        nvs.save(&updated),
        Err(ConfigError::ValidationFailed(_))
    ));
    assert_eq!(nvs.load_or_default(), config);
}
