use std::cell::RefCell;
use std::rc::Rc;

use dvcman::{
    is_capacity_exceeded, ChannelManager, DvcManConfig, DvcManErrorKind, EntryPoints, LoadOutcome, Registry,
    StaticPluginLoader,
};
use dvcman_testsuite::{EventLog, RecordingCallback, RecordingPlugin};
use proptest::prelude::*;
use rstest::rstest;

type Rejections = Rc<RefCell<Vec<Option<(Registry, usize)>>>>;

/// Loads a single module whose entry point registers `count` plugins named `p0`, `p1`, …
fn load_bulk(capacity: usize, count: usize, log: &EventLog) -> (ChannelManager, LoadOutcome, Vec<Option<(Registry, usize)>>) {
    let results: Rejections = Rc::default();

    let entry_log = log.clone();
    let entry_results = Rc::clone(&results);
    let loader = StaticPluginLoader::new().with_plugin("bulk", move |entry_points: &mut EntryPoints<'_>| {
        for i in 0..count {
            let plugin = RecordingPlugin::new(format!("p{i}"), &entry_log).boxed();
            let rejection = match entry_points.register_plugin(plugin) {
                Ok(()) => None,
                Err(e) => match e.kind() {
                    DvcManErrorKind::CapacityExceeded { registry, capacity } => Some((*registry, *capacity)),
                    other => panic!("unexpected error kind: {other}"),
                },
            };
            entry_results.borrow_mut().push(rejection);
        }
    });

    let mut manager = ChannelManager::with_loader(DvcManConfig::with_capacity(capacity), loader);
    let outcome = manager.load_plugin("bulk").unwrap();

    let results = results.borrow().clone();
    (manager, outcome, results)
}

#[test]
fn default_capacity_is_ten() {
    let config = DvcManConfig::default();
    assert_eq!(config.max_plugins, 10);
    assert_eq!(config.max_listeners, 10);

    let manager = ChannelManager::with_config(config);
    assert_eq!(manager.plugins().capacity(), 10);
    assert_eq!(manager.listeners().capacity(), 10);
}

#[test]
fn manager_keeps_its_configuration() {
    let config = DvcManConfig::with_capacity(4).with_plugin_dir("/opt/dvc");
    let manager = ChannelManager::with_config(config.clone());

    assert_eq!(manager.config(), &config);
    assert_eq!(manager.plugins().capacity(), 4);
    assert_eq!(manager.listeners().capacity(), 4);
}

#[test]
fn plugins_are_looked_up_by_registration_index() {
    let log = EventLog::new();
    let entry_log = log.clone();
    let loader = StaticPluginLoader::new().with_plugin("pair", move |entry_points: &mut EntryPoints<'_>| {
        entry_points
            .register_plugin(RecordingPlugin::new("rdpsnd", &entry_log).boxed())
            .unwrap();
        entry_points
            .register_plugin(RecordingPlugin::without_hooks("ainput", &entry_log))
            .unwrap();
    });

    let mut manager = ChannelManager::with_loader(DvcManConfig::default(), loader);
    manager.load_plugin("pair").unwrap();

    let plugins = manager.plugins();
    assert_eq!(plugins.get(0).map(|plugin| plugin.name()), Some("rdpsnd"));
    assert_eq!(plugins.get(1).map(|plugin| plugin.name()), Some("ainput"));
    assert!(plugins.get(2).is_none());

    assert!(plugins.get_downcast_ref::<RecordingPlugin>(0).is_some());
    assert!(plugins.get_downcast_ref::<RecordingPlugin>(1).is_none());
    assert!(plugins.get_downcast_ref::<RecordingPlugin>(2).is_none());
}

#[test]
fn plugin_registry_rejects_the_eleventh_plugin() {
    let log = EventLog::new();
    let (manager, outcome, results) = load_bulk(10, 11, &log);

    assert_eq!(outcome, LoadOutcome::EntryPointInvoked { registered: 10 });
    assert!(results[..10].iter().all(Option::is_none));
    assert_eq!(results[10], Some((Registry::Plugins, 10)));
    assert_eq!(manager.plugin_count(), 10);
}

#[rstest]
#[case(1)]
#[case(3)]
#[case(10)]
fn listener_registry_rejects_beyond_capacity(#[case] capacity: usize) {
    let log = EventLog::new();
    let mut manager = ChannelManager::new(capacity);

    for i in 0..capacity {
        let name = format!("chan{i}");
        let id = manager
            .create_listener(&name, u32::try_from(i).unwrap(), RecordingCallback::new(name.as_str(), &log).boxed())
            .unwrap();
        assert_eq!(id.index(), i);
    }

    let error = manager
        .create_listener("overflow", 0, RecordingCallback::new("overflow", &log).boxed())
        .unwrap_err();

    assert!(is_capacity_exceeded(&error));
    assert!(matches!(
        error.kind(),
        DvcManErrorKind::CapacityExceeded { registry: Registry::Listeners, capacity: c } if *c == capacity
    ));
    assert_eq!(manager.listener_count(), capacity);
    assert!(manager.find_listener("overflow").is_none());

    // The rejected callback was not retained.
    assert_eq!(log.events(), vec![dvcman_testsuite::Event::ListenerDropped("overflow".to_owned())]);
}

#[test]
fn capacity_error_is_reported() {
    let mut manager = ChannelManager::new(0);
    let log = EventLog::new();

    let error = manager
        .create_listener("cliprdr", 0, RecordingCallback::new("cliprdr", &log).boxed())
        .unwrap_err();

    assert_eq!(
        error.report().to_string(),
        "[create listener] maximum listener number reached (0)"
    );
}

proptest! {
    #[test]
    fn registrations_up_to_capacity_succeed_in_order(capacity in 0usize..12, count in 0usize..16) {
        let log = EventLog::new();
        let (manager, outcome, results) = load_bulk(capacity, count, &log);

        let accepted = count.min(capacity);
        prop_assert_eq!(outcome, LoadOutcome::EntryPointInvoked { registered: accepted });
        prop_assert_eq!(manager.plugin_count(), accepted);

        for (i, rejection) in results.iter().enumerate() {
            if i < capacity {
                prop_assert_eq!(*rejection, None);
            } else {
                prop_assert_eq!(*rejection, Some((Registry::Plugins, capacity)));
            }
        }

        let expected_names: Vec<String> = (0..accepted).map(|i| format!("p{i}")).collect();
        let names: Vec<String> = manager.plugins().names().map(str::to_owned).collect();
        prop_assert_eq!(names, expected_names);
    }

    #[test]
    fn listeners_keep_call_order(names in proptest::collection::vec("[a-z]{1,8}", 0..10)) {
        let log = EventLog::new();
        let mut manager = ChannelManager::new(10);

        for name in &names {
            manager.create_listener(name, 0, RecordingCallback::new(name.as_str(), &log).boxed()).unwrap();
        }

        let registered: Vec<&str> = manager.listeners().iter().map(|l| l.channel_name()).collect();
        prop_assert_eq!(registered, names.iter().map(String::as_str).collect::<Vec<_>>());
    }
}
